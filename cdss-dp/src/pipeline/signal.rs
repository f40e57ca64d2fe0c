use super::{Normalizer, PreprocessingError};
use cdss_common::payload::CanonicalPayload;

/// Guards against division by zero for constant signals
const EPSILON: f64 = 1e-8;

/// Min-max scales a JSON array of samples into [0, 1]
pub struct SignalNormalizer;

impl Normalizer for SignalNormalizer {
    fn name(&self) -> &'static str {
        "signal"
    }

    fn tags(&self) -> &'static [&'static str] {
        &["signal"]
    }

    fn normalize(&self, tag: &str, raw: &str) -> Result<CanonicalPayload, PreprocessingError> {
        let samples: Vec<f64> = serde_json::from_str(raw)
            .map_err(|e| PreprocessingError::malformed(tag, format!("expected a JSON array of numbers: {}", e)))?;

        if samples.is_empty() {
            return Err(PreprocessingError::malformed(tag, "signal is empty"));
        }

        let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
        let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let range = max - min + EPSILON;

        Ok(CanonicalPayload::Vector(
            samples.iter().map(|x| (x - min) / range).collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(payload: CanonicalPayload) -> Vec<f64> {
        match payload {
            CanonicalPayload::Vector(v) => v,
            other => panic!("expected vector, got {:?}", other),
        }
    }

    #[test]
    fn test_scaled_into_unit_range() {
        let v = values(SignalNormalizer.normalize("signal", "[2, 4, 6]").unwrap());
        assert_eq!(v[0], 0.0);
        assert!((v[1] - 0.5).abs() < 1e-6);
        assert!((v[2] - 1.0).abs() < 1e-6);
        assert!(v.iter().all(|x| (0.0..=1.0).contains(x)));
    }

    #[test]
    fn test_constant_signal_is_finite() {
        let v = values(SignalNormalizer.normalize("signal", "[0, 0, 0]").unwrap());
        assert_eq!(v, vec![0.0, 0.0, 0.0]);
        assert!(v.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn test_empty_signal_is_preprocessing_error() {
        let err = SignalNormalizer.normalize("signal", "[]").unwrap_err();
        assert!(matches!(err, PreprocessingError::Malformed { .. }));
    }

    #[test]
    fn test_non_numeric_rejected() {
        assert!(SignalNormalizer.normalize("signal", r#"[1, "two"]"#).is_err());
        assert!(SignalNormalizer.normalize("signal", "1,2,3").is_err());
    }
}
