use super::{Normalizer, PreprocessingError};
use cdss_common::payload::CanonicalPayload;
use cdss_common::schema::HEART_FEATURES;
use serde_json::Value;

/// Parses tabular heart-risk features into the fixed model order
///
/// Accepts a JSON array of exactly 18 values or an object keyed by feature
/// name with every feature present. Booleans count as 0/1.
pub struct NumericNormalizer;

impl Normalizer for NumericNormalizer {
    fn name(&self) -> &'static str {
        "numeric"
    }

    fn tags(&self) -> &'static [&'static str] {
        &["numeric"]
    }

    fn normalize(&self, tag: &str, raw: &str) -> Result<CanonicalPayload, PreprocessingError> {
        let parsed: Value = serde_json::from_str(raw)
            .map_err(|e| PreprocessingError::malformed(tag, format!("invalid JSON: {}", e)))?;

        let features = match parsed {
            Value::Array(items) => from_array(tag, &items)?,
            Value::Object(map) => from_object(tag, &map)?,
            _ => {
                return Err(PreprocessingError::schema(
                    tag,
                    "expected a JSON array or object of features",
                ))
            }
        };

        Ok(CanonicalPayload::Vector(features))
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn from_array(tag: &str, items: &[Value]) -> Result<Vec<f64>, PreprocessingError> {
    if items.len() != HEART_FEATURES.len() {
        return Err(PreprocessingError::schema(
            tag,
            format!("expected {} features, got {}", HEART_FEATURES.len(), items.len()),
        ));
    }

    items
        .iter()
        .zip(HEART_FEATURES.iter())
        .map(|(item, name)| {
            as_number(item)
                .ok_or_else(|| PreprocessingError::schema(tag, format!("feature '{}' is not numeric", name)))
        })
        .collect()
}

fn from_object(
    tag: &str,
    map: &serde_json::Map<String, Value>,
) -> Result<Vec<f64>, PreprocessingError> {
    if let Some(unknown) = map.keys().find(|k| !HEART_FEATURES.contains(&k.as_str())) {
        return Err(PreprocessingError::schema(tag, format!("unknown feature '{}'", unknown)));
    }

    HEART_FEATURES
        .iter()
        .map(|name| match map.get(*name) {
            Some(value) => as_number(value)
                .ok_or_else(|| PreprocessingError::schema(tag, format!("feature '{}' is not numeric", name))),
            None => Err(PreprocessingError::schema(tag, format!("missing feature '{}'", name))),
        })
        .collect()
}
