//! Time-series (ECG) interpretation through the generative service

use super::{strip_code_fence, AnalysisResult, AnalysisStrategy, StrategyFailure};
use crate::models::Generator;
use async_trait::async_trait;
use cdss_common::payload::CanonicalPayload;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// Samples included in the prompt
pub const SIGNAL_SAMPLE_LIMIT: usize = 300;

#[derive(Debug, Clone, PartialEq, Serialize)]
struct SignalStats {
    min: f64,
    max: f64,
    mean: f64,
}

impl SignalStats {
    fn of(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
        let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        Some(Self { min, max, mean })
    }
}

#[derive(Debug, Deserialize)]
struct GeneratedReading {
    diagnosis: String,
    confidence: f64,
    explanation: String,
}

pub struct SignalStrategy {
    generator: Option<Arc<dyn Generator>>,
}

impl SignalStrategy {
    pub fn new(generator: Option<Arc<dyn Generator>>) -> Self {
        Self { generator }
    }
}

fn prompt(stats: &SignalStats, sample: &[f64]) -> String {
    let stats = serde_json::to_string(stats).unwrap_or_default();
    let sample = serde_json::to_string(sample).unwrap_or_default();
    format!(
        "Analyze this ECG signal.\n\
         Statistics: {stats}\n\
         Data: {sample}\n\n\
         Identify anomalies, arrhythmias or irregularities.\n\n\
         Respond only with JSON: {{\"diagnosis\": \"...\", \"confidence\": 0.0, \"explanation\": \"...\"}}"
    )
}

#[async_trait]
impl AnalysisStrategy for SignalStrategy {
    async fn analyse(
        &self,
        _tag: &str,
        payload: &CanonicalPayload,
    ) -> Result<AnalysisResult, StrategyFailure> {
        let CanonicalPayload::Vector(samples) = payload else {
            return Err(StrategyFailure::new(format!("expected a signal, got {}", payload.kind())));
        };
        let stats = SignalStats::of(samples).ok_or_else(|| StrategyFailure::new("signal is empty"))?;

        let generator = self
            .generator
            .as_ref()
            .ok_or_else(|| StrategyFailure::new("generator is not configured"))?;

        let sample = &samples[..samples.len().min(SIGNAL_SAMPLE_LIMIT)];
        let output = generator
            .generate(&prompt(&stats, sample))
            .await
            .map_err(|e| StrategyFailure::new(format!("generator failed: {}", e)))?;

        match serde_json::from_str::<GeneratedReading>(strip_code_fence(&output)) {
            Ok(reading) => Ok(AnalysisResult::new(
                reading.diagnosis,
                reading.confidence,
                reading.explanation,
            )),
            Err(e) => {
                warn!("Generator returned malformed signal reading: {}", e);
                Ok(AnalysisResult::new(
                    "Undetermined",
                    0.0,
                    "Signal interpretation unavailable: malformed generator output",
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModelError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingGenerator {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Generator for RecordingGenerator {
        async fn generate(&self, prompt: &str) -> Result<String, ModelError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.reply.clone())
        }
    }

    fn generator(reply: &str) -> Arc<RecordingGenerator> {
        Arc::new(RecordingGenerator {
            reply: reply.to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn test_stats() {
        let stats = SignalStats::of(&[0.0, 0.5, 1.0]).unwrap();
        assert_eq!(stats, SignalStats { min: 0.0, max: 1.0, mean: 0.5 });
        assert!(SignalStats::of(&[]).is_none());
    }

    #[tokio::test]
    async fn test_reading_parsed_and_clamped() {
        let stub = generator("```json\n{\"diagnosis\": \"Atrial fibrillation\", \"confidence\": 1.3, \"explanation\": \"Irregular RR.\"}\n```");
        let strategy = SignalStrategy::new(Some(stub.clone() as Arc<dyn Generator>));

        let samples: Vec<f64> = (0..500).map(|i| (i % 10) as f64 / 10.0).collect();
        let result = strategy.analyse("signal", &CanonicalPayload::Vector(samples)).await.unwrap();

        assert_eq!(result.diagnosis, "Atrial fibrillation");
        assert_eq!(result.confidence, 1.0);

        // Only the first 300 samples are sent
        let prompts = stub.prompts.lock().unwrap();
        let data_line = prompts[0].lines().find(|l| l.starts_with("Data: ")).unwrap();
        let sent: Vec<f64> = serde_json::from_str(&data_line["Data: ".len()..]).unwrap();
        assert_eq!(sent.len(), SIGNAL_SAMPLE_LIMIT);
    }

    #[tokio::test]
    async fn test_malformed_output_is_undetermined() {
        let strategy = SignalStrategy::new(Some(generator("normal sinus rhythm") as Arc<dyn Generator>));
        let result = strategy
            .analyse("signal", &CanonicalPayload::Vector(vec![0.0, 1.0]))
            .await
            .unwrap();

        assert_eq!(result.diagnosis, "Undetermined");
        assert_eq!(result.confidence, 0.0);
    }

    #[tokio::test]
    async fn test_missing_generator_or_samples_fail() {
        let strategy = SignalStrategy::new(None);
        assert!(strategy
            .analyse("signal", &CanonicalPayload::Vector(vec![0.1]))
            .await
            .is_err());

        let strategy = SignalStrategy::new(Some(generator("{}") as Arc<dyn Generator>));
        assert!(strategy
            .analyse("signal", &CanonicalPayload::Vector(vec![]))
            .await
            .is_err());
    }
}
