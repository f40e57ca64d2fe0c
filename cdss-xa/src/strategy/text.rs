//! Clinical text triage: classifier category plus generated specific diagnosis

use super::{strip_code_fence, AnalysisResult, AnalysisStrategy, StrategyFailure};
use crate::models::{Generator, TextClassifier};
use async_trait::async_trait;
use cdss_common::payload::CanonicalPayload;
use serde::Deserialize;
use std::sync::Arc;
use tracing::warn;

/// Clinical categories behind the classifier's `LABEL_n` outputs
pub const TEXT_LABELS: [&str; 8] = [
    "Cardiovascular / Pulmonary",
    "Orthopedic",
    "Gastroenterology",
    "Neurology",
    "Obstetrics / Gynecology",
    "Urology",
    "ENT - Otolaryngology",
    "Hematology - Oncology",
];

#[derive(Debug, Deserialize)]
struct GeneratedDiagnosis {
    specific_diagnosis: String,
    explanation: String,
}

pub struct TextStrategy {
    classifier: Arc<dyn TextClassifier>,
    generator: Option<Arc<dyn Generator>>,
}

impl TextStrategy {
    pub fn new(classifier: Arc<dyn TextClassifier>, generator: Option<Arc<dyn Generator>>) -> Self {
        Self {
            classifier,
            generator,
        }
    }

    /// Specific diagnosis and explanation; falls back to placeholders
    async fn elaborate(&self, text: &str, category: &str, confidence: f64) -> (String, String) {
        let Some(generator) = &self.generator else {
            return (
                "N/A".to_string(),
                "Generated explanation unavailable: generator is not configured".to_string(),
            );
        };

        let output = match generator.generate(&prompt(text, category, confidence)).await {
            Ok(output) => output,
            Err(e) => {
                warn!("Generator failed for text analysis: {}", e);
                return ("N/A".to_string(), format!("Generated explanation unavailable: {}", e));
            }
        };

        match serde_json::from_str::<GeneratedDiagnosis>(strip_code_fence(&output)) {
            Ok(generated) => (generated.specific_diagnosis, generated.explanation),
            Err(e) => {
                warn!("Generator returned malformed output: {}", e);
                (
                    "N/A".to_string(),
                    "Generated explanation unavailable: malformed generator output".to_string(),
                )
            }
        }
    }
}

/// Map `LABEL_n` to its category; other labels pass through
pub fn category_for(label: &str) -> String {
    label
        .strip_prefix("LABEL_")
        .and_then(|n| n.parse::<usize>().ok())
        .and_then(|i| TEXT_LABELS.get(i))
        .map(|category| category.to_string())
        .unwrap_or_else(|| label.to_string())
}

fn prompt(text: &str, category: &str, confidence: f64) -> String {
    format!(
        "Act as an expert doctor. If the request is not in English, translate it to English first; \
         the response must be in English.\n\
         Patient symptoms: \"{text}\"\n\
         Classifier category: {category} (confidence {:.2}%)\n\n\
         1. Provide a specific diagnosis based on the symptoms.\n\
         2. Explain why in two sentences.\n\n\
         Respond only with JSON: {{\"specific_diagnosis\": \"...\", \"explanation\": \"...\"}}",
        confidence * 100.0
    )
}

#[async_trait]
impl AnalysisStrategy for TextStrategy {
    async fn analyse(
        &self,
        _tag: &str,
        payload: &CanonicalPayload,
    ) -> Result<AnalysisResult, StrategyFailure> {
        let CanonicalPayload::Text(text) = payload else {
            return Err(StrategyFailure::new(format!("expected text, got {}", payload.kind())));
        };
        if text.is_empty() {
            return Err(StrategyFailure::new("no text provided"));
        }

        let classification = self
            .classifier
            .classify(text)
            .await
            .map_err(|e| StrategyFailure::new(format!("text classifier failed: {}", e)))?;

        let category = category_for(&classification.label);
        let confidence = (classification.score * 10_000.0).round() / 10_000.0;
        let (specific, explanation) = self.elaborate(text, &category, confidence).await;

        Ok(AnalysisResult::new(
            format!("{}: {}", category, specific),
            confidence,
            explanation,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Classification, ModelError};

    struct StubClassifier;

    #[async_trait]
    impl TextClassifier for StubClassifier {
        async fn classify(&self, _text: &str) -> Result<Classification, ModelError> {
            Ok(Classification {
                label: "LABEL_3".into(),
                score: 0.91234,
            })
        }
    }

    struct StubGenerator(&'static str);

    #[async_trait]
    impl Generator for StubGenerator {
        async fn generate(&self, prompt: &str) -> Result<String, ModelError> {
            assert!(prompt.contains("Neurology"));
            Ok(self.0.to_string())
        }
    }

    fn strategy(generator: Option<&'static str>) -> TextStrategy {
        TextStrategy::new(
            Arc::new(StubClassifier),
            generator.map(|g| Arc::new(StubGenerator(g)) as Arc<dyn Generator>),
        )
    }

    fn text() -> CanonicalPayload {
        CanonicalPayload::Text("sudden severe headache with aura".into())
    }

    #[test]
    fn test_label_mapping() {
        assert_eq!(category_for("LABEL_0"), "Cardiovascular / Pulmonary");
        assert_eq!(category_for("LABEL_7"), "Hematology - Oncology");
        assert_eq!(category_for("LABEL_8"), "LABEL_8");
        assert_eq!(category_for("Urology"), "Urology");
    }

    #[tokio::test]
    async fn test_fenced_generator_output() {
        let s = strategy(Some(
            "```json\n{\"specific_diagnosis\": \"Migraine with aura\", \"explanation\": \"Classic aura.\"}\n```",
        ));
        let result = s.analyse("text", &text()).await.unwrap();

        assert_eq!(result.diagnosis, "Neurology: Migraine with aura");
        assert_eq!(result.confidence, 0.9123);
        assert_eq!(result.explanation, "Classic aura.");
    }

    #[tokio::test]
    async fn test_malformed_generator_output_degrades() {
        let result = strategy(Some("I think it is a migraine"))
            .analyse("text", &text())
            .await
            .unwrap();
        assert_eq!(result.diagnosis, "Neurology: N/A");
        assert!(result.explanation.contains("malformed"));
    }

    #[tokio::test]
    async fn test_without_generator() {
        let result = strategy(None).analyse("text", &text()).await.unwrap();
        assert_eq!(result.diagnosis, "Neurology: N/A");
    }
}
