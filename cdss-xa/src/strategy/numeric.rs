//! Heart-risk analysis over the tabular feature vector

use super::{AnalysisResult, AnalysisStrategy, StrategyFailure};
use crate::models::TabularModel;
use async_trait::async_trait;
use cdss_common::payload::CanonicalPayload;
use cdss_common::schema::{feature_index, CHEST_PAIN_PREFIX, HEART_FEATURES};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

/// Probabilities above this are "High" risk
pub const RISK_THRESHOLD: f64 = 0.5;

const MIN_IMPACT: f64 = 0.1;
const MAX_FACTORS: usize = 5;

/// Model-derived contribution of one feature
#[derive(Debug, Clone, PartialEq, Serialize)]
struct AttributedFactor {
    feature: &'static str,
    value: f64,
    impact_score: f64,
    effect: &'static str,
}

/// Clinical rule that fired when attribution is unavailable
#[derive(Debug, Clone, PartialEq, Serialize)]
struct RuleFactor {
    feature: &'static str,
    effect: &'static str,
    impact_score: &'static str,
}

pub struct NumericStrategy {
    model: Arc<dyn TabularModel>,
}

impl NumericStrategy {
    pub fn new(model: Arc<dyn TabularModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl AnalysisStrategy for NumericStrategy {
    async fn analyse(
        &self,
        _tag: &str,
        payload: &CanonicalPayload,
    ) -> Result<AnalysisResult, StrategyFailure> {
        let CanonicalPayload::Vector(features) = payload else {
            return Err(StrategyFailure::new(format!(
                "expected a feature vector, got {}",
                payload.kind()
            )));
        };
        if features.len() != HEART_FEATURES.len() {
            return Err(StrategyFailure::new(format!(
                "expected {} features, got {}",
                HEART_FEATURES.len(),
                features.len()
            )));
        }

        let probability = self
            .model
            .risk_probability(features)
            .await
            .map_err(|e| StrategyFailure::new(format!("risk model failed: {}", e)))?;

        let explanation = match self.model.attributions(features).await {
            Ok(impacts) if impacts.len() == features.len() => {
                to_json(&top_factors(features, &impacts))
            }
            Ok(impacts) => {
                warn!("Attribution returned {} values, using clinical rules", impacts.len());
                to_json(&rule_factors(features))
            }
            Err(e) => {
                warn!("Attribution failed ({}), using clinical rules", e);
                to_json(&rule_factors(features))
            }
        };

        let diagnosis = if probability > RISK_THRESHOLD { "High" } else { "Low" };
        Ok(AnalysisResult::new(diagnosis, probability, explanation))
    }
}

fn to_json<T: Serialize>(factors: &[T]) -> String {
    serde_json::to_string(factors).unwrap_or_else(|_| "[]".to_string())
}

/// Up to five features with |impact| above the floor, largest first
fn top_factors(features: &[f64], impacts: &[f64]) -> Vec<AttributedFactor> {
    let mut factors: Vec<AttributedFactor> = HEART_FEATURES
        .iter()
        .zip(features.iter().zip(impacts))
        .filter(|(_, (_, impact))| impact.abs() > MIN_IMPACT)
        .map(|(feature, (value, impact))| AttributedFactor {
            feature: *feature,
            value: *value,
            impact_score: (impact * 10_000.0).round() / 10_000.0,
            effect: if *impact > 0.0 { "Increases risk" } else { "Decreases risk" },
        })
        .collect();

    factors.sort_by(|a, b| b.impact_score.abs().total_cmp(&a.impact_score.abs()));
    factors.truncate(MAX_FACTORS);
    factors
}

fn value_of(features: &[f64], name: &str) -> f64 {
    feature_index(name)
        .and_then(|i| features.get(i).copied())
        .unwrap_or(0.0)
}

fn rule_factors(features: &[f64]) -> Vec<RuleFactor> {
    let mut factors = Vec::new();

    if value_of(features, "chol") > 240.0 {
        factors.push(RuleFactor {
            feature: "Cholesterol",
            effect: "High (>240)",
            impact_score: "Critical",
        });
    }
    if value_of(features, "trestbps") > 140.0 {
        factors.push(RuleFactor {
            feature: "Blood pressure",
            effect: "High (>140)",
            impact_score: "High",
        });
    }
    let chest_pain = HEART_FEATURES
        .iter()
        .zip(features)
        .any(|(name, value)| name.starts_with(CHEST_PAIN_PREFIX) && *value > 0.0);
    if chest_pain {
        factors.push(RuleFactor {
            feature: "Chest pain",
            effect: "Present",
            impact_score: "High",
        });
    }
    if value_of(features, "oldpeak") > 2.0 {
        factors.push(RuleFactor {
            feature: "ST depression",
            effect: "Depression (>2.0)",
            impact_score: "High",
        });
    }
    if value_of(features, "thalch") > 180.0 {
        factors.push(RuleFactor {
            feature: "Heart rate",
            effect: "Tachycardia (>180)",
            impact_score: "Medium",
        });
    }

    factors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModelError;
    use serde_json::Value;

    struct StubModel {
        probability: f64,
        impacts: Option<Vec<f64>>,
    }

    #[async_trait]
    impl TabularModel for StubModel {
        async fn risk_probability(&self, _features: &[f64]) -> Result<f64, ModelError> {
            Ok(self.probability)
        }

        async fn attributions(&self, _features: &[f64]) -> Result<Vec<f64>, ModelError> {
            self.impacts
                .clone()
                .ok_or_else(|| ModelError::Output("no explainer".into()))
        }
    }

    fn patient() -> Vec<f64> {
        // age, trestbps, chol, thalch, oldpeak, ca, then one-hot flags
        let mut features = vec![0.0; 18];
        features[0] = 63.0;
        features[1] = 150.0;
        features[2] = 260.0;
        features[3] = 120.0;
        features[4] = 1.0;
        features[8] = 1.0; // cp_non-anginal
        features
    }

    async fn run(probability: f64, impacts: Option<Vec<f64>>) -> AnalysisResult {
        let strategy = NumericStrategy::new(Arc::new(StubModel { probability, impacts }));
        strategy
            .analyse("numeric", &CanonicalPayload::Vector(patient()))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_threshold() {
        assert_eq!(run(0.51, None).await.diagnosis, "High");
        assert_eq!(run(0.5, None).await.diagnosis, "Low");
        assert_eq!(run(0.12, None).await.confidence, 0.12);
    }

    #[tokio::test]
    async fn test_top_five_by_magnitude() {
        let mut impacts = vec![0.0; 18];
        impacts[0] = 0.3;
        impacts[1] = -0.9;
        impacts[2] = 0.5;
        impacts[3] = 0.05; // below floor
        impacts[4] = -0.2;
        impacts[5] = 0.15;
        impacts[6] = 0.11;

        let result = run(0.8, Some(impacts)).await;
        let factors: Vec<Value> = serde_json::from_str(&result.explanation).unwrap();
        let names: Vec<&str> = factors.iter().map(|f| f["feature"].as_str().unwrap()).collect();

        assert_eq!(names, vec!["trestbps", "chol", "age", "oldpeak", "ca"]);
        assert_eq!(factors[0]["effect"], "Decreases risk");
        assert_eq!(factors[1]["value"], 260.0);
    }

    #[tokio::test]
    async fn test_rules_when_attribution_fails() {
        let result = run(0.7, None).await;
        let factors: Vec<Value> = serde_json::from_str(&result.explanation).unwrap();
        let names: Vec<&str> = factors.iter().map(|f| f["feature"].as_str().unwrap()).collect();

        assert_eq!(names, vec!["Cholesterol", "Blood pressure", "Chest pain"]);
        assert_eq!(factors[0]["impact_score"], "Critical");
    }

    #[tokio::test]
    async fn test_wrong_payload_is_failure() {
        let strategy = NumericStrategy::new(Arc::new(StubModel {
            probability: 0.5,
            impacts: None,
        }));
        assert!(strategy
            .analyse("numeric", &CanonicalPayload::Text("x".into()))
            .await
            .is_err());
        assert!(strategy
            .analyse("numeric", &CanonicalPayload::Vector(vec![1.0; 3]))
            .await
            .is_err());
    }
}
