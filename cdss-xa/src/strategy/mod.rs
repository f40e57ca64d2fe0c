//! Analysis strategies and their registry
//!
//! The registry maps a strategy tag to a factory. A strategy is built on
//! first use and cached for the life of the process; a failed build is
//! reported as [`StrategyError::Unavailable`] and retried by the next call.

mod imaging;
mod numeric;
mod signal;
mod text;

pub use imaging::{ImageStrategy, SKIN_LABELS, XRAY_LABELS};
pub use numeric::{NumericStrategy, RISK_THRESHOLD};
pub use signal::{SignalStrategy, SIGNAL_SAMPLE_LIMIT};
pub use text::{TextStrategy, TEXT_LABELS};

use crate::models::{Generator, ImageModel, TabularModel, TextClassifier};
use async_trait::async_trait;
use cdss_common::api::ApiError;
use cdss_common::payload::CanonicalPayload;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{info, warn};

/// Uniform result of every strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub diagnosis: String,
    pub confidence: f64,
    pub explanation: String,
}

impl AnalysisResult {
    pub fn new(diagnosis: impl Into<String>, confidence: f64, explanation: impl Into<String>) -> Self {
        Self {
            diagnosis: diagnosis.into(),
            confidence: clamp_confidence(confidence),
            explanation: explanation.into(),
        }
    }

    /// Stored in place of a result the strategy could not produce
    pub fn degraded(failure: &StrategyFailure) -> Self {
        Self {
            diagnosis: "N/A".to_string(),
            confidence: 0.0,
            explanation: format!("Analysis could not be completed: {}", failure.0),
        }
    }
}

/// Confidence is always within [0, 1]; NaN counts as no confidence
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// A constructed strategy could not produce a result for this payload
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{0}")]
pub struct StrategyFailure(pub String);

impl StrategyFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        StrategyFailure(reason.into())
    }
}

#[async_trait]
pub trait AnalysisStrategy: Send + Sync {
    /// `tag` is the artifact's strategy tag, used by strategies that serve
    /// several sub-types
    async fn analyse(
        &self,
        tag: &str,
        payload: &CanonicalPayload,
    ) -> Result<AnalysisResult, StrategyFailure>;
}

/// Registry lookup failure
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StrategyError {
    #[error("strategy '{0}' not found")]
    NotFound(String),

    #[error("strategy '{tag}' unavailable: {reason}")]
    Unavailable { tag: String, reason: String },
}

impl From<StrategyError> for ApiError {
    fn from(err: StrategyError) -> Self {
        match err {
            StrategyError::NotFound(tag) => ApiError::StrategyNotFound(tag),
            StrategyError::Unavailable { tag, reason } => ApiError::StrategyUnavailable { tag, reason },
        }
    }
}

/// Outcome of a factory call; `Err` carries the reason resources are missing
pub type BuildResult = Result<Arc<dyn AnalysisStrategy>, String>;

pub type StrategyFactory = Box<dyn Fn() -> BuildResult + Send + Sync>;

struct Entry {
    factory: StrategyFactory,
    instance: OnceCell<Arc<dyn AnalysisStrategy>>,
}

#[derive(Default)]
pub struct StrategyRegistry {
    entries: HashMap<String, Entry>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace the factory for `tag`
    pub fn register(&mut self, tag: &str, factory: StrategyFactory) {
        self.entries.insert(
            tag.to_string(),
            Entry {
                factory,
                instance: OnceCell::new(),
            },
        );
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.entries.contains_key(tag)
    }

    /// Registered tags, sorted
    pub fn tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.entries.keys().cloned().collect();
        tags.sort();
        tags
    }

    /// The cached strategy for `tag`, building it on first use
    pub async fn resolve(&self, tag: &str) -> Result<Arc<dyn AnalysisStrategy>, StrategyError> {
        let entry = self
            .entries
            .get(tag)
            .ok_or_else(|| StrategyError::NotFound(tag.to_string()))?;

        let instance = entry
            .instance
            .get_or_try_init(|| async {
                let built = (entry.factory)();
                match &built {
                    Ok(_) => info!("Strategy '{}' initialized", tag),
                    Err(reason) => warn!("Strategy '{}' failed to initialize: {}", tag, reason),
                }
                built
            })
            .await
            .map_err(|reason| StrategyError::Unavailable {
                tag: tag.to_string(),
                reason,
            })?;

        Ok(Arc::clone(instance))
    }

    /// `text`, `img_rx`, `img_skin`, `numeric` and `signal` over the given adapters
    pub fn standard(adapters: ModelAdapters) -> Self {
        let mut registry = Self::new();

        let tabular = adapters.tabular.clone();
        registry.register(
            "numeric",
            Box::new(move || -> BuildResult {
                let model = tabular.clone().ok_or_else(|| "model hub is not configured".to_string())?;
                Ok(Arc::new(NumericStrategy::new(model)) as Arc<dyn AnalysisStrategy>)
            }),
        );

        for tag in ["img_rx", "img_skin"] {
            let image = adapters.image.clone();
            registry.register(
                tag,
                Box::new(move || -> BuildResult {
                    let model = image.clone().ok_or_else(|| "model hub is not configured".to_string())?;
                    Ok(Arc::new(ImageStrategy::new(model)) as Arc<dyn AnalysisStrategy>)
                }),
            );
        }

        let classifier = adapters.text.clone();
        let generator = adapters.generator.clone();
        registry.register(
            "text",
            Box::new(move || -> BuildResult {
                let classifier = classifier
                    .clone()
                    .ok_or_else(|| "model hub is not configured".to_string())?;
                Ok(Arc::new(TextStrategy::new(classifier, generator.clone())) as Arc<dyn AnalysisStrategy>)
            }),
        );

        let generator = adapters.generator;
        registry.register(
            "signal",
            Box::new(move || -> BuildResult {
                Ok(Arc::new(SignalStrategy::new(generator.clone())) as Arc<dyn AnalysisStrategy>)
            }),
        );

        registry
    }
}

/// External collaborators available to the standard strategies
#[derive(Clone, Default)]
pub struct ModelAdapters {
    pub tabular: Option<Arc<dyn TabularModel>>,
    pub image: Option<Arc<dyn ImageModel>>,
    pub text: Option<Arc<dyn TextClassifier>>,
    pub generator: Option<Arc<dyn Generator>>,
}

/// Remove Markdown code fences around generator output
pub(crate) fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
