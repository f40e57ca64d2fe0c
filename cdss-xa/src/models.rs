//! Model adapters
//!
//! Strategies never talk to inference backends directly; they go through
//! these traits. The HTTP implementations call a model hub
//! (`POST {hub}/predict`, `POST {hub}/explain`) and a text generator
//! (`POST {generator}/generate`).

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use cdss_common::http::{UpstreamClient, UpstreamError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

/// Failure of a single model call
#[derive(Debug, Error)]
pub enum ModelError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// The backend answered with something the adapter cannot use
    #[error("unexpected model output: {0}")]
    Output(String),
}

/// Which discriminative image model to use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    ChestXray,
    SkinLesion,
}

impl ImageKind {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "img_rx" => Some(ImageKind::ChestXray),
            "img_skin" => Some(ImageKind::SkinLesion),
            _ => None,
        }
    }

    /// Model name on the hub
    pub fn model_name(&self) -> &'static str {
        match self {
            ImageKind::ChestXray => "chexnet",
            ImageKind::SkinLesion => "skin_efficientnet",
        }
    }
}

/// Top label of a text classifier
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Classification {
    pub label: String,
    pub score: f64,
}

/// Heart-risk classifier over the 18-feature vector
#[async_trait]
pub trait TabularModel: Send + Sync {
    /// Probability of the positive (at-risk) class
    async fn risk_probability(&self, features: &[f64]) -> Result<f64, ModelError>;

    /// Per-feature attribution, same order as `features`
    async fn attributions(&self, features: &[f64]) -> Result<Vec<f64>, ModelError>;
}

#[async_trait]
pub trait ImageModel: Send + Sync {
    /// Class probabilities for a `[1, 3, H, W]` tensor
    async fn probabilities(
        &self,
        kind: ImageKind,
        shape: &[usize],
        values: &[f32],
    ) -> Result<Vec<f64>, ModelError>;

    /// Class activation map of `H * W` weights in [0, 1], row-major
    async fn activation_map(
        &self,
        kind: ImageKind,
        shape: &[usize],
        values: &[f32],
        class_index: usize,
    ) -> Result<Vec<f32>, ModelError>;
}

#[async_trait]
pub trait TextClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<Classification, ModelError>;
}

/// Free-text generator
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ModelError>;
}

const TABULAR_MODEL: &str = "heart_xgboost";
const TEXT_MODEL: &str = "clinicalbert";

#[derive(Serialize)]
struct PredictRequest<'a> {
    model: &'a str,
    inputs: Value,
}

#[derive(Deserialize)]
struct PredictResponse {
    #[serde(default)]
    probabilities: Vec<f64>,
    label: Option<String>,
    score: Option<f64>,
}

#[derive(Serialize)]
struct ExplainRequest<'a> {
    model: &'a str,
    inputs: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<usize>,
}

#[derive(Deserialize)]
struct ExplainResponse {
    attributions: Vec<f64>,
}

fn tensor_inputs(shape: &[usize], values: &[f32]) -> Value {
    let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    json!({ "shape": shape, "values": STANDARD.encode(bytes) })
}

/// HTTP client for the model hub
#[derive(Debug, Clone)]
pub struct ModelHubClient {
    client: UpstreamClient,
}

impl ModelHubClient {
    pub fn new(hub_url: &str, timeout_ms: u64) -> Result<Self, UpstreamError> {
        Ok(Self {
            client: UpstreamClient::new("model_hub", hub_url, timeout_ms)?,
        })
    }

    async fn predict(&self, model: &str, inputs: Value) -> Result<PredictResponse, ModelError> {
        Ok(self
            .client
            .post_json("/predict", &PredictRequest { model, inputs })
            .await?)
    }

    async fn explain(
        &self,
        model: &str,
        inputs: Value,
        target: Option<usize>,
    ) -> Result<Vec<f64>, ModelError> {
        let response: ExplainResponse = self
            .client
            .post_json("/explain", &ExplainRequest { model, inputs, target })
            .await?;
        Ok(response.attributions)
    }
}

#[async_trait]
impl TabularModel for ModelHubClient {
    async fn risk_probability(&self, features: &[f64]) -> Result<f64, ModelError> {
        let response = self.predict(TABULAR_MODEL, json!(features)).await?;
        // [p(low), p(high)] or a single positive-class probability
        match response.probabilities.as_slice() {
            [_, high] => Ok(*high),
            [only] => Ok(*only),
            other => Err(ModelError::Output(format!(
                "expected 1 or 2 probabilities, got {}",
                other.len()
            ))),
        }
    }

    async fn attributions(&self, features: &[f64]) -> Result<Vec<f64>, ModelError> {
        self.explain(TABULAR_MODEL, json!(features), Some(1)).await
    }
}

#[async_trait]
impl ImageModel for ModelHubClient {
    async fn probabilities(
        &self,
        kind: ImageKind,
        shape: &[usize],
        values: &[f32],
    ) -> Result<Vec<f64>, ModelError> {
        let response = self.predict(kind.model_name(), tensor_inputs(shape, values)).await?;
        Ok(response.probabilities)
    }

    async fn activation_map(
        &self,
        kind: ImageKind,
        shape: &[usize],
        values: &[f32],
        class_index: usize,
    ) -> Result<Vec<f32>, ModelError> {
        let weights = self
            .explain(kind.model_name(), tensor_inputs(shape, values), Some(class_index))
            .await?;
        Ok(weights.into_iter().map(|w| w as f32).collect())
    }
}

#[async_trait]
impl TextClassifier for ModelHubClient {
    async fn classify(&self, text: &str) -> Result<Classification, ModelError> {
        let response = self.predict(TEXT_MODEL, json!(text)).await?;
        match (response.label, response.score) {
            (Some(label), Some(score)) => Ok(Classification { label, score }),
            _ => Err(ModelError::Output("classifier returned no label".to_string())),
        }
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    prompt: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    text: String,
}

/// HTTP client for the generative service
#[derive(Debug, Clone)]
pub struct GenerativeClient {
    client: UpstreamClient,
}

impl GenerativeClient {
    pub fn new(generator_url: &str, timeout_ms: u64) -> Result<Self, UpstreamError> {
        Ok(Self {
            client: UpstreamClient::new("generator", generator_url, timeout_ms)?,
        })
    }
}

#[async_trait]
impl Generator for GenerativeClient {
    async fn generate(&self, prompt: &str) -> Result<String, ModelError> {
        let response: GenerateResponse = self
            .client
            .post_json("/generate", &GenerateRequest { prompt })
            .await?;
        Ok(response.text)
    }
}
