//! Canonical payload: the opaque string passed from preprocessing to analysis
//!
//! The payload is tagged JSON. Tensors carry their values as base64 of
//! little-endian `f32`, which keeps a 1×3×224×224 image around 800 KB and
//! makes the encoding exact and deterministic.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum PayloadError {
    #[error("payload is not valid canonical JSON: {0}")]
    Json(String),

    #[error("tensor values are not valid base64: {0}")]
    Base64(String),

    #[error("tensor has {actual} values but shape {shape:?} needs {expected}")]
    ShapeMismatch {
        shape: Vec<usize>,
        expected: usize,
        actual: usize,
    },
}

/// Normalized data in one of four forms
#[derive(Debug, Clone, PartialEq)]
pub enum CanonicalPayload {
    /// Cleaned text
    Text(String),
    /// Dense f32 tensor in row-major order
    Tensor { shape: Vec<usize>, values: Vec<f32> },
    /// Flat numeric vector (tabular features or a signal)
    Vector(Vec<f64>),
    /// Input no normalizer claimed, forwarded unchanged
    Raw(String),
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum Wire {
    Text { text: String },
    Tensor { shape: Vec<usize>, values: String },
    Vector { values: Vec<f64> },
    Raw { data: String },
}

impl CanonicalPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            CanonicalPayload::Text(_) => "text",
            CanonicalPayload::Tensor { .. } => "tensor",
            CanonicalPayload::Vector(_) => "vector",
            CanonicalPayload::Raw(_) => "raw",
        }
    }

    /// Serialize to the opaque string form
    pub fn encode(&self) -> String {
        let wire = match self {
            CanonicalPayload::Text(text) => Wire::Text { text: text.clone() },
            CanonicalPayload::Tensor { shape, values } => {
                let mut bytes = Vec::with_capacity(values.len() * 4);
                for v in values {
                    bytes.extend_from_slice(&v.to_le_bytes());
                }
                Wire::Tensor {
                    shape: shape.clone(),
                    values: STANDARD.encode(bytes),
                }
            }
            CanonicalPayload::Vector(values) => Wire::Vector {
                values: values.clone(),
            },
            CanonicalPayload::Raw(data) => Wire::Raw { data: data.clone() },
        };
        // Wire contains only strings, integers and finite-or-null floats
        serde_json::to_string(&wire).unwrap_or_default()
    }

    /// Parse the opaque string form
    pub fn decode(encoded: &str) -> Result<Self, PayloadError> {
        let wire: Wire =
            serde_json::from_str(encoded).map_err(|e| PayloadError::Json(e.to_string()))?;

        Ok(match wire {
            Wire::Text { text } => CanonicalPayload::Text(text),
            Wire::Tensor { shape, values } => {
                let bytes = STANDARD
                    .decode(values.as_bytes())
                    .map_err(|e| PayloadError::Base64(e.to_string()))?;
                let expected: usize = shape.iter().product();
                if bytes.len() != expected * 4 {
                    return Err(PayloadError::ShapeMismatch {
                        shape,
                        expected,
                        actual: bytes.len() / 4,
                    });
                }
                let values = bytes
                    .chunks_exact(4)
                    .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect();
                CanonicalPayload::Tensor { shape, values }
            }
            Wire::Vector { values } => CanonicalPayload::Vector(values),
            Wire::Raw { data } => CanonicalPayload::Raw(data),
        })
    }
}
