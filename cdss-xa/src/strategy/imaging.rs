//! Chest X-ray and skin lesion classification with a heat map explanation
//!
//! One strategy serves both image tags; the artifact tag selects the model
//! and label table. The explanation is a base64 JPEG of the input image with
//! the class activation map blended over it.

use super::{AnalysisResult, AnalysisStrategy, StrategyFailure};
use crate::models::{ImageKind, ImageModel};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use cdss_common::payload::CanonicalPayload;
use cdss_common::schema::denormalize_channel;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::sync::Arc;
use tracing::warn;

pub const XRAY_LABELS: [&str; 14] = [
    "Atelectasis",
    "Cardiomegaly",
    "Effusion",
    "Infiltration",
    "Mass",
    "Nodule",
    "Pneumonia",
    "Pneumothorax",
    "Consolidation",
    "Edema",
    "Emphysema",
    "Fibrosis",
    "Pleural_Thickening",
    "Hernia",
];

pub const SKIN_LABELS: [&str; 7] = [
    "Actinic keratoses",
    "Basal cell carcinoma",
    "Benign keratosis",
    "Dermatofibroma",
    "Melanocytic nevi",
    "Melanoma",
    "Vascular lesions",
];

const OVERLAY_WEIGHT: f32 = 0.5;

fn labels(kind: ImageKind) -> &'static [&'static str] {
    match kind {
        ImageKind::ChestXray => &XRAY_LABELS,
        ImageKind::SkinLesion => &SKIN_LABELS,
    }
}

pub struct ImageStrategy {
    model: Arc<dyn ImageModel>,
}

impl ImageStrategy {
    pub fn new(model: Arc<dyn ImageModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl AnalysisStrategy for ImageStrategy {
    async fn analyse(
        &self,
        tag: &str,
        payload: &CanonicalPayload,
    ) -> Result<AnalysisResult, StrategyFailure> {
        let kind = ImageKind::from_tag(tag)
            .ok_or_else(|| StrategyFailure::new(format!("no image model for '{}'", tag)))?;

        let CanonicalPayload::Tensor { shape, values } = payload else {
            return Err(StrategyFailure::new(format!(
                "expected an image tensor, got {}",
                payload.kind()
            )));
        };
        let (height, width) = match shape.as_slice() {
            [1, 3, h, w] => (*h, *w),
            other => {
                return Err(StrategyFailure::new(format!(
                    "expected a [1, 3, H, W] tensor, got {:?}",
                    other
                )))
            }
        };

        let probabilities = self
            .model
            .probabilities(kind, shape, values)
            .await
            .map_err(|e| StrategyFailure::new(format!("{} model failed: {}", kind.model_name(), e)))?;

        let table = labels(kind);
        if probabilities.len() != table.len() {
            return Err(StrategyFailure::new(format!(
                "{} model returned {} classes, expected {}",
                kind.model_name(),
                probabilities.len(),
                table.len()
            )));
        }

        let (index, confidence) = probabilities
            .iter()
            .copied()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .ok_or_else(|| StrategyFailure::new("model returned no classes"))?;

        // A missing heat map degrades the explanation, not the diagnosis
        let explanation = match self.model.activation_map(kind, shape, values, index).await {
            Ok(weights) => match render_heatmap(values, &weights, width, height) {
                Ok(jpeg) => jpeg,
                Err(reason) => {
                    warn!("Heat map rendering failed: {}", reason);
                    format!("Heat map unavailable: {}", reason)
                }
            },
            Err(e) => {
                warn!("Activation map failed: {}", e);
                format!("Heat map unavailable: {}", e)
            }
        };

        Ok(AnalysisResult::new(table[index], confidence, explanation))
    }
}

/// Jet colormap for a weight in [0, 1]
fn jet(weight: f32) -> [f32; 3] {
    let channel = |offset: f32| (1.5 - (4.0 * weight - offset).abs()).clamp(0.0, 1.0);
    [channel(3.0), channel(2.0), channel(1.0)]
}

/// Blend the activation map over the de-normalized image and encode as base64 JPEG
fn render_heatmap(values: &[f32], weights: &[f32], width: usize, height: usize) -> Result<String, String> {
    let plane = width * height;
    if values.len() != 3 * plane {
        return Err(format!("tensor has {} values for {}x{}", values.len(), width, height));
    }
    if weights.len() != plane {
        return Err(format!("activation map has {} weights, expected {}", weights.len(), plane));
    }

    let mut overlay = RgbImage::new(width as u32, height as u32);
    for (x, y, pixel) in overlay.enumerate_pixels_mut() {
        let offset = y as usize * width + x as usize;
        let color = jet(weights[offset].clamp(0.0, 1.0));

        let mut rgb = [0u8; 3];
        for c in 0..3 {
            let original = denormalize_channel(c, values[c * plane + offset]).clamp(0.0, 1.0);
            let blended = (1.0 - OVERLAY_WEIGHT) * original + OVERLAY_WEIGHT * color[c];
            rgb[c] = (blended * 255.0).round() as u8;
        }
        *pixel = Rgb(rgb);
    }

    let mut jpeg = Vec::new();
    DynamicImage::ImageRgb8(overlay)
        .write_to(&mut Cursor::new(&mut jpeg), ImageFormat::Jpeg)
        .map_err(|e| e.to_string())?;
    Ok(STANDARD.encode(jpeg))
}
