//! Model input schemas shared by preprocessing and analysis
//!
//! The numeric normalizer builds vectors in [`HEART_FEATURES`] order and the
//! numeric strategy names attribution factors from it. Image tensors are
//! normalized with the channel statistics below and de-normalized with the
//! same values when the heat map is drawn.

/// Feature names in model input order
pub const HEART_FEATURES: [&str; 18] = [
    "age",
    "trestbps",
    "chol",
    "thalch",
    "oldpeak",
    "ca",
    "sex_Male",
    "cp_atypical angina",
    "cp_non-anginal",
    "cp_typical angina",
    "fbs_True",
    "restecg_normal",
    "restecg_st-t abnormality",
    "exang_True",
    "slope_flat",
    "slope_upsloping",
    "thal_normal",
    "thal_reversable defect",
];

/// Prefix shared by the chest-pain one-hot columns
pub const CHEST_PAIN_PREFIX: &str = "cp_";

/// Position of a feature in the input vector
pub fn feature_index(name: &str) -> Option<usize> {
    HEART_FEATURES.iter().position(|f| *f == name)
}

/// Model input edge length in pixels
pub const IMAGE_SIDE: u32 = 224;

/// Per-channel ImageNet statistics (RGB)
pub const IMAGE_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGE_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Map a channel intensity in [0, 1] to model input space
pub fn normalize_channel(channel: usize, intensity: f32) -> f32 {
    (intensity - IMAGE_MEAN[channel]) / IMAGE_STD[channel]
}

/// Inverse of [`normalize_channel`]
pub fn denormalize_channel(channel: usize, value: f32) -> f32 {
    value * IMAGE_STD[channel] + IMAGE_MEAN[channel]
}
