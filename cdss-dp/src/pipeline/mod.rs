//! Preprocessing pipeline
//!
//! An ordered registry of normalizers. Each normalizer owns one or more
//! strategy tags and no tag has two owners. `handle` routes a raw payload to
//! the owner of its tag; tags nobody claims follow the [`UnclaimedPolicy`].

mod imaging;
mod numeric;
mod signal;
mod text;

pub use imaging::ImageNormalizer;
pub use numeric::NumericNormalizer;
pub use signal::SignalNormalizer;
pub use text::TextNormalizer;

use cdss_common::api::ApiError;
use cdss_common::payload::CanonicalPayload;
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

/// Failure to turn a raw payload into its canonical form
#[derive(Debug, Error, PartialEq)]
pub enum PreprocessingError {
    /// Input could not be parsed or decoded
    #[error("preprocessing failed for '{tag}': {reason}")]
    Malformed { tag: String, reason: String },

    /// Input parsed but does not fit the expected schema
    #[error("'{tag}' input does not match the expected schema: {reason}")]
    Schema { tag: String, reason: String },

    /// No normalizer owns the tag and the pipeline is strict
    #[error("unknown strategy '{tag}'")]
    Unclaimed { tag: String },
}

impl PreprocessingError {
    pub fn malformed(tag: &str, reason: impl Into<String>) -> Self {
        PreprocessingError::Malformed {
            tag: tag.to_string(),
            reason: reason.into(),
        }
    }

    pub fn schema(tag: &str, reason: impl Into<String>) -> Self {
        PreprocessingError::Schema {
            tag: tag.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<PreprocessingError> for ApiError {
    fn from(err: PreprocessingError) -> Self {
        match err {
            PreprocessingError::Malformed { tag, reason } => ApiError::Preprocessing { tag, reason },
            PreprocessingError::Schema { .. } => ApiError::Validation(err.to_string()),
            PreprocessingError::Unclaimed { tag } => ApiError::Preprocessing {
                tag,
                reason: "unknown strategy".to_string(),
            },
        }
    }
}

/// Registration conflict
#[derive(Debug, Error, PartialEq)]
#[error("tag '{tag}' is already owned by the {owner} normalizer")]
pub struct TagConflict {
    pub tag: String,
    pub owner: &'static str,
}

/// One stage of the pipeline
pub trait Normalizer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Tags this normalizer owns
    fn tags(&self) -> &'static [&'static str];

    fn normalize(&self, tag: &str, raw: &str) -> Result<CanonicalPayload, PreprocessingError>;
}

/// What to do with a tag no normalizer claims
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnclaimedPolicy {
    /// Forward the input unchanged as a raw payload
    #[default]
    PassThrough,
    /// Fail with `PreprocessingError::Unclaimed`
    Reject,
}

impl UnclaimedPolicy {
    pub fn from_strict_flag(strict: bool) -> Self {
        if strict {
            UnclaimedPolicy::Reject
        } else {
            UnclaimedPolicy::PassThrough
        }
    }
}

pub struct Pipeline {
    normalizers: Vec<Box<dyn Normalizer>>,
    owners: HashMap<&'static str, usize>,
    policy: UnclaimedPolicy,
}

impl Pipeline {
    pub fn new(policy: UnclaimedPolicy) -> Self {
        Self {
            normalizers: Vec::new(),
            owners: HashMap::new(),
            policy,
        }
    }

    /// text → img_rx/img_skin → numeric → signal
    pub fn standard(policy: UnclaimedPolicy) -> Result<Self, TagConflict> {
        let mut pipeline = Self::new(policy);
        pipeline.register(Box::new(TextNormalizer))?;
        pipeline.register(Box::new(ImageNormalizer))?;
        pipeline.register(Box::new(NumericNormalizer))?;
        pipeline.register(Box::new(SignalNormalizer))?;
        Ok(pipeline)
    }

    /// Append a normalizer; fails without side effects if any of its tags is taken
    pub fn register(&mut self, normalizer: Box<dyn Normalizer>) -> Result<(), TagConflict> {
        for tag in normalizer.tags() {
            if let Some(&owner) = self.owners.get(tag) {
                return Err(TagConflict {
                    tag: tag.to_string(),
                    owner: self.normalizers[owner].name(),
                });
            }
        }

        let index = self.normalizers.len();
        for tag in normalizer.tags() {
            self.owners.insert(tag, index);
        }
        self.normalizers.push(normalizer);
        Ok(())
    }

    pub fn policy(&self) -> UnclaimedPolicy {
        self.policy
    }

    /// Normalizer names in traversal order
    pub fn order(&self) -> Vec<&'static str> {
        self.normalizers.iter().map(|n| n.name()).collect()
    }

    pub fn owner_of(&self, tag: &str) -> Option<&'static str> {
        self.owners.get(tag).map(|&i| self.normalizers[i].name())
    }

    /// Normalize `raw` with the owner of `tag`
    pub fn handle(&self, raw: &str, tag: &str) -> Result<CanonicalPayload, PreprocessingError> {
        match self.owners.get(tag) {
            Some(&index) => {
                let normalizer = &self.normalizers[index];
                debug!("Tag '{}' handled by {} normalizer", tag, normalizer.name());
                normalizer.normalize(tag, raw)
            }
            None => match self.policy {
                UnclaimedPolicy::PassThrough => {
                    debug!("Tag '{}' unclaimed, passing through", tag);
                    Ok(CanonicalPayload::Raw(raw.to_string()))
                }
                UnclaimedPolicy::Reject => Err(PreprocessingError::Unclaimed {
                    tag: tag.to_string(),
                }),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Shadow;

    impl Normalizer for Shadow {
        fn name(&self) -> &'static str {
            "shadow"
        }
        fn tags(&self) -> &'static [&'static str] {
            &["dna", "numeric"]
        }
        fn normalize(&self, _tag: &str, raw: &str) -> Result<CanonicalPayload, PreprocessingError> {
            Ok(CanonicalPayload::Raw(raw.to_uppercase()))
        }
    }

    #[test]
    fn test_standard_order_and_owners() {
        let pipeline = Pipeline::standard(UnclaimedPolicy::PassThrough).unwrap();
        assert_eq!(pipeline.order(), vec!["text", "image", "numeric", "signal"]);
        assert_eq!(pipeline.owner_of("img_rx"), Some("image"));
        assert_eq!(pipeline.owner_of("img_skin"), Some("image"));
        assert_eq!(pipeline.owner_of("dna"), None);
    }

    #[test]
    fn test_second_owner_rejected_atomically() {
        let mut pipeline = Pipeline::standard(UnclaimedPolicy::PassThrough).unwrap();
        let err = pipeline.register(Box::new(Shadow)).unwrap_err();

        assert_eq!(err.owner, "numeric");
        // "dna" was not half-registered
        assert_eq!(pipeline.owner_of("dna"), None);
        assert_eq!(pipeline.order().len(), 4);
    }

    #[test]
    fn test_unclaimed_passes_through_unchanged() {
        let pipeline = Pipeline::standard(UnclaimedPolicy::PassThrough).unwrap();
        let raw = "  untouched\tpayload ";
        assert_eq!(
            pipeline.handle(raw, "dna").unwrap(),
            CanonicalPayload::Raw(raw.to_string())
        );
    }

    #[test]
    fn test_unclaimed_rejected_when_strict() {
        let pipeline = Pipeline::standard(UnclaimedPolicy::Reject).unwrap();
        let err = pipeline.handle("x", "dna").unwrap_err();
        assert_eq!(err, PreprocessingError::Unclaimed { tag: "dna".into() });

        let api: ApiError = err.into();
        assert_eq!(api.code(), "PREPROCESSING_ERROR");
    }

    #[test]
    fn test_only_owner_runs() {
        let mut pipeline = Pipeline::new(UnclaimedPolicy::Reject);
        pipeline.register(Box::new(TextNormalizer)).unwrap();
        pipeline.register(Box::new(Shadow)).unwrap();

        assert_eq!(
            pipeline.handle("a  b", "text").unwrap(),
            CanonicalPayload::Text("a b".into())
        );
        assert_eq!(
            pipeline.handle("a  b", "dna").unwrap(),
            CanonicalPayload::Raw("A  B".into())
        );
    }

    #[test]
    fn test_schema_error_maps_to_validation() {
        let api: ApiError = PreprocessingError::schema("numeric", "expected 18 values").into();
        assert!(matches!(api, ApiError::Validation(_)));
    }
}
