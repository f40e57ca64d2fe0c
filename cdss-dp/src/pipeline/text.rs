use super::{Normalizer, PreprocessingError};
use cdss_common::payload::CanonicalPayload;

/// Collapses whitespace runs to one space and trims the ends
pub struct TextNormalizer;

impl Normalizer for TextNormalizer {
    fn name(&self) -> &'static str {
        "text"
    }

    fn tags(&self) -> &'static [&'static str] {
        &["text"]
    }

    fn normalize(&self, _tag: &str, raw: &str) -> Result<CanonicalPayload, PreprocessingError> {
        Ok(CanonicalPayload::Text(collapse_whitespace(raw)))
    }
}

pub(crate) fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}
