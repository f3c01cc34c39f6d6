//! Field extraction — turns a raw form representation into the canonical
//! `FormField` list with stable, de-duplicated signatures.
//!
//! Two strategies implement one contract: `HtmlFieldExtractor` parses a
//! serialized DOM snapshot server-side; `ExtensionFieldExtractor` re-keys
//! the browser extension's pre-extracted descriptors. One is wired up per
//! deployment via `EXTRACTION_STRATEGY`; both stay behind the trait for
//! testability and fallback.

pub mod extension;
pub mod html;

pub use extension::{ExtensionFieldExtractor, RawExtractedField};
pub use html::HtmlFieldExtractor;

use crate::autofill::fields::FormField;
use crate::errors::AppError;

/// Borrowed view of the raw inputs a run may carry. Each strategy reads
/// exactly one of the two members and rejects the input otherwise.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionInput<'a> {
    pub dom_html: Option<&'a str>,
    pub extracted_fields: Option<&'a [RawExtractedField]>,
}

pub trait FieldExtractionStrategy: Send + Sync {
    /// Must guarantee: stable iteration order, signature uniqueness, and a
    /// non-empty label for every field.
    fn extract(&self, input: ExtractionInput<'_>) -> Result<Vec<FormField>, AppError>;
}

/// Canonical label-normalization contract, applied by both strategies:
/// whitespace collapsed to single spaces, trailing `*` markers stripped.
/// Required-detection runs on the raw text before this cleaning.
pub(crate) fn clean_label(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.trim_end_matches('*').trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_label_strips_trailing_star() {
        assert_eq!(clean_label("Email*"), "Email");
        assert_eq!(clean_label("Email *"), "Email");
    }

    #[test]
    fn test_clean_label_collapses_whitespace() {
        assert_eq!(clean_label("  First \n  name "), "First name");
    }

    #[test]
    fn test_clean_label_keeps_inner_punctuation() {
        assert_eq!(
            clean_label("Are you authorized to work in the U.S.?*"),
            "Are you authorized to work in the U.S.?"
        );
    }
}
