//! Entity deduplication policy
//!
//! The exact matching policy for "is this extracted entity the same as an
//! existing node" is pluggable. Every policy must be deterministic: the same
//! label always maps to the same canonical key, independent of extraction
//! order.

/// Maps entity labels to canonical keys; two labels with the same key are
/// treated as the same entity and merged.
pub trait EntityResolver: Send + Sync {
    fn canonical_key(&self, label: &str) -> String;
}

/// Strict policy: labels match only after trimming surrounding whitespace.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactLabelResolver;

impl EntityResolver for ExactLabelResolver {
    fn canonical_key(&self, label: &str) -> String {
        label.trim().to_string()
    }
}

/// Default policy: case-insensitive match with interior whitespace collapsed.
///
/// "New  York" and "new york" resolve to the same node. This mirrors how
/// extraction output is normalized before insertion, without attempting any
/// semantic matching.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizingResolver;

impl EntityResolver for NormalizingResolver {
    fn canonical_key(&self, label: &str) -> String {
        label
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("_")
            .to_lowercase()
    }
}
