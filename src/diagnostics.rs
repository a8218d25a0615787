//! Data-quality counters accumulated over one conversion run.

use std::fmt;

/// Recoverable problems found while converting. None of these stop the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Diagnostics {
    /// Cross-reference targets (or sources) that name no existing verse.
    pub unresolved_references: usize,
    /// Verses rendered as plain text because their markup was unusable.
    pub unrenderable_verses: usize,
    /// Source rows whose text was empty after normalization.
    pub skipped_empty_verses: usize,
    /// Chapter 0 / verse 0 rows (module introductions).
    pub skipped_introductions: usize,
    /// Books with no name in the language source.
    pub fallback_book_names: usize,
    /// Places where chapter or verse numbering skips ahead.
    pub numbering_gaps: usize,
    /// Book names, codes or metadata with characters XML cannot carry.
    pub sanitized_names: usize,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} unresolved cross-references, {} unrenderable verses, {} empty verses skipped, \
             {} introductions skipped, {} books without names, {} numbering gaps, \
             {} names with invalid characters",
            self.unresolved_references,
            self.unrenderable_verses,
            self.skipped_empty_verses,
            self.skipped_introductions,
            self.fallback_book_names,
            self.numbering_gaps,
            self.sanitized_names,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_and_summary() {
        assert!(Diagnostics::new().is_clean());

        let diagnostics = Diagnostics {
            unresolved_references: 3,
            sanitized_names: 1,
            ..Default::default()
        };
        assert!(!diagnostics.is_clean());
        let summary = diagnostics.to_string();
        assert!(summary.starts_with("3 unresolved cross-references"));
        assert!(summary.ends_with("1 names with invalid characters"));
    }
}
