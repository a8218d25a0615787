//! Table of contents: books at the top level, chapters below.

use crate::model::{Bible, FragmentId};

/// A table of contents entry (hierarchical).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    pub title: String,
    pub href: String,
    /// Chapter the entry points into.
    pub target: FragmentId,
    pub children: Vec<TocEntry>,
}

impl TocEntry {
    pub fn new(title: impl Into<String>, href: impl Into<String>, target: FragmentId) -> Self {
        Self {
            title: title.into(),
            href: href.into(),
            target,
            children: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: TocEntry) -> Self {
        self.children.push(child);
        self
    }
}

/// Two-level navigation map in canonical order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Navigation {
    pub entries: Vec<TocEntry>,
}

impl Navigation {
    /// Chapter-level entries, in reading order.
    pub fn chapter_entries(&self) -> impl Iterator<Item = &TocEntry> {
        self.entries.iter().flat_map(|book| book.children.iter())
    }

    /// Total number of entries at both levels.
    pub fn len(&self) -> usize {
        self.entries.iter().map(|e| 1 + e.children.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Build the book → chapter table of contents.
///
/// Book entries point at the start of the book's first chapter; chapter
/// entries point at the chapter heading.
pub fn build_navigation(bible: &Bible) -> Navigation {
    let entries = bible
        .books()
        .iter()
        .filter_map(|book| {
            let first = book.chapters.first()?.fragment();
            let entry = book.chapters.iter().fold(
                TocEntry::new(&book.name, first.file_name(), first),
                |entry, chapter| {
                    let target = chapter.fragment();
                    entry.with_child(TocEntry::new(
                        chapter.number.to_string(),
                        target.entry_href(),
                        target,
                    ))
                },
            );
            Some(entry)
        })
        .collect();

    Navigation { entries }
}
