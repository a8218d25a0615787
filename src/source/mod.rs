//! Source records read from the input databases.
//!
//! The converter consumes plain records; where they come from is up to the
//! caller. [`sqlite`] reads the MySword / TWM database layouts, and tests
//! build [`SourceData`] directly.

pub mod sqlite;

use crate::xref::XrefSource;

/// One row of the Bible text source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerseRecord {
    pub book: u32,
    pub chapter: u32,
    pub verse: u32,
    /// Raw verse text with MySword markup; `None` for NULL rows.
    pub text: Option<String>,
}

impl VerseRecord {
    pub fn new(book: u32, chapter: u32, verse: u32, text: impl Into<String>) -> Self {
        Self {
            book,
            chapter,
            verse,
            text: Some(text.into()),
        }
    }
}

/// One row of the book-name source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookNameRecord {
    pub ordinal: u32,
    pub name: Option<String>,
    pub abbreviation: Option<String>,
}

impl BookNameRecord {
    pub fn new(ordinal: u32, name: impl Into<String>) -> Self {
        Self {
            ordinal,
            name: Some(name.into()),
            abbreviation: None,
        }
    }
}

/// Everything read from the input databases for one run.
#[derive(Debug, Clone)]
pub struct SourceData {
    pub verses: Vec<VerseRecord>,
    pub book_names: Vec<BookNameRecord>,
    /// Language code from the language source, if it declares one.
    pub language: Option<String>,
    pub cross_references: XrefSource,
}

impl SourceData {
    pub fn new(verses: Vec<VerseRecord>, book_names: Vec<BookNameRecord>) -> Self {
        Self {
            verses,
            book_names,
            language: None,
            cross_references: XrefSource::Absent,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_cross_references(mut self, cross_references: XrefSource) -> Self {
        self.cross_references = cross_references;
        self
    }
}
