//! # bible-epub
//!
//! Converts MySword Bible databases into EPUB 2 files with a book → chapter
//! table of contents and in-text cross-reference links.
//!
//! ## Pipeline
//!
//! 1. [`source`] reads verse rows, book names and (optionally)
//!    cross-reference edges
//! 2. [`model::Bible`] normalizes them into an ordered book/chapter/verse tree
//! 3. [`xref::resolve`] turns edges into links between existing verses
//! 4. [`export`] renders chapter fragments and navigation, verifies every
//!    internal link, and writes the package atomically
//!
//! ## Quick Start
//!
//! ```
//! use bible_epub::{ConvertOptions, SourceData, convert_to_writer};
//! use bible_epub::source::{BookNameRecord, VerseRecord};
//! use std::io::Cursor;
//!
//! let data = SourceData::new(
//!     vec![VerseRecord::new(1, 1, 1, "In the beginning God created the heaven and the earth.")],
//!     vec![BookNameRecord::new(1, "Genesis")],
//! );
//! let mut out = Cursor::new(Vec::new());
//! let report = convert_to_writer(data, &ConvertOptions::new("KJV"), &mut out)?;
//! assert_eq!(report.verses, 1);
//! # Ok::<(), bible_epub::Error>(())
//! ```

pub mod convert;
pub mod diagnostics;
pub mod error;
pub mod export;
pub mod model;
pub mod source;
pub(crate) mod util;
pub mod xref;

pub use convert::{
    ConversionReport, ConvertOptions, build_package, convert_to_path, convert_to_writer,
    default_title,
};
pub use diagnostics::Diagnostics;
pub use error::{Error, Result};
pub use model::{Anchor, Bible, Book, Chapter, FragmentId, Locator, Verse};
pub use source::SourceData;
pub use xref::{CrossReference, XrefMap, XrefSource, XrefTarget};
