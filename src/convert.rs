//! The conversion pipeline.
//!
//! Stages run strictly in order: record model, cross-reference resolution,
//! fragment rendering, navigation, packaging. Fatal problems stop the run
//! immediately; data-quality problems are counted and reported at the end.

use std::borrow::Cow;
use std::io::{Seek, Write};
use std::path::Path;

use tracing::{info, warn};

use crate::diagnostics::Diagnostics;
use crate::error::Result;
use crate::export::{
    DEFAULT_LANGUAGE, EpubConfig, EpubExporter, FragmentBuilder, Metadata, Package,
    build_navigation,
};
use crate::model::Bible;
use crate::source::SourceData;
use crate::util::sanitize_xml_text;
use crate::xref;

/// Suffix MySword uses for Bible text modules.
const BIBLE_MODULE_SUFFIX: &str = ".bbl.mybible";

/// Options for one conversion run.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub title: String,
    /// Overrides the language declared by the sources.
    pub language: Option<String>,
    /// Overrides the content-derived package identifier.
    pub identifier: Option<String>,
    pub epub: EpubConfig,
}

impl ConvertOptions {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            language: None,
            identifier: None,
            epub: EpubConfig::default(),
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.epub.compression_level = Some(level);
        self
    }
}

/// Summary of a successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionReport {
    pub books: usize,
    pub chapters: usize,
    pub verses: usize,
    /// Verses carrying at least one cross-reference marker.
    pub cross_referenced_verses: usize,
    pub cross_reference_links: usize,
    pub diagnostics: Diagnostics,
}

/// Title derived from the Bible module file name: `KJV.bbl.mybible` → `KJV`,
/// `kjv.sqlite` → `kjv`.
pub fn default_title(bible_path: &Path) -> String {
    let file_name = bible_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if let Some(stem) = file_name.strip_suffix(BIBLE_MODULE_SUFFIX)
        && !stem.is_empty()
    {
        return stem.to_string();
    }
    bible_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or(file_name)
}

/// Run every stage up to (but not including) writing the container.
pub fn build_package(data: SourceData, options: &ConvertOptions) -> Result<(Package, ConversionReport)> {
    let mut diagnostics = Diagnostics::new();

    let bible = Bible::from_records(data.verses, &data.book_names, &mut diagnostics)?;
    info!(
        books = bible.books().len(),
        chapters = bible.chapter_count(),
        verses = bible.verse_count(),
        "record model built"
    );

    let xrefs = xref::resolve(&data.cross_references, &bible.anchors(), &mut diagnostics);
    if !xrefs.is_empty() {
        info!(verses = xrefs.len(), links = xrefs.link_count(), "cross-references resolved");
    }

    let fragments = FragmentBuilder::new(&bible, &xrefs).build_all(&mut diagnostics);
    let navigation = build_navigation(&bible);

    let language = options
        .language
        .clone()
        .or(data.language)
        .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());
    let title = sanitize_metadata("title", &options.title, &mut diagnostics);
    let language = sanitize_metadata("language", &language, &mut diagnostics);
    let mut metadata = Metadata::new(title).with_language(language);
    if let Some(ref identifier) = options.identifier {
        metadata = metadata.with_identifier(sanitize_metadata("identifier", identifier, &mut diagnostics));
    }

    let report = ConversionReport {
        books: bible.books().len(),
        chapters: fragments.len(),
        verses: bible.verse_count(),
        cross_referenced_verses: xrefs.len(),
        cross_reference_links: xrefs.link_count(),
        diagnostics,
    };
    Ok((Package::new(metadata, navigation, fragments), report))
}

fn sanitize_metadata(field: &str, value: &str, diagnostics: &mut Diagnostics) -> String {
    let sanitized = sanitize_xml_text(value);
    if let Cow::Owned(_) = sanitized {
        warn!(field = %field, "metadata contains characters XML cannot carry, replacing them");
        diagnostics.sanitized_names += 1;
    }
    sanitized.into_owned()
}

/// Convert and write the EPUB to any `Write + Seek` destination.
pub fn convert_to_writer<W: Write + Seek>(
    data: SourceData,
    options: &ConvertOptions,
    writer: &mut W,
) -> Result<ConversionReport> {
    let (package, report) = build_package(data, options)?;
    EpubExporter::new()
        .with_config(options.epub.clone())
        .export(&package, writer)?;
    Ok(report)
}

/// Convert and write the EPUB to `path`, replacing it only on success.
pub fn convert_to_path(
    data: SourceData,
    options: &ConvertOptions,
    path: &Path,
) -> Result<ConversionReport> {
    let (package, report) = build_package(data, options)?;
    EpubExporter::new()
        .with_config(options.epub.clone())
        .export_to_path(&package, path)?;
    info!(path = %path.display(), "EPUB written");
    Ok(report)
}
