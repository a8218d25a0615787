//! EPUB package assembly.
//!
//! Writes `mimetype`, `META-INF/container.xml`, the OPF package document,
//! the NCX table of contents, the stylesheet and every chapter fragment into
//! a single EPUB 2 container.

use std::collections::HashSet;
use std::fs;
use std::io::{Seek, Write};
use std::path::Path;

use tracing::debug;
use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use super::fragment::Fragment;
use super::nav::{Navigation, TocEntry};
use super::{STYLESHEET, STYLESHEET_HREF, verify};
use crate::error::{Error, Result};
use crate::util::escape_xml;

/// Language used when neither the caller nor the sources supply one.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Configuration for EPUB packaging.
#[derive(Debug, Clone, Default)]
pub struct EpubConfig {
    /// Compression level for deflate (0-9, default 6).
    pub compression_level: Option<u32>,
}

/// Package-level metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub title: String,
    pub language: String,
    /// Unique identifier; derived from the content when `None`.
    pub identifier: Option<String>,
}

impl Metadata {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            language: DEFAULT_LANGUAGE.to_string(),
            identifier: None,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }
}

/// Everything that goes into one EPUB file.
#[derive(Debug, Clone)]
pub struct Package {
    pub metadata: Metadata,
    pub navigation: Navigation,
    pub fragments: Vec<Fragment>,
}

impl Package {
    pub fn new(metadata: Metadata, navigation: Navigation, fragments: Vec<Fragment>) -> Self {
        Self {
            metadata,
            navigation,
            fragments,
        }
    }

    /// The identifier written to the OPF and NCX.
    ///
    /// Unless one was supplied, this is a name-based UUID over the title,
    /// language and every fragment, so identical inputs give identical output.
    pub fn identifier(&self) -> String {
        if let Some(ref id) = self.metadata.identifier {
            return id.clone();
        }
        let mut hasher = sha1_smol::Sha1::new();
        hasher.update(self.metadata.title.as_bytes());
        hasher.update(&[0]);
        hasher.update(self.metadata.language.as_bytes());
        for fragment in &self.fragments {
            hasher.update(&[0]);
            hasher.update(fragment.document.as_bytes());
        }
        let digest = hasher.digest().bytes();

        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest[..16]);
        // Version 5 (name-based, SHA-1), RFC 4122 variant
        bytes[6] = (bytes[6] & 0x0f) | 0x50;
        bytes[8] = (bytes[8] & 0x3f) | 0x80;

        let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
        format!(
            "urn:uuid:{}-{}-{}-{}-{}",
            &hex[0..8],
            &hex[8..12],
            &hex[12..16],
            &hex[16..20],
            &hex[20..32]
        )
    }
}

/// Check that navigation and fragments match one-to-one.
///
/// Every fragment needs exactly one chapter entry, and every entry must point
/// at a fragment that exists. A mismatch is a builder defect, so it is
/// reported rather than repaired.
pub fn check_integrity(navigation: &Navigation, fragments: &[Fragment]) -> Result<()> {
    let mut fragment_ids = HashSet::with_capacity(fragments.len());
    for fragment in fragments {
        if !fragment_ids.insert(fragment.id) {
            return Err(Error::NavigationIntegrity(format!(
                "fragment {} produced twice",
                fragment.id.file_name()
            )));
        }
    }

    let mut covered = HashSet::with_capacity(fragments.len());
    for book in &navigation.entries {
        if !fragment_ids.contains(&book.target) {
            return Err(Error::NavigationIntegrity(format!(
                "book entry {:?} points at missing fragment {}",
                book.title,
                book.target.file_name()
            )));
        }
    }
    for entry in navigation.chapter_entries() {
        if !fragment_ids.contains(&entry.target) {
            return Err(Error::NavigationIntegrity(format!(
                "chapter entry {:?} points at missing fragment {}",
                entry.title,
                entry.target.file_name()
            )));
        }
        if entry.href != entry.target.entry_href() {
            return Err(Error::NavigationIntegrity(format!(
                "chapter entry {:?} href {:?} does not match fragment {}",
                entry.title,
                entry.href,
                entry.target.file_name()
            )));
        }
        if !covered.insert(entry.target) {
            return Err(Error::NavigationIntegrity(format!(
                "fragment {} has more than one navigation entry",
                entry.target.file_name()
            )));
        }
    }

    if let Some(orphan) = fragments.iter().find(|f| !covered.contains(&f.id)) {
        return Err(Error::NavigationIntegrity(format!(
            "fragment {} has no navigation entry",
            orphan.id.file_name()
        )));
    }
    Ok(())
}

/// EPUB format exporter.
///
/// # Example
///
/// ```no_run
/// use bible_epub::export::{EpubExporter, Metadata, Navigation, Package};
/// use std::fs::File;
///
/// let package = Package::new(Metadata::new("KJV"), Navigation::default(), Vec::new());
/// let mut file = File::create("output.epub")?;
/// EpubExporter::new().export(&package, &mut file)?;
/// # Ok::<(), bible_epub::Error>(())
/// ```
pub struct EpubExporter {
    config: EpubConfig,
}

impl EpubExporter {
    /// Create a new exporter with default configuration.
    pub fn new() -> Self {
        Self {
            config: EpubConfig::default(),
        }
    }

    /// Configure the exporter with custom settings.
    pub fn with_config(mut self, config: EpubConfig) -> Self {
        self.config = config;
        self
    }

    /// Validate the package and write it to `writer`.
    pub fn export<W: Write + Seek>(&self, package: &Package, writer: &mut W) -> Result<()> {
        check_integrity(&package.navigation, &package.fragments)?;
        let links = verify::verify_package(&package.fragments, &package.navigation)?;
        debug!(links = links.link_count(), "all internal links resolve");

        let identifier = package.identifier();
        let opf = generate_opf(&package.metadata, &identifier, &package.fragments);
        let ncx = generate_ncx(&package.metadata, &identifier, &package.navigation);
        verify::check_xml_chars("content.opf", &opf)?;
        verify::check_xml_chars("toc.ncx", &ncx)?;

        let mut zip = ZipWriter::new(writer);

        let compression_level = self.config.compression_level.unwrap_or(6).min(9);
        // Fixed timestamps keep output byte-identical across runs.
        let stored = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Stored)
            .last_modified_time(zip::DateTime::default());
        let deflated = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(compression_level as i64))
            .last_modified_time(zip::DateTime::default());

        // 1. Write mimetype (must be first, uncompressed)
        zip.start_file("mimetype", stored)?;
        zip.write_all(b"application/epub+zip")?;

        // 2. Write container.xml
        zip.start_file("META-INF/container.xml", deflated)?;
        zip.write_all(CONTAINER_XML)?;

        // 3. Write content.opf
        zip.start_file("OEBPS/content.opf", deflated)?;
        zip.write_all(opf.as_bytes())?;

        // 4. Write toc.ncx
        zip.start_file("OEBPS/toc.ncx", deflated)?;
        zip.write_all(ncx.as_bytes())?;

        // 5. Write stylesheet
        zip.start_file(format!("OEBPS/{STYLESHEET_HREF}"), deflated)?;
        zip.write_all(STYLESHEET.as_bytes())?;

        // 6. Write chapters
        for fragment in &package.fragments {
            zip.start_file(format!("OEBPS/{}", fragment.id.file_name()), deflated)?;
            zip.write_all(fragment.document.as_bytes())?;
        }

        zip.finish()?;
        Ok(())
    }

    /// Write the package to `path` atomically.
    ///
    /// The archive is built in a temporary file next to `path` and renamed
    /// into place only once complete. On failure the temporary file is
    /// removed and any existing file at `path` is left as it was.
    pub fn export_to_path(&self, package: &Package, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        if path.is_dir() {
            return Err(Error::Packaging(format!("output path {path:?} is a directory")));
        }

        let mut temp = tempfile::Builder::new()
            .prefix(".bible-epub-")
            .suffix(".tmp")
            .tempfile_in(dir)?;
        self.export(package, temp.as_file_mut())?;
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| Error::Io(e.error))?;

        debug!(path = %path.display(), bytes = fs::metadata(path)?.len(), "package written");
        Ok(())
    }
}

impl Default for EpubExporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Container.xml template.
const CONTAINER_XML: &[u8] = br#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#;

/// Generate content.opf from metadata and fragments.
fn generate_opf(metadata: &Metadata, identifier: &str, fragments: &[Fragment]) -> String {
    let mut opf = String::new();

    opf.push_str(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="2.0" unique-identifier="BookId">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:opf="http://www.idpf.org/2007/opf">
"#,
    );
    opf.push_str(&format!(
        "    <dc:title>{}</dc:title>\n",
        escape_xml(&metadata.title)
    ));
    opf.push_str(&format!(
        "    <dc:language>{}</dc:language>\n",
        escape_xml(&metadata.language)
    ));
    opf.push_str(&format!(
        "    <dc:identifier id=\"BookId\">{}</dc:identifier>\n",
        escape_xml(identifier)
    ));
    opf.push_str("  </metadata>\n");

    // Manifest
    opf.push_str("  <manifest>\n");
    opf.push_str(
        "    <item id=\"ncx\" href=\"toc.ncx\" media-type=\"application/x-dtbncx+xml\"/>\n",
    );
    opf.push_str(&format!(
        "    <item id=\"css\" href=\"{STYLESHEET_HREF}\" media-type=\"text/css\"/>\n"
    ));
    for fragment in fragments {
        opf.push_str(&format!(
            "    <item id=\"{}\" href=\"{}\" media-type=\"application/xhtml+xml\"/>\n",
            fragment.id.manifest_id(),
            fragment.id.file_name()
        ));
    }
    opf.push_str("  </manifest>\n");

    // Spine
    opf.push_str("  <spine toc=\"ncx\">\n");
    for fragment in fragments {
        opf.push_str(&format!(
            "    <itemref idref=\"{}\"/>\n",
            fragment.id.manifest_id()
        ));
    }
    opf.push_str("  </spine>\n");

    opf.push_str("</package>\n");
    opf
}

/// Generate toc.ncx from the navigation map.
fn generate_ncx(metadata: &Metadata, identifier: &str, navigation: &Navigation) -> String {
    let mut ncx = String::new();

    ncx.push_str(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE ncx PUBLIC "-//NISO//DTD ncx 2005-1//EN" "http://www.daisy.org/z3986/2005/ncx-2005-1.dtd">
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head>
    <meta name="dtb:uid" content=""#,
    );
    ncx.push_str(&escape_xml(identifier));
    ncx.push_str(
        r#""/>
    <meta name="dtb:depth" content="2"/>
    <meta name="dtb:totalPageCount" content="0"/>
    <meta name="dtb:maxPageNumber" content="0"/>
  </head>
  <docTitle>
    <text>"#,
    );
    ncx.push_str(&escape_xml(&metadata.title));
    ncx.push_str(
        r#"</text>
  </docTitle>
  <navMap>
"#,
    );

    let mut play_order = 1;
    write_nav_points(&mut ncx, &navigation.entries, None, &mut play_order, 2);

    ncx.push_str("  </navMap>\n</ncx>\n");
    ncx
}

/// Recursively write navPoint elements.
///
/// Chapter labels are bare numbers in the navigation map; the NCX prefixes
/// them with the book title so flat reader menus stay readable.
fn write_nav_points(
    ncx: &mut String,
    entries: &[TocEntry],
    parent: Option<&str>,
    play_order: &mut usize,
    indent: usize,
) {
    let indent_str = "  ".repeat(indent);

    for entry in entries {
        let label = match parent {
            Some(book) => format!("{} {}", book, entry.title),
            None => entry.title.clone(),
        };
        let id = match parent {
            Some(_) => format!("nav-{}", entry.target.manifest_id()),
            None => format!("nav-b{}", entry.target.book),
        };
        ncx.push_str(&format!(
            "{}<navPoint id=\"{}\" playOrder=\"{}\">\n",
            indent_str, id, play_order
        ));
        ncx.push_str(&format!(
            "{}  <navLabel><text>{}</text></navLabel>\n",
            indent_str,
            escape_xml(&label)
        ));
        ncx.push_str(&format!(
            "{}  <content src=\"{}\"/>\n",
            indent_str,
            escape_xml(&entry.href)
        ));

        *play_order += 1;

        if !entry.children.is_empty() {
            write_nav_points(ncx, &entry.children, Some(&entry.title), play_order, indent + 1);
        }

        ncx.push_str(&format!("{}</navPoint>\n", indent_str));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FragmentId;

    fn fragment(book: u32, chapter: u32) -> Fragment {
        let id = FragmentId::new(book, chapter);
        Fragment {
            id,
            title: format!("Book {book} {chapter}"),
            document: format!(
                "<html><body><h2 id=\"{}\">x</h2><p id=\"v{book}_{chapter}_1\">a</p></body></html>",
                id.entry_anchor()
            ),
            verse_count: 1,
            unrenderable_verses: 0,
        }
    }

    fn navigation(chapters: &[(u32, u32)]) -> Navigation {
        let mut entries: Vec<TocEntry> = Vec::new();
        for &(book, chapter) in chapters {
            let target = FragmentId::new(book, chapter);
            let child = TocEntry::new(chapter.to_string(), target.entry_href(), target);
            match entries.last_mut() {
                Some(last) if last.target.book == book => last.children.push(child),
                _ => entries.push(
                    TocEntry::new(format!("Book {book}"), target.file_name(), target).with_child(child),
                ),
            }
        }
        Navigation { entries }
    }

    #[test]
    fn test_integrity_accepts_matching_sets() {
        let fragments = vec![fragment(1, 1), fragment(1, 2), fragment(2, 1)];
        let nav = navigation(&[(1, 1), (1, 2), (2, 1)]);
        check_integrity(&nav, &fragments).unwrap();
    }

    #[test]
    fn test_integrity_rejects_orphan_fragment() {
        let fragments = vec![fragment(1, 1), fragment(1, 2)];
        let nav = navigation(&[(1, 1)]);
        let err = check_integrity(&nav, &fragments).unwrap_err();
        assert!(matches!(err, Error::NavigationIntegrity(msg) if msg.contains("b1c2.xhtml")));
    }

    #[test]
    fn test_integrity_rejects_missing_fragment() {
        let fragments = vec![fragment(1, 1)];
        let nav = navigation(&[(1, 1), (1, 2)]);
        assert!(matches!(
            check_integrity(&nav, &fragments),
            Err(Error::NavigationIntegrity(_))
        ));
    }

    #[test]
    fn test_integrity_rejects_duplicate_entry() {
        let fragments = vec![fragment(1, 1)];
        let nav = navigation(&[(1, 1), (1, 1)]);
        assert!(matches!(
            check_integrity(&nav, &fragments),
            Err(Error::NavigationIntegrity(_))
        ));
    }

    #[test]
    fn test_identifier_is_deterministic_uuid() {
        let package = Package::new(Metadata::new("KJV"), navigation(&[(1, 1)]), vec![fragment(1, 1)]);
        let id = package.identifier();
        assert_eq!(id, package.clone().identifier());
        assert!(id.starts_with("urn:uuid:"));
        assert_eq!(id.len(), "urn:uuid:".len() + 36);
        assert_eq!(&id[9 + 14..9 + 15], "5");

        let other = Package::new(Metadata::new("ASV"), navigation(&[(1, 1)]), vec![fragment(1, 1)]);
        assert_ne!(id, other.identifier());

        let fixed = Package::new(
            Metadata::new("KJV").with_identifier("urn:isbn:123"),
            Navigation::default(),
            Vec::new(),
        );
        assert_eq!(fixed.identifier(), "urn:isbn:123");
    }

    #[test]
    fn test_opf_lists_fragments_in_spine_order() {
        let fragments = vec![fragment(1, 1), fragment(1, 2)];
        let opf = generate_opf(&Metadata::new("A & B").with_language("de"), "urn:x", &fragments);
        assert!(opf.contains("<dc:title>A &amp; B</dc:title>"));
        assert!(opf.contains("<dc:language>de</dc:language>"));
        assert!(opf.contains("<item id=\"b1c2\" href=\"b1c2.xhtml\""));
        let first = opf.find("<itemref idref=\"b1c1\"/>").unwrap();
        let second = opf.find("<itemref idref=\"b1c2\"/>").unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_ncx_nests_chapters_under_books() {
        let nav = navigation(&[(1, 1), (1, 2)]);
        let ncx = generate_ncx(&Metadata::new("KJV"), "urn:x", &nav);
        assert!(ncx.contains("<navPoint id=\"nav-b1\" playOrder=\"1\">"));
        assert!(ncx.contains("<navPoint id=\"nav-b1c2\" playOrder=\"3\">"));
        assert!(ncx.contains("<text>Book 1 2</text>"));
        assert!(ncx.contains("<content src=\"b1c2.xhtml#c1_2\"/>"));
    }

    #[test]
    fn test_export_writes_mimetype_first() {
        let package = Package::new(Metadata::new("KJV"), navigation(&[(1, 1)]), vec![fragment(1, 1)]);
        let mut output = std::io::Cursor::new(Vec::new());
        EpubExporter::new().export(&package, &mut output).unwrap();

        let bytes = output.into_inner();
        // Local file header, then the stored mimetype entry name and content.
        assert_eq!(&bytes[..4], b"PK\x03\x04");
        assert_eq!(&bytes[30..38], b"mimetype");
        let extra_len = u16::from_le_bytes([bytes[28], bytes[29]]) as usize;
        let data = 38 + extra_len;
        assert_eq!(&bytes[data..data + 20], b"application/epub+zip");
    }

    #[test]
    fn test_export_rejects_forbidden_characters_in_metadata() {
        let package = Package::new(
            Metadata::new("K\u{1}JV"),
            navigation(&[(1, 1)]),
            vec![fragment(1, 1)],
        );
        let mut output = std::io::Cursor::new(Vec::new());
        let err = EpubExporter::new().export(&package, &mut output).unwrap_err();
        assert!(matches!(err, Error::Packaging(msg) if msg.contains("content.opf")));
        assert!(output.into_inner().is_empty());
    }
}
