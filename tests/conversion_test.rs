//! End-to-end conversion tests on in-memory sources.

use std::io::{Cursor, Read};

use bible_epub::export::{
    EpubExporter, Fragment, LinkIndex, Metadata, Navigation, Package, XREF_MARKER,
};
use bible_epub::source::{BookNameRecord, VerseRecord};
use bible_epub::{
    ConvertOptions, CrossReference, Error, Locator, SourceData, XrefSource, build_package,
    convert_to_path, convert_to_writer,
};
use zip::ZipArchive;

fn loc(book: u32, chapter: u32, verse: u32) -> Locator {
    Locator::new(book, chapter, verse)
}

/// 2 books, 1 chapter each, 3 verses each.
fn two_book_corpus() -> SourceData {
    SourceData::new(
        vec![
            VerseRecord::new(1, 1, 1, "In the beginning God created the heaven and the earth."),
            VerseRecord::new(1, 1, 2, "And the earth was without form, and void."),
            VerseRecord::new(1, 1, 3, "And God said, Let there be light: and there was light."),
            VerseRecord::new(2, 1, 1, "Now these are the names of the children of Israel."),
            VerseRecord::new(2, 1, 2, "Reuben, Simeon, Levi, and Judah,"),
            VerseRecord::new(2, 1, 3, "Issachar, Zebulun, and Benjamin,"),
        ],
        vec![
            BookNameRecord::new(1, "Genesis"),
            BookNameRecord::new(2, "Exodus"),
        ],
    )
}

/// A corpus with uneven chapters and verse counts.
fn irregular_corpus() -> SourceData {
    let mut verses = Vec::new();
    for (book, chapters) in [(1u32, &[5u32, 2, 7][..]), (19, &[1, 12]), (62, &[3])] {
        for (i, &count) in chapters.iter().enumerate() {
            for verse in 1..=count {
                verses.push(VerseRecord::new(
                    book,
                    i as u32 + 1,
                    verse,
                    format!("Verse {verse} of <FI>chapter<Fi> {}<WG{verse}>", i + 1),
                ));
            }
        }
    }
    // Book 62 has no name in the language source.
    SourceData::new(
        verses,
        vec![
            BookNameRecord::new(1, "Genesis"),
            BookNameRecord::new(19, "Psalms"),
        ],
    )
}

fn epub_bytes(data: SourceData) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    convert_to_writer(data, &ConvertOptions::new("Test Bible"), &mut out).expect("conversion");
    out.into_inner()
}

fn read_entry(archive: &mut ZipArchive<Cursor<Vec<u8>>>, name: &str) -> String {
    let mut file = archive.by_name(name).expect("entry exists");
    let mut content = String::new();
    file.read_to_string(&mut content).unwrap();
    content
}

fn fragment_names(archive: &ZipArchive<Cursor<Vec<u8>>>) -> Vec<String> {
    archive
        .file_names()
        .filter(|n| n.ends_with(".xhtml"))
        .map(str::to_string)
        .collect()
}

#[test]
fn test_two_book_scenario_with_one_cross_reference() {
    let data = two_book_corpus().with_cross_references(XrefSource::Present(vec![
        CrossReference::new(loc(1, 1, 1), loc(1, 1, 3)),
    ]));
    let (package, report) = build_package(data, &ConvertOptions::new("Test Bible")).unwrap();

    assert_eq!(package.navigation.entries.len(), 2);
    assert_eq!(package.fragments.len(), 2);
    assert_eq!(report.cross_reference_links, 1);
    assert!(report.diagnostics.is_clean());

    let markers: usize = package
        .fragments
        .iter()
        .map(|f| f.document.matches(XREF_MARKER).count())
        .sum();
    assert_eq!(markers, 1);

    let genesis = &package.fragments[0].document;
    let verse_one = genesis
        .lines()
        .find(|l| l.contains("id=\"v1_1_1\""))
        .expect("verse 1 rendered");
    assert!(verse_one.contains(XREF_MARKER));
    assert!(verse_one.contains("href=\"#n1_1_1\""));
    assert!(genesis.contains("<a href=\"b1c1.xhtml#v1_1_3\">Genesis 1:3</a>"));
}

#[test]
fn test_reference_to_missing_book_is_dropped() {
    let data = two_book_corpus().with_cross_references(XrefSource::Present(vec![
        CrossReference::new(loc(1, 1, 1), loc(3, 1, 1)),
    ]));
    let mut out = Cursor::new(Vec::new());
    let report = convert_to_writer(data, &ConvertOptions::new("Test Bible"), &mut out).unwrap();

    assert_eq!(report.diagnostics.unresolved_references, 1);
    assert_eq!(report.cross_reference_links, 0);

    let mut archive = ZipArchive::new(out).unwrap();
    for name in fragment_names(&archive) {
        let doc = read_entry(&mut archive, &name);
        assert!(!doc.contains("b3c1.xhtml"));
        assert!(!doc.contains(XREF_MARKER));
    }
}

#[test]
fn test_every_chapter_has_one_nav_entry_with_all_verses() {
    let data = irregular_corpus();
    let expected: Vec<(u32, u32, usize)> = vec![
        (1, 1, 5),
        (1, 2, 2),
        (1, 3, 7),
        (19, 1, 1),
        (19, 2, 12),
        (62, 1, 3),
    ];
    let bytes = epub_bytes(data);
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();

    let ncx = read_entry(&mut archive, "OEBPS/toc.ncx");
    assert_eq!(fragment_names(&archive).len(), expected.len());

    for (book, chapter, verses) in expected {
        let src = format!("<content src=\"b{book}c{chapter}.xhtml#c{book}_{chapter}\"/>");
        assert_eq!(ncx.matches(&src).count(), 1, "one nav entry for {book}:{chapter}");

        let doc = read_entry(&mut archive, &format!("OEBPS/b{book}c{chapter}.xhtml"));
        assert_eq!(doc.matches("<p class=\"v\"").count(), verses);
        for verse in 1..=verses {
            assert!(doc.contains(&format!("id=\"v{book}_{chapter}_{verse}\"")));
        }
    }

    // Book 62 falls back to its short code.
    assert!(ncx.contains("<text>1John</text>"));
}

#[test]
fn test_spine_follows_canonical_order() {
    let bytes = epub_bytes(irregular_corpus());
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    let opf = read_entry(&mut archive, "OEBPS/content.opf");

    let order = ["b1c1", "b1c2", "b1c3", "b19c1", "b19c2", "b62c1"];
    let positions: Vec<usize> = order
        .iter()
        .map(|id| opf.find(&format!("<itemref idref=\"{id}\"/>")).expect("in spine"))
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_packaged_links_all_resolve() {
    let edges = vec![
        CrossReference::new(loc(1, 1, 1), loc(19, 2, 12)),
        CrossReference::new(loc(1, 1, 1), loc(62, 1, 1)),
        CrossReference::to_range(loc(19, 2, 3), loc(1, 3, 2), 5),
        CrossReference::new(loc(62, 1, 3), loc(1, 1, 99)),
    ];
    let data = irregular_corpus().with_cross_references(XrefSource::Present(edges));
    let (package, report) = build_package(data, &ConvertOptions::new("Test Bible")).unwrap();
    assert_eq!(report.cross_reference_links, 2 + 4);
    assert_eq!(report.diagnostics.unresolved_references, 1);

    let mut out = Cursor::new(Vec::new());
    EpubExporter::new().export(&package, &mut out).unwrap();
    let mut archive = ZipArchive::new(out).unwrap();

    // Rebuild fragments from the archive and check every link against it.
    let fragments: Vec<Fragment> = package
        .fragments
        .iter()
        .map(|f| Fragment {
            document: read_entry(&mut archive, &format!("OEBPS/{}", f.id.file_name())),
            ..f.clone()
        })
        .collect();
    let index = LinkIndex::build(&fragments).unwrap();
    index.check_links().unwrap();
    index.check_navigation(&package.navigation).unwrap();

    // Marker on the range source points at a note listing all four verses.
    let psalms = &fragments.iter().find(|f| f.id.book == 19 && f.id.chapter == 2).unwrap().document;
    assert!(psalms.contains("href=\"#n19_2_3\""));
    for verse in 2..=5 {
        assert!(psalms.contains(&format!("b1c3.xhtml#v1_3_{verse}")));
    }
}

#[test]
fn test_output_is_deterministic() {
    let edges = || {
        XrefSource::Present(vec![
            CrossReference::new(loc(1, 1, 2), loc(2, 1, 3)),
            CrossReference::new(loc(2, 1, 1), loc(1, 1, 1)),
        ])
    };
    let first = epub_bytes(two_book_corpus().with_cross_references(edges()));
    let second = epub_bytes(two_book_corpus().with_cross_references(edges()));
    assert_eq!(first, second);
}

#[test]
fn test_absent_xrefs_equal_empty_xrefs() {
    let absent = epub_bytes(two_book_corpus());
    let empty = epub_bytes(two_book_corpus().with_cross_references(XrefSource::Present(vec![])));
    assert_eq!(absent, empty);

    let mut archive = ZipArchive::new(Cursor::new(absent)).unwrap();
    for name in fragment_names(&archive) {
        let doc = read_entry(&mut archive, &name);
        assert!(!doc.contains(XREF_MARKER));
        assert!(!doc.contains("class=\"notes\""));
    }
}

#[test]
fn test_container_layout() {
    let bytes = epub_bytes(two_book_corpus());
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();

    assert_eq!(archive.by_index(0).unwrap().name(), "mimetype");
    assert_eq!(read_entry(&mut archive, "mimetype"), "application/epub+zip");
    assert!(read_entry(&mut archive, "META-INF/container.xml").contains("OEBPS/content.opf"));

    let opf = read_entry(&mut archive, "OEBPS/content.opf");
    assert!(opf.contains("<dc:title>Test Bible</dc:title>"));
    assert!(opf.contains("<dc:language>en</dc:language>"));
    assert!(opf.contains("<dc:identifier id=\"BookId\">urn:uuid:"));
    assert!(opf.contains("href=\"styles.css\""));
    assert!(!read_entry(&mut archive, "OEBPS/styles.css").is_empty());
}

#[test]
fn test_control_characters_in_book_names_never_reach_the_archive() {
    let data = SourceData::new(
        vec![
            VerseRecord::new(1, 1, 1, "In the beginning"),
            VerseRecord::new(1, 1, 2, "And the earth"),
        ],
        vec![BookNameRecord::new(1, "Gen\u{1}esis")],
    )
    .with_cross_references(XrefSource::Present(vec![CrossReference::new(
        loc(1, 1, 1),
        loc(1, 1, 2),
    )]));
    let mut out = Cursor::new(Vec::new());
    let report = convert_to_writer(data, &ConvertOptions::new("Test Bible"), &mut out).unwrap();
    assert_eq!(report.diagnostics.sanitized_names, 1);

    let mut archive = ZipArchive::new(out).unwrap();
    let names: Vec<String> = archive.file_names().map(str::to_string).collect();
    for name in names {
        assert!(!read_entry(&mut archive, &name).contains('\u{1}'), "{name}");
    }
    let genesis = read_entry(&mut archive, "OEBPS/b1c1.xhtml");
    assert!(genesis.contains("Gen\u{FFFD}esis 1:2"));
    assert!(read_entry(&mut archive, "OEBPS/toc.ncx").contains("<text>Gen\u{FFFD}esis</text>"));
}

#[test]
fn test_malformed_source_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.epub");

    let data = SourceData::new(vec![VerseRecord::new(1, 1, 1, "<CM>")], vec![]);
    let err = convert_to_path(data, &ConvertOptions::new("T"), &path).unwrap_err();
    assert!(matches!(err, Error::MalformedSource(_)));
    assert_eq!(err.stage(), "record model");
    assert!(!path.exists());
}

#[test]
fn test_failed_packaging_keeps_previous_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.epub");
    std::fs::write(&path, b"previous").unwrap();

    let (package, _) = build_package(two_book_corpus(), &ConvertOptions::new("T")).unwrap();
    // Drop a fragment so navigation no longer matches.
    let broken = Package::new(
        Metadata::new("T"),
        package.navigation.clone(),
        package.fragments[..1].to_vec(),
    );
    let err = EpubExporter::new().export_to_path(&broken, &path).unwrap_err();
    assert!(matches!(err, Error::NavigationIntegrity(_)));
    assert_eq!(err.stage(), "navigation");

    assert_eq!(std::fs::read(&path).unwrap(), b"previous");
    let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
    assert_eq!(leftovers, 1, "temporary file cleaned up");

    // A good package replaces the old file.
    EpubExporter::new().export_to_path(&package, &path).unwrap();
    assert_eq!(&std::fs::read(&path).unwrap()[..2], b"PK");
}

#[test]
fn test_empty_navigation_rejected_for_nonempty_fragments() {
    let (package, _) = build_package(two_book_corpus(), &ConvertOptions::new("T")).unwrap();
    let broken = Package::new(Metadata::new("T"), Navigation::default(), package.fragments);
    let mut out = Cursor::new(Vec::new());
    assert!(matches!(
        EpubExporter::new().export(&broken, &mut out),
        Err(Error::NavigationIntegrity(_))
    ));
}
