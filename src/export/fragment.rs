//! Chapter fragments: one XHTML document per chapter.
//!
//! Each verse is a paragraph carrying its anchor id. Verses with resolved
//! cross-references get a superscript marker linking to a note at the end
//! of the chapter; the note lists the targets as jump links.

use std::fmt::Write;

use tracing::warn;

use crate::diagnostics::Diagnostics;
use crate::model::{Bible, Book, Chapter, FragmentId, Verse};
use crate::util::escape_xml;
use crate::xref::XrefMap;

/// Marker shown after a verse that has cross-references.
pub const XREF_MARKER: &str = "\u{2297}";

/// A rendered chapter document.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub id: FragmentId,
    /// Document title, e.g. `Genesis 1`.
    pub title: String,
    pub document: String,
    pub verse_count: usize,
    /// Verses that fell back to plain text.
    pub unrenderable_verses: usize,
}

/// Renders chapters against a resolved cross-reference map.
///
/// Building one chapter reads only the model and the map, so chapters can be
/// rendered in any order.
pub struct FragmentBuilder<'a> {
    bible: &'a Bible,
    xrefs: &'a XrefMap,
    stylesheet_href: &'a str,
}

impl<'a> FragmentBuilder<'a> {
    pub fn new(bible: &'a Bible, xrefs: &'a XrefMap) -> Self {
        Self {
            bible,
            xrefs,
            stylesheet_href: super::STYLESHEET_HREF,
        }
    }

    /// Render every chapter in canonical order.
    pub fn build_all(&self, diagnostics: &mut Diagnostics) -> Vec<Fragment> {
        let fragments: Vec<Fragment> = self
            .bible
            .chapters()
            .map(|(book, chapter)| self.build_chapter(book, chapter))
            .collect();
        diagnostics.unrenderable_verses += fragments.iter().map(|f| f.unrenderable_verses).sum::<usize>();
        fragments
    }

    /// Render a single chapter.
    pub fn build_chapter(&self, book: &Book, chapter: &Chapter) -> Fragment {
        let id = chapter.fragment();
        let title = format!("{} {}", book.name, chapter.number);
        let first_chapter = book.chapters.first().map(Chapter::fragment).unwrap_or(id);
        let book_top = book_top_anchor(book.ordinal);

        let mut doc = String::new();
        doc.push_str(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.1//EN" "http://www.w3.org/TR/xhtml11/DTD/xhtml11.dtd">
<html xmlns="http://www.w3.org/1999/xhtml">
<head>
  <meta http-equiv="Content-Type" content="application/xhtml+xml; charset=utf-8"/>
  <title>"#,
        );
        doc.push_str(&escape_xml(&title));
        doc.push_str("</title>\n");
        let _ = writeln!(
            doc,
            "  <link rel=\"stylesheet\" type=\"text/css\" href=\"{}\"/>",
            escape_xml(self.stylesheet_href)
        );
        doc.push_str("</head>\n<body>\n");

        // Book title and chapter grid open the book's first chapter.
        if id == first_chapter {
            let _ = writeln!(doc, "<h1 id=\"{}\">{}</h1>", book_top, escape_xml(&book.name));
            doc.push_str("<div class=\"c\">");
            for c in &book.chapters {
                let _ = write!(doc, "<a href=\"{}\">{}</a>", c.fragment().entry_href(), c.number);
            }
            doc.push_str("</div>\n");
        }

        let _ = writeln!(
            doc,
            "<h2 id=\"{}\">{} <a class=\"u\" href=\"{}#{}\">\u{2191}</a></h2>",
            id.entry_anchor(),
            escape_xml(&title),
            first_chapter.file_name(),
            book_top
        );

        let mut unrenderable_verses = 0;
        let mut notes = String::new();
        for verse in &chapter.verses {
            let text = match verse.text.to_xhtml() {
                Ok(text) => text,
                Err(invalid) => {
                    warn!(
                        verse = %verse.locator,
                        character = ?invalid.0,
                        "verse text is not valid XML, rendering as plain text"
                    );
                    unrenderable_verses += 1;
                    verse.text.to_plain_xhtml()
                }
            };

            let anchor = verse.anchor();
            let _ = write!(
                doc,
                "<p class=\"v\" id=\"{}\"><span class=\"n\">{}</span> {}",
                anchor.id(),
                verse.number(),
                text
            );
            if !self.xrefs.targets(anchor).is_empty() {
                let _ = write!(
                    doc,
                    "<sup><a class=\"x\" id=\"{}\" href=\"#{}\">{}</a></sup>",
                    anchor.marker_id(),
                    anchor.note_id(),
                    XREF_MARKER
                );
                self.write_note(&mut notes, chapter, verse);
            }
            doc.push_str("</p>\n");
        }

        if !notes.is_empty() {
            doc.push_str("<div class=\"notes\">\n");
            doc.push_str(&notes);
            doc.push_str("</div>\n");
        }

        doc.push_str("</body>\n</html>\n");

        Fragment {
            id,
            title,
            document: doc,
            verse_count: chapter.verses.len(),
            unrenderable_verses,
        }
    }

    fn write_note(&self, notes: &mut String, chapter: &Chapter, verse: &Verse) {
        let anchor = verse.anchor();
        let _ = write!(
            notes,
            "<p class=\"note\" id=\"{}\"><a class=\"back\" href=\"#{}\">{}:{}</a>",
            anchor.note_id(),
            anchor.marker_id(),
            chapter.number,
            verse.number()
        );
        for (i, target) in self.xrefs.targets(anchor).iter().enumerate() {
            notes.push_str(if i == 0 { " " } else { "; " });
            let _ = write!(
                notes,
                "<a href=\"{}\">{}</a>",
                target.href(),
                escape_xml(&self.bible.reference_label(target.locator()))
            );
        }
        notes.push_str("</p>\n");
    }
}

/// Element id of a book's title and chapter grid.
pub fn book_top_anchor(book: u32) -> String {
    format!("t{book}")
}
