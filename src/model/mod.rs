//! Record model: books, chapters and verses for one conversion run.
//!
//! The model is a strict tree (`Bible` → `Book` → `Chapter` → `Verse`).
//! Back-references are numeric: a chapter knows its book ordinal, a verse
//! knows its full [`Locator`]. Nothing is mutated after [`Bible::from_records`]
//! returns.

mod canon;
mod locator;
mod markup;

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::{debug, warn};

pub use canon::{default_code, format_book_name};
pub use locator::{Anchor, FragmentId, Locator};
pub use markup::{InvalidChar, VerseText};

use crate::diagnostics::Diagnostics;
use crate::error::{Error, Result};
use crate::source::{BookNameRecord, VerseRecord};
use crate::util::sanitize_xml_text;

/// The whole corpus, in canonical order.
#[derive(Debug, Clone)]
pub struct Bible {
    books: Vec<Book>,
}

#[derive(Debug, Clone)]
pub struct Book {
    pub ordinal: u32,
    pub code: String,
    pub name: String,
    pub chapters: Vec<Chapter>,
}

#[derive(Debug, Clone)]
pub struct Chapter {
    /// Ordinal of the owning book.
    pub book: u32,
    pub number: u32,
    pub verses: Vec<Verse>,
}

#[derive(Debug, Clone)]
pub struct Verse {
    pub locator: Locator,
    pub text: VerseText,
}

impl Verse {
    pub fn number(&self) -> u32 {
        self.locator.verse
    }

    pub fn anchor(&self) -> Anchor {
        self.locator.anchor()
    }
}

impl Chapter {
    pub fn fragment(&self) -> FragmentId {
        FragmentId::new(self.book, self.number)
    }
}

impl Book {
    pub fn chapter(&self, number: u32) -> Option<&Chapter> {
        self.chapters
            .binary_search_by_key(&number, |c| c.number)
            .ok()
            .map(|i| &self.chapters[i])
    }
}

impl Bible {
    /// Build the model from source rows.
    ///
    /// Rows may arrive in any order. Empty verses and chapter/verse 0 rows are
    /// skipped and counted; duplicate locators, zero books, or a chapter left
    /// with no verses fail with [`Error::MalformedSource`].
    pub fn from_records(
        verses: Vec<VerseRecord>,
        book_names: &[BookNameRecord],
        diagnostics: &mut Diagnostics,
    ) -> Result<Self> {
        // book -> chapter -> verse rows, ordered
        let mut tree: BTreeMap<u32, BTreeMap<u32, Vec<Verse>>> = BTreeMap::new();
        let mut seen: BTreeSet<Locator> = BTreeSet::new();

        let mut rows = verses;
        rows.sort_by_key(|r| Locator::new(r.book, r.chapter, r.verse));

        for row in rows {
            let locator = Locator::new(row.book, row.chapter, row.verse);
            if !seen.insert(locator) {
                return Err(Error::MalformedSource(format!(
                    "Bible text source has duplicate rows for {locator}"
                )));
            }
            if row.book == 0 || row.chapter == 0 || row.verse == 0 {
                debug!(%locator, "skipping introduction row");
                diagnostics.skipped_introductions += 1;
                continue;
            }

            let chapter = tree.entry(row.book).or_default().entry(row.chapter).or_default();
            let text = VerseText::parse(row.text.as_deref().unwrap_or(""));
            if text.is_empty() {
                debug!(%locator, "skipping empty verse");
                diagnostics.skipped_empty_verses += 1;
                continue;
            }
            chapter.push(Verse { locator, text });
        }

        if tree.is_empty() {
            return Err(Error::MalformedSource(
                "Bible text source contains no books".to_string(),
            ));
        }

        let names: HashMap<u32, &BookNameRecord> =
            book_names.iter().map(|r| (r.ordinal, r)).collect();

        let mut books = Vec::with_capacity(tree.len());
        for (ordinal, chapter_map) in tree {
            let record = names.get(&ordinal);
            let code = match record.and_then(|r| non_empty(r.abbreviation.as_deref())) {
                Some(abbreviation) => sanitize_name(ordinal, abbreviation, diagnostics),
                None => default_code(ordinal),
            };
            let name = match record.and_then(|r| non_empty(r.name.as_deref())) {
                Some(name) => format_book_name(&sanitize_name(ordinal, name, diagnostics)),
                None => {
                    warn!(book = ordinal, code = %code, "no book name in language source, using code");
                    diagnostics.fallback_book_names += 1;
                    code.clone()
                }
            };

            let mut chapters = Vec::with_capacity(chapter_map.len());
            let mut expected_chapter = 1;
            for (number, verses) in chapter_map {
                if verses.is_empty() {
                    return Err(Error::MalformedSource(format!(
                        "{name} {number} has no verses with text"
                    )));
                }
                if number != expected_chapter {
                    warn!(book = %name, chapter = number, expected = expected_chapter, "chapter numbering gap");
                    diagnostics.numbering_gaps += 1;
                }
                expected_chapter = number.saturating_add(1);

                let mut expected_verse = 1;
                for verse in &verses {
                    if verse.number() != expected_verse {
                        debug!(book = %name, chapter = number, verse = verse.number(), "verse numbering gap");
                        diagnostics.numbering_gaps += 1;
                    }
                    expected_verse = verse.number().saturating_add(1);
                }

                chapters.push(Chapter {
                    book: ordinal,
                    number,
                    verses,
                });
            }

            books.push(Book {
                ordinal,
                code,
                name,
                chapters,
            });
        }

        Ok(Self { books })
    }

    pub fn books(&self) -> &[Book] {
        &self.books
    }

    pub fn book(&self, ordinal: u32) -> Option<&Book> {
        self.books
            .binary_search_by_key(&ordinal, |b| b.ordinal)
            .ok()
            .map(|i| &self.books[i])
    }

    pub fn chapters(&self) -> impl Iterator<Item = (&Book, &Chapter)> {
        self.books
            .iter()
            .flat_map(|book| book.chapters.iter().map(move |chapter| (book, chapter)))
    }

    pub fn verses(&self) -> impl Iterator<Item = &Verse> {
        self.chapters().flat_map(|(_, chapter)| chapter.verses.iter())
    }

    pub fn chapter_count(&self) -> usize {
        self.books.iter().map(|b| b.chapters.len()).sum()
    }

    pub fn verse_count(&self) -> usize {
        self.chapters().map(|(_, c)| c.verses.len()).sum()
    }

    /// Every verse anchor in the corpus.
    pub fn anchors(&self) -> AnchorSet {
        AnchorSet {
            anchors: self.verses().map(Verse::anchor).collect(),
        }
    }

    /// Human-readable reference, e.g. `Genesis 1:3`.
    pub fn reference_label(&self, locator: Locator) -> String {
        let name = self
            .book(locator.book)
            .map(|b| b.name.clone())
            .unwrap_or_else(|| default_code(locator.book));
        format!("{} {}:{}", name, locator.chapter, locator.verse)
    }
}

/// The set of anchors that exist in the corpus.
#[derive(Debug, Clone, Default)]
pub struct AnchorSet {
    anchors: BTreeSet<Anchor>,
}

impl AnchorSet {
    pub fn contains(&self, anchor: Anchor) -> bool {
        self.anchors.contains(&anchor)
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    /// Highest verse number present in the given chapter.
    pub fn last_verse(&self, book: u32, chapter: u32) -> Option<u32> {
        let start = Locator::new(book, chapter, 0).anchor();
        let end = Locator::new(book, chapter, u32::MAX).anchor();
        self.anchors
            .range(start..=end)
            .next_back()
            .map(|a| a.locator().verse)
    }
}

impl FromIterator<Anchor> for AnchorSet {
    fn from_iter<T: IntoIterator<Item = Anchor>>(iter: T) -> Self {
        Self {
            anchors: iter.into_iter().collect(),
        }
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

/// Book names end up in every document; replace characters XML forbids.
fn sanitize_name(ordinal: u32, name: &str, diagnostics: &mut Diagnostics) -> String {
    let sanitized = sanitize_xml_text(name);
    if let Cow::Owned(_) = sanitized {
        warn!(book = ordinal, "book name contains characters XML cannot carry, replacing them");
        diagnostics.sanitized_names += 1;
    }
    sanitized.into_owned()
}
