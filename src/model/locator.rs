//! Locators and the identifiers derived from them.
//!
//! Every identifier in the package is a pure function of a locator, so any
//! stage can address a verse or chapter without a registry:
//!
//! | What                | Derived from        | Example        |
//! |---------------------|---------------------|----------------|
//! | verse anchor        | book, chapter, verse | `v1_2_3`      |
//! | marker anchor       | book, chapter, verse | `m1_2_3`      |
//! | note anchor         | book, chapter, verse | `n1_2_3`      |
//! | fragment file       | book, chapter       | `b1c2.xhtml`   |
//! | chapter entry anchor | book, chapter      | `c1_2`         |

use std::fmt;

/// A (book, chapter, verse) triple identifying one verse.
///
/// Ordering is canonical reading order: book ordinal, then chapter, then verse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Locator {
    pub book: u32,
    pub chapter: u32,
    pub verse: u32,
}

impl Locator {
    pub const fn new(book: u32, chapter: u32, verse: u32) -> Self {
        Self {
            book,
            chapter,
            verse,
        }
    }

    /// The anchor placed on this verse.
    pub fn anchor(self) -> Anchor {
        Anchor(self)
    }

    /// The fragment (chapter document) containing this verse.
    pub fn fragment(self) -> FragmentId {
        FragmentId::new(self.book, self.chapter)
    }

    /// Same book and chapter, different verse.
    pub fn with_verse(self, verse: u32) -> Self {
        Self { verse, ..self }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.book, self.chapter, self.verse)
    }
}

/// Link target for a single verse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Anchor(Locator);

impl Anchor {
    pub fn locator(self) -> Locator {
        self.0
    }

    /// Element id of the verse.
    pub fn id(self) -> String {
        self.prefixed('v')
    }

    /// Element id of the cross-reference marker on the verse.
    pub fn marker_id(self) -> String {
        self.prefixed('m')
    }

    /// Element id of the note listing the verse's cross-references.
    pub fn note_id(self) -> String {
        self.prefixed('n')
    }

    /// Package-relative href to the verse.
    pub fn href(self) -> String {
        format!("{}#{}", self.0.fragment().file_name(), self.id())
    }

    fn prefixed(self, prefix: char) -> String {
        let Locator {
            book,
            chapter,
            verse,
        } = self.0;
        format!("{prefix}{book}_{chapter}_{verse}")
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}

/// Identifies one chapter's content fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FragmentId {
    pub book: u32,
    pub chapter: u32,
}

impl FragmentId {
    pub const fn new(book: u32, chapter: u32) -> Self {
        Self { book, chapter }
    }

    /// File name inside `OEBPS/`.
    pub fn file_name(self) -> String {
        format!("b{}c{}.xhtml", self.book, self.chapter)
    }

    /// Manifest item id.
    pub fn manifest_id(self) -> String {
        format!("b{}c{}", self.book, self.chapter)
    }

    /// Element id of the chapter heading.
    pub fn entry_anchor(self) -> String {
        format!("c{}_{}", self.book, self.chapter)
    }

    /// Href of the chapter heading, used by navigation entries.
    pub fn entry_href(self) -> String {
        format!("{}#{}", self.file_name(), self.entry_anchor())
    }
}
