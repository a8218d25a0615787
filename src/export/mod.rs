//! Document assembly: chapter fragments, navigation and the EPUB package.
//!
//! # Architecture
//!
//! - [`FragmentBuilder`] renders one XHTML document per chapter
//! - [`build_navigation`] derives the book → chapter table of contents
//! - [`EpubExporter`] checks navigation/fragment integrity, verifies every
//!   internal link, and writes the container
//!
//! All identifiers are derived from locators, so the stages never share a
//! registry.

mod fragment;
mod nav;
mod package;
mod verify;

pub use fragment::{Fragment, FragmentBuilder, XREF_MARKER, book_top_anchor};
pub use nav::{Navigation, TocEntry, build_navigation};
pub use package::{
    DEFAULT_LANGUAGE, EpubConfig, EpubExporter, Metadata, Package, check_integrity,
};
pub use verify::{LinkIndex, verify_package};

/// Stylesheet shared by every fragment.
pub const STYLESHEET: &str = include_str!("styles.css");

/// Href of the stylesheet, relative to the fragments.
pub const STYLESHEET_HREF: &str = "styles.css";
