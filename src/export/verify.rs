//! Link verification for generated packages.
//!
//! Parses every fragment with quick-xml, collecting element ids and link
//! targets, then checks that each internal link (and each navigation entry)
//! lands on an id that exists.

use std::collections::{HashMap, HashSet};

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::fragment::Fragment;
use super::nav::Navigation;
use crate::error::{Error, Result};
use crate::util::is_xml_char;

/// Ids and links found in the package's content documents.
#[derive(Debug, Default)]
pub struct LinkIndex {
    /// File name → ids defined in it.
    ids: HashMap<String, HashSet<String>>,
    /// (file containing the link, href) in document order.
    links: Vec<(String, String)>,
}

impl LinkIndex {
    /// Parse all fragments. Fails if any fragment is not well-formed XML.
    pub fn build(fragments: &[Fragment]) -> Result<Self> {
        let mut index = Self::default();
        for fragment in fragments {
            index.scan(&fragment.id.file_name(), &fragment.document)?;
        }
        Ok(index)
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Whether `href`, resolved relative to `from_file`, names an existing
    /// document (and element, when it has a fragment part).
    pub fn resolves(&self, from_file: &str, href: &str) -> bool {
        let (file, fragment) = match href.split_once('#') {
            Some((file, fragment)) => (file, Some(fragment)),
            None => (href, None),
        };
        let file = if file.is_empty() { from_file } else { file };
        match (self.ids.get(file), fragment) {
            (Some(ids), Some(fragment)) => ids.contains(fragment),
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    /// Check every link inside the fragments.
    pub fn check_links(&self) -> Result<()> {
        for (file, href) in &self.links {
            if !self.resolves(file, href) {
                return Err(Error::Packaging(format!(
                    "dangling link {href:?} in {file}"
                )));
            }
        }
        Ok(())
    }

    /// Check every navigation entry.
    pub fn check_navigation(&self, navigation: &Navigation) -> Result<()> {
        let entries = navigation
            .entries
            .iter()
            .chain(navigation.chapter_entries());
        for entry in entries {
            if !self.resolves("", &entry.href) {
                return Err(Error::Packaging(format!(
                    "navigation entry {:?} points at missing target {:?}",
                    entry.title, entry.href
                )));
            }
        }
        Ok(())
    }

    fn scan(&mut self, file: &str, document: &str) -> Result<()> {
        check_xml_chars(file, document)?;
        let ids = self.ids.entry(file.to_string()).or_default();
        let mut reader = Reader::from_str(document);
        reader.config_mut().trim_text(true);

        loop {
            match reader.read_event()? {
                Event::Start(e) | Event::Empty(e) => {
                    if let Some(id) = attribute(&e, b"id") {
                        if !ids.insert(id.clone()) {
                            return Err(Error::Packaging(format!(
                                "duplicate id {id:?} in {file}"
                            )));
                        }
                    }
                    if e.name().as_ref() == b"a"
                        && let Some(href) = attribute(&e, b"href")
                    {
                        self.links.push((file.to_string(), href));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }
        Ok(())
    }
}

/// Reject a document carrying characters XML 1.0 forbids. quick-xml
/// accepts them, so well-formedness alone does not catch them.
pub fn check_xml_chars(file: &str, document: &str) -> Result<()> {
    match document.char_indices().find(|&(_, c)| !is_xml_char(c)) {
        Some((offset, c)) => Err(Error::Packaging(format!(
            "character U+{:04X} at byte {offset} of {file} is not allowed in XML",
            c as u32
        ))),
        None => Ok(()),
    }
}

fn attribute(e: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == name)
        .map(|attr| String::from_utf8_lossy(&attr.value).into_owned())
}

/// Verify that the fragments are well-formed and every link resolves.
pub fn verify_package(fragments: &[Fragment], navigation: &Navigation) -> Result<LinkIndex> {
    let index = LinkIndex::build(fragments)?;
    index.check_links()?;
    index.check_navigation(navigation)?;
    Ok(index)
}
