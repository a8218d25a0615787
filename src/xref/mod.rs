//! Cross-reference resolution.
//!
//! Edges from the cross-reference source name verses by locator. Resolution
//! turns each edge into links between anchors that exist in the corpus,
//! dropping (and counting) anything that points nowhere.

use std::collections::BTreeMap;

use tracing::debug;

use crate::diagnostics::Diagnostics;
use crate::model::{Anchor, AnchorSet, Locator};

/// Where a cross-reference points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrefTarget {
    Verse(Locator),
    /// Verses `start.verse..=end_verse` of the start's chapter.
    Range { start: Locator, end_verse: u32 },
}

impl XrefTarget {
    /// Build a target from a start locator and optional range end.
    pub fn new(start: Locator, end_verse: Option<u32>) -> Self {
        match end_verse {
            Some(end) if end != start.verse => XrefTarget::Range {
                start,
                end_verse: end,
            },
            _ => XrefTarget::Verse(start),
        }
    }

    pub fn start(&self) -> Locator {
        match *self {
            XrefTarget::Verse(locator) | XrefTarget::Range { start: locator, .. } => locator,
        }
    }
}

/// A directional edge from one verse to another verse or range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrossReference {
    pub source: Locator,
    pub target: XrefTarget,
    /// Relevance weight from the source, if any. Not used for rendering.
    pub weight: Option<i64>,
}

impl CrossReference {
    pub fn new(source: Locator, target: Locator) -> Self {
        Self {
            source,
            target: XrefTarget::Verse(target),
            weight: None,
        }
    }

    pub fn to_range(source: Locator, start: Locator, end_verse: u32) -> Self {
        Self {
            source,
            target: XrefTarget::new(start, Some(end_verse)),
            weight: None,
        }
    }
}

/// The optional cross-reference input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum XrefSource {
    /// No source supplied; no cross-reference markup is produced.
    #[default]
    Absent,
    Present(Vec<CrossReference>),
}

/// Resolved links: source anchor → target anchors in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XrefMap {
    links: BTreeMap<Anchor, Vec<Anchor>>,
}

impl XrefMap {
    /// Targets for a verse; empty if it has none.
    pub fn targets(&self, source: Anchor) -> &[Anchor] {
        self.links.get(&source).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Number of source verses with at least one link.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Total number of links.
    pub fn link_count(&self) -> usize {
        self.links.values().map(Vec::len).sum()
    }
}

/// Resolve cross-references against the anchors that exist.
///
/// Unresolvable targets are dropped and counted in
/// `diagnostics.unresolved_references`. Range targets expand to one link per
/// verse; an inverted range collapses to its start verse. A range running
/// past the end of its chapter is clamped, and the overshoot counts as one
/// unresolved reference.
pub fn resolve(source: &XrefSource, anchors: &AnchorSet, diagnostics: &mut Diagnostics) -> XrefMap {
    let edges = match source {
        XrefSource::Absent => return XrefMap::default(),
        XrefSource::Present(edges) => edges,
    };

    let mut map = XrefMap::default();
    for edge in edges {
        let from = edge.source.anchor();
        if !anchors.contains(from) {
            debug!(source = %edge.source, "cross-reference source verse does not exist");
            diagnostics.unresolved_references += 1;
            continue;
        }

        let mut resolved = Vec::new();
        for locator in expand(&edge.target, anchors, diagnostics) {
            let anchor = locator.anchor();
            if anchors.contains(anchor) {
                resolved.push(anchor);
            } else {
                debug!(source = %edge.source, target = %locator, "dropping unresolved cross-reference");
                diagnostics.unresolved_references += 1;
            }
        }

        if !resolved.is_empty() {
            map.links.entry(from).or_default().extend(resolved);
        }
    }
    map
}

fn expand(target: &XrefTarget, anchors: &AnchorSet, diagnostics: &mut Diagnostics) -> Vec<Locator> {
    match *target {
        XrefTarget::Verse(locator) => vec![locator],
        XrefTarget::Range { start, end_verse } if end_verse < start.verse => vec![start],
        XrefTarget::Range { start, end_verse } => {
            let Some(last) = anchors.last_verse(start.book, start.chapter) else {
                // Chapter does not exist: the whole range is one dangling target.
                return vec![start];
            };
            if start.verse > last {
                return vec![start];
            }
            let end = if end_verse > last {
                debug!(start = %start, end_verse, last, "clamping cross-reference range to chapter end");
                diagnostics.unresolved_references += 1;
                last
            } else {
                end_verse
            };
            (start.verse..=end).map(|v| start.with_verse(v)).collect()
        }
    }
}
