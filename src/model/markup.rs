//! Verse text normalization.
//!
//! MySword modules embed formatting tags in verse text (`<FI>added<Fi>`,
//! `<WG3056>`, `<RF>note<Rf>`, ...). Normalization keeps the readable text,
//! turns added words into emphasis and drops everything else. The result is
//! a list of inline spans; XML escaping happens when the spans are rendered.

use memchr::memchr;

use crate::util::{escape_xml, is_xml_char, sanitize_xml_text};

/// A run of verse text.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Inline {
    Text(String),
    /// Words added by the translators, rendered in italics.
    Emphasis(String),
}

impl Inline {
    fn as_str(&self) -> &str {
        match self {
            Inline::Text(s) | Inline::Emphasis(s) => s,
        }
    }
}

/// Normalized verse text: trimmed, whitespace-collapsed, tag-free spans.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerseText {
    spans: Vec<Inline>,
}

/// Verse text contains a character XML 1.0 cannot carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidChar(pub char);

impl VerseText {
    /// Parse raw MySword verse text.
    pub fn parse(raw: &str) -> Self {
        let mut scanner = Scanner::default();
        let bytes = raw.as_bytes();
        let mut pos = 0;

        while pos < bytes.len() {
            let Some(open) = memchr(b'<', &bytes[pos..]).map(|i| pos + i) else {
                scanner.text(&raw[pos..]);
                break;
            };
            scanner.text(&raw[pos..open]);

            let Some(close) = memchr(b'>', &bytes[open + 1..]).map(|i| open + 1 + i) else {
                // Unterminated `<` is literal text.
                scanner.text(&raw[open..]);
                break;
            };
            scanner.tag(&raw[open + 1..close]);
            pos = close + 1;
        }

        Self {
            spans: collapse_whitespace(scanner.spans),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Text without markup.
    pub fn plain_text(&self) -> String {
        self.spans.iter().map(Inline::as_str).collect()
    }

    /// Render as minimal XHTML (escaped text, `<i>` for emphasis).
    pub fn to_xhtml(&self) -> Result<String, InvalidChar> {
        let mut out = String::new();
        for span in &self.spans {
            if let Some(c) = span.as_str().chars().find(|&c| !is_xml_char(c)) {
                return Err(InvalidChar(c));
            }
            match span {
                Inline::Text(s) => out.push_str(&escape_xml(s)),
                Inline::Emphasis(s) => {
                    out.push_str("<i>");
                    out.push_str(&escape_xml(s));
                    out.push_str("</i>");
                }
            }
        }
        Ok(out)
    }

    /// Render as escaped plain text, replacing characters XML cannot carry.
    pub fn to_plain_xhtml(&self) -> String {
        escape_xml(&sanitize_xml_text(&self.plain_text()))
    }
}

#[derive(Default)]
struct Scanner {
    spans: Vec<Inline>,
    emphasis: bool,
    /// Inside a translator note; text is discarded until it closes.
    in_note: bool,
}

impl Scanner {
    fn text(&mut self, s: &str) {
        if self.in_note || s.is_empty() {
            return;
        }
        match (self.spans.last_mut(), self.emphasis) {
            (Some(Inline::Emphasis(buf)), true) | (Some(Inline::Text(buf)), false) => {
                buf.push_str(s)
            }
            (_, true) => self.spans.push(Inline::Emphasis(s.to_string())),
            (_, false) => self.spans.push(Inline::Text(s.to_string())),
        }
    }

    /// Tag names match case-insensitively. `FI`/`RF` open and `Fi`/`Rf`
    /// close; any other casing (`fi`, `rf`) toggles.
    fn tag(&mut self, content: &str) {
        let name = content.split_whitespace().next().unwrap_or("");
        match name {
            "RF" => self.in_note = true,
            "Rf" => self.in_note = false,
            n if n.eq_ignore_ascii_case("/rf") => self.in_note = false,
            n if n.eq_ignore_ascii_case("rf") => self.in_note = !self.in_note,
            _ if self.in_note => {}
            "FI" => self.emphasis = true,
            "Fi" => self.emphasis = false,
            n if n.eq_ignore_ascii_case("/fi") => self.emphasis = false,
            n if n.eq_ignore_ascii_case("fi") => self.emphasis = !self.emphasis,
            // Everything else (CM, FR/Fr, FU/Fu, TS, Q, E, X, WG#, WH#, WT#,
            // RX#, PF#, PI#, unknown) is dropped; enclosed text is kept.
            _ => {}
        }
    }
}

fn collapse_whitespace(spans: Vec<Inline>) -> Vec<Inline> {
    let mut out: Vec<Inline> = Vec::with_capacity(spans.len());
    let mut pending_space = false;
    let mut started = false;

    for span in spans {
        let emphasis = matches!(span, Inline::Emphasis(_));
        let mut buf = String::with_capacity(span.as_str().len());
        for c in span.as_str().chars() {
            if c.is_whitespace() {
                pending_space = true;
                continue;
            }
            if pending_space && started {
                // A space between spans stays outside the emphasis.
                match out.last_mut() {
                    Some(Inline::Text(prev)) if buf.is_empty() => prev.push(' '),
                    _ => buf.push(' '),
                }
            }
            pending_space = false;
            started = true;
            buf.push(c);
        }
        if buf.is_empty() {
            continue;
        }
        match (out.last_mut(), emphasis) {
            (Some(Inline::Emphasis(prev)), true) | (Some(Inline::Text(prev)), false) => {
                prev.push_str(&buf)
            }
            (_, true) => out.push(Inline::Emphasis(buf)),
            (_, false) => out.push(Inline::Text(buf)),
        }
    }
    out
}
