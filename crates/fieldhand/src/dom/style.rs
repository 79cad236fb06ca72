// ABOUTME: Minimal stylesheet model answering "what is the computed content of ::before/::after".
// ABOUTME: Parses <style> blocks and linked CSS, keeping only generated-content rules with specificity.

//! Generated-content resolution.
//!
//! Pages that want to keep contact details away from scrapers often render
//! them through CSS (`content: attr(data-phone)` on a `::before`). This module
//! keeps just enough of the cascade to answer what a browser would report as
//! the computed `content` of an element's pseudo-elements:
//!
//! - Only rules whose selector ends in a `::before`/`::after` pseudo-element
//!   and that declare `content` are kept.
//! - `@media`/`@supports`/`@layer` blocks are descended into, other at-rules
//!   are skipped.
//! - The winning rule is the matching one with the highest specificity, later
//!   rules winning ties.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::trace;

static COMMENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)/\*.*?\*/").unwrap());

/// The pseudo-elements that can carry generated content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PseudoElement {
    Before,
    After,
}

impl PseudoElement {
    fn suffixes(self) -> &'static [&'static str] {
        match self {
            PseudoElement::Before => &["::before", ":before"],
            PseudoElement::After => &["::after", ":after"],
        }
    }
}

type Specificity = (u32, u32, u32);

#[derive(Debug, Clone)]
struct ContentRule {
    selector: Selector,
    pseudo: PseudoElement,
    content: String,
    specificity: Specificity,
    order: usize,
}

/// Generated-content rules collected from one or more stylesheets.
#[derive(Debug, Clone, Default)]
pub struct StyleSheet {
    rules: Vec<ContentRule>,
}

impl StyleSheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a single stylesheet.
    pub fn parse(css: &str) -> Self {
        let mut sheet = Self::new();
        sheet.add_css(css);
        sheet
    }

    /// Collects the rules of every `<style>` element in the document.
    pub fn from_document(doc: &Html) -> Self {
        let mut sheet = Self::new();
        sheet.add_document_styles(doc);
        sheet
    }

    /// Appends the rules of every `<style>` element in the document.
    pub fn add_document_styles(&mut self, doc: &Html) {
        let Ok(style_sel) = Selector::parse("style") else {
            return;
        };
        for style in doc.select(&style_sel) {
            let css: String = style.text().collect();
            self.add_css(&css);
        }
    }

    /// Appends the rules of a stylesheet. Rules added later win specificity ties.
    pub fn add_css(&mut self, css: &str) {
        let stripped = COMMENT_RE.replace_all(css, "");
        parse_block(&stripped, &mut self.rules);
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Returns the raw computed `content` value for the element's pseudo-element.
    ///
    /// The value is returned as written in the stylesheet (quotes included), the
    /// same shape a browser reports from `getComputedStyle`. `None` means no rule
    /// applies, which callers treat like `normal`.
    pub fn computed_content(&self, element: &ElementRef<'_>, pseudo: PseudoElement) -> Option<&str> {
        self.rules
            .iter()
            .filter(|rule| rule.pseudo == pseudo && rule.selector.matches(element))
            .max_by_key(|rule| (rule.specificity, rule.order))
            .map(|rule| rule.content.as_str())
    }
}

fn parse_block(css: &str, rules: &mut Vec<ContentRule>) {
    let mut rest = css;
    while let Some(open) = find_unquoted(rest, b'{') {
        let Some(close) = matching_brace(rest, open) else {
            break;
        };
        // Statement at-rules (@import, @charset) end with ';' before the next block.
        let prelude = rest[..open].rsplit(';').next().unwrap_or("").trim();
        let body = &rest[open + 1..close];
        rest = &rest[close + 1..];

        if let Some(at_rule) = prelude.strip_prefix('@') {
            let name = at_rule
                .split(|c: char| c.is_whitespace() || c == '(')
                .next()
                .unwrap_or("")
                .to_ascii_lowercase();
            if matches!(name.as_str(), "media" | "supports" | "layer") {
                parse_block(body, rules);
            }
            continue;
        }

        let Some(content) = content_declaration(body) else {
            continue;
        };

        for raw_selector in split_unquoted(prelude, b',') {
            let Some((base, pseudo)) = split_pseudo(raw_selector.trim()) else {
                continue;
            };
            let parsed = Selector::parse(&base);
            match parsed {
                Ok(selector) => {
                    let order = rules.len();
                    rules.push(ContentRule {
                        selector,
                        pseudo,
                        content: content.clone(),
                        specificity: specificity(&base),
                        order,
                    });
                }
                Err(_) => trace!(selector = %base, "skipping unsupported selector"),
            };
        }
    }
}

/// Returns the value of the last `content` declaration in a rule body.
fn content_declaration(body: &str) -> Option<String> {
    let mut content = None;
    for decl in split_unquoted(body, b';') {
        let Some((name, value)) = decl.split_once(':') else {
            continue;
        };
        if !name.trim().eq_ignore_ascii_case("content") {
            continue;
        }
        let mut value = value.trim();
        if let Some(idx) = value.to_ascii_lowercase().rfind("!important") {
            value = value[..idx].trim_end();
        }
        content = Some(value.to_string());
    }
    content
}

/// Splits `div.phone::before` into (`div.phone`, Before).
fn split_pseudo(selector: &str) -> Option<(String, PseudoElement)> {
    let lower = selector.to_ascii_lowercase();
    for pseudo in [PseudoElement::Before, PseudoElement::After] {
        for suffix in pseudo.suffixes() {
            if lower.ends_with(suffix) {
                let base = selector[..selector.len() - suffix.len()].trim_end();
                let base = if base.is_empty() || base.ends_with(|c: char| matches!(c, '>' | '+' | '~')) {
                    format!("{base}*")
                } else {
                    base.to_string()
                };
                return Some((base, pseudo));
            }
        }
    }
    None
}

/// Approximate (ids, classes/attributes/pseudo-classes, types) specificity.
fn specificity(selector: &str) -> Specificity {
    let bytes = selector.as_bytes();
    let (mut ids, mut classes, mut types) = (0, 0, 0);
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'#' => {
                ids += 1;
                i = skip_ident(bytes, i + 1);
            }
            b'.' => {
                classes += 1;
                i = skip_ident(bytes, i + 1);
            }
            b'[' => {
                classes += 1;
                while i < bytes.len() && bytes[i] != b']' {
                    i += 1;
                }
                i += 1;
            }
            b':' => {
                if bytes.get(i + 1) == Some(&b':') {
                    types += 1;
                    i = skip_ident(bytes, i + 2);
                } else {
                    classes += 1;
                    i = skip_ident(bytes, i + 1);
                    if bytes.get(i) == Some(&b'(') {
                        let mut depth = 0;
                        while i < bytes.len() {
                            match bytes[i] {
                                b'(' => depth += 1,
                                b')' => {
                                    depth -= 1;
                                    if depth == 0 {
                                        i += 1;
                                        break;
                                    }
                                }
                                _ => {}
                            }
                            i += 1;
                        }
                    }
                }
            }
            b if b.is_ascii_alphabetic() || b == b'_' || b >= 0x80 => {
                types += 1;
                i = skip_ident(bytes, i);
            }
            _ => i += 1,
        }
    }
    (ids, classes, types)
}

fn skip_ident(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'\\' {
            i += 2;
        } else if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b >= 0x80 {
            i += 1;
        } else {
            break;
        }
    }
    i
}

/// Index of the first `needle` outside quoted strings.
fn find_unquoted(s: &str, needle: u8) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == b'\\' {
                    i += 1;
                } else if b == q {
                    quote = None;
                }
            }
            None if b == b'"' || b == b'\'' => quote = Some(b),
            None if b == needle => return Some(i),
            None => {}
        }
        i += 1;
    }
    None
}

/// Index of the `}` closing the block opened at `open`.
fn matching_brace(s: &str, open: usize) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut i = open;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == b'\\' {
                    i += 1;
                } else if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'"' | b'\'' => quote = Some(b),
                b'{' => depth += 1,
                b'}' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            },
        }
        i += 1;
    }
    None
}

/// Splits on `sep` outside quotes and parentheses.
fn split_unquoted(s: &str, sep: u8) -> Vec<&str> {
    let bytes = s.as_bytes();
    let mut parts = Vec::new();
    let mut quote: Option<u8> = None;
    let mut parens = 0usize;
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == b'\\' {
                    i += 1;
                } else if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'"' | b'\'' => quote = Some(b),
                b'(' => parens += 1,
                b')' => parens = parens.saturating_sub(1),
                _ if b == sep && parens == 0 => {
                    parts.push(&s[start..i]);
                    start = i + 1;
                }
                _ => {}
            },
        }
        i += 1;
    }
    if start < s.len() {
        parts.push(&s[start..]);
    }
    parts
}
