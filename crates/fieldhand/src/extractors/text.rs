// ABOUTME: Best-guess human-readable text for an element via an ordered fallback chain.
// ABOUTME: Falls back from text nodes to data-content and CSS generated content on the element and its descendants.

//! Text extraction.
//!
//! Strategies, first non-empty result wins:
//!
//! 1. trimmed text content
//! 2. the `data-content` attribute
//! 3. computed `::before` content
//! 4. computed `::after` content
//! 5. the first descendant carrying `data-content`
//! 6. the first descendant whose `::before` content resolves
//!
//! Generated content is resolved the way it would render: `attr(name)` is read
//! from the element, quoted strings lose their quotes, and `none`/`normal`
//! count as nothing.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::ElementRef;

use crate::dom::style::{PseudoElement, StyleSheet};

/// Attribute some sites use to carry values that are painted by CSS.
pub const DATA_CONTENT_ATTR: &str = "data-content";

static ATTR_FN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"attr\(\s*([^)\s]+)\s*\)").unwrap());

/// Extracts the text for `element`, or `""` when there is no element or nothing to read.
pub fn extract_text(styles: &StyleSheet, element: Option<ElementRef<'_>>) -> String {
    let Some(element) = element else {
        return String::new();
    };

    let text: String = element.text().collect();
    let text = text.trim();
    if !text.is_empty() {
        return text.to_string();
    }

    if let Some(value) = data_content(&element) {
        return value;
    }

    for pseudo in [PseudoElement::Before, PseudoElement::After] {
        if let Some(value) = generated_text(styles, &element, pseudo) {
            return value;
        }
    }

    if let Some(value) = descendant_elements(&element)
        .find(|child| child.value().attr(DATA_CONTENT_ATTR).is_some())
        .and_then(|child| data_content(&child))
    {
        return value;
    }

    descendant_elements(&element)
        .find_map(|child| generated_text(styles, &child, PseudoElement::Before))
        .unwrap_or_default()
}

/// Descendant elements in document order, excluding `element` itself.
fn descendant_elements<'a>(element: &ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    element.descendants().skip(1).filter_map(ElementRef::wrap)
}

fn data_content(element: &ElementRef<'_>) -> Option<String> {
    element
        .value()
        .attr(DATA_CONTENT_ATTR)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Resolves the rendered text of a pseudo-element, if any.
fn generated_text(
    styles: &StyleSheet,
    element: &ElementRef<'_>,
    pseudo: PseudoElement,
) -> Option<String> {
    let raw = styles.computed_content(element, pseudo)?;
    resolve_content_value(element, raw)
}

/// Turns a computed `content` value into text.
///
/// A value referencing `attr(name)` resolves to that attribute of `element`,
/// and to nothing when the attribute is missing or blank.
pub fn resolve_content_value(element: &ElementRef<'_>, raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw == "none" || raw == "normal" {
        return None;
    }

    if let Some(caps) = ATTR_FN_RE.captures(raw) {
        return element
            .value()
            .attr(&caps[1])
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);
    }

    let cleaned = strip_quotes(raw);
    if cleaned.is_empty() || cleaned == "none" {
        None
    } else {
        Some(cleaned.to_string())
    }
}

/// Removes one quote character from each end, like `/^["']|["']$/g`.
fn strip_quotes(value: &str) -> &str {
    let is_quote = |c: char| c == '"' || c == '\'';
    let value = value.strip_prefix(is_quote).unwrap_or(value);
    value.strip_suffix(is_quote).unwrap_or(value)
}
