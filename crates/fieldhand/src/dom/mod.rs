// ABOUTME: The page context: a parsed document, its URL, its generated-content styles and highlights.
// ABOUTME: A navigation replaces the whole Page, so nothing stored here outlives a page load.

//! DOM utilities for the page being scraped.
//!
//! A [`Page`] is everything the extraction engine can see of one loaded
//! document. It is rebuilt from scratch on every navigation, which is why crawl
//! progress is never kept here (see [`crate::crawl::checkpoint`]).

pub mod selector;
pub mod style;

use std::cell::RefCell;
use std::time::Duration;

use ego_tree::NodeId;
use scraper::{ElementRef, Html};
use tokio::time::Instant;
use url::Url;

use crate::extractors::compiled::get_or_compile;
use crate::dom::style::StyleSheet;

/// Class name the interactive UI uses for elements matched by an extraction.
pub const EXTRACTION_HIGHLIGHT_CLASS: &str = "extraction-highlight";

#[derive(Debug)]
struct Highlight {
    nodes: Vec<NodeId>,
    until: Instant,
}

/// A loaded document together with the stylesheet rules that apply to it.
#[derive(Debug)]
pub struct Page {
    url: Url,
    document: Html,
    styles: StyleSheet,
    highlight: RefCell<Option<Highlight>>,
}

impl Page {
    /// Parses a document, collecting generated-content rules from its `<style>` blocks.
    pub fn parse(url: Url, html: &str) -> Self {
        Self::with_stylesheets(url, html, &[])
    }

    /// Parses a document, applying linked stylesheet text before its inline `<style>` blocks.
    pub fn with_stylesheets(url: Url, html: &str, linked_css: &[String]) -> Self {
        let document = Html::parse_document(html);
        let mut styles = StyleSheet::new();
        for css in linked_css {
            styles.add_css(css);
        }
        styles.add_document_styles(&document);
        Self {
            url,
            document,
            styles,
            highlight: RefCell::new(None),
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn document(&self) -> &Html {
        &self.document
    }

    pub fn styles(&self) -> &StyleSheet {
        &self.styles
    }

    /// Looks up an element by its node id.
    pub fn element(&self, id: NodeId) -> Option<ElementRef<'_>> {
        self.document.tree.get(id).and_then(ElementRef::wrap)
    }

    /// Returns the first element matching `css`, or `None` when nothing matches
    /// or the selector does not parse.
    pub fn select_first(&self, css: &str) -> Option<ElementRef<'_>> {
        let selector = get_or_compile(css)?;
        self.document.select(&selector).next()
    }

    /// Returns every element matching `css` in document order.
    pub fn select_all(&self, css: &str) -> Vec<ElementRef<'_>> {
        match get_or_compile(css) {
            Some(selector) => self.document.select(&selector).collect(),
            None => Vec::new(),
        }
    }

    /// Resolves an `href` the way a browser would, against the page URL.
    pub fn resolve_href(&self, href: &str) -> Option<Url> {
        self.url.join(href.trim()).ok()
    }

    /// Synthesizes a selector for the element with the given node id.
    pub fn synthesize_selector(&self, id: NodeId) -> Option<String> {
        self.element(id)
            .map(|el| selector::synthesize_selector(&self.document, el))
    }

    /// Marks `nodes` as highlighted for `duration`, replacing any earlier marks.
    pub fn highlight(&self, nodes: Vec<NodeId>, duration: Duration) {
        *self.highlight.borrow_mut() = Some(Highlight {
            nodes,
            until: Instant::now() + duration,
        });
    }

    /// Returns the currently highlighted nodes. Expired marks are cleared.
    pub fn highlighted(&self) -> Vec<NodeId> {
        let mut slot = self.highlight.borrow_mut();
        match slot.as_ref() {
            Some(h) if Instant::now() < h.until => h.nodes.clone(),
            Some(_) => {
                *slot = None;
                Vec::new()
            }
            None => Vec::new(),
        }
    }

    pub fn is_highlighted(&self, id: NodeId) -> bool {
        self.highlighted().contains(&id)
    }

    pub fn clear_highlight(&self) {
        self.highlight.borrow_mut().take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(html: &str) -> Page {
        Page::parse(Url::parse("https://example.com/list/").unwrap(), html)
    }

    #[test]
    fn test_resolve_relative_href() {
        let p = page("<a href='../c/1'>x</a>");
        assert_eq!(
            p.resolve_href("../c/1").unwrap().as_str(),
            "https://example.com/c/1"
        );
    }

    #[test]
    fn test_invalid_selector_selects_nothing() {
        let p = page("<p>hi</p>");
        assert!(p.select_first("p[").is_none());
        assert!(p.select_all("p[").is_empty());
        assert_eq!(p.select_all("p").len(), 1);
    }

    #[test]
    fn test_linked_css_applies() {
        let p = Page::with_stylesheets(
            Url::parse("https://example.com/").unwrap(),
            "<span class='t'></span>",
            &[".t::after { content: 'linked' }".to_string()],
        );
        let el = p.select_first("span.t").unwrap();
        assert_eq!(
            p.styles().computed_content(&el, style::PseudoElement::After),
            Some("'linked'")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_highlight_expires() {
        let p = page("<p id='a'>a</p>");
        let id = p.select_first("#a").unwrap().id();

        p.highlight(vec![id], Duration::from_secs(2));
        assert!(p.is_highlighted(id));

        tokio::time::advance(Duration::from_millis(1999)).await;
        assert!(p.is_highlighted(id));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(p.highlighted().is_empty());
    }
}
