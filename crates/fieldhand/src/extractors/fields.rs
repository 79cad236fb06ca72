// ABOUTME: Field mapper: applies a FieldMapping to a page and produces an ExtractionResult.
// ABOUTME: Bad or unmatched selectors yield empty values; matched elements can be highlighted briefly.

//! Field mapping application.
//!
//! Key behaviors:
//! - Each selector is resolved to its first match only.
//! - A selector that is empty, fails to parse or matches nothing gives `""`
//!   for that field and never stops the remaining fields. Parse failures
//!   warn once when compiled; misses log at debug.
//! - The list selector (`customer_list`) is not extracted.

use std::time::Duration;

use ego_tree::NodeId;
use tracing::debug;

use crate::dom::Page;
use crate::extractors::text::extract_text;
use crate::mapping::{ExtractionResult, FieldMapping};

/// Extracts every mapped field from `page`.
pub fn extract_fields(page: &Page, mapping: &FieldMapping) -> ExtractionResult {
    let mut result = ExtractionResult::new();
    for (field, selector) in mapping.fields() {
        let element = page.select_first(selector);
        if element.is_none() {
            debug!(field, selector, url = %page.url(), "field selector matched nothing");
        }
        result.insert(field, extract_text(page.styles(), element));
    }
    result
}

/// Node ids of the first element matched by each field selector.
pub fn matched_nodes(page: &Page, mapping: &FieldMapping) -> Vec<NodeId> {
    mapping
        .fields()
        .filter_map(|(_, selector)| page.select_first(selector))
        .map(|el| el.id())
        .collect()
}

/// Highlights every element the mapping currently matches, for `duration`.
///
/// Earlier highlights are cleared first. Returns the number of highlighted elements.
pub fn highlight_fields(page: &Page, mapping: &FieldMapping, duration: Duration) -> usize {
    let nodes = matched_nodes(page, mapping);
    let count = nodes.len();
    page.highlight(nodes, duration);
    count
}
