// ABOUTME: Extraction strategies applied to a loaded page.
// ABOUTME: Text fallback chain, field mapping application and the compiled selector cache.

//! Content extraction module.
//!
//! Submodules:
//! - `compiled`: process-wide cache of parsed selectors.
//! - `fields`: applies a field mapping to a page.
//! - `text`: the text fallback chain for a single element.

pub mod compiled;
pub mod fields;
pub mod text;
