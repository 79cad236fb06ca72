// ABOUTME: Pre-compiled CSS selector cache shared by field extraction and link discovery.
// ABOUTME: User-supplied selectors are parsed once; invalid ones are cached as misses.

//! Selector caching for repeated DOM queries.
//!
//! Field mappings are applied to every page of a crawl, so the same handful of
//! selectors is parsed again and again. This module compiles each selector
//! string once and reuses it for all subsequent queries.

use std::collections::HashMap;
use std::sync::RwLock;

use once_cell::sync::Lazy;
use scraper::Selector;
use tracing::{debug, warn};

/// Most selectors kept in the cache. The cache is emptied when it is full.
pub const MAX_CACHED_SELECTORS: usize = 512;

/// Thread-safe cache of compiled CSS selectors.
static SELECTOR_CACHE: Lazy<RwLock<HashMap<String, Option<Selector>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Gets or compiles a CSS selector, caching the result.
///
/// Returns `Some(Selector)` if the selector is valid, `None` if invalid or empty.
/// Invalid selectors are logged once, when first compiled.
pub fn get_or_compile(css: &str) -> Option<Selector> {
    let css = css.trim();
    if css.is_empty() {
        return None;
    }

    {
        let cache = SELECTOR_CACHE.read().unwrap_or_else(|e| e.into_inner());
        if let Some(cached) = cache.get(css) {
            return cached.clone();
        }
    }

    let compiled = match Selector::parse(css) {
        Ok(selector) => Some(selector),
        Err(err) => {
            warn!(selector = css, error = %err, "invalid selector, treating as no match");
            None
        }
    };
    let mut cache = SELECTOR_CACHE.write().unwrap_or_else(|e| e.into_inner());
    // Another caller may have inserted while we were compiling.
    if let Some(cached) = cache.get(css) {
        return cached.clone();
    }
    if cache.len() >= MAX_CACHED_SELECTORS {
        debug!(entries = cache.len(), "selector cache full, clearing");
        cache.clear();
    }
    cache.insert(css.to_string(), compiled.clone());
    compiled
}

#[cfg(test)]
fn cached_len() -> usize {
    SELECTOR_CACHE.read().unwrap_or_else(|e| e.into_inner()).len()
}

/// Precompiles a batch of selectors into the cache.
///
/// Called when a crawl starts so every page of the crawl hits the cache.
pub fn precompile_selectors<I, S>(selectors: I)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    for css in selectors {
        get_or_compile(css.as_ref());
    }
}
