// ABOUTME: Navigation: turning a URL into a freshly loaded Page.
// ABOUTME: HttpNavigator fetches over the network; StaticNavigator serves canned documents.

//! Page loading.
//!
//! Every navigation yields a brand new [`Page`]. Nothing from the previous
//! page survives it, which is the reason crawl progress lives in a
//! [`CheckpointStore`](crate::crawl::checkpoint::CheckpointStore).

pub mod fetch;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::{debug, warn};
use url::Url;

use crate::dom::Page;
use crate::error::FetchError;
use crate::options::Options;

pub use fetch::{FetchOptions, Fetched, MAX_CONTENT_LENGTH};

/// Most linked stylesheets fetched for one page.
pub const MAX_LINKED_STYLESHEETS: usize = 8;

/// Loads pages. Futures are not `Send` because [`Page`] owns a parsed DOM.
#[async_trait(?Send)]
pub trait Navigator {
    async fn navigate(&self, url: &Url) -> Result<Page, FetchError>;
}

#[async_trait(?Send)]
impl<N: Navigator + ?Sized> Navigator for &N {
    async fn navigate(&self, url: &Url) -> Result<Page, FetchError> {
        (**self).navigate(url).await
    }
}

#[async_trait(?Send)]
impl<N: Navigator + ?Sized> Navigator for Arc<N> {
    async fn navigate(&self, url: &Url) -> Result<Page, FetchError> {
        (**self).navigate(url).await
    }
}

/// Navigates over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpNavigator {
    client: reqwest::Client,
    fetch_opts: FetchOptions,
    fetch_stylesheets: bool,
}

impl HttpNavigator {
    pub fn new(opts: &Options) -> Result<Self, FetchError> {
        let client = match opts.http_client.clone() {
            Some(client) => client,
            None => reqwest::Client::builder()
                .redirect(fetch::redirect_policy(opts.allow_private_networks))
                .user_agent(&opts.user_agent)
                .timeout(opts.timeout)
                .cookie_store(true)
                .gzip(true)
                .brotli(true)
                .deflate(true)
                .build()
                .map_err(|e| FetchError::fetch("", "Client", Some(e.into())))?,
        };

        Ok(Self {
            client,
            fetch_opts: FetchOptions {
                headers: opts.headers.clone(),
                allow_private_networks: opts.allow_private_networks,
            },
            fetch_stylesheets: opts.fetch_stylesheets,
        })
    }

    /// Fetches the text of each linked stylesheet. Failures only cost the styles.
    async fn linked_stylesheets(&self, hrefs: Vec<Url>) -> Vec<String> {
        let mut sheets = Vec::with_capacity(hrefs.len());
        for href in hrefs {
            match fetch::fetch(&self.client, &href, &self.fetch_opts).await {
                Ok(fetched) => sheets.push(fetched.text()),
                Err(e) => debug!(url = %href, error = %e, "stylesheet skipped"),
            }
        }
        sheets
    }
}

#[async_trait(?Send)]
impl Navigator for HttpNavigator {
    async fn navigate(&self, url: &Url) -> Result<Page, FetchError> {
        let fetched = fetch::fetch(&self.client, url, &self.fetch_opts).await?;
        let html = fetched.text();
        let final_url = fetched.final_url;
        debug!(url = %final_url, bytes = fetched.body.len(), "page fetched");

        let linked = if self.fetch_stylesheets {
            let hrefs = stylesheet_links(&final_url, &html);
            self.linked_stylesheets(hrefs).await
        } else {
            Vec::new()
        };

        Ok(Page::with_stylesheets(final_url, &html, &linked))
    }
}

/// Absolute URLs of `<link rel="stylesheet">` elements, in document order.
fn stylesheet_links(base: &Url, html: &str) -> Vec<Url> {
    let Ok(selector) = Selector::parse("link[rel][href]") else {
        return Vec::new();
    };
    let doc = Html::parse_document(html);
    let links: Vec<Url> = doc
        .select(&selector)
        .filter(|link| {
            link.value()
                .attr("rel")
                .is_some_and(|rel| rel.split_ascii_whitespace().any(|r| r.eq_ignore_ascii_case("stylesheet")))
        })
        .filter_map(|link| link.value().attr("href"))
        .filter_map(|href| base.join(href.trim()).ok())
        .collect();

    if links.len() > MAX_LINKED_STYLESHEETS {
        warn!(
            url = %base,
            found = links.len(),
            kept = MAX_LINKED_STYLESHEETS,
            "too many linked stylesheets"
        );
    }
    links.into_iter().take(MAX_LINKED_STYLESHEETS).collect()
}

/// Serves documents from memory, keyed by URL.
///
/// Used to replay saved pages and to drive the engine without a network.
#[derive(Debug, Clone, Default)]
pub struct StaticNavigator {
    pages: HashMap<String, String>,
}

impl StaticNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.insert(url, html);
        self
    }

    pub fn insert(&mut self, url: impl Into<String>, html: impl Into<String>) {
        self.pages.insert(url.into(), html.into());
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

#[async_trait(?Send)]
impl Navigator for StaticNavigator {
    async fn navigate(&self, url: &Url) -> Result<Page, FetchError> {
        match self.pages.get(url.as_str()) {
            Some(html) => Ok(Page::parse(url.clone(), html)),
            None => Err(FetchError::fetch(
                url.as_str(),
                "Navigate",
                Some(anyhow::anyhow!("HTTP status 404")),
            )),
        }
    }
}
