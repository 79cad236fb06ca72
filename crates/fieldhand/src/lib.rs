// ABOUTME: Main library entry point for fieldhand, a selector-driven record extraction engine.
// ABOUTME: Re-exports the public API: Page, FieldMapping, extraction, selection, bulk crawling, stores and errors.

//! Fieldhand - pick elements on a page, turn them into selectors, and pull
//! customer records out of one page or a whole list of them.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use fieldhand::{
//!     BulkCrawler, FieldMapping, FileCheckpoint, HttpNavigator, MemoryStore, Navigator, Options,
//! };
//! use url::Url;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let opts = Options::default();
//!     let navigator = HttpNavigator::new(&opts)?;
//!     let list = navigator.navigate(&Url::parse("https://crm.example.com/customers")?).await?;
//!
//!     let mapping = FieldMapping::new()
//!         .with("full_name", "h1.name")
//!         .with("phone", ".contact .tel");
//!
//!     let store = Arc::new(MemoryStore::new());
//!     let crawler = BulkCrawler::new(navigator, store.clone(), FileCheckpoint::new("crawl.json"), &opts);
//!     crawler.start(&list, "table.customers a", &mapping, "crm")?;
//!     let summary = crawler.run(&list).await?;
//!     println!("{}", summary);
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod config;
pub mod crawl;
pub mod dom;
pub mod error;
pub mod events;
pub mod extractors;
pub mod formats;
pub mod mapping;
pub mod options;
pub mod resource;
pub mod selection;
pub mod store;

pub use crate::agent::{Agent, Command};
pub use crate::config::SiteConfig;
pub use crate::crawl::{
    discover_links, BulkCrawler, CheckpointStore, CrawlState, FileCheckpoint, MemoryCheckpoint,
    Step, VisitOutcome,
};
pub use crate::dom::Page;
pub use crate::error::{
    CheckpointError, ConfigError, CrawlError, ErrorCode, FetchError, StoreError,
};
pub use crate::events::{CrawlEvent, CrawlSummary, Event};
pub use crate::extractors::fields::{extract_fields, highlight_fields};
pub use crate::extractors::text::extract_text;
pub use crate::formats::{export_csv, format_phone_number, ExportRow};
pub use crate::mapping::{ExtractionResult, FieldMapping};
pub use crate::options::{Options, OptionsBuilder};
pub use crate::resource::{HttpNavigator, Navigator, StaticNavigator};
pub use crate::selection::{PageInput, SelectionSession, SelectionState};
pub use crate::store::{
    CustomerRecord, JsonlStore, MemoryStore, RecordId, RecordStore, RestStore, StoredRecord,
};
