// ABOUTME: Bulk crawl controller: discovers detail links on a list page and visits them one by one.
// ABOUTME: Each visit extracts a record and submits it; progress is re-read from the checkpoint after every load.

//! Bulk crawling.
//!
//! ```text
//! Idle --start--> Visiting(0) --load--> Visiting(1) ... --exhausted/stop--> Idle
//! ```
//!
//! Visits are strictly sequential. After a navigation the controller knows
//! nothing except what the [`CheckpointStore`] holds, so [`BulkCrawler::on_page_load`]
//! only acts when the checkpoint says a crawl is running and a navigation is
//! awaited. Everything else (the list page itself, a page the user opened by
//! hand, a checkpoint that went missing) is ignored.

pub mod checkpoint;
pub mod state;

use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};
use url::Url;

use crate::dom::Page;
use crate::error::{CrawlError, FetchError};
use crate::events::{CrawlEvent, CrawlSummary, Event};
use crate::extractors::compiled::precompile_selectors;
use crate::extractors::fields::extract_fields;
use crate::mapping::FieldMapping;
use crate::options::Options;
use crate::resource::Navigator;
use crate::store::{submit, CustomerRecord, RecordId, RecordStore, SubmitOutcome};

pub use checkpoint::{CheckpointStore, FileCheckpoint, MemoryCheckpoint};
pub use state::CrawlState;

/// Result of [`BulkCrawler::visit_next`].
#[derive(Debug)]
pub enum Step {
    /// The next link was loaded. Hand the page to [`BulkCrawler::on_page_load`].
    Loaded(Page),
    /// The next link failed to load and was skipped.
    Skipped,
    /// Nothing left to do; the checkpoint has been cleared.
    Finished(CrawlSummary),
}

/// What [`BulkCrawler::on_page_load`] did with a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisitOutcome {
    /// No crawl is waiting for this page.
    NotResuming,
    Saved(RecordId),
    Duplicate,
    MissingPhone,
    Failed(String),
}

/// Resolves each element matched by `list_selector` to an absolute http(s) link.
///
/// An `<a>` match is used as is; any other match contributes its first `<a>`
/// descendant. Matches without a usable `href` are dropped. Order follows the
/// document and duplicates are kept.
pub fn discover_links(page: &Page, list_selector: &str) -> Vec<String> {
    page.select_all(list_selector)
        .into_iter()
        .filter_map(|el| {
            if el.value().name() == "a" {
                Some(el)
            } else {
                el.descendants()
                    .skip(1)
                    .filter_map(scraper::ElementRef::wrap)
                    .find(|d| d.value().name() == "a")
            }
        })
        .filter_map(|anchor| anchor.value().attr("href"))
        .filter_map(|href| page.resolve_href(href))
        .filter(|url| url.scheme() == "http" || url.scheme() == "https")
        .map(String::from)
        .collect()
}

pub struct BulkCrawler<N, S, C> {
    navigator: N,
    store: S,
    checkpoint: C,
    settle_delay: Duration,
    pacing_delay: Duration,
    events: Option<UnboundedSender<Event>>,
}

impl<N, S, C> BulkCrawler<N, S, C>
where
    N: Navigator,
    S: RecordStore,
    C: CheckpointStore,
{
    pub fn new(navigator: N, store: S, checkpoint: C, opts: &Options) -> Self {
        Self {
            navigator,
            store,
            checkpoint,
            settle_delay: opts.settle_delay,
            pacing_delay: opts.pacing_delay,
            events: None,
        }
    }

    /// Sends crawl progress to `tx` as [`Event::Crawl`].
    pub fn with_events(mut self, tx: UnboundedSender<Event>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn navigator(&self) -> &N {
        &self.navigator
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn checkpoint(&self) -> &C {
        &self.checkpoint
    }

    pub fn state(&self) -> Result<Option<CrawlState>, CrawlError> {
        Ok(self.checkpoint.load()?)
    }

    /// True while a recorded crawl has not been stopped.
    pub fn is_running(&self) -> bool {
        matches!(self.checkpoint.load(), Ok(Some(state)) if state.is_running)
    }

    /// Discovers links on `page` and records a fresh crawl over them.
    ///
    /// Returns the number of links. When nothing usable matches, nothing is
    /// recorded and [`CrawlError::NoLinksFound`] is returned.
    pub fn start(
        &self,
        page: &Page,
        list_selector: &str,
        mapping: &FieldMapping,
        store_config_id: &str,
    ) -> Result<usize, CrawlError> {
        let links = discover_links(page, list_selector);
        if links.is_empty() {
            warn!(selector = list_selector, url = %page.url(), "list selector matched no links");
            return Err(CrawlError::NoLinksFound {
                selector: list_selector.to_string(),
            });
        }

        precompile_selectors(mapping.fields().map(|(_, selector)| selector));

        let state = CrawlState::new(links, mapping.clone(), store_config_id);
        let total = state.total_count;
        self.checkpoint.save(&state)?;
        self.emit(CrawlEvent::Started { total });
        Ok(total)
    }

    /// Asks a running crawl to stop. Takes effect at the next step boundary.
    ///
    /// Returns false when no crawl was recorded.
    pub fn stop(&self) -> Result<bool, CrawlError> {
        let updated = self.checkpoint.update(&mut |state| state.is_running = false)?;
        if updated.is_some() {
            info!("bulk crawl stop requested");
        }
        Ok(updated.is_some())
    }

    /// Navigates to the current link, or finishes the crawl when there is none.
    pub async fn visit_next(&self) -> Result<Step, CrawlError> {
        let state = match self.checkpoint.load()? {
            Some(state) if state.has_work() => state,
            other => return Ok(Step::Finished(self.finish(other)?)),
        };

        let index = state.current_index;
        let link = state.current_link().unwrap_or_default().to_string();
        self.emit(CrawlEvent::Visiting {
            index: index + 1,
            total: state.total_count,
            url: link.clone(),
        });

        self.checkpoint.update(&mut |s| s.awaiting_load = true)?;

        let loaded = match Url::parse(&link) {
            Ok(url) => self.navigator.navigate(&url).await,
            Err(e) => Err(FetchError::invalid_url(
                link.as_str(),
                "Navigate",
                Some(e.into()),
            )),
        };

        match loaded {
            Ok(page) => Ok(Step::Loaded(page)),
            Err(e) => {
                self.emit(CrawlEvent::Error {
                    reason: e.to_string(),
                });
                self.checkpoint.update(&mut |s| s.advance_past(index))?;
                tokio::time::sleep(self.pacing_delay).await;
                Ok(Step::Skipped)
            }
        }
    }

    /// Handles a freshly loaded page.
    ///
    /// Waits the settle delay, extracts the record and submits it unless the
    /// phone is empty. Whatever happens to the record, the crawl advances to
    /// the next link and the pacing delay applies.
    pub async fn on_page_load(&self, page: &Page) -> Result<VisitOutcome, CrawlError> {
        let state = match self.checkpoint.load() {
            Ok(Some(state)) if state.has_work() && state.awaiting_load => state,
            Ok(_) => return Ok(VisitOutcome::NotResuming),
            Err(e) => {
                warn!(error = %e, "checkpoint unreadable, not resuming");
                return Ok(VisitOutcome::NotResuming);
            }
        };

        tokio::time::sleep(self.settle_delay).await;

        // A stop may have arrived while the page settled.
        match self.checkpoint.load() {
            Ok(Some(current)) if current.is_running => {}
            Ok(Some(_)) => {
                info!(url = %page.url(), "crawl stopped before extraction");
                self.checkpoint.update(&mut |s| s.awaiting_load = false)?;
                return Ok(VisitOutcome::NotResuming);
            }
            Ok(None) => return Ok(VisitOutcome::NotResuming),
            Err(e) => {
                warn!(error = %e, "checkpoint unreadable after settle, not resuming");
                return Ok(VisitOutcome::NotResuming);
            }
        }

        let result = extract_fields(page, &state.field_mapping);
        let outcome = if result.phone().trim().is_empty() {
            self.emit(CrawlEvent::MissingPhone {
                url: page.url().to_string(),
            });
            VisitOutcome::MissingPhone
        } else {
            let record =
                CustomerRecord::from_extraction(&result, &state.store_config_id, page.url().as_str());
            match submit(&self.store, &record).await {
                SubmitOutcome::Inserted(id) => {
                    self.emit(CrawlEvent::Saved {
                        id: id.to_string(),
                        full_name: record.full_name.clone(),
                        phone: record.phone.clone(),
                    });
                    VisitOutcome::Saved(id)
                }
                SubmitOutcome::Duplicate => {
                    self.emit(CrawlEvent::DuplicateSkipped {
                        phone: record.phone.clone(),
                    });
                    VisitOutcome::Duplicate
                }
                SubmitOutcome::Failed(reason) => {
                    self.emit(CrawlEvent::Error {
                        reason: reason.clone(),
                    });
                    VisitOutcome::Failed(reason)
                }
            }
        };

        // Merge into the current checkpoint so a stop issued meanwhile survives.
        let saved = matches!(outcome, VisitOutcome::Saved(_));
        let index = state.current_index;
        self.checkpoint.update(&mut |s| {
            s.advance_past(index);
            if saved {
                s.extracted_count += 1;
            }
        })?;

        tokio::time::sleep(self.pacing_delay).await;
        Ok(outcome)
    }

    /// Drives the crawl to completion, starting with the page currently loaded.
    pub async fn run(&self, current: &Page) -> Result<CrawlSummary, CrawlError> {
        self.on_page_load(current).await?;
        self.drive().await
    }

    /// Continues a recorded crawl, re-visiting a link whose load was never handled.
    pub async fn resume(&self) -> Result<CrawlSummary, CrawlError> {
        match self.checkpoint.load()? {
            Some(state) if state.has_work() => {
                info!(
                    index = state.current_index + 1,
                    total = state.total_count,
                    "resuming bulk crawl"
                );
                self.drive().await
            }
            _ => Err(CrawlError::NothingToResume),
        }
    }

    async fn drive(&self) -> Result<CrawlSummary, CrawlError> {
        loop {
            match self.visit_next().await? {
                Step::Loaded(page) => {
                    self.on_page_load(&page).await?;
                }
                Step::Skipped => {}
                Step::Finished(summary) => return Ok(summary),
            }
        }
    }

    fn finish(&self, state: Option<CrawlState>) -> Result<CrawlSummary, CrawlError> {
        let summary = state.as_ref().map(CrawlState::summary).unwrap_or_default();
        self.checkpoint.clear()?;
        self.emit(CrawlEvent::Finished(summary));
        Ok(summary)
    }

    fn emit(&self, event: CrawlEvent) {
        match &event {
            CrawlEvent::Error { .. } => warn!("{}", event),
            _ => info!("{}", event),
        }
        if let Some(tx) = &self.events {
            let _ = tx.send(Event::Crawl(event));
        }
    }
}
