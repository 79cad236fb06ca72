// ABOUTME: Events emitted to the controller: element picks, cancellations and crawl progress.
// ABOUTME: Crawl events render as the progress log lines shown to the user.

use std::fmt;

use serde::Serialize;

/// Everything the page agent reports back to its controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Event {
    /// The user clicked an element while picking a field.
    ElementSelected {
        field: String,
        selector: String,
        sample_value: String,
    },
    /// The user pressed Escape while picking a field.
    SelectionCancelled,
    Crawl(CrawlEvent),
}

/// Progress of a bulk crawl, one per step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlEvent {
    Started {
        total: usize,
    },
    /// `index` is 1-based.
    Visiting {
        index: usize,
        total: usize,
        url: String,
    },
    Saved {
        id: String,
        full_name: String,
        phone: String,
    },
    DuplicateSkipped {
        phone: String,
    },
    MissingPhone {
        url: String,
    },
    Error {
        reason: String,
    },
    Finished(CrawlSummary),
}

/// End-of-run counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CrawlSummary {
    pub extracted_count: usize,
    pub total_count: usize,
    /// True when the crawl ended because of a stop request.
    pub stopped: bool,
}

impl fmt::Display for CrawlEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrawlEvent::Started { total } => write!(f, "started: {} links", total),
            CrawlEvent::Visiting { index, total, url } => {
                write!(f, "[{}/{}] visiting {}", index, total, url)
            }
            CrawlEvent::Saved {
                full_name, phone, ..
            } => {
                let name = if full_name.is_empty() {
                    "unnamed"
                } else {
                    full_name.as_str()
                };
                write!(f, "saved: {} ({})", name, phone)
            }
            CrawlEvent::DuplicateSkipped { phone } => write!(f, "duplicate-skipped: {}", phone),
            CrawlEvent::MissingPhone { url } => write!(f, "skipped: no phone on {}", url),
            CrawlEvent::Error { reason } => write!(f, "error: {}", reason),
            CrawlEvent::Finished(summary) => write!(f, "{}", summary),
        }
    }
}

impl fmt::Display for CrawlSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "finished: {}/{} records saved",
            self.extracted_count, self.total_count
        )?;
        if self.stopped {
            write!(f, " (stopped)")?;
        }
        Ok(())
    }
}
