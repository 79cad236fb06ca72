// ABOUTME: CrawlState, the progress record of a bulk crawl.
// ABOUTME: Serialized into the checkpoint between navigations; never kept on the page.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::events::CrawlSummary;
use crate::mapping::FieldMapping;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlState {
    pub is_running: bool,
    /// Absolute http(s) URLs in discovery order.
    pub links: Vec<String>,
    /// Index of the link being visited, or `links.len()` when done.
    pub current_index: usize,
    pub field_mapping: FieldMapping,
    pub extracted_count: usize,
    pub total_count: usize,
    #[serde(default)]
    pub store_config_id: String,
    /// Set once a navigation is issued, cleared once its page is handled.
    #[serde(default)]
    pub awaiting_load: bool,
    pub started_at: DateTime<Utc>,
}

impl CrawlState {
    pub fn new(
        links: Vec<String>,
        field_mapping: FieldMapping,
        store_config_id: impl Into<String>,
    ) -> Self {
        let total_count = links.len();
        Self {
            is_running: true,
            links,
            current_index: 0,
            field_mapping,
            extracted_count: 0,
            total_count,
            store_config_id: store_config_id.into(),
            awaiting_load: false,
            started_at: Utc::now(),
        }
    }

    pub fn current_link(&self) -> Option<&str> {
        self.links.get(self.current_index).map(String::as_str)
    }

    pub fn is_exhausted(&self) -> bool {
        self.current_index >= self.links.len()
    }

    /// Running with links left to visit.
    pub fn has_work(&self) -> bool {
        self.is_running && !self.is_exhausted()
    }

    /// Moves past the link at `visited`, unless the index already moved on.
    pub fn advance_past(&mut self, visited: usize) {
        self.current_index = self.current_index.max(visited + 1);
        self.awaiting_load = false;
    }

    pub fn summary(&self) -> CrawlSummary {
        CrawlSummary {
            extracted_count: self.extracted_count,
            total_count: self.total_count,
            stopped: !self.is_running,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> CrawlState {
        CrawlState::new(
            vec!["https://e.com/1".to_string(), "https://e.com/2".to_string()],
            FieldMapping::new().with("phone", ".tel"),
            "cfg",
        )
    }

    #[test]
    fn test_new_state_starts_at_first_link() {
        let s = state();
        assert!(s.is_running);
        assert_eq!(s.total_count, 2);
        assert_eq!(s.current_link(), Some("https://e.com/1"));
        assert!(s.has_work());
    }

    #[test]
    fn test_advance_is_monotonic() {
        let mut s = state();
        s.awaiting_load = true;
        s.advance_past(0);
        assert_eq!(s.current_index, 1);
        assert!(!s.awaiting_load);

        // A stale handler for link 0 does not move the index back.
        s.advance_past(0);
        assert_eq!(s.current_index, 1);

        s.advance_past(1);
        assert!(s.is_exhausted());
        assert_eq!(s.current_link(), None);
        assert!(!s.has_work());
    }

    #[test]
    fn test_summary_reports_stop() {
        let mut s = state();
        s.extracted_count = 1;
        s.is_running = false;
        let summary = s.summary();
        assert_eq!(summary.extracted_count, 1);
        assert_eq!(summary.total_count, 2);
        assert!(summary.stopped);
    }

    #[test]
    fn test_older_checkpoints_default_new_fields() {
        let json = r#"{
            "is_running": true,
            "links": ["https://e.com/1"],
            "current_index": 0,
            "field_mapping": {"phone": ".tel"},
            "extracted_count": 0,
            "total_count": 1,
            "started_at": "2024-05-01T10:00:00Z"
        }"#;
        let s: CrawlState = serde_json::from_str(json).unwrap();
        assert_eq!(s.store_config_id, "");
        assert!(!s.awaiting_load);
    }
}
