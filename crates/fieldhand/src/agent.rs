// ABOUTME: The page agent: one owner for the current page, the selection session and the bulk crawler.
// ABOUTME: Serves commands with oneshot replies, routes page input, and steps a running crawl between messages.

use std::time::Duration;

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::crawl::{BulkCrawler, CheckpointStore, Step, VisitOutcome};
use crate::dom::Page;
use crate::error::CrawlError;
use crate::events::Event;
use crate::extractors::fields::{extract_fields, highlight_fields};
use crate::mapping::{ExtractionResult, FieldMapping};
use crate::options::Options;
use crate::resource::Navigator;
use crate::selection::{Dispatch, PageInput, SelectionSession};
use crate::store::RecordStore;

/// Requests from the controlling UI.
#[derive(Debug)]
pub enum Command {
    StartSelection {
        field_label: String,
        reply: oneshot::Sender<()>,
    },
    StopSelection {
        reply: oneshot::Sender<()>,
    },
    /// Applies a mapping to the current page and highlights what matched.
    ExtractFields {
        mapping: FieldMapping,
        reply: oneshot::Sender<ExtractionResult>,
    },
    /// Replies with the number of discovered links.
    StartBulkCrawl {
        list_selector: String,
        mapping: FieldMapping,
        store_config_id: String,
        reply: oneshot::Sender<Result<usize, CrawlError>>,
    },
    /// Replies with whether a crawl was recorded.
    StopBulkCrawl {
        reply: oneshot::Sender<bool>,
    },
}

impl Command {
    pub fn start_selection(field_label: impl Into<String>) -> (Self, oneshot::Receiver<()>) {
        let (reply, rx) = oneshot::channel();
        let cmd = Command::StartSelection {
            field_label: field_label.into(),
            reply,
        };
        (cmd, rx)
    }

    pub fn stop_selection() -> (Self, oneshot::Receiver<()>) {
        let (reply, rx) = oneshot::channel();
        (Command::StopSelection { reply }, rx)
    }

    pub fn extract_fields(mapping: FieldMapping) -> (Self, oneshot::Receiver<ExtractionResult>) {
        let (reply, rx) = oneshot::channel();
        (Command::ExtractFields { mapping, reply }, rx)
    }

    pub fn start_bulk_crawl(
        list_selector: impl Into<String>,
        mapping: FieldMapping,
        store_config_id: impl Into<String>,
    ) -> (Self, oneshot::Receiver<Result<usize, CrawlError>>) {
        let (reply, rx) = oneshot::channel();
        let cmd = Command::StartBulkCrawl {
            list_selector: list_selector.into(),
            mapping,
            store_config_id: store_config_id.into(),
            reply,
        };
        (cmd, rx)
    }

    pub fn stop_bulk_crawl() -> (Self, oneshot::Receiver<bool>) {
        let (reply, rx) = oneshot::channel();
        (Command::StopBulkCrawl { reply }, rx)
    }
}

pub struct Agent<N, S, C> {
    page: Page,
    selection: SelectionSession,
    crawler: BulkCrawler<N, S, C>,
    events: UnboundedSender<Event>,
    highlight_duration: Duration,
}

impl<N, S, C> Agent<N, S, C>
where
    N: Navigator,
    S: RecordStore,
    C: CheckpointStore,
{
    /// Takes over `page`. Crawl progress is reported on `events` as well.
    pub fn new(
        page: Page,
        crawler: BulkCrawler<N, S, C>,
        events: UnboundedSender<Event>,
        opts: &Options,
    ) -> Self {
        Self {
            page,
            selection: SelectionSession::new(opts.sample_length),
            crawler: crawler.with_events(events.clone()),
            events,
            highlight_duration: opts.highlight_duration,
        }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn selection(&self) -> &SelectionSession {
        &self.selection
    }

    pub fn crawler(&self) -> &BulkCrawler<N, S, C> {
        &self.crawler
    }

    pub fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::StartSelection { field_label, reply } => {
                self.selection.start(field_label);
                let _ = reply.send(());
            }
            Command::StopSelection { reply } => {
                self.selection.stop();
                let _ = reply.send(());
            }
            Command::ExtractFields { mapping, reply } => {
                let result = extract_fields(&self.page, &mapping);
                let highlighted = highlight_fields(&self.page, &mapping, self.highlight_duration);
                debug!(fields = result.len(), highlighted, "fields extracted");
                let _ = reply.send(result);
            }
            Command::StartBulkCrawl {
                list_selector,
                mapping,
                store_config_id,
                reply,
            } => {
                let started = self
                    .crawler
                    .start(&self.page, &list_selector, &mapping, &store_config_id);
                let _ = reply.send(started);
            }
            Command::StopBulkCrawl { reply } => {
                let stopped = match self.crawler.stop() {
                    Ok(stopped) => stopped,
                    Err(e) => {
                        warn!(error = %e, "failed to record stop");
                        false
                    }
                };
                let _ = reply.send(stopped);
            }
        }
    }

    /// Routes one page input through the selection session.
    pub fn handle_input(&mut self, input: &PageInput) -> Dispatch {
        let dispatch = self.selection.handle(&self.page, input);
        if let Some(event) = &dispatch.event {
            let _ = self.events.send(event.clone());
        }
        dispatch
    }

    /// Replaces the current page after a navigation and gives a crawl the chance to resume.
    pub async fn page_loaded(&mut self, page: Page) -> Result<VisitOutcome, CrawlError> {
        self.selection.stop();
        self.page = page;
        self.crawler.on_page_load(&self.page).await
    }

    /// Serves commands and inputs until the command channel closes.
    ///
    /// While a crawl is recorded the agent steps it, draining queued messages
    /// between steps so a stop is seen at the next boundary.
    pub async fn run(
        mut self,
        mut commands: UnboundedReceiver<Command>,
        mut inputs: UnboundedReceiver<PageInput>,
    ) -> Result<(), CrawlError> {
        loop {
            if self.crawler.state()?.is_some() {
                while let Ok(cmd) = commands.try_recv() {
                    self.handle_command(cmd);
                }
                while let Ok(input) = inputs.try_recv() {
                    self.handle_input(&input);
                }
                match self.crawler.visit_next().await? {
                    Step::Loaded(page) => {
                        self.page_loaded(page).await?;
                    }
                    Step::Skipped | Step::Finished(_) => {}
                }
                continue;
            }

            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => return Ok(()),
                },
                Some(input) = inputs.recv() => {
                    self.handle_input(&input);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawl::MemoryCheckpoint;
    use crate::events::CrawlEvent;
    use crate::mapping::field;
    use crate::resource::StaticNavigator;
    use crate::selection::Propagation;
    use crate::store::MemoryStore;
    use std::sync::Arc;
    use tokio::sync::mpsc;
    use url::Url;

    type TestAgent = Agent<StaticNavigator, Arc<MemoryStore>, MemoryCheckpoint>;

    fn list_page() -> Page {
        Page::parse(
            Url::parse("https://crm.example.com/list").unwrap(),
            r#"<h1 id="title">Customers</h1>
               <ul><li class="row"><a href="/c/1">1</a></li><li class="row"><a href="/c/2">2</a></li></ul>"#,
        )
    }

    fn agent(store: Arc<MemoryStore>) -> (TestAgent, mpsc::UnboundedReceiver<Event>) {
        let opts = Options::default();
        let nav = StaticNavigator::new()
            .with_page(
                "https://crm.example.com/c/1",
                r#"<h1>Ali</h1><b class="tel" data-content="0555 111 11 11"></b>"#,
            )
            .with_page(
                "https://crm.example.com/c/2",
                r#"<h1>Ayse</h1><b class="tel" data-content="0555 222 22 22"></b>"#,
            );
        let crawler = BulkCrawler::new(nav, store, MemoryCheckpoint::new(), &opts);
        let (tx, rx) = mpsc::unbounded_channel();
        (Agent::new(list_page(), crawler, tx, &opts), rx)
    }

    fn mapping() -> FieldMapping {
        FieldMapping::new()
            .with(field::FULL_NAME, "h1")
            .with(field::PHONE, "b.tel")
    }

    #[tokio::test]
    async fn test_extract_fields_replies_and_highlights() {
        let (mut agent, _events) = agent(Arc::new(MemoryStore::new()));
        let (cmd, reply) = Command::extract_fields(
            FieldMapping::new()
                .with(field::FULL_NAME, "#title")
                .with(field::EMAIL, ".missing"),
        );
        agent.handle_command(cmd);

        let result = reply.await.unwrap();
        assert_eq!(result.full_name(), "Customers");
        assert_eq!(result.get(field::EMAIL), "");
        assert_eq!(agent.page().highlighted().len(), 1);
    }

    #[tokio::test]
    async fn test_selection_round_trip() {
        let (mut agent, mut events) = agent(Arc::new(MemoryStore::new()));
        let (cmd, reply) = Command::start_selection("full_name");
        agent.handle_command(cmd);
        reply.await.unwrap();
        assert!(agent.selection().is_active());

        let target = agent.page().select_first("#title").unwrap().id();
        let dispatch = agent.handle_input(&PageInput::Click { target });
        assert_eq!(dispatch.propagation, Propagation::Suppressed);
        assert_eq!(
            events.try_recv().unwrap(),
            Event::ElementSelected {
                field: "full_name".to_string(),
                selector: "#title".to_string(),
                sample_value: "Customers".to_string(),
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigation_ends_selection() {
        let (mut agent, _events) = agent(Arc::new(MemoryStore::new()));
        agent.handle_command(Command::start_selection("phone").0);
        let outcome = agent.page_loaded(list_page()).await.unwrap();
        assert_eq!(outcome, VisitOutcome::NotResuming);
        assert!(!agent.selection().is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_drives_crawl_to_completion() {
        let store = Arc::new(MemoryStore::new());
        let (agent, mut events) = agent(store.clone());
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (_input_tx, input_rx) = mpsc::unbounded_channel();

        let (cmd, started) = Command::start_bulk_crawl("li.row", mapping(), "cfg");
        cmd_tx.send(cmd).unwrap();
        drop(cmd_tx);

        agent.run(cmd_rx, input_rx).await.unwrap();
        assert_eq!(started.await.unwrap().unwrap(), 2);
        assert_eq!(store.len(), 2);

        let mut last = None;
        while let Ok(event) = events.try_recv() {
            last = Some(event);
        }
        assert_eq!(
            last,
            Some(Event::Crawl(CrawlEvent::Finished(crate::events::CrawlSummary {
                extracted_count: 2,
                total_count: 2,
                stopped: false,
            })))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_command_between_steps() {
        let store = Arc::new(MemoryStore::new());
        let (agent, _events) = agent(store.clone());
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (_input_tx, input_rx) = mpsc::unbounded_channel();

        let (start, started) = Command::start_bulk_crawl("li.row", mapping(), "cfg");
        let (stop, stopped) = Command::stop_bulk_crawl();
        cmd_tx.send(start).unwrap();
        cmd_tx.send(stop).unwrap();
        drop(cmd_tx);

        agent.run(cmd_rx, input_rx).await.unwrap();
        assert_eq!(started.await.unwrap().unwrap(), 2);
        assert!(stopped.await.unwrap());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_start_bulk_crawl_reports_discovery_error() {
        let (mut agent, _events) = agent(Arc::new(MemoryStore::new()));
        let (cmd, reply) = Command::start_bulk_crawl("table.none a", mapping(), "cfg");
        agent.handle_command(cmd);
        let err = reply.await.unwrap().unwrap_err();
        assert!(err.is_discovery());
        assert!(agent.crawler().state().unwrap().is_none());
    }
}
