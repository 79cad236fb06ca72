// ABOUTME: Configuration options for fieldhand: crawl pacing, selection sampling and fetch settings.
// ABOUTME: OptionsBuilder provides a fluent API for constructing Options with custom settings.

use std::collections::HashMap;
use std::time::Duration;

/// Wait after a navigation before extracting, so the destination can render.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(1000);

/// Wait between visits, to stay below anti-automation thresholds.
pub const DEFAULT_PACING_DELAY: Duration = Duration::from_millis(1500);

/// How long matched elements stay highlighted after an extraction.
pub const DEFAULT_HIGHLIGHT_DURATION: Duration = Duration::from_secs(2);

/// Maximum characters reported as the sample value of a picked element.
pub const DEFAULT_SAMPLE_LENGTH: usize = 100;

/// Configuration shared by the navigator, field mapper, selection session and crawler.
#[derive(Debug, Clone)]
pub struct Options {
    pub settle_delay: Duration,
    pub pacing_delay: Duration,
    pub highlight_duration: Duration,
    pub sample_length: usize,
    pub timeout: Duration,
    pub user_agent: String,
    pub allow_private_networks: bool,
    pub fetch_stylesheets: bool,
    pub headers: HashMap<String, String>,
    pub http_client: Option<reqwest::Client>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            settle_delay: DEFAULT_SETTLE_DELAY,
            pacing_delay: DEFAULT_PACING_DELAY,
            highlight_duration: DEFAULT_HIGHLIGHT_DURATION,
            sample_length: DEFAULT_SAMPLE_LENGTH,
            timeout: Duration::from_secs(30),
            user_agent: "Fieldhand/0.1".to_string(),
            allow_private_networks: false,
            fetch_stylesheets: true,
            headers: HashMap::new(),
            http_client: None,
        }
    }
}

impl Options {
    pub fn builder() -> OptionsBuilder {
        OptionsBuilder::new()
    }
}

/// Builder for constructing Options with custom configuration.
#[derive(Debug, Clone)]
pub struct OptionsBuilder {
    opts: Options,
}

impl OptionsBuilder {
    /// Create a new OptionsBuilder with default options.
    pub fn new() -> Self {
        Self {
            opts: Options::default(),
        }
    }

    /// Set the wait between a navigation and the extraction on the new page.
    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.opts.settle_delay = delay;
        self
    }

    /// Set the wait between two visits.
    pub fn pacing_delay(mut self, delay: Duration) -> Self {
        self.opts.pacing_delay = delay;
        self
    }

    /// Disable both crawl delays. Useful for local files and tests.
    pub fn no_delays(self) -> Self {
        self.settle_delay(Duration::ZERO).pacing_delay(Duration::ZERO)
    }

    pub fn highlight_duration(mut self, duration: Duration) -> Self {
        self.opts.highlight_duration = duration;
        self
    }

    pub fn sample_length(mut self, len: usize) -> Self {
        self.opts.sample_length = len;
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.opts.timeout = timeout;
        self
    }

    /// Set the User-Agent header.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.opts.user_agent = user_agent.into();
        self
    }

    /// Allow or disallow requests to private networks.
    pub fn allow_private_networks(mut self, allow: bool) -> Self {
        self.opts.allow_private_networks = allow;
        self
    }

    /// Fetch `<link rel="stylesheet">` targets so pseudo-element content can be resolved.
    pub fn fetch_stylesheets(mut self, fetch: bool) -> Self {
        self.opts.fetch_stylesheets = fetch;
        self
    }

    /// Add a custom header to all requests.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.opts.headers.insert(key.into(), value.into());
        self
    }

    /// Use a custom HTTP client.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.opts.http_client = Some(client);
        self
    }

    pub fn build(self) -> Options {
        self.opts
    }
}

impl Default for OptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}
