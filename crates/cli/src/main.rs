// ABOUTME: CLI for the fieldhand extraction engine.
// ABOUTME: Extracts one page, synthesizes selectors, runs resumable bulk crawls and exports records to CSV.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use fieldhand::config::find_for_url;
use fieldhand::selection::PageInput;
use fieldhand::store::jsonl::read_records;
use fieldhand::{
    export_csv, extract_fields, BulkCrawler, Event, ExportRow, FieldMapping, FileCheckpoint,
    HttpNavigator, JsonlStore, Navigator, Options, Page, RecordStore, RestStore, SelectionSession,
    SiteConfig,
};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "fieldhand")]
#[command(about = "Extract customer records from web pages with CSS selectors")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply a field mapping to one page and print the values as JSON
    Extract {
        #[command(flatten)]
        page: PageArgs,
        #[command(flatten)]
        mapping: MappingArgs,
    },
    /// Build a selector for the element matched by --selector, as if it was clicked
    Pick {
        #[command(flatten)]
        page: PageArgs,
        /// Element to pick, e.g. a selector copied from devtools
        #[arg(long)]
        selector: String,
        /// Field name reported with the pick
        #[arg(long, default_value = "")]
        field: String,
    },
    /// Visit every detail link of a list page and store one record per page
    Crawl(CrawlArgs),
    /// Convert a JSON-lines record file to CSV
    Export {
        /// Records written by `crawl --output`
        #[arg(long)]
        input: PathBuf,
        /// Site config(s) used to prefix notes with the site name
        #[arg(long)]
        config: Option<PathBuf>,
        /// Output file path (default: stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct PageArgs {
    /// Page URL. Fetched unless --html is given
    #[arg(long)]
    url: Option<String>,

    /// Read the page from this HTML file (--url is still used as its address)
    #[arg(long)]
    html: Option<PathBuf>,

    /// Allow fetching from private/local networks
    #[arg(long = "allow-private-networks")]
    allow_private_networks: bool,
}

#[derive(Args, Debug)]
struct MappingArgs {
    /// Site config JSON, a single object or an array; the one matching the page URL is used
    #[arg(long)]
    config: Option<PathBuf>,

    /// Field mapping entry as field=selector; overrides the config
    #[arg(long = "map", value_parser = parse_pair)]
    map: Vec<(String, String)>,
}

#[derive(Args, Debug)]
struct CrawlArgs {
    #[command(flatten)]
    page: PageArgs,
    #[command(flatten)]
    mapping: MappingArgs,

    /// Selector for the list rows; defaults to the mapping's customer_list
    #[arg(long)]
    list_selector: Option<String>,

    /// Site config id stored with each record
    #[arg(long)]
    config_id: Option<String>,

    /// Append records to this JSON-lines file; takes precedence over --store-url
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// REST store base URL
    #[arg(long, env = "FIELDHAND_STORE_URL")]
    store_url: Option<String>,

    /// REST store API key
    #[arg(long, env = "FIELDHAND_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// REST table name
    #[arg(long, default_value = fieldhand::store::rest::DEFAULT_TABLE)]
    table: String,

    /// Crawl progress file, kept until the crawl finishes
    #[arg(long, default_value = "fieldhand-crawl.json")]
    checkpoint: PathBuf,

    /// Continue the crawl recorded in --checkpoint instead of starting one
    #[arg(long)]
    resume: bool,

    /// Wait after each page load, in milliseconds
    #[arg(long, default_value_t = 1000)]
    settle_ms: u64,

    /// Wait between pages, in milliseconds
    #[arg(long, default_value_t = 1500)]
    pacing_ms: u64,
}

fn parse_pair(raw: &str) -> Result<(String, String), String> {
    let (field, selector) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected field=selector, got {:?}", raw))?;
    let field = field.trim();
    if field.is_empty() {
        return Err(format!("missing field name in {:?}", raw));
    }
    Ok((field.to_string(), selector.trim().to_string()))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fieldhand=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

async fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Extract { page, mapping } => {
            let opts = page.options().build();
            let page = page.load(&opts).await?;
            let (mapping, _) = mapping.resolve(page.url())?;
            let result = extract_fields(&page, &mapping);
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Pick {
            page,
            selector,
            field,
        } => {
            let opts = page.options().build();
            let page = page.load(&opts).await?;
            let target = page
                .select_first(&selector)
                .ok_or_else(|| anyhow!("selector {:?} matched nothing", selector))?
                .id();

            let mut session = SelectionSession::new(opts.sample_length);
            session.start(field);
            let dispatch = session.handle(&page, &PageInput::Click { target });
            let event = dispatch
                .event
                .ok_or_else(|| anyhow!("selection produced no result"))?;
            println!("{}", serde_json::to_string_pretty(&event)?);
        }
        Commands::Crawl(args) => crawl(args).await?,
        Commands::Export {
            input,
            config,
            output,
        } => {
            let records = read_records(&input)
                .with_context(|| format!("reading {}", input.display()))?;
            let sites: HashMap<String, String> = match config {
                Some(path) => SiteConfig::load_all(&path)?
                    .into_iter()
                    .map(|c| (c.id, c.site_name))
                    .collect(),
                None => HashMap::new(),
            };
            let csv = export_csv(records.iter().map(|stored| {
                let site = sites.get(&stored.record.site_config_id).map(String::as_str);
                ExportRow::new(&stored.record, site)
            }))?;
            match output {
                Some(path) => fs::write(&path, csv)
                    .with_context(|| format!("writing {}", path.display()))?,
                None => print!("{}", csv),
            }
        }
    }
    Ok(())
}

async fn crawl(args: CrawlArgs) -> Result<()> {
    let opts = args
        .page
        .options()
        .settle_delay(Duration::from_millis(args.settle_ms))
        .pacing_delay(Duration::from_millis(args.pacing_ms))
        .build();

    let store: Box<dyn RecordStore> = match (&args.output, &args.store_url) {
        (Some(path), _) => Box::new(JsonlStore::new(path)),
        (None, Some(base)) => {
            let key = args
                .api_key
                .clone()
                .ok_or_else(|| anyhow!("--api-key (or FIELDHAND_API_KEY) is required with --store-url"))?;
            Box::new(RestStore::new(base, key)?.table(&args.table)?)
        }
        (None, None) => bail!("choose a record store with --output or --store-url"),
    };

    let navigator = HttpNavigator::new(&opts)?;
    let checkpoint = FileCheckpoint::new(&args.checkpoint);
    let (tx, mut rx) = mpsc::unbounded_channel();

    if args.resume {
        let crawler = BulkCrawler::new(navigator, store, checkpoint, &opts).with_events(tx);
        let crawl = async move { crawler.resume().await };
        let (summary, ()) = tokio::join!(crawl, print_events(&mut rx));
        summary?;
        return Ok(());
    }

    let list = args.page.load_with(&navigator).await?;
    let (mapping, site) = args.mapping.resolve(list.url())?;
    let list_selector = args
        .list_selector
        .clone()
        .or_else(|| mapping.list_selector().map(str::to_string))
        .ok_or_else(|| anyhow!("no list selector: pass --list-selector or map customer_list"))?;
    let config_id = args
        .config_id
        .clone()
        .or_else(|| site.map(|s| s.id))
        .unwrap_or_default();

    let crawler = BulkCrawler::new(navigator, store, checkpoint, &opts).with_events(tx);
    crawler.start(&list, &list_selector, &mapping, &config_id)?;
    let crawl = async move { crawler.run(&list).await };
    let (summary, ()) = tokio::join!(crawl, print_events(&mut rx));
    summary?;
    Ok(())
}

/// Prints crawl progress lines until the crawler drops its sender.
async fn print_events(rx: &mut mpsc::UnboundedReceiver<Event>) {
    while let Some(event) = rx.recv().await {
        if let Event::Crawl(event) = event {
            println!("{}", event);
        }
    }
}

impl PageArgs {
    fn options(&self) -> fieldhand::OptionsBuilder {
        Options::builder().allow_private_networks(self.allow_private_networks)
    }

    fn url(&self) -> Result<Url> {
        let raw = self
            .url
            .as_deref()
            .ok_or_else(|| anyhow!("--url is required"))?;
        Url::parse(raw).with_context(|| format!("invalid --url {:?}", raw))
    }

    fn read_html(&self) -> Result<Option<Page>> {
        let Some(path) = &self.html else {
            return Ok(None);
        };
        let html =
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        Ok(Some(Page::parse(self.url()?, &html)))
    }

    async fn load(&self, opts: &Options) -> Result<Page> {
        self.load_with(&HttpNavigator::new(opts)?).await
    }

    async fn load_with<N: Navigator>(&self, navigator: &N) -> Result<Page> {
        match self.read_html()? {
            Some(page) => Ok(page),
            None => Ok(navigator.navigate(&self.url()?).await?),
        }
    }
}

impl MappingArgs {
    /// The config matching `page_url` (if any) with --map entries applied on top.
    fn resolve(&self, page_url: &Url) -> Result<(FieldMapping, Option<SiteConfig>)> {
        let site = match &self.config {
            Some(path) => {
                let configs = SiteConfig::load_all(path)?;
                let found = find_for_url(&configs, page_url).cloned();
                if found.is_none() {
                    tracing::warn!(url = %page_url, "no site config matches this page");
                }
                found
            }
            None => None,
        };

        let mut mapping = site
            .as_ref()
            .map(|s| s.field_mappings.clone())
            .unwrap_or_default();
        for (field, selector) in &self.map {
            mapping.insert(field.clone(), selector.clone());
        }
        if mapping.is_empty() {
            bail!("empty field mapping: pass --config or --map field=selector");
        }
        Ok((mapping, site))
    }
}
