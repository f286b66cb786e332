//! Command-line driver over a saved ads library page.
//!
//! `filter` runs one filter pass, `advertisers` lists ranked advertiser
//! candidates per scan card, and `scan` runs a full sequential scan against
//! an in-process background that answers from a JSON map of handle to ad
//! count.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use adscout::advertiser::{self, ExtractorConfig};
use adscout::cache::{CacheStore, FileStore, MemoryStore};
use adscout::channel;
use adscout::dom::{self, NodeId};
use adscout::protocol::{CheckAdvertiser, CheckAdvertiserResponse, Command, LookupResult};
use adscout::scan::collect_scan_cards;
use adscout::scope::LookupScope;
use adscout::url_utils;
use adscout::{Options, PageAgent, PageHost, Result};
use clap::{Args, Parser, Subcommand};
use log::{debug, error, info};
use serde::Serialize;

#[derive(Debug, Parser)]
#[command(name = "adscout")]
#[command(about = "Filter ad cards and check advertiser ad volume on a saved page", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one filter pass and print the outcome
    Filter(PageArgs),
    /// Print ranked advertiser candidates for every scan card
    Advertisers(PageArgs),
    /// Run a full advertiser scan against a JSON map of handle -> ad count
    Scan(ScanArgs),
}

#[derive(Debug, Args)]
struct PageArgs {
    /// Saved HTML page
    html: PathBuf,
    /// URL the page was served from (sets country and date window)
    #[arg(long, default_value = "https://www.facebook.com/ads/library/")]
    page_url: String,
    /// Options JSON file; missing fields keep their defaults
    #[arg(long)]
    config: Option<PathBuf>,
    /// Write the resulting HTML here
    #[arg(long, short)]
    output: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ScanArgs {
    #[command(flatten)]
    page: PageArgs,
    /// JSON object mapping advertiser handles to ad counts
    #[arg(long)]
    counts: PathBuf,
    /// Persistent lookup cache file
    #[arg(long)]
    cache: Option<PathBuf>,
    /// Pause between lookups in milliseconds (overrides the config)
    #[arg(long)]
    delay_ms: Option<u64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CardAdvertisers {
    card: usize,
    candidates: Vec<CandidateOutput>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CandidateOutput {
    username: String,
    profile_url: String,
    priority_score: u32,
}

/// The CLI has no live page to dispatch clicks on.
struct DetachedHost;

impl PageHost for DetachedHost {
    fn click(&self, node: NodeId) {
        debug!("click on {node:?} not dispatched (no live page)");
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Filter(args) => run_filter(&args),
        Commands::Advertisers(args) => run_advertisers(&args),
        Commands::Scan(args) => run_scan(&args),
    };

    if let Err(err) = result {
        error!("Error: {err}");
        std::process::exit(1);
    }
}

fn load_options(path: Option<&Path>) -> Result<Options> {
    match path {
        Some(path) => Options::from_json(&fs::read_to_string(path)?),
        None => Ok(Options::default()),
    }
}

fn write_html(doc: &dom::Document, output: Option<&Path>) -> Result<()> {
    if let Some(path) = output {
        fs::write(path, doc.html().as_bytes())?;
        info!("wrote {}", path.display());
    }
    Ok(())
}

fn run_filter(args: &PageArgs) -> Result<()> {
    let options = load_options(args.config.as_deref())?;
    let html = fs::read_to_string(&args.html)?;
    let agent = PageAgent::new(&html, &args.page_url, options, Box::new(MemoryStore::new()))?;

    let outcome = agent.on_load();
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    write_html(agent.document(), args.output.as_deref())
}

fn run_advertisers(args: &PageArgs) -> Result<()> {
    let options = load_options(args.config.as_deref())?;
    let html = fs::read_to_string(&args.html)?;
    let doc = dom::parse(&html);
    let config = ExtractorConfig::from_options(&options)?;

    let cards: Vec<CardAdvertisers> = collect_scan_cards(&doc, options.min_ad_text_len)
        .into_iter()
        .enumerate()
        .filter_map(|(index, id)| {
            let card = dom::node_by_id(&doc, id)?;
            let candidates = advertiser::extract_advertisers(&card, &config)
                .into_iter()
                .map(|c| CandidateOutput {
                    username: c.username,
                    profile_url: c.profile_url,
                    priority_score: c.priority_score,
                })
                .collect();
            Some(CardAdvertisers {
                card: index + 1,
                candidates,
            })
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&cards)?);
    Ok(())
}

fn run_scan(args: &ScanArgs) -> Result<()> {
    let mut options = load_options(args.page.config.as_deref())?;
    if let Some(delay) = args.delay_ms {
        options.check_delay_ms = delay;
    }
    let html = fs::read_to_string(&args.page.html)?;
    let counts: HashMap<String, u64> = serde_json::from_str(&fs::read_to_string(&args.counts)?)?;
    let store: Box<dyn CacheStore> = match &args.cache {
        Some(path) => Box::new(FileStore::open(path)?),
        None => Box::new(MemoryStore::new()),
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;

    runtime.block_on(async {
        let library_url = options.ads_library_url.clone();
        let agent = PageAgent::new(&html, &args.page.page_url, options, store)?;
        agent.on_load();

        let (page_side, endpoint) = channel::pair();
        let background = tokio::spawn(endpoint.serve(move |request| {
            answer_lookup(&counts, &library_url, request)
        }));

        let reply = agent
            .handle_command(Command::CheckAdvertisers, &page_side, &DetachedHost)
            .await;
        drop(page_side);
        match background.await {
            Ok(served) => info!("background answered {served} lookups"),
            Err(e) => error!("background task failed: {e}"),
        }

        println!("{}", serde_json::to_string_pretty(&reply)?);
        write_html(agent.document(), args.page.output.as_deref())
    })
}

fn answer_lookup(
    counts: &HashMap<String, u64>,
    library_url: &str,
    request: &CheckAdvertiser,
) -> CheckAdvertiserResponse {
    let Some(count) = counts.get(&request.advertiser) else {
        return CheckAdvertiserResponse::failed(format!("unknown advertiser {}", request.advertiser));
    };
    let scope = LookupScope {
        country: request.country.clone(),
        date_range: request.date_range.clone(),
    };
    match url_utils::ads_library_url(library_url, &request.advertiser, &scope) {
        Ok(url) => CheckAdvertiserResponse::found(LookupResult { count: *count, url }),
        Err(e) => CheckAdvertiserResponse::failed(e.to_string()),
    }
}
