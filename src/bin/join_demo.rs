//! # Join Demo
//!
//! Runs a simulated crawl on a tokio `LocalSet`: each page fetch completes
//! after a delay that is shorter for later pages, and each page registers
//! fetches for its links from inside its callback. The joined output still
//! follows page/link structure, which the printed JSON report makes visible.

use anyhow::Context as _;
use clap::Parser;
use cps_join::{logging, CompletionError, Continuation, Join, JoinConfig, JoinStats, LocalScheduler};
use serde::Serialize;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;
use tokio::task::LocalSet;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "join-demo")]
#[command(about = "Join a tree of simulated asynchronous fetches")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Number of top-level pages
    #[arg(short, long, default_value_t = 3)]
    pages: u32,

    /// Links fetched from every page
    #[arg(short, long, default_value_t = 2)]
    links: u32,

    /// Make this fetch fail, e.g. "page-1/link-0"
    #[arg(long)]
    fail: Option<String>,

    /// Configuration file (toml, yaml or json)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Serialize)]
struct Report {
    outcome: &'static str,
    results: Vec<String>,
    error: Option<String>,
    stats: JoinStats,
}

struct CrawlPlan {
    links: u32,
    fail: Option<String>,
}

impl CrawlPlan {
    fn fails(&self, url: &str) -> bool {
        self.fail.as_deref() == Some(url)
    }
}

type Fetch = Continuation<String, String, String>;

fn spawn_fetch(url: String, delay: Duration, fail: bool, done: Fetch) {
    tokio::task::spawn_local(async move {
        tokio::time::sleep(delay).await;
        let outcome = if fail {
            Err(format!("fetch failed: {url}"))
        } else {
            Ok(url)
        };
        if let Err(err) = done.complete(outcome) {
            error!(error = %err, "fetch continuation misused");
        }
    });
}

async fn crawl(cli: Cli) -> anyhow::Result<Report> {
    // A join with nothing registered never completes
    anyhow::ensure!(cli.pages > 0, "nothing to crawl: --pages must be positive");

    let scheduler = Rc::new(LocalScheduler::new());
    let (join, completion) = Join::<String, String>::completion(scheduler);
    let join = join.named("crawl");

    let plan = Rc::new(CrawlPlan {
        links: cli.links,
        fail: cli.fail,
    });

    for page in 0..cli.pages {
        let url = format!("page-{page}");
        let page_plan = Rc::clone(&plan);

        let done = join.register(move |scope: &Join<String, String>, body: String| {
            for link in 0..page_plan.links {
                let link_url = format!("{body}/link-{link}");
                let delay = Duration::from_millis(u64::from(page_plan.links - link) * 5);
                match scope.register_value() {
                    Ok(done) => {
                        let fail = page_plan.fails(&link_url);
                        spawn_fetch(link_url, delay, fail, done);
                    }
                    Err(err) => error!(error = %err, "could not register link fetch"),
                }
            }
            Some(body)
        })?;

        let delay = Duration::from_millis(u64::from(cli.pages - page) * 20);
        let fail = plan.fails(&url);
        spawn_fetch(url, delay, fail, done);
    }

    info!(pages = cli.pages, links = cli.links, "crawl started");

    let outcome = completion.await;
    let stats = join.stats();

    match outcome {
        Ok(results) => Ok(Report {
            outcome: "complete",
            results,
            error: None,
            stats,
        }),
        Err(CompletionError::Failed(err)) => Ok(Report {
            outcome: "error",
            results: Vec::new(),
            error: Some(err),
            stats,
        }),
        Err(CompletionError::Abandoned) => anyhow::bail!("crawl abandoned before completion"),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = JoinConfig::load(cli.config.as_deref()).context("loading configuration")?;
    logging::init_structured_logging(&config);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;
    let local = LocalSet::new();
    let report = runtime.block_on(local.run_until(crawl(cli)))?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
