use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use colored::*;
use newsroom_pipeline::config::Config;
use newsroom_pipeline::discoverer::{EditionDiscoverer, PublicationResolver};
use newsroom_pipeline::downloader::DownloadOrchestrator;
use newsroom_pipeline::object_cache::ObjectCache;
use newsroom_pipeline::types::MetricKind;
use newsroom_pipeline::{analytics, db, extractor, ingest, summarizer, vector_index, ReqwestPageFetcher};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "newsroom-pipeline")]
#[command(version = "1.0.0")]
#[command(about = "Local-news ingestion, extraction, summarization and analytics pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Fail fast if required configuration (e.g. DATABASE_URL) is unset.
    #[arg(long, global = true)]
    strict_config: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover and download a publication's edition for a single day.
    RunDaily {
        #[arg(long)]
        publication: String,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        force_refresh: bool,
    },

    /// Discover and download a publication's editions over a date range.
    Backfill {
        #[arg(long)]
        publication: String,
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
    },

    /// Run the Summarizer over extracted articles.
    Summarize,

    /// Aggregate daily metrics, compute trending, and produce a baseline forecast.
    Analytics {
        #[arg(long, default_value_t = 1)]
        days: i64,
    },

    /// Sync recently-summarized articles to the vector index.
    Reindex {
        #[arg(long, default_value_t = 12)]
        hours: i64,
    },

    /// Poll the Reddit/NWS/Facebook ancillary ingesters once.
    Ingest {
        #[command(subcommand)]
        source: IngestSource,
    },
}

#[derive(Subcommand)]
enum IngestSource {
    Reddit {
        #[arg(long, default_value_t = 25)]
        limit: u32,
    },
    Nws,
    Facebook,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match Config::from_env(cli.strict_config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{} {}", "✘".red(), format!("config error: {e}").red());
            std::process::exit(1);
        }
    };

    if let Err(e) = db::init_schema(&config) {
        eprintln!("{} {}", "✘".red(), format!("schema init failed: {e}").red());
        std::process::exit(1);
    }

    let result = run(&config, cli.command).await;
    if let Err(e) = result {
        eprintln!("{} {}", "✘".red(), format!("{e}").red());
        std::process::exit(1);
    }
}

async fn run(config: &Config, command: Commands) -> newsroom_pipeline::error::Result<()> {
    match command {
        Commands::RunDaily {
            publication,
            date,
            force_refresh,
        } => {
            let date = date.unwrap_or_else(|| Utc::now().date_naive());
            run_edition(config, &publication, date, force_refresh).await?;
        }
        Commands::Backfill { publication, from, to } => {
            let mut date = from;
            while date <= to {
                run_edition(config, &publication, date, false).await?;
                date += chrono::Duration::days(1);
            }
        }
        Commands::Summarize => {
            summarizer::run(config).await?;
        }
        Commands::Analytics { days } => {
            analytics::aggregate_daily_metrics(config, days)?;
            analytics::compute_trending(config, days, 7)?;
            let today = Utc::now().date_naive();
            for kind in MetricKind::all() {
                analytics::forecast_baseline(config, kind, today)?;
            }
        }
        Commands::Reindex { hours } => {
            let backend = vector_index::build_backend(config);
            vector_index::sync(config, hours, backend.as_ref()).await?;
        }
        Commands::Ingest { source } => match source {
            IngestSource::Reddit { limit } => {
                ingest::reddit::ingest(config, limit).await?;
            }
            IngestSource::Nws => {
                ingest::nws::ingest(config).await?;
            }
            IngestSource::Facebook => {
                ingest::facebook::ingest(config).await?;
            }
        },
    }
    Ok(())
}

async fn run_edition(
    config: &Config,
    publication: &str,
    date: NaiveDate,
    force_refresh: bool,
) -> newsroom_pipeline::error::Result<()> {
    println!("{}", format!("▶ Running edition {publication} / {date}").cyan());

    let cache = Arc::new(ObjectCache::new(config).await?);
    let resolver = PublicationResolver::new(Default::default(), publication.to_string());
    let discoverer = EditionDiscoverer::new(ReqwestPageFetcher::new(), resolver);
    let pages = discoverer.discover(date, publication).await?;

    let orchestrator = DownloadOrchestrator::new(config, cache.clone());
    let (report, _outcome) = orchestrator
        .download_edition(date, publication, pages, force_refresh)
        .await;
    println!(
        "{}",
        format!(
            "  downloaded {}/{} pages ({:.0}% success)",
            report.successful,
            report.total_pages,
            report.success_rate() * 100.0
        )
        .blue()
    );

    extractor::run(config, &cache, date).await?;
    Ok(())
}
