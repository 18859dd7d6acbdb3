//! # Article Harvest
//!
//! Three small pipelines around one news site and its downstream agent:
//!
//! - **listing**: walk a paginated news listing in a headless browser, visit
//!   every linked article, and write title/date/author/body records as JSON
//! - **extract**: render arbitrary article URLs, prune them down to markdown,
//!   and have a hosted language model pull out title/date/author/body
//! - **dashboard**: print the article status tables from Postgres, then chat
//!   with the agent webhook
//!
//! ## Usage
//!
//! ```sh
//! article_harvest listing -o caioconnect_articles.json
//! LLM_API_TOKEN=... article_harvest extract https://example.com/story.html
//! article_harvest dashboard --no-tables
//! ```

use clap::Parser;
use reqwest::Client;
use std::error::Error;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod browser;
mod cli;
mod config;
mod content;
mod dashboard;
mod extract;
mod models;
mod outputs;
mod scrapers;
mod utils;

use api::{ChatCompletionsClient, LlmConfig};
use browser::ChromeRenderer;
use cli::{Cli, Command, DashboardArgs, ExtractArgs, ListingArgs};
use config::Settings;
use dashboard::db::DbParams;
use extract::{Crawler, ExtractionStrategy, run_bulk_extraction};
use outputs::json;
use utils::{ensure_writable_parent, parse_url_list};

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("article_harvest starting up");

    let args = Cli::parse();
    debug!(config = ?args.config, "Parsed CLI arguments");

    let settings = Settings::load(args.config.as_deref()).await?;

    match args.command {
        Command::Listing(listing) => run_listing(settings, listing).await?,
        Command::Extract(extract) => run_extract(settings, extract).await?,
        Command::Dashboard(dash) => run_dashboard(settings, dash).await?,
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(())
}

#[instrument(level = "info", skip_all)]
async fn run_listing(mut settings: Settings, args: ListingArgs) -> Result<(), Box<dyn Error>> {
    if let Some(base_url) = args.base_url {
        settings.listing.base_url = base_url;
    }
    if let Some(output) = args.output {
        settings.listing.output = output;
    }
    if args.max_pages.is_some() {
        settings.listing.max_pages = args.max_pages;
    }

    // Early check: fail before spending minutes in the browser
    if let Err(e) = ensure_writable_parent(&settings.listing.output).await {
        error!(path = %settings.listing.output, error = %e, "Output location is not writable");
        return Err(e);
    }

    let renderer = ChromeRenderer::launch(&settings.browser).await?;
    let scraped = scrapers::listing::scrape_site(&renderer, &settings.listing).await;
    if let Err(e) = renderer.close().await {
        warn!(error = %e, "Browser did not shut down cleanly");
    }
    let records = scraped?;

    if records.is_empty() {
        warn!("No articles found; nothing written");
        return Ok(());
    }
    json::write_records(&records, &settings.listing.output, 4).await?;
    info!(
        count = records.len(),
        path = %settings.listing.output,
        "Saved articles"
    );
    Ok(())
}

#[instrument(level = "info", skip_all)]
async fn run_extract(mut settings: Settings, args: ExtractArgs) -> Result<(), Box<dyn Error>> {
    if let Some(output) = args.output {
        settings.extract.output = output;
    }
    if let Some(provider) = args.provider {
        settings.extract.provider = provider;
    }
    if let Some(threshold) = args.threshold {
        settings.extract.pruning.threshold = threshold;
    }

    let mut urls = args.urls;
    if let Some(path) = &args.urls_file {
        let raw = tokio::fs::read_to_string(path).await?;
        urls.extend(parse_url_list(&raw));
    }
    if urls.is_empty() {
        urls = settings.extract.urls.clone();
    }
    if urls.is_empty() {
        return Err("no URLs given (pass them as arguments, --urls-file, or extract.urls)".into());
    }

    if let Err(e) = ensure_writable_parent(&settings.extract.output).await {
        error!(path = %settings.extract.output, error = %e, "Output location is not writable");
        return Err(e);
    }

    let llm = LlmConfig::from_settings(&settings.extract, args.api_token)?;
    if llm.api_token.is_none() {
        warn!(env = api::API_TOKEN_ENV, "No API token configured; requests are sent unauthenticated");
    }
    info!(?llm, "Model client configured");
    let client = ChatCompletionsClient::new(Client::new(), llm);
    let strategy = ExtractionStrategy::new(client, &settings.extract);

    let renderer = ChromeRenderer::launch(&settings.browser).await?;
    let records = {
        let crawler = Crawler::new(&renderer, strategy, &settings.extract);
        run_bulk_extraction(&crawler, &urls).await
    };
    if let Err(e) = renderer.close().await {
        warn!(error = %e, "Browser did not shut down cleanly");
    }

    json::write_records(&records, &settings.extract.output, 2).await?;
    info!(
        count = urls.len(),
        path = %settings.extract.output,
        "Finished extracting URLs"
    );
    Ok(())
}

#[instrument(level = "info", skip_all)]
async fn run_dashboard(mut settings: Settings, args: DashboardArgs) -> Result<(), Box<dyn Error>> {
    if let Some(url) = args.webhook_url {
        settings.dashboard.webhook_url = url;
    }

    let db = (!args.no_tables).then(|| DbParams {
        host: args.pg_host,
        port: args.pg_port,
        dbname: args.pg_db,
        user: args.pg_user,
        password: args.pg_pass,
    });

    dashboard::run(&settings.dashboard, db.as_ref()).await
}
