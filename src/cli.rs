//! Command-line interface definitions.
//!
//! Every subcommand reads the optional settings file given with `--config`;
//! flags given here override the corresponding settings. Credentials are
//! only ever read from flags or the environment.

use clap::{Args, Parser, Subcommand};

/// Command-line arguments for `article_harvest`.
///
/// # Examples
///
/// ```sh
/// # Walk a paginated news listing and every article it links to
/// article_harvest listing --output ./out/articles.json
///
/// # LLM extraction for a list of URLs
/// LLM_API_TOKEN=... article_harvest extract --urls-file urls.txt
///
/// # Status tables and chat
/// PG_USER=reader PG_PASS=... article_harvest dashboard
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML settings file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Walk a paginated listing, then scrape every linked article
    Listing(ListingArgs),
    /// Extract article fields from URLs with a hosted language model
    Extract(ExtractArgs),
    /// Show the article status tables and chat with the agent webhook
    Dashboard(DashboardArgs),
}

#[derive(Args, Debug)]
pub struct ListingArgs {
    /// First listing page; later pages are `{base}page/N/`
    #[arg(long)]
    pub base_url: Option<String>,

    /// Output JSON file
    #[arg(short, long)]
    pub output: Option<String>,

    /// Stop after this many listing pages
    #[arg(long)]
    pub max_pages: Option<usize>,
}

#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// URLs to extract
    pub urls: Vec<String>,

    /// File with one URL per line (`#` starts a comment)
    #[arg(long)]
    pub urls_file: Option<String>,

    /// Output JSON file
    #[arg(short, long)]
    pub output: Option<String>,

    /// Model as `<vendor>/<model>`
    #[arg(long)]
    pub provider: Option<String>,

    /// Pruning threshold for the markdown content filter
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Hosted model API token
    #[arg(long, env = "LLM_API_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,
}

#[derive(Args, Debug)]
pub struct DashboardArgs {
    /// Skip the database tables and go straight to chat
    #[arg(long)]
    pub no_tables: bool,

    /// Chat webhook endpoint
    #[arg(long)]
    pub webhook_url: Option<String>,

    #[arg(long, env = "PG_HOST", default_value = "postgres")]
    pub pg_host: String,

    #[arg(long, env = "PG_PORT", default_value_t = 5432)]
    pub pg_port: u16,

    #[arg(long, env = "PG_DB", default_value = "postgres")]
    pub pg_db: String,

    #[arg(long, env = "PG_USER")]
    pub pg_user: Option<String>,

    #[arg(long, env = "PG_PASS", hide_env_values = true)]
    pub pg_pass: Option<String>,
}
