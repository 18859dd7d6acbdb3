//! Terminal dashboard: two read-only status tables, then a chat loop.
//!
//! - [`db`]: fixed SELECT statements against the article status database
//! - [`chat`]: request/response chat against a remote webhook

pub mod chat;
pub mod db;

use reqwest::Client;
use std::error::Error;
use tokio::io::{self, AsyncWriteExt, BufReader};
use tracing::{info, instrument};

use crate::config::DashboardSettings;
use chat::{ChatSession, run_repl};
use db::DbParams;

/// Print both status tables (unless `db` is `None`), then chat over stdin.
#[instrument(level = "info", skip_all)]
pub async fn run(settings: &DashboardSettings, db: Option<&DbParams>) -> Result<(), Box<dyn Error>> {
    let mut stdout = io::stdout();

    if let Some(params) = db {
        let pool = db::connect(params).await?;
        for (title, sql) in [
            (&settings.pending_title, &settings.pending_query),
            (&settings.completed_title, &settings.completed_query),
        ] {
            let table = db::fetch_table(&pool, sql).await?;
            info!(%title, rows = table.rows.len(), "Rendering table");
            stdout.write_all(table.render(title).as_bytes()).await?;
            stdout.write_all(b"\n").await?;
        }
        pool.close().await;
    }

    stdout
        .write_all(b"Chat (type `exit` to leave)\n")
        .await?;
    let mut session = ChatSession::new(Client::new(), settings.webhook_url.clone());
    run_repl(&mut session, BufReader::new(io::stdin()), stdout).await
}
