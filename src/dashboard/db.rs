//! Read-only Postgres access for the dashboard.
//!
//! The article status tables belong to another service; the dashboard only
//! runs two fixed SELECT statements against them. Rows are fetched as JSON
//! (`row_to_json`) so any column type renders without a per-table struct.

use serde_json::{Map, Value};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgPool, Row};
use std::error::Error;
use tracing::{debug, info, instrument};

use crate::outputs::table::ResultTable;

/// Connection parameters, normally taken from `PG_*` environment variables.
#[derive(Clone)]
pub struct DbParams {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl std::fmt::Debug for DbParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

impl DbParams {
    fn connect_options(&self) -> PgConnectOptions {
        let mut opts = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.dbname);
        if let Some(user) = &self.user {
            opts = opts.username(user);
        }
        if let Some(password) = &self.password {
            opts = opts.password(password);
        }
        opts
    }
}

#[instrument(level = "info", skip_all, fields(host = %params.host, db = %params.dbname))]
pub async fn connect(params: &DbParams) -> Result<PgPool, Box<dyn Error>> {
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect_with(params.connect_options())
        .await?;
    info!("Connected to database");
    Ok(pool)
}

/// Wrap a SELECT so each row comes back as one JSON object.
pub fn as_json_rows_query(sql: &str) -> String {
    let inner = sql.trim().trim_end_matches(';').trim_end();
    format!("SELECT row_to_json(q)::text AS row_json FROM ({inner}) AS q")
}

/// Run `sql` and collect its rows into a [`ResultTable`].
#[instrument(level = "info", skip(pool))]
pub async fn fetch_table(pool: &PgPool, sql: &str) -> Result<ResultTable, Box<dyn Error>> {
    let rows = sqlx::query(&as_json_rows_query(sql)).fetch_all(pool).await?;

    let mut objects: Vec<Map<String, Value>> = Vec::with_capacity(rows.len());
    for row in rows {
        let raw: String = row.try_get("row_json")?;
        match serde_json::from_str::<Value>(&raw)? {
            Value::Object(map) => objects.push(map),
            other => return Err(format!("row is not a JSON object: {other}").into()),
        }
    }
    debug!(rows = objects.len(), "Fetched rows");
    Ok(ResultTable::from_json_rows(&objects))
}
