use crate::model::Watermark;
use async_trait::async_trait;
use fetcher_core::config::{is_identifier, DatabaseConfig};
use fetcher_core::{Error, Result};
use metrics::counter;
use sqlx::PgPool;
use std::future::Future;
use tracing::{debug, info, instrument, warn};

/// SQLSTATE for `undefined_table`.
const UNDEFINED_TABLE: &str = "42P01";

/// Append-only log of processed windows.
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    /// Watermark with the greatest `to_date`, if any.
    async fn latest(&self) -> Result<Option<Watermark>>;

    /// Record a new watermark. No uniqueness or continuity checks.
    async fn append(&self, watermark: &Watermark) -> Result<()>;
}

pub struct PgWatermarkStore {
    pool: PgPool,
    schema: String,
    table: String,
}

impl PgWatermarkStore {
    pub fn new(pool: PgPool, config: &DatabaseConfig) -> Result<Self> {
        Ok(Self {
            pool,
            schema: format!("\"{}\"", config.name),
            table: qualified_table(&config.name, &config.collection)?,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    #[instrument(skip(self))]
    pub async fn ensure_table(&self) -> Result<()> {
        sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", self.schema))
            .execute(&self.pool)
            .await?;
        sqlx::query(&create_table_sql(&self.table))
            .execute(&self.pool)
            .await?;

        info!(table = %self.table, "Watermark table ready");
        Ok(())
    }

    /// Most recent watermarks, newest first.
    #[instrument(skip(self))]
    pub async fn recent(&self, limit: u32) -> Result<Vec<Watermark>> {
        let query = format!(
            "SELECT from_date, to_date FROM {} ORDER BY to_date DESC LIMIT $1",
            self.table
        );

        match sqlx::query_as::<_, Watermark>(&query)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
        {
            Ok(rows) => Ok(rows),
            Err(e) if is_undefined_table(&e) => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl WatermarkStore for PgWatermarkStore {
    #[instrument(skip(self))]
    async fn latest(&self) -> Result<Option<Watermark>> {
        let query = format!(
            "SELECT from_date, to_date FROM {} ORDER BY to_date DESC LIMIT 1",
            self.table
        );

        match sqlx::query_as::<_, Watermark>(&query)
            .fetch_optional(&self.pool)
            .await
        {
            Ok(latest) => Ok(latest),
            Err(e) if is_undefined_table(&e) => {
                debug!(table = %self.table, "Watermark table does not exist yet");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self))]
    async fn append(&self, watermark: &Watermark) -> Result<()> {
        let sql = format!(
            "INSERT INTO {} (from_date, to_date) VALUES ($1, $2)",
            self.table
        );
        let (sql, pool) = (sql.as_str(), &self.pool);

        insert_creating_table(
            move || async move {
                sqlx::query(sql)
                    .bind(watermark.from_date)
                    .bind(watermark.to_date)
                    .execute(pool)
                    .await?;
                Ok::<(), Error>(())
            },
            move || self.ensure_table(),
        )
        .await?;

        counter!("etl_watermarks_appended").increment(1);

        debug!(
            from = %watermark.from_date,
            to = %watermark.to_date,
            "Appended watermark"
        );

        Ok(())
    }
}

/// Runs `insert`; only when the table is missing, runs `create` and inserts once more.
/// Writers holding just INSERT never issue DDL.
async fn insert_creating_table<I, IF, C, CF>(insert: I, create: C) -> Result<()>
where
    I: Fn() -> IF,
    IF: Future<Output = Result<()>>,
    C: FnOnce() -> CF,
    CF: Future<Output = Result<()>>,
{
    match insert().await {
        Err(Error::StoreUnavailable(e)) if is_undefined_table(&e) => {
            warn!("Watermark table missing, creating it");
            create().await?;
            insert().await
        }
        other => other,
    }
}

fn qualified_table(schema: &str, table: &str) -> Result<String> {
    for name in [schema, table] {
        if !is_identifier(name) {
            return Err(Error::Validation(format!("invalid identifier '{name}'")));
        }
    }
    Ok(format!("\"{schema}\".\"{table}\""))
}

fn create_table_sql(table: &str) -> String {
    format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            id BIGSERIAL PRIMARY KEY,
            from_date DATE NOT NULL,
            to_date DATE NOT NULL,
            recorded_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#
    )
}

fn is_undefined_table(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some(UNDEFINED_TABLE))
}
