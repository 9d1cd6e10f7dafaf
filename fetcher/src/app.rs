use crate::archive::S3Sink;
use crate::ingest::HttpSource;
use crate::model::{InvocationResponse, Watermark, Window};
use crate::pipeline::{ArchiveLayout, Pipeline};
use crate::store::{PgWatermarkStore, WatermarkStore};
use crate::window::WindowPolicy;
use chrono::NaiveDate;
use fetcher_core::{Config, Result};
use metrics::counter;
use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

pub struct App {
    store: Arc<PgWatermarkStore>,
    policy: WindowPolicy,
    pipeline: Pipeline,
}

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub table: String,
    pub recent: Vec<Watermark>,
    pub next_window: Window,
    pub pending: bool,
}

impl App {
    #[instrument(skip(config, pool))]
    pub async fn new(config: &Config, pool: PgPool) -> Result<Self> {
        info!("Initializing application");

        let store = Arc::new(PgWatermarkStore::new(pool, &config.database)?);
        let source = HttpSource::new(config.source.clone())?;
        let sink = S3Sink::new(&config.archive).await?;

        // Health check
        info!("Performing health checks");
        store.health_check().await?;

        let policy = WindowPolicy::from(&config.window);
        let pipeline = Pipeline::new(
            Arc::new(source),
            Arc::new(sink),
            Arc::clone(&store) as Arc<dyn WatermarkStore>,
            policy,
            ArchiveLayout::from(config),
        );

        Ok(Self {
            store,
            policy,
            pipeline,
        })
    }

    /// Single invocation entry point. The trigger payload carries no parameters.
    pub async fn handle(&self, event: &Value, today: NaiveDate) -> Result<InvocationResponse> {
        debug!(event = %event, "Received trigger");

        match self.pipeline.run_once(today).await {
            Ok(outcome) => {
                info!(
                    window = %outcome.window(),
                    outcome = outcome.label(),
                    "Invocation finished"
                );
                counter!("etl_invocations", "outcome" => outcome.label()).increment(1);
                Ok(InvocationResponse::ok(&outcome.message())?)
            }
            Err(e) => {
                counter!("etl_invocation_errors", "kind" => e.kind()).increment(1);
                error!(error = %e, kind = e.kind(), "Invocation failed, watermark not advanced");
                Err(e)
            }
        }
    }

    pub async fn status(&self, limit: u32, today: NaiveDate) -> Result<StatusReport> {
        let recent = self.store.recent(limit).await?;
        let next_window = self.policy.next_window(recent.first(), today);

        Ok(StatusReport {
            table: self.store.table().to_string(),
            recent,
            next_window,
            pending: !next_window.is_empty(),
        })
    }

    pub async fn migrate(&self) -> Result<()> {
        self.store.ensure_table().await
    }
}
