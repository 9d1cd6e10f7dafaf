use crate::archive::{archive_key, ArchiveSink};
use crate::ingest::RecordSource;
use crate::model::{RunOutcome, Window};
use crate::store::WatermarkStore;
use crate::window::{self, WindowPolicy};
use bytes::Bytes;
use chrono::NaiveDate;
use fetcher_core::{Config, Result};
use metrics::{counter, gauge};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Where and how a window's records are archived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveLayout {
    pub prefix: String,
    pub dataset: String,
    pub envelope_field: String,
}

impl From<&Config> for ArchiveLayout {
    fn from(config: &Config) -> Self {
        Self {
            prefix: config.archive.prefix.clone(),
            dataset: config.archive.dataset.clone(),
            envelope_field: config.source.envelope_field.clone(),
        }
    }
}

pub struct Pipeline {
    source: Arc<dyn RecordSource>,
    sink: Arc<dyn ArchiveSink>,
    store: Arc<dyn WatermarkStore>,
    policy: WindowPolicy,
    layout: ArchiveLayout,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn RecordSource>,
        sink: Arc<dyn ArchiveSink>,
        store: Arc<dyn WatermarkStore>,
        policy: WindowPolicy,
        layout: ArchiveLayout,
    ) -> Self {
        Self {
            source,
            sink,
            store,
            policy,
            layout,
        }
    }

    /// Resolve the next window, archive it, then advance the watermark.
    ///
    /// The watermark is appended only after the archive write succeeds, so any
    /// failure leaves the store untouched and the next run retries the same
    /// window under the same key.
    #[instrument(skip(self))]
    pub async fn run_once(&self, today: NaiveDate) -> Result<RunOutcome> {
        let window = window::resolve(self.store.as_ref(), &self.policy, today).await?;

        if window.is_empty() {
            info!(window = %window, "✅ All data already processed");
            return Ok(RunOutcome::NothingToDo { window });
        }

        gauge!("etl_window_days").set(window.days() as f64);
        info!(
            from = %window.from,
            to = %window.to,
            days = window.days(),
            "🚀 Processing window"
        );

        let records = self.fetch_and_archive(&window).await?;

        self.store.append(&window.watermark()).await?;

        info!(
            window = %window,
            records,
            "📦 Window archived and watermark advanced"
        );

        Ok(RunOutcome::Processed { window, records })
    }

    /// Fetch the window, keep enveloped records, and write them as one JSON array.
    #[instrument(skip(self), fields(source = self.source.source_id()))]
    pub async fn fetch_and_archive(&self, window: &Window) -> Result<usize> {
        let raw = self.source.fetch_window(window).await?;
        let fetched = raw.len();

        let records = unwrap_envelopes(raw, &self.layout.envelope_field);
        let dropped = fetched - records.len();

        counter!("etl_records_fetched").increment(fetched as u64);
        counter!("etl_records_dropped").increment(dropped as u64);

        if dropped > 0 {
            debug!(
                dropped,
                envelope = %self.layout.envelope_field,
                "Dropped elements without payload envelope"
            );
        }

        let key = archive_key(&self.layout.prefix, window, &self.layout.dataset);
        let body = Bytes::from(serde_json::to_vec(&records)?);

        self.sink.put(&key, body).await?;

        counter!("etl_records_archived").increment(records.len() as u64);
        debug!(key = %key, records = records.len(), "Archived window");

        Ok(records.len())
    }
}

/// Payloads of the elements that carry `field`; everything else is skipped.
fn unwrap_envelopes(elements: Vec<Value>, field: &str) -> Vec<Value> {
    elements
        .into_iter()
        .filter_map(|element| match element {
            Value::Object(mut map) => map.remove(field),
            _ => None,
        })
        .collect()
}
