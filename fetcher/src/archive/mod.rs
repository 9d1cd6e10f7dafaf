pub mod s3_sink;

use crate::model::Window;
use async_trait::async_trait;
use bytes::Bytes;
use fetcher_core::Result;

const KEY_DATE_FORMAT: &str = "%Y_%m_%d";

#[async_trait]
pub trait ArchiveSink: Send + Sync {
    /// Write `body` under `key`, replacing any existing object
    async fn put(&self, key: &str, body: Bytes) -> Result<()>;
}

/// `{prefix}/{from}_{to}_{dataset}.json`, the same for every retry of a window.
pub fn archive_key(prefix: &str, window: &Window, dataset: &str) -> String {
    format!(
        "{}/{}_{}_{}.json",
        prefix.trim_end_matches('/'),
        window.from.format(KEY_DATE_FORMAT),
        window.to.format(KEY_DATE_FORMAT),
        dataset
    )
}

pub use s3_sink::S3Sink;
