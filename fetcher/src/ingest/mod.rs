pub mod http_source;

use crate::model::Window;
use async_trait::async_trait;
use fetcher_core::Result;
use serde_json::Value;

#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Fetch every raw element the upstream returns for the window, unfiltered
    async fn fetch_window(&self, window: &Window) -> Result<Vec<Value>>;

    /// Get the source identifier
    fn source_id(&self) -> &str;
}

pub use http_source::HttpSource;
