use crate::model::{Watermark, Window};
use crate::store::WatermarkStore;
use chrono::{Days, NaiveDate};
use fetcher_core::config::WindowConfig;
use fetcher_core::Result;
use tracing::{debug, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPolicy {
    pub default_start: NaiveDate,
    pub max_days: u32,
}

impl From<&WindowConfig> for WindowPolicy {
    fn from(config: &WindowConfig) -> Self {
        Self {
            default_start: config.default_start,
            max_days: config.max_days,
        }
    }
}

impl WindowPolicy {
    /// Window following `latest`, ending at `today` but no more than
    /// `max_days` wide. Never runs backwards: a watermark ahead of `today`
    /// yields an empty window.
    pub fn next_window(&self, latest: Option<&Watermark>, today: NaiveDate) -> Window {
        let from = latest.map_or(self.default_start, |w| w.to_date);
        let cap = from
            .checked_add_days(Days::new(u64::from(self.max_days)))
            .unwrap_or(NaiveDate::MAX);

        Window {
            from,
            to: today.clamp(from, cap),
        }
    }
}

/// Reads the latest watermark and resolves the window to process as of `today`.
#[instrument(skip(store))]
pub async fn resolve(
    store: &dyn WatermarkStore,
    policy: &WindowPolicy,
    today: NaiveDate,
) -> Result<Window> {
    let latest = store.latest().await?;
    let window = policy.next_window(latest.as_ref(), today);

    debug!(
        latest = ?latest,
        window = %window,
        days = window.days(),
        "Resolved window"
    );

    Ok(window)
}
