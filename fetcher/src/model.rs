use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

/// Boundaries of the last successfully archived window.
///
/// Rows are append-only; the current watermark is the one with the greatest
/// `to_date`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Watermark {
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
}

/// `[from, to)` range resolved for a single invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Window {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl Window {
    pub fn is_empty(&self) -> bool {
        self.to <= self.from
    }

    pub fn days(&self) -> i64 {
        (self.to - self.from).num_days()
    }

    /// The watermark committed once this window has been archived.
    pub fn watermark(&self) -> Watermark {
        Watermark {
            from_date: self.from,
            to_date: self.to,
        }
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.from, self.to)
    }
}

/// Result of one invocation of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Processed { window: Window, records: usize },
    NothingToDo { window: Window },
}

impl RunOutcome {
    pub fn window(&self) -> &Window {
        match self {
            RunOutcome::Processed { window, .. } | RunOutcome::NothingToDo { window } => window,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RunOutcome::Processed { .. } => "processed",
            RunOutcome::NothingToDo { .. } => "nothing_to_do",
        }
    }

    pub fn message(&self) -> String {
        match self {
            RunOutcome::Processed { records, .. } => format!("Processed {} records", records),
            RunOutcome::NothingToDo { .. } => "All data already processed".to_string(),
        }
    }
}

/// `{statusCode, body}` returned to whatever triggered the invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    /// JSON-encoded human readable message.
    pub body: String,
}

impl InvocationResponse {
    pub fn ok(message: &str) -> serde_json::Result<Self> {
        Ok(Self {
            status_code: 200,
            body: serde_json::to_string(message)?,
        })
    }
}
