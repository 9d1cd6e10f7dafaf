use crate::error::{Error, Result};
use chrono::NaiveDate;
use config::{Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub source: SourceConfig,
    pub archive: ArchiveConfig,
    pub window: WindowConfig,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Connection string of the watermark store.
    pub url: String,
    /// Schema holding the watermark table.
    pub name: String,
    /// Watermark table.
    pub collection: String,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    pub url: String,
    pub min_date_param: String,
    pub max_date_param: String,
    /// Static query parameters sent with every request.
    pub params: BTreeMap<String, String>,
    /// Field wrapping the record payload in each response element.
    pub envelope_field: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    /// Upstream page size, if known. A response this large is probably truncated.
    pub expected_page_limit: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArchiveConfig {
    pub bucket: String,
    pub prefix: String,
    pub dataset: String,
    pub region: Option<String>,
    pub aws_profile: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WindowConfig {
    pub default_start: NaiveDate,
    pub max_days: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub log_format: LogFormat,
    pub metrics_enabled: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut builder = config::Config::builder();

        // Load default configuration
        builder = builder.add_source(config::Config::try_from(&Config::default())?);

        // Layer on config file if it exists
        if Path::new("config.toml").exists() {
            builder = builder.add_source(File::with_name("config"));
        }

        // Layer on environment variables, e.g. ETL_ARCHIVE__BUCKET
        builder = builder.add_source(
            Environment::with_prefix("ETL")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let settings: Config = config.try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        let required = [
            ("database.url", &self.database.url),
            ("database.name", &self.database.name),
            ("database.collection", &self.database.collection),
            ("archive.bucket", &self.archive.bucket),
            ("source.url", &self.source.url),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(Error::missing(key));
            }
        }

        for (key, value) in [
            ("database.name", &self.database.name),
            ("database.collection", &self.database.collection),
        ] {
            if !is_identifier(value) {
                return Err(Error::Validation(format!(
                    "{key} must be a plain SQL identifier, got '{value}'"
                )));
            }
        }

        if self.window.max_days == 0 {
            return Err(Error::Validation(
                "window.max_days must be greater than 0".into(),
            ));
        }

        if self.source.timeout_secs == 0 {
            return Err(Error::Validation(
                "source.timeout_secs must be greater than 0".into(),
            ));
        }

        if self.source.envelope_field.is_empty() {
            return Err(Error::Validation(
                "source.envelope_field must not be empty".into(),
            ));
        }

        Ok(())
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: String::new(),
                name: String::new(),
                collection: String::new(),
                max_connections: 2,
                connect_timeout_secs: 10,
            },
            source: SourceConfig {
                url: "https://www.consumerfinance.gov/data-research/consumer-complaints/search/api/v1/"
                    .to_string(),
                min_date_param: "date_received_min".to_string(),
                max_date_param: "date_received_max".to_string(),
                params: BTreeMap::from([
                    ("field".to_string(), "all".to_string()),
                    ("format".to_string(), "json".to_string()),
                ]),
                envelope_field: "_source".to_string(),
                user_agent: "etl-bot/1.0".to_string(),
                timeout_secs: 60,
                expected_page_limit: None,
            },
            archive: ArchiveConfig {
                bucket: String::new(),
                prefix: "raw-data".to_string(),
                dataset: "finance_complaint".to_string(),
                region: None,
                aws_profile: None,
            },
            window: WindowConfig {
                default_start: NaiveDate::from_ymd_opt(2026, 2, 9).unwrap_or_default(),
                max_days: 7,
            },
            telemetry: TelemetryConfig {
                log_level: "info".to_string(),
                log_format: LogFormat::Json,
                metrics_enabled: true,
            },
        }
    }
}
