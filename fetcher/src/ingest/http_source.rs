use super::RecordSource;
use crate::model::Window;
use async_trait::async_trait;
use fetcher_core::config::SourceConfig;
use fetcher_core::{Error, Result};
use metrics::histogram;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Public JSON feed queried by a received-date range.
pub struct HttpSource {
    client: Client,
    config: SourceConfig,
}

impl HttpSource {
    pub fn new(config: SourceConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    fn request(&self, window: &Window) -> RequestBuilder {
        let mut params: Vec<(&str, String)> = self
            .config
            .params
            .iter()
            .map(|(k, v)| (k.as_str(), v.clone()))
            .collect();
        params.push((
            self.config.min_date_param.as_str(),
            window.from.format(DATE_FORMAT).to_string(),
        ));
        params.push((
            self.config.max_date_param.as_str(),
            window.to.format(DATE_FORMAT).to_string(),
        ));

        self.client.get(&self.config.url).query(&params)
    }
}

/// Turn a raw response into its array of elements.
fn decode_response(status: StatusCode, body: &[u8]) -> Result<Vec<Value>> {
    if !status.is_success() {
        return Err(Error::source_unavailable(format!(
            "upstream returned HTTP {}",
            status
        )));
    }

    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Array(elements)) => Ok(elements),
        Ok(other) => Err(Error::source_unavailable(format!(
            "expected a JSON array, got {}",
            json_type(&other)
        ))),
        Err(e) => Err(Error::source_unavailable(format!(
            "malformed JSON response: {}",
            e
        ))),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[async_trait]
impl RecordSource for HttpSource {
    #[instrument(skip(self, window), fields(window = %window))]
    async fn fetch_window(&self, window: &Window) -> Result<Vec<Value>> {
        let start = Instant::now();

        let response = self.request(window).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        histogram!("etl_fetch_duration_ms").record(start.elapsed().as_millis() as f64);

        let elements = decode_response(status, &body)?;

        // Pagination is not followed; a full page most likely means truncation
        if let Some(limit) = self.config.expected_page_limit {
            if elements.len() >= limit {
                warn!(
                    returned = elements.len(),
                    limit,
                    "Response filled a whole page, records past it were not fetched"
                );
            }
        }

        debug!(
            elements = elements.len(),
            bytes = body.len(),
            duration_ms = start.elapsed().as_millis(),
            "Fetched source payload"
        );

        Ok(elements)
    }

    fn source_id(&self) -> &str {
        &self.config.url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use fetcher_core::Config;
    use pretty_assertions::assert_eq;

    fn window() -> Window {
        Window {
            from: NaiveDate::from_ymd_opt(2026, 2, 9).unwrap(),
            to: NaiveDate::from_ymd_opt(2026, 2, 10).unwrap(),
        }
    }

    #[test]
    fn request_carries_typed_date_bounds() {
        let source = HttpSource::new(Config::default().source).unwrap();
        let request = source.request(&window()).build().unwrap();
        let url = request.url();

        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        assert_eq!(
            url.path(),
            "/data-research/consumer-complaints/search/api/v1/"
        );
        assert!(pairs.contains(&("date_received_min".into(), "2026-02-09".into())));
        assert!(pairs.contains(&("date_received_max".into(), "2026-02-10".into())));
        assert!(pairs.contains(&("field".into(), "all".into())));
        assert!(pairs.contains(&("format".into(), "json".into())));
    }

    #[test]
    fn server_error_is_source_unavailable() {
        let err = decode_response(StatusCode::INTERNAL_SERVER_ERROR, b"oops").unwrap_err();
        assert!(matches!(err, Error::SourceUnavailable { .. }));
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn malformed_json_is_source_unavailable() {
        let err = decode_response(StatusCode::OK, b"[{\"_source\":").unwrap_err();
        assert!(matches!(err, Error::SourceUnavailable { .. }));
    }

    #[test]
    fn non_array_body_is_source_unavailable() {
        let err = decode_response(StatusCode::OK, b"{\"hits\": []}").unwrap_err();
        assert_eq!(
            err.to_string(),
            "source unavailable: expected a JSON array, got an object"
        );
    }

    #[test]
    fn array_body_is_returned_unfiltered() {
        let body = br#"[{"_source": {"id": 1}}, {"other": true}, 7]"#;
        let elements = decode_response(StatusCode::OK, body).unwrap();
        assert_eq!(elements.len(), 3);
    }
}
