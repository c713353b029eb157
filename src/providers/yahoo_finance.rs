use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::cache::Cache;
use crate::history_provider::{HistoryProvider, Period};
use crate::providers::util::with_retry;
use crate::series::Series;

// YahooHistoryProvider implementation for HistoryProvider
pub struct YahooHistoryProvider {
    base_url: String,
    cache: Arc<Cache<String, Series>>,
}

impl YahooHistoryProvider {
    pub fn new(base_url: &str, cache: Arc<Cache<String, Series>>) -> Self {
        YahooHistoryProvider {
            base_url: base_url.to_string(),
            cache,
        }
    }
}

#[derive(Deserialize, Debug)]
struct YahooChartResponse {
    chart: ChartResult,
}

#[derive(Deserialize, Debug)]
struct ChartResult {
    result: Vec<ChartItem>,
}

#[derive(Deserialize, Debug)]
struct ChartItem {
    timestamp: Option<Vec<i64>>,
    indicators: Option<Indicators>,
}

#[derive(Deserialize, Debug)]
struct Indicators {
    quote: Vec<Quote>,
}

#[derive(Deserialize, Debug)]
struct Quote {
    close: Option<Vec<Option<f64>>>,
}

/// Pair bar timestamps with closes, dropping null closes. The BTreeMap
/// backing `Series` absorbs duplicate dates.
fn assemble_series(item: &ChartItem) -> Series {
    let (Some(timestamps), Some(closes)) = (
        item.timestamp.as_ref(),
        item.indicators
            .as_ref()
            .and_then(|inds| inds.quote.first())
            .and_then(|q| q.close.as_ref()),
    ) else {
        return Series::new();
    };

    timestamps
        .iter()
        .zip(closes.iter())
        .filter_map(|(ts, close)| {
            let close = (*close)?;
            let date = Utc.timestamp_opt(*ts, 0).single()?.date_naive();
            Some((date, close))
        })
        .collect()
}

#[async_trait]
impl HistoryProvider for YahooHistoryProvider {
    #[instrument(
        name = "YahooHistoryFetch",
        skip(self),
        fields(symbol = %symbol, period = %period)
    )]
    async fn fetch_history(&self, symbol: &str, period: Period) -> Result<Series> {
        let key = format!("{symbol}:{period}");
        if let Some(cached) = self.cache.get(&key).await {
            return Ok(cached);
        }

        let url = format!(
            "{}/v8/finance/chart/{}?interval=1d&range={}",
            self.base_url,
            symbol,
            period.range_param()
        );
        debug!("Requesting history from {}", url);

        let client = reqwest::Client::builder().user_agent("realfx/0.2").build()?;
        let response = with_retry(|| async { client.get(&url).send().await }, 3, 500)
            .await
            .map_err(|e| anyhow!("Request error: {} for symbol: {} URL: {}", e, symbol, url))?;

        let data = response.json::<YahooChartResponse>().await?;
        let item = data
            .chart
            .result
            .first()
            .ok_or_else(|| anyhow!("No history found for symbol: {}", symbol))?;

        let series = assemble_series(item);
        if series.is_empty() {
            return Err(anyhow!("Empty history for symbol: {}", symbol));
        }
        debug!("Fetched {} daily closes for {}", series.len(), symbol);

        self.cache.put(key, series.clone()).await;
        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub async fn create_mock_server(symbol: &str, mock_response: &str) -> wiremock::MockServer {
        let mock_server = wiremock::MockServer::start().await;
        let request_path = format!("/v8/finance/chart/{symbol}");

        Mock::given(method("GET"))
            .and(path(request_path))
            .respond_with(ResponseTemplate::new(200).set_body_string(mock_response))
            .mount(&mock_server)
            .await;

        mock_server
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[tokio::test]
    async fn test_successful_history_fetch() {
        // 2024-01-02, 2024-01-03 and 2024-01-04 at midnight UTC.
        let mock_response = r#"{
            "chart": {
                "result": [{
                    "timestamp": [1704153600, 1704240000, 1704326400],
                    "indicators": {
                        "quote": [{
                            "close": [1000.0, null, 1020.5]
                        }]
                    }
                }]
            }
        }"#;

        let mock_server = create_mock_server("005930.KS", mock_response).await;
        let cache = Arc::new(Cache::new());

        let provider = YahooHistoryProvider::new(&mock_server.uri(), cache);
        let series = provider
            .fetch_history("005930.KS", Period::OneYear)
            .await
            .unwrap();

        // The null close on Jan 3 is a gap, not a zero.
        assert_eq!(series.len(), 2);
        assert_eq!(series.get(d(2024, 1, 2)), Some(1000.0));
        assert_eq!(series.get(d(2024, 1, 3)), None);
        assert_eq!(series.get(d(2024, 1, 4)), Some(1020.5));
    }

    #[tokio::test]
    async fn test_no_chart_result() {
        let mock_response = r#"{"chart": {"result": []}}"#;
        let mock_server = create_mock_server("INVALID", mock_response).await;
        let cache = Arc::new(Cache::new());

        let provider = YahooHistoryProvider::new(&mock_server.uri(), cache);
        let result = provider.fetch_history("INVALID", Period::OneYear).await;
        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().to_string(),
            "No history found for symbol: INVALID"
        );
    }

    #[tokio::test]
    async fn test_bars_without_closes_are_an_error() {
        let mock_response = r#"{
            "chart": {
                "result": [{
                    "timestamp": [1704153600]
                }]
            }
        }"#;
        let mock_server = create_mock_server("005930.KS", mock_response).await;
        let cache = Arc::new(Cache::new());

        let provider = YahooHistoryProvider::new(&mock_server.uri(), cache);
        let result = provider.fetch_history("005930.KS", Period::OneYear).await;
        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().to_string(),
            "Empty history for symbol: 005930.KS"
        );
    }

    #[tokio::test]
    async fn test_history_is_cached_per_symbol_and_period() {
        let mock_response = r#"{
            "chart": {
                "result": [{
                    "timestamp": [1704153600],
                    "indicators": {"quote": [{"close": [1000.0]}]}
                }]
            }
        }"#;
        let mock_server = create_mock_server("005930.KS", mock_response).await;
        let cache = Arc::new(Cache::new());

        let provider = YahooHistoryProvider::new(&mock_server.uri(), Arc::clone(&cache));
        let first = provider
            .fetch_history("005930.KS", Period::OneYear)
            .await
            .unwrap();
        let second = provider
            .fetch_history("005930.KS", Period::OneYear)
            .await
            .unwrap();
        assert_eq!(first, second);

        let requests = mock_server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
    }
}
