use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::cache::Cache;
use crate::price_level_provider::PriceLevelProvider;
use crate::providers::util::with_retry;
use crate::series::Series;

// FredProvider implementation for PriceLevelProvider
pub struct FredProvider {
    base_url: String,
    api_key: Option<String>,
    cache: Arc<Cache<String, Series>>,
}

impl FredProvider {
    pub fn new(base_url: &str, api_key: Option<String>, cache: Arc<Cache<String, Series>>) -> Self {
        FredProvider {
            base_url: base_url.to_string(),
            api_key,
            cache,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    observations: Vec<Observation>,
}

#[derive(Debug, Deserialize)]
struct Observation {
    date: String,
    value: String,
}

#[async_trait]
impl PriceLevelProvider for FredProvider {
    #[instrument(
        name = "FredPriceLevelFetch",
        skip(self),
        fields(series_id = %series_id)
    )]
    async fn fetch_price_level(&self, series_id: &str) -> Result<Series> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("FRED API key is not configured"))?;

        if let Some(cached) = self.cache.get(&series_id.to_string()).await {
            return Ok(cached);
        }

        let url = format!(
            "{}/fred/series/observations?series_id={}&api_key={}&file_type=json",
            self.base_url, series_id, api_key
        );
        debug!("Requesting price-level observations for {}", series_id);

        let client = reqwest::Client::builder().user_agent("realfx/0.2").build()?;
        let response = with_retry(|| async { client.get(&url).send().await }, 3, 500)
            .await
            .with_context(|| format!("Failed to fetch price-level series: {series_id}"))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} for price-level series: {}",
                response.status(),
                series_id
            ));
        }

        let data = response
            .json::<ObservationsResponse>()
            .await
            .with_context(|| format!("Failed to parse observations for {series_id}"))?;

        let mut series = Series::new();
        for observation in &data.observations {
            // Unreleased periods come back as ".".
            let raw = observation.value.trim();
            if raw == "." {
                continue;
            }
            let Ok(date) = NaiveDate::parse_from_str(&observation.date, "%Y-%m-%d") else {
                warn!(
                    "Skipping observation with bad date '{}' in series {}",
                    observation.date, series_id
                );
                continue;
            };
            let Ok(value) = raw.parse::<f64>() else {
                warn!(
                    "Skipping observation with bad value '{}' on {} in series {}",
                    raw, observation.date, series_id
                );
                continue;
            };
            series.insert(date, value);
        }

        if series.is_empty() {
            return Err(anyhow!("No observations found for series: {}", series_id));
        }
        debug!(
            "Fetched {} price-level observations for {}",
            series.len(),
            series_id
        );

        self.cache.put(series_id.to_string(), series.clone()).await;
        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    async fn create_mock_server(series_id: &str, mock_response: &str) -> MockServer {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fred/series/observations"))
            .and(query_param("series_id", series_id))
            .respond_with(ResponseTemplate::new(200).set_body_string(mock_response))
            .mount(&mock_server)
            .await;
        mock_server
    }

    #[tokio::test]
    async fn test_successful_observation_fetch() {
        let mock_response = r#"{
            "observations": [
                {"date": "2024-01-01", "value": "308.417"},
                {"date": "2024-02-01", "value": "310.326"},
                {"date": "2024-03-01", "value": "."}
            ]
        }"#;
        let mock_server = create_mock_server("CPIAUCSL", mock_response).await;
        let cache = Arc::new(Cache::new());

        let provider = FredProvider::new(&mock_server.uri(), Some("key".to_string()), cache);
        let series = provider.fetch_price_level("CPIAUCSL").await.unwrap();

        assert_eq!(series.len(), 2);
        assert_eq!(series.get(d(2024, 1, 1)), Some(308.417));
        assert_eq!(series.get(d(2024, 2, 1)), Some(310.326));
        // The "." placeholder is an unreleased period, not a value.
        assert_eq!(series.get(d(2024, 3, 1)), None);
    }

    #[tokio::test]
    async fn test_missing_api_key_is_an_error() {
        let cache = Arc::new(Cache::new());
        let provider = FredProvider::new("http://localhost", None, cache);
        let result = provider.fetch_price_level("CPIAUCSL").await;
        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().to_string(),
            "FRED API key is not configured"
        );
    }

    #[tokio::test]
    async fn test_empty_observations_are_an_error() {
        let mock_response = r#"{"observations": []}"#;
        let mock_server = create_mock_server("CPIAUCSL", mock_response).await;
        let cache = Arc::new(Cache::new());

        let provider = FredProvider::new(&mock_server.uri(), Some("key".to_string()), cache);
        let result = provider.fetch_price_level("CPIAUCSL").await;
        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().to_string(),
            "No observations found for series: CPIAUCSL"
        );
    }

    #[tokio::test]
    async fn test_http_error_response() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fred/series/observations"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;
        let cache = Arc::new(Cache::new());

        let provider = FredProvider::new(&mock_server.uri(), Some("key".to_string()), cache);
        let result = provider.fetch_price_level("CPIAUCSL").await;
        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().to_string(),
            "HTTP error: 500 Internal Server Error for price-level series: CPIAUCSL"
        );
    }
}
