//! Provides the monthly price-level index for inflation adjustment.

use crate::series::Series;
use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait PriceLevelProvider: Send + Sync {
    async fn fetch_price_level(&self, series_id: &str) -> Result<Series>;
}
