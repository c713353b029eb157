//! Daily history abstractions shared by all market-data providers.

use crate::series::Series;
use anyhow::Result;
use async_trait::async_trait;
use std::fmt::Display;
use std::str::FromStr;

/// Requested data window for a history fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Period {
    OneYear,
    FiveYears,
    TenYears,
    Max,
}

impl Period {
    /// Range parameter understood by the chart endpoint.
    pub fn range_param(&self) -> &'static str {
        match self {
            Period::OneYear => "1y",
            Period::FiveYears => "5y",
            Period::TenYears => "10y",
            Period::Max => "max",
        }
    }
}

impl Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Period::OneYear => "1Y",
                Period::FiveYears => "5Y",
                Period::TenYears => "10Y",
                Period::Max => "MAX",
            }
        )
    }
}

impl FromStr for Period {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "1Y" => Ok(Period::OneYear),
            "5Y" => Ok(Period::FiveYears),
            "10Y" => Ok(Period::TenYears),
            "MAX" => Ok(Period::Max),
            _ => Err(anyhow::anyhow!("Invalid period: {}", s)),
        }
    }
}

/// Fetches the daily close series for a symbol. Used for the security, the
/// exchange-rate pair, the commodity future and the benchmark index alike.
#[async_trait]
pub trait HistoryProvider: Send + Sync {
    async fn fetch_history(&self, symbol: &str, period: Period) -> Result<Series>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_round_trip() {
        for period in [
            Period::OneYear,
            Period::FiveYears,
            Period::TenYears,
            Period::Max,
        ] {
            let parsed: Period = period.to_string().parse().unwrap();
            assert_eq!(parsed, period);
        }
        assert_eq!("10y".parse::<Period>().unwrap(), Period::TenYears);
        assert!("2w".parse::<Period>().is_err());
    }
}
