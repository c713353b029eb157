pub mod cache;
pub mod chart;
pub mod config;
pub mod engine;
pub mod history_provider;
pub mod log;
pub mod lookup;
pub mod price_level_provider;
pub mod providers;
pub mod search;
pub mod series;
pub mod ui;

use crate::history_provider::Period;
use anyhow::Result;

#[derive(Debug, Clone)]
pub enum AppCommand {
    Chart {
        symbol: String,
        period: Period,
        tail: usize,
        json: bool,
    },
    Search {
        query: String,
    },
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    match command {
        AppCommand::Chart {
            symbol,
            period,
            tail,
            json,
        } => chart::run(&symbol, period, tail, json, config_path).await,
        AppCommand::Search { query } => search::run(&query, config_path).await,
    }
}
