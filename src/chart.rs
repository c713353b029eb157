//! The chart command: fetch every input series, run the normalization
//! pipeline, render the result.

use crate::cache::Cache;
use crate::config::{AppConfig, BenchmarkCurrency};
use crate::engine::{
    self, BenchmarkDenomination, BenchmarkInput, EngineInputs, NormalizedRow, NormalizedSeries,
};
use crate::history_provider::{HistoryProvider, Period};
use crate::lookup::{DirectoryProvider, SymbolDirectory};
use crate::price_level_provider::PriceLevelProvider;
use crate::providers::directory::HttpDirectoryProvider;
use crate::providers::fred::FredProvider;
use crate::providers::yahoo_finance::YahooHistoryProvider;
use crate::series::Series;
use crate::ui;
use anyhow::{Context, Result};
use comfy_table::Cell;
use indicatif::ProgressBar;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

impl From<BenchmarkCurrency> for BenchmarkDenomination {
    fn from(currency: BenchmarkCurrency) -> Self {
        match currency {
            BenchmarkCurrency::Local => BenchmarkDenomination::Local,
            BenchmarkCurrency::Reference => BenchmarkDenomination::Reference,
        }
    }
}

#[derive(Serialize)]
struct ChartPayload<'a> {
    symbol: &'a str,
    name: Option<&'a str>,
    period: String,
    rows: &'a [NormalizedRow],
    overall_alpha: f64,
}

pub async fn run(
    symbol: &str,
    period: Period,
    tail: usize,
    json: bool,
    config_path: Option<&str>,
) -> Result<()> {
    info!("Charting {symbol} over {period}...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let series_cache = Arc::new(Cache::<String, Series>::new());

    let yahoo_base = config
        .providers
        .yahoo
        .as_ref()
        .map_or("https://query1.finance.yahoo.com", |p| p.base_url.as_str());
    let yahoo = YahooHistoryProvider::new(yahoo_base, Arc::clone(&series_cache));

    let fred_config = config.providers.fred.clone().unwrap_or_default();
    let fred = FredProvider::new(
        &fred_config.base_url,
        fred_config.api_key.clone(),
        Arc::clone(&series_cache),
    );

    let directory_provider = config
        .providers
        .directory
        .as_ref()
        .map(|d| HttpDirectoryProvider::new(&d.base_url));
    let directory = SymbolDirectory::new();

    let (symbol, display_name) = resolve_symbol(
        &config,
        &directory,
        directory_provider
            .as_ref()
            .map(|p| p as &dyn DirectoryProvider),
        symbol,
    )
    .await;

    let deadline = Duration::from_secs(config.fetch_timeout_secs);
    let pb = ui::new_progress_bar(5, true);
    pb.set_message("Fetching series...");

    let (price, fx, price_level, commodity, benchmark) = tokio::join!(
        counted(&pb, yahoo.fetch_history(&symbol, period)),
        counted(
            &pb,
            yahoo.fetch_history(&config.currency.exchange_symbol, period)
        ),
        optional_series(
            "price-level",
            deadline,
            &pb,
            fred.fetch_price_level(&fred_config.series_id)
        ),
        optional_series(
            "commodity",
            deadline,
            &pb,
            fetch_optional_history(
                &yahoo,
                config.commodity.as_ref().map(|c| c.symbol.as_str()),
                period
            )
        ),
        optional_series(
            "benchmark",
            deadline,
            &pb,
            fetch_optional_history(
                &yahoo,
                config.benchmark.as_ref().map(|b| b.symbol.as_str()),
                period
            )
        ),
    );
    pb.finish_and_clear();

    let price = price.with_context(|| format!("No price history available for {symbol}"))?;
    let fx = fx.with_context(|| {
        format!(
            "No exchange-rate history available for {}",
            config.currency.exchange_symbol
        )
    })?;

    let benchmark_input = match (&config.benchmark, benchmark.is_empty()) {
        (Some(cfg), false) => Some(BenchmarkInput {
            series: benchmark,
            denomination: cfg.currency.into(),
        }),
        _ => None,
    };

    let inputs = EngineInputs {
        price,
        fx,
        price_level,
        commodity,
        benchmark: benchmark_input,
    };
    let normalized =
        engine::normalize(&inputs).with_context(|| format!("Normalization failed for {symbol}"))?;
    info!("Normalized {} rows for {}", normalized.len(), symbol);

    if json {
        let payload = ChartPayload {
            symbol: &symbol,
            name: display_name.as_deref(),
            period: period.to_string(),
            rows: &normalized.rows,
            overall_alpha: normalized.overall_alpha(),
        };
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        let title = match &display_name {
            Some(name) => format!("{name} ({symbol})"),
            None => symbol.clone(),
        };
        println!("{}", render_table(&normalized, &config, &title, tail));
    }

    Ok(())
}

/// Turn a user query into a provider symbol, consulting the directory when
/// one is configured. Directory failures degrade to the raw input.
async fn resolve_symbol(
    config: &AppConfig,
    directory: &SymbolDirectory,
    provider: Option<&dyn DirectoryProvider>,
    input: &str,
) -> (String, Option<String>) {
    let query = input.trim();
    let is_code = !query.is_empty() && query.chars().all(|c| c.is_ascii_digit());
    if is_code {
        let symbol = format!("{}{}", query, config.symbol_suffix);
        let name = match provider {
            Some(p) => match directory.name_of(p, query).await {
                Ok(name) => name,
                Err(e) => {
                    warn!("Symbol directory unavailable: {e:#}");
                    None
                }
            },
            None => None,
        };
        return (symbol, name);
    }

    if let Some(p) = provider {
        match directory.resolve(p, query).await {
            Ok(Some(entry)) => {
                info!("Resolved '{}' to code '{}' ({})", query, entry.code, entry.name);
                return (
                    format!("{}{}", entry.code, config.symbol_suffix),
                    Some(entry.name),
                );
            }
            Ok(None) => debug!("No directory entry matched '{}'", query),
            Err(e) => warn!("Symbol directory unavailable: {e:#}"),
        }
    }
    // Not resolvable locally; let the provider try the raw input.
    (query.to_string(), None)
}

async fn counted<T>(pb: &ProgressBar, fetch: impl Future<Output = Result<T>>) -> Result<T> {
    let result = fetch.await;
    pb.inc(1);
    result
}

/// Awaits an optional input with a deadline. Errors and timeouts degrade to
/// an empty series; the pipeline treats both the same as genuine absence.
async fn optional_series(
    label: &'static str,
    deadline: Duration,
    pb: &ProgressBar,
    fetch: impl Future<Output = Result<Series>>,
) -> Series {
    let series = match tokio::time::timeout(deadline, fetch).await {
        Ok(Ok(series)) => series,
        Ok(Err(e)) => {
            warn!("{label} series degraded to empty: {e:#}");
            Series::new()
        }
        Err(_) => {
            warn!(
                "{label} fetch exceeded {}s, continuing without it",
                deadline.as_secs()
            );
            Series::new()
        }
    };
    pb.inc(1);
    series
}

async fn fetch_optional_history(
    provider: &YahooHistoryProvider,
    symbol: Option<&str>,
    period: Period,
) -> Result<Series> {
    match symbol {
        Some(symbol) => provider.fetch_history(symbol, period).await,
        None => Ok(Series::new()),
    }
}

fn render_table(
    normalized: &NormalizedSeries,
    config: &AppConfig,
    title: &str,
    tail: usize,
) -> String {
    let local = &config.currency.local;
    let reference = &config.currency.reference;

    let mut table = ui::new_styled_table();
    let mut header = vec![
        ui::header_cell("Date"),
        ui::header_cell(&format!("Close ({local})")),
        ui::header_cell(&format!("Close ({reference})")),
        ui::header_cell(&format!("Real ({reference})")),
    ];
    if config.commodity.is_some() {
        header.push(ui::header_cell("Gold (oz)"));
        header.push(ui::header_cell("Gold (don)"));
    }
    if config.benchmark.is_some() {
        header.push(ui::header_cell(&format!("Benchmark ({reference})")));
        header.push(ui::header_cell("Alpha"));
    }
    table.set_header(header);

    let skip = normalized.len().saturating_sub(tail);
    for row in normalized.rows.iter().skip(skip) {
        let mut cells = vec![
            Cell::new(row.date.format("%Y-%m-%d").to_string()),
            ui::format_optional_cell(Some(row.close_local), |v| format!("{v:.0}")),
            ui::format_optional_cell(Some(row.close_reference), |v| format!("{v:.4}")),
            ui::format_optional_cell(row.real_close, |v| format!("{v:.4}")),
        ];
        if config.commodity.is_some() {
            cells.push(ui::format_optional_cell(row.close_troy_oz, |v| {
                format!("{v:.6}")
            }));
            cells.push(ui::format_optional_cell(row.close_don, |v| {
                format!("{v:.6}")
            }));
        }
        if config.benchmark.is_some() {
            cells.push(ui::format_optional_cell(row.benchmark_real, |v| {
                format!("{v:.4}")
            }));
            cells.push(match row.alpha {
                Some(alpha) => ui::change_cell(alpha * 100.0),
                None => ui::na_cell(false),
            });
        }
        table.add_row(cells);
    }

    let mut output = format!(
        "Symbol: {}\n\n",
        ui::style_text(title, ui::StyleType::Title)
    );
    if normalized.len() > tail {
        output.push_str(&format!(
            "Showing last {} of {} rows\n\n",
            tail,
            normalized.len()
        ));
    }
    output.push_str(&table.to_string());

    if let Some(benchmark) = &config.benchmark {
        let overall = normalized.overall_alpha() * 100.0;
        let style = if overall >= 0.0 {
            ui::StyleType::TotalValue
        } else {
            ui::StyleType::Error
        };
        output.push_str(&format!(
            "\n\nOverall alpha vs {}: {}",
            ui::style_text(&benchmark.symbol, ui::StyleType::TotalLabel),
            ui::style_text(&format!("{overall:.2}%"), style)
        ));
    }

    output
}
