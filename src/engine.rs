//! Alignment-and-normalization pipeline.
//!
//! Takes the raw daily and monthly series and produces one gap-free daily
//! series of normalized closes. Four stages run in order: base merge,
//! price-level alignment, commodity denomination, benchmark/alpha. Each
//! stage covers every row and none may reorder them; the date order fixed
//! by the base merge is final.

use crate::series::Series;
use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

/// Troy-ounce quantities times this give don quantities (31.1035 g per troy
/// ounce, 3.75 g per don).
pub const OZ_TO_DON: f64 = 31.1035 / 3.75;

#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    /// The security and exchange-rate calendars do not intersect, or the
    /// price series itself was empty. Distinct from optional-input absence.
    #[error("price and exchange-rate series have no dates in common")]
    NoCommonDates,

    /// An exchange rate that survived the join is unusable as a divisor.
    #[error("exchange rate {rate} on {date} is not positive")]
    InvalidExchangeRate { date: NaiveDate, rate: f64 },

    /// A reported price-level observation is unusable as a divisor.
    #[error("price-level index {value} on {date} is not positive")]
    InvalidPriceLevel { date: NaiveDate, value: f64 },

    /// A commodity reference price is unusable as a divisor.
    #[error("commodity price {price} on {date} is not positive")]
    InvalidCommodityPrice { date: NaiveDate, price: f64 },
}

/// Which currency a benchmark's closes are quoted in. Declared by the
/// caller rather than guessed from the symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BenchmarkDenomination {
    /// Quoted in the security's local currency; the per-date exchange rate
    /// applies before inflation adjustment.
    Local,
    /// Already quoted in the reference currency.
    Reference,
}

#[derive(Debug, Clone)]
pub struct BenchmarkInput {
    pub series: Series,
    pub denomination: BenchmarkDenomination,
}

/// Raw inputs to one normalization run. `price` and `fx` are required;
/// the rest degrade to null output columns when empty or absent, whether
/// that emptiness came from upstream absence or upstream failure.
#[derive(Debug, Clone, Default)]
pub struct EngineInputs {
    /// Daily close in the security's local currency.
    pub price: Series,
    /// Units of local currency per one unit of reference currency.
    pub fx: Series,
    /// Monthly price-level index, dated on the first day of each month.
    pub price_level: Series,
    /// Daily commodity price per troy ounce, in the reference currency.
    pub commodity: Series,
    pub benchmark: Option<BenchmarkInput>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedRow {
    pub date: NaiveDate,
    /// Nominal close in the local currency.
    pub close_local: f64,
    /// Close divided by the day's exchange rate.
    pub close_reference: f64,
    /// Interpolated price-level value aligned to this date.
    pub price_level: Option<f64>,
    /// Reference close restated in last-row purchasing power.
    pub real_close: Option<f64>,
    /// Commodity price per troy ounce used for this date (forward-filled).
    pub commodity_unit_price: Option<f64>,
    pub close_troy_oz: Option<f64>,
    pub close_don: Option<f64>,
    /// Benchmark close after the same FX and price-level treatment.
    pub benchmark_real: Option<f64>,
    /// Cumulative excess return over the benchmark since the first row.
    pub alpha: Option<f64>,
}

#[derive(Debug, Default, PartialEq, Serialize)]
pub struct NormalizedSeries {
    pub rows: Vec<NormalizedRow>,
}

impl NormalizedSeries {
    /// Relative performance at the most recent date, or the neutral zero
    /// when alpha was never computed.
    pub fn overall_alpha(&self) -> f64 {
        self.rows.last().and_then(|r| r.alpha).unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

pub fn normalize(inputs: &EngineInputs) -> Result<NormalizedSeries, EngineError> {
    let mut rows = merge_base(&inputs.price, &inputs.fx)?;
    align_price_level(&mut rows, &inputs.price_level)?;
    denominate_in_commodity(&mut rows, &inputs.commodity)?;
    apply_benchmark(&mut rows, inputs.benchmark.as_ref(), &inputs.fx)?;
    Ok(NormalizedSeries { rows })
}

/// Inner join of price and exchange rate on date. Days where either side is
/// missing are dropped, not estimated.
fn merge_base(price: &Series, fx: &Series) -> Result<Vec<NormalizedRow>, EngineError> {
    let mut rows = Vec::new();
    for (date, close_local) in price.iter() {
        let Some(rate) = fx.get(date) else {
            continue;
        };
        if rate <= 0.0 {
            return Err(EngineError::InvalidExchangeRate { date, rate });
        }
        rows.push(NormalizedRow {
            date,
            close_local,
            close_reference: close_local / rate,
            price_level: None,
            real_close: None,
            commodity_unit_price: None,
            close_troy_oz: None,
            close_don: None,
            benchmark_real: None,
            alpha: None,
        });
    }
    if rows.is_empty() {
        return Err(EngineError::NoCommonDates);
    }
    Ok(rows)
}

/// Align the monthly index to the daily calendar and restate reference
/// closes in last-row purchasing power.
fn align_price_level(rows: &mut [NormalizedRow], index: &Series) -> Result<(), EngineError> {
    if index.is_empty() {
        return Ok(());
    }
    for (date, value) in index.iter() {
        if value <= 0.0 {
            return Err(EngineError::InvalidPriceLevel { date, value });
        }
    }

    // Daily interpolation covers the index's own span; rows past the last
    // observation carry the final value forward, rows before the first
    // observation stay null.
    let daily = index.interpolate_daily();
    for row in rows.iter_mut() {
        row.price_level = daily.at_or_earlier(row.date);
    }

    // The numeraire is the level at the most recent row, not a fixed epoch.
    let Some(base) = rows.last().and_then(|r| r.price_level) else {
        return Ok(());
    };
    for row in rows.iter_mut() {
        row.real_close = row.price_level.map(|level| row.close_reference * (base / level));
    }
    Ok(())
}

/// Express the reference close as an equivalent mass of the commodity.
fn denominate_in_commodity(
    rows: &mut [NormalizedRow],
    commodity: &Series,
) -> Result<(), EngineError> {
    if commodity.is_empty() {
        return Ok(());
    }
    for (date, price) in commodity.iter() {
        if price <= 0.0 {
            return Err(EngineError::InvalidCommodityPrice { date, price });
        }
    }

    for row in rows.iter_mut() {
        // The commodity market may be closed on a day the security trades;
        // carry the last known unit price forward.
        let Some(unit) = commodity.at_or_earlier(row.date) else {
            continue;
        };
        let ounces = row.close_reference / unit;
        row.commodity_unit_price = Some(unit);
        row.close_troy_oz = Some(ounces);
        row.close_don = Some(ounces * OZ_TO_DON);
    }
    Ok(())
}

/// Restate the benchmark on the same calendar and compute cumulative excess
/// return. Alpha anchors to the first row, unlike the price-level numeraire
/// which anchors to the last; the two conventions are independent.
fn apply_benchmark(
    rows: &mut [NormalizedRow],
    benchmark: Option<&BenchmarkInput>,
    fx: &Series,
) -> Result<(), EngineError> {
    let Some(benchmark) = benchmark else {
        return Ok(());
    };
    if benchmark.series.is_empty() {
        return Ok(());
    }

    let base_level = rows.last().and_then(|r| r.price_level);
    for row in rows.iter_mut() {
        let Some(close) = benchmark.series.at_or_earlier(row.date) else {
            continue;
        };
        let reference = match benchmark.denomination {
            BenchmarkDenomination::Local => {
                // Row dates come from the price/fx inner join, so a positive
                // rate exists for every row.
                let Some(rate) = fx.get(row.date) else {
                    continue;
                };
                close / rate
            }
            BenchmarkDenomination::Reference => close,
        };
        row.benchmark_real = match (base_level, row.price_level) {
            (Some(base), Some(level)) => Some(reference * (base / level)),
            _ => None,
        };
    }

    let security_base = rows.first().and_then(|r| r.real_close).filter(usable_base);
    let benchmark_base = rows
        .first()
        .and_then(|r| r.benchmark_real)
        .filter(usable_base);
    match (security_base, benchmark_base) {
        (Some(security_base), Some(benchmark_base)) => {
            for row in rows.iter_mut() {
                row.alpha = match (row.real_close, row.benchmark_real) {
                    (Some(real), Some(bench)) => {
                        let security_return = real / security_base - 1.0;
                        let benchmark_return = bench / benchmark_base - 1.0;
                        Some(security_return - benchmark_return)
                    }
                    _ => None,
                };
            }
        }
        // Either base is missing, zero or non-finite: alpha is the defined
        // neutral zero on every row rather than a null or a NaN cascade.
        _ => {
            for row in rows.iter_mut() {
                row.alpha = Some(0.0);
            }
        }
    }
    Ok(())
}

fn usable_base(value: &f64) -> bool {
    value.is_finite() && *value != 0.0
}
