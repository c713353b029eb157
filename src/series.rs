//! Ordered daily time series, the common shape of every engine input.

use chrono::{Duration, NaiveDate};
use std::collections::BTreeMap;

/// A calendar-dated series of values. Dates are timezone-naive days kept in
/// ascending order with no duplicates; gaps between dates are expected
/// (markets close, indices report monthly).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    points: BTreeMap<NaiveDate, f64>,
}

impl Series {
    pub fn new() -> Self {
        Self {
            points: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, date: NaiveDate, value: f64) {
        self.points.insert(date, value);
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Value at exactly `date`, if present.
    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.points.get(&date).copied()
    }

    pub fn first(&self) -> Option<(NaiveDate, f64)> {
        self.points.iter().next().map(|(d, v)| (*d, *v))
    }

    pub fn last(&self) -> Option<(NaiveDate, f64)> {
        self.points.iter().next_back().map(|(d, v)| (*d, *v))
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.points.iter().map(|(d, v)| (*d, *v))
    }

    /// Value at `date`, falling back to the most recent earlier point.
    /// `None` for dates before the first point.
    pub fn at_or_earlier(&self, date: NaiveDate) -> Option<f64> {
        self.points.range(..=date).next_back().map(|(_, v)| *v)
    }

    /// Resample to daily granularity, linearly interpolating between
    /// consecutive points. Every calendar day from the first to the last
    /// known date gets a value; nothing is extrapolated beyond either end.
    pub fn interpolate_daily(&self) -> Series {
        let mut daily = Series::new();
        let mut prev: Option<(NaiveDate, f64)> = None;
        for (date, value) in self.iter() {
            if let Some((d0, v0)) = prev {
                let span = (date - d0).num_days();
                for offset in 1..span {
                    let t = offset as f64 / span as f64;
                    daily.insert(d0 + Duration::days(offset), v0 + (value - v0) * t);
                }
            }
            daily.insert(date, value);
            prev = Some((date, value));
        }
        daily
    }
}

impl FromIterator<(NaiveDate, f64)> for Series {
    fn from_iter<I: IntoIterator<Item = (NaiveDate, f64)>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}
