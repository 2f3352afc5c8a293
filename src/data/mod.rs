pub mod csv_types;
mod loader;

pub use csv_types::PriceBar;
pub use loader::{ImporterKind, PriceHistoryLoader, cache_path};

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::oracle::PriceOracle;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum HistoryError {
    #[error("price history has {bars} bars but {oracle} oracle prices")]
    Misaligned { bars: usize, oracle: usize },
}

/// Bars together with their index-aligned oracle prices.
///
/// Built once per price history and shared read-only by every sample.
#[derive(Debug, Clone)]
pub struct PriceHistory {
    bars: Vec<PriceBar>,
    oracle: Vec<f64>,
}

impl PriceHistory {
    pub fn new(bars: Vec<PriceBar>, oracle: &PriceOracle) -> Self {
        let oracle = oracle.calculate_oracle_prices(&bars);
        Self { bars, oracle }
    }

    pub fn from_parts(bars: Vec<PriceBar>, oracle: Vec<f64>) -> Result<Self, HistoryError> {
        if bars.len() != oracle.len() {
            return Err(HistoryError::Misaligned {
                bars: bars.len(),
                oracle: oracle.len(),
            });
        }
        Ok(Self { bars, oracle })
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn oracle_prices(&self) -> &[f64] {
        &self.oracle
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Seconds between the first and last bar.
    pub fn span_seconds(&self) -> u64 {
        match (self.bars.first(), self.bars.last()) {
            (Some(first), Some(last)) => last.timestamp.saturating_sub(first.timestamp),
            _ => 0,
        }
    }
}

/// Load CSV rows of type T from `path`.
pub fn load_csv<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Vec<T>> {
    let mut rdr = csv::Reader::from_path(path)
        .with_context(|| format!("opening CSV file {}", path.display()))?;
    let rows: Vec<T> = rdr
        .deserialize()
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("parsing CSV file {}", path.display()))?;
    Ok(rows)
}

/// Write rows to `path` as CSV, creating parent directories.
pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("creating CSV file {}", path.display()))?;
    for row in rows {
        wtr.serialize(row)
            .with_context(|| format!("writing CSV row to {}", path.display()))?;
    }
    wtr.flush()
        .with_context(|| format!("flushing CSV file {}", path.display()))?;
    Ok(())
}
