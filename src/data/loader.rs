use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use super::PriceBar;

/// Exchange backends a price cache can come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImporterKind {
    Binance,
}

impl ImporterKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Binance => "binance",
        }
    }
}

impl fmt::Display for ImporterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ImporterKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "binance" => Ok(Self::Binance),
            other => bail!("unsupported importer `{other}` (supported: binance)"),
        }
    }
}

/// Location of the 1-minute bar cache for `pair`.
pub fn cache_path(data_dir: &Path, pair: &str, importer: ImporterKind) -> PathBuf {
    data_dir.join(pair).join(format!("{pair}-1m-{importer}.csv"))
}

/// Source of the bars a simulation runs over.
#[derive(Debug, Clone)]
pub enum PriceHistoryLoader {
    /// Bars cached on disk by an importer.
    Stored {
        importer: ImporterKind,
        pair: String,
        data_dir: PathBuf,
        add_reverse: bool,
    },
    /// Bars already in memory.
    InMemory { bars: Vec<PriceBar>, add_reverse: bool },
}

impl PriceHistoryLoader {
    /// Bars in strictly increasing time order, optionally followed by a
    /// time-mirrored copy.
    pub fn load_prices(&self) -> Result<Vec<PriceBar>> {
        let (raw, add_reverse) = match self {
            Self::Stored { importer, pair, data_dir, add_reverse } => {
                let path = cache_path(data_dir, pair, *importer);
                (super::load_csv::<PriceBar>(&path)?, *add_reverse)
            }
            Self::InMemory { bars, add_reverse } => (bars.clone(), *add_reverse),
        };
        let mut bars = keep_increasing(raw);
        if add_reverse {
            extend_reversed(&mut bars);
        }
        tracing::debug!(bars = bars.len(), add_reverse, "loaded price history");
        Ok(bars)
    }
}

/// Drop bars whose timestamp does not advance past the last kept bar.
fn keep_increasing(raw: Vec<PriceBar>) -> Vec<PriceBar> {
    let mut kept: Vec<PriceBar> = Vec::with_capacity(raw.len());
    let mut dropped = 0usize;
    for bar in raw {
        match kept.last() {
            Some(last) if bar.timestamp <= last.timestamp => dropped += 1,
            _ => kept.push(bar),
        }
    }
    if dropped > 0 {
        tracing::warn!(dropped, "dropped duplicate or out-of-order bars");
    }
    kept
}

/// Append the history played backwards, mirrored around the last bar.
fn extend_reversed(bars: &mut Vec<PriceBar>) {
    let Some(last) = bars.last().map(|b| b.timestamp) else {
        return;
    };
    let mirrored: Vec<PriceBar> = bars
        .iter()
        .rev()
        .skip(1)
        .map(|bar| PriceBar {
            timestamp: last + (last - bar.timestamp),
            ..*bar
        })
        .collect();
    bars.extend(mirrored);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_and_mirrors() {
        let raw = vec![
            PriceBar::flat(60, 1.0),
            PriceBar::flat(120, 2.0),
            PriceBar::flat(120, 9.0),
            PriceBar::flat(90, 9.0),
            PriceBar::flat(300, 3.0),
        ];
        let loader = PriceHistoryLoader::InMemory { bars: raw, add_reverse: true };
        let bars = loader.load_prices().unwrap();
        let times: Vec<u64> = bars.iter().map(|b| b.timestamp).collect();
        let prices: Vec<f64> = bars.iter().map(|b| b.open).collect();
        assert_eq!(times, vec![60, 120, 300, 480, 540]);
        assert_eq!(prices, vec![1.0, 2.0, 3.0, 2.0, 1.0]);
    }

    #[test]
    fn importer_names_parse() {
        assert_eq!("Binance".parse::<ImporterKind>().unwrap(), ImporterKind::Binance);
        assert!("kraken".parse::<ImporterKind>().is_err());
    }
}
