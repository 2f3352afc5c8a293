use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Serialize;

use super::ScanResult;

/// Destination for the curves a scan produces.
pub trait ScanReport {
    fn report(&mut self, result: &ScanResult) -> Result<()>;
}

/// Prints the scan table to stdout.
pub struct ConsoleReport;

impl ScanReport for ConsoleReport {
    fn report(&mut self, result: &ScanResult) -> Result<()> {
        result.print_table();
        Ok(())
    }
}

#[derive(Serialize)]
struct LossRow {
    value: f64,
    loss: f64,
}

#[derive(Serialize)]
struct DiscountRow {
    value: f64,
    discount: f64,
}

/// Writes `losses__{parameter}.csv` and `discounts__{parameter}.csv`
/// under `{results_dir}/{pair}/`.
pub struct CsvReport {
    results_dir: PathBuf,
    written: Vec<PathBuf>,
}

impl CsvReport {
    pub fn new(results_dir: impl Into<PathBuf>) -> Self {
        Self {
            results_dir: results_dir.into(),
            written: Vec::new(),
        }
    }

    pub fn curve_path(&self, result: &ScanResult, kind: &str) -> PathBuf {
        curve_path(&self.results_dir, &result.pair, kind, &result.parameter)
    }

    /// Files written so far.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

fn curve_path(results_dir: &Path, pair: &str, kind: &str, parameter: &str) -> PathBuf {
    results_dir.join(pair).join(format!("{kind}__{parameter}.csv"))
}

impl ScanReport for CsvReport {
    fn report(&mut self, result: &ScanResult) -> Result<()> {
        let losses: Vec<LossRow> = result
            .losses()
            .into_iter()
            .map(|(value, loss)| LossRow { value, loss })
            .collect();
        let discounts: Vec<DiscountRow> = result
            .discounts()
            .into_iter()
            .map(|(value, discount)| DiscountRow { value, discount })
            .collect();

        let loss_path = self.curve_path(result, "losses");
        crate::data::write_csv(&loss_path, &losses)?;
        let discount_path = self.curve_path(result, "discounts");
        crate::data::write_csv(&discount_path, &discounts)?;

        tracing::info!(
            losses = %loss_path.display(),
            discounts = %discount_path.display(),
            "wrote scan curves"
        );
        self.written.push(loss_path);
        self.written.push(discount_path);
        Ok(())
    }
}
