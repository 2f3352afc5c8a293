use clap::{Parser, Subcommand};
use std::path::PathBuf;

use amm_loss_sim::data::ImporterKind;

/// Band-ladder AMM loss simulator: import price history, replay it against
/// the AMM and scan parameters for loss and liquidity discount.
#[derive(Parser)]
#[command(name = "amm-loss-sim", version, about)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Download 1-minute bars for a pair into the local cache
    ImportData {
        /// Exchange symbol, e.g. BTCUSDT
        #[arg(long)]
        pair: String,

        /// Importer backend
        #[arg(long, default_value = "binance")]
        importer: ImporterKind,

        /// First day to fetch (YYYY-MM-DD, UTC)
        #[arg(long)]
        start: Option<chrono::NaiveDate>,

        /// Directory holding the price caches
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
    },

    /// Sweep one parameter of a scan config and report loss and discount curves
    Scan {
        /// Path to the scan config JSON file
        file: PathBuf,

        /// Directory holding the price caches
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,

        /// Directory the curves are written to
        #[arg(long, default_value = "results")]
        results_dir: PathBuf,
    },

    /// Replay a single window and print its report
    Sample {
        #[arg(long)]
        pair: String,

        #[arg(long, default_value = "binance")]
        importer: ImporterKind,

        #[arg(long, default_value = "data")]
        data_dir: PathBuf,

        /// Band width factor
        #[arg(long, default_value = "100")]
        a: f64,

        #[arg(long, default_value = "0.003")]
        fee: f64,

        /// Oracle EMA half-life in seconds
        #[arg(long, default_value = "600")]
        t_exp: f64,

        #[arg(long, default_value = "4")]
        range: usize,

        #[arg(long, default_value = "0.0005")]
        external_fee: f64,

        #[arg(long, default_value = "0")]
        dynamic_fee_multiplier: f64,

        /// Window start as a fraction of the history
        #[arg(long, default_value = "0")]
        start: f64,

        /// Window length as a fraction of the history
        #[arg(long, default_value = "1")]
        duration: f64,

        /// Shift the deposit centre below the first open by this fraction
        #[arg(long, default_value = "0")]
        position_shift: f64,

        /// Skip the time-reversed extension of the history
        #[arg(long)]
        no_reverse: bool,

        /// Write the per-bar loss series as CSV
        #[arg(long)]
        losses_out: Option<PathBuf>,
    },
}
