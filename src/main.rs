use anyhow::{Context, Result};
use clap::Parser;
use rand::prelude::*;

use amm_loss_sim::backtest::{self, SampleOptions, SimulationParams, Window};
use amm_loss_sim::data::{self, PriceHistory, PriceHistoryLoader};
use amm_loss_sim::oracle::PriceOracle;
use amm_loss_sim::scan::{self, ConsoleReport, CsvReport, ScanConfig, ScanReport};
use amm_loss_sim::{fetch_data, logging};

mod cli;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    logging::install(logging::dispatch(cli.verbose))?;

    match cli.command {
        cli::Command::ImportData {
            pair,
            importer,
            start,
            data_dir,
        } => {
            let start_ms = start.map(|d| d.and_time(chrono::NaiveTime::MIN).and_utc().timestamp_millis());
            let count = fetch_data::run(importer, &pair, &data_dir, start_ms)?;
            println!("Saved {count} bars for {pair} to {}", data::cache_path(&data_dir, &pair, importer).display());
            Ok(())
        }
        cli::Command::Scan {
            file,
            data_dir,
            results_dir,
        } => run_scan(&file, &data_dir, &results_dir),
        cli::Command::Sample {
            pair,
            importer,
            data_dir,
            a,
            fee,
            t_exp,
            range,
            external_fee,
            dynamic_fee_multiplier,
            start,
            duration,
            position_shift,
            no_reverse,
            losses_out,
        } => {
            let bars = PriceHistoryLoader::Stored {
                importer,
                pair,
                data_dir,
                add_reverse: !no_reverse,
            }
            .load_prices()?;
            let history = PriceHistory::new(bars, &PriceOracle::ema(t_exp));
            let params = SimulationParams {
                a,
                fee,
                initial_liquidity_range: range,
                external_fee,
                dynamic_fee_multiplier,
            };
            let options = SampleOptions {
                position_shift,
                track_losses: losses_out.is_some(),
                log_bars: true,
                ..SampleOptions::default()
            };
            let report = backtest::run_sample(&history, &params, Window { start, duration }, &options)
                .context("running sample")?;
            report.print_summary();
            if let (Some(path), Some(series)) = (losses_out, report.loss_series.as_ref()) {
                data::write_csv(&path, series)?;
                println!("  Loss series written to {}", path.display());
            }
            Ok(())
        }
    }
}

fn run_scan(file: &std::path::Path, data_dir: &std::path::Path, results_dir: &std::path::Path) -> Result<()> {
    let config = ScanConfig::load(file)?;
    let (parameter, values) = config.sweep()?;
    println!("Scanning {} over {} ({} values)", config.pair, parameter, values.len());

    let bars = PriceHistoryLoader::Stored {
        importer: config.importer,
        pair: config.pair.clone(),
        data_dir: data_dir.to_path_buf(),
        add_reverse: config.add_reverse,
    }
    .load_prices()?;

    let pb = indicatif::ProgressBar::new(values.len() as u64);
    if let Ok(style) = indicatif::ProgressStyle::default_bar().template("  Scan [{bar:40}] {pos}/{len} ({eta})") {
        pb.set_style(style);
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let result = scan::scan(&config, &bars, &mut rng, |_| pb.inc(1))?;
    pb.finish_and_clear();

    ConsoleReport.report(&result)?;
    let mut csv = CsvReport::new(results_dir);
    csv.report(&result)?;
    for path in csv.written() {
        println!("  Wrote {}", path.display());
    }
    Ok(())
}
