use rand::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::PriceHistory;

use super::result::TailLoss;
use super::{SampleError, SampleOptions, SimulationParams, Window, run_sample};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// How many windows to draw and how long they last.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    pub samples: usize,
    /// Shortest window, in days
    pub min_loan_duration: f64,
    /// Longest window, in days
    pub max_loan_duration: f64,
    /// Worst samples to average; 5% of `samples` when unset
    pub n_top_samples: Option<usize>,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            samples: 400,
            min_loan_duration: 1.0,
            max_loan_duration: 1.0,
            n_top_samples: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LossRateError {
    #[error("no samples requested")]
    NoSamples,

    #[error("price history must span a positive time range (got {bars} bars over {span}s)")]
    ShortHistory { bars: usize, span: u64 },

    #[error("sample {index} ({window}) failed: {source}")]
    SampleFailed {
        index: usize,
        window: Window,
        #[source]
        source: SampleError,
    },
}

/// Draw `sampling.samples` windows from `rng`: start uniform in `[0, 1)`,
/// duration uniform between the min and max loan durations.
pub fn draw_windows(rng: &mut StdRng, history: &PriceHistory, sampling: &SamplingParams) -> Vec<Window> {
    let day_fraction = SECONDS_PER_DAY / history.span_seconds() as f64;
    let min = sampling.min_loan_duration * day_fraction;
    let spread = (sampling.max_loan_duration - sampling.min_loan_duration) * day_fraction;
    (0..sampling.samples)
        .map(|_| {
            let start: f64 = rng.random();
            let duration = spread * rng.random::<f64>() + min;
            Window { start, duration }
        })
        .collect()
}

/// Tail-risk loss rate: the mean of the worst sample losses over random
/// windows of `history`.
///
/// Windows are drawn up front from `rng`, then replayed in parallel.
/// Each sample is a pure function of its window, so the result is the
/// same for a given seed regardless of thread scheduling. Any failing
/// sample aborts the aggregation with its cause.
pub fn get_loss_rate(
    history: &PriceHistory,
    params: &SimulationParams,
    sampling: &SamplingParams,
    rng: &mut StdRng,
) -> Result<TailLoss, LossRateError> {
    if sampling.samples == 0 {
        return Err(LossRateError::NoSamples);
    }
    let span = history.span_seconds();
    if span == 0 {
        return Err(LossRateError::ShortHistory { bars: history.len(), span });
    }

    let _span = tracing::info_span!("loss_rate", samples = sampling.samples).entered();
    let windows = draw_windows(rng, history, sampling);
    let options = SampleOptions::default();
    // rayon workers have no span context of their own
    let parent = tracing::Span::current();

    let results: Vec<Result<f64, SampleError>> = windows
        .par_iter()
        .enumerate()
        .map(|(index, window)| {
            let _span = tracing::debug_span!(parent: &parent, "sample", index).entered();
            let report = run_sample(history, params, *window, &options)?;
            tracing::debug!(
                loss = report.loss,
                rising = report.rising_trades,
                falling = report.falling_trades,
                "sample done"
            );
            Ok(report.loss)
        })
        .collect();

    let mut losses = Vec::with_capacity(results.len());
    for (index, (window, result)) in windows.iter().zip(results).enumerate() {
        match result {
            Ok(loss) => losses.push(loss),
            Err(source) => {
                tracing::warn!(index, %window, error = %source, "sample failed; aborting loss rate");
                return Err(LossRateError::SampleFailed {
                    index,
                    window: *window,
                    source,
                });
            }
        }
    }

    let tail = TailLoss::from_losses(losses, sampling.n_top_samples)
        .ok_or(LossRateError::NoSamples)?;
    tracing::info!(
        loss_rate = tail.value,
        n_top = tail.n_top,
        worst = tail.worst,
        mean = tail.mean,
        "loss rate"
    );
    Ok(tail)
}
