pub mod metrics;
pub mod monte_carlo;
pub mod result;
pub mod target;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::amm::{AmmError, AmmParams, BandAmm, Direction, FeeState};
use crate::data::PriceHistory;
use crate::liquidity::InitialLiquidity;

use metrics::SampleMetrics;
use result::SampleReport;

pub use monte_carlo::{LossRateError, SamplingParams, get_loss_rate};
pub use result::TailLoss;
pub use target::find_target_price;

/// Offset of the base price above the first bar, as a multiple of it
/// beyond `A/(A-1)`, so the first bar never sits on a band edge.
const BASE_PRICE_EPSILON: f64 = 1e-4;

/// AMM and market parameters for one sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationParams {
    /// Band width factor
    pub a: f64,
    /// Base AMM fee
    pub fee: f64,
    /// Number of bands the initial deposit is spread over
    pub initial_liquidity_range: usize,
    /// Fee paid by the arbitrageur on the external market
    pub external_fee: f64,
    pub dynamic_fee_multiplier: f64,
}

/// Per-run switches that do not change the market model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleOptions {
    /// Risky units deposited at the start of the sample
    pub initial_amount: f64,
    /// Deposit centre below the first open, as a fraction of it
    pub position_shift: f64,
    /// Keep the per-bar loss series in the report
    pub track_losses: bool,
    /// Emit a trace event for every bar
    pub log_bars: bool,
}

impl Default for SampleOptions {
    fn default() -> Self {
        Self {
            initial_amount: 1.0,
            position_shift: 0.0,
            track_losses: false,
            log_bars: false,
        }
    }
}

/// A slice of the price history, as fractions of its length.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Window {
    pub start: f64,
    pub duration: f64,
}

impl Window {
    /// Bar index range selected out of `len` bars.
    pub fn bounds(&self, len: usize) -> (usize, usize) {
        let start = (self.start * len as f64) as usize;
        let end = (((self.start + self.duration) * len as f64) as usize).min(len);
        (start.min(len), end)
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "start={:.4} duration={:.4}", self.start, self.duration)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SampleError {
    #[error("window {window} selects no bars out of {len}")]
    EmptyWindow { window: Window, len: usize },

    #[error("initial deposit has no value")]
    ZeroInitialValue,

    #[error(transparent)]
    Amm(#[from] AmmError),
}

/// Replay one window of `history` against a fresh AMM and report the
/// fraction of the deposit's value that leaked to arbitrage net of fees.
pub fn run_sample(
    history: &PriceHistory,
    params: &SimulationParams,
    window: Window,
    options: &SampleOptions,
) -> Result<SampleReport, SampleError> {
    let (start, end) = window.bounds(history.len());
    if start >= end {
        return Err(SampleError::EmptyWindow { window, len: history.len() });
    }
    let bars = &history.bars()[start..end];
    let oracle_prices = &history.oracle_prices()[start..end];

    let p0 = bars[0].open * (1.0 - options.position_shift);
    let base_price = p0 * (params.a / (params.a - 1.0) + BASE_PRICE_EPSILON);
    let mut amm = BandAmm::new(AmmParams {
        base_price,
        a: params.a,
        fee: params.fee,
        dynamic_fee_multiplier: params.dynamic_fee_multiplier,
    })?
    .with_oracle_price(oracle_prices[0]);

    InitialLiquidity::ConstantRange {
        center_price: p0,
        n_bands: params.initial_liquidity_range,
    }
    .deposit(&mut amm, options.initial_amount)?;

    let initial_value = amm.total_value();
    if !(initial_value > 0.0) {
        return Err(SampleError::ZeroInitialValue);
    }

    let mut metrics = SampleMetrics::new(initial_value, options.track_losses);
    for (bar, &oracle) in bars.iter().zip(oracle_prices) {
        amm.set_oracle_price(oracle);

        let high = find_target_price(
            &amm,
            bar.high * (1.0 - params.external_fee),
            Direction::Rising,
            FeeState::Pending,
        );
        let low = find_target_price(
            &amm,
            bar.low * (1.0 + params.external_fee),
            Direction::Falling,
            FeeState::Settled,
        );

        if high > amm.current_price() {
            let outcome = amm.trade_to_price(high)?;
            metrics.record_trade(&outcome);
        }
        if low < amm.current_price() {
            let outcome = amm.trade_to_price(low)?;
            metrics.record_trade(&outcome);
        }

        let value = amm.total_value();
        metrics.record_bar(
            bar.timestamp,
            amm.dynamic_fee(amm.active_band(), FeeState::Settled),
            value,
        );
        if options.log_bars {
            tracing::trace!(
                timestamp = bar.timestamp,
                open = bar.open,
                oracle,
                amm_price = amm.current_price(),
                loss_pct = 100.0 * (1.0 - value / initial_value),
                "bar"
            );
        }
    }

    Ok(metrics.finalize(window, amm.total_value(), amm.fees_collected()))
}
