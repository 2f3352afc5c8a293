use crate::amm::{Direction, TradeOutcome};

use super::Window;
use super::result::{LossPoint, SampleReport};

/// Per-sample collector: trade counts, fee observations, loss path.
pub struct SampleMetrics {
    initial_value: f64,
    rising_trades: u32,
    falling_trades: u32,
    saturated_trades: u32,
    fee_observations: Vec<f64>,
    // Worst intra-sample loss
    max_loss: f64,
    loss_series: Option<Vec<LossPoint>>,
}

impl SampleMetrics {
    pub fn new(initial_value: f64, track_losses: bool) -> Self {
        Self {
            initial_value,
            rising_trades: 0,
            falling_trades: 0,
            saturated_trades: 0,
            fee_observations: Vec::new(),
            max_loss: 0.0,
            loss_series: track_losses.then(Vec::new),
        }
    }

    pub fn record_trade(&mut self, outcome: &TradeOutcome) {
        match outcome.direction {
            Direction::Rising => self.rising_trades += 1,
            Direction::Falling => self.falling_trades += 1,
        }
        if outcome.saturated {
            self.saturated_trades += 1;
        }
    }

    /// Record the end-of-bar fee quote and pool value.
    pub fn record_bar(&mut self, timestamp: u64, fee: f64, value: f64) {
        self.fee_observations.push(fee);
        let loss = self.loss_of(value);
        if loss > self.max_loss {
            self.max_loss = loss;
        }
        if let Some(series) = self.loss_series.as_mut() {
            series.push(LossPoint { timestamp, loss });
        }
    }

    pub fn finalize(self, window: Window, final_value: f64, fees_collected: f64) -> SampleReport {
        SampleReport {
            window,
            loss: self.loss_of(final_value),
            max_loss: self.max_loss,
            rising_trades: self.rising_trades,
            falling_trades: self.falling_trades,
            saturated_trades: self.saturated_trades,
            fees_collected,
            bars: self.fee_observations.len(),
            fee_observations: self.fee_observations,
            loss_series: self.loss_series,
        }
    }

    fn loss_of(&self, value: f64) -> f64 {
        1.0 - value / self.initial_value
    }
}
