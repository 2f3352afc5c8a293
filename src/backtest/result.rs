use serde::Serialize;

use super::Window;

/// Running loss after one bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LossPoint {
    pub timestamp: u64,
    pub loss: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleReport {
    pub window: Window,
    /// `1 - final value / initial value`
    pub loss: f64,
    pub max_loss: f64,
    pub rising_trades: u32,
    pub falling_trades: u32,
    /// Trades that ran into the edge of the deposited range
    pub saturated_trades: u32,
    /// Stable-asset fees retained by the pool
    pub fees_collected: f64,
    pub bars: usize,
    pub fee_observations: Vec<f64>,
    pub loss_series: Option<Vec<LossPoint>>,
}

impl SampleReport {
    pub fn mean_fee(&self) -> f64 {
        if self.fee_observations.is_empty() {
            return 0.0;
        }
        self.fee_observations.iter().sum::<f64>() / self.fee_observations.len() as f64
    }

    pub fn print_summary(&self) {
        println!("\n{}", "═".repeat(72));
        println!("  Sample {}", self.window);
        println!("{}", "═".repeat(72));
        println!("  {:<24} {:>12}", "Bars", self.bars);
        println!("  {:<24} {:>12.6}", "Loss %", self.loss * 100.0);
        println!("  {:<24} {:>12.6}", "Max loss %", self.max_loss * 100.0);
        println!("  {:<24} {:>12}", "Rising trades", self.rising_trades);
        println!("  {:<24} {:>12}", "Falling trades", self.falling_trades);
        println!("  {:<24} {:>12}", "Saturated trades", self.saturated_trades);
        println!("  {:<24} {:>12.6}", "Fees collected", self.fees_collected);
        println!("  {:<24} {:>12.6}", "Mean fee %", self.mean_fee() * 100.0);
        println!("{}", "═".repeat(72));
    }
}

/// Tail-risk aggregate over many samples.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TailLoss {
    /// Mean of the `n_top` largest sample losses
    pub value: f64,
    pub n_top: usize,
    pub samples: usize,
    pub worst: f64,
    pub mean: f64,
}

impl TailLoss {
    /// Average the `n_top` worst losses. `n_top` defaults to 5% of the
    /// samples, at least one, and is capped at the sample count.
    pub fn from_losses(mut losses: Vec<f64>, n_top: Option<usize>) -> Option<Self> {
        if losses.is_empty() {
            return None;
        }
        let samples = losses.len();
        let n_top = n_top.unwrap_or(samples / 20).clamp(1, samples);
        losses.sort_by(|a, b| b.total_cmp(a));
        let value = losses[..n_top].iter().sum::<f64>() / n_top as f64;
        Some(Self {
            value,
            n_top,
            samples,
            worst: losses[0],
            mean: losses.iter().sum::<f64>() / samples as f64,
        })
    }
}
