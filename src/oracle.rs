use serde::{Deserialize, Serialize};

use crate::data::PriceBar;

/// Smoothed reference price derived from raw bars.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PriceOracle {
    /// Exponential moving average of the bar mid `(high + low) / 2`
    /// with half-life `t_exp` seconds.
    Ema { t_exp: f64 },
}

/// Running EMA estimate and the timestamp it was last updated at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmaState {
    pub value: f64,
    pub time: u64,
}

impl EmaState {
    /// Seed the estimate with a bar's open.
    pub fn seed(bar: &PriceBar) -> Self {
        Self {
            value: bar.open,
            time: bar.timestamp,
        }
    }

    /// Decay toward the bar's mid with weight `2^(-Δt / t_exp)`.
    pub fn update(self, bar: &PriceBar, t_exp: f64) -> Self {
        let dt = bar.timestamp.saturating_sub(self.time);
        if dt == 0 {
            return Self { time: self.time.max(bar.timestamp), ..self };
        }
        let weight = (-(dt as f64) / t_exp).exp2();
        let mid = (bar.high + bar.low) / 2.0;
        Self {
            value: self.value * weight + mid * (1.0 - weight),
            time: bar.timestamp,
        }
    }
}

impl PriceOracle {
    pub fn ema(t_exp: f64) -> Self {
        Self::Ema { t_exp }
    }

    /// One oracle price per bar, index-aligned with `bars`.
    pub fn calculate_oracle_prices(&self, bars: &[PriceBar]) -> Vec<f64> {
        match *self {
            Self::Ema { t_exp } => {
                let Some(first) = bars.first() else {
                    return Vec::new();
                };
                let mut state = EmaState::seed(first);
                bars.iter()
                    .map(|bar| {
                        state = state.update(bar, t_exp);
                        state.value
                    })
                    .collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(timestamp: u64, price: f64) -> PriceBar {
        PriceBar::flat(timestamp, price)
    }

    #[test]
    fn half_life_halves_the_gap() {
        let state = EmaState { value: 100.0, time: 0 };
        let next = state.update(&bar(600, 200.0), 600.0);
        assert!((next.value - 150.0).abs() < 1e-12);
        assert_eq!(next.time, 600);
    }

    #[test]
    fn first_bar_only_reports_its_open() {
        let bars = [PriceBar { timestamp: 10, open: 5.0, high: 9.0, low: 7.0, close: 8.0, volume: 0.0 }];
        assert_eq!(PriceOracle::ema(600.0).calculate_oracle_prices(&bars), vec![5.0]);
    }
}
