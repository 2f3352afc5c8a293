mod band;
mod ladder;

pub use band::Band;
pub use ladder::{LADDER_HALF_WIDTH, Ladder};

use std::cmp::Ordering;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AmmError {
    #[error("invalid AMM parameters: {0}")]
    InvalidParameters(String),

    #[error("invalid deposit: {0}")]
    InvalidDeposit(String),

    #[error("liquidity was already deposited into this AMM")]
    AlreadyDeposited,

    #[error("no liquidity has been deposited")]
    NoLiquidity,

    #[error("trade target {0} is not a positive finite price")]
    InvalidTarget(f64),

    #[error("trade target {target} lies outside the band ladder ({low}..={high})")]
    TargetOutsideLadder { target: f64, low: f64, high: f64 },
}

/// Which oracle observation a fee quote is evaluated against.
///
/// Every `set_oracle_price` call promotes the previous pending price to
/// settled. Rising targets are quoted on `Pending`, falling targets on
/// `Settled`: within one bar the rising quote must reflect the newest
/// oracle, while the falling quote keeps the one the previous bar traded on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeState {
    Settled,
    Pending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Rising,
    Falling,
}

/// Construction parameters for a fresh [`BandAmm`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmmParams {
    pub base_price: f64,
    /// Band width factor `A`
    pub a: f64,
    /// Base fee charged on every trade leg
    pub fee: f64,
    /// Scale of the imbalance-dependent fee component
    pub dynamic_fee_multiplier: f64,
}

/// Summary of one `trade_to_price` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeOutcome {
    pub direction: Direction,
    /// Risky asset sold by the AMM (negative when it bought)
    pub risky_delta: f64,
    /// Stable asset received by the AMM (negative when it paid out)
    pub stable_delta: f64,
    pub fee_paid: f64,
    pub bands_crossed: u32,
    /// The walk stopped at the edge of the active range before the target.
    pub saturated: bool,
}

impl TradeOutcome {
    fn new(direction: Direction) -> Self {
        Self {
            direction,
            risky_delta: 0.0,
            stable_delta: 0.0,
            fee_paid: 0.0,
            bands_crossed: 0,
            saturated: false,
        }
    }
}

/// Band-ladder AMM with oracle-pegged execution.
///
/// Each band exchanges at the oracle price clamped into its own bounds, so
/// a trade is value-neutral at that price and only the fee changes the
/// pool's value. Fees accrue in the stable asset outside the bands.
#[derive(Debug, Clone)]
pub struct BandAmm {
    ladder: Ladder,
    fee: f64,
    dynamic_fee_multiplier: f64,
    /// Reserves for `min_band..=max_band`, starting at `first_band`
    bands: Vec<Band>,
    first_band: i32,
    active_band: i32,
    price: f64,
    oracle_pending: f64,
    oracle_settled: f64,
    fees_collected: f64,
}

impl BandAmm {
    pub fn new(params: AmmParams) -> Result<Self, AmmError> {
        let ladder = Ladder::new(params.base_price, params.a)?;
        if !(params.fee >= 0.0 && params.dynamic_fee_multiplier >= 0.0) {
            return Err(AmmError::InvalidParameters(format!(
                "fee {} and dynamic fee multiplier {} must be non-negative",
                params.fee, params.dynamic_fee_multiplier
            )));
        }
        if params.fee + params.dynamic_fee_multiplier >= 1.0 {
            return Err(AmmError::InvalidParameters(format!(
                "fee {} plus dynamic fee multiplier {} must stay below 1",
                params.fee, params.dynamic_fee_multiplier
            )));
        }
        Ok(Self {
            ladder,
            fee: params.fee,
            dynamic_fee_multiplier: params.dynamic_fee_multiplier,
            bands: Vec::new(),
            first_band: 0,
            active_band: 0,
            price: params.base_price,
            oracle_pending: params.base_price,
            oracle_settled: params.base_price,
            fees_collected: 0.0,
        })
    }

    /// Initialise both oracle slots to `price`.
    pub fn with_oracle_price(mut self, price: f64) -> Self {
        self.oracle_pending = price;
        self.oracle_settled = price;
        self
    }

    // ── Ladder accessors ─────────────────────────────────────────────

    pub fn ladder(&self) -> &Ladder {
        &self.ladder
    }

    pub fn price_at_lower_bound(&self, n: i32) -> f64 {
        self.ladder.p_down(n)
    }

    pub fn price_at_upper_bound(&self, n: i32) -> f64 {
        self.ladder.p_up(n)
    }

    pub fn min_band(&self) -> i32 {
        self.first_band
    }

    pub fn max_band(&self) -> i32 {
        self.first_band + self.bands.len().saturating_sub(1) as i32
    }

    pub fn active_band(&self) -> i32 {
        self.active_band
    }

    /// Reserves of band `n`; empty outside the active range.
    pub fn band(&self, n: i32) -> Band {
        self.slot(n).map(|i| self.bands[i]).unwrap_or_default()
    }

    pub fn has_liquidity(&self) -> bool {
        !self.bands.is_empty()
    }

    // ── State accessors ──────────────────────────────────────────────

    pub fn current_price(&self) -> f64 {
        self.price
    }

    pub fn oracle_price(&self, state: FeeState) -> f64 {
        match state {
            FeeState::Settled => self.oracle_settled,
            FeeState::Pending => self.oracle_pending,
        }
    }

    pub fn fees_collected(&self) -> f64 {
        self.fees_collected
    }

    /// Price band `n` exchanges at: the oracle clamped into the band.
    pub fn execution_price(&self, n: i32, state: FeeState) -> f64 {
        self.oracle_price(state)
            .clamp(self.ladder.p_down(n), self.ladder.p_up(n))
    }

    /// Reserves valued in the stable asset at each band's execution price.
    pub fn reserve_value(&self) -> f64 {
        (self.min_band()..=self.max_band())
            .zip(&self.bands)
            .map(|(n, band)| band.value_at(self.execution_price(n, FeeState::Pending)))
            .sum()
    }

    /// Reserves plus collected fees, in the stable asset.
    pub fn total_value(&self) -> f64 {
        self.reserve_value() + self.fees_collected
    }

    /// Base fee plus the multiplier times band `n`'s risky-value share.
    pub fn dynamic_fee(&self, n: i32, state: FeeState) -> f64 {
        let e = self.execution_price(n, state);
        self.fee + self.dynamic_fee_multiplier * self.band(n).imbalance(e)
    }

    // ── Mutations ────────────────────────────────────────────────────

    pub fn set_oracle_price(&mut self, price: f64) {
        self.oracle_settled = self.oracle_pending;
        self.oracle_pending = price;
    }

    /// Spread `amount` units of the risky asset, valued at `center_price`,
    /// evenly by value over `n_bands` bands around the band holding
    /// `center_price`. Bands above the centre hold only the risky asset,
    /// bands below only the stable one.
    pub fn deposit_range(
        &mut self,
        amount: f64,
        center_price: f64,
        n_bands: usize,
    ) -> Result<(), AmmError> {
        if self.has_liquidity() {
            return Err(AmmError::AlreadyDeposited);
        }
        if n_bands < 1 || n_bands > (2 * LADDER_HALF_WIDTH + 1) as usize {
            return Err(AmmError::InvalidDeposit(format!(
                "band count {n_bands} must be between 1 and {}",
                2 * LADDER_HALF_WIDTH + 1
            )));
        }
        if !amount.is_finite() || amount <= 0.0 {
            return Err(AmmError::InvalidDeposit(format!(
                "amount must be positive and finite, got {amount}"
            )));
        }
        let center = self
            .ladder
            .band_of(center_price)
            .map_err(|e| AmmError::InvalidDeposit(e.to_string()))?;
        let lowest = center - ((n_bands - 1) / 2) as i32;
        let highest = center + (n_bands / 2) as i32;
        if !self.ladder.contains_index(lowest) || !self.ladder.contains_index(highest) {
            return Err(AmmError::InvalidDeposit(format!(
                "bands {lowest}..={highest} exceed the ladder"
            )));
        }

        let per_band = amount * center_price / n_bands as f64;
        self.bands = (lowest..=highest)
            .map(|n| {
                let e = self.execution_price(n, FeeState::Pending);
                match n.cmp(&center) {
                    Ordering::Less => Band { x: 0.0, y: per_band / e },
                    Ordering::Greater => Band { x: per_band, y: 0.0 },
                    Ordering::Equal => {
                        let (p_down, p_up) = (self.ladder.p_down(n), self.ladder.p_up(n));
                        let mid = self.ladder.mid(n);
                        let phi = ((center_price - p_down) / (p_up - p_down)).clamp(0.0, 1.0);
                        let denom = phi * mid + (1.0 - phi) * e;
                        Band {
                            x: per_band * phi * mid / denom,
                            y: per_band * (1.0 - phi) / denom,
                        }
                    }
                }
            })
            .collect();
        self.first_band = lowest;
        self.active_band = center;
        self.price = center_price;
        Ok(())
    }

    /// Walk the ladder from the active band toward `target_price`,
    /// converting each visited band at its execution price, until the
    /// target is reached or the active range runs out.
    pub fn trade_to_price(&mut self, target_price: f64) -> Result<TradeOutcome, AmmError> {
        if !self.has_liquidity() {
            return Err(AmmError::NoLiquidity);
        }
        if !target_price.is_finite() || target_price <= 0.0 {
            return Err(AmmError::InvalidTarget(target_price));
        }
        let (low, high) = self.ladder.extent();
        if target_price < low || target_price > high {
            return Err(AmmError::TargetOutsideLadder { target: target_price, low, high });
        }

        let direction = match target_price.partial_cmp(&self.price) {
            Some(Ordering::Greater) => Direction::Rising,
            Some(Ordering::Less) => Direction::Falling,
            _ => return Ok(TradeOutcome::new(Direction::Rising)),
        };
        let mut outcome = TradeOutcome::new(direction);

        loop {
            let n = self.active_band;
            let (p_down, p_up) = (self.ladder.p_down(n), self.ladder.p_up(n));
            let leg_target = match direction {
                Direction::Rising => target_price.min(p_up),
                Direction::Falling => target_price.max(p_down),
            };
            let fee_rate = self.dynamic_fee(n, FeeState::Pending);
            let e = self.execution_price(n, FeeState::Pending);
            let mid = self.ladder.mid(n);
            let composition = (leg_target - p_down) / (p_up - p_down);

            let Some(slot) = self.slot(n) else {
                break;
            };
            let leg = self.bands[slot].convert_to(composition, e, mid);
            let fee_paid = leg.dx.abs() * fee_rate;
            self.fees_collected += fee_paid;
            outcome.risky_delta += leg.dy;
            outcome.stable_delta += leg.dx;
            outcome.fee_paid += fee_paid;
            self.price = leg_target;

            let (reached, at_edge, next) = match direction {
                Direction::Rising => (target_price <= p_up, n == self.min_band(), n - 1),
                Direction::Falling => (target_price >= p_down, n == self.max_band(), n + 1),
            };
            if reached {
                break;
            }
            if at_edge {
                outcome.saturated = true;
                break;
            }
            self.active_band = next;
            outcome.bands_crossed += 1;
        }

        self.trim_range();
        Ok(outcome)
    }

    // ── Internal helpers ─────────────────────────────────────────────

    fn slot(&self, n: i32) -> Option<usize> {
        let offset = n.checked_sub(self.first_band)?;
        usize::try_from(offset).ok().filter(|&i| i < self.bands.len())
    }

    /// Drop emptied bands from both edges, keeping at least one.
    fn trim_range(&mut self) {
        while self.bands.len() > 1 && self.bands[0].is_empty() {
            self.bands.remove(0);
            self.first_band += 1;
        }
        while self.bands.len() > 1 && self.bands.last().is_some_and(Band::is_empty) {
            self.bands.pop();
        }
        self.active_band = self.active_band.clamp(self.min_band(), self.max_band());
    }
}
