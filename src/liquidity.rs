use serde::{Deserialize, Serialize};

use crate::amm::{AmmError, BandAmm};

/// How the starting liquidity of a sample is placed on the ladder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InitialLiquidity {
    /// Equal value in each of `n_bands` bands around `center_price`.
    ConstantRange { center_price: f64, n_bands: usize },
}

impl InitialLiquidity {
    /// Deposit `initial_amount` units of the risky asset. Called once per AMM.
    pub fn deposit(&self, amm: &mut BandAmm, initial_amount: f64) -> Result<(), AmmError> {
        match *self {
            Self::ConstantRange { center_price, n_bands } => {
                amm.deposit_range(initial_amount, center_price, n_bands)
            }
        }
    }
}
