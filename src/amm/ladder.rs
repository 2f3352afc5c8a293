use super::AmmError;

/// Number of bands on each side of band 0 the ladder extends to.
pub const LADDER_HALF_WIDTH: i32 = 512;

/// Geometric price ladder: band `n` spans `(base * r^(n+1), base * r^n]`
/// with `r = (A-1)/A`. Higher indices are lower prices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ladder {
    base_price: f64,
    ratio: f64,
}

impl Ladder {
    pub fn new(base_price: f64, a: f64) -> Result<Self, AmmError> {
        if !base_price.is_finite() || base_price <= 0.0 {
            return Err(AmmError::InvalidParameters(format!(
                "base price must be positive and finite, got {base_price}"
            )));
        }
        if !a.is_finite() || a <= 1.0 {
            return Err(AmmError::InvalidParameters(format!(
                "band width factor A must be greater than 1, got {a}"
            )));
        }
        let ladder = Self {
            base_price,
            ratio: (a - 1.0) / a,
        };
        let (low, high) = ladder.extent();
        if !(low > 0.0 && high.is_finite()) {
            return Err(AmmError::InvalidParameters(format!(
                "ladder for A={a} around {base_price} overflows ({low}..{high})"
            )));
        }
        Ok(ladder)
    }

    /// Upper bound of band `n`. Equal to the lower bound of band `n-1`.
    pub fn p_up(&self, n: i32) -> f64 {
        self.base_price * self.ratio.powi(n)
    }

    /// Lower bound of band `n`.
    pub fn p_down(&self, n: i32) -> f64 {
        self.p_up(n + 1)
    }

    /// Geometric centre of band `n`, used to map composition onto price.
    pub fn mid(&self, n: i32) -> f64 {
        (self.p_up(n) * self.p_down(n)).sqrt()
    }

    /// Lowest and highest price reachable on the ladder.
    pub fn extent(&self) -> (f64, f64) {
        (self.p_down(LADDER_HALF_WIDTH), self.p_up(-LADDER_HALF_WIDTH))
    }

    pub fn contains_index(&self, n: i32) -> bool {
        (-LADDER_HALF_WIDTH..=LADDER_HALF_WIDTH).contains(&n)
    }

    /// Index of the band whose interval `(p_down, p_up]` holds `price`.
    pub fn band_of(&self, price: f64) -> Result<i32, AmmError> {
        let (low, high) = self.extent();
        if !price.is_finite() || price <= low || price > high {
            return Err(AmmError::TargetOutsideLadder { target: price, low, high });
        }
        let estimate = ((price / self.base_price).ln() / self.ratio.ln()).floor();
        let mut n = (estimate as i32).clamp(-LADDER_HALF_WIDTH, LADDER_HALF_WIDTH);
        // float rounding can leave the estimate one band off
        while price > self.p_up(n) && n > -LADDER_HALF_WIDTH {
            n -= 1;
        }
        while price <= self.p_down(n) && n < LADDER_HALF_WIDTH {
            n += 1;
        }
        Ok(n)
    }
}
