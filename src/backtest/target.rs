use crate::amm::{BandAmm, Direction, FeeState};

/// Price the AMM must be moved to so that an arbitrageur facing the
/// external price `external` (already net of external fees) breaks even
/// after paying each band's dynamic fee.
///
/// Bands are scanned from the active band outward. For a rising search a
/// band's bounds are inflated by `(1 + fee)`, for a falling search deflated
/// by `(1 - fee)`; the straddling band yields a linear interpolation
/// between its fee-adjusted bounds. A price beyond the whole active range
/// falls back to a one-sided fee adjustment of `external`.
pub fn find_target_price(
    amm: &BandAmm,
    external: f64,
    direction: Direction,
    state: FeeState,
) -> f64 {
    match direction {
        Direction::Rising => rising_target(amm, external, state),
        Direction::Falling => falling_target(amm, external, state),
    }
}

fn rising_target(amm: &BandAmm, external: f64, state: FeeState) -> f64 {
    let active = amm.active_band();
    for n in (amm.min_band()..=active).rev() {
        let fee = amm.dynamic_fee(n, state);
        let (p_down, p_up) = (amm.price_at_lower_bound(n), amm.price_at_upper_bound(n));
        let (lo, hi) = (p_down * (1.0 + fee), p_up * (1.0 + fee));
        if external <= lo {
            if n == active {
                return interpolate(external, lo, hi, p_down, p_up);
            }
            // fee gap between bands: stop at the top of the band below
            return p_down;
        }
        if external <= hi {
            return interpolate(external, lo, hi, p_down, p_up);
        }
    }
    external * (1.0 - amm.dynamic_fee(amm.min_band(), FeeState::Settled))
}

fn falling_target(amm: &BandAmm, external: f64, state: FeeState) -> f64 {
    let active = amm.active_band();
    for n in active..=amm.max_band() {
        let fee = amm.dynamic_fee(n, state);
        let (p_down, p_up) = (amm.price_at_lower_bound(n), amm.price_at_upper_bound(n));
        let (lo, hi) = (p_down * (1.0 - fee), p_up * (1.0 - fee));
        if external >= hi {
            if n == active {
                return interpolate(external, lo, hi, p_down, p_up);
            }
            return p_up;
        }
        if external >= lo {
            return interpolate(external, lo, hi, p_down, p_up);
        }
    }
    external * (1.0 + amm.dynamic_fee(amm.max_band(), FeeState::Settled))
}

/// Map `p` from `[lo, hi]` onto `[p_down, p_up]`, exact at both ends.
fn interpolate(p: f64, lo: f64, hi: f64, p_down: f64, p_up: f64) -> f64 {
    if p == hi {
        return p_up;
    }
    p_down + (p - lo) / (hi - lo) * (p_up - p_down)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpolation_is_exact_at_bounds() {
        let (lo, hi) = (99.0 * 1.003, 100.0 * 1.003);
        assert_eq!(interpolate(lo, lo, hi, 99.0, 100.0), 99.0);
        assert_eq!(interpolate(hi, lo, hi, 99.0, 100.0), 100.0);
    }
}
