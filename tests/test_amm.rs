use rand::prelude::*;

use amm_loss_sim::amm::{AmmError, AmmParams, BandAmm, Direction, FeeState, LADDER_HALF_WIDTH, Ladder};
use amm_loss_sim::liquidity::InitialLiquidity;

// ── Helpers ──────────────────────────────────────────────────────────

const A: f64 = 100.0;
const FEE: f64 = 0.003;

fn base_price(p0: f64) -> f64 {
    p0 * (A / (A - 1.0) + 1e-4)
}

fn amm_with(p0: f64, oracle: f64, multiplier: f64) -> BandAmm {
    BandAmm::new(AmmParams {
        base_price: base_price(p0),
        a: A,
        fee: FEE,
        dynamic_fee_multiplier: multiplier,
    })
    .unwrap()
    .with_oracle_price(oracle)
}

fn deposited(p0: f64, n_bands: usize) -> BandAmm {
    let mut amm = amm_with(p0, p0, 0.0);
    InitialLiquidity::ConstantRange { center_price: p0, n_bands }
        .deposit(&mut amm, 1.0)
        .unwrap();
    amm
}

fn assert_non_negative(amm: &BandAmm) {
    for n in amm.min_band()..=amm.max_band() {
        let band = amm.band(n);
        assert!(band.x >= 0.0 && band.y >= 0.0, "band {n} went negative: {band:?}");
    }
}

// ── Ladder ───────────────────────────────────────────────────────────

#[test]
fn test_ladder_is_monotonic_and_contiguous() {
    let ladder = Ladder::new(base_price(100.0), A).unwrap();
    for n in -LADDER_HALF_WIDTH + 1..=LADDER_HALF_WIDTH {
        assert!(ladder.p_down(n) < ladder.p_up(n), "band {n} inverted");
        assert_eq!(ladder.p_up(n), ladder.p_down(n - 1), "gap above band {n}");
    }
    let amm = amm_with(100.0, 100.0, 0.0);
    assert_eq!(amm.price_at_upper_bound(3), ladder.p_up(3));
    assert_eq!(amm.price_at_lower_bound(3), ladder.p_up(4));
}

// ── Deposit ──────────────────────────────────────────────────────────

#[test]
fn test_deposit_spreads_equal_value_around_center() {
    let amm = deposited(100.0, 4);
    let center = amm.ladder().band_of(100.0).unwrap();
    assert_eq!(center, 1);
    assert_eq!(amm.active_band(), center);
    assert_eq!((amm.min_band(), amm.max_band()), (0, 3));
    assert_eq!(amm.current_price(), 100.0);
    assert!((amm.total_value() - 100.0).abs() < 1e-9);

    // above the centre only risky, below only stable
    assert_eq!(amm.band(0).x, 0.0);
    assert!(amm.band(0).y > 0.0);
    assert_eq!(amm.band(2).y, 0.0);
    assert_eq!(amm.band(3).x, 25.0);

    let band = amm.band(1);
    let (p_down, p_up) = (amm.price_at_lower_bound(1), amm.price_at_upper_bound(1));
    let expected = (100.0 - p_down) / (p_up - p_down);
    assert!((band.composition(amm.ladder().mid(1)) - expected).abs() < 1e-12);
    assert!((band.value_at(100.0) - 25.0).abs() < 1e-12);
}

#[test]
fn test_deposit_rejects_bad_requests() {
    let mut amm = amm_with(100.0, 100.0, 0.0);
    assert!(matches!(amm.deposit_range(1.0, 100.0, 0), Err(AmmError::InvalidDeposit(_))));
    assert!(matches!(amm.deposit_range(0.0, 100.0, 4), Err(AmmError::InvalidDeposit(_))));
    assert!(matches!(amm.deposit_range(1.0, 1e300, 4), Err(AmmError::InvalidDeposit(_))));

    amm.deposit_range(1.0, 100.0, 1).unwrap();
    assert_eq!(amm.min_band(), amm.max_band());
    assert_eq!(amm.deposit_range(1.0, 100.0, 1), Err(AmmError::AlreadyDeposited));
}

// ── Fees ─────────────────────────────────────────────────────────────

#[test]
fn test_dynamic_fee_tracks_band_imbalance() {
    let mut amm = amm_with(100.0, 100.0, 0.2);
    amm.deposit_range(1.0, 100.0, 4).unwrap();

    // all-risky band above the price, all-stable band below it
    assert!((amm.dynamic_fee(0, FeeState::Pending) - (FEE + 0.2)).abs() < 1e-15);
    assert_eq!(amm.dynamic_fee(3, FeeState::Pending), FEE);
    // nothing deposited outside the range
    assert_eq!(amm.dynamic_fee(10, FeeState::Pending), FEE);

    let mid = amm.dynamic_fee(1, FeeState::Pending);
    assert!(mid > FEE && mid < FEE + 0.2);
}

#[test]
fn test_fee_states_quote_their_own_oracle() {
    let mut amm = amm_with(100.0, 100.0, 0.2);
    amm.deposit_range(1.0, 100.0, 4).unwrap();
    amm.set_oracle_price(99.5);
    amm.set_oracle_price(99.9);

    // both prices clamp inside the mixed centre band
    let band = amm.band(1);
    assert!(band.x > 0.0 && band.y > 0.0);
    assert_eq!(amm.execution_price(1, FeeState::Settled), 99.5);
    assert_eq!(amm.execution_price(1, FeeState::Pending), 99.9);

    let quote = |e: f64| FEE + 0.2 * band.y * e / (band.x + band.y * e);
    let settled = amm.dynamic_fee(1, FeeState::Settled);
    let pending = amm.dynamic_fee(1, FeeState::Pending);
    assert!((settled - quote(99.5)).abs() < 1e-15);
    assert!((pending - quote(99.9)).abs() < 1e-15);
    assert!(pending > settled);

    // single-asset bands clamp to the same imbalance either way
    assert_eq!(amm.dynamic_fee(0, FeeState::Settled), amm.dynamic_fee(0, FeeState::Pending));
}

#[test]
fn test_oracle_updates_promote_pending_to_settled() {
    let mut amm = amm_with(100.0, 100.0, 0.0);
    amm.set_oracle_price(101.0);
    assert_eq!(amm.oracle_price(FeeState::Settled), 100.0);
    assert_eq!(amm.oracle_price(FeeState::Pending), 101.0);
    amm.set_oracle_price(99.0);
    assert_eq!(amm.oracle_price(FeeState::Settled), 101.0);
    assert_eq!(amm.oracle_price(FeeState::Pending), 99.0);
}

#[test]
fn test_parameters_are_validated() {
    let params = AmmParams { base_price: 100.0, a: A, fee: 0.5, dynamic_fee_multiplier: 0.6 };
    assert!(matches!(BandAmm::new(params), Err(AmmError::InvalidParameters(_))));
    let params = AmmParams { fee: -0.1, dynamic_fee_multiplier: 0.0, ..params };
    assert!(matches!(BandAmm::new(params), Err(AmmError::InvalidParameters(_))));
}

// ── Trading ──────────────────────────────────────────────────────────

#[test]
fn test_trade_value_changes_only_by_fee() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut amm = amm_with(100.0, 100.0, 0.3);
    amm.deposit_range(1.0, 100.0, 10).unwrap();

    let low = amm.price_at_lower_bound(amm.max_band());
    let high = amm.price_at_upper_bound(amm.min_band());
    for _ in 0..200 {
        amm.set_oracle_price(rng.random_range(low * 0.98..high * 1.02));
        let target = rng.random_range(low * 0.97..high * 1.03);
        let before_price = amm.current_price();
        let before_value = amm.total_value();
        let before_reserves = amm.reserve_value();

        let outcome = amm.trade_to_price(target).unwrap();

        assert!(outcome.fee_paid >= 0.0);
        let gained = amm.total_value() - before_value;
        assert!(
            (gained - outcome.fee_paid).abs() < 1e-9 * before_value,
            "value moved by {gained}, fee was {}",
            outcome.fee_paid
        );
        assert!((amm.reserve_value() - before_reserves).abs() < 1e-9 * before_value);
        assert_non_negative(&amm);

        // price moves toward the target and never past it
        let price = amm.current_price();
        if target > before_price {
            assert!(price >= before_price && price <= target);
            assert_eq!(outcome.direction, Direction::Rising);
        } else if target < before_price {
            assert!(price <= before_price && price >= target);
            assert_eq!(outcome.direction, Direction::Falling);
        }
        assert!(amm.min_band() <= amm.active_band() && amm.active_band() <= amm.max_band());
    }
}

#[test]
fn test_rising_trade_sells_risky_asset() {
    let mut amm = deposited(100.0, 4);
    let target = (amm.current_price() + amm.price_at_upper_bound(1)) / 2.0;
    let outcome = amm.trade_to_price(target).unwrap();
    assert_eq!(outcome.direction, Direction::Rising);
    assert!(outcome.risky_delta > 0.0);
    assert!(outcome.stable_delta > 0.0);
    assert_eq!(outcome.bands_crossed, 0);
    assert!(!outcome.saturated);
    assert_eq!(amm.current_price(), target);
    assert!((outcome.fee_paid - FEE * outcome.stable_delta).abs() < 1e-15);
}

#[test]
fn test_trade_saturates_at_range_edge() {
    let mut amm = deposited(100.0, 4);
    let top = amm.price_at_upper_bound(amm.min_band());
    let outcome = amm.trade_to_price(top * 1.5).unwrap();
    assert!(outcome.saturated);
    assert_eq!(outcome.bands_crossed, 1);
    assert_eq!(amm.current_price(), top);
    for n in amm.min_band()..=amm.max_band() {
        assert_eq!(amm.band(n).y, 0.0);
    }

    let bottom = amm.price_at_lower_bound(amm.max_band());
    let outcome = amm.trade_to_price(bottom * 0.5).unwrap();
    assert!(outcome.saturated);
    assert_eq!(amm.current_price(), bottom);
    for n in amm.min_band()..=amm.max_band() {
        assert_eq!(amm.band(n).x, 0.0);
    }
}

#[test]
fn test_target_outside_ladder_is_an_error() {
    let mut amm = deposited(100.0, 4);
    let (low, high) = amm.ladder().extent();
    assert!(matches!(
        amm.trade_to_price(high * 2.0),
        Err(AmmError::TargetOutsideLadder { .. })
    ));
    assert!(matches!(
        amm.trade_to_price(low / 2.0),
        Err(AmmError::TargetOutsideLadder { .. })
    ));
    assert!(matches!(amm.trade_to_price(f64::NAN), Err(AmmError::InvalidTarget(_))));
    assert_eq!(amm.trade_to_price(-1.0), Err(AmmError::InvalidTarget(-1.0)));
}

#[test]
fn test_trade_needs_liquidity() {
    let mut amm = amm_with(100.0, 100.0, 0.0);
    assert_eq!(amm.trade_to_price(101.0), Err(AmmError::NoLiquidity));
}
