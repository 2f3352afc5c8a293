use amm_loss_sim::data::{PriceBar, PriceHistory};
use amm_loss_sim::oracle::{EmaState, PriceOracle};

fn bar(timestamp: u64, low: f64, high: f64) -> PriceBar {
    PriceBar {
        timestamp,
        open: low,
        high,
        low,
        close: high,
        volume: 1.0,
    }
}

fn zigzag(n: u64) -> Vec<PriceBar> {
    (0..n)
        .map(|i| {
            let p = if i % 2 == 0 { 100.0 } else { 120.0 };
            bar(60 * i, p - 1.0, p + 1.0)
        })
        .collect()
}

#[test]
fn test_zero_elapsed_time_leaves_estimate_unchanged() {
    let state = EmaState { value: 100.0, time: 600 };
    let next = state.update(&bar(600, 500.0, 700.0), 60.0);
    assert_eq!(next, state);
}

#[test]
fn test_infinite_half_life_freezes_seed() {
    let bars = zigzag(50);
    let prices = PriceOracle::ema(f64::INFINITY).calculate_oracle_prices(&bars);
    assert_eq!(prices.len(), bars.len());
    assert!(prices.iter().all(|&p| p == bars[0].open));
}

#[test]
fn test_zero_half_life_tracks_bar_mid() {
    let bars = zigzag(50);
    let prices = PriceOracle::ema(0.0).calculate_oracle_prices(&bars);
    assert_eq!(prices[0], bars[0].open);
    for (bar, price) in bars.iter().zip(&prices).skip(1) {
        assert_eq!(*price, (bar.high + bar.low) / 2.0);
    }
}

#[test]
fn test_ema_moves_between_seed_and_mid() {
    let bars: Vec<PriceBar> = (0..20).map(|i| bar(60 * i, 109.0, 111.0)).collect();
    let mut bars = bars;
    bars[0].open = 100.0;
    let prices = PriceOracle::ema(600.0).calculate_oracle_prices(&bars);
    for w in prices.windows(2) {
        assert!(w[1] > w[0] && w[1] < 110.0);
    }
    // one half-life after the seed the gap has halved
    assert!((prices[10] - 105.0).abs() < 1e-9);
}

#[test]
fn test_history_keeps_oracle_aligned() {
    let bars = zigzag(30);
    let history = PriceHistory::new(bars.clone(), &PriceOracle::ema(600.0));
    assert_eq!(history.len(), 30);
    assert_eq!(history.oracle_prices().len(), 30);
    assert_eq!(history.span_seconds(), 29 * 60);

    assert!(PriceHistory::from_parts(bars.clone(), vec![1.0; 29]).is_err());
    assert!(PriceHistory::from_parts(bars, vec![1.0; 30]).is_ok());
}
