pub mod amm;
pub mod backtest;
pub mod data;
#[cfg(feature = "full")]
pub mod fetch_data;
pub mod liquidity;
pub mod logging;
pub mod oracle;
pub mod scan;
