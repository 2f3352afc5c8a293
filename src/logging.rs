//! Logging setup.
//!
//! The binary builds one [`tracing::Dispatch`] at startup and installs it;
//! library code only emits events and spans (`scan`, `loss_rate`, `sample`).
//!
//! ```bash
//! # per-sample results
//! RUST_LOG=amm_loss_sim::backtest=debug amm-loss-sim scan configs/btcusdt_fee.json
//! ```

use tracing::Dispatch;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

/// Default level for a `-v` count.
pub fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Build the process-wide log handle. `RUST_LOG` overrides `verbosity`.
pub fn dispatch(verbosity: u8) -> Dispatch {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_for(verbosity)));
    let subscriber = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    Dispatch::new(subscriber)
}

/// Install `dispatch` for the rest of the process.
pub fn install(dispatch: Dispatch) -> anyhow::Result<()> {
    tracing::dispatcher::set_global_default(dispatch)
        .map_err(|e| anyhow::anyhow!("installing log subscriber: {e}"))
}
