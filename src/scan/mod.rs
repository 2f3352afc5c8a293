mod report;

pub use report::{ConsoleReport, CsvReport, ScanReport};

use std::fmt;
use std::path::Path;

use anyhow::Context;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backtest::{LossRateError, SamplingParams, SimulationParams, TailLoss, get_loss_rate};
use crate::data::{ImporterKind, PriceBar, PriceHistory};
use crate::oracle::PriceOracle;

/// A scan parameter: one value, or the values to sweep over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Fixed(f64),
    Sweep(Vec<f64>),
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Fixed(value)
    }
}

impl From<Vec<f64>> for ParamValue {
    fn from(values: Vec<f64>) -> Self {
        Self::Sweep(values)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamName {
    A,
    Fee,
    TExp,
    InitialLiquidityRange,
    DynamicFeeMultiplier,
    ExternalFee,
    Samples,
    NTopSamples,
    MinLoanDuration,
    MaxLoanDuration,
}

impl ParamName {
    pub fn name(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::Fee => "fee",
            Self::TExp => "t_exp",
            Self::InitialLiquidityRange => "initial_liquidity_range",
            Self::DynamicFeeMultiplier => "dynamic_fee_multiplier",
            Self::ExternalFee => "external_fee",
            Self::Samples => "samples",
            Self::NTopSamples => "n_top_samples",
            Self::MinLoanDuration => "min_loan_duration",
            Self::MaxLoanDuration => "max_loan_duration",
        }
    }
}

impl fmt::Display for ParamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("exactly one parameter must be a sweep, found {}: [{}]", .found.len(), .found.join(", "))]
    SweepCount { found: Vec<&'static str> },

    #[error("sweep over `{parameter}` has no values")]
    EmptySweep { parameter: ParamName },

    #[error("parameter `{parameter}` = {value} is invalid: {reason}")]
    InvalidValue {
        parameter: ParamName,
        value: f64,
        reason: &'static str,
    },

    #[error("loss rate for {parameter} = {value} failed")]
    LossRate {
        parameter: ParamName,
        value: f64,
        #[source]
        source: LossRateError,
    },
}

// ── Configuration ────────────────────────────────────────────────────

fn default_importer() -> ImporterKind {
    ImporterKind::Binance
}
fn default_t_exp() -> ParamValue {
    ParamValue::Fixed(600.0)
}
fn default_range() -> ParamValue {
    ParamValue::Fixed(4.0)
}
fn default_zero() -> ParamValue {
    ParamValue::Fixed(0.0)
}
fn default_external_fee() -> ParamValue {
    ParamValue::Fixed(5e-4)
}
fn default_samples() -> ParamValue {
    ParamValue::Fixed(50.0)
}
fn default_n_top() -> ParamValue {
    ParamValue::Fixed(5.0)
}
fn default_loan_duration() -> ParamValue {
    ParamValue::Fixed(0.15)
}
fn default_seed() -> u64 {
    42
}
fn default_true() -> bool {
    true
}

/// One parameter scan over a pair's price history. Exactly one field
/// holds a list of values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    pub pair: String,
    #[serde(default = "default_importer")]
    pub importer: ImporterKind,
    #[serde(rename = "A")]
    pub a: ParamValue,
    pub fee: ParamValue,
    /// Oracle EMA half-life in seconds
    #[serde(default = "default_t_exp")]
    pub t_exp: ParamValue,
    #[serde(default = "default_range")]
    pub initial_liquidity_range: ParamValue,
    #[serde(default = "default_zero")]
    pub dynamic_fee_multiplier: ParamValue,
    #[serde(default = "default_external_fee")]
    pub external_fee: ParamValue,
    #[serde(default = "default_samples")]
    pub samples: ParamValue,
    #[serde(default = "default_n_top")]
    pub n_top_samples: ParamValue,
    /// Days
    #[serde(default = "default_loan_duration")]
    pub min_loan_duration: ParamValue,
    /// Days
    #[serde(default = "default_loan_duration")]
    pub max_loan_duration: ParamValue,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_true")]
    pub add_reverse: bool,
}

/// Scalar parameters for one point of a scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedParams {
    pub simulation: SimulationParams,
    pub sampling: SamplingParams,
    pub t_exp: f64,
}

impl ScanConfig {
    /// Load a scan config from a JSON file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading scan config at {}", path.display()))?;
        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("parsing scan config {}", path.display()))?;
        Ok(config)
    }

    pub fn params(&self) -> [(ParamName, &ParamValue); 10] {
        [
            (ParamName::A, &self.a),
            (ParamName::Fee, &self.fee),
            (ParamName::TExp, &self.t_exp),
            (ParamName::InitialLiquidityRange, &self.initial_liquidity_range),
            (ParamName::DynamicFeeMultiplier, &self.dynamic_fee_multiplier),
            (ParamName::ExternalFee, &self.external_fee),
            (ParamName::Samples, &self.samples),
            (ParamName::NTopSamples, &self.n_top_samples),
            (ParamName::MinLoanDuration, &self.min_loan_duration),
            (ParamName::MaxLoanDuration, &self.max_loan_duration),
        ]
    }

    /// The single swept parameter and its values.
    pub fn sweep(&self) -> Result<(ParamName, &[f64]), ScanError> {
        let sweeps: Vec<(ParamName, &[f64])> = self
            .params()
            .into_iter()
            .filter_map(|(name, value)| match value {
                ParamValue::Sweep(values) => Some((name, values.as_slice())),
                ParamValue::Fixed(_) => None,
            })
            .collect();
        match sweeps.as_slice() {
            [(name, values)] if values.is_empty() => Err(ScanError::EmptySweep { parameter: *name }),
            [single] => Ok(*single),
            _ => Err(ScanError::SweepCount {
                found: sweeps.iter().map(|(name, _)| name.name()).collect(),
            }),
        }
    }

    /// Parameters with the swept one set to `value`.
    pub fn resolve(&self, swept: ParamName, value: f64) -> Result<ResolvedParams, ScanError> {
        let get = |name: ParamName| -> Result<f64, ScanError> {
            if name == swept {
                return Ok(value);
            }
            match self.params().into_iter().find(|(n, _)| *n == name) {
                Some((_, ParamValue::Fixed(v))) => Ok(*v),
                _ => Err(ScanError::SweepCount {
                    found: vec![swept.name(), name.name()],
                }),
            }
        };

        let a = get(ParamName::A)?;
        if !(a > 1.0) {
            return Err(invalid(ParamName::A, a, "must be greater than 1"));
        }
        let t_exp = get(ParamName::TExp)?;
        if !(t_exp >= 0.0) {
            return Err(invalid(ParamName::TExp, t_exp, "must be non-negative"));
        }
        let min_loan_duration = get(ParamName::MinLoanDuration)?;
        let max_loan_duration = get(ParamName::MaxLoanDuration)?;
        if !(min_loan_duration > 0.0) {
            return Err(invalid(ParamName::MinLoanDuration, min_loan_duration, "must be positive"));
        }
        if !(max_loan_duration >= min_loan_duration) {
            return Err(invalid(
                ParamName::MaxLoanDuration,
                max_loan_duration,
                "must not be below min_loan_duration",
            ));
        }

        Ok(ResolvedParams {
            simulation: SimulationParams {
                a,
                fee: get(ParamName::Fee)?,
                initial_liquidity_range: whole(
                    ParamName::InitialLiquidityRange,
                    get(ParamName::InitialLiquidityRange)?,
                )?,
                external_fee: get(ParamName::ExternalFee)?,
                dynamic_fee_multiplier: get(ParamName::DynamicFeeMultiplier)?,
            },
            sampling: SamplingParams {
                samples: whole(ParamName::Samples, get(ParamName::Samples)?)?,
                min_loan_duration,
                max_loan_duration,
                n_top_samples: Some(whole(ParamName::NTopSamples, get(ParamName::NTopSamples)?)?),
            },
            t_exp,
        })
    }
}

fn invalid(parameter: ParamName, value: f64, reason: &'static str) -> ScanError {
    ScanError::InvalidValue { parameter, value, reason }
}

/// A positive whole number stored as `f64`.
fn whole(parameter: ParamName, value: f64) -> Result<usize, ScanError> {
    if value >= 1.0 && value.fract() == 0.0 && value <= u32::MAX as f64 {
        Ok(value as usize)
    } else {
        Err(invalid(parameter, value, "must be a positive whole number"))
    }
}

// ── Liquidity discount ───────────────────────────────────────────────

/// Mean of `((A-1)/A)^(k+0.5)` over the `range` initial bands.
pub fn bands_coefficient(a: f64, range: usize) -> f64 {
    if range == 0 {
        return 1.0;
    }
    let ratio = (a - 1.0) / a;
    (0..range).map(|k| ratio.powf(k as f64 + 0.5)).sum::<f64>() / range as f64
}

/// Liquidity discount `1 - (1 - loss) * bands_coefficient`.
pub fn liquidity_discount(loss: f64, a: f64, range: usize) -> f64 {
    1.0 - (1.0 - loss) * bands_coefficient(a, range)
}

// ── Scan ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanPoint {
    pub value: f64,
    pub loss: f64,
    pub discount: f64,
    pub tail: TailLoss,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanResult {
    pub pair: String,
    pub parameter: String,
    pub points: Vec<ScanPoint>,
}

impl ScanResult {
    /// Scanned value against tail-risk loss.
    pub fn losses(&self) -> Vec<(f64, f64)> {
        self.points.iter().map(|p| (p.value, p.loss)).collect()
    }

    /// Scanned value against liquidity discount.
    pub fn discounts(&self) -> Vec<(f64, f64)> {
        self.points.iter().map(|p| (p.value, p.discount)).collect()
    }

    pub fn print_table(&self) {
        println!("\n{}", "═".repeat(78));
        println!("  Scan {} over {}", self.pair, self.parameter);
        println!("{}", "═".repeat(78));
        println!(
            "  {:<18} {:>12} {:>12} {:>12} {:>10}",
            self.parameter, "Loss %", "Discount %", "Worst %", "Top N"
        );
        println!("  {}", "-".repeat(72));
        for p in &self.points {
            println!(
                "  {:<18} {:>12.4} {:>12.4} {:>12.4} {:>10}",
                p.value,
                p.loss * 100.0,
                p.discount * 100.0,
                p.tail.worst * 100.0,
                p.tail.n_top,
            );
        }
        println!("{}", "═".repeat(78));
    }
}

/// Sweep the config's single list-valued parameter over `bars`.
///
/// The oracle series is computed once per distinct `t_exp`. `rng` drives
/// every sample window, so a fixed seed reproduces the whole scan.
/// `on_point` runs after each scanned value.
pub fn scan(
    config: &ScanConfig,
    bars: &[PriceBar],
    rng: &mut StdRng,
    mut on_point: impl FnMut(&ScanPoint),
) -> Result<ScanResult, ScanError> {
    let (parameter, values) = config.sweep()?;
    let _span = tracing::info_span!("scan", pair = %config.pair, %parameter).entered();

    let mut cached: Option<(f64, PriceHistory)> = None;
    let mut points = Vec::with_capacity(values.len());
    for &value in values {
        let resolved = config.resolve(parameter, value)?;
        let (t_exp, history) = match cached.take() {
            Some(entry) if entry.0 == resolved.t_exp => entry,
            _ => {
                let oracle = PriceOracle::ema(resolved.t_exp);
                (resolved.t_exp, PriceHistory::new(bars.to_vec(), &oracle))
            }
        };

        let outcome = get_loss_rate(&history, &resolved.simulation, &resolved.sampling, rng);
        cached = Some((t_exp, history));
        let tail = outcome.map_err(|source| ScanError::LossRate { parameter, value, source })?;
        let discount = liquidity_discount(
            tail.value,
            resolved.simulation.a,
            resolved.simulation.initial_liquidity_range,
        );
        tracing::info!(%parameter, value, loss = tail.value, discount, "scan point");

        let point = ScanPoint { value, loss: tail.value, discount, tail };
        on_point(&point);
        points.push(point);
    }

    Ok(ScanResult {
        pair: config.pair.clone(),
        parameter: parameter.name().to_string(),
        points,
    })
}
