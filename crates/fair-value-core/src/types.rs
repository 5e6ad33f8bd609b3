use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::FairValueError;
use crate::FairValueResult;

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Rates expressed as decimals (0.05 = 5%). Never as percentages.
pub type Rate = Decimal;

/// Multiples (e.g., 4.2x EV/Revenue)
pub type Multiple = Decimal;

/// Currency code
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    GBP,
    #[default]
    USD,
    EUR,
    CHF,
    JPY,
    CAD,
    AUD,
    Other(String),
}

impl Currency {
    /// Prefix used when rendering amounts in this currency.
    pub fn symbol(&self) -> String {
        match self {
            Currency::USD => "$".into(),
            Currency::GBP => "£".into(),
            Currency::EUR => "€".into(),
            Currency::JPY => "¥".into(),
            Currency::CHF => "CHF ".into(),
            Currency::CAD => "C$".into(),
            Currency::AUD => "A$".into(),
            Currency::Other(code) => format!("{code} "),
        }
    }
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "rust_decimal_128bit".to_string(),
        },
    }
}

/// Reject a ratio outside the closed unit interval.
pub(crate) fn ensure_unit_interval(field: &str, value: Rate) -> FairValueResult<()> {
    if value < Decimal::ZERO || value > Decimal::ONE {
        return Err(FairValueError::InvalidInput {
            field: field.into(),
            reason: format!("must be between 0 and 1, got {value}"),
        });
    }
    Ok(())
}
