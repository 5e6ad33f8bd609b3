use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FairValueError {
    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Degenerate metric '{metric}': {reason}")]
    DegenerateMetric { metric: String, reason: String },

    #[error("No applicable methods: {0}")]
    NoApplicableMethods(String),

    #[error("Invalid entity financials: {field} — {reason}")]
    InvalidEntityFinancials { field: String, reason: String },

    #[error("Invalid discount assumptions: WACC ({wacc}) must exceed terminal growth ({terminal_growth})")]
    InvalidDiscountAssumptions {
        wacc: Decimal,
        terminal_growth: Decimal,
    },

    #[error("Division by zero in {context}")]
    DivisionByZero { context: String },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for FairValueError {
    fn from(e: serde_json::Error) -> Self {
        FairValueError::SerializationError(e.to_string())
    }
}

impl FairValueError {
    /// Stable identifier for the error kind, used across the JS boundary.
    pub fn code(&self) -> &'static str {
        match self {
            FairValueError::InvalidInput { .. } => "INVALID_INPUT",
            FairValueError::DegenerateMetric { .. } => "DEGENERATE_METRIC",
            FairValueError::NoApplicableMethods(_) => "NO_APPLICABLE_METHODS",
            FairValueError::InvalidEntityFinancials { .. } => "INVALID_ENTITY_FINANCIALS",
            FairValueError::InvalidDiscountAssumptions { .. } => "INVALID_DISCOUNT_ASSUMPTIONS",
            FairValueError::DivisionByZero { .. } => "DIVISION_BY_ZERO",
            FairValueError::InsufficientData(_) => "INSUFFICIENT_DATA",
            FairValueError::SerializationError(_) => "SERIALIZATION_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_codes_distinguish_kinds() {
        let errors = [
            FairValueError::InvalidInput {
                field: "wacc".into(),
                reason: "negative".into(),
            },
            FairValueError::DegenerateMetric {
                metric: "ROE".into(),
                reason: "zero benchmark".into(),
            },
            FairValueError::NoApplicableMethods("all zero".into()),
            FairValueError::InvalidEntityFinancials {
                field: "revenue".into(),
                reason: "zero".into(),
            },
            FairValueError::InvalidDiscountAssumptions {
                wacc: dec!(0.02),
                terminal_growth: dec!(0.03),
            },
            FairValueError::DivisionByZero {
                context: "percent change".into(),
            },
            FairValueError::InsufficientData("one entry".into()),
            FairValueError::SerializationError("eof".into()),
        ];
        let mut codes: Vec<&str> = errors.iter().map(FairValueError::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_code_for_undefined_perpetuity() {
        let e = FairValueError::InvalidDiscountAssumptions {
            wacc: dec!(0.03),
            terminal_growth: dec!(0.03),
        };
        assert_eq!(e.code(), "INVALID_DISCOUNT_ASSUMPTIONS");
        assert!(e.to_string().contains("must exceed terminal growth"));
    }
}
