use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::FairValueError;
use crate::types::{ensure_unit_interval, Currency, Money, Rate};
use crate::FairValueResult;

/// Industry classification of a business entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Industry {
    Technology,
    Saas,
    Manufacturing,
    Retail,
    Healthcare,
    FinancialServices,
    ProfessionalServices,
    RealEstate,
    Other(String),
}

impl std::fmt::Display for Industry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Industry::Technology => write!(f, "Technology"),
            Industry::Saas => write!(f, "SaaS"),
            Industry::Manufacturing => write!(f, "Manufacturing"),
            Industry::Retail => write!(f, "Retail"),
            Industry::Healthcare => write!(f, "Healthcare"),
            Industry::FinancialServices => write!(f, "Financial Services"),
            Industry::ProfessionalServices => write!(f, "Professional Services"),
            Industry::RealEstate => write!(f, "Real Estate"),
            Industry::Other(name) => write!(f, "{name}"),
        }
    }
}

/// Snapshot of the business being valued. Supplied by the entity registry
/// and treated as immutable for the duration of a valuation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessEntity {
    pub id: String,
    pub name: String,
    pub industry: Industry,
    pub founded: NaiveDate,
    pub employees: u32,
    /// Trailing twelve-month revenue
    pub revenue: Money,
    /// Net profit margin as a fraction of revenue
    pub profit_margin: Rate,
    /// Trailing revenue growth; may exceed 1 for hyper-growth businesses
    pub growth_rate: Rate,
    #[serde(default)]
    pub currency: Currency,
}

impl BusinessEntity {
    /// Revenue as a usable denominator for multiples.
    pub(crate) fn positive_revenue(&self) -> FairValueResult<Money> {
        if self.revenue <= Decimal::ZERO {
            return Err(FairValueError::InvalidEntityFinancials {
                field: "revenue".into(),
                reason: format!(
                    "entity '{}' has non-positive revenue ({})",
                    self.id, self.revenue
                ),
            });
        }
        Ok(self.revenue)
    }

    pub(crate) fn validate(&self) -> FairValueResult<()> {
        ensure_unit_interval("profit_margin", self.profit_margin)?;
        if self.growth_rate < -Decimal::ONE {
            return Err(FairValueError::InvalidInput {
                field: "growth_rate".into(),
                reason: "Growth rate cannot be below -100%".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use rust_decimal_macros::dec;

    pub fn sample_entity() -> BusinessEntity {
        BusinessEntity {
            id: "acme-analytics".into(),
            name: "Acme Analytics".into(),
            industry: Industry::Saas,
            founded: NaiveDate::from_ymd_opt(2016, 3, 1).unwrap(),
            employees: 48,
            revenue: dec!(4750000),
            profit_margin: dec!(0.18),
            growth_rate: dec!(0.32),
            currency: Currency::USD,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::sample_entity;
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_zero_revenue_rejected() {
        let mut entity = sample_entity();
        entity.revenue = Decimal::ZERO;
        assert!(matches!(
            entity.positive_revenue(),
            Err(FairValueError::InvalidEntityFinancials { .. })
        ));
    }

    #[test]
    fn test_margin_out_of_range_rejected() {
        let mut entity = sample_entity();
        entity.profit_margin = dec!(1.2);
        assert!(entity.validate().is_err());
    }

    #[test]
    fn test_growth_may_exceed_one() {
        let mut entity = sample_entity();
        entity.growth_rate = dec!(2.5);
        assert!(entity.validate().is_ok());
    }

    #[test]
    fn test_industry_display() {
        assert_eq!(Industry::Saas.to_string(), "SaaS");
        assert_eq!(Industry::Other("Agritech".into()).to_string(), "Agritech");
    }
}
