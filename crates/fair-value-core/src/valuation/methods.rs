use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::entity::{BusinessEntity, Industry};
use crate::error::FairValueError;
use crate::types::{ensure_unit_interval, ComputationOutput, Money, Rate};
use crate::FairValueResult;

use super::aggregate::{aggregate, AggregateOutput};
use super::comps::ComparableAnalysis;
use super::dcf::DcfOutput;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One independent estimate of the entity's value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationMethod {
    /// Unique within a catalog
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Monetary result of the method
    pub result: Money,
    /// Trust in the method's result (0-1)
    pub confidence: Rate,
    /// Fit of the method to the entity's industry and stage (0-1)
    pub applicability: Rate,
    pub last_calculated: DateTime<Utc>,
}

impl ValuationMethod {
    /// Aggregation weight: confidence × applicability.
    pub fn weight(&self) -> Decimal {
        self.confidence * self.applicability
    }

    pub(crate) fn validate(&self) -> FairValueResult<()> {
        if self.name.trim().is_empty() {
            return Err(FairValueError::InvalidInput {
                field: "name".into(),
                reason: "Method name must not be empty".into(),
            });
        }
        ensure_unit_interval(&format!("{}.confidence", self.name), self.confidence)?;
        ensure_unit_interval(&format!("{}.applicability", self.name), self.applicability)?;
        Ok(())
    }
}

/// Families of method the engine can derive from its own analyses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MethodKind {
    DiscountedCashFlow,
    RevenueMultiple,
    EbitdaMultiple,
}

impl MethodKind {
    pub fn label(&self) -> &'static str {
        match self {
            MethodKind::DiscountedCashFlow => "Discounted Cash Flow",
            MethodKind::RevenueMultiple => "Revenue Multiple",
            MethodKind::EbitdaMultiple => "EBITDA Multiple",
        }
    }

    fn default_confidence(&self) -> Rate {
        match self {
            MethodKind::DiscountedCashFlow => dec!(0.80),
            MethodKind::RevenueMultiple => dec!(0.75),
            MethodKind::EbitdaMultiple => dec!(0.70),
        }
    }
}

/// A pending change to one method's inputs.
///
/// Built up by the caller (e.g. while an analyst drags a slider) and
/// committed in one step through [`MethodCatalog::apply_edit`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MethodEdit {
    pub method_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Rate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applicability: Option<Rate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl MethodEdit {
    pub fn new(method_name: impl Into<String>) -> Self {
        Self {
            method_name: method_name.into(),
            ..Self::default()
        }
    }

    pub fn confidence(mut self, confidence: Rate) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn applicability(mut self, applicability: Rate) -> Self {
        self.applicability = Some(applicability);
        self
    }

    pub fn result(mut self, result: Money) -> Self {
        self.result = Some(result);
        self
    }
}

/// The valuation methods held for one entity. Immutable: every change
/// produces a new catalog.
#[derive(Debug, Clone, Serialize)]
pub struct MethodCatalog {
    entity_id: String,
    methods: Vec<ValuationMethod>,
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

impl MethodCatalog {
    pub fn new(
        entity_id: impl Into<String>,
        methods: Vec<ValuationMethod>,
    ) -> FairValueResult<Self> {
        let mut seen = HashSet::new();
        for method in &methods {
            method.validate()?;
            if !seen.insert(method.name.as_str()) {
                return Err(FairValueError::InvalidInput {
                    field: "methods".into(),
                    reason: format!("duplicate method '{}'", method.name),
                });
            }
        }
        Ok(Self {
            entity_id: entity_id.into(),
            methods,
        })
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn methods(&self) -> &[ValuationMethod] {
        &self.methods
    }

    pub fn get(&self, name: &str) -> Option<&ValuationMethod> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// A new catalog with `method` appended.
    pub fn with_method(&self, method: ValuationMethod) -> FairValueResult<Self> {
        let mut methods = self.methods.clone();
        methods.push(method);
        Self::new(self.entity_id.clone(), methods)
    }

    /// Validate `edit` in full, then return a catalog with the edited method
    /// replaced. On any failure the edit is discarded as a whole.
    pub fn apply_edit(&self, edit: &MethodEdit, as_of: DateTime<Utc>) -> FairValueResult<Self> {
        let current = self
            .get(&edit.method_name)
            .ok_or_else(|| FairValueError::InvalidInput {
                field: "method_name".into(),
                reason: format!("no method named '{}'", edit.method_name),
            })?;

        let edited = ValuationMethod {
            name: current.name.clone(),
            description: edit
                .description
                .clone()
                .unwrap_or_else(|| current.description.clone()),
            result: edit.result.unwrap_or(current.result),
            confidence: edit.confidence.unwrap_or(current.confidence),
            applicability: edit.applicability.unwrap_or(current.applicability),
            last_calculated: as_of,
        };
        edited.validate()?;

        let methods = self
            .methods
            .iter()
            .map(|m| {
                if m.name == edited.name {
                    edited.clone()
                } else {
                    m.clone()
                }
            })
            .collect();

        Ok(Self {
            entity_id: self.entity_id.clone(),
            methods,
        })
    }

    /// Reconcile this catalog's methods.
    pub fn aggregate(&self) -> FairValueResult<ComputationOutput<AggregateOutput>> {
        aggregate(&self.methods)
    }
}

// ---------------------------------------------------------------------------
// Standard methods
// ---------------------------------------------------------------------------

/// How well a method family suits an industry.
pub fn default_applicability(industry: &Industry, kind: MethodKind) -> Rate {
    use Industry::*;
    use MethodKind::*;
    match (industry, kind) {
        (Saas, DiscountedCashFlow) => dec!(0.85),
        (Saas, RevenueMultiple) => dec!(0.90),
        (Saas, EbitdaMultiple) => dec!(0.60),
        (Technology, DiscountedCashFlow) => dec!(0.80),
        (Technology, RevenueMultiple) => dec!(0.85),
        (Technology, EbitdaMultiple) => dec!(0.70),
        (Manufacturing, DiscountedCashFlow) => dec!(0.90),
        (Manufacturing, RevenueMultiple) => dec!(0.60),
        (Manufacturing, EbitdaMultiple) => dec!(0.90),
        (Retail, DiscountedCashFlow) => dec!(0.80),
        (Retail, RevenueMultiple) => dec!(0.70),
        (Retail, EbitdaMultiple) => dec!(0.85),
        (Healthcare, DiscountedCashFlow) => dec!(0.85),
        (Healthcare, RevenueMultiple) => dec!(0.70),
        (Healthcare, EbitdaMultiple) => dec!(0.80),
        (FinancialServices, DiscountedCashFlow) => dec!(0.60),
        (FinancialServices, _) => dec!(0.50),
        (ProfessionalServices, DiscountedCashFlow) => dec!(0.75),
        (ProfessionalServices, RevenueMultiple) => dec!(0.70),
        (ProfessionalServices, EbitdaMultiple) => dec!(0.80),
        (RealEstate, DiscountedCashFlow) => dec!(0.70),
        (RealEstate, RevenueMultiple) => dec!(0.50),
        (RealEstate, EbitdaMultiple) => dec!(0.75),
        (Other(_), RevenueMultiple) => dec!(0.70),
        (Other(_), _) => dec!(0.75),
    }
}

/// Build the catalog of methods the engine derives itself: DCF equity value
/// plus the peer-implied revenue and EBITDA multiple values.
///
/// Peer views are skipped when the comparable set was empty.
pub fn standard_methods(
    entity: &BusinessEntity,
    dcf: &DcfOutput,
    comps: &ComparableAnalysis,
    as_of: DateTime<Utc>,
) -> FairValueResult<MethodCatalog> {
    let build = |kind: MethodKind, result: Money, description: String| ValuationMethod {
        name: kind.label().to_string(),
        description,
        result,
        confidence: kind.default_confidence(),
        applicability: default_applicability(&entity.industry, kind),
        last_calculated: as_of,
    };

    let mut methods = vec![build(
        MethodKind::DiscountedCashFlow,
        dcf.equity_value,
        format!("{}-year DCF equity value", dcf.projections.len()),
    )];

    if let Some(implied) = &comps.peer_implied {
        methods.push(build(
            MethodKind::RevenueMultiple,
            implied.from_revenue_multiple,
            format!("Peer average revenue multiple across {} comparables", comps.peer_count),
        ));
        methods.push(build(
            MethodKind::EbitdaMultiple,
            implied.from_ebitda_multiple,
            format!("Peer average EBITDA multiple across {} comparables", comps.peer_count),
        ));
    }

    MethodCatalog::new(entity.id.clone(), methods)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------


#[cfg(test)]
mod tests {
    use super::fixtures::method;
    use super::*;
    use chrono::TimeZone;

    fn sample_catalog() -> MethodCatalog {
        MethodCatalog::new(
            "acme-analytics",
            vec![
                method("Discounted Cash Flow", dec!(18500000), dec!(0.85), dec!(0.9)),
                method("Market Multiple", dec!(21750000), dec!(0.75), dec!(0.85)),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = MethodCatalog::new(
            "acme",
            vec![
                method("DCF", dec!(1), dec!(0.5), dec!(0.5)),
                method("DCF", dec!(2), dec!(0.5), dec!(0.5)),
            ],
        );
        assert!(matches!(result, Err(FairValueError::InvalidInput { .. })));
    }

    #[test]
    fn test_with_method_duplicate_rejected() {
        let catalog = sample_catalog();
        let dup = method("Market Multiple", dec!(1), dec!(0.5), dec!(0.5));
        assert!(catalog.with_method(dup).is_err());
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn test_apply_edit_returns_new_catalog() {
        let catalog = sample_catalog();
        let as_of = Utc.with_ymd_and_hms(2024, 7, 1, 9, 0, 0).unwrap();
        let edit = MethodEdit::new("Market Multiple").confidence(dec!(0.5));

        let edited = catalog.apply_edit(&edit, as_of).unwrap();
        let m = edited.get("Market Multiple").unwrap();
        assert_eq!(m.confidence, dec!(0.5));
        assert_eq!(m.applicability, dec!(0.85));
        assert_eq!(m.last_calculated, as_of);

        // Original untouched
        assert_eq!(catalog.get("Market Multiple").unwrap().confidence, dec!(0.75));
    }

    #[test]
    fn test_apply_edit_is_atomic() {
        let catalog = sample_catalog();
        let as_of = Utc.with_ymd_and_hms(2024, 7, 1, 9, 0, 0).unwrap();
        let edit = MethodEdit::new("Market Multiple")
            .confidence(dec!(0.4))
            .applicability(dec!(1.3));

        assert!(catalog.apply_edit(&edit, as_of).is_err());
        assert_eq!(catalog.get("Market Multiple").unwrap().confidence, dec!(0.75));
    }

    #[test]
    fn test_apply_edit_unknown_method() {
        let catalog = sample_catalog();
        let as_of = Utc.with_ymd_and_hms(2024, 7, 1, 9, 0, 0).unwrap();
        assert!(catalog
            .apply_edit(&MethodEdit::new("Asset Based").result(dec!(1)), as_of)
            .is_err());
    }

    #[test]
    fn test_edit_changes_reconciled_value() {
        let catalog = sample_catalog();
        let as_of = Utc.with_ymd_and_hms(2024, 7, 1, 9, 0, 0).unwrap();
        let before = catalog.aggregate().unwrap().result.value;

        let edited = catalog
            .apply_edit(&MethodEdit::new("Market Multiple").confidence(Decimal::ZERO), as_of)
            .unwrap();
        let after = edited.aggregate().unwrap().result.value;

        assert!(before > dec!(18500000));
        assert_eq!(after, dec!(18500000));
    }

    #[test]
    fn test_default_applicability_in_range() {
        let industries = [
            Industry::Saas,
            Industry::Manufacturing,
            Industry::FinancialServices,
            Industry::Other("Agritech".into()),
        ];
        for industry in &industries {
            for kind in [
                MethodKind::DiscountedCashFlow,
                MethodKind::RevenueMultiple,
                MethodKind::EbitdaMultiple,
            ] {
                let a = default_applicability(industry, kind);
                assert!(a > Decimal::ZERO && a <= Decimal::ONE);
            }
        }
    }
}
