use chrono::Utc;
use clap::Args;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use fair_value_core::format::{format_currency, format_multiple, format_percent};
use fair_value_core::valuation::comps::{self, ComparablesInput};
use fair_value_core::valuation::dcf::{self, DcfAssumptions};
use fair_value_core::valuation::methods::{MethodCatalog, MethodEdit, ValuationMethod};
use fair_value_core::valuation::sensitivity::{self, SensitivityInput};
use fair_value_core::{BusinessEntity, Currency};

use super::attach_display;
use crate::input;

/// Arguments for weighted reconciliation
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct AggregateArgs {
    /// Path to JSON/YAML file with `methods` (and optional `edits`)
    #[arg(long)]
    pub input: Option<String>,

    /// Override a method's confidence, as NAME=VALUE (repeatable)
    #[arg(long = "confidence", value_name = "NAME=VALUE")]
    pub confidence: Vec<String>,

    /// Override a method's applicability, as NAME=VALUE (repeatable)
    #[arg(long = "applicability", value_name = "NAME=VALUE")]
    pub applicability: Vec<String>,
}

/// Arguments for comparable company analysis
#[derive(Args)]
pub struct CompsArgs {
    /// Path to JSON/YAML file with entity, reconciled value and comparables
    #[arg(long)]
    pub input: Option<String>,

    /// Override the reconciled value being compared
    #[arg(long)]
    pub reconciled_value: Option<Decimal>,
}

/// Arguments for DCF projection
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct DcfArgs {
    /// Path to JSON/YAML file with `entity` and `assumptions`
    #[arg(long)]
    pub input: Option<String>,

    /// Discount rate (WACC)
    #[arg(long)]
    pub wacc: Option<Decimal>,

    /// Terminal growth rate
    #[arg(long)]
    pub terminal_growth: Option<Decimal>,

    /// Explicit forecast years
    #[arg(long)]
    pub years: Option<u32>,

    /// Weight applied to the perpetuity terminal value
    #[arg(long)]
    pub terminal_weight: Option<Decimal>,
}

/// Arguments for the WACC x terminal growth grid
#[derive(Args)]
pub struct SensitivityArgs {
    /// Path to JSON/YAML file with `entity`, `assumptions` and optional axes
    #[arg(long)]
    pub input: Option<String>,

    /// Discount-rate axis as min:max:step (e.g. "0.10:0.18:0.02")
    #[arg(long)]
    pub wacc_range: Option<String>,

    /// Terminal-growth axis as min:max:step (e.g. "0.01:0.04:0.01")
    #[arg(long)]
    pub growth_range: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AggregateInput {
    #[serde(default = "default_entity_id")]
    entity_id: String,
    #[serde(default)]
    currency: Currency,
    methods: Vec<ValuationMethod>,
    #[serde(default)]
    edits: Vec<MethodEdit>,
}

fn default_entity_id() -> String {
    "entity".to_string()
}

#[derive(Debug, Deserialize)]
struct DcfInput {
    entity: BusinessEntity,
    assumptions: DcfAssumptions,
}

#[derive(Debug, Deserialize)]
struct SensitivityFile {
    entity: BusinessEntity,
    assumptions: DcfAssumptions,
    #[serde(default)]
    discount_rates: Vec<Decimal>,
    #[serde(default)]
    terminal_growth_rates: Vec<Decimal>,
}

#[derive(Debug, Clone)]
struct AxisRange {
    min: Decimal,
    max: Decimal,
    step: Decimal,
}

fn parse_range(flag: &str, spec: &str) -> Result<AxisRange, Box<dyn std::error::Error>> {
    let parts: Vec<&str> = spec.split(':').collect();
    if parts.len() != 3 {
        return Err(format!("--{flag} must be min:max:step, got '{spec}'").into());
    }
    let range = AxisRange {
        min: parts[0].parse()?,
        max: parts[1].parse()?,
        step: parts[2].parse()?,
    };
    if range.step <= Decimal::ZERO {
        return Err(format!("--{flag} step must be positive, got {}", range.step).into());
    }
    Ok(range)
}

fn generate_range(range: &AxisRange) -> Vec<Decimal> {
    let mut values = Vec::new();
    let mut current = range.min;
    while current <= range.max {
        values.push(current);
        current += range.step;
    }
    if values.is_empty() {
        values.push(range.min);
    }
    values
}

fn parse_assignment(flag: &str, spec: &str) -> Result<(String, Decimal), Box<dyn std::error::Error>> {
    let (name, value) = spec
        .rsplit_once('=')
        .ok_or_else(|| format!("--{flag} must be NAME=VALUE, got '{spec}'"))?;
    Ok((name.trim().to_string(), value.trim().parse()?))
}

/// Flag overrides become edits appended after any edits in the file.
fn flag_edits(args: &AggregateArgs) -> Result<Vec<MethodEdit>, Box<dyn std::error::Error>> {
    let mut edits = Vec::new();
    for spec in &args.confidence {
        let (name, value) = parse_assignment("confidence", spec)?;
        edits.push(MethodEdit::new(name).confidence(value));
    }
    for spec in &args.applicability {
        let (name, value) = parse_assignment("applicability", spec)?;
        edits.push(MethodEdit::new(name).applicability(value));
    }
    Ok(edits)
}

pub fn run_aggregate(args: AggregateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let data: AggregateInput = input::require_input(args.input.as_deref(), "aggregate")?;

    let now = Utc::now();
    let overrides = flag_edits(&args)?;
    let mut catalog = MethodCatalog::new(data.entity_id, data.methods)?;
    for edit in data.edits.iter().chain(&overrides) {
        catalog = catalog.apply_edit(edit, now)?;
    }

    let result = catalog.aggregate()?;
    let display = vec![
        ("value", format_currency(result.result.value, &data.currency)),
        ("low", format_currency(result.result.low, &data.currency)),
        ("high", format_currency(result.result.high, &data.currency)),
        ("average_confidence", format_percent(result.result.average_confidence, 0)),
    ];
    let mut output = serde_json::to_value(result)?;
    attach_display(&mut output, display);
    Ok(output)
}

pub fn run_comps(args: CompsArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut data: ComparablesInput = input::require_input(args.input.as_deref(), "comps")?;
    if let Some(value) = args.reconciled_value {
        data.reconciled_value = value;
    }

    let result = comps::compare_to_comparables(&data)?;
    let mut display = vec![
        ("implied_revenue_multiple", format_multiple(result.result.implied_revenue_multiple)),
        ("implied_ebitda_multiple", format_multiple(result.result.implied_ebitda_multiple)),
    ];
    if let Some(p) = result.result.revenue_premium_pct {
        display.push(("revenue_premium_pct", format_percent(p, 1)));
    }
    if let Some(p) = result.result.ebitda_premium_pct {
        display.push(("ebitda_premium_pct", format_percent(p, 1)));
    }
    let mut output = serde_json::to_value(result)?;
    attach_display(&mut output, display);
    Ok(output)
}

pub fn run_dcf(args: DcfArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut data: DcfInput = input::require_input(args.input.as_deref(), "dcf")?;
    let a = &mut data.assumptions;
    if let Some(wacc) = args.wacc {
        a.wacc = wacc;
    }
    if let Some(g) = args.terminal_growth {
        a.terminal_growth = g;
    }
    if let Some(years) = args.years {
        a.horizon_years = years;
    }
    if let Some(weight) = args.terminal_weight {
        a.terminal_value_weight = weight;
    }

    let result = dcf::project_dcf(&data.entity, &data.assumptions)?;
    let currency = &data.entity.currency;
    let display = vec![
        ("enterprise_value", format_currency(result.result.enterprise_value, currency)),
        ("equity_value", format_currency(result.result.equity_value, currency)),
        ("terminal_value_share", format_percent(result.result.terminal_value_share, 1)),
    ];
    let mut output = serde_json::to_value(result)?;
    attach_display(&mut output, display);
    Ok(output)
}

pub fn run_sensitivity(args: SensitivityArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let data: SensitivityFile = input::require_input(args.input.as_deref(), "sensitivity")?;

    let discount_rates = match &args.wacc_range {
        Some(spec) => generate_range(&parse_range("wacc-range", spec)?),
        None => data.discount_rates,
    };
    let terminal_growth_rates = match &args.growth_range {
        Some(spec) => generate_range(&parse_range("growth-range", spec)?),
        None => data.terminal_growth_rates,
    };

    let input = SensitivityInput {
        entity: data.entity,
        assumptions: data.assumptions,
        discount_rates,
        terminal_growth_rates,
    };
    let result = sensitivity::sensitivity_grid(&input)?;
    Ok(serde_json::to_value(result)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_generate_range_inclusive() {
        let range = parse_range("wacc-range", "0.10:0.16:0.02").unwrap();
        assert_eq!(
            generate_range(&range),
            vec![dec!(0.10), dec!(0.12), dec!(0.14), dec!(0.16)]
        );
    }

    #[test]
    fn test_range_rejects_bad_specs() {
        assert!(parse_range("wacc-range", "0.10:0.16").is_err());
        assert!(parse_range("wacc-range", "0.10:0.16:0").is_err());
        assert!(parse_range("wacc-range", "low:0.16:0.02").is_err());
    }

    #[test]
    fn test_assignment_keeps_names_with_spaces() {
        let (name, value) = parse_assignment("confidence", "Discounted Cash Flow=0.6").unwrap();
        assert_eq!(name, "Discounted Cash Flow");
        assert_eq!(value, dec!(0.6));
        assert!(parse_assignment("confidence", "no value").is_err());
    }

    #[test]
    fn test_aggregate_input_defaults() {
        let data: AggregateInput = serde_json::from_value(serde_json::json!({
            "methods": [{
                "name": "DCF",
                "result": "18500000",
                "confidence": "0.85",
                "applicability": "0.9",
                "last_calculated": "2024-06-30T00:00:00Z"
            }]
        }))
        .unwrap();
        assert_eq!(data.entity_id, "entity");
        assert_eq!(data.currency, Currency::USD);
        assert!(data.edits.is_empty());
    }
}
