use chrono::Utc;
use napi::Result as NapiResult;
use napi_derive::napi;
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use fair_value_core::history::{HistoryRegistry, HistoryTracker, TrendLabel, ValuationHistory};
use fair_value_core::valuation::methods::{MethodCatalog, MethodEdit, ValuationMethod};
use fair_value_core::{BusinessEntity, Currency, FairValueError};

/// History shared by every call into this module.
static HISTORY: Lazy<HistoryRegistry> = Lazy::new(HistoryRegistry::new);

/// Convert a boundary failure (bad JSON, unparsable number) into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

/// Engine failures carry their kind as a `CODE: message` prefix so callers
/// can branch without matching on message text.
fn engine_error(e: FairValueError) -> napi::Error {
    napi::Error::new(
        napi::Status::GenericFailure,
        format!("{}: {}", e.code(), e),
    )
}

fn parse<T: serde::de::DeserializeOwned>(input_json: &str) -> NapiResult<T> {
    serde_json::from_str(input_json).map_err(to_napi_error)
}

fn render<T: Serialize>(output: &T) -> NapiResult<String> {
    serde_json::to_string(output).map_err(to_napi_error)
}

fn parse_decimal(field: &str, raw: &str) -> NapiResult<Decimal> {
    raw.trim()
        .parse()
        .map_err(|e| to_napi_error(format!("{field}: {e}")))
}

fn parse_currency(code: Option<String>) -> Currency {
    match code {
        None => Currency::default(),
        Some(code) => serde_json::from_value(serde_json::Value::String(code.clone()))
            .unwrap_or(Currency::Other(code)),
    }
}

// ---------------------------------------------------------------------------
// Valuation
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct AggregateRequest {
    #[serde(default)]
    entity_id: String,
    methods: Vec<ValuationMethod>,
    #[serde(default)]
    edits: Vec<MethodEdit>,
}

/// Reconcile methods, applying any pending edits first. An invalid edit
/// rejects the whole request.
#[napi]
pub fn aggregate_methods(input_json: String) -> NapiResult<String> {
    let request: AggregateRequest = parse(&input_json)?;
    let now = Utc::now();
    let mut catalog =
        MethodCatalog::new(request.entity_id, request.methods).map_err(engine_error)?;
    for edit in &request.edits {
        catalog = catalog.apply_edit(edit, now).map_err(engine_error)?;
    }
    let output = catalog.aggregate().map_err(engine_error)?;
    render(&output)
}

#[napi]
pub fn compare_to_comparables(input_json: String) -> NapiResult<String> {
    let input: fair_value_core::valuation::comps::ComparablesInput = parse(&input_json)?;
    let output = fair_value_core::valuation::comps::compare_to_comparables(&input)
        .map_err(engine_error)?;
    render(&output)
}

#[derive(Deserialize)]
struct DcfRequest {
    entity: BusinessEntity,
    assumptions: fair_value_core::valuation::dcf::DcfAssumptions,
}

#[napi]
pub fn project_dcf(input_json: String) -> NapiResult<String> {
    let request: DcfRequest = parse(&input_json)?;
    let output = fair_value_core::valuation::dcf::project_dcf(&request.entity, &request.assumptions)
        .map_err(engine_error)?;
    render(&output)
}

#[napi]
pub fn sensitivity_grid(input_json: String) -> NapiResult<String> {
    let input: fair_value_core::valuation::sensitivity::SensitivityInput = parse(&input_json)?;
    let output = fair_value_core::valuation::sensitivity::sensitivity_grid(&input)
        .map_err(engine_error)?;
    render(&output)
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

#[napi]
pub fn evaluate_metric(input_json: String) -> NapiResult<String> {
    let metric: fair_value_core::valuation::metrics::ValuationMetric = parse(&input_json)?;
    let output =
        fair_value_core::valuation::metrics::evaluate_metric(&metric).map_err(engine_error)?;
    render(&output)
}

#[napi]
pub fn evaluate_metrics(input_json: String) -> NapiResult<String> {
    let metrics: Vec<fair_value_core::valuation::metrics::ValuationMetric> = parse(&input_json)?;
    let output =
        fair_value_core::valuation::metrics::evaluate_metrics(&metrics).map_err(engine_error)?;
    render(&output)
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct RecordRequest {
    entity_id: String,
    value: Decimal,
    method: String,
    analyst: String,
    #[serde(default)]
    notes: Option<String>,
}

#[derive(Deserialize)]
struct LoadRequest {
    entity_id: String,
    entries: Vec<ValuationHistory>,
}

#[derive(Serialize)]
struct TrendResponse {
    entity_id: String,
    percent_change: Decimal,
    trend: TrendLabel,
}

#[napi]
pub fn record_valuation(input_json: String) -> NapiResult<String> {
    let request: RecordRequest = parse(&input_json)?;
    let entry = HISTORY
        .record_valuation(
            &request.entity_id,
            request.value,
            request.method,
            request.analyst,
            request.notes,
        )
        .map_err(engine_error)?;
    render(&entry)
}

#[napi]
pub fn valuation_trend(entity_id: String) -> NapiResult<String> {
    let percent_change = HISTORY.percent_change(&entity_id).map_err(engine_error)?;
    render(&TrendResponse {
        entity_id,
        percent_change,
        trend: TrendLabel::from_change(percent_change),
    })
}

/// Newest first; empty for entities with no recorded valuations.
#[napi]
pub fn valuation_history(entity_id: String) -> NapiResult<String> {
    render(&HISTORY.history(&entity_id))
}

/// Restore an entity's log from storage. Returns the number of entries
/// loaded; an entity that already has a log in this process is rejected.
#[napi]
pub fn load_valuation_history(input_json: String) -> NapiResult<u32> {
    let request: LoadRequest = parse(&input_json)?;
    let tracker =
        HistoryTracker::from_entries(request.entity_id, request.entries).map_err(engine_error)?;
    let count = tracker.len() as u32;
    HISTORY.load(tracker).map_err(engine_error)?;
    Ok(count)
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

#[napi]
pub fn format_currency(amount: String, currency: Option<String>) -> NapiResult<String> {
    let amount = parse_decimal("amount", &amount)?;
    Ok(fair_value_core::format::format_currency(
        amount,
        &parse_currency(currency),
    ))
}

#[napi]
pub fn format_percent(rate: String, decimals: Option<u32>) -> NapiResult<String> {
    let rate = parse_decimal("rate", &rate)?;
    Ok(fair_value_core::format::format_percent(
        rate,
        decimals.unwrap_or(1),
    ))
}

#[napi]
pub fn format_multiple(multiple: String) -> NapiResult<String> {
    let multiple = parse_decimal("multiple", &multiple)?;
    Ok(fair_value_core::format::format_multiple(multiple))
}
