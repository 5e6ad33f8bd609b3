//! Append-only log of reconciled valuations and the trend queries over it.
//!
//! Each entity has its own [`HistoryTracker`]; appends take the tracker's
//! write lock so they serialize, and readers always see a whole snapshot.
//! [`HistoryRegistry`] maps entity ids to trackers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::FairValueError;
use crate::types::{Money, Rate};
use crate::FairValueResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A previously reconciled valuation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationHistory {
    /// Position in the entity's log, starting at 1
    pub sequence: u64,
    pub entity_id: String,
    pub recorded_at: DateTime<Utc>,
    pub value: Money,
    /// Method (or reconciliation) that produced the value
    pub method: String,
    pub analyst: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Direction and size of the latest change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendLabel {
    SignificantImprovement,
    SlightImprovement,
    Stable,
    SlightDecline,
    SignificantDecline,
}

impl TrendLabel {
    /// Classify a fractional change. Anything beyond ±5% is significant.
    pub fn from_change(change: Rate) -> Self {
        if change.is_zero() {
            TrendLabel::Stable
        } else if change > SIGNIFICANT_CHANGE {
            TrendLabel::SignificantImprovement
        } else if change > Decimal::ZERO {
            TrendLabel::SlightImprovement
        } else if change < -SIGNIFICANT_CHANGE {
            TrendLabel::SignificantDecline
        } else {
            TrendLabel::SlightDecline
        }
    }
}

impl std::fmt::Display for TrendLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrendLabel::SignificantImprovement => write!(f, "significant_improvement"),
            TrendLabel::SlightImprovement => write!(f, "slight_improvement"),
            TrendLabel::Stable => write!(f, "stable"),
            TrendLabel::SlightDecline => write!(f, "slight_decline"),
            TrendLabel::SignificantDecline => write!(f, "significant_decline"),
        }
    }
}

const SIGNIFICANT_CHANGE: Decimal = dec!(0.05);

// ---------------------------------------------------------------------------
// Tracker
// ---------------------------------------------------------------------------

/// The valuation log of a single entity.
#[derive(Debug)]
pub struct HistoryTracker {
    entity_id: String,
    // Oldest first; exposed newest first.
    entries: RwLock<Vec<ValuationHistory>>,
}

impl HistoryTracker {
    pub fn new(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Rehydrate a log handed over by the persistence layer. Entries may
    /// arrive in any order; they must belong to this entity and carry
    /// distinct sequence numbers.
    pub fn from_entries(
        entity_id: impl Into<String>,
        mut entries: Vec<ValuationHistory>,
    ) -> FairValueResult<Self> {
        let entity_id = entity_id.into();
        if let Some(stray) = entries.iter().find(|e| e.entity_id != entity_id) {
            return Err(FairValueError::InvalidInput {
                field: "entity_id".into(),
                reason: format!(
                    "entry {} belongs to '{}', not '{}'",
                    stray.sequence, stray.entity_id, entity_id
                ),
            });
        }
        entries.sort_by_key(|e| e.sequence);
        for pair in entries.windows(2) {
            if pair[0].sequence == pair[1].sequence {
                return Err(FairValueError::InvalidInput {
                    field: "sequence".into(),
                    reason: format!("duplicate sequence {}", pair[0].sequence),
                });
            }
            if pair[1].recorded_at < pair[0].recorded_at {
                return Err(FairValueError::InvalidInput {
                    field: "recorded_at".into(),
                    reason: format!(
                        "entry {} predates entry {}",
                        pair[1].sequence, pair[0].sequence
                    ),
                });
            }
        }
        Ok(Self {
            entity_id,
            entries: RwLock::new(entries),
        })
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    /// Append a valuation stamped with the current time.
    pub fn record(
        &self,
        value: Money,
        method: impl Into<String>,
        analyst: impl Into<String>,
        notes: Option<String>,
    ) -> FairValueResult<ValuationHistory> {
        self.append(None, value, method.into(), analyst.into(), notes)
    }

    /// Append a valuation stamped with `recorded_at`, which must not be
    /// earlier than the latest entry.
    pub fn record_at(
        &self,
        recorded_at: DateTime<Utc>,
        value: Money,
        method: impl Into<String>,
        analyst: impl Into<String>,
        notes: Option<String>,
    ) -> FairValueResult<ValuationHistory> {
        self.append(Some(recorded_at), value, method.into(), analyst.into(), notes)
    }

    fn append(
        &self,
        recorded_at: Option<DateTime<Utc>>,
        value: Money,
        method: String,
        analyst: String,
        notes: Option<String>,
    ) -> FairValueResult<ValuationHistory> {
        let mut entries = self.entries.write();
        let latest = entries.last().map(|e| (e.sequence, e.recorded_at));

        let recorded_at = match (recorded_at, latest) {
            (Some(at), Some((_, latest_at))) if at < latest_at => {
                return Err(FairValueError::InvalidInput {
                    field: "recorded_at".into(),
                    reason: format!("{at} is earlier than the latest entry ({latest_at})"),
                });
            }
            (Some(at), _) => at,
            // Clock read under the lock; never step behind the log.
            (None, Some((_, latest_at))) => Utc::now().max(latest_at),
            (None, None) => Utc::now(),
        };

        let entry = ValuationHistory {
            sequence: latest.map_or(1, |(seq, _)| seq + 1),
            entity_id: self.entity_id.clone(),
            recorded_at,
            value,
            method,
            analyst,
            notes,
        };
        entries.push(entry.clone());

        tracing::info!(
            entity = %self.entity_id,
            sequence = entry.sequence,
            value = %entry.value,
            "recorded valuation"
        );

        Ok(entry)
    }

    /// Snapshot of the log, newest first.
    pub fn entries(&self) -> Vec<ValuationHistory> {
        self.entries.read().iter().rev().cloned().collect()
    }

    pub fn latest(&self) -> Option<ValuationHistory> {
        self.entries.read().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// `(latest - previous) / previous` over the two most recent entries.
    pub fn percent_change(&self) -> FairValueResult<Rate> {
        let (previous, latest) = self.latest_pair()?;
        change_between(previous, latest)
    }

    /// Classify the change between the two most recent entries.
    pub fn trend(&self) -> FairValueResult<TrendLabel> {
        self.percent_change().map(TrendLabel::from_change)
    }

    fn latest_pair(&self) -> FairValueResult<(Money, Money)> {
        let entries = self.entries.read();
        match entries.as_slice() {
            [.., previous, latest] => Ok((previous.value, latest.value)),
            _ => Err(FairValueError::InsufficientData(format!(
                "entity '{}' has {} recorded valuation(s); trend needs two",
                self.entity_id,
                entries.len()
            ))),
        }
    }
}

fn change_between(previous: Money, latest: Money) -> FairValueResult<Rate> {
    if previous.is_zero() {
        return Err(FairValueError::DivisionByZero {
            context: "percent change against a zero previous valuation".into(),
        });
    }
    Ok((latest - previous) / previous)
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// History logs for many entities.
#[derive(Debug, Default)]
pub struct HistoryRegistry {
    logs: DashMap<String, Arc<HistoryTracker>>,
}

impl HistoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The tracker for `entity_id`, if anything has been recorded or loaded.
    pub fn tracker(&self, entity_id: &str) -> Option<Arc<HistoryTracker>> {
        self.logs.get(entity_id).map(|t| Arc::clone(t.value()))
    }

    /// Register a rehydrated log. Refused once the entity has a log.
    pub fn load(&self, tracker: HistoryTracker) -> FairValueResult<()> {
        match self.logs.entry(tracker.entity_id().to_string()) {
            Entry::Occupied(existing) => Err(FairValueError::InvalidInput {
                field: "entity_id".into(),
                reason: format!(
                    "entity '{}' already has {} recorded valuation(s)",
                    existing.key(),
                    existing.get().len()
                ),
            }),
            Entry::Vacant(slot) => {
                tracing::debug!(
                    entity = %slot.key(),
                    entries = tracker.len(),
                    "loaded valuation history"
                );
                slot.insert(Arc::new(tracker));
                Ok(())
            }
        }
    }

    pub fn record_valuation(
        &self,
        entity_id: &str,
        value: Money,
        method: impl Into<String>,
        analyst: impl Into<String>,
        notes: Option<String>,
    ) -> FairValueResult<ValuationHistory> {
        // Append under the map entry guard so a concurrent load sees the slot taken.
        let tracker = self
            .logs
            .entry(entity_id.to_string())
            .or_insert_with(|| Arc::new(HistoryTracker::new(entity_id)));
        tracker.record(value, method, analyst, notes)
    }

    pub fn trend(&self, entity_id: &str) -> FairValueResult<TrendLabel> {
        self.existing(entity_id)?.trend()
    }

    pub fn percent_change(&self, entity_id: &str) -> FairValueResult<Rate> {
        self.existing(entity_id)?.percent_change()
    }

    /// Newest-first snapshot; empty for unknown entities.
    pub fn history(&self, entity_id: &str) -> Vec<ValuationHistory> {
        self.logs
            .get(entity_id)
            .map(|t| t.entries())
            .unwrap_or_default()
    }

    fn existing(&self, entity_id: &str) -> FairValueResult<Arc<HistoryTracker>> {
        self.tracker(entity_id).ok_or_else(|| {
            FairValueError::InsufficientData(format!(
                "no valuations recorded for entity '{entity_id}'"
            ))
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
