//! # arrowplan-core
//!
//! Core domain model for the arrowplan scheduling engine.
//!
//! This crate provides:
//! - Input types: [`Wbs`], [`WbsEntry`], [`Effort`], [`Links`]
//! - Certainty-aware time arithmetic: [`TimeTriple`]
//! - Export types: [`NetworkSnapshot`], [`Table`], the [`Renderer`] trait
//! - The error taxonomy: [`ModelError`], [`RenderError`]
//!
//! ## Example
//!
//! ```rust
//! use arrowplan_core::{Links, Wbs, WbsEntry};
//!
//! let mut wbs = Wbs::new();
//! wbs.insert(1, WbsEntry::new("A").expected(5.0));
//! wbs.insert(2, WbsEntry::new("B").three_point(3.0, 5.0, 8.0).data("team", 2));
//!
//! let links = Links::from_arrays(&[1], &[2]).unwrap();
//! assert_eq!(links.len(), 1);
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

mod export;
mod links;
mod time;

pub use export::{ActivityRecord, EventRecord, NetworkSnapshot, Renderer, SnapshotMeta, Table};
pub use links::Links;
pub use time::TimeTriple;

// ============================================================================
// Type Aliases
// ============================================================================

/// User-facing activity identifier. Id `0` is reserved for internal dummies.
pub type WbsId = u32;

/// The `wbs_id` carried by internal dummy activities.
pub const DUMMY_WBS: WbsId = 0;

// ============================================================================
// Effort
// ============================================================================

/// Effort estimate of an activity, in one of three forms.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Effort {
    /// A direct estimate with optional variance.
    Direct { expected: f64, variance: Option<f64> },
    /// Classic three-point PERT estimate.
    ThreePoint { optimistic: f64, most_likely: f64, pessimistic: f64 },
    /// Two-point estimate; the mode is implied at the midpoint.
    TwoPoint { optimistic: f64, pessimistic: f64 },
}

/// Scalar estimates derived from an [`Effort`] form.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EffortEstimate {
    /// Mean effort.
    pub expected: f64,
    /// Effort variance (zero for deterministic activities).
    pub variance: f64,
    /// Optimistic bound.
    pub optimistic: f64,
    /// Pessimistic bound.
    pub pessimistic: f64,
}

impl Effort {
    /// Derive scalar estimates.
    ///
    /// For the direct form the interval comes from `default_risk`:
    /// `[m·(1−risk), m·(1+risk)]`, with the variance taken verbatim.
    /// The validation rules mirror the input contract: `a ≤ m ≤ b`,
    /// `a ≤ b`, non-negative mean and variance.
    pub fn estimate(&self, default_risk: f64) -> Result<EffortEstimate, String> {
        match *self {
            Self::Direct { expected, variance } => {
                if !expected.is_finite() || expected < 0.0 {
                    return Err(format!("expected effort must be non-negative, got {expected}"));
                }
                let variance = variance.unwrap_or(0.0);
                if !variance.is_finite() || variance < 0.0 {
                    return Err(format!("effort variance must be non-negative, got {variance}"));
                }
                Ok(EffortEstimate {
                    expected,
                    variance,
                    optimistic: expected * (1.0 - default_risk),
                    pessimistic: expected * (1.0 + default_risk),
                })
            }
            Self::ThreePoint { optimistic, most_likely, pessimistic } => {
                if !(optimistic <= most_likely && most_likely <= pessimistic) {
                    return Err(format!(
                        "three-point estimate must satisfy a <= m <= b, got ({optimistic}, {most_likely}, {pessimistic})"
                    ));
                }
                let expected = (optimistic + 4.0 * most_likely + pessimistic) / 6.0;
                if expected < 0.0 {
                    return Err(format!("mean effort must be non-negative, got {expected}"));
                }
                let sd = (pessimistic - optimistic) / 6.0;
                Ok(EffortEstimate { expected, variance: sd * sd, optimistic, pessimistic })
            }
            Self::TwoPoint { optimistic, pessimistic } => {
                if optimistic > pessimistic {
                    return Err(format!(
                        "two-point estimate must satisfy a <= b, got ({optimistic}, {pessimistic})"
                    ));
                }
                let expected = 0.5 * (optimistic + pessimistic);
                if expected < 0.0 {
                    return Err(format!("mean effort must be non-negative, got {expected}"));
                }
                let sd = (pessimistic - optimistic) / 6.0;
                Ok(EffortEstimate { expected, variance: sd * sd, optimistic, pessimistic })
            }
        }
    }
}

// ============================================================================
// WBS
// ============================================================================

/// One user-supplied activity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WbsEntry {
    /// Display letter or code (required).
    pub letter: String,
    /// Optional human-readable name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Effort estimate; exactly one form must be present by build time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effort: Option<Effort>,
    /// Opaque user data, preserved verbatim and flattened on table export.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, Value>,
}

impl WbsEntry {
    /// Create an entry with the given display letter.
    pub fn new(letter: impl Into<String>) -> Self {
        Self { letter: letter.into(), name: None, effort: None, data: BTreeMap::new() }
    }

    /// Set the name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Direct effort estimate.
    pub fn expected(mut self, expected: f64) -> Self {
        self.effort = Some(Effort::Direct { expected, variance: None });
        self
    }

    /// Direct effort estimate with variance.
    pub fn expected_var(mut self, expected: f64, variance: f64) -> Self {
        self.effort = Some(Effort::Direct { expected, variance: Some(variance) });
        self
    }

    /// Three-point PERT estimate.
    pub fn three_point(mut self, optimistic: f64, most_likely: f64, pessimistic: f64) -> Self {
        self.effort = Some(Effort::ThreePoint { optimistic, most_likely, pessimistic });
        self
    }

    /// Two-point estimate.
    pub fn two_point(mut self, optimistic: f64, pessimistic: f64) -> Self {
        self.effort = Some(Effort::TwoPoint { optimistic, pessimistic });
        self
    }

    /// Attach an opaque data field.
    pub fn data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Parse the dictionary form. Recognized keys: `letter`, `name`,
    /// `expected` (alias `duration`), `variance`, `optimistic`,
    /// `most_likely`, `pessimistic`. Every other key lands in `data`
    /// verbatim.
    pub fn from_value(value: &Value) -> Result<Self, String> {
        let Value::Object(map) = value else {
            return Err(format!("expected an object, got {value}"));
        };
        let letter = map
            .get("letter")
            .and_then(Value::as_str)
            .ok_or_else(|| "missing required string field 'letter'".to_string())?;
        let mut entry = Self::new(letter);
        if let Some(name) = map.get("name").and_then(Value::as_str) {
            entry.name = Some(name.to_string());
        }

        let num = |key: &str| map.get(key).and_then(Value::as_f64);
        let expected = num("expected").or_else(|| num("duration"));
        let optimistic = num("optimistic");
        let most_likely = num("most_likely");
        let pessimistic = num("pessimistic");

        entry.effort = match (expected, optimistic, most_likely, pessimistic) {
            (Some(expected), _, _, _) => {
                Some(Effort::Direct { expected, variance: num("variance") })
            }
            (None, Some(a), Some(m), Some(b)) => {
                Some(Effort::ThreePoint { optimistic: a, most_likely: m, pessimistic: b })
            }
            (None, Some(a), None, Some(b)) => {
                Some(Effort::TwoPoint { optimistic: a, pessimistic: b })
            }
            _ => None,
        };

        const KNOWN: [&str; 7] =
            ["letter", "name", "expected", "duration", "variance", "optimistic", "most_likely"];
        for (key, value) in map {
            if KNOWN.contains(&key.as_str()) || key == "pessimistic" {
                continue;
            }
            entry.data.insert(key.clone(), value.clone());
        }
        Ok(entry)
    }
}

/// Insertion-ordered map of activities, keyed by [`WbsId`].
///
/// Iteration follows insertion order, which fixes the deterministic
/// ordering of the whole pipeline. Re-inserting an id replaces its entry
/// in place.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Wbs {
    entries: Vec<(WbsId, WbsEntry)>,
}

impl Wbs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an activity.
    pub fn insert(&mut self, id: WbsId, entry: WbsEntry) -> &mut Self {
        if let Some(slot) = self.entries.iter_mut().find(|(i, _)| *i == id) {
            slot.1 = entry;
        } else {
            self.entries.push((id, entry));
        }
        self
    }

    pub fn get(&self, id: WbsId) -> Option<&WbsEntry> {
        self.entries.iter().find(|(i, _)| *i == id).map(|(_, e)| e)
    }

    pub fn iter(&self) -> impl Iterator<Item = (WbsId, &WbsEntry)> {
        self.entries.iter().map(|(i, e)| (*i, e))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse the dictionary form `{ "<id>": { letter, … }, … }`.
    ///
    /// JSON object keys carry no reliable order, so entries are sorted by
    /// numeric id. Callers that need a specific order should use the
    /// builder API instead.
    pub fn from_value(value: &Value) -> Result<Self, ModelError> {
        let Value::Object(map) = value else {
            return Err(ModelError::EffortShape {
                wbs_id: 0,
                reason: format!("wbs must be an object, got {value}"),
            });
        };
        let mut parsed: Vec<(WbsId, WbsEntry)> = Vec::with_capacity(map.len());
        for (key, entry) in map {
            let id: WbsId = key.parse().map_err(|_| {
                ModelError::EffortShape { wbs_id: 0, reason: format!("invalid wbs id '{key}'") }
            })?;
            let entry = WbsEntry::from_value(entry)
                .map_err(|reason| ModelError::EffortShape { wbs_id: id, reason })?;
            parsed.push((id, entry));
        }
        parsed.sort_by_key(|(id, _)| *id);
        let mut wbs = Self::new();
        for (id, entry) in parsed {
            wbs.insert(id, entry);
        }
        Ok(wbs)
    }
}

// ============================================================================
// Duration callback
// ============================================================================

/// Activity context handed to the duration callback.
#[derive(Clone, Copy, Debug)]
pub struct ActivityCtx<'a> {
    pub wbs_id: WbsId,
    pub letter: &'a str,
    pub data: &'a BTreeMap<String, Value>,
}

impl ActivityCtx<'_> {
    /// Numeric data field, if present.
    pub fn number(&self, key: &str) -> Option<f64> {
        self.data.get(key).and_then(Value::as_f64)
    }
}

/// Effort → duration callback.
///
/// Contract: `sign(dur) == sign(effort)`, `dur(0) == 0`, side-effect free
/// and reentrant. `base_time` is `None` when a base estimate is requested
/// (post-processing and PERT variance sampling); otherwise it is the
/// current schedule time, so the callback can model calendars and
/// resource availability. Backward passes hand in negated effort.
pub type DurationFn = Box<dyn Fn(f64, &ActivityCtx<'_>, Option<f64>) -> f64 + Send + Sync>;

// ============================================================================
// Errors
// ============================================================================

/// Model construction and query errors.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A vertex reaches itself through the precedence links.
    #[error("dependency cycle detected at activity {wbs_id}")]
    Cycle { wbs_id: WbsId },

    /// The links argument is not one of the four accepted shapes.
    #[error("links have an unsupported shape: {0}")]
    LinksShape(String),

    /// A WBS entry has no valid effort form.
    #[error("activity {wbs_id}: {reason}")]
    EffortShape { wbs_id: WbsId, reason: String },

    /// A pipeline invariant was violated; this is a bug.
    #[error("internal invariant violated: {0}")]
    Internal(String),
}

/// Rendering errors.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid snapshot: {0}")]
    InvalidData(String),
}

// ============================================================================
// Tests
// ============================================================================
