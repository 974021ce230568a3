//! Exported record types.
//!
//! A [`NetworkSnapshot`] is the dictionary-shaped export of a built network:
//! one record per activity arrow and per event, with PERT and debug columns
//! present only when the model carries them. The snapshot is a pure function
//! of the model and is the sole input of the render layer.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{RenderError, WbsId};

/// Model-level facts every consumer of a snapshot needs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SnapshotMeta {
    /// Probability level used for quantile columns.
    pub p: f64,
    /// Whether any activity carries effort variance.
    pub is_pert: bool,
    /// Whether error-bound columns are exported.
    pub debug: bool,
    /// Project duration (maximum early event time).
    pub project_duration: f64,
}

/// One activity arrow of the AoA network.
///
/// Dummies export with `wbs_id == 0`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub id: usize,
    pub wbs_id: WbsId,
    pub letter: String,
    pub src_id: usize,
    pub dst_id: usize,
    pub expected: f64,
    pub duration: f64,
    pub early_start: f64,
    pub late_start: f64,
    pub early_end: f64,
    pub late_end: f64,
    pub reserve: f64,
    #[serde(default)]
    pub data: BTreeMap<String, Value>,

    // PERT columns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp_var: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimistic: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opt_start: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opt_end: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pessimistic: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pes_start: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pes_end: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub early_start_var: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub early_end_var: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub early_start_pqe: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub early_end_pqe: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub late_end_prob: Option<f64>,

    // Debug columns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub early_start_err: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub late_start_err: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub early_end_err: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub late_end_err: Option<f64>,
}

impl ActivityRecord {
    pub fn is_dummy(&self) -> bool {
        self.wbs_id == 0
    }

    pub fn is_critical(&self) -> bool {
        self.reserve == 0.0
    }
}

/// One event (milestone) of the AoA network.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: usize,
    pub stage: usize,
    pub early: f64,
    pub late: f64,
    pub reserve: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimistic: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pessimistic: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub early_var: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub early_pqe: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub late_prob: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub early_err: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub late_err: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reserve_err: Option<f64>,
}

/// The dictionary-shaped export of a built network.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    pub meta: SnapshotMeta,
    pub activities: Vec<ActivityRecord>,
    pub events: Vec<EventRecord>,
}

/// A flat table: named columns and rows of scalar values.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    /// Index of a named column.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Value at `(row, column-name)`.
    pub fn cell(&self, row: usize, name: &str) -> Option<&Value> {
        self.rows.get(row)?.get(self.column(name)?)
    }
}

impl NetworkSnapshot {
    /// Flatten activity records into a table, expanding `data` keys into
    /// per-column scalars. Missing keys become empty strings.
    pub fn activity_table(&self) -> Table {
        let mut columns: Vec<String> = [
            "id",
            "wbs_id",
            "letter",
            "src_id",
            "dst_id",
            "expected",
            "duration",
            "early_start",
            "late_start",
            "early_end",
            "late_end",
            "reserve",
        ]
        .iter()
        .map(|s| (*s).to_string())
        .collect();
        if self.meta.is_pert {
            columns.extend(
                [
                    "exp_var",
                    "variance",
                    "optimistic",
                    "opt_start",
                    "opt_end",
                    "pessimistic",
                    "pes_start",
                    "pes_end",
                    "early_start_var",
                    "early_end_var",
                    "early_start_pqe",
                    "early_end_pqe",
                    "late_end_prob",
                ]
                .iter()
                .map(|s| (*s).to_string()),
            );
        }
        if self.meta.debug {
            columns.extend(
                ["early_start_err", "late_start_err", "early_end_err", "late_end_err"]
                    .iter()
                    .map(|s| (*s).to_string()),
            );
        }

        let data_keys: BTreeSet<&str> = self
            .activities
            .iter()
            .flat_map(|a| a.data.keys().map(String::as_str))
            .collect();
        columns.extend(data_keys.iter().map(|k| (*k).to_string()));

        let rows = self
            .activities
            .iter()
            .map(|a| {
                let mut row = vec![
                    json!(a.id),
                    json!(a.wbs_id),
                    json!(a.letter),
                    json!(a.src_id),
                    json!(a.dst_id),
                    json!(a.expected),
                    json!(a.duration),
                    json!(a.early_start),
                    json!(a.late_start),
                    json!(a.early_end),
                    json!(a.late_end),
                    json!(a.reserve),
                ];
                if self.meta.is_pert {
                    for v in [
                        a.exp_var,
                        a.variance,
                        a.optimistic,
                        a.opt_start,
                        a.opt_end,
                        a.pessimistic,
                        a.pes_start,
                        a.pes_end,
                        a.early_start_var,
                        a.early_end_var,
                        a.early_start_pqe,
                        a.early_end_pqe,
                        a.late_end_prob,
                    ] {
                        row.push(opt_cell(v));
                    }
                }
                if self.meta.debug {
                    for v in [a.early_start_err, a.late_start_err, a.early_end_err, a.late_end_err]
                    {
                        row.push(opt_cell(v));
                    }
                }
                for key in &data_keys {
                    row.push(a.data.get(*key).cloned().unwrap_or_else(|| json!("")));
                }
                row
            })
            .collect();

        Table { columns, rows }
    }

    /// Flatten event records into a table.
    pub fn event_table(&self) -> Table {
        let mut columns: Vec<String> = ["id", "stage", "early", "late", "reserve"]
            .iter()
            .map(|s| (*s).to_string())
            .collect();
        if self.meta.is_pert {
            columns.extend(
                ["optimistic", "pessimistic", "early_var", "early_pqe", "late_prob"]
                    .iter()
                    .map(|s| (*s).to_string()),
            );
        }
        if self.meta.debug {
            columns.extend(
                ["early_err", "late_err", "reserve_err"].iter().map(|s| (*s).to_string()),
            );
        }

        let rows = self
            .events
            .iter()
            .map(|e| {
                let mut row = vec![
                    json!(e.id),
                    json!(e.stage),
                    json!(e.early),
                    json!(e.late),
                    json!(e.reserve),
                ];
                if self.meta.is_pert {
                    for v in [e.optimistic, e.pessimistic, e.early_var, e.early_pqe, e.late_prob] {
                        row.push(opt_cell(v));
                    }
                }
                if self.meta.debug {
                    for v in [e.early_err, e.late_err, e.reserve_err] {
                        row.push(opt_cell(v));
                    }
                }
                row
            })
            .collect();

        Table { columns, rows }
    }
}

fn opt_cell(v: Option<f64>) -> Value {
    v.map_or_else(|| json!(""), |v| json!(v))
}

/// Output rendering over a network snapshot.
pub trait Renderer {
    type Output;

    /// Render a snapshot to the output format.
    fn render(&self, snapshot: &NetworkSnapshot) -> Result<Self::Output, RenderError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(id: usize, data: BTreeMap<String, Value>) -> ActivityRecord {
        ActivityRecord {
            id,
            wbs_id: id as WbsId,
            letter: "A".into(),
            src_id: 1,
            dst_id: 2,
            expected: 1.0,
            duration: 1.0,
            early_start: 0.0,
            late_start: 0.0,
            early_end: 1.0,
            late_end: 1.0,
            reserve: 0.0,
            data,
            exp_var: None,
            variance: None,
            optimistic: None,
            opt_start: None,
            opt_end: None,
            pessimistic: None,
            pes_start: None,
            pes_end: None,
            early_start_var: None,
            early_end_var: None,
            early_start_pqe: None,
            early_end_pqe: None,
            late_end_prob: None,
            early_start_err: None,
            late_start_err: None,
            early_end_err: None,
            late_end_err: None,
        }
    }

    fn meta() -> SnapshotMeta {
        SnapshotMeta { p: 0.95, is_pert: false, debug: false, project_duration: 1.0 }
    }

    #[test]
    fn data_keys_expand_to_columns() {
        let mut d1 = BTreeMap::new();
        d1.insert("team".to_string(), json!(2));
        let d2 = BTreeMap::new();
        let snapshot = NetworkSnapshot {
            meta: meta(),
            activities: vec![record(1, d1), record(2, d2)],
            events: vec![],
        };

        let table = snapshot.activity_table();
        let col = table.column("team").expect("team column");
        assert_eq!(table.rows[0][col], json!(2));
        assert_eq!(table.rows[1][col], json!(""));
    }

    #[test]
    fn pert_columns_absent_without_variance() {
        let snapshot =
            NetworkSnapshot { meta: meta(), activities: vec![record(1, BTreeMap::new())], events: vec![] };
        let table = snapshot.activity_table();
        assert!(table.column("variance").is_none());
        assert!(table.column("early_start_err").is_none());
        assert_eq!(table.rows.len(), 1);
    }

    #[test]
    fn snapshot_round_trips_through_json() {
        let snapshot =
            NetworkSnapshot { meta: meta(), activities: vec![record(1, BTreeMap::new())], events: vec![] };
        let text = serde_json::to_string(&snapshot).unwrap();
        let back: NetworkSnapshot = serde_json::from_str(&text).unwrap();
        assert_eq!(back.activities.len(), 1);
        assert_eq!(back.activities[0].letter, "A");
    }
}
