//! Graphviz DOT renderer
//!
//! Emits the AoA network as a DOT digraph: record-shaped event nodes
//! carrying `id | early / late | reserve`, activity edges labeled with the
//! display letter and duration. Styling is a pure function of the
//! snapshot: zero-reserve elements use the critical color, activities
//! whose late-end probability falls below the model's `p` level use the
//! near-critical color, and dummies render dashed.
//!
//! ## Example Output
//!
//! ```text
//! digraph aoa {
//!     rankdir=LR;
//!     node [shape=record, style=rounded];
//!     e1 [label="{1|{0.0|0.0}|0.0}", color="#e74c3c"];
//!     e2 [label="{2|{5.0|5.0}|0.0}", color="#e74c3c"];
//!     e1 -> e2 [label="A (5.0)", color="#e74c3c"];
//! }
//! ```

use std::fmt::Write as _;

use arrowplan_core::{ActivityRecord, NetworkSnapshot, RenderError, Renderer};

/// Graphviz DOT renderer for AoA snapshots.
#[derive(Clone, Debug)]
pub struct DotRenderer {
    /// Graph layout direction.
    pub rankdir: String,
    /// Color for zero-reserve events and activities.
    pub critical_color: String,
    /// Color for activities with `late_end_prob < p`.
    pub near_critical_color: String,
    /// Color for everything else.
    pub normal_color: String,
    /// Whether edge labels carry durations next to letters.
    pub show_durations: bool,
}

impl Default for DotRenderer {
    fn default() -> Self {
        Self {
            rankdir: "LR".into(),
            critical_color: "#e74c3c".into(),
            near_critical_color: "#f39c12".into(),
            normal_color: "#3498db".into(),
            show_durations: true,
        }
    }
}

impl DotRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the layout direction (`LR`, `TB`, …).
    pub fn rankdir(mut self, dir: impl Into<String>) -> Self {
        self.rankdir = dir.into();
        self
    }

    /// Drop durations from edge labels.
    pub fn no_durations(mut self) -> Self {
        self.show_durations = false;
        self
    }

    fn edge_color(&self, activity: &ActivityRecord, p: f64) -> &str {
        if activity.is_critical() {
            return &self.critical_color;
        }
        if activity.late_end_prob.is_some_and(|prob| prob < p) {
            return &self.near_critical_color;
        }
        &self.normal_color
    }

    /// Escape a label fragment for DOT record syntax.
    fn escape(text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        for c in text.chars() {
            match c {
                '"' | '\\' | '{' | '}' | '|' | '<' | '>' => {
                    out.push('\\');
                    out.push(c);
                }
                '\n' | '\r' => out.push(' '),
                _ => out.push(c),
            }
        }
        out
    }
}

impl Renderer for DotRenderer {
    type Output = String;

    fn render(&self, snapshot: &NetworkSnapshot) -> Result<String, RenderError> {
        let n = snapshot.events.len();
        for a in &snapshot.activities {
            if a.src_id < 1 || a.src_id > n || a.dst_id < 1 || a.dst_id > n {
                return Err(RenderError::InvalidData(format!(
                    "activity {} references event outside 1..={n}",
                    a.id
                )));
            }
        }

        let mut out = String::new();
        let _ = writeln!(out, "digraph aoa {{");
        let _ = writeln!(out, "    rankdir={};", self.rankdir);
        let _ = writeln!(out, "    node [shape=record, style=rounded];");

        for e in &snapshot.events {
            let color = if e.reserve == 0.0 {
                &self.critical_color
            } else {
                &self.normal_color
            };
            let _ = writeln!(
                out,
                "    e{} [label=\"{{{}|{{{:.1}|{:.1}}}|{:.1}}}\", color=\"{}\"];",
                e.id, e.id, e.early, e.late, e.reserve, color
            );
        }

        for a in &snapshot.activities {
            let label = if a.is_dummy() {
                String::new()
            } else if self.show_durations {
                format!("{} ({:.1})", Self::escape(&a.letter), a.duration)
            } else {
                Self::escape(&a.letter)
            };
            let style = if a.is_dummy() { ", style=dashed" } else { "" };
            let _ = writeln!(
                out,
                "    e{} -> e{} [label=\"{}\", color=\"{}\"{}];",
                a.src_id,
                a.dst_id,
                label,
                self.edge_color(a, snapshot.meta.p),
                style
            );
        }

        let _ = writeln!(out, "}}");
        Ok(out)
    }
}
