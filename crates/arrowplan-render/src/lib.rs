//! # arrowplan-render
//!
//! Rendering backends for arrowplan AoA networks.
//!
//! This crate provides:
//! - Graphviz DOT rendering of the event/activity network
//! - Criticality-aware coloring and dashed dummy arrows
//!
//! Rendering is a pure function of the exported
//! [`NetworkSnapshot`](arrowplan_core::NetworkSnapshot): the same snapshot
//! always produces the same text.
//!
//! ## Example
//!
//! ```rust,ignore
//! use arrowplan_core::Renderer;
//! use arrowplan_render::DotRenderer;
//!
//! let snapshot = model.to_snapshot();
//! let dot = DotRenderer::new().render(&snapshot)?;
//! std::fs::write("network.dot", dot)?;
//! ```

pub mod dot;

pub use dot::DotRenderer;
