//! Curve construction and rate lookup.
//!
//! - **daily_curve** — reconciled per-day rates and the segment index
//! - **builder** — reconciliation of raw observations
//! - **resolver** — average per-day rates with explicit fallbacks
//! - **book** — one snapshot per metal

pub mod book;
pub mod builder;
pub mod daily_curve;
pub mod resolver;
