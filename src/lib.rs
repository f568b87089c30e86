//! # carry-engine
//!
//! Rate curve, carry valuation and tidy-matching engine for OTC metal
//! spread trading.
//!
//! Per-day borrow/lend rates arrive as overlapping, sometimes conflicting
//! observations over date ranges. The engine reconciles them into one daily
//! curve per metal, values multi-leg spreads against that curve, and finds
//! offsetting positions and interests across participants.
//!
//! ## Architecture
//!
//! - **core** — Domain types: metals, legs, spreads, positions, interests,
//!   rate observations, calendar helpers
//! - **curve** — Curve reconciliation, segment index, rate resolution and
//!   per-metal snapshots
//! - **pricing** — Leg and spread valuation
//! - **matching** — Tidy-opportunity search, cross-interest scoring and
//!   exposure analysis
//! - **simulation** — Synthetic market generation
//!
//! The engine does no I/O. Every component works on snapshots passed in by
//! reference, so independent curves and spreads can be processed in
//! parallel.

pub mod config;
pub mod core;
pub mod curve;
pub mod matching;
pub mod pricing;
pub mod simulation;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::config::EngineConfig;
    pub use crate::core::leg::{Direction, Leg};
    pub use crate::core::metal::Metal;
    pub use crate::core::observation::{ObservationSet, RateObservation};
    pub use crate::core::position::{Position, TradingCard};
    pub use crate::core::spread::{Interest, Response, Spread, SpreadStatus};
    pub use crate::core::trader::{Role, TraderId};
    pub use crate::curve::book::CurveBook;
    pub use crate::curve::builder::CurveBuilder;
    pub use crate::curve::daily_curve::DailyCurve;
    pub use crate::curve::resolver::{Confidence, RateError, RateQuote, RateResolver};
    pub use crate::matching::tidy::{MatchCandidate, TidyFinder};
    pub use crate::pricing::spread_pricer::{SpreadPricer, SpreadValuation};
}
