//! Carry valuation of legs and spreads against a curve snapshot.

pub mod spread_pricer;
