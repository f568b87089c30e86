//! Domain types: metals, calendar conventions, observations, legs,
//! spreads and positions.

pub mod calendar;
pub mod leg;
pub mod metal;
pub mod observation;
pub mod position;
pub mod spread;
pub mod trader;
