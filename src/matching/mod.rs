//! Finding offsetting business: tidy-ups between trading cards, scoring of
//! submitted interests against each other, and aggregate exposure.

pub mod exposure;
pub mod interest;
pub mod tidy;
