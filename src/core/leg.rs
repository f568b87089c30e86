use crate::core::calendar::days_between;
use crate::core::metal::Metal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Side of a carry leg. Lend is the economic opposite of Borrow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Borrow,
    Lend,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::Borrow => Direction::Lend,
            Direction::Lend => Direction::Borrow,
        }
    }

    /// Valuation sign: a borrower pays the per-day rate, a lender receives it.
    pub fn pnl_sign(self) -> f64 {
        match self {
            Direction::Borrow => -1.0,
            Direction::Lend => 1.0,
        }
    }

    /// Sign of the resulting position on a trading card (borrow = long).
    pub fn position_sign(self) -> i64 {
        match self {
            Direction::Borrow => 1,
            Direction::Lend => -1,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Borrow => f.write_str("Borrow"),
            Direction::Lend => f.write_str("Lend"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LegError {
    #[error("leg lots must be positive, got {0}")]
    NonPositiveLots(i64),
    #[error("leg end {end} precedes start {start}")]
    InvertedDates { start: NaiveDate, end: NaiveDate },
}

/// One directional borrow/lend commitment over `[start_date, end_date)`.
///
/// `daily_rate` stays empty until the leg is priced against a curve
/// snapshot; see [`Leg::record_rate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "LegRecord")]
pub struct Leg {
    metal: Metal,
    direction: Direction,
    start_date: NaiveDate,
    end_date: NaiveDate,
    lots: i64,
    daily_rate: Option<f64>,
}

#[derive(Deserialize)]
struct LegRecord {
    metal: Metal,
    direction: Direction,
    start_date: NaiveDate,
    end_date: NaiveDate,
    lots: i64,
    #[serde(default)]
    daily_rate: Option<f64>,
}

impl TryFrom<LegRecord> for Leg {
    type Error = LegError;

    fn try_from(r: LegRecord) -> Result<Self, Self::Error> {
        let mut leg = Leg::new(r.metal, r.direction, r.start_date, r.end_date, r.lots)?;
        leg.daily_rate = r.daily_rate;
        Ok(leg)
    }
}

impl Leg {
    /// Create an unpriced leg. A zero-day leg is allowed and carries nothing.
    pub fn new(
        metal: Metal,
        direction: Direction,
        start_date: NaiveDate,
        end_date: NaiveDate,
        lots: i64,
    ) -> Result<Self, LegError> {
        if lots <= 0 {
            return Err(LegError::NonPositiveLots(lots));
        }
        if end_date < start_date {
            return Err(LegError::InvertedDates {
                start: start_date,
                end: end_date,
            });
        }
        Ok(Self {
            metal,
            direction,
            start_date,
            end_date,
            lots,
            daily_rate: None,
        })
    }

    pub fn metal(&self) -> Metal {
        self.metal
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// First carried day.
    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    /// Day after the last carried day.
    pub fn end_date(&self) -> NaiveDate {
        self.end_date
    }

    /// Unsigned size; the sign comes from [`Leg::direction`].
    pub fn lots(&self) -> i64 {
        self.lots
    }

    /// Per-day rate recorded at pricing time, if any.
    pub fn daily_rate(&self) -> Option<f64> {
        self.daily_rate
    }

    /// Carried days, `end_date - start_date`.
    pub fn days(&self) -> i64 {
        days_between(self.start_date, self.end_date)
    }

    /// Physical quantity in tonnes, saturating at `i64::MAX`.
    pub fn tons(&self) -> i64 {
        self.lots.saturating_mul(self.metal.tons_per_lot())
    }

    /// Store the resolved rate. Returns `false` if a rate was already set.
    pub fn record_rate(&mut self, rate: f64) -> bool {
        if self.daily_rate.is_some() {
            return false;
        }
        self.daily_rate = Some(rate);
        true
    }

    pub(crate) fn clear_rate(&mut self) {
        self.daily_rate = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, day).unwrap()
    }

    #[test]
    fn test_leg_validation() {
        assert!(Leg::new(Metal::Zinc, Direction::Lend, d(4, 1), d(5, 1), 10).is_ok());
        assert!(Leg::new(Metal::Zinc, Direction::Lend, d(4, 1), d(4, 1), 10).is_ok());
        assert_eq!(
            Leg::new(Metal::Zinc, Direction::Lend, d(4, 1), d(5, 1), 0),
            Err(LegError::NonPositiveLots(0))
        );
        assert!(matches!(
            Leg::new(Metal::Zinc, Direction::Lend, d(5, 1), d(4, 1), 5),
            Err(LegError::InvertedDates { .. })
        ));
    }

    #[test]
    fn test_leg_days_and_tons() {
        let leg = Leg::new(Metal::Nickel, Direction::Borrow, d(4, 1), d(7, 1), 10).unwrap();
        assert_eq!(leg.days(), 91);
        assert_eq!(leg.tons(), 60);
    }

    #[test]
    fn test_tons_saturate() {
        let leg = Leg::new(Metal::Copper, Direction::Lend, d(4, 1), d(5, 1), i64::MAX / 2).unwrap();
        assert_eq!(leg.tons(), i64::MAX);
    }

    #[test]
    fn test_rate_is_recorded_once() {
        let mut leg = Leg::new(Metal::Tin, Direction::Borrow, d(4, 1), d(5, 1), 1).unwrap();
        assert!(leg.record_rate(-0.4));
        assert!(!leg.record_rate(-0.9));
        assert_eq!(leg.daily_rate(), Some(-0.4));
    }

    #[test]
    fn test_deserialize_validates() {
        let ok = r#"{"metal":"AH","direction":"Borrow","start_date":"2025-04-01","end_date":"2025-07-01","lots":100}"#;
        let leg: Leg = serde_json::from_str(ok).unwrap();
        assert_eq!(leg.metal(), Metal::Aluminum);
        assert_eq!(leg.daily_rate(), None);

        let bad = r#"{"metal":"AH","direction":"Lend","start_date":"2025-04-01","end_date":"2025-07-01","lots":-3}"#;
        assert!(serde_json::from_str::<Leg>(bad).is_err());
    }

    #[test]
    fn test_direction_signs() {
        assert_eq!(Direction::Borrow.pnl_sign(), -Direction::Lend.pnl_sign());
        assert_eq!(Direction::Borrow.opposite(), Direction::Lend);
        assert_eq!(Direction::Lend.position_sign(), -1);
    }
}
