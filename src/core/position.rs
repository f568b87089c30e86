use crate::core::calendar::{days_between, overlap};
use crate::core::leg::Leg;
use crate::core::metal::Metal;
use crate::core::trader::TraderId;
use crate::curve::book::CurveBook;
use crate::curve::resolver::{Confidence, RateQuote};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PositionError {
    #[error("position lots must be non-zero")]
    ZeroLots,
    #[error("position lots {0} out of range")]
    LotsOutOfRange(i64),
    #[error("far date {far} must be after near date {near}")]
    EmptyCarry { near: NaiveDate, far: NaiveDate },
}

/// A held carry from `near_date` to `far_date`.
///
/// `lots` is signed: positive for long (borrowed), negative for short (lent).
/// A rate filled in from a curve keeps the quote's confidence; a rate
/// supplied with the position is taken as measured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PositionRecord")]
pub struct Position {
    metal: Metal,
    near_date: NaiveDate,
    far_date: NaiveDate,
    lots: i64,
    daily_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    confidence: Option<Confidence>,
}

#[derive(Deserialize)]
struct PositionRecord {
    metal: Metal,
    near_date: NaiveDate,
    far_date: NaiveDate,
    lots: i64,
    #[serde(default)]
    daily_rate: Option<f64>,
    #[serde(default)]
    confidence: Option<Confidence>,
}

impl TryFrom<PositionRecord> for Position {
    type Error = PositionError;

    fn try_from(r: PositionRecord) -> Result<Self, Self::Error> {
        let mut position = Position::new(r.metal, r.near_date, r.far_date, r.lots)?.with_rate(r.daily_rate);
        if position.daily_rate.is_some() {
            position.confidence = r.confidence;
        }
        Ok(position)
    }
}

impl Position {
    /// Validate and create an unpriced position. `lots` must be non-zero
    /// with a magnitude that fits in `i64`, and `far_date` after `near_date`.
    pub fn new(
        metal: Metal,
        near_date: NaiveDate,
        far_date: NaiveDate,
        lots: i64,
    ) -> Result<Self, PositionError> {
        if lots == 0 {
            return Err(PositionError::ZeroLots);
        }
        if lots == i64::MIN {
            return Err(PositionError::LotsOutOfRange(lots));
        }
        if far_date <= near_date {
            return Err(PositionError::EmptyCarry {
                near: near_date,
                far: far_date,
            });
        }
        Ok(Self {
            metal,
            near_date,
            far_date,
            lots,
            daily_rate: None,
            confidence: None,
        })
    }

    /// The position a filled leg leaves on the book.
    pub fn from_leg(leg: &Leg) -> Result<Self, PositionError> {
        Ok(Position::new(
            leg.metal(),
            leg.start_date(),
            leg.end_date(),
            leg.direction().position_sign() * leg.lots(),
        )?
        .with_rate(leg.daily_rate()))
    }

    /// Attach an externally supplied rate, replacing any recorded one.
    pub fn with_rate(mut self, rate: Option<f64>) -> Self {
        self.daily_rate = rate;
        self.confidence = None;
        self
    }

    pub fn metal(&self) -> Metal {
        self.metal
    }

    pub fn near_date(&self) -> NaiveDate {
        self.near_date
    }

    pub fn far_date(&self) -> NaiveDate {
        self.far_date
    }

    pub fn lots(&self) -> i64 {
        self.lots
    }

    pub fn abs_lots(&self) -> i64 {
        self.lots.abs()
    }

    pub fn daily_rate(&self) -> Option<f64> {
        self.daily_rate
    }

    /// Provenance of the recorded rate; `None` while unpriced.
    pub fn rate_confidence(&self) -> Option<Confidence> {
        self.daily_rate
            .map(|_| self.confidence.unwrap_or(Confidence::Measured))
    }

    pub fn is_long(&self) -> bool {
        self.lots > 0
    }

    pub fn is_short(&self) -> bool {
        self.lots < 0
    }

    pub fn duration_days(&self) -> i64 {
        days_between(self.near_date, self.far_date)
    }

    /// Carry value at the recorded rate; zero while unpriced.
    pub fn value(&self) -> f64 {
        self.daily_rate
            .map(|rate| self.abs_lots() as f64 * self.duration_days() as f64 * rate)
            .unwrap_or(0.0)
    }

    pub fn overlap_with(&self, other: &Position) -> Option<(NaiveDate, NaiveDate)> {
        overlap(
            (self.near_date, self.far_date),
            (other.near_date, other.far_date),
        )
    }

    /// Set the rate if none is recorded yet.
    pub fn record_rate(&mut self, rate: f64) -> bool {
        if self.daily_rate.is_some() {
            return false;
        }
        self.daily_rate = Some(rate);
        true
    }

    /// Like [`Position::record_rate`], keeping the quote's confidence.
    pub fn record_quote(&mut self, quote: &RateQuote) -> bool {
        if !self.record_rate(quote.rate) {
            return false;
        }
        self.confidence = Some(quote.confidence);
        true
    }
}

/// One participant's book of carry positions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingCard {
    pub owner: TraderId,
    pub positions: Vec<Position>,
}

impl TradingCard {
    /// An empty card for `owner`.
    pub fn new(owner: TraderId) -> Self {
        Self {
            owner,
            positions: Vec::new(),
        }
    }

    pub fn add(&mut self, position: Position) {
        self.positions.push(position);
    }

    /// Net lots across all positions.
    pub fn net_position(&self) -> i64 {
        self.positions.iter().map(Position::lots).sum()
    }

    /// Positions with a near or far date inside `[start, end]`.
    pub fn positions_in_range(&self, start: NaiveDate, end: NaiveDate) -> Vec<&Position> {
        let inside = |d: NaiveDate| start <= d && d <= end;
        self.positions
            .iter()
            .filter(|p| inside(p.near_date) || inside(p.far_date))
            .collect()
    }

    /// Fill in missing position rates from the book. Rates already set are
    /// kept. Returns how many positions were priced.
    pub fn apply_rates(&mut self, book: &CurveBook) -> usize {
        let mut priced = 0;
        for position in self.positions.iter_mut().filter(|p| p.daily_rate.is_none()) {
            match book.resolve(position.metal, position.near_date, position.far_date) {
                Ok(quote) => {
                    if !quote.is_measured() {
                        log::debug!(
                            "{}: {} {}..{} priced at {:.4} with {:?} confidence",
                            self.owner,
                            position.metal,
                            position.near_date,
                            position.far_date,
                            quote.rate,
                            quote.confidence
                        );
                    }
                    position.record_quote(&quote);
                    priced += 1;
                }
                Err(err) => log::debug!(
                    "{}: no rate for {} {}..{}: {err}",
                    self.owner,
                    position.metal,
                    position.near_date,
                    position.far_date
                ),
            }
        }
        priced
    }
}
