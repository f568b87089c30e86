use crate::core::leg::Leg;
use crate::core::metal::Metal;
use crate::core::trader::{Role, TraderId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpreadError {
    #[error("a spread needs at least one leg")]
    NoLegs,
    #[error("leg {index} is {found}, spread is {expected}")]
    MixedMetals {
        index: usize,
        expected: Metal,
        found: Metal,
    },
    #[error("max loss must be a non-negative amount, got {0}")]
    InvalidMaxLoss(f64),
}

/// An ordered set of legs on one metal, traded together.
///
/// Legs may overlap or leave gaps between them; each is valued on its own
/// and the results are summed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SpreadRecord")]
pub struct Spread {
    metal: Metal,
    legs: Vec<Leg>,
    /// Only trade at the engine's valuation.
    at_valuation_only: bool,
    /// Largest shortfall against valuation the submitter will accept.
    max_loss: f64,
    valuation_pnl: Option<f64>,
    /// Curve snapshot the stored valuation was computed against.
    priced_snapshot: Option<u64>,
}

#[derive(Deserialize)]
struct SpreadRecord {
    metal: Metal,
    legs: Vec<Leg>,
    #[serde(default)]
    at_valuation_only: bool,
    #[serde(default)]
    max_loss: f64,
    #[serde(default)]
    valuation_pnl: Option<f64>,
    #[serde(default)]
    priced_snapshot: Option<u64>,
}

impl TryFrom<SpreadRecord> for Spread {
    type Error = SpreadError;

    fn try_from(r: SpreadRecord) -> Result<Self, Self::Error> {
        let mut spread = Spread::new(r.metal, r.legs, r.at_valuation_only, r.max_loss)?;
        spread.valuation_pnl = r.valuation_pnl;
        spread.priced_snapshot = r.priced_snapshot;
        Ok(spread)
    }
}

impl Spread {
    /// Validate and create an unpriced spread: at least one leg, every leg
    /// in `metal`, and a non-negative `max_loss`.
    pub fn new(
        metal: Metal,
        legs: Vec<Leg>,
        at_valuation_only: bool,
        max_loss: f64,
    ) -> Result<Self, SpreadError> {
        if legs.is_empty() {
            return Err(SpreadError::NoLegs);
        }
        if let Some((index, leg)) = legs.iter().enumerate().find(|(_, l)| l.metal() != metal) {
            return Err(SpreadError::MixedMetals {
                index,
                expected: metal,
                found: leg.metal(),
            });
        }
        if !(max_loss >= 0.0) {
            return Err(SpreadError::InvalidMaxLoss(max_loss));
        }
        Ok(Self {
            metal,
            legs,
            at_valuation_only,
            max_loss,
            valuation_pnl: None,
            priced_snapshot: None,
        })
    }

    pub fn metal(&self) -> Metal {
        self.metal
    }

    pub fn legs(&self) -> &[Leg] {
        &self.legs
    }

    pub fn at_valuation_only(&self) -> bool {
        self.at_valuation_only
    }

    pub fn max_loss(&self) -> f64 {
        self.max_loss
    }

    pub fn valuation_pnl(&self) -> Option<f64> {
        self.valuation_pnl
    }

    pub fn priced_snapshot(&self) -> Option<u64> {
        self.priced_snapshot
    }

    /// Store a valuation computed against `snapshot`.
    ///
    /// Leg rates already fixed for the same snapshot are left alone; a new
    /// snapshot replaces them.
    pub(crate) fn record_valuation(&mut self, snapshot: u64, pnl: f64, rates: &[Option<f64>]) {
        if self.priced_snapshot != Some(snapshot) {
            self.legs.iter_mut().for_each(Leg::clear_rate);
        }
        for (leg, rate) in self.legs.iter_mut().zip(rates) {
            if let Some(rate) = rate {
                leg.record_rate(*rate);
            }
        }
        self.valuation_pnl = Some(pnl);
        self.priced_snapshot = Some(snapshot);
    }

    /// Whether trading at `price_pnl` respects the submitter's limits.
    ///
    /// Unpriced spreads accept nothing.
    pub fn within_constraints(&self, price_pnl: f64) -> bool {
        let Some(valuation) = self.valuation_pnl else {
            return false;
        };
        let shortfall = valuation - price_pnl;
        if self.at_valuation_only {
            shortfall <= f64::EPSILON * valuation.abs().max(1.0)
        } else {
            shortfall <= self.max_loss
        }
    }
}

/// Lifecycle of a submitted interest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpreadStatus {
    Pending,
    Accepted,
    Countered,
    Rejected,
}

impl SpreadStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SpreadStatus::Accepted | SpreadStatus::Rejected)
    }

    /// Still in play for matching.
    pub fn is_open(self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for SpreadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SpreadStatus::Pending => "Pending",
            SpreadStatus::Accepted => "Accepted",
            SpreadStatus::Countered => "Countered",
            SpreadStatus::Rejected => "Rejected",
        };
        f.write_str(s)
    }
}

/// A response to an interest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum Response {
    #[serde(rename = "Accepted")]
    Accept { message: Option<String> },
    #[serde(rename = "Countered")]
    Counter {
        counter_pnl: f64,
        message: Option<String>,
    },
    #[serde(rename = "Rejected")]
    Reject { reason: Option<String> },
}

impl Response {
    pub fn resulting_status(&self) -> SpreadStatus {
        match self {
            Response::Accept { .. } => SpreadStatus::Accepted,
            Response::Counter { .. } => SpreadStatus::Countered,
            Response::Reject { .. } => SpreadStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatusError {
    #[error("interest is {from}; it cannot move to {to}")]
    IllegalTransition { from: SpreadStatus, to: SpreadStatus },
    #[error("a {role:?} cannot respond to an interest that is {status}")]
    WrongResponder { role: Role, status: SpreadStatus },
}

/// A spread submitted by a trader for the market maker to price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interest {
    id: Uuid,
    owner: TraderId,
    spread: Spread,
    submitted_at: DateTime<Utc>,
    status: SpreadStatus,
    #[serde(default)]
    response: Option<Response>,
}

impl Interest {
    /// A pending interest with a fresh random ID, stamped now.
    pub fn new(owner: TraderId, spread: Spread) -> Self {
        Self::with_id(Uuid::new_v4(), owner, spread)
    }

    /// Create an interest with a fixed ID (useful for testing / replay).
    pub fn with_id(id: Uuid, owner: TraderId, spread: Spread) -> Self {
        Self {
            id,
            owner,
            spread,
            submitted_at: Utc::now(),
            status: SpreadStatus::Pending,
            response: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn owner(&self) -> &TraderId {
        &self.owner
    }

    pub fn spread(&self) -> &Spread {
        &self.spread
    }

    pub fn spread_mut(&mut self) -> &mut Spread {
        &mut self.spread
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    pub fn status(&self) -> SpreadStatus {
        self.status
    }

    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    /// Apply a response.
    ///
    /// The market maker answers a pending interest; the originator then
    /// accepts or rejects a counter. Accepted and Rejected are final.
    pub fn respond(&mut self, by: Role, response: Response) -> Result<SpreadStatus, StatusError> {
        let to = response.resulting_status();
        let allowed = match (self.status, to) {
            (SpreadStatus::Pending, _) => {
                if by != Role::MarketMaker {
                    return Err(StatusError::WrongResponder {
                        role: by,
                        status: self.status,
                    });
                }
                true
            }
            (SpreadStatus::Countered, SpreadStatus::Accepted | SpreadStatus::Rejected) => {
                if by != Role::Trader {
                    return Err(StatusError::WrongResponder {
                        role: by,
                        status: self.status,
                    });
                }
                true
            }
            _ => false,
        };
        if !allowed {
            return Err(StatusError::IllegalTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.response = Some(response);
        Ok(to)
    }

    /// Whether a counter offer sits within the submitter's limits.
    pub fn counter_within_limits(&self) -> Option<bool> {
        match &self.response {
            Some(Response::Counter { counter_pnl, .. }) => {
                Some(self.spread.within_constraints(*counter_pnl))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::leg::Direction;
    use chrono::NaiveDate;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, day).unwrap()
    }

    fn spread(at_val_only: bool, max_loss: f64) -> Spread {
        let legs = vec![
            Leg::new(Metal::Copper, Direction::Borrow, d(4, 1), d(5, 1), 10).unwrap(),
            Leg::new(Metal::Copper, Direction::Lend, d(5, 1), d(6, 1), 10).unwrap(),
        ];
        Spread::new(Metal::Copper, legs, at_val_only, max_loss).unwrap()
    }

    #[test]
    fn test_spread_rejects_mixed_metals() {
        let legs = vec![
            Leg::new(Metal::Copper, Direction::Borrow, d(4, 1), d(5, 1), 10).unwrap(),
            Leg::new(Metal::Zinc, Direction::Lend, d(5, 1), d(6, 1), 10).unwrap(),
        ];
        assert!(matches!(
            Spread::new(Metal::Copper, legs, false, 0.0),
            Err(SpreadError::MixedMetals { index: 1, .. })
        ));
        assert_eq!(Spread::new(Metal::Copper, vec![], false, 0.0), Err(SpreadError::NoLegs));
    }

    #[test]
    fn test_record_valuation_keeps_rates_within_snapshot() {
        let mut s = spread(false, 0.0);
        s.record_valuation(1, 100.0, &[Some(-0.5), None]);
        assert_eq!(s.legs()[0].daily_rate(), Some(-0.5));
        assert_eq!(s.legs()[1].daily_rate(), None);

        s.record_valuation(1, 100.0, &[Some(-0.7), Some(-0.2)]);
        assert_eq!(s.legs()[0].daily_rate(), Some(-0.5));
        assert_eq!(s.legs()[1].daily_rate(), Some(-0.2));

        s.record_valuation(2, 50.0, &[Some(-0.7), None]);
        assert_eq!(s.legs()[0].daily_rate(), Some(-0.7));
        assert_eq!(s.legs()[1].daily_rate(), None);
        assert_eq!(s.priced_snapshot(), Some(2));
    }

    #[test]
    fn test_constraints() {
        let mut s = spread(false, 200.0);
        assert!(!s.within_constraints(0.0));
        s.record_valuation(1, 1_000.0, &[]);
        assert!(s.within_constraints(900.0));
        assert!(s.within_constraints(800.0));
        assert!(!s.within_constraints(799.0));

        let mut strict = spread(true, 500.0);
        strict.record_valuation(1, 1_000.0, &[]);
        assert!(strict.within_constraints(1_000.0));
        assert!(!strict.within_constraints(990.0));
    }

    #[test]
    fn test_status_machine() {
        let mut interest = Interest::new(TraderId::new("josh"), spread(false, 100.0));
        assert_eq!(interest.status(), SpreadStatus::Pending);

        let err = interest
            .respond(Role::Trader, Response::Accept { message: None })
            .unwrap_err();
        assert!(matches!(err, StatusError::WrongResponder { .. }));

        interest
            .respond(
                Role::MarketMaker,
                Response::Counter {
                    counter_pnl: -50.0,
                    message: Some("tighter".into()),
                },
            )
            .unwrap();
        assert_eq!(interest.status(), SpreadStatus::Countered);

        let err = interest
            .respond(
                Role::Trader,
                Response::Counter {
                    counter_pnl: 0.0,
                    message: None,
                },
            )
            .unwrap_err();
        assert!(matches!(err, StatusError::IllegalTransition { .. }));

        interest
            .respond(Role::Trader, Response::Accept { message: None })
            .unwrap();
        assert!(interest.status().is_terminal());

        let err = interest
            .respond(Role::MarketMaker, Response::Reject { reason: None })
            .unwrap_err();
        assert_eq!(
            err,
            StatusError::IllegalTransition {
                from: SpreadStatus::Accepted,
                to: SpreadStatus::Rejected,
            }
        );
    }

    #[test]
    fn test_counter_within_limits() {
        let mut interest = Interest::new(TraderId::new("paddy"), spread(false, 100.0));
        interest.spread_mut().record_valuation(1, 500.0, &[]);
        assert_eq!(interest.counter_within_limits(), None);
        interest
            .respond(
                Role::MarketMaker,
                Response::Counter {
                    counter_pnl: 450.0,
                    message: None,
                },
            )
            .unwrap();
        assert_eq!(interest.counter_within_limits(), Some(true));
    }

    #[test]
    fn test_response_serializes_with_status_tag() {
        let json = serde_json::to_value(Response::Reject {
            reason: Some("no capacity".into()),
        })
        .unwrap();
        assert_eq!(json["status"], "Rejected");
    }
}
