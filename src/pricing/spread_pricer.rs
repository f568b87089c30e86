use crate::core::leg::{Direction, Leg};
use crate::core::metal::Metal;
use crate::core::spread::Spread;
use crate::curve::book::CurveBook;
use crate::curve::resolver::Confidence;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Carry PnL of one leg at a per-day rate.
///
/// `sign × rate × days × tons_per_lot × lots`, where borrowing pays the carry
/// (sign −1) and lending receives it (sign +1).
pub fn carry_pnl(direction: Direction, metal: Metal, rate: f64, days: i64, lots: i64) -> f64 {
    direction.pnl_sign() * rate * days as f64 * metal.tons_per_lot() as f64 * lots as f64
}

/// Valuation of a single leg.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegResult {
    pub leg: Leg,
    pub days: i64,
    /// `None` when the curve had nothing to offer; the leg then contributes
    /// zero.
    pub rate: Option<f64>,
    pub confidence: Option<Confidence>,
    pub pnl: f64,
}

impl LegResult {
    pub fn is_priced(&self) -> bool {
        self.rate.is_some()
    }
}

/// Valuation of a whole spread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpreadValuation {
    pub metal: Metal,
    /// Snapshot of the curve used, if the book held one for the metal.
    pub snapshot: Option<u64>,
    pub total_pnl: f64,
    pub legs: Vec<LegResult>,
}

impl SpreadValuation {
    /// Legs that fell back to zero for lack of data.
    pub fn unpriced_legs(&self) -> usize {
        self.legs.iter().filter(|l| !l.is_priced()).count()
    }

    /// True when every leg was priced from observed days only.
    pub fn is_fully_measured(&self) -> bool {
        self.legs
            .iter()
            .all(|l| l.confidence == Some(Confidence::Measured))
    }

    /// Resolved per-leg rates, in leg order.
    pub fn rates(&self) -> Vec<Option<f64>> {
        self.legs.iter().map(|l| l.rate).collect()
    }
}

impl fmt::Display for SpreadValuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== {} spread valuation ===", self.metal)?;
        match self.snapshot {
            Some(snapshot) => writeln!(f, "Snapshot:  {}", snapshot)?,
            None => writeln!(f, "Snapshot:  none")?,
        }
        for (i, leg) in self.legs.iter().enumerate() {
            let rate = match leg.rate {
                Some(rate) => format!("{:+.4}/day", rate),
                None => "no data".to_string(),
            };
            let confidence = match leg.confidence {
                Some(Confidence::Measured) => String::new(),
                Some(Confidence::Partial {
                    covered_days,
                    total_days,
                }) => format!(" (partial {}/{}d)", covered_days, total_days),
                Some(Confidence::Interpolated) => " (interpolated)".to_string(),
                None => String::new(),
            };
            writeln!(
                f,
                "  Leg {}: {} {} lots {} .. {} ({}d) @ {}{}  => {:.2}",
                i,
                leg.leg.direction(),
                leg.leg.lots(),
                leg.leg.start_date(),
                leg.leg.end_date(),
                leg.days,
                rate,
                confidence,
                leg.pnl
            )?;
        }
        writeln!(f, "Total PnL: {:.2}", self.total_pnl)
    }
}

/// Prices spreads against the curves held in a [`CurveBook`].
///
/// Identical spreads priced against the same book always give identical
/// results; the pricer holds no state of its own.
#[derive(Debug, Clone, Copy)]
pub struct SpreadPricer<'a> {
    book: &'a CurveBook,
}

impl<'a> SpreadPricer<'a> {
    /// A pricer reading rates from `book`'s current snapshots.
    pub fn new(book: &'a CurveBook) -> Self {
        Self { book }
    }

    pub fn book(&self) -> &'a CurveBook {
        self.book
    }

    /// Value one leg. A leg without data prices to zero.
    pub fn price_leg(&self, leg: &Leg) -> LegResult {
        let days = leg.days();
        let quote = self
            .book
            .resolve(leg.metal(), leg.start_date(), leg.end_date());
        let (rate, confidence) = match quote {
            Ok(quote) => (Some(quote.rate), Some(quote.confidence)),
            Err(err) => {
                log::warn!(
                    "{} {} leg {}..{} priced at zero: {err}",
                    leg.metal(),
                    leg.direction(),
                    leg.start_date(),
                    leg.end_date()
                );
                (None, None)
            }
        };
        let pnl = rate
            .map(|r| carry_pnl(leg.direction(), leg.metal(), r, days, leg.lots()))
            .unwrap_or(0.0);
        LegResult {
            leg: leg.clone(),
            days,
            rate,
            confidence,
            pnl,
        }
    }

    /// Value every leg of a spread and sum the results.
    pub fn price(&self, spread: &Spread) -> SpreadValuation {
        let legs: Vec<LegResult> = spread.legs().iter().map(|l| self.price_leg(l)).collect();
        let total_pnl = legs.iter().map(|l| l.pnl).sum();
        SpreadValuation {
            metal: spread.metal(),
            snapshot: self.book.snapshot(spread.metal()),
            total_pnl,
            legs,
        }
    }

    /// Price a spread and store the valuation and leg rates on it.
    ///
    /// Nothing is stored when the book has no curve for the spread's metal.
    pub fn price_in_place(&self, spread: &mut Spread) -> SpreadValuation {
        let valuation = self.price(spread);
        match valuation.snapshot {
            Some(snapshot) => {
                spread.record_valuation(snapshot, valuation.total_pnl, &valuation.rates())
            }
            None => log::warn!("no {} curve loaded; valuation not stored", spread.metal()),
        }
        valuation
    }

    /// Price independent spreads in parallel. Results keep input order.
    pub fn price_all(&self, spreads: &[Spread]) -> Vec<SpreadValuation> {
        spreads.par_iter().map(|s| self.price(s)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::observation::{ObservationSet, RateObservation};
    use crate::curve::builder::CurveBuilder;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, day).unwrap()
    }

    fn flat_book(metal: Metal, rate: f64) -> CurveBook {
        let set: ObservationSet =
            std::iter::once(RateObservation::new(metal, d(1, 1), d(12, 31), rate)).collect();
        CurveBook::build(&set, &CurveBuilder::default(), 1).book
    }

    fn leg(direction: Direction, lots: i64) -> Leg {
        Leg::new(Metal::Aluminum, direction, d(4, 1), d(7, 1), lots).unwrap()
    }

    #[test]
    fn test_borrow_leg_example() {
        let book = flat_book(Metal::Aluminum, -0.4);
        let result = SpreadPricer::new(&book).price_leg(&leg(Direction::Borrow, 100));
        assert_eq!(result.days, 91);
        assert_relative_eq!(result.pnl, 91_000.0, epsilon = 1e-6);
        assert_eq!(result.confidence, Some(Confidence::Measured));
    }

    #[test]
    fn test_tons_per_lot_applied() {
        let book = flat_book(Metal::Tin, 1.0);
        let tin = Leg::new(Metal::Tin, Direction::Lend, d(4, 1), d(4, 11), 2).unwrap();
        let result = SpreadPricer::new(&book).price_leg(&tin);
        assert_relative_eq!(result.pnl, 1.0 * 10.0 * 5.0 * 2.0);
    }

    #[test]
    fn test_missing_data_leg_prices_to_zero() {
        let book = flat_book(Metal::Aluminum, -0.4);
        let legs = vec![
            leg(Direction::Borrow, 10),
            Leg::new(Metal::Aluminum, Direction::Lend, d(4, 1), d(7, 1), 10).unwrap(),
        ];
        let spread = Spread::new(Metal::Aluminum, legs, false, 0.0).unwrap();
        let valuation = SpreadPricer::new(&book).price(&spread);
        assert_eq!(valuation.unpriced_legs(), 0);
        assert_relative_eq!(valuation.total_pnl, 0.0, epsilon = 1e-9);

        let empty = CurveBook::new();
        let valuation = SpreadPricer::new(&empty).price(&spread);
        assert_eq!(valuation.unpriced_legs(), 2);
        assert_eq!(valuation.total_pnl, 0.0);
        assert_eq!(valuation.snapshot, None);
    }

    #[test]
    fn test_zero_day_leg_carries_nothing() {
        let book = CurveBook::new();
        let flat = Leg::new(Metal::Zinc, Direction::Borrow, d(4, 1), d(4, 1), 10).unwrap();
        let result = SpreadPricer::new(&book).price_leg(&flat);
        assert_eq!(result.rate, Some(0.0));
        assert_eq!(result.pnl, 0.0);
    }

    #[test]
    fn test_price_in_place_records_rates() {
        let book = flat_book(Metal::Aluminum, -0.4);
        let mut spread =
            Spread::new(Metal::Aluminum, vec![leg(Direction::Borrow, 100)], false, 0.0).unwrap();
        let valuation = SpreadPricer::new(&book).price_in_place(&mut spread);
        assert_eq!(spread.valuation_pnl(), Some(valuation.total_pnl));
        assert_eq!(spread.priced_snapshot(), Some(1));
        assert_eq!(spread.legs()[0].daily_rate(), Some(-0.4));
    }

    #[test]
    fn test_price_all_keeps_order() {
        let book = flat_book(Metal::Aluminum, -0.4);
        let spreads: Vec<Spread> = (1..=5)
            .map(|lots| {
                Spread::new(Metal::Aluminum, vec![leg(Direction::Lend, lots)], false, 0.0).unwrap()
            })
            .collect();
        let valuations = SpreadPricer::new(&book).price_all(&spreads);
        for (lots, valuation) in (1..=5).zip(&valuations) {
            assert_relative_eq!(valuation.total_pnl, -0.4 * 91.0 * 25.0 * lots as f64);
        }
    }

    #[test]
    fn test_partial_coverage_is_flagged() {
        let set: ObservationSet =
            std::iter::once(RateObservation::new(Metal::Aluminum, d(4, 1), d(5, 1), -0.4))
                .collect();
        let book = CurveBook::build(&set, &CurveBuilder::default(), 1).book;
        let result = SpreadPricer::new(&book).price_leg(&leg(Direction::Borrow, 1));
        assert_eq!(
            result.confidence,
            Some(Confidence::Partial {
                covered_days: 30,
                total_days: 91
            })
        );
        assert_eq!(result.rate, Some(-0.4));
    }
}
