use crate::config::TidyConfig;
use crate::core::calendar::days_between;
use crate::core::metal::Metal;
use crate::core::position::{Position, TradingCard};
use crate::core::trader::TraderId;
use crate::curve::resolver::Confidence;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Offsetting terms between a short and a long position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TidyTerms {
    pub is_level_carry: bool,
    pub overlap_start: NaiveDate,
    pub overlap_end: NaiveDate,
    pub overlap_days: i64,
    pub matchable_lots: i64,
    /// `matchable_lots × daily_rate × overlap_days`; `None` when neither
    /// position has a rate.
    pub payment: Option<f64>,
    /// Provenance of the rate behind `payment`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_confidence: Option<Confidence>,
}

impl TidyTerms {
    /// Terms for closing out `a` against `b`, or `None` if they cannot offset
    /// (same metal, opposite sign, overlapping dates required).
    ///
    /// The result does not depend on argument order.
    pub fn between(a: &Position, b: &Position) -> Option<Self> {
        let (short, long) = match (a.is_short(), b.is_short()) {
            (true, false) => (a, b),
            (false, true) => (b, a),
            _ => return None,
        };
        if short.metal() != long.metal() {
            return None;
        }

        if short.near_date() == long.near_date()
            && short.far_date() == long.far_date()
            && short.abs_lots() == long.abs_lots()
        {
            return Some(Self {
                is_level_carry: true,
                overlap_start: short.near_date(),
                overlap_end: short.far_date(),
                overlap_days: short.duration_days(),
                matchable_lots: short.abs_lots(),
                payment: Some(0.0),
                payment_confidence: Some(Confidence::Measured),
            });
        }

        let (overlap_start, overlap_end) = short.overlap_with(long)?;
        let overlap_days = days_between(overlap_start, overlap_end);
        let matchable_lots = short.abs_lots().min(long.abs_lots());
        let priced = if short.daily_rate().is_some() { short } else { long };
        let payment = priced
            .daily_rate()
            .map(|rate| matchable_lots as f64 * rate * overlap_days as f64);

        Some(Self {
            is_level_carry: false,
            overlap_start,
            overlap_end,
            overlap_days,
            matchable_lots,
            payment,
            payment_confidence: priced.rate_confidence(),
        })
    }

    /// Level carries always pass; partial matches must clear both limits.
    /// An unknown payment cannot exceed the cap.
    pub fn passes(&self, config: &TidyConfig) -> bool {
        if self.is_level_carry {
            return true;
        }
        if self.matchable_lots < config.min_lots {
            return false;
        }
        match (self.payment, config.max_payment) {
            (Some(payment), Some(cap)) => payment <= cap,
            _ => true,
        }
    }
}

/// A tidy opportunity between two participants.
///
/// `position_a` is always the short side and `position_b` the long side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub metal: Metal,
    pub owner_a: TraderId,
    pub position_a: Position,
    pub owner_b: TraderId,
    pub position_b: Position,
    #[serde(flatten)]
    pub terms: TidyTerms,
}

impl MatchCandidate {
    pub fn is_level_carry(&self) -> bool {
        self.terms.is_level_carry
    }

    pub fn payment(&self) -> Option<f64> {
        self.terms.payment
    }

    /// Whether the payment rests on a fully observed rate.
    pub fn payment_is_measured(&self) -> bool {
        self.terms.payment_confidence == Some(Confidence::Measured)
    }
}

/// Ranking: level carries, then cheapest payment, then unknown payment.
pub fn rank(a: &MatchCandidate, b: &MatchCandidate) -> Ordering {
    b.is_level_carry()
        .cmp(&a.is_level_carry())
        .then_with(|| match (a.payment(), b.payment()) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
}

/// One page of ranked tidy opportunities.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TidySearch {
    /// Candidates passing the filters, before paging.
    pub total: usize,
    pub candidates: Vec<MatchCandidate>,
}

impl fmt::Display for TidySearch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Tidy Opportunities ===")?;
        writeln!(f, "Found:   {}", self.total)?;
        writeln!(f, "Showing: {}", self.candidates.len())?;
        for c in &self.candidates {
            let payment = match (c.payment(), c.terms.payment_confidence) {
                (None, _) => "unknown".to_string(),
                (Some(p), Some(Confidence::Partial {
                    covered_days,
                    total_days,
                })) => format!("{:.2} (partial {}/{}d)", p, covered_days, total_days),
                (Some(p), Some(Confidence::Interpolated)) => format!("{:.2} (interpolated)", p),
                (Some(p), _) => format!("{:.2}", p),
            };
            writeln!(
                f,
                "  {} {} short {} ({} .. {}) vs {} long {} ({} .. {})",
                c.metal,
                c.owner_a,
                c.position_a.abs_lots(),
                c.position_a.near_date(),
                c.position_a.far_date(),
                c.owner_b,
                c.position_b.abs_lots(),
                c.position_b.near_date(),
                c.position_b.far_date(),
            )?;
            if c.is_level_carry() {
                writeln!(f, "    level carry, payment 0")?;
            } else {
                writeln!(
                    f,
                    "    {} lots over {} .. {} ({}d), payment {}",
                    c.terms.matchable_lots,
                    c.terms.overlap_start,
                    c.terms.overlap_end,
                    c.terms.overlap_days,
                    payment
                )?;
            }
        }
        Ok(())
    }
}

struct Entry<'a> {
    owner: &'a TraderId,
    position: &'a Position,
}

/// Searches a registry of trading cards for positions that offset each
/// other across participants.
#[derive(Debug, Clone, Default)]
pub struct TidyFinder {
    config: TidyConfig,
}

impl TidyFinder {
    /// A finder applying `config`'s size, payment and paging limits.
    pub fn new(config: TidyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TidyConfig {
        &self.config
    }

    /// Ranked, filtered and paged tidy opportunities.
    ///
    /// Long positions are indexed per metal by near date, so each short only
    /// visits longs starting before it ends.
    pub fn find(&self, cards: &[TradingCard]) -> TidySearch {
        let mut candidates = Vec::new();

        for metal in Metal::ALL {
            let mut shorts: Vec<Entry<'_>> = Vec::new();
            let mut longs: Vec<Entry<'_>> = Vec::new();
            for card in cards {
                for position in card.positions.iter().filter(|p| p.metal() == metal) {
                    let entry = Entry {
                        owner: &card.owner,
                        position,
                    };
                    if position.is_short() {
                        shorts.push(entry);
                    } else {
                        longs.push(entry);
                    }
                }
            }
            if shorts.is_empty() || longs.is_empty() {
                continue;
            }
            longs.sort_by_key(|e| e.position.near_date());

            for short in &shorts {
                let far = short.position.far_date();
                let reachable = longs.partition_point(|e| e.position.near_date() < far);
                for long in &longs[..reachable] {
                    if let Some(c) = self.evaluate(short, long) {
                        candidates.push(c);
                    }
                }
            }
        }

        self.finish(candidates)
    }

    /// Same result as [`find`](Self::find) by comparing every pair.
    pub fn find_exhaustive(&self, cards: &[TradingCard]) -> TidySearch {
        let entries: Vec<Entry<'_>> = cards
            .iter()
            .flat_map(|card| {
                card.positions.iter().map(move |position| Entry {
                    owner: &card.owner,
                    position,
                })
            })
            .collect();

        let mut candidates = Vec::new();
        for (i, a) in entries.iter().enumerate() {
            for b in &entries[i + 1..] {
                let pair = if a.position.is_short() { (a, b) } else { (b, a) };
                if let Some(c) = self.evaluate(pair.0, pair.1) {
                    candidates.push(c);
                }
            }
        }
        self.finish(candidates)
    }

    fn evaluate(&self, short: &Entry<'_>, long: &Entry<'_>) -> Option<MatchCandidate> {
        if short.owner == long.owner {
            return None;
        }
        let terms = TidyTerms::between(short.position, long.position)?;
        if !terms.passes(&self.config) {
            return None;
        }
        Some(MatchCandidate {
            metal: short.position.metal(),
            owner_a: short.owner.clone(),
            position_a: short.position.clone(),
            owner_b: long.owner.clone(),
            position_b: long.position.clone(),
            terms,
        })
    }

    fn finish(&self, mut candidates: Vec<MatchCandidate>) -> TidySearch {
        candidates.sort_by(|a, b| rank(a, b).then_with(|| tie_break(a, b)));
        let total = candidates.len();
        let page = candidates
            .into_iter()
            .skip(self.config.offset)
            .take(self.config.limit.unwrap_or(usize::MAX))
            .collect();
        log::debug!("tidy search: {total} candidates");
        TidySearch {
            total,
            candidates: page,
        }
    }
}

/// Orders candidates the ranking leaves tied, independent of search order.
fn tie_break(a: &MatchCandidate, b: &MatchCandidate) -> Ordering {
    fn key(p: &Position) -> (NaiveDate, NaiveDate, i64) {
        (p.near_date(), p.far_date(), p.lots())
    }
    fn rate(p: &Position) -> f64 {
        p.daily_rate().unwrap_or(f64::NEG_INFINITY)
    }
    fn provenance(p: &Position) -> (u8, i64, i64) {
        match p.rate_confidence() {
            None => (0, 0, 0),
            Some(Confidence::Measured) => (1, 0, 0),
            Some(Confidence::Partial {
                covered_days,
                total_days,
            }) => (2, covered_days, total_days),
            Some(Confidence::Interpolated) => (3, 0, 0),
        }
    }
    a.metal
        .cmp(&b.metal)
        .then_with(|| a.owner_a.as_str().cmp(b.owner_a.as_str()))
        .then_with(|| key(&a.position_a).cmp(&key(&b.position_a)))
        .then_with(|| a.owner_b.as_str().cmp(b.owner_b.as_str()))
        .then_with(|| key(&a.position_b).cmp(&key(&b.position_b)))
        .then_with(|| rate(&a.position_a).total_cmp(&rate(&b.position_a)))
        .then_with(|| rate(&a.position_b).total_cmp(&rate(&b.position_b)))
        .then_with(|| provenance(&a.position_a).cmp(&provenance(&b.position_a)))
        .then_with(|| provenance(&a.position_b).cmp(&provenance(&b.position_b)))
}
