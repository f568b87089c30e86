use crate::config::MatchingConfig;
use crate::core::calendar::{days_between, overlap};
use crate::core::leg::Leg;
use crate::core::metal::Metal;
use crate::core::spread::Interest;
use crate::core::trader::TraderId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Two opposite legs whose dates overlap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegMatch {
    /// Index of the leg within the first interest's spread.
    pub leg_a: usize,
    /// Index of the leg within the second interest's spread.
    pub leg_b: usize,
    pub overlap_start: NaiveDate,
    pub overlap_end: NaiveDate,
    pub overlap_days: i64,
    pub matched_lots: i64,
    /// `overlap_days × matched_lots / 100`.
    pub score: f64,
}

impl LegMatch {
    pub fn between(leg_a: (usize, &Leg), leg_b: (usize, &Leg)) -> Option<Self> {
        let (ia, a) = leg_a;
        let (ib, b) = leg_b;
        if a.direction() == b.direction() {
            return None;
        }
        let (overlap_start, overlap_end) =
            overlap((a.start_date(), a.end_date()), (b.start_date(), b.end_date()))?;
        let overlap_days = days_between(overlap_start, overlap_end);
        let matched_lots = a.lots().min(b.lots());
        Some(Self {
            leg_a: ia,
            leg_b: ib,
            overlap_start,
            overlap_end,
            overlap_days,
            matched_lots,
            score: overlap_days as f64 * matched_lots as f64 / 100.0,
        })
    }
}

/// A pair of interests from different participants that could trade
/// against each other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterestMatch {
    pub metal: Metal,
    pub interest_a: Uuid,
    pub owner_a: TraderId,
    pub interest_b: Uuid,
    pub owner_b: TraderId,
    /// Sum of the leg scores.
    pub score: f64,
    /// Sum of the leg overlaps.
    pub overlap_days: i64,
    pub legs: Vec<LegMatch>,
}

/// Score every pair of interests on the same metal from different owners.
///
/// A simple heuristic for ranking candidates for review; it does not clear
/// anything. Results are sorted by descending score.
pub fn match_interests(interests: &[Interest], config: &MatchingConfig) -> Vec<InterestMatch> {
    let live: Vec<&Interest> = interests
        .iter()
        .filter(|i| !config.open_only || i.status().is_open())
        .collect();

    let mut matches = Vec::new();
    for (i, a) in live.iter().enumerate() {
        for b in &live[i + 1..] {
            if let Some(m) = score_pair(a, b) {
                matches.push(m);
            }
        }
    }

    matches.sort_by(|x, y| {
        y.score
            .total_cmp(&x.score)
            .then_with(|| y.overlap_days.cmp(&x.overlap_days))
    });
    if let Some(limit) = config.limit {
        matches.truncate(limit);
    }
    log::debug!(
        "interest matching: {} live interests, {} matches",
        live.len(),
        matches.len()
    );
    matches
}

/// Score one pair of interests, or `None` if nothing lines up.
pub fn score_pair(a: &Interest, b: &Interest) -> Option<InterestMatch> {
    if a.owner() == b.owner() || a.spread().metal() != b.spread().metal() {
        return None;
    }
    let legs: Vec<LegMatch> = a
        .spread()
        .legs()
        .iter()
        .enumerate()
        .flat_map(move |la| {
            b.spread()
                .legs()
                .iter()
                .enumerate()
                .filter_map(move |lb| LegMatch::between(la, lb))
        })
        .collect();
    if legs.is_empty() {
        return None;
    }
    Some(InterestMatch {
        metal: a.spread().metal(),
        interest_a: a.id(),
        owner_a: a.owner().clone(),
        interest_b: b.id(),
        owner_b: b.owner().clone(),
        score: legs.iter().map(|l| l.score).sum(),
        overlap_days: legs.iter().map(|l| l.overlap_days).sum(),
        legs,
    })
}

impl fmt::Display for InterestMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} {} <-> {}  score {:.2}, {} overlapping days",
            self.metal, self.owner_a, self.owner_b, self.score, self.overlap_days
        )?;
        for leg in &self.legs {
            writeln!(
                f,
                "    leg {} x leg {}: {} .. {} ({}d), {} lots",
                leg.leg_a,
                leg.leg_b,
                leg.overlap_start,
                leg.overlap_end,
                leg.overlap_days,
                leg.matched_lots
            )?;
        }
        Ok(())
    }
}
