use crate::core::calendar::days_between;
use crate::core::leg::Leg;
use crate::core::metal::Metal;
use crate::core::spread::{Interest, Spread};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Constant net exposure over `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExposureRun {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub lots: i64,
}

impl ExposureRun {
    pub fn days(&self) -> i64 {
        days_between(self.start, self.end)
    }

    /// `|lots| × days`, saturating.
    pub fn lot_days(&self) -> i64 {
        self.lots.saturating_abs().saturating_mul(self.days())
    }
}

/// Aggregate net exposure of a set of spreads, per metal and day.
///
/// Exposure is kept as runs between leg boundaries, so cost follows the
/// number of legs rather than the length of the dates they span.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExposureAnalysis {
    /// Net lots per metal as runs in date order. Borrowing adds, lending
    /// subtracts. Stretches netting to zero are omitted.
    pub net_by_metal: BTreeMap<Metal, Vec<ExposureRun>>,
    /// Largest absolute daily exposure, in lots.
    pub max_exposure: i64,
    /// 95th percentile of absolute daily exposures, linearly interpolated.
    pub var_95: f64,
    /// Herfindahl index of gross exposure across metals, scaled 0 to 100.
    pub concentration_index: f64,
}

impl ExposureAnalysis {
    /// Exposure of every interest's spread, whatever its status.
    pub fn from_interests<'a, I>(interests: I) -> Self
    where
        I: IntoIterator<Item = &'a Interest>,
    {
        Self::from_spreads(interests.into_iter().map(Interest::spread))
    }

    pub fn from_spreads<'a, I>(spreads: I) -> Self
    where
        I: IntoIterator<Item = &'a Spread>,
    {
        let mut deltas: BTreeMap<Metal, BTreeMap<NaiveDate, i64>> = BTreeMap::new();
        for spread in spreads {
            let edges = deltas.entry(spread.metal()).or_default();
            for leg in spread.legs() {
                add_leg(edges, leg);
            }
        }

        let net: BTreeMap<Metal, Vec<ExposureRun>> = deltas
            .into_iter()
            .map(|(metal, edges)| (metal, runs(&edges)))
            .filter(|(_, runs)| !runs.is_empty())
            .collect();

        let mut exposures: Vec<(i64, i64)> = net
            .values()
            .flatten()
            .map(|r| (r.lots.saturating_abs(), r.days()))
            .collect();
        exposures.sort_unstable();

        let gross: Vec<f64> = net
            .values()
            .map(|runs| runs.iter().map(|r| r.lot_days() as f64).sum())
            .collect();
        let total: f64 = gross.iter().sum();
        let concentration_index = if total > 0.0 {
            gross.iter().map(|g| (g / total).powi(2)).sum::<f64>() * 100.0
        } else {
            0.0
        };

        Self {
            max_exposure: exposures.last().map(|&(lots, _)| lots).unwrap_or(0),
            var_95: percentile(&exposures, 0.95),
            concentration_index,
            net_by_metal: net,
        }
    }

    /// Net lots for `metal` on `date`.
    pub fn net_on(&self, metal: Metal, date: NaiveDate) -> i64 {
        let Some(runs) = self.net_by_metal.get(&metal) else {
            return 0;
        };
        let i = runs.partition_point(|r| r.end <= date);
        runs.get(i)
            .filter(|r| r.start <= date)
            .map(|r| r.lots)
            .unwrap_or(0)
    }

    /// Sum of absolute daily exposures for one metal, saturating.
    pub fn gross_lot_days(&self, metal: Metal) -> i64 {
        self.net_by_metal
            .get(&metal)
            .map(|runs| runs.iter().fold(0i64, |acc, r| acc.saturating_add(r.lot_days())))
            .unwrap_or(0)
    }

    pub fn is_flat(&self) -> bool {
        self.net_by_metal.is_empty()
    }
}

fn add_leg(edges: &mut BTreeMap<NaiveDate, i64>, leg: &Leg) {
    if leg.start_date() == leg.end_date() {
        return;
    }
    let lots = leg.direction().position_sign() * leg.lots();
    let open = edges.entry(leg.start_date()).or_insert(0);
    *open = open.saturating_add(lots);
    let close = edges.entry(leg.end_date()).or_insert(0);
    *close = close.saturating_sub(lots);
}

/// Accumulate boundary deltas into non-zero runs, merging touching runs
/// with the same net.
fn runs(edges: &BTreeMap<NaiveDate, i64>) -> Vec<ExposureRun> {
    let mut out: Vec<ExposureRun> = Vec::new();
    let mut net = 0i64;
    let mut from: Option<NaiveDate> = None;
    for (&date, &delta) in edges {
        if let Some(start) = from.filter(|_| net != 0) {
            match out.last_mut() {
                Some(last) if last.end == start && last.lots == net => last.end = date,
                _ => out.push(ExposureRun {
                    start,
                    end: date,
                    lots: net,
                }),
            }
        }
        net = net.saturating_add(delta);
        from = Some(date);
    }
    out
}

/// Percentile of `(value, weight)` pairs sorted by value, as if each value
/// were repeated `weight` times, interpolating between closest ranks.
fn percentile(sorted: &[(i64, i64)], q: f64) -> f64 {
    let count: i64 = sorted.iter().map(|&(_, w)| w).sum();
    if count <= 0 {
        return 0.0;
    }
    let value_at = |rank: i64| {
        let mut seen = 0;
        for &(value, weight) in sorted {
            seen += weight;
            if rank < seen {
                return value;
            }
        }
        sorted.last().map(|&(value, _)| value).unwrap_or(0)
    };
    let rank = q * (count - 1) as f64;
    let lo = value_at(rank.floor() as i64);
    let hi = value_at(rank.ceil() as i64);
    lo as f64 + (hi - lo) as f64 * rank.fract()
}

impl fmt::Display for ExposureAnalysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Exposure Analysis ===")?;
        writeln!(f, "Max Exposure:  {} lots", self.max_exposure)?;
        writeln!(f, "VaR (95%):     {:.1} lots", self.var_95)?;
        writeln!(f, "Concentration: {:.1}", self.concentration_index)?;

        for (metal, runs) in &self.net_by_metal {
            let (Some(first), Some(last)) = (runs.first(), runs.last()) else {
                continue;
            };
            let active: i64 = runs.iter().map(ExposureRun::days).sum();
            let peak = runs.iter().map(|r| r.lots.saturating_abs()).max().unwrap_or(0);
            writeln!(
                f,
                "\n--- {} ---\n  Active:  {} .. {} ({} days)\n  Peak:    {} lots",
                metal, first.start, last.end, active, peak
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::leg::Direction;
    use approx::assert_relative_eq;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, day).unwrap()
    }

    fn spread(metal: Metal, legs: &[(Direction, NaiveDate, NaiveDate, i64)]) -> Spread {
        let legs = legs
            .iter()
            .map(|&(dir, s, e, lots)| Leg::new(metal, dir, s, e, lots).unwrap())
            .collect();
        Spread::new(metal, legs, false, 0.0).unwrap()
    }

    #[test]
    fn test_net_on_day() {
        let spreads = [
            spread(Metal::Copper, &[(Direction::Borrow, d(4, 1), d(4, 11), 10)]),
            spread(Metal::Copper, &[(Direction::Lend, d(4, 6), d(4, 16), 4)]),
        ];
        let analysis = ExposureAnalysis::from_spreads(&spreads);
        assert_eq!(analysis.net_on(Metal::Copper, d(4, 1)), 10);
        assert_eq!(analysis.net_on(Metal::Copper, d(4, 6)), 6);
        assert_eq!(analysis.net_on(Metal::Copper, d(4, 11)), -4);
        assert_eq!(analysis.net_on(Metal::Copper, d(4, 16)), 0);
        assert_eq!(analysis.net_on(Metal::Copper, d(3, 31)), 0);
        assert_eq!(analysis.net_by_metal[&Metal::Copper].len(), 3);
        assert_eq!(analysis.max_exposure, 10);
        assert_relative_eq!(analysis.concentration_index, 100.0);
    }

    #[test]
    fn test_offsetting_legs_are_flat() {
        let spreads = [spread(
            Metal::Zinc,
            &[
                (Direction::Borrow, d(4, 1), d(5, 1), 10),
                (Direction::Lend, d(4, 1), d(5, 1), 10),
            ],
        )];
        let analysis = ExposureAnalysis::from_spreads(&spreads);
        assert!(analysis.is_flat());
        assert_eq!(analysis.max_exposure, 0);
        assert_eq!(analysis.var_95, 0.0);
        assert_eq!(analysis.concentration_index, 0.0);
    }

    #[test]
    fn test_back_to_back_legs_merge() {
        let spreads = [spread(
            Metal::Lead,
            &[
                (Direction::Borrow, d(4, 1), d(5, 1), 5),
                (Direction::Borrow, d(5, 1), d(6, 1), 5),
            ],
        )];
        let analysis = ExposureAnalysis::from_spreads(&spreads);
        assert_eq!(
            analysis.net_by_metal[&Metal::Lead],
            vec![ExposureRun {
                start: d(4, 1),
                end: d(6, 1),
                lots: 5
            }]
        );
    }

    #[test]
    fn test_concentration_across_metals() {
        let spreads = [
            spread(Metal::Copper, &[(Direction::Borrow, d(4, 1), d(4, 11), 10)]),
            spread(Metal::Tin, &[(Direction::Lend, d(4, 1), d(4, 11), 10)]),
        ];
        let analysis = ExposureAnalysis::from_spreads(&spreads);
        assert_relative_eq!(analysis.concentration_index, 50.0);
        assert_eq!(analysis.gross_lot_days(Metal::Tin), 100);
    }

    #[test]
    fn test_long_dated_leg_stays_compact() {
        let far = NaiveDate::from_ymd_opt(9999, 1, 1).unwrap();
        let spreads = [spread(
            Metal::Nickel,
            &[(Direction::Borrow, d(1, 1), far, i64::MAX)],
        )];
        let analysis = ExposureAnalysis::from_spreads(&spreads);
        assert_eq!(analysis.net_by_metal[&Metal::Nickel].len(), 1);
        assert_eq!(analysis.max_exposure, i64::MAX);
        assert_eq!(analysis.net_on(Metal::Nickel, d(6, 1)), i64::MAX);
        assert_eq!(analysis.gross_lot_days(Metal::Nickel), i64::MAX);
        assert_relative_eq!(analysis.concentration_index, 100.0);
    }

    #[test]
    fn test_percentile_interpolates() {
        let ones = |v: &[i64]| v.iter().map(|&x| (x, 1)).collect::<Vec<_>>();
        assert_relative_eq!(percentile(&ones(&[1, 2, 3, 4, 5]), 0.95), 4.8, epsilon = 1e-12);
        assert_relative_eq!(percentile(&[(7, 1)], 0.95), 7.0);
        assert_eq!(percentile(&[], 0.95), 0.0);
    }

    #[test]
    fn test_percentile_weights_by_days() {
        // Same as [1, 5, 5, 5, 5].
        let runs = [(1, 1), (5, 4)];
        assert_relative_eq!(percentile(&runs, 0.95), 5.0);
        assert_relative_eq!(percentile(&runs, 0.1), 2.6, epsilon = 1e-12);
    }
}
