use crate::config::CurveConfig;
use crate::core::metal::Metal;
use crate::core::observation::{ObservationSet, RateObservation};
use crate::curve::daily_curve::{DailyCurve, ObservedRange, Segment, SegmentIndex};
use chrono::NaiveDate;
use std::cmp::Reverse;
use std::collections::BTreeSet;
use std::fmt;

/// A reconciled curve together with the number of observations skipped
/// while building it.
#[derive(Debug, Clone)]
pub struct CurveBuild {
    pub curve: DailyCurve,
    pub skipped: usize,
}

impl fmt::Display for CurveBuild {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.curve)?;
        writeln!(f, "Skipped:  {} observations", self.skipped)
    }
}

/// Reconciles overlapping, redundant or conflicting observations into a
/// [`DailyCurve`].
///
/// # Algorithm
///
/// 1. Drop malformed rows (`start >= end`, non-finite rate) and rows
///    spanning more than `max_span_days`; count them.
/// 2. Each covered day takes the rate of the narrowest observation covering
///    it. Among equally narrow observations the most recently ingested wins.
/// 3. Days inside the window that no observation covers remain gaps.
///
/// Winners are found by sweeping the range boundaries with the open ranges
/// kept in an ordered set, so the cost is `O(n log n)` in the number of
/// observations and independent of how far apart they lie.
#[derive(Debug, Clone)]
pub struct CurveBuilder {
    max_span_days: i64,
}

impl Default for CurveBuilder {
    fn default() -> Self {
        Self::new(&CurveConfig::default())
    }
}

impl CurveBuilder {
    /// A builder enforcing `config.max_span_days`.
    pub fn new(config: &CurveConfig) -> Self {
        Self {
            max_span_days: config.max_span_days,
        }
    }

    /// Build the curve for `instrument` from every matching observation in
    /// the set.
    pub fn build_from_set(&self, set: &ObservationSet, instrument: Metal, snapshot: u64) -> CurveBuild {
        self.build(instrument, snapshot, set.for_instrument(instrument))
    }

    /// Build a curve from observations of one instrument.
    ///
    /// Observations of any other instrument are skipped like malformed rows.
    pub fn build<'a, I>(&self, instrument: Metal, snapshot: u64, observations: I) -> CurveBuild
    where
        I: IntoIterator<Item = &'a RateObservation>,
    {
        let mut skipped = 0;
        let mut accepted: Vec<ObservedRange> = Vec::new();

        for (order, ob) in observations.into_iter().enumerate() {
            if ob.instrument != instrument {
                log::warn!(
                    "skipping {} observation {}..{} while building {} curve",
                    ob.instrument,
                    ob.start,
                    ob.end,
                    instrument
                );
                skipped += 1;
                continue;
            }
            if let Err(err) = ob.validate() {
                log::warn!("skipping observation: {err}");
                skipped += 1;
                continue;
            }
            if ob.span_days() > self.max_span_days {
                log::warn!(
                    "skipping {} observation {}..{}: {} days exceeds limit of {}",
                    instrument,
                    ob.start,
                    ob.end,
                    ob.span_days(),
                    self.max_span_days
                );
                skipped += 1;
                continue;
            }
            accepted.push(ObservedRange {
                start: ob.start,
                end: ob.end,
                rate: ob.daily_rate,
                recency: (ob.seq, order),
            });
        }

        // Presentation order: by start, narrower first.
        accepted.sort_by_key(|r| (r.start, r.span_days(), r.recency));

        let (Some(origin), Some(end)) = (
            accepted.iter().map(|r| r.start).min(),
            accepted.iter().map(|r| r.end).max(),
        ) else {
            log::debug!("{instrument}: no usable observations ({skipped} skipped)");
            return CurveBuild {
                curve: DailyCurve::empty(instrument, snapshot),
                skipped,
            };
        };

        let index = SegmentIndex::from_runs(sweep(&accepted));
        let curve = DailyCurve::from_segments(instrument, snapshot, (origin, end), index, accepted);
        log::debug!(
            "{instrument}: built curve {}..{} with {} covered days, {} segments, {} gaps ({skipped} skipped)",
            origin,
            end,
            curve.covered_days(),
            curve.index().len(),
            curve.gaps().len(),
        );
        CurveBuild { curve, skipped }
    }
}

/// Walk the distinct range boundaries in order, keeping the observations
/// open at each boundary ranked by (span, most recent first). Each stretch
/// between two boundaries takes the rate of the top-ranked open range.
fn sweep(ranges: &[ObservedRange]) -> Vec<Segment> {
    let key = |i: usize| (ranges[i].span_days(), Reverse(ranges[i].recency), i);

    let mut by_start: Vec<usize> = (0..ranges.len()).collect();
    by_start.sort_by_key(|&i| ranges[i].start);
    let mut by_end = by_start.clone();
    by_end.sort_by_key(|&i| ranges[i].end);

    let mut bounds: Vec<NaiveDate> = ranges.iter().flat_map(|r| [r.start, r.end]).collect();
    bounds.sort_unstable();
    bounds.dedup();

    let mut open = BTreeSet::new();
    let (mut next_start, mut next_end) = (0, 0);
    let mut runs = Vec::new();
    for pair in bounds.windows(2) {
        let (from, to) = (pair[0], pair[1]);
        while let Some(&i) = by_end.get(next_end).filter(|&&i| ranges[i].end <= from) {
            open.remove(&key(i));
            next_end += 1;
        }
        while let Some(&i) = by_start.get(next_start).filter(|&&i| ranges[i].start <= from) {
            open.insert(key(i));
            next_start += 1;
        }
        if let Some(&(_, _, i)) = open.first() {
            runs.push(Segment {
                start: from,
                end: to,
                rate: ranges[i].rate,
            });
        }
    }
    runs
}
