use crate::core::calendar::days_between;
use crate::core::metal::Metal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A maximal run of consecutive days sharing one rate, `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub rate: f64,
}

impl Segment {
    pub fn days(&self) -> i64 {
        days_between(self.start, self.end)
    }
}

/// Covered days of a curve collapsed into sorted, non-overlapping segments.
///
/// Gaps in the curve are gaps between segments. Lookups binary-search on
/// segment ends.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentIndex {
    segments: Vec<Segment>,
}

impl SegmentIndex {
    /// Collapse sorted, non-overlapping runs, merging touching runs that
    /// share a rate.
    pub(crate) fn from_runs<I>(runs: I) -> Self
    where
        I: IntoIterator<Item = Segment>,
    {
        let mut segments: Vec<Segment> = Vec::new();
        for run in runs {
            match segments.last_mut() {
                // Bitwise equality: two distinct observations with the
                // same value still merge into one run.
                Some(last) if last.end == run.start && last.rate.to_bits() == run.rate.to_bits() => {
                    last.end = run.end;
                }
                _ => segments.push(run),
            }
        }
        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    fn first_ending_after(&self, date: NaiveDate) -> usize {
        self.segments.partition_point(|s| s.end <= date)
    }

    /// Segment covering `date`, if any.
    pub fn segment_at(&self, date: NaiveDate) -> Option<&Segment> {
        self.segments
            .get(self.first_ending_after(date))
            .filter(|s| s.start <= date)
    }

    /// Segments intersecting `[start, end)`, in date order.
    pub fn segments_touching(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> impl Iterator<Item = &Segment> {
        self.segments[self.first_ending_after(start)..]
            .iter()
            .take_while(move |s| s.start < end)
    }

    /// Sum of per-day rates over the covered days of `[start, end)`, and the
    /// number of covered days.
    pub fn sum_over(&self, start: NaiveDate, end: NaiveDate) -> (f64, i64) {
        self.segments_touching(start, end)
            .fold((0.0, 0), |(sum, days), s| {
                let n = days_between(s.start.max(start), s.end.min(end));
                (sum + s.rate * n as f64, days + n)
            })
    }
}

/// An observation that survived reconciliation, kept for fallback lookups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub rate: f64,
    /// Ingestion order; larger is more recent.
    pub recency: (u64, usize),
}

impl ObservedRange {
    pub fn span_days(&self) -> i64 {
        days_between(self.start, self.end)
    }
}

/// One day of a [`DailyCurve::breakdown`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DayValue {
    pub date: NaiveDate,
    /// `None` for a gap.
    pub rate: Option<f64>,
    /// Running total of rates from the first day of the breakdown.
    pub cumulative: f64,
}

/// Reconciled day-by-day rates for one instrument.
///
/// Spans `[first observed start, last observed end)`. Days inside that
/// window with no observation are gaps and stay `None`; they are never
/// filled with zero. Rates are held as segments only, so memory follows
/// the number of observations rather than the length of the window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyCurve {
    instrument: Metal,
    snapshot: u64,
    window: Option<(NaiveDate, NaiveDate)>,
    index: SegmentIndex,
    sources: Vec<ObservedRange>,
}

impl DailyCurve {
    pub(crate) fn from_segments(
        instrument: Metal,
        snapshot: u64,
        window: (NaiveDate, NaiveDate),
        index: SegmentIndex,
        sources: Vec<ObservedRange>,
    ) -> Self {
        Self {
            instrument,
            snapshot,
            window: Some(window),
            index,
            sources,
        }
    }

    /// A curve with no data at all.
    pub fn empty(instrument: Metal, snapshot: u64) -> Self {
        Self {
            instrument,
            snapshot,
            window: None,
            index: SegmentIndex::default(),
            sources: Vec::new(),
        }
    }

    pub fn instrument(&self) -> Metal {
        self.instrument
    }

    pub fn snapshot(&self) -> u64 {
        self.snapshot
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// First day of the curve window.
    pub fn start(&self) -> Option<NaiveDate> {
        self.window.map(|(start, _)| start)
    }

    /// Exclusive end of the curve window.
    pub fn end(&self) -> Option<NaiveDate> {
        self.window.map(|(_, end)| end)
    }

    pub fn index(&self) -> &SegmentIndex {
        &self.index
    }

    /// Observations that survived reconciliation.
    pub fn sources(&self) -> &[ObservedRange] {
        &self.sources
    }

    /// Rate assigned to `date`, or `None` for gaps and days outside the window.
    pub fn rate_on(&self, date: NaiveDate) -> Option<f64> {
        self.index.segment_at(date).map(|s| s.rate)
    }

    pub fn covers(&self, date: NaiveDate) -> bool {
        self.rate_on(date).is_some()
    }

    pub fn covered_days(&self) -> usize {
        self.index.segments().iter().map(|s| s.days() as usize).sum()
    }

    /// Covered days with their rates, in date order.
    pub fn days(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.index.segments().iter().flat_map(|s| {
            s.start
                .iter_days()
                .take_while(move |d| *d < s.end)
                .map(move |d| (d, s.rate))
        })
    }

    /// Uncovered runs inside the curve window.
    pub fn gaps(&self) -> Vec<(NaiveDate, NaiveDate)> {
        self.index
            .segments()
            .windows(2)
            .filter(|w| w[0].end < w[1].start)
            .map(|w| (w[0].end, w[1].start))
            .collect()
    }

    /// Day-by-day rates over `[start, end)` with a running total.
    pub fn breakdown(&self, start: NaiveDate, end: NaiveDate) -> Vec<DayValue> {
        let mut cumulative = 0.0;
        start
            .iter_days()
            .take_while(|d| *d < end)
            .map(|date| {
                let rate = self.rate_on(date);
                cumulative += rate.unwrap_or(0.0);
                DayValue {
                    date,
                    rate,
                    cumulative,
                }
            })
            .collect()
    }
}

impl fmt::Display for DailyCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== {} curve (snapshot {}) ===", self.instrument, self.snapshot)?;
        match (self.start(), self.end()) {
            (Some(start), Some(end)) => writeln!(f, "Window:   {} .. {}", start, end)?,
            _ => return writeln!(f, "No data."),
        }
        writeln!(f, "Covered:  {} days", self.covered_days())?;
        writeln!(f, "Segments: {}", self.index.len())?;
        for s in self.index.segments() {
            writeln!(f, "  {} .. {}  {:>4}d  {:+.4}/day", s.start, s.end, s.days(), s.rate)?;
        }
        let gaps = self.gaps();
        if !gaps.is_empty() {
            writeln!(f, "Gaps:")?;
            for (start, end) in gaps {
                writeln!(f, "  {} .. {}", start, end)?;
            }
        }
        Ok(())
    }
}
