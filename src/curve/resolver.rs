use crate::core::calendar::days_between;
use crate::curve::daily_curve::DailyCurve;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use thiserror::Error;

/// Outcomes of a rate lookup other than a fully measured average.
///
/// `PartialCoverage` and `Interpolated` still carry a usable rate; callers
/// decide whether to trust it. `NoData` and `InvalidRange` carry nothing.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum RateError {
    #[error("no rate data for the instrument")]
    NoData,
    #[error("only {covered_days} of {total_days} days covered (average {rate})")]
    PartialCoverage {
        rate: f64,
        covered_days: i64,
        total_days: i64,
    },
    #[error("window not covered; closest-duration fallback gives {0}")]
    Interpolated(f64),
    #[error("end {end} precedes start {start}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },
}

impl RateError {
    /// The rate still available despite the error, if any.
    pub fn fallback_rate(&self) -> Option<f64> {
        match *self {
            RateError::PartialCoverage { rate, .. } | RateError::Interpolated(rate) => Some(rate),
            RateError::NoData | RateError::InvalidRange { .. } => None,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.fallback_rate().is_none()
    }
}

/// How much of a quoted rate was actually observed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Confidence {
    Measured,
    Partial { covered_days: i64, total_days: i64 },
    Interpolated,
}

/// A per-day rate with its provenance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateQuote {
    pub rate: f64,
    pub confidence: Confidence,
}

impl RateQuote {
    /// Fraction of the window backed by observed days.
    pub fn coverage(&self) -> f64 {
        match self.confidence {
            Confidence::Measured => 1.0,
            Confidence::Partial {
                covered_days,
                total_days,
            } => covered_days as f64 / total_days as f64,
            Confidence::Interpolated => 0.0,
        }
    }

    pub fn is_measured(&self) -> bool {
        self.confidence == Confidence::Measured
    }
}

/// Answers per-day rate questions against one curve snapshot.
#[derive(Debug, Clone, Copy)]
pub struct RateResolver<'a> {
    curve: &'a DailyCurve,
}

impl<'a> RateResolver<'a> {
    /// A resolver bound to one curve snapshot.
    pub fn new(curve: &'a DailyCurve) -> Self {
        Self { curve }
    }

    pub fn curve(&self) -> &'a DailyCurve {
        self.curve
    }

    /// Arithmetic mean of the per-day rates over `[start, end)`.
    ///
    /// - A zero-length window carries nothing and returns `Ok(0.0)`.
    /// - A fully covered window returns the mean.
    /// - A partly covered window averages only the covered days and reports
    ///   [`RateError::PartialCoverage`].
    /// - A window with no covered day falls back to the observation whose
    ///   duration is closest to the window's, as [`RateError::Interpolated`].
    /// - An instrument with no observations at all gives [`RateError::NoData`].
    pub fn average_rate(&self, start: NaiveDate, end: NaiveDate) -> Result<f64, RateError> {
        if start == end {
            return Ok(0.0);
        }
        if end < start {
            return Err(RateError::InvalidRange { start, end });
        }
        if self.curve.is_empty() {
            return Err(RateError::NoData);
        }

        let total_days = days_between(start, end);
        let (sum, covered_days) = self.curve.index().sum_over(start, end);
        if covered_days == total_days {
            return Ok(sum / total_days as f64);
        }
        if covered_days > 0 {
            return Err(RateError::PartialCoverage {
                rate: sum / covered_days as f64,
                covered_days,
                total_days,
            });
        }
        match self.closest_duration_rate(total_days) {
            Some(rate) => Err(RateError::Interpolated(rate)),
            None => Err(RateError::NoData),
        }
    }

    /// Like [`average_rate`](Self::average_rate), folding the informational
    /// outcomes into a [`RateQuote`].
    pub fn resolve(&self, start: NaiveDate, end: NaiveDate) -> Result<RateQuote, RateError> {
        match self.average_rate(start, end) {
            Ok(rate) => Ok(RateQuote {
                rate,
                confidence: Confidence::Measured,
            }),
            Err(RateError::PartialCoverage {
                rate,
                covered_days,
                total_days,
            }) => Ok(RateQuote {
                rate,
                confidence: Confidence::Partial {
                    covered_days,
                    total_days,
                },
            }),
            Err(RateError::Interpolated(rate)) => Ok(RateQuote {
                rate,
                confidence: Confidence::Interpolated,
            }),
            Err(err) => Err(err),
        }
    }

    /// Rate of the observed range whose length is closest to `span_days`,
    /// most recent first on ties.
    fn closest_duration_rate(&self, span_days: i64) -> Option<f64> {
        self.curve
            .sources()
            .iter()
            .min_by_key(|r| ((r.span_days() - span_days).abs(), Reverse(r.recency)))
            .map(|r| r.rate)
    }
}
