use crate::core::calendar::days_between;
use crate::core::metal::Metal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejections raised while ingesting or validating observations.
///
/// None of these is fatal to a batch: callers count them and carry on.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ObservationError {
    #[error("malformed observation for {instrument}: start {start} is not before end {end}")]
    MalformedObservation {
        instrument: Metal,
        start: NaiveDate,
        end: NaiveDate,
    },
    #[error("observation for {instrument} {start}..{end} has non-finite rate {rate}")]
    NonFiniteRate {
        instrument: Metal,
        start: NaiveDate,
        end: NaiveDate,
        rate: f64,
    },
}

/// A per-day rate observed for `[start, end)` on one instrument.
///
/// Observations come from external documents and may overlap, duplicate or
/// contradict each other. `seq` records ingestion order so later documents
/// can win ties against earlier ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateObservation {
    pub instrument: Metal,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub daily_rate: f64,
    /// Ingestion sequence number, assigned by [`ObservationSet::add`].
    #[serde(default)]
    pub seq: u64,
    /// Document or feed the value was harvested from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl RateObservation {
    /// An unsequenced observation; [`ObservationSet::add`] assigns `seq`.
    pub fn new(instrument: Metal, start: NaiveDate, end: NaiveDate, daily_rate: f64) -> Self {
        Self {
            instrument,
            start,
            end,
            daily_rate,
            seq: 0,
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Length of the observed range in calendar days.
    pub fn span_days(&self) -> i64 {
        days_between(self.start, self.end)
    }

    /// Whether the range intersects `[start, end)`.
    pub fn touches(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.start < end && start < self.end
    }

    pub fn validate(&self) -> Result<(), ObservationError> {
        if self.start >= self.end {
            return Err(ObservationError::MalformedObservation {
                instrument: self.instrument,
                start: self.start,
                end: self.end,
            });
        }
        if !self.daily_rate.is_finite() {
            return Err(ObservationError::NonFiniteRate {
                instrument: self.instrument,
                start: self.start,
                end: self.end,
                rate: self.daily_rate,
            });
        }
        Ok(())
    }
}

/// Append-only store of raw observations across instruments.
///
/// Ingestion only rejects ranges with `start >= end`. Duplicates and
/// conflicts are kept; reconciling them is the curve builder's job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservationSet {
    observations: Vec<RateObservation>,
    next_seq: u64,
    rejected: usize,
}

impl ObservationSet {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an observation, stamping its ingestion sequence.
    ///
    /// Malformed ranges are dropped with a warning and counted in
    /// [`ObservationSet::rejected`].
    pub fn add(&mut self, mut observation: RateObservation) -> Result<u64, ObservationError> {
        if observation.start >= observation.end {
            let err = ObservationError::MalformedObservation {
                instrument: observation.instrument,
                start: observation.start,
                end: observation.end,
            };
            log::warn!("dropping observation: {err}");
            self.rejected += 1;
            return Err(err);
        }
        self.next_seq += 1;
        observation.seq = self.next_seq;
        self.observations.push(observation);
        Ok(self.next_seq)
    }

    /// Append a batch, returning how many rows were rejected.
    pub fn extend_lossy<I>(&mut self, batch: I) -> usize
    where
        I: IntoIterator<Item = RateObservation>,
    {
        batch
            .into_iter()
            .map(|ob| self.add(ob))
            .filter(Result::is_err)
            .count()
    }

    pub fn observations(&self) -> &[RateObservation] {
        &self.observations
    }

    pub fn for_instrument(&self, instrument: Metal) -> impl Iterator<Item = &RateObservation> {
        self.observations
            .iter()
            .filter(move |ob| ob.instrument == instrument)
    }

    /// Observations of `instrument` whose range intersects `[start, end)`.
    pub fn observations_touching(
        &self,
        instrument: Metal,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Vec<&RateObservation> {
        self.for_instrument(instrument)
            .filter(|ob| ob.touches(start, end))
            .collect()
    }

    /// All instruments with at least one observation, sorted.
    pub fn instruments(&self) -> Vec<Metal> {
        let mut instruments: Vec<Metal> = self.observations.iter().map(|o| o.instrument).collect();
        instruments.sort();
        instruments.dedup();
        instruments
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Rows dropped at ingestion.
    pub fn rejected(&self) -> usize {
        self.rejected
    }
}

impl FromIterator<RateObservation> for ObservationSet {
    fn from_iter<T: IntoIterator<Item = RateObservation>>(iter: T) -> Self {
        let mut set = ObservationSet::new();
        set.extend_lossy(iter);
        set
    }
}
