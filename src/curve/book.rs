use crate::core::metal::Metal;
use crate::core::observation::ObservationSet;
use crate::curve::builder::CurveBuilder;
use crate::curve::daily_curve::DailyCurve;
use crate::curve::resolver::{Confidence, RateError, RateQuote, RateResolver};
use chrono::NaiveDate;
use rayon::prelude::*;
use std::collections::BTreeMap;

/// The latest curve snapshot for each metal.
///
/// Pricing and matching read from a book passed in by reference; replacing
/// a snapshot is the caller's job.
#[derive(Debug, Clone, Default)]
pub struct CurveBook {
    curves: BTreeMap<Metal, DailyCurve>,
}

/// Result of building a whole book: the book plus skipped rows per metal.
#[derive(Debug, Clone)]
pub struct BookBuild {
    pub book: CurveBook,
    pub skipped: BTreeMap<Metal, usize>,
}

impl BookBuild {
    pub fn total_skipped(&self) -> usize {
        self.skipped.values().sum()
    }
}

impl CurveBook {
    /// A book with no curves loaded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build one curve per observed metal, in parallel.
    pub fn build(set: &ObservationSet, builder: &CurveBuilder, snapshot: u64) -> BookBuild {
        let builds: Vec<_> = set
            .instruments()
            .into_par_iter()
            .map(|metal| (metal, builder.build_from_set(set, metal, snapshot)))
            .collect();

        let mut book = CurveBook::new();
        let mut skipped = BTreeMap::new();
        for (metal, build) in builds {
            skipped.insert(metal, build.skipped);
            book.insert(build.curve);
        }
        BookBuild { book, skipped }
    }

    /// Install a curve, returning the snapshot it supersedes.
    pub fn insert(&mut self, curve: DailyCurve) -> Option<DailyCurve> {
        self.curves.insert(curve.instrument(), curve)
    }

    pub fn get(&self, metal: Metal) -> Option<&DailyCurve> {
        self.curves.get(&metal)
    }

    pub fn curves(&self) -> impl Iterator<Item = &DailyCurve> {
        self.curves.values()
    }

    pub fn resolver(&self, metal: Metal) -> Option<RateResolver<'_>> {
        self.get(metal).map(RateResolver::new)
    }

    /// Snapshot id of the metal's curve, if one is loaded.
    pub fn snapshot(&self, metal: Metal) -> Option<u64> {
        self.get(metal).map(DailyCurve::snapshot)
    }

    /// Resolve against the metal's curve; a metal without a curve has no data.
    pub fn resolve(
        &self,
        metal: Metal,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<RateQuote, RateError> {
        match self.resolver(metal) {
            Some(resolver) => resolver.resolve(start, end),
            None if start == end => Ok(RateQuote {
                rate: 0.0,
                confidence: Confidence::Measured,
            }),
            None => Err(RateError::NoData),
        }
    }
}
