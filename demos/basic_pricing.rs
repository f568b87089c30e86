//! Curve reconciliation and spread pricing example.
//!
//! Three overlapping documents quote copper carries. The engine reconciles
//! them into one daily curve and values a two-leg spread against it.

use carry_engine::prelude::*;
use chrono::NaiveDate;

fn d(m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, m, day).expect("valid date")
}

fn main() {
    println!("╔══════════════════════════════════════════╗");
    println!("║  carry-engine: Basic Pricing Example     ║");
    println!("╚══════════════════════════════════════════╝\n");

    // --- Step 1: Ingest observations ---
    println!("━━━ Step 1: Observations ━━━\n");

    let mut set = ObservationSet::new();
    let rejected = set.extend_lossy(vec![
        // Broad cash-to-3s figure from the morning sheet.
        RateObservation::new(Metal::Copper, d(4, 16), d(7, 16), -0.25).with_source("morning.pdf"),
        // A detailed split inside it.
        RateObservation::new(Metal::Copper, d(5, 21), d(6, 18), -0.60).with_source("split.pdf"),
        // A later correction of the same split.
        RateObservation::new(Metal::Copper, d(5, 21), d(6, 18), -0.55).with_source("update.pdf"),
        // A garbled row.
        RateObservation::new(Metal::Copper, d(6, 18), d(5, 21), -0.55),
    ]);
    println!("Accepted: {}  Rejected: {}\n", set.len(), rejected);

    // --- Step 2: Build the curve ---
    println!("━━━ Step 2: Daily Curve ━━━\n");

    let built = CurveBook::build(&set, &CurveBuilder::default(), 1);
    let book = built.book;
    if let Some(curve) = book.get(Metal::Copper) {
        println!("{}", curve);
    }

    // --- Step 3: Price a spread ---
    println!("━━━ Step 3: Spread Valuation ━━━\n");

    let legs = vec![
        Leg::new(Metal::Copper, Direction::Borrow, d(4, 16), d(5, 21), 50).expect("valid leg"),
        Leg::new(Metal::Copper, Direction::Lend, d(5, 21), d(7, 16), 50).expect("valid leg"),
    ];
    let mut spread = Spread::new(Metal::Copper, legs, false, 1_000.0).expect("valid spread");

    let pricer = SpreadPricer::new(&book);
    let valuation = pricer.price_in_place(&mut spread);
    println!("{}", valuation);

    for offer in [valuation.total_pnl - 500.0, valuation.total_pnl - 1_500.0] {
        println!(
            "Offer {:>10.2}: within limits = {}",
            offer,
            spread.within_constraints(offer)
        );
    }
}
