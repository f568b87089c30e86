//! Tidy-up search across trading cards.
//!
//! Three traders hold aluminium carries. Some offset exactly, some only
//! partly. The engine prices the cards and ranks the tidy-ups.

use carry_engine::config::TidyConfig;
use carry_engine::prelude::*;
use chrono::NaiveDate;

fn d(m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, m, day).expect("valid date")
}

fn position(near: NaiveDate, far: NaiveDate, lots: i64) -> Position {
    Position::new(Metal::Aluminum, near, far, lots).expect("valid position")
}

fn main() {
    println!("╔══════════════════════════════════════════╗");
    println!("║  carry-engine: Tidy Cards Example        ║");
    println!("╚══════════════════════════════════════════╝\n");

    let set: ObservationSet = vec![
        RateObservation::new(Metal::Aluminum, d(4, 1), d(7, 1), -0.40),
        RateObservation::new(Metal::Aluminum, d(7, 1), d(10, 1), -0.20),
    ]
    .into_iter()
    .collect();
    let book = CurveBook::build(&set, &CurveBuilder::default(), 1).book;

    let mut cards = vec![
        TradingCard {
            owner: TraderId::new("ALICE"),
            positions: vec![position(d(4, 1), d(7, 1), -100), position(d(7, 1), d(10, 1), 30)],
        },
        TradingCard {
            owner: TraderId::new("BOB"),
            positions: vec![position(d(5, 1), d(8, 1), 50), position(d(7, 1), d(10, 1), -30)],
        },
        TradingCard {
            owner: TraderId::new("CAROL"),
            positions: vec![position(d(4, 15), d(6, 1), 8)],
        },
    ];

    println!("━━━ Trading Cards ━━━\n");
    for card in &mut cards {
        let priced = card.apply_rates(&book);
        println!(
            "{:<6} net {:>5} lots, {} positions ({} priced)",
            card.owner,
            card.net_position(),
            card.positions.len(),
            priced
        );
    }
    println!();

    println!("━━━ All Tidy-ups ━━━\n");
    print!("{}", TidyFinder::default().find(&cards));

    println!("\n━━━ At Least 10 Lots ━━━\n");
    let finder = TidyFinder::new(TidyConfig {
        min_lots: 10,
        ..TidyConfig::default()
    });
    print!("{}", finder.find(&cards));
}
