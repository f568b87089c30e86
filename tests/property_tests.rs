use carry_engine::config::TidyConfig;
use carry_engine::core::leg::{Direction, Leg};
use carry_engine::core::metal::Metal;
use carry_engine::core::observation::{ObservationSet, RateObservation};
use carry_engine::core::position::{Position, TradingCard};
use carry_engine::core::trader::TraderId;
use carry_engine::curve::book::CurveBook;
use carry_engine::curve::builder::CurveBuilder;
use carry_engine::curve::resolver::RateResolver;
use carry_engine::core::spread::Spread;
use carry_engine::matching::exposure::ExposureAnalysis;
use carry_engine::matching::tidy::{TidyFinder, TidyTerms};
use carry_engine::pricing::spread_pricer::SpreadPricer;
use chrono::{Days, NaiveDate};
use proptest::prelude::*;
use std::collections::BTreeSet;

fn base() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
}

fn day(offset: u64) -> NaiveDate {
    base() + Days::new(offset)
}

/// A well-formed range `[start, end)` within roughly a year and a half.
fn arb_range() -> impl Strategy<Value = (NaiveDate, NaiveDate)> {
    (0u64..400, 1u64..150).prop_map(|(start, len)| (day(start), day(start + len)))
}

/// Rates on a coarse grid so equal values actually collide.
fn arb_rate() -> impl Strategy<Value = f64> {
    (-40i32..40).prop_map(|r| r as f64 / 40.0)
}

fn arb_metal() -> impl Strategy<Value = Metal> {
    prop::sample::select(Metal::ALL.to_vec())
}

fn arb_direction() -> impl Strategy<Value = Direction> {
    prop::sample::select(vec![Direction::Borrow, Direction::Lend])
}

fn arb_observations() -> impl Strategy<Value = Vec<RateObservation>> {
    prop::collection::vec(
        (arb_range(), arb_rate())
            .prop_map(|((s, e), r)| RateObservation::new(Metal::Copper, s, e, r)),
        1..25,
    )
}

fn arb_position() -> impl Strategy<Value = Position> {
    (arb_metal(), arb_range(), 1i64..200, any::<bool>(), prop::option::of(arb_rate())).prop_map(
        |(metal, (near, far), lots, short, rate)| {
            let lots = if short { -lots } else { lots };
            Position::new(metal, near, far, lots).unwrap().with_rate(rate)
        },
    )
}

fn arb_cards() -> impl Strategy<Value = Vec<TradingCard>> {
    prop::collection::vec(prop::collection::vec(arb_position(), 0..8), 1..5).prop_map(|books| {
        books
            .into_iter()
            .enumerate()
            .map(|(i, positions)| TradingCard {
                owner: TraderId::new(format!("T{}", i)),
                positions,
            })
            .collect()
    })
}

fn flat_book(metal: Metal, rate: f64) -> CurveBook {
    let set: ObservationSet =
        std::iter::once(RateObservation::new(metal, day(0), day(700), rate)).collect();
    CurveBook::build(&set, &CurveBuilder::default(), 1).book
}

proptest! {
    // The curve covers exactly the days some observation covers.
    #[test]
    fn curve_domain_is_union_of_observed_days(obs in arb_observations()) {
        let expected: BTreeSet<NaiveDate> = obs
            .iter()
            .flat_map(|o| o.start.iter_days().take_while(move |d| *d < o.end))
            .collect();

        let set: ObservationSet = obs.into_iter().collect();
        let built = CurveBuilder::default().build_from_set(&set, Metal::Copper, 1);
        let covered: BTreeSet<NaiveDate> = built.curve.days().map(|(d, _)| d).collect();

        prop_assert_eq!(built.skipped, 0);
        prop_assert_eq!(&covered, &expected);
        prop_assert_eq!(built.curve.covered_days(), expected.len());
    }

    // Every covered day takes the rate of the latest of the narrowest
    // observations covering it.
    #[test]
    fn each_day_takes_narrowest_rate(obs in arb_observations()) {
        let set: ObservationSet = obs.iter().cloned().collect();
        let curve = CurveBuilder::default().build_from_set(&set, Metal::Copper, 1).curve;
        for (date, rate) in curve.days() {
            let covering: Vec<&RateObservation> =
                obs.iter().filter(|o| o.start <= date && date < o.end).collect();
            let narrowest = covering.iter().map(|o| o.span_days()).min().unwrap();
            let winner = covering.iter().rev().find(|o| o.span_days() == narrowest).unwrap();
            prop_assert_eq!(winner.daily_rate, rate);
        }
    }

    #[test]
    fn zero_span_average_is_zero(obs in arb_observations(), offset in 0u64..800) {
        let set: ObservationSet = obs.into_iter().collect();
        let curve = CurveBuilder::default().build_from_set(&set, Metal::Copper, 1).curve;
        let d = day(offset);
        prop_assert_eq!(RateResolver::new(&curve).average_rate(d, d), Ok(0.0));
    }

    #[test]
    fn pricing_is_linear_in_lots(
        metal in arb_metal(),
        direction in arb_direction(),
        (start, end) in arb_range(),
        rate in arb_rate(),
        lots in 1i64..500,
    ) {
        let book = flat_book(metal, rate);
        let pricer = SpreadPricer::new(&book);
        let single = pricer.price_leg(&Leg::new(metal, direction, start, end, lots).unwrap());
        let double = pricer.price_leg(&Leg::new(metal, direction, start, end, 2 * lots).unwrap());
        prop_assert!((double.pnl - 2.0 * single.pnl).abs() <= 1e-9 * single.pnl.abs().max(1.0));
    }

    #[test]
    fn borrow_is_negated_lend(
        metal in arb_metal(),
        (start, end) in arb_range(),
        rate in arb_rate(),
        lots in 1i64..500,
    ) {
        let book = flat_book(metal, rate);
        let pricer = SpreadPricer::new(&book);
        let borrow = pricer.price_leg(&Leg::new(metal, Direction::Borrow, start, end, lots).unwrap());
        let lend = pricer.price_leg(&Leg::new(metal, Direction::Lend, start, end, lots).unwrap());
        prop_assert_eq!(borrow.pnl, -lend.pnl);
    }

    #[test]
    fn tidy_terms_are_symmetric(a in arb_position(), b in arb_position()) {
        prop_assert_eq!(TidyTerms::between(&a, &b), TidyTerms::between(&b, &a));
    }

    #[test]
    fn exact_opposites_are_level_carries(
        metal in arb_metal(),
        (near, far) in arb_range(),
        lots in 1i64..200,
        rate in prop::option::of(arb_rate()),
    ) {
        let short = Position::new(metal, near, far, -lots).unwrap().with_rate(rate);
        let long = Position::new(metal, near, far, lots).unwrap();
        let terms = TidyTerms::between(&short, &long).unwrap();
        prop_assert!(terms.is_level_carry);
        prop_assert_eq!(terms.payment, Some(0.0));

        // Level carries survive any filter.
        let strict = TidyConfig { min_lots: 10_000, max_payment: Some(-1e12), ..TidyConfig::default() };
        prop_assert!(terms.passes(&strict));
    }

    #[test]
    fn indexed_tidy_search_matches_exhaustive(cards in arb_cards(), min_lots in 0i64..50) {
        let finder = TidyFinder::new(TidyConfig { min_lots, ..TidyConfig::default() });
        let fast = finder.find(&cards);
        let slow = finder.find_exhaustive(&cards);
        prop_assert_eq!(fast.total, slow.total);
        prop_assert_eq!(fast.candidates, slow.candidates);
    }

    #[test]
    fn tidy_ranking_puts_level_carries_first(cards in arb_cards()) {
        let search = TidyFinder::default().find(&cards);
        let first_partial = search
            .candidates
            .iter()
            .position(|c| !c.is_level_carry())
            .unwrap_or(search.candidates.len());
        prop_assert!(search.candidates[first_partial..].iter().all(|c| !c.is_level_carry()));

        let payments: Vec<f64> = search.candidates[first_partial..]
            .iter()
            .map_while(|c| c.payment())
            .collect();
        prop_assert!(payments.windows(2).all(|w| w[0] <= w[1]));
    }

    // Run-based exposure agrees with summing legs day by day.
    #[test]
    fn exposure_runs_match_daily_sum(
        legs in prop::collection::vec((arb_direction(), arb_range(), 1i64..50), 1..10),
        offset in 0u64..600,
    ) {
        let legs: Vec<Leg> = legs
            .into_iter()
            .map(|(dir, (s, e), lots)| Leg::new(Metal::Copper, dir, s, e, lots).unwrap())
            .collect();
        let date = day(offset);
        let expected: i64 = legs
            .iter()
            .filter(|l| l.start_date() <= date && date < l.end_date())
            .map(|l| l.direction().position_sign() * l.lots())
            .sum();

        let spread = Spread::new(Metal::Copper, legs, false, 0.0).unwrap();
        let analysis = ExposureAnalysis::from_spreads(std::iter::once(&spread));
        prop_assert_eq!(analysis.net_on(Metal::Copper, date), expected);
        prop_assert!(analysis.var_95 <= analysis.max_exposure as f64);
    }
}
