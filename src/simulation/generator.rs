//! Synthetic market data for demos, benchmarks and load testing.
//!
//! Every date lands on an LME monthly prompt date, matching how carries
//! are actually quoted.

use crate::core::calendar::prompt_dates;
use crate::core::leg::{Direction, Leg};
use crate::core::metal::Metal;
use crate::core::observation::{ObservationSet, RateObservation};
use crate::core::position::{Position, TradingCard};
use crate::core::spread::{Interest, Spread};
use crate::core::trader::TraderId;
use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Shape of a generated market.
#[derive(Debug, Clone)]
pub struct MarketConfig {
    pub metals: Vec<Metal>,
    /// First calendar year of prompt dates.
    pub start_year: i32,
    /// Number of years of prompt dates.
    pub years: i32,
    pub observations_per_metal: usize,
    pub traders: usize,
    pub positions_per_trader: usize,
    pub interests: usize,
    /// Largest lot size of a generated position or leg.
    pub max_lots: i64,
    /// Largest absolute per-day rate.
    pub max_rate: f64,
    /// Fixed seed for reproducible output; `None` draws from entropy.
    pub seed: Option<u64>,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            metals: Metal::ALL.to_vec(),
            start_year: 2025,
            years: 2,
            observations_per_metal: 12,
            traders: 5,
            positions_per_trader: 6,
            interests: 10,
            max_lots: 100,
            max_rate: 1.0,
            seed: None,
        }
    }
}

/// A generated market.
#[derive(Debug, Clone, Default)]
pub struct SyntheticMarket {
    pub observations: ObservationSet,
    pub cards: Vec<TradingCard>,
    pub interests: Vec<Interest>,
}

/// Random observations, trading cards and interests.
pub fn generate_market(config: &MarketConfig) -> SyntheticMarket {
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let prompts: Vec<NaiveDate> = (config.start_year..config.start_year + config.years)
        .flat_map(prompt_dates)
        .collect();
    if prompts.len() < 2 || config.metals.is_empty() {
        log::warn!("not enough prompt dates or metals to generate a market");
        return SyntheticMarket::default();
    }

    let draw = Generator {
        prompts: &prompts,
        config,
    };

    let mut observations = ObservationSet::new();
    for &metal in &config.metals {
        for _ in 0..config.observations_per_metal {
            let (start, end) = draw.carry(&mut rng);
            let ob = RateObservation::new(metal, start, end, draw.rate(&mut rng))
                .with_source("synthetic");
            // carry() always yields start < end
            let _ = observations.add(ob);
        }
    }

    let traders: Vec<TraderId> = (0..config.traders)
        .map(|i| TraderId::new(format!("TRADER-{:03}", i)))
        .collect();

    let cards: Vec<TradingCard> = traders
        .iter()
        .map(|owner| {
            let mut card = TradingCard::new(owner.clone());
            for _ in 0..config.positions_per_trader {
                if let Some(position) = draw.position(&mut rng) {
                    card.add(position);
                }
            }
            card
        })
        .collect();

    let mut interests = Vec::with_capacity(config.interests);
    if !traders.is_empty() {
        for _ in 0..config.interests {
            let owner = traders[rng.gen_range(0..traders.len())].clone();
            if let Some(spread) = draw.spread(&mut rng) {
                interests.push(Interest::new(owner, spread));
            }
        }
    }

    log::info!(
        "generated {} observations, {} cards, {} interests",
        observations.len(),
        cards.len(),
        interests.len()
    );
    SyntheticMarket {
        observations,
        cards,
        interests,
    }
}

struct Generator<'a> {
    prompts: &'a [NaiveDate],
    config: &'a MarketConfig,
}

impl Generator<'_> {
    /// Two distinct prompt dates, earlier first.
    fn carry(&self, rng: &mut StdRng) -> (NaiveDate, NaiveDate) {
        let near = rng.gen_range(0..self.prompts.len() - 1);
        let far = rng.gen_range(near + 1..self.prompts.len());
        (self.prompts[near], self.prompts[far])
    }

    fn rate(&self, rng: &mut StdRng) -> f64 {
        let rate = rng.gen_range(-self.config.max_rate..=self.config.max_rate);
        (rate * 1000.0).round() / 1000.0
    }

    fn lots(&self, rng: &mut StdRng) -> i64 {
        rng.gen_range(1..=self.config.max_lots.max(1))
    }

    fn metal(&self, rng: &mut StdRng) -> Metal {
        *self.config.metals.choose(rng).unwrap_or(&Metal::Aluminum)
    }

    fn position(&self, rng: &mut StdRng) -> Option<Position> {
        let (near, far) = self.carry(rng);
        let sign = if rng.gen_bool(0.5) { 1 } else { -1 };
        Position::new(self.metal(rng), near, far, sign * self.lots(rng)).ok()
    }

    fn spread(&self, rng: &mut StdRng) -> Option<Spread> {
        let metal = self.metal(rng);
        let legs = (0..rng.gen_range(1..=3))
            .filter_map(|_| {
                let (start, end) = self.carry(rng);
                let direction = if rng.gen_bool(0.5) {
                    Direction::Borrow
                } else {
                    Direction::Lend
                };
                Leg::new(metal, direction, start, end, self.lots(rng)).ok()
            })
            .collect();
        let at_valuation_only = rng.gen_bool(0.3);
        let max_loss = if at_valuation_only {
            0.0
        } else {
            rng.gen_range(0..=50) as f64 * 100.0
        };
        Spread::new(metal, legs, at_valuation_only, max_loss).ok()
    }
}
