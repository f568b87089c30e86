//! carry-engine CLI
//!
//! Build curves, price spreads and search for tidy-ups from the command line.
//!
//! # Usage
//!
//! ```bash
//! # Reconcile observations into daily curves
//! carry-engine curve --input market.json
//!
//! # Value every spread in the file
//! carry-engine price --input market.json --format json
//!
//! # Rank offsetting positions across trading cards
//! carry-engine tidy --input market.json --min-lots 10 --max-payment 5000
//!
//! # Generate a random market for testing
//! carry-engine generate --traders 10 --seed 42 --output market.json
//! ```

use carry_engine::config::EngineConfig;
use carry_engine::core::metal::Metal;
use carry_engine::core::observation::{ObservationSet, RateObservation};
use carry_engine::core::position::TradingCard;
use carry_engine::core::spread::{Interest, Spread};
use carry_engine::curve::book::CurveBook;
use carry_engine::curve::builder::CurveBuilder;
use carry_engine::curve::daily_curve::DayValue;
use carry_engine::matching::exposure::ExposureAnalysis;
use carry_engine::matching::interest::match_interests;
use carry_engine::matching::tidy::TidyFinder;
use carry_engine::pricing::spread_pricer::SpreadPricer;
use carry_engine::simulation::generator::{generate_market, MarketConfig};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::process;

fn print_usage() {
    eprintln!(
        r#"carry-engine — rate curves, carry valuation and tidy matching for metal spreads

USAGE:
    carry-engine <COMMAND> [OPTIONS]

COMMANDS:
    curve       Reconcile rate observations into daily curves
    price       Value the spreads in a market file
    tidy        Find offsetting positions across trading cards
    match       Score submitted interests against each other
    exposure    Net exposure per metal and day across interests
    generate    Generate a random market (for testing)
    help        Show this message

COMMON OPTIONS:
    --input <FILE>      Path to a JSON market file
    --config <FILE>     Path to a JSON engine config
    --format <FORMAT>   Output format: text (default) or json
    --snapshot <N>      Snapshot id stamped on built curves (default: 1)

OPTIONS (curve):
    --metal <METAL>     Only this metal (name or LME code)
    --from <DATE>       With --to: print a day-by-day breakdown
    --to <DATE>

OPTIONS (tidy):
    --min-lots <N>      Discard partial matches below N lots
    --max-payment <X>   Discard partial matches costing more than X
    --offset <N>        Skip the first N ranked results
    --limit <N>         Return at most N results

OPTIONS (match):
    --all               Include accepted and rejected interests
    --limit <N>         Return at most N matches

OPTIONS (generate):
    --traders <N>       Number of traders (default: 5)
    --interests <N>     Number of interests (default: 10)
    --positions <N>     Positions per trader (default: 6)
    --observations <N>  Observations per metal (default: 12)
    --seed <N>          Fixed random seed
    --output <FILE>     Write to file instead of stdout

EXAMPLES:
    carry-engine curve --input market.json --metal CA --from 2025-04-16 --to 2025-07-16
    carry-engine price --input market.json --format json
    carry-engine tidy --input market.json --min-lots 10 --limit 20
    carry-engine match --input market.json --limit 5
    carry-engine generate --traders 20 --seed 7 --output market.json"#
    );
}

/// JSON schema for market input. Every section is optional.
#[derive(Default, Serialize, Deserialize)]
struct MarketFile {
    #[serde(default)]
    observations: Vec<RateObservation>,
    #[serde(default)]
    spreads: Vec<Spread>,
    #[serde(default)]
    cards: Vec<TradingCard>,
    #[serde(default)]
    interests: Vec<Interest>,
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {}", message);
    process::exit(1);
}

/// Cursor over command arguments.
struct Args<'a> {
    args: &'a [String],
    i: usize,
}

impl<'a> Args<'a> {
    fn new(args: &'a [String]) -> Self {
        Self { args, i: 0 }
    }

    fn next_flag(&mut self) -> Option<&'a str> {
        let flag = self.args.get(self.i)?;
        self.i += 1;
        Some(flag.as_str())
    }

    fn value(&mut self, flag: &str) -> &'a str {
        let value = self
            .args
            .get(self.i)
            .unwrap_or_else(|| fail(format!("{} requires a value", flag)));
        self.i += 1;
        value
    }

    fn parsed<T: std::str::FromStr>(&mut self, flag: &str) -> T
    where
        T::Err: std::fmt::Display,
    {
        let raw = self.value(flag);
        raw.parse()
            .unwrap_or_else(|e| fail(format!("invalid value '{}' for {}: {}", raw, flag, e)))
    }
}

/// Options every reading command accepts.
struct Common {
    input: Option<String>,
    config: EngineConfig,
    json: bool,
    snapshot: u64,
}

impl Common {
    fn new() -> Self {
        Self {
            input: None,
            config: EngineConfig::default(),
            json: false,
            snapshot: 1,
        }
    }

    /// Consume a shared flag. Returns `false` if `flag` is not one.
    fn accept(&mut self, flag: &str, args: &mut Args<'_>) -> bool {
        match flag {
            "--input" => self.input = Some(args.value(flag).to_string()),
            "--config" => {
                self.config = EngineConfig::load(args.value(flag)).unwrap_or_else(|e| fail(e))
            }
            "--format" => match args.value(flag) {
                "json" => self.json = true,
                "text" => self.json = false,
                other => fail(format!("--format requires 'text' or 'json', got '{}'", other)),
            },
            "--snapshot" => self.snapshot = args.parsed(flag),
            _ => return false,
        }
        true
    }

    fn market(&self) -> MarketFile {
        let path = self
            .input
            .as_deref()
            .unwrap_or_else(|| fail("--input <FILE> is required"));
        let content = fs::read_to_string(path)
            .unwrap_or_else(|e| fail(format!("cannot read '{}': {}", path, e)));
        serde_json::from_str(&content).unwrap_or_else(|e| {
            eprintln!("Error parsing JSON: {}", e);
            eprintln!("Expected format:");
            eprintln!(
                r#"{{
  "observations": [
    {{ "instrument": "Copper", "start": "2025-04-16", "end": "2025-07-16", "daily_rate": -0.4 }}
  ],
  "spreads": [
    {{ "metal": "Copper", "legs": [
      {{ "metal": "Copper", "direction": "Borrow", "start_date": "2025-04-16",
         "end_date": "2025-07-16", "lots": 10 }}
    ] }}
  ],
  "cards": [
    {{ "owner": "alice", "positions": [
      {{ "metal": "Copper", "near_date": "2025-04-16", "far_date": "2025-07-16", "lots": -10 }}
    ] }}
  ]
}}"#
            );
            process::exit(1);
        })
    }

    fn book(&self, observations: Vec<RateObservation>) -> CurveBook {
        let set: ObservationSet = observations.into_iter().collect();
        let builder = CurveBuilder::new(&self.config.curve);
        let built = CurveBook::build(&set, &builder, self.snapshot);
        let skipped = set.rejected() + built.total_skipped();
        if skipped > 0 {
            eprintln!("Skipped {} malformed observations", skipped);
        }
        built.book
    }
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => fail(e),
    }
}

fn cmd_curve(raw: &[String]) {
    let mut common = Common::new();
    let mut metal: Option<Metal> = None;
    let mut from: Option<NaiveDate> = None;
    let mut to: Option<NaiveDate> = None;
    let mut args = Args::new(raw);
    while let Some(flag) = args.next_flag() {
        match flag {
            "--metal" => metal = Some(args.parsed(flag)),
            "--from" => from = Some(args.parsed(flag)),
            "--to" => to = Some(args.parsed(flag)),
            _ if common.accept(flag, &mut args) => {}
            _ => fail(format!("Unknown option: {}", flag)),
        }
    }

    let market = common.market();
    let book = common.book(market.observations);
    let curves: Vec<_> = book
        .curves()
        .filter(|c| metal.map_or(true, |m| c.instrument() == m))
        .collect();

    match (from, to) {
        (Some(from), Some(to)) => {
            #[derive(Serialize)]
            struct Breakdown {
                metal: Metal,
                days: Vec<DayValue>,
                average_rate: Option<f64>,
            }
            let rows: Vec<Breakdown> = curves
                .iter()
                .map(|c| Breakdown {
                    metal: c.instrument(),
                    days: c.breakdown(from, to),
                    average_rate: book.resolve(c.instrument(), from, to).ok().map(|q| q.rate),
                })
                .collect();
            if common.json {
                print_json(&rows);
            } else {
                for row in rows {
                    println!("=== {} {} .. {} ===", row.metal, from, to);
                    for day in &row.days {
                        match day.rate {
                            Some(rate) => println!(
                                "  {}  {:+.4}  cumulative {:+.4}",
                                day.date, rate, day.cumulative
                            ),
                            None => println!("  {}  gap", day.date),
                        }
                    }
                    match row.average_rate {
                        Some(rate) => println!("Average: {:+.4}/day\n", rate),
                        None => println!("Average: no data\n"),
                    }
                }
            }
        }
        (None, None) => {
            if common.json {
                print_json(&curves);
            } else if curves.is_empty() {
                println!("No curves built.");
            } else {
                for curve in curves {
                    println!("{}", curve);
                }
            }
        }
        _ => fail("--from and --to must be given together"),
    }
}

fn cmd_price(raw: &[String]) {
    let mut common = Common::new();
    let mut args = Args::new(raw);
    while let Some(flag) = args.next_flag() {
        if !common.accept(flag, &mut args) {
            fail(format!("Unknown option: {}", flag));
        }
    }

    let market = common.market();
    let book = common.book(market.observations);
    let valuations = SpreadPricer::new(&book).price_all(&market.spreads);

    if common.json {
        print_json(&valuations);
    } else if valuations.is_empty() {
        println!("No spreads to price.");
    } else {
        for (valuation, spread) in valuations.iter().zip(&market.spreads) {
            println!("{}", valuation);
            if spread.valuation_pnl().is_some() {
                let ok = spread.within_constraints(valuation.total_pnl);
                println!("Within submitter limits: {}\n", ok);
            }
        }
        let total: f64 = valuations.iter().map(|v| v.total_pnl).sum();
        println!("Portfolio PnL: {:.2}", total);
    }
}

fn cmd_tidy(raw: &[String]) {
    let mut common = Common::new();
    let mut min_lots: Option<i64> = None;
    let mut max_payment: Option<f64> = None;
    let mut offset: Option<usize> = None;
    let mut limit: Option<usize> = None;
    let mut args = Args::new(raw);
    while let Some(flag) = args.next_flag() {
        match flag {
            "--min-lots" => min_lots = Some(args.parsed(flag)),
            "--max-payment" => max_payment = Some(args.parsed(flag)),
            "--offset" => offset = Some(args.parsed(flag)),
            "--limit" => limit = Some(args.parsed(flag)),
            _ if common.accept(flag, &mut args) => {}
            _ => fail(format!("Unknown option: {}", flag)),
        }
    }

    let mut tidy = common.config.tidy.clone();
    if let Some(v) = min_lots {
        tidy.min_lots = v;
    }
    if max_payment.is_some() {
        tidy.max_payment = max_payment;
    }
    if let Some(v) = offset {
        tidy.offset = v;
    }
    if limit.is_some() {
        tidy.limit = limit;
    }

    let mut market = common.market();
    if !market.observations.is_empty() {
        let book = common.book(std::mem::take(&mut market.observations));
        for card in &mut market.cards {
            card.apply_rates(&book);
        }
    }

    let search = TidyFinder::new(tidy).find(&market.cards);
    if common.json {
        print_json(&search);
    } else {
        print!("{}", search);
    }
}

fn cmd_match(raw: &[String]) {
    let mut common = Common::new();
    let mut all = false;
    let mut limit: Option<usize> = None;
    let mut args = Args::new(raw);
    while let Some(flag) = args.next_flag() {
        match flag {
            "--all" => all = true,
            "--limit" => limit = Some(args.parsed(flag)),
            _ if common.accept(flag, &mut args) => {}
            _ => fail(format!("Unknown option: {}", flag)),
        }
    }

    let mut matching = common.config.matching.clone();
    if all {
        matching.open_only = false;
    }
    if limit.is_some() {
        matching.limit = limit;
    }

    let market = common.market();
    let matches = match_interests(&market.interests, &matching);
    if common.json {
        print_json(&matches);
    } else if matches.is_empty() {
        println!("No matching interests.");
    } else {
        for m in &matches {
            print!("{}", m);
        }
        println!("\nTotal matches: {}", matches.len());
    }
}

fn cmd_exposure(raw: &[String]) {
    let mut common = Common::new();
    let mut args = Args::new(raw);
    while let Some(flag) = args.next_flag() {
        if !common.accept(flag, &mut args) {
            fail(format!("Unknown option: {}", flag));
        }
    }

    let market = common.market();
    let open = market.interests.iter().filter(|i| i.status().is_open());
    let analysis = ExposureAnalysis::from_interests(open);
    if common.json {
        print_json(&analysis);
    } else {
        print!("{}", analysis);
    }
}

fn cmd_generate(raw: &[String]) {
    let mut config = MarketConfig::default();
    let mut output_path: Option<String> = None;
    let mut args = Args::new(raw);
    while let Some(flag) = args.next_flag() {
        match flag {
            "--traders" => config.traders = args.parsed(flag),
            "--interests" => config.interests = args.parsed(flag),
            "--positions" => config.positions_per_trader = args.parsed(flag),
            "--observations" => config.observations_per_metal = args.parsed(flag),
            "--seed" => config.seed = Some(args.parsed(flag)),
            "--output" => output_path = Some(args.value(flag).to_string()),
            _ => fail(format!("Unknown option: {}", flag)),
        }
    }

    let market = generate_market(&config);
    let output = MarketFile {
        observations: market.observations.observations().to_vec(),
        spreads: market.interests.iter().map(|i| i.spread().clone()).collect(),
        cards: market.cards,
        interests: market.interests,
    };
    let json = serde_json::to_string_pretty(&output).unwrap_or_else(|e| fail(e));

    if let Some(path) = output_path {
        fs::write(&path, &json)
            .unwrap_or_else(|e| fail(format!("cannot write to '{}': {}", path, e)));
        eprintln!(
            "Generated {} observations, {} cards, {} interests → {}",
            output.observations.len(),
            output.cards.len(),
            output.interests.len(),
            path
        );
    } else {
        println!("{}", json);
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let command = args[1].as_str();
    let rest = &args[2..];

    match command {
        "curve" => cmd_curve(rest),
        "price" => cmd_price(rest),
        "tidy" => cmd_tidy(rest),
        "match" => cmd_match(rest),
        "exposure" => cmd_exposure(rest),
        "generate" => cmd_generate(rest),
        "help" | "--help" | "-h" => print_usage(),
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            process::exit(1);
        }
    }
}
