//! Synthetic dataset generator.
//!
//! Writes a labeled training history and a short live feed:
//!
//! ```text
//! cargo run --bin generate -- --out-dir data --days 60 --per-hour 6
//! ```

use std::path::PathBuf;

use chrono::NaiveDateTime;

use delaycast::data;
use delaycast::synth::{SynthConfig, SynthGenerator};

#[derive(Debug)]
struct Args {
    out_dir: PathBuf,
    days: u32,
    per_hour: u32,
    start: NaiveDateTime,
    seed: u64,
    live_rows: usize,
}

fn print_help_and_exit() -> ! {
    eprintln!(
        "generate: write synthetic historical_delays.csv and live_feed.csv

options:
  --out-dir DIR     output directory (default .)
  --days N          days of history (default 60)
  --per-hour N      observations per hour (default 6)
  --start TS        first timestamp, e.g. 2025-09-01T00:00:00
  --seed N          RNG seed (default 42)
  --live-rows N     live feed length (default 50)
  --help            show this help"
    );
    std::process::exit(0);
}

fn parse_args() -> Args {
    let defaults = SynthConfig::default();
    let mut args = Args {
        out_dir: PathBuf::from("."),
        days: defaults.days,
        per_hour: defaults.per_hour,
        start: defaults.start,
        seed: defaults.seed,
        live_rows: 50,
    };

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--out-dir" => {
                args.out_dir = PathBuf::from(it.next().expect("--out-dir requires a value"))
            }
            "--days" => {
                args.days = it
                    .next()
                    .expect("--days requires a value")
                    .parse()
                    .expect("--days must be an integer")
            }
            "--per-hour" => {
                args.per_hour = it
                    .next()
                    .expect("--per-hour requires a value")
                    .parse()
                    .expect("--per-hour must be an integer")
            }
            "--start" => {
                let value = it.next().expect("--start requires a value");
                args.start = value
                    .parse()
                    .unwrap_or_else(|_| panic!("--start must be an ISO timestamp, got {value}"))
            }
            "--seed" => {
                args.seed = it
                    .next()
                    .expect("--seed requires a value")
                    .parse()
                    .expect("--seed must be an integer")
            }
            "--live-rows" => {
                args.live_rows = it
                    .next()
                    .expect("--live-rows requires a value")
                    .parse()
                    .expect("--live-rows must be an integer")
            }
            "--help" => print_help_and_exit(),
            other => panic!("unknown arg: {other}"),
        }
    }
    args
}

fn main() -> anyhow::Result<()> {
    let args = parse_args();

    let generator = SynthGenerator::new(SynthConfig {
        start: args.start,
        days: args.days,
        per_hour: args.per_hour,
        seed: args.seed,
        ..SynthConfig::default()
    });

    let history = generator.history();
    let history_path = args.out_dir.join("historical_delays.csv");
    data::write_observations(&history_path, &history)?;
    println!("Wrote {} ({} rows)", history_path.display(), history.len());

    let last = history
        .last()
        .expect("history generation produced no rows")
        .timestamp;
    let feed = generator.live_feed(last, args.live_rows);
    let feed_path = args.out_dir.join("live_feed.csv");
    data::write_observations(&feed_path, &feed)?;
    println!("Wrote {} ({} rows)", feed_path.display(), feed.len());

    Ok(())
}
