//! Offline trainer.
//!
//! Fits the boosted forest on historical delays and persists the model and
//! feature metadata as JSON:
//!
//! ```text
//! cargo run --release --bin train -- --data historical_delays.csv \
//!     --trees 200 --depth 6 --learning-rate 0.05 --early-stopping 20
//! ```

use std::path::PathBuf;

use delaycast::data;
use delaycast::model::DelayModel;
use delaycast::training::{
    PseudoHuberLoss, SquaredLoss, TrainParams, TreeParams, Verbosity,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LossKind {
    Squared,
    Huber,
}

#[derive(Debug)]
struct Args {
    data: PathBuf,
    model_out: PathBuf,
    meta_out: PathBuf,
    trees: u32,
    depth: u32,
    learning_rate: f32,
    early_stopping: u32,
    valid_fraction: f32,
    seed: u64,
    loss: LossKind,
    quiet: bool,
}

fn print_help_and_exit() -> ! {
    eprintln!(
        "train: fit the delay model on historical observations

options:
  --data PATH            training CSV (default historical_delays.csv)
  --model-out PATH       forest artifact (default delay_model.json)
  --meta-out PATH        metadata artifact (default delay_meta.json)
  --trees N              boosting rounds (default 200)
  --depth N              max tree depth (default 6)
  --learning-rate F      shrinkage (default 0.05)
  --early-stopping N     patience in rounds, 0 disables (default 20)
  --valid F              validation fraction (default 0.2)
  --seed N               split seed (default 42)
  --loss NAME            squared | huber (default squared)
  --quiet                silence round-by-round output
  --help                 show this help"
    );
    std::process::exit(0);
}

fn parse_args() -> Args {
    let mut args = Args {
        data: PathBuf::from("historical_delays.csv"),
        model_out: PathBuf::from("delay_model.json"),
        meta_out: PathBuf::from("delay_meta.json"),
        trees: 200,
        depth: 6,
        learning_rate: 0.05,
        early_stopping: 20,
        valid_fraction: 0.2,
        seed: 42,
        loss: LossKind::Squared,
        quiet: false,
    };

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--data" => args.data = PathBuf::from(it.next().expect("--data requires a value")),
            "--model-out" => {
                args.model_out = PathBuf::from(it.next().expect("--model-out requires a value"))
            }
            "--meta-out" => {
                args.meta_out = PathBuf::from(it.next().expect("--meta-out requires a value"))
            }
            "--trees" => {
                args.trees = it
                    .next()
                    .expect("--trees requires a value")
                    .parse()
                    .expect("--trees must be an integer")
            }
            "--depth" => {
                args.depth = it
                    .next()
                    .expect("--depth requires a value")
                    .parse()
                    .expect("--depth must be an integer")
            }
            "--learning-rate" => {
                args.learning_rate = it
                    .next()
                    .expect("--learning-rate requires a value")
                    .parse()
                    .expect("--learning-rate must be a number")
            }
            "--early-stopping" => {
                args.early_stopping = it
                    .next()
                    .expect("--early-stopping requires a value")
                    .parse()
                    .expect("--early-stopping must be an integer")
            }
            "--valid" => {
                args.valid_fraction = it
                    .next()
                    .expect("--valid requires a value")
                    .parse()
                    .expect("--valid must be a number")
            }
            "--seed" => {
                args.seed = it
                    .next()
                    .expect("--seed requires a value")
                    .parse()
                    .expect("--seed must be an integer")
            }
            "--loss" => {
                let value = it.next().expect("--loss requires a value");
                args.loss = match value.as_str() {
                    "squared" => LossKind::Squared,
                    "huber" => LossKind::Huber,
                    other => panic!("unknown loss: {other} (expected squared|huber)"),
                };
            }
            "--quiet" => args.quiet = true,
            "--help" => print_help_and_exit(),
            other => panic!("unknown arg: {other}"),
        }
    }
    args
}

fn main() -> anyhow::Result<()> {
    let args = parse_args();

    let mut feed = data::read_feed(&args.data)?;
    if feed.skipped > 0 {
        eprintln!("warning: dropped {} unparseable records", feed.skipped);
    }
    feed.sort_by_timestamp();

    let params = TrainParams {
        n_rounds: args.trees,
        tree: TreeParams {
            max_depth: args.depth,
            learning_rate: args.learning_rate,
            ..TreeParams::default()
        },
        early_stopping_rounds: (args.early_stopping > 0).then_some(args.early_stopping),
        verbosity: if args.quiet {
            Verbosity::Silent
        } else {
            Verbosity::Info
        },
        ..TrainParams::default()
    };

    let (model, report) = match args.loss {
        LossKind::Squared => DelayModel::fit_with_loss(
            &feed.rows,
            SquaredLoss,
            params,
            args.valid_fraction,
            args.seed,
        )?,
        LossKind::Huber => DelayModel::fit_with_loss(
            &feed.rows,
            PseudoHuberLoss::default(),
            params,
            args.valid_fraction,
            args.seed,
        )?,
    };

    println!("Validation MAE: {:.3} minutes", report.validation_mae);
    if let Some(best) = report.best_iteration {
        println!(
            "Best iteration: {best} ({} of {} rounds kept)",
            report.n_trees, report.rounds_run
        );
    }

    let mut importance = model.feature_split_counts();
    importance.sort_by(|a, b| b.1.cmp(&a.1));
    println!("Top features by split count:");
    for (name, count) in importance.iter().take(5) {
        println!("  {name}: {count}");
    }

    model.save(&args.model_out, &args.meta_out)?;
    println!(
        "Saved {} and {}",
        args.model_out.display(),
        args.meta_out.display()
    );
    Ok(())
}
