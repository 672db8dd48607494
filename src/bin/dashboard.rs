//! Scorer/dashboard server.
//!
//! Loads the persisted model + metadata, scores the live feed, and serves
//! the browser UI:
//!
//! ```text
//! cargo run --release --bin dashboard -- --feed live_feed.csv --port 8501
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use delaycast::data;
use delaycast::model::DelayModel;
use delaycast::scoring;
use delaycast::server::{self, DashboardState};

#[derive(Debug)]
struct Args {
    model: PathBuf,
    meta: PathBuf,
    feed: PathBuf,
    port: u16,
}

fn print_help_and_exit() -> ! {
    eprintln!(
        "dashboard: score the live feed and serve the browser UI

options:
  --model PATH   forest artifact (default delay_model.json)
  --meta PATH    metadata artifact (default delay_meta.json)
  --feed PATH    live feed CSV (default live_feed.csv)
  --port N       listen port (default 8501)
  --help         show this help"
    );
    std::process::exit(0);
}

fn parse_args() -> Args {
    let mut args = Args {
        model: PathBuf::from("delay_model.json"),
        meta: PathBuf::from("delay_meta.json"),
        feed: PathBuf::from("live_feed.csv"),
        port: 8501,
    };

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--model" => args.model = PathBuf::from(it.next().expect("--model requires a value")),
            "--meta" => args.meta = PathBuf::from(it.next().expect("--meta requires a value")),
            "--feed" => args.feed = PathBuf::from(it.next().expect("--feed requires a value")),
            "--port" => {
                args.port = it
                    .next()
                    .expect("--port requires a value")
                    .parse()
                    .expect("--port must be a port number")
            }
            "--help" => print_help_and_exit(),
            other => panic!("unknown arg: {other}"),
        }
    }
    args
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = parse_args();

    let model = Arc::new(DelayModel::load(&args.model, &args.meta)?);
    tracing::info!(
        trees = model.forest().n_trees(),
        features = model.meta().n_features(),
        "model loaded"
    );

    let feed = data::read_feed(&args.feed)?;
    if feed.skipped > 0 {
        tracing::warn!(skipped = feed.skipped, "dropped unparseable feed records");
    }
    let scored = scoring::score_feed(&model, feed.rows);
    tracing::info!(rows = scored.len(), "live feed scored");

    let state = Arc::new(DashboardState::new(model, scored));
    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    server::serve(addr, state).await?;
    Ok(())
}
