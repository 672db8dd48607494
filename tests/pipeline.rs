//! End-to-end pipeline: generate → train → persist → reload → score →
//! serve. Uses a small synthetic dataset so the whole flow runs in seconds.

use std::sync::Arc;

use axum::extract::{Query, State};

use delaycast::data;
use delaycast::features::FEATURE_NAMES;
use delaycast::model::DelayModel;
use delaycast::scoring;
use delaycast::server::{api, DashboardState};
use delaycast::synth::{SynthConfig, SynthGenerator};
use delaycast::training::{TrainParams, TreeParams, Verbosity};

fn quick_params() -> TrainParams {
    TrainParams {
        n_rounds: 40,
        tree: TreeParams {
            max_depth: 4,
            learning_rate: 0.2,
            ..TreeParams::default()
        },
        early_stopping_rounds: Some(10),
        verbosity: Verbosity::Silent,
        ..TrainParams::default()
    }
}

#[test]
fn generate_train_persist_reload_score() {
    let dir = std::env::temp_dir().join("delaycast_pipeline_test");
    std::fs::create_dir_all(&dir).unwrap();
    let history_path = dir.join("historical_delays.csv");
    let feed_path = dir.join("live_feed.csv");
    let model_path = dir.join("delay_model.json");
    let meta_path = dir.join("delay_meta.json");

    // Generate and persist the datasets through the CSV layer.
    let generator = SynthGenerator::new(SynthConfig {
        days: 7,
        per_hour: 3,
        ..SynthConfig::default()
    });
    let history = generator.history();
    data::write_observations(&history_path, &history).unwrap();
    let live = generator.live_feed(history.last().unwrap().timestamp, 50);
    data::write_observations(&feed_path, &live).unwrap();

    // Reload the history exactly as the trainer binary would.
    let mut feed = data::read_feed(&history_path).unwrap();
    assert_eq!(feed.skipped, 0);
    assert_eq!(feed.rows.len(), history.len());
    feed.sort_by_timestamp();

    // Train with a held-out validation set and early stopping.
    let (model, report) = DelayModel::fit(&feed.rows, quick_params(), 0.2, 42).unwrap();
    assert!(report.validation_mae > 0.0);
    assert!(
        report.validation_mae < 5.0,
        "validation MAE {} looks unconverged",
        report.validation_mae
    );
    assert_eq!(model.meta().features, FEATURE_NAMES.to_vec());
    assert_eq!(model.meta().best_iteration, report.best_iteration);

    // Persist and reload; predictions must be bit-identical.
    model.save(&model_path, &meta_path).unwrap();
    let reloaded = DelayModel::load(&model_path, &meta_path).unwrap();
    assert_eq!(reloaded.meta(), model.meta());

    let live_feed = data::read_feed(&feed_path).unwrap();
    let scored_once = scoring::score_feed(&model, live_feed.rows.clone());
    let scored_again = scoring::score_feed(&reloaded, live_feed.rows);
    assert_eq!(scored_once, scored_again);
    assert_eq!(scored_once.len(), 50);

    // The scorer never needs labels.
    let mut unlabeled = history[0].clone();
    unlabeled.delay_min = None;
    unlabeled.route_id = "R999".to_owned(); // unseen vocabulary entry
    let scored = scoring::score_feed(&reloaded, vec![unlabeled]);
    assert!(scored[0].predicted_delay_min.is_finite());

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn dashboard_handlers_over_a_scored_feed() {
    let generator = SynthGenerator::new(SynthConfig {
        days: 4,
        per_hour: 2,
        ..SynthConfig::default()
    });
    let history = generator.history();
    let (model, _) = DelayModel::fit(&history, quick_params(), 0.2, 42).unwrap();
    let model = Arc::new(model);

    let live = generator.live_feed(history.last().unwrap().timestamp, 30);
    let scored = scoring::score_feed(&model, live);
    let state = Arc::new(DashboardState::new(model, scored));

    // Summary carries the metric cards and vocabulary for the filters.
    let summary = api::summary(State(state.clone())).await.0;
    assert_eq!(summary.rows, 30);
    assert!(summary.last_update.is_some());
    assert!(summary.busiest_route.is_some());
    assert_eq!(summary.routes.len(), 5);
    assert_eq!(summary.stops.len(), 10);

    // Predictions honor the route filter and cap the table at 50 rows.
    let all = api::predictions(
        State(state.clone()),
        Query(api::PredictionsParams {
            route: None,
            stop: None,
            window: None,
        }),
    )
    .await
    .0;
    assert_eq!(all.total, 30);
    assert_eq!(all.series.len(), 30);
    assert!(all.rows.len() <= 50);

    let route = summary.busiest_route.clone().unwrap();
    let filtered = api::predictions(
        State(state.clone()),
        Query(api::PredictionsParams {
            route: Some(route.clone()),
            stop: None,
            window: Some("all".to_owned()),
        }),
    )
    .await
    .0;
    assert!(filtered.total > 0);
    assert!(filtered.rows.iter().all(|r| r.route_id == route));

    // Analytics and heatmap aggregate the same feed.
    let analytics = api::analytics(
        State(state.clone()),
        Query(api::WindowParams { window: None }),
    )
    .await
    .0;
    assert!(!analytics.hourly.is_empty());
    assert!(!analytics.insights.is_empty());

    let heat = api::heatmap(
        State(state.clone()),
        Query(api::WindowParams { window: None }),
    )
    .await
    .0;
    assert_eq!(heat.cells.len(), heat.routes.len());
    assert!(heat
        .cells
        .iter()
        .all(|row| row.len() == heat.stops.len()));

    // Upload replaces the feed; an unusable body is rejected.
    let mut upload_csv = Vec::new();
    let replacement = generator.live_feed(history.last().unwrap().timestamp, 10);
    data::write_observations_to(&mut upload_csv, &replacement).unwrap();

    let response = api::upload(State(state.clone()), upload_csv.into()).await;
    assert_eq!(response.status(), axum::http::StatusCode::OK);
    assert_eq!(state.feed().len(), 10);

    let garbage = api::upload(State(state.clone()), b"not,a,real\nheader".to_vec().into()).await;
    assert_eq!(
        garbage.status(),
        axum::http::StatusCode::UNPROCESSABLE_ENTITY
    );
    // Feed untouched by the failed upload.
    assert_eq!(state.feed().len(), 10);
}
