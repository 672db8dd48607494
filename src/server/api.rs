//! JSON and CSV API handlers for the dashboard.

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{SharedState, Window};
use crate::data;
use crate::scoring::{self, ScoredObservation};

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// Headline numbers for the metric cards plus the sidebar system info.
#[derive(Debug, Serialize)]
pub struct Summary {
    /// Mean predicted delay over the whole feed, minutes.
    pub mean_predicted_delay: f32,
    /// Most frequent route in the feed.
    pub busiest_route: Option<String>,
    /// Mean temperature over the feed, °C.
    pub mean_temperature: f32,
    /// Rows currently loaded.
    pub rows: usize,
    /// Latest timestamp in the feed.
    pub last_update: Option<NaiveDateTime>,
    /// Route vocabulary for the filter controls.
    pub routes: Vec<String>,
    /// Stop vocabulary for the filter controls.
    pub stops: Vec<String>,
}

/// One point of the prediction time series.
#[derive(Debug, Serialize)]
pub struct SeriesPoint {
    pub timestamp: NaiveDateTime,
    pub predicted_delay_min: f32,
}

/// Filtered predictions: table rows plus the chart series.
#[derive(Debug, Serialize)]
pub struct PredictionsResponse {
    /// Most recent rows for the table (up to 50).
    pub rows: Vec<ScoredObservation>,
    /// Full filtered series for the line chart.
    pub series: Vec<SeriesPoint>,
    /// Total rows matching the filter.
    pub total: usize,
}

/// Mean predicted delay for one hour of day.
#[derive(Debug, Serialize)]
pub struct HourlyDelay {
    pub hour: u32,
    pub mean_predicted_delay: f32,
}

/// Hourly trend plus derived insight strings.
#[derive(Debug, Serialize)]
pub struct AnalyticsResponse {
    pub hourly: Vec<HourlyDelay>,
    pub insights: Vec<String>,
}

/// Route × stop matrix of mean predicted delay.
#[derive(Debug, Serialize)]
pub struct HeatmapResponse {
    pub routes: Vec<String>,
    pub stops: Vec<String>,
    /// `cells[route][stop]`; `null` where a pair has no rows.
    pub cells: Vec<Vec<Option<f32>>>,
}

/// Result of an upload.
#[derive(Debug, Serialize)]
pub struct UploadOutcome {
    /// Rows now loaded.
    pub rows: usize,
    /// Records dropped while parsing.
    pub skipped: usize,
}

/// API error body.
#[derive(Debug, Serialize)]
struct ApiError {
    error: String,
}

fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ApiError {
            error: message.into(),
        }),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// Query parameter types
// ---------------------------------------------------------------------------

/// Query parameters for `GET /api/predictions`.
#[derive(Debug, Deserialize)]
pub struct PredictionsParams {
    /// Restrict to one route.
    pub route: Option<String>,
    /// Restrict to one stop.
    pub stop: Option<String>,
    /// Date window: `all`, `24h`, `7d`, or `30d`.
    pub window: Option<String>,
}

/// Query parameters carrying only a date window.
#[derive(Debug, Deserialize)]
pub struct WindowParams {
    pub window: Option<String>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /api/summary` — metric cards and system info.
pub async fn summary(State(state): State<SharedState>) -> Json<Summary> {
    let feed = state.feed();
    let meta = state.model().meta();

    Json(Summary {
        mean_predicted_delay: scoring::round2(mean_of(&feed, |r| r.predicted_delay_min)),
        busiest_route: busiest_route(&feed),
        mean_temperature: scoring::round2(mean_of(&feed, |r| r.weather_temp)),
        rows: feed.len(),
        last_update: feed.iter().map(|r| r.timestamp).max(),
        routes: meta.route_vocab.categories().to_vec(),
        stops: meta.stop_vocab.categories().to_vec(),
    })
}

/// `GET /api/predictions` — filtered table rows and chart series.
pub async fn predictions(
    State(state): State<SharedState>,
    Query(params): Query<PredictionsParams>,
) -> Json<PredictionsResponse> {
    let window = Window::parse(params.window.as_deref());
    let mut rows = window.filter(&state.feed());

    if let Some(route) = params.route.filter(|r| r != "All") {
        rows.retain(|r| r.route_id == route);
    }
    if let Some(stop) = params.stop.filter(|s| s != "All") {
        rows.retain(|r| r.stop_id == stop);
    }

    let total = rows.len();
    let series = rows
        .iter()
        .map(|r| SeriesPoint {
            timestamp: r.timestamp,
            predicted_delay_min: r.predicted_delay_min,
        })
        .collect();
    let table_start = rows.len().saturating_sub(50);
    let rows = rows.split_off(table_start);

    Json(PredictionsResponse {
        rows,
        series,
        total,
    })
}

/// `GET /api/analytics` — hourly trend and insights.
pub async fn analytics(
    State(state): State<SharedState>,
    Query(params): Query<WindowParams>,
) -> Json<AnalyticsResponse> {
    let window = Window::parse(params.window.as_deref());
    let rows = window.filter(&state.feed());

    Json(AnalyticsResponse {
        hourly: hourly_means(&rows),
        insights: insights(&rows),
    })
}

/// `GET /api/heatmap` — route × stop mean predicted delay.
pub async fn heatmap(
    State(state): State<SharedState>,
    Query(params): Query<WindowParams>,
) -> Json<HeatmapResponse> {
    let window = Window::parse(params.window.as_deref());
    let rows = window.filter(&state.feed());
    Json(heatmap_of(&rows))
}

/// `GET /api/export` — scored rows as a CSV attachment.
pub async fn export(State(state): State<SharedState>) -> Response {
    let feed = state.feed();
    let mut body = Vec::new();
    if let Err(err) = scoring::write_scored_csv(&mut body, &feed) {
        return api_error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string());
    }

    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"predicted_delays.csv\"",
            ),
        ],
        body,
    )
        .into_response()
}

/// `POST /api/upload` — replace the feed with a scored upload.
///
/// The body is raw CSV with the observation schema; `delay_min` may be
/// absent. Rejects bodies that contain no usable rows.
pub async fn upload(State(state): State<SharedState>, body: Bytes) -> Response {
    let feed = match data::read_feed_from(body.as_ref()) {
        Ok(feed) => feed,
        Err(err) => return api_error(StatusCode::UNPROCESSABLE_ENTITY, err.to_string()),
    };

    let skipped = feed.skipped;
    let scored = scoring::score_feed(state.model(), feed.rows);
    let outcome = UploadOutcome {
        rows: scored.len(),
        skipped,
    };
    tracing::info!(rows = outcome.rows, skipped, "feed replaced by upload");
    state.replace_feed(scored);

    Json(outcome).into_response()
}

// ---------------------------------------------------------------------------
// Aggregations
// ---------------------------------------------------------------------------

fn mean_of(rows: &[ScoredObservation], value: impl Fn(&ScoredObservation) -> f32) -> f32 {
    if rows.is_empty() {
        return 0.0;
    }
    (rows.iter().map(|r| value(r) as f64).sum::<f64>() / rows.len() as f64) as f32
}

/// Most frequent route; ties resolve to the lexicographically smallest.
fn busiest_route(rows: &[ScoredObservation]) -> Option<String> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    let mut route_ids: Vec<&str> = rows.iter().map(|r| r.route_id.as_str()).collect();
    route_ids.sort_unstable();
    for route in route_ids {
        match counts.last_mut() {
            Some((id, count)) if *id == route => *count += 1,
            _ => counts.push((route, 1)),
        }
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(a.0)))
        .map(|(id, _)| id.to_owned())
}

/// Mean predicted delay per hour of day, only hours with data.
fn hourly_means(rows: &[ScoredObservation]) -> Vec<HourlyDelay> {
    use chrono::Timelike;

    let mut sums = [(0.0f64, 0u32); 24];
    for row in rows {
        let hour = row.timestamp.hour() as usize;
        sums[hour].0 += row.predicted_delay_min as f64;
        sums[hour].1 += 1;
    }
    sums.iter()
        .enumerate()
        .filter(|(_, (_, count))| *count > 0)
        .map(|(hour, (sum, count))| HourlyDelay {
            hour: hour as u32,
            mean_predicted_delay: scoring::round2((sum / *count as f64) as f32),
        })
        .collect()
}

/// Insight strings mirroring the metric cards' tone.
fn insights(rows: &[ScoredObservation]) -> Vec<String> {
    let mut out = Vec::new();
    if rows.is_empty() {
        return out;
    }

    // Route with the highest mean predicted delay.
    let heat = heatmap_of(rows);
    let route_means: Vec<(usize, f32)> = heat
        .cells
        .iter()
        .enumerate()
        .filter_map(|(i, row)| {
            let known: Vec<f32> = row.iter().flatten().copied().collect();
            (!known.is_empty())
                .then(|| (i, known.iter().sum::<f32>() / known.len() as f32))
        })
        .collect();
    if let Some((worst, _)) = route_means
        .iter()
        .max_by(|a, b| a.1.partial_cmp(&b.1).expect("means are finite"))
    {
        out.push(format!(
            "Route {} shows the highest average predicted delay.",
            heat.routes[*worst]
        ));
    }

    if mean_of(rows, |r| r.weather_precip) > 0.2 {
        out.push("Rain conditions observed — potential delay impact.".to_owned());
    }
    if mean_of(rows, |r| r.predicted_delay_min) > 5.0 {
        out.push("Overall system delay is higher than normal.".to_owned());
    }
    out
}

/// Pivot rows into a route × stop matrix of mean predicted delay.
fn heatmap_of(rows: &[ScoredObservation]) -> HeatmapResponse {
    let mut routes: Vec<String> = rows.iter().map(|r| r.route_id.clone()).collect();
    routes.sort();
    routes.dedup();
    let mut stops: Vec<String> = rows.iter().map(|r| r.stop_id.clone()).collect();
    stops.sort();
    stops.dedup();

    let mut sums = vec![vec![(0.0f64, 0u32); stops.len()]; routes.len()];
    for row in rows {
        let route = routes.binary_search(&row.route_id).expect("route present");
        let stop = stops.binary_search(&row.stop_id).expect("stop present");
        sums[route][stop].0 += row.predicted_delay_min as f64;
        sums[route][stop].1 += 1;
    }

    let cells = sums
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|(sum, count)| {
                    (count > 0).then(|| scoring::round2((sum / count as f64) as f32))
                })
                .collect()
        })
        .collect();

    HeatmapResponse {
        routes,
        stops,
        cells,
    }
}
