//! The dashboard HTTP server.
//!
//! A thin axum app over a loaded [`DelayModel`] and a scored feed. The model
//! is immutable for the life of the process; the feed can be replaced by an
//! upload, so it sits behind a lock.

pub mod api;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::response::Html;
use axum::routing::{get, post};
use axum::Router;
use chrono::Duration;
use parking_lot::RwLock;

use crate::model::DelayModel;
use crate::scoring::ScoredObservation;

/// Shared state behind every handler.
pub struct DashboardState {
    model: Arc<DelayModel>,
    feed: RwLock<Vec<ScoredObservation>>,
}

impl DashboardState {
    /// Create state from a loaded model and an initially scored feed.
    pub fn new(model: Arc<DelayModel>, feed: Vec<ScoredObservation>) -> Self {
        Self {
            model,
            feed: RwLock::new(feed),
        }
    }

    /// The loaded model.
    pub fn model(&self) -> &DelayModel {
        &self.model
    }

    /// Snapshot of the current scored feed.
    pub fn feed(&self) -> Vec<ScoredObservation> {
        self.feed.read().clone()
    }

    /// Replace the scored feed (after an upload).
    pub fn replace_feed(&self, rows: Vec<ScoredObservation>) {
        *self.feed.write() = rows;
    }
}

/// Shared handle used by handlers.
pub type SharedState = Arc<DashboardState>;

// =============================================================================
// Time windows
// =============================================================================

/// Date-range filter, measured back from the latest timestamp in the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Window {
    /// No filtering.
    #[default]
    All,
    /// Last 24 hours.
    Day,
    /// Last 7 days.
    Week,
    /// Last 30 days.
    Month,
}

impl Window {
    /// Parse the query-string form; unknown values fall back to `All`.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("24h") => Self::Day,
            Some("7d") => Self::Week,
            Some("30d") => Self::Month,
            _ => Self::All,
        }
    }

    fn duration(self) -> Option<Duration> {
        match self {
            Self::All => None,
            Self::Day => Some(Duration::hours(24)),
            Self::Week => Some(Duration::days(7)),
            Self::Month => Some(Duration::days(30)),
        }
    }

    /// Keep only rows within the window, anchored at the feed's latest row.
    pub fn filter(self, rows: &[ScoredObservation]) -> Vec<ScoredObservation> {
        let Some(span) = self.duration() else {
            return rows.to_vec();
        };
        let Some(latest) = rows.iter().map(|r| r.timestamp).max() else {
            return Vec::new();
        };
        let cutoff = latest - span;
        rows.iter()
            .filter(|r| r.timestamp >= cutoff)
            .cloned()
            .collect()
    }
}

// =============================================================================
// App
// =============================================================================

/// The dashboard page, served at `/`.
async fn index() -> Html<&'static str> {
    Html(include_str!("dashboard.html"))
}

/// Build the router over shared state.
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/summary", get(api::summary))
        .route("/api/predictions", get(api::predictions))
        .route("/api/analytics", get(api::analytics))
        .route("/api/heatmap", get(api::heatmap))
        .route("/api/export", get(api::export))
        .route("/api/upload", post(api::upload))
        .with_state(state)
}

/// Bind and serve until the process exits.
pub async fn serve(addr: SocketAddr, state: SharedState) -> std::io::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("dashboard listening on http://{addr}");
    axum::serve(listener, app).await
}
