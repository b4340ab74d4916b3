//! Status HTTP server.
//!
//! Read-only endpoints reporting on the scheduler and the sermon store.

use crate::models::SermonStatus;
use crate::orchestrator::PassReport;
use crate::store::SermonStore;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

/// Shared server state.
#[derive(Clone)]
pub struct StatusState {
    pub store: Arc<dyn SermonStore>,
    pub reports: watch::Receiver<Option<PassReport>>,
}

#[derive(Serialize)]
struct StatusResponse {
    last_pass: Option<PassReport>,
    sermons: BTreeMap<&'static str, usize>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Build the status router.
pub fn router(state: StatusState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn status(State(state): State<StatusState>) -> impl IntoResponse {
    let last_pass = state.reports.borrow().clone();

    match state.store.list_sermons(None).await {
        Ok(sermons) => {
            let mut counts: BTreeMap<&'static str, usize> = [
                SermonStatus::Created,
                SermonStatus::Pending,
                SermonStatus::Complete,
                SermonStatus::Error,
            ]
            .into_iter()
            .map(|s| (s.as_str(), 0))
            .collect();
            for sermon in &sermons {
                *counts.entry(sermon.status.as_str()).or_default() += 1;
            }

            Json(StatusResponse {
                last_pass,
                sermons: counts,
            })
            .into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewSermon;
    use crate::store::SqliteSermonStore;

    async fn spawn(state: StatusState) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });
        base
    }

    #[tokio::test]
    async fn test_health() {
        let (_tx, reports) = watch::channel(None);
        let store = Arc::new(SqliteSermonStore::in_memory().unwrap());
        let base = spawn(StatusState { store, reports }).await;

        let body: serde_json::Value = reqwest::get(format!("{}/health", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_status_reports_counts_and_last_pass() {
        let (tx, reports) = watch::channel(None);
        let store = Arc::new(SqliteSermonStore::in_memory().unwrap());
        store
            .create_sermon(&NewSermon {
                title: "One".to_string(),
                date_given: None,
                audio_url: "https://example.org/one.mp3".to_string(),
            })
            .await
            .unwrap();
        tx.send_replace(Some(PassReport {
            selected: 3,
            completed: 2,
            failed: 1,
            skipped: 0,
        }));

        let base = spawn(StatusState { store, reports }).await;
        let body: serde_json::Value = reqwest::get(format!("{}/status", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(body["sermons"]["created"], 1);
        assert_eq!(body["sermons"]["complete"], 0);
        assert_eq!(body["last_pass"]["completed"], 2);
        assert_eq!(body["last_pass"]["failed"], 1);
    }
}
