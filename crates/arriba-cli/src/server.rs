//! HTTP front end.
//!
//! - `GET /crawl`     run を起動して 202 + run id（完了は待たない）
//! - `GET /runs`      最近の run
//! - `GET /runs/:id`  run の状態
//! - `GET /tasks`     保存済みタスク
//! - `GET /health`

use std::sync::Arc;

use arriba_core::app::{CrawlService, RunStatus};
use arriba_core::domain::{RunId, RunState, StoredTask};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tracing::error;

#[derive(Debug, Serialize)]
struct Triggered {
    run_id: String,
    state: RunState,
}

pub fn router(service: Arc<CrawlService>) -> Router {
    Router::new()
        .route("/crawl", get(trigger_crawl))
        .route("/runs", get(list_runs))
        .route("/runs/:id", get(run_status))
        .route("/tasks", get(list_tasks))
        .route("/health", get(health))
        .with_state(service)
}

async fn trigger_crawl(State(service): State<Arc<CrawlService>>) -> (StatusCode, Json<Triggered>) {
    let handle = service.start_crawl().await;
    (
        StatusCode::ACCEPTED,
        Json(Triggered {
            run_id: handle.run_id().to_string(),
            state: handle.state(),
        }),
    )
}

async fn list_runs(State(service): State<Arc<CrawlService>>) -> Json<Vec<RunStatus>> {
    Json(service.runs().await)
}

async fn run_status(
    State(service): State<Arc<CrawlService>>,
    Path(id): Path<String>,
) -> Result<Json<RunStatus>, (StatusCode, String)> {
    let run_id: RunId = id
        .parse()
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("{e}")))?;
    service
        .run_status(run_id)
        .await
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, format!("unknown run {run_id}")))
}

async fn list_tasks(State(service): State<Arc<CrawlService>>) -> Response {
    match service.list_tasks().await {
        Ok(tasks) => Json::<Vec<StoredTask>>(tasks).into_response(),
        Err(e) => {
            error!(error = %e, "listing tasks failed");
            (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response()
        }
    }
}

async fn health() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use arriba_core::app::Crawler;
    use arriba_core::config::CrawlerConfig;
    use arriba_core::impls::InMemoryTaskStore;
    use arriba_core::ports::TaskStore;
    use arriba_core::testing::{RecordingChannel, ScriptedBrowser, task_table};
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;
    use url::Url;

    fn app() -> (Router, Arc<CrawlService>) {
        let config = CrawlerConfig {
            base_url: Url::parse("https://tasks.test").unwrap(),
            poll_interval: Duration::from_millis(5),
            destination: Some("group-1".into()),
            ..CrawlerConfig::default()
        };
        let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
        let crawler = Crawler::new(
            &config,
            Arc::new(ScriptedBrowser::ready(task_table(&[(
                101,
                "3",
                "Find a rock",
                Some("/files/101.pdf"),
            )]))),
            Arc::clone(&store),
            Arc::new(RecordingChannel::new()),
        )
        .unwrap();
        let service = Arc::new(CrawlService::new(crawler, store));
        (router(Arc::clone(&service)), service)
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn crawl_is_accepted_and_traceable() {
        let (app, service) = app();

        let (status, body) = get_json(app.clone(), "/crawl").await;
        assert_eq!(status, StatusCode::ACCEPTED);
        let run_id = body["run_id"].as_str().unwrap().to_string();
        assert!(run_id.starts_with("run-"));

        // run が終わるまで待つ
        for _ in 0..200 {
            if service.list_tasks().await.unwrap().len() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let (status, body) = get_json(app.clone(), &format!("/runs/{run_id}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["run_id"], run_id.as_str());

        let (status, body) = get_json(app, "/tasks").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["number"], 101);
        assert_eq!(body[0]["category"], "3");
    }

    #[tokio::test]
    async fn unknown_and_malformed_run_ids() {
        let (app, _) = app();

        let (status, _) = get_json(app.clone(), "/runs/not-an-id").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = get_json(app, "/runs/run-01ARZ3NDEKTSV4RRFFQ69G5FAV").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn health_answers() {
        let (app, _) = app();
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
