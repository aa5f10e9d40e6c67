use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use hyper::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::middleware;
use super::AppState;
use crate::config::LabelerSettings;
use crate::github::client::GithubApi;
use crate::labeler::Labeler;

pub fn build_router(state: AppState) -> Router {
    let health_routes = Router::new().route(
        "/",
        get(|| async {
            Json(json!({
                "status": "ok",
            }))
        }),
    );

    Router::new()
        .nest("/health", health_routes)
        .route("/webhook", post(handle_webhook))
        .route("/labeler/run", post(run_labeler))
        .fallback(not_found)
        .with_state(state)
        .layer(axum::middleware::from_fn(
            middleware::enrich_current_span_middleware,
        ))
}

async fn not_found(req: axum::extract::Request) -> impl IntoResponse {
    tracing::warn!("unhandled path: {}", req.uri());
    (StatusCode::NOT_FOUND, "Not Found")
}

// --- Webhook dispatch ---

const PULL_REQUEST_ACTIONS: &[&str] = &[
    "opened",
    "closed",
    "edited",
    "synchronize",
    "reopened",
    "review_requested",
    "review_request_removed",
];
const REVIEW_ACTIONS: &[&str] = &["submitted", "dismissed", "edited"];

/// Whether an event/action pair should trigger a labeler run.
fn is_relevant(event: &str, action: &str) -> bool {
    match event {
        "pull_request" => PULL_REQUEST_ACTIONS.contains(&action),
        "pull_request_review" => REVIEW_ACTIONS.contains(&action),
        _ => false,
    }
}

#[derive(Deserialize)]
struct WebhookPayload {
    action: String,
    #[serde(default)]
    pull_request: Option<PrNumber>,
    repository: Repository,
}

#[derive(Deserialize)]
struct PrNumber {
    number: u64,
}

#[derive(Deserialize)]
struct Repository {
    name: String,
    owner: Owner,
}

#[derive(Deserialize)]
struct Owner {
    login: String,
}

#[tracing::instrument(skip_all, fields(
    github.event = tracing::field::Empty,
    github.delivery = tracing::field::Empty,
    http.uri = tracing::field::Empty,
))]
async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<WebhookPayload>,
) -> (StatusCode, Json<Value>) {
    let event = headers
        .get("x-github-event")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    if !is_relevant(&event, &payload.action) {
        return (StatusCode::OK, Json(json!({ "status": "ignored" })));
    }

    let Some(pr) = &payload.pull_request else {
        tracing::warn!(event = %event, action = %payload.action, "payload carries no pull request");
        return (StatusCode::OK, Json(json!({ "status": "ignored" })));
    };

    let owner = payload.repository.owner.login.clone();
    let repo = payload.repository.name.clone();

    let Some(entry) = state.config.repo(&owner, &repo) else {
        tracing::debug!(owner = %owner, repo = %repo, "repository not configured, ignoring delivery");
        return (StatusCode::OK, Json(json!({ "status": "ignored" })));
    };

    let Some(api) = state.api.clone() else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "GitHub token not configured" })),
        );
    };

    let settings = state.config.settings_for(entry);
    let event_name = format!("{event}.{}", payload.action);
    let number = pr.number;

    // One independent task per delivery; deliveries for the same PR are not
    // serialized, the last one to finish wins.
    tokio::spawn(async move {
        if let Err(e) = run_once(api, owner, repo, number, settings, &event_name).await {
            tracing::error!(error = ?e, event = %event_name, pr = number, "labeler run failed");
        }
    });

    (StatusCode::ACCEPTED, Json(json!({ "status": "accepted" })))
}

async fn run_once(
    api: Arc<dyn GithubApi>,
    owner: String,
    repo: String,
    number: u64,
    settings: LabelerSettings,
    event: &str,
) -> anyhow::Result<()> {
    // Always refetch: review payloads carry a partial pull_request object,
    // and labels may have changed since the event fired.
    let pr = api.get_pull_request(&owner, &repo, number).await?;
    let labeler = Labeler::new(api, owner, repo, settings)?;
    labeler.process(event, &pr).await
}

// --- Manual trigger ---

#[derive(Deserialize)]
struct RunRequest {
    repo: String,
    pr: u64,
}

async fn run_labeler(
    State(state): State<AppState>,
    Json(body): Json<RunRequest>,
) -> (StatusCode, Json<Value>) {
    let Some(entry) = state.config.repos.iter().find(|r| r.slug == body.repo) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": format!("repository '{}' is not configured", body.repo) })),
        );
    };

    let Some((owner, repo)) = entry.owner_repo() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": format!("invalid repository slug '{}'", entry.slug) })),
        );
    };

    let Some(api) = state.api.clone() else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "GitHub token not configured" })),
        );
    };

    let settings = state.config.settings_for(entry);
    let owner = owner.to_string();
    let repo = repo.to_string();
    let number = body.pr;

    tokio::spawn(async move {
        if let Err(e) = run_once(api, owner, repo, number, settings, "manual").await {
            tracing::error!(error = ?e, pr = number, "manual labeler run failed");
        }
    });

    (
        StatusCode::ACCEPTED,
        Json(json!({
            "status": "labeler_started",
            "repo": body.repo,
            "pr": body.pr,
        })),
    )
}
