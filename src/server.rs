//! REST front end: a thin HTTP wrapper over the workflow engine.
//!
//! The review gate is split across two endpoints: `/api/requests` runs the
//! workflow up to the draft, `/api/requests/finalize` applies the reviewer's
//! decision. The engine itself never sends anything to a patient.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::review::{ReviewAction, ReviewDecision};
use crate::workflow::graph::Node;
use crate::workflow::state::{Intent, Route, TerminalStatus};
use crate::workflow::{WorkflowEngine, finalize_decision};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<WorkflowEngine>,
}

/// Build the Axum router for the assistant API.
pub fn api_routes(engine: Arc<WorkflowEngine>) -> Router {
    let state = AppState { engine };

    Router::new()
        .route("/health", get(health))
        .route("/api/requests", post(process_request))
        .route("/api/requests/finalize", post(finalize_request))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Health ──────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "clinic-assist"
    }))
}

// ── Process ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ProcessRequest {
    message: String,
}

/// Draft produced by a run, awaiting the reviewer's decision.
#[derive(Serialize)]
struct ProcessReply {
    run_id: String,
    status: TerminalStatus,
    route: Option<Route>,
    intent: Option<Intent>,
    draft_response: String,
    llm_calls: u32,
    trace: Vec<&'static str>,
}

async fn process_request(
    State(state): State<AppState>,
    Json(body): Json<ProcessRequest>,
) -> impl IntoResponse {
    let message = body.message.trim();
    if message.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "No message provided"})),
        )
            .into_response();
    }

    match state.engine.process(message).await {
        Ok(run) => {
            info!(run_id = %run.run_id, "Draft ready for review");
            let reply = ProcessReply {
                run_id: run.run_id,
                status: run.status.unwrap_or(TerminalStatus::Ready),
                route: run.route,
                intent: run.intent,
                draft_response: run
                    .draft_response
                    .unwrap_or_else(|| "No response generated.".to_string()),
                llm_calls: run.llm_calls,
                trace: run.trace.iter().map(Node::label).collect(),
            };
            (StatusCode::OK, Json(serde_json::json!(reply))).into_response()
        }
        Err(e) => {
            error!(error = %e, "Workflow run failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": e.to_string()})),
            )
                .into_response()
        }
    }
}

// ── Finalize ────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct FinalizeRequest {
    action: String,
    #[serde(default)]
    draft_response: String,
    #[serde(default)]
    edited_response: String,
    #[serde(default)]
    run_id: String,
    #[serde(default = "default_status")]
    status: TerminalStatus,
    #[serde(default)]
    route: Option<Route>,
}

fn default_status() -> TerminalStatus {
    TerminalStatus::Ready
}

#[derive(Serialize)]
struct FinalizeReply {
    run_id: String,
    status: TerminalStatus,
    route: Option<Route>,
    review_action: ReviewAction,
    final_response: String,
}

async fn finalize_request(Json(body): Json<FinalizeRequest>) -> impl IntoResponse {
    let decision = match body.action.as_str() {
        "approve" => ReviewDecision::Approve,
        "edit" => ReviewDecision::Edit {
            text: body.edited_response,
        },
        "reject" => ReviewDecision::Reject,
        other => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": format!("Invalid action: {other}")})),
            )
                .into_response();
        }
    };

    let (final_response, status, review_action) =
        finalize_decision(decision, &body.draft_response, body.status);

    info!(
        run_id = %body.run_id,
        action = %review_action,
        status = %status,
        "Run finalized via API"
    );

    let reply = FinalizeReply {
        run_id: body.run_id,
        status,
        route: body.route,
        review_action,
        final_response,
    };
    (StatusCode::OK, Json(serde_json::json!(reply))).into_response()
}
