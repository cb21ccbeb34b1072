//! Route handlers.
//!
//! The webhook always answers 2xx once the body is valid JSON: the provider
//! does not reliably retry, so store failures are logged instead of surfaced.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::SharedState;
use crate::classifier::Branch;
use crate::error::ExportError;
use crate::webhook::InboundMessage;

/// JSON response with a status code.
pub type JsonResponse = (StatusCode, Json<Value>);

/// Longest message prefix written to the logs.
const LOG_PREVIEW_CHARS: usize = 100;

/// `GET /`
pub async fn index() -> &'static str {
    "Lead intake webhook is running"
}

/// `GET /healthz`
pub async fn healthz() -> &'static str {
    "ok"
}

/// `POST /webhook`
pub async fn webhook(State(state): State<SharedState>, body: Bytes) -> JsonResponse {
    let request_id = Uuid::new_v4();
    let span = info_span!("webhook", %request_id);

    async move {
        let payload: Value = match serde_json::from_slice(&body) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Received webhook with invalid JSON payload");
                return error_response(StatusCode::BAD_REQUEST, "invalid json");
            }
        };

        if !payload.is_object() {
            warn!("Webhook payload is not a JSON object");
            return error_response(StatusCode::BAD_REQUEST, "payload must be a JSON object");
        }

        debug!(payload = %payload, "Received webhook JSON");

        let inbound = InboundMessage::from_payload(&payload);
        info!(
            phone = ?inbound.phone,
            message = ?inbound.text.as_deref().map(preview),
            "Extracted webhook fields"
        );

        let Some(phone) = inbound.phone else {
            warn!("Missing phone number in payload");
            return ignored("missing phone");
        };
        let Some(text) = inbound.text else {
            warn!("Missing message content in payload");
            return ignored("missing message");
        };

        let outcome = state.intake.append_message(&phone, &text).await;
        info!(branch = %outcome.branch(), persisted = outcome.is_persisted(), "Webhook processed");

        (StatusCode::OK, Json(json!({ "status": "success" })))
    }
    .instrument(span)
    .await
}

/// `POST /update/{branch}`
pub async fn update_branch(
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> JsonResponse {
    let branch = match state
        .intake
        .collections()
        .branch_for(&name)
        .map(Ok)
        .unwrap_or_else(|| name.parse::<Branch>())
    {
        Ok(b) => b,
        Err(e) => {
            warn!(branch = %name, "Sync requested for unknown branch");
            return error_response(StatusCode::BAD_REQUEST, &e);
        }
    };

    let Some(exporter) = state.exporter.as_ref() else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "status": "error",
                "branch": branch.slug(),
                "reason": "export is not configured"
            })),
        );
    };

    let tab = exporter.tab_name(branch).to_string();
    match exporter.sync_branch(branch).await {
        Ok(rows) => (
            StatusCode::OK,
            Json(json!({
                "status": "success",
                "branch": branch.slug(),
                "tab": tab,
                "rows": rows
            })),
        ),
        Err(e) => {
            error!(tab = %tab, error = %e, "Manual branch sync failed");
            let status = match e {
                ExportError::BranchDisabled { .. } => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (
                status,
                Json(json!({
                    "status": "error",
                    "branch": branch.slug(),
                    "reason": e.to_string()
                })),
            )
        }
    }
}

/// `POST /update_all`
pub async fn update_all(State(state): State<SharedState>) -> JsonResponse {
    let Some(exporter) = state.exporter.as_ref() else {
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "export is not configured");
    };

    let report = exporter.sync_once().await;
    if report.is_success() {
        (
            StatusCode::OK,
            Json(json!({ "status": "success", "results": report.results })),
        )
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "status": "error",
                "results": report.results,
                "errors": report.errors
            })),
        )
    }
}

fn error_response(status: StatusCode, reason: &str) -> JsonResponse {
    (status, Json(json!({ "status": "error", "reason": reason })))
}

fn ignored(reason: &str) -> JsonResponse {
    (
        StatusCode::OK,
        Json(json!({ "status": "ignored", "reason": reason })),
    )
}

fn preview(text: &str) -> String {
    text.chars().take(LOG_PREVIEW_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let text = "é".repeat(150);
        assert_eq!(preview(&text).chars().count(), LOG_PREVIEW_CHARS);
        assert_eq!(preview("short"), "short");
    }

    #[test]
    fn test_ignored_shape() {
        let (status, Json(body)) = ignored("missing phone");
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ignored", "reason": "missing phone"}));
    }
}
