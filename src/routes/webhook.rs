// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Payment gateway refund webhook.
//!
//! The gateway signs the raw body with HMAC-SHA256 using the shared secret
//! and sends the hex digest in `X-Gateway-Signature`. Events drive the refund
//! state machine; nothing else moves a refund past `initiated`.
//!
//! Replays answer `duplicate` and events for a settled refund answer `stale`,
//! both 200. An event that skips ahead (`refund.processed` before
//! `refund.created`) answers 409 so the gateway delivers it again.

use crate::error::AppError;
use crate::models::{ApiEnvelope, RefundStatus, TransitionError};
use crate::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::sync::Arc;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-Gateway-Signature";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/webhooks/refund-gateway", post(handle_event))
}

/// Gateway event payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GatewayEvent {
    event: String,
    /// Our refund id, echoed back from the refund notes.
    #[serde(default)]
    refund_id: Option<Uuid>,
    #[serde(default)]
    provider_refund_id: Option<String>,
}

fn status_for_event(event: &str) -> Option<RefundStatus> {
    match event {
        "refund.created" => Some(RefundStatus::Processing),
        "refund.processed" => Some(RefundStatus::Refunded),
        "refund.failed" => Some(RefundStatus::Rejected),
        _ => None,
    }
}

/// Verify the hex HMAC of `body`. Comparison is constant time.
pub fn verify_signature(secret: &[u8], body: &[u8], signature_hex: &str) -> bool {
    let Ok(signature) = hex::decode(signature_hex.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&signature).is_ok()
}

/// Sign `body` the way the gateway does.
pub fn sign(secret: &[u8], body: &[u8]) -> anyhow::Result<String> {
    let mut mac =
        HmacSha256::new_from_slice(secret).map_err(|e| anyhow::anyhow!("HMAC init failed: {e}"))?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

async fn handle_event(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if !verify_signature(&state.config.gateway_webhook_secret, &body, signature) {
        tracing::warn!("Security Alert: refund webhook signature mismatch");
        return AppError::Unauthorized.into_response();
    }

    let event: GatewayEvent = match serde_json::from_slice(&body) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!(error = %e, "Failed to parse gateway event");
            return AppError::BadRequest("Malformed event".to_string()).into_response();
        }
    };

    let Some(next) = status_for_event(&event.event) else {
        tracing::debug!(event = %event.event, "Ignoring gateway event");
        return (StatusCode::OK, Json(ApiEnvelope::message("ignored"))).into_response();
    };

    let refund_id = event.refund_id.or_else(|| {
        event
            .provider_refund_id
            .as_deref()
            .and_then(|pid| state.db.refund_by_provider_id(pid))
            .map(|r| r.id())
    });
    let Some(refund_id) = refund_id else {
        tracing::warn!(event = %event.event, "Gateway event for unknown refund");
        return AppError::NotFound("Unknown refund".to_string()).into_response();
    };

    match state.db.apply_refund_transition(
        refund_id,
        next,
        event.provider_refund_id.as_deref(),
        Utc::now(),
    ) {
        Ok((_, changed)) => {
            let message = if changed { "applied" } else { "duplicate" };
            (StatusCode::OK, Json(ApiEnvelope::message(message))).into_response()
        }
        // The refund already settled: acknowledge so the gateway stops retrying.
        Err(AppError::Transition(TransitionError::Terminal(status))) => {
            tracing::warn!(refund_id = %refund_id, status = %status, "Late gateway event");
            (StatusCode::OK, Json(ApiEnvelope::message("stale"))).into_response()
        }
        // Arrived ahead of the event it depends on; 409 makes the gateway
        // redeliver once that one has been applied.
        Err(e @ AppError::Transition(TransitionError::Illegal { .. })) => {
            tracing::warn!(refund_id = %refund_id, error = %e, "Early gateway event");
            e.into_response()
        }
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_roundtrip() {
        let sig = sign(b"secret", b"{\"event\":\"refund.created\"}").unwrap();
        assert!(verify_signature(b"secret", b"{\"event\":\"refund.created\"}", &sig));
        assert!(!verify_signature(b"other", b"{\"event\":\"refund.created\"}", &sig));
        assert!(!verify_signature(b"secret", b"{}", &sig));
        assert!(!verify_signature(b"secret", b"{}", "not-hex"));
    }

    #[test]
    fn event_mapping() {
        assert_eq!(status_for_event("refund.created"), Some(RefundStatus::Processing));
        assert_eq!(status_for_event("refund.processed"), Some(RefundStatus::Refunded));
        assert_eq!(status_for_event("refund.failed"), Some(RefundStatus::Rejected));
        assert_eq!(status_for_event("payment.captured"), None);
    }
}
