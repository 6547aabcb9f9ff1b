// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP handlers for the waitlist intake service.
//!
//! `join` sequences the pipeline: admission control, body decode,
//! validation, unique insert, detached notification. Each step
//! short-circuits everything after it, except that the notification attempt
//! never touches the already-committed insert or the response.

use crate::error::IntakeError;
use crate::limiter::{Admission, RateLimiter};
use crate::notify::Notifier;
use crate::store::WaitlistStore;
use crate::validator::SubmissionValidator;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Shared application state.
pub struct AppState {
    pub validator: SubmissionValidator,
    /// Absent when no counter store is configured: requests proceed
    pub limiter: Option<RateLimiter>,
    pub store: WaitlistStore,
    /// Absent when no provider is configured: notification is a no-op
    pub notifier: Option<Notifier>,
}

/// Waitlist submission body.
///
/// Every field decodes as optional: a missing email is a validation
/// failure with a field message, not a decode failure.
#[derive(Debug, Default, Deserialize)]
pub struct JoinRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
}

/// Success response body.
#[derive(Debug, Serialize)]
pub struct JoinResponse {
    pub success: bool,
    pub message: &'static str,
    pub data: JoinData,
}

#[derive(Debug, Serialize)]
pub struct JoinData {
    pub id: Uuid,
    pub email: String,
}

/// Liveness probe response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
}

/// Liveness probe.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Accept a waitlist submission.
pub async fn join(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<JoinRequest>, JsonRejection>,
) -> Result<Response, IntakeError> {
    // Cheapest check first: admission control runs before any body work
    if let Some(limiter) = &state.limiter {
        let key = source_key(&headers);
        if let Admission::Denied {
            limit,
            remaining,
            reset,
            retry_after,
        } = limiter.admit(&key).await?
        {
            return Err(IntakeError::AdmissionDenied {
                limit,
                remaining,
                reset,
                retry_after_secs: retry_after.as_secs(),
            });
        }
    }

    let Json(request) = payload.map_err(|err| IntakeError::Unexpected(anyhow::Error::new(err)))?;

    let clean = state.validator.validate(
        request.email.as_deref(),
        request.name.as_deref(),
        request.company.as_deref(),
    )?;

    let record = state.store.insert_unique(&clean).await?;

    // Best-effort: runs detached, never unwinds the committed insert
    if let Some(notifier) = &state.notifier {
        notifier.send_welcome(&record);
    }

    info!(id = %record.id, email = %record.email, "Waitlist entry created");

    Ok((
        StatusCode::CREATED,
        Json(JoinResponse {
            success: true,
            message: "Successfully joined the waitlist!",
            data: JoinData {
                id: record.id,
                email: record.email,
            },
        }),
    )
        .into_response())
}

/// Derive the limiter source key from proxy headers.
///
/// Takes the first hop of the forwarded-for chain (later hops are
/// attacker-appendable), then the direct peer header, then a loopback
/// sentinel.
pub fn source_key(headers: &HeaderMap) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let peer = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty());

    forwarded.or(peer).unwrap_or("127.0.0.1").to_string()
}
