// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Intake error taxonomy and its HTTP mapping.
//!
//! Expected, caller-correctable outcomes (denial, validation, duplicate)
//! surface their own messages. Persistence and unexpected failures are
//! logged with full internal detail and surfaced only as generic retry
//! messages; backend vocabulary never reaches the response body.

use crate::limiter::LimiterError;
use crate::store::StoreError;
use crate::validator::ValidationError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};

const DENIED_MESSAGE: &str = "Too many requests. Please try again later.";
const DUPLICATE_MESSAGE: &str = "This email is already on the waitlist!";
const STORE_FAILURE_MESSAGE: &str = "Unable to process your request. Please try again later.";
const UNEXPECTED_MESSAGE: &str = "Internal server error. Please try again.";

/// Terminal failure states of the intake pipeline.
#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("submission rate limit exceeded")]
    AdmissionDenied {
        limit: u32,
        remaining: u32,
        /// Epoch milliseconds when the window resets
        reset: i64,
        retry_after_secs: u64,
    },

    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("duplicate waitlist entry")]
    Duplicate,

    #[error("waitlist insert failed: {0}")]
    Persistence(StoreError),

    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl From<StoreError> for IntakeError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate => Self::Duplicate,
            other => Self::Persistence(other),
        }
    }
}

impl From<LimiterError> for IntakeError {
    fn from(err: LimiterError) -> Self {
        Self::Unexpected(anyhow::Error::new(err))
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Rate-limit denial body, carrying what the caller needs to back off.
#[derive(Debug, Serialize)]
pub struct DeniedResponse {
    pub error: &'static str,
    pub limit: u32,
    pub remaining: u32,
    /// Epoch milliseconds when the window resets
    pub reset: i64,
}

impl IntoResponse for IntakeError {
    fn into_response(self) -> Response {
        match self {
            Self::AdmissionDenied {
                limit,
                remaining,
                reset,
                retry_after_secs,
            } => {
                info!(limit, remaining, reset, "Submission rate limited");
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    [("Retry-After", retry_after_secs.to_string())],
                    Json(DeniedResponse {
                        error: DENIED_MESSAGE,
                        limit,
                        remaining,
                        reset,
                    }),
                )
                    .into_response()
            }
            Self::Validation(err) => {
                info!(error = %err, "Submission failed validation");
                (
                    StatusCode::BAD_REQUEST,
                    Json(ErrorResponse {
                        error: err.to_string(),
                    }),
                )
                    .into_response()
            }
            Self::Duplicate => (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: DUPLICATE_MESSAGE.to_string(),
                }),
            )
                .into_response(),
            Self::Persistence(err) => {
                // Full detail stays in the log; the caller gets a retry hint
                error!(error = %err, "Waitlist insert failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse {
                        error: STORE_FAILURE_MESSAGE.to_string(),
                    }),
                )
                    .into_response()
            }
            Self::Unexpected(err) => {
                error!(error = %err, "Unhandled intake failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse {
                        error: UNEXPECTED_MESSAGE.to_string(),
                    }),
                )
                    .into_response()
            }
        }
    }
}
