// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Waitlist Intake
//!
//! This crate provides the public "join the waitlist" endpoint for the
//! marketing site:
//!
//! - Per-source-address sliding-window admission control (3/hour default),
//!   backed by a shared Redis counter store and fail-open when unconfigured
//! - Submission validation and lossy-safe markup stripping
//! - Insert-or-reject persistence against a UNIQUE index on normalized email
//! - Best-effort confirmation email that never blocks or fails the response
//!
//! The caller-visible contract is a single JSON endpoint: `POST /waitlist`
//! plus a `GET /waitlist` liveness probe.

pub mod config;
pub mod error;
pub mod handlers;
pub mod limiter;
pub mod notify;
pub mod store;
pub mod validator;

pub use config::Config;
pub use error::IntakeError;
pub use limiter::{Admission, RateLimiter};
pub use store::{WaitlistRecord, WaitlistStore};
pub use validator::{SubmissionValidator, ValidationError};
