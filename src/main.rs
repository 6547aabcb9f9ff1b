// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Waitlist Intake Service
//!
//! Public intake endpoint for the marketing-site waitlist:
//!
//! - `POST /waitlist`: validated, rate-limited, de-duplicated submission
//! - `GET /waitlist`: liveness probe
//!
//! ## Configuration
//!
//! Loaded from environment variables (a `.env` file is honored):
//!
//! - `BIND_ADDR`: server bind address (default: 0.0.0.0:8080)
//! - `DATABASE_ADDR`: datastore address (default: mem://)
//! - `RATE_LIMIT_REDIS_URL`: counter store; unset disables rate limiting
//! - `RATE_LIMIT_MAX` / `RATE_LIMIT_WINDOW_SECS`: window shape (default 3/3600)
//! - `RESEND_API_KEY`: email provider key; unset disables confirmations
//! - `RESEND_FROM_EMAIL` / `RESEND_API_URL` / `SITE_URL`: email details
//! - `ALLOWED_ORIGINS`: CSV CORS allowlist; unset allows any origin

use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use waitlist_intake::{
    config::Config,
    handlers::{health, join, AppState},
    limiter::RateLimiter,
    notify::Notifier,
    store::WaitlistStore,
    validator::SubmissionValidator,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env();
    info!(
        bind_addr = %config.bind_addr,
        database_addr = %config.database_addr,
        rate_limit = config.rate_limit.is_some(),
        notify = config.notify.is_some(),
        "Starting waitlist intake service"
    );

    // Connect the record store
    let store = WaitlistStore::connect(&config.database_addr).await?;
    if config.database_addr.starts_with("mem://") {
        warn!("Datastore is in-memory; waitlist entries will not survive a restart");
    }

    // Optional subsystems: absence disables them, it never fails startup
    let limiter = match &config.rate_limit {
        Some(rate_config) => {
            let limiter = RateLimiter::connect(rate_config).await?;
            info!(
                max_submissions = rate_config.max_submissions,
                window_secs = rate_config.window_secs,
                "Rate limiting enabled"
            );
            Some(limiter)
        }
        None => {
            warn!("Rate limiting not configured (missing RATE_LIMIT_REDIS_URL); failing open");
            None
        }
    };

    let notifier = match config.notify.clone() {
        Some(notify_config) => Some(Notifier::new(notify_config)?),
        None => {
            warn!("Confirmation email not configured (missing RESEND_API_KEY); skipping");
            None
        }
    };

    let state = Arc::new(AppState {
        validator: SubmissionValidator::new(config.validation.clone()),
        limiter,
        store,
        notifier,
    });

    // Public endpoint: any origin may post unless an allowlist is set
    let cors = match &config.allowed_origins {
        Some(csv) => {
            let origins: Vec<HeaderValue> =
                csv.split(',').filter_map(|o| o.trim().parse().ok()).collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([header::CONTENT_TYPE])
        }
        None => CorsLayer::permissive(),
    };

    // Build router
    let app = Router::new()
        .route("/waitlist", post(join).get(health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = config.bind_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
