// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Best-effort confirmation email for new waitlist entries.
//!
//! Delivery is fire-and-forget: the send runs on a detached task bounded by
//! the client timeout, and every failure is logged and swallowed. By the
//! time this module runs, the caller is already on the waitlist; nothing
//! here may change that outcome.

use crate::config::NotifyConfig;
use crate::store::WaitlistRecord;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Notification failure. Logged by the dispatcher, never surfaced.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("email provider request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("email provider returned {0}")]
    Provider(reqwest::StatusCode),
}

/// Rendered email content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailContent {
    pub subject: String,
    pub html: String,
}

#[derive(Debug, Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
}

/// Confirmation email client for a Resend-compatible send API.
pub struct Notifier {
    client: reqwest::Client,
    config: NotifyConfig,
}

impl Notifier {
    /// Create a new notifier with the given configuration.
    pub fn new(config: NotifyConfig) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(DELIVERY_TIMEOUT)
            .build()?;

        Ok(Self { client, config })
    }

    /// Send the welcome email for a stored record, without waiting for the
    /// result. The attempt is bounded by the client timeout; the task logs
    /// its own outcome.
    pub fn send_welcome(&self, record: &WaitlistRecord) {
        let client = self.client.clone();
        let config = self.config.clone();
        let to = record.email.clone();
        let name = record.name.clone();

        tokio::spawn(async move {
            let content = welcome_email(name.as_deref(), &to, &config.site_url);
            match deliver(&client, &config, &to, &content).await {
                Ok(()) => debug!(to = %to, "Welcome email delivered"),
                Err(err) => warn!(to = %to, error = %err, "Welcome email failed (non-fatal)"),
            }
        });
    }
}

async fn deliver(
    client: &reqwest::Client,
    config: &NotifyConfig,
    to: &str,
    content: &EmailContent,
) -> Result<(), NotifyError> {
    let response = client
        .post(&config.api_url)
        .bearer_auth(&config.api_key)
        .json(&SendEmailRequest {
            from: &config.from_email,
            to,
            subject: &content.subject,
            html: &content.html,
        })
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(NotifyError::Provider(response.status()));
    }

    Ok(())
}

/// Render the welcome email for a new waitlist entry.
///
/// Pure function over its parameters; no side effects.
pub fn welcome_email(name: Option<&str>, email: &str, site_url: &str) -> EmailContent {
    let greeting = name.unwrap_or("there");
    let unsubscribe = format!(
        "{}/unsubscribe?email={}",
        site_url,
        urlencoding::encode(email)
    );

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<body style="font-family: sans-serif; line-height: 1.6; max-width: 600px; margin: 0 auto; padding: 40px 20px;">
  <h1>You're on the waitlist!</h1>
  <p>Hi {greeting},</p>
  <p>Thanks for joining the waitlist! We'll be in touch as soon as a spot opens up.</p>
  <h2>What happens next?</h2>
  <ul>
    <li>We'll email you when beta spots open</li>
    <li>Early sign-ups get first access to new features</li>
  </ul>
  <p>Have questions? Just reply to this email.</p>
  <hr />
  <p style="font-size: 12px; color: #6b7280;">
    Don't want updates? <a href="{unsubscribe}">Unsubscribe</a>
  </p>
</body>
</html>
"#
    );

    EmailContent {
        subject: "You're on the waitlist!".to_string(),
        html,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_welcome_email_greets_by_name() {
        let content = welcome_email(Some("Jo"), "jo@example.com", "https://example.com");
        assert!(content.html.contains("Hi Jo,"));
        assert_eq!(content.subject, "You're on the waitlist!");
    }

    #[test]
    fn test_welcome_email_fallback_greeting() {
        let content = welcome_email(None, "jo@example.com", "https://example.com");
        assert!(content.html.contains("Hi there,"));
    }

    #[test]
    fn test_unsubscribe_link_encodes_address() {
        let content = welcome_email(None, "a+b@example.com", "https://example.com");
        assert!(content
            .html
            .contains("https://example.com/unsubscribe?email=a%2Bb%40example.com"));
    }
}
