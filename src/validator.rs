// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Waitlist submission validator.
//!
//! Normalizes and validates a raw submission into storage-ready fields:
//! - Email syntax validation, trimmed and lower-cased
//! - Name/company length limits after trimming
//! - Lossy-safe markup stripping on free-text fields
//!
//! Only the first failing field is reported, in the order
//! email → name → company.

use crate::config::ValidationConfig;
use thiserror::Error;
use tracing::debug;

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid email address")]
    InvalidEmail,

    #[error("Name must be at least {0} characters")]
    NameTooShort(usize),

    #[error("Name must be at most {0} characters")]
    NameTooLong(usize),

    #[error("Company must be at most {0} characters")]
    CompanyTooLong(usize),
}

/// A submission that passed validation, normalized for storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanSubmission {
    /// Trimmed, lower-cased email
    pub email: String,
    /// Trimmed, markup-stripped name
    pub name: Option<String>,
    /// Trimmed, markup-stripped company
    pub company: Option<String>,
}

/// Waitlist submission validator.
pub struct SubmissionValidator {
    config: ValidationConfig,
}

impl SubmissionValidator {
    /// Create a new validator with the given configuration.
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Validate a raw submission.
    ///
    /// Fields arrive untrimmed, exactly as the caller sent them. Absent and
    /// syntactically invalid emails produce the same error: callers are told
    /// what to fix, not how the field failed to decode.
    pub fn validate(
        &self,
        email: Option<&str>,
        name: Option<&str>,
        company: Option<&str>,
    ) -> Result<CleanSubmission, ValidationError> {
        let email = match email.map(str::trim) {
            Some(e) if is_valid_email(e) => e.to_lowercase(),
            other => {
                debug!(email = ?other, "Rejected email field");
                return Err(ValidationError::InvalidEmail);
            }
        };

        let name = match name.map(str::trim) {
            None => None,
            Some(n) => {
                let chars = n.chars().count();
                if chars < self.config.min_name_chars {
                    return Err(ValidationError::NameTooShort(self.config.min_name_chars));
                }
                if chars > self.config.max_field_chars {
                    return Err(ValidationError::NameTooLong(self.config.max_field_chars));
                }
                Some(strip_markup(n))
            }
        };

        let company = match company.map(str::trim) {
            None | Some("") => None,
            Some(c) => {
                if c.chars().count() > self.config.max_field_chars {
                    return Err(ValidationError::CompanyTooLong(self.config.max_field_chars));
                }
                Some(strip_markup(c))
            }
        };

        Ok(CleanSubmission { email, name, company })
    }
}

/// Syntactic email check: a single `@` separating a non-empty local part
/// from a dotted domain, with no whitespace anywhere.
fn is_valid_email(email: &str) -> bool {
    if email.is_empty() || email.contains(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return false;
    }
    if !domain.contains('.') {
        return false;
    }
    !(domain.starts_with('.') || domain.ends_with('.') || domain.starts_with('-'))
}

/// Strip HTML/script markup from free text.
///
/// Lossy-safe: tags are deleted rather than escaped, and `<script>`/`<style>`
/// elements lose their content too, so the stored text is directly safe to
/// render. Unterminated markup drops the remainder of the input.
pub fn strip_markup(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        rest = &rest[start..];

        let lower = rest.to_ascii_lowercase();
        let container = if lower.starts_with("<script") {
            Some("</script")
        } else if lower.starts_with("<style") {
            Some("</style")
        } else {
            None
        };

        rest = match container {
            Some(close) => match lower.find(close) {
                // Skip past the closing tag's '>'
                Some(i) => match rest[i..].find('>') {
                    Some(j) => &rest[i + j + 1..],
                    None => return out,
                },
                None => return out,
            },
            None => match rest.find('>') {
                Some(i) => &rest[i + 1..],
                None => return out,
            },
        };
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_validator() -> SubmissionValidator {
        SubmissionValidator::new(ValidationConfig::default())
    }

    #[test]
    fn test_valid_submission_normalized() {
        let validator = default_validator();

        let clean = validator
            .validate(Some("  Test@Example.COM "), Some("  Jo  "), Some("  Acme  "))
            .unwrap();
        assert_eq!(clean.email, "test@example.com");
        assert_eq!(clean.name.as_deref(), Some("Jo"));
        assert_eq!(clean.company.as_deref(), Some("Acme"));
    }

    #[test]
    fn test_email_only_submission() {
        let validator = default_validator();

        let clean = validator.validate(Some("a@b.com"), None, None).unwrap();
        assert_eq!(clean.email, "a@b.com");
        assert_eq!(clean.name, None);
        assert_eq!(clean.company, None);
    }

    #[test]
    fn test_missing_and_malformed_emails_rejected() {
        let validator = default_validator();

        for email in [None, Some(""), Some("not-an-email"), Some("a@b"), Some("@b.com"),
            Some("a b@c.com"), Some("a@.com")]
        {
            let result = validator.validate(email, None, None);
            assert_eq!(result, Err(ValidationError::InvalidEmail), "email: {email:?}");
        }
    }

    #[test]
    fn test_name_length_limits() {
        let validator = default_validator();

        let result = validator.validate(Some("a@b.com"), Some(" x "), None);
        assert_eq!(result, Err(ValidationError::NameTooShort(2)));

        // Provided-but-blank counts as present, and trims to zero chars
        let result = validator.validate(Some("a@b.com"), Some("   "), None);
        assert_eq!(result, Err(ValidationError::NameTooShort(2)));

        let long = "x".repeat(101);
        let result = validator.validate(Some("a@b.com"), Some(&long), None);
        assert_eq!(result, Err(ValidationError::NameTooLong(100)));
    }

    #[test]
    fn test_company_length_limit() {
        let validator = default_validator();

        let long = "x".repeat(101);
        let result = validator.validate(Some("a@b.com"), None, Some(&long));
        assert_eq!(result, Err(ValidationError::CompanyTooLong(100)));
    }

    #[test]
    fn test_email_failure_reported_first() {
        let validator = default_validator();

        let result = validator.validate(Some("nope"), Some("x"), Some(&"y".repeat(200)));
        assert_eq!(result, Err(ValidationError::InvalidEmail));
    }

    #[test]
    fn test_markup_is_stripped_not_rejected() {
        let validator = default_validator();

        let clean = validator
            .validate(Some("a@b.com"), Some("<script>alert(\"xss\")</script>Test"), None)
            .unwrap();
        assert_eq!(clean.name.as_deref(), Some("Test"));
    }

    #[test]
    fn test_strip_markup() {
        assert_eq!(strip_markup("plain text"), "plain text");
        assert_eq!(strip_markup("Jo<b>hn</b>"), "John");
        assert_eq!(strip_markup("<script>alert(1)</script>Acme"), "Acme");
        assert_eq!(strip_markup("<SCRIPT src=x>payload</SCRIPT> Co"), " Co");
        assert_eq!(strip_markup("<style>p{}</style>Ltd"), "Ltd");
        assert_eq!(strip_markup("<img src=x onerror=alert(1)>Inc"), "Inc");
        // Unterminated markup drops the remainder
        assert_eq!(strip_markup("Acme <script>alert(1)"), "Acme ");
        assert_eq!(strip_markup("Acme <b"), "Acme ");
    }
}
