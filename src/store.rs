// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! SurrealDB gateway for waitlist records.
//!
//! The insert is a single `CREATE` that relies on the table's UNIQUE index
//! on email: concurrent submissions of the same address race inside the
//! store, not in application logic, and the loser gets a distinguished
//! [`StoreError::Duplicate`] rather than a generic failure.

use crate::validator::CleanSubmission;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surrealdb::engine::any::{connect, Any};
use surrealdb::Surreal;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

const TABLE: &str = "waitlist";

/// Provenance tag recorded on every row created by this endpoint.
const SOURCE_TAG: &str = "landing_page";

/// Store gateway failure modes.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The normalized email is already on the waitlist
    #[error("email already on the waitlist")]
    Duplicate,

    #[error("datastore error: {0}")]
    Database(#[from] surrealdb::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Back-office lifecycle state of a waitlist entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitlistStatus {
    Pending,
    Invited,
    Converted,
}

/// A persisted waitlist entry.
#[derive(Debug, Clone, Serialize)]
pub struct WaitlistRecord {
    /// Unique record identifier
    pub id: Uuid,
    /// Normalized (trimmed, lower-cased) email; unique per waitlist
    pub email: String,
    /// Sanitized plain-text name
    pub name: Option<String>,
    /// Sanitized plain-text company
    pub company: Option<String>,
    /// Provenance tag
    pub source: String,
    /// Lifecycle status; new rows start as `pending`
    pub status: WaitlistStatus,
    /// Server-assigned creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Storage row, distinct from the API model; the record id lives in the
/// record key, not in the row content.
#[derive(Debug, Serialize, Deserialize)]
struct WaitlistRow {
    email: String,
    name: Option<String>,
    company: Option<String>,
    source: String,
    status: WaitlistStatus,
    created_at: surrealdb::sql::Datetime,
}

#[derive(Debug, Deserialize)]
struct QueryRow {
    id: Uuid,
    email: String,
    name: Option<String>,
    company: Option<String>,
    source: String,
    status: WaitlistStatus,
    created_at: surrealdb::sql::Datetime,
}

impl From<QueryRow> for WaitlistRecord {
    fn from(row: QueryRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            name: row.name,
            company: row.company,
            source: row.source,
            status: row.status,
            created_at: row.created_at.0,
        }
    }
}

/// Database connection wrapper
#[derive(Clone)]
pub struct WaitlistStore {
    db: Surreal<Any>,
}

impl WaitlistStore {
    /// Connect to the datastore.
    ///
    /// The engine is picked from the address: `mem://` for in-memory,
    /// `rocksdb://path` for embedded persistent storage (feature `rocksdb`),
    /// `ws://host` for a shared server (feature `ws`).
    pub async fn connect(addr: &str) -> Result<Self, StoreError> {
        let db = connect(addr).await?;
        db.use_ns("marketing").use_db("site").await?;

        Self::init_schema(&db).await?;

        Ok(Self { db })
    }

    /// Initialize database schema
    async fn init_schema(db: &Surreal<Any>) -> Result<(), StoreError> {
        db.query(
            r#"
            DEFINE TABLE IF NOT EXISTS waitlist SCHEMAFULL;
            DEFINE FIELD IF NOT EXISTS email ON waitlist TYPE string;
            DEFINE FIELD IF NOT EXISTS name ON waitlist TYPE option<string>;
            DEFINE FIELD IF NOT EXISTS company ON waitlist TYPE option<string>;
            DEFINE FIELD IF NOT EXISTS source ON waitlist TYPE string;
            DEFINE FIELD IF NOT EXISTS status ON waitlist TYPE string;
            DEFINE FIELD IF NOT EXISTS created_at ON waitlist TYPE datetime;

            DEFINE INDEX IF NOT EXISTS email_idx ON waitlist COLUMNS email UNIQUE;
        "#,
        )
        .await?
        .check()?;

        Ok(())
    }

    /// Insert a new waitlist entry, rejecting duplicates.
    ///
    /// One atomic insert-or-reject: the UNIQUE index on email makes the
    /// decision, never a prior existence check.
    pub async fn insert_unique(
        &self,
        submission: &CleanSubmission,
    ) -> Result<WaitlistRecord, StoreError> {
        let id = Uuid::new_v4();
        let row = WaitlistRow {
            email: submission.email.clone(),
            name: submission.name.clone(),
            company: submission.company.clone(),
            source: SOURCE_TAG.to_string(),
            status: WaitlistStatus::Pending,
            created_at: Utc::now().into(),
        };

        let created: Option<WaitlistRow> = self
            .db
            .create((TABLE, id.to_string()))
            .content(row)
            .await
            .map_err(|err| {
                if is_unique_violation(&err) {
                    debug!(email = %submission.email, "Duplicate waitlist entry rejected");
                    StoreError::Duplicate
                } else {
                    StoreError::Database(err)
                }
            })?;

        let row = created
            .ok_or_else(|| StoreError::Internal("create returned no record".to_string()))?;

        Ok(WaitlistRecord {
            id,
            email: row.email,
            name: row.name,
            company: row.company,
            source: row.source,
            status: row.status,
            created_at: row.created_at.0,
        })
    }

    /// Look up an entry by normalized email.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<WaitlistRecord>, StoreError> {
        let mut response = self
            .db
            .query(
                "SELECT meta::id(id) AS id, email, name, company, source, status, created_at \
                 FROM waitlist WHERE email = $email",
            )
            .bind(("email", email.to_string()))
            .await?;

        let mut rows: Vec<QueryRow> = response.take(0)?;
        Ok(rows.pop().map(WaitlistRecord::from))
    }

    /// Total number of waitlist entries.
    pub async fn count(&self) -> Result<usize, StoreError> {
        #[derive(Deserialize)]
        struct CountRow {
            total: usize,
        }

        let mut response = self
            .db
            .query("SELECT count() AS total FROM waitlist GROUP ALL")
            .await?;

        let row: Option<CountRow> = response.take(0)?;
        Ok(row.map(|r| r.total).unwrap_or(0))
    }
}

/// Whether a store error is the unique-index rejection.
///
/// Local engines surface the typed variant; remote engines flatten
/// statement failures into the query-error string, so the message check
/// stays as a fallback. Callers above this gateway only ever see
/// [`StoreError::Duplicate`].
fn is_unique_violation(err: &surrealdb::Error) -> bool {
    match err {
        surrealdb::Error::Db(surrealdb::error::Db::IndexExists { .. }) => true,
        surrealdb::Error::Api(surrealdb::error::Api::Query(msg)) => msg.contains("already contains"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(email: &str) -> CleanSubmission {
        CleanSubmission {
            email: email.to_string(),
            name: Some("Test User".to_string()),
            company: None,
        }
    }

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let store = WaitlistStore::connect("mem://").await.unwrap();

        let record = store.insert_unique(&submission("a@b.com")).await.unwrap();
        assert_eq!(record.email, "a@b.com");
        assert_eq!(record.status, WaitlistStatus::Pending);
        assert_eq!(record.source, "landing_page");

        let found = store.find_by_email("a@b.com").await.unwrap().unwrap();
        assert_eq!(found.id, record.id);
        assert_eq!(found.name.as_deref(), Some("Test User"));
        assert_eq!(found.status, WaitlistStatus::Pending);

        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_rejected_with_named_variant() {
        let store = WaitlistStore::connect("mem://").await.unwrap();

        store.insert_unique(&submission("dup@b.com")).await.unwrap();
        let err = store.insert_unique(&submission("dup@b.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate));

        // Exactly one record survives
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_missing_email_lookup() {
        let store = WaitlistStore::connect("mem://").await.unwrap();
        assert!(store.find_by_email("nobody@b.com").await.unwrap().is_none());
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
