// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Sliding-window abuse limiter for the intake endpoint.
//!
//! Counts admissions per source address over a trailing window of fixed
//! length (default: 3 per hour). Two adjacent fixed windows are combined,
//! the older one weighted by its remaining overlap with the trailing hour,
//! so the admitted rate cannot double at a window boundary.
//!
//! The Redis backend runs the whole read-weigh-increment sequence as one
//! server-side script call per request: concurrent submissions from the same
//! address cannot both observe the last free slot, and the counters are
//! shared across service instances. An in-process backend with the same
//! arithmetic serves single-instance deployments and tests.

use crate::config::RateLimitConfig;
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::Script;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

/// Result of an admission check.
#[derive(Debug, Clone)]
pub enum Admission {
    /// Request may proceed
    Allowed {
        /// Window capacity
        limit: u32,
        /// Remaining quota in the trailing window
        remaining: u32,
        /// Epoch milliseconds at which the current window slot closes
        reset: i64,
    },
    /// Request is over quota
    Denied {
        limit: u32,
        remaining: u32,
        reset: i64,
        /// Time until the current window slot closes
        retry_after: Duration,
    },
}

/// Counter store failure. Only reachable with a configured backend; an
/// unconfigured limiter never runs at all.
#[derive(Debug, Error)]
pub enum LimiterError {
    #[error("counter store error: {0}")]
    Store(#[from] redis::RedisError),
}

/// Atomic sliding-window admission. Reads both slot counters, weighs the
/// previous slot by its remaining overlap with the trailing window, and
/// increments only while under the limit. Returns the remaining quota, or
/// -1 when denied.
const SLIDING_WINDOW: &str = r#"
local current = redis.call("GET", KEYS[1])
if current == false then current = 0 end
local previous = redis.call("GET", KEYS[2])
if previous == false then previous = 0 end
local limit = tonumber(ARGV[1])
local window = tonumber(ARGV[2])
local elapsed = tonumber(ARGV[3])
local weighted = math.floor(previous * (window - elapsed) / window)
if weighted + current >= limit then
  return -1
end
local count = redis.call("INCR", KEYS[1])
if count == 1 then
  redis.call("PEXPIRE", KEYS[1], window * 2)
end
return limit - weighted - count
"#;

/// Per-key counters for the in-process backend.
#[derive(Debug, Clone, Copy)]
struct WindowCounts {
    slot: i64,
    current: u32,
    previous: u32,
}

enum WindowStore {
    Redis {
        conn: ConnectionManager,
        script: Script,
    },
    Memory(RwLock<HashMap<String, WindowCounts>>),
}

/// Sliding-window rate limiter keyed by source address.
pub struct RateLimiter {
    limit: u32,
    window_ms: i64,
    store: WindowStore,
}

impl RateLimiter {
    /// Connect to the shared Redis counter store.
    pub async fn connect(config: &RateLimitConfig) -> Result<Self, LimiterError> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        let conn = client.get_connection_manager().await?;

        Ok(Self {
            limit: config.max_submissions,
            window_ms: config.window_duration().as_millis() as i64,
            store: WindowStore::Redis {
                conn,
                script: Script::new(SLIDING_WINDOW),
            },
        })
    }

    /// Create a limiter backed by in-process counters.
    ///
    /// Counters are local to this process: use only for single-instance
    /// deployments and tests.
    pub fn in_memory(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window_ms: window.as_millis() as i64,
            store: WindowStore::Memory(RwLock::new(HashMap::new())),
        }
    }

    /// Check and consume admission quota for a source key.
    pub async fn admit(&self, source_key: &str) -> Result<Admission, LimiterError> {
        let now_ms = Utc::now().timestamp_millis();
        let slot = now_ms.div_euclid(self.window_ms);
        let elapsed = now_ms.rem_euclid(self.window_ms);

        let remaining: i64 = match &self.store {
            WindowStore::Redis { conn, script } => {
                // ConnectionManager is a cheap handle over one multiplexed
                // connection
                let mut conn = conn.clone();
                script
                    .key(counter_key(source_key, slot))
                    .key(counter_key(source_key, slot - 1))
                    .arg(self.limit)
                    .arg(self.window_ms)
                    .arg(elapsed)
                    .invoke_async(&mut conn)
                    .await?
            }
            WindowStore::Memory(windows) => {
                let mut windows = windows.write().await;
                let counts = windows
                    .entry(source_key.to_string())
                    .or_insert(WindowCounts { slot, current: 0, previous: 0 });

                if counts.slot < slot {
                    counts.previous = if counts.slot == slot - 1 { counts.current } else { 0 };
                    counts.current = 0;
                    counts.slot = slot;
                }

                let weighted =
                    (counts.previous as i64 * (self.window_ms - elapsed) / self.window_ms) as u32;
                if weighted + counts.current >= self.limit {
                    -1
                } else {
                    counts.current += 1;
                    i64::from(self.limit - weighted - counts.current)
                }
            }
        };

        let reset = (slot + 1) * self.window_ms;
        if remaining < 0 {
            debug!(source_key, reset, "Submission denied by rate limiter");
            Ok(Admission::Denied {
                limit: self.limit,
                remaining: 0,
                reset,
                retry_after: Duration::from_millis((reset - now_ms).max(0) as u64),
            })
        } else {
            debug!(source_key, remaining, "Submission admitted");
            Ok(Admission::Allowed {
                limit: self.limit,
                remaining: remaining as u32,
                reset,
            })
        }
    }
}

fn counter_key(source_key: &str, slot: i64) -> String {
    format!("waitlist:rl:{source_key}:{slot}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_window_exhaustion() {
        let limiter = RateLimiter::in_memory(3, Duration::from_secs(3600));

        // First 3 submissions should be admitted with a shrinking quota
        for expected in [2u32, 1, 0] {
            match limiter.admit("203.0.113.9").await.unwrap() {
                Admission::Allowed { limit, remaining, .. } => {
                    assert_eq!(limit, 3);
                    assert_eq!(remaining, expected);
                }
                Admission::Denied { .. } => panic!("Should not be denied"),
            }
        }

        // 4th should be denied with nothing remaining
        match limiter.admit("203.0.113.9").await.unwrap() {
            Admission::Denied { remaining, retry_after, .. } => {
                assert_eq!(remaining, 0);
                assert!(retry_after <= Duration::from_secs(3600));
            }
            Admission::Allowed { .. } => panic!("Should be denied"),
        }
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let limiter = RateLimiter::in_memory(1, Duration::from_secs(3600));

        assert!(matches!(
            limiter.admit("203.0.113.9").await.unwrap(),
            Admission::Allowed { .. }
        ));
        assert!(matches!(
            limiter.admit("203.0.113.9").await.unwrap(),
            Admission::Denied { .. }
        ));

        // A different source still has its own quota
        assert!(matches!(
            limiter.admit("198.51.100.7").await.unwrap(),
            Admission::Allowed { .. }
        ));
    }

    #[tokio::test]
    async fn test_reset_is_window_aligned() {
        let limiter = RateLimiter::in_memory(3, Duration::from_secs(3600));
        let now = Utc::now().timestamp_millis();

        let Admission::Allowed { reset, .. } = limiter.admit("203.0.113.9").await.unwrap() else {
            panic!("Should be admitted");
        };
        assert!(reset > now);
        assert!(reset <= now + 3600 * 1000);
        assert_eq!(reset % (3600 * 1000), 0);
    }
}
