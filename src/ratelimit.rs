//! Per-user search quota and the admin gate.
//!
//! [`RateLimiter`] keeps usage records in memory behind one async mutex and
//! writes a JSON snapshot after every change, so check-then-increment is a
//! single critical section and records survive restarts.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use crate::Result;

/// Length of one quota window, measured from a user's first search in it.
pub const RATE_WINDOW: Duration = Duration::from_secs(60 * 60);

fn window() -> chrono::Duration {
    chrono::Duration::from_std(RATE_WINDOW).unwrap_or_else(|_| chrono::Duration::hours(1))
}

/// One user's usage in the current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Searches made in this window.
    pub count: u32,
    /// When the window started.
    pub timestamp: DateTime<Utc>,
}

impl UsageRecord {
    fn expired(&self, now: DateTime<Utc>) -> bool {
        now - self.timestamp > window()
    }

    fn resets_in(&self, now: DateTime<Utc>) -> Duration {
        (self.timestamp + window() - now)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

/// Answer to "may this user search now?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// The search was allowed and recorded.
    Allowed {
        /// Searches left in this window (`None` for exempt users).
        remaining: Option<u32>,
    },
    /// The quota is used up.
    Denied {
        /// Time until the window resets.
        retry_after: Duration,
    },
}

impl RateDecision {
    /// Whether the search may go ahead.
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed { .. })
    }
}

/// A user's standing, for status displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Usage {
    /// Searches made in the current window.
    pub used: u32,
    /// Searches left in the current window.
    pub remaining: u32,
    /// Time until the window resets, if a window is open.
    pub resets_in: Option<Duration>,
}

/// Per-user hourly search quota with a durable snapshot.
pub struct RateLimiter {
    limit: u32,
    records: Mutex<HashMap<String, UsageRecord>>,
    snapshot: Option<PathBuf>,
}

impl RateLimiter {
    /// Creates an in-memory limiter that is never persisted.
    pub fn in_memory(limit: u32) -> Self {
        Self {
            limit,
            records: Mutex::new(HashMap::new()),
            snapshot: None,
        }
    }

    /// Loads records from `path`, dropping windows that already expired.
    ///
    /// A missing file starts empty. An unreadable file is logged and also
    /// starts empty; it is overwritten on the next change.
    pub async fn load(path: impl Into<PathBuf>, limit: u32) -> Self {
        let path = path.into();
        let records = match read_snapshot(&path).await {
            Ok(mut records) => {
                let now = Utc::now();
                records.retain(|_, record| !record.expired(now));
                debug!("Loaded {} rate limit records", records.len());
                records
            }
            Err(e) => {
                error!("Error loading rate limit data: {}", e);
                HashMap::new()
            }
        };

        Self {
            limit,
            records: Mutex::new(records),
            snapshot: Some(path),
        }
    }

    /// Searches allowed per window.
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Checks the quota for `user` and records the search if allowed.
    ///
    /// Exempt users are always allowed and never recorded.
    pub async fn check_and_record(&self, user: &str, exempt: bool) -> RateDecision {
        self.check_and_record_at(user, exempt, Utc::now()).await
    }

    async fn check_and_record_at(
        &self,
        user: &str,
        exempt: bool,
        now: DateTime<Utc>,
    ) -> RateDecision {
        if exempt {
            return RateDecision::Allowed { remaining: None };
        }

        let mut records = self.records.lock().await;

        let count = match records.get_mut(user) {
            Some(record) if !record.expired(now) => {
                if record.count >= self.limit {
                    return RateDecision::Denied {
                        retry_after: record.resets_in(now),
                    };
                }
                record.count += 1;
                record.count
            }
            _ if self.limit == 0 => {
                return RateDecision::Denied {
                    retry_after: RATE_WINDOW,
                };
            }
            _ => {
                records.insert(
                    user.to_string(),
                    UsageRecord {
                        count: 1,
                        timestamp: now,
                    },
                );
                1
            }
        };

        self.persist(&records).await;

        RateDecision::Allowed {
            remaining: Some(self.limit.saturating_sub(count)),
        }
    }

    /// Current standing of `user`.
    pub async fn usage(&self, user: &str) -> Usage {
        self.usage_at(user, Utc::now()).await
    }

    async fn usage_at(&self, user: &str, now: DateTime<Utc>) -> Usage {
        let records = self.records.lock().await;
        match records.get(user) {
            Some(record) if !record.expired(now) => Usage {
                used: record.count,
                remaining: self.limit.saturating_sub(record.count),
                resets_in: Some(record.resets_in(now)),
            },
            _ => Usage {
                used: 0,
                remaining: self.limit,
                resets_in: None,
            },
        }
    }

    async fn persist(&self, records: &HashMap<String, UsageRecord>) {
        let Some(ref path) = self.snapshot else {
            return;
        };
        if let Err(e) = write_snapshot(path, records).await {
            error!("Error saving rate limit data: {}", e);
        }
    }
}

async fn read_snapshot(path: &Path) -> Result<HashMap<String, UsageRecord>> {
    match tokio::fs::read_to_string(path).await {
        Ok(raw) => Ok(serde_json::from_str(&raw)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
        Err(e) => Err(e.into()),
    }
}

async fn write_snapshot(path: &Path, records: &HashMap<String, UsageRecord>) -> Result<()> {
    let json = serde_json::to_string(records)?;
    tokio::fs::write(path, json).await?;
    Ok(())
}

/// Who may run restricted commands.
///
/// Id `0` means no admin is set yet; until one is, everyone passes the gate
/// and anyone may claim the role.
#[derive(Debug, Default)]
pub struct AdminGate {
    admin_id: AtomicU64,
}

/// Why an admin change was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminChangeError {
    /// Someone other than the current admin asked.
    NotAdmin,
}

impl AdminGate {
    /// Creates a gate with `admin_id` (0 for none).
    pub fn new(admin_id: u64) -> Self {
        Self {
            admin_id: AtomicU64::new(admin_id),
        }
    }

    /// Current admin id, if any.
    pub fn admin_id(&self) -> Option<u64> {
        match self.admin_id.load(Ordering::SeqCst) {
            0 => None,
            id => Some(id),
        }
    }

    /// Whether `user` is the admin.
    pub fn is_admin(&self, user: u64) -> bool {
        self.admin_id() == Some(user)
    }

    /// Whether `user` may run restricted commands.
    pub fn permits(&self, user: u64) -> bool {
        match self.admin_id() {
            None => true,
            Some(admin) => admin == user,
        }
    }

    /// Makes `new_admin` the admin, if `requester` is allowed to.
    pub fn set_admin(
        &self,
        requester: u64,
        new_admin: u64,
    ) -> std::result::Result<(), AdminChangeError> {
        let current = self.admin_id.load(Ordering::SeqCst);
        if current != 0 && current != requester {
            warn!("User {} tried to change the admin id", requester);
            return Err(AdminChangeError::NotAdmin);
        }
        self.admin_id
            .compare_exchange(current, new_admin, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(|_| AdminChangeError::NotAdmin)
    }
}
