use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::watch;

/// A value the hub keeps and replaces wholesale on refresh
pub trait Snapshot: Send + Sync + 'static {
    /// True when every part of the value is a fallback
    fn is_degraded(&self) -> bool;

    fn captured_at(&self) -> DateTime<Utc>;
}

#[derive(Debug)]
struct Versioned<T> {
    token: u64,
    value: Arc<T>,
}

impl<T> Clone for Versioned<T> {
    fn clone(&self) -> Self {
        Self {
            token: self.token,
            value: Arc::clone(&self.value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// A newer cycle already landed
    Stale,
    /// Degraded result dropped in favour of a recent real one
    KeptPrevious,
}

/// Latest snapshot of one kind.
///
/// Each refresh cycle takes a token when it starts; results are only applied
/// when their token is newer than the one already applied, so a slow cycle
/// can never overwrite the result of a later one. A fully degraded result does
/// not replace a real one younger than `retention`.
pub struct SnapshotStore<T> {
    kind: &'static str,
    tx: watch::Sender<Versioned<T>>,
    next_token: AtomicU64,
    retention: Duration,
}

impl<T: Snapshot> SnapshotStore<T> {
    pub fn new(kind: &'static str, initial: T, retention: Duration) -> Self {
        let (tx, _) = watch::channel(Versioned {
            token: 0,
            value: Arc::new(initial),
        });

        Self {
            kind,
            tx,
            next_token: AtomicU64::new(0),
            retention,
        }
    }

    /// Token for a cycle starting now
    pub fn issue_token(&self) -> u64 {
        self.next_token.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn apply(&self, token: u64, value: T) -> ApplyOutcome {
        let retention = self.retention;
        let mut outcome = ApplyOutcome::Stale;

        self.tx.send_if_modified(|current| {
            if token <= current.token {
                return false;
            }

            let current_is_recent = Utc::now() - current.value.captured_at() < retention;
            if value.is_degraded() && !current.value.is_degraded() && current_is_recent {
                current.token = token;
                outcome = ApplyOutcome::KeptPrevious;
                return false;
            }

            *current = Versioned {
                token,
                value: Arc::new(value),
            };
            outcome = ApplyOutcome::Applied;
            true
        });

        match outcome {
            ApplyOutcome::Applied => {
                metrics::counter!("moskita_refresh_total", "kind" => self.kind).increment(1);
                tracing::debug!(kind = self.kind, token, "Snapshot replaced");
            }
            ApplyOutcome::Stale => {
                metrics::counter!("moskita_stale_discarded_total", "kind" => self.kind)
                    .increment(1);
                tracing::debug!(kind = self.kind, token, "Discarded result of an older refresh");
            }
            ApplyOutcome::KeptPrevious => {
                tracing::warn!(
                    kind = self.kind,
                    token,
                    "Refresh produced only fallback data, keeping previous snapshot"
                );
            }
        }

        outcome
    }

    pub fn current(&self) -> Arc<T> {
        Arc::clone(&self.tx.borrow().value)
    }
}
