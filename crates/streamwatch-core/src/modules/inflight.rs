//! Per-target admission control.
//!
//! A target key is held by at most one operation. A second request for a held
//! key is rejected with `OperationBlocked` instead of waiting. Keys are
//! released by dropping the guard, so every exit path (success, error, panic,
//! cancelled future) frees the target.
//!
//! Only keys whose work is bounded by the depot deadline (`stream:` and
//! `sync:`) expire: once older than `stale_after` they are considered
//! abandoned and may be reclaimed by the next request. Server-wide and global
//! keys are held until their guard drops, however long the run takes.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use streamwatch_types::models::InFlightEntry;
use streamwatch_types::EngineError;

/// Scope + id of an exclusive operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TargetKey {
    /// Measurement of one stream
    Stream(i64),
    /// Refresh of every stream of one server
    Server(i64),
    /// Catalog reconciliation of one server
    Sync(i64),
    /// Refresh of everything
    All,
    /// Registry reconciliation with the configuration file
    ConfigSync,
}

impl TargetKey {
    /// Whether the holder finishes within one depot deadline.
    pub fn expires(&self) -> bool {
        matches!(self, Self::Stream(_) | Self::Sync(_))
    }
}

impl fmt::Display for TargetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stream(id) => write!(f, "stream:{id}"),
            Self::Server(id) => write!(f, "server:{id}"),
            Self::Sync(id) => write!(f, "sync:{id}"),
            Self::All => write!(f, "all"),
            Self::ConfigSync => write!(f, "config"),
        }
    }
}

struct Holder {
    token: u64,
    since: Instant,
}

struct Inner {
    entries: DashMap<TargetKey, Holder>,
    stale_after: Duration,
    next_token: AtomicU64,
}

#[derive(Clone)]
pub struct InFlightSet {
    inner: Arc<Inner>,
}

impl InFlightSet {
    pub fn new(stale_after: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: DashMap::new(),
                stale_after,
                next_token: AtomicU64::new(1),
            }),
        }
    }

    /// Atomically claim `key`, or fail with `OperationBlocked`.
    pub fn try_acquire(&self, key: TargetKey) -> Result<InFlightGuard, EngineError> {
        let token = self.inner.next_token.fetch_add(1, Ordering::Relaxed);
        let holder = Holder { token, since: Instant::now() };

        match self.inner.entries.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                let age = occupied.get().since.elapsed();
                if !key.expires() || age < self.inner.stale_after {
                    return Err(EngineError::OperationBlocked { target: key.to_string() });
                }
                tracing::warn!(
                    "[InFlight] Reclaiming stale entry {} held for {}s",
                    key,
                    age.as_secs()
                );
                let _stale = occupied.insert(holder);
            },
            Entry::Vacant(vacant) => {
                let _ = vacant.insert(holder);
            },
        }

        Ok(InFlightGuard { inner: Arc::clone(&self.inner), key, token })
    }

    pub fn is_held(&self, key: &TargetKey) -> bool {
        self.inner.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    /// Held keys with their ages, sorted by key.
    pub fn snapshot(&self) -> Vec<InFlightEntry> {
        let mut entries: Vec<InFlightEntry> = self
            .inner
            .entries
            .iter()
            .map(|entry| InFlightEntry {
                key: entry.key().to_string(),
                age_secs: entry.value().since.elapsed().as_secs(),
            })
            .collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        entries
    }
}

/// Holds a target key until dropped.
#[must_use = "the target is released as soon as the guard is dropped"]
pub struct InFlightGuard {
    inner: Arc<Inner>,
    key: TargetKey,
    token: u64,
}

impl fmt::Debug for InFlightGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InFlightGuard").field("key", &self.key).finish()
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        // A reclaimed entry belongs to its new holder.
        let token = self.token;
        let _ = self.inner.entries.remove_if(&self.key, |_, holder| holder.token == token);
    }
}
