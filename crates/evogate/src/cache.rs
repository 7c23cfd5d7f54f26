//! Per-instance cached state: connection status and group directory.
//!
//! Reads return the last snapshot without touching the network. Refreshes
//! are explicit; concurrent refreshes of the same resource coalesce into a
//! single network call whose outcome every caller observes. A failed
//! refresh leaves the prior value in place and reports the error alongside
//! it, so callers choose between stale data and hard failure.

use std::future::Future;
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::{Error, Refreshed};

// ============================================================================
// Cached values
// ============================================================================

/// Gateway session connection status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Open,
    Closed,
    Connecting,
    Unknown,
}

impl ConnectionState {
    /// Map the gateway's state string; anything unrecognized is `Unknown`.
    pub fn from_wire(raw: &str) -> ConnectionState {
        match raw.to_ascii_lowercase().as_str() {
            "open" => ConnectionState::Open,
            "close" | "closed" => ConnectionState::Closed,
            "connecting" => ConnectionState::Connecting,
            _ => ConnectionState::Unknown,
        }
    }
}

/// Connection status with the time it was last confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSnapshot {
    pub state: ConnectionState,
    pub checked_at: Option<DateTime<Utc>>,
}

impl ConnectionSnapshot {
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Open
    }
}

impl Default for ConnectionSnapshot {
    fn default() -> Self {
        Self {
            state: ConnectionState::Unknown,
            checked_at: None,
        }
    }
}

/// One group the instance participates in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSummary {
    pub id: String,
    pub name: String,
    pub participant_count: Option<u32>,
}

/// Ordered group listing with the time it was last fetched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupDirectory {
    pub groups: Vec<GroupSummary>,
    pub refreshed_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Coalescer
// ============================================================================

/// Leader/follower merge of concurrent identical refreshes.
///
/// The first caller installs a broadcast channel and runs the fetch;
/// followers subscribe and await the published outcome. If the leader is
/// cancelled before publishing, its sender drops, followers wake with a
/// closed-channel error, and one of them takes over.
#[derive(Debug)]
struct Coalescer<T> {
    inflight: Mutex<Option<broadcast::Sender<T>>>,
}

impl<T: Clone> Coalescer<T> {
    fn new() -> Self {
        Self {
            inflight: Mutex::new(None),
        }
    }

    async fn run<F, Fut>(&self, fetch: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        loop {
            let rx = {
                let mut slot = self.inflight.lock().expect("inflight lock poisoned");
                match slot.as_ref() {
                    Some(tx) => Some(tx.subscribe()),
                    None => {
                        let (tx, _) = broadcast::channel(1);
                        *slot = Some(tx);
                        None
                    }
                }
            };
            let Some(mut rx) = rx else { break };
            match rx.recv().await {
                Ok(outcome) => return outcome,
                // Leader dropped without publishing; contend again.
                Err(_) => continue,
            }
        }

        let guard = LeaderGuard { slot: &self.inflight };
        let outcome = fetch().await;
        if let Some(tx) = guard.take() {
            // No receivers is fine; the leader has its own copy.
            let _ = tx.send(outcome.clone());
        }
        outcome
    }
}

/// Clears the in-flight slot if the leader unwinds or is cancelled, waking
/// followers so one can take over.
struct LeaderGuard<'a, T> {
    slot: &'a Mutex<Option<broadcast::Sender<T>>>,
}

impl<T> LeaderGuard<'_, T> {
    fn take(&self) -> Option<broadcast::Sender<T>> {
        self.slot.lock().expect("inflight lock poisoned").take()
    }
}

impl<T> Drop for LeaderGuard<'_, T> {
    fn drop(&mut self) {
        let _ = self.take();
    }
}

// ============================================================================
// StateCache
// ============================================================================

/// Cached read-back state for one gateway instance. Created at instance
/// registration, dropped at removal; there is no process-global cache.
#[derive(Debug)]
pub struct StateCache {
    connection: RwLock<ConnectionSnapshot>,
    groups: RwLock<GroupDirectory>,
    connection_inflight: Coalescer<Refreshed<ConnectionSnapshot>>,
    groups_inflight: Coalescer<Refreshed<GroupDirectory>>,
}

impl Default for StateCache {
    fn default() -> Self {
        Self {
            connection: RwLock::new(ConnectionSnapshot::default()),
            groups: RwLock::new(GroupDirectory::default()),
            connection_inflight: Coalescer::new(),
            groups_inflight: Coalescer::new(),
        }
    }
}

impl StateCache {
    /// Last-known connection snapshot, possibly stale. Never blocks on the
    /// network.
    pub fn connection(&self) -> ConnectionSnapshot {
        *self.connection.read().expect("connection lock poisoned")
    }

    /// Last-known group directory, possibly stale.
    pub fn groups(&self) -> GroupDirectory {
        self.groups.read().expect("groups lock poisoned").clone()
    }

    /// Refresh the connection snapshot through `fetch`, coalescing with any
    /// in-flight refresh.
    pub async fn refresh_connection<F, Fut>(&self, fetch: F) -> Refreshed<ConnectionSnapshot>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ConnectionState, Error>>,
    {
        self.connection_inflight
            .run(|| async move {
                match fetch().await {
                    Ok(state) => {
                        let snapshot = ConnectionSnapshot {
                            state,
                            checked_at: Some(Utc::now()),
                        };
                        *self.connection.write().expect("connection lock poisoned") = snapshot;
                        Refreshed {
                            value: snapshot,
                            error: None,
                        }
                    }
                    Err(e) => {
                        debug!(error = %e, "connection refresh failed, keeping stale value");
                        Refreshed {
                            value: self.connection(),
                            error: Some(Arc::new(e)),
                        }
                    }
                }
            })
            .await
    }

    /// Refresh the group directory through `fetch`, coalescing with any
    /// in-flight refresh.
    pub async fn refresh_groups<F, Fut>(&self, fetch: F) -> Refreshed<GroupDirectory>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<GroupSummary>, Error>>,
    {
        self.groups_inflight
            .run(|| async move {
                match fetch().await {
                    Ok(groups) => {
                        let directory = GroupDirectory {
                            groups,
                            refreshed_at: Some(Utc::now()),
                        };
                        *self.groups.write().expect("groups lock poisoned") = directory.clone();
                        Refreshed {
                            value: directory,
                            error: None,
                        }
                    }
                    Err(e) => {
                        debug!(error = %e, "group refresh failed, keeping stale value");
                        Refreshed {
                            value: self.groups(),
                            error: Some(Arc::new(e)),
                        }
                    }
                }
            })
            .await
    }
}
