//! Structured record of sync activity
//!
//! Remote failures never fail the caller's operation, so they are published
//! here instead: a bounded history for polling, and a broadcast channel for
//! live subscribers.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Number of events kept for `recent()`
const HISTORY_LIMIT: usize = 256;

/// Capacity of the live channel before slow subscribers start lagging
const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum SyncEventKind {
    /// A remote write failed and was queued for retry
    RemoteWriteFailed { operation: String, deck_id: Uuid, error: String },
    /// A write was queued behind earlier undelivered writes
    Queued { operation: String, deck_id: Uuid },
    /// A queued write was delivered
    RetrySucceeded { operation: String, deck_id: Uuid, attempts: u32 },
    /// A queued write failed again and stays queued
    RetryFailed { operation: String, deck_id: Uuid, attempts: u32, error: String },
    /// The remote store refused a write for good; it is no longer retried
    Rejected { operation: String, deck_id: Uuid, error: String },
    /// Remote read failed, local records were served instead
    RemoteReadFailed { error: String },
    /// Local cache was replaced by a fresh remote read
    CacheRefreshed { decks: usize },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncEvent {
    pub user_id: String,
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: SyncEventKind,
}

/// Event sink shared by the flashcard manager
pub struct SyncEvents {
    sender: broadcast::Sender<SyncEvent>,
    history: Mutex<VecDeque<SyncEvent>>,
}

impl Default for SyncEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncEvents {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            history: Mutex::new(VecDeque::with_capacity(HISTORY_LIMIT)),
        }
    }

    /// Record an event and log it
    pub fn emit(&self, user_id: &str, kind: SyncEventKind) {
        match &kind {
            SyncEventKind::RemoteWriteFailed { operation, deck_id, error } => {
                log::warn!("sync: {} for deck {} failed, queued for retry: {}", operation, deck_id, error);
            }
            SyncEventKind::RetryFailed { operation, deck_id, attempts, error } => {
                log::warn!(
                    "sync: retry {} of {} for deck {} failed: {}",
                    attempts,
                    operation,
                    deck_id,
                    error
                );
            }
            SyncEventKind::Rejected { operation, deck_id, error } => {
                log::warn!("sync: {} for deck {} rejected by remote, dropped from queue: {}", operation, deck_id, error);
            }
            SyncEventKind::RemoteReadFailed { error } => {
                log::warn!("sync: remote read for {} failed, serving local decks: {}", user_id, error);
            }
            SyncEventKind::Queued { operation, deck_id } => {
                log::debug!("sync: {} for deck {} queued behind pending writes", operation, deck_id);
            }
            SyncEventKind::RetrySucceeded { operation, deck_id, .. } => {
                log::info!("sync: queued {} for deck {} delivered", operation, deck_id);
            }
            SyncEventKind::CacheRefreshed { decks } => {
                log::debug!("sync: refreshed {} local decks for {}", decks, user_id);
            }
        }

        let event = SyncEvent {
            user_id: user_id.to_string(),
            at: Utc::now(),
            kind,
        };

        {
            let mut history = self.history.lock().unwrap_or_else(|p| p.into_inner());
            if history.len() == HISTORY_LIMIT {
                history.pop_front();
            }
            history.push_back(event.clone());
        }

        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    /// Receive events as they happen
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.sender.subscribe()
    }

    /// Most recent events, oldest first
    pub fn recent(&self) -> Vec<SyncEvent> {
        let history = self.history.lock().unwrap_or_else(|p| p.into_inner());
        history.iter().cloned().collect()
    }

    /// Most recent failures for one user
    pub fn failures_for(&self, user_id: &str) -> Vec<SyncEvent> {
        self.recent()
            .into_iter()
            .filter(|e| e.user_id == user_id)
            .filter(|e| {
                matches!(
                    e.kind,
                    SyncEventKind::RemoteWriteFailed { .. }
                        | SyncEventKind::RetryFailed { .. }
                        | SyncEventKind::Rejected { .. }
                        | SyncEventKind::RemoteReadFailed { .. }
                )
            })
            .collect()
    }
}
