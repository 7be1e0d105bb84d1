use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

use crate::flashcards::{Deck, Flashcard};

/// Rejected writes kept for inspection
const REJECTED_LIMIT: usize = 100;

/// Append-only queue of remote writes that failed and must be retried.
///
/// Items are replayed oldest first. Delivery is at-least-once: an item is
/// only removed after the remote store acknowledged it, or moved to
/// `rejected` once the remote store refused it outright.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RetryQueue {
    pub items: Vec<QueueItem>,
    /// Writes the remote store will never accept; never replayed
    #[serde(default)]
    pub rejected: Vec<QueueItem>,
}

/// A single queued remote write
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    /// Unique ID for this queue item
    pub id: Uuid,
    /// Owner of the deck the write belongs to
    pub user_id: String,
    /// The remote write to perform
    pub operation: RemoteOperation,
    /// When this item was queued
    pub created_at: DateTime<Utc>,
    /// Number of retry attempts
    pub retries: u32,
    /// Last error message if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Remote writes that can be queued. Each carries the full payload as it
/// was when the local write happened.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RemoteOperation {
    CreateDeck { deck: Box<Deck> },
    UpdateDeck { deck: Box<Deck> },
    DeleteDeck { deck_id: Uuid },
    UpsertCard { deck_id: Uuid, card: Box<Flashcard> },
}

impl RemoteOperation {
    pub fn deck_id(&self) -> Uuid {
        match self {
            RemoteOperation::CreateDeck { deck } | RemoteOperation::UpdateDeck { deck } => deck.id,
            RemoteOperation::DeleteDeck { deck_id } | RemoteOperation::UpsertCard { deck_id, .. } => {
                *deck_id
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RemoteOperation::CreateDeck { .. } => "createDeck",
            RemoteOperation::UpdateDeck { .. } => "updateDeck",
            RemoteOperation::DeleteDeck { .. } => "deleteDeck",
            RemoteOperation::UpsertCard { .. } => "upsertCard",
        }
    }
}

impl RetryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an operation to the queue, returning the new item's id
    pub fn enqueue(&mut self, user_id: &str, operation: RemoteOperation) -> Uuid {
        let id = Uuid::new_v4();
        self.items.push(QueueItem {
            id,
            user_id: user_id.to_string(),
            operation,
            created_at: Utc::now(),
            retries: 0,
            last_error: None,
        });
        id
    }

    /// Snapshot of the items in replay order
    pub fn snapshot(&self) -> Vec<QueueItem> {
        self.items.clone()
    }

    /// Count pending items for a user
    pub fn pending_count(&self, user_id: &str) -> usize {
        self.items
            .iter()
            .filter(|item| item.user_id == user_id)
            .count()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Mark an item as completed (remove it)
    pub fn complete(&mut self, item_id: Uuid) {
        self.items.retain(|item| item.id != item_id);
    }

    /// Mark an item as failed with error
    pub fn fail(&mut self, item_id: Uuid, error: String) {
        if let Some(item) = self.items.iter_mut().find(|i| i.id == item_id) {
            item.retries += 1;
            item.last_error = Some(error);
        }
    }

    /// Point a queued item at a different operation
    pub fn retarget(&mut self, item_id: Uuid, operation: RemoteOperation) {
        if let Some(item) = self.items.iter_mut().find(|i| i.id == item_id) {
            item.operation = operation;
        }
    }

    /// Move an item out of the replay order
    pub fn reject(&mut self, item_id: Uuid, error: String) {
        let Some(pos) = self.items.iter().position(|i| i.id == item_id) else {
            return;
        };
        let mut item = self.items.remove(pos);
        item.retries += 1;
        item.last_error = Some(error);
        self.push_rejected(item);
    }

    /// Record a write that was refused before it was ever queued
    pub fn reject_new(&mut self, user_id: &str, operation: RemoteOperation, error: String) {
        self.push_rejected(QueueItem {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            operation,
            created_at: Utc::now(),
            retries: 1,
            last_error: Some(error),
        });
    }

    fn push_rejected(&mut self, item: QueueItem) {
        if self.rejected.len() == REJECTED_LIMIT {
            self.rejected.remove(0);
        }
        self.rejected.push(item);
    }

    /// Load queue from file
    pub fn load(path: &Path) -> Result<Self, std::io::Error> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let data = std::fs::read_to_string(path)?;
        serde_json::from_str(&data).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Save queue to file
    pub fn save(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_queue_is_append_only() {
        let mut queue = RetryQueue::new();
        let deck = Deck::new("alice", "Kana".to_string());

        queue.enqueue("alice", RemoteOperation::UpdateDeck { deck: Box::new(deck.clone()) });
        queue.enqueue("alice", RemoteOperation::UpdateDeck { deck: Box::new(deck.clone()) });
        queue.enqueue("bob", RemoteOperation::DeleteDeck { deck_id: deck.id });

        assert_eq!(queue.pending_count("alice"), 2);
        assert_eq!(queue.pending_count("bob"), 1);
        assert_eq!(queue.items[2].operation.deck_id(), deck.id);
    }

    #[test]
    fn test_complete_and_fail() {
        let mut queue = RetryQueue::new();
        let first = queue.enqueue("alice", RemoteOperation::DeleteDeck { deck_id: Uuid::new_v4() });
        let second = queue.enqueue("alice", RemoteOperation::DeleteDeck { deck_id: Uuid::new_v4() });

        queue.fail(first, "timeout".to_string());
        assert_eq!(queue.items[0].retries, 1);
        assert_eq!(queue.items[0].last_error.as_deref(), Some("timeout"));

        queue.complete(first);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.items[0].id, second);
    }

    #[test]
    fn test_rejected_items_leave_replay_order() {
        let mut queue = RetryQueue::new();
        let first = queue.enqueue("alice", RemoteOperation::DeleteDeck { deck_id: Uuid::new_v4() });
        queue.enqueue("alice", RemoteOperation::DeleteDeck { deck_id: Uuid::new_v4() });

        queue.reject(first, "Resource not found".to_string());
        assert_eq!(queue.pending_count("alice"), 1);
        assert_eq!(queue.rejected.len(), 1);
        assert_eq!(queue.rejected[0].id, first);
        assert_eq!(queue.rejected[0].retries, 1);

        for _ in 0..REJECTED_LIMIT {
            queue.reject_new("alice", RemoteOperation::DeleteDeck { deck_id: Uuid::new_v4() }, "gone".to_string());
        }
        assert_eq!(queue.rejected.len(), REJECTED_LIMIT);
        assert!(queue.rejected.iter().all(|item| item.id != first));
    }

    #[test]
    fn test_load_without_rejected_field() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("sync_queue.json");
        std::fs::write(&path, r#"{"items":[]}"#).unwrap();

        let loaded = RetryQueue::load(&path).unwrap();
        assert!(loaded.is_empty());
        assert!(loaded.rejected.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("sync_queue.json");

        assert!(RetryQueue::load(&path).unwrap().is_empty());

        let mut queue = RetryQueue::new();
        let deck = Deck::new("alice", "Kana".to_string());
        queue.enqueue("alice", RemoteOperation::CreateDeck { deck: Box::new(deck.clone()) });
        queue.save(&path).unwrap();

        let loaded = RetryQueue::load(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.items[0].operation.kind(), "createDeck");
        assert_eq!(loaded.items[0].operation.deck_id(), deck.id);
    }
}
