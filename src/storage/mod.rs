//! Local persistent store for deck records
//!
//! One record per deck, holding the deck's full card array, keyed by deck id
//! and looked up by owner. This is the source of truth for users without
//! cloud sync and the offline cache for those with it.

mod file_store;
mod memory;

pub use file_store::FileDeckStore;
pub use memory::MemoryDeckStore;

use thiserror::Error;
use uuid::Uuid;

use crate::flashcards::Deck;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Data directory not found")]
    DataDirNotFound,
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Space used by the store and the quota it must stay under, in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageEstimate {
    pub usage: u64,
    pub quota: u64,
}

impl StorageEstimate {
    /// Bytes still writable after holding back `buffer_fraction` of the quota
    pub fn available(&self, buffer_fraction: f64) -> u64 {
        let buffer = (self.quota as f64 * buffer_fraction).ceil() as u64;
        self.quota.saturating_sub(self.usage).saturating_sub(buffer)
    }
}

/// Whole-record access to locally stored decks
pub trait DeckStore: Send + Sync {
    /// Load a deck. Returns Ok(None) if no record exists.
    fn get(&self, deck_id: Uuid) -> Result<Option<Deck>>;

    /// Insert or replace a deck record
    fn put(&self, deck: &Deck) -> Result<()>;

    /// Remove a deck record. Returns whether a record existed.
    fn delete(&self, deck_id: Uuid) -> Result<bool>;

    /// All decks belonging to `user_id`, oldest first
    fn list_by_owner(&self, user_id: &str) -> Result<Vec<Deck>>;

    /// Current usage against the configured quota
    fn estimate(&self) -> Result<StorageEstimate>;

    /// Replace every record of `user_id` with `decks`
    fn replace_owner(&self, user_id: &str, decks: &[Deck]) -> Result<()> {
        for existing in self.list_by_owner(user_id)? {
            self.delete(existing.id)?;
        }
        for deck in decks {
            self.put(deck)?;
        }
        Ok(())
    }
}

/// Sort decks oldest first, ties by name, so enumeration order is stable
pub(crate) fn sort_decks(decks: &mut [Deck]) {
    decks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.name.cmp(&b.name)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_available_holds_back_buffer() {
        let estimate = StorageEstimate {
            usage: 200,
            quota: 1000,
        };
        assert_eq!(estimate.available(0.1), 700);
        assert_eq!(estimate.available(0.0), 800);

        let full = StorageEstimate {
            usage: 950,
            quota: 1000,
        };
        assert_eq!(full.available(0.1), 0);
    }
}
