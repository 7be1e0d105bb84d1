use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use uuid::Uuid;

use super::{sort_decks, DeckStore, Result, StorageEstimate};
use crate::flashcards::Deck;

/// In-memory deck store for tests and ephemeral guest sessions.
///
/// Usage is measured as the serialized JSON size of the stored records.
pub struct MemoryDeckStore {
    decks: Mutex<HashMap<Uuid, String>>,
    quota_bytes: u64,
    simulate_write_error: AtomicBool,
}

impl MemoryDeckStore {
    pub fn new(quota_bytes: u64) -> Self {
        Self {
            decks: Mutex::new(HashMap::new()),
            quota_bytes,
            simulate_write_error: AtomicBool::new(false),
        }
    }

    /// Make every subsequent `put` fail, for testing error handling
    pub fn set_simulate_write_error(&self, simulate: bool) {
        self.simulate_write_error.store(simulate, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, String>> {
        // Records are replaced whole, so a poisoned map is still consistent
        self.decks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MemoryDeckStore {
    fn default() -> Self {
        Self::new(u64::MAX)
    }
}

impl DeckStore for MemoryDeckStore {
    fn get(&self, deck_id: Uuid) -> Result<Option<Deck>> {
        let decks = self.lock();
        match decks.get(&deck_id) {
            Some(json) => {
                let mut deck: Deck = serde_json::from_str(json)?;
                deck.repair_cards();
                Ok(Some(deck))
            }
            None => Ok(None),
        }
    }

    fn put(&self, deck: &Deck) -> Result<()> {
        if self.simulate_write_error.load(Ordering::SeqCst) {
            return Err(std::io::Error::other("simulated write failure").into());
        }
        let json = serde_json::to_string(deck)?;
        self.lock().insert(deck.id, json);
        Ok(())
    }

    fn delete(&self, deck_id: Uuid) -> Result<bool> {
        Ok(self.lock().remove(&deck_id).is_some())
    }

    fn list_by_owner(&self, user_id: &str) -> Result<Vec<Deck>> {
        let decks = self.lock();
        let mut owned = Vec::new();
        for json in decks.values() {
            let mut deck: Deck = serde_json::from_str(json)?;
            if deck.user_id == user_id {
                deck.repair_cards();
                owned.push(deck);
            }
        }
        sort_decks(&mut owned);
        Ok(owned)
    }

    fn estimate(&self) -> Result<StorageEstimate> {
        let usage = self.lock().values().map(|json| json.len() as u64).sum();
        Ok(StorageEstimate {
            usage,
            quota: self.quota_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoreError;

    #[test]
    fn test_round_trip_and_usage() {
        let store = MemoryDeckStore::new(10_000);
        let deck = Deck::new("guest", "Numbers".to_string());
        store.put(&deck).unwrap();

        assert_eq!(store.get(deck.id).unwrap().unwrap().name, "Numbers");
        let estimate = store.estimate().unwrap();
        assert_eq!(estimate.usage, serde_json::to_string(&deck).unwrap().len() as u64);
        assert_eq!(estimate.quota, 10_000);
    }

    #[test]
    fn test_simulated_write_error() {
        let store = MemoryDeckStore::default();
        store.set_simulate_write_error(true);
        let result = store.put(&Deck::new("guest", "Nope".to_string()));
        assert!(matches!(result, Err(StoreError::Io(_))));
        assert!(store.is_empty());
    }
}
