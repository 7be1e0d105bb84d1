//! JSON file-per-deck store
//!
//! Directory structure:
//! ```text
//! {data_dir}/
//! └── decks/
//!     └── {deck-id}.json   # Deck record with its cards
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use super::{sort_decks, DeckStore, Result, StorageEstimate, StoreError};
use crate::flashcards::Deck;

pub struct FileDeckStore {
    decks_dir: PathBuf,
    quota_bytes: u64,
}

impl FileDeckStore {
    pub fn new(data_dir: PathBuf, quota_bytes: u64) -> Result<Self> {
        let decks_dir = data_dir.join("decks");
        fs::create_dir_all(&decks_dir)?;
        Ok(Self {
            decks_dir,
            quota_bytes,
        })
    }

    /// Get the default data directory
    pub fn default_data_dir() -> Result<PathBuf> {
        dirs::data_local_dir()
            .map(|p| p.join("kioku"))
            .ok_or(StoreError::DataDirNotFound)
    }

    fn deck_path(&self, deck_id: Uuid) -> PathBuf {
        self.decks_dir.join(format!("{}.json", deck_id))
    }

    fn load_deck_from_path(&self, path: &Path) -> Result<Deck> {
        let content = fs::read_to_string(path)?;
        let mut deck: Deck = serde_json::from_str(&content)?;
        deck.repair_cards();
        Ok(deck)
    }

    fn deck_files(&self) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        if !self.decks_dir.exists() {
            return Ok(paths);
        }
        for entry in fs::read_dir(&self.decks_dir)? {
            let path = entry?.path();
            if path.extension().map_or(false, |ext| ext == "json") {
                paths.push(path);
            }
        }
        Ok(paths)
    }
}

impl DeckStore for FileDeckStore {
    fn get(&self, deck_id: Uuid) -> Result<Option<Deck>> {
        let path = self.deck_path(deck_id);
        if !path.exists() {
            return Ok(None);
        }
        self.load_deck_from_path(&path).map(Some)
    }

    fn put(&self, deck: &Deck) -> Result<()> {
        let content = serde_json::to_string_pretty(deck)?;
        let tmp_path = self.decks_dir.join(format!(".deck-{}.tmp", Uuid::new_v4()));
        let written = fs::write(&tmp_path, content).and_then(|_| fs::rename(&tmp_path, self.deck_path(deck.id)));
        if let Err(e) = written {
            if let Err(cleanup) = fs::remove_file(&tmp_path) {
                log::debug!("Could not remove {:?}: {}", tmp_path, cleanup);
            }
            return Err(e.into());
        }
        Ok(())
    }

    fn delete(&self, deck_id: Uuid) -> Result<bool> {
        let path = self.deck_path(deck_id);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path)?;
        Ok(true)
    }

    fn list_by_owner(&self, user_id: &str) -> Result<Vec<Deck>> {
        let mut decks = Vec::new();
        for path in self.deck_files()? {
            match self.load_deck_from_path(&path) {
                Ok(deck) if deck.user_id == user_id => decks.push(deck),
                Ok(_) => {}
                Err(e) => {
                    log::warn!("Failed to load deck from {:?}: {}", path, e);
                }
            }
        }
        sort_decks(&mut decks);
        Ok(decks)
    }

    fn estimate(&self) -> Result<StorageEstimate> {
        let mut usage = 0;
        for path in self.deck_files()? {
            usage += fs::metadata(&path)?.len();
        }
        Ok(StorageEstimate {
            usage,
            quota: self.quota_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flashcards::{CardContent, CardStatus, Flashcard};
    use tempfile::TempDir;

    fn create_test_store() -> (FileDeckStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = FileDeckStore::new(temp_dir.path().to_path_buf(), 1024 * 1024).unwrap();
        (store, temp_dir)
    }

    #[test]
    fn test_put_and_get_deck() {
        let (store, _temp) = create_test_store();

        let mut deck = Deck::new("alice", "Hiragana".to_string());
        deck.cards.push(Flashcard::new(deck.id, CardContent::new("あ", "a")));
        store.put(&deck).unwrap();

        let loaded = store.get(deck.id).unwrap().unwrap();
        assert_eq!(loaded.name, "Hiragana");
        assert_eq!(loaded.cards.len(), 1);
        assert_eq!(loaded.cards[0].content.front, "あ");
    }

    #[test]
    fn test_get_missing_deck() {
        let (store, _temp) = create_test_store();
        assert!(store.get(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_list_by_owner_filters_and_orders() {
        let (store, _temp) = create_test_store();

        let first = Deck::new("alice", "First".to_string());
        let mut second = Deck::new("alice", "Second".to_string());
        second.created_at = first.created_at + chrono::Duration::seconds(5);
        let other = Deck::new("bob", "Other".to_string());

        store.put(&second).unwrap();
        store.put(&other).unwrap();
        store.put(&first).unwrap();

        let decks = store.list_by_owner("alice").unwrap();
        let names: Vec<_> = decks.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["First", "Second"]);
    }

    #[test]
    fn test_unreadable_file_is_skipped() {
        let (store, temp) = create_test_store();
        store.put(&Deck::new("alice", "Good".to_string())).unwrap();
        fs::write(temp.path().join("decks").join("broken.json"), "{ nope").unwrap();

        let decks = store.list_by_owner("alice").unwrap();
        assert_eq!(decks.len(), 1);
    }

    #[test]
    fn test_corrupt_card_state_is_repaired_on_load() {
        let (store, _temp) = create_test_store();
        let mut deck = Deck::new("alice", "Broken".to_string());
        let mut card = Flashcard::new(deck.id, CardContent::new("木", "tree"));
        card.state.status = CardStatus::Review;
        card.state.ease_factor = 0.2;
        deck.cards.push(card);
        store.put(&deck).unwrap();

        let loaded = store.get(deck.id).unwrap().unwrap();
        assert_eq!(loaded.cards[0].state.status, CardStatus::New);
        assert_eq!(loaded.cards[0].state.ease_factor, 2.5);
    }

    #[test]
    fn test_failed_put_leaves_no_temp_file() {
        let (store, temp) = create_test_store();
        let deck = Deck::new("alice", "Blocked".to_string());
        // A non-empty directory where the record should go makes the rename fail
        let blocker = temp.path().join("decks").join(format!("{}.json", deck.id));
        fs::create_dir_all(blocker.join("inner")).unwrap();

        assert!(matches!(store.put(&deck), Err(StoreError::Io(_))));

        let leftovers: Vec<_> = fs::read_dir(temp.path().join("decks"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "temp files left behind: {:?}", leftovers);
    }

    #[test]
    fn test_null_scheduling_field_keeps_deck_readable() {
        let (store, temp) = create_test_store();
        let mut deck = Deck::new("alice", "Loose".to_string());
        deck.cards.push(Flashcard::new(deck.id, CardContent::new("星", "star")));
        deck.cards.push(Flashcard::new(deck.id, CardContent::new("空", "sky")));
        store.put(&deck).unwrap();

        let path = temp.path().join("decks").join(format!("{}.json", deck.id));
        let mut raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        raw["cards"][0]["state"]["easeFactor"] = serde_json::Value::Null;
        raw["cards"][1]["state"]["status"] = serde_json::json!("frozen");
        fs::write(&path, raw.to_string()).unwrap();

        let loaded = store.get(deck.id).unwrap().unwrap();
        assert_eq!(loaded.cards.len(), 2);
        assert_eq!(loaded.cards[0].state.ease_factor, 2.5);
        assert_eq!(loaded.cards[1].state.status, CardStatus::New);

        let listed = store.list_by_owner("alice").unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].cards.len(), 2);
    }

    #[test]
    fn test_delete_and_estimate() {
        let (store, _temp) = create_test_store();
        let deck = Deck::new("alice", "Temp".to_string());
        store.put(&deck).unwrap();

        let estimate = store.estimate().unwrap();
        assert!(estimate.usage > 0);
        assert_eq!(estimate.quota, 1024 * 1024);

        assert!(store.delete(deck.id).unwrap());
        assert!(!store.delete(deck.id).unwrap());
        assert_eq!(store.estimate().unwrap().usage, 0);
    }

    #[test]
    fn test_replace_owner() {
        let (store, _temp) = create_test_store();
        let stale = Deck::new("alice", "Stale".to_string());
        let kept = Deck::new("bob", "Bob's".to_string());
        store.put(&stale).unwrap();
        store.put(&kept).unwrap();

        let fresh = Deck::new("alice", "Fresh".to_string());
        store.replace_owner("alice", &[fresh.clone()]).unwrap();

        let alice = store.list_by_owner("alice").unwrap();
        assert_eq!(alice.len(), 1);
        assert_eq!(alice[0].id, fresh.id);
        assert_eq!(store.list_by_owner("bob").unwrap().len(), 1);
    }
}
