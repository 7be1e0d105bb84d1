//! Kioku: flashcard decks with spaced repetition review and optional cloud sync

pub mod config;
pub mod flashcards;
pub mod storage;
pub mod sync;

pub use config::Config;
pub use flashcards::{FlashcardError, FlashcardManager};
