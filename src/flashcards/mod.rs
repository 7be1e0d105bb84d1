//! Flashcard decks and spaced repetition
//!
//! This module provides:
//! - Deck and card models with tolerant loading of stored state
//! - SM-2 scheduling with sub-day learning steps
//! - Card lifecycle (new, learning, review, mastered)
//! - Due card selection and review ordering
//! - Deck statistics and study history
//! - CSV/TSV/JSON import and export
//! - A manager that writes locally first and mirrors to a sync server

pub mod algorithm;
pub mod due;
pub mod error;
pub mod lifecycle;
pub mod manager;
pub mod models;
pub mod stats;
pub mod transfer;

pub use due::DueLimits;
pub use error::{FlashcardError, Result};
pub use manager::{FlashcardManager, NewDeck, SyncReport};
pub use models::*;
pub use transfer::{DeckExport, TransferFormat};
