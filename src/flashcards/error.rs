use thiserror::Error;
use uuid::Uuid;

use crate::config::ConfigError;
use crate::storage::StoreError;
use crate::sync::RemoteError;

#[derive(Error, Debug)]
pub enum FlashcardError {
    #[error("Local store error: {0}")]
    Store(#[from] StoreError),

    #[error("Local storage quota exceeded: need {required} bytes, {available} available")]
    QuotaExceeded { required: u64, available: u64 },

    #[error("Deck not found: {0}")]
    DeckNotFound(Uuid),

    #[error("Card not found: {0}")]
    CardNotFound(Uuid),

    #[error("Invalid review outcome: {0}")]
    InvalidOutcome(String),

    #[error("Import error: {0}")]
    Import(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Remote setup error: {0}")]
    Remote(#[from] RemoteError),
}

pub type Result<T> = std::result::Result<T, FlashcardError>;
