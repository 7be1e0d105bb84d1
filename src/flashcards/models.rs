//! Data models for decks, cards and their scheduling state

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use super::error::FlashcardError;

/// A deck is a named collection of flashcards belonging to one owner
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deck {
    pub id: Uuid,
    /// Identifier of the owning user, as issued by the auth provider
    pub user_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default)]
    pub cards: Vec<Flashcard>,
    #[serde(default, deserialize_with = "lenient")]
    pub stats: DeckStats,
    /// Word/sentence list this deck was generated from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_list_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Deck {
    pub fn new(user_id: impl Into<String>, name: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            name,
            description: None,
            color: None,
            cards: Vec::new(),
            stats: DeckStats::default(),
            source_list_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn card(&self, card_id: Uuid) -> Option<&Flashcard> {
        self.cards.iter().find(|c| c.id == card_id)
    }

    pub fn card_mut(&mut self, card_id: Uuid) -> Option<&mut Flashcard> {
        self.cards.iter_mut().find(|c| c.id == card_id)
    }

    /// Repair any card whose scheduling state was stored incomplete or out of range.
    /// Returns the number of cards that needed fixing.
    pub fn repair_cards(&mut self) -> usize {
        let mut repaired = 0;
        for card in &mut self.cards {
            if card.state.repair() {
                log::warn!(
                    "Card {} in deck {} had invalid scheduling state, reset fields to defaults",
                    card.id,
                    self.id
                );
                repaired += 1;
            }
        }
        repaired
    }
}

/// Display payload of a card, opaque to scheduling
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardContent {
    pub front: String,
    pub back: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl CardContent {
    pub fn new(front: impl Into<String>, back: impl Into<String>) -> Self {
        Self {
            front: front.into(),
            back: back.into(),
            ..Default::default()
        }
    }
}

/// A flashcard with question (front) and answer (back)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flashcard {
    pub id: Uuid,
    pub deck_id: Uuid,
    #[serde(flatten)]
    pub content: CardContent,
    /// Presentation-only metadata the scheduler never reads
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
    #[serde(default, deserialize_with = "lenient")]
    pub state: ReviewState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Flashcard {
    pub fn new(deck_id: Uuid, content: CardContent) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            deck_id,
            content,
            extra: BTreeMap::new(),
            state: ReviewState::default(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Status of a card in the spaced repetition system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum CardStatus {
    /// Never reviewed
    #[default]
    New,
    /// Climbing the sub-day learning steps
    Learning,
    /// Regular day-granularity review
    Review,
    /// Long interval with high accuracy
    Mastered,
}

impl fmt::Display for CardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CardStatus::New => "new",
            CardStatus::Learning => "learning",
            CardStatus::Review => "review",
            CardStatus::Mastered => "mastered",
        };
        f.write_str(s)
    }
}

/// Qualitative answer given by the learner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReviewOutcome {
    Again,
    Hard,
    Good,
    Easy,
}

impl ReviewOutcome {
    pub const ALL: [ReviewOutcome; 4] = [
        ReviewOutcome::Again,
        ReviewOutcome::Hard,
        ReviewOutcome::Good,
        ReviewOutcome::Easy,
    ];

    /// SM-2 quality for this outcome. The four-button scale never yields 2.
    pub fn quality(self) -> u8 {
        match self {
            ReviewOutcome::Again => 1,
            ReviewOutcome::Hard => 3,
            ReviewOutcome::Good => 4,
            ReviewOutcome::Easy => 5,
        }
    }

    pub fn is_correct(self) -> bool {
        self.quality() >= 3
    }
}

impl FromStr for ReviewOutcome {
    type Err = FlashcardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "again" => Ok(ReviewOutcome::Again),
            "hard" => Ok(ReviewOutcome::Hard),
            "good" => Ok(ReviewOutcome::Good),
            "easy" => Ok(ReviewOutcome::Easy),
            _ => Err(FlashcardError::InvalidOutcome(s.to_string())),
        }
    }
}

/// UI button index (1-4: Again, Hard, Good, Easy)
impl TryFrom<i32> for ReviewOutcome {
    type Error = FlashcardError;

    fn try_from(rating: i32) -> Result<Self, Self::Error> {
        match rating {
            1 => Ok(ReviewOutcome::Again),
            2 => Ok(ReviewOutcome::Hard),
            3 => Ok(ReviewOutcome::Good),
            4 => Ok(ReviewOutcome::Easy),
            other => Err(FlashcardError::InvalidOutcome(other.to_string())),
        }
    }
}

impl fmt::Display for ReviewOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReviewOutcome::Again => "again",
            ReviewOutcome::Hard => "hard",
            ReviewOutcome::Good => "good",
            ReviewOutcome::Easy => "easy",
        };
        f.write_str(s)
    }
}

pub const DEFAULT_EASE_FACTOR: f64 = 2.5;

fn default_ease_factor() -> f64 {
    DEFAULT_EASE_FACTOR
}

/// Read a stored field, taking the type's default when the value is null
/// or of the wrong shape
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match T::deserialize(value) {
        Ok(parsed) => Ok(parsed),
        Err(e) => {
            log::warn!("Unreadable stored value replaced with default: {}", e);
            Ok(T::default())
        }
    }
}

fn lenient_ease_factor<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_f64().unwrap_or_else(|| {
        log::warn!("Unreadable ease factor {} replaced with default", value);
        DEFAULT_EASE_FACTOR
    }))
}

/// Spaced repetition state for a card
///
/// Every field has a serde default so that a card stored without scheduling
/// data loads as a fresh `new` card. A null or malformed field falls back to
/// its default; `repair` then makes the whole state consistent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewState {
    #[serde(default, deserialize_with = "lenient")]
    pub status: CardStatus,
    /// Days until the next review; sub-day values during learning
    #[serde(default, deserialize_with = "lenient")]
    pub interval: f64,
    /// SM-2 ease factor (default 2.5, floor 1.3)
    #[serde(default = "default_ease_factor", deserialize_with = "lenient_ease_factor")]
    pub ease_factor: f64,
    /// Consecutive successful reviews since the last lapse
    #[serde(default, deserialize_with = "lenient")]
    pub repetitions: u32,
    #[serde(default, deserialize_with = "lenient")]
    pub lapses: u32,
    #[serde(default, deserialize_with = "lenient")]
    pub learning_step: u8,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub last_reviewed_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub next_review_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub graduated_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient")]
    pub review_count: u32,
    #[serde(default, deserialize_with = "lenient")]
    pub correct_count: u32,
    #[serde(default, deserialize_with = "lenient")]
    pub streak: u32,
    #[serde(default, deserialize_with = "lenient")]
    pub best_streak: u32,
    /// Running mean of answer times in milliseconds
    #[serde(default, deserialize_with = "lenient")]
    pub average_response_ms: f64,
}

impl Default for ReviewState {
    fn default() -> Self {
        Self {
            status: CardStatus::New,
            interval: 0.0,
            ease_factor: DEFAULT_EASE_FACTOR,
            repetitions: 0,
            lapses: 0,
            learning_step: 0,
            last_reviewed_at: None,
            next_review_at: None,
            graduated_at: None,
            review_count: 0,
            correct_count: 0,
            streak: 0,
            best_streak: 0,
            average_response_ms: 0.0,
        }
    }
}

impl ReviewState {
    /// Fraction of reviews answered correctly, 0 when never reviewed
    pub fn accuracy(&self) -> f64 {
        if self.review_count == 0 {
            0.0
        } else {
            self.correct_count as f64 / self.review_count as f64
        }
    }

    /// Check if the card is due for review at `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        if self.status == CardStatus::New {
            return true;
        }
        match self.next_review_at {
            Some(at) => at <= now,
            None => true,
        }
    }

    /// Clamp values that no review could have produced. Returns true if anything changed.
    pub fn repair(&mut self) -> bool {
        let mut changed = false;
        if !self.ease_factor.is_finite() || self.ease_factor < super::algorithm::MIN_EASE_FACTOR {
            self.ease_factor = if self.ease_factor.is_finite() {
                super::algorithm::MIN_EASE_FACTOR
            } else {
                DEFAULT_EASE_FACTOR
            };
            changed = true;
        }
        if !self.interval.is_finite() || self.interval < 0.0 {
            self.interval = 0.0;
            changed = true;
        }
        if self.learning_step > super::algorithm::MAX_LEARNING_STEP {
            self.learning_step = super::algorithm::MAX_LEARNING_STEP;
            changed = true;
        }
        if self.correct_count > self.review_count {
            self.correct_count = self.review_count;
            changed = true;
        }
        if self.status != CardStatus::New && self.review_count == 0 {
            *self = ReviewState::default();
            changed = true;
        }
        changed
    }
}

/// Aggregate statistics for a deck
///
/// The card-derived counters are recomputed from the cards on every change;
/// the session fields accumulate history and survive recomputation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckStats {
    #[serde(default)]
    pub total_cards: usize,
    #[serde(default)]
    pub new_cards: usize,
    #[serde(default)]
    pub learning_cards: usize,
    #[serde(default)]
    pub review_cards: usize,
    #[serde(default)]
    pub mastered_cards: usize,
    #[serde(default)]
    pub due_cards: usize,
    #[serde(default)]
    pub total_reviews: u64,
    #[serde(default)]
    pub correct_reviews: u64,
    #[serde(default)]
    pub average_ease: f64,
    /// Cards studied per calendar day (`YYYY-MM-DD`)
    #[serde(default)]
    pub heatmap: BTreeMap<String, u32>,
    #[serde(default)]
    pub total_study_secs: u64,
    #[serde(default)]
    pub session_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_studied_at: Option<DateTime<Utc>>,
}

impl DeckStats {
    pub fn accuracy(&self) -> f64 {
        if self.total_reviews == 0 {
            0.0
        } else {
            self.correct_reviews as f64 / self.total_reviews as f64
        }
    }
}

/// A finished study session, folded into the deck's history
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudySession {
    pub deck_id: Uuid,
    pub cards_studied: u32,
    pub duration_secs: u64,
    pub studied_at: DateTime<Utc>,
}

/// One entry of a user-owned word or sentence collection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceListItem {
    /// Primary text (the word or sentence itself)
    pub text: String,
    /// Meaning or translation
    #[serde(default, alias = "translation")]
    pub meaning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reading: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A user-owned word or sentence collection a deck can be generated from
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceList {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub items: Vec<SourceListItem>,
}

/// Fields of a deck a caller may change directly
#[derive(Debug, Clone, Default)]
pub struct DeckUpdate {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub color: Option<Option<String>>,
}

/// Whether the user's plan permits remote sync, as reported by the
/// subscription service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Entitlement {
    /// Plan lookup has not finished yet
    #[default]
    Unknown,
    LocalOnly,
    CloudSync,
}

impl Entitlement {
    pub fn allows_sync(self) -> bool {
        self == Entitlement::CloudSync
    }
}

impl From<bool> for Entitlement {
    fn from(entitled: bool) -> Self {
        if entitled {
            Entitlement::CloudSync
        } else {
            Entitlement::LocalOnly
        }
    }
}

/// A deck's due cards, in review order
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DueBatch {
    pub deck_id: Uuid,
    pub deck_name: String,
    pub cards: Vec<Flashcard>,
}
