//! Card status transitions
//!
//! ```text
//!  new ──any answer──▶ learning ──graduates──▶ review ──21d + 90%──▶ mastered
//!                         ▲                      │                     │
//!                         └──────── again ───────┴─────────────────────┘
//! ```
//!
//! Every (status, outcome) pair has a defined successor. `mastered` is
//! re-derived on each review, so a card can drop back to `review` when its
//! accuracy falls, and any lapse returns it to `learning`.

use chrono::{DateTime, Utc};

use super::algorithm::{GRADUATING_INTERVAL_DAYS, MAX_LEARNING_STEP};
use super::models::{CardStatus, ReviewOutcome, ReviewState};

/// Interval in days a card must reach before it counts as mastered
pub const MASTERY_INTERVAL_DAYS: f64 = 21.0;

/// Lifetime accuracy a card must hold before it counts as mastered
pub const MASTERY_ACCURACY: f64 = 0.9;

pub fn has_left_new(state: &ReviewState) -> bool {
    state.status != CardStatus::New
}

pub fn qualifies_for_mastery(state: &ReviewState) -> bool {
    state.interval >= MASTERY_INTERVAL_DAYS && state.accuracy() >= MASTERY_ACCURACY
}

/// Status after a review, given the already-updated interval and counters
pub fn next_status(next: &ReviewState, outcome: ReviewOutcome) -> CardStatus {
    if !outcome.is_correct() {
        return CardStatus::Learning;
    }
    if next.repetitions < 2 || next.interval < GRADUATING_INTERVAL_DAYS {
        return CardStatus::Learning;
    }
    if qualifies_for_mastery(next) {
        CardStatus::Mastered
    } else {
        CardStatus::Review
    }
}

/// Position on the learning ladder after a review
pub fn next_learning_step(prev_step: u8, status: CardStatus, outcome: ReviewOutcome) -> u8 {
    if !outcome.is_correct() {
        0
    } else if status == CardStatus::Learning {
        prev_step.saturating_add(1).min(MAX_LEARNING_STEP)
    } else {
        prev_step
    }
}

/// Apply the status transition for a review to `next`, whose interval and
/// counters have already been updated from `prev`
pub fn apply_transition(
    prev: &ReviewState,
    next: &mut ReviewState,
    outcome: ReviewOutcome,
    now: DateTime<Utc>,
) {
    let status = next_status(next, outcome);
    next.learning_step = next_learning_step(prev.learning_step, status, outcome);

    let was_learning = matches!(prev.status, CardStatus::New | CardStatus::Learning);
    let graduated = matches!(status, CardStatus::Review | CardStatus::Mastered);
    if was_learning && graduated {
        next.graduated_at = Some(now);
    }

    if prev.status != status {
        log::debug!("Card status {} -> {} on {}", prev.status, status, outcome);
    }
    next.status = status;
}
