//! Selection and ordering of due cards
//!
//! A card is due when it is new, has no scheduled time, or its scheduled time
//! has passed. Due cards are reviewed highest priority first:
//!
//! | component | score                                   |
//! |-----------|-----------------------------------------|
//! | overdue   | `min(100, days overdue × 10)`, if > 0   |
//! | lapses    | `lapses × 20`                           |
//! | status    | learning +30, new +20                   |
//! | ease      | `(2.5 − ease) × 10`                     |

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use super::models::{CardStatus, Deck, DueBatch, Flashcard, DEFAULT_EASE_FACTOR};

const SECONDS_PER_DAY: f64 = 24.0 * 60.0 * 60.0;
const MAX_OVERDUE_BONUS: f64 = 100.0;
const OVERDUE_BONUS_PER_DAY: f64 = 10.0;
const LAPSE_BONUS: f64 = 20.0;
const LEARNING_BONUS: f64 = 30.0;
const NEW_BONUS: f64 = 20.0;
const EASE_BONUS_SCALE: f64 = 10.0;

/// Caps applied when building a review batch
#[derive(Debug, Clone, Copy, Default)]
pub struct DueLimits {
    /// Most cards taken from any single deck
    pub per_deck: Option<usize>,
    /// Budget shared by all decks, drained in deck order
    pub total: Option<usize>,
}

/// All cards due at `now`, in input order
pub fn due_cards<'a>(cards: &'a [Flashcard], now: DateTime<Utc>) -> Vec<&'a Flashcard> {
    cards.iter().filter(|card| card.state.is_due(now)).collect()
}

/// Priority of a card at `now`; higher is reviewed first
pub fn priority_score(card: &Flashcard, now: DateTime<Utc>) -> f64 {
    let state = &card.state;
    let mut score = 0.0;

    if let Some(next_review_at) = state.next_review_at {
        let overdue_days = (now - next_review_at).num_seconds() as f64 / SECONDS_PER_DAY;
        if overdue_days > 0.0 {
            score += (overdue_days * OVERDUE_BONUS_PER_DAY).min(MAX_OVERDUE_BONUS);
        }
    }

    score += f64::from(state.lapses) * LAPSE_BONUS;

    score += match state.status {
        CardStatus::Learning => LEARNING_BONUS,
        CardStatus::New => NEW_BONUS,
        CardStatus::Review | CardStatus::Mastered => 0.0,
    };

    score += (DEFAULT_EASE_FACTOR - state.ease_factor) * EASE_BONUS_SCALE;
    score
}

/// Order cards by descending priority. Ties keep their input order.
pub fn prioritize<'a>(cards: Vec<&'a Flashcard>, now: DateTime<Utc>) -> Vec<&'a Flashcard> {
    let mut scored: Vec<(f64, &Flashcard)> = cards
        .into_iter()
        .map(|card| (priority_score(card, now), card))
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
    scored.into_iter().map(|(_, card)| card).collect()
}

/// Build review batches across decks.
///
/// Decks are visited in the given order. Each deck contributes its due cards
/// in priority order, capped by `per_deck` and by whatever remains of the
/// shared `total` budget. Decks with nothing due are omitted; once the budget
/// is spent, later decks get nothing.
pub fn select_due_batches(decks: &[Deck], now: DateTime<Utc>, limits: DueLimits) -> Vec<DueBatch> {
    let mut remaining = limits.total;
    let mut batches = Vec::new();

    for deck in decks {
        if remaining == Some(0) {
            break;
        }

        let ordered = prioritize(due_cards(&deck.cards, now), now);
        let mut take = ordered.len();
        if let Some(per_deck) = limits.per_deck {
            take = take.min(per_deck);
        }
        if let Some(budget) = remaining {
            take = take.min(budget);
        }
        if take == 0 {
            continue;
        }

        if let Some(budget) = remaining.as_mut() {
            *budget -= take;
        }

        batches.push(DueBatch {
            deck_id: deck.id,
            deck_name: deck.name.clone(),
            cards: ordered.into_iter().take(take).cloned().collect(),
        });
    }

    batches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flashcards::models::{CardContent, ReviewState};
    use chrono::Duration;
    use uuid::Uuid;

    fn card(front: &str, state: ReviewState) -> Flashcard {
        let mut card = Flashcard::new(Uuid::new_v4(), CardContent::new(front, "back"));
        card.state = state;
        card
    }

    fn reviewed(next_review_at: DateTime<Utc>) -> ReviewState {
        ReviewState {
            status: CardStatus::Review,
            interval: 5.0,
            repetitions: 4,
            review_count: 4,
            correct_count: 4,
            next_review_at: Some(next_review_at),
            ..Default::default()
        }
    }

    fn fronts(cards: &[&Flashcard]) -> Vec<String> {
        cards.iter().map(|c| c.content.front.clone()).collect()
    }

    #[test]
    fn test_new_cards_always_due() {
        let now = Utc::now();
        let mut state = ReviewState::default();
        state.next_review_at = Some(now + Duration::days(10));
        let cards = vec![card("new", state), card("future", reviewed(now + Duration::days(1)))];

        let due = due_cards(&cards, now);
        assert_eq!(fronts(&due), vec!["new"]);
    }

    #[test]
    fn test_missing_next_review_is_due() {
        let now = Utc::now();
        let state = ReviewState {
            status: CardStatus::Review,
            next_review_at: None,
            review_count: 1,
            ..Default::default()
        };
        let cards = vec![card("orphan", state)];
        assert_eq!(due_cards(&cards, now).len(), 1);
    }

    #[test]
    fn test_due_exactly_now() {
        let now = Utc::now();
        let cards = vec![card("edge", reviewed(now))];
        assert_eq!(due_cards(&cards, now).len(), 1);
    }

    #[test]
    fn test_priority_components() {
        let now = Utc::now();

        let new_card = card("new", ReviewState::default());
        assert!((priority_score(&new_card, now) - 20.0).abs() < 1e-9);

        let mut overdue = reviewed(now - Duration::days(3));
        overdue.lapses = 2;
        overdue.ease_factor = 2.0;
        let overdue = card("overdue", overdue);
        // 30 overdue + 40 lapses + 0 status + 5 ease
        assert!((priority_score(&overdue, now) - 75.0).abs() < 1e-6);

        let very_overdue = card("ancient", reviewed(now - Duration::days(400)));
        assert!((priority_score(&very_overdue, now) - 100.0).abs() < 1e-6);

        let not_due = card("later", reviewed(now + Duration::days(2)));
        assert!(priority_score(&not_due, now).abs() < 1e-9);
    }

    #[test]
    fn test_prioritize_orders_descending_and_stable() {
        let now = Utc::now();
        let learning = ReviewState {
            status: CardStatus::Learning,
            review_count: 1,
            next_review_at: Some(now),
            ..Default::default()
        };
        let cards = vec![
            card("review", reviewed(now)),
            card("new-a", ReviewState::default()),
            card("learning", learning),
            card("new-b", ReviewState::default()),
        ];

        let ordered = prioritize(cards.iter().collect(), now);
        assert_eq!(fronts(&ordered), vec!["learning", "new-a", "new-b", "review"]);
    }

    fn deck_with_new_cards(name: &str, count: usize) -> Deck {
        let mut deck = Deck::new("user", name.to_string());
        for i in 0..count {
            deck.cards
                .push(Flashcard::new(deck.id, CardContent::new(format!("{name}-{i}"), "x")));
        }
        deck
    }

    #[test]
    fn test_shared_budget_drains_in_deck_order() {
        let now = Utc::now();
        let decks = vec![
            deck_with_new_cards("a", 4),
            deck_with_new_cards("b", 4),
            deck_with_new_cards("c", 4),
        ];

        let batches = select_due_batches(
            &decks,
            now,
            DueLimits {
                per_deck: None,
                total: Some(6),
            },
        );

        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].cards.len(), 4);
        assert_eq!(batches[1].cards.len(), 2);
        assert_eq!(batches[1].deck_name, "b");
    }

    #[test]
    fn test_per_deck_limit_applies_before_budget() {
        let now = Utc::now();
        let decks = vec![
            deck_with_new_cards("a", 4),
            Deck::new("user", "empty".to_string()),
            deck_with_new_cards("c", 4),
        ];

        let batches = select_due_batches(
            &decks,
            now,
            DueLimits {
                per_deck: Some(3),
                total: Some(5),
            },
        );

        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].cards.len(), 3);
        assert_eq!(batches[1].deck_name, "c");
        assert_eq!(batches[1].cards.len(), 2);
    }

    #[test]
    fn test_unlimited_returns_everything_due() {
        let now = Utc::now();
        let decks = vec![deck_with_new_cards("a", 2), deck_with_new_cards("b", 3)];
        let batches = select_due_batches(&decks, now, DueLimits::default());
        let total: usize = batches.iter().map(|b| b.cards.len()).sum();
        assert_eq!(total, 5);
    }
}
