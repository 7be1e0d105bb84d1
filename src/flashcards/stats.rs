//! Deck aggregate statistics

use chrono::{DateTime, Utc};

use super::models::{CardStatus, Deck, DeckStats, StudySession};

/// Recompute the card-derived part of a deck's statistics.
/// Session history (heatmap, time spent) is carried over unchanged.
pub fn recompute(deck: &mut Deck, now: DateTime<Utc>) {
    let mut stats = DeckStats {
        heatmap: std::mem::take(&mut deck.stats.heatmap),
        total_study_secs: deck.stats.total_study_secs,
        session_count: deck.stats.session_count,
        last_studied_at: deck.stats.last_studied_at,
        ..Default::default()
    };

    let mut ease_sum = 0.0;
    for card in &deck.cards {
        let state = &card.state;
        match state.status {
            CardStatus::New => stats.new_cards += 1,
            CardStatus::Learning => stats.learning_cards += 1,
            CardStatus::Review => stats.review_cards += 1,
            CardStatus::Mastered => stats.mastered_cards += 1,
        }
        if state.is_due(now) {
            stats.due_cards += 1;
        }
        stats.total_reviews += u64::from(state.review_count);
        stats.correct_reviews += u64::from(state.correct_count);
        ease_sum += state.ease_factor;
    }

    stats.total_cards = deck.cards.len();
    if !deck.cards.is_empty() {
        stats.average_ease = ease_sum / deck.cards.len() as f64;
    }

    deck.stats = stats;
}

/// Fold a finished study session into the deck's history
pub fn record_session(stats: &mut DeckStats, session: &StudySession) {
    let day = session.studied_at.format("%Y-%m-%d").to_string();
    *stats.heatmap.entry(day).or_insert(0) += session.cards_studied;
    stats.total_study_secs += session.duration_secs;
    stats.session_count += 1;
    stats.last_studied_at = match stats.last_studied_at {
        Some(prev) if prev > session.studied_at => Some(prev),
        _ => Some(session.studied_at),
    };
}

/// Percentage of cards in the deck that are mastered
pub fn mastered_percent(stats: &DeckStats) -> f64 {
    if stats.total_cards == 0 {
        0.0
    } else {
        stats.mastered_cards as f64 * 100.0 / stats.total_cards as f64
    }
}
