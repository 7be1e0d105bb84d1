//! SM-2 Spaced Repetition Algorithm
//!
//! Calculates the next scheduling state of a card from its current state and
//! the learner's answer. Pure: the caller supplies `now`, nothing is stored.
//!
//! Outcomes map onto SM-2 quality ratings as again=1, hard=3, good=4, easy=5.
//! The first two successes after a card is new (or after a lapse) climb a
//! ladder of sub-day learning steps (10 minutes, then 30 minutes). From the
//! third success on, the interval is measured in whole days and grows by the
//! ease factor.

use chrono::{DateTime, Duration, Utc};

use super::lifecycle;
use super::models::{ReviewOutcome, ReviewState};

/// Minimum ease factor allowed
pub const MIN_EASE_FACTOR: f64 = 1.3;

/// Highest rung of the learning ladder
pub const MAX_LEARNING_STEP: u8 = 2;

/// Sub-day learning steps, in minutes
pub const LEARNING_STEPS_MINUTES: [i64; 2] = [10, 30];

/// Smallest day-granularity interval, given on graduation
pub const GRADUATING_INTERVAL_DAYS: f64 = 1.0;

/// Upper bound on any interval (100 years)
pub const MAX_INTERVAL_DAYS: f64 = 36_500.0;

const MINUTES_PER_DAY: f64 = 24.0 * 60.0;
const SECONDS_PER_DAY: f64 = 24.0 * 60.0 * 60.0;

/// Interval in days for a learning step
pub fn learning_step_interval(step: usize) -> f64 {
    let idx = step.min(LEARNING_STEPS_MINUTES.len() - 1);
    LEARNING_STEPS_MINUTES[idx] as f64 / MINUTES_PER_DAY
}

/// SM-2 ease adjustment, floored at [`MIN_EASE_FACTOR`]
///
/// EF' = EF + (0.1 - (5-q) * (0.08 + (5-q) * 0.02))
pub fn adjust_ease(ease_factor: f64, quality: u8) -> f64 {
    let q = f64::from(quality.min(5));
    let delta = 0.1 - (5.0 - q) * (0.08 + (5.0 - q) * 0.02);
    (ease_factor + delta).max(MIN_EASE_FACTOR)
}

/// Convert a fractional day interval to a duration, rounded to the second
pub fn interval_to_duration(days: f64) -> Duration {
    let days = days.clamp(0.0, MAX_INTERVAL_DAYS);
    Duration::seconds((days * SECONDS_PER_DAY).round() as i64)
}

/// Calculate the next scheduling state for a review
///
/// Lapses reset `repetitions` to 0, count towards `lapses` (once the card has
/// left `new`), send the card back to the first learning step and leave the
/// ease factor untouched.
pub fn compute_next(
    state: &ReviewState,
    outcome: ReviewOutcome,
    response_ms: u64,
    now: DateTime<Utc>,
) -> ReviewState {
    let mut next = state.clone();

    if outcome.is_correct() {
        next.ease_factor = adjust_ease(state.ease_factor, outcome.quality());
        next.repetitions = state.repetitions.saturating_add(1);
        next.interval = match next.repetitions {
            1 => learning_step_interval(0),
            2 => learning_step_interval(1),
            _ => (state.interval * next.ease_factor)
                .round()
                .clamp(GRADUATING_INTERVAL_DAYS, MAX_INTERVAL_DAYS),
        };
        next.correct_count = state.correct_count.saturating_add(1);
        next.streak = state.streak.saturating_add(1);
        next.best_streak = next.best_streak.max(next.streak);
    } else {
        next.repetitions = 0;
        if lifecycle::has_left_new(state) {
            next.lapses = state.lapses.saturating_add(1);
        }
        next.interval = learning_step_interval(0);
        next.streak = 0;
    }

    next.review_count = state.review_count.saturating_add(1);
    next.average_response_ms = state.average_response_ms
        + (response_ms as f64 - state.average_response_ms) / f64::from(next.review_count);

    lifecycle::apply_transition(state, &mut next, outcome, now);

    next.last_reviewed_at = Some(now);
    next.next_review_at = Some(now + interval_to_duration(next.interval));
    next
}

/// Calculate the interval each outcome would give, in button order
/// (again, hard, good, easy). Used to label the answer buttons.
pub fn preview_intervals(state: &ReviewState, now: DateTime<Utc>) -> [f64; 4] {
    ReviewOutcome::ALL.map(|outcome| compute_next(state, outcome, 0, now).interval)
}

/// Format an interval in days to a short human-readable string
pub fn format_interval(days: f64) -> String {
    if days <= 0.0 {
        return "now".to_string();
    }
    let minutes = (days * MINUTES_PER_DAY).round() as i64;
    if minutes < 60 {
        return format!("{}m", minutes.max(1));
    }
    if days < 1.0 {
        return format!("{}h", minutes / 60);
    }

    let days = days.round() as i64;
    if days < 7 {
        format!("{}d", days)
    } else if days < 30 {
        format!("{}w", days / 7)
    } else if days < 365 {
        format!("{}mo", days / 30)
    } else {
        format!("{}y", days / 365)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flashcards::models::CardStatus;

    fn new_card_state() -> ReviewState {
        ReviewState::default()
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_first_review_good() {
        let now = Utc::now();
        let result = compute_next(&new_card_state(), ReviewOutcome::Good, 1200, now);

        assert_eq!(result.status, CardStatus::Learning);
        assert_eq!(result.repetitions, 1);
        assert!(approx(result.interval, 10.0 / 1440.0));
        assert!(approx(result.ease_factor, 2.5));
        assert_eq!(result.next_review_at, Some(now + Duration::minutes(10)));
        assert_eq!(result.learning_step, 1);
        assert_eq!(result.review_count, 1);
        assert_eq!(result.correct_count, 1);
        assert_eq!(result.lapses, 0);
        assert!(approx(result.average_response_ms, 1200.0));
    }

    #[test]
    fn test_second_review_uses_second_step() {
        let now = Utc::now();
        let first = compute_next(&new_card_state(), ReviewOutcome::Good, 0, now);
        let second = compute_next(&first, ReviewOutcome::Good, 0, now);

        assert_eq!(second.status, CardStatus::Learning);
        assert_eq!(second.repetitions, 2);
        assert_eq!(second.next_review_at, Some(now + Duration::minutes(30)));
        assert_eq!(second.learning_step, 2);
    }

    #[test]
    fn test_third_success_graduates() {
        let now = Utc::now();
        let mut state = new_card_state();
        for _ in 0..3 {
            state = compute_next(&state, ReviewOutcome::Good, 0, now);
        }

        assert_eq!(state.status, CardStatus::Review);
        assert_eq!(state.repetitions, 3);
        assert!(approx(state.interval, 1.0));
        assert_eq!(state.graduated_at, Some(now));
    }

    #[test]
    fn test_subsequent_review_multiplies_by_ease() {
        let state = ReviewState {
            status: CardStatus::Review,
            repetitions: 5,
            interval: 10.0,
            ease_factor: 2.5,
            review_count: 5,
            correct_count: 5,
            ..Default::default()
        };

        let result = compute_next(&state, ReviewOutcome::Good, 0, Utc::now());

        // 10 * 2.5 = 25
        assert!(approx(result.interval, 25.0));
        assert_eq!(result.repetitions, 6);
    }

    #[test]
    fn test_hard_lowers_ease_and_easy_raises_it() {
        let state = ReviewState {
            status: CardStatus::Review,
            repetitions: 3,
            interval: 10.0,
            review_count: 3,
            correct_count: 3,
            ..Default::default()
        };
        let now = Utc::now();

        let hard = compute_next(&state, ReviewOutcome::Hard, 0, now);
        assert!(approx(hard.ease_factor, 2.36));
        assert!(approx(hard.interval, 24.0));

        let easy = compute_next(&state, ReviewOutcome::Easy, 0, now);
        assert!(approx(easy.ease_factor, 2.6));
        assert!(approx(easy.interval, 26.0));
    }

    #[test]
    fn test_lapse_resets_without_touching_ease() {
        let state = ReviewState {
            status: CardStatus::Review,
            repetitions: 5,
            interval: 20.0,
            ease_factor: 2.0,
            lapses: 1,
            review_count: 8,
            correct_count: 7,
            streak: 4,
            best_streak: 4,
            learning_step: 2,
            ..Default::default()
        };
        let now = Utc::now();

        let result = compute_next(&state, ReviewOutcome::Again, 0, now);

        assert_eq!(result.status, CardStatus::Learning);
        assert_eq!(result.repetitions, 0);
        assert_eq!(result.lapses, 2);
        assert!(approx(result.interval, 10.0 / 1440.0));
        assert!(approx(result.ease_factor, 2.0));
        assert_eq!(result.learning_step, 0);
        assert_eq!(result.streak, 0);
        assert_eq!(result.best_streak, 4);
        assert_eq!(result.correct_count, 7);
        assert_eq!(result.review_count, 9);
    }

    #[test]
    fn test_again_on_new_card_is_not_a_lapse() {
        let result = compute_next(&new_card_state(), ReviewOutcome::Again, 0, Utc::now());
        assert_eq!(result.status, CardStatus::Learning);
        assert_eq!(result.lapses, 0);
        assert_eq!(result.repetitions, 0);
    }

    #[test]
    fn test_repeated_again_never_underflows() {
        let now = Utc::now();
        let mut state = new_card_state();
        for _ in 0..5 {
            state = compute_next(&state, ReviewOutcome::Again, 0, now);
            assert_eq!(state.repetitions, 0);
            assert!(state.interval >= 0.0);
        }
        assert_eq!(state.lapses, 4);
    }

    #[test]
    fn test_ease_factor_minimum() {
        let now = Utc::now();
        let mut state = ReviewState {
            ease_factor: 1.4,
            ..Default::default()
        };
        let pattern = [
            ReviewOutcome::Hard,
            ReviewOutcome::Again,
            ReviewOutcome::Hard,
            ReviewOutcome::Hard,
            ReviewOutcome::Good,
            ReviewOutcome::Hard,
        ];
        for outcome in pattern.iter().cycle().take(60) {
            state = compute_next(&state, *outcome, 0, now);
            assert!(state.ease_factor >= MIN_EASE_FACTOR);
        }
    }

    #[test]
    fn test_mastery_needs_interval_and_accuracy() {
        let now = Utc::now();
        let accurate = ReviewState {
            status: CardStatus::Review,
            repetitions: 4,
            interval: 10.0,
            review_count: 9,
            correct_count: 9,
            ..Default::default()
        };
        let result = compute_next(&accurate, ReviewOutcome::Good, 0, now);
        assert!(result.interval >= 21.0);
        assert_eq!(result.status, CardStatus::Mastered);

        // Long interval but 7/10 correct
        let sloppy = ReviewState {
            review_count: 9,
            correct_count: 6,
            ..accurate.clone()
        };
        let result = compute_next(&sloppy, ReviewOutcome::Good, 0, now);
        assert!(result.interval >= 21.0);
        assert_eq!(result.status, CardStatus::Review);

        // Perfect accuracy but short interval
        let short = ReviewState {
            interval: 3.0,
            ..accurate
        };
        let result = compute_next(&short, ReviewOutcome::Good, 0, now);
        assert!(result.interval < 21.0);
        assert_eq!(result.status, CardStatus::Review);
    }

    #[test]
    fn test_mastered_card_lapses_to_learning() {
        let state = ReviewState {
            status: CardStatus::Mastered,
            repetitions: 8,
            interval: 60.0,
            review_count: 10,
            correct_count: 10,
            ..Default::default()
        };
        let result = compute_next(&state, ReviewOutcome::Again, 0, Utc::now());
        assert_eq!(result.status, CardStatus::Learning);
        assert_eq!(result.lapses, 1);
    }

    #[test]
    fn test_interval_is_capped() {
        let state = ReviewState {
            status: CardStatus::Mastered,
            repetitions: 30,
            interval: MAX_INTERVAL_DAYS,
            review_count: 30,
            correct_count: 30,
            ..Default::default()
        };
        let result = compute_next(&state, ReviewOutcome::Easy, 0, Utc::now());
        assert!(approx(result.interval, MAX_INTERVAL_DAYS));
    }

    #[test]
    fn test_preview_intervals() {
        let preview = preview_intervals(&new_card_state(), Utc::now());
        assert!(approx(preview[0], 10.0 / 1440.0));
        assert!(preview.iter().skip(1).all(|i| approx(*i, 10.0 / 1440.0)));
    }

    #[test]
    fn test_format_interval() {
        assert_eq!(format_interval(0.0), "now");
        assert_eq!(format_interval(10.0 / 1440.0), "10m");
        assert_eq!(format_interval(0.25), "6h");
        assert_eq!(format_interval(1.0), "1d");
        assert_eq!(format_interval(5.0), "5d");
        assert_eq!(format_interval(7.0), "1w");
        assert_eq!(format_interval(14.0), "2w");
        assert_eq!(format_interval(30.0), "1mo");
        assert_eq!(format_interval(90.0), "3mo");
        assert_eq!(format_interval(365.0), "1y");
        assert_eq!(format_interval(730.0), "2y");
    }
}
