use kioku_lib::flashcards::{CardStatus, DeckStats, Flashcard};

/// ANSI color codes
pub struct Color;

impl Color {
    pub const RESET: &'static str = "\x1b[0m";
    pub const BOLD: &'static str = "\x1b[1m";
    pub const DIM: &'static str = "\x1b[2m";
    pub const RED: &'static str = "\x1b[31m";
    pub const GREEN: &'static str = "\x1b[32m";
    pub const YELLOW: &'static str = "\x1b[33m";
    pub const BLUE: &'static str = "\x1b[34m";
}

pub fn paint(text: &str, color: &str, use_color: bool) -> String {
    if use_color {
        format!("{}{}{}", color, text, Color::RESET)
    } else {
        text.to_string()
    }
}

pub fn status_label(status: CardStatus, use_color: bool) -> String {
    let color = match status {
        CardStatus::New => Color::BLUE,
        CardStatus::Learning => Color::RED,
        CardStatus::Review => Color::YELLOW,
        CardStatus::Mastered => Color::GREEN,
    };
    paint(&format!("{:<8}", status.to_string()), color, use_color)
}

/// One-line summary of a deck's statistics
pub fn stats_line(stats: &DeckStats, use_color: bool) -> String {
    let due = paint(&format!("{} due", stats.due_cards), Color::BOLD, use_color);
    format!(
        "{} cards, {}  (new {}, learning {}, review {}, mastered {})  accuracy {:.0}%",
        stats.total_cards,
        due,
        stats.new_cards,
        stats.learning_cards,
        stats.review_cards,
        stats.mastered_cards,
        stats.accuracy() * 100.0
    )
}

/// Card front with its hint dimmed
pub fn card_front(card: &Flashcard, use_color: bool) -> String {
    match &card.content.hint {
        Some(hint) => format!("{}  {}", card.content.front, paint(hint, Color::DIM, use_color)),
        None => card.content.front.clone(),
    }
}
