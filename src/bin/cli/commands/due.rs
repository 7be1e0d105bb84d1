use anyhow::Result;
use chrono::Utc;

use kioku_lib::flashcards::algorithm::format_interval;
use kioku_lib::flashcards::due::select_due_batches;
use kioku_lib::flashcards::{DueBatch, DueLimits};

use crate::app::App;
use crate::render::terminal::{card_front, paint, status_label, Color};
use crate::OutputFormat;

/// Due batches for one deck or all of the user's decks
pub async fn collect(app: &App, deck_name: Option<&str>, limits: DueLimits) -> Result<Vec<DueBatch>> {
    match deck_name {
        Some(name) => {
            let deck = app.find_deck(name).await?;
            Ok(select_due_batches(std::slice::from_ref(&deck), Utc::now(), limits))
        }
        None => Ok(app
            .manager
            .get_due_batch(&app.user_id, app.entitlement, limits)
            .await?),
    }
}

pub async fn run(
    app: &App,
    deck_name: Option<&str>,
    limits: DueLimits,
    format: &OutputFormat,
    use_color: bool,
) -> Result<()> {
    let batches = collect(app, deck_name, limits).await?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&batches)?);
        }
        OutputFormat::Plain => {
            if batches.is_empty() {
                println!("Nothing due");
                return Ok(());
            }
            for batch in &batches {
                println!(
                    "{} ({} due)",
                    paint(&batch.deck_name, Color::BOLD, use_color),
                    batch.cards.len()
                );
                for card in &batch.cards {
                    let state = &card.state;
                    let lapses = if state.lapses > 0 {
                        format!("  lapses {}", state.lapses)
                    } else {
                        String::new()
                    };
                    println!(
                        "  {} {:<7} {}{}",
                        status_label(state.status, use_color),
                        format_interval(state.interval),
                        card_front(card, use_color),
                        lapses
                    );
                    println!("           {}", paint(&card.id.to_string(), Color::DIM, use_color));
                }
            }
        }
    }

    Ok(())
}
