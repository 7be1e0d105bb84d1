use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::Utc;
use uuid::Uuid;

use kioku_lib::flashcards::algorithm::{format_interval, preview_intervals};
use kioku_lib::flashcards::{DueLimits, ReviewOutcome, StudySession};

use crate::app::App;
use crate::commands::due;
use crate::render::terminal::{card_front, paint, status_label, Color};
use crate::OutputFormat;

/// Accepts a name (again/hard/good/easy) or a button number (1-4)
fn parse_outcome(input: &str) -> Result<ReviewOutcome> {
    let outcome = match input.trim().parse::<i32>() {
        Ok(rating) => ReviewOutcome::try_from(rating)?,
        Err(_) => input.parse::<ReviewOutcome>()?,
    };
    Ok(outcome)
}

pub async fn run_single(
    app: &App,
    deck_name: &str,
    card_id: &str,
    outcome: &str,
    response_ms: u64,
    format: &OutputFormat,
) -> Result<()> {
    let deck = app.find_deck(deck_name).await?;
    let card_id = Uuid::parse_str(card_id).with_context(|| format!("Invalid card id '{}'", card_id))?;
    let outcome = parse_outcome(outcome)?;

    let card = app
        .manager
        .submit_review(&app.user_id, app.entitlement, deck.id, card_id, outcome, response_ms)
        .await
        .context("Failed to record review")?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&card)?);
        }
        OutputFormat::Plain => {
            println!("{} -> {}", outcome, card.state.status);
            println!("  Next review in {}", format_interval(card.state.interval));
            if let Some(next) = card.state.next_review_at {
                println!("  Due: {}", next.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M"));
            }
        }
    }

    Ok(())
}

fn prompt(message: &str) -> Result<Option<String>> {
    print!("{}", message);
    io::stdout().flush()?;
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

/// Walk through due cards, then record a study session per deck
pub async fn run_session(app: &App, deck_name: Option<&str>, limits: DueLimits, use_color: bool) -> Result<()> {
    let batches = due::collect(app, deck_name, limits).await?;
    if batches.is_empty() {
        println!("Nothing due");
        return Ok(());
    }

    let total: usize = batches.iter().map(|b| b.cards.len()).sum();
    println!("{} cards due. Enter shows the answer, q quits.", total);

    let started = Instant::now();
    let mut studied: HashMap<Uuid, u32> = HashMap::new();
    let mut index = 0;

    'session: for batch in &batches {
        for card in &batch.cards {
            index += 1;
            println!();
            println!(
                "[{}/{}] {}  {}",
                index,
                total,
                paint(&batch.deck_name, Color::DIM, use_color),
                status_label(card.state.status, use_color)
            );
            println!("  {}", paint(&card_front(card, use_color), Color::BOLD, use_color));

            let shown = Instant::now();
            match prompt("  ")? {
                None => break 'session,
                Some(input) if input == "q" => break 'session,
                Some(_) => {}
            }
            let response_ms = shown.elapsed().as_millis() as u64;

            println!("  {}", card.content.back);
            if let Some(notes) = &card.content.notes {
                println!("  {}", paint(notes, Color::DIM, use_color));
            }

            let previews = preview_intervals(&card.state, Utc::now());
            let choices: Vec<String> = ReviewOutcome::ALL
                .iter()
                .zip(previews.iter())
                .enumerate()
                .map(|(i, (outcome, days))| format!("{}) {} {}", i + 1, outcome, format_interval(*days)))
                .collect();

            let outcome = loop {
                let Some(input) = prompt(&format!("  {}: ", choices.join("   ")))? else {
                    break 'session;
                };
                if input == "q" {
                    break 'session;
                }
                match parse_outcome(&input) {
                    Ok(outcome) => break outcome,
                    Err(e) => println!("  {}", e),
                }
            };

            let updated = app
                .manager
                .submit_review(&app.user_id, app.entitlement, batch.deck_id, card.id, outcome, response_ms)
                .await
                .context("Failed to record review")?;
            *studied.entry(batch.deck_id).or_insert(0) += 1;

            println!(
                "  {} next in {}",
                status_label(updated.state.status, use_color),
                format_interval(updated.state.interval)
            );
        }
    }

    if studied.is_empty() {
        return Ok(());
    }

    let reviewed: u32 = studied.values().sum();
    let elapsed = started.elapsed().as_secs();
    let studied_at = Utc::now();
    for (deck_id, cards_studied) in &studied {
        // Time is split by share of cards reviewed
        let duration_secs = elapsed * u64::from(*cards_studied) / u64::from(reviewed);
        app.manager
            .record_session(
                &app.user_id,
                app.entitlement,
                StudySession {
                    deck_id: *deck_id,
                    cards_studied: *cards_studied,
                    duration_secs,
                    studied_at,
                },
            )
            .await
            .context("Failed to record study session")?;
    }

    println!();
    println!("Reviewed {} cards in {}m {}s", reviewed, elapsed / 60, elapsed % 60);

    Ok(())
}
