use anyhow::{Context, Result};

use kioku_lib::flashcards::stats::mastered_percent;
use kioku_lib::flashcards::NewDeck;

use crate::app::App;
use crate::render::terminal::{paint, stats_line, Color};
use crate::OutputFormat;

pub async fn run_list(app: &App, format: &OutputFormat, use_color: bool) -> Result<()> {
    let decks = app.list_decks().await?;

    match format {
        OutputFormat::Json => {
            let output: Vec<serde_json::Value> = decks
                .iter()
                .map(|deck| {
                    serde_json::json!({
                        "id": deck.id.to_string(),
                        "name": deck.name,
                        "description": deck.description,
                        "sourceListId": deck.source_list_id,
                        "stats": deck.stats,
                        "masteredPercent": mastered_percent(&deck.stats),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            if decks.is_empty() {
                println!("(no decks)");
            }
            for deck in &decks {
                println!("{}", paint(&deck.name, Color::BOLD, use_color));
                if let Some(description) = &deck.description {
                    println!("  {}", description);
                }
                println!("  {}", stats_line(&deck.stats, use_color));
                println!("  ID: {}", deck.id);
            }
            let pending = app.manager.pending_sync_count(&app.user_id);
            if pending > 0 {
                println!();
                println!("{} changes waiting to sync", pending);
            }
        }
    }

    Ok(())
}

pub async fn run_create(
    app: &App,
    name: String,
    description: Option<String>,
    color: Option<String>,
    format: &OutputFormat,
) -> Result<()> {
    let new_deck = NewDeck {
        name,
        description,
        color,
        ..Default::default()
    };
    let deck = app
        .manager
        .create_deck(&app.user_id, app.entitlement, new_deck)
        .await
        .context("Failed to create deck")?;

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "id": deck.id.to_string(),
                "name": deck.name,
                "description": deck.description,
                "color": deck.color,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            println!("Created deck \"{}\"", deck.name);
            println!("  ID: {}", deck.id);
        }
    }

    Ok(())
}
