use anyhow::{Context, Result};

use kioku_lib::flashcards::CardContent;

use crate::app::App;
use crate::OutputFormat;

pub async fn run(
    app: &App,
    deck_name: &str,
    front: String,
    back: String,
    hint: Option<String>,
    tags: Option<&str>,
    format: &OutputFormat,
) -> Result<()> {
    let deck = app.find_deck(deck_name).await?;

    let content = CardContent {
        front,
        back,
        hint,
        tags: tags
            .map(|t| {
                t.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default(),
        notes: None,
    };

    let card = app
        .manager
        .add_card(&app.user_id, app.entitlement, deck.id, content)
        .await
        .context("Failed to add card")?;

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "id": card.id.to_string(),
                "deckId": deck.id.to_string(),
                "front": card.content.front,
                "back": card.content.back,
                "tags": card.content.tags,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            println!("Added \"{}\" to deck \"{}\"", card.content.front, deck.name);
            if !card.content.tags.is_empty() {
                println!(
                    "  Tags: {}",
                    card.content.tags.iter().map(|t| format!("#{}", t)).collect::<Vec<_>>().join(" ")
                );
            }
            println!("  ID: {}", card.id);
        }
    }

    Ok(())
}
