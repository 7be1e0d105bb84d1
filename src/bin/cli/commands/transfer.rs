use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use kioku_lib::flashcards::{Deck, SourceList, TransferFormat};

use crate::app::App;
use crate::OutputFormat;

fn resolve_format(explicit: Option<&str>, path: Option<&Path>) -> Result<Option<TransferFormat>> {
    match explicit {
        Some(name) => Ok(Some(name.parse::<TransferFormat>()?)),
        None => Ok(path.and_then(TransferFormat::from_path)),
    }
}

fn print_created(deck: &Deck, format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "id": deck.id.to_string(),
                "name": deck.name,
                "cards": deck.cards.len(),
                "sourceListId": deck.source_list_id,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            println!("Created deck \"{}\" with {} cards", deck.name, deck.cards.len());
            println!("  ID: {}", deck.id);
        }
    }
    Ok(())
}

pub async fn run_import(
    app: &App,
    file: &Path,
    name: Option<String>,
    file_format: Option<&str>,
    format: &OutputFormat,
) -> Result<()> {
    let transfer_format = resolve_format(file_format, Some(file))?
        .with_context(|| format!("Cannot tell the format of {}; pass --as", file.display()))?;
    let data = fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))?;

    // Delimited files carry no deck name
    let name = match transfer_format {
        TransferFormat::Json => name,
        _ => name.or_else(|| file.file_stem().map(|s| s.to_string_lossy().into_owned())),
    };

    let deck = app
        .manager
        .import_deck(&app.user_id, app.entitlement, name, &data, transfer_format)
        .await
        .with_context(|| format!("Failed to import {}", file.display()))?;

    print_created(&deck, format)
}

pub async fn run_export(app: &App, deck_name: &str, output: Option<&Path>, file_format: Option<&str>) -> Result<()> {
    let deck = app.find_deck(deck_name).await?;
    let transfer_format = resolve_format(file_format, output)?.unwrap_or(TransferFormat::Csv);

    let data = app
        .manager
        .export_deck(&app.user_id, deck.id, transfer_format)
        .context("Failed to export deck")?;

    match output {
        Some(path) => {
            fs::write(path, data).with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Exported {} cards to {}", deck.cards.len(), path.display());
        }
        None => print!("{}", data),
    }

    Ok(())
}

pub async fn run_import_list(app: &App, file: &Path, format: &OutputFormat) -> Result<()> {
    let data = fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let list: SourceList =
        serde_json::from_str(&data).with_context(|| format!("{} is not a word list", file.display()))?;

    let deck = app
        .manager
        .import_from_list(&app.user_id, app.entitlement, &list)
        .await
        .context("Failed to create deck from list")?;

    print_created(&deck, format)
}
