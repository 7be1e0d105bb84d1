use anyhow::{bail, Result};

use kioku_lib::sync::{QueueItem, SyncEvent};

use crate::app::App;
use crate::OutputFormat;

pub async fn run_sync(app: &App, format: &OutputFormat) -> Result<()> {
    if !app.entitlement.allows_sync() {
        bail!("Sync needs --entitled and a [remote] base_url in the config");
    }

    let report = app.manager.sync_pending(&app.user_id, app.entitlement).await;

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "delivered": report.delivered,
                "failed": report.failed,
                "rejected": report.rejected,
                "remaining": report.remaining,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            println!("Delivered {} queued changes", report.delivered);
            if report.rejected > 0 {
                println!("{} refused by the server and dropped", report.rejected);
            }
            if report.remaining > 0 {
                println!("{} still waiting", report.remaining);
            }
        }
    }

    Ok(())
}

fn describe(event: &SyncEvent) -> String {
    serde_json::to_value(&event.kind)
        .ok()
        .and_then(|v| v.as_object().cloned())
        .map(|fields| {
            fields
                .iter()
                .map(|(k, v)| match v {
                    serde_json::Value::String(s) => format!("{}={}", k, s),
                    other => format!("{}={}", k, other),
                })
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default()
}

fn item_json(item: &QueueItem) -> serde_json::Value {
    serde_json::json!({
        "id": item.id.to_string(),
        "operation": item.operation.kind(),
        "deckId": item.operation.deck_id().to_string(),
        "queuedAt": item.created_at.to_rfc3339(),
        "retries": item.retries,
        "lastError": item.last_error,
    })
}

fn describe_item(item: &QueueItem) -> String {
    let error = item.last_error.as_deref().unwrap_or("not yet attempted");
    format!(
        "{} deck {} (retries {}): {}",
        item.operation.kind(),
        item.operation.deck_id(),
        item.retries,
        error
    )
}

pub async fn run_events(app: &App, format: &OutputFormat) -> Result<()> {
    // Listing decks drains the queue and refreshes the cache
    app.list_decks().await?;

    let events: Vec<SyncEvent> = app
        .manager
        .events()
        .recent()
        .into_iter()
        .filter(|e| e.user_id == app.user_id)
        .collect();
    let pending = app.manager.pending_sync_items(&app.user_id);
    let rejected = app.manager.rejected_sync_items(&app.user_id);

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "events": events,
                "pending": pending.iter().map(item_json).collect::<Vec<_>>(),
                "rejected": rejected.iter().map(item_json).collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            if events.is_empty() {
                println!("(no sync activity)");
            }
            for event in &events {
                println!("{}  {}", event.at.format("%H:%M:%S"), describe(event));
            }
            if !pending.is_empty() {
                println!();
                println!("Waiting to sync:");
                for item in &pending {
                    println!("  {}", describe_item(item));
                }
            }
            if !rejected.is_empty() {
                println!();
                println!("Refused by the server:");
                for item in &rejected {
                    println!("  {}", describe_item(item));
                }
            }
        }
    }

    Ok(())
}
