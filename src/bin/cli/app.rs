use std::path::Path;

use anyhow::{bail, Context, Result};

use kioku_lib::config::Config;
use kioku_lib::flashcards::{Deck, DueLimits, Entitlement, FlashcardManager};

/// Shared application state for CLI commands
pub struct App {
    pub config: Config,
    pub manager: FlashcardManager,
    pub user_id: String,
    pub entitlement: Entitlement,
}

impl App {
    /// Load config and open the deck store
    pub fn new(config_path: Option<&Path>, user_id: String, entitled: bool) -> Result<Self> {
        let config = match config_path {
            Some(path) => Config::load(path),
            None => Config::load_default(),
        }
        .context("Failed to load config")?;

        let manager = FlashcardManager::from_config(&config).context("Failed to open deck store")?;

        let entitlement = if entitled && config.remote.base_url.is_none() {
            log::warn!("--entitled given but no [remote] base_url configured; working locally");
            Entitlement::LocalOnly
        } else {
            Entitlement::from(entitled)
        };

        Ok(Self {
            config,
            manager,
            user_id,
            entitlement,
        })
    }

    pub async fn list_decks(&self) -> Result<Vec<Deck>> {
        self.manager
            .get_decks(&self.user_id, self.entitlement)
            .await
            .context("Failed to list decks")
    }

    /// Find a deck by name (case-insensitive prefix match) or id
    pub async fn find_deck(&self, name: &str) -> Result<Deck> {
        let decks = self.list_decks().await?;

        if let Some(deck) = decks.iter().find(|d| d.id.to_string() == name) {
            return Ok(deck.clone());
        }

        let name_lower = name.to_lowercase();

        // Exact match first
        if let Some(deck) = decks.iter().find(|d| d.name.to_lowercase() == name_lower) {
            return Ok(deck.clone());
        }

        // Prefix match
        let matches: Vec<&Deck> = decks
            .iter()
            .filter(|d| d.name.to_lowercase().starts_with(&name_lower))
            .collect();

        match matches.len() {
            0 => bail!(
                "No deck matching '{}'. Available decks:\n{}",
                name,
                decks
                    .iter()
                    .map(|d| format!("  - {}", d.name))
                    .collect::<Vec<_>>()
                    .join("\n")
            ),
            1 => Ok(matches[0].clone()),
            _ => bail!(
                "Ambiguous deck name '{}'. Matches:\n{}",
                name,
                matches
                    .iter()
                    .map(|d| format!("  - {}", d.name))
                    .collect::<Vec<_>>()
                    .join("\n")
            ),
        }
    }

    /// Review caps from config, overridden by command-line values
    pub fn due_limits(&self, per_deck: Option<usize>, total: Option<usize>) -> DueLimits {
        let configured = self.config.due_limits();
        DueLimits {
            per_deck: per_deck.or(configured.per_deck),
            total: total.or(configured.total),
        }
    }
}
