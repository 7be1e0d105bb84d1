//! Deck and card operations with local-first storage and optional cloud sync
//!
//! Every write lands in the local store first; a failed local write fails the
//! operation. For users whose plan includes sync the write is then mirrored
//! to the remote store. A failed remote write is queued for retry and
//! reported on the sync event channel, but the operation still succeeds.
//! Writes the server refuses for good are set aside instead of retried.
//!
//! Deck records are replaced whole on each sync, so concurrent edits to the
//! same deck from two devices resolve as last write wins.

use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use super::algorithm;
use super::due::{self, DueLimits};
use super::error::{FlashcardError, Result};
use super::models::*;
use super::stats;
use super::transfer::{self, TransferFormat};
use crate::config::{Config, DEFAULT_REMOTE_TIMEOUT_SECS};
use crate::storage::{self, DeckStore, FileDeckStore, StoreError};
use crate::sync::{
    HttpRemoteStore, QueueItem, RemoteDeckStore, RemoteError, RemoteOperation, RetryQueue, SyncEventKind,
    SyncEvents,
};

/// Share of the quota kept free when admitting a new deck
const QUOTA_SAFETY_BUFFER: f64 = 0.10;

/// Extra space a stored deck takes beyond its serialized content
const STRUCTURAL_OVERHEAD: f64 = 1.30;

/// A deck to be created
#[derive(Debug, Clone, Default)]
pub struct NewDeck {
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub source_list_id: Option<String>,
    pub cards: Vec<CardContent>,
}

impl NewDeck {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Outcome of replaying queued remote writes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub delivered: usize,
    pub failed: usize,
    /// Writes the remote store refused for good and dropped from the queue
    pub rejected: usize,
    pub remaining: usize,
}

pub struct FlashcardManager {
    local: Arc<dyn DeckStore>,
    remote: Option<Arc<dyn RemoteDeckStore>>,
    queue: Mutex<RetryQueue>,
    queue_path: Option<PathBuf>,
    events: SyncEvents,
    remote_timeout: Duration,
}

impl FlashcardManager {
    pub fn new(local: Arc<dyn DeckStore>) -> Self {
        Self {
            local,
            remote: None,
            queue: Mutex::new(RetryQueue::new()),
            queue_path: None,
            events: SyncEvents::new(),
            remote_timeout: Duration::from_secs(DEFAULT_REMOTE_TIMEOUT_SECS),
        }
    }

    pub fn with_remote(mut self, remote: Arc<dyn RemoteDeckStore>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Upper bound on any single remote call
    pub fn with_remote_timeout(mut self, timeout: Duration) -> Self {
        self.remote_timeout = timeout;
        self
    }

    /// Persist the retry queue at `path`, picking up anything already queued there
    pub fn with_queue_path(mut self, path: PathBuf) -> Result<Self> {
        let queue = RetryQueue::load(&path).map_err(StoreError::from)?;
        if !queue.is_empty() {
            log::info!("Loaded {} pending remote writes from {:?}", queue.len(), path);
        }
        self.queue = Mutex::new(queue);
        self.queue_path = Some(path);
        Ok(self)
    }

    /// Wire up the file store, persisted retry queue and optional HTTP remote
    pub fn from_config(config: &Config) -> Result<Self> {
        let data_dir = config.data_dir()?;
        let local = FileDeckStore::new(data_dir.clone(), config.storage.quota_bytes)?;
        let mut manager = Self::new(Arc::new(local))
            .with_remote_timeout(config.remote_timeout())
            .with_queue_path(data_dir.join("sync_queue.json"))?;

        if let Some(base_url) = &config.remote.base_url {
            let remote = HttpRemoteStore::new(
                base_url.clone(),
                config.remote.api_token.clone(),
                config.remote_timeout(),
            )?;
            manager = manager.with_remote(Arc::new(remote));
        }

        Ok(manager)
    }

    pub fn events(&self) -> &SyncEvents {
        &self.events
    }

    pub fn pending_sync_count(&self, user_id: &str) -> usize {
        self.lock_queue().pending_count(user_id)
    }

    /// Writes still waiting for the sync server, oldest first
    pub fn pending_sync_items(&self, user_id: &str) -> Vec<QueueItem> {
        self.lock_queue()
            .snapshot()
            .into_iter()
            .filter(|item| item.user_id == user_id)
            .collect()
    }

    /// Writes the sync server refused for good, oldest first
    pub fn rejected_sync_items(&self, user_id: &str) -> Vec<QueueItem> {
        self.lock_queue()
            .rejected
            .iter()
            .filter(|item| item.user_id == user_id)
            .cloned()
            .collect()
    }

    // ==================== Deck Operations ====================

    /// Create a deck, optionally pre-populated with cards.
    ///
    /// Fails with `QuotaExceeded`, persisting nothing, if the deck would not
    /// fit in local storage.
    pub async fn create_deck(&self, user_id: &str, entitlement: Entitlement, new_deck: NewDeck) -> Result<Deck> {
        let now = Utc::now();
        let mut deck = Deck::new(user_id, new_deck.name);
        deck.description = new_deck.description;
        deck.color = new_deck.color;
        deck.source_list_id = new_deck.source_list_id;
        deck.cards = new_deck
            .cards
            .into_iter()
            .map(|content| Flashcard::new(deck.id, content))
            .collect();
        stats::recompute(&mut deck, now);

        self.check_quota(&deck)?;
        self.save_local(&deck)?;
        log::info!("Created deck {} ({} cards) for {}", deck.id, deck.cards.len(), user_id);

        self.sync_write(
            user_id,
            entitlement,
            RemoteOperation::CreateDeck {
                deck: Box::new(deck.clone()),
            },
        )
        .await;

        // The server's copy may have replaced ours
        Ok(self.local.get(deck.id)?.unwrap_or(deck))
    }

    /// All decks of a user, oldest first.
    ///
    /// With sync, a fresh remote read replaces the user's local records; if
    /// the remote cannot be reached the local records are returned.
    pub async fn get_decks(&self, user_id: &str, entitlement: Entitlement) -> Result<Vec<Deck>> {
        let now = Utc::now();

        if let Some(remote) = self.remote_for(entitlement) {
            let report = self.drain_queue(user_id, remote.as_ref()).await;
            if report.remaining > 0 {
                log::debug!(
                    "{} writes still pending for {}, serving local decks",
                    report.remaining,
                    user_id
                );
            } else {
                match self.call_remote(remote.list_decks(user_id)).await {
                    Ok(mut decks) => {
                        for deck in &mut decks {
                            deck.repair_cards();
                            stats::recompute(deck, now);
                        }
                        storage::sort_decks(&mut decks);
                        self.local.replace_owner(user_id, &decks)?;
                        self.events
                            .emit(user_id, SyncEventKind::CacheRefreshed { decks: decks.len() });
                        return Ok(decks);
                    }
                    Err(e) => {
                        self.events
                            .emit(user_id, SyncEventKind::RemoteReadFailed { error: e.to_string() });
                    }
                }
            }
        }

        let mut decks = self.local.list_by_owner(user_id)?;
        for deck in &mut decks {
            stats::recompute(deck, now);
        }
        Ok(decks)
    }

    /// Get a specific deck from local storage
    pub fn get_deck(&self, user_id: &str, deck_id: Uuid) -> Result<Deck> {
        self.load_owned(user_id, deck_id)
    }

    pub async fn update_deck(
        &self,
        user_id: &str,
        entitlement: Entitlement,
        deck_id: Uuid,
        update: DeckUpdate,
    ) -> Result<Deck> {
        let mut deck = self.load_owned(user_id, deck_id)?;

        if let Some(name) = update.name {
            deck.name = name;
        }
        if let Some(description) = update.description {
            deck.description = description;
        }
        if let Some(color) = update.color {
            deck.color = color;
        }
        deck.updated_at = Utc::now();

        self.save_local(&deck)?;
        self.sync_deck(user_id, entitlement, &deck).await;
        Ok(deck)
    }

    /// Delete a deck and all its cards
    pub async fn delete_deck(&self, user_id: &str, entitlement: Entitlement, deck_id: Uuid) -> Result<()> {
        let deck = self.load_owned(user_id, deck_id)?;
        self.local.delete(deck.id)?;
        log::info!("Deleted deck {} ({} cards)", deck.id, deck.cards.len());

        self.sync_write(user_id, entitlement, RemoteOperation::DeleteDeck { deck_id })
            .await;
        Ok(())
    }

    // ==================== Card Operations ====================

    pub async fn add_card(
        &self,
        user_id: &str,
        entitlement: Entitlement,
        deck_id: Uuid,
        content: CardContent,
    ) -> Result<Flashcard> {
        let (_, mut added) = self.insert_cards(user_id, deck_id, vec![content])?;
        let card = added.pop().ok_or(FlashcardError::DeckNotFound(deck_id))?;

        self.sync_write(
            user_id,
            entitlement,
            RemoteOperation::UpsertCard {
                deck_id,
                card: Box::new(card.clone()),
            },
        )
        .await;
        Ok(card)
    }

    /// Add several cards in one write
    pub async fn add_cards(
        &self,
        user_id: &str,
        entitlement: Entitlement,
        deck_id: Uuid,
        contents: Vec<CardContent>,
    ) -> Result<Vec<Flashcard>> {
        let (deck, added) = self.insert_cards(user_id, deck_id, contents)?;
        self.sync_deck(user_id, entitlement, &deck).await;
        Ok(added)
    }

    fn insert_cards(
        &self,
        user_id: &str,
        deck_id: Uuid,
        contents: Vec<CardContent>,
    ) -> Result<(Deck, Vec<Flashcard>)> {
        let now = Utc::now();
        let mut deck = self.load_owned(user_id, deck_id)?;

        let added: Vec<Flashcard> = contents
            .into_iter()
            .map(|content| Flashcard::new(deck_id, content))
            .collect();
        deck.cards.extend(added.iter().cloned());
        deck.updated_at = now;
        stats::recompute(&mut deck, now);

        self.save_local(&deck)?;
        Ok((deck, added))
    }

    /// Replace a card's front/back/hint/tags/notes. Scheduling is untouched.
    pub async fn update_card_content(
        &self,
        user_id: &str,
        entitlement: Entitlement,
        deck_id: Uuid,
        card_id: Uuid,
        content: CardContent,
    ) -> Result<Flashcard> {
        let now = Utc::now();
        let mut deck = self.load_owned(user_id, deck_id)?;
        let card = deck
            .card_mut(card_id)
            .ok_or(FlashcardError::CardNotFound(card_id))?;
        card.content = content;
        card.updated_at = now;
        let updated = card.clone();
        deck.updated_at = now;

        self.save_local(&deck)?;
        self.sync_write(
            user_id,
            entitlement,
            RemoteOperation::UpsertCard {
                deck_id,
                card: Box::new(updated.clone()),
            },
        )
        .await;
        Ok(updated)
    }

    pub async fn remove_card(
        &self,
        user_id: &str,
        entitlement: Entitlement,
        deck_id: Uuid,
        card_id: Uuid,
    ) -> Result<()> {
        let now = Utc::now();
        let mut deck = self.load_owned(user_id, deck_id)?;
        let before = deck.cards.len();
        deck.cards.retain(|c| c.id != card_id);
        if deck.cards.len() == before {
            return Err(FlashcardError::CardNotFound(card_id));
        }
        deck.updated_at = now;
        stats::recompute(&mut deck, now);

        self.save_local(&deck)?;
        self.sync_deck(user_id, entitlement, &deck).await;
        Ok(())
    }

    // ==================== Review Operations ====================

    /// Record an answer for a card and reschedule it
    pub async fn submit_review(
        &self,
        user_id: &str,
        entitlement: Entitlement,
        deck_id: Uuid,
        card_id: Uuid,
        outcome: ReviewOutcome,
        response_ms: u64,
    ) -> Result<Flashcard> {
        let now = Utc::now();
        let mut deck = self.load_owned(user_id, deck_id)?;
        let card = deck
            .card_mut(card_id)
            .ok_or(FlashcardError::CardNotFound(card_id))?;

        card.state = algorithm::compute_next(&card.state, outcome, response_ms, now);
        card.updated_at = now;
        let updated = card.clone();

        deck.updated_at = now;
        stats::recompute(&mut deck, now);
        self.save_local(&deck)?;

        log::debug!(
            "Reviewed card {} ({}): {} interval {}",
            card_id,
            outcome,
            updated.state.status,
            algorithm::format_interval(updated.state.interval)
        );

        self.sync_write(
            user_id,
            entitlement,
            RemoteOperation::UpsertCard {
                deck_id,
                card: Box::new(updated.clone()),
            },
        )
        .await;
        Ok(updated)
    }

    /// Due cards across all of a user's decks, each deck's cards in review
    /// order. `limits.total` is spent deck by deck in deck order.
    pub async fn get_due_batch(
        &self,
        user_id: &str,
        entitlement: Entitlement,
        limits: DueLimits,
    ) -> Result<Vec<DueBatch>> {
        let decks = self.get_decks(user_id, entitlement).await?;
        Ok(due::select_due_batches(&decks, Utc::now(), limits))
    }

    /// Fold a finished study session into the deck's history
    pub async fn record_session(
        &self,
        user_id: &str,
        entitlement: Entitlement,
        session: StudySession,
    ) -> Result<Deck> {
        let mut deck = self.load_owned(user_id, session.deck_id)?;
        stats::record_session(&mut deck.stats, &session);
        deck.updated_at = Utc::now();

        self.save_local(&deck)?;
        self.sync_deck(user_id, entitlement, &deck).await;
        Ok(deck)
    }

    // ==================== Import / Export ====================

    pub fn export_deck(&self, user_id: &str, deck_id: Uuid, format: TransferFormat) -> Result<String> {
        let deck = self.load_owned(user_id, deck_id)?;
        transfer::export_cards(&deck, format)
    }

    /// Create a new deck from exported data. `name` overrides any name in the data.
    pub async fn import_deck(
        &self,
        user_id: &str,
        entitlement: Entitlement,
        name: Option<String>,
        data: &str,
        format: TransferFormat,
    ) -> Result<Deck> {
        let parsed = transfer::parse_cards(data, format)?;
        let new_deck = NewDeck {
            name: name
                .or(parsed.name)
                .unwrap_or_else(|| "Imported deck".to_string()),
            description: parsed.description,
            cards: parsed.cards,
            ..Default::default()
        };
        self.create_deck(user_id, entitlement, new_deck).await
    }

    /// Create a deck from one of the user's word or sentence lists
    pub async fn import_from_list(
        &self,
        user_id: &str,
        entitlement: Entitlement,
        list: &SourceList,
    ) -> Result<Deck> {
        let cards = transfer::cards_from_source_list(list);
        if cards.is_empty() {
            return Err(FlashcardError::Import(format!("List '{}' has no usable items", list.name)));
        }
        let new_deck = NewDeck {
            name: list.name.clone(),
            source_list_id: Some(list.id.clone()),
            cards,
            ..Default::default()
        };
        self.create_deck(user_id, entitlement, new_deck).await
    }

    // ==================== Sync ====================

    /// Replay queued remote writes for a user
    pub async fn sync_pending(&self, user_id: &str, entitlement: Entitlement) -> SyncReport {
        match self.remote_for(entitlement) {
            Some(remote) => self.drain_queue(user_id, remote.as_ref()).await,
            None => SyncReport {
                remaining: self.pending_sync_count(user_id),
                ..Default::default()
            },
        }
    }

    fn remote_for(&self, entitlement: Entitlement) -> Option<Arc<dyn RemoteDeckStore>> {
        if entitlement.allows_sync() {
            self.remote.clone()
        } else {
            None
        }
    }

    async fn call_remote<T>(
        &self,
        call: impl Future<Output = std::result::Result<T, RemoteError>>,
    ) -> std::result::Result<T, RemoteError> {
        match tokio::time::timeout(self.remote_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(RemoteError::Timeout(self.remote_timeout)),
        }
    }

    async fn execute(
        remote: &dyn RemoteDeckStore,
        operation: &RemoteOperation,
    ) -> std::result::Result<Option<Deck>, RemoteError> {
        match operation {
            RemoteOperation::CreateDeck { deck } => remote.create_deck(deck).await.map(Some),
            RemoteOperation::UpdateDeck { deck } => remote.update_deck(deck).await.map(|_| None),
            RemoteOperation::DeleteDeck { deck_id } => remote.delete_deck(*deck_id).await.map(|_| None),
            RemoteOperation::UpsertCard { deck_id, card } => {
                remote.upsert_card(*deck_id, card).await.map(|_| None)
            }
        }
    }

    /// Send one write. A card or deck update the server has no deck for is
    /// resent as a create of the whole local deck. Returns the operation
    /// that was actually sent.
    async fn deliver(
        &self,
        user_id: &str,
        remote: &dyn RemoteDeckStore,
        operation: RemoteOperation,
    ) -> (RemoteOperation, std::result::Result<Option<Deck>, RemoteError>) {
        let result = self.call_remote(Self::execute(remote, &operation)).await;
        if !matches!(result, Err(RemoteError::NotFound(_))) {
            return (operation, result);
        }
        let Some(create) = self.recreate_operation(user_id, &operation) else {
            return (operation, result);
        };

        log::info!(
            "Remote has no deck {} for {}, sending the whole deck",
            operation.deck_id(),
            operation.kind()
        );
        let result = self.call_remote(Self::execute(remote, &create)).await;
        (create, result)
    }

    fn recreate_operation(&self, user_id: &str, operation: &RemoteOperation) -> Option<RemoteOperation> {
        match operation {
            RemoteOperation::UpdateDeck { .. } | RemoteOperation::UpsertCard { .. } => {
                let deck = self.load_owned(user_id, operation.deck_id()).ok()?;
                Some(RemoteOperation::CreateDeck { deck: Box::new(deck) })
            }
            RemoteOperation::CreateDeck { .. } | RemoteOperation::DeleteDeck { .. } => None,
        }
    }

    async fn sync_deck(&self, user_id: &str, entitlement: Entitlement, deck: &Deck) {
        self.sync_write(
            user_id,
            entitlement,
            RemoteOperation::UpdateDeck {
                deck: Box::new(deck.clone()),
            },
        )
        .await;
    }

    /// Mirror a local write to the remote store. Never fails: errors are
    /// queued and reported as events.
    async fn sync_write(&self, user_id: &str, entitlement: Entitlement, operation: RemoteOperation) {
        let Some(remote) = self.remote_for(entitlement) else {
            return;
        };

        // Older writes go first so a retry never overwrites a newer one
        let backlog = self.pending_sync_count(user_id) > 0;
        if backlog {
            self.events.emit(
                user_id,
                SyncEventKind::Queued {
                    operation: operation.kind().to_string(),
                    deck_id: operation.deck_id(),
                },
            );
            self.lock_queue().enqueue(user_id, operation);
            self.drain_queue(user_id, remote.as_ref()).await;
            return;
        }

        let (operation, result) = self.deliver(user_id, remote.as_ref(), operation).await;
        match result {
            Ok(canonical) => self.reconcile(&operation, canonical),
            Err(e) if e.is_permanent() => {
                self.events.emit(
                    user_id,
                    SyncEventKind::Rejected {
                        operation: operation.kind().to_string(),
                        deck_id: operation.deck_id(),
                        error: e.to_string(),
                    },
                );
                self.lock_queue().reject_new(user_id, operation, e.to_string());
                self.persist_queue();
            }
            Err(e) => {
                self.events.emit(
                    user_id,
                    SyncEventKind::RemoteWriteFailed {
                        operation: operation.kind().to_string(),
                        deck_id: operation.deck_id(),
                        error: e.to_string(),
                    },
                );
                self.lock_queue().enqueue(user_id, operation);
                self.persist_queue();
            }
        }
    }

    /// Replay a user's queued writes in order, stopping at the first failure
    /// that may be temporary. Writes the remote refuses for good are set
    /// aside so they cannot hold up the ones behind them.
    async fn drain_queue(&self, user_id: &str, remote: &dyn RemoteDeckStore) -> SyncReport {
        let items = self.pending_sync_items(user_id);

        let mut report = SyncReport::default();
        if items.is_empty() {
            return report;
        }

        for item in items {
            let attempts = item.retries + 1;
            let sent_kind = item.operation.kind();
            let (operation, result) = self.deliver(user_id, remote, item.operation).await;
            match result {
                Ok(canonical) => {
                    self.lock_queue().complete(item.id);
                    self.events.emit(
                        user_id,
                        SyncEventKind::RetrySucceeded {
                            operation: operation.kind().to_string(),
                            deck_id: operation.deck_id(),
                            attempts,
                        },
                    );
                    self.reconcile(&operation, canonical);
                    report.delivered += 1;
                }
                Err(e) if e.is_permanent() => {
                    self.lock_queue().reject(item.id, e.to_string());
                    self.events.emit(
                        user_id,
                        SyncEventKind::Rejected {
                            operation: operation.kind().to_string(),
                            deck_id: operation.deck_id(),
                            error: e.to_string(),
                        },
                    );
                    report.rejected += 1;
                }
                Err(e) => {
                    {
                        let mut queue = self.lock_queue();
                        if operation.kind() != sent_kind {
                            queue.retarget(item.id, operation.clone());
                        }
                        queue.fail(item.id, e.to_string());
                    }
                    self.events.emit(
                        user_id,
                        SyncEventKind::RetryFailed {
                            operation: operation.kind().to_string(),
                            deck_id: operation.deck_id(),
                            attempts,
                            error: e.to_string(),
                        },
                    );
                    report.failed += 1;
                    break;
                }
            }
        }

        self.persist_queue();
        report.remaining = self.pending_sync_count(user_id);
        report
    }

    /// Adopt the server's copy of a freshly created deck, unless the deck was
    /// edited locally after the create was sent
    fn reconcile(&self, operation: &RemoteOperation, canonical: Option<Deck>) {
        let (RemoteOperation::CreateDeck { deck: sent }, Some(server_deck)) = (operation, canonical) else {
            return;
        };

        match self.local.get(sent.id) {
            Ok(Some(local)) if local.updated_at == sent.updated_at => {
                if let Err(e) = self.local.put(&server_deck) {
                    log::warn!("Failed to store server copy of deck {}: {}", sent.id, e);
                }
            }
            Ok(Some(_)) => {
                log::debug!("Deck {} changed locally since it was created, keeping local copy", sent.id);
            }
            Ok(None) => {}
            Err(e) => log::warn!("Failed to load deck {} for reconciliation: {}", sent.id, e),
        }
    }

    // ==================== Local helpers ====================

    fn load_owned(&self, user_id: &str, deck_id: Uuid) -> Result<Deck> {
        match self.local.get(deck_id)? {
            Some(deck) if deck.user_id == user_id => Ok(deck),
            _ => Err(FlashcardError::DeckNotFound(deck_id)),
        }
    }

    fn save_local(&self, deck: &Deck) -> Result<()> {
        self.local.put(deck).map_err(|e| {
            log::error!("Local write of deck {} failed: {}", deck.id, e);
            FlashcardError::from(e)
        })
    }

    fn check_quota(&self, deck: &Deck) -> Result<()> {
        let serialized = serde_json::to_vec(deck)?.len() as f64;
        let required = (serialized * STRUCTURAL_OVERHEAD).ceil() as u64;
        let available = self.local.estimate()?.available(QUOTA_SAFETY_BUFFER);

        if required > available {
            log::warn!(
                "Refusing deck '{}': needs {} bytes, {} available",
                deck.name,
                required,
                available
            );
            return Err(FlashcardError::QuotaExceeded { required, available });
        }
        Ok(())
    }

    fn lock_queue(&self) -> MutexGuard<'_, RetryQueue> {
        self.queue.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn persist_queue(&self) {
        let Some(path) = &self.queue_path else {
            return;
        };
        let queue = self.lock_queue().clone();
        if let Err(e) = queue.save(path) {
            log::warn!("Failed to save retry queue to {:?}: {}", path, e);
        }
    }
}
