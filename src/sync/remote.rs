//! Remote deck store for users with cloud sync
//!
//! REST layout (relative to the configured base URL):
//! ```text
//! GET    /users/{user}/decks              list a user's decks
//! POST   /decks                           create (idempotent by deck id)
//! PUT    /decks/{deck}                    replace a deck record
//! DELETE /decks/{deck}                    delete a deck and its cards
//! PUT    /decks/{deck}/cards/{card}       add or update one card
//! ```
//! Every successful write returns the server's canonical representation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use uuid::Uuid;

use crate::flashcards::{Deck, Flashcard};

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Authentication failed")]
    AuthFailed,
    #[error("Resource not found: {0}")]
    NotFound(String),
    #[error("Server error: {status} - {message}")]
    Server { status: u16, message: String },
    #[error("Remote call timed out after {0:?}")]
    Timeout(Duration),
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Remote store unavailable: {0}")]
    Unavailable(String),
}

impl RemoteError {
    /// Whether sending the same request again can never succeed
    pub fn is_permanent(&self) -> bool {
        match self {
            RemoteError::NotFound(_) | RemoteError::InvalidUrl(_) => true,
            // 408 and 429 ask the client to come back later
            RemoteError::Server { status, .. } => (400..500).contains(status) && *status != 408 && *status != 429,
            _ => false,
        }
    }
}

/// CRUD over decks and cards on the sync server
#[async_trait]
pub trait RemoteDeckStore: Send + Sync {
    async fn list_decks(&self, user_id: &str) -> Result<Vec<Deck>, RemoteError>;

    async fn create_deck(&self, deck: &Deck) -> Result<Deck, RemoteError>;

    async fn update_deck(&self, deck: &Deck) -> Result<Deck, RemoteError>;

    async fn delete_deck(&self, deck_id: Uuid) -> Result<(), RemoteError>;

    async fn upsert_card(&self, deck_id: Uuid, card: &Flashcard) -> Result<Flashcard, RemoteError>;
}

/// HTTP client for the sync server
pub struct HttpRemoteStore {
    client: Client,
    base_url: String,
    api_token: Option<String>,
}

impl HttpRemoteStore {
    /// Create a new client
    pub fn new(base_url: String, api_token: Option<String>, timeout: Duration) -> Result<Self, RemoteError> {
        // Normalize URL - ensure no trailing slash
        let base_url = base_url.trim_end_matches('/').to_string();

        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(RemoteError::InvalidUrl("URL must start with http:// or https://".to_string()));
        }

        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url,
            api_token,
        })
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response, RemoteError> {
        let response = self.authorize(request).send().await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(RemoteError::AuthFailed),
            StatusCode::NOT_FOUND => Err(RemoteError::NotFound(what.to_string())),
            status if !status.is_success() => Err(RemoteError::Server {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            }),
            _ => Ok(response),
        }
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T, RemoteError> {
        let response = self.send(request, what).await?;
        Ok(response.json::<T>().await?)
    }
}

/// Build full URL for a path under a normalized base URL
fn join_url(base_url: &str, path: &str) -> String {
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        base_url.to_string()
    } else {
        format!("{}/{}", base_url, path)
    }
}

#[async_trait]
impl RemoteDeckStore for HttpRemoteStore {
    async fn list_decks(&self, user_id: &str) -> Result<Vec<Deck>, RemoteError> {
        let url = self.url(&format!("users/{}/decks", user_id));
        self.send_json(self.client.get(&url), user_id).await
    }

    async fn create_deck(&self, deck: &Deck) -> Result<Deck, RemoteError> {
        let url = self.url("decks");
        self.send_json(self.client.post(&url).json(deck), &deck.id.to_string())
            .await
    }

    async fn update_deck(&self, deck: &Deck) -> Result<Deck, RemoteError> {
        let url = self.url(&format!("decks/{}", deck.id));
        self.send_json(self.client.put(&url).json(deck), &deck.id.to_string())
            .await
    }

    async fn delete_deck(&self, deck_id: Uuid) -> Result<(), RemoteError> {
        let url = self.url(&format!("decks/{}", deck_id));
        match self.send(self.client.delete(&url), &deck_id.to_string()).await {
            Ok(_) => Ok(()),
            // Already gone is what we wanted
            Err(RemoteError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn upsert_card(&self, deck_id: Uuid, card: &Flashcard) -> Result<Flashcard, RemoteError> {
        let url = self.url(&format!("decks/{}/cards/{}", deck_id, card.id));
        self.send_json(self.client.put(&url).json(card), &card.id.to_string())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_http_url() {
        let result = HttpRemoteStore::new("ftp://example.com".to_string(), None, Duration::from_secs(5));
        assert!(matches!(result, Err(RemoteError::InvalidUrl(_))));
    }

    #[test]
    fn test_url_building() {
        let base = "https://sync.example.com/api";

        assert_eq!(join_url(base, ""), "https://sync.example.com/api");
        assert_eq!(join_url(base, "/decks"), "https://sync.example.com/api/decks");
        assert_eq!(
            join_url(base, "users/alice/decks"),
            "https://sync.example.com/api/users/alice/decks"
        );
    }

    #[test]
    fn test_permanent_errors() {
        let server = |status| RemoteError::Server {
            status,
            message: String::new(),
        };

        assert!(RemoteError::NotFound("deck".to_string()).is_permanent());
        assert!(server(422).is_permanent());
        assert!(!server(429).is_permanent());
        assert!(!server(503).is_permanent());
        assert!(!RemoteError::AuthFailed.is_permanent());
        assert!(!RemoteError::Timeout(Duration::from_secs(1)).is_permanent());
        assert!(!RemoteError::Unavailable("offline".to_string()).is_permanent());
    }
}
