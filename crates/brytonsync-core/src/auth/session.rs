use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api::ApiClient;
use crate::config::Credential;

use super::TokenStore;

/// Account details returned alongside a freshly issued token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUser {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken {
    pub token: String,
    /// Only known when the token came straight from the exchange endpoint.
    pub user: Option<TokenUser>,
}

/// Where the token used for this run came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    /// Cached token passed the probe
    Cached,
    /// Cached token failed the probe and was replaced
    Refreshed,
    /// No cached token existed
    Fetched,
}

pub struct Session {
    store: TokenStore,
    pub data: Option<AuthToken>,
}

impl Session {
    pub fn new(store: TokenStore) -> Self {
        Self { store, data: None }
    }

    /// Load the cached token from disk.
    pub fn load(&mut self) -> Result<bool> {
        self.data = self.store.load()?;
        Ok(self.data.is_some())
    }

    /// Get the token if one is held
    pub fn token(&self) -> Option<&str> {
        self.data.as_ref().map(|d| d.token.as_str())
    }

    /// Make sure the session holds a token the platform accepts.
    ///
    /// A cached token is probed first; when it is absent or rejected a new one
    /// is fetched and written back to the store before it is used.
    pub async fn ensure_token(
        &mut self,
        api: &ApiClient,
        credential: &Credential,
    ) -> Result<TokenSource> {
        let cached = match self.load() {
            Ok(found) => found,
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable token file");
                false
            }
        };

        let source = if cached {
            let token = self.token().unwrap_or_default().to_string();
            if api.probe_token(&token).await {
                info!("Auth check successful");
                return Ok(TokenSource::Cached);
            }
            info!("Auth failed, fetching new token");
            TokenSource::Refreshed
        } else {
            info!(path = %self.store.path().display(), "No token file, fetching token");
            TokenSource::Fetched
        };

        self.data = None;
        let fresh = api
            .authenticate(&credential.email, &credential.password)
            .await
            .context("Could not obtain a Ride with GPS auth token")?;

        if let Err(e) = self.store.save(&fresh) {
            warn!(error = %e, "Failed to persist auth token, continuing with in-memory token");
        }
        self.data = Some(fresh);

        Ok(source)
    }
}
