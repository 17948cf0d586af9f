//! services/companion/src/auth.rs
//!
//! The auth context shared by everything that talks to the backend.
//!
//! It is created once in `main`, initialised from configuration, handed to the
//! adapters by reference, and torn down on shutdown. Sign-in flows themselves live in
//! the hosted auth service; this only carries the resulting access token.

use crate::config::Config;
use std::sync::{Arc, RwLock};
use tracing::info;

#[derive(Clone, Debug, Default)]
pub struct AuthContext {
    token: Arc<RwLock<Option<String>>>,
}

impl AuthContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the access token from configuration.
    pub fn init(&self, config: &Config) {
        if let Some(token) = &config.api_access_token {
            self.refresh(token.clone());
            info!("Auth context initialised with a backend access token.");
        } else {
            info!("Auth context initialised without a backend access token.");
        }
    }

    /// Replaces the access token, e.g. after the hosted auth service rotated it.
    pub fn refresh(&self, token: String) {
        if let Ok(mut guard) = self.token.write() {
            *guard = Some(token);
        }
    }

    /// Drops the access token. Later backend calls go out unauthenticated.
    pub fn teardown(&self) {
        if let Ok(mut guard) = self.token.write() {
            *guard = None;
        }
        info!("Auth context torn down.");
    }

    pub fn access_token(&self) -> Option<String> {
        self.token.read().ok().and_then(|guard| guard.clone())
    }

    pub fn is_signed_in(&self) -> bool {
        self.access_token().is_some()
    }
}
