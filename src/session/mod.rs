//! Anonymous session identity
//!
//! The server addresses a pre-login cart by an opaque client-generated token.
//! The token is created lazily, persisted, reused across restarts and only
//! dropped after a completed checkout so the next purchase starts with a
//! fresh server-side cart.

use crate::core::Result;
use crate::storage::{KeyValueStore, StorageKeys};
use log::{debug, warn};
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

/// Credentials attached to every cart request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestIdentity {
    Anonymous { session_id: String },
    Authenticated { token: String, session_id: String },
}

impl RequestIdentity {
    pub fn session_id(&self) -> &str {
        match self {
            RequestIdentity::Anonymous { session_id }
            | RequestIdentity::Authenticated { session_id, .. } => session_id,
        }
    }

    pub fn bearer_token(&self) -> Option<&str> {
        match self {
            RequestIdentity::Anonymous { .. } => None,
            RequestIdentity::Authenticated { token, .. } => Some(token),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, RequestIdentity::Authenticated { .. })
    }
}

pub struct SessionIdentity {
    storage: Arc<dyn KeyValueStore>,
    keys: StorageKeys,
    cached: Mutex<Option<String>>,
}

impl SessionIdentity {
    pub fn new(storage: Arc<dyn KeyValueStore>, keys: StorageKeys) -> Self {
        Self {
            storage,
            keys,
            cached: Mutex::new(None),
        }
    }

    /// Return the persisted session id, creating and persisting one first if
    /// none exists. Repeated calls return the same id until `clear_session_id`.
    pub fn get_or_create_session_id(&self) -> String {
        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(id) = cached.as_ref() {
            return id.clone();
        }

        let id = match self.read_persisted() {
            Some(id) => id,
            None => {
                let id = Uuid::new_v4().to_string();
                debug!("Created new cart session {}", id);
                if let Err(err) = self.storage.set(&self.keys.session_id, &id) {
                    warn!("Failed to persist session id: {}", err);
                }
                id
            }
        };

        *cached = Some(id.clone());
        id
    }

    /// The persisted session id, without creating one
    pub fn peek(&self) -> Option<String> {
        let cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        cached.clone().or_else(|| self.read_persisted())
    }

    pub fn clear_session_id(&self) -> Result<()> {
        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        *cached = None;
        self.storage.remove(&self.keys.session_id)?;
        debug!("Cleared cart session");
        Ok(())
    }

    /// Auth token written by the login flow, if any
    pub fn auth_token(&self) -> Option<String> {
        match self.storage.get(&self.keys.auth_token) {
            Ok(token) => token.filter(|t| !t.trim().is_empty()),
            Err(err) => {
                warn!("Failed to read auth token: {}", err);
                None
            }
        }
    }

    /// Identity for the next cart request, creating the session id if needed
    pub fn request_identity(&self) -> RequestIdentity {
        let session_id = self.get_or_create_session_id();
        match self.auth_token() {
            Some(token) => RequestIdentity::Authenticated { token, session_id },
            None => RequestIdentity::Anonymous { session_id },
        }
    }

    fn read_persisted(&self) -> Option<String> {
        match self.storage.get(&self.keys.session_id) {
            Ok(value) => value.filter(|id| !id.trim().is_empty()),
            Err(err) => {
                warn!("Failed to read session id: {}", err);
                None
            }
        }
    }
}
