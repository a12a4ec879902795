//! Signed-in user state.

use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;

use chrono::DateTime;
use chrono::TimeDelta;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::sync::broadcast;

use super::TokenResponse;
use crate::error::AuthError;
use crate::storage::StateStore;

/// Store key of the persisted user data.
pub const AUTH_DATA_KEY: &str = "auth_data";

/// Session notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn { username: String },
    TokenRefreshed,
    /// The session ended; the embedding application should show its login screen.
    SignedOut,
}

/// The signed-in user and their tokens.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    pub is_authenticated: bool,
    pub username: String,
    pub bearer_token: String,
    pub expiration_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl UserData {
    /// A missing expiration date counts as expired.
    pub fn is_expired(&self) -> bool {
        self.expiration_date.is_none_or(|exp| exp <= Utc::now())
    }
}

/// Explicit authentication state shared by data services.
///
/// Cheap to clone; clones share state. User data is persisted under
/// [`AUTH_DATA_KEY`] in the given store.
#[derive(Clone)]
pub struct SessionContext {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    store: StateStore,
    user: RwLock<UserData>,
    events: broadcast::Sender<SessionEvent>,
    refresh_lock: Mutex<()>,
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let user = self.user_data();
        f.debug_struct("SessionContext")
            .field("username", &user.username)
            .field("is_authenticated", &user.is_authenticated)
            .finish_non_exhaustive()
    }
}

impl SessionContext {
    /// Creates a session, restoring any user data saved in `store`.
    pub fn new(store: StateStore) -> Self {
        let user = match store.get::<UserData>(AUTH_DATA_KEY) {
            Ok(Some(saved)) => saved,
            Ok(None) => UserData::default(),
            Err(e) => {
                log::warn!("Ignoring unreadable {}: {}", AUTH_DATA_KEY, e);
                UserData::default()
            }
        };

        let (events, _) = broadcast::channel(16);
        Self {
            inner: Arc::new(SessionInner {
                store,
                user: RwLock::new(user),
                events,
                refresh_lock: Mutex::new(()),
            }),
        }
    }

    /// A session over a throwaway in-memory store.
    pub fn in_memory() -> Self {
        Self::new(StateStore::in_memory())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub(crate) fn notify(&self, event: SessionEvent) {
        // No receivers is fine.
        let _ = self.inner.events.send(event);
    }

    pub(crate) fn refresh_lock(&self) -> &Mutex<()> {
        &self.inner.refresh_lock
    }

    /// Snapshot of the current user data.
    pub fn user_data(&self) -> UserData {
        self.inner
            .user
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn bearer_token(&self) -> Option<String> {
        let user = self.user_data();
        (!user.bearer_token.is_empty()).then_some(user.bearer_token)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.user_data().refresh_token.filter(|t| !t.is_empty())
    }

    pub fn is_bearer_token_expired(&self) -> bool {
        self.user_data().is_expired()
    }

    /// Returns `true` if the session holds a live token, reloading the stored
    /// user data when the in-memory copy is missing or expired.
    pub fn is_authenticated(&self) -> bool {
        let user = self.user_data();
        if user.is_authenticated && !user.is_expired() {
            return true;
        }
        self.retrieve_saved_data().is_ok()
    }

    /// Reloads user data from the store.
    pub fn retrieve_saved_data(&self) -> Result<(), AuthError> {
        let saved: UserData = self
            .inner
            .store
            .get(AUTH_DATA_KEY)
            .ok()
            .flatten()
            .ok_or(AuthError::NoStoredData)?;

        if saved.is_expired() {
            return Err(AuthError::Expired);
        }

        *self
            .inner
            .user
            .write()
            .unwrap_or_else(PoisonError::into_inner) = saved;
        Ok(())
    }

    /// Stores a token response as the signed-in user.
    ///
    /// The username comes from the response, then `username`, then the
    /// current user.
    pub fn init_auth(&self, token: &TokenResponse, username: Option<&str>) {
        let mut user = self
            .inner
            .user
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        user.is_authenticated = true;
        if let Some(name) = token.user_name.as_deref().or(username) {
            user.username = name.to_string();
        }
        user.bearer_token = token.access_token.clone();
        user.expiration_date = expiration_date(token.expires_in);
        user.role = token.role.clone();
        user.refresh_token = token.refresh_token.clone();

        if let Err(e) = self.inner.store.set(AUTH_DATA_KEY, &*user) {
            log::warn!("Failed to persist {}: {}", AUTH_DATA_KEY, e);
        }
    }

    /// Forgets the user and removes the stored data.
    pub fn remove_authentication(&self) {
        if let Err(e) = self.inner.store.remove(AUTH_DATA_KEY) {
            log::warn!("Failed to remove {}: {}", AUTH_DATA_KEY, e);
        }

        let mut user = self
            .inner
            .user
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        user.is_authenticated = false;
        user.username.clear();
        user.bearer_token.clear();
        user.expiration_date = None;
        user.refresh_token = None;
    }

    /// Removes authentication and emits [`SessionEvent::SignedOut`].
    pub fn sign_out(&self) {
        log::info!("Signing out '{}'", self.user_data().username);
        self.remove_authentication();
        self.notify(SessionEvent::SignedOut);
    }
}

/// Absolute expiry of a token valid for `expires_in` seconds; lifetimes past
/// the representable range never expire.
fn expiration_date(expires_in: Option<u64>) -> Option<DateTime<Utc>> {
    let lifetime = i64::try_from(expires_in.unwrap_or(0))
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX);
    Some(
        Utc::now()
            .checked_add_signed(lifetime)
            .unwrap_or(DateTime::<Utc>::MAX_UTC),
    )
}
