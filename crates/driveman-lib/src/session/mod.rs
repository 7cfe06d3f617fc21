//! Session store: bearer token, absolute expiry, and cached user profile.
//!
//! The store is the only source of truth for "is the user logged in".
//! Raw getters never look at the clock; [`SessionStore::check_auth`] is the
//! single expiry check that every consumer goes through.

pub mod store;

use std::path::Path;

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::drive::model::UserProfile;
use crate::errors::{DrivemanError, Result};

pub use store::{KeyValueStore, MemoryStore, SqliteStore};

pub const TOKEN_KEY: &str = "driveman_token";
pub const EXPIRY_KEY: &str = "driveman_token_expiry";
pub const USER_KEY: &str = "driveman_user";

/// A complete, unexpired-or-not login record.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: Option<UserProfile>,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Time left before expiry, zero once expired.
    pub fn remaining_at(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).max(Duration::zero())
    }
}

/// Outcome of the expiry check.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    Authenticated(Session),
    /// A token was stored but its expiry has passed. The check has already
    /// removed it.
    Expired,
    Unauthenticated,
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated(_))
    }
}

/// Raw copy of the persisted entries, taken before a session is replaced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    entries: Vec<(&'static str, String)>,
}

impl SessionSnapshot {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Owner of the persisted login state.
pub struct SessionStore {
    store: Box<dyn KeyValueStore>,
}

impl SessionStore {
    pub fn new(store: impl KeyValueStore + 'static) -> Self {
        Self {
            store: Box::new(store),
        }
    }

    /// Open the SQLite-backed store at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(SqliteStore::open(path)?))
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }

    // -- token ---------------------------------------------------------------

    /// Persist `token` with an expiry `ttl_secs` from now. Returns the expiry.
    pub fn save_token(&self, token: &str, ttl_secs: u64) -> Result<DateTime<Utc>> {
        self.save_token_at(token, ttl_secs, Utc::now())
    }

    /// Like [`save_token`](Self::save_token) with an explicit clock reading.
    pub fn save_token_at(
        &self,
        token: &str,
        ttl_secs: u64,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>> {
        let ttl_ms = i64::try_from(ttl_secs)
            .ok()
            .and_then(|s| s.checked_mul(1000))
            .ok_or_else(|| DrivemanError::Validation(format!("Token lifetime too large: {ttl_secs}s")))?;
        let expires_ms = now.timestamp_millis().saturating_add(ttl_ms);
        let expires_text = expires_ms.to_string();

        self.store
            .set_many(&[(TOKEN_KEY, token), (EXPIRY_KEY, &expires_text)])?;

        tracing::debug!(expires_ms, "saved access token");
        Ok(millis_to_datetime(expires_ms).unwrap_or(DateTime::<Utc>::MAX_UTC))
    }

    pub fn token(&self) -> Result<Option<String>> {
        self.store.get(TOKEN_KEY)
    }

    /// Stored expiry. An unparsable value reads as absent.
    pub fn expiry(&self) -> Result<Option<DateTime<Utc>>> {
        let Some(raw) = self.store.get(EXPIRY_KEY)? else {
            return Ok(None);
        };
        match raw.trim().parse::<i64>().ok().and_then(millis_to_datetime) {
            Some(at) => Ok(Some(at)),
            None => {
                tracing::warn!(value = %raw, "ignoring malformed token expiry");
                Ok(None)
            }
        }
    }

    /// Delete token and expiry. The cached profile stays.
    pub fn remove_token(&self) -> Result<()> {
        self.store.remove_many(&[TOKEN_KEY, EXPIRY_KEY])
    }

    // -- user ----------------------------------------------------------------

    pub fn save_user(&self, profile: &UserProfile) -> Result<()> {
        let json = serde_json::to_string(profile)?;
        self.store.set(USER_KEY, &json)
    }

    /// Cached profile. Corrupt JSON reads as absent.
    pub fn user(&self) -> Result<Option<UserProfile>> {
        let Some(raw) = self.store.get(USER_KEY)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(profile) => Ok(Some(profile)),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring malformed cached profile");
                Ok(None)
            }
        }
    }

    // -- lifecycle -----------------------------------------------------------

    /// Remove token, expiry and profile in one write.
    pub fn clear_all(&self) -> Result<()> {
        self.store.remove_many(&[TOKEN_KEY, EXPIRY_KEY, USER_KEY])
    }

    pub fn snapshot(&self) -> Result<SessionSnapshot> {
        let mut entries = Vec::new();
        for key in [TOKEN_KEY, EXPIRY_KEY, USER_KEY] {
            if let Some(value) = self.store.get(key)? {
                entries.push((key, value));
            }
        }
        Ok(SessionSnapshot { entries })
    }

    /// Put back exactly what `snapshot` held; keys it lacks are removed.
    pub fn restore(&self, snapshot: &SessionSnapshot) -> Result<()> {
        let missing: Vec<&str> = [TOKEN_KEY, EXPIRY_KEY, USER_KEY]
            .into_iter()
            .filter(|key| snapshot.entries.iter().all(|(k, _)| k != key))
            .collect();
        self.store.remove_many(&missing)?;

        let present: Vec<(&str, &str)> = snapshot
            .entries
            .iter()
            .map(|(k, v)| (*k, v.as_str()))
            .collect();
        if !present.is_empty() {
            self.store.set_many(&present)?;
        }
        Ok(())
    }

    /// The stored session, whether expired or not. `None` unless both token
    /// and expiry are present.
    pub fn current(&self) -> Result<Option<Session>> {
        let (Some(token), Some(expires_at)) = (self.token()?, self.expiry()?) else {
            return Ok(None);
        };
        Ok(Some(Session {
            token,
            expires_at,
            user: self.user()?,
        }))
    }

    /// The expiry check. See [`check_auth_at`](Self::check_auth_at).
    pub fn check_auth(&self) -> Result<AuthState> {
        self.check_auth_at(Utc::now())
    }

    /// Present and unexpired token ⇒ authenticated. An expired token is
    /// removed before returning [`AuthState::Expired`].
    pub fn check_auth_at(&self, now: DateTime<Utc>) -> Result<AuthState> {
        let Some(session) = self.current()? else {
            return Ok(AuthState::Unauthenticated);
        };
        if session.is_expired_at(now) {
            tracing::info!(expired_at = %session.expires_at, "access token expired");
            self.remove_token()?;
            return Ok(AuthState::Expired);
        }
        Ok(AuthState::Authenticated(session))
    }

    /// A token that passed the expiry check, or an auth error.
    pub fn valid_token(&self) -> Result<String> {
        match self.check_auth()? {
            AuthState::Authenticated(session) => Ok(session.token),
            AuthState::Expired => Err(DrivemanError::Auth("Session expired".into())),
            AuthState::Unauthenticated => Err(DrivemanError::Auth("Not logged in".into())),
        }
    }
}

fn millis_to_datetime(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}
