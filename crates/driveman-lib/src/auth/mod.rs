//! Login state: the gate each command passes through, plus login/logout.

pub mod oauth;

use crate::drive::model::UserProfile;
use crate::drive::DriveClient;
use crate::errors::{DrivemanError, Result};
use crate::session::{AuthState, Session, SessionStore};

pub use oauth::{extract_code, OAuthFlow, PendingAuthorization, TokenGrant, SCOPES};

/// Authentication decision, taken once per command invocation.
#[derive(Debug, Clone)]
pub struct AuthGate {
    state: AuthState,
}

impl AuthGate {
    /// Run the session expiry check. An expired token is removed as a side
    /// effect.
    pub fn evaluate(session: &SessionStore) -> Result<Self> {
        let state = session.check_auth()?;
        tracing::debug!(authenticated = state.is_authenticated(), "auth gate evaluated");
        Ok(Self { state })
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.is_authenticated()
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    /// The session, or an auth error explaining why there is none.
    pub fn require(self) -> Result<Session> {
        match self.state {
            AuthState::Authenticated(session) => Ok(session),
            AuthState::Expired => Err(DrivemanError::Auth(
                "Your session has expired".into(),
            )),
            AuthState::Unauthenticated => Err(DrivemanError::Auth("You are not logged in".into())),
        }
    }
}

/// Persist `grant`, then fetch and cache the account profile.
///
/// If the profile cannot be fetched the new token is discarded and whatever
/// session was stored before is put back.
pub async fn complete_login(
    session: &SessionStore,
    gateway: &DriveClient,
    grant: &TokenGrant,
) -> Result<UserProfile> {
    let prior = session.snapshot()?;
    session.save_token(&grant.access_token, grant.expires_in)?;

    let profile = match gateway.get_profile().await {
        Ok(profile) => profile,
        Err(e) => {
            tracing::warn!(
                error = %e,
                restoring = !prior.is_empty(),
                "profile fetch failed, discarding new token"
            );
            session.restore(&prior)?;
            return Err(e);
        }
    };

    session.save_user(&profile)?;
    tracing::info!(user = profile.display_name(), "login complete");
    Ok(profile)
}

/// Forget token, expiry and cached profile.
pub fn logout(session: &SessionStore) -> Result<()> {
    session.clear_all()?;
    tracing::info!("logged out");
    Ok(())
}
