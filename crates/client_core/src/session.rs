use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
};

use chrono::{DateTime, Utc};
use shared::domain::Profile;
use storage::SessionStore;
use tokio::sync::{watch, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::{
    authority::RemoteAuthority,
    dispatch::CredentialSlot,
    error::{AuthError, LOGIN_SUPERSEDED, NETWORK_ERROR_MESSAGE},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Booting,
    Authenticated,
    Unauthenticated,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionPhase::Booting => "booting",
            SessionPhase::Authenticated => "authenticated",
            SessionPhase::Unauthenticated => "unauthenticated",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Booting,
    /// `saved_at` is `None` when the session could not be persisted.
    Authenticated {
        profile: Profile,
        saved_at: Option<DateTime<Utc>>,
    },
    Unauthenticated,
}

impl SessionState {
    pub fn phase(&self) -> SessionPhase {
        match self {
            SessionState::Booting => SessionPhase::Booting,
            SessionState::Authenticated { .. } => SessionPhase::Authenticated,
            SessionState::Unauthenticated => SessionPhase::Unauthenticated,
        }
    }

    pub fn profile(&self) -> Option<&Profile> {
        match self {
            SessionState::Authenticated { profile, .. } => Some(profile),
            _ => None,
        }
    }
}

pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    authority: Arc<dyn RemoteAuthority>,
    credential: CredentialSlot,
    bootstrapped: AtomicBool,
    // bumped by every logout; remote answers that straddle one are dropped
    epoch: AtomicU64,
    // held for store writes and state changes, never across a remote call
    transitions: Mutex<()>,
    state: watch::Sender<SessionState>,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn SessionStore>,
        authority: Arc<dyn RemoteAuthority>,
        credential: CredentialSlot,
    ) -> Arc<Self> {
        let (state, _) = watch::channel(SessionState::Booting);
        credential.set(None);
        Arc::new(Self {
            store,
            authority,
            credential,
            bootstrapped: AtomicBool::new(false),
            epoch: AtomicU64::new(0),
            transitions: Mutex::new(()),
            state,
        })
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.borrow().phase()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn credential(&self) -> Option<String> {
        self.credential.get()
    }

    /// Resolves `Booting` from the persisted session. Runs once.
    pub async fn bootstrap(&self) -> SessionPhase {
        if self.bootstrapped.swap(true, Ordering::SeqCst) {
            warn!("session bootstrap requested more than once; ignoring");
            return self.phase();
        }
        let epoch = self.epoch.load(Ordering::SeqCst);

        let persisted = match self.store.load_session().await {
            Ok(Some(persisted)) => persisted,
            Ok(None) => {
                debug!("no persisted session");
                return self.settle_unauthenticated(epoch, false).await;
            }
            Err(err) => {
                warn!(error = %err, "failed to read persisted session");
                return self.settle_unauthenticated(epoch, true).await;
            }
        };

        let verified = self.authority.verify(&persisted.credential).await;

        let Some(_guard) = self.settle(epoch).await else {
            debug!("logout raced session restore; keeping the logout");
            return self.phase();
        };
        match verified {
            Ok(()) => {
                info!(
                    display_name = %persisted.profile.display_name,
                    saved_at = %persisted.saved_at,
                    "restored persisted session"
                );
                self.enter_authenticated(
                    persisted.credential,
                    persisted.profile,
                    Some(persisted.saved_at),
                );
                SessionPhase::Authenticated
            }
            Err(err) => {
                info!(error = %err, "persisted credential failed verification");
                self.discard_persisted().await;
                self.enter_unauthenticated();
                SessionPhase::Unauthenticated
            }
        }
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<Profile, AuthError> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(AuthError::Rejected(
                "Username and password are required.".to_string(),
            ));
        }
        let epoch = self.epoch.load(Ordering::SeqCst);

        let grant = match self.authority.login(username.trim(), password).await {
            Ok(grant) => grant,
            Err(AuthError::Rejected(message)) => {
                info!(username = username.trim(), %message, "login rejected");
                return Err(AuthError::Rejected(message));
            }
            Err(AuthError::Transport(detail)) => {
                warn!(username = username.trim(), error = %detail, "login request failed");
                return Err(AuthError::Transport(NETWORK_ERROR_MESSAGE.to_string()));
            }
        };

        let Some(_guard) = self.settle(epoch).await else {
            info!(username = username.trim(), "logout raced login; revoking the new credential");
            self.revoke_in_background(grant.credential);
            return Err(AuthError::Rejected(LOGIN_SUPERSEDED.to_string()));
        };

        let saved_at = match self
            .store
            .save_session(&grant.credential, &grant.profile)
            .await
        {
            Ok(()) => Some(Utc::now()),
            Err(err) => {
                warn!(error = %err, "failed to persist session; it will not survive a restart");
                None
            }
        };
        info!(display_name = %grant.profile.display_name, "login succeeded");
        self.enter_authenticated(grant.credential, grant.profile.clone(), saved_at);
        Ok(grant.profile)
    }

    /// Ends the session locally without waiting on any remote call. The
    /// authority is told in the background and its answer is ignored.
    pub async fn logout(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        let _guard = self.transitions.lock().await;
        let credential = self.credential.get();

        self.discard_persisted().await;
        self.enter_unauthenticated();
        info!("logged out");

        if let Some(credential) = credential {
            self.revoke_in_background(credential);
        }
    }

    async fn settle(&self, epoch: u64) -> Option<MutexGuard<'_, ()>> {
        let guard = self.transitions.lock().await;
        (self.epoch.load(Ordering::SeqCst) == epoch).then_some(guard)
    }

    async fn settle_unauthenticated(&self, epoch: u64, discard: bool) -> SessionPhase {
        let Some(_guard) = self.settle(epoch).await else {
            return self.phase();
        };
        if discard {
            self.discard_persisted().await;
        }
        self.enter_unauthenticated();
        SessionPhase::Unauthenticated
    }

    fn revoke_in_background(&self, credential: String) {
        let authority = Arc::clone(&self.authority);
        tokio::spawn(async move {
            if let Err(err) = authority.logout(&credential).await {
                debug!(error = %err, "remote logout notification failed");
            }
        });
    }

    async fn discard_persisted(&self) {
        if let Err(err) = self.store.clear_session().await {
            warn!(error = %err, "failed to clear persisted session");
        }
    }

    fn enter_authenticated(
        &self,
        credential: String,
        profile: Profile,
        saved_at: Option<DateTime<Utc>>,
    ) {
        self.credential.set(Some(credential));
        self.state
            .send_replace(SessionState::Authenticated { profile, saved_at });
    }

    fn enter_unauthenticated(&self) {
        self.credential.set(None);
        self.state.send_replace(SessionState::Unauthenticated);
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
