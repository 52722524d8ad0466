//! The client's session state machine.
//!
//! Two states: `Anonymous` and `Authenticated`. Transitions are broadcast on
//! a watch channel so interested parties react to them without polling the
//! credential store. On startup a durable credential pair is restored
//! optimistically, with no validating round-trip; validity is confirmed
//! lazily by the first privileged request, and a rejection heals the session
//! by clearing the dead credentials.

use log::{debug, info, warn};
use quire_access::User;
use quire_config::CredentialStore;
use tokio::sync::watch;

use crate::client::{ApiClient, AuthResponse};
use crate::error::ApiError;

/// Whether anyone is logged in, and who
#[derive(Debug, Clone)]
pub enum SessionState {
    /// No credentials held
    Anonymous,
    /// A bearer token and its profile are active
    Authenticated(User),
}

impl SessionState {
    /// True when a credential pair is active
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }

    /// The authenticated account, if any
    pub fn user(&self) -> Option<&User> {
        match self {
            SessionState::Authenticated(user) => Some(user),
            SessionState::Anonymous => None,
        }
    }
}

/// Orchestrates login, registration and logout against the gateway and the
/// credential store. The store is only ever written from here, serially.
#[derive(Debug)]
pub struct Session {
    client: ApiClient,
    store: CredentialStore,
    state: watch::Sender<SessionState>,
}

impl Session {
    /// Build the session, restoring durable credentials when present. The
    /// restore is optimistic: the token is trusted until a privileged call
    /// rejects it.
    pub async fn initialise(client: ApiClient, store: CredentialStore) -> Result<Session, ApiError> {
        let initial = match store.load()? {
            Some(creds) => {
                debug!("restored session for `{}`", creds.user.username);
                client.set_bearer(Some(creds.token)).await;
                SessionState::Authenticated(creds.user)
            }
            None => SessionState::Anonymous,
        };

        let (state, _) = watch::channel(initial);
        Ok(Session {
            client,
            store,
            state,
        })
    }

    /// Observe state transitions without polling
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Snapshot of the current state
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// The authenticated account, if any
    pub fn current_user(&self) -> Option<User> {
        self.state.borrow().user().cloned()
    }

    /// The authenticated account's id, as `ApiClient` comment routing wants it
    pub fn user_id(&self) -> Option<i64> {
        self.current_user().map(|u| u.id)
    }

    /// Log in with a username and password
    pub async fn login(&self, username: &str, password: &str) -> Result<User, ApiError> {
        let auth = self.client.login(username, password).await?;
        self.finish_auth(auth).await
    }

    /// Create an account and log straight into it
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<User, ApiError> {
        let auth = self.client.register(username, email, password).await?;
        self.finish_auth(auth).await
    }

    /// Persist the credential pair and move to `Authenticated`. The token
    /// and profile hit the disk together or not at all; any failure rolls
    /// the bearer slot back so the client is not left half logged in.
    async fn finish_auth(&self, auth: AuthResponse) -> Result<User, ApiError> {
        self.client.set_bearer(Some(auth.access_token.clone())).await;

        let user = match auth.user {
            Some(user) => user,
            // some server builds omit the profile from the auth response
            None => match self.client.current_user().await {
                Ok(user) => user,
                Err(e) => {
                    self.client.set_bearer(None).await;
                    return Err(e);
                }
            },
        };

        if let Err(e) = self.store.save(&auth.access_token, &user) {
            self.client.set_bearer(None).await;
            return Err(e.into());
        }

        info!("logged in as `{}`", user.username);
        self.state
            .send_replace(SessionState::Authenticated(user.clone()));
        Ok(user)
    }

    /// Drop the credentials and move to `Anonymous`
    pub async fn logout(&self) -> Result<(), ApiError> {
        self.store.clear()?;
        self.client.set_bearer(None).await;
        self.state.send_replace(SessionState::Anonymous);
        info!("logged out");
        Ok(())
    }

    /// Inspect a failed call. A rejected credential means the stored token
    /// is dead, so the session heals itself: credentials are cleared and the
    /// state drops to `Anonymous`. Returns true when that happened, so the
    /// caller can tell the user to log in again. Every other error leaves
    /// the session untouched.
    pub async fn absorb_failure(&self, error: &ApiError) -> bool {
        if !matches!(error, ApiError::Auth(_)) {
            return false;
        }
        if !self.state.borrow().is_authenticated() {
            return false;
        }

        warn!("stored credentials were rejected, clearing the session");
        if let Err(e) = self.store.clear() {
            warn!("failed to clear stored credentials: {}", e);
        }
        self.client.set_bearer(None).await;
        self.state.send_replace(SessionState::Anonymous);
        true
    }
}
