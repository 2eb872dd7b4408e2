use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

/// The authenticated user every resource is scoped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub email: String,
    pub access_token: Option<String>, // hosted backend only
}

impl Identity {
    pub fn new(user_id: Uuid, email: &str) -> Self {
        Self {
            user_id,
            email: email.to_string(),
            access_token: None,
        }
    }

    pub fn with_access_token(mut self, token: &str) -> Self {
        self.access_token = Some(token.to_string());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub identity: Option<Identity>,
    pub loading: bool,
    /// Bumped every time the signed-in user changes.
    pub generation: u64,
}

/// Shared session context handed to every resource hook.
///
/// Cloning is cheap and every clone observes the same state. Hooks subscribe
/// with [`Session::subscribe`] and re-fetch when `generation` moves.
#[derive(Clone)]
pub struct Session {
    tx: Arc<watch::Sender<SessionState>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionState::default());
        Self { tx: Arc::new(tx) }
    }

    /// A session whose identity is still being resolved.
    pub fn resolving() -> Self {
        let session = Self::new();
        session.tx.send_modify(|state| state.loading = true);
        session
    }

    pub fn signed_in(identity: Identity) -> Self {
        let session = Self::new();
        session.sign_in(identity);
        session
    }

    pub fn current(&self) -> Option<Identity> {
        self.tx.borrow().identity.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.tx.borrow().loading
    }

    pub fn generation(&self) -> u64 {
        self.tx.borrow().generation
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    pub fn sign_in(&self, identity: Identity) {
        tracing::info!(user = %identity.user_id, "signed in as {}", identity.email);
        self.set_identity(Some(identity));
    }

    pub fn sign_out(&self) {
        self.set_identity(None);
    }

    fn set_identity(&self, identity: Option<Identity>) {
        self.tx.send_modify(|state| {
            let before = state.identity.as_ref().map(|i| i.user_id);
            let after = identity.as_ref().map(|i| i.user_id);
            // Refreshing the token of the same user is not an identity change
            if before != after {
                state.generation += 1;
            }
            state.identity = identity;
            state.loading = false;
        });
    }
}
