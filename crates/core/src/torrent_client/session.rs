//! Authentication state machine shared by the injection clients.
//!
//! A client is either unauthenticated or holds a session. Every RPC goes
//! through [`SessionContract::call`], which establishes a session lazily and,
//! when the backend reports the session as invalid, re-authenticates at most
//! [`MAX_REAUTHENTICATIONS`] times before giving up. The bound keeps two
//! calls that keep invalidating each other's session from looping forever.

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::TorrentClientError;

/// How many times a single call may re-run setup after a session rejection.
pub const MAX_REAUTHENTICATIONS: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState<S> {
    Unauthenticated,
    Authenticated(S),
}

/// Owns a client's session state. Replaced wholesale on re-authentication.
#[derive(Debug)]
pub struct SessionCell<S> {
    state: RwLock<SessionState<S>>,
}

impl<S: Clone> SessionCell<S> {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(SessionState::Unauthenticated),
        }
    }

    /// The current session, if authenticated.
    pub async fn current(&self) -> Option<S> {
        match &*self.state.read().await {
            SessionState::Authenticated(session) => Some(session.clone()),
            SessionState::Unauthenticated => None,
        }
    }

    pub async fn authenticate(&self, session: S) {
        *self.state.write().await = SessionState::Authenticated(session);
    }

    pub async fn invalidate(&self) {
        *self.state.write().await = SessionState::Unauthenticated;
    }

    pub async fn is_authenticated(&self) -> bool {
        matches!(&*self.state.read().await, SessionState::Authenticated(_))
    }
}

impl<S: Clone> Default for SessionCell<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of one RPC attempt that failed.
#[derive(Debug)]
pub enum CallError {
    /// The backend rejected the session; setup may be re-run.
    SessionInvalid,
    Failed(TorrentClientError),
}

impl From<TorrentClientError> for CallError {
    fn from(e: TorrentClientError) -> Self {
        CallError::Failed(e)
    }
}

/// Backend-specific login and single-attempt dispatch. The provided
/// `setup` and `call` drive the state machine.
#[async_trait]
pub trait SessionContract: Send + Sync {
    type Session: Clone + Send + Sync;
    type Call: Send + Sync;
    type Reply: Send;

    fn backend_name(&self) -> &'static str;

    fn session_cell(&self) -> &SessionCell<Self::Session>;

    /// Logs in and discovers optional capabilities.
    async fn establish(&self) -> Result<Self::Session, TorrentClientError>;

    /// Performs one attempt of `call` with `session`.
    async fn dispatch(
        &self,
        session: &Self::Session,
        call: &Self::Call,
    ) -> Result<Self::Reply, CallError>;

    /// Drops any current session and establishes a new one. On failure the
    /// client is left unauthenticated.
    async fn setup(&self) -> Result<Self::Session, TorrentClientError> {
        self.session_cell().invalidate().await;
        let session = self.establish().await?;
        self.session_cell().authenticate(session.clone()).await;
        debug!(client = self.backend_name(), "Session established");
        Ok(session)
    }

    /// Runs `call`, re-authenticating once if the session was rejected.
    async fn call(&self, call: &Self::Call) -> Result<Self::Reply, TorrentClientError> {
        let mut session = match self.session_cell().current().await {
            Some(session) => session,
            None => self.setup().await?,
        };
        let mut reauthentications = 0;

        loop {
            match self.dispatch(&session, call).await {
                Ok(reply) => return Ok(reply),
                Err(CallError::Failed(e)) => return Err(e),
                Err(CallError::SessionInvalid) if reauthentications >= MAX_REAUTHENTICATIONS => {
                    self.session_cell().invalidate().await;
                    return Err(TorrentClientError::AuthenticationFailed(format!(
                        "{} rejected the session again after re-authenticating",
                        self.backend_name()
                    )));
                }
                Err(CallError::SessionInvalid) => {
                    reauthentications += 1;
                    warn!(
                        client = self.backend_name(),
                        "Session rejected, re-authenticating"
                    );
                    session = self.setup().await?;
                }
            }
        }
    }
}
