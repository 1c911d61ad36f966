use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::info;

use crate::credentials::{CredentialError, CredentialStore};

/// Connection lifecycle state. `Linked` holds real credentials; `Demo` serves
/// fixture data and never touches the credential store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Disconnected,
    Linked,
    Demo,
}

impl Mode {
    /// True when screens behind the connection gate may be shown.
    pub fn is_active(self) -> bool {
        matches!(self, Mode::Linked | Mode::Demo)
    }
}

/// Change notifications published to registered subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    ModeChanged(Mode),
    ScopeChanged(Option<String>),
}

pub type SessionCallback = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

/// Handle returned by [`Session::subscribe`]; pass back to
/// [`Session::unsubscribe`] on teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("token and provider must be non-empty")]
    EmptyCredentials,
    #[error("already in an active session; disconnect first")]
    ActiveSession,
    #[error("cannot select a project while disconnected")]
    NotActive,
    #[error(transparent)]
    Store(#[from] CredentialError),
}

/// Mode, scope, and generation read under one lock, for tagging fetches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCheckpoint {
    pub mode: Mode,
    pub provider: Option<String>,
    pub scope: Option<String>,
    pub generation: u64,
}

struct SessionState {
    mode: Mode,
    provider: Option<String>,
    scope: Option<String>,
    generation: u64,
}

/// The single owner of connection lifecycle and scope, and the only writer of
/// the credential store. Constructed once at startup and shared by handle;
/// `disconnect` is the reset, never reconstruction.
///
/// Every mode or scope change bumps the generation counter. Consumers tag
/// in-flight fetches with it and discard responses whose tag no longer
/// matches, so data for a previous scope can never land on the current one.
pub struct Session {
    store: CredentialStore,
    state: Mutex<SessionState>,
    subscribers: Mutex<Vec<(SubscriptionId, SessionCallback)>>,
    next_subscription: AtomicU64,
}

impl Session {
    /// Reconstruct the session from the credential store: a stored pair means
    /// `Linked`, anything else means `Disconnected`. Demo is deliberately
    /// never restored: it is an explicit in-memory choice each time, so a
    /// demo session can never be mistaken for a real account after a reload.
    pub fn restore(store: CredentialStore) -> Result<Self, SessionError> {
        let (mode, provider) = match store.load()? {
            Some(connection) => (Mode::Linked, Some(connection.provider)),
            None => (Mode::Disconnected, None),
        };
        Ok(Self {
            store,
            state: Mutex::new(SessionState {
                mode,
                provider,
                scope: None,
                generation: 0,
            }),
            subscribers: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(0),
        })
    }

    pub fn mode(&self) -> Mode {
        self.state.lock().unwrap().mode
    }

    /// Provider tag of the linked account, if any. The token itself stays in
    /// the credential store.
    pub fn provider(&self) -> Option<String> {
        self.state.lock().unwrap().provider.clone()
    }

    pub fn scope(&self) -> Option<String> {
        self.state.lock().unwrap().scope.clone()
    }

    pub fn generation(&self) -> u64 {
        self.state.lock().unwrap().generation
    }

    pub fn checkpoint(&self) -> SessionCheckpoint {
        let state = self.state.lock().unwrap();
        SessionCheckpoint {
            mode: state.mode,
            provider: state.provider.clone(),
            scope: state.scope.clone(),
            generation: state.generation,
        }
    }

    /// Link to a provider account. Persists the pair before the in-memory
    /// state changes, so a storage failure leaves the session untouched.
    /// Calling again while linked overwrites the stored credentials.
    pub fn connect(&self, token: &str, provider: &str) -> Result<(), SessionError> {
        let token = token.trim();
        let provider = provider.trim();
        if token.is_empty() || provider.is_empty() {
            return Err(SessionError::EmptyCredentials);
        }

        let events = {
            let mut state = self.state.lock().unwrap();
            if state.mode == Mode::Demo {
                return Err(SessionError::ActiveSession);
            }
            self.store.save(token, provider)?;

            let mut events = Vec::new();
            if state.mode != Mode::Linked {
                events.push(SessionEvent::ModeChanged(Mode::Linked));
            }
            if state.scope.is_some() {
                events.push(SessionEvent::ScopeChanged(None));
            }
            state.mode = Mode::Linked;
            state.provider = Some(provider.to_string());
            state.scope = None;
            state.generation += 1;
            events
        };

        info!(provider, "session linked");
        self.publish(&events);
        Ok(())
    }

    /// Enter demo mode. Only legal from `Disconnected`: switching between a
    /// linked account and demo must pass through `disconnect`, which clears
    /// credentials and scope on the way.
    pub fn enter_demo(&self) -> Result<(), SessionError> {
        {
            let mut state = self.state.lock().unwrap();
            if state.mode != Mode::Disconnected {
                return Err(SessionError::ActiveSession);
            }
            state.mode = Mode::Demo;
            state.scope = None;
            state.generation += 1;
        }

        info!("demo session started");
        self.publish(&[SessionEvent::ModeChanged(Mode::Demo)]);
        Ok(())
    }

    /// Tear down the session: clear stored credentials, drop the scope, and
    /// return to `Disconnected`. Safe from any state; a second call in a row
    /// changes nothing.
    pub fn disconnect(&self) -> Result<(), SessionError> {
        let events = {
            let mut state = self.state.lock().unwrap();
            self.store.clear()?;
            if state.mode == Mode::Disconnected {
                return Ok(());
            }

            let mut events = vec![SessionEvent::ModeChanged(Mode::Disconnected)];
            if state.scope.is_some() {
                events.push(SessionEvent::ScopeChanged(None));
            }
            state.mode = Mode::Disconnected;
            state.provider = None;
            state.scope = None;
            state.generation += 1;
            events
        };

        info!("session disconnected");
        self.publish(&events);
        Ok(())
    }

    /// Select the project filter, or `None` for "all projects". Selecting
    /// while disconnected signals a UI bug instead of being swallowed.
    pub fn select_scope(&self, project: Option<String>) -> Result<(), SessionError> {
        let event = {
            let mut state = self.state.lock().unwrap();
            if !state.mode.is_active() {
                return Err(SessionError::NotActive);
            }
            if state.scope == project {
                return Ok(());
            }
            state.scope = project.clone();
            state.generation += 1;
            SessionEvent::ScopeChanged(project)
        };

        self.publish(std::slice::from_ref(&event));
        Ok(())
    }

    pub fn subscribe(&self, callback: SessionCallback) -> SubscriptionId {
        let id = SubscriptionId::new(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.subscribers.lock().unwrap().push((id, callback));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers
            .lock()
            .unwrap()
            .retain(|(existing, _)| *existing != id);
    }

    // Callbacks run outside the state lock; a subscriber may read the session.
    fn publish(&self, events: &[SessionEvent]) {
        let subscribers: Vec<SessionCallback> = self
            .subscribers
            .lock()
            .unwrap()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for event in events {
            for callback in &subscribers {
                callback(event);
            }
        }
    }
}
