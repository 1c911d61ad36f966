use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::debug;

use crate::demo;
use crate::gateway::{ApiError, Gateway, Project};
use crate::overview::{DerivedTotals, OverviewSnapshot};
use crate::session::{Mode, Session, SessionCheckpoint, SubscriptionId};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("not connected")]
    Disconnected,
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// A snapshot plus the totals derived from it.
#[derive(Debug, Clone)]
pub struct OverviewReport {
    pub snapshot: OverviewSnapshot,
    pub totals: DerivedTotals,
}

impl OverviewReport {
    fn new(snapshot: OverviewSnapshot) -> Self {
        let totals = DerivedTotals::from_snapshot(&snapshot);
        Self { snapshot, totals }
    }
}

/// Result of a fetch: fresh data for the current scope, or a response that
/// arrived after the session moved on and must not be displayed.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Fresh(OverviewReport),
    Superseded,
}

pub type OverviewCallback = Arc<dyn Fn(&OverviewReport) + Send + Sync>;

/// Fetches and derives the overview for the session's current mode and scope.
///
/// Demo mode resolves from the local fixtures; linked mode goes through the
/// gateway. Either way the request is tagged with the session generation at
/// issue time and the result is dropped if the session moved on before it
/// landed; late responses for a previous project never reach the screen.
/// No retries: a manual reload is the retry mechanism.
pub struct OverviewService {
    gateway: Arc<dyn Gateway>,
    session: Arc<Session>,
    current: Mutex<Option<(u64, OverviewReport)>>,
    subscribers: Mutex<Vec<(SubscriptionId, OverviewCallback)>>,
    next_subscription: AtomicU64,
}

impl OverviewService {
    pub fn new(gateway: Arc<dyn Gateway>, session: Arc<Session>) -> Self {
        Self {
            gateway,
            session,
            current: Mutex::new(None),
            subscribers: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(0),
        }
    }

    pub async fn fetch(&self) -> Result<FetchOutcome, FetchError> {
        let issued = self.session.checkpoint();
        let snapshot = self.load_snapshot(&issued).await?;

        if self.session.generation() != issued.generation {
            debug!(
                scope = ?issued.scope,
                "discarding overview response for a superseded scope"
            );
            return Ok(FetchOutcome::Superseded);
        }

        let report = OverviewReport::new(snapshot);
        *self.current.lock().unwrap() = Some((issued.generation, report.clone()));
        self.publish(&report);
        Ok(FetchOutcome::Fresh(report))
    }

    async fn load_snapshot(
        &self,
        issued: &SessionCheckpoint,
    ) -> Result<OverviewSnapshot, FetchError> {
        match issued.mode {
            Mode::Demo => Ok(demo::demo_overview(issued.scope.as_deref())),
            Mode::Linked => {
                let provider = issued.provider.clone().ok_or(ApiError::MissingProvider)?;
                Ok(self
                    .gateway
                    .get_overview(&provider, issued.scope.as_deref())
                    .await?)
            }
            Mode::Disconnected => Err(FetchError::Disconnected),
        }
    }

    /// The latest report, if one was fetched for the session's current mode
    /// and scope. Any scope or mode change makes this `None` until the next
    /// successful fetch; there is no cross-scope cache reuse.
    pub fn current(&self) -> Option<OverviewReport> {
        let guard = self.current.lock().unwrap();
        guard.as_ref().and_then(|(generation, report)| {
            (*generation == self.session.generation()).then(|| report.clone())
        })
    }

    /// Projects selectable in the current mode.
    pub async fn projects(&self) -> Result<Vec<Project>, FetchError> {
        let checkpoint = self.session.checkpoint();
        match checkpoint.mode {
            Mode::Demo => Ok(demo::demo_projects()),
            Mode::Linked => {
                let provider = checkpoint.provider.ok_or(ApiError::MissingProvider)?;
                Ok(self.gateway.list_projects(&provider).await?)
            }
            Mode::Disconnected => Err(FetchError::Disconnected),
        }
    }

    pub fn subscribe(&self, callback: OverviewCallback) -> SubscriptionId {
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

    fn publish(&self, report: &OverviewReport) {
        let subscribers: Vec<OverviewCallback> = self
            .subscribers
            .lock()
            .unwrap()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for callback in &subscribers {
            callback(report);
        }
    }
}
