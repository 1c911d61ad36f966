use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};
use tempfile::tempdir;
use tokio::sync::Notify;
use trim_core::aggregator::{FetchError, FetchOutcome, OverviewService};
use trim_core::credentials::CredentialStore;
use trim_core::gateway::{ApiError, ChatReply, ConnectResponse, Gateway, Project};
use trim_core::overview::OverviewSnapshot;
use trim_core::session::Session;

/// Serves canned overview payloads keyed by project filter. Scopes listed in
/// `gates` park their response until the gate is notified, which lets tests
/// control arrival order.
struct ScriptedGateway {
    overviews: HashMap<Option<String>, Value>,
    gates: HashMap<Option<String>, Arc<Notify>>,
    calls: Mutex<Vec<(String, Option<String>)>>,
}

impl ScriptedGateway {
    fn new(overviews: Vec<(Option<&str>, Value)>) -> Self {
        Self {
            overviews: overviews
                .into_iter()
                .map(|(scope, payload)| (scope.map(str::to_string), payload))
                .collect(),
            gates: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn gate(mut self, scope: Option<&str>, gate: Arc<Notify>) -> Self {
        self.gates.insert(scope.map(str::to_string), gate);
        self
    }

    fn calls(&self) -> Vec<(String, Option<String>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Gateway for ScriptedGateway {
    async fn connect(
        &self,
        _provider: &str,
        _credentials: &Value,
    ) -> Result<ConnectResponse, ApiError> {
        unreachable!("overview tests never connect through the gateway")
    }

    async fn list_projects(&self, provider: &str) -> Result<Vec<Project>, ApiError> {
        self.calls
            .lock()
            .unwrap()
            .push((provider.to_string(), None));
        Ok(vec![Project {
            id: "proj-7".to_string(),
            name: "acme-prod".to_string(),
            provider: Some(provider.to_string()),
        }])
    }

    async fn get_overview(
        &self,
        provider: &str,
        project: Option<&str>,
    ) -> Result<OverviewSnapshot, ApiError> {
        let key = project.map(str::to_string);
        self.calls
            .lock()
            .unwrap()
            .push((provider.to_string(), key.clone()));

        if let Some(gate) = self.gates.get(&key) {
            gate.notified().await;
        }
        let payload = self
            .overviews
            .get(&key)
            .unwrap_or_else(|| panic!("no scripted overview for scope {key:?}"))
            .clone();
        Ok(serde_json::from_value(payload).expect("scripted payload deserializes"))
    }

    async fn send_chat(&self, _message: &str) -> Result<ChatReply, ApiError> {
        unreachable!("overview tests never chat")
    }
}

fn overview_payload(total_resources: u64, waste_count: u64, savings: f64) -> Value {
    json!({
        "summary": {
            "total_resources": total_resources,
            "waste_count": waste_count,
            "with_metrics": total_resources,
            "over_provisioned": 0,
            "under_provisioned": 0
        },
        "summary_cards": [
            { "id": "total_resources", "label": "Total resources", "value": total_resources }
        ],
        "highlights": [
            { "id": "vm-1", "name": "vm-1", "reason": "idle",
              "estimated_savings": { "value": savings, "currency": "USD" } }
        ],
        "billing": { "currency_code": "USD" }
    })
}

fn linked_session(dir: &tempfile::TempDir) -> Arc<Session> {
    let session = Session::restore(CredentialStore::new(dir.path())).expect("restore");
    session.connect("tok1", "gcp").expect("connect");
    Arc::new(session)
}

#[tokio::test]
async fn scoped_fetch_derives_totals_for_the_selected_project() {
    let dir = tempdir().expect("tempdir");
    let session = linked_session(&dir);
    session
        .select_scope(Some("proj-7".to_string()))
        .expect("select scope");

    let payload = json!({
        "summary": { "total_resources": 5, "waste_count": 3, "with_metrics": 4,
                     "over_provisioned": 1, "under_provisioned": 0 },
        "summary_cards": [],
        "highlights": [
            { "id": "vm-1", "name": "vm-1", "reason": "idle",
              "estimated_savings": { "value": 12.5, "currency": "USD" } }
        ]
    });
    let gateway = Arc::new(ScriptedGateway::new(vec![(Some("proj-7"), payload)]));
    let service = OverviewService::new(gateway.clone(), session.clone());

    let outcome = service.fetch().await.expect("fetch");
    let report = match outcome {
        FetchOutcome::Fresh(report) => report,
        FetchOutcome::Superseded => panic!("nothing changed; the fetch must be fresh"),
    };
    assert_eq!(report.totals.highlight_savings, 12.5);
    assert!(report.totals.needs_attention);
    assert_eq!(report.totals.currency, "USD");

    assert_eq!(
        gateway.calls(),
        vec![("gcp".to_string(), Some("proj-7".to_string()))]
    );
    assert!(service.current().is_some());
}

#[tokio::test]
async fn late_response_for_a_previous_scope_is_discarded() {
    let dir = tempdir().expect("tempdir");
    let session = linked_session(&dir);
    session
        .select_scope(Some("proj-a".to_string()))
        .expect("select scope a");

    let gate_a = Arc::new(Notify::new());
    let gateway = Arc::new(
        ScriptedGateway::new(vec![
            (Some("proj-a"), overview_payload(10, 1, 100.0)),
            (Some("proj-b"), overview_payload(20, 2, 200.0)),
        ])
        .gate(Some("proj-a"), gate_a.clone()),
    );
    let service = Arc::new(OverviewService::new(gateway.clone(), session.clone()));

    // Fetch for project A goes out first and parks inside the gateway.
    let fetch_a = tokio::spawn({
        let service = service.clone();
        async move { service.fetch().await }
    });
    while gateway.calls().is_empty() {
        tokio::task::yield_now().await;
    }

    // User switches to project B before A resolves; B's fetch completes.
    session
        .select_scope(Some("proj-b".to_string()))
        .expect("select scope b");
    let fresh = service.fetch().await.expect("fetch b");
    let report_b = match fresh {
        FetchOutcome::Fresh(report) => report,
        FetchOutcome::Superseded => panic!("b was fetched for the current scope"),
    };
    assert_eq!(report_b.snapshot.summary.total_resources, 20);

    // Now A's response finally arrives, and must be dropped.
    gate_a.notify_one();
    let stale = fetch_a.await.expect("join").expect("fetch a");
    assert!(matches!(stale, FetchOutcome::Superseded));

    let current = service.current().expect("current report");
    assert_eq!(current.snapshot.summary.total_resources, 20);
    assert_eq!(current.totals.highlight_savings, 200.0);
}

#[tokio::test]
async fn scope_change_invalidates_the_cached_report() {
    let dir = tempdir().expect("tempdir");
    let session = linked_session(&dir);

    let gateway = Arc::new(ScriptedGateway::new(vec![(
        None,
        overview_payload(4, 0, 0.0),
    )]));
    let service = OverviewService::new(gateway, session.clone());

    service.fetch().await.expect("fetch");
    assert!(service.current().is_some());

    session
        .select_scope(Some("proj-7".to_string()))
        .expect("select scope");
    assert!(
        service.current().is_none(),
        "a cached overview must not leak across scopes"
    );
}

#[tokio::test]
async fn demo_mode_serves_fixtures_through_the_same_derivation() {
    let dir = tempdir().expect("tempdir");
    let session = Arc::new(Session::restore(CredentialStore::new(dir.path())).expect("restore"));
    session.enter_demo().expect("enter demo");

    // The gateway has nothing scripted: demo mode must never reach it.
    let gateway = Arc::new(ScriptedGateway::new(Vec::new()));
    let service = OverviewService::new(gateway.clone(), session.clone());

    let combined = match service.fetch().await.expect("fetch") {
        FetchOutcome::Fresh(report) => report,
        FetchOutcome::Superseded => panic!("nothing changed"),
    };
    assert_eq!(combined.snapshot.summary.total_resources, 32);
    assert_eq!(combined.totals.highlight_savings_rounded(), 471.8);
    assert!(combined.totals.needs_attention);

    session
        .select_scope(Some("demo-project-staging".to_string()))
        .expect("select staging");
    let staging = match service.fetch().await.expect("fetch staging") {
        FetchOutcome::Fresh(report) => report,
        FetchOutcome::Superseded => panic!("nothing changed"),
    };
    assert_eq!(staging.snapshot.summary.waste_count, 2);
    assert_eq!(staging.totals.highlight_savings_rounded(), 24.0);

    let projects = service.projects().await.expect("projects");
    assert_eq!(projects.len(), 2);
    assert!(gateway.calls().is_empty(), "demo mode stays off the network");
}

#[tokio::test]
async fn subscribers_hear_about_fresh_reports_only() {
    let dir = tempdir().expect("tempdir");
    let session = linked_session(&dir);
    let gateway = Arc::new(ScriptedGateway::new(vec![(
        None,
        overview_payload(4, 1, 10.0),
    )]));
    let service = OverviewService::new(gateway, session.clone());

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let subscription = service.subscribe(Arc::new(move |report| {
        sink.lock()
            .unwrap()
            .push(report.snapshot.summary.total_resources);
    }));

    service.fetch().await.expect("fetch");
    assert_eq!(*seen.lock().unwrap(), vec![4]);

    service.unsubscribe(subscription);
    service.fetch().await.expect("fetch again");
    assert_eq!(seen.lock().unwrap().len(), 1, "no events after unsubscribe");
}

#[tokio::test]
async fn fetching_while_disconnected_is_an_error() {
    let dir = tempdir().expect("tempdir");
    let session = Arc::new(Session::restore(CredentialStore::new(dir.path())).expect("restore"));
    let gateway = Arc::new(ScriptedGateway::new(Vec::new()));
    let service = OverviewService::new(gateway, session);

    assert!(matches!(
        service.fetch().await,
        Err(FetchError::Disconnected)
    ));
    assert!(matches!(
        service.projects().await,
        Err(FetchError::Disconnected)
    ));
}

#[tokio::test]
async fn linked_projects_come_from_the_gateway() {
    let dir = tempdir().expect("tempdir");
    let session = linked_session(&dir);
    let gateway = Arc::new(ScriptedGateway::new(Vec::new()));
    let service = OverviewService::new(gateway.clone(), session);

    let projects = service.projects().await.expect("projects");
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0].id, "proj-7");
    assert_eq!(gateway.calls(), vec![("gcp".to_string(), None)]);
}
