//! Core session and overview-aggregation engine for the Trim dashboard.
//!
//! The crate owns the connection lifecycle (disconnected, linked, demo),
//! scopes data fetches to the selected project, derives the dashboard's
//! summary totals from heterogeneous server payloads, and relays chat turns.
//! The surrounding shell renders; it never computes any of this itself.

pub mod aggregator;
pub mod chat;
pub mod credentials;
pub mod demo;
pub mod gateway;
pub mod logging;
pub mod overview;
pub mod providers;
pub mod session;

pub use aggregator::{FetchError, FetchOutcome, OverviewCallback, OverviewReport, OverviewService};
pub use chat::{ChatBridge, ChatTurn, Role, SendOutcome};
pub use credentials::{CredentialError, CredentialStore, StoredConnection, config_directory};
pub use gateway::{
    ApiClient, ApiError, ChatReply, ConnectResponse, DEFAULT_API_BASE, Gateway, Project,
};
pub use logging::{LoggingDestination, LoggingError, current_log_path, init_logging};
pub use overview::{
    Billing, CardValue, DerivedTotals, FALLBACK_CURRENCY, Highlight, Money, OverviewSnapshot,
    ServiceCost, Summary, SummaryCard,
};
pub use providers::{
    CredentialRulesError, PROVIDERS, ProviderSpec, provider_by_tag, validate_credentials,
};
pub use session::{
    Mode, Session, SessionCallback, SessionCheckpoint, SessionError, SessionEvent, SubscriptionId,
};
