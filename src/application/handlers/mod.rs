//! Application handlers.
//!
//! Command and query handlers that orchestrate domain operations.

pub mod subscription;

pub use subscription::{
    ApplyOutcome, DispatchReport, GetSubscriptionHandler, GetSubscriptionQuery, IngestOutcome,
    IngestProviderEventCommand, IngestProviderEventHandler, LifecycleService, ManualAction,
    ManualActionCommand, ManualActionHandler, SideEffectDispatcher, StartTrialCommand,
    StartTrialHandler,
};
