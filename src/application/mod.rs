//! Application layer - Commands, Queries, Handlers and background sweeps.
//!
//! This layer orchestrates domain operations and coordinates between ports.

pub mod handlers;
pub mod policy_sweeps;

pub use handlers::{
    ApplyOutcome, DispatchReport, GetSubscriptionHandler, GetSubscriptionQuery, IngestOutcome,
    IngestProviderEventCommand, IngestProviderEventHandler, LifecycleService, ManualAction,
    ManualActionCommand, ManualActionHandler, SideEffectDispatcher, StartTrialCommand,
    StartTrialHandler,
};
pub use policy_sweeps::{PolicySweepScheduler, SweepKind, SweepReport};
