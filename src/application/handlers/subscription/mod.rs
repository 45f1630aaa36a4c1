//! Subscription lifecycle handlers.
//!
//! Every status change funnels through [`LifecycleService`]; the other
//! handlers translate an inbound request into a trigger for it.

mod get_subscription;
mod ingest_provider_event;
mod lifecycle_service;
mod manual_action;
mod side_effect_dispatcher;
mod start_trial;

pub use get_subscription::{GetSubscriptionHandler, GetSubscriptionQuery};
pub use ingest_provider_event::{
    IngestOutcome, IngestProviderEventCommand, IngestProviderEventHandler,
};
pub use lifecycle_service::{ApplyOutcome, LifecycleService};
pub use manual_action::{ManualAction, ManualActionCommand, ManualActionHandler};
pub use side_effect_dispatcher::{DispatchReport, SideEffectDispatcher};
pub use start_trial::{StartTrialCommand, StartTrialHandler};
