//! PolicySweepScheduler - Periodic time-driven lifecycle sweeps.
//!
//! Three sweeps move records whose policy window has elapsed (trial end,
//! dunning retry, pause end) through the same [`LifecycleService`] apply
//! path as webhooks. Three more only send outreach notifications and never
//! write a status. A last one prunes the processed-event log.
//!
//! ## Configuration
//!
//! | Setting | Default | Description |
//! |---------|---------|-------------|
//! | `sweep_interval_secs` | 60 | Delay between iterations of each sweep |
//! | `sweep_batch_size` | 100 | Max records examined per iteration |
//!
//! ## Graceful Shutdown
//!
//! Each sweep runs on its own task and watches a shutdown channel. A
//! signalled task finishes its current iteration and exits without starting
//! another.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::config::LifecycleConfig;
use crate::domain::foundation::{DomainError, Timestamp};
use crate::domain::subscription::NotificationTemplate;
use crate::ports::{
    DueCondition, Notification, Notifier, OutreachQuery, ProcessedEventLog, SendOutcome,
    SubscriptionStore,
};

use super::handlers::{ApplyOutcome, LifecycleService};

/// Minimum interval for the event-log retention sweep.
const RETENTION_INTERVAL: Duration = Duration::from_secs(3600);

/// One periodic sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SweepKind {
    /// Trialing records whose `trial_end` has passed.
    TrialWindow,
    /// PastDue records whose next retry is due.
    DunningRetry,
    /// Paused records whose pause window has ended.
    PauseWindow,
    TrialEndingSoon,
    Onboarding,
    WinBack,
    /// Delete processed webhook events past retention.
    EventLogRetention,
}

impl SweepKind {
    pub const ALL: [SweepKind; 7] = [
        SweepKind::TrialWindow,
        SweepKind::DunningRetry,
        SweepKind::PauseWindow,
        SweepKind::TrialEndingSoon,
        SweepKind::Onboarding,
        SweepKind::WinBack,
        SweepKind::EventLogRetention,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SweepKind::TrialWindow => "trial_window",
            SweepKind::DunningRetry => "dunning_retry",
            SweepKind::PauseWindow => "pause_window",
            SweepKind::TrialEndingSoon => "trial_ending_soon",
            SweepKind::Onboarding => "onboarding",
            SweepKind::WinBack => "win_back",
            SweepKind::EventLogRetention => "event_log_retention",
        }
    }

    fn due_condition(&self) -> Option<DueCondition> {
        match self {
            SweepKind::TrialWindow => Some(DueCondition::TrialWindow),
            SweepKind::DunningRetry => Some(DueCondition::DunningRetry),
            SweepKind::PauseWindow => Some(DueCondition::PauseWindow),
            _ => None,
        }
    }
}

/// Counts from a single sweep iteration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Records returned by the store query.
    pub examined: usize,
    /// Status writes that landed.
    pub applied: usize,
    /// Notifications delivered (duplicates excluded).
    pub notified: usize,
    /// Processed events pruned.
    pub pruned: u64,
    /// Records whose apply or send failed.
    pub failed: usize,
}

/// Owns every sweep. Built once at startup and shared by the sweep tasks.
pub struct PolicySweepScheduler {
    lifecycle: Arc<LifecycleService>,
    notifier: Arc<dyn Notifier>,
    event_log: Arc<dyn ProcessedEventLog>,
    config: LifecycleConfig,
}

impl PolicySweepScheduler {
    pub fn new(
        lifecycle: Arc<LifecycleService>,
        notifier: Arc<dyn Notifier>,
        event_log: Arc<dyn ProcessedEventLog>,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            lifecycle,
            notifier,
            event_log,
            config,
        }
    }

    fn store(&self) -> &Arc<dyn SubscriptionStore> {
        self.lifecycle.store()
    }

    fn interval_for(&self, kind: SweepKind) -> Duration {
        match kind {
            SweepKind::EventLogRetention => self.config.sweep_interval().max(RETENTION_INTERVAL),
            _ => self.config.sweep_interval(),
        }
    }

    /// Spawn one task per sweep. Each stops once `shutdown` turns `true`.
    pub fn spawn(self: Arc<Self>, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        SweepKind::ALL
            .iter()
            .map(|&kind| {
                let scheduler = Arc::clone(&self);
                let shutdown = shutdown.clone();
                tokio::spawn(async move { scheduler.run(kind, shutdown).await })
            })
            .collect()
    }

    /// Run `kind` until the shutdown signal is received.
    pub async fn run(&self, kind: SweepKind, mut shutdown: watch::Receiver<bool>) {
        let mut interval = time::interval(self.interval_for(kind));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(sweep = kind.name(), "Sweep started");

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }

                _ = interval.tick() => {
                    match self.run_once(kind, Timestamp::now()).await {
                        Ok(report) if report != SweepReport::default() => {
                            tracing::info!(
                                sweep = kind.name(),
                                examined = report.examined,
                                applied = report.applied,
                                notified = report.notified,
                                pruned = report.pruned,
                                failed = report.failed,
                                "Sweep iteration finished"
                            );
                        }
                        Ok(_) => {}
                        Err(e) => {
                            tracing::error!(sweep = kind.name(), error = %e, "Sweep iteration failed");
                        }
                    }
                }
            }
        }

        tracing::info!(sweep = kind.name(), "Sweep stopped");
    }

    /// Run a single iteration of `kind` as of `now`.
    ///
    /// A failure on one record is logged and counted; the rest of the batch
    /// still runs. Only a failed store query aborts the iteration.
    pub async fn run_once(&self, kind: SweepKind, now: Timestamp) -> Result<SweepReport, DomainError> {
        if let Some(condition) = kind.due_condition() {
            return self.sweep_due(condition, now).await;
        }

        match kind {
            SweepKind::TrialEndingSoon => {
                let lead = self.config.trial_ending_soon_lead_days;
                self.sweep_outreach(
                    OutreachQuery::TrialEndingBetween {
                        from: now,
                        to: now.add_days(lead),
                    },
                    NotificationTemplate::TrialEndingSoon,
                )
                .await
            }
            SweepKind::Onboarding => {
                let mut total = SweepReport::default();
                for &day in &self.config.onboarding_days {
                    let day_i = i64::from(day);
                    let report = self
                        .sweep_outreach(
                            OutreachQuery::CreatedBetween {
                                from: now.minus_days(day_i + 1),
                                to: now.minus_days(day_i),
                            },
                            NotificationTemplate::Onboarding { day },
                        )
                        .await?;
                    total.examined += report.examined;
                    total.notified += report.notified;
                    total.failed += report.failed;
                }
                Ok(total)
            }
            SweepKind::WinBack => {
                self.sweep_outreach(
                    OutreachQuery::LapsedBetween {
                        from: now.minus_days(self.config.win_back_max_days),
                        to: now.minus_days(self.config.win_back_min_days),
                    },
                    NotificationTemplate::WinBack,
                )
                .await
            }
            SweepKind::EventLogRetention => {
                let cutoff = now.minus_days(self.config.processed_event_retention_days);
                let pruned = self.event_log.delete_processed_before(cutoff).await?;
                Ok(SweepReport {
                    pruned,
                    ..SweepReport::default()
                })
            }
            SweepKind::TrialWindow | SweepKind::DunningRetry | SweepKind::PauseWindow => {
                Ok(SweepReport::default())
            }
        }
    }

    async fn sweep_due(
        &self,
        condition: DueCondition,
        now: Timestamp,
    ) -> Result<SweepReport, DomainError> {
        let due = self
            .store()
            .find_due(condition, now, self.config.sweep_batch_size)
            .await?;
        let trigger = condition.trigger();
        let mut report = SweepReport {
            examined: due.len(),
            ..SweepReport::default()
        };

        for subscription in due {
            let subscription_id = subscription.id;
            match self.lifecycle.apply_to(subscription, &trigger, now).await {
                Ok(ApplyOutcome::Applied { .. }) => report.applied += 1,
                Ok(_) => {}
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(
                        %subscription_id,
                        trigger = trigger.name(),
                        error = %e,
                        "Sweep could not apply trigger"
                    );
                }
            }
        }

        Ok(report)
    }

    async fn sweep_outreach(
        &self,
        query: OutreachQuery,
        template: NotificationTemplate,
    ) -> Result<SweepReport, DomainError> {
        let candidates = self
            .store()
            .find_for_outreach(query, self.config.sweep_batch_size)
            .await?;
        let mut report = SweepReport {
            examined: candidates.len(),
            ..SweepReport::default()
        };

        for subscription in &candidates {
            let notification = Notification::for_subscription(subscription, template);
            match self.notifier.send(&notification).await {
                Ok(SendOutcome::Sent) => report.notified += 1,
                Ok(SendOutcome::Duplicate) => {}
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(
                        subscription_id = %subscription.id,
                        template = %template.key(),
                        error = %e,
                        "Outreach notification failed"
                    );
                }
            }
        }

        Ok(report)
    }
}
