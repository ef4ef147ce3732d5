//! The reminder notification job.
//!
//! One run evaluates each configured category in turn: load its bindings,
//! select the due ones at the evaluation instant, and dispatch them. A store
//! failure aborts the run (categories not reached yet are skipped);
//! notification failures are counted and the run continues.

use crate::db::reminders::ReminderStore;
use crate::dispatch::{DispatchOutcome, Dispatcher};
use crate::errors::InvocationError;
use crate::fcm::NotificationProvider;
use crate::reminder::Category;
use crate::selector::select_due;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobReport {
    /// Due (reminder, subject) pairs across all categories.
    pub due: usize,
    pub dispatch: DispatchOutcome,
}

impl JobReport {
    /// Number of recipient tokens in batches the provider accepted.
    pub fn notified(&self) -> usize {
        self.dispatch.notified
    }

    /// The plain-text line reported back to the trigger.
    pub fn success_line(&self) -> String {
        format!("success: (count {})\n", self.notified())
    }
}

pub struct ReminderJob<S, P> {
    store: S,
    dispatcher: Dispatcher<P>,
    categories: Vec<Category>,
}

impl<S, P> ReminderJob<S, P>
where
    S: ReminderStore,
    P: NotificationProvider,
{
    pub fn new(store: S, dispatcher: Dispatcher<P>, categories: Vec<Category>) -> Self {
        ReminderJob {
            store,
            dispatcher,
            categories,
        }
    }

    pub async fn run(&self, now: DateTime<Utc>) -> Result<JobReport, InvocationError> {
        let mut report = JobReport::default();

        for &category in &self.categories {
            let bindings = self
                .store
                .bindings(category)
                .await
                .map_err(InvocationError::Store)?;
            let considered = bindings.len();
            let due = select_due(bindings, now);
            tracing::debug!(
                "{category}: {} of {considered} bindings due at {now}",
                due.len()
            );

            report.due += due.len();
            for notification in &due {
                report.dispatch += self.dispatcher.dispatch(notification).await;
            }
        }

        tracing::info!(
            "notified {} tokens for {} due reminders ({} batches sent, {} failed, {} tokens rejected)",
            report.dispatch.notified,
            report.due,
            report.dispatch.batches_sent,
            report.dispatch.batches_failed,
            report.dispatch.rejected_tokens,
        );
        Ok(report)
    }
}
