use crate::batch::split_into_batches;
use crate::fcm::{MulticastMessage, NotificationProvider};
use crate::selector::DueNotification;
use std::collections::BTreeMap;
use std::num::NonZeroUsize;

/// Totals for the batches submitted by a dispatcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub batches_sent: usize,
    pub batches_failed: usize,
    /// Tokens in batches the provider accepted.
    pub notified: usize,
    /// Tokens the provider rejected individually within accepted batches.
    pub rejected_tokens: usize,
}

impl std::ops::AddAssign for DispatchOutcome {
    fn add_assign(&mut self, other: DispatchOutcome) {
        self.batches_sent += other.batches_sent;
        self.batches_failed += other.batches_failed;
        self.notified += other.notified;
        self.rejected_tokens += other.rejected_tokens;
    }
}

/// Sends due notifications in provider-sized batches.
pub struct Dispatcher<P> {
    provider: P,
    batch_size: NonZeroUsize,
}

impl<P: NotificationProvider> Dispatcher<P> {
    pub fn new(provider: P, batch_size: NonZeroUsize) -> Self {
        Dispatcher {
            provider,
            batch_size,
        }
    }

    #[cfg(test)]
    pub(crate) fn provider(&self) -> &P {
        &self.provider
    }

    /// Submits every batch of `notification` once.
    ///
    /// A failed batch is logged and left out of the count; it never stops the
    /// remaining batches.
    pub async fn dispatch(&self, notification: &DueNotification) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();
        let subject_id = notification.subject_id.as_str();

        for batch in split_into_batches(&notification.tokens, self.batch_size) {
            let message = MulticastMessage {
                tokens: batch,
                title: &notification.title,
                body: &notification.body,
                data: BTreeMap::from([(subject_id, subject_id)]),
            };
            match self.provider.send_each_for_multicast(&message).await {
                Ok(response) => {
                    outcome.batches_sent += 1;
                    outcome.notified += batch.len();
                    outcome.rejected_tokens += response.failure_count();
                    if response.failure_count() > 0 {
                        tracing::warn!(
                            "{} of {} tokens rejected for reminder {} (subject {subject_id})",
                            response.failure_count(),
                            batch.len(),
                            notification.reminder_id,
                        );
                    }
                }
                Err(e) => {
                    outcome.batches_failed += 1;
                    tracing::warn!(
                        "failed to send batch of {} tokens for reminder {} (subject {subject_id}): {e:?}",
                        batch.len(),
                        notification.reminder_id,
                    );
                }
            }
        }

        outcome
    }
}
