//! Push notification delivery through Firebase Cloud Messaging.

use std::collections::BTreeMap;

pub mod api;
pub mod auth;
pub mod client;

pub use client::FcmClient;

/// A notification addressed to many device tokens at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MulticastMessage<'a> {
    pub tokens: &'a [String],
    pub title: &'a str,
    pub body: &'a str,
    pub data: BTreeMap<&'a str, &'a str>,
}

/// Outcome of delivering to a single token of a multicast message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendResponse {
    /// Message name assigned by the provider on success.
    pub message_id: Option<String>,
    pub error: Option<String>,
}

impl SendResponse {
    pub fn success(message_id: impl Into<String>) -> Self {
        SendResponse {
            message_id: Some(message_id.into()),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        SendResponse {
            message_id: None,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-token results of a multicast send, in token order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchResponse {
    pub responses: Vec<SendResponse>,
}

impl BatchResponse {
    pub fn success_count(&self) -> usize {
        self.responses.iter().filter(|r| r.is_success()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.responses.len() - self.success_count()
    }
}

/// A push notification provider.
///
/// An `Err` means the batch as a whole could not be submitted, or that no
/// request of it reached the provider. Tokens that the provider rejects
/// individually are reported inside the `BatchResponse`.
#[async_trait::async_trait]
pub trait NotificationProvider: Send + Sync {
    async fn send_each_for_multicast(
        &self,
        message: &MulticastMessage<'_>,
    ) -> anyhow::Result<BatchResponse>;
}

/// Provider that only logs what it would have sent.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogOnly;

#[async_trait::async_trait]
impl NotificationProvider for LogOnly {
    async fn send_each_for_multicast(
        &self,
        message: &MulticastMessage<'_>,
    ) -> anyhow::Result<BatchResponse> {
        tracing::info!(
            "dry run: would notify {} tokens (title={:?}, body={:?}, data={:?})",
            message.tokens.len(),
            message.title,
            message.body,
            message.data,
        );
        Ok(BatchResponse {
            responses: message
                .tokens
                .iter()
                .map(|_| SendResponse::success("dry-run"))
                .collect(),
        })
    }
}
