use crate::batch::MAX_BATCH_SIZE;
use crate::config::FcmConfig;
use crate::fcm::api::{self, ErrorResponse, SendRequest};
use crate::fcm::auth::{Credentials, TokenSource};
use crate::fcm::{BatchResponse, MulticastMessage, NotificationProvider, SendResponse};
use anyhow::Context as _;
use futures::FutureExt;
use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use reqwest::{Client, Response, StatusCode};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use std::num::NonZeroUsize;
use std::sync::Arc;
use url::Url;

/// Client for the FCM HTTP v1 API.
///
/// FCM v1 has no multicast endpoint, so a multicast message is sent as one
/// `messages:send` request per token with a bounded number in flight.
pub struct FcmClient {
    client: Client,
    send_url: Url,
    tokens: Arc<TokenSource>,
    max_concurrent_sends: NonZeroUsize,
}

/// Why a single `messages:send` request failed.
#[derive(Debug)]
enum SendError {
    /// FCM answered and refused this token.
    Rejected(anyhow::Error),
    /// The request never reached FCM, or FCM could not serve it.
    Unavailable(anyhow::Error),
}

impl FcmClient {
    /// Builds a client that loads its own credentials from `config`.
    pub fn new(client: Client, config: &FcmConfig) -> anyhow::Result<Self> {
        let tokens = TokenSource::new(Credentials::load(&config.credentials)?);
        FcmClient::with_token_source(client, config, Arc::new(tokens))
    }

    /// Builds a client that shares `tokens` (and its cached access token).
    pub fn with_token_source(
        client: Client,
        config: &FcmConfig,
        tokens: Arc<TokenSource>,
    ) -> anyhow::Result<Self> {
        let send_url = format!(
            "{}/v1/projects/{}/messages:send",
            config.api_url.trim_end_matches('/'),
            config.project_id
        );
        let send_url = Url::parse(&send_url)
            .with_context(|| format!("invalid FCM endpoint `{send_url}`"))?;
        Ok(FcmClient {
            client,
            send_url,
            tokens,
            max_concurrent_sends: config.max_concurrent_sends,
        })
    }

    async fn send(
        &self,
        device: &str,
        message: &MulticastMessage<'_>,
        auth: &str,
    ) -> Result<String, SendError> {
        let body = SendRequest {
            message: api::Message {
                token: device,
                notification: api::Notification {
                    title: message.title,
                    body: message.body,
                },
                data: &message.data,
            },
        };
        let response = self
            .client
            .post(self.send_url.clone())
            .bearer_auth(auth)
            .json(&body)
            .send()
            .await
            .context("fail sending FCM message")
            .map_err(SendError::Unavailable)?;
        let status = response.status();
        match deserialize_response::<api::SendResponse>(response).await {
            Ok(sent) => Ok(sent.name),
            Err(e) if is_unavailable(status) => Err(SendError::Unavailable(e)),
            Err(e) => Err(SendError::Rejected(e)),
        }
    }
}

/// Statuses that say nothing about the token itself.
fn is_unavailable(status: StatusCode) -> bool {
    status.is_server_error()
        || matches!(
            status,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS
        )
}

#[async_trait::async_trait]
impl NotificationProvider for FcmClient {
    async fn send_each_for_multicast(
        &self,
        message: &MulticastMessage<'_>,
    ) -> anyhow::Result<BatchResponse> {
        anyhow::ensure!(!message.tokens.is_empty(), "tokens must not be empty");
        anyhow::ensure!(
            message.tokens.len() <= MAX_BATCH_SIZE.get(),
            "tokens must not contain more than {MAX_BATCH_SIZE} elements, got {}",
            message.tokens.len()
        );

        let auth = self
            .tokens
            .access_token(&self.client)
            .await
            .context("obtaining FCM access token")?;
        let auth = auth.expose_secret();

        let sends: Vec<BoxFuture<'_, Result<String, SendError>>> = message
            .tokens
            .iter()
            .map(|device| self.send(device, message, auth).boxed())
            .collect();
        let results: Vec<_> = stream::iter(sends)
            .buffered(self.max_concurrent_sends.get())
            .collect()
            .await;

        let mut responses = Vec::with_capacity(results.len());
        let mut reached = false;
        let mut unavailable = None;
        for result in results {
            match result {
                Ok(name) => {
                    reached = true;
                    responses.push(SendResponse::success(name));
                }
                Err(SendError::Rejected(e)) => {
                    reached = true;
                    tracing::debug!("FCM rejected a token: {e:?}");
                    responses.push(SendResponse::failure(format!("{e:#}")));
                }
                Err(SendError::Unavailable(e)) => {
                    tracing::debug!("FCM send failed: {e:?}");
                    responses.push(SendResponse::failure(format!("{e:#}")));
                    unavailable.get_or_insert(e);
                }
            }
        }

        match unavailable {
            Some(e) if !reached => Err(e.context(format!(
                "FCM unavailable for all {} tokens",
                message.tokens.len()
            ))),
            _ => Ok(BatchResponse { responses }),
        }
    }
}

async fn deserialize_response<T>(response: Response) -> anyhow::Result<T>
where
    T: DeserializeOwned,
{
    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.context("FCM API request failed")?;
        match serde_json::from_str::<ErrorResponse>(&body) {
            Ok(ErrorResponse { error }) => Err(anyhow::anyhow!(
                "{} {}: {}",
                error.code,
                error.status,
                error.message
            )),
            Err(_) => Err(anyhow::anyhow!("{status}: {body}")),
        }
    } else {
        Ok(response.json::<T>().await.with_context(|| {
            anyhow::anyhow!(
                "Failed to deserialize value of type {}",
                std::any::type_name::<T>()
            )
        })?)
    }
}
