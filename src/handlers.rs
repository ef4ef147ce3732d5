use crate::config::Config;
use crate::db::reminders::PostgresStore;
use crate::dispatch::Dispatcher;
use crate::errors::InvocationError;
use crate::fcm::FcmClient;
use crate::fcm::auth::{Credentials, TokenSource};
use crate::job::{JobReport, ReminderJob};
use anyhow::Context as _;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use std::sync::Arc;

pub struct Context {
    pub config: Config,
    pub http: reqwest::Client,
    /// Shared across invocations so the access token is cached between them.
    pub fcm_tokens: Arc<TokenSource>,
}

impl Context {
    /// Loads the FCM credentials once for the lifetime of the process.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let credentials = Credentials::load(&config.fcm()?.credentials)?;
        Ok(Context {
            config,
            http: reqwest::Client::new(),
            fcm_tokens: Arc::new(TokenSource::new(credentials)),
        })
    }

    /// Opens the store connection and notification client for one
    /// invocation. Both are released when the job is dropped.
    pub async fn job(&self) -> Result<ReminderJob<PostgresStore, FcmClient>, InvocationError> {
        let provider = self
            .config
            .fcm()
            .and_then(|fcm| {
                FcmClient::with_token_source(self.http.clone(), fcm, self.fcm_tokens.clone())
            })
            .map_err(InvocationError::Config)?;
        let store = PostgresStore::connect(&self.config.database_url)
            .await
            .context("connecting to the reminder store")
            .map_err(InvocationError::Config)?;
        Ok(ReminderJob::new(
            store,
            Dispatcher::new(provider, self.config.batch_size),
            self.config.categories.clone(),
        ))
    }
}

/// Runs one evaluation of every configured reminder category.
pub async fn notify_prayer_reminders(
    State(ctx): State<Arc<Context>>,
) -> Result<Response, InvocationError> {
    let job = ctx.job().await?;
    let report = job.run(Utc::now()).await?;
    Ok(report_response(&report))
}

fn report_response(report: &JobReport) -> Response {
    (
        [
            ("x-reminders-due", report.due.to_string()),
            ("x-batches-failed", report.dispatch.batches_failed.to_string()),
        ],
        report.success_line(),
    )
        .into_response()
}
