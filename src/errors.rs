//! Errors that end an invocation.

use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// A failure that aborts the whole invocation.
///
/// Nothing is persisted by an invocation, so aborting needs no cleanup.
/// Failures of individual notification batches never end up here; the
/// dispatcher logs them and carries on.
#[derive(Debug)]
pub enum InvocationError {
    /// The store connection or notification client could not be set up.
    Config(anyhow::Error),
    /// Reading reminder bindings failed.
    Store(anyhow::Error),
}

impl std::error::Error for InvocationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            InvocationError::Config(e) | InvocationError::Store(e) => Some(&**e),
        }
    }
}

impl fmt::Display for InvocationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            InvocationError::Config(e) => write!(f, "failed to set up clients: {e}"),
            InvocationError::Store(e) => write!(f, "failed to read reminders: {e}"),
        }
    }
}

impl IntoResponse for InvocationError {
    fn into_response(self) -> Response {
        tracing::error!("{self}: {:?}", self.source_chain());
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Something went wrong: {self}\n"),
        )
            .into_response()
    }
}

impl InvocationError {
    fn source_chain(&self) -> &anyhow::Error {
        match self {
            InvocationError::Config(e) | InvocationError::Store(e) => e,
        }
    }
}
