//! Wire types of the FCM HTTP v1 API and the Google OAuth2 token endpoint.

use std::collections::BTreeMap;

/// Body of `POST /v1/projects/{project}/messages:send`.
#[derive(serde::Serialize, Debug)]
pub(crate) struct SendRequest<'a> {
    pub(crate) message: Message<'a>,
}

#[derive(serde::Serialize, Debug)]
pub(crate) struct Message<'a> {
    pub(crate) token: &'a str,
    pub(crate) notification: Notification<'a>,
    pub(crate) data: &'a BTreeMap<&'a str, &'a str>,
}

#[derive(serde::Serialize, Debug)]
pub(crate) struct Notification<'a> {
    pub(crate) title: &'a str,
    pub(crate) body: &'a str,
}

/// Successful send, e.g. `{"name": "projects/p/messages/0:1500415314455276%31bd1c96f9fd7ecd"}`.
#[derive(serde::Deserialize, Debug)]
pub(crate) struct SendResponse {
    pub(crate) name: String,
}

/// Error envelope shared by Google APIs.
#[derive(serde::Deserialize, Debug)]
pub(crate) struct ErrorResponse {
    pub(crate) error: ErrorStatus,
}

#[derive(serde::Deserialize, Debug)]
pub(crate) struct ErrorStatus {
    #[serde(default)]
    pub(crate) code: u16,
    #[serde(default)]
    pub(crate) message: String,
    #[serde(default)]
    pub(crate) status: String,
}

/// Claims of the service-account assertion exchanged for an access token.
#[derive(serde::Serialize, Debug)]
pub(crate) struct TokenClaims<'a> {
    pub(crate) iss: &'a str,
    pub(crate) scope: &'a str,
    pub(crate) aud: &'a str,
    pub(crate) iat: i64,
    pub(crate) exp: i64,
}

#[derive(serde::Deserialize, Debug)]
pub(crate) struct TokenResponse {
    pub(crate) access_token: String,
    #[serde(default = "default_expires_in")]
    pub(crate) expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}
