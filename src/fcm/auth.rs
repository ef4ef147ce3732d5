//! OAuth2 access tokens for the FCM API.

use crate::config::FcmCredentials;
use crate::fcm::api::{TokenClaims, TokenResponse};
use anyhow::Context as _;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use std::path::Path;
use tokio::sync::Mutex;

const FIREBASE_MESSAGING_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Tokens are refreshed this long before they expire.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// The fields of a Google service account key file we need.
#[derive(serde::Deserialize)]
struct ServiceAccountFile {
    client_email: String,
    private_key: String,
    #[serde(default)]
    token_uri: Option<String>,
}

#[derive(Clone)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub token_uri: String,
    private_key: SecretString,
}

impl ServiceAccountKey {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading service account key {}", path.display()))?;
        Self::from_json(&contents)
            .with_context(|| format!("parsing service account key {}", path.display()))
    }

    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let mut deserializer = serde_json::Deserializer::from_str(json);
        let file: ServiceAccountFile = serde_path_to_error::deserialize(&mut deserializer)
            .map_err(|e| anyhow::anyhow!("{} at {}", e.inner(), e.path()))?;
        // Fail early on a key that cannot sign anything.
        EncodingKey::from_rsa_pem(file.private_key.as_bytes())
            .context("service account private_key is not an RSA PEM key")?;
        Ok(ServiceAccountKey {
            client_email: file.client_email,
            token_uri: file.token_uri.unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
            private_key: file.private_key.into(),
        })
    }

    fn assertion(&self, now: DateTime<Utc>) -> anyhow::Result<String> {
        let claims = TokenClaims {
            iss: &self.client_email,
            scope: FIREBASE_MESSAGING_SCOPE,
            aud: &self.token_uri,
            iat: now.timestamp(),
            exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
        };
        let key = EncodingKey::from_rsa_pem(self.private_key.expose_secret().as_bytes())
            .context("loading service account private key")?;
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)
            .context("signing service account assertion")
    }
}

#[derive(Clone)]
pub enum Credentials {
    /// Exchange a signed service account assertion for short-lived tokens.
    ServiceAccount(ServiceAccountKey),
    /// Use a fixed bearer token.
    AccessToken(SecretString),
}

impl Credentials {
    /// Resolves configured credentials, reading the key file if there is one.
    pub fn load(config: &FcmCredentials) -> anyhow::Result<Credentials> {
        Ok(match config {
            FcmCredentials::ServiceAccountFile(path) => {
                Credentials::ServiceAccount(ServiceAccountKey::from_file(path)?)
            }
            FcmCredentials::AccessToken(token) => Credentials::AccessToken(token.clone()),
        })
    }
}

struct CachedToken {
    token: SecretString,
    expires_at: DateTime<Utc>,
}

/// Hands out access tokens, reusing a fetched token until it is about to
/// expire.
pub struct TokenSource {
    credentials: Credentials,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenSource {
    pub fn new(credentials: Credentials) -> Self {
        TokenSource {
            credentials,
            cached: Mutex::new(None),
        }
    }

    pub async fn access_token(&self, client: &Client) -> anyhow::Result<SecretString> {
        let key = match &self.credentials {
            Credentials::AccessToken(token) => return Ok(token.clone()),
            Credentials::ServiceAccount(key) => key,
        };

        let mut cached = self.cached.lock().await;
        let now = Utc::now();
        if let Some(token) = cached.as_ref() {
            if token.expires_at > now {
                return Ok(token.token.clone());
            }
        }

        tracing::debug!("requesting access token for {}", key.client_email);
        let assertion = key.assertion(now)?;
        let response = client
            .post(&key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .context("requesting access token")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("token endpoint returned {status}: {body}");
        }
        let response: TokenResponse = response
            .json()
            .await
            .context("decoding access token response")?;

        let token: SecretString = response.access_token.into();
        *cached = Some(CachedToken {
            token: token.clone(),
            expires_at: now + Duration::seconds(response.expires_in - EXPIRY_MARGIN_SECS),
        });
        Ok(token)
    }
}
