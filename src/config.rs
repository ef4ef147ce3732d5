//! Process configuration, read once from the environment at startup.

use crate::batch::MAX_BATCH_SIZE;
use crate::reminder::Category;
use anyhow::Context as _;
use secrecy::SecretString;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::str::FromStr;

const DEFAULT_FCM_API_URL: &str = "https://fcm.googleapis.com";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_MAX_CONCURRENT_SENDS: NonZeroUsize = NonZeroUsize::new(16).unwrap();

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// Reminder categories evaluated on every invocation, in order.
    pub categories: Vec<Category>,
    pub batch_size: NonZeroUsize,
    /// `None` when no FCM variable is set at all; only delivery needs it.
    pub fcm: Option<FcmConfig>,
}

#[derive(Debug, Clone)]
pub struct FcmConfig {
    pub project_id: String,
    pub api_url: String,
    pub credentials: FcmCredentials,
    pub max_concurrent_sends: NonZeroUsize,
}

#[derive(Debug, Clone)]
pub enum FcmCredentials {
    /// Path to a Google service account key file.
    ServiceAccountFile(PathBuf),
    AccessToken(SecretString),
}

impl Config {
    pub fn new_from_env() -> anyhow::Result<Config> {
        Config::from_lookup(|name| std::env::var(name).ok().filter(|v| !v.is_empty()))
    }

    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Config> {
        let required = |name: &str| var(name).with_context(|| format!("{name} is missing"));

        let batch_size = parse_or(&var, "FCM_BATCH_SIZE", MAX_BATCH_SIZE)?;
        anyhow::ensure!(
            batch_size <= MAX_BATCH_SIZE,
            "FCM_BATCH_SIZE must be at most {MAX_BATCH_SIZE}, got {batch_size}"
        );

        let categories = match var("REMINDER_CATEGORIES") {
            Some(list) => parse_categories(&list)?,
            None => vec![Category::Corporate, Category::Group],
        };

        let fcm = if FCM_VARS.iter().any(|name| var(name).is_some()) {
            Some(FcmConfig::from_lookup(&var)?)
        } else {
            None
        };

        Ok(Config {
            database_url: required("DATABASE_URL")?,
            port: parse_or(&var, "PORT", DEFAULT_PORT)?,
            categories,
            batch_size,
            fcm,
        })
    }

    /// FCM settings, required for anything that actually sends.
    pub fn fcm(&self) -> anyhow::Result<&FcmConfig> {
        self.fcm.as_ref().with_context(|| {
            format!("FCM is not configured: set {}", FCM_VARS.join(", "))
        })
    }
}

/// Variables that switch FCM configuration on.
const FCM_VARS: &[&str] = &[
    "FIREBASE_PROJECT_ID",
    "GOOGLE_APPLICATION_CREDENTIALS",
    "FCM_ACCESS_TOKEN",
];

impl FcmConfig {
    fn from_lookup(var: &impl Fn(&str) -> Option<String>) -> anyhow::Result<FcmConfig> {
        let credentials = match var("FCM_ACCESS_TOKEN") {
            Some(token) => FcmCredentials::AccessToken(token.into()),
            None => FcmCredentials::ServiceAccountFile(
                var("GOOGLE_APPLICATION_CREDENTIALS")
                    .context("either GOOGLE_APPLICATION_CREDENTIALS or FCM_ACCESS_TOKEN must be set")?
                    .into(),
            ),
        };

        Ok(FcmConfig {
            project_id: var("FIREBASE_PROJECT_ID").context("FIREBASE_PROJECT_ID is missing")?,
            api_url: var("FCM_API_URL").unwrap_or_else(|| DEFAULT_FCM_API_URL.to_string()),
            credentials,
            max_concurrent_sends: parse_or(
                var,
                "FCM_MAX_CONCURRENT_SENDS",
                DEFAULT_MAX_CONCURRENT_SENDS,
            )?,
        })
    }
}

fn parse_or<T>(var: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(name) {
        Some(value) => value
            .trim()
            .parse()
            .with_context(|| format!("invalid {name} `{value}`")),
        None => Ok(default),
    }
}

fn parse_categories(list: &str) -> anyhow::Result<Vec<Category>> {
    let mut categories = Vec::new();
    for name in list.split(',').filter(|name| !name.trim().is_empty()) {
        let category: Category = name.parse().context("invalid REMINDER_CATEGORIES")?;
        if !categories.contains(&category) {
            categories.push(category);
        }
    }
    anyhow::ensure!(!categories.is_empty(), "REMINDER_CATEGORIES must name at least one category");
    Ok(categories)
}
