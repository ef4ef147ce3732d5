//! Reading reminder bindings and their recipients' device tokens.
//!
//! Every query returns one row per (reminder, subject, user) with that
//! user's tokens aggregated. Whether a row is due is decided by the caller.

use crate::reminder::{Binding, CampaignWindow, Category, Reminder, Subject, Weekdays};
use anyhow::Context as _;
use chrono::{NaiveDate, NaiveTime};
use tokio_postgres::Client as DbClient;
use tokio_postgres::row::Row;

/// Source of reminder bindings.
#[async_trait::async_trait]
pub trait ReminderStore: Send + Sync {
    async fn bindings(&self, category: Category) -> anyhow::Result<Vec<Binding>>;
}

/// Reminder store backed by one Postgres connection.
pub struct PostgresStore {
    client: DbClient,
}

impl PostgresStore {
    pub fn new(client: DbClient) -> Self {
        PostgresStore { client }
    }

    pub async fn connect(db_url: &str) -> anyhow::Result<Self> {
        Ok(PostgresStore::new(super::make_client(db_url).await?))
    }
}

#[async_trait::async_trait]
impl ReminderStore for PostgresStore {
    async fn bindings(&self, category: Category) -> anyhow::Result<Vec<Binding>> {
        get_bindings(&self.client, category).await
    }
}

const CORPORATE_QUERY: &str = "
SELECT reminders.id::text AS reminder_id,
    reminders.value AS body,
    reminders.time::time AS local_time,
    EXTRACT(TIMEZONE_HOUR FROM reminders.time)::int AS offset_hours,
    EXTRACT(TIMEZONE_MINUTE FROM reminders.time)::int AS offset_minutes,
    reminders.days::text AS days,
    corporate_prayers.id::text AS subject_id,
    corporate_prayers.title AS title,
    (corporate_prayers.started_at AT TIME ZONE 'UTC')::date AS start_date,
    (corporate_prayers.ended_at AT TIME ZONE 'UTC')::date AS end_date,
    COALESCE(notification_corporate_settings.on_reminder, FALSE) AS opted_in,
    ARRAY_AGG(DISTINCT user_fcm_tokens.value ORDER BY user_fcm_tokens.value) AS tokens
FROM notification_corporate_settings
INNER JOIN corporate_prayers ON corporate_prayers.id = notification_corporate_settings.corporate_id
INNER JOIN reminders ON reminders.id = corporate_prayers.reminder_id
INNER JOIN user_fcm_tokens ON user_fcm_tokens.user_id = notification_corporate_settings.user_id
GROUP BY reminders.id, corporate_prayers.id,
    notification_corporate_settings.user_id, notification_corporate_settings.on_reminder
ORDER BY reminders.id, corporate_prayers.id, notification_corporate_settings.user_id";

const GROUP_QUERY: &str = "
SELECT reminders.id::text AS reminder_id,
    reminders.value AS body,
    reminders.time::time AS local_time,
    EXTRACT(TIMEZONE_HOUR FROM reminders.time)::int AS offset_hours,
    EXTRACT(TIMEZONE_MINUTE FROM reminders.time)::int AS offset_minutes,
    reminders.days::text AS days,
    groups.id::text AS subject_id,
    groups.name AS title,
    NULL::date AS start_date,
    NULL::date AS end_date,
    TRUE AS opted_in,
    ARRAY_AGG(DISTINCT user_fcm_tokens.value ORDER BY user_fcm_tokens.value) AS tokens
FROM groups
INNER JOIN reminders ON reminders.id = groups.reminder_id
INNER JOIN group_members ON group_members.group_id = groups.id
INNER JOIN user_fcm_tokens ON user_fcm_tokens.user_id = group_members.user_id
GROUP BY reminders.id, groups.id, group_members.user_id
ORDER BY reminders.id, groups.id, group_members.user_id";

const PERSONAL_QUERY: &str = "
SELECT reminders.id::text AS reminder_id,
    reminders.value AS body,
    reminders.time::time AS local_time,
    EXTRACT(TIMEZONE_HOUR FROM reminders.time)::int AS offset_hours,
    EXTRACT(TIMEZONE_MINUTE FROM reminders.time)::int AS offset_minutes,
    reminders.days::text AS days,
    corporate_prayers.id::text AS subject_id,
    corporate_prayers.title AS title,
    (corporate_prayers.started_at AT TIME ZONE 'UTC')::date AS start_date,
    (corporate_prayers.ended_at AT TIME ZONE 'UTC')::date AS end_date,
    TRUE AS opted_in,
    ARRAY_AGG(DISTINCT user_fcm_tokens.value ORDER BY user_fcm_tokens.value) AS tokens
FROM prayers
INNER JOIN corporate_prayers ON corporate_prayers.id = prayers.corporate_id
INNER JOIN reminders ON reminders.id = corporate_prayers.reminder_id
INNER JOIN user_fcm_tokens ON user_fcm_tokens.user_id = prayers.user_id
GROUP BY reminders.id, corporate_prayers.id, prayers.user_id
ORDER BY reminders.id, corporate_prayers.id, prayers.user_id";

/// Loads every binding of `category`, due or not.
pub async fn get_bindings(db: &DbClient, category: Category) -> anyhow::Result<Vec<Binding>> {
    tracing::trace!("get_bindings(category={category})");

    let query = match category {
        Category::Corporate => CORPORATE_QUERY,
        Category::Group => GROUP_QUERY,
        Category::Personal => PERSONAL_QUERY,
    };
    let rows = db
        .query(query, &[])
        .await
        .with_context(|| format!("Getting {category} reminder bindings"))?;

    rows.iter()
        .map(|row| binding_from_row(category, row))
        .collect()
}

fn binding_from_row(category: Category, row: &Row) -> anyhow::Result<Binding> {
    let reminder_id: String = row.try_get("reminder_id")?;
    let offset_hours: i32 = row.try_get("offset_hours")?;
    let offset_minutes: i32 = row.try_get("offset_minutes")?;
    let offset = Reminder::offset_from_parts(offset_hours, offset_minutes).with_context(|| {
        format!("reminder {reminder_id} has an invalid UTC offset ({offset_hours}h {offset_minutes}m)")
    })?;
    let days = Weekdays::parse(row.try_get("days")?);
    if days.is_empty() {
        tracing::warn!("reminder {reminder_id} has no active weekday");
    }
    let local_time: NaiveTime = row.try_get("local_time")?;
    let start: Option<NaiveDate> = row.try_get("start_date")?;
    let end: Option<NaiveDate> = row.try_get("end_date")?;

    Ok(Binding {
        category,
        reminder: Reminder {
            id: reminder_id,
            body: row.try_get("body")?,
            local_time,
            offset,
            days,
        },
        subject: Subject {
            id: row.try_get("subject_id")?,
            title: row.try_get("title")?,
        },
        window: CampaignWindow { start, end },
        opted_in: row.try_get("opted_in")?,
        tokens: row.try_get("tokens")?,
    })
}
