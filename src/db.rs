use anyhow::Context as _;
use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;

pub mod reminders;

/// Opens a single connection to the reminder store.
///
/// TLS is used when the URL asks for it with `sslmode=require`. The
/// connection task ends once the returned client is dropped.
pub async fn make_client(db_url: &str) -> anyhow::Result<tokio_postgres::Client> {
    if db_url.contains("sslmode=require") {
        let connector = TlsConnector::builder()
            .build()
            .context("built TlsConnector")?;
        let connector = MakeTlsConnector::new(connector);

        let (db_client, connection) = match tokio_postgres::connect(db_url, connector).await {
            Ok(v) => v,
            Err(e) => {
                anyhow::bail!("failed to connect to DB: {}", e);
            }
        };
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("database connection error: {}", e);
            }
        });

        Ok(db_client)
    } else {
        tracing::debug!("non-TLS connection to the reminder store");
        let (db_client, connection) =
            match tokio_postgres::connect(db_url, tokio_postgres::NoTls).await {
                Ok(v) => v,
                Err(e) => {
                    anyhow::bail!("failed to connect to DB: {}", e);
                }
            };
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("database connection error: {}", e);
            }
        });

        Ok(db_client)
    }
}

/// Schema of the tables the reminder queries read.
///
/// The production schema is owned by the administration tooling; these
/// migrations recreate the part of it this service depends on.
static MIGRATIONS: &[&str] = &[
    "
CREATE TABLE reminders (
    id UUID DEFAULT gen_random_uuid() PRIMARY KEY,
    value TEXT NOT NULL,
    time TIME WITH TIME ZONE NOT NULL,
    days TEXT NOT NULL
);
",
    "
CREATE TABLE user_fcm_tokens (
    user_id TEXT NOT NULL,
    value TEXT NOT NULL,
    PRIMARY KEY (user_id, value)
);
",
    "
CREATE TABLE corporate_prayers (
    id UUID DEFAULT gen_random_uuid() PRIMARY KEY,
    title TEXT NOT NULL,
    reminder_id UUID REFERENCES reminders (id),
    started_at TIMESTAMP WITH TIME ZONE,
    ended_at TIMESTAMP WITH TIME ZONE
);
",
    "
CREATE TABLE notification_corporate_settings (
    user_id TEXT NOT NULL,
    corporate_id UUID NOT NULL REFERENCES corporate_prayers (id),
    on_reminder BOOLEAN,
    PRIMARY KEY (user_id, corporate_id)
);
",
    "
CREATE TABLE prayers (
    id UUID DEFAULT gen_random_uuid() PRIMARY KEY,
    user_id TEXT NOT NULL,
    corporate_id UUID NOT NULL REFERENCES corporate_prayers (id)
);
",
    "
CREATE TABLE groups (
    id UUID DEFAULT gen_random_uuid() PRIMARY KEY,
    name TEXT NOT NULL,
    reminder_id UUID REFERENCES reminders (id)
);
",
    "
CREATE TABLE group_members (
    group_id UUID NOT NULL REFERENCES groups (id),
    user_id TEXT NOT NULL,
    PRIMARY KEY (group_id, user_id)
);
",
];

pub async fn run_migrations(client: &tokio_postgres::Client) -> anyhow::Result<()> {
    client
        .execute(
            "CREATE TABLE IF NOT EXISTS database_versions (
                zero INTEGER PRIMARY KEY,
                migration_counter INTEGER
            );",
            &[],
        )
        .await
        .context("creating database versioning table")?;

    client
        .execute(
            "INSERT INTO database_versions (zero, migration_counter)
                VALUES (0, 0)
                ON CONFLICT DO NOTHING",
            &[],
        )
        .await
        .context("inserting initial database_versions")?;

    let migration_idx: i32 = client
        .query_one("SELECT migration_counter FROM database_versions", &[])
        .await
        .context("getting migration counter")?
        .get(0);
    let migration_idx = migration_idx as usize;

    for (idx, migration) in MIGRATIONS.iter().enumerate().skip(migration_idx) {
        client
            .execute(*migration, &[])
            .await
            .with_context(|| format!("executing {idx}th migration"))?;
        client
            .execute(
                "UPDATE database_versions SET migration_counter = $1",
                &[&(idx as i32 + 1)],
            )
            .await
            .with_context(|| format!("updating migration counter to {idx}"))?;
    }

    Ok(())
}
