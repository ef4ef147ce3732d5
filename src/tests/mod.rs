use crate::db::reminders::PostgresStore;
use crate::db::{make_client, run_migrations};
use std::future::Future;
use tokio_postgres::config::Host;
use tokio_postgres::{Client as DbClient, Config};

/// Represents a throw-away Postgres database that can be used in tests of
/// logic that reads the reminder store.
pub struct TestContext {
    client: DbClient,
    db_url: String,
    db_name: String,
    original_db_url: String,
}

impl TestContext {
    async fn new(db_url: &str) -> Self {
        let config: Config = db_url.parse().expect("Cannot parse connection string");

        // Create a new database that will be used for this specific test
        let client = make_client(db_url)
            .await
            .expect("Cannot connect to database");
        let db_name = format!("db{}", uuid::Uuid::new_v4().to_string().replace("-", ""));
        client
            .execute(&format!("CREATE DATABASE {db_name}"), &[])
            .await
            .expect("Cannot create database");
        drop(client);

        // Postgres doesn't allow changing the active database mid-connection,
        // so connect again with the new database name.
        let test_db_url = format!(
            "postgresql://{}:{}@{}/{}",
            config.get_user().unwrap(),
            String::from_utf8(config.get_password().unwrap_or_default().to_vec()).unwrap(),
            match &config.get_hosts()[0] {
                Host::Tcp(host) => host,
                Host::Unix(_) =>
                    panic!("Unix sockets in Postgres connection string are not supported"),
            },
            db_name
        );
        let client = make_client(&test_db_url)
            .await
            .expect("Cannot connect to test database");
        run_migrations(&client)
            .await
            .expect("Cannot run database migrations");
        Self {
            client,
            db_url: test_db_url,
            db_name,
            original_db_url: db_url.to_string(),
        }
    }

    /// A store on its own connection, as the job would open it.
    pub async fn store(&self) -> PostgresStore {
        PostgresStore::connect(&self.db_url)
            .await
            .expect("Cannot connect to test database")
    }

    pub async fn add_reminder(&self, body: &str, time: &str, days: &str) -> String {
        self.client
            .query_one(
                "INSERT INTO reminders (value, time, days) VALUES ($1, $2::text::timetz, $3)
                    RETURNING id::text",
                &[&body, &time, &days],
            )
            .await
            .expect("Cannot create reminder")
            .get(0)
    }

    pub async fn add_corporate_prayer(
        &self,
        title: &str,
        reminder_id: &str,
        started_at: Option<&str>,
        ended_at: Option<&str>,
    ) -> String {
        self.client
            .query_one(
                "INSERT INTO corporate_prayers (title, reminder_id, started_at, ended_at)
                    VALUES ($1, $2::text::uuid, $3::text::timestamptz, $4::text::timestamptz)
                    RETURNING id::text",
                &[&title, &reminder_id, &started_at, &ended_at],
            )
            .await
            .expect("Cannot create corporate prayer")
            .get(0)
    }

    pub async fn add_corporate_setting(
        &self,
        user_id: &str,
        corporate_id: &str,
        on_reminder: Option<bool>,
    ) {
        self.client
            .execute(
                "INSERT INTO notification_corporate_settings (user_id, corporate_id, on_reminder)
                    VALUES ($1, $2::text::uuid, $3)",
                &[&user_id, &corporate_id, &on_reminder],
            )
            .await
            .expect("Cannot create notification setting");
    }

    pub async fn add_prayer(&self, user_id: &str, corporate_id: &str) {
        self.client
            .execute(
                "INSERT INTO prayers (user_id, corporate_id) VALUES ($1, $2::text::uuid)",
                &[&user_id, &corporate_id],
            )
            .await
            .expect("Cannot create prayer");
    }

    pub async fn add_group(&self, name: &str, reminder_id: &str) -> String {
        self.client
            .query_one(
                "INSERT INTO groups (name, reminder_id) VALUES ($1, $2::text::uuid) RETURNING id::text",
                &[&name, &reminder_id],
            )
            .await
            .expect("Cannot create group")
            .get(0)
    }

    pub async fn add_group_member(&self, group_id: &str, user_id: &str) {
        self.client
            .execute(
                "INSERT INTO group_members (group_id, user_id) VALUES ($1::text::uuid, $2)",
                &[&group_id, &user_id],
            )
            .await
            .expect("Cannot add group member");
    }

    pub async fn add_token(&self, user_id: &str, token: &str) {
        self.client
            .execute(
                "INSERT INTO user_fcm_tokens (user_id, value) VALUES ($1, $2)",
                &[&user_id, &token],
            )
            .await
            .expect("Cannot register device token");
    }

    async fn finish(self) {
        // Cleanup the test database
        // First, we need to stop using the database
        drop(self.client);

        // Then we need to connect to the default database and drop our test DB
        let client = make_client(&self.original_db_url)
            .await
            .expect("Cannot connect to database");
        client
            .execute(&format!("DROP DATABASE {} WITH (FORCE)", self.db_name), &[])
            .await
            .unwrap();
    }
}

pub async fn run_test<F, Fut>(f: F)
where
    F: FnOnce(TestContext) -> Fut,
    Fut: Future<Output = anyhow::Result<TestContext>>,
{
    if let Ok(db_url) = std::env::var("TEST_DB_URL") {
        let ctx = TestContext::new(&db_url).await;
        let ctx = f(ctx).await.expect("Test failed");
        ctx.finish().await;
    } else {
        eprintln!("Skipping test because TEST_DB_URL was not passed");
    }
}
