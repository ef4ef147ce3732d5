use chrono::{DateTime, Utc};
use clap::Parser;
use prayer_reminders::config::Config;
use prayer_reminders::db::reminders::PostgresStore;
use prayer_reminders::dispatch::Dispatcher;
use prayer_reminders::fcm::LogOnly;
use prayer_reminders::handlers::Context;
use prayer_reminders::job::ReminderJob;
use prayer_reminders::logger;

/// Runs a single evaluation of the configured reminders, as one trigger of
/// the server would.
#[derive(Parser, Debug)]
struct Opt {
    /// Log the notifications instead of sending them.
    #[arg(long)]
    dry_run: bool,

    /// Evaluate reminders at this instant (RFC 3339) instead of now.
    #[arg(long)]
    at: Option<DateTime<Utc>>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    logger::init();

    let opt = Opt::parse();
    let config = Config::new_from_env()?;
    let now = opt.at.unwrap_or_else(Utc::now);

    let report = if opt.dry_run {
        let store = PostgresStore::connect(&config.database_url).await?;
        let dispatcher = Dispatcher::new(LogOnly, config.batch_size);
        ReminderJob::new(store, dispatcher, config.categories.clone())
            .run(now)
            .await?
    } else {
        let ctx = Context::new(config)?;
        let job = ctx.job().await?;
        job.run(now).await?
    };

    print!("{}", report.success_line());
    Ok(())
}
