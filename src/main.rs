use anyhow::Context as _;
use axum::Router;
use axum::routing::get;
use prayer_reminders::config::Config;
use prayer_reminders::{handlers, logger};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

async fn run_server(config: Config) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let ctx = Arc::new(handlers::Context::new(config).context("setting up FCM")?);

    let app = Router::new()
        .route(
            "/",
            get(handlers::notify_prayer_reminders).post(handlers::notify_prayer_reminders),
        )
        .with_state(ctx)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(CatchPanicLayer::new()),
        );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;
    tracing::info!("Listening on http://{addr}");
    axum::serve(listener, app).await.context("serving requests")?;
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    dotenvy::dotenv().ok();
    logger::init();

    let config = match Config::new_from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {e:?}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run_server(config).await {
        eprintln!("Failed to run server: {e:?}");
        std::process::exit(1);
    }
}
