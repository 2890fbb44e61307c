use std::sync::Arc;

use ridepool::config::AppConfig;
use ridepool::db::init_pool;
use ridepool::error::AppError;
use ridepool::routes::create_router;
use ridepool::services::{matching::StubMatchFinder, store::TripStore};
use ridepool::state::AppState;
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_logging();

    let config = AppConfig::from_env()?;
    let db = init_pool(&config.database_url).await?;

    if let Err(err) = sqlx::migrate!("./migrations").run(&db).await {
        error!("migration failed: {err:?}");
        return Err(AppError::Other(err.into()));
    }

    let store = TripStore::new(config.data_root.clone());
    store.ensure_structure().await?;
    if config.seed_demo_trips {
        store.seed_demo_trips().await?;
    }

    let state = AppState::new(config.clone(), db, store, Arc::new(StubMatchFinder));

    let app = create_router(state);

    let listener = TcpListener::bind(config.listen_addr).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);
    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,ridepool=debug".into());

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
