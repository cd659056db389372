use actix_web::{web, App, HttpServer};
use redis::aio::ConnectionManager;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bookworm::{
    config::Config,
    db,
    routes::configure_routes,
    services::{image_fetch::ImageFetcher, oauth::OAuthService, sessions::SessionStore},
    AppState,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().expect("Failed to load configuration");

    tracing::info!("Starting bookworm v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Environment: {}", config.app.env);

    let db_pool = db::create_pool(&config.database.url, config.database.max_connections)
        .await
        .expect("Failed to create database pool");
    tracing::info!(
        "Database pool created with {} max connections",
        config.database.max_connections
    );

    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    let redis_client =
        redis::Client::open(config.redis.url.clone()).expect("Invalid Redis URL");
    let redis_conn = ConnectionManager::new(redis_client)
        .await
        .expect("Failed to connect to Redis");
    tracing::info!("Redis connection initialized");

    let templates = tera::Tera::new(&config.app.templates_glob).expect("Failed to load templates");

    let state = AppState {
        db: db_pool.clone(),
        sessions: SessionStore::new(redis_conn.clone(), config.session.ttl_secs),
        templates,
        fetcher: ImageFetcher::new(config.media.root.clone()),
        oauth: OAuthService::new(config.oauth.clone(), db_pool, redis_conn),
        config: config.clone(),
    };

    let bind_addr = (config.app.host.clone(), config.app.port);
    tracing::info!("Listening on {}:{}", config.app.host, config.app.port);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(tracing_actix_web::TracingLogger::default())
            .configure(configure_routes)
    })
    .bind(bind_addr)?
    .run()
    .await
}
