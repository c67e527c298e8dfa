use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use common::cache::{RedisConfig, RedisPool};
use common::database::{DatabaseConfig, health_check, init_pool};
use storefront::{
    AppState,
    config::ServiceConfig,
    identity::{JwtAuthenticator, JwtConfig},
    repositories::{CachedCatalog, CatalogReader, PgCatalog, PgUserRepository},
    routes,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServiceConfig::from_env()?;

    // Initialize logging; RUST_LOG wins over the configured filter
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting storefront service");

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    if health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database migrations applied");

    let jwt_config = JwtConfig::from_env()?;
    let authenticator = Arc::new(JwtAuthenticator::new(&jwt_config)?);

    let pg_catalog: Arc<dyn CatalogReader> = Arc::new(PgCatalog::new(pool.clone()));
    let catalog: Arc<dyn CatalogReader> = match RedisConfig::from_env() {
        Some(redis_config) => {
            let redis = RedisPool::new(&redis_config)?;
            if !redis.health_check().await.unwrap_or(false) {
                warn!("Redis is not answering yet, catalog reads will fall through");
            }
            Arc::new(CachedCatalog::new(
                pg_catalog,
                redis,
                config.catalog_cache_ttl_secs,
            ))
        }
        None => {
            info!("REDIS_URL not set, catalog cache disabled");
            pg_catalog
        }
    };

    let users = Arc::new(PgUserRepository::new(pool));
    let app_state = AppState::new(users, catalog, authenticator, config.policy());

    let app = routes::create_router(app_state);

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!("Storefront service listening on {}", address);

    axum::serve(listener, app).await?;

    Ok(())
}
