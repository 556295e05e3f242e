//! Demo server: accounts and notes on the API listener, user administration on the
//! admin listener.
//!
//! Run from the repo root: `APP_JWT_SECRET=dev cargo run -p example-consumer`.
//! Without `APP_DB_DSN` (or `DATABASE_URL`) everything lives in memory.

mod notes;

use axum::{middleware::from_fn_with_state, Router};
use ezkit::{
    accounts::USERS_DDL, authenticate, common_routes, require_auth, standard_layers, AccountsModule, AppConfig,
    Argon2Hasher, AuthGuard, Db, InMemoryStore, JwtKeys, PgStore, Registry, RouteGroup, SharedIssuer, SharedVerifier,
};
use notes::{NotesModule, NOTES_DDL};
use std::future::IntoFuture;
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .init();

    let db = open_store(&config).await?;

    let keys = Arc::new(JwtKeys::new(
        &config.jwt.secret,
        config.jwt.issuer.clone(),
        chrono::Duration::minutes(config.jwt.ttl_min),
    ));
    let verifier: SharedVerifier = keys.clone();
    let issuer: SharedIssuer = keys;

    let registry = Registry::new()
        .with(Arc::new(AccountsModule::new(issuer, Arc::new(Argon2Hasher))))
        .with(Arc::new(NotesModule));

    let api = registry
        .mount_api(RouteGroup::new(db.clone()))
        .into_router()
        .layer(from_fn_with_state(verifier.clone(), authenticate))
        .merge(common_routes(db.clone()));
    let api = standard_layers(api, &config.limits);

    let admin = Router::new()
        .nest(
            "/admin/v1",
            registry
                .mount_admin(RouteGroup::new(db.clone()))
                .into_router()
                .layer(from_fn_with_state(AuthGuard::new(verifier).with_role("admin"), require_auth)),
        )
        .merge(common_routes(db));
    let admin = standard_layers(admin, &config.limits);

    let api_listener = TcpListener::bind((config.http.host.as_str(), config.http.port)).await?;
    let admin_listener = TcpListener::bind((config.http.host.as_str(), config.http.admin_port)).await?;
    tracing::info!(addr = %api_listener.local_addr()?, "api listening");
    tracing::info!(addr = %admin_listener.local_addr()?, "admin listening");

    tokio::try_join!(
        axum::serve(api_listener, api).into_future(),
        axum::serve(admin_listener, admin).into_future()
    )?;
    Ok(())
}

async fn open_store(config: &AppConfig) -> Result<Db, Box<dyn std::error::Error>> {
    match &config.db.dsn {
        Some(dsn) => {
            let store = PgStore::connect(dsn, config.db.max_connections).await?;
            for ddl in [USERS_DDL, NOTES_DDL] {
                sqlx::query(ddl).execute(store.pool()).await?;
            }
            tracing::info!("using postgres store");
            let db: Db = Arc::new(store);
            Ok(db)
        }
        None => {
            tracing::warn!("no database configured, data is kept in memory");
            let db: Db = Arc::new(InMemoryStore::new().with_unique("users", ["email"]));
            Ok(db)
        }
    }
}
