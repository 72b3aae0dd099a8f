//! nest-keydir — the key directory service.
//!
//! Issuers publish public-key records here; verifiers fetch them by kid.
//! One process, one in-memory map. Records accumulate until their TTL makes
//! them stale; nothing is ever deleted.

use nest_directory::server::{router, KeyStore};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
    nest_config::init();

    let bind = nest_config::KEYDIR_BIND.as_str();
    let app = router(KeyStore::new());

    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(%bind, "key directory listening");
    axum::serve(listener, app).await?;
    Ok(())
}
