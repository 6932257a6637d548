//! Todo API server
//!
//! ```text
//! cargo run --example todo_server [config.yaml]
//! ```
//!
//! Without a config file the server listens on 127.0.0.1:3000 with the
//! in-memory store and a single development token, `dev-token`, for user
//! `dev`. `CTRLKIT_*` variables override the file.

use ctrlkit::prelude::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let mut config = match std::env::args().nth(1) {
        Some(path) => AppConfig::from_yaml_file(&path)?,
        None => AppConfig::default(),
    }
    .with_env_overrides();

    if config.auth.tokens.is_empty() {
        tracing::warn!("no auth tokens configured, accepting 'dev-token' for user 'dev'");
        config
            .auth
            .tokens
            .insert("dev-token".to_string(), "dev".to_string());
    }

    let store = open_store(&config.database)?;
    tracing::info!(
        backend = store.backend(),
        base_path = %config.api.base_path,
        "starting todo server"
    );

    let app = build_todo_app(&config, store)?;
    serve_router(app, &config.server.addr).await
}
