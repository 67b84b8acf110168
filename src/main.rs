use std::{net::SocketAddr, sync::Arc};

use tokio::signal;
use tracing::{error, info};

use sppg_production as api;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    // Init DB
    let db_pool = api::db::establish_connection_from_app_config(&cfg).await?;
    let migrate_only = std::env::args().nth(1).as_deref() == Some("migrate");
    if cfg.auto_migrate || migrate_only {
        api::db::run_migrations(&db_pool).await.map_err(|e| {
            error!("Failed running migrations: {}", e);
            e
        })?;
    }
    if migrate_only {
        return Ok(());
    }

    let checker: api::auth::SharedPermissionChecker = Arc::new(
        api::auth::StaticPermissionChecker::from_config(&cfg.auth),
    );
    info!(
        users = cfg.auth.grants.len(),
        "Loaded permission grants"
    );

    let cors = api::cors_layer(&cfg).map_err(|e| {
        error!("{}", e);
        e
    })?;

    let state = api::AppState::new(Arc::new(db_pool), cfg.clone());
    let app = api::app(state, checker).layer(cors);

    // Bind and serve
    let ip: std::net::IpAddr = cfg.host.parse()?;
    let addr = SocketAddr::new(ip, cfg.port);
    info!("sppg-production listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
