//! Orders HTTP server entry point.
//!
//! # Responsibility
//! - Load configuration, start logging and open the store before serving.
//! - Shut down gracefully on Ctrl-C and release the store.

use log::{error, info};
use orders_api::{router, AppState};
use orders_core::{init_logging, open_store, Config};
use std::net::{Ipv4Addr, SocketAddr};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("orders-server: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let config = Config::from_env().map_err(|err| err.to_string())?;
    init_logging(&config.log_level, config.log_dir.as_deref())?;

    let store = open_store(&config).map_err(|err| format!("store unavailable: {err}"))?;
    let backend = store.backend();
    let app = router(AppState::new(store.clone(), config.request_timeout));

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.server_port));
    let listener = TcpListener::bind(addr).await.map_err(|err| {
        error!(
            "event=server_start module=cli status=error addr={} error={}",
            addr, err
        );
        format!("failed to bind {addr}: {err}")
    })?;
    info!(
        "event=server_start module=cli status=ok addr={} backend={} version={}",
        addr,
        backend,
        orders_core::core_version()
    );

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;
    match &served {
        Ok(()) => info!("event=server_stop module=cli status=ok"),
        Err(err) => error!("event=server_stop module=cli status=error error={}", err),
    }

    drop(store);
    info!("event=store_close module=cli status=ok backend={}", backend);

    served.map_err(|err| format!("server failed: {err}"))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(
            "event=shutdown_signal module=cli status=error error={}",
            err
        );
        // Without a signal handler the server runs until killed.
        std::future::pending::<()>().await;
    }
    info!("event=shutdown_signal module=cli status=ok");
}
