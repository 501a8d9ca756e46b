use axum::Router;
use log::info;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Serves the HTTP API until `shutdown` is cancelled
pub async fn run_http_server(addr: String, router: Router, shutdown: CancellationToken) -> std::io::Result<()> {
    let listener = TcpListener::bind(&addr).await?;
    info!("HTTP server running on {}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    info!("HTTP server on {} stopped", addr);
    Ok(())
}
