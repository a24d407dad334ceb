//! Broadcast chat server on a plain TCP listener.
//!
//! Run with: `cargo run --example chat_server`, then connect any WebSocket
//! client that sends an `Origin` header to `ws://127.0.0.1:9001/`.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use wsgate::http::status_for;
use wsgate::{Config, Handlers, HttpRequest, Keepalive, Registry, Upgrader};

fn chat_handlers(registry: Arc<Registry>) -> Handlers {
    let relay = Arc::clone(&registry);
    Handlers::new()
        .on_text(move |conn, text| {
            let registry = Arc::clone(&relay);
            async move {
                let line = format!("[{}] {}", conn.id(), text);
                let delivered = registry.broadcast_text(&line);
                tracing::debug!(conn_id = conn.id(), delivered, "relayed");
            }
        })
        .on_closed(move |conn| {
            let registry = Arc::clone(&registry);
            async move {
                let line = format!("* {} left", conn.id());
                registry.broadcast_text(&line);
            }
        })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,wsgate=debug")),
        )
        .init();

    let config = Config::default()
        .with_max_connections(256)
        .with_keepalive(Keepalive::new(Duration::from_secs(20), Duration::from_secs(10)));
    let upgrader = Upgrader::new(config);
    let handlers = chat_handlers(Arc::clone(upgrader.registry()));

    let listener = TcpListener::bind("127.0.0.1:9001").await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");

    loop {
        let (stream, peer) = listener.accept().await?;
        let upgrader = upgrader.clone();
        let handlers = handlers.clone();

        tokio::spawn(async move {
            let mut request = match HttpRequest::read(stream, &upgrader.config().limits).await {
                Ok(request) => request,
                Err(error) => {
                    tracing::debug!(%peer, %error, "bad request head");
                    return;
                }
            };

            match upgrader.upgrade(&mut request, handlers).await {
                Ok(conn) => {
                    tracing::info!(conn_id = conn.id(), %peer, "joined");
                    let _ = conn.send_text("welcome").await;
                }
                Err(error) => {
                    tracing::info!(%peer, %error, "upgrade refused");
                    let (status, reason) = status_for(&error);
                    let _ = request.reject(status, reason).await;
                }
            }
        });
    }
}
