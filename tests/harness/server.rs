use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use wsgate::http::status_for;
use wsgate::{Config, Event, Handlers, HttpRequest, Registry, Upgrader};

/// Accept loop that upgrades every inbound connection.
pub struct TestServer {
    upgrader: Upgrader,
    task: JoinHandle<()>,
}

impl TestServer {
    /// Echo server with default configuration.
    pub async fn spawn() -> (Self, SocketAddr) {
        let handlers = Handlers::new()
            .on_text(|conn, text| async move {
                let _ = conn.send_text(&text).await;
            })
            .on_binary(|conn, data| async move {
                let _ = conn.send_binary(data).await;
            });
        Self::spawn_with(Config::default(), handlers).await
    }

    pub async fn spawn_with(config: Config, handlers: Handlers) -> (Self, SocketAddr) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let upgrader = Upgrader::new(config);

        let accept = upgrader.clone();
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let upgrader = accept.clone();
                let handlers = handlers.clone();
                tokio::spawn(async move {
                    let limits = upgrader.config().limits.clone();
                    let Ok(mut request) = HttpRequest::read(stream, &limits).await else {
                        return;
                    };
                    if let Err(error) = upgrader.upgrade(&mut request, handlers).await {
                        let (status, reason) = status_for(&error);
                        let _ = request.reject(status, reason).await;
                    }
                });
            }
        });

        (Self { upgrader, task }, addr)
    }

    pub fn registry(&self) -> &Arc<Registry> {
        self.upgrader.registry()
    }

    pub async fn shutdown(self) {
        self.task.abort();
        let _ = self.task.await;
    }
}

/// Handlers that forward every event, tagged with the connection id.
pub fn recording_handlers() -> (Handlers, mpsc::UnboundedReceiver<(u64, Event)>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let text_tx = tx.clone();
    let binary_tx = tx.clone();
    let handlers = Handlers::new()
        .on_text(move |conn, text| {
            let _ = text_tx.send((conn.id(), Event::Text(text)));
            async {}
        })
        .on_binary(move |conn, data| {
            let _ = binary_tx.send((conn.id(), Event::Binary(data)));
            async {}
        })
        .on_closed(move |conn| {
            let _ = tx.send((conn.id(), Event::Closed));
            async {}
        });
    (handlers, rx)
}
