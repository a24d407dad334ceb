//! Test harness: a real TCP server running the upgrader and a minimal
//! masking client.

#![allow(dead_code, unused_imports)]

mod client;
mod server;

pub use client::{KEY, TestClient, raw_exchange, read_response_head, upgrade_request};
pub use server::{TestServer, recording_handlers};

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    check()
}
