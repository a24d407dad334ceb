//! Live connection registry and admission control.
//!
//! The registry owns the only long-lived handles to open connections. A
//! connection is present from the moment its upgrade completes until the
//! first step of its teardown. The admission counter is tracked separately
//! and is only released when the connection's [`AdmissionPermit`] drops, so
//! `open_connections()` can briefly exceed `len()` while a teardown or an
//! upgrade is in flight.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use bytes::Bytes;
use dashmap::DashMap;

use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::protocol::Frame;

#[derive(Debug)]
struct Admission {
    open: AtomicUsize,
    max: usize,
}

/// A reserved admission slot.
///
/// Dropping the permit gives the slot back. A permit that never reaches a
/// connection (failed hijack, failed response write) therefore cannot leak.
#[derive(Debug)]
#[must_use = "dropping the permit releases the slot immediately"]
pub struct AdmissionPermit {
    admission: Arc<Admission>,
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        self.admission.open.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Concurrent map of live connections keyed by connection id.
#[derive(Debug)]
pub struct Registry {
    connections: DashMap<u64, Arc<Connection>>,
    next_id: AtomicU64,
    admission: Arc<Admission>,
}

impl Registry {
    /// Registry admitting at most `max_connections` concurrent connections.
    #[must_use]
    pub fn new(max_connections: usize) -> Self {
        Self {
            connections: DashMap::new(),
            next_id: AtomicU64::new(0),
            admission: Arc::new(Admission {
                open: AtomicUsize::new(0),
                max: max_connections,
            }),
        }
    }

    /// Reserve one admission slot.
    ///
    /// The check and the increment are a single atomic step, so concurrent
    /// callers can never push the count past the maximum.
    pub fn try_admit(&self) -> Result<AdmissionPermit> {
        let admission = &self.admission;
        let mut current = admission.open.load(Ordering::Acquire);
        loop {
            if current >= admission.max {
                return Err(Error::AdmissionRejected { max: admission.max });
            }
            match admission.open.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    return Ok(AdmissionPermit {
                        admission: Arc::clone(admission),
                    });
                }
                Err(actual) => current = actual,
            }
        }
    }

    /// Next connection id. Ids start at 1 and are never reused.
    pub(crate) fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn insert(&self, conn: Arc<Connection>) {
        self.connections.insert(conn.id(), conn);
    }

    pub(crate) fn remove(&self, id: u64) -> Option<Arc<Connection>> {
        self.connections.remove(&id).map(|(_, conn)| conn)
    }

    /// Look up a live connection.
    #[must_use]
    pub fn get(&self, id: u64) -> Option<Arc<Connection>> {
        self.connections.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Number of connections currently in the registry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Number of admission slots currently held.
    #[must_use]
    pub fn open_connections(&self) -> usize {
        self.admission.open.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn max_connections(&self) -> usize {
        self.admission.max
    }

    /// Snapshot of the live connections.
    ///
    /// Taken without holding any shard lock past the call, so the result may
    /// include connections that close immediately afterwards.
    #[must_use]
    pub fn connections(&self) -> Vec<Arc<Connection>> {
        self.connections
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Queue a text message on every live connection.
    ///
    /// Never waits: a connection whose outbound queue is full drops the
    /// message and counts it in
    /// [`Connection::dropped_messages`](crate::Connection::dropped_messages).
    /// Returns the number of connections the message was queued on.
    pub fn broadcast_text(&self, text: &str) -> usize {
        self.broadcast(&Frame::text(Bytes::copy_from_slice(text.as_bytes())))
    }

    /// Queue a binary message on every live connection. See
    /// [`broadcast_text`](Self::broadcast_text).
    pub fn broadcast_binary(&self, data: impl Into<Bytes>) -> usize {
        self.broadcast(&Frame::binary(data))
    }

    fn broadcast(&self, frame: &Frame) -> usize {
        let mut delivered = 0;
        for conn in self.connections() {
            match conn.try_send_frame(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(error) => {
                    tracing::warn!(conn_id = conn.id(), %error, "broadcast message dropped");
                }
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admit_up_to_max() {
        let registry = Registry::new(2);
        let a = registry.try_admit().unwrap();
        let _b = registry.try_admit().unwrap();
        assert_eq!(registry.open_connections(), 2);

        assert_eq!(
            registry.try_admit().unwrap_err(),
            Error::AdmissionRejected { max: 2 }
        );

        drop(a);
        assert_eq!(registry.open_connections(), 1);
        let _c = registry.try_admit().unwrap();
        assert_eq!(registry.open_connections(), 2);
    }

    #[test]
    fn test_zero_max_rejects_everything() {
        let registry = Registry::new(0);
        assert!(registry.try_admit().is_err());
        assert_eq!(registry.open_connections(), 0);
    }

    #[test]
    fn test_ids_start_at_one_and_increase() {
        let registry = Registry::new(1);
        assert_eq!(registry.next_id(), 1);
        assert_eq!(registry.next_id(), 2);
        assert_eq!(registry.next_id(), 3);
    }

    #[test]
    fn test_concurrent_admission_never_exceeds_max() {
        let registry = Arc::new(Registry::new(8));
        let handles: Vec<_> = (0..32)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.try_admit().ok())
            })
            .collect();

        let permits: Vec<_> = handles
            .into_iter()
            .filter_map(|h| h.join().unwrap())
            .collect();
        assert_eq!(permits.len(), 8);
        assert_eq!(registry.open_connections(), 8);

        drop(permits);
        assert_eq!(registry.open_connections(), 0);
    }

    #[test]
    fn test_empty_registry() {
        let registry = Registry::new(4);
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert!(registry.get(1).is_none());
        assert!(registry.connections().is_empty());
        assert_eq!(registry.max_connections(), 4);
    }
}
