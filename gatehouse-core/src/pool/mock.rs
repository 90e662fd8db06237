//! In-memory connector for testing the pool without a backend

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{Connection, Connector};
use crate::error::BackendError;

/// Connector that hands out numbered [`MockConnection`]s
#[derive(Default)]
pub struct MockConnector {
    next_id: AtomicUsize,
    failures_pending: AtomicUsize,
    connects: AtomicUsize,
    counters: Arc<Counters>,
    health: Mutex<HashMap<usize, Arc<AtomicBool>>>,
}

#[derive(Default)]
struct Counters {
    pings: AtomicUsize,
    closed: AtomicUsize,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` connect attempts fail
    pub fn fail_next_connects(&self, n: usize) {
        self.failures_pending.store(n, Ordering::SeqCst);
    }

    /// Make the probe fail for connection `id` from now on
    pub fn break_connection(&self, id: usize) {
        if let Some(healthy) = self.health_map().get(&id) {
            healthy.store(false, Ordering::SeqCst);
        }
    }

    /// Successful connects so far
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn pings(&self) -> usize {
        self.counters.pings.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.counters.closed.load(Ordering::SeqCst)
    }

    fn health_map(&self) -> std::sync::MutexGuard<'_, HashMap<usize, Arc<AtomicBool>>> {
        self.health.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Connection = MockConnection;

    async fn connect(&self) -> Result<MockConnection, BackendError> {
        let failing = self
            .failures_pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err("backend unreachable".into());
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let healthy = Arc::new(AtomicBool::new(true));
        self.health_map().insert(id, Arc::clone(&healthy));
        self.connects.fetch_add(1, Ordering::SeqCst);

        Ok(MockConnection {
            id,
            open: true,
            healthy,
            counters: Arc::clone(&self.counters),
        })
    }
}

/// Numbered fake connection
pub struct MockConnection {
    id: usize,
    open: bool,
    healthy: Arc<AtomicBool>,
    counters: Arc<Counters>,
}

impl MockConnection {
    /// Creation order, starting at 1
    pub fn id(&self) -> usize {
        self.id
    }

    /// Simulate the backend dropping the connection
    pub fn mark_closed(&mut self) {
        self.open = false;
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn is_open(&self) -> bool {
        self.open
    }

    async fn ping(&mut self) -> Result<(), BackendError> {
        self.counters.pings.fetch_add(1, Ordering::SeqCst);
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(format!("connection {} lost", self.id).into())
        }
    }

    async fn close(self) {
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
    }
}
