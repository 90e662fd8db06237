//! Bounded pool of exclusive backend connections
//!
//! # Design
//!
//! - One `std::sync::Mutex` guards the free queue and the live count; it is
//!   never held across an `.await`
//! - A `tokio::sync::Notify` plays the condition variable: `notify_one` when a
//!   connection is returned, `notify_waiters` on shutdown
//! - Returned connections go to the tail of the free queue and are handed out
//!   from the head (FIFO reuse)
//! - Connector I/O runs outside the lock; a slot in `total_live` is reserved
//!   before connecting so `total_live <= max_size` always holds

mod connector;
mod guard;
pub mod mock;
mod postgres;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

use crate::error::PoolError;

pub use connector::{Connection, Connector};
pub use guard::PooledConnection;
pub use postgres::{PgBackend, PgConnector};

/// Pool bounds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PoolOptions {
    /// Hard cap on live connections
    pub max_size: usize,
    /// Connections created at init and restored after a validation failure
    pub min_size: usize,
    /// Deadline used by [`ConnectionPool::get`], in milliseconds; `None`
    /// waits indefinitely
    pub acquire_timeout_ms: Option<u64>,
}

impl PoolOptions {
    pub fn new(max_size: usize, min_size: usize) -> Self {
        Self {
            max_size,
            min_size,
            acquire_timeout_ms: None,
        }
    }

    /// Sub-millisecond timeouts round up to 1ms
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        let millis = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self.acquire_timeout_ms = Some(millis.max(1));
        self
    }

    pub fn acquire_timeout(&self) -> Option<Duration> {
        self.acquire_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self::new(10, 2)
    }
}

/// Point-in-time view of the pool counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    pub running: bool,
    pub total_live: usize,
    pub idle: usize,
    pub max_size: usize,
    pub min_size: usize,
}

/// Shared handle to a connection pool. Cloning is cheap.
pub struct ConnectionPool<K: Connector> {
    inner: Arc<PoolInner<K>>,
}

impl<K: Connector> Clone for ConnectionPool<K> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct PoolInner<K: Connector> {
    connector: K,
    state: Mutex<PoolState<K::Connection>>,
    available: Notify,
}

struct PoolState<C> {
    idle: VecDeque<C>,
    total_live: usize,
    options: PoolOptions,
    running: bool,
    /// Bumped on shutdown; connections checked out under an older
    /// generation are discarded when they come back
    generation: u64,
}

impl<K: Connector> ConnectionPool<K> {
    /// Create a pool that is not yet running. Call [`init`](Self::init)
    /// before serving requests.
    pub fn new(connector: K) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                connector,
                state: Mutex::new(PoolState {
                    idle: VecDeque::new(),
                    total_live: 0,
                    options: PoolOptions::default(),
                    running: false,
                    generation: 0,
                }),
                available: Notify::new(),
            }),
        }
    }

    /// Start the pool and eagerly create `min_size` connections.
    ///
    /// Idempotent: a running pool is left untouched. Creation failures are
    /// logged and skipped, so the pool may start below `min_size`.
    pub async fn init(&self, options: PoolOptions) {
        let min_size = {
            let mut state = self.inner.state();
            if state.running {
                tracing::debug!("connection pool already running; init ignored");
                return;
            }

            let mut options = options;
            if options.max_size == 0 {
                tracing::warn!("pool max_size of 0 raised to 1");
                options.max_size = 1;
            }
            if options.min_size > options.max_size {
                tracing::warn!(
                    min_size = options.min_size,
                    max_size = options.max_size,
                    "pool min_size clamped to max_size"
                );
                options.min_size = options.max_size;
            }

            state.running = true;
            state.options = options;
            state.options.min_size
        };

        let mut created = 0;
        for _ in 0..min_size {
            if self.inner.grow().await {
                created += 1;
            }
        }

        let status = self.status();
        tracing::info!(
            created,
            min_size,
            max_size = status.max_size,
            "connection pool initialised"
        );
    }

    /// Take a connection, waiting for one to be returned if the pool is at
    /// capacity. Returns [`PoolError::Unavailable`] if the pool is not
    /// running or shuts down while waiting.
    ///
    /// A woken waiter that finds the free queue empty but the pool below
    /// `max_size` tries to create a connection itself.
    pub async fn acquire(&self) -> Result<PooledConnection<K>, PoolError> {
        let should_grow = {
            let state = self.inner.state();
            if !state.running {
                return Err(PoolError::Unavailable);
            }
            state.idle.is_empty() && state.total_live < state.options.max_size
        };

        if should_grow {
            // Failure falls through to waiting for a returned connection.
            self.inner.grow().await;
        }

        let mut woken = false;
        loop {
            // Register interest before inspecting the queue so a release or
            // shutdown between the check and the await is not missed.
            let notified = self.inner.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let grow = {
                let mut state = self.inner.state();
                if !state.running {
                    return Err(PoolError::Unavailable);
                }
                if let Some(conn) = state.idle.pop_front() {
                    return Ok(PooledConnection::new(conn, self.clone(), state.generation));
                }
                // A discarded connection may have freed capacity while we slept.
                woken && state.total_live < state.options.max_size
            };

            if grow && self.inner.grow().await {
                continue;
            }

            notified.await;
            woken = true;
        }
    }

    /// [`acquire`](Self::acquire) bounded by a deadline.
    ///
    /// A connection is never lost to the timeout: the pop from the free queue
    /// and the hand-off happen in the same poll.
    pub async fn acquire_timeout(
        &self,
        timeout: Duration,
    ) -> Result<PooledConnection<K>, PoolError> {
        match tokio::time::timeout(timeout, self.acquire()).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(?timeout, "timed out waiting for a pooled connection");
                Err(PoolError::Timeout { waited: timeout })
            }
        }
    }

    /// Acquire using the configured `acquire_timeout_ms`, if any
    pub async fn get(&self) -> Result<PooledConnection<K>, PoolError> {
        let timeout = self.inner.state().options.acquire_timeout();
        match timeout {
            Some(timeout) => self.acquire_timeout(timeout).await,
            None => self.acquire().await,
        }
    }

    /// Return a connection. `None` is a no-op.
    ///
    /// Equivalent to [`PooledConnection::release`].
    pub async fn release(&self, conn: Option<PooledConnection<K>>) {
        if let Some(conn) = conn {
            conn.release().await;
        }
    }

    /// Stop the pool: drain and close idle connections and wake every waiter.
    ///
    /// Idempotent. Connections still checked out are closed when their
    /// holders release them.
    pub async fn shutdown(&self) {
        let drained: Vec<K::Connection> = {
            let mut state = self.inner.state();
            if !state.running {
                return;
            }
            state.running = false;
            state.generation += 1;

            let drained: Vec<_> = state.idle.drain(..).collect();
            state.total_live = state.total_live.saturating_sub(drained.len());
            drained
        };

        self.inner.available.notify_waiters();

        let closed = drained.len();
        for conn in drained {
            conn.close().await;
        }

        let status = self.status();
        tracing::info!(
            closed,
            checked_out = status.total_live,
            "connection pool shut down"
        );
    }

    pub fn status(&self) -> PoolStatus {
        let state = self.inner.state();
        PoolStatus {
            running: state.running,
            total_live: state.total_live,
            idle: state.idle.len(),
            max_size: state.options.max_size,
            min_size: state.options.min_size,
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.state().running
    }

    /// The connection factory this pool draws from
    pub fn connector(&self) -> &K {
        &self.inner.connector
    }

    /// Validate a returned connection and put it back, or discard it and
    /// replenish towards `min_size`.
    pub(crate) async fn check_in(&self, mut conn: K::Connection, generation: u64) {
        let slot = LiveSlot::new(&self.inner.state);

        if self.inner.is_stale(generation) {
            drop(slot);
            tracing::debug!("pool not running; discarding returned connection");
            conn.close().await;
            return;
        }

        let valid = validate(&mut conn).await;

        let outcome = {
            let mut state = self.inner.state();
            if !state.running || state.generation != generation {
                slot.retire(&mut state);
                CheckIn::Discard(conn)
            } else if valid {
                slot.into_idle(&mut state, conn);
                CheckIn::Idle
            } else {
                slot.retire(&mut state);
                tracing::warn!(
                    total_live = state.total_live,
                    "invalid connection discarded on return"
                );
                CheckIn::Invalid {
                    replenish: state.total_live < state.options.min_size,
                }
            }
        };

        match outcome {
            CheckIn::Idle => self.inner.available.notify_one(),
            CheckIn::Discard(conn) => conn.close().await,
            CheckIn::Invalid { replenish } => {
                if replenish && self.inner.grow().await {
                    tracing::info!("replacement connection created to maintain min_size");
                } else {
                    // Capacity is free; let a waiter create its own.
                    self.inner.available.notify_one();
                }
            }
        }
    }

    /// Account for a connection dropped outside any runtime
    pub(crate) fn forget(&self) {
        let mut state = self.inner.state();
        state.total_live = state.total_live.saturating_sub(1);
    }
}

impl<K: Connector> PoolInner<K> {
    fn state(&self) -> MutexGuard<'_, PoolState<K::Connection>> {
        lock_state(&self.state)
    }

    fn is_stale(&self, generation: u64) -> bool {
        let state = self.state();
        !state.running || state.generation != generation
    }

    /// Create one connection if below `max_size`. Returns whether a new
    /// connection landed in the free queue.
    async fn grow(&self) -> bool {
        let (slot, generation) = {
            let mut state = self.state();
            if !state.running || state.total_live >= state.options.max_size {
                return false;
            }
            state.total_live += 1;
            (LiveSlot::new(&self.state), state.generation)
        };

        match self.connector.connect().await {
            Ok(conn) => {
                let stale = {
                    let mut state = self.state();
                    if state.running && state.generation == generation {
                        slot.into_idle(&mut state, conn);
                        None
                    } else {
                        slot.retire(&mut state);
                        Some(conn)
                    }
                };
                match stale {
                    None => {
                        self.available.notify_one();
                        true
                    }
                    Some(conn) => {
                        conn.close().await;
                        false
                    }
                }
            }
            Err(e) => {
                drop(slot);
                tracing::warn!(error = %e, "failed to create backend connection");
                false
            }
        }
    }
}

fn lock_state<C>(state: &Mutex<PoolState<C>>) -> MutexGuard<'_, PoolState<C>> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

/// What happened to a connection coming back from a caller
enum CheckIn<C> {
    Idle,
    Discard(C),
    // Unusable connections are dropped without a close round-trip.
    Invalid { replenish: bool },
}

/// A valid connection reports itself open and answers the probe.
async fn validate<C: Connection>(conn: &mut C) -> bool {
    if !conn.is_open() {
        return false;
    }
    match conn.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "connection validation failed");
            false
        }
    }
}

/// One unit of `total_live` that is not sitting in the free queue.
///
/// Dropping it while armed gives the unit back, so a cancelled connect or
/// check-in never leaks capacity.
struct LiveSlot<'a, C> {
    state: &'a Mutex<PoolState<C>>,
    armed: bool,
}

impl<'a, C> LiveSlot<'a, C> {
    fn new(state: &'a Mutex<PoolState<C>>) -> Self {
        Self { state, armed: true }
    }

    fn into_idle(mut self, state: &mut PoolState<C>, conn: C) {
        state.idle.push_back(conn);
        self.armed = false;
    }

    fn retire(mut self, state: &mut PoolState<C>) {
        state.total_live = state.total_live.saturating_sub(1);
        self.armed = false;
    }
}

impl<C> Drop for LiveSlot<'_, C> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = lock_state(self.state);
            state.total_live = state.total_live.saturating_sub(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockConnector;
    use super::*;

    #[tokio::test]
    async fn acquire_before_init_is_unavailable() {
        let pool = ConnectionPool::new(MockConnector::new());
        assert_eq!(pool.acquire().await.unwrap_err(), PoolError::Unavailable);
    }

    #[tokio::test]
    async fn init_creates_min_size() {
        let pool = ConnectionPool::new(MockConnector::new());
        pool.init(PoolOptions::new(5, 3)).await;

        let status = pool.status();
        assert!(status.running);
        assert_eq!(status.total_live, 3);
        assert_eq!(status.idle, 3);
    }

    #[tokio::test]
    async fn init_is_idempotent() {
        let pool = ConnectionPool::new(MockConnector::new());
        pool.init(PoolOptions::new(5, 2)).await;
        pool.init(PoolOptions::new(8, 4)).await;

        let status = pool.status();
        assert_eq!(status.total_live, 2);
        assert_eq!(status.max_size, 5);
        assert_eq!(pool.connector().connects(), 2);
    }

    #[tokio::test]
    async fn init_tolerates_creation_failures() {
        let connector = MockConnector::new();
        connector.fail_next_connects(2);
        let pool = ConnectionPool::new(connector);
        pool.init(PoolOptions::new(5, 3)).await;

        let status = pool.status();
        assert!(status.running);
        assert_eq!(status.total_live, 1);
    }

    #[tokio::test]
    async fn init_clamps_min_to_max() {
        let pool = ConnectionPool::new(MockConnector::new());
        pool.init(PoolOptions::new(2, 5)).await;

        let status = pool.status();
        assert_eq!(status.min_size, 2);
        assert_eq!(status.total_live, 2);
    }

    #[tokio::test]
    async fn acquire_grows_lazily_up_to_max() {
        let pool = ConnectionPool::new(MockConnector::new());
        pool.init(PoolOptions::new(2, 0)).await;
        assert_eq!(pool.status().total_live, 0);

        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(pool.status().total_live, 2);
        assert_eq!(pool.status().idle, 0);

        a.release().await;
        b.release().await;
        assert_eq!(pool.status().idle, 2);
    }

    #[tokio::test]
    async fn returned_connections_are_reused_fifo() {
        let pool = ConnectionPool::new(MockConnector::new());
        pool.init(PoolOptions::new(3, 3)).await;

        let first = pool.acquire().await.unwrap();
        let second = pool.acquire().await.unwrap();
        let third = pool.acquire().await.unwrap();
        let (id2, id3, id1) = (second.id(), third.id(), first.id());

        second.release().await;
        third.release().await;
        first.release().await;

        assert_eq!(pool.acquire().await.unwrap().id(), id2);
        assert_eq!(pool.acquire().await.unwrap().id(), id3);
        assert_eq!(pool.acquire().await.unwrap().id(), id1);
    }

    #[tokio::test]
    async fn invalid_connection_is_replaced_to_min() {
        let pool = ConnectionPool::new(MockConnector::new());
        pool.init(PoolOptions::new(4, 2)).await;

        let conn = pool.acquire().await.unwrap();
        let broken = conn.id();
        pool.connector().break_connection(broken);
        conn.release().await;

        let status = pool.status();
        assert_eq!(status.total_live, 2);
        assert_eq!(status.idle, 2);
        assert_eq!(pool.connector().connects(), 3);

        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        assert_ne!(a.id(), broken);
        assert_ne!(b.id(), broken);
    }

    #[tokio::test]
    async fn invalid_connection_above_min_is_not_replaced() {
        let pool = ConnectionPool::new(MockConnector::new());
        pool.init(PoolOptions::new(4, 1)).await;

        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        pool.connector().break_connection(b.id());
        a.release().await;
        b.release().await;

        assert_eq!(pool.status().total_live, 1);
        assert_eq!(pool.connector().connects(), 2);
    }

    #[tokio::test]
    async fn closed_connection_is_invalid_without_probe() {
        let pool = ConnectionPool::new(MockConnector::new());
        pool.init(PoolOptions::new(1, 0)).await;

        let mut conn = pool.acquire().await.unwrap();
        conn.mark_closed();
        conn.release().await;

        assert_eq!(pool.status().total_live, 0);
        assert_eq!(pool.connector().pings(), 0);
    }

    #[tokio::test]
    async fn release_none_is_noop() {
        let pool = ConnectionPool::new(MockConnector::new());
        pool.init(PoolOptions::new(2, 1)).await;
        pool.release(None).await;
        assert_eq!(pool.status().total_live, 1);
    }

    #[tokio::test]
    async fn shutdown_is_idempotent_and_drains() {
        let pool = ConnectionPool::new(MockConnector::new());
        pool.init(PoolOptions::new(3, 3)).await;

        pool.shutdown().await;
        pool.shutdown().await;

        let status = pool.status();
        assert!(!status.running);
        assert_eq!(status.idle, 0);
        assert_eq!(status.total_live, 0);
        assert_eq!(pool.connector().closed(), 3);
        assert_eq!(pool.acquire().await.unwrap_err(), PoolError::Unavailable);
    }

    #[tokio::test]
    async fn release_after_shutdown_discards() {
        let pool = ConnectionPool::new(MockConnector::new());
        pool.init(PoolOptions::new(2, 2)).await;

        let held = pool.acquire().await.unwrap();
        pool.shutdown().await;
        assert_eq!(pool.status().total_live, 1);

        held.release().await;
        assert_eq!(pool.status().total_live, 0);
        assert_eq!(pool.status().idle, 0);
        assert_eq!(pool.connector().closed(), 2);
    }

    #[tokio::test]
    async fn acquire_timeout_reports_timeout() {
        let pool = ConnectionPool::new(MockConnector::new());
        pool.init(PoolOptions::new(1, 1)).await;

        let _held = pool.acquire().await.unwrap();
        let err = pool
            .acquire_timeout(Duration::from_millis(20))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            PoolError::Timeout {
                waited: Duration::from_millis(20)
            }
        );
        assert_eq!(pool.status().total_live, 1);
    }

    #[test]
    fn options_round_trip_timeout() {
        let options = PoolOptions::new(4, 1).with_acquire_timeout(Duration::from_secs(3));
        assert_eq!(options.acquire_timeout(), Some(Duration::from_secs(3)));
        assert_eq!(PoolOptions::default().acquire_timeout(), None);
    }
}
