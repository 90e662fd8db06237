//! gatehouse-core: the shared-state primitives behind the gatehouse service
//!
//! Two independent components, each guarded by a single lock:
//! - [`pool::ConnectionPool`]: bounded pool of exclusive backend connections
//!   with FIFO reuse, validation on return and best-effort replenishment
//! - [`session::SessionStore`]: opaque bearer tokens mapped to an identity
//!   and an absolute expiry, with lazy expiry and a background reaper

pub mod clock;
pub mod config;
pub mod error;
pub mod pool;
pub mod session;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{DatabaseConfig, GatehouseConfig, HttpConfig, SessionConfig};
pub use error::{BackendError, ConfigError, PoolError, SessionError};
pub use pool::{
    Connection, ConnectionPool, Connector, PgBackend, PgConnector, PoolOptions, PoolStatus,
    PooledConnection,
};
pub use session::{
    Identity, Role, Session, SessionStore, MAX_REAPER_INTERVAL, MIN_REAPER_INTERVAL,
};
