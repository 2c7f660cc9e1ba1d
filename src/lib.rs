//! # pool_proxy
//!
//! Statement and result set proxies for pooled database connections. The
//! proxies behave like the driver's own resources while keeping track of
//! every child resource a pooled connection has open, so the pool can detect
//! leaks and force-close whatever the application forgot.
//!
//! ## Features
//!
//! - Connection, statement and result set proxies over driver traits
//! - Transitive tracking: every resource a proxy produces is itself a proxy
//! - Idempotent, race-safe close with unregister-before-release ordering
//! - Forced cleanup of leaked children with leak metrics and logging
//! - Wrapper introspection that chains through driver-side wrapper layers
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pool_proxy::{ProxyConfiguration, ProxyFactory};
//!
//! let factory = ProxyFactory::new(ProxyConfiguration::new().with_pool_name("orders"));
//! let conn = factory.wrap_connection(Box::new(driver_connection));
//!
//! let stmt = conn.create_statement()?;
//! if let Some(rows) = stmt.execute_query("SELECT id FROM orders")? {
//!     while rows.next()? {
//!         println!("{:?}", rows.get_i64(1)?);
//!     }
//!     rows.close()?;
//! }
//! stmt.close()?;
//!
//! // Anything still open when the connection returns to the pool:
//! conn.close_statements()?;
//! ```

mod config;
mod connection;
mod delegate;
mod driver;
mod errors;
mod factory;
mod metrics;
mod result_set;
mod statement;
mod tracker;

#[cfg(test)]
mod mock;

pub use config::ProxyConfiguration;
pub use connection::ConnectionProxy;
pub use driver::{
    AsAny, CancelToken, NativeConnection, NativeResource, NativeResultSet, NativeStatement, Wrapper,
};
pub use errors::{DriverError, DriverResult, ProxyError, ProxyResult};
pub use factory::{NativeDelegate, ProxyFactory, ProxyHandle};
pub use metrics::ProxyMetrics;
pub use result_set::ResultSetProxy;
pub use statement::StatementProxy;
pub use tracker::{ChildTracker, ResourceId, ResourceKind, TrackedResource, Tracker};

/// Re-exported so callers can name the guard returned by `unwrap`
pub use parking_lot::MappedMutexGuard;
