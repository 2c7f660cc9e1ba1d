//! Construction of proxies
//!
//! [`ProxyFactory`] is the only place proxies are built. Anything that hands
//! a native resource to application code, the pool as well as the proxies
//! themselves, goes through it so the new proxy is always registered with
//! its owner.

use crate::config::ProxyConfiguration;
use crate::connection::ConnectionProxy;
use crate::driver::{NativeConnection, NativeResultSet, NativeStatement};
use crate::errors::ProxyResult;
use crate::metrics::{increment, MetricsTracker, ProxyMetrics};
use crate::result_set::ResultSetProxy;
use crate::statement::StatementProxy;
use crate::tracker::{ChildTracker, ResourceId, ResourceKind, TrackedResource, Tracker};

use std::sync::Arc;

/// A native resource of either child role
pub enum NativeDelegate {
    Statement(Box<dyn NativeStatement>),
    ResultSet(Box<dyn NativeResultSet>),
}

/// A proxy of either child role
#[derive(Clone)]
pub enum ProxyHandle {
    Statement(Arc<StatementProxy>),
    ResultSet(Arc<ResultSetProxy>),
}

impl ProxyHandle {
    pub fn id(&self) -> ResourceId {
        match self {
            ProxyHandle::Statement(stmt) => stmt.id(),
            ProxyHandle::ResultSet(rs) => rs.id(),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            ProxyHandle::Statement(_) => ResourceKind::Statement,
            ProxyHandle::ResultSet(_) => ResourceKind::ResultSet,
        }
    }

    pub fn close(&self) -> ProxyResult<()> {
        match self {
            ProxyHandle::Statement(stmt) => stmt.close(),
            ProxyHandle::ResultSet(rs) => rs.close(),
        }
    }

    pub fn as_statement(&self) -> Option<&Arc<StatementProxy>> {
        match self {
            ProxyHandle::Statement(stmt) => Some(stmt),
            ProxyHandle::ResultSet(_) => None,
        }
    }

    pub fn as_result_set(&self) -> Option<&Arc<ResultSetProxy>> {
        match self {
            ProxyHandle::ResultSet(rs) => Some(rs),
            ProxyHandle::Statement(_) => None,
        }
    }
}

/// Builds and registers proxies
///
/// Cloning is cheap; clones share configuration and metrics.
#[derive(Clone)]
pub struct ProxyFactory {
    config: Arc<ProxyConfiguration>,
    pool_name: Arc<str>,
    metrics: Arc<MetricsTracker>,
}

impl Default for ProxyFactory {
    fn default() -> Self {
        Self::new(ProxyConfiguration::default())
    }
}

impl ProxyFactory {
    pub fn new(config: ProxyConfiguration) -> Self {
        Self {
            pool_name: Arc::from(config.pool_name.as_str()),
            config: Arc::new(config),
            metrics: Arc::new(MetricsTracker::new()),
        }
    }

    pub fn config(&self) -> &ProxyConfiguration {
        &self.config
    }

    /// Get lifecycle metrics for every proxy built by this factory and its clones
    pub fn metrics(&self) -> ProxyMetrics {
        self.metrics.get_metrics(&self.pool_name)
    }

    /// Wrap a connection the pool just obtained from the driver
    pub fn wrap_connection(&self, native: Box<dyn NativeConnection>) -> Arc<ConnectionProxy> {
        let proxy = ConnectionProxy::new(native, self.clone());
        tracing::debug!(pool = %self.pool_name, connection = %proxy.id(), "connection wrapped");
        proxy
    }

    /// Wrap a statement and register it with `owner`
    pub fn wrap_statement(&self, owner: &Arc<dyn Tracker>, native: Box<dyn NativeStatement>) -> Arc<StatementProxy> {
        let proxy = StatementProxy::new(owner, native, self.clone());
        owner.register(Arc::clone(&proxy) as Arc<dyn TrackedResource>);
        increment(&self.metrics.statements_opened);
        tracing::debug!(
            pool = %self.pool_name,
            owner = %owner.owner_id(),
            statement = %proxy.id(),
            "statement opened"
        );
        proxy
    }

    /// Wrap a result set and register it with `owner`
    pub fn wrap_result_set(&self, owner: &Arc<dyn Tracker>, native: Box<dyn NativeResultSet>) -> Arc<ResultSetProxy> {
        let proxy = ResultSetProxy::new(owner, native, self.clone());
        owner.register(Arc::clone(&proxy) as Arc<dyn TrackedResource>);
        increment(&self.metrics.result_sets_opened);
        tracing::debug!(
            pool = %self.pool_name,
            owner = %owner.owner_id(),
            result_set = %proxy.id(),
            "result set opened"
        );
        proxy
    }

    /// Wrap a native child resource according to its role
    pub fn wrap(&self, owner: &Arc<dyn Tracker>, native: NativeDelegate) -> ProxyHandle {
        match native {
            NativeDelegate::Statement(stmt) => ProxyHandle::Statement(self.wrap_statement(owner, stmt)),
            NativeDelegate::ResultSet(rs) => ProxyHandle::ResultSet(self.wrap_result_set(owner, rs)),
        }
    }

    /// A tracker for a custom owner type
    ///
    /// Pool-side connection types that implement [`Tracker`] themselves can
    /// keep their children in one of these. With `report_leaks`, children a
    /// sweep finds open are counted and logged as leaks.
    pub fn child_tracker(&self, owner: ResourceId, report_leaks: bool) -> ChildTracker {
        ChildTracker::new(
            owner,
            Arc::clone(&self.metrics),
            Arc::clone(&self.pool_name),
            report_leaks && self.config.log_leaked_resources,
        )
    }

    pub(crate) fn pool_name(&self) -> &str {
        &self.pool_name
    }

    pub(crate) fn tracker(&self) -> &MetricsTracker {
        &self.metrics
    }
}
