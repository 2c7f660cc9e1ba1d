//! Connection proxy: the owner statements register with

use crate::delegate::Delegate;
use crate::driver::NativeConnection;
use crate::errors::{ProxyError, ProxyResult};
use crate::factory::ProxyFactory;
use crate::statement::StatementProxy;
use crate::tracker::{ChildTracker, ResourceId, ResourceKind, TrackedResource, Tracker};

use parking_lot::MappedMutexGuard;
use std::any::Any;
use std::sync::{Arc, Weak};

/// A pooled connection
///
/// Tracks every statement (and connection-level cursor) opened through it.
/// The pool uses [`close_statements`](ConnectionProxy::close_statements) to
/// reclaim whatever the application leaked when the connection comes back,
/// and [`close`](ConnectionProxy::close) when it retires the connection.
pub struct ConnectionProxy {
    id: ResourceId,
    this: Weak<ConnectionProxy>,
    delegate: Delegate<dyn NativeConnection>,
    statements: ChildTracker,
    factory: ProxyFactory,
}

impl ConnectionProxy {
    pub(crate) fn new(native: Box<dyn NativeConnection>, factory: ProxyFactory) -> Arc<Self> {
        let id = ResourceId::next();
        Arc::new_cyclic(|this| Self {
            id,
            this: this.clone(),
            delegate: Delegate::new(native, ResourceKind::Connection),
            statements: factory.child_tracker(id, true),
            factory,
        })
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn is_closed(&self) -> bool {
        self.delegate.is_closed()
    }

    /// Open a tracked statement
    pub fn create_statement(&self) -> ProxyResult<Arc<StatementProxy>> {
        let native = self.delegate.forward(|conn| conn.create_statement())?;
        let owner: Arc<dyn Tracker> = self
            .this
            .upgrade()
            .ok_or(ProxyError::ResourceClosed(ResourceKind::Connection))?;
        let statement = self.factory.wrap_statement(&owner, native);

        if self.is_closed() {
            if let Err(err) = statement.close() {
                tracing::warn!(connection = %self.id, statement = %statement.id(), error = %err, "closing late statement failed");
            }
            return Err(ProxyError::ResourceClosed(ResourceKind::Connection));
        }
        Ok(statement)
    }

    /// Force-close every child still open, leaving the connection open
    ///
    /// Returns how many children were closed.
    pub fn close_statements(&self) -> ProxyResult<usize> {
        let closed = self.statements.close_all()?;
        if closed > 0 {
            tracing::debug!(pool = %self.factory.pool_name(), connection = %self.id, closed, "closed open statements");
        }
        Ok(closed)
    }

    /// Close open children, then the native connection
    ///
    /// Children are closed regardless of `cascade_close`, since nothing
    /// can use them once the connection is gone. A native close failure wins
    /// over a child close failure.
    pub fn close(&self) -> ProxyResult<()> {
        let mut children = Ok(0);
        let closed = self.delegate.close(|| {
            children = self.statements.close_all();
        });

        match closed {
            Ok(false) => Ok(()),
            Ok(true) => {
                tracing::debug!(pool = %self.factory.pool_name(), connection = %self.id, "connection closed");
                children.map(|_| ())
            }
            Err(err) => {
                tracing::warn!(pool = %self.factory.pool_name(), connection = %self.id, error = %err, "native connection close failed");
                Err(err)
            }
        }
    }

    pub fn open_statements(&self) -> usize {
        self.statements.len()
    }

    /// Identities of all children currently open
    pub fn tracked_ids(&self) -> Vec<ResourceId> {
        self.statements.ids()
    }

    pub fn is_tracking(&self, child: ResourceId) -> bool {
        self.statements.contains(child)
    }

    pub fn is_wrapper_for<T: Any>(&self) -> ProxyResult<bool> {
        self.delegate.is_wrapper_for::<T>(self.factory.config().max_unwrap_depth)
    }

    /// Borrow the native connection, or a driver layer beneath it, as a `T`
    pub fn unwrap<T: Any>(&self) -> ProxyResult<MappedMutexGuard<'_, T>> {
        self.delegate.unwrap::<T>(self.factory.config().max_unwrap_depth)
    }
}

impl Tracker for ConnectionProxy {
    fn owner_id(&self) -> ResourceId {
        self.id
    }

    fn register(&self, child: Arc<dyn TrackedResource>) {
        self.statements.register(child);
    }

    fn unregister(&self, child: ResourceId) {
        self.statements.unregister(child);
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl Drop for ConnectionProxy {
    fn drop(&mut self) {
        if self.delegate.is_closed() {
            return;
        }
        tracing::warn!(pool = %self.factory.pool_name(), connection = %self.id, "connection dropped without close");
        if let Err(err) = self.close() {
            tracing::warn!(connection = %self.id, error = %err, "closing dropped connection failed");
        }
    }
}

impl std::fmt::Debug for ConnectionProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionProxy")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .field("statements", &self.statements)
            .finish()
    }
}
