//! Result set proxy

use crate::delegate::Delegate;
use crate::driver::NativeResultSet;
use crate::errors::{ProxyError, ProxyResult};
use crate::factory::ProxyFactory;
use crate::metrics::increment;
use crate::statement::StatementProxy;
use crate::tracker::{ChildTracker, ResourceId, ResourceKind, TrackedResource, Tracker};

use parking_lot::{MappedMutexGuard, RwLock};
use std::any::Any;
use std::sync::{Arc, Weak};

/// A pooled cursor
///
/// Registered with whatever produced it (normally a [`StatementProxy`]) while
/// open. If that owner closes first without closing it, the cursor moves to
/// the owner's own tracker. Cursors nested inside its columns are tracked by
/// the result set itself.
pub struct ResultSetProxy {
    id: ResourceId,
    this: Weak<ResultSetProxy>,
    producer: Weak<dyn Tracker>,
    owner: RwLock<Weak<dyn Tracker>>,
    delegate: Delegate<dyn NativeResultSet>,
    nested: ChildTracker,
    factory: ProxyFactory,
}

impl ResultSetProxy {
    /// Only [`ProxyFactory`] calls this; it registers the proxy afterwards.
    pub(crate) fn new(owner: &Arc<dyn Tracker>, native: Box<dyn NativeResultSet>, factory: ProxyFactory) -> Arc<Self> {
        let id = ResourceId::next();
        Arc::new_cyclic(|this| Self {
            id,
            this: this.clone(),
            producer: Arc::downgrade(owner),
            owner: RwLock::new(Arc::downgrade(owner)),
            delegate: Delegate::new(native, ResourceKind::ResultSet),
            nested: factory.child_tracker(id, false),
            factory,
        })
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn is_closed(&self) -> bool {
        self.delegate.is_closed()
    }

    /// Close the cursor; same contract as [`StatementProxy::close`]
    pub fn close(&self) -> ProxyResult<()> {
        let cascade_close = self.factory.config().cascade_close;
        let mut cascade = Ok(0);
        let closed = self.delegate.close(|| {
            let owner = self.owner.read().upgrade();
            if let Some(owner) = &owner {
                if !cascade_close {
                    self.nested.transfer_to(owner);
                }
                owner.unregister(self.id);
            }
            if cascade_close {
                cascade = self.nested.close_all();
            }
        });

        match closed {
            Ok(false) => Ok(()),
            Ok(true) => {
                increment(&self.factory.tracker().result_sets_closed);
                tracing::debug!(pool = %self.factory.pool_name(), result_set = %self.id, "result set closed");
                cascade.map(|_| ())
            }
            Err(err) => {
                increment(&self.factory.tracker().result_sets_closed);
                increment(&self.factory.tracker().close_failures);
                tracing::warn!(pool = %self.factory.pool_name(), result_set = %self.id, error = %err, "native result set close failed");
                if let Err(cascade_err) = cascade {
                    tracing::warn!(result_set = %self.id, error = %cascade_err, "closing nested result sets failed");
                }
                Err(err)
            }
        }
    }

    pub fn next(&self) -> ProxyResult<bool> {
        self.delegate.forward(|rs| rs.next())
    }

    pub fn get_string(&self, column: usize) -> ProxyResult<Option<String>> {
        self.delegate.forward(|rs| rs.get_string(column))
    }

    pub fn get_i64(&self, column: usize) -> ProxyResult<Option<i64>> {
        self.delegate.forward(|rs| rs.get_i64(column))
    }

    pub fn get_f64(&self, column: usize) -> ProxyResult<Option<f64>> {
        self.delegate.forward(|rs| rs.get_f64(column))
    }

    pub fn get_bool(&self, column: usize) -> ProxyResult<Option<bool>> {
        self.delegate.forward(|rs| rs.get_bool(column))
    }

    pub fn get_bytes(&self, column: usize) -> ProxyResult<Option<Vec<u8>>> {
        self.delegate.forward(|rs| rs.get_bytes(column))
    }

    /// A cursor stored in `column`, tracked by this result set
    pub fn get_result_set(&self, column: usize) -> ProxyResult<Option<Arc<ResultSetProxy>>> {
        let Some(native) = self.delegate.forward(|rs| rs.get_result_set(column))? else {
            return Ok(None);
        };
        let owner: Arc<dyn Tracker> = self
            .this
            .upgrade()
            .ok_or(ProxyError::ResourceClosed(ResourceKind::ResultSet))?;
        let nested = self.factory.wrap_result_set(&owner, native);

        if self.is_closed() {
            if let Err(err) = nested.close() {
                tracing::warn!(result_set = %self.id, nested = %nested.id(), error = %err, "closing late nested result set failed");
            }
            return Err(ProxyError::ResourceClosed(ResourceKind::ResultSet));
        }
        Ok(Some(nested))
    }

    pub fn was_null(&self) -> ProxyResult<bool> {
        self.delegate.forward(|rs| rs.was_null())
    }

    pub fn find_column(&self, label: &str) -> ProxyResult<usize> {
        self.delegate.forward(|rs| rs.find_column(label))
    }

    pub fn column_count(&self) -> ProxyResult<usize> {
        self.delegate.forward(|rs| rs.column_count())
    }

    pub fn column_label(&self, column: usize) -> ProxyResult<String> {
        self.delegate.forward(|rs| rs.column_label(column))
    }

    pub fn row(&self) -> ProxyResult<usize> {
        self.delegate.forward(|rs| rs.row())
    }

    pub fn fetch_size(&self) -> ProxyResult<u32> {
        self.delegate.forward(|rs| rs.fetch_size())
    }

    pub fn set_fetch_size(&self, rows: u32) -> ProxyResult<()> {
        self.delegate.forward(|rs| rs.set_fetch_size(rows))
    }

    /// The statement proxy that produced this cursor, or `None` when
    /// something else did (connection metadata, a nested column)
    pub fn statement(&self) -> Option<Arc<StatementProxy>> {
        self.producer.upgrade()?.into_any().downcast::<StatementProxy>().ok()
    }

    /// Whatever this cursor is registered with
    pub fn owner(&self) -> Option<Arc<dyn Tracker>> {
        self.owner.read().upgrade()
    }

    pub fn open_nested(&self) -> usize {
        self.nested.len()
    }

    pub fn is_wrapper_for<T: Any>(&self) -> ProxyResult<bool> {
        self.delegate.is_wrapper_for::<T>(self.factory.config().max_unwrap_depth)
    }

    /// Borrow the native cursor, or a driver layer beneath it, as a `T`
    pub fn unwrap<T: Any>(&self) -> ProxyResult<MappedMutexGuard<'_, T>> {
        self.delegate.unwrap::<T>(self.factory.config().max_unwrap_depth)
    }
}

impl TrackedResource for ResultSetProxy {
    fn resource_id(&self) -> ResourceId {
        self.id
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::ResultSet
    }

    fn is_closed(&self) -> bool {
        ResultSetProxy::is_closed(self)
    }

    fn close(&self) -> ProxyResult<()> {
        ResultSetProxy::close(self)
    }

    fn reassign(&self, owner: &Arc<dyn Tracker>) {
        *self.owner.write() = Arc::downgrade(owner);
    }
}

impl Tracker for ResultSetProxy {
    fn owner_id(&self) -> ResourceId {
        self.id
    }

    fn register(&self, child: Arc<dyn TrackedResource>) {
        self.nested.register(child);
    }

    fn unregister(&self, child: ResourceId) {
        self.nested.unregister(child);
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl std::fmt::Debug for ResultSetProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultSetProxy")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}
