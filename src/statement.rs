//! Statement proxy

use crate::delegate::Delegate;
use crate::driver::{CancelToken, NativeResultSet, NativeStatement};
use crate::errors::{DriverError, ProxyError, ProxyResult};
use crate::factory::ProxyFactory;
use crate::metrics::increment;
use crate::result_set::ResultSetProxy;
use crate::tracker::{ChildTracker, ResourceId, ResourceKind, TrackedResource, Tracker};

use parking_lot::{MappedMutexGuard, RwLock};
use std::any::Any;
use std::sync::{Arc, Weak};

/// A pooled statement
///
/// Behaves like the native statement it wraps, except that it is registered
/// with its owning connection while open, and every result set it produces is
/// itself a tracked [`ResultSetProxy`].
pub struct StatementProxy {
    id: ResourceId,
    this: Weak<StatementProxy>,
    owner: RwLock<Weak<dyn Tracker>>,
    delegate: Delegate<dyn NativeStatement>,
    cancel_token: Option<Arc<dyn CancelToken>>,
    result_sets: ChildTracker,
    factory: ProxyFactory,
}

impl StatementProxy {
    /// Only [`ProxyFactory`] calls this; it registers the proxy afterwards.
    pub(crate) fn new(owner: &Arc<dyn Tracker>, native: Box<dyn NativeStatement>, factory: ProxyFactory) -> Arc<Self> {
        let id = ResourceId::next();
        let cancel_token = native.cancel_token();
        Arc::new_cyclic(|this| Self {
            id,
            this: this.clone(),
            owner: RwLock::new(Arc::downgrade(owner)),
            delegate: Delegate::new(native, ResourceKind::Statement),
            cancel_token,
            result_sets: factory.child_tracker(id, false),
            factory,
        })
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn is_closed(&self) -> bool {
        self.delegate.is_closed()
    }

    /// Close the statement
    ///
    /// Closing an already closed statement succeeds and does nothing.
    /// Otherwise the statement unregisters from its owner, closes any result
    /// sets it still tracks, then closes the native statement. With
    /// `cascade_close` off the open result sets move to the owner instead.
    /// A driver call still running on another thread is cancelled first.
    /// The proxy ends up closed and unregistered even when the native close
    /// fails; that failure is returned.
    pub fn close(&self) -> ProxyResult<()> {
        let cascade_close = self.factory.config().cascade_close;
        let mut cascade = Ok(0);
        let closed = self.delegate.close(|| {
            let owner = self.owner.read().upgrade();
            if let Some(owner) = &owner {
                if !cascade_close {
                    self.result_sets.transfer_to(owner);
                }
                owner.unregister(self.id);
            }
            if cascade_close {
                cascade = self.result_sets.close_all();
            }
            if self.delegate.is_busy() {
                self.interrupt();
            }
        });

        match closed {
            Ok(false) => return Ok(()),
            Ok(true) => {}
            Err(err) => {
                increment(&self.factory.tracker().close_failures);
                increment(&self.factory.tracker().statements_closed);
                tracing::warn!(pool = %self.factory.pool_name(), statement = %self.id, error = %err, "native statement close failed");
                if let Err(cascade_err) = cascade {
                    tracing::warn!(statement = %self.id, error = %cascade_err, "closing open result sets failed");
                }
                return Err(err);
            }
        }

        increment(&self.factory.tracker().statements_closed);
        tracing::debug!(pool = %self.factory.pool_name(), statement = %self.id, "statement closed");
        cascade.map(|_| ())
    }

    /// Execute a query; `None` when the driver returned no cursor
    pub fn execute_query(&self, sql: &str) -> ProxyResult<Option<Arc<ResultSetProxy>>> {
        let native = self.delegate.forward(|stmt| stmt.execute_query(sql))?;
        self.track(native)
    }

    pub fn execute_update(&self, sql: &str) -> ProxyResult<u64> {
        self.delegate.forward(|stmt| stmt.execute_update(sql))
    }

    pub fn execute(&self, sql: &str) -> ProxyResult<bool> {
        self.delegate.forward(|stmt| stmt.execute(sql))
    }

    /// The current result as a tracked cursor
    pub fn result_set(&self) -> ProxyResult<Option<Arc<ResultSetProxy>>> {
        let native = self.delegate.forward(|stmt| stmt.result_set())?;
        self.track(native)
    }

    /// Keys generated by the last statement, as a tracked cursor
    pub fn generated_keys(&self) -> ProxyResult<Option<Arc<ResultSetProxy>>> {
        let native = self.delegate.forward(|stmt| stmt.generated_keys())?;
        self.track(native)
    }

    pub fn more_results(&self) -> ProxyResult<bool> {
        self.delegate.forward(|stmt| stmt.more_results())
    }

    pub fn update_count(&self) -> ProxyResult<Option<u64>> {
        self.delegate.forward(|stmt| stmt.update_count())
    }

    pub fn add_batch(&self, sql: &str) -> ProxyResult<()> {
        self.delegate.forward(|stmt| stmt.add_batch(sql))
    }

    pub fn clear_batch(&self) -> ProxyResult<()> {
        self.delegate.forward(|stmt| stmt.clear_batch())
    }

    pub fn execute_batch(&self) -> ProxyResult<Vec<u64>> {
        self.delegate.forward(|stmt| stmt.execute_batch())
    }

    pub fn max_rows(&self) -> ProxyResult<u64> {
        self.delegate.forward(|stmt| stmt.max_rows())
    }

    pub fn set_max_rows(&self, rows: u64) -> ProxyResult<()> {
        self.delegate.forward(|stmt| stmt.set_max_rows(rows))
    }

    pub fn fetch_size(&self) -> ProxyResult<u32> {
        self.delegate.forward(|stmt| stmt.fetch_size())
    }

    pub fn set_fetch_size(&self, rows: u32) -> ProxyResult<()> {
        self.delegate.forward(|stmt| stmt.set_fetch_size(rows))
    }

    /// Cancel whatever the statement is running, from any thread
    ///
    /// Goes through the driver's cancel token and never waits for the
    /// running call.
    pub fn cancel(&self) -> ProxyResult<()> {
        if self.is_closed() {
            return Err(ProxyError::ResourceClosed(ResourceKind::Statement));
        }
        match &self.cancel_token {
            Some(token) => Ok(token.cancel()?),
            None => Err(DriverError::new("statement cancellation is not supported")
                .with_sql_state("0A000")
                .into()),
        }
    }

    fn interrupt(&self) {
        if let Some(token) = &self.cancel_token {
            if let Err(err) = token.cancel() {
                tracing::debug!(statement = %self.id, error = %err, "cancel on close failed");
            }
        }
    }

    /// The owning connection proxy, never the native connection
    pub fn connection(&self) -> ProxyResult<Arc<dyn Tracker>> {
        if self.is_closed() {
            return Err(ProxyError::ResourceClosed(ResourceKind::Statement));
        }
        self.owner
            .read()
            .upgrade()
            .ok_or(ProxyError::ResourceClosed(ResourceKind::Connection))
    }

    /// Number of result sets this statement produced that are still open
    pub fn open_result_sets(&self) -> usize {
        self.result_sets.len()
    }

    pub fn is_wrapper_for<T: Any>(&self) -> ProxyResult<bool> {
        self.delegate.is_wrapper_for::<T>(self.factory.config().max_unwrap_depth)
    }

    /// Borrow the native statement, or a driver layer beneath it, as a `T`
    ///
    /// The statement is locked while the guard lives; calling back into the
    /// proxy from the same thread before dropping it deadlocks.
    pub fn unwrap<T: Any>(&self) -> ProxyResult<MappedMutexGuard<'_, T>> {
        self.delegate.unwrap::<T>(self.factory.config().max_unwrap_depth)
    }

    fn track(&self, native: Option<Box<dyn NativeResultSet>>) -> ProxyResult<Option<Arc<ResultSetProxy>>> {
        let Some(native) = native else {
            return Ok(None);
        };
        let owner: Arc<dyn Tracker> = self
            .this
            .upgrade()
            .ok_or(ProxyError::ResourceClosed(ResourceKind::Statement))?;
        let result_set = self.factory.wrap_result_set(&owner, native);

        // A forced close may have swept this statement while the driver call ran.
        if self.is_closed() {
            if let Err(err) = result_set.close() {
                tracing::warn!(statement = %self.id, result_set = %result_set.id(), error = %err, "closing late result set failed");
            }
            return Err(ProxyError::ResourceClosed(ResourceKind::Statement));
        }
        Ok(Some(result_set))
    }
}

impl TrackedResource for StatementProxy {
    fn resource_id(&self) -> ResourceId {
        self.id
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Statement
    }

    fn is_closed(&self) -> bool {
        StatementProxy::is_closed(self)
    }

    fn close(&self) -> ProxyResult<()> {
        StatementProxy::close(self)
    }

    fn reassign(&self, owner: &Arc<dyn Tracker>) {
        *self.owner.write() = Arc::downgrade(owner);
    }
}

impl Tracker for StatementProxy {
    fn owner_id(&self) -> ResourceId {
        self.id
    }

    fn register(&self, child: Arc<dyn TrackedResource>) {
        self.result_sets.register(child);
    }

    fn unregister(&self, child: ResourceId) {
        self.result_sets.unregister(child);
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl std::fmt::Debug for StatementProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatementProxy")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .field("result_sets", &self.result_sets)
            .finish()
    }
}
