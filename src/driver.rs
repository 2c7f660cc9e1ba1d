//! Traits the underlying driver implements
//!
//! Proxies only ever talk to the driver through these traits. Every native
//! resource is [`Wrapper`]-capable so that a proxy can expose the concrete
//! driver type underneath it, including types hidden behind further
//! driver-side wrapper layers.

use crate::errors::DriverResult;
use std::any::Any;
use std::sync::Arc;

/// Type-erased access to a concrete driver value
pub trait AsAny: Any {
    /// Returns the value as an Any reference for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Returns the value as a mutable Any reference for downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Wrapper introspection for native resources
///
/// A driver object that itself wraps another driver object (a vendor
/// pooling layer, a tracing shim) reports the inner layer through
/// [`wrapped`](Wrapper::wrapped) so proxies can chain through it.
pub trait Wrapper: AsAny + Send {
    /// The next layer down, if this object wraps another one
    fn wrapped(&self) -> Option<&dyn Wrapper> {
        None
    }

    /// Mutable access to the next layer down
    fn wrapped_mut(&mut self) -> Option<&mut dyn Wrapper> {
        None
    }
}

/// A native resource that must be released exactly once
pub trait NativeResource: Wrapper {
    fn close(&mut self) -> DriverResult<()>;
}

/// A native connection
pub trait NativeConnection: NativeResource {
    fn create_statement(&mut self) -> DriverResult<Box<dyn NativeStatement>>;
}

/// A native statement
pub trait NativeStatement: NativeResource {
    /// Run a query; `None` when the driver produced no cursor
    fn execute_query(&mut self, sql: &str) -> DriverResult<Option<Box<dyn NativeResultSet>>>;

    fn execute_update(&mut self, sql: &str) -> DriverResult<u64>;

    /// Run any statement; `true` when the first result is a cursor
    fn execute(&mut self, sql: &str) -> DriverResult<bool>;

    /// The current result as a cursor
    fn result_set(&mut self) -> DriverResult<Option<Box<dyn NativeResultSet>>>;

    /// Keys generated by the last executed statement
    fn generated_keys(&mut self) -> DriverResult<Option<Box<dyn NativeResultSet>>>;

    fn more_results(&mut self) -> DriverResult<bool>;

    fn update_count(&mut self) -> DriverResult<Option<u64>>;

    fn add_batch(&mut self, sql: &str) -> DriverResult<()>;

    fn clear_batch(&mut self) -> DriverResult<()>;

    fn execute_batch(&mut self) -> DriverResult<Vec<u64>>;

    fn max_rows(&self) -> DriverResult<u64>;

    fn set_max_rows(&mut self, rows: u64) -> DriverResult<()>;

    fn fetch_size(&self) -> DriverResult<u32>;

    fn set_fetch_size(&mut self, rows: u32) -> DriverResult<()>;

    /// A handle that can interrupt this statement from another thread
    ///
    /// Asked for once, when the statement is wrapped. `None` means the
    /// driver cannot cancel a running statement.
    fn cancel_token(&self) -> Option<Arc<dyn CancelToken>>;
}

/// Out-of-band cancellation of a running statement
///
/// Used while another thread is inside a call on the same statement, so it
/// must not need access to the statement itself.
pub trait CancelToken: Send + Sync {
    fn cancel(&self) -> DriverResult<()>;
}

/// A native cursor
///
/// Column indexes and labels are passed through as the driver defines them.
pub trait NativeResultSet: NativeResource {
    fn next(&mut self) -> DriverResult<bool>;

    fn get_string(&mut self, column: usize) -> DriverResult<Option<String>>;

    fn get_i64(&mut self, column: usize) -> DriverResult<Option<i64>>;

    fn get_f64(&mut self, column: usize) -> DriverResult<Option<f64>>;

    fn get_bool(&mut self, column: usize) -> DriverResult<Option<bool>>;

    fn get_bytes(&mut self, column: usize) -> DriverResult<Option<Vec<u8>>>;

    /// A cursor stored in a column (REF CURSOR, array contents)
    fn get_result_set(&mut self, column: usize) -> DriverResult<Option<Box<dyn NativeResultSet>>>;

    fn was_null(&self) -> DriverResult<bool>;

    fn find_column(&self, label: &str) -> DriverResult<usize>;

    fn column_count(&self) -> DriverResult<usize>;

    fn column_label(&self, column: usize) -> DriverResult<String>;

    /// Current row number, 0 before the first row
    fn row(&self) -> DriverResult<usize>;

    fn fetch_size(&self) -> DriverResult<u32>;

    fn set_fetch_size(&mut self, rows: u32) -> DriverResult<()>;
}
