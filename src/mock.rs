//! In-memory driver used by the unit tests

use crate::driver::{CancelToken, NativeConnection, NativeResource, NativeResultSet, NativeStatement, Wrapper};
use crate::errors::{DriverError, DriverResult};

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Counts native closes so tests can check exactly-once release
#[derive(Debug, Default)]
pub(crate) struct DriverLog {
    pub connections_closed: AtomicUsize,
    pub statements_closed: AtomicUsize,
    pub result_sets_closed: AtomicUsize,
}

impl DriverLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

fn close_failure(message: &str) -> DriverError {
    DriverError::new(message).with_sql_state("HY000").with_vendor_code(17)
}

pub(crate) struct MockConnection {
    log: Arc<DriverLog>,
    fail_close: bool,
    pub statements_created: usize,
}

impl MockConnection {
    pub fn new(log: &Arc<DriverLog>) -> Self {
        Self {
            log: Arc::clone(log),
            fail_close: false,
            statements_created: 0,
        }
    }

    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }
}

impl Wrapper for MockConnection {}

impl NativeResource for MockConnection {
    fn close(&mut self) -> DriverResult<()> {
        self.log.connections_closed.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(close_failure("connection close failed"));
        }
        Ok(())
    }
}

impl NativeConnection for MockConnection {
    fn create_statement(&mut self) -> DriverResult<Box<dyn NativeStatement>> {
        self.statements_created += 1;
        Ok(Box::new(MockStatement::new(&self.log)))
    }
}

/// Cancel flag shared between a [`MockStatement`] and its token
#[derive(Debug, Default)]
pub(crate) struct MockCancel {
    requested: AtomicBool,
    pub calls: AtomicUsize,
}

impl CancelToken for MockCancel {
    fn cancel(&self) -> DriverResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested.store(true, Ordering::SeqCst);
        Ok(())
    }
}

pub(crate) struct MockStatement {
    log: Arc<DriverLog>,
    cancel: Option<Arc<MockCancel>>,
    delay: Duration,
    produces_results: bool,
    fail_close: bool,
    fail_result_close: bool,
    batch: Vec<String>,
    max_rows: u64,
    fetch_size: u32,
    update_count: Option<u64>,
    pub executed: Vec<String>,
}

impl MockStatement {
    pub fn new(log: &Arc<DriverLog>) -> Self {
        Self {
            log: Arc::clone(log),
            cancel: Some(Arc::default()),
            delay: Duration::ZERO,
            produces_results: true,
            fail_close: false,
            fail_result_close: false,
            batch: Vec::new(),
            max_rows: 0,
            fetch_size: 0,
            update_count: None,
            executed: Vec::new(),
        }
    }

    /// Every cursor-producing call returns `None`
    pub fn without_results(mut self) -> Self {
        self.produces_results = false;
        self
    }

    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    /// `execute_query` and `execute_update` run for `delay` unless cancelled
    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Cursors this statement produces fail to close
    pub fn failing_result_close(mut self) -> Self {
        self.fail_result_close = true;
        self
    }

    /// The driver offers no cancellation
    pub fn without_cancel(mut self) -> Self {
        self.cancel = None;
        self
    }

    pub fn cancel_flag(&self) -> Option<Arc<MockCancel>> {
        self.cancel.clone()
    }

    fn run(&self) -> DriverResult<()> {
        let deadline = Instant::now() + self.delay;
        while Instant::now() < deadline {
            if let Some(cancel) = &self.cancel {
                if cancel.requested.swap(false, Ordering::SeqCst) {
                    return Err(DriverError::new("statement cancelled").with_sql_state("57014"));
                }
            }
            thread::sleep(Duration::from_millis(5));
        }
        Ok(())
    }

    fn users(&self) -> Option<Box<dyn NativeResultSet>> {
        if !self.produces_results {
            return None;
        }
        let rows = vec![
            vec![Some("1".to_string()), Some("alice".to_string())],
            vec![Some("2".to_string()), None],
        ];
        let mut rs = MockResultSet::new(&self.log, rows);
        rs.fail_close = self.fail_result_close;
        Some(Box::new(rs))
    }
}

impl Wrapper for MockStatement {}

impl NativeResource for MockStatement {
    fn close(&mut self) -> DriverResult<()> {
        self.log.statements_closed.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(close_failure("statement close failed"));
        }
        Ok(())
    }
}

impl NativeStatement for MockStatement {
    fn execute_query(&mut self, sql: &str) -> DriverResult<Option<Box<dyn NativeResultSet>>> {
        self.run()?;
        self.executed.push(sql.to_string());
        self.update_count = None;
        Ok(self.users())
    }

    fn execute_update(&mut self, sql: &str) -> DriverResult<u64> {
        self.run()?;
        self.executed.push(sql.to_string());
        self.update_count = Some(1);
        Ok(1)
    }

    fn execute(&mut self, sql: &str) -> DriverResult<bool> {
        self.executed.push(sql.to_string());
        let is_query = sql.trim_start().to_ascii_uppercase().starts_with("SELECT");
        self.update_count = if is_query { None } else { Some(1) };
        Ok(is_query)
    }

    fn result_set(&mut self) -> DriverResult<Option<Box<dyn NativeResultSet>>> {
        Ok(self.users())
    }

    fn generated_keys(&mut self) -> DriverResult<Option<Box<dyn NativeResultSet>>> {
        if !self.produces_results {
            return Ok(None);
        }
        let rows = vec![vec![Some("42".to_string())]];
        Ok(Some(Box::new(MockResultSet::new(&self.log, rows))))
    }

    fn more_results(&mut self) -> DriverResult<bool> {
        Ok(false)
    }

    fn update_count(&mut self) -> DriverResult<Option<u64>> {
        Ok(self.update_count)
    }

    fn add_batch(&mut self, sql: &str) -> DriverResult<()> {
        self.batch.push(sql.to_string());
        Ok(())
    }

    fn clear_batch(&mut self) -> DriverResult<()> {
        self.batch.clear();
        Ok(())
    }

    fn execute_batch(&mut self) -> DriverResult<Vec<u64>> {
        let counts = vec![1; self.batch.len()];
        self.executed.append(&mut self.batch);
        Ok(counts)
    }

    fn max_rows(&self) -> DriverResult<u64> {
        Ok(self.max_rows)
    }

    fn set_max_rows(&mut self, rows: u64) -> DriverResult<()> {
        self.max_rows = rows;
        Ok(())
    }

    fn fetch_size(&self) -> DriverResult<u32> {
        Ok(self.fetch_size)
    }

    fn set_fetch_size(&mut self, rows: u32) -> DriverResult<()> {
        self.fetch_size = rows;
        Ok(())
    }

    fn cancel_token(&self) -> Option<Arc<dyn CancelToken>> {
        self.cancel.clone().map(|cancel| cancel as Arc<dyn CancelToken>)
    }
}

/// A vendor layer sitting between the proxy and [`MockStatement`]
pub(crate) struct VendorStatement {
    inner: MockStatement,
}

impl VendorStatement {
    pub fn new(inner: MockStatement) -> Self {
        Self { inner }
    }
}

impl Wrapper for VendorStatement {
    fn wrapped(&self) -> Option<&dyn Wrapper> {
        Some(&self.inner)
    }

    fn wrapped_mut(&mut self) -> Option<&mut dyn Wrapper> {
        Some(&mut self.inner)
    }
}

impl NativeResource for VendorStatement {
    fn close(&mut self) -> DriverResult<()> {
        self.inner.close()
    }
}

impl NativeStatement for VendorStatement {
    fn execute_query(&mut self, sql: &str) -> DriverResult<Option<Box<dyn NativeResultSet>>> {
        self.inner.execute_query(sql)
    }

    fn execute_update(&mut self, sql: &str) -> DriverResult<u64> {
        self.inner.execute_update(sql)
    }

    fn execute(&mut self, sql: &str) -> DriverResult<bool> {
        self.inner.execute(sql)
    }

    fn result_set(&mut self) -> DriverResult<Option<Box<dyn NativeResultSet>>> {
        self.inner.result_set()
    }

    fn generated_keys(&mut self) -> DriverResult<Option<Box<dyn NativeResultSet>>> {
        self.inner.generated_keys()
    }

    fn more_results(&mut self) -> DriverResult<bool> {
        self.inner.more_results()
    }

    fn update_count(&mut self) -> DriverResult<Option<u64>> {
        self.inner.update_count()
    }

    fn add_batch(&mut self, sql: &str) -> DriverResult<()> {
        self.inner.add_batch(sql)
    }

    fn clear_batch(&mut self) -> DriverResult<()> {
        self.inner.clear_batch()
    }

    fn execute_batch(&mut self) -> DriverResult<Vec<u64>> {
        self.inner.execute_batch()
    }

    fn max_rows(&self) -> DriverResult<u64> {
        self.inner.max_rows()
    }

    fn set_max_rows(&mut self, rows: u64) -> DriverResult<()> {
        self.inner.set_max_rows(rows)
    }

    fn fetch_size(&self) -> DriverResult<u32> {
        self.inner.fetch_size()
    }

    fn set_fetch_size(&mut self, rows: u32) -> DriverResult<()> {
        self.inner.set_fetch_size(rows)
    }

    fn cancel_token(&self) -> Option<Arc<dyn CancelToken>> {
        self.inner.cancel_token()
    }
}

/// Rows of nullable text cells; column 3 of any row holds a nested cursor,
/// which fails to close whenever its parent does
pub(crate) struct MockResultSet {
    log: Arc<DriverLog>,
    fail_close: bool,
    cursor: usize,
    last_was_null: bool,
    fetch_size: u32,
    pub rows: Vec<Vec<Option<String>>>,
}

impl MockResultSet {
    pub fn new(log: &Arc<DriverLog>, rows: Vec<Vec<Option<String>>>) -> Self {
        Self {
            log: Arc::clone(log),
            fail_close: false,
            cursor: 0,
            last_was_null: false,
            fetch_size: 0,
            rows,
        }
    }

    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    fn cell(&mut self, column: usize) -> DriverResult<Option<String>> {
        let row = self
            .cursor
            .checked_sub(1)
            .and_then(|idx| self.rows.get(idx))
            .ok_or_else(|| DriverError::new("cursor is not on a row").with_sql_state("24000"))?;
        let value = column
            .checked_sub(1)
            .and_then(|idx| row.get(idx))
            .ok_or_else(|| DriverError::new(format!("invalid column {}", column)).with_sql_state("07009"))?
            .clone();
        self.last_was_null = value.is_none();
        Ok(value)
    }

    fn parsed<T: std::str::FromStr>(&mut self, column: usize) -> DriverResult<Option<T>> {
        match self.cell(column)? {
            Some(text) => text
                .parse()
                .map(Some)
                .map_err(|_| DriverError::new(format!("cannot convert {:?}", text)).with_sql_state("22018")),
            None => Ok(None),
        }
    }

    fn width(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }
}

impl Wrapper for MockResultSet {}

impl NativeResource for MockResultSet {
    fn close(&mut self) -> DriverResult<()> {
        self.log.result_sets_closed.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(close_failure("result set close failed"));
        }
        Ok(())
    }
}

impl NativeResultSet for MockResultSet {
    fn next(&mut self) -> DriverResult<bool> {
        if self.cursor < self.rows.len() {
            self.cursor += 1;
            Ok(true)
        } else {
            self.cursor = self.rows.len() + 1;
            Ok(false)
        }
    }

    fn get_string(&mut self, column: usize) -> DriverResult<Option<String>> {
        self.cell(column)
    }

    fn get_i64(&mut self, column: usize) -> DriverResult<Option<i64>> {
        self.parsed(column)
    }

    fn get_f64(&mut self, column: usize) -> DriverResult<Option<f64>> {
        self.parsed(column)
    }

    fn get_bool(&mut self, column: usize) -> DriverResult<Option<bool>> {
        self.parsed(column)
    }

    fn get_bytes(&mut self, column: usize) -> DriverResult<Option<Vec<u8>>> {
        Ok(self.cell(column)?.map(String::into_bytes))
    }

    fn get_result_set(&mut self, column: usize) -> DriverResult<Option<Box<dyn NativeResultSet>>> {
        if column != 3 {
            return Ok(None);
        }
        let rows = vec![vec![Some("nested".to_string())]];
        let mut nested = MockResultSet::new(&self.log, rows);
        nested.fail_close = self.fail_close;
        Ok(Some(Box::new(nested)))
    }

    fn was_null(&self) -> DriverResult<bool> {
        Ok(self.last_was_null)
    }

    fn find_column(&self, label: &str) -> DriverResult<usize> {
        (1..=self.width())
            .find(|column| format!("c{}", column) == label)
            .ok_or_else(|| DriverError::new(format!("no column {}", label)).with_sql_state("42703"))
    }

    fn column_count(&self) -> DriverResult<usize> {
        Ok(self.width())
    }

    fn column_label(&self, column: usize) -> DriverResult<String> {
        if column == 0 || column > self.width() {
            return Err(DriverError::new(format!("invalid column {}", column)).with_sql_state("07009"));
        }
        Ok(format!("c{}", column))
    }

    fn row(&self) -> DriverResult<usize> {
        Ok(if self.cursor > self.rows.len() { 0 } else { self.cursor })
    }

    fn fetch_size(&self) -> DriverResult<u32> {
        Ok(self.fetch_size)
    }

    fn set_fetch_size(&mut self, rows: u32) -> DriverResult<()> {
        self.fetch_size = rows;
        Ok(())
    }
}
