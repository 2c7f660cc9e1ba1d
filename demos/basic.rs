//! Basic usage of the resource proxies with a toy in-memory driver

use pool_proxy::{
    CancelToken, DriverError, DriverResult, NativeConnection, NativeResource, NativeResultSet, NativeStatement,
    ProxyConfiguration, ProxyFactory, ProxyResult, Wrapper,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

struct ToyConnection;

impl Wrapper for ToyConnection {}

impl NativeResource for ToyConnection {
    fn close(&mut self) -> DriverResult<()> {
        println!("   [driver] connection closed");
        Ok(())
    }
}

impl NativeConnection for ToyConnection {
    fn create_statement(&mut self) -> DriverResult<Box<dyn NativeStatement>> {
        Ok(Box::new(ToyStatement { fetch_size: 0 }))
    }
}

struct ToyStatement {
    fetch_size: u32,
}

impl Wrapper for ToyStatement {}

impl NativeResource for ToyStatement {
    fn close(&mut self) -> DriverResult<()> {
        println!("   [driver] statement closed");
        Ok(())
    }
}

impl NativeStatement for ToyStatement {
    fn execute_query(&mut self, sql: &str) -> DriverResult<Option<Box<dyn NativeResultSet>>> {
        if !sql.starts_with("SELECT") {
            return Ok(None);
        }
        Ok(Some(Box::new(ToyRows { values: vec![1, 2, 3], cursor: 0 })))
    }

    fn execute_update(&mut self, _sql: &str) -> DriverResult<u64> {
        Ok(1)
    }

    fn execute(&mut self, sql: &str) -> DriverResult<bool> {
        Ok(sql.starts_with("SELECT"))
    }

    fn result_set(&mut self) -> DriverResult<Option<Box<dyn NativeResultSet>>> {
        Ok(None)
    }

    fn generated_keys(&mut self) -> DriverResult<Option<Box<dyn NativeResultSet>>> {
        Ok(Some(Box::new(ToyRows { values: vec![100], cursor: 0 })))
    }

    fn more_results(&mut self) -> DriverResult<bool> {
        Ok(false)
    }

    fn update_count(&mut self) -> DriverResult<Option<u64>> {
        Ok(None)
    }

    fn add_batch(&mut self, _sql: &str) -> DriverResult<()> {
        Ok(())
    }

    fn clear_batch(&mut self) -> DriverResult<()> {
        Ok(())
    }

    fn execute_batch(&mut self) -> DriverResult<Vec<u64>> {
        Ok(Vec::new())
    }

    fn max_rows(&self) -> DriverResult<u64> {
        Ok(0)
    }

    fn set_max_rows(&mut self, _rows: u64) -> DriverResult<()> {
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
        None
    }
}

struct ToyRows {
    values: Vec<i64>,
    cursor: usize,
}

impl ToyRows {
    fn current(&self, column: usize) -> DriverResult<i64> {
        if column != 1 {
            return Err(DriverError::new(format!("invalid column {}", column)).with_sql_state("07009"));
        }
        self.cursor
            .checked_sub(1)
            .and_then(|idx| self.values.get(idx).copied())
            .ok_or_else(|| DriverError::new("cursor is not on a row").with_sql_state("24000"))
    }
}

impl Wrapper for ToyRows {}

impl NativeResource for ToyRows {
    fn close(&mut self) -> DriverResult<()> {
        println!("   [driver] result set closed");
        Ok(())
    }
}

impl NativeResultSet for ToyRows {
    fn next(&mut self) -> DriverResult<bool> {
        self.cursor += 1;
        Ok(self.cursor <= self.values.len())
    }

    fn get_string(&mut self, column: usize) -> DriverResult<Option<String>> {
        Ok(Some(self.current(column)?.to_string()))
    }

    fn get_i64(&mut self, column: usize) -> DriverResult<Option<i64>> {
        Ok(Some(self.current(column)?))
    }

    fn get_f64(&mut self, column: usize) -> DriverResult<Option<f64>> {
        Ok(Some(self.current(column)? as f64))
    }

    fn get_bool(&mut self, column: usize) -> DriverResult<Option<bool>> {
        Ok(Some(self.current(column)? != 0))
    }

    fn get_bytes(&mut self, column: usize) -> DriverResult<Option<Vec<u8>>> {
        Ok(Some(self.current(column)?.to_be_bytes().to_vec()))
    }

    fn get_result_set(&mut self, _column: usize) -> DriverResult<Option<Box<dyn NativeResultSet>>> {
        Ok(None)
    }

    fn was_null(&self) -> DriverResult<bool> {
        Ok(false)
    }

    fn find_column(&self, label: &str) -> DriverResult<usize> {
        match label {
            "value" => Ok(1),
            _ => Err(DriverError::new(format!("no column {}", label))),
        }
    }

    fn column_count(&self) -> DriverResult<usize> {
        Ok(1)
    }

    fn column_label(&self, _column: usize) -> DriverResult<String> {
        Ok("value".to_string())
    }

    fn row(&self) -> DriverResult<usize> {
        Ok(self.cursor.min(self.values.len()))
    }

    fn fetch_size(&self) -> DriverResult<u32> {
        Ok(0)
    }

    fn set_fetch_size(&mut self, _rows: u32) -> DriverResult<()> {
        Ok(())
    }
}

fn main() -> ProxyResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== pool_proxy - Basic Examples ===\n");

    let factory = ProxyFactory::new(ProxyConfiguration::new().with_pool_name("demo"));
    let conn = factory.wrap_connection(Box::new(ToyConnection));

    // Example 1: tracked query
    println!("1. Query:");
    let stmt = conn.create_statement()?;
    if let Some(rows) = stmt.execute_query("SELECT value FROM numbers")? {
        println!("   Open result sets on statement: {}", stmt.open_result_sets());
        while rows.next()? {
            println!("   Row: {:?}", rows.get_i64(1)?);
        }
        rows.close()?;
    }
    println!("   Open result sets after close: {}\n", stmt.open_result_sets());

    // Example 2: closed proxies refuse work
    println!("2. Use after close:");
    stmt.close()?;
    stmt.close()?;
    match stmt.execute_query("SELECT value FROM numbers") {
        Err(err) => println!("   Error: {}\n", err),
        Ok(_) => println!("   Unexpected success\n"),
    }

    // Example 3: leaked resources are reclaimed by the pool
    println!("3. Leak cleanup:");
    let leaked = conn.create_statement()?;
    let _keys = leaked.generated_keys()?;
    drop(leaked);
    println!("   Open statements before sweep: {}", conn.open_statements());
    println!("   Closed by sweep: {}", conn.close_statements()?);
    println!("   Open statements after sweep: {}\n", conn.open_statements());

    // Example 4: unwrap to the driver type
    println!("4. Unwrap:");
    let stmt = conn.create_statement()?;
    println!("   Wraps ToyStatement: {}", stmt.is_wrapper_for::<ToyStatement>()?);
    stmt.unwrap::<ToyStatement>()?.fetch_size = 64;
    println!("   Fetch size via proxy: {}\n", stmt.fetch_size()?);

    conn.close()?;

    let metrics = factory.metrics();
    println!("Metrics:");
    let mut exported: Vec<_> = metrics.export().into_iter().collect();
    exported.sort();
    for (key, value) in exported {
        println!("   {}: {}", key, value);
    }

    Ok(())
}
