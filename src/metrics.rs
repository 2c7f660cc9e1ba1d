//! Lifecycle metrics for tracked resources

use crossbeam::utils::CachePadded;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Snapshot of the resources a factory has handed out
///
/// # Examples
///
/// ```
/// use pool_proxy::ProxyFactory;
///
/// let factory = ProxyFactory::default();
/// let metrics = factory.metrics();
/// assert_eq!(metrics.open_statements, 0);
/// assert_eq!(metrics.export()["pool"], "pool");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "metrics", derive(serde::Serialize))]
pub struct ProxyMetrics {
    /// Pool the factory belongs to
    pub pool_name: String,

    /// Total statement proxies created
    pub statements_opened: usize,

    /// Total statement proxies closed
    pub statements_closed: usize,

    /// Total result set proxies created
    pub result_sets_opened: usize,

    /// Total result set proxies closed
    pub result_sets_closed: usize,

    /// Statements currently open
    pub open_statements: usize,

    /// Result sets currently open
    pub open_result_sets: usize,

    /// Children a connection sweep found open and had to close
    pub leaked_resources: usize,

    /// Native close calls that failed
    pub close_failures: usize,
}

impl ProxyMetrics {
    /// Export metrics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        metrics.insert("pool".to_string(), self.pool_name.clone());
        metrics.insert("statements_opened".to_string(), self.statements_opened.to_string());
        metrics.insert("statements_closed".to_string(), self.statements_closed.to_string());
        metrics.insert("result_sets_opened".to_string(), self.result_sets_opened.to_string());
        metrics.insert("result_sets_closed".to_string(), self.result_sets_closed.to_string());
        metrics.insert("open_statements".to_string(), self.open_statements.to_string());
        metrics.insert("open_result_sets".to_string(), self.open_result_sets.to_string());
        metrics.insert("leaked_resources".to_string(), self.leaked_resources.to_string());
        metrics.insert("close_failures".to_string(), self.close_failures.to_string());
        metrics
    }
}

/// Internal metrics tracker
#[derive(Default)]
pub(crate) struct MetricsTracker {
    pub statements_opened: CachePadded<AtomicUsize>,
    pub statements_closed: CachePadded<AtomicUsize>,
    pub result_sets_opened: CachePadded<AtomicUsize>,
    pub result_sets_closed: CachePadded<AtomicUsize>,
    pub leaked_resources: CachePadded<AtomicUsize>,
    pub close_failures: CachePadded<AtomicUsize>,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_metrics(&self, pool_name: &str) -> ProxyMetrics {
        let statements_opened = self.statements_opened.load(Ordering::Relaxed);
        let statements_closed = self.statements_closed.load(Ordering::Relaxed);
        let result_sets_opened = self.result_sets_opened.load(Ordering::Relaxed);
        let result_sets_closed = self.result_sets_closed.load(Ordering::Relaxed);

        ProxyMetrics {
            pool_name: pool_name.to_string(),
            statements_opened,
            statements_closed,
            result_sets_opened,
            result_sets_closed,
            open_statements: statements_opened.saturating_sub(statements_closed),
            open_result_sets: result_sets_opened.saturating_sub(result_sets_closed),
            leaked_resources: self.leaked_resources.load(Ordering::Relaxed),
            close_failures: self.close_failures.load(Ordering::Relaxed),
        }
    }
}

pub(crate) fn increment(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::Relaxed);
}
