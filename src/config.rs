//! Proxy configuration options

/// Configuration shared by every proxy a [`ProxyFactory`](crate::ProxyFactory) creates
///
/// # Examples
///
/// ```
/// use pool_proxy::ProxyConfiguration;
///
/// let config = ProxyConfiguration::new()
///     .with_pool_name("orders")
///     .with_cascade_close(false)
///     .with_max_unwrap_depth(2);
///
/// assert_eq!(config.pool_name, "orders");
/// assert!(!config.cascade_close);
/// assert_eq!(config.max_unwrap_depth, 2);
/// ```
#[derive(Debug, Clone)]
pub struct ProxyConfiguration {
    /// Name attached to log events and metric exports
    pub pool_name: String,

    /// Whether closing an owner closes the children it still tracks
    pub cascade_close: bool,

    /// Whether children found open during a connection sweep are logged as leaks
    pub log_leaked_resources: bool,

    /// Maximum number of driver wrapper layers walked by `is_wrapper_for`/`unwrap`
    pub max_unwrap_depth: usize,
}

impl Default for ProxyConfiguration {
    fn default() -> Self {
        Self {
            pool_name: "pool".to_string(),
            cascade_close: true,
            log_leaked_resources: true,
            max_unwrap_depth: 8,
        }
    }
}

impl ProxyConfiguration {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pool name
    pub fn with_pool_name(mut self, name: impl Into<String>) -> Self {
        self.pool_name = name.into();
        self
    }

    /// Enable or disable closing of open children when their owner closes
    ///
    /// # Examples
    ///
    /// ```
    /// use pool_proxy::ProxyConfiguration;
    ///
    /// let config = ProxyConfiguration::new().with_cascade_close(false);
    /// assert!(!config.cascade_close);
    /// ```
    pub fn with_cascade_close(mut self, enabled: bool) -> Self {
        self.cascade_close = enabled;
        self
    }

    /// Enable or disable leak warnings
    pub fn with_leak_logging(mut self, enabled: bool) -> Self {
        self.log_leaked_resources = enabled;
        self
    }

    /// Set how many nested driver wrappers introspection may descend through
    pub fn with_max_unwrap_depth(mut self, depth: usize) -> Self {
        self.max_unwrap_depth = depth;
        self
    }
}
