//! Error types for pooled resource proxies

use crate::tracker::ResourceKind;
use thiserror::Error;

/// Error raised by the underlying driver
///
/// Proxies never inspect or rewrite these; they reach the caller as
/// [`ProxyError::DelegateFailure`] exactly as the driver produced them.
///
/// # Examples
///
/// ```
/// use pool_proxy::DriverError;
///
/// let err = DriverError::new("connection reset").with_sql_state("08006");
/// assert_eq!(err.to_string(), "connection reset");
/// assert_eq!(err.sql_state.as_deref(), Some("08006"));
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct DriverError {
    /// Driver supplied message
    pub message: String,

    /// Five character SQLSTATE, when the driver reports one
    pub sql_state: Option<String>,

    /// Vendor specific error code
    pub vendor_code: i32,
}

impl DriverError {
    /// Create a driver error with only a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            sql_state: None,
            vendor_code: 0,
        }
    }

    /// Attach a SQLSTATE
    pub fn with_sql_state(mut self, state: impl Into<String>) -> Self {
        self.sql_state = Some(state.into());
        self
    }

    /// Attach a vendor error code
    pub fn with_vendor_code(mut self, code: i32) -> Self {
        self.vendor_code = code;
        self
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProxyError {
    #[error("{0} has already been closed")]
    ResourceClosed(ResourceKind),

    #[error("{proxy} is not a wrapper for {target}")]
    NotAWrapper {
        proxy: &'static str,
        target: &'static str,
    },

    #[error(transparent)]
    DelegateFailure(#[from] DriverError),
}

impl ProxyError {
    /// The driver error behind this failure, if the driver raised it
    pub fn driver_error(&self) -> Option<&DriverError> {
        match self {
            ProxyError::DelegateFailure(err) => Some(err),
            _ => None,
        }
    }
}

pub type ProxyResult<T> = Result<T, ProxyError>;

pub type DriverResult<T> = Result<T, DriverError>;
