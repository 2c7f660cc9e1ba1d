//! Owner-side bookkeeping of open child resources

use crate::errors::ProxyResult;
use crate::metrics::{increment, MetricsTracker};

use dashmap::DashMap;
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_RESOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u64);

impl ResourceId {
    /// Allocate a fresh identity
    pub fn next() -> Self {
        Self(NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Role of a proxied resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Connection,
    Statement,
    ResultSet,
}

impl ResourceKind {
    /// Name of the proxy type for this role, used in diagnostics
    pub fn proxy_name(self) -> &'static str {
        match self {
            ResourceKind::Connection => "ConnectionProxy",
            ResourceKind::Statement => "StatementProxy",
            ResourceKind::ResultSet => "ResultSetProxy",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Connection => write!(f, "connection"),
            ResourceKind::Statement => write!(f, "statement"),
            ResourceKind::ResultSet => write!(f, "result set"),
        }
    }
}

/// A proxy whose lifetime is tracked by an owner
pub trait TrackedResource: Send + Sync {
    fn resource_id(&self) -> ResourceId;

    fn kind(&self) -> ResourceKind;

    fn is_closed(&self) -> bool;

    /// Close the resource. Must be idempotent and safe to race with itself.
    fn close(&self) -> ProxyResult<()>;

    /// Point the resource at a new owner to unregister from when it closes
    fn reassign(&self, owner: &Arc<dyn Tracker>);
}

/// An owner that child proxies register with
///
/// Both operations must tolerate redundant calls: registering a child twice
/// keeps one entry, unregistering an absent child does nothing.
pub trait Tracker: Send + Sync {
    /// Identity of the owner itself
    fn owner_id(&self) -> ResourceId;

    fn register(&self, child: Arc<dyn TrackedResource>);

    fn unregister(&self, child: ResourceId);

    /// Upcast for recovering the concrete owner type
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// Concurrent set of open children, keyed by identity
///
/// Holds the strong reference to each open child so a proxy the application
/// dropped without closing stays reachable until an owner sweep closes it.
pub struct ChildTracker {
    owner: ResourceId,
    children: DashMap<ResourceId, Arc<dyn TrackedResource>>,
    metrics: Arc<MetricsTracker>,
    pool_name: Arc<str>,
    report_leaks: bool,
}

impl ChildTracker {
    pub(crate) fn new(
        owner: ResourceId,
        metrics: Arc<MetricsTracker>,
        pool_name: Arc<str>,
        report_leaks: bool,
    ) -> Self {
        Self {
            owner,
            children: DashMap::new(),
            metrics,
            pool_name,
            report_leaks,
        }
    }

    pub fn register(&self, child: Arc<dyn TrackedResource>) {
        self.children.insert(child.resource_id(), child);
    }

    /// Remove a child; returns whether it was present
    pub fn unregister(&self, child: ResourceId) -> bool {
        self.children.remove(&child).is_some()
    }

    pub fn contains(&self, child: ResourceId) -> bool {
        self.children.contains_key(&child)
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Identities of the currently registered children, in no particular order
    pub fn ids(&self) -> Vec<ResourceId> {
        self.children.iter().map(|entry| *entry.key()).collect()
    }

    /// Hand every registered child over to `owner`
    ///
    /// Used when the tracking proxy closes without closing its children, so
    /// they stay reachable from a tracker the pool sweeps. Returns how many
    /// children moved.
    pub fn transfer_to(&self, owner: &Arc<dyn Tracker>) -> usize {
        let snapshot: Vec<Arc<dyn TrackedResource>> = self
            .children
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        for child in &snapshot {
            let id = child.resource_id();
            child.reassign(owner);
            owner.register(Arc::clone(child));
            self.children.remove(&id);
            // It may have closed against the previous owner mid-transfer.
            if child.is_closed() {
                owner.unregister(id);
            }
        }
        snapshot.len()
    }

    /// Force-close every registered child
    ///
    /// Every child is attempted and removed even if some fail; the first
    /// failure is returned. Returns the number of children closed.
    pub fn close_all(&self) -> ProxyResult<usize> {
        let snapshot: Vec<Arc<dyn TrackedResource>> = self
            .children
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let mut first_error = None;
        let mut closed = 0;

        for child in snapshot {
            let id = child.resource_id();
            if self.report_leaks && !child.is_closed() {
                increment(&self.metrics.leaked_resources);
                tracing::warn!(
                    pool = %self.pool_name,
                    owner = %self.owner,
                    child = %id,
                    kind = %child.kind(),
                    "closing leaked {}",
                    child.kind()
                );
            }

            match child.close() {
                Ok(()) => closed += 1,
                Err(err) => {
                    tracing::debug!(owner = %self.owner, child = %id, error = %err, "forced close failed");
                    first_error.get_or_insert(err);
                }
            }
            self.children.remove(&id);
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(closed),
        }
    }
}

impl fmt::Debug for ChildTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildTracker")
            .field("owner", &self.owner)
            .field("children", &self.ids())
            .finish()
    }
}
