//! Delegation base shared by all proxy variants
//!
//! A [`Delegate`] owns the native handle of one proxy. The closed state is a
//! flag kept apart from the lock around the native value, so checking it,
//! closing the proxy and its bookkeeping never wait on a driver call that is
//! still running. Forwarded calls fail with [`ProxyError::ResourceClosed`]
//! once the flag is set, and otherwise run against the native value and pass
//! its result straight back.

use crate::driver::{AsAny, NativeResource, Wrapper};
use crate::errors::{DriverResult, ProxyError, ProxyResult};
use crate::tracker::ResourceKind;

use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};
use std::any::{type_name, Any};
use std::sync::atomic::{AtomicBool, Ordering};

pub(crate) struct Delegate<D: ?Sized> {
    closed: AtomicBool,
    slot: Mutex<Option<Box<D>>>,
    kind: ResourceKind,
}

impl<D: NativeResource + ?Sized> Delegate<D> {
    pub fn new(native: Box<D>, kind: ResourceKind) -> Self {
        Self {
            closed: AtomicBool::new(false),
            slot: Mutex::new(Some(native)),
            kind,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Whether a driver call (or an `unwrap` guard) holds the native value
    pub fn is_busy(&self) -> bool {
        self.slot.is_locked()
    }

    /// Run `op` against the native handle
    pub fn forward<R>(&self, op: impl FnOnce(&mut D) -> DriverResult<R>) -> ProxyResult<R> {
        if self.is_closed() {
            return Err(ProxyError::ResourceClosed(self.kind));
        }
        let mut slot = self.slot.lock();
        let native = slot.as_deref_mut().ok_or(ProxyError::ResourceClosed(self.kind))?;
        Ok(op(native)?)
    }

    /// Close the native handle exactly once
    ///
    /// The call that flips the closed flag runs `before_native_close` without
    /// holding the native lock, then waits for any in-flight driver call to
    /// return and releases the native value. The value is released even when
    /// its close fails. Returns `Ok(false)` when already closed.
    pub fn close(&self, before_native_close: impl FnOnce()) -> ProxyResult<bool> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(false);
        }

        before_native_close();
        let native = self.slot.lock().take();
        if let Some(mut native) = native {
            native.close()?;
        }
        Ok(true)
    }

    pub fn is_wrapper_for<T: Any>(&self, max_depth: usize) -> ProxyResult<bool> {
        if self.is_closed() {
            return Err(ProxyError::ResourceClosed(self.kind));
        }
        let slot = self.slot.lock();
        let native = slot.as_deref().ok_or(ProxyError::ResourceClosed(self.kind))?;
        Ok(wraps::<T, D>(native, max_depth))
    }

    /// Borrow the native value (or a nested driver layer) as a `T`
    ///
    /// The proxy stays locked for as long as the returned guard lives.
    pub fn unwrap<T: Any>(&self, max_depth: usize) -> ProxyResult<MappedMutexGuard<'_, T>> {
        let slot = self.slot.lock();
        if self.is_closed() || slot.is_none() {
            return Err(ProxyError::ResourceClosed(self.kind));
        }

        MutexGuard::try_map(slot, |slot| {
            slot.as_deref_mut()
                .and_then(|native| unwrap_layer::<T, D>(native, max_depth))
        })
        .map_err(|_| ProxyError::NotAWrapper {
            proxy: self.kind.proxy_name(),
            target: type_name::<T>(),
        })
    }
}

/// Whether `layer`, or one of at most `remaining` layers beneath it, is a `T`
pub(crate) fn wraps<T: Any, W: Wrapper + ?Sized>(layer: &W, remaining: usize) -> bool {
    if <W as AsAny>::as_any(layer).is::<T>() {
        return true;
    }
    remaining > 0
        && layer
            .wrapped()
            .is_some_and(|inner| wraps::<T, dyn Wrapper>(inner, remaining - 1))
}

/// The first layer, descending at most `remaining` hops, that is a `T`
pub(crate) fn unwrap_layer<T: Any, W: Wrapper + ?Sized>(layer: &mut W, remaining: usize) -> Option<&mut T> {
    if <W as AsAny>::as_any(layer).is::<T>() {
        return <W as AsAny>::as_any_mut(layer).downcast_mut::<T>();
    }
    if remaining == 0 {
        return None;
    }
    unwrap_layer::<T, dyn Wrapper>(layer.wrapped_mut()?, remaining - 1)
}
