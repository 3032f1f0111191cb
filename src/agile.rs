//! Provides [`AgileReference`], an owner of a native interface pointer that
//! may be used and released from any thread.
//!
//! Wrapping a pointer moves its reference into an apartment-neutral proxy
//! (`IAgileReference`). Every use goes through a scoped [`Checkout`] that
//! resolves a pointer valid for the current thread; disposal releases the
//! proxy exactly once, whichever thread gets there first.
//!
//! # Examples
//! ```
//! use std::sync::Arc;
//!
//! use comity::agile::AgileReference;
//! use comity::com::object::{self, ComObject, InterfaceEntry};
//! use comity::com::IUnknown;
//!
//! struct Document;
//!
//! impl ComObject for Document {
//!     fn interfaces(&self) -> Vec<InterfaceEntry> {
//!         Vec::new()
//!     }
//! }
//!
//! let document = Arc::new(Document);
//! let ptr: IUnknown = object::expose_as(document.clone()).unwrap();
//! let agile = AgileReference::new(&ptr).unwrap();
//! drop(ptr);
//!
//! let worker = std::thread::spawn(move || {
//!     assert!(agile.checkout().is_ok());
//!     assert!(agile.dispose());
//!     assert!(!agile.dispose());
//! });
//! worker.join().unwrap();
//! assert!(!object::is_exposed(&document));
//! ```

use std::ffi::c_void;
use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::com::object::{self, ComObject, InterfaceEntry};
use crate::com::{
    check, from_raw_owned, unknown_slots, ComError, ComInterface, ComResult, IAgileReference,
    IAgileReferenceVtbl, IUnknown, Implements, Interface, InterfaceExt, E_POINTER, GUID, HRESULT,
};

/// How the apartment-neutral proxy is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProxyStrategy {
    /// The operating system proxy where available, else [`FreeThreaded`].
    ///
    /// [`FreeThreaded`]: ProxyStrategy::FreeThreaded
    #[default]
    Auto,
    /// A portable proxy that re-queries the target on every resolve.
    FreeThreaded,
    /// The operating system proxy only; fails where there is none.
    Platform,
}

/// A thread-safe owner of one reference to a native interface pointer.
pub struct AgileReference<I: ComInterface> {
    proxy: AtomicPtr<c_void>,
    in_flight: AtomicUsize,
    depth: AtomicUsize,
    _marker: PhantomData<fn() -> I>,
}

impl<I: ComInterface> AgileReference<I> {
    /// Wraps a new reference to `ptr` using [`ProxyStrategy::Auto`].
    pub fn new(ptr: &I) -> ComResult<Self> {
        Self::with_strategy(ptr, ProxyStrategy::Auto)
    }

    pub fn with_strategy(ptr: &I, strategy: ProxyStrategy) -> ComResult<Self> {
        let target = ptr.identity()?;
        let proxy = make_proxy(target, I::IID, strategy)?;
        tracing::trace!(interface = I::NAME, ?strategy, "agile reference created");
        Ok(Self {
            proxy: AtomicPtr::new(proxy.into_raw()),
            in_flight: AtomicUsize::new(0),
            depth: AtomicUsize::new(0),
            _marker: PhantomData,
        })
    }

    /// Wraps `raw`, taking over the reference the caller owns.
    ///
    /// # Safety
    ///
    /// `raw` must be a live pointer to interface `I` carrying a reference
    /// that the caller gives away.
    pub unsafe fn from_raw(raw: *mut c_void) -> ComResult<Self> {
        let owned = from_raw_owned::<I>(raw).ok_or(ComError::PointerInvalid)?;
        Self::new(&owned)
    }

    /// Resolves a pointer usable on the calling thread for the current scope.
    ///
    /// Fails with [`ComError::ObjectDisposed`] once the reference is disposed.
    pub fn checkout(&self) -> ComResult<Checkout<'_, I>> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let resolved = self.resolve();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let ptr = resolved?;
        self.depth.fetch_add(1, Ordering::Relaxed);
        Ok(Checkout { owner: self, ptr })
    }

    fn resolve(&self) -> ComResult<I> {
        let proxy = self.proxy.load(Ordering::SeqCst);
        if proxy.is_null() {
            return Err(ComError::ObjectDisposed);
        }
        let mut out = ptr::null_mut();
        // SAFETY: the proxy stays alive while `in_flight` is non-zero.
        let proxy = unsafe { IAgileReference::from_raw_borrowed(&proxy) }
            .ok_or(ComError::PointerInvalid)?;
        check(unsafe { (proxy.vtable().Resolve)(proxy.as_raw(), &I::IID, &mut out) })?;
        // SAFETY: a successful resolve hands out a counted pointer.
        unsafe { from_raw_owned(out) }.ok_or(ComError::PointerInvalid)
    }

    /// Releases the proxy. Returns `false` if it was already released.
    pub fn dispose(&self) -> bool {
        let proxy = self.proxy.swap(ptr::null_mut(), Ordering::SeqCst);
        if proxy.is_null() {
            return false;
        }
        // A checkout that loaded the proxy before the swap is still resolving.
        while self.in_flight.load(Ordering::SeqCst) != 0 {
            std::hint::spin_loop();
        }
        // SAFETY: the swap above made this the only owner of the reference.
        drop(unsafe { IAgileReference::from_raw(proxy) });
        tracing::trace!(interface = I::NAME, "agile reference disposed");
        true
    }

    pub fn is_disposed(&self) -> bool {
        self.proxy.load(Ordering::SeqCst).is_null()
    }

    /// Number of checkouts currently alive.
    pub fn checkout_depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }
}

impl<I: ComInterface> Drop for AgileReference<I> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<I: ComInterface> fmt::Debug for AgileReference<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgileReference")
            .field("interface", &I::NAME)
            .field("disposed", &self.is_disposed())
            .field("depth", &self.checkout_depth())
            .finish()
    }
}

/// A pointer resolved for the current thread and scope.
///
/// Checkouts nest; each one must be dropped on the thread that made it.
pub struct Checkout<'a, I: ComInterface> {
    owner: &'a AgileReference<I>,
    ptr: I,
}

impl<I: ComInterface> Deref for Checkout<'_, I> {
    type Target = I;

    fn deref(&self) -> &I {
        &self.ptr
    }
}

impl<I: ComInterface> Drop for Checkout<'_, I> {
    fn drop(&mut self) {
        self.owner.depth.fetch_sub(1, Ordering::Relaxed);
    }
}

impl<I: ComInterface> fmt::Debug for Checkout<'_, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Checkout").field(&self.ptr.as_raw()).finish()
    }
}

fn make_proxy(
    target: IUnknown,
    iid: GUID,
    strategy: ProxyStrategy,
) -> ComResult<IAgileReference> {
    match strategy {
        ProxyStrategy::FreeThreaded => FreeThreadedProxy::wrap(target),
        ProxyStrategy::Platform => platform_proxy(&target, iid),
        ProxyStrategy::Auto => platform_proxy(&target, iid).or_else(|err| {
            tracing::debug!(error = %err, "falling back to the free-threaded proxy");
            FreeThreadedProxy::wrap(target)
        }),
    }
}

#[cfg(windows)]
fn platform_proxy(target: &IUnknown, iid: GUID) -> ComResult<IAgileReference> {
    crate::platform::agile_reference(target, iid)
}

#[cfg(not(windows))]
fn platform_proxy(_target: &IUnknown, _iid: GUID) -> ComResult<IAgileReference> {
    Err(ComError::NotImplemented)
}

/// A portable proxy holding the target's reference.
///
/// Resolving re-queries the target directly, which is sound for targets that
/// are free-threaded; apartment-bound targets need the platform proxy.
struct FreeThreadedProxy {
    target: IUnknown,
}

// SAFETY: the proxy only queries and releases the target, both of which are
// valid from any thread for the targets this proxy is used with.
unsafe impl Send for FreeThreadedProxy {}
unsafe impl Sync for FreeThreadedProxy {}

impl FreeThreadedProxy {
    fn wrap(target: IUnknown) -> ComResult<IAgileReference> {
        object::expose_as(Arc::new(Self { target }))
    }
}

impl ComObject for FreeThreadedProxy {
    fn interfaces(&self) -> Vec<InterfaceEntry> {
        vec![InterfaceEntry::of::<IAgileReference, Self>()]
    }
}

impl Implements<IAgileReference> for FreeThreadedProxy {
    fn vtable() -> IAgileReferenceVtbl {
        IAgileReferenceVtbl {
            base: unknown_slots(),
            Resolve: resolve_target,
        }
    }
}

unsafe extern "system" fn resolve_target(
    this: *mut c_void,
    riid: *const GUID,
    ppv: *mut *mut c_void,
) -> HRESULT {
    if ppv.is_null() {
        return E_POINTER;
    }
    *ppv = ptr::null_mut();
    com_method!(this, inner: FreeThreadedProxy => {
        Ok(inner.target.query(riid, ppv))
    })
}
