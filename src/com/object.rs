//! Exposes runtime objects to native callers.
//!
//! An exposed object is recorded once in a process-wide indirection table.
//! Native callers hold pointers to [`NativeHandle`]s, one per interface, which
//! carry the table key of their object and a pointer to the object's single
//! shared reference count. Resolving `this` goes through the table, so a
//! handle never points at the runtime object directly.
//!
//! Identity follows the usual native rule: querying any handle of an object
//! for `IUnknown` returns the same pointer. Exposing the same `Arc` twice while
//! it is alive reuses its entry and therefore its identity.
//!
//! # Examples
//! ```
//! use std::sync::Arc;
//!
//! use comity::com::object::{self, ComObject, InterfaceEntry};
//! use comity::com::{IAgileObject, IUnknown, InterfaceExt};
//!
//! struct Plain;
//!
//! impl ComObject for Plain {
//!     fn interfaces(&self) -> Vec<InterfaceEntry> {
//!         Vec::new()
//!     }
//! }
//!
//! let plain = Arc::new(Plain);
//! let unknown: IUnknown = object::expose_as(plain.clone()).unwrap();
//! assert!(object::is_exposed(&plain));
//! assert!(unknown.query_interface::<IAgileObject>().is_ok());
//! drop(unknown);
//! assert!(!object::is_exposed(&plain));
//! ```

use std::any::Any;
use std::ffi::c_void;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr::{self, NonNull};
use std::sync::atomic::{fence, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use parking_lot::Mutex;

use super::error::{ComError, ComResult};
use super::helpers::NativeHandle;
use super::interfaces::{ComInterface, IAgileObject, IUnknown, IUnknown_Vtbl, Interface};
use super::registry;
use super::types::*;
use super::vtable::{self, Implements};

/// Key of an object in the indirection table.
pub type ObjectKey = u64;

// ---------------------------------------------------------------------------
// Reference counting
// ---------------------------------------------------------------------------

/// The single reference count shared by every handle of one object.
#[derive(Debug)]
pub struct RefCount(AtomicU32);

impl RefCount {
    pub fn new(initial: u32) -> Self {
        Self(AtomicU32::new(initial))
    }

    pub fn get(&self) -> u32 {
        self.0.load(Ordering::Acquire)
    }

    /// Increments the count, returning the new value.
    pub fn add_ref(&self) -> u32 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Increments the count unless it already reached zero.
    pub fn try_add_ref(&self) -> bool {
        let mut current = self.0.load(Ordering::Relaxed);
        loop {
            if current == 0 {
                return false;
            }
            match self.0.compare_exchange_weak(
                current,
                current + 1,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Decrements the count, returning the new value.
    ///
    /// # Panics
    ///
    /// Panics when called on a zero count. An unbalanced `Release` is a
    /// protocol violation by the caller and the state cannot be trusted.
    pub fn release(&self) -> u32 {
        let previous = self.0.fetch_sub(1, Ordering::Release);
        assert!(previous != 0, "reference count underflow: unbalanced Release");
        if previous == 1 {
            fence(Ordering::Acquire);
        }
        previous - 1
    }
}

// ---------------------------------------------------------------------------
// ComObject
// ---------------------------------------------------------------------------

/// One interface an object answers for, with the vtable to hand out.
#[derive(Debug, Clone, Copy)]
pub struct InterfaceEntry {
    iid: GUID,
    vtable: *const c_void,
}

// SAFETY: vtables are leaked, immutable and contain only function pointers.
unsafe impl Send for InterfaceEntry {}
unsafe impl Sync for InterfaceEntry {}

impl InterfaceEntry {
    /// The entry for `T` implementing `I`.
    pub fn of<I: ComInterface, T: Implements<I>>() -> Self {
        Self {
            iid: I::IID,
            vtable: vtable::slot_table::<I, T>(),
        }
    }

    /// Answers `iid` with the bare `IUnknown` slots. Suitable for marker
    /// interfaces that add no methods.
    pub fn unknown(iid: GUID) -> Self {
        Self {
            iid,
            vtable: &UNKNOWN_VTBL as *const IUnknown_Vtbl as *const c_void,
        }
    }

    pub fn iid(&self) -> GUID {
        self.iid
    }
}

/// The shared lifetime slots every exposed vtable starts with.
pub const fn unknown_slots() -> IUnknown_Vtbl {
    IUnknown_Vtbl {
        QueryInterface: query_interface,
        AddRef: add_ref,
        Release: release,
    }
}

static UNKNOWN_VTBL: IUnknown_Vtbl = unknown_slots();

/// A runtime object that can be exposed to native callers.
///
/// `interfaces` lists what `QueryInterface` answers for, besides `IUnknown`
/// which every object supports. It is read once, when the object is first
/// exposed.
pub trait ComObject: Send + Sync + 'static {
    fn interfaces(&self) -> Vec<InterfaceEntry>;

    /// Called for identifiers not in [`ComObject::interfaces`]. The handle is
    /// created on the first hit and reused afterwards.
    ///
    /// Every object declares itself agile by default.
    fn query_interface_hook(&self, iid: &GUID) -> Option<InterfaceEntry> {
        (*iid == IAgileObject::IID).then(|| InterfaceEntry::unknown(*iid))
    }
}

// ---------------------------------------------------------------------------
// Indirection table
// ---------------------------------------------------------------------------

struct HandleSlot {
    iid: GUID,
    handle: NonNull<NativeHandle>,
}

// SAFETY: a handle is immutable after creation; its refcount is atomic.
unsafe impl Send for HandleSlot {}
unsafe impl Sync for HandleSlot {}

impl HandleSlot {
    fn new(key: ObjectKey, entry: InterfaceEntry, refs: &Arc<RefCount>) -> Self {
        let handle = Box::leak(Box::new(NativeHandle {
            vtbl: entry.vtable,
            key,
            iid: entry.iid,
            refs: Arc::clone(refs),
        }));
        Self {
            iid: entry.iid,
            handle: NonNull::from(handle),
        }
    }
}

struct ManagedObjectEntry {
    key: ObjectKey,
    identity: usize,
    instance: Arc<dyn ComObject>,
    any: Arc<dyn Any + Send + Sync>,
    refs: Arc<RefCount>,
    /// `IUnknown` first; it doubles as the identity pointer.
    handles: Vec<HandleSlot>,
    tear_offs: Mutex<Vec<HandleSlot>>,
}

impl ManagedObjectEntry {
    fn new<T: ComObject>(object: Arc<T>, identity: usize) -> Self {
        let key = NEXT_KEY.fetch_add(1, Ordering::Relaxed);
        let refs = Arc::new(RefCount::new(1));

        let mut handles = vec![HandleSlot::new(
            key,
            InterfaceEntry::unknown(IUnknown::IID),
            &refs,
        )];
        for entry in object.interfaces() {
            if handles.iter().any(|h| h.iid == entry.iid) {
                continue;
            }
            handles.push(HandleSlot::new(key, entry, &refs));
        }

        tracing::trace!(
            key,
            object = std::any::type_name::<T>(),
            interfaces = handles.len(),
            "object exposed"
        );

        Self {
            key,
            identity,
            instance: object.clone(),
            any: object,
            refs,
            handles,
            tear_offs: Mutex::new(Vec::new()),
        }
    }

    fn identity_handle(&self) -> NonNull<c_void> {
        self.handles[0].handle.cast()
    }

    /// Hands out a counted pointer for `iid`.
    fn query(&self, iid: &GUID) -> ComResult<NonNull<c_void>> {
        let found = self
            .handles
            .iter()
            .find(|h| h.iid == *iid)
            .map(|h| h.handle)
            .or_else(|| self.tear_off(iid));

        match found {
            Some(handle) => {
                self.refs.add_ref();
                Ok(handle.cast())
            }
            None => Err(ComError::NoInterface(*iid)),
        }
    }

    fn tear_off(&self, iid: &GUID) -> Option<NonNull<NativeHandle>> {
        let mut tear_offs = self.tear_offs.lock();
        if let Some(slot) = tear_offs.iter().find(|h| h.iid == *iid) {
            return Some(slot.handle);
        }
        let entry = self.instance.query_interface_hook(iid)?;
        let slot = HandleSlot::new(
            self.key,
            InterfaceEntry {
                iid: *iid,
                vtable: entry.vtable,
            },
            &self.refs,
        );
        let handle = slot.handle;
        tear_offs.push(slot);
        Some(handle)
    }
}

impl Drop for ManagedObjectEntry {
    fn drop(&mut self) {
        for slot in self.handles.iter().chain(self.tear_offs.get_mut().iter()) {
            // SAFETY: every handle was leaked from a Box by HandleSlot::new and
            // the count reached zero, so no caller may use it any more.
            unsafe { drop(Box::from_raw(slot.handle.as_ptr())) };
        }
    }
}

static OBJECTS: Lazy<DashMap<ObjectKey, Arc<ManagedObjectEntry>>> = Lazy::new(DashMap::new);
static IDENTITIES: Lazy<DashMap<usize, ObjectKey>> = Lazy::new(DashMap::new);
static NEXT_KEY: AtomicU64 = AtomicU64::new(1);

fn identity_of<T>(object: &Arc<T>) -> usize {
    Arc::as_ptr(object) as *const () as usize
}

fn lookup_entry(key: ObjectKey) -> Option<Arc<ManagedObjectEntry>> {
    OBJECTS.get(&key).map(|e| Arc::clone(e.value()))
}

/// The entry mapped to `identity`, with one reference added, unless it is
/// missing or already releasing.
fn live_entry(identity: usize) -> Option<Arc<ManagedObjectEntry>> {
    let key = *IDENTITIES.get(&identity)?;
    let entry = lookup_entry(key)?;
    entry.refs.try_add_ref().then_some(entry)
}

/// Finds the live entry of `object` or creates one. The returned entry holds
/// one reference on the caller's behalf.
///
/// No table guard is held while `ComObject::interfaces` runs or while an
/// entry is dropped: both can re-enter the tables.
fn entry_for<T: ComObject>(object: Arc<T>) -> Arc<ManagedObjectEntry> {
    let identity = identity_of(&object);
    if let Some(existing) = live_entry(identity) {
        return existing;
    }

    let fresh = Arc::new(ManagedObjectEntry::new(object, identity));
    let (entry, discarded) = {
        let mut mapping = IDENTITIES.entry(identity).or_insert(0);
        match lookup_entry(*mapping) {
            // Another thread exposed the same object first.
            Some(existing) if existing.refs.try_add_ref() => (existing, Some(fresh)),
            stale => {
                OBJECTS.insert(fresh.key, Arc::clone(&fresh));
                *mapping = fresh.key;
                (fresh, stale)
            }
        }
    };
    drop(discarded);
    entry
}

fn release_entry(entry: &ManagedObjectEntry) {
    if entry.refs.release() == 0 {
        teardown(entry.key);
    }
}

fn teardown(key: ObjectKey) {
    if let Some((_, entry)) = OBJECTS.remove(&key) {
        IDENTITIES.remove_if(&entry.identity, |_, mapped| *mapped == key);
        tracing::trace!(key, "object torn down");
    }
}

// ---------------------------------------------------------------------------
// Public surface
// ---------------------------------------------------------------------------

/// Exposes `object` and returns a counted native pointer for `iid`.
///
/// Fails with [`ComError::NoInterface`] when the object does not support
/// `iid`; a freshly created entry is torn down again in that case.
pub fn expose<T: ComObject>(object: Arc<T>, iid: &GUID) -> ComResult<NonNull<c_void>> {
    let entry = entry_for(object);
    let result = entry.query(iid);
    if result.is_err() {
        tracing::debug!(
            iid = ?iid,
            interface = registry::name_of(iid).unwrap_or("<unregistered>"),
            object = std::any::type_name::<T>(),
            "expose: interface not supported"
        );
    }
    release_entry(&entry);
    result
}

/// Exposes `object` as interface `I`.
pub fn expose_as<I: ComInterface, T: ComObject>(object: Arc<T>) -> ComResult<I> {
    let raw = expose(object, &I::IID)?;
    // SAFETY: `raw` is a counted pointer to a handle whose vtable implements I.
    Ok(unsafe { I::from_raw(raw.as_ptr()) })
}

/// Resolves a `this` pointer to the runtime object behind it.
///
/// # Safety
///
/// A non-null `this` must be a pointer previously handed out by this module
/// on which the caller still holds a reference.
pub unsafe fn resolve<T: ComObject>(this: *mut c_void) -> ComResult<Arc<T>> {
    let handle = NativeHandle::from_this(this)?;
    let entry = lookup_entry(handle.key).ok_or(ComError::ObjectDisposed)?;
    Arc::clone(&entry.any)
        .downcast::<T>()
        .map_err(|_| ComError::NoInterface(handle.iid))
}

/// The identity (`IUnknown`) pointer of an exposed object, uncounted.
pub fn identity_pointer<T: ComObject>(object: &Arc<T>) -> Option<NonNull<c_void>> {
    let key = *IDENTITIES.get(&identity_of(object))?;
    lookup_entry(key).map(|entry| entry.identity_handle())
}

/// Whether `object` currently has native references.
pub fn is_exposed<T: ComObject>(object: &Arc<T>) -> bool {
    IDENTITIES.contains_key(&identity_of(object))
}

/// The shared reference count of an exposed object.
pub fn ref_count<T: ComObject>(object: &Arc<T>) -> Option<u32> {
    let key = *IDENTITIES.get(&identity_of(object))?;
    lookup_entry(key).map(|entry| entry.refs.get())
}

/// Number of objects currently in the indirection table.
pub fn live_objects() -> usize {
    OBJECTS.len()
}

// ---------------------------------------------------------------------------
// IUnknown thunks
// ---------------------------------------------------------------------------

pub(crate) unsafe extern "system" fn query_interface(
    this: *mut c_void,
    riid: *const GUID,
    ppv: *mut *mut c_void,
) -> HRESULT {
    if ppv.is_null() {
        return E_POINTER;
    }
    *ppv = ptr::null_mut();
    if riid.is_null() {
        return E_INVALIDARG;
    }
    let handle = match NativeHandle::from_this(this) {
        Ok(handle) => handle,
        Err(err) => return err.code(),
    };
    let Some(entry) = lookup_entry(handle.key) else {
        return RO_E_CLOSED;
    };

    let iid = *riid;
    match catch_unwind(AssertUnwindSafe(|| entry.query(&iid))) {
        Ok(Ok(interface)) => {
            *ppv = interface.as_ptr();
            S_OK
        }
        Ok(Err(err)) => {
            tracing::debug!(
                iid = ?iid,
                interface = registry::name_of(&iid).unwrap_or("<unregistered>"),
                key = handle.key,
                "QueryInterface: not supported"
            );
            err.code()
        }
        Err(_) => {
            tracing::error!(key = handle.key, "panic caught in QueryInterface");
            E_UNEXPECTED
        }
    }
}

pub(crate) unsafe extern "system" fn add_ref(this: *mut c_void) -> u32 {
    match NativeHandle::from_this(this) {
        Ok(handle) => handle.refs.add_ref(),
        Err(_) => 0,
    }
}

pub(crate) unsafe extern "system" fn release(this: *mut c_void) -> u32 {
    let Ok(handle) = NativeHandle::from_this(this) else {
        return 0;
    };
    let key = handle.key;
    let remaining = handle.refs.release();
    if remaining == 0 {
        teardown(key);
    }
    remaining
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::com::InterfaceExt;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Weak;

    struct Counted(Arc<AtomicUsize>);

    impl Drop for Counted {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl ComObject for Counted {
        fn interfaces(&self) -> Vec<InterfaceEntry> {
            Vec::new()
        }
    }

    #[test]
    fn test_refcount_try_add_ref_fails_at_zero() {
        let refs = RefCount::new(1);
        assert!(refs.try_add_ref());
        assert_eq!(refs.release(), 1);
        assert_eq!(refs.release(), 0);
        assert!(!refs.try_add_ref());
    }

    #[test]
    #[should_panic(expected = "underflow")]
    fn test_refcount_underflow_fails_fast() {
        let refs = RefCount::new(0);
        refs.release();
    }

    #[test]
    fn test_reexposure_reuses_identity() {
        let drops = Arc::new(AtomicUsize::new(0));
        let object = Arc::new(Counted(drops.clone()));

        let first = expose(object.clone(), &IUnknown::IID).unwrap();
        let second = expose(object.clone(), &IUnknown::IID).unwrap();
        assert_eq!(first, second);
        assert_eq!(ref_count(&object), Some(2));

        unsafe {
            assert_eq!(release(first.as_ptr()), 1);
            assert_eq!(release(second.as_ptr()), 0);
        }
        assert!(!is_exposed(&object));
        drop(object);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsupported_expose_leaves_nothing_behind() {
        let object = Arc::new(Counted(Arc::new(AtomicUsize::new(0))));
        let iid = GUID::from_u128(0x1234);
        assert_eq!(
            expose(object.clone(), &iid).err(),
            Some(ComError::NoInterface(iid))
        );
        assert!(!is_exposed(&object));
    }

    #[test]
    fn test_resolve_after_teardown_is_disposed() {
        let object = Arc::new(Counted(Arc::new(AtomicUsize::new(0))));
        let raw = expose(object.clone(), &IUnknown::IID).unwrap();
        let key = unsafe { NativeHandle::from_this(raw.as_ptr()).unwrap().key };
        unsafe { release(raw.as_ptr()) };
        assert!(lookup_entry(key).is_none());
    }

    #[test]
    fn test_resolve_wrong_type_is_no_interface() {
        struct Other;
        impl ComObject for Other {
            fn interfaces(&self) -> Vec<InterfaceEntry> {
                Vec::new()
            }
        }

        let object = Arc::new(Counted(Arc::new(AtomicUsize::new(0))));
        let raw = expose(object, &IUnknown::IID).unwrap();
        let resolved = unsafe { resolve::<Other>(raw.as_ptr()) };
        assert!(matches!(resolved, Err(ComError::NoInterface(_))));
        unsafe { release(raw.as_ptr()) };
    }

    #[test]
    fn test_agile_marker_is_a_cached_tear_off() {
        let object = Arc::new(Counted(Arc::new(AtomicUsize::new(0))));
        let unknown: IUnknown = expose_as(object.clone()).unwrap();
        let a = unknown.query_interface::<IAgileObject>().unwrap();
        let b = unknown.query_interface::<IAgileObject>().unwrap();
        assert_eq!(a.as_raw(), b.as_raw());
        assert!(a.same_object(&unknown));
        assert_eq!(ref_count(&object), Some(3));
    }

    #[test]
    fn test_clone_and_drop_balance() {
        let object = Arc::new(Counted(Arc::new(AtomicUsize::new(0))));
        let unknown: IUnknown = expose_as(object.clone()).unwrap();
        {
            let _copies: Vec<_> = (0..3).map(|_| unknown.clone()).collect();
            assert_eq!(ref_count(&object), Some(4));
        }
        assert_eq!(ref_count(&object), Some(1));
        drop(unknown);
        assert_eq!(ref_count(&object), None);
    }

    #[test]
    fn test_into_raw_keeps_reference() {
        let object = Arc::new(Counted(Arc::new(AtomicUsize::new(0))));
        let raw = expose_as::<IUnknown, _>(object.clone()).unwrap().into_raw();
        assert_eq!(ref_count(&object), Some(1));
        drop(unsafe { IUnknown::from_raw(raw) });
        assert!(!is_exposed(&object));
    }

    /// Looks itself up and exposes a helper while its entry is being built.
    struct Reentrant {
        me: Weak<Reentrant>,
        seen_exposed: AtomicUsize,
    }

    impl ComObject for Reentrant {
        fn interfaces(&self) -> Vec<InterfaceEntry> {
            if let Some(me) = self.me.upgrade() {
                if is_exposed(&me) {
                    self.seen_exposed.fetch_add(1, Ordering::SeqCst);
                }
            }
            let helper = Arc::new(Counted(Arc::new(AtomicUsize::new(0))));
            let raw = expose(helper.clone(), &IUnknown::IID).unwrap();
            unsafe { release(raw.as_ptr()) };
            assert!(!is_exposed(&helper));
            Vec::new()
        }
    }

    #[test]
    fn test_interfaces_may_reenter_the_tables() {
        let object = Arc::new_cyclic(|me| Reentrant {
            me: me.clone(),
            seen_exposed: AtomicUsize::new(0),
        });
        let unknown: IUnknown = expose_as(object.clone()).unwrap();
        assert_eq!(object.seen_exposed.load(Ordering::SeqCst), 0);
        assert!(is_exposed(&object));
        drop(unknown);
        assert!(!is_exposed(&object));
    }

    #[test]
    fn test_concurrent_exposure_shares_one_identity() {
        let object = Arc::new(Counted(Arc::new(AtomicUsize::new(0))));
        let addrs: Vec<usize> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let object = object.clone();
                    s.spawn(move || expose(object, &IUnknown::IID).unwrap().as_ptr() as usize)
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(addrs.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(ref_count(&object), Some(8));
        for addr in addrs {
            unsafe { release(addr as *mut c_void) };
        }
        assert!(!is_exposed(&object));
    }
}
