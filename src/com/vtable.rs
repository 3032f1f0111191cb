//! Builds and caches one vtable per (implementing type, interface) pair.
//!
//! A vtable is constructed on first exposure of a type through an interface,
//! leaked, and shared by every later handle of that pair.

use std::any::TypeId;
use std::ffi::c_void;
use std::mem::size_of;

use dashmap::DashMap;
use once_cell::sync::Lazy;

use super::interfaces::{ComInterface, Interface};
use super::object::ComObject;
use super::types::GUID;

/// Implemented by runtime types that can be exposed through interface `I`.
pub trait Implements<I: ComInterface>: ComObject + Sized {
    /// Builds the vtable for `Self` as `I`. Called at most once per process
    /// for a successful registration.
    fn vtable() -> I::Vtable;
}

static TABLES: Lazy<DashMap<(TypeId, GUID), usize>> = Lazy::new(DashMap::new);

/// Returns the cached vtable of `T` as `I`, building it on first use.
pub fn slot_table<I: ComInterface, T: Implements<I>>() -> *const c_void {
    let key = (TypeId::of::<T>(), I::IID);
    if let Some(addr) = TABLES.get(&key) {
        return *addr as *const c_void;
    }

    debug_assert_eq!(
        size_of::<I::Vtable>(),
        I::descriptor().slot_count() * size_of::<usize>(),
        "vtable layout of {} disagrees with its descriptor",
        I::NAME
    );

    let vtbl = <T as Implements<I>>::vtable();
    let addr = *TABLES.entry(key).or_insert_with(|| {
        tracing::trace!(
            interface = I::NAME,
            object = std::any::type_name::<T>(),
            slots = I::descriptor().slot_count(),
            "built vtable"
        );
        Box::leak(Box::new(vtbl)) as *const I::Vtable as usize
    });
    addr as *const c_void
}

/// Number of vtables built so far.
pub fn built_tables() -> usize {
    TABLES.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::com::object::InterfaceEntry;
    use crate::com::{unknown_slots, IAgileReference, IAgileReferenceVtbl, E_NOTIMPL, HRESULT};

    struct Stub;

    unsafe extern "system" fn resolve(
        _this: *mut c_void,
        _riid: *const GUID,
        _ppv: *mut *mut c_void,
    ) -> HRESULT {
        E_NOTIMPL
    }

    impl ComObject for Stub {
        fn interfaces(&self) -> Vec<InterfaceEntry> {
            vec![InterfaceEntry::of::<IAgileReference, Self>()]
        }
    }

    impl Implements<IAgileReference> for Stub {
        fn vtable() -> IAgileReferenceVtbl {
            IAgileReferenceVtbl {
                base: unknown_slots(),
                Resolve: resolve,
            }
        }
    }

    #[test]
    fn test_vtable_is_shared_across_calls() {
        let a = slot_table::<IAgileReference, Stub>();
        let b = slot_table::<IAgileReference, Stub>();
        assert_eq!(a, b);
        assert!(built_tables() >= 1);
    }

    #[test]
    fn test_vtable_is_shared_across_threads() {
        let addrs: Vec<usize> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| s.spawn(|| slot_table::<IAgileReference, Stub>() as usize))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(addrs.windows(2).all(|w| w[0] == w[1]));
    }
}
