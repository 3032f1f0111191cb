//! Declares the native interfaces this crate speaks.
//!
//! Interface pointers are `windows-core` interface types: each wraps an
//! [`IUnknown`] and implements [`Interface`], so cloning adds a reference and
//! dropping releases one. [`ComInterface`] adds the slot descriptor used for
//! layout checks and diagnostics; declarations come from
//! [`define_interface!`](crate::define_interface).

use std::ffi::c_void;

use once_cell::sync::OnceCell;

pub use windows_core::{IUnknown, IUnknown_Vtbl, Interface};

use super::error::{ComError, ComResult};
use super::registry::{self, InterfaceDescriptor, SlotSignature};
use super::types::{E_NOINTERFACE, GUID, HRESULT};
use crate::dispatch::{DispParams, ExcepInfo, RawVariant};

/// A native interface whose slot layout is registered with a descriptor.
pub trait ComInterface: Interface + 'static {
    const NAME: &'static str;

    /// The registered descriptor of this interface.
    fn descriptor() -> &'static InterfaceDescriptor;
}

/// Typed queries and identity checks on any interface pointer.
///
/// # Examples
/// ```
/// use std::sync::Arc;
///
/// use comity::com::object::{self, ComObject, InterfaceEntry};
/// use comity::com::{ComError, IDispatch, IUnknown, Interface, InterfaceExt};
///
/// struct Empty;
/// impl ComObject for Empty {
///     fn interfaces(&self) -> Vec<InterfaceEntry> {
///         Vec::new()
///     }
/// }
///
/// let object = Arc::new(Empty);
/// let a: IUnknown = object::expose_as(object.clone()).unwrap();
/// let b = a.clone();
/// assert_eq!(object::ref_count(&object), Some(2));
/// assert!(a.same_object(&b));
/// assert_eq!(
///     a.query_interface::<IDispatch>().err(),
///     Some(ComError::NoInterface(IDispatch::IID))
/// );
/// ```
pub trait InterfaceExt: Interface {
    /// Calls `QueryInterface` for `J`. An unsupported interface is reported
    /// with `J`'s identifier.
    fn query_interface<J: Interface>(&self) -> ComResult<J> {
        self.cast::<J>().map_err(|err| match err.code() {
            E_NOINTERFACE => ComError::NoInterface(J::IID),
            code => ComError::from_hresult(code),
        })
    }

    /// The identity (`IUnknown`) pointer of the object.
    fn identity(&self) -> ComResult<IUnknown> {
        self.query_interface::<IUnknown>()
    }

    /// Whether both pointers reach the same object.
    fn same_object<J: Interface>(&self, other: &J) -> bool {
        match (self.identity(), other.identity()) {
            (Ok(a), Ok(b)) => a.as_raw() == b.as_raw(),
            _ => false,
        }
    }
}

impl<T: Interface> InterfaceExt for T {}

/// Takes ownership of one reference on `raw`; null yields `None`.
///
/// # Safety
///
/// A non-null `raw` must be a live pointer to interface `I` whose reference
/// the caller is giving away.
pub unsafe fn from_raw_owned<I: Interface>(raw: *mut c_void) -> Option<I> {
    (!raw.is_null()).then(|| I::from_raw(raw))
}

/// Adds a reference to a pointer the caller does not own; null yields `None`.
///
/// # Safety
///
/// A non-null `raw` must be a live pointer to interface `I`.
pub unsafe fn from_raw_borrowed<I: Interface>(raw: *mut c_void) -> Option<I> {
    I::from_raw_borrowed(&raw).cloned()
}

impl ComInterface for IUnknown {
    const NAME: &'static str = "IUnknown";

    fn descriptor() -> &'static InterfaceDescriptor {
        static DESCRIPTOR: OnceCell<&'static InterfaceDescriptor> = OnceCell::new();
        DESCRIPTOR.get_or_init(|| {
            registry::register(InterfaceDescriptor::root(
                Self::IID,
                Self::NAME,
                &[
                    SlotSignature::new(
                        "QueryInterface",
                        "unsafe extern \"system\" fn(*mut c_void, *const GUID, *mut *mut c_void) -> HRESULT",
                    ),
                    SlotSignature::new("AddRef", "unsafe extern \"system\" fn(*mut c_void) -> u32"),
                    SlotSignature::new("Release", "unsafe extern \"system\" fn(*mut c_void) -> u32"),
                ],
            ))
        })
    }
}

define_interface! {
    /// Marker meaning "usable from any thread without marshaling".
    pub interface IAgileObject: IUnknown {
        iid: 0x94ea2b94_e9cc_49e0_c0ff_ee64ca8f5b90,
        vtable: IAgileObjectVtbl,
        slots: {}
    }
}

define_interface! {
    /// Late-bound member lookup and invocation.
    pub interface IDispatch: IUnknown {
        iid: 0x00020400_0000_0000_c000_000000000046,
        vtable: IDispatchVtbl,
        slots: {
            GetTypeInfoCount: unsafe extern "system" fn(*mut c_void, *mut u32) -> HRESULT,
            GetTypeInfo: unsafe extern "system" fn(*mut c_void, u32, u32, *mut *mut c_void) -> HRESULT,
            GetIDsOfNames: unsafe extern "system" fn(
                *mut c_void,
                *const GUID,
                *const *const u16,
                u32,
                u32,
                *mut i32,
            ) -> HRESULT,
            Invoke: unsafe extern "system" fn(
                *mut c_void,
                i32,
                *const GUID,
                u32,
                u16,
                *mut DispParams,
                *mut RawVariant,
                *mut ExcepInfo,
                *mut u32,
            ) -> HRESULT,
        }
    }
}

define_interface! {
    /// The accessibility tree contract consumed by assistive technology.
    pub interface IAccessible: IDispatch {
        iid: 0x618736e0_3c3d_11cf_810c_00aa00389b71,
        vtable: IAccessibleVtbl,
        slots: {
            get_accParent: unsafe extern "system" fn(*mut c_void, *mut *mut c_void) -> HRESULT,
            get_accChildCount: unsafe extern "system" fn(*mut c_void, *mut i32) -> HRESULT,
            get_accChild: unsafe extern "system" fn(*mut c_void, RawVariant, *mut *mut c_void) -> HRESULT,
            get_accName: unsafe extern "system" fn(*mut c_void, RawVariant, *mut *mut u16) -> HRESULT,
            get_accValue: unsafe extern "system" fn(*mut c_void, RawVariant, *mut *mut u16) -> HRESULT,
            get_accDescription: unsafe extern "system" fn(*mut c_void, RawVariant, *mut *mut u16) -> HRESULT,
            get_accRole: unsafe extern "system" fn(*mut c_void, RawVariant, *mut RawVariant) -> HRESULT,
            get_accState: unsafe extern "system" fn(*mut c_void, RawVariant, *mut RawVariant) -> HRESULT,
            get_accHelp: unsafe extern "system" fn(*mut c_void, RawVariant, *mut *mut u16) -> HRESULT,
            get_accHelpTopic: unsafe extern "system" fn(*mut c_void, *mut *mut u16, RawVariant, *mut i32) -> HRESULT,
            get_accKeyboardShortcut: unsafe extern "system" fn(*mut c_void, RawVariant, *mut *mut u16) -> HRESULT,
            get_accFocus: unsafe extern "system" fn(*mut c_void, *mut RawVariant) -> HRESULT,
            get_accSelection: unsafe extern "system" fn(*mut c_void, *mut RawVariant) -> HRESULT,
            get_accDefaultAction: unsafe extern "system" fn(*mut c_void, RawVariant, *mut *mut u16) -> HRESULT,
            accSelect: unsafe extern "system" fn(*mut c_void, i32, RawVariant) -> HRESULT,
            accLocation: unsafe extern "system" fn(
                *mut c_void,
                *mut i32,
                *mut i32,
                *mut i32,
                *mut i32,
                RawVariant,
            ) -> HRESULT,
            accNavigate: unsafe extern "system" fn(*mut c_void, i32, RawVariant, *mut RawVariant) -> HRESULT,
            accHitTest: unsafe extern "system" fn(*mut c_void, i32, i32, *mut RawVariant) -> HRESULT,
            accDoDefaultAction: unsafe extern "system" fn(*mut c_void, RawVariant) -> HRESULT,
            put_accName: unsafe extern "system" fn(*mut c_void, RawVariant, *mut u16) -> HRESULT,
            put_accValue: unsafe extern "system" fn(*mut c_void, RawVariant, *mut u16) -> HRESULT,
        }
    }
}

define_interface! {
    /// A thread-neutral handle that re-resolves its target on any thread.
    pub interface IAgileReference: IUnknown {
        iid: 0xc03f6a43_65a4_9818_987e_e0b810d2a6f2,
        vtable: IAgileReferenceVtbl,
        slots: {
            Resolve: unsafe extern "system" fn(*mut c_void, *const GUID, *mut *mut c_void) -> HRESULT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::com::types::guid_string;
    use std::mem::size_of;

    fn assert_layout<I: ComInterface>() {
        assert_eq!(
            size_of::<I::Vtable>(),
            I::descriptor().slot_count() * size_of::<usize>(),
            "{} vtable size disagrees with its descriptor",
            I::NAME
        );
    }

    #[test]
    fn test_vtable_sizes_match_descriptors() {
        assert_layout::<IUnknown>();
        assert_layout::<IAgileObject>();
        assert_layout::<IDispatch>();
        assert_layout::<IAccessible>();
        assert_layout::<IAgileReference>();
    }

    #[test]
    fn test_well_known_identifiers() {
        assert_eq!(
            guid_string(&IAccessible::IID),
            "618736E0-3C3D-11CF-810C-00AA00389B71"
        );
        assert_eq!(
            guid_string(&IAgileObject::IID),
            "94EA2B94-E9CC-49E0-C0FF-EE64CA8F5B90"
        );
    }

    #[test]
    fn test_agile_object_has_no_own_slots() {
        assert_eq!(IAgileObject::descriptor().slot_count(), 3);
        assert!(IAgileObject::descriptor().inherits(&IUnknown::IID));
    }
}
