//! Provides macros for reducing COM boilerplate.
//!
//! These macros handle the repetitive patterns of native interface code:
//! - Declaring an interface's vtable layout and descriptor from one slot list
//! - Resolving the `this` pointer of a thunk back to the runtime object
//! - Converting errors and panics into status codes at the boundary
//!
//! # Examples
//! ```
//! use std::ffi::c_void;
//!
//! use comity::com::{ComInterface, IUnknown, Interface, HRESULT};
//!
//! comity::define_interface! {
//!     /// A tiny interface with one slot.
//!     pub interface IPing: IUnknown {
//!         iid: 0x6d3a4a0e_8d5c_4f7e_9a35_5f1a2b3c4d5e,
//!         vtable: IPingVtbl,
//!         slots: {
//!             Ping: unsafe extern "system" fn(*mut c_void, *mut u32) -> HRESULT,
//!         }
//!     }
//! }
//!
//! assert_eq!(IPing::descriptor().slot_count(), 4);
//! assert_eq!(IPing::descriptor().slot_index("Ping"), Some(3));
//! assert_eq!(IPing::IID, comity::com::GUID::from_u128(0x6d3a4a0e_8d5c_4f7e_9a35_5f1a2b3c4d5e));
//! ```

/// Declares a native interface: a pointer type wrapping
/// [`IUnknown`](crate::com::IUnknown), its `#[repr(C)]` vtable, and its
/// [`Interface`](crate::com::Interface) and
/// [`ComInterface`](crate::com::ComInterface) implementations.
///
/// The vtable embeds the parent's vtable as its first field, so slots 0-2 are
/// always `QueryInterface`, `AddRef` and `Release`. The descriptor's slot list
/// is generated from the same declaration, which keeps the two in lockstep.
#[macro_export]
macro_rules! define_interface {
    (
        $(#[$meta:meta])*
        $vis:vis interface $name:ident : $parent:ty {
            iid: $iid:literal,
            vtable: $vtbl:ident,
            slots: {
                $($slot:ident : $sig:ty),* $(,)?
            }
        }
    ) => {
        $(#[$meta])*
        #[repr(transparent)]
        #[derive(Clone, PartialEq, Eq, Debug)]
        $vis struct $name($crate::__private::windows_core::IUnknown);

        #[doc = concat!("Native vtable layout of `", stringify!($name), "`.")]
        #[repr(C)]
        #[allow(non_snake_case)]
        $vis struct $vtbl {
            pub base: <$parent as $crate::__private::windows_core::Interface>::Vtable,
            $(pub $slot: $sig,)*
        }

        // SAFETY: the wrapped pointer is an interface pointer whose vtable is `$vtbl`.
        unsafe impl $crate::__private::windows_core::Interface for $name {
            type Vtable = $vtbl;
            const IID: $crate::com::GUID = $crate::com::GUID::from_u128($iid);
        }

        impl $crate::com::ComInterface for $name {
            const NAME: &'static str = stringify!($name);

            fn descriptor() -> &'static $crate::com::InterfaceDescriptor {
                static DESCRIPTOR: $crate::__private::OnceCell<
                    &'static $crate::com::InterfaceDescriptor,
                > = $crate::__private::OnceCell::new();
                DESCRIPTOR.get_or_init(|| {
                    $crate::com::registry::register($crate::com::InterfaceDescriptor::derived(
                        <Self as $crate::__private::windows_core::Interface>::IID,
                        stringify!($name),
                        <$parent as $crate::com::ComInterface>::descriptor(),
                        &[$($crate::com::SlotSignature::new(
                            stringify!($slot),
                            stringify!($sig),
                        ),)*],
                    ))
                })
            }
        }
    };
}

/// Executes a COM method body with automatic `this` resolution.
///
/// This macro handles the common pattern of:
/// 1. Validating the `this` pointer and resolving it through the object table
/// 2. Binding `&Arc<T>` for the runtime object
/// 3. Executing the body, which evaluates to `ComResult<HRESULT>`
///
/// Errors become their status code; `Ok(hr)` is returned as is, which lets a
/// body report `S_FALSE` ("no value") without treating it as a failure.
///
/// # Panics
///
/// Panics in the body are caught and converted to `E_UNEXPECTED`, so they do
/// not unwind across FFI boundaries.
#[macro_export]
macro_rules! com_method {
    ($this:expr, $inner:ident : $T:ty => $body:expr) => {{
        unsafe {
            match $crate::com::object::resolve::<$T>($this) {
                Err(err) => {
                    $crate::__private::tracing::debug!(error = %err, "could not resolve `this`");
                    err.code()
                }
                Ok(resolved) => {
                    let $inner: &::std::sync::Arc<$T> = &resolved;
                    // catch_unwind keeps panics on this side of the boundary.
                    match ::std::panic::catch_unwind(::std::panic::AssertUnwindSafe(
                        || -> $crate::com::ComResult<$crate::com::HRESULT> { $body },
                    )) {
                        Ok(Ok(hr)) => hr,
                        Ok(Err(err)) => {
                            $crate::__private::tracing::debug!(
                                error = %err,
                                code = %err.code(),
                                "native call failed"
                            );
                            err.code()
                        }
                        Err(_) => {
                            $crate::__private::tracing::error!(
                                object = ::std::any::type_name::<$T>(),
                                "panic caught at the native boundary"
                            );
                            $crate::com::E_UNEXPECTED
                        }
                    }
                }
            }
        }
    }};
}

/// Executes a COM method whose body evaluates to `ComResult<()>`.
///
/// Similar to `com_method!` but maps `Ok(())` to `S_OK`.
///
/// # Examples
///
/// ```ignore
/// unsafe extern "system" fn reset(this: *mut c_void) -> HRESULT {
///     com_method_result!(this, inner: Counter => {
///         inner.reset()?;
///         Ok(())
///     })
/// }
/// ```
#[macro_export]
macro_rules! com_method_result {
    ($this:expr, $inner:ident : $T:ty => $body:expr) => {
        $crate::com_method!($this, $inner: $T => {
            let result: $crate::com::ComResult<()> = (|| $body)();
            result.map(|()| $crate::com::S_OK)
        })
    };
}

// Re-export macros at module level
pub use crate::com_method;
pub use crate::com_method_result;
pub use crate::define_interface;
