//! Provides the native object binding layer.
//!
//! This module exposes runtime objects to native callers through vtables,
//! resolves native `this` pointers back to runtime objects, and converts
//! errors and panics into status codes at the boundary.
//!
//! # Overview
//!
//! - [`types`] - `GUID`, `HRESULT` and the status codes in use
//! - [`registry`] - Interface descriptors (identifier plus slot layout)
//! - [`object`] - The indirection table, shared reference counts and `IUnknown`
//! - [`interfaces`] - Interface pointer types and [`InterfaceExt`]
//! - [`define_interface!`] - Macro declaring an interface and its vtable
//! - [`com_method!`] - Macro for thunk implementations
//!
//! # Examples
//! ```
//! use std::sync::Mutex;
//!
//! use comity::com::MutexExt;
//!
//! let mutex = Mutex::new(7u32);
//! let guard = mutex.lock_or_fail().expect("lock should succeed");
//! assert_eq!(*guard, 7);
//! ```

#[macro_use]
pub mod macros;

pub mod error;
pub mod helpers;
pub mod interfaces;
pub mod object;
pub mod registry;
pub mod types;
pub mod vtable;

// Re-export commonly used items
pub use error::{check, ComError, ComResult};
pub use helpers::{MutexExt, NativeHandle};
pub use interfaces::{
    from_raw_borrowed, from_raw_owned, ComInterface, IAccessible, IAccessibleVtbl, IAgileObject,
    IAgileObjectVtbl, IAgileReference, IAgileReferenceVtbl, IDispatch, IDispatchVtbl, IUnknown,
    IUnknown_Vtbl, Interface, InterfaceExt,
};
pub use object::{unknown_slots, ComObject, InterfaceEntry};
pub use registry::{InterfaceDescriptor, SlotSignature};
pub use types::*;
pub use vtable::Implements;
