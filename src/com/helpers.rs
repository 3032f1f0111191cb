//! Provides COM helper types and traits for panic-free native implementations.
//!
//! This module holds the small pieces every thunk leans on: the native handle
//! layout that callers receive as an interface pointer, poison-tolerant mutex
//! access and reading of nul-terminated wide strings.
//!
//! # Examples
//! ```
//! use std::sync::Mutex;
//!
//! use comity::com::helpers::MutexExt;
//!
//! let mutex = Mutex::new(1u32);
//! let guard = mutex.lock_or_fail().expect("lock should succeed");
//! assert_eq!(*guard, 1);
//! ```

use std::ffi::c_void;
use std::sync::{Arc, Mutex, MutexGuard};

use super::error::{ComError, ComResult};
use super::object::{ObjectKey, RefCount};
use super::types::{GUID, E_FAIL};

/// Provides panic-free `Mutex` access in COM contexts.
///
/// A poisoned mutex inside a thunk would otherwise turn into a panic at the
/// native boundary. This trait returns an error instead.
///
/// # Examples
/// ```
/// use std::sync::Mutex;
///
/// use comity::com::helpers::MutexExt;
///
/// let mutex = Mutex::new("value");
/// let guard = mutex.lock_or_fail().expect("lock should succeed");
/// assert_eq!(*guard, "value");
/// ```
pub trait MutexExt<T> {
    /// Locks the mutex, returning `E_FAIL` if poisoned instead of panicking.
    fn lock_or_fail(&self) -> ComResult<MutexGuard<'_, T>>;
}

impl<T> MutexExt<T> for Mutex<T> {
    fn lock_or_fail(&self) -> ComResult<MutexGuard<'_, T>> {
        self.lock().map_err(|_| ComError::NativeFailure(E_FAIL))
    }
}

/// Represents the native handle of one interface of an exposed object.
///
/// Per the COM binary contract, the first field must be a pointer to the
/// vtable. Native code receives a pointer to this structure as the interface
/// pointer and never sees the fields behind the vtable slot.
///
/// Layout:
/// ```text
/// +0:  vtbl pointer -> points to a leaked, per-type vtable
/// +8:  key          -> indirection-table key of the owning object
/// +16: iid          -> interface this handle answers for
/// +32: refs         -> the object's shared reference count
/// ```
#[repr(C)]
pub struct NativeHandle {
    /// Pointer to the vtable for this interface.
    pub vtbl: *const c_void,
    /// Key of the owning object in the indirection table.
    pub key: ObjectKey,
    /// Interface this handle was handed out for.
    pub iid: GUID,
    /// Shared by every handle of the same object.
    pub refs: Arc<RefCount>,
}

impl NativeHandle {
    /// Reinterprets a `this` pointer as a handle.
    ///
    /// # Safety
    ///
    /// A non-null `this` must point to a live `NativeHandle`.
    pub unsafe fn from_this<'a>(this: *mut c_void) -> ComResult<&'a NativeHandle> {
        (this as *const NativeHandle)
            .as_ref()
            .ok_or(ComError::PointerInvalid)
    }
}

/// Reads a nul-terminated UTF-16 string, replacing invalid sequences.
///
/// A null pointer reads as the empty string.
///
/// # Safety
///
/// A non-null `ptr` must point to a nul-terminated UTF-16 buffer.
///
/// # Examples
/// ```
/// use comity::com::helpers::read_wide;
///
/// let wide: Vec<u16> = "varChild\0".encode_utf16().collect();
/// assert_eq!(unsafe { read_wide(wide.as_ptr()) }, "varChild");
/// assert_eq!(unsafe { read_wide(std::ptr::null()) }, "");
/// ```
pub unsafe fn read_wide(ptr: *const u16) -> String {
    if ptr.is_null() {
        return String::new();
    }
    let mut len = 0;
    while *ptr.add(len) != 0 {
        len += 1;
    }
    String::from_utf16_lossy(std::slice::from_raw_parts(ptr, len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_mutex_ext_success() {
        let mutex = Mutex::new(42);
        let guard = mutex.lock_or_fail();
        assert!(guard.is_ok());
        assert_eq!(*guard.unwrap(), 42);
    }

    #[test]
    fn test_mutex_ext_poisoned_is_e_fail() {
        let mutex = Arc::new(Mutex::new(0));
        let poisoner = Arc::clone(&mutex);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison");
        })
        .join();
        assert_eq!(
            mutex.lock_or_fail().err(),
            Some(ComError::NativeFailure(E_FAIL))
        );
    }

    #[test]
    fn test_native_handle_starts_with_vtable() {
        assert_eq!(std::mem::offset_of!(NativeHandle, vtbl), 0);
    }

    #[test]
    fn test_from_this_rejects_null() {
        let result = unsafe { NativeHandle::from_this(std::ptr::null_mut()) };
        assert_eq!(result.err(), Some(ComError::PointerInvalid));
    }
}
