//! Provides [`Bstr`], the length-prefixed UTF-16 string of the native ABI.
//!
//! A BSTR pointer addresses the first character; the 32-bit byte length sits
//! immediately before it and a nul terminator follows the data. On Windows
//! strings come from the system allocator and are released through
//! `windows_core::BSTR`, so any native caller may free them; elsewhere an
//! equivalent layout is built on the heap.
//!
//! # Examples
//! ```
//! use comity::dispatch::Bstr;
//!
//! let name = Bstr::new("Title bar");
//! assert_eq!(name.len(), 9);
//! let raw = name.into_raw();
//! assert_eq!(unsafe { comity::dispatch::bstr::read(raw) }, "Title bar");
//! drop(unsafe { Bstr::from_raw(raw) });
//! ```

use std::fmt;
use std::ptr::NonNull;

/// An owned BSTR.
pub struct Bstr(NonNull<u16>);

// SAFETY: a BSTR is a plain heap buffer with no thread affinity.
unsafe impl Send for Bstr {}
unsafe impl Sync for Bstr {}

impl Bstr {
    /// Allocates a BSTR holding `text`.
    pub fn new(text: &str) -> Self {
        let wide: Vec<u16> = text.encode_utf16().collect();
        Self::from_wide(&wide)
    }

    pub fn from_wide(wide: &[u16]) -> Self {
        Self(heap::alloc(wide))
    }

    /// Takes ownership of a BSTR allocated by the native allocator.
    ///
    /// # Safety
    ///
    /// A non-null `raw` must be a BSTR the caller owns.
    pub unsafe fn from_raw(raw: *mut u16) -> Option<Self> {
        NonNull::new(raw).map(Self)
    }

    pub fn as_ptr(&self) -> *mut u16 {
        self.0.as_ptr()
    }

    /// Gives up ownership; the caller must eventually free the string.
    pub fn into_raw(self) -> *mut u16 {
        let raw = self.0.as_ptr();
        std::mem::forget(self);
        raw
    }

    /// Length in UTF-16 code units.
    pub fn len(&self) -> usize {
        // SAFETY: `self` owns a live BSTR.
        unsafe { byte_len(self.0.as_ptr()) as usize / 2 }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_wide(&self) -> &[u16] {
        // SAFETY: the prefix describes exactly the initialized characters.
        unsafe { std::slice::from_raw_parts(self.0.as_ptr(), self.len()) }
    }
}

impl Drop for Bstr {
    fn drop(&mut self) {
        // SAFETY: we own the allocation.
        unsafe { heap::free(self.0.as_ptr()) }
    }
}

impl fmt::Display for Bstr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf16_lossy(self.as_wide()))
    }
}

impl fmt::Debug for Bstr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_string())
    }
}

impl From<&str> for Bstr {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

/// Reads the byte-length prefix of a BSTR.
unsafe fn byte_len(raw: *const u16) -> u32 {
    *(raw as *const u32).sub(1)
}

/// Copies a borrowed BSTR into a `String`. A null BSTR is the empty string.
///
/// # Safety
///
/// A non-null `raw` must be a live BSTR.
pub unsafe fn read(raw: *const u16) -> String {
    if raw.is_null() {
        return String::new();
    }
    let units = byte_len(raw) as usize / 2;
    String::from_utf16_lossy(std::slice::from_raw_parts(raw, units))
}

#[cfg(windows)]
mod heap {
    use std::ptr::NonNull;

    use windows::Win32::Foundation::SysAllocStringLen;
    use windows_core::BSTR;

    pub(super) fn alloc(wide: &[u16]) -> NonNull<u16> {
        // `Some` keeps an empty string non-null.
        // SAFETY: `wide` is a valid buffer for the copy.
        let text = unsafe { SysAllocStringLen(Some(wide)) };
        match NonNull::new(text.into_raw() as *mut u16) {
            Some(raw) => raw,
            None => std::alloc::handle_alloc_error(std::alloc::Layout::new::<u32>()),
        }
    }

    pub(super) unsafe fn free(raw: *mut u16) {
        drop(BSTR::from_raw(raw));
    }
}

#[cfg(not(windows))]
mod heap {
    use std::ptr::{self, NonNull};

    /// Words needed for the prefix, `bytes` of text and the terminator.
    fn words_for(bytes: usize) -> usize {
        1 + (bytes + 2 + 3) / 4
    }

    pub(super) fn alloc(wide: &[u16]) -> NonNull<u16> {
        let bytes = wide.len() * 2;
        let mut buf = vec![0u32; words_for(bytes)].into_boxed_slice();
        buf[0] = bytes as u32;
        let base = Box::into_raw(buf) as *mut u32;
        // SAFETY: the buffer holds the prefix word plus room for the text and
        // a zeroed terminator.
        unsafe {
            let chars = base.add(1) as *mut u16;
            ptr::copy_nonoverlapping(wide.as_ptr(), chars, wide.len());
            NonNull::new_unchecked(chars)
        }
    }

    pub(super) unsafe fn free(raw: *mut u16) {
        let base = (raw as *mut u32).sub(1);
        let words = words_for(*base as usize);
        drop(Box::from_raw(ptr::slice_from_raw_parts_mut(base, words)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_bstr_is_not_null() {
        let empty = Bstr::new("");
        assert!(!empty.as_ptr().is_null());
        assert!(empty.is_empty());
        assert_eq!(unsafe { *empty.as_ptr() }, 0);
    }

    #[test]
    fn test_prefix_counts_bytes() {
        let text = Bstr::new("Größe");
        assert_eq!(unsafe { byte_len(text.as_ptr()) }, 10);
        assert_eq!(text.to_string(), "Größe");
    }

    #[test]
    fn test_surrogate_pairs_survive() {
        let text = Bstr::new("a\u{1F600}b");
        assert_eq!(text.len(), 4);
        assert_eq!(unsafe { read(text.as_ptr()) }, "a\u{1F600}b");
    }

    #[test]
    fn test_null_reads_as_empty() {
        assert_eq!(unsafe { read(std::ptr::null()) }, "");
    }

    #[cfg(windows)]
    #[test]
    fn test_system_allocator_owns_the_string() {
        let raw = Bstr::new("Menu bar").into_raw();
        // SAFETY: `raw` came from the system allocator and is handed over.
        let native = unsafe { windows_core::BSTR::from_raw(raw) };
        assert_eq!(native.len(), 8);
        assert_eq!(native.to_string(), "Menu bar");
    }
}
