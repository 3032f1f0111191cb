//! Provides the two primitive types of the native ABI and the status codes
//! this crate reports.
//!
//! [`GUID`] and [`HRESULT`] are the `windows-core` definitions, so pointers and
//! codes pass to and from the `windows` crate without conversion.
//!
//! # Examples
//! ```
//! use comity::com::{E_NOINTERFACE, GUID, HRESULT, S_FALSE};
//!
//! let iid = GUID::from_u128(0x00000000_0000_0000_c000_000000000046);
//! assert_eq!(format!("{iid:?}"), "00000000-0000-0000-C000-000000000046");
//! assert!(S_FALSE.is_ok());
//! assert!(E_NOINTERFACE.is_err());
//! assert_eq!(HRESULT(0x8000_4002_u32 as i32), E_NOINTERFACE);
//! ```

use serde::Serializer;

pub use windows_core::{GUID, HRESULT};

/// Formats an identifier in registry form, e.g. `00020400-0000-0000-C000-000000000046`.
pub fn guid_string(iid: &GUID) -> String {
    format!("{iid:?}")
}

/// Serializes an identifier as its registry-form string.
pub(crate) fn serialize_guid<S: Serializer>(iid: &GUID, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&format_args!("{iid:?}"))
}

pub const S_OK: HRESULT = HRESULT(0);
pub const S_FALSE: HRESULT = HRESULT(1);

pub const E_NOTIMPL: HRESULT = HRESULT(0x8000_4001_u32 as i32);
pub const E_NOINTERFACE: HRESULT = HRESULT(0x8000_4002_u32 as i32);
pub const E_POINTER: HRESULT = HRESULT(0x8000_4003_u32 as i32);
pub const E_FAIL: HRESULT = HRESULT(0x8000_4005_u32 as i32);
pub const E_UNEXPECTED: HRESULT = HRESULT(0x8000_FFFF_u32 as i32);
pub const E_OUTOFMEMORY: HRESULT = HRESULT(0x8007_000E_u32 as i32);
pub const E_INVALIDARG: HRESULT = HRESULT(0x8007_0057_u32 as i32);
/// The object has been closed (disposed).
pub const RO_E_CLOSED: HRESULT = HRESULT(0x8000_0013_u32 as i32);

pub const DISP_E_UNKNOWNINTERFACE: HRESULT = HRESULT(0x8002_0001_u32 as i32);
pub const DISP_E_MEMBERNOTFOUND: HRESULT = HRESULT(0x8002_0003_u32 as i32);
pub const DISP_E_PARAMNOTFOUND: HRESULT = HRESULT(0x8002_0004_u32 as i32);
pub const DISP_E_TYPEMISMATCH: HRESULT = HRESULT(0x8002_0005_u32 as i32);
pub const DISP_E_UNKNOWNNAME: HRESULT = HRESULT(0x8002_0006_u32 as i32);
pub const DISP_E_EXCEPTION: HRESULT = HRESULT(0x8002_0009_u32 as i32);
pub const DISP_E_BADINDEX: HRESULT = HRESULT(0x8002_000B_u32 as i32);
pub const DISP_E_BADPARAMCOUNT: HRESULT = HRESULT(0x8002_000E_u32 as i32);
pub const TYPE_E_LIBNOTREGISTERED: HRESULT = HRESULT(0x8002_801D_u32 as i32);
