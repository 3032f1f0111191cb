//! Provides the tagged value used by late-bound calls.
//!
//! [`RawVariant`] is the native 16/24-byte `VARIANT`; [`Variant`] is its owned,
//! safe counterpart. Only the types this binding traffics in are supported;
//! anything else is a type mismatch.

use std::ffi::c_void;
use std::fmt;
use std::ptr::{self, NonNull};

use super::bstr::{self, Bstr};
use crate::com::{
    from_raw_borrowed, from_raw_owned, ComError, ComResult, IDispatch, IUnknown, Interface,
    DISP_E_PARAMNOTFOUND,
};

pub type VarType = u16;

pub const VT_EMPTY: VarType = 0;
pub const VT_NULL: VarType = 1;
pub const VT_I2: VarType = 2;
pub const VT_I4: VarType = 3;
pub const VT_R8: VarType = 5;
pub const VT_BSTR: VarType = 8;
pub const VT_DISPATCH: VarType = 9;
pub const VT_ERROR: VarType = 10;
pub const VT_BOOL: VarType = 11;
pub const VT_UNKNOWN: VarType = 13;
pub const VT_UI4: VarType = 19;
pub const VT_INT: VarType = 22;
pub const VT_BYREF: VarType = 0x4000;

pub const VARIANT_TRUE: i16 = -1;
pub const VARIANT_FALSE: i16 = 0;

/// Payload of a [`RawVariant`].
#[repr(C)]
#[derive(Clone, Copy)]
pub union VariantData {
    pub i4: i32,
    pub i2: i16,
    pub ui4: u32,
    pub r8: f64,
    pub bool_val: i16,
    pub scode: i32,
    pub bstr: *mut u16,
    pub dispatch: *mut c_void,
    pub unknown: *mut c_void,
    pub byref_i4: *mut i32,
    record: [usize; 2],
}

/// The native `VARIANT` layout.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawVariant {
    pub vt: VarType,
    pub reserved1: u16,
    pub reserved2: u16,
    pub reserved3: u16,
    pub data: VariantData,
}

impl RawVariant {
    pub const fn empty() -> Self {
        Self {
            vt: VT_EMPTY,
            reserved1: 0,
            reserved2: 0,
            reserved3: 0,
            data: VariantData { record: [0; 2] },
        }
    }

    pub const fn i4(value: i32) -> Self {
        let mut raw = Self::empty();
        raw.vt = VT_I4;
        raw.data = VariantData { i4: value };
        raw
    }

    /// Frees what the variant owns and resets it to `VT_EMPTY`.
    ///
    /// # Safety
    ///
    /// The variant must own its payload (string or interface reference).
    pub unsafe fn clear(&mut self) {
        match self.vt {
            VT_BSTR => drop(Bstr::from_raw(self.data.bstr)),
            VT_DISPATCH | VT_UNKNOWN => drop(from_raw_owned::<IUnknown>(self.data.unknown)),
            _ => {}
        }
        *self = Self::empty();
    }
}

impl Default for RawVariant {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for RawVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawVariant").field("vt", &self.vt).finish_non_exhaustive()
    }
}

/// An owned late-bound value.
#[derive(Debug, Clone, PartialEq)]
pub enum Variant {
    Empty,
    /// An optional argument the caller omitted (`VT_ERROR` carrying
    /// `DISP_E_PARAMNOTFOUND`).
    Missing,
    Null,
    Bool(bool),
    I4(i32),
    U4(u32),
    R8(f64),
    Str(String),
    Dispatch(Option<IDispatch>),
    Unknown(Option<IUnknown>),
    /// A by-reference 32-bit integer the callee writes through.
    I4Ref(NonNull<i32>),
}

impl Variant {
    /// Copies a borrowed native variant. Interface payloads gain a reference.
    ///
    /// # Safety
    ///
    /// `raw` must be a well-formed variant whose payload matches its tag.
    pub unsafe fn from_raw(raw: &RawVariant) -> ComResult<Self> {
        Ok(match raw.vt {
            VT_EMPTY => Variant::Empty,
            VT_NULL => Variant::Null,
            VT_I4 | VT_INT => Variant::I4(raw.data.i4),
            VT_I2 => Variant::I4(i32::from(raw.data.i2)),
            VT_UI4 => Variant::U4(raw.data.ui4),
            VT_R8 => Variant::R8(raw.data.r8),
            VT_BOOL => Variant::Bool(raw.data.bool_val != VARIANT_FALSE),
            VT_BSTR => Variant::Str(bstr::read(raw.data.bstr)),
            VT_DISPATCH => Variant::Dispatch(from_raw_borrowed(raw.data.dispatch)),
            VT_UNKNOWN => Variant::Unknown(from_raw_borrowed(raw.data.unknown)),
            VT_ERROR if raw.data.scode == DISP_E_PARAMNOTFOUND.0 => Variant::Missing,
            vt if vt == VT_BYREF | VT_I4 => {
                Variant::I4Ref(NonNull::new(raw.data.byref_i4).ok_or(ComError::PointerInvalid)?)
            }
            _ => return Err(ComError::TypeMismatch { index: 0 }),
        })
    }

    /// Converts an owned native variant, clearing it.
    ///
    /// # Safety
    ///
    /// `raw` must be a well-formed variant that owns its payload.
    pub unsafe fn take(raw: &mut RawVariant) -> ComResult<Self> {
        let value = Self::from_raw(raw);
        raw.clear();
        value
    }

    /// Moves the value into a native variant the receiver will own.
    pub fn into_raw(self) -> RawVariant {
        let mut raw = RawVariant::empty();
        match self {
            Variant::Empty => {}
            Variant::Missing => {
                raw.vt = VT_ERROR;
                raw.data.scode = DISP_E_PARAMNOTFOUND.0;
            }
            Variant::Null => raw.vt = VT_NULL,
            Variant::Bool(b) => {
                raw.vt = VT_BOOL;
                raw.data.bool_val = if b { VARIANT_TRUE } else { VARIANT_FALSE };
            }
            Variant::I4(v) => {
                raw.vt = VT_I4;
                raw.data.i4 = v;
            }
            Variant::U4(v) => {
                raw.vt = VT_UI4;
                raw.data.ui4 = v;
            }
            Variant::R8(v) => {
                raw.vt = VT_R8;
                raw.data.r8 = v;
            }
            Variant::Str(s) => {
                raw.vt = VT_BSTR;
                raw.data.bstr = Bstr::new(&s).into_raw();
            }
            Variant::Dispatch(p) => {
                raw.vt = VT_DISPATCH;
                raw.data.dispatch = p.map_or(ptr::null_mut(), Interface::into_raw);
            }
            Variant::Unknown(p) => {
                raw.vt = VT_UNKNOWN;
                raw.data.unknown = p.map_or(ptr::null_mut(), Interface::into_raw);
            }
            Variant::I4Ref(p) => {
                raw.vt = VT_BYREF | VT_I4;
                raw.data.byref_i4 = p.as_ptr();
            }
        }
        raw
    }

    /// Whether the caller supplied nothing for this position.
    pub fn is_missing(&self) -> bool {
        matches!(self, Variant::Empty | Variant::Missing)
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Variant::I4(v) => Some(*v),
            Variant::U4(v) => i32::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Variant::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_dispatch(&self) -> Option<&IDispatch> {
        match self {
            Variant::Dispatch(Some(p)) => Some(p),
            _ => None,
        }
    }
}

impl From<i32> for Variant {
    fn from(v: i32) -> Self {
        Variant::I4(v)
    }
}

impl From<bool> for Variant {
    fn from(v: bool) -> Self {
        Variant::Bool(v)
    }
}

impl From<&str> for Variant {
    fn from(v: &str) -> Self {
        Variant::Str(v.to_string())
    }
}

impl From<String> for Variant {
    fn from(v: String) -> Self {
        Variant::Str(v)
    }
}

impl From<Option<String>> for Variant {
    fn from(v: Option<String>) -> Self {
        v.map_or(Variant::Empty, Variant::Str)
    }
}

impl From<IDispatch> for Variant {
    fn from(p: IDispatch) -> Self {
        Variant::Dispatch(Some(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_variant_layout() {
        #[cfg(target_pointer_width = "64")]
        assert_eq!(std::mem::size_of::<RawVariant>(), 24);
        #[cfg(target_pointer_width = "32")]
        assert_eq!(std::mem::size_of::<RawVariant>(), 16);
        assert_eq!(std::mem::offset_of!(RawVariant, data), 8);
    }

    #[test]
    fn test_string_moves_through_raw() {
        let mut raw = Variant::from("Open").into_raw();
        assert_eq!(raw.vt, VT_BSTR);
        let back = unsafe { Variant::take(&mut raw) }.unwrap();
        assert_eq!(back, Variant::Str("Open".into()));
        assert_eq!(raw.vt, VT_EMPTY);
    }

    #[test]
    fn test_missing_argument_marker() {
        let raw = Variant::Missing.into_raw();
        assert_eq!(raw.vt, VT_ERROR);
        assert_eq!(unsafe { Variant::from_raw(&raw) }, Ok(Variant::Missing));
        assert!(Variant::Missing.is_missing());
    }

    #[test]
    fn test_other_error_codes_are_mismatches() {
        let mut raw = RawVariant::empty();
        raw.vt = VT_ERROR;
        raw.data.scode = 5;
        assert_eq!(
            unsafe { Variant::from_raw(&raw) },
            Err(ComError::TypeMismatch { index: 0 })
        );
    }

    #[test]
    fn test_unsupported_tag_is_mismatch() {
        let mut raw = RawVariant::empty();
        raw.vt = 0x2000 | VT_I4; // VT_ARRAY
        assert!(matches!(
            unsafe { Variant::from_raw(&raw) },
            Err(ComError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_byref_i4_writes_through() {
        let mut slot = 0;
        let raw = Variant::I4Ref(NonNull::from(&mut slot)).into_raw();
        if let Ok(Variant::I4Ref(p)) = unsafe { Variant::from_raw(&raw) } {
            unsafe { *p.as_ptr() = 42 };
        }
        assert_eq!(slot, 42);
    }
}
