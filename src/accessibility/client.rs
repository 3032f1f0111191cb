//! Provides [`AccessibleClient`], which drives an `IAccessible` pointer
//! through its vtable the way an assistive tool does.

use std::ptr;

use super::types::{AccessibleTarget, NavDirection, Role, SelectionFlags, States};
use crate::com::{
    check, from_raw_owned, ComError, ComResult, IAccessible, IDispatch, Interface, InterfaceExt,
    HRESULT, S_FALSE,
};
use crate::dispatch::{Bstr, RawVariant, Variant};
use crate::window::Rect;

/// A typed caller of a native `IAccessible` pointer.
#[derive(Debug, Clone)]
pub struct AccessibleClient {
    ptr: IAccessible,
}

type StringSlot =
    unsafe extern "system" fn(*mut std::ffi::c_void, RawVariant, *mut *mut u16) -> HRESULT;

impl AccessibleClient {
    pub fn new(ptr: IAccessible) -> Self {
        Self { ptr }
    }

    /// Queries `object` for `IAccessible`.
    pub fn from_dispatch(object: &IDispatch) -> ComResult<Self> {
        Ok(Self::new(object.query_interface::<IAccessible>()?))
    }

    pub fn as_ptr(&self) -> &IAccessible {
        &self.ptr
    }

    fn string(&self, slot: StringSlot, child: i32) -> ComResult<Option<String>> {
        let mut out = ptr::null_mut();
        // SAFETY: the slot belongs to this pointer's vtable; `out` is ours.
        let hr = unsafe { slot(self.ptr.as_raw(), RawVariant::i4(child), &mut out) };
        check(hr)?;
        // SAFETY: on success the callee handed us ownership of the string.
        Ok(unsafe { Bstr::from_raw(out) }.map(|s| s.to_string()))
    }

    pub fn name(&self, child: i32) -> ComResult<Option<String>> {
        self.string(self.ptr.vtable().get_accName, child)
    }

    pub fn value(&self, child: i32) -> ComResult<Option<String>> {
        self.string(self.ptr.vtable().get_accValue, child)
    }

    pub fn description(&self, child: i32) -> ComResult<Option<String>> {
        self.string(self.ptr.vtable().get_accDescription, child)
    }

    pub fn keyboard_shortcut(&self, child: i32) -> ComResult<Option<String>> {
        self.string(self.ptr.vtable().get_accKeyboardShortcut, child)
    }

    pub fn default_action(&self, child: i32) -> ComResult<Option<String>> {
        self.string(self.ptr.vtable().get_accDefaultAction, child)
    }

    fn variant_i32(&self, value: Variant) -> ComResult<i32> {
        value.as_i32().ok_or(ComError::TypeMismatch { index: 0 })
    }

    pub fn role(&self, child: i32) -> ComResult<Role> {
        let mut out = RawVariant::empty();
        // SAFETY: see `string`.
        check(unsafe {
            (self.ptr.vtable().get_accRole)(self.ptr.as_raw(), RawVariant::i4(child), &mut out)
        })?;
        // SAFETY: the callee filled `out` and we own it.
        let value = unsafe { Variant::take(&mut out) }?;
        Ok(Role(self.variant_i32(value)? as u32))
    }

    pub fn state(&self, child: i32) -> ComResult<States> {
        let mut out = RawVariant::empty();
        // SAFETY: see `string`.
        check(unsafe {
            (self.ptr.vtable().get_accState)(self.ptr.as_raw(), RawVariant::i4(child), &mut out)
        })?;
        // SAFETY: the callee filled `out` and we own it.
        let value = unsafe { Variant::take(&mut out) }?;
        Ok(States(self.variant_i32(value)? as u32))
    }

    pub fn child_count(&self) -> ComResult<i32> {
        let mut count = 0;
        // SAFETY: see `string`.
        check(unsafe { (self.ptr.vtable().get_accChildCount)(self.ptr.as_raw(), &mut count) })?;
        Ok(count)
    }

    /// The accessible object of child `id`; `None` for simple children.
    pub fn child(&self, id: i32) -> ComResult<Option<IDispatch>> {
        let mut out = ptr::null_mut();
        // SAFETY: see `string`.
        check(unsafe {
            (self.ptr.vtable().get_accChild)(self.ptr.as_raw(), RawVariant::i4(id), &mut out)
        })?;
        // SAFETY: a non-null result carries a reference we now own.
        Ok(unsafe { from_raw_owned(out) })
    }

    pub fn parent(&self) -> ComResult<Option<IDispatch>> {
        let mut out = ptr::null_mut();
        // SAFETY: see `string`.
        check(unsafe { (self.ptr.vtable().get_accParent)(self.ptr.as_raw(), &mut out) })?;
        // SAFETY: a non-null result carries a reference we now own.
        Ok(unsafe { from_raw_owned(out) })
    }

    /// Left, top, width and height of child `id`.
    pub fn location(&self, child: i32) -> ComResult<Rect> {
        let (mut left, mut top, mut width, mut height) = (0, 0, 0, 0);
        // SAFETY: see `string`.
        check(unsafe {
            (self.ptr.vtable().accLocation)(
                self.ptr.as_raw(),
                &mut left,
                &mut top,
                &mut width,
                &mut height,
                RawVariant::i4(child),
            )
        })?;
        Ok(Rect::new(left, top, left + width, top + height))
    }

    fn target(&self, hr: HRESULT, mut out: RawVariant) -> ComResult<AccessibleTarget> {
        check(hr)?;
        // SAFETY: the callee filled `out` and we own it.
        let value = unsafe { Variant::take(&mut out) }?;
        if hr == S_FALSE {
            return Ok(AccessibleTarget::Nothing);
        }
        AccessibleTarget::from_variant(value)
    }

    pub fn navigate(&self, direction: NavDirection, start: i32) -> ComResult<AccessibleTarget> {
        let mut out = RawVariant::empty();
        // SAFETY: see `string`.
        let hr = unsafe {
            (self.ptr.vtable().accNavigate)(
                self.ptr.as_raw(),
                direction as i32,
                RawVariant::i4(start),
                &mut out,
            )
        };
        self.target(hr, out)
    }

    pub fn hit_test(&self, x: i32, y: i32) -> ComResult<AccessibleTarget> {
        let mut out = RawVariant::empty();
        // SAFETY: see `string`.
        let hr = unsafe { (self.ptr.vtable().accHitTest)(self.ptr.as_raw(), x, y, &mut out) };
        self.target(hr, out)
    }

    pub fn focus(&self) -> ComResult<AccessibleTarget> {
        let mut out = RawVariant::empty();
        // SAFETY: see `string`.
        let hr = unsafe { (self.ptr.vtable().get_accFocus)(self.ptr.as_raw(), &mut out) };
        self.target(hr, out)
    }

    pub fn select(&self, flags: SelectionFlags, child: i32) -> ComResult<()> {
        // SAFETY: see `string`.
        check(unsafe {
            (self.ptr.vtable().accSelect)(self.ptr.as_raw(), flags.0, RawVariant::i4(child))
        })
        .map(drop)
    }

    pub fn do_default_action(&self, child: i32) -> ComResult<()> {
        // SAFETY: see `string`.
        check(unsafe {
            (self.ptr.vtable().accDoDefaultAction)(self.ptr.as_raw(), RawVariant::i4(child))
        })
        .map(drop)
    }

    pub fn set_name(&self, child: i32, name: &str) -> ComResult<()> {
        let name = Bstr::new(name);
        // SAFETY: see `string`; the string stays ours.
        check(unsafe {
            (self.ptr.vtable().put_accName)(self.ptr.as_raw(), RawVariant::i4(child), name.as_ptr())
        })
        .map(drop)
    }
}
