//! Provides [`DispatchClient`], the calling side of late-bound dispatch.
//!
//! The client packs arguments the way native callers do (reversed, named
//! first) and unpacks failures back into [`ComError`]s, so runtime code can
//! drive any `IDispatch` pointer, exposed by this crate or not.

use std::ptr;

use super::args::{DispParams, ExcepInfo};
use super::table::{DispId, InvokeKind, DISPID_PROPERTYPUT, DISPID_UNKNOWN};
use super::variant::{RawVariant, Variant};
use crate::com::{
    ComError, ComResult, IDispatch, Interface, DISP_E_EXCEPTION, GUID, HRESULT,
    DISP_E_MEMBERNOTFOUND, DISP_E_PARAMNOTFOUND, DISP_E_TYPEMISMATCH, DISP_E_UNKNOWNNAME,
};

/// Calls members of an `IDispatch` pointer.
#[derive(Debug, Clone)]
pub struct DispatchClient {
    ptr: IDispatch,
}

impl DispatchClient {
    pub fn new(ptr: IDispatch) -> Self {
        Self { ptr }
    }

    pub fn as_ptr(&self) -> &IDispatch {
        &self.ptr
    }

    /// Resolves a member name and its parameter names.
    ///
    /// Unknown parameter names come back as [`DISPID_UNKNOWN`]; only an
    /// unknown member name is an error.
    pub fn ids_of_names(&self, names: &[&str]) -> ComResult<Vec<DispId>> {
        let (hr, ids) = self.raw_ids_of_names(names);
        match ids.first() {
            Some(&id) if id != DISPID_UNKNOWN => Ok(ids),
            _ if hr == DISP_E_UNKNOWNNAME || hr.is_ok() => Err(ComError::UnknownName(
                names.first().map(|n| n.to_string()).unwrap_or_default(),
            )),
            _ => Err(ComError::from_hresult(hr)),
        }
    }

    /// Calls `GetIDsOfNames` and returns the raw status with the ids.
    pub fn raw_ids_of_names(&self, names: &[&str]) -> (HRESULT, Vec<DispId>) {
        let wide: Vec<Vec<u16>> = names
            .iter()
            .map(|n| n.encode_utf16().chain(Some(0)).collect())
            .collect();
        let pointers: Vec<*const u16> = wide.iter().map(|w| w.as_ptr()).collect();
        let mut ids = vec![DISPID_UNKNOWN; names.len()];
        // SAFETY: every buffer outlives the call and `ids` has one slot per name.
        let hr = unsafe {
            (self.ptr.vtable().GetIDsOfNames)(
                self.ptr.as_raw(),
                &GUID::zeroed(),
                pointers.as_ptr(),
                names.len() as u32,
                0,
                ids.as_mut_ptr(),
            )
        };
        (hr, ids)
    }

    /// Reads property `id`.
    pub fn get(&self, id: DispId, args: &[Variant]) -> ComResult<Variant> {
        self.invoke_raw(id, InvokeKind::PROPERTY_GET, args, &[])
    }

    /// Writes property `id`, tagging `value` as the property-put argument.
    pub fn put(&self, id: DispId, args: &[Variant], value: Variant) -> ComResult<()> {
        self.invoke_raw(id, InvokeKind::PROPERTY_PUT, args, &[(DISPID_PROPERTYPUT, value)])
            .map(drop)
    }

    /// Calls method `id`.
    pub fn call(&self, id: DispId, args: &[Variant]) -> ComResult<Variant> {
        self.invoke_raw(id, InvokeKind::METHOD, args, &[])
    }

    /// Invokes `id` with positional arguments in declaration order and named
    /// arguments as `(id, value)` pairs.
    pub fn invoke_raw(
        &self,
        id: DispId,
        kind: InvokeKind,
        positional: &[Variant],
        named: &[(DispId, Variant)],
    ) -> ComResult<Variant> {
        let mut raw: Vec<RawVariant> = named
            .iter()
            .map(|(_, v)| v.clone().into_raw())
            .chain(positional.iter().rev().map(|v| v.clone().into_raw()))
            .collect();
        let mut named_ids: Vec<DispId> = named.iter().map(|(id, _)| *id).collect();
        let mut params = DispParams {
            args: if raw.is_empty() { ptr::null_mut() } else { raw.as_mut_ptr() },
            named_args: if named_ids.is_empty() {
                ptr::null_mut()
            } else {
                named_ids.as_mut_ptr()
            },
            arg_count: raw.len() as u32,
            named_count: named_ids.len() as u32,
        };
        let mut result = RawVariant::empty();
        let mut excep_info = ExcepInfo::default();
        let mut arg_err = 0u32;

        // SAFETY: every buffer outlives the call; the out blocks are owned here.
        let hr = unsafe {
            (self.ptr.vtable().Invoke)(
                self.ptr.as_raw(),
                id,
                &GUID::zeroed(),
                0,
                kind.0,
                &mut params,
                &mut result,
                &mut excep_info,
                &mut arg_err,
            )
        };

        for value in &mut raw {
            // SAFETY: each variant was produced by `into_raw` above.
            unsafe { value.clear() };
        }

        let outcome = if hr.is_ok() {
            // SAFETY: on success the callee handed us ownership of the result.
            unsafe { Variant::take(&mut result) }
        } else {
            Err(match hr {
                DISP_E_EXCEPTION => ComError::from_hresult(HRESULT(excep_info.scode)),
                DISP_E_PARAMNOTFOUND => ComError::ParameterNotFound { index: arg_err },
                DISP_E_TYPEMISMATCH => ComError::TypeMismatch { index: arg_err },
                DISP_E_MEMBERNOTFOUND => ComError::MemberNotFound(id),
                other => ComError::from_hresult(other),
            })
        };
        // SAFETY: the exception block is null-initialized or filled by the callee.
        unsafe { excep_info.clear() };
        outcome
    }
}
