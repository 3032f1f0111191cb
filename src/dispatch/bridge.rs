//! Provides the `IDispatch` thunks for every [`Dispatchable`] type.
//!
//! The bridge only translates: names and arguments in, member table lookup,
//! value or status code out. Failures raised inside a member are reported as
//! `DISP_E_EXCEPTION` with the real code in the exception block, while
//! protocol failures (unknown member, bad arguments) keep their own code and
//! the offending argument index.

use std::ffi::c_void;
use std::ptr;
use std::slice;
use std::sync::Arc;

use super::args::{Arguments, DispParams, ExcepInfo};
use super::table::{table_for, DispId, Dispatchable, InvokeKind, DISPID_UNKNOWN};
use super::variant::{RawVariant, Variant};
use crate::com::helpers::read_wide;
use crate::com::{
    unknown_slots, ComError, ComResult, IDispatch, IDispatchVtbl, Implements, Interface,
    DISP_E_BADINDEX, DISP_E_EXCEPTION, DISP_E_UNKNOWNINTERFACE, DISP_E_UNKNOWNNAME, E_POINTER,
    GUID, HRESULT, S_OK,
};

impl IDispatchVtbl {
    /// The dispatch slots of `T`.
    pub fn new<T: Dispatchable>() -> Self {
        Self {
            base: unknown_slots(),
            GetTypeInfoCount: get_type_info_count::<T>,
            GetTypeInfo: get_type_info::<T>,
            GetIDsOfNames: get_ids_of_names::<T>,
            Invoke: invoke::<T>,
        }
    }
}

impl<T: Dispatchable> Implements<IDispatch> for T {
    fn vtable() -> IDispatchVtbl {
        IDispatchVtbl::new::<T>()
    }
}

/// Only `IID_NULL` is a valid interface argument for `GetIDsOfNames`/`Invoke`.
unsafe fn reserved_iid_ok(riid: *const GUID) -> bool {
    riid.is_null() || *riid == GUID::zeroed()
}

unsafe extern "system" fn get_type_info_count<T: Dispatchable>(
    this: *mut c_void,
    count: *mut u32,
) -> HRESULT {
    if count.is_null() {
        return E_POINTER;
    }
    *count = 0;
    com_method!(this, inner: T => {
        *count = u32::from(inner.has_type_info());
        Ok(S_OK)
    })
}

unsafe extern "system" fn get_type_info<T: Dispatchable>(
    this: *mut c_void,
    index: u32,
    _lcid: u32,
    info: *mut *mut c_void,
) -> HRESULT {
    if info.is_null() {
        return E_POINTER;
    }
    *info = ptr::null_mut();
    com_method!(this, inner: T => {
        if index != 0 {
            return Err(ComError::NativeFailure(DISP_E_BADINDEX));
        }
        if !inner.has_type_info() {
            return Err(ComError::LibraryNotRegistered);
        }
        *info = inner.type_info()?.into_raw();
        Ok(S_OK)
    })
}

unsafe extern "system" fn get_ids_of_names<T: Dispatchable>(
    this: *mut c_void,
    riid: *const GUID,
    names: *const *const u16,
    count: u32,
    _lcid: u32,
    ids: *mut DispId,
) -> HRESULT {
    if names.is_null() || ids.is_null() {
        return E_POINTER;
    }
    if !reserved_iid_ok(riid) {
        return DISP_E_UNKNOWNINTERFACE;
    }
    com_method!(this, _inner: T => {
        let out = slice::from_raw_parts_mut(ids, count as usize);
        out.fill(DISPID_UNKNOWN);

        let names: Vec<String> = slice::from_raw_parts(names, count as usize)
            .iter()
            .map(|&name| read_wide(name))
            .collect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();

        let resolved = table_for::<T>().ids_of_names(&names)?;
        out.copy_from_slice(&resolved);
        if resolved.contains(&DISPID_UNKNOWN) {
            tracing::debug!(names = ?names, "GetIDsOfNames: unknown parameter name");
            return Ok(DISP_E_UNKNOWNNAME);
        }
        Ok(S_OK)
    })
}

#[allow(clippy::too_many_arguments)]
unsafe extern "system" fn invoke<T: Dispatchable>(
    this: *mut c_void,
    id: DispId,
    riid: *const GUID,
    _lcid: u32,
    flags: u16,
    params: *mut DispParams,
    result: *mut RawVariant,
    excep_info: *mut ExcepInfo,
    arg_err: *mut u32,
) -> HRESULT {
    if params.is_null() {
        return E_POINTER;
    }
    if !reserved_iid_ok(riid) {
        return DISP_E_UNKNOWNINTERFACE;
    }
    com_method!(this, inner: T => {
        match invoke_member(inner, id, InvokeKind(flags), &*params) {
            Ok(value) => {
                if !result.is_null() {
                    *result = value.into_raw();
                }
                Ok(S_OK)
            }
            Err(err) => Ok(report_failure::<T>(err, arg_err, excep_info)),
        }
    })
}

unsafe fn invoke_member<T: Dispatchable>(
    target: &Arc<T>,
    id: DispId,
    kind: InvokeKind,
    params: &DispParams,
) -> ComResult<Variant> {
    let table = table_for::<T>();
    let member = table.member(id).ok_or(ComError::MemberNotFound(id))?;
    let args = Arguments::from_params(params, member.params().len())?;
    table.invoke(target, id, kind, &args)
}

unsafe fn report_failure<T>(
    err: ComError,
    arg_err: *mut u32,
    excep_info: *mut ExcepInfo,
) -> HRESULT {
    tracing::debug!(error = %err, object = std::any::type_name::<T>(), "Invoke failed");
    if let Some(index) = err.argument_index() {
        if !arg_err.is_null() {
            *arg_err = index;
        }
    }
    if err.is_dispatch_protocol() || excep_info.is_null() {
        return err.code();
    }
    (*excep_info).fill(std::any::type_name::<T>(), &err);
    DISP_E_EXCEPTION
}
