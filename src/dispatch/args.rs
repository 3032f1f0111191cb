//! Provides the native argument block of `Invoke` and its decoded form.
//!
//! Native callers pass arguments in reverse order, with named arguments
//! first. [`Arguments`] undoes that: position 0 is the first declared
//! parameter, and the property-put value is kept apart from the rest.

use std::ptr::{self, NonNull};
use std::slice;

use super::bstr::Bstr;
use super::table::{DispId, DISPID_PROPERTYPUT};
use super::variant::{RawVariant, Variant};
use crate::com::{ComError, ComResult};

/// The native `DISPPARAMS` block.
#[repr(C)]
#[derive(Debug)]
pub struct DispParams {
    /// Arguments, named ones first, positional ones in reverse order.
    pub args: *mut RawVariant,
    pub named_args: *mut DispId,
    pub arg_count: u32,
    pub named_count: u32,
}

impl DispParams {
    pub const fn empty() -> Self {
        Self {
            args: ptr::null_mut(),
            named_args: ptr::null_mut(),
            arg_count: 0,
            named_count: 0,
        }
    }
}

/// The native `EXCEPINFO` block describing a failure raised by a member.
#[repr(C)]
#[derive(Debug)]
pub struct ExcepInfo {
    pub code: u16,
    pub reserved: u16,
    pub source: *mut u16,
    pub description: *mut u16,
    pub help_file: *mut u16,
    pub help_context: u32,
    pub reserved_ptr: *mut std::ffi::c_void,
    pub deferred_fill_in: Option<unsafe extern "system" fn(*mut ExcepInfo) -> i32>,
    pub scode: i32,
}

impl Default for ExcepInfo {
    fn default() -> Self {
        Self {
            code: 0,
            reserved: 0,
            source: ptr::null_mut(),
            description: ptr::null_mut(),
            help_file: ptr::null_mut(),
            help_context: 0,
            reserved_ptr: ptr::null_mut(),
            deferred_fill_in: None,
            scode: 0,
        }
    }
}

impl ExcepInfo {
    /// Describes `err` raised from `source`.
    pub(crate) fn fill(&mut self, source: &str, err: &ComError) {
        *self = Self {
            source: Bstr::new(source).into_raw(),
            description: Bstr::new(&err.to_string()).into_raw(),
            scode: err.code().0,
            ..Self::default()
        };
    }

    pub fn description(&self) -> Option<String> {
        // SAFETY: the description is null or a BSTR this block owns.
        (!self.description.is_null()).then(|| unsafe { super::bstr::read(self.description) })
    }

    /// Frees the strings the block owns.
    ///
    /// # Safety
    ///
    /// The string fields must be null or BSTRs owned by this block.
    pub unsafe fn clear(&mut self) {
        for field in [&mut self.source, &mut self.description, &mut self.help_file] {
            drop(Bstr::from_raw(*field));
            *field = ptr::null_mut();
        }
    }
}

/// Decoded arguments of one invocation.
#[derive(Debug, Clone, Default)]
pub struct Arguments {
    values: Vec<Option<Variant>>,
    /// Index into the native argument array for each position.
    origins: Vec<Option<u32>>,
    put_value: Option<(Variant, u32)>,
}

impl Arguments {
    /// Arguments in declaration order, as a runtime caller would supply them.
    pub fn new(values: Vec<Variant>) -> Self {
        let origins = (0..values.len() as u32).map(Some).collect();
        Self {
            values: values.into_iter().map(Some).collect(),
            origins,
            put_value: None,
        }
    }

    /// Attaches the value of a property put.
    pub fn with_put_value(mut self, value: Variant) -> Self {
        self.put_value = Some((value, 0));
        self
    }

    /// Decodes a native argument block.
    ///
    /// Named arguments address parameters by position; `params` is the number
    /// of parameters the member declares.
    ///
    /// # Safety
    ///
    /// `params` must describe valid arrays of the stated lengths.
    pub(crate) unsafe fn from_params(params: &DispParams, declared: usize) -> ComResult<Self> {
        let total = params.arg_count as usize;
        let named = params.named_count as usize;
        if named > total {
            return Err(ComError::BadParamCount);
        }
        if (total > 0 && params.args.is_null()) || (named > 0 && params.named_args.is_null()) {
            return Err(ComError::PointerInvalid);
        }

        let raw_args: &[RawVariant] = if total == 0 {
            &[]
        } else {
            slice::from_raw_parts(params.args, total)
        };
        let named_ids: &[DispId] = if named == 0 {
            &[]
        } else {
            slice::from_raw_parts(params.named_args, named)
        };

        let mut decoded = Self::default();
        let decode = |index: usize| {
            Variant::from_raw(&raw_args[index]).map_err(|e| e.at_argument(index as u32))
        };

        for position in 0..total - named {
            let origin = total - 1 - position;
            decoded.set(position, decode(origin)?, origin as u32)?;
        }

        for (origin, id) in named_ids.iter().enumerate() {
            let value = decode(origin)?;
            if *id == DISPID_PROPERTYPUT {
                decoded.put_value = Some((value, origin as u32));
                continue;
            }
            let position = usize::try_from(*id)
                .ok()
                .filter(|p| *p < declared)
                .ok_or(ComError::ParameterNotFound { index: origin as u32 })?;
            decoded.set(position, value, origin as u32)?;
        }

        Ok(decoded)
    }

    fn set(&mut self, position: usize, value: Variant, origin: u32) -> ComResult<()> {
        if self.values.len() <= position {
            self.values.resize(position + 1, None);
            self.origins.resize(position + 1, None);
        }
        if self.values[position].is_some() {
            return Err(ComError::ParameterNotFound { index: origin });
        }
        self.values[position] = Some(value);
        self.origins[position] = Some(origin);
        Ok(())
    }

    /// Number of positions up to the last supplied one.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The value at `position`, or `None` when it was omitted.
    pub fn get(&self, position: usize) -> Option<&Variant> {
        self.values
            .get(position)
            .and_then(Option::as_ref)
            .filter(|v| !matches!(v, Variant::Missing))
    }

    /// The value at `position`, treating an omitted value as `VT_EMPTY`.
    pub fn get_or_empty(&self, position: usize) -> &Variant {
        self.get(position).unwrap_or(&Variant::Empty)
    }

    /// A type mismatch error pointing at the native index of `position`.
    pub fn mismatch(&self, position: usize) -> ComError {
        ComError::TypeMismatch {
            index: self.origin(position),
        }
    }

    fn origin(&self, position: usize) -> u32 {
        self.origins
            .get(position)
            .copied()
            .flatten()
            .unwrap_or(position as u32)
    }

    /// A required integer argument.
    pub fn i32(&self, position: usize) -> ComResult<i32> {
        let value = self.get(position).ok_or(ComError::BadParamCount)?;
        value.as_i32().ok_or_else(|| self.mismatch(position))
    }

    /// A required string argument.
    pub fn string(&self, position: usize) -> ComResult<String> {
        match self.get(position) {
            Some(Variant::Str(s)) => Ok(s.clone()),
            Some(_) => Err(self.mismatch(position)),
            None => Err(ComError::BadParamCount),
        }
    }

    /// A required by-reference integer the callee writes through.
    pub fn i32_out(&self, position: usize) -> ComResult<NonNull<i32>> {
        match self.get(position) {
            Some(Variant::I4Ref(p)) => Ok(*p),
            Some(_) => Err(self.mismatch(position)),
            None => Err(ComError::BadParamCount),
        }
    }

    /// The value of a property put. Absent unless the caller tagged it with
    /// the property-put named argument.
    pub fn put_value(&self) -> ComResult<&Variant> {
        self.put_value
            .as_ref()
            .map(|(value, _)| value)
            .ok_or(ComError::ParameterNotFound { index: 0 })
    }

    pub(crate) fn put_value_origin(&self) -> Option<u32> {
        self.put_value.as_ref().map(|(_, origin)| *origin)
    }
}
