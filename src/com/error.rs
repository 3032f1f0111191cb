//! Provides the error taxonomy shared by every layer of the binding.
//!
//! Errors are ordinary Rust values on the runtime side. At the native boundary
//! they are converted into status codes with [`ComError::code`] and never
//! unwind into native code.
//!
//! # Examples
//! ```
//! use comity::com::{ComError, DISP_E_TYPEMISMATCH, E_NOINTERFACE, GUID};
//!
//! let err = ComError::NoInterface(GUID::zeroed());
//! assert_eq!(err.code(), E_NOINTERFACE);
//!
//! let err = ComError::TypeMismatch { index: 2 };
//! assert_eq!(err.code(), DISP_E_TYPEMISMATCH);
//! assert_eq!(err.argument_index(), Some(2));
//! ```

use thiserror::Error;

use super::types::*;

/// Errors raised by exposed objects, the dispatch bridge and native calls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComError {
    /// The object does not implement the requested interface.
    #[error("interface {0:?} is not supported")]
    NoInterface(GUID),

    /// A required pointer (`this`, an in- or out-parameter) was null or stale.
    #[error("required pointer was null or invalid")]
    PointerInvalid,

    /// An argument had an unacceptable value or shape.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// No member with this dispatch id supports the requested invocation.
    #[error("member {0} not found")]
    MemberNotFound(i32),

    /// The operation is not supported by this object.
    #[error("operation not implemented")]
    NotImplemented,

    /// The object was used after being disposed.
    #[error("object has been disposed")]
    ObjectDisposed,

    /// A member name passed to `GetIDsOfNames` is unknown.
    #[error("unknown member name `{0}`")]
    UnknownName(String),

    /// A required named argument (such as the property-put value) was absent,
    /// or a named argument does not exist.
    #[error("parameter not found (argument {index})")]
    ParameterNotFound { index: u32 },

    /// An argument could not be coerced to the parameter's type.
    #[error("type mismatch in argument {index}")]
    TypeMismatch { index: u32 },

    /// Too many or too few arguments were supplied.
    #[error("wrong number of arguments")]
    BadParamCount,

    /// No type description is registered for the object.
    #[error("type library not registered")]
    LibraryNotRegistered,

    /// A native call failed with a status code that has no better mapping.
    #[error("native call failed with {0}")]
    NativeFailure(HRESULT),
}

/// Result type used throughout the crate.
pub type ComResult<T> = Result<T, ComError>;

impl ComError {
    /// Converts the error into the nearest native status code.
    pub fn code(&self) -> HRESULT {
        match self {
            ComError::NoInterface(_) => E_NOINTERFACE,
            ComError::PointerInvalid => E_POINTER,
            ComError::InvalidArgument(_) => E_INVALIDARG,
            ComError::MemberNotFound(_) => DISP_E_MEMBERNOTFOUND,
            ComError::NotImplemented => E_NOTIMPL,
            ComError::ObjectDisposed => RO_E_CLOSED,
            ComError::UnknownName(_) => DISP_E_UNKNOWNNAME,
            ComError::ParameterNotFound { .. } => DISP_E_PARAMNOTFOUND,
            ComError::TypeMismatch { .. } => DISP_E_TYPEMISMATCH,
            ComError::BadParamCount => DISP_E_BADPARAMCOUNT,
            ComError::LibraryNotRegistered => TYPE_E_LIBNOTREGISTERED,
            ComError::NativeFailure(hr) => *hr,
        }
    }

    /// Re-surfaces a failed status code returned by native code.
    ///
    /// Codes with a dedicated variant map back to it; everything else is kept
    /// verbatim in [`ComError::NativeFailure`].
    pub fn from_hresult(hr: HRESULT) -> Self {
        match hr {
            E_NOINTERFACE => ComError::NoInterface(GUID::zeroed()),
            E_POINTER => ComError::PointerInvalid,
            E_INVALIDARG => ComError::InvalidArgument("rejected by native callee"),
            DISP_E_MEMBERNOTFOUND => ComError::MemberNotFound(-1),
            E_NOTIMPL => ComError::NotImplemented,
            RO_E_CLOSED => ComError::ObjectDisposed,
            DISP_E_BADPARAMCOUNT => ComError::BadParamCount,
            TYPE_E_LIBNOTREGISTERED => ComError::LibraryNotRegistered,
            other => ComError::NativeFailure(other),
        }
    }

    /// Returns the offending argument index carried by argument errors.
    pub fn argument_index(&self) -> Option<u32> {
        match self {
            ComError::ParameterNotFound { index } | ComError::TypeMismatch { index } => {
                Some(*index)
            }
            _ => None,
        }
    }

    /// Re-targets an argument error at a different argument index.
    pub(crate) fn at_argument(self, index: u32) -> Self {
        match self {
            ComError::ParameterNotFound { .. } => ComError::ParameterNotFound { index },
            ComError::TypeMismatch { .. } => ComError::TypeMismatch { index },
            other => other,
        }
    }

    /// Whether this error belongs to the late-bound invocation protocol itself
    /// (as opposed to a failure raised by the member's implementation).
    pub(crate) fn is_dispatch_protocol(&self) -> bool {
        matches!(
            self,
            ComError::MemberNotFound(_)
                | ComError::UnknownName(_)
                | ComError::ParameterNotFound { .. }
                | ComError::TypeMismatch { .. }
                | ComError::BadParamCount
        )
    }
}

impl From<ComError> for HRESULT {
    fn from(err: ComError) -> Self {
        err.code()
    }
}

impl From<windows_core::Error> for ComError {
    fn from(err: windows_core::Error) -> Self {
        ComError::from_hresult(err.code())
    }
}

/// Converts a native status code into a `ComResult`, keeping success codes.
///
/// # Examples
/// ```
/// use comity::com::{check, ComError, E_POINTER, S_FALSE};
///
/// assert_eq!(check(S_FALSE), Ok(S_FALSE));
/// assert_eq!(check(E_POINTER), Err(ComError::PointerInvalid));
/// ```
pub fn check(hr: HRESULT) -> ComResult<HRESULT> {
    if hr.is_ok() {
        Ok(hr)
    } else {
        Err(ComError::from_hresult(hr))
    }
}
