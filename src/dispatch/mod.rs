//! Provides late-bound dispatch: lookup of members by name and invocation
//! through a generic argument block.
//!
//! Any [`Dispatchable`] type automatically implements `IDispatch`: list it in
//! [`ComObject::interfaces`](crate::com::ComObject::interfaces) with
//! `InterfaceEntry::of::<IDispatch, Self>()`.
//!
//! # Overview
//!
//! - [`Variant`] / [`RawVariant`] - Tagged values and their native layout
//! - [`Bstr`] - Length-prefixed native strings
//! - [`DispatchTable`] - The cached member table of a type
//! - [`DispatchClient`] - Calling `IDispatch` from runtime code

pub mod args;
pub mod bridge;
pub mod bstr;
pub mod client;
pub mod table;
pub mod variant;

pub use args::{Arguments, DispParams, ExcepInfo};
pub use bstr::Bstr;
pub use client::DispatchClient;
pub use table::{
    table_for, DispId, DispatchTable, DispatchTableBuilder, Dispatchable, InvokeKind, Member,
    DISPID_PROPERTYPUT, DISPID_UNKNOWN, DISPID_VALUE,
};
pub use variant::{RawVariant, VarType, Variant};
