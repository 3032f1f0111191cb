//! Provides the accessibility contract (`IAccessible`) for runtime objects.
//!
//! # Overview
//!
//! - [`Accessible`] - A runtime object exposed as `IAccessible` and `IDispatch`
//! - [`AccessibleProvider`] / [`ChildHandler`] - What an object answers for
//!   itself and for its simple children
//! - [`frame_accessible`] - The seven-part window frame composite
//! - [`AccessibleClient`] - Calling a native `IAccessible` pointer

pub mod client;
pub mod frame;
pub mod object;
pub mod types;

pub use client::AccessibleClient;
pub use frame::frame_accessible;
pub use object::{Accessible, AccessibleProvider, ChildHandler};
pub use types::*;
