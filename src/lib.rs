//! Provides comity, a bridge that exposes Rust objects to native COM callers
//! and consumes native COM pointers safely from any thread.
//!
//! Exposed objects live in a process-wide indirection table; native callers
//! hold small per-interface handles whose vtables are generated once per type.
//! On top of that core the crate implements late-bound dispatch
//! (`IDispatch`), an apartment-neutral pointer owner (`IAgileReference`) and
//! the accessibility contract (`IAccessible`) including the standard
//! seven-part window frame.
//!
//! # Modules
//! - [`com`] - Interfaces, vtables, object exposure and pointers
//! - [`dispatch`] - Late-bound member lookup and invocation
//! - [`agile`] - Thread-neutral ownership of native pointers
//! - [`accessibility`] - `IAccessible` objects and the frame composite
//! - [`window`] - The window collaborator and its scripted implementation
//!
//! # Examples
//! ```
//! use std::sync::Arc;
//!
//! use comity::accessibility::{frame_accessible, AccessibleClient};
//! use comity::com::{object, IAccessible};
//! use comity::window::{ScriptedWindow, WindowLayout};
//!
//! let window = Arc::new(ScriptedWindow::new(WindowLayout::sample()));
//! let frame = frame_accessible(window, None);
//! let native = object::expose_as::<IAccessible, _>(frame).unwrap();
//!
//! let client = AccessibleClient::new(native);
//! assert_eq!(client.child_count().unwrap(), 7);
//! assert_eq!(client.name(0).unwrap().as_deref(), Some("Untitled - Notes"));
//! ```

// COM macros intentionally wrap unsafe boilerplate so callers don't have to.
#![allow(clippy::macro_metavars_in_unsafe)]

// COM abstraction layer - must be declared first for macro availability
#[macro_use]
pub mod com;

pub mod accessibility;
pub mod agile;
pub mod dispatch;
#[cfg(windows)]
pub mod platform;
pub mod window;

#[doc(hidden)]
pub mod __private {
    pub use once_cell::sync::OnceCell;
    pub use tracing;
    pub use windows_core;
}
