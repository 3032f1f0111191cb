//! Provides the Windows backends: the operating system agile-reference proxy
//! and a [`WindowHost`](crate::window::WindowHost) over a real `HWND`.

pub mod win32;

pub use win32::{agile_reference, Win32Window};
