//! Implements the Win32 side of the crate's collaborators.

use std::ffi::c_void;

use windows::Win32::Foundation::{HWND, LPARAM, POINT, RECT, WPARAM};
use windows::Win32::Graphics::Gdi::ClientToScreen;
use windows::Win32::System::WinRT::{RoGetAgileReference, AGILEREFERENCE_DEFAULT};
use windows::Win32::UI::Input::KeyboardAndMouse::GetFocus;
use windows::Win32::UI::WindowsAndMessaging::{
    GetClientRect, GetMenuBarInfo, GetParent, GetScrollBarInfo, GetTitleBarInfo,
    GetWindowLongW, GetWindowRect, GetWindowTextLengthW, GetWindowTextW, SendMessageW,
    GWL_STYLE, MENUBARINFO, OBJID_HSCROLL, OBJID_MENU, OBJID_VSCROLL, SCROLLBARINFO,
    TITLEBARINFO, WS_SYSMENU,
};

use crate::accessibility::States;
use crate::com::{ComResult, IAgileReference, IUnknown, Interface, GUID};
use crate::window::{FramePart, Rect, WindowHandle, WindowHost};

/// Wraps `target` in the operating system's agile reference for `iid`.
pub fn agile_reference(target: &IUnknown, iid: GUID) -> ComResult<IAgileReference> {
    // SAFETY: plain FFI call; `target` stays alive for its duration.
    let proxy = unsafe { RoGetAgileReference(AGILEREFERENCE_DEFAULT, &iid, target) }?;
    // SAFETY: both types name the same interface; the reference moves over.
    Ok(unsafe { IAgileReference::from_raw(proxy.into_raw()) })
}

fn to_rect(r: RECT) -> Rect {
    Rect::new(r.left, r.top, r.right, r.bottom)
}

/// A [`WindowHost`] backed by a live window handle.
#[derive(Debug, Clone, Copy)]
pub struct Win32Window {
    handle: isize,
}

impl Win32Window {
    pub fn new(handle: WindowHandle) -> Self {
        Self { handle: handle.0 }
    }

    fn hwnd(&self) -> HWND {
        HWND(self.handle as *mut c_void)
    }

    fn client_rect(&self) -> Option<Rect> {
        let mut rect = RECT::default();
        let mut origin = POINT::default();
        // SAFETY: plain FFI calls writing into locals.
        unsafe {
            GetClientRect(self.hwnd(), &mut rect).ok()?;
            ClientToScreen(self.hwnd(), &mut origin).ok().ok()?;
        }
        Some(Rect::new(
            origin.x,
            origin.y,
            origin.x + rect.right,
            origin.y + rect.bottom,
        ))
    }

    fn title_bar(&self) -> Option<Rect> {
        let mut info = TITLEBARINFO {
            cbSize: std::mem::size_of::<TITLEBARINFO>() as u32,
            ..Default::default()
        };
        // SAFETY: `info` is sized for the call.
        unsafe { GetTitleBarInfo(self.hwnd(), &mut info) }.ok()?;
        let visible = !States(info.rgstate[0]).contains(States::INVISIBLE);
        visible.then(|| to_rect(info.rcTitleBar))
    }

    fn system_menu(&self) -> Option<Rect> {
        // SAFETY: plain FFI call.
        let style = unsafe { GetWindowLongW(self.hwnd(), GWL_STYLE) } as u32;
        if style & WS_SYSMENU.0 == 0 {
            return None;
        }
        // The icon is a square at the left end of the title bar.
        let title = self.title_bar()?;
        Some(Rect::new(
            title.left,
            title.top,
            title.left + title.height(),
            title.bottom,
        ))
    }

    fn menu_bar(&self) -> Option<Rect> {
        let mut info = MENUBARINFO {
            cbSize: std::mem::size_of::<MENUBARINFO>() as u32,
            ..Default::default()
        };
        // SAFETY: `info` is sized for the call.
        unsafe { GetMenuBarInfo(self.hwnd(), OBJID_MENU, 0, &mut info) }.ok()?;
        Some(to_rect(info.rcBar))
    }

    fn scroll_bar(&self, vertical: bool) -> Option<Rect> {
        let mut info = SCROLLBARINFO {
            cbSize: std::mem::size_of::<SCROLLBARINFO>() as u32,
            ..Default::default()
        };
        let object = if vertical { OBJID_VSCROLL } else { OBJID_HSCROLL };
        // SAFETY: `info` is sized for the call.
        unsafe { GetScrollBarInfo(self.hwnd(), object, &mut info) }.ok()?;
        let visible = !States(info.rgstate[0]).contains(States::INVISIBLE);
        visible.then(|| to_rect(info.rcScrollBar))
    }
}

impl WindowHost for Win32Window {
    fn handle(&self) -> WindowHandle {
        WindowHandle(self.handle)
    }

    fn window_rect(&self) -> ComResult<Rect> {
        let mut rect = RECT::default();
        // SAFETY: plain FFI call writing into a local.
        unsafe { GetWindowRect(self.hwnd(), &mut rect) }?;
        Ok(to_rect(rect))
    }

    fn focus(&self) -> Option<WindowHandle> {
        // SAFETY: plain FFI call.
        let focus = unsafe { GetFocus() };
        (!focus.is_invalid()).then(|| WindowHandle(focus.0 as isize))
    }

    fn parent(&self) -> Option<WindowHandle> {
        // SAFETY: plain FFI call.
        let parent = unsafe { GetParent(self.hwnd()) }.ok()?;
        (!parent.is_invalid()).then(|| WindowHandle(parent.0 as isize))
    }

    fn send_message(&self, message: u32, wparam: usize, lparam: isize) -> isize {
        // SAFETY: the window procedure owns the message's meaning.
        unsafe { SendMessageW(self.hwnd(), message, Some(WPARAM(wparam)), Some(LPARAM(lparam))) }.0
    }

    fn text(&self) -> Option<String> {
        // SAFETY: plain FFI calls; the buffer is sized from the reported length.
        unsafe {
            let len = GetWindowTextLengthW(self.hwnd());
            if len <= 0 {
                return None;
            }
            let mut buffer = vec![0u16; len as usize + 1];
            let copied = GetWindowTextW(self.hwnd(), &mut buffer);
            Some(String::from_utf16_lossy(&buffer[..copied.max(0) as usize]))
        }
    }

    fn part_rect(&self, part: FramePart) -> Option<Rect> {
        match part {
            FramePart::SystemMenu => self.system_menu(),
            FramePart::TitleBar => self.title_bar(),
            FramePart::MenuBar => self.menu_bar(),
            FramePart::Client => self.client_rect(),
            FramePart::VerticalScrollBar => self.scroll_bar(true),
            FramePart::HorizontalScrollBar => self.scroll_bar(false),
            FramePart::SizeGrip => {
                let vertical = self.scroll_bar(true)?;
                let horizontal = self.scroll_bar(false)?;
                Some(Rect::new(
                    vertical.left,
                    horizontal.top,
                    vertical.right,
                    horizontal.bottom,
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use windows::Win32::System::Com::{CoInitializeEx, COINIT_MULTITHREADED};
    use windows::Win32::UI::WindowsAndMessaging::GetDesktopWindow;

    use super::*;
    use crate::accessibility::{frame_accessible, AccessibleClient};
    use crate::agile::{AgileReference, ProxyStrategy};
    use crate::com::object::{self, ComObject, InterfaceEntry};
    use crate::com::{IAccessible, InterfaceExt};

    fn desktop() -> Win32Window {
        // SAFETY: plain FFI call.
        let hwnd = unsafe { GetDesktopWindow() };
        Win32Window::new(WindowHandle(hwnd.0 as isize))
    }

    #[test]
    fn test_desktop_window_has_bounds() {
        let window = desktop();
        let rect = window.window_rect().unwrap();
        assert!(!rect.is_empty());
        assert_eq!(window.part_rect(FramePart::Client), Some(rect));
    }

    #[test]
    fn test_frame_over_a_live_window() {
        let frame = frame_accessible(Arc::new(desktop()), None);
        let native = object::expose_as::<IAccessible, _>(frame).unwrap();
        let client = AccessibleClient::new(native);
        assert_eq!(client.child_count(), Ok(7));
        assert!(client.location(0).is_ok());
    }

    struct Plain;

    impl ComObject for Plain {
        fn interfaces(&self) -> Vec<InterfaceEntry> {
            Vec::new()
        }
    }

    #[test]
    fn test_platform_agile_reference_resolves_target() {
        // SAFETY: joining the multithreaded apartment has no preconditions.
        let _ = unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) };
        let ptr: IUnknown = object::expose_as(Arc::new(Plain)).unwrap();
        let agile = AgileReference::with_strategy(&ptr, ProxyStrategy::Platform).unwrap();
        let checkout = agile.checkout().unwrap();
        assert!(checkout.same_object(&ptr));
    }
}
