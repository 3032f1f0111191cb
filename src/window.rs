//! Provides the window collaborator consumed by the frame accessible.
//!
//! The accessibility layer never talks to a windowing system directly; it
//! asks a [`WindowHost`] for rectangles, focus and parentage and sends it
//! messages. [`ScriptedWindow`] is an in-memory host driven by a serde
//! [`WindowLayout`], used by the command-line inspector and the tests. On
//! Windows, `platform::win32::Win32Window` is backed by a real `HWND`.
//!
//! # Examples
//! ```
//! use comity::window::{FramePart, ScriptedWindow, WindowHost, WindowLayout};
//!
//! let layout = WindowLayout::from_json(r#"{
//!     "handle": 42,
//!     "title": "Notes",
//!     "rect": { "left": 0, "top": 0, "right": 200, "bottom": 100 },
//!     "parts": {
//!         "title_bar": { "left": 0, "top": 0, "right": 200, "bottom": 20 },
//!         "client": { "left": 0, "top": 20, "right": 200, "bottom": 100 }
//!     }
//! }"#).unwrap();
//!
//! let window = ScriptedWindow::new(layout);
//! assert!(window.part_rect(FramePart::Client).is_some());
//! assert!(window.part_rect(FramePart::SizeGrip).is_none());
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::com::helpers::MutexExt;
use crate::com::ComResult;

/// `WM_SYSCOMMAND`.
pub const WM_SYSCOMMAND: u32 = 0x0112;
/// `SC_KEYMENU`: opens the window menu when paired with a space.
pub const SC_KEYMENU: usize = 0xF100;

/// An opaque native window handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowHandle(pub isize);

/// A rectangle in screen coordinates; right and bottom are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.left && point.x < self.right && point.y >= self.top && point.y < self.bottom
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.left >= self.left
            && other.top >= self.top
            && other.right <= self.right
            && other.bottom <= self.bottom
    }
}

/// A point in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// The seven parts of a standard window frame, numbered as child ids.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FramePart {
    SystemMenu = 1,
    TitleBar = 2,
    MenuBar = 3,
    Client = 4,
    VerticalScrollBar = 5,
    HorizontalScrollBar = 6,
    SizeGrip = 7,
}

impl FramePart {
    /// Every part, in child-id order.
    pub const ALL: [FramePart; 7] = [
        FramePart::SystemMenu,
        FramePart::TitleBar,
        FramePart::MenuBar,
        FramePart::Client,
        FramePart::VerticalScrollBar,
        FramePart::HorizontalScrollBar,
        FramePart::SizeGrip,
    ];

    pub fn child_id(self) -> i32 {
        self as i32
    }

    pub fn from_child_id(id: i32) -> Option<Self> {
        let index = usize::try_from(id.checked_sub(1)?).ok()?;
        Self::ALL.get(index).copied()
    }
}

/// What the accessibility layer needs from a window.
pub trait WindowHost: Send + Sync + 'static {
    fn handle(&self) -> WindowHandle;

    /// The outer window rectangle.
    fn window_rect(&self) -> ComResult<Rect>;

    /// The window that currently has keyboard focus, if any.
    fn focus(&self) -> Option<WindowHandle>;

    fn parent(&self) -> Option<WindowHandle>;

    /// Sends a message synchronously and returns its result.
    fn send_message(&self, message: u32, wparam: usize, lparam: isize) -> isize;

    /// The window caption.
    fn text(&self) -> Option<String> {
        None
    }

    /// The rectangle of a frame part, or `None` when the window lacks it.
    fn part_rect(&self, part: FramePart) -> Option<Rect>;

    fn has_focus(&self) -> bool {
        self.focus() == Some(self.handle())
    }
}

/// Errors raised while loading a [`WindowLayout`].
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("failed to read layout: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed layout: {0}")]
    Json(#[from] serde_json::Error),

    #[error("part {part:?} lies outside the window rectangle")]
    PartOutsideWindow { part: FramePart },
}

/// A scripted window description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowLayout {
    pub handle: WindowHandle,
    #[serde(default)]
    pub title: Option<String>,
    pub rect: Rect,
    /// Parts the window has; absent parts are not drawn.
    #[serde(default)]
    pub parts: BTreeMap<FramePart, Rect>,
    #[serde(default)]
    pub focused: bool,
    #[serde(default)]
    pub parent: Option<WindowHandle>,
}

impl WindowLayout {
    /// Parses and validates a JSON layout.
    pub fn from_json(text: &str) -> Result<Self, LayoutError> {
        let layout: Self = serde_json::from_str(text)?;
        layout.validate()?;
        Ok(layout)
    }

    pub fn load(path: &Path) -> Result<Self, LayoutError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    fn validate(&self) -> Result<(), LayoutError> {
        match self
            .parts
            .iter()
            .find(|(_, rect)| !self.rect.contains_rect(rect))
        {
            Some((&part, _)) => Err(LayoutError::PartOutsideWindow { part }),
            None => Ok(()),
        }
    }

    /// An 800x600 document window at (100, 100) with every part but the
    /// horizontal scroll bar.
    pub fn sample() -> Self {
        let parts = BTreeMap::from([
            (FramePart::SystemMenu, Rect::new(104, 104, 124, 124)),
            (FramePart::TitleBar, Rect::new(104, 104, 896, 124)),
            (FramePart::MenuBar, Rect::new(104, 124, 896, 144)),
            (FramePart::Client, Rect::new(104, 144, 880, 680)),
            (FramePart::VerticalScrollBar, Rect::new(880, 144, 896, 680)),
            (FramePart::SizeGrip, Rect::new(880, 680, 896, 696)),
        ]);
        Self {
            handle: WindowHandle(0x0001_0042),
            title: Some("Untitled - Notes".to_string()),
            rect: Rect::new(100, 100, 900, 700),
            parts,
            focused: true,
            parent: None,
        }
    }
}

/// A message recorded by [`ScriptedWindow::send_message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentMessage {
    pub message: u32,
    pub wparam: usize,
    pub lparam: isize,
}

/// An in-memory [`WindowHost`].
#[derive(Debug)]
pub struct ScriptedWindow {
    layout: WindowLayout,
    focus: Mutex<Option<WindowHandle>>,
    sent: Mutex<Vec<SentMessage>>,
}

impl ScriptedWindow {
    pub fn new(layout: WindowLayout) -> Self {
        let focus = layout.focused.then_some(layout.handle);
        Self {
            layout,
            focus: Mutex::new(focus),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn layout(&self) -> &WindowLayout {
        &self.layout
    }

    /// Moves keyboard focus to `handle`.
    pub fn set_focus(&self, handle: Option<WindowHandle>) -> ComResult<()> {
        *self.focus.lock_or_fail()? = handle;
        Ok(())
    }

    /// Messages sent so far, oldest first.
    pub fn sent_messages(&self) -> ComResult<Vec<SentMessage>> {
        Ok(self.sent.lock_or_fail()?.clone())
    }
}

impl WindowHost for ScriptedWindow {
    fn handle(&self) -> WindowHandle {
        self.layout.handle
    }

    fn window_rect(&self) -> ComResult<Rect> {
        Ok(self.layout.rect)
    }

    fn focus(&self) -> Option<WindowHandle> {
        self.focus.lock_or_fail().ok().and_then(|f| *f)
    }

    fn parent(&self) -> Option<WindowHandle> {
        self.layout.parent
    }

    fn send_message(&self, message: u32, wparam: usize, lparam: isize) -> isize {
        tracing::debug!(message, wparam, lparam, "scripted window received message");
        if let Ok(mut sent) = self.sent.lock_or_fail() {
            sent.push(SentMessage {
                message,
                wparam,
                lparam,
            });
        }
        0
    }

    fn text(&self) -> Option<String> {
        self.layout.title.clone()
    }

    fn part_rect(&self, part: FramePart) -> Option<Rect> {
        self.layout.parts.get(&part).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_layout_is_valid() {
        let sample = WindowLayout::sample();
        assert!(sample.validate().is_ok());
        assert!(!sample.parts.contains_key(&FramePart::HorizontalScrollBar));
    }

    #[test]
    fn test_layout_round_trips_through_json() {
        let sample = WindowLayout::sample();
        let json = serde_json::to_string(&sample).unwrap();
        assert!(json.contains("\"system_menu\""));
        assert_eq!(WindowLayout::from_json(&json).unwrap(), sample);
    }

    #[test]
    fn test_part_outside_window_is_rejected() {
        let json = r#"{
            "handle": 1,
            "rect": { "left": 0, "top": 0, "right": 10, "bottom": 10 },
            "parts": { "client": { "left": 0, "top": 0, "right": 20, "bottom": 10 } }
        }"#;
        assert!(matches!(
            WindowLayout::from_json(json),
            Err(LayoutError::PartOutsideWindow { part: FramePart::Client })
        ));
    }

    #[test]
    fn test_child_ids_round_trip() {
        for part in FramePart::ALL {
            assert_eq!(FramePart::from_child_id(part.child_id()), Some(part));
        }
        assert_eq!(FramePart::from_child_id(0), None);
        assert_eq!(FramePart::from_child_id(8), None);
        assert_eq!(FramePart::from_child_id(i32::MIN), None);
    }

    #[test]
    fn test_rect_contains_is_half_open() {
        let r = Rect::new(0, 0, 10, 10);
        assert!(r.contains(Point::new(0, 0)));
        assert!(!r.contains(Point::new(10, 5)));
    }

    #[test]
    fn test_scripted_window_records_messages() {
        let window = ScriptedWindow::new(WindowLayout::sample());
        window.send_message(WM_SYSCOMMAND, SC_KEYMENU, ' ' as isize);
        assert_eq!(
            window.sent_messages().unwrap(),
            vec![SentMessage {
                message: WM_SYSCOMMAND,
                wparam: SC_KEYMENU,
                lparam: 32
            }]
        );
    }
}
