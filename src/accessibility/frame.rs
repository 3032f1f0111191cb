//! Provides the accessible object of a window frame.
//!
//! The frame always reports seven children, one per [`FramePart`]. Parts the
//! window lacks stay addressable but report `INVISIBLE` with an empty
//! rectangle; navigation and hit-testing step over them. Each part is a
//! separate [`Accessible`] whose parent is the frame.
//!
//! A part holds its frame strongly, so a part handed to a native caller keeps
//! answering after the frame's own pointer is released. The frame holds its
//! parts weakly and rebuilds one on demand; a live part is always reused.
//!
//! # Examples
//! ```
//! use std::sync::Arc;
//!
//! use comity::accessibility::{frame_accessible, ChildId, NavDirection, Role, States};
//! use comity::window::{FramePart, ScriptedWindow, WindowLayout};
//!
//! let window = Arc::new(ScriptedWindow::new(WindowLayout::sample()));
//! let frame = frame_accessible(window, None);
//!
//! assert_eq!(frame.child_count().unwrap(), 7);
//! assert_eq!(frame.role(ChildId::SelfId).unwrap(), Role::WINDOW);
//!
//! // The sample window has no horizontal scroll bar.
//! let hscroll = ChildId::Child(FramePart::HorizontalScrollBar.child_id());
//! assert!(frame.state(hscroll).unwrap().contains(States::INVISIBLE));
//! ```

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::object::{Accessible, AccessibleProvider, ChildHandler};
use super::types::{AccessibleTarget, ChildId, NavDirection, Role, States};
use crate::agile::AgileReference;
use crate::com::object::expose_as;
use crate::com::{ComError, ComResult, IDispatch};
use crate::window::{FramePart, Point, Rect, WindowHost, SC_KEYMENU, WM_SYSCOMMAND};

use FramePart::*;

/// Builds the accessible object of `host`'s frame.
///
/// `parent` is the accessible the frame reports as its own parent; it is
/// held through an agile reference so the frame may be queried from any
/// thread.
pub fn frame_accessible(
    host: Arc<dyn WindowHost>,
    parent: Option<AgileReference<IDispatch>>,
) -> Arc<Accessible> {
    Arc::new_cyclic(|frame| {
        let shared = Arc::new(FrameShared {
            host,
            parent,
            frame: frame.clone(),
            parts: Mutex::new(vec![Weak::new(); FramePart::ALL.len()]),
        });
        Accessible::new(FrameProvider {
            shared: shared.clone(),
        })
        .with_children(FrameChildren { shared })
    })
}

/// Neighbors of each part for spatial navigation, nearest candidate first.
fn neighbors(part: FramePart, direction: NavDirection) -> &'static [FramePart] {
    use NavDirection::{Down, Left, Right, Up};
    match (part, direction) {
        (SystemMenu, Right) => &[TitleBar],
        (SystemMenu, Down) => &[MenuBar, Client],
        (TitleBar, Left) => &[SystemMenu],
        (TitleBar, Down) => &[MenuBar, Client],
        (MenuBar, Up) => &[TitleBar],
        (MenuBar, Down) => &[Client],
        (Client, Up) => &[MenuBar, TitleBar],
        (Client, Down) => &[HorizontalScrollBar],
        (Client, Right) => &[VerticalScrollBar],
        (VerticalScrollBar, Up) => &[MenuBar, TitleBar],
        (VerticalScrollBar, Down) => &[SizeGrip],
        (VerticalScrollBar, Left) => &[Client],
        (HorizontalScrollBar, Up) => &[Client],
        (HorizontalScrollBar, Right) => &[SizeGrip],
        (SizeGrip, Up) => &[VerticalScrollBar],
        (SizeGrip, Left) => &[HorizontalScrollBar],
        _ => &[],
    }
}

/// State shared by the frame and its parts.
struct FrameShared {
    host: Arc<dyn WindowHost>,
    parent: Option<AgileReference<IDispatch>>,
    frame: Weak<Accessible>,
    /// Indexed by child id minus one.
    parts: Mutex<Vec<Weak<Accessible>>>,
}

impl FrameShared {
    fn rect_of(&self, part: FramePart) -> Option<Rect> {
        self.host.part_rect(part).filter(|r| !r.is_empty())
    }

    fn is_present(&self, part: FramePart) -> bool {
        self.rect_of(part).is_some()
    }

    fn present(&self) -> impl Iterator<Item = FramePart> + '_ {
        FramePart::ALL.into_iter().filter(|&p| self.is_present(p))
    }

    /// The accessible of `part`, built if no live one exists.
    ///
    /// Callers are the frame or one of its parts, so the frame is alive.
    fn part(self: &Arc<Self>, part: FramePart) -> ComResult<Arc<Accessible>> {
        let mut parts = self.parts.lock();
        let slot = parts
            .get_mut(part as usize - 1)
            .ok_or(ComError::InvalidArgument("no such part"))?;
        if let Some(existing) = slot.upgrade() {
            return Ok(existing);
        }
        let frame = self.frame.upgrade().ok_or(ComError::ObjectDisposed)?;
        let built = Arc::new(Accessible::new(PartProvider {
            shared: Arc::clone(self),
            frame,
            part,
        }));
        *slot = Arc::downgrade(&built);
        tracing::trace!(?part, "frame part built");
        Ok(built)
    }

    fn part_object(self: &Arc<Self>, part: FramePart) -> ComResult<IDispatch> {
        expose_as::<IDispatch, _>(self.part(part)?)
    }

    fn target(self: &Arc<Self>, part: Option<FramePart>) -> ComResult<AccessibleTarget> {
        Ok(match part {
            Some(part) => AccessibleTarget::Object(self.part_object(part)?),
            None => AccessibleTarget::Nothing,
        })
    }

    /// Navigates between sibling parts starting at `from`.
    fn sibling(
        self: &Arc<Self>,
        from: FramePart,
        direction: NavDirection,
    ) -> ComResult<AccessibleTarget> {
        let found = match direction {
            NavDirection::Next => self.present().find(|&p| p > from),
            NavDirection::Previous => self.present().filter(|&p| p < from).last(),
            NavDirection::FirstChild | NavDirection::LastChild => {
                return Err(ComError::InvalidArgument("a part has no children"));
            }
            spatial => neighbors(from, spatial)
                .iter()
                .copied()
                .find(|&p| self.is_present(p)),
        };
        tracing::trace!(?from, ?direction, ?found, "frame navigation");
        self.target(found)
    }
}

struct FrameProvider {
    shared: Arc<FrameShared>,
}

impl AccessibleProvider for FrameProvider {
    fn name(&self) -> ComResult<Option<String>> {
        Ok(self.shared.host.text())
    }

    fn role(&self) -> ComResult<Role> {
        Ok(Role::WINDOW)
    }

    fn state(&self) -> ComResult<States> {
        let host = &self.shared.host;
        Ok(States::FOCUSABLE
            | States::MOVEABLE
            | States::when(host.has_focus(), States::FOCUSED)
            | States::when(self.shared.is_present(SizeGrip), States::SIZEABLE))
    }

    fn bounds(&self) -> ComResult<Rect> {
        self.shared.host.window_rect()
    }

    fn parent(&self) -> ComResult<Option<IDispatch>> {
        match &self.shared.parent {
            Some(parent) => Ok(Some(parent.checkout()?.clone())),
            None => Ok(None),
        }
    }

    fn child_count(&self) -> ComResult<i32> {
        Ok(FramePart::ALL.len() as i32)
    }

    fn child(&self, id: i32) -> ComResult<Option<IDispatch>> {
        let part = FramePart::from_child_id(id).ok_or(ComError::InvalidArgument("no such part"))?;
        self.shared.part_object(part).map(Some)
    }

    fn focus(&self) -> ComResult<AccessibleTarget> {
        if !self.shared.host.has_focus() {
            return Ok(AccessibleTarget::Nothing);
        }
        if self.shared.is_present(Client) {
            self.shared.target(Some(Client))
        } else {
            Ok(AccessibleTarget::SelfId)
        }
    }

    fn navigate(&self, direction: NavDirection, start: ChildId) -> ComResult<AccessibleTarget> {
        match start {
            ChildId::SelfId => match direction {
                NavDirection::FirstChild => self.shared.target(self.shared.present().next()),
                NavDirection::LastChild => self.shared.target(self.shared.present().last()),
                // Siblings of the frame belong to its parent.
                _ => Ok(AccessibleTarget::Nothing),
            },
            ChildId::Child(id) => {
                let from =
                    FramePart::from_child_id(id).ok_or(ComError::InvalidArgument("no such part"))?;
                self.shared.sibling(from, direction)
            }
        }
    }

    fn hit_test(&self, point: Point) -> ComResult<AccessibleTarget> {
        if !self.shared.host.window_rect()?.contains(point) {
            return Ok(AccessibleTarget::Nothing);
        }
        // The system menu sits inside the title bar, so it is tested first.
        let hit = self
            .shared
            .present()
            .find(|&p| self.shared.rect_of(p).is_some_and(|r| r.contains(point)));
        match hit {
            Some(part) => self.shared.target(Some(part)),
            None => Ok(AccessibleTarget::SelfId),
        }
    }
}

/// Answers per-child questions on the frame by asking the part itself.
struct FrameChildren {
    shared: Arc<FrameShared>,
}

impl FrameChildren {
    fn part(&self, id: i32) -> ComResult<Arc<Accessible>> {
        let part = FramePart::from_child_id(id).ok_or(ComError::InvalidArgument("no such part"))?;
        self.shared.part(part)
    }
}

impl ChildHandler for FrameChildren {
    fn name(&self, child: i32) -> ComResult<Option<String>> {
        self.part(child)?.name(ChildId::SelfId)
    }

    fn value(&self, child: i32) -> ComResult<Option<String>> {
        self.part(child)?.value(ChildId::SelfId)
    }

    fn description(&self, child: i32) -> ComResult<Option<String>> {
        self.part(child)?.description(ChildId::SelfId)
    }

    fn help(&self, child: i32) -> ComResult<Option<String>> {
        self.part(child)?.help(ChildId::SelfId)
    }

    fn keyboard_shortcut(&self, child: i32) -> ComResult<Option<String>> {
        self.part(child)?.keyboard_shortcut(ChildId::SelfId)
    }

    fn default_action(&self, child: i32) -> ComResult<Option<String>> {
        self.part(child)?.default_action(ChildId::SelfId)
    }

    fn role(&self, child: i32) -> ComResult<Role> {
        self.part(child)?.role(ChildId::SelfId)
    }

    fn state(&self, child: i32) -> ComResult<States> {
        self.part(child)?.state(ChildId::SelfId)
    }

    fn bounds(&self, child: i32) -> ComResult<Rect> {
        self.part(child)?.location(ChildId::SelfId)
    }

    fn do_default_action(&self, child: i32) -> ComResult<()> {
        self.part(child)?.do_default_action(ChildId::SelfId)
    }
}

struct PartProvider {
    shared: Arc<FrameShared>,
    frame: Arc<Accessible>,
    part: FramePart,
}

impl PartProvider {
    fn is_present(&self) -> bool {
        self.shared.is_present(self.part)
    }
}

impl AccessibleProvider for PartProvider {
    fn name(&self) -> ComResult<Option<String>> {
        Ok(match self.part {
            SystemMenu => Some("System".to_string()),
            TitleBar | Client => self.shared.host.text(),
            MenuBar => Some("Application".to_string()),
            VerticalScrollBar => Some("Vertical".to_string()),
            HorizontalScrollBar => Some("Horizontal".to_string()),
            SizeGrip => None,
        })
    }

    fn keyboard_shortcut(&self) -> ComResult<Option<String>> {
        Ok(match self.part {
            SystemMenu => Some("Alt+Space".to_string()),
            MenuBar => Some("Alt".to_string()),
            _ => None,
        })
    }

    fn default_action(&self) -> ComResult<Option<String>> {
        Ok((self.part == SystemMenu && self.is_present()).then(|| "Open".to_string()))
    }

    fn role(&self) -> ComResult<Role> {
        Ok(match self.part {
            SystemMenu | MenuBar => Role::MENU_BAR,
            TitleBar => Role::TITLE_BAR,
            Client => Role::CLIENT,
            VerticalScrollBar | HorizontalScrollBar => Role::SCROLL_BAR,
            SizeGrip => Role::GRIP,
        })
    }

    fn state(&self) -> ComResult<States> {
        if !self.is_present() {
            return Ok(States::INVISIBLE);
        }
        Ok(match self.part {
            Client => {
                States::FOCUSABLE | States::when(self.shared.host.has_focus(), States::FOCUSED)
            }
            _ => States::NORMAL,
        })
    }

    fn bounds(&self) -> ComResult<Rect> {
        Ok(self.shared.rect_of(self.part).unwrap_or_default())
    }

    fn parent(&self) -> ComResult<Option<IDispatch>> {
        expose_as::<IDispatch, _>(Arc::clone(&self.frame)).map(Some)
    }

    fn navigate(&self, direction: NavDirection, _start: ChildId) -> ComResult<AccessibleTarget> {
        // Parts have no children, so `_start` is always the part itself.
        match direction {
            NavDirection::FirstChild | NavDirection::LastChild => Ok(AccessibleTarget::Nothing),
            _ => self.shared.sibling(self.part, direction),
        }
    }

    fn do_default_action(&self) -> ComResult<()> {
        if self.part != SystemMenu || !self.is_present() {
            return Err(ComError::MemberNotFound(super::types::DISPID_ACC_DODEFAULTACTION));
        }
        tracing::debug!(window = ?self.shared.host.handle(), "opening the system menu");
        self.shared
            .host
            .send_message(WM_SYSCOMMAND, SC_KEYMENU, ' ' as isize);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::{ScriptedWindow, WindowLayout};

    fn sample() -> (Arc<ScriptedWindow>, Arc<Accessible>) {
        let window = Arc::new(ScriptedWindow::new(WindowLayout::sample()));
        let frame = frame_accessible(window.clone(), None);
        (window, frame)
    }

    #[test]
    fn test_neighbors_are_symmetric_for_simple_pairs() {
        assert_eq!(neighbors(SystemMenu, NavDirection::Right), &[TitleBar]);
        assert_eq!(neighbors(TitleBar, NavDirection::Left), &[SystemMenu]);
        assert!(neighbors(SizeGrip, NavDirection::Down).is_empty());
    }

    #[test]
    fn test_absent_part_is_invisible_with_empty_bounds() {
        let (_, frame) = sample();
        let hscroll = ChildId::Child(HorizontalScrollBar.child_id());
        assert_eq!(frame.state(hscroll), Ok(States::INVISIBLE));
        assert_eq!(frame.location(hscroll), Ok(Rect::default()));
    }

    #[test]
    fn test_frame_state_reflects_focus_and_grip() {
        let (window, frame) = sample();
        let state = frame.state(ChildId::SelfId).unwrap();
        assert!(state.contains(States::FOCUSED | States::SIZEABLE | States::MOVEABLE));

        window.set_focus(None).unwrap();
        assert!(!frame.state(ChildId::SelfId).unwrap().contains(States::FOCUSED));
        assert_eq!(frame.focus(), Ok(AccessibleTarget::Nothing));
    }

    #[test]
    fn test_part_names_follow_window_text() {
        let (_, frame) = sample();
        let title = frame.name(ChildId::Child(TitleBar.child_id())).unwrap();
        assert_eq!(title.as_deref(), Some("Untitled - Notes"));
        assert_eq!(frame.name(ChildId::Child(SizeGrip.child_id())), Ok(None));
    }

    #[test]
    fn test_hit_test_outside_and_on_border() {
        let (_, frame) = sample();
        assert_eq!(frame.hit_test(Point::new(0, 0)), Ok(AccessibleTarget::Nothing));
        // Inside the window but on the 4px border around the parts.
        assert_eq!(frame.hit_test(Point::new(101, 400)), Ok(AccessibleTarget::SelfId));
    }

    #[test]
    fn test_part_outlives_the_frame_handle() {
        let (_, frame) = sample();
        let title = frame.child(ChildId::Child(TitleBar.child_id())).unwrap();
        assert!(title.is_some());
        drop(frame);
        let title = title.unwrap();
        let client = crate::accessibility::AccessibleClient::from_dispatch(&title).unwrap();
        assert!(client.parent().unwrap().is_some());
        assert!(!client.navigate(NavDirection::Left, 0).unwrap().is_nothing());
    }
}
