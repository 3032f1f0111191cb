//! Accessibility tests - the frame composite and custom accessibles, queried
//! through the native `IAccessible` vtable as an assistive tool would.
//!
//! Run with: cargo test --test accessibility_test -- --nocapture

use std::ptr;
use std::sync::{Arc, Mutex};

use comity::accessibility::{
    frame_accessible, Accessible, AccessibleClient, AccessibleProvider, AccessibleTarget,
    ChildHandler, NavDirection, Role, States, DISPID_ACC_NAME,
};
use comity::com::{
    object, ComError, ComResult, IAccessible, IDispatch, Interface, InterfaceExt, E_INVALIDARG,
    E_NOTIMPL, S_FALSE,
};
use comity::dispatch::{DispatchClient, InvokeKind, RawVariant, Variant};
use comity::window::{
    FramePart, Point, Rect, ScriptedWindow, SentMessage, WindowLayout, SC_KEYMENU, WM_SYSCOMMAND,
};

fn sample_frame() -> (Arc<ScriptedWindow>, AccessibleClient) {
    let window = Arc::new(ScriptedWindow::new(WindowLayout::sample()));
    let frame = frame_accessible(window.clone(), None);
    let native = object::expose_as::<IAccessible, _>(frame).unwrap();
    (window, AccessibleClient::new(native))
}

fn part_ptr(client: &AccessibleClient, part: FramePart) -> IDispatch {
    client.child(part.child_id()).unwrap().expect("frame parts are objects")
}

fn assert_reaches(client: &AccessibleClient, target: AccessibleTarget, part: FramePart) {
    match target {
        AccessibleTarget::Object(object) => {
            assert!(object.same_object(&part_ptr(client, part)), "expected {part:?}")
        }
        other => panic!("expected {part:?}, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Frame composite
// ---------------------------------------------------------------------------

#[test]
fn test_frame_reports_seven_children() {
    println!("\n=== Test: Frame Children ===");
    let (_, client) = sample_frame();
    assert_eq!(client.child_count(), Ok(7));

    let roles: Vec<Role> = (1..=7).map(|id| client.role(id).unwrap()).collect();
    assert_eq!(
        roles,
        vec![
            Role::MENU_BAR,
            Role::TITLE_BAR,
            Role::MENU_BAR,
            Role::CLIENT,
            Role::SCROLL_BAR,
            Role::SCROLL_BAR,
            Role::GRIP,
        ]
    );
    assert_eq!(client.name(1), Ok(Some("System".into())));
    assert_eq!(client.name(3), Ok(Some("Application".into())));
    assert_eq!(client.keyboard_shortcut(1), Ok(Some("Alt+Space".into())));
    println!("  [OK] seven parts with their roles");
}

#[test]
fn test_absent_part_is_invisible() {
    let (_, client) = sample_frame();
    let hscroll = FramePart::HorizontalScrollBar.child_id();
    assert_eq!(client.state(hscroll), Ok(States::INVISIBLE));
    assert_eq!(client.location(hscroll), Ok(Rect::default()));
    assert!(!client.state(4).unwrap().contains(States::INVISIBLE));
}

#[test]
fn test_location_reports_width_and_height() {
    let (_, client) = sample_frame();
    assert_eq!(client.location(0), Ok(Rect::new(100, 100, 900, 700)));
    assert_eq!(
        client.location(FramePart::Client.child_id()),
        Ok(Rect::new(104, 144, 880, 680))
    );
}

#[test]
fn test_directional_navigation_from_system_menu() {
    println!("\n=== Test: Spatial Navigation ===");
    let (_, client) = sample_frame();
    let system_menu = FramePart::SystemMenu.child_id();

    let right = client.navigate(NavDirection::Right, system_menu).unwrap();
    assert_reaches(&client, right, FramePart::TitleBar);

    assert_eq!(
        client.navigate(NavDirection::Left, system_menu),
        Ok(AccessibleTarget::Nothing)
    );
    assert_eq!(
        client.navigate(NavDirection::Up, system_menu),
        Ok(AccessibleTarget::Nothing)
    );

    let down = client.navigate(NavDirection::Down, system_menu).unwrap();
    assert_reaches(&client, down, FramePart::MenuBar);
    println!("  [OK] right reaches the title bar, left is empty");
}

#[test]
fn test_navigation_skips_absent_parts() {
    let (_, client) = sample_frame();
    let client_area = FramePart::Client.child_id();
    let vscroll = FramePart::VerticalScrollBar.child_id();

    // The only neighbor below the client area is the missing scroll bar.
    assert_eq!(
        client.navigate(NavDirection::Down, client_area),
        Ok(AccessibleTarget::Nothing)
    );

    let next = client.navigate(NavDirection::Next, vscroll).unwrap();
    assert_reaches(&client, next, FramePart::SizeGrip);

    let previous = client
        .navigate(NavDirection::Previous, FramePart::SizeGrip.child_id())
        .unwrap();
    assert_reaches(&client, previous, FramePart::VerticalScrollBar);

    assert_eq!(
        client.navigate(NavDirection::Previous, FramePart::SystemMenu.child_id()),
        Ok(AccessibleTarget::Nothing)
    );
}

#[test]
fn test_first_and_last_child() {
    let (_, client) = sample_frame();
    let first = client.navigate(NavDirection::FirstChild, 0).unwrap();
    assert_reaches(&client, first, FramePart::SystemMenu);
    let last = client.navigate(NavDirection::LastChild, 0).unwrap();
    assert_reaches(&client, last, FramePart::SizeGrip);

    // Parts have no children of their own.
    assert!(matches!(
        client.navigate(NavDirection::FirstChild, 2),
        Err(ComError::InvalidArgument(_))
    ));
    let title = AccessibleClient::from_dispatch(&part_ptr(&client, FramePart::TitleBar)).unwrap();
    assert_eq!(
        title.navigate(NavDirection::LastChild, 0),
        Ok(AccessibleTarget::Nothing)
    );
}

#[test]
fn test_navigation_from_a_part_object() {
    let (_, client) = sample_frame();
    let title = AccessibleClient::from_dispatch(&part_ptr(&client, FramePart::TitleBar)).unwrap();
    let left = title.navigate(NavDirection::Left, 0).unwrap();
    assert_reaches(&client, left, FramePart::SystemMenu);
}

#[test]
fn test_hit_testing() {
    println!("\n=== Test: Hit Testing ===");
    let (_, client) = sample_frame();

    let icon = client.hit_test(110, 110).unwrap();
    assert_reaches(&client, icon, FramePart::SystemMenu);

    let caption = client.hit_test(500, 110).unwrap();
    assert_reaches(&client, caption, FramePart::TitleBar);

    let body = client.hit_test(300, 300).unwrap();
    assert_reaches(&client, body, FramePart::Client);

    assert_eq!(client.hit_test(101, 400), Ok(AccessibleTarget::SelfId));
    assert_eq!(client.hit_test(5, 5), Ok(AccessibleTarget::Nothing));
    println!("  [OK] icon, caption, client, border and outside");
}

#[test]
fn test_parts_are_stable_and_know_their_parent() {
    let (_, client) = sample_frame();
    let first = part_ptr(&client, FramePart::Client);
    let second = part_ptr(&client, FramePart::Client);
    assert_eq!(first.as_raw(), second.as_raw());

    let part = AccessibleClient::from_dispatch(&first).unwrap();
    let parent = part.parent().unwrap().expect("parts have a parent");
    assert!(parent.same_object(client.as_ptr()));
    assert_eq!(part.child_count(), Ok(0));
}

#[test]
fn test_frame_focus_is_the_client_area() {
    let (window, client) = sample_frame();
    let focus = client.focus().unwrap();
    assert_reaches(&client, focus, FramePart::Client);
    assert!(client.state(0).unwrap().contains(States::FOCUSED));

    window.set_focus(None).unwrap();
    assert_eq!(client.focus(), Ok(AccessibleTarget::Nothing));
}

#[test]
fn test_system_menu_default_action_opens_the_menu() {
    let (window, client) = sample_frame();
    assert_eq!(client.default_action(1), Ok(Some("Open".into())));
    client.do_default_action(1).unwrap();
    assert_eq!(
        window.sent_messages().unwrap(),
        vec![SentMessage {
            message: WM_SYSCOMMAND,
            wparam: SC_KEYMENU,
            lparam: ' ' as isize,
        }]
    );

    // Other parts have no default action.
    assert!(matches!(
        client.do_default_action(2),
        Err(ComError::MemberNotFound(_))
    ));
}

#[test]
fn test_optional_values_report_s_false() {
    let (_, client) = sample_frame();
    let ptr = client.as_ptr();
    let mut out = 0x1 as *mut u16;
    let hr =
        unsafe { (ptr.vtable().get_accDescription)(ptr.as_raw(), RawVariant::i4(0), &mut out) };
    assert_eq!(hr, S_FALSE);
    assert!(out.is_null());
    assert_eq!(client.name(FramePart::SizeGrip.child_id()), Ok(None));
}

#[test]
fn test_malformed_child_ids_are_invalid_arguments() {
    let (_, client) = sample_frame();
    assert!(matches!(client.name(-1), Err(ComError::InvalidArgument(_))));
    assert!(matches!(client.name(8), Err(ComError::InvalidArgument(_))));

    let ptr = client.as_ptr();
    let mut text = Variant::from("1").into_raw();
    let mut out = ptr::null_mut();
    let hr = unsafe { (ptr.vtable().get_accName)(ptr.as_raw(), text, &mut out) };
    assert_eq!(hr, E_INVALIDARG);
    unsafe { text.clear() };
}

/// Reads `accName` with an object reference in the child-id variant.
fn name_by_reference(client: &AccessibleClient, object: IDispatch) -> ComResult<Option<String>> {
    let ptr = client.as_ptr();
    let mut child = Variant::Dispatch(Some(object)).into_raw();
    let mut out = ptr::null_mut();
    let hr = unsafe { (ptr.vtable().get_accName)(ptr.as_raw(), child, &mut out) };
    unsafe { child.clear() };
    comity::com::check(hr)?;
    Ok(unsafe { comity::dispatch::Bstr::from_raw(out) }.map(|b| b.to_string()))
}

#[test]
fn test_self_reference_as_child_id() {
    let (_, client) = sample_frame();
    let me = client.as_ptr().query_interface::<IDispatch>().unwrap();
    assert_eq!(
        name_by_reference(&client, me),
        Ok(Some("Untitled - Notes".into()))
    );
}

#[test]
fn test_part_reference_as_child_id() {
    let (_, client) = sample_frame();
    let title = part_ptr(&client, FramePart::TitleBar);
    assert_eq!(
        name_by_reference(&client, title),
        Ok(Some("Untitled - Notes".into()))
    );
    let menu = part_ptr(&client, FramePart::MenuBar);
    assert_eq!(
        name_by_reference(&client, menu),
        Ok(Some("Application".into()))
    );
}

#[test]
fn test_unrelated_reference_is_an_invalid_child_id() {
    let (_, client) = sample_frame();
    let (_, other_frame) = sample_frame();
    let stranger = part_ptr(&other_frame, FramePart::MenuBar);
    assert!(matches!(
        name_by_reference(&client, stranger),
        Err(ComError::InvalidArgument(_))
    ));
}

#[test]
fn test_part_keeps_working_after_the_frame_is_released() {
    println!("\n=== Test: Part Outlives Frame Client ===");
    let (window, client) = sample_frame();
    let menu = part_ptr(&client, FramePart::SystemMenu);
    drop(client);
    drop(window);

    let part = AccessibleClient::from_dispatch(&menu).unwrap();
    assert_eq!(part.name(0), Ok(Some("System".into())));

    let parent = part.parent().unwrap().expect("parts have a parent");
    let frame = AccessibleClient::from_dispatch(&parent).unwrap();
    assert_eq!(frame.child_count(), Ok(7));

    let right = part.navigate(NavDirection::Right, 0).unwrap();
    match right {
        AccessibleTarget::Object(object) => {
            let title = AccessibleClient::from_dispatch(&object).unwrap();
            assert_eq!(title.role(0), Ok(Role::TITLE_BAR));
        }
        other => panic!("expected the title bar, got {other:?}"),
    }
    println!("  [OK] parent and siblings still resolve");
}

// ---------------------------------------------------------------------------
// Custom accessibles
// ---------------------------------------------------------------------------

struct Playlist {
    name: Mutex<String>,
}

impl AccessibleProvider for Playlist {
    fn name(&self) -> ComResult<Option<String>> {
        Ok(Some(self.name.lock().unwrap().clone()))
    }

    fn role(&self) -> ComResult<Role> {
        Ok(Role::LIST)
    }

    fn bounds(&self) -> ComResult<Rect> {
        Ok(Rect::new(0, 0, 200, 60))
    }

    fn child_count(&self) -> ComResult<i32> {
        Ok(3)
    }

    fn hit_test(&self, point: Point) -> ComResult<AccessibleTarget> {
        if !self.bounds()?.contains(point) {
            return Ok(AccessibleTarget::Nothing);
        }
        Ok(AccessibleTarget::Child(point.y / 20 + 1))
    }

    fn set_name(&self, name: &str) -> ComResult<()> {
        *self.name.lock().unwrap() = name.to_string();
        Ok(())
    }
}

struct Tracks;

impl ChildHandler for Tracks {
    fn name(&self, child: i32) -> ComResult<Option<String>> {
        Ok(Some(format!("Track {child}")))
    }

    fn role(&self, _child: i32) -> ComResult<Role> {
        Ok(Role::LIST_ITEM)
    }

    fn state(&self, child: i32) -> ComResult<States> {
        Ok(States::SELECTABLE | States::when(child == 1, States::SELECTED))
    }

    fn bounds(&self, child: i32) -> ComResult<Rect> {
        let top = (child - 1) * 20;
        Ok(Rect::new(0, top, 200, top + 20))
    }
}

fn playlist(with_tracks: bool) -> AccessibleClient {
    let provider = Playlist {
        name: Mutex::new("Queue".to_string()),
    };
    let accessible = if with_tracks {
        Accessible::new(provider).with_children(Tracks)
    } else {
        Accessible::new(provider)
    };
    AccessibleClient::new(object::expose_as(Arc::new(accessible)).unwrap())
}

#[test]
fn test_simple_children_are_served_by_the_handler() {
    let client = playlist(true);
    assert_eq!(client.name(2), Ok(Some("Track 2".into())));
    assert_eq!(client.role(3), Ok(Role::LIST_ITEM));
    assert!(client.state(1).unwrap().contains(States::SELECTED));
    assert_eq!(client.location(3), Ok(Rect::new(0, 40, 200, 60)));
    assert_eq!(client.child(2), Ok(None));
    assert_eq!(client.hit_test(10, 45), Ok(AccessibleTarget::Child(3)));
}

#[test]
fn test_children_without_handler_are_not_supported() {
    let client = playlist(false);
    assert_eq!(client.name(0), Ok(Some("Queue".into())));
    assert_eq!(client.name(1), Err(ComError::NotImplemented));

    let ptr = client.as_ptr();
    let mut out = RawVariant::empty();
    let hr = unsafe { (ptr.vtable().get_accRole)(ptr.as_raw(), RawVariant::i4(2), &mut out) };
    assert_eq!(hr, E_NOTIMPL);
}

#[test]
fn test_put_acc_name_needs_the_property_put_tag() {
    println!("\n=== Test: put_accName Through Dispatch ===");
    let client = playlist(true);
    let dispatch = DispatchClient::new(client.as_ptr().query_interface().unwrap());

    let untagged = dispatch.invoke_raw(
        DISPID_ACC_NAME,
        InvokeKind::PROPERTY_PUT,
        &[Variant::from("Favorites")],
        &[],
    );
    assert_eq!(untagged, Err(ComError::ParameterNotFound { index: 0 }));
    assert_eq!(client.name(0), Ok(Some("Queue".into())));

    dispatch
        .put(DISPID_ACC_NAME, &[], Variant::from("Favorites"))
        .unwrap();
    assert_eq!(client.name(0), Ok(Some("Favorites".into())));

    // The vtable setter reaches the same provider.
    client.set_name(0, "Later").unwrap();
    assert_eq!(client.name(0), Ok(Some("Later".into())));
    println!("  [OK] only the tagged put reaches the setter");
}
