//! Provides the vocabulary of the accessibility contract: roles, states,
//! navigation directions and the child identifier union.

use std::fmt;
use std::ops::BitOr;

use serde::Serialize;

use crate::com::{ComError, ComResult, IDispatch};
use crate::dispatch::{DispId, Variant};

/// The child id addressing the object itself.
pub const CHILDID_SELF: i32 = 0;

pub const DISPID_ACC_PARENT: DispId = -5000;
pub const DISPID_ACC_CHILDCOUNT: DispId = -5001;
pub const DISPID_ACC_CHILD: DispId = -5002;
pub const DISPID_ACC_NAME: DispId = -5003;
pub const DISPID_ACC_VALUE: DispId = -5004;
pub const DISPID_ACC_DESCRIPTION: DispId = -5005;
pub const DISPID_ACC_ROLE: DispId = -5006;
pub const DISPID_ACC_STATE: DispId = -5007;
pub const DISPID_ACC_HELP: DispId = -5008;
pub const DISPID_ACC_HELPTOPIC: DispId = -5009;
pub const DISPID_ACC_KEYBOARDSHORTCUT: DispId = -5010;
pub const DISPID_ACC_FOCUS: DispId = -5011;
pub const DISPID_ACC_SELECTION: DispId = -5012;
pub const DISPID_ACC_DEFAULTACTION: DispId = -5013;
pub const DISPID_ACC_SELECT: DispId = -5014;
pub const DISPID_ACC_LOCATION: DispId = -5015;
pub const DISPID_ACC_NAVIGATE: DispId = -5016;
pub const DISPID_ACC_HITTEST: DispId = -5017;
pub const DISPID_ACC_DODEFAULTACTION: DispId = -5018;

/// An object role (`ROLE_SYSTEM_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Role(pub u32);

impl Role {
    pub const TITLE_BAR: Role = Role(0x01);
    pub const MENU_BAR: Role = Role(0x02);
    pub const SCROLL_BAR: Role = Role(0x03);
    pub const GRIP: Role = Role(0x04);
    pub const WINDOW: Role = Role(0x09);
    pub const CLIENT: Role = Role(0x0A);
    pub const MENU_POPUP: Role = Role(0x0B);
    pub const MENU_ITEM: Role = Role(0x0C);
    pub const TEXT: Role = Role(0x2A);
    pub const PUSH_BUTTON: Role = Role(0x2B);
    pub const LIST: Role = Role(0x21);
    pub const LIST_ITEM: Role = Role(0x22);

    pub fn name(self) -> &'static str {
        match self {
            Role::TITLE_BAR => "title bar",
            Role::MENU_BAR => "menu bar",
            Role::SCROLL_BAR => "scroll bar",
            Role::GRIP => "grip",
            Role::WINDOW => "window",
            Role::CLIENT => "client",
            Role::MENU_POPUP => "popup menu",
            Role::MENU_ITEM => "menu item",
            Role::TEXT => "editable text",
            Role::PUSH_BUTTON => "push button",
            Role::LIST => "list",
            Role::LIST_ITEM => "list item",
            _ => "unknown",
        }
    }
}

/// A set of object state flags (`STATE_SYSTEM_*`).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct States(pub u32);

impl States {
    pub const NORMAL: States = States(0);
    pub const UNAVAILABLE: States = States(0x1);
    pub const SELECTED: States = States(0x2);
    pub const FOCUSED: States = States(0x4);
    pub const PRESSED: States = States(0x8);
    pub const READONLY: States = States(0x40);
    pub const INVISIBLE: States = States(0x8000);
    pub const OFFSCREEN: States = States(0x10000);
    pub const SIZEABLE: States = States(0x20000);
    pub const MOVEABLE: States = States(0x40000);
    pub const FOCUSABLE: States = States(0x100000);
    pub const SELECTABLE: States = States(0x200000);
    pub const HASPOPUP: States = States(0x40000000);

    pub fn contains(self, other: States) -> bool {
        self.0 & other.0 == other.0
    }

    /// `other` if `condition` holds, else no flags.
    pub fn when(condition: bool, other: States) -> States {
        if condition {
            other
        } else {
            States::NORMAL
        }
    }
}

impl BitOr for States {
    type Output = States;

    fn bitor(self, rhs: States) -> States {
        States(self.0 | rhs.0)
    }
}

impl fmt::Debug for States {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "States({:#x})", self.0)
    }
}

/// A navigation direction (`NAVDIR_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NavDirection {
    Up = 1,
    Down = 2,
    Left = 3,
    Right = 4,
    Next = 5,
    Previous = 6,
    FirstChild = 7,
    LastChild = 8,
}

impl NavDirection {
    pub const ALL: [NavDirection; 8] = [
        NavDirection::Up,
        NavDirection::Down,
        NavDirection::Left,
        NavDirection::Right,
        NavDirection::Next,
        NavDirection::Previous,
        NavDirection::FirstChild,
        NavDirection::LastChild,
    ];

    /// Whether the direction is spatial (up, down, left, right).
    pub fn is_spatial(self) -> bool {
        matches!(
            self,
            NavDirection::Up | NavDirection::Down | NavDirection::Left | NavDirection::Right
        )
    }
}

impl TryFrom<i32> for NavDirection {
    type Error = ComError;

    fn try_from(value: i32) -> ComResult<Self> {
        usize::try_from(value)
            .ok()
            .and_then(|v| v.checked_sub(1))
            .and_then(|i| Self::ALL.get(i).copied())
            .ok_or(ComError::InvalidArgument("unknown navigation direction"))
    }
}

/// Selection flags (`SELFLAG_*`) passed to `accSelect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionFlags(pub i32);

impl SelectionFlags {
    pub const NONE: SelectionFlags = SelectionFlags(0);
    pub const TAKE_FOCUS: SelectionFlags = SelectionFlags(0x1);
    pub const TAKE_SELECTION: SelectionFlags = SelectionFlags(0x2);
    pub const EXTEND_SELECTION: SelectionFlags = SelectionFlags(0x4);
    pub const ADD_SELECTION: SelectionFlags = SelectionFlags(0x8);
    pub const REMOVE_SELECTION: SelectionFlags = SelectionFlags(0x10);

    pub fn contains(self, other: SelectionFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

/// A normalized child identifier addressing a simple element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChildId {
    SelfId,
    /// A positive child id understood by the child handler.
    Child(i32),
}

impl ChildId {
    /// Normalizes a raw identifier.
    ///
    /// An omitted argument or `0` means `SelfId`. An object reference is
    /// mapped by `resolve_object`, which recognizes the object itself and its
    /// composite children. Negative ids, unrelated objects and any other
    /// variant shape are rejected.
    pub fn from_variant(
        value: &Variant,
        resolve_object: impl Fn(&IDispatch) -> Option<ChildId>,
    ) -> ComResult<Self> {
        match value {
            Variant::Empty | Variant::Missing => Ok(ChildId::SelfId),
            Variant::I4(CHILDID_SELF) => Ok(ChildId::SelfId),
            Variant::I4(id) if *id > 0 => Ok(ChildId::Child(*id)),
            Variant::Dispatch(Some(p)) => resolve_object(p)
                .ok_or(ComError::InvalidArgument("object is neither this one nor a child")),
            _ => Err(ComError::InvalidArgument("malformed child identifier")),
        }
    }

    pub fn as_i32(self) -> i32 {
        match self {
            ChildId::SelfId => CHILDID_SELF,
            ChildId::Child(id) => id,
        }
    }
}

/// The result of navigation, hit-testing, focus and selection queries.
#[derive(Debug, Clone, PartialEq)]
pub enum AccessibleTarget {
    /// Nothing there: reported as `VT_EMPTY` with `S_FALSE`.
    Nothing,
    SelfId,
    /// A simple child addressed by id.
    Child(i32),
    /// A composite child with its own accessible object.
    Object(IDispatch),
}

impl AccessibleTarget {
    pub fn is_nothing(&self) -> bool {
        matches!(self, AccessibleTarget::Nothing)
    }

    pub fn into_variant(self) -> Variant {
        match self {
            AccessibleTarget::Nothing => Variant::Empty,
            AccessibleTarget::SelfId => Variant::I4(CHILDID_SELF),
            AccessibleTarget::Child(id) => Variant::I4(id),
            AccessibleTarget::Object(p) => Variant::Dispatch(Some(p)),
        }
    }

    /// Interprets a value returned by a native accessible.
    pub fn from_variant(value: Variant) -> ComResult<Self> {
        match value {
            Variant::Empty => Ok(AccessibleTarget::Nothing),
            Variant::I4(CHILDID_SELF) => Ok(AccessibleTarget::SelfId),
            Variant::I4(id) => Ok(AccessibleTarget::Child(id)),
            Variant::Dispatch(Some(p)) => Ok(AccessibleTarget::Object(p)),
            _ => Err(ComError::TypeMismatch { index: 0 }),
        }
    }
}
