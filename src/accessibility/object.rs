//! Provides [`Accessible`], a runtime object exposed as `IAccessible` and
//! `IDispatch`.
//!
//! An `Accessible` answers for itself through an [`AccessibleProvider`] and
//! forwards questions about children (integer child ids) to an optional
//! [`ChildHandler`]. Every call first normalizes the child identifier;
//! malformed identifiers are rejected before anything else runs. A reference
//! to one of the object's composite children normalizes to that child's id.
//!
//! # Examples
//! ```
//! use std::sync::Arc;
//!
//! use comity::accessibility::{Accessible, AccessibleProvider, ChildId, Role};
//! use comity::com::ComResult;
//! use comity::window::Rect;
//!
//! struct Label;
//!
//! impl AccessibleProvider for Label {
//!     fn name(&self) -> ComResult<Option<String>> {
//!         Ok(Some("Status".into()))
//!     }
//!     fn role(&self) -> ComResult<Role> {
//!         Ok(Role::TEXT)
//!     }
//!     fn bounds(&self) -> ComResult<Rect> {
//!         Ok(Rect::new(0, 0, 80, 16))
//!     }
//! }
//!
//! let label = Arc::new(Accessible::new(Label));
//! assert_eq!(label.name(ChildId::SelfId).unwrap().as_deref(), Some("Status"));
//! assert!(label.description(ChildId::SelfId).unwrap().is_none());
//! ```

use std::ffi::c_void;
use std::ptr;
use std::sync::Arc;

use super::types::*;
use crate::com::object::{self, InterfaceEntry};
use crate::com::{
    ComError, ComObject, ComResult, IAccessible, IAccessibleVtbl, IDispatch, IDispatchVtbl,
    Implements, Interface, InterfaceExt, E_POINTER, HRESULT, S_FALSE, S_OK,
};
use crate::dispatch::{
    bstr, Arguments, Bstr, DispatchTableBuilder, Dispatchable, RawVariant, Variant,
};
use crate::window::{Point, Rect};

/// Answers accessibility queries about one object.
///
/// Nullable attributes return `Ok(None)`, which reaches native callers as
/// `S_FALSE` ("no value") rather than as a failure.
pub trait AccessibleProvider: Send + Sync + 'static {
    fn name(&self) -> ComResult<Option<String>> {
        Ok(None)
    }

    fn value(&self) -> ComResult<Option<String>> {
        Ok(None)
    }

    fn description(&self) -> ComResult<Option<String>> {
        Ok(None)
    }

    fn help(&self) -> ComResult<Option<String>> {
        Ok(None)
    }

    fn keyboard_shortcut(&self) -> ComResult<Option<String>> {
        Ok(None)
    }

    fn default_action(&self) -> ComResult<Option<String>> {
        Ok(None)
    }

    fn role(&self) -> ComResult<Role>;

    fn state(&self) -> ComResult<States> {
        Ok(States::NORMAL)
    }

    /// Bounds in screen coordinates.
    fn bounds(&self) -> ComResult<Rect>;

    fn parent(&self) -> ComResult<Option<IDispatch>> {
        Ok(None)
    }

    fn child_count(&self) -> ComResult<i32> {
        Ok(0)
    }

    /// The accessible object of child `id`, or `None` for a simple element.
    fn child(&self, _id: i32) -> ComResult<Option<IDispatch>> {
        Ok(None)
    }

    fn focus(&self) -> ComResult<AccessibleTarget> {
        Ok(AccessibleTarget::Nothing)
    }

    fn selection(&self) -> ComResult<AccessibleTarget> {
        Ok(AccessibleTarget::Nothing)
    }

    /// Navigates from `start`, which is already validated.
    fn navigate(&self, _direction: NavDirection, _start: ChildId) -> ComResult<AccessibleTarget> {
        Ok(AccessibleTarget::Nothing)
    }

    fn hit_test(&self, point: Point) -> ComResult<AccessibleTarget> {
        Ok(if self.bounds()?.contains(point) {
            AccessibleTarget::SelfId
        } else {
            AccessibleTarget::Nothing
        })
    }

    fn do_default_action(&self) -> ComResult<()> {
        Err(ComError::MemberNotFound(DISPID_ACC_DODEFAULTACTION))
    }

    fn select(&self, _flags: SelectionFlags) -> ComResult<()> {
        Err(ComError::NotImplemented)
    }

    fn set_name(&self, _name: &str) -> ComResult<()> {
        Err(ComError::NotImplemented)
    }

    fn set_value(&self, _value: &str) -> ComResult<()> {
        Err(ComError::NotImplemented)
    }
}

/// Answers accessibility queries about simple children addressed by id.
pub trait ChildHandler: Send + Sync + 'static {
    fn name(&self, _child: i32) -> ComResult<Option<String>> {
        Ok(None)
    }

    fn value(&self, _child: i32) -> ComResult<Option<String>> {
        Ok(None)
    }

    fn description(&self, _child: i32) -> ComResult<Option<String>> {
        Ok(None)
    }

    fn help(&self, _child: i32) -> ComResult<Option<String>> {
        Ok(None)
    }

    fn keyboard_shortcut(&self, _child: i32) -> ComResult<Option<String>> {
        Ok(None)
    }

    fn default_action(&self, _child: i32) -> ComResult<Option<String>> {
        Ok(None)
    }

    fn role(&self, child: i32) -> ComResult<Role>;

    fn state(&self, _child: i32) -> ComResult<States> {
        Ok(States::NORMAL)
    }

    fn bounds(&self, child: i32) -> ComResult<Rect>;

    fn do_default_action(&self, _child: i32) -> ComResult<()> {
        Err(ComError::MemberNotFound(DISPID_ACC_DODEFAULTACTION))
    }

    fn select(&self, _child: i32, _flags: SelectionFlags) -> ComResult<()> {
        Err(ComError::NotImplemented)
    }

    fn set_name(&self, _child: i32, _name: &str) -> ComResult<()> {
        Err(ComError::NotImplemented)
    }

    fn set_value(&self, _child: i32, _value: &str) -> ComResult<()> {
        Err(ComError::NotImplemented)
    }
}

/// A runtime object implementing the accessibility contract.
pub struct Accessible {
    provider: Box<dyn AccessibleProvider>,
    children: Option<Box<dyn ChildHandler>>,
}

impl Accessible {
    pub fn new(provider: impl AccessibleProvider) -> Self {
        Self {
            provider: Box::new(provider),
            children: None,
        }
    }

    /// Attaches the collaborator answering for simple children.
    pub fn with_children(mut self, handler: impl ChildHandler) -> Self {
        self.children = Some(Box::new(handler));
        self
    }

    pub fn provider(&self) -> &dyn AccessibleProvider {
        self.provider.as_ref()
    }

    /// Normalizes a child identifier supplied by a caller.
    pub fn normalize(self: &Arc<Self>, value: &Variant) -> ComResult<ChildId> {
        ChildId::from_variant(value, |p| self.resolve_reference(p))
    }

    unsafe fn normalize_raw(self: &Arc<Self>, raw: &RawVariant) -> ComResult<ChildId> {
        let value = Variant::from_raw(raw)
            .map_err(|_| ComError::InvalidArgument("malformed child identifier"))?;
        self.normalize(&value)
    }

    /// Maps a reference to this object or to one of its composite children.
    fn resolve_reference(self: &Arc<Self>, other: &IDispatch) -> Option<ChildId> {
        let theirs = other.identity().ok()?;
        if object::identity_pointer(self).is_some_and(|mine| mine.as_ptr() == theirs.as_raw()) {
            return Some(ChildId::SelfId);
        }
        let count = self.provider.child_count().ok()?;
        (1..=count)
            .find(|&id| {
                matches!(self.provider.child(id), Ok(Some(child)) if child.same_object(&theirs))
            })
            .map(ChildId::Child)
    }

    /// Sends `SelfId` to the provider and child ids to the child handler.
    fn route<R>(
        &self,
        child: ChildId,
        own: impl FnOnce(&dyn AccessibleProvider) -> ComResult<R>,
        delegated: impl FnOnce(&dyn ChildHandler, i32) -> ComResult<R>,
    ) -> ComResult<R> {
        match child {
            ChildId::SelfId => own(self.provider.as_ref()),
            ChildId::Child(id) => {
                let handler = self.children.as_deref().ok_or(ComError::NotImplemented)?;
                self.check_child(id)?;
                delegated(handler, id)
            }
        }
    }

    fn check_child(&self, id: i32) -> ComResult<()> {
        if id > self.provider.child_count()? {
            return Err(ComError::InvalidArgument("child id out of range"));
        }
        Ok(())
    }

    pub fn name(&self, child: ChildId) -> ComResult<Option<String>> {
        self.route(child, |p| p.name(), |h, id| h.name(id))
    }

    pub fn value(&self, child: ChildId) -> ComResult<Option<String>> {
        self.route(child, |p| p.value(), |h, id| h.value(id))
    }

    pub fn description(&self, child: ChildId) -> ComResult<Option<String>> {
        self.route(child, |p| p.description(), |h, id| h.description(id))
    }

    pub fn help(&self, child: ChildId) -> ComResult<Option<String>> {
        self.route(child, |p| p.help(), |h, id| h.help(id))
    }

    pub fn keyboard_shortcut(&self, child: ChildId) -> ComResult<Option<String>> {
        self.route(child, |p| p.keyboard_shortcut(), |h, id| h.keyboard_shortcut(id))
    }

    pub fn default_action(&self, child: ChildId) -> ComResult<Option<String>> {
        self.route(child, |p| p.default_action(), |h, id| h.default_action(id))
    }

    pub fn role(&self, child: ChildId) -> ComResult<Role> {
        self.route(child, |p| p.role(), |h, id| h.role(id))
    }

    pub fn state(&self, child: ChildId) -> ComResult<States> {
        self.route(child, |p| p.state(), |h, id| h.state(id))
    }

    pub fn location(&self, child: ChildId) -> ComResult<Rect> {
        self.route(child, |p| p.bounds(), |h, id| h.bounds(id))
    }

    pub fn do_default_action(&self, child: ChildId) -> ComResult<()> {
        self.route(child, |p| p.do_default_action(), |h, id| h.do_default_action(id))
    }

    pub fn select(&self, flags: SelectionFlags, child: ChildId) -> ComResult<()> {
        self.route(child, |p| p.select(flags), |h, id| h.select(id, flags))
    }

    pub fn set_name(&self, child: ChildId, name: &str) -> ComResult<()> {
        self.route(child, |p| p.set_name(name), |h, id| h.set_name(id, name))
    }

    pub fn set_value(&self, child: ChildId, value: &str) -> ComResult<()> {
        self.route(child, |p| p.set_value(value), |h, id| h.set_value(id, value))
    }

    pub fn parent(&self) -> ComResult<Option<IDispatch>> {
        self.provider.parent()
    }

    pub fn child_count(&self) -> ComResult<i32> {
        self.provider.child_count()
    }

    /// The accessible object of a composite child; `None` for simple ones.
    pub fn child(&self, child: ChildId) -> ComResult<Option<IDispatch>> {
        match child {
            ChildId::SelfId => Err(ComError::InvalidArgument("a child id is required")),
            ChildId::Child(id) => {
                self.check_child(id)?;
                self.provider.child(id)
            }
        }
    }

    pub fn focus(&self) -> ComResult<AccessibleTarget> {
        self.provider.focus()
    }

    pub fn selection(&self) -> ComResult<AccessibleTarget> {
        self.provider.selection()
    }

    pub fn navigate(&self, direction: NavDirection, start: ChildId) -> ComResult<AccessibleTarget> {
        if let ChildId::Child(id) = start {
            self.check_child(id)?;
        }
        self.provider.navigate(direction, start)
    }

    pub fn hit_test(&self, point: Point) -> ComResult<AccessibleTarget> {
        self.provider.hit_test(point)
    }

    fn child_arg(self: &Arc<Self>, args: &Arguments, position: usize) -> ComResult<ChildId> {
        self.normalize(args.get_or_empty(position))
    }
}

fn text_of(value: &Variant) -> ComResult<&str> {
    value.as_str().ok_or(ComError::TypeMismatch { index: 0 })
}

impl ComObject for Accessible {
    fn interfaces(&self) -> Vec<InterfaceEntry> {
        vec![
            InterfaceEntry::of::<IAccessible, Self>(),
            InterfaceEntry::of::<IDispatch, Self>(),
        ]
    }
}

impl Dispatchable for Accessible {
    fn register(table: &mut DispatchTableBuilder<Self>) {
        table
            .member("accParent")
            .dispid(DISPID_ACC_PARENT)
            .getter(|acc, _| Ok(acc.parent()?.map_or(Variant::Empty, Variant::from)));
        table
            .member("accChildCount")
            .dispid(DISPID_ACC_CHILDCOUNT)
            .getter(|acc, _| Ok(Variant::I4(acc.child_count()?)));
        table
            .member("accChild")
            .dispid(DISPID_ACC_CHILD)
            .parameters(&["varChild"])
            .getter(|acc, args| {
                let child = acc.child_arg(args, 0)?;
                Ok(acc.child(child)?.map_or(Variant::Empty, Variant::from))
            });
        table
            .member("accName")
            .dispid(DISPID_ACC_NAME)
            .parameters(&["varChild"])
            .getter(|acc, args| Ok(acc.name(acc.child_arg(args, 0)?)?.into()))
            .setter(|acc, args, value| acc.set_name(acc.child_arg(args, 0)?, text_of(value)?));
        table
            .member("accValue")
            .dispid(DISPID_ACC_VALUE)
            .parameters(&["varChild"])
            .getter(|acc, args| Ok(acc.value(acc.child_arg(args, 0)?)?.into()))
            .setter(|acc, args, value| acc.set_value(acc.child_arg(args, 0)?, text_of(value)?));
        table
            .member("accDescription")
            .dispid(DISPID_ACC_DESCRIPTION)
            .parameters(&["varChild"])
            .getter(|acc, args| Ok(acc.description(acc.child_arg(args, 0)?)?.into()));
        table
            .member("accRole")
            .dispid(DISPID_ACC_ROLE)
            .parameters(&["varChild"])
            .getter(|acc, args| Ok(Variant::I4(acc.role(acc.child_arg(args, 0)?)?.0 as i32)));
        table
            .member("accState")
            .dispid(DISPID_ACC_STATE)
            .parameters(&["varChild"])
            .getter(|acc, args| Ok(Variant::I4(acc.state(acc.child_arg(args, 0)?)?.0 as i32)));
        table
            .member("accHelp")
            .dispid(DISPID_ACC_HELP)
            .parameters(&["varChild"])
            .getter(|acc, args| Ok(acc.help(acc.child_arg(args, 0)?)?.into()));
        table
            .member("accHelpTopic")
            .dispid(DISPID_ACC_HELPTOPIC)
            .parameters(&["pszHelpFile", "varChild"])
            .getter(|acc, args| {
                acc.child_arg(args, 1)?;
                Ok(Variant::Empty)
            });
        table
            .member("accKeyboardShortcut")
            .dispid(DISPID_ACC_KEYBOARDSHORTCUT)
            .parameters(&["varChild"])
            .getter(|acc, args| Ok(acc.keyboard_shortcut(acc.child_arg(args, 0)?)?.into()));
        table
            .member("accFocus")
            .dispid(DISPID_ACC_FOCUS)
            .getter(|acc, _| Ok(acc.focus()?.into_variant()));
        table
            .member("accSelection")
            .dispid(DISPID_ACC_SELECTION)
            .getter(|acc, _| Ok(acc.selection()?.into_variant()));
        table
            .member("accDefaultAction")
            .dispid(DISPID_ACC_DEFAULTACTION)
            .parameters(&["varChild"])
            .getter(|acc, args| Ok(acc.default_action(acc.child_arg(args, 0)?)?.into()));
        table
            .member("accSelect")
            .dispid(DISPID_ACC_SELECT)
            .parameters(&["flagsSelect", "varChild"])
            .method(|acc, args| {
                let flags = SelectionFlags(args.i32(0)?);
                acc.select(flags, acc.child_arg(args, 1)?)?;
                Ok(Variant::Empty)
            });
        table
            .member("accLocation")
            .dispid(DISPID_ACC_LOCATION)
            .parameters(&["pxLeft", "pyTop", "pcxWidth", "pcyHeight", "varChild"])
            .method(|acc, args| {
                let outs = [args.i32_out(0)?, args.i32_out(1)?, args.i32_out(2)?, args.i32_out(3)?];
                let rect = acc.location(acc.child_arg(args, 4)?)?;
                let values = [rect.left, rect.top, rect.width(), rect.height()];
                for (out, value) in outs.iter().zip(values) {
                    // SAFETY: the caller passed these by reference for writing.
                    unsafe { *out.as_ptr() = value };
                }
                Ok(Variant::Empty)
            });
        table
            .member("accNavigate")
            .dispid(DISPID_ACC_NAVIGATE)
            .parameters(&["navDir", "varStart"])
            .method(|acc, args| {
                let direction = NavDirection::try_from(args.i32(0)?)?;
                let start = acc.child_arg(args, 1)?;
                Ok(acc.navigate(direction, start)?.into_variant())
            });
        table
            .member("accHitTest")
            .dispid(DISPID_ACC_HITTEST)
            .parameters(&["xLeft", "yTop"])
            .method(|acc, args| {
                let point = Point::new(args.i32(0)?, args.i32(1)?);
                Ok(acc.hit_test(point)?.into_variant())
            });
        table
            .member("accDoDefaultAction")
            .dispid(DISPID_ACC_DODEFAULTACTION)
            .parameters(&["varChild"])
            .method(|acc, args| {
                acc.do_default_action(acc.child_arg(args, 0)?)?;
                Ok(Variant::Empty)
            });
    }
}

impl Implements<IAccessible> for Accessible {
    fn vtable() -> IAccessibleVtbl {
        IAccessibleVtbl {
            base: IDispatchVtbl::new::<Accessible>(),
            get_accParent: get_acc_parent,
            get_accChildCount: get_acc_child_count,
            get_accChild: get_acc_child,
            get_accName: get_acc_name,
            get_accValue: get_acc_value,
            get_accDescription: get_acc_description,
            get_accRole: get_acc_role,
            get_accState: get_acc_state,
            get_accHelp: get_acc_help,
            get_accHelpTopic: get_acc_help_topic,
            get_accKeyboardShortcut: get_acc_keyboard_shortcut,
            get_accFocus: get_acc_focus,
            get_accSelection: get_acc_selection,
            get_accDefaultAction: get_acc_default_action,
            accSelect: acc_select,
            accLocation: acc_location,
            accNavigate: acc_navigate,
            accHitTest: acc_hit_test,
            accDoDefaultAction: acc_do_default_action,
            put_accName: put_acc_name,
            put_accValue: put_acc_value,
        }
    }
}

// ---------------------------------------------------------------------------
// IAccessible thunks
// ---------------------------------------------------------------------------

type StringGetter = fn(&Accessible, ChildId) -> ComResult<Option<String>>;

unsafe fn string_property(
    this: *mut c_void,
    var_child: RawVariant,
    out: *mut *mut u16,
    get: StringGetter,
) -> HRESULT {
    if out.is_null() {
        return E_POINTER;
    }
    *out = ptr::null_mut();
    com_method!(this, inner: Accessible => {
        let child = inner.normalize_raw(&var_child)?;
        Ok(match get(inner, child)? {
            Some(text) => {
                *out = Bstr::new(&text).into_raw();
                S_OK
            }
            None => S_FALSE,
        })
    })
}

unsafe fn write_target(out: *mut RawVariant, target: AccessibleTarget) -> HRESULT {
    let nothing = target.is_nothing();
    *out = target.into_variant().into_raw();
    if nothing {
        S_FALSE
    } else {
        S_OK
    }
}

unsafe extern "system" fn get_acc_parent(this: *mut c_void, out: *mut *mut c_void) -> HRESULT {
    if out.is_null() {
        return E_POINTER;
    }
    *out = ptr::null_mut();
    com_method!(this, inner: Accessible => {
        Ok(match inner.parent()? {
            Some(parent) => {
                *out = parent.into_raw();
                S_OK
            }
            None => S_FALSE,
        })
    })
}

unsafe extern "system" fn get_acc_child_count(this: *mut c_void, out: *mut i32) -> HRESULT {
    if out.is_null() {
        return E_POINTER;
    }
    *out = 0;
    com_method_result!(this, inner: Accessible => {
        *out = inner.child_count()?;
        Ok(())
    })
}

unsafe extern "system" fn get_acc_child(
    this: *mut c_void,
    var_child: RawVariant,
    out: *mut *mut c_void,
) -> HRESULT {
    if out.is_null() {
        return E_POINTER;
    }
    *out = ptr::null_mut();
    com_method!(this, inner: Accessible => {
        let child = inner.normalize_raw(&var_child)?;
        Ok(match inner.child(child)? {
            Some(object) => {
                *out = object.into_raw();
                S_OK
            }
            None => S_FALSE,
        })
    })
}

unsafe extern "system" fn get_acc_name(
    this: *mut c_void,
    var_child: RawVariant,
    out: *mut *mut u16,
) -> HRESULT {
    string_property(this, var_child, out, Accessible::name)
}

unsafe extern "system" fn get_acc_value(
    this: *mut c_void,
    var_child: RawVariant,
    out: *mut *mut u16,
) -> HRESULT {
    string_property(this, var_child, out, Accessible::value)
}

unsafe extern "system" fn get_acc_description(
    this: *mut c_void,
    var_child: RawVariant,
    out: *mut *mut u16,
) -> HRESULT {
    string_property(this, var_child, out, Accessible::description)
}

unsafe extern "system" fn get_acc_help(
    this: *mut c_void,
    var_child: RawVariant,
    out: *mut *mut u16,
) -> HRESULT {
    string_property(this, var_child, out, Accessible::help)
}

unsafe extern "system" fn get_acc_keyboard_shortcut(
    this: *mut c_void,
    var_child: RawVariant,
    out: *mut *mut u16,
) -> HRESULT {
    string_property(this, var_child, out, Accessible::keyboard_shortcut)
}

unsafe extern "system" fn get_acc_default_action(
    this: *mut c_void,
    var_child: RawVariant,
    out: *mut *mut u16,
) -> HRESULT {
    string_property(this, var_child, out, Accessible::default_action)
}

unsafe extern "system" fn get_acc_role(
    this: *mut c_void,
    var_child: RawVariant,
    out: *mut RawVariant,
) -> HRESULT {
    if out.is_null() {
        return E_POINTER;
    }
    *out = RawVariant::empty();
    com_method_result!(this, inner: Accessible => {
        let role = inner.role(inner.normalize_raw(&var_child)?)?;
        *out = RawVariant::i4(role.0 as i32);
        Ok(())
    })
}

unsafe extern "system" fn get_acc_state(
    this: *mut c_void,
    var_child: RawVariant,
    out: *mut RawVariant,
) -> HRESULT {
    if out.is_null() {
        return E_POINTER;
    }
    *out = RawVariant::empty();
    com_method_result!(this, inner: Accessible => {
        let state = inner.state(inner.normalize_raw(&var_child)?)?;
        *out = RawVariant::i4(state.0 as i32);
        Ok(())
    })
}

unsafe extern "system" fn get_acc_help_topic(
    this: *mut c_void,
    help_file: *mut *mut u16,
    var_child: RawVariant,
    topic: *mut i32,
) -> HRESULT {
    if help_file.is_null() || topic.is_null() {
        return E_POINTER;
    }
    *help_file = ptr::null_mut();
    *topic = 0;
    com_method!(this, inner: Accessible => {
        inner.normalize_raw(&var_child)?;
        Ok(S_FALSE)
    })
}

unsafe extern "system" fn get_acc_focus(this: *mut c_void, out: *mut RawVariant) -> HRESULT {
    if out.is_null() {
        return E_POINTER;
    }
    *out = RawVariant::empty();
    com_method!(this, inner: Accessible => Ok(write_target(out, inner.focus()?)))
}

unsafe extern "system" fn get_acc_selection(this: *mut c_void, out: *mut RawVariant) -> HRESULT {
    if out.is_null() {
        return E_POINTER;
    }
    *out = RawVariant::empty();
    com_method!(this, inner: Accessible => Ok(write_target(out, inner.selection()?)))
}

unsafe extern "system" fn acc_select(
    this: *mut c_void,
    flags: i32,
    var_child: RawVariant,
) -> HRESULT {
    com_method_result!(this, inner: Accessible => {
        let child = inner.normalize_raw(&var_child)?;
        inner.select(SelectionFlags(flags), child)
    })
}

unsafe extern "system" fn acc_location(
    this: *mut c_void,
    left: *mut i32,
    top: *mut i32,
    width: *mut i32,
    height: *mut i32,
    var_child: RawVariant,
) -> HRESULT {
    if left.is_null() || top.is_null() || width.is_null() || height.is_null() {
        return E_POINTER;
    }
    *left = 0;
    *top = 0;
    *width = 0;
    *height = 0;
    com_method_result!(this, inner: Accessible => {
        let rect = inner.location(inner.normalize_raw(&var_child)?)?;
        *left = rect.left;
        *top = rect.top;
        *width = rect.width();
        *height = rect.height();
        Ok(())
    })
}

unsafe extern "system" fn acc_navigate(
    this: *mut c_void,
    direction: i32,
    var_start: RawVariant,
    out: *mut RawVariant,
) -> HRESULT {
    if out.is_null() {
        return E_POINTER;
    }
    *out = RawVariant::empty();
    com_method!(this, inner: Accessible => {
        let direction = NavDirection::try_from(direction)?;
        let start = inner.normalize_raw(&var_start)?;
        Ok(write_target(out, inner.navigate(direction, start)?))
    })
}

unsafe extern "system" fn acc_hit_test(
    this: *mut c_void,
    x: i32,
    y: i32,
    out: *mut RawVariant,
) -> HRESULT {
    if out.is_null() {
        return E_POINTER;
    }
    *out = RawVariant::empty();
    com_method!(this, inner: Accessible => {
        Ok(write_target(out, inner.hit_test(Point::new(x, y))?))
    })
}

unsafe extern "system" fn acc_do_default_action(
    this: *mut c_void,
    var_child: RawVariant,
) -> HRESULT {
    com_method_result!(this, inner: Accessible => {
        inner.do_default_action(inner.normalize_raw(&var_child)?)
    })
}

unsafe extern "system" fn put_acc_name(
    this: *mut c_void,
    var_child: RawVariant,
    name: *mut u16,
) -> HRESULT {
    com_method_result!(this, inner: Accessible => {
        let child = inner.normalize_raw(&var_child)?;
        inner.set_name(child, &bstr::read(name))
    })
}

unsafe extern "system" fn put_acc_value(
    this: *mut c_void,
    var_child: RawVariant,
    value: *mut u16,
) -> HRESULT {
    com_method_result!(this, inner: Accessible => {
        let child = inner.normalize_raw(&var_child)?;
        inner.set_value(child, &bstr::read(value))
    })
}
