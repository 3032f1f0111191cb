//! Provides the per-type member table behind late-bound dispatch.
//!
//! A type describes its members once, in [`Dispatchable::register`]. The
//! resulting [`DispatchTable`] is built on first use, cached per type, and
//! never changes afterwards, so a name resolves to the same id for the life
//! of the process.
//!
//! # Examples
//! ```
//! use std::sync::Arc;
//!
//! use comity::com::object::{ComObject, InterfaceEntry};
//! use comity::dispatch::{table_for, Dispatchable, DispatchTableBuilder, Variant, DISPID_UNKNOWN};
//!
//! struct Lamp;
//!
//! impl ComObject for Lamp {
//!     fn interfaces(&self) -> Vec<InterfaceEntry> {
//!         Vec::new()
//!     }
//! }
//!
//! impl Dispatchable for Lamp {
//!     fn register(table: &mut DispatchTableBuilder<Self>) {
//!         table
//!             .member("Brightness")
//!             .parameters(&["level"])
//!             .getter(|_, _| Ok(Variant::I4(70)));
//!     }
//! }
//!
//! let table = table_for::<Lamp>();
//! let ids = table.ids_of_names(&["BRIGHTNESS", "Level", "nope"]).unwrap();
//! assert_eq!(ids, vec![1, 0, DISPID_UNKNOWN]);
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::ops::BitOr;
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;

use super::args::Arguments;
use super::variant::Variant;
use crate::com::{ComError, ComObject, ComResult, IUnknown};

/// A dispatch member id.
pub type DispId = i32;

/// Returned for names that do not resolve.
pub const DISPID_UNKNOWN: DispId = -1;
/// The default member.
pub const DISPID_VALUE: DispId = 0;
/// Named-argument id that tags the value of a property put.
pub const DISPID_PROPERTYPUT: DispId = -3;

/// The kind of an invocation; flags may be combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InvokeKind(pub u16);

impl InvokeKind {
    pub const METHOD: Self = Self(1);
    pub const PROPERTY_GET: Self = Self(2);
    pub const PROPERTY_PUT: Self = Self(4);
    pub const PROPERTY_PUT_REF: Self = Self(8);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_put(self) -> bool {
        self.0 & (Self::PROPERTY_PUT.0 | Self::PROPERTY_PUT_REF.0) != 0
    }
}

impl BitOr for InvokeKind {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

pub type Getter<T> = fn(&Arc<T>, &Arguments) -> ComResult<Variant>;
pub type Setter<T> = fn(&Arc<T>, &Arguments, &Variant) -> ComResult<()>;
pub type Method<T> = fn(&Arc<T>, &Arguments) -> ComResult<Variant>;

/// One late-bound member: a property, a method, or both.
pub struct Member<T> {
    id: DispId,
    name: &'static str,
    params: &'static [&'static str],
    get: Option<Getter<T>>,
    put: Option<Setter<T>>,
    call: Option<Method<T>>,
}

impl<T> Member<T> {
    pub fn id(&self) -> DispId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn params(&self) -> &'static [&'static str] {
        self.params
    }

    /// Position of a parameter, matched case-insensitively.
    pub fn param_id(&self, name: &str) -> Option<DispId> {
        self.params
            .iter()
            .position(|p| p.eq_ignore_ascii_case(name))
            .map(|p| p as DispId)
    }

    /// Assigns an explicit id instead of the next sequential one.
    pub fn dispid(&mut self, id: DispId) -> &mut Self {
        self.id = id;
        self
    }

    pub fn parameters(&mut self, names: &'static [&'static str]) -> &mut Self {
        self.params = names;
        self
    }

    pub fn getter(&mut self, get: Getter<T>) -> &mut Self {
        self.get = Some(get);
        self
    }

    pub fn setter(&mut self, put: Setter<T>) -> &mut Self {
        self.put = Some(put);
        self
    }

    pub fn method(&mut self, call: Method<T>) -> &mut Self {
        self.call = Some(call);
        self
    }

    fn invoke(&self, target: &Arc<T>, kind: InvokeKind, args: &Arguments) -> ComResult<Variant> {
        if kind.is_put() {
            let put = self.put.ok_or(ComError::MemberNotFound(self.id))?;
            let value = args.put_value()?;
            if args.len() > self.params.len() {
                return Err(ComError::BadParamCount);
            }
            put(target, args, value)?;
            return Ok(Variant::Empty);
        }

        if let Some(origin) = args.put_value_origin() {
            return Err(ComError::ParameterNotFound { index: origin });
        }
        if args.len() > self.params.len() {
            return Err(ComError::BadParamCount);
        }
        if kind.contains(InvokeKind::METHOD) {
            if let Some(call) = self.call {
                return call(target, args);
            }
        }
        if kind.contains(InvokeKind::PROPERTY_GET) {
            if let Some(get) = self.get {
                return get(target, args);
            }
        }
        Err(ComError::MemberNotFound(self.id))
    }
}

/// Collects members while a type registers itself.
pub struct DispatchTableBuilder<T> {
    members: Vec<Member<T>>,
    next_id: DispId,
}

impl<T> DispatchTableBuilder<T> {
    fn new() -> Self {
        Self {
            members: Vec::new(),
            next_id: 1,
        }
    }

    /// Adds a member with the next sequential id.
    pub fn member(&mut self, name: &'static str) -> &mut Member<T> {
        let id = self.next_id;
        self.next_id += 1;
        let index = self.members.len();
        self.members.push(Member {
            id,
            name,
            params: &[],
            get: None,
            put: None,
            call: None,
        });
        &mut self.members[index]
    }

    /// Freezes the table.
    ///
    /// # Panics
    ///
    /// Panics if two members share a name (ignoring case) or an id.
    pub fn build(self) -> DispatchTable<T> {
        let mut by_name = HashMap::new();
        let mut by_id = HashMap::new();
        for (index, member) in self.members.iter().enumerate() {
            let clash = by_name.insert(member.name.to_ascii_lowercase(), index);
            assert!(clash.is_none(), "duplicate dispatch member `{}`", member.name);
            let clash = by_id.insert(member.id, index);
            assert!(clash.is_none(), "duplicate dispatch id {}", member.id);
        }
        DispatchTable {
            members: self.members,
            by_name,
            by_id,
        }
    }
}

/// The frozen member table of one type.
pub struct DispatchTable<T> {
    members: Vec<Member<T>>,
    by_name: HashMap<String, usize>,
    by_id: HashMap<DispId, usize>,
}

impl<T> DispatchTable<T> {
    /// Resolves a member name followed by parameter names.
    ///
    /// An unknown member fails the whole lookup. Unknown parameter names
    /// resolve to [`DISPID_UNKNOWN`] without failing the others.
    pub fn ids_of_names(&self, names: &[&str]) -> ComResult<Vec<DispId>> {
        let (member_name, param_names) = names
            .split_first()
            .ok_or(ComError::InvalidArgument("no names to resolve"))?;
        let member = self
            .member_by_name(member_name)
            .ok_or_else(|| ComError::UnknownName(member_name.to_string()))?;

        let mut ids = Vec::with_capacity(names.len());
        ids.push(member.id);
        ids.extend(
            param_names
                .iter()
                .map(|p| member.param_id(p).unwrap_or(DISPID_UNKNOWN)),
        );
        Ok(ids)
    }

    pub fn member(&self, id: DispId) -> Option<&Member<T>> {
        self.by_id.get(&id).map(|&i| &self.members[i])
    }

    pub fn member_by_name(&self, name: &str) -> Option<&Member<T>> {
        self.by_name
            .get(&name.to_ascii_lowercase())
            .map(|&i| &self.members[i])
    }

    pub fn members(&self) -> impl Iterator<Item = &Member<T>> {
        self.members.iter()
    }

    /// Invokes member `id` on `target` from runtime code.
    pub fn invoke(
        &self,
        target: &Arc<T>,
        id: DispId,
        kind: InvokeKind,
        args: &Arguments,
    ) -> ComResult<Variant> {
        let member = self.member(id).ok_or(ComError::MemberNotFound(id))?;
        member.invoke(target, kind, args)
    }
}

/// A runtime type callable through late-bound dispatch.
pub trait Dispatchable: ComObject + Sized {
    /// Describes the type's members. Called once per process.
    fn register(table: &mut DispatchTableBuilder<Self>);

    /// Whether a type description is available.
    fn has_type_info(&self) -> bool {
        false
    }

    /// The type description for `GetTypeInfo`.
    fn type_info(&self) -> ComResult<IUnknown> {
        Err(ComError::LibraryNotRegistered)
    }
}

static TABLES: Lazy<DashMap<TypeId, &'static (dyn Any + Send + Sync)>> = Lazy::new(DashMap::new);

/// The member table of `T`, built on first use.
pub fn table_for<T: Dispatchable>() -> &'static DispatchTable<T> {
    let key = TypeId::of::<T>();
    let cached = TABLES.get(&key).map(|t| *t);
    let table = match cached {
        Some(table) => table,
        None => {
            let mut builder = DispatchTableBuilder::new();
            T::register(&mut builder);
            let built = builder.build();
            *TABLES.entry(key).or_insert_with(|| {
                tracing::trace!(
                    object = std::any::type_name::<T>(),
                    members = built.members.len(),
                    "built dispatch table"
                );
                let leaked: &'static (dyn Any + Send + Sync) = Box::leak(Box::new(built));
                leaked
            })
        }
    };
    match table.downcast_ref::<DispatchTable<T>>() {
        Some(table) => table,
        None => unreachable!("dispatch table cached under the wrong type"),
    }
}
