//! Provides the interface descriptor registry.
//!
//! Every interface type declared with [`define_interface!`](crate::define_interface)
//! owns one immutable [`InterfaceDescriptor`]: its identifier and the ordered
//! list of ABI call slots, inherited slots first. Descriptors are built on
//! first use and registered process-wide so an identifier can be turned back
//! into a name for diagnostics.
//!
//! # Examples
//! ```
//! use comity::com::{registry, ComInterface, IDispatch, IUnknown, Interface};
//!
//! let d = IDispatch::descriptor();
//! assert_eq!(d.slot_count(), 7);
//! assert_eq!(d.slot_index("Invoke"), Some(6));
//! assert!(d.inherits(&IUnknown::IID));
//! assert_eq!(registry::name_of(&IDispatch::IID), Some("IDispatch"));
//! ```

use dashmap::DashMap;
use once_cell::sync::Lazy;
use serde::Serialize;

use super::types::{serialize_guid, GUID};

/// One call slot of an interface's binary contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SlotSignature {
    /// The method name as declared.
    pub name: &'static str,
    /// The declared function-pointer type, spelled as in the declaration.
    pub signature: &'static str,
}

impl SlotSignature {
    pub const fn new(name: &'static str, signature: &'static str) -> Self {
        Self { name, signature }
    }
}

/// Static metadata describing one native interface.
#[derive(Debug, Serialize)]
pub struct InterfaceDescriptor {
    #[serde(serialize_with = "serialize_guid")]
    iid: GUID,
    name: &'static str,
    #[serde(skip)]
    parent: Option<&'static InterfaceDescriptor>,
    slots: Vec<SlotSignature>,
}

impl InterfaceDescriptor {
    /// Describes a root interface (one with no base).
    pub fn root(iid: GUID, name: &'static str, slots: &[SlotSignature]) -> Self {
        Self {
            iid,
            name,
            parent: None,
            slots: slots.to_vec(),
        }
    }

    /// Describes an interface deriving from `parent`; the parent's slots come first.
    pub fn derived(
        iid: GUID,
        name: &'static str,
        parent: &'static InterfaceDescriptor,
        own_slots: &[SlotSignature],
    ) -> Self {
        let mut slots = parent.slots.clone();
        slots.extend_from_slice(own_slots);
        Self {
            iid,
            name,
            parent: Some(parent),
            slots,
        }
    }

    pub fn iid(&self) -> GUID {
        self.iid
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn parent(&self) -> Option<&'static InterfaceDescriptor> {
        self.parent
    }

    /// The full slot layout in vtable order.
    pub fn slots(&self) -> &[SlotSignature] {
        &self.slots
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Finds the vtable index of a slot by name.
    pub fn slot_index(&self, name: &str) -> Option<usize> {
        self.slots.iter().position(|s| s.name == name)
    }

    /// Whether this interface is `iid` or derives from it.
    pub fn inherits(&self, iid: &GUID) -> bool {
        let mut current = Some(self);
        while let Some(d) = current {
            if d.iid == *iid {
                return true;
            }
            current = d.parent;
        }
        false
    }
}

static REGISTRY: Lazy<DashMap<GUID, &'static InterfaceDescriptor>> = Lazy::new(DashMap::new);

/// Registers a descriptor, returning the one already registered for its
/// identifier if another thread won the race.
pub fn register(descriptor: InterfaceDescriptor) -> &'static InterfaceDescriptor {
    if let Some(existing) = REGISTRY.get(&descriptor.iid) {
        return *existing;
    }
    let iid = descriptor.iid;
    *REGISTRY
        .entry(iid)
        .or_insert_with(|| Box::leak(Box::new(descriptor)))
}

/// Looks up a registered descriptor.
pub fn lookup(iid: &GUID) -> Option<&'static InterfaceDescriptor> {
    REGISTRY.get(iid).map(|d| *d)
}

/// Returns the interface name for an identifier, if it has been registered.
pub fn name_of(iid: &GUID) -> Option<&'static str> {
    lookup(iid).map(InterfaceDescriptor::name)
}

/// Every descriptor registered so far, ordered by name.
pub fn registered() -> Vec<&'static InterfaceDescriptor> {
    let mut all: Vec<_> = REGISTRY.iter().map(|d| *d).collect();
    all.sort_by_key(|d| d.name);
    all
}
