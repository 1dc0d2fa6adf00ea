//! Fields, routines and the materialized proxy type.

use super::instr::{FieldId, Instr};
use crate::contract::{Contract, ContractDescriptor, OperationId, Param, ReturnType, TypeDesc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

/// What a hidden field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// The wrapped implementation every call is delegated to.
    WrappedImpl,
    /// The optional shared observer.
    Observer,
}

impl FieldKind {
    /// The declared type of a field of this kind.
    pub fn type_desc(self) -> TypeDesc {
        match self {
            FieldKind::WrappedImpl => TypeDesc::named("Box<dyn Contract>"),
            FieldKind::Observer => TypeDesc::named("Arc<dyn ProxyObserver>"),
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::WrappedImpl => f.write_str("a wrapped implementation"),
            FieldKind::Observer => f.write_str("an observer"),
        }
    }
}

/// A field declared on a proxy type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
}

/// What a routine is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutineRole {
    /// Declared but not yet bound; rejected at materialization.
    Unbound,
    /// Stores its single injected argument into a field of this kind.
    Setter(FieldKind),
    /// Forwards one contract operation.
    Forwarder(OperationId),
}

/// A named routine with its instruction stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Routine {
    pub name: String,
    pub role: RoutineRole,
    pub params: Vec<Param>,
    pub returns: ReturnType,
    pub body: Vec<Instr>,
}

impl Routine {
    /// Whether any instruction of the body satisfies `pred`.
    pub fn contains(&self, pred: impl Fn(&Instr) -> bool) -> bool {
        self.body.iter().any(pred)
    }
}

/// A verified, instantiable proxy type for contract `C`.
///
/// One type backs any number of instances; see
/// [`Activator::instantiate`](crate::Activator::instantiate).
pub struct ProxyType<C: Contract + ?Sized> {
    pub(crate) name: String,
    pub(crate) contract: ContractDescriptor,
    pub(crate) fields: Vec<FieldDef>,
    pub(crate) routines: Vec<Routine>,
    /// Operation index to routine index.
    pub(crate) forwarders: Vec<usize>,
    pub(crate) setters: HashMap<String, usize>,
    pub(crate) _contract: PhantomData<fn() -> Box<C>>,
}

impl<C: Contract + ?Sized> ProxyType<C> {
    /// The synthesized type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The contract this type satisfies.
    pub fn contract(&self) -> &ContractDescriptor {
        &self.contract
    }

    /// Declared fields, in declaration order.
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// All routines, setters included, in declaration order.
    pub fn routines(&self) -> &[Routine] {
        &self.routines
    }

    /// The forwarding routine of an operation.
    pub fn forwarder(&self, op: OperationId) -> Option<&Routine> {
        self.forwarders
            .get(op.index())
            .map(|&index| &self.routines[index])
    }

    /// A setter routine by name.
    pub fn setter(&self, name: &str) -> Option<&Routine> {
        self.setters.get(name).map(|&index| &self.routines[index])
    }

    /// The first routine with the given name.
    pub fn routine(&self, name: &str) -> Option<&Routine> {
        self.routines.iter().find(|r| r.name == name)
    }

    /// The field holding values of `kind`, if declared.
    pub fn field_of(&self, kind: FieldKind) -> Option<FieldId> {
        self.fields
            .iter()
            .position(|f| f.kind == kind)
            .map(|index| FieldId(index as u16))
    }

    /// Whether instances carry an observer.
    pub fn is_observed(&self) -> bool {
        self.field_of(FieldKind::Observer).is_some()
    }
}

impl<C: Contract + ?Sized> fmt::Debug for ProxyType<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyType")
            .field("name", &self.name)
            .field("contract", &self.contract.name)
            .field("fields", &self.fields)
            .field("routines", &self.routines.len())
            .finish()
    }
}
