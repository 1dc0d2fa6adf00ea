//! Turning a materialized proxy type into a live, wired instance.

use crate::contract::Contract;
use crate::error::ActivationError;
use crate::observer::SharedObserver;
use crate::proxy::{FieldCell, Proxy};
use crate::synth::{FieldKind, ProxyType, RoutineRole};
use crate::vm::{self, Fault, Input};
use std::sync::Arc;
use tracing::debug;

/// A value handed to a setter routine.
pub enum Injection<C: ?Sized> {
    /// The wrapped implementation. The proxy takes ownership.
    Target(Box<C>),
    /// The observer. The proxy only keeps a shared reference.
    Observer(SharedObserver),
}

impl<C: ?Sized> Injection<C> {
    /// The kind of field this value fits.
    pub fn kind(&self) -> FieldKind {
        match self {
            Injection::Target(_) => FieldKind::WrappedImpl,
            Injection::Observer(_) => FieldKind::Observer,
        }
    }
}

/// Instantiates proxy types and runs their setters.
pub struct Activator;

impl Activator {
    /// Create a blank instance: every field declared, none written.
    pub fn instantiate<C: Contract + ?Sized>(ty: &Arc<ProxyType<C>>) -> Proxy<C> {
        let cells = ty
            .fields()
            .iter()
            .map(|field| FieldCell::for_kind(field.kind))
            .collect();
        debug!(type_name = %ty.name(), "Instantiated proxy type");
        Proxy {
            ty: Arc::clone(ty),
            cells,
        }
    }

    /// Run the setter routine named `routine` with `injection` as its argument.
    pub fn invoke_named<C: Contract + ?Sized>(
        instance: &Proxy<C>,
        routine: &str,
        injection: Injection<C>,
    ) -> Result<(), ActivationError> {
        let ty = &instance.ty;
        let Some(setter) = ty.setter(routine) else {
            return Err(if ty.routine(routine).is_some() {
                ActivationError::NotASetter(routine.to_string())
            } else {
                ActivationError::RoutineNotFound {
                    type_name: ty.name().to_string(),
                    routine: routine.to_string(),
                }
            });
        };

        if let RoutineRole::Setter(expected) = setter.role {
            if expected != injection.kind() {
                return Err(ActivationError::InjectionMismatch {
                    routine: routine.to_string(),
                    expected,
                    actual: injection.kind(),
                });
            }
        }

        vm::execute(&instance.cells, setter, Input::Inject(Some(injection))).map_err(|fault| {
            match fault {
                Fault::AlreadySet(index) => ActivationError::FieldAlreadySet(
                    ty.fields()
                        .get(index)
                        .map(|f| f.name.clone())
                        .unwrap_or_default(),
                ),
                other => ActivationError::Fault {
                    routine: routine.to_string(),
                    reason: other.to_string(),
                },
            }
        })?;

        debug!(type_name = %ty.name(), routine, "Invoked setter");
        Ok(())
    }

    /// Check that every declared field has been written.
    pub fn ensure_wired<C: Contract + ?Sized>(instance: &Proxy<C>) -> Result<(), ActivationError> {
        for (field, cell) in instance.ty.fields().iter().zip(&instance.cells) {
            if !cell.is_set() {
                return Err(ActivationError::FieldNotWired(field.name.clone()));
            }
        }
        Ok(())
    }
}
