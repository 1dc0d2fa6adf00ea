//! Hidden state of a proxy type: the wrapped implementation and the optional
//! observer, each stored in its own field and written through its own setter.

use crate::contract::Contract;
use crate::synth::{FieldId, FieldKind, TypeBuilder};

/// Field holding the wrapped implementation.
pub const TARGET_FIELD: &str = "__target";
/// Setter writing [`TARGET_FIELD`].
pub const TARGET_SETTER: &str = "__set_target";
/// Field holding the observer.
pub const OBSERVER_FIELD: &str = "__observer";
/// Setter writing [`OBSERVER_FIELD`].
pub const OBSERVER_SETTER: &str = "__set_observer";

/// Declare a field of `kind` and a setter routine that stores its single
/// argument into it.
pub fn attach_state<C: Contract + ?Sized>(
    ty: &mut TypeBuilder<C>,
    field: &str,
    setter: &str,
    kind: FieldKind,
) -> FieldId {
    let id = ty.add_field(field, kind);
    ty.add_routine(setter).injected(kind).ldarg(0).stfld(id).ret();
    id
}

/// Attach the wrapped-implementation field and its setter.
pub fn wire_target<C: Contract + ?Sized>(ty: &mut TypeBuilder<C>) -> FieldId {
    attach_state(ty, TARGET_FIELD, TARGET_SETTER, FieldKind::WrappedImpl)
}

/// Attach the observer field and its setter.
pub fn wire_observer<C: Contract + ?Sized>(ty: &mut TypeBuilder<C>) -> FieldId {
    attach_state(ty, OBSERVER_FIELD, OBSERVER_SETTER, FieldKind::Observer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::ContractDescriptor;
    use crate::synth::{Instr, RoutineRole};

    trait Empty {}

    impl Contract for dyn Empty {
        fn descriptor() -> ContractDescriptor {
            ContractDescriptor::new("Empty")
        }
    }

    #[test]
    fn test_setter_body() {
        let mut ty = TypeBuilder::<dyn Empty>::new("__Proxy_Empty");
        let target = wire_target(&mut ty);
        let observer = wire_observer(&mut ty);
        assert_ne!(target, observer);

        let ty = ty.materialize().unwrap();
        let setter = ty.setter(OBSERVER_SETTER).unwrap();
        assert_eq!(setter.role, RoutineRole::Setter(FieldKind::Observer));
        assert_eq!(setter.params.len(), 1);
        assert_eq!(
            setter.body,
            vec![Instr::LoadArg(0), Instr::StoreField(observer), Instr::Ret]
        );
        assert_eq!(ty.field_of(FieldKind::WrappedImpl), Some(target));
        assert!(ty.is_observed());
    }

    #[test]
    fn test_wiring_twice_is_rejected() {
        let mut ty = TypeBuilder::<dyn Empty>::new("__Proxy_Empty");
        wire_target(&mut ty);
        wire_target(&mut ty);
        assert!(ty.materialize().is_err());
    }
}
