//! Emission of forwarding routines.
//!
//! Every operation gets one routine. Without an observer it only delegates.
//! With one, the routine boxes the arguments in declaration order, runs the
//! before-hook, delegates, and reports the boxed result (or the no-value
//! marker) to the after-hook before handing the native result back. A failed
//! delegated call leaves the routine at once, so the after-hook never sees it.

use crate::contract::{Contract, OperationId, OperationSig, ReturnType};
use crate::synth::{FieldId, TypeBuilder};

/// Fields a forwarding routine reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateFields {
    pub target: FieldId,
    pub observer: Option<FieldId>,
}

/// Emit the forwarding routine of `op`.
pub fn emit_forwarder<C: Contract + ?Sized>(
    ty: &mut TypeBuilder<C>,
    op: OperationId,
    sig: &OperationSig,
    state: StateFields,
) {
    let routine = ty.add_routine(sig.name.as_str());
    routine.bind(op).returns(sig.returns.clone());
    for param in &sig.params {
        routine.param(param.name.as_str(), param.ty.clone());
    }

    if let Some(observer) = state.observer {
        let arity = sig.arity() as u16;
        routine.ldfld(observer).ldname().newarr(arity);
        for index in 0..arity {
            routine.ldarg(index).box_value().stelem(index);
        }
        routine.call_before();
    }

    routine.ldfld(state.target).call_target();
    if sig.returns.is_fallible() {
        routine.exit_on_failure();
    }

    match state.observer {
        None => {
            if sig.returns == ReturnType::Nothing {
                routine.pop();
            }
        }
        Some(observer) => {
            routine.stloc().ldfld(observer).ldname();
            if sig.returns.produces_value() {
                routine.ldloc().box_value();
            } else {
                routine.ldnovalue();
            }
            routine.call_after();
            if sig.returns != ReturnType::Nothing {
                routine.ldloc();
            }
        }
    }

    routine.ret();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{ContractDescriptor, TypeDesc};
    use crate::synth::Instr::{self, *};
    use crate::wiring;

    trait Calc {}

    impl Contract for dyn Calc {
        fn descriptor() -> ContractDescriptor {
            ContractDescriptor::new("Calc")
                .operation(
                    OperationSig::new("add")
                        .param("a", TypeDesc::of::<i32>())
                        .param("b", TypeDesc::of::<i32>())
                        .returns(ReturnType::of::<i32>()),
                )
                .operation(OperationSig::new("log").param("message", TypeDesc::of::<String>()))
                .operation(
                    OperationSig::new("divide")
                        .param("a", TypeDesc::of::<i32>())
                        .param("b", TypeDesc::of::<i32>())
                        .returns(ReturnType::fallible::<Result<i32, String>>()),
                )
        }
    }

    fn bodies(observed: bool) -> Vec<Vec<Instr>> {
        let mut ty = TypeBuilder::<dyn Calc>::new("__Proxy_Calc");
        let state = StateFields {
            target: wiring::wire_target(&mut ty),
            observer: observed.then(|| wiring::wire_observer(&mut ty)),
        };
        let operations = ty.contract().operations.clone();
        for (index, sig) in operations.iter().enumerate() {
            emit_forwarder(&mut ty, OperationId::new(index), sig, state);
        }

        let ty = ty.materialize().unwrap();
        (0..operations.len())
            .map(|i| ty.forwarder(OperationId::new(i)).unwrap().body.clone())
            .collect()
    }

    #[test]
    fn test_unobserved_forwarders_only_delegate() {
        let target = FieldId(0);
        let bodies = bodies(false);
        assert_eq!(bodies[0], vec![LoadField(target), CallTarget, Ret]);
        assert_eq!(bodies[1], vec![LoadField(target), CallTarget, Pop, Ret]);
        assert_eq!(
            bodies[2],
            vec![LoadField(target), CallTarget, ExitOnFailure, Ret]
        );
        for body in &bodies {
            assert!(!body.contains(&Box));
        }
    }

    #[test]
    fn test_observed_forwarder_reports_value() {
        let (target, observer) = (FieldId(0), FieldId(1));
        assert_eq!(
            bodies(true)[0],
            vec![
                LoadField(observer),
                LoadName,
                NewArray(2),
                LoadArg(0),
                Box,
                StoreElem(0),
                LoadArg(1),
                Box,
                StoreElem(1),
                CallBefore,
                LoadField(target),
                CallTarget,
                StoreLocal,
                LoadField(observer),
                LoadName,
                LoadLocal,
                Box,
                CallAfter,
                LoadLocal,
                Ret,
            ]
        );
    }

    #[test]
    fn test_observed_void_forwarder_reports_no_value() {
        let body = &bodies(true)[1];
        let tail = &body[body.len() - 5..];
        assert_eq!(tail, &[LoadField(FieldId(1)), LoadName, LoadNoValue, CallAfter, Ret]);
    }

    #[test]
    fn test_observed_fallible_forwarder_exits_before_after_hook() {
        let body = &bodies(true)[2];
        let exit = body.iter().position(|i| *i == ExitOnFailure).unwrap();
        let after = body.iter().position(|i| *i == CallAfter).unwrap();
        assert_eq!(body[exit - 1], CallTarget);
        assert!(exit < after);
    }
}
