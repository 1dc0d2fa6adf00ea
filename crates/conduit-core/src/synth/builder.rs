//! Building a proxy type field by field and routine by routine.

use super::instr::{FieldId, Instr};
use super::types::{FieldDef, FieldKind, ProxyType, Routine, RoutineRole};
use super::verify;
use crate::contract::{Contract, ContractDescriptor, OperationId, Param, ReturnType, TypeDesc};
use crate::error::SynthesisError;
use crate::value::MAX_ARITY;
use std::collections::HashMap;
use std::marker::PhantomData;
use tracing::debug;

/// A routine under construction. Every emitter returns `&mut Self` so a body
/// reads top to bottom:
///
/// ```rust,ignore
/// ty.add_routine("__set_target")
///     .injected(FieldKind::WrappedImpl)
///     .ldarg(0)
///     .stfld(target)
///     .ret();
/// ```
#[derive(Debug, Clone)]
pub struct RoutineBuilder {
    routine: Routine,
}

impl RoutineBuilder {
    fn new(name: String) -> Self {
        Self {
            routine: Routine {
                name,
                role: RoutineRole::Unbound,
                params: Vec::new(),
                returns: ReturnType::Nothing,
                body: Vec::new(),
            },
        }
    }

    /// Append a parameter.
    pub fn param(&mut self, name: impl Into<String>, ty: TypeDesc) -> &mut Self {
        self.routine.params.push(Param {
            name: name.into(),
            ty,
        });
        self
    }

    /// Make this a setter taking one injected value of `kind`.
    pub fn injected(&mut self, kind: FieldKind) -> &mut Self {
        self.routine.role = RoutineRole::Setter(kind);
        self.param("value", kind.type_desc())
    }

    /// Make this the forwarding routine of an operation.
    pub fn bind(&mut self, op: OperationId) -> &mut Self {
        self.routine.role = RoutineRole::Forwarder(op);
        self
    }

    /// Set the return type.
    pub fn returns(&mut self, returns: ReturnType) -> &mut Self {
        self.routine.returns = returns;
        self
    }

    /// Append a raw instruction.
    pub fn emit(&mut self, instr: Instr) -> &mut Self {
        self.routine.body.push(instr);
        self
    }

    pub fn ldarg(&mut self, index: u16) -> &mut Self {
        self.emit(Instr::LoadArg(index))
    }

    pub fn ldfld(&mut self, field: FieldId) -> &mut Self {
        self.emit(Instr::LoadField(field))
    }

    pub fn stfld(&mut self, field: FieldId) -> &mut Self {
        self.emit(Instr::StoreField(field))
    }

    pub fn ldname(&mut self) -> &mut Self {
        self.emit(Instr::LoadName)
    }

    pub fn newarr(&mut self, len: u16) -> &mut Self {
        self.emit(Instr::NewArray(len))
    }

    pub fn box_value(&mut self) -> &mut Self {
        self.emit(Instr::Box)
    }

    pub fn stelem(&mut self, index: u16) -> &mut Self {
        self.emit(Instr::StoreElem(index))
    }

    pub fn stloc(&mut self) -> &mut Self {
        self.emit(Instr::StoreLocal)
    }

    pub fn ldloc(&mut self) -> &mut Self {
        self.emit(Instr::LoadLocal)
    }

    pub fn ldnovalue(&mut self) -> &mut Self {
        self.emit(Instr::LoadNoValue)
    }

    pub fn pop(&mut self) -> &mut Self {
        self.emit(Instr::Pop)
    }

    pub fn call_target(&mut self) -> &mut Self {
        self.emit(Instr::CallTarget)
    }

    pub fn call_before(&mut self) -> &mut Self {
        self.emit(Instr::CallBefore)
    }

    pub fn call_after(&mut self) -> &mut Self {
        self.emit(Instr::CallAfter)
    }

    pub fn exit_on_failure(&mut self) -> &mut Self {
        self.emit(Instr::ExitOnFailure)
    }

    pub fn ret(&mut self) -> &mut Self {
        self.emit(Instr::Ret)
    }
}

/// A new type being synthesized for contract `C`.
pub struct TypeBuilder<C: Contract + ?Sized> {
    name: String,
    contract: ContractDescriptor,
    fields: Vec<FieldDef>,
    routines: Vec<RoutineBuilder>,
    max_parameters: usize,
    verify: bool,
    _contract: PhantomData<fn() -> Box<C>>,
}

impl<C: Contract + ?Sized> TypeBuilder<C> {
    /// Start a new type satisfying `C`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            contract: C::descriptor(),
            fields: Vec::new(),
            routines: Vec::new(),
            max_parameters: MAX_ARITY,
            verify: true,
            _contract: PhantomData,
        }
    }

    /// Reject operations with more parameters than `limit`. Never above [`MAX_ARITY`].
    pub fn max_parameters(mut self, limit: usize) -> Self {
        self.max_parameters = limit.min(MAX_ARITY);
        self
    }

    /// Enable or disable routine verification at materialization.
    pub fn verify(mut self, enabled: bool) -> Self {
        self.verify = enabled;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contract(&self) -> &ContractDescriptor {
        &self.contract
    }

    /// Declare a field.
    pub fn add_field(&mut self, name: impl Into<String>, kind: FieldKind) -> FieldId {
        self.fields.push(FieldDef {
            name: name.into(),
            kind,
        });
        FieldId((self.fields.len() - 1) as u16)
    }

    /// Declare a routine and return its builder.
    pub fn add_routine(&mut self, name: impl Into<String>) -> &mut RoutineBuilder {
        self.routines.push(RoutineBuilder::new(name.into()));
        let last = self.routines.len() - 1;
        &mut self.routines[last]
    }

    /// Check the type and turn it into an instantiable [`ProxyType`].
    pub fn materialize(self) -> Result<ProxyType<C>, SynthesisError> {
        self.check_operations()?;
        self.check_fields()?;

        let routines: Vec<Routine> = self.routines.into_iter().map(|r| r.routine).collect();
        let operations = &self.contract.operations;
        let mut forwarders: Vec<Option<usize>> = vec![None; operations.len()];
        let mut setters = HashMap::new();

        for (index, routine) in routines.iter().enumerate() {
            match routine.role {
                RoutineRole::Unbound => {
                    return Err(SynthesisError::UnboundRoutine(routine.name.clone()));
                }
                RoutineRole::Setter(_) => {
                    if routines.iter().filter(|r| r.name == routine.name).count() > 1 {
                        return Err(SynthesisError::DuplicateRoutine(routine.name.clone()));
                    }
                    setters.insert(routine.name.clone(), index);
                }
                RoutineRole::Forwarder(op) => {
                    let sig = operations.get(op.index()).ok_or_else(|| {
                        SynthesisError::UnknownOperation {
                            routine: routine.name.clone(),
                            index: op.index(),
                        }
                    })?;
                    if forwarders[op.index()].replace(index).is_some() {
                        return Err(SynthesisError::DuplicateForwarder(sig.name.clone()));
                    }
                    let same_params = routine.params.len() == sig.params.len()
                        && routine.params.iter().zip(&sig.params).all(|(a, b)| a.ty == b.ty);
                    if routine.name != sig.name || !same_params || routine.returns != sig.returns {
                        return Err(SynthesisError::SignatureMismatch {
                            routine: routine.name.clone(),
                            signature: sig.to_string(),
                        });
                    }
                }
            }

            if self.verify {
                verify::verify_routine(routine, &self.fields)?;
            }
        }

        let forwarders = forwarders
            .into_iter()
            .zip(operations)
            .map(|(slot, sig)| slot.ok_or_else(|| SynthesisError::MissingForwarder(sig.name.clone())))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            type_name = %self.name,
            contract = %self.contract.name,
            fields = self.fields.len(),
            routines = routines.len(),
            "Materialized proxy type"
        );

        Ok(ProxyType {
            name: self.name,
            contract: self.contract,
            fields: self.fields,
            routines,
            forwarders,
            setters,
            _contract: PhantomData,
        })
    }

    fn check_operations(&self) -> Result<(), SynthesisError> {
        let operations = &self.contract.operations;
        for (index, op) in operations.iter().enumerate() {
            if op.name.is_empty() {
                return Err(SynthesisError::EmptyOperationName {
                    contract: self.contract.name.clone(),
                    index,
                });
            }
            if op.generic {
                return Err(SynthesisError::GenericOperation(op.name.clone()));
            }
            if op.arity() > self.max_parameters {
                return Err(SynthesisError::TooManyParameters {
                    operation: op.name.clone(),
                    arity: op.arity(),
                    limit: self.max_parameters,
                });
            }
            if let Some(first) = operations[..index].iter().position(|o| o.same_shape(op)) {
                return Err(SynthesisError::AmbiguousOverload {
                    signature: op.to_string(),
                    first,
                    second: index,
                });
            }
        }
        Ok(())
    }

    fn check_fields(&self) -> Result<(), SynthesisError> {
        for (index, field) in self.fields.iter().enumerate() {
            if self.fields[..index].iter().any(|f| f.name == field.name) {
                return Err(SynthesisError::DuplicateField(field.name.clone()));
            }
        }
        for kind in [FieldKind::WrappedImpl, FieldKind::Observer] {
            let count = self.fields.iter().filter(|f| f.kind == kind).count();
            if count > 1 {
                return Err(SynthesisError::DuplicateFieldKind { kind, count });
            }
        }
        if !self.fields.iter().any(|f| f.kind == FieldKind::WrappedImpl) {
            return Err(SynthesisError::MissingTargetField(self.name.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::OperationSig;

    trait Store {}

    impl Contract for dyn Store {
        fn descriptor() -> ContractDescriptor {
            ContractDescriptor::new("Store")
                .operation(
                    OperationSig::new("get")
                        .param("key", TypeDesc::of::<u32>())
                        .returns(ReturnType::of::<String>()),
                )
                .operation(OperationSig::new("clear"))
        }
    }

    trait Overloaded {}

    impl Contract for dyn Overloaded {
        fn descriptor() -> ContractDescriptor {
            ContractDescriptor::new("Overloaded")
                .operation(OperationSig::new("put").param("a", TypeDesc::of::<u32>()))
                .operation(OperationSig::new("put").param("b", TypeDesc::of::<u32>()))
        }
    }

    trait Mapper {}

    impl Contract for dyn Mapper {
        fn descriptor() -> ContractDescriptor {
            ContractDescriptor::new("Mapper").operation(OperationSig::new("map").generic())
        }
    }

    fn store_type() -> TypeBuilder<dyn Store> {
        let mut ty = TypeBuilder::<dyn Store>::new("__Proxy_Store");
        let target = ty.add_field("__target", FieldKind::WrappedImpl);
        ty.add_routine("__set_target")
            .injected(FieldKind::WrappedImpl)
            .ldarg(0)
            .stfld(target)
            .ret();
        ty.add_routine("get")
            .bind(OperationId::new(0))
            .param("key", TypeDesc::of::<u32>())
            .returns(ReturnType::of::<String>())
            .ldfld(target)
            .call_target()
            .ret();
        ty
    }

    fn add_clear(ty: &mut TypeBuilder<dyn Store>) {
        ty.add_routine("clear")
            .bind(OperationId::new(1))
            .ldfld(FieldId(0))
            .call_target()
            .pop()
            .ret();
    }

    #[test]
    fn test_materialize_indexes_routines() {
        let mut ty = store_type();
        add_clear(&mut ty);
        let ty = ty.materialize().unwrap();

        assert_eq!(ty.name(), "__Proxy_Store");
        assert_eq!(ty.forwarder(OperationId::new(1)).unwrap().name, "clear");
        assert!(ty.setter("__set_target").is_some());
        assert!(ty.setter("get").is_none());
        assert!(!ty.is_observed());
    }

    #[test]
    fn test_missing_forwarder_is_rejected() {
        let err = store_type().materialize().unwrap_err();
        assert_eq!(err, SynthesisError::MissingForwarder("clear".into()));
    }

    #[test]
    fn test_duplicate_forwarder_is_rejected() {
        let mut ty = store_type();
        add_clear(&mut ty);
        add_clear(&mut ty);
        assert_eq!(
            ty.materialize().unwrap_err(),
            SynthesisError::DuplicateForwarder("clear".into())
        );
    }

    #[test]
    fn test_forwarder_shape_must_match_operation() {
        let mut ty = store_type();
        ty.add_routine("clear")
            .bind(OperationId::new(1))
            .returns(ReturnType::of::<bool>())
            .ldfld(FieldId(0))
            .call_target()
            .ret();
        assert!(matches!(
            ty.materialize().unwrap_err(),
            SynthesisError::SignatureMismatch { .. }
        ));
    }

    #[test]
    fn test_unbound_routine_is_rejected() {
        let mut ty = store_type();
        add_clear(&mut ty);
        ty.add_routine("helper").ret();
        assert_eq!(
            ty.materialize().unwrap_err(),
            SynthesisError::UnboundRoutine("helper".into())
        );
    }

    #[test]
    fn test_field_rules() {
        let mut ty = store_type();
        add_clear(&mut ty);
        ty.add_field("__target", FieldKind::Observer);
        assert_eq!(
            ty.materialize().unwrap_err(),
            SynthesisError::DuplicateField("__target".into())
        );

        let ty = TypeBuilder::<dyn Mapper>::new("__Proxy_Empty");
        assert!(matches!(
            ty.materialize().unwrap_err(),
            SynthesisError::GenericOperation(_)
        ));
    }

    #[test]
    fn test_type_without_target_field_is_rejected() {
        trait Nothing {}
        impl Contract for dyn Nothing {
            fn descriptor() -> ContractDescriptor {
                ContractDescriptor::new("Nothing")
            }
        }

        let ty = TypeBuilder::<dyn Nothing>::new("__Proxy_Nothing");
        assert_eq!(
            ty.materialize().unwrap_err(),
            SynthesisError::MissingTargetField("__Proxy_Nothing".into())
        );
    }

    #[test]
    fn test_identical_overloads_are_ambiguous() {
        let ty = TypeBuilder::<dyn Overloaded>::new("__Proxy_Overloaded");
        assert!(matches!(
            ty.materialize().unwrap_err(),
            SynthesisError::AmbiguousOverload { first: 0, second: 1, .. }
        ));
    }

    #[test]
    fn test_parameter_limit() {
        let ty = TypeBuilder::<dyn Store>::new("__Proxy_Store").max_parameters(0);
        assert!(matches!(
            ty.materialize().unwrap_err(),
            SynthesisError::TooManyParameters { arity: 1, limit: 0, .. }
        ));
    }
}
