//! Error types for Conduit Core.
//!
//! A failure raised by the wrapped implementation itself is never represented
//! here: it reaches the proxy's caller exactly as the implementation produced it.

use crate::synth::FieldKind;
use thiserror::Error;

/// Result type alias for proxy construction.
pub type Result<T> = std::result::Result<T, ConduitError>;

/// Umbrella error returned by [`ProxyBuilder::create_proxy`](crate::ProxyBuilder::create_proxy).
#[derive(Debug, Error)]
pub enum ConduitError {
    /// The proxy type could not be built or materialized.
    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    /// The proxy type was built but could not be instantiated or wired.
    #[error(transparent)]
    Activation(#[from] ActivationError),
}

/// The type synthesizer rejected an operation shape or a routine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SynthesisError {
    /// An operation was registered without a name.
    #[error("Operation #{index} of contract '{contract}' has an empty name")]
    EmptyOperationName { contract: String, index: usize },

    /// Generic operations cannot be forwarded.
    #[error("Generic operation '{0}' is not supported")]
    GenericOperation(String),

    /// An operation takes more parameters than the synthesizer can forward.
    #[error("Operation '{operation}' takes {arity} parameters, the limit is {limit}")]
    TooManyParameters {
        operation: String,
        arity: usize,
        limit: usize,
    },

    /// Two overloads share both a name and their parameter types.
    #[error("Operations #{first} and #{second} are both '{signature}'")]
    AmbiguousOverload {
        signature: String,
        first: usize,
        second: usize,
    },

    /// A field name was declared twice on the same type.
    #[error("Field '{0}' is declared twice")]
    DuplicateField(String),

    /// More than one field of a kind that must be unique.
    #[error("Type declares {count} fields of kind {kind}")]
    DuplicateFieldKind { kind: FieldKind, count: usize },

    /// A setter routine shares its name with another routine.
    #[error("Routine '{0}' is declared twice")]
    DuplicateRoutine(String),

    /// Every proxy type needs somewhere to keep the wrapped implementation.
    #[error("Type '{0}' has no wrapped-implementation field")]
    MissingTargetField(String),

    /// A routine was neither bound to an operation nor declared a setter.
    #[error("Routine '{0}' is not bound to an operation or a field")]
    UnboundRoutine(String),

    /// A routine was bound to an operation the contract does not have.
    #[error("Routine '{routine}' is bound to unknown operation #{index}")]
    UnknownOperation { routine: String, index: usize },

    /// A contract operation was left without a forwarding routine.
    #[error("Operation '{0}' has no forwarding routine")]
    MissingForwarder(String),

    /// A contract operation was given two forwarding routines.
    #[error("Operation '{0}' is forwarded by more than one routine")]
    DuplicateForwarder(String),

    /// A forwarding routine's declared shape differs from its operation.
    #[error("Routine '{routine}' does not match operation '{signature}'")]
    SignatureMismatch { routine: String, signature: String },

    /// A routine body failed verification.
    #[error("Routine '{routine}' is invalid at instruction {at}: {reason}")]
    InvalidRoutine {
        routine: String,
        at: usize,
        reason: String,
    },
}

/// A materialized proxy type could not be turned into a working instance.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActivationError {
    /// `invoke_named` was given a routine the type does not declare.
    #[error("Type '{type_name}' has no routine named '{routine}'")]
    RoutineNotFound { type_name: String, routine: String },

    /// `invoke_named` only runs setters.
    #[error("Routine '{0}' is not a setter")]
    NotASetter(String),

    /// The injected value does not fit the setter's field.
    #[error("Routine '{routine}' expects {expected}, got {actual}")]
    InjectionMismatch {
        routine: String,
        expected: FieldKind,
        actual: FieldKind,
    },

    /// Hidden state is written exactly once.
    #[error("Field '{0}' is already initialized")]
    FieldAlreadySet(String),

    /// A declared field was still empty when the instance was about to be published.
    #[error("Field '{0}' was never initialized")]
    FieldNotWired(String),

    /// A setter routine stopped on an instruction it could not execute.
    #[error("Routine '{routine}' faulted: {reason}")]
    Fault { routine: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_convert_into_umbrella() {
        let err: ConduitError = SynthesisError::GenericOperation("map".into()).into();
        assert!(matches!(err, ConduitError::Synthesis(_)));
        assert_eq!(err.to_string(), "Generic operation 'map' is not supported");

        let err: ConduitError = ActivationError::FieldNotWired("__target".into()).into();
        assert!(matches!(err, ConduitError::Activation(_)));
    }
}
