//! # Conduit Core
//!
//! Runtime forwarding proxies with an optional before/after call observer.
//!
//! Given a contract (a trait) and an implementation of it, Conduit synthesizes
//! a proxy type that satisfies the same contract, forwards every call to the
//! wrapped implementation and, when an observer is attached, reports each call
//! to it just before and just after it runs.
//!
//! ## Features
//!
//! - Type synthesis from a contract's operation table, with verified routines
//! - Write-once wiring of the wrapped implementation and the observer
//! - Boxing of arguments and results only when an observer is attached
//! - Failures of the wrapped implementation reach the caller untouched
//! - Per-process cache of synthesized types
//!
//! ## Example
//!
//! ```rust,ignore
//! use conduit_core::{contract, create_proxy, CallRecorder};
//! use std::sync::Arc;
//!
//! #[contract]
//! pub trait Calculator: Send + Sync {
//!     fn add(&self, a: i32, b: i32) -> i32;
//! }
//!
//! let recorder = CallRecorder::new();
//! let calc = create_proxy::<dyn Calculator>(Box::new(RealCalculator), Some(Arc::new(recorder.clone())))?;
//!
//! assert_eq!(calc.add(2, 3), 5);
//! assert_eq!(recorder.len(), 2);
//! ```

pub mod activation;
pub mod builder;
pub mod cache;
pub mod config;
pub mod contract;
pub mod error;
pub mod forwarder;
pub mod observer;
pub mod proxy;
pub mod recorder;
pub mod synth;
pub mod value;
pub mod wiring;
mod vm;

pub use activation::{Activator, Injection};
pub use builder::{create_proxy, ProxyBuilder};
pub use cache::TypeCache;
pub use config::ProxyConfig;
pub use contract::{
    enumerate_operations, Contract, ContractDescriptor, FallibleOutput, OperationId, OperationSig, Param,
    ReturnType, TypeDesc,
};
pub use error::{ActivationError, ConduitError, Result, SynthesisError};
pub use observer::{ProxyObserver, SharedObserver, TracingObserver};
pub use proxy::Proxy;
pub use recorder::{CallEvent, CallRecorder};
pub use synth::{FieldKind, ProxyType, TypeBuilder};
pub use value::{box_value, Arguments, Returned, Value};

pub use conduit_macros::contract;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{
        contract, create_proxy, CallRecorder, ConduitError, Contract, Proxy, ProxyBuilder, ProxyConfig,
        ProxyObserver, Result, Returned, SharedObserver, TracingObserver, Value,
    };
}
