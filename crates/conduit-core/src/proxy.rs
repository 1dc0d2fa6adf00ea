//! Live proxy instances and the typed entry points of their forwarding routines.

use crate::contract::{Contract, OperationId, OperationSig};
use crate::observer::SharedObserver;
use crate::synth::{FieldKind, ProxyType};
use crate::value::{box_value, Arguments, Value};
use crate::vm::{self, Frame, Input};
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Storage for one declared field. Written once, by a setter, before the
/// instance is published.
pub(crate) enum FieldCell<C: ?Sized> {
    Target(OnceLock<Box<C>>),
    Observer(OnceLock<SharedObserver>),
}

impl<C: ?Sized> FieldCell<C> {
    pub(crate) fn for_kind(kind: FieldKind) -> Self {
        match kind {
            FieldKind::WrappedImpl => FieldCell::Target(OnceLock::new()),
            FieldKind::Observer => FieldCell::Observer(OnceLock::new()),
        }
    }

    pub(crate) fn is_set(&self) -> bool {
        match self {
            FieldCell::Target(cell) => cell.get().is_some(),
            FieldCell::Observer(cell) => cell.get().is_some(),
        }
    }
}

/// An instance of a synthesized proxy type for contract `C`.
///
/// `Proxy<dyn Trait>` implements `Trait` (the `#[contract]` attribute writes
/// that impl), so a proxy goes anywhere the wrapped implementation could.
///
/// # Example
///
/// ```rust,ignore
/// use conduit_core::{create_proxy, CallRecorder};
///
/// let recorder = CallRecorder::new();
/// let calc = create_proxy::<dyn Calculator>(Box::new(RealCalculator), Some(Arc::new(recorder.clone())))?;
///
/// assert_eq!(calc.add(2, 3), 5);
/// assert_eq!(recorder.len(), 2);
/// ```
pub struct Proxy<C: Contract + ?Sized> {
    pub(crate) ty: Arc<ProxyType<C>>,
    pub(crate) cells: Vec<FieldCell<C>>,
}

impl<C: Contract + ?Sized> Proxy<C> {
    /// The type this instance was created from.
    pub fn proxy_type(&self) -> &Arc<ProxyType<C>> {
        &self.ty
    }

    /// Name of the proxied contract.
    pub fn contract_name(&self) -> &str {
        &self.ty.contract().name
    }

    /// Whether calls are reported to an observer.
    pub fn is_observed(&self) -> bool {
        self.ty.is_observed()
    }

    /// The forwarded operations, in declaration order.
    pub fn operations(&self) -> &[OperationSig] {
        &self.ty.contract().operations
    }

    /// Forward an operation that cannot fail.
    ///
    /// `args` are the call's native arguments; `call` performs the delegated
    /// call on the wrapped implementation and is run exactly once.
    ///
    /// `A` and `R` must be serializable whether or not the proxy is observed.
    /// They are only boxed when an observer is attached, but the bound is
    /// checked at compile time, so a contract taking a non-serializable
    /// argument does not compile:
    ///
    /// ```compile_fail
    /// use conduit_core::contract;
    ///
    /// pub struct Handle;
    ///
    /// #[contract]
    /// pub trait Door {
    ///     fn open(&self, key: Handle);
    /// }
    /// ```
    ///
    /// # Panics
    ///
    /// If `op` is not an operation of `C`.
    pub fn dispatch<'p, A, R, F>(&'p self, op: OperationId, args: A, call: F) -> R
    where
        A: Arguments,
        R: Serialize,
        F: FnOnce(&'p C, A) -> R,
    {
        let mut frame = Invocation {
            args: Some(args),
            call: Some(call),
            result: None,
        };
        let name = self.run(op, &mut frame);
        frame
            .result
            .unwrap_or_else(|| panic!("Operation '{}' returned without delegating", name))
    }

    /// Forward an operation returning `Result`.
    ///
    /// An `Err` from the wrapped implementation is returned untouched and the
    /// after-hook is skipped.
    ///
    /// # Panics
    ///
    /// If `op` is not an operation of `C`.
    pub fn dispatch_fallible<'p, A, T, E, F>(
        &'p self,
        op: OperationId,
        args: A,
        call: F,
    ) -> Result<T, E>
    where
        A: Arguments,
        T: Serialize,
        F: FnOnce(&'p C, A) -> Result<T, E>,
    {
        let mut frame = FallibleInvocation {
            args: Some(args),
            call: Some(call),
            result: None,
        };
        let name = self.run(op, &mut frame);
        frame
            .result
            .unwrap_or_else(|| panic!("Operation '{}' returned without delegating", name))
    }

    fn run<'p>(&'p self, op: OperationId, frame: &mut dyn Frame<'p, C>) -> &'p str {
        let Some(routine) = self.ty.forwarder(op) else {
            panic!(
                "Contract '{}' has no operation #{}",
                self.contract_name(),
                op.index()
            );
        };
        if let Err(fault) = vm::execute(&self.cells, routine, Input::Call(frame)) {
            panic!("Forwarding routine '{}' faulted: {}", routine.name, fault);
        }
        &routine.name
    }
}

impl<C: Contract + ?Sized> fmt::Debug for Proxy<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("type", &self.ty.name())
            .field("observed", &self.is_observed())
            .finish()
    }
}

struct Invocation<A, F, R> {
    args: Option<A>,
    call: Option<F>,
    result: Option<R>,
}

impl<'p, C, A, F, R> Frame<'p, C> for Invocation<A, F, R>
where
    C: ?Sized + 'p,
    A: Arguments,
    R: Serialize,
    F: FnOnce(&'p C, A) -> R,
{
    fn box_arg(&self, index: usize) -> Option<Value> {
        self.args.as_ref()?.box_at(index)
    }

    fn call_target(&mut self, target: &'p C) {
        if let (Some(call), Some(args)) = (self.call.take(), self.args.take()) {
            self.result = Some(call(target, args));
        }
    }

    fn is_failure(&self) -> bool {
        false
    }

    fn box_result(&self) -> Option<Value> {
        self.result.as_ref().map(box_value)
    }
}

struct FallibleInvocation<A, F, T, E> {
    args: Option<A>,
    call: Option<F>,
    result: Option<Result<T, E>>,
}

impl<'p, C, A, F, T, E> Frame<'p, C> for FallibleInvocation<A, F, T, E>
where
    C: ?Sized + 'p,
    A: Arguments,
    T: Serialize,
    F: FnOnce(&'p C, A) -> Result<T, E>,
{
    fn box_arg(&self, index: usize) -> Option<Value> {
        self.args.as_ref()?.box_at(index)
    }

    fn call_target(&mut self, target: &'p C) {
        if let (Some(call), Some(args)) = (self.call.take(), self.args.take()) {
            self.result = Some(call(target, args));
        }
    }

    fn is_failure(&self) -> bool {
        matches!(self.result, Some(Err(_)))
    }

    fn box_result(&self) -> Option<Value> {
        match &self.result {
            Some(Ok(value)) => Some(box_value(value)),
            _ => None,
        }
    }
}
