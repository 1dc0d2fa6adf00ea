//! Interpreter for routine bodies.
//!
//! One interpreter serves every operation shape: the native arguments, the
//! typed delegate call and the result cell stay behind the [`Frame`] trait, and
//! the stack only ever holds references to them.

use crate::activation::Injection;
use crate::observer::SharedObserver;
use crate::proxy::FieldCell;
use crate::synth::{Instr, Routine};
use crate::value::{Returned, Value};
use std::fmt;

/// The typed side of one forwarded call.
pub(crate) trait Frame<'p, C: ?Sized> {
    /// Box argument `index` for the observer.
    fn box_arg(&self, index: usize) -> Option<Value>;

    /// Run the delegated call with the native arguments.
    fn call_target(&mut self, target: &'p C);

    /// Whether the delegated call reported a failure.
    fn is_failure(&self) -> bool;

    /// Box the delegated call's successful result.
    fn box_result(&self) -> Option<Value>;
}

/// What a routine runs on: a forwarded call, or the value handed to a setter.
pub(crate) enum Input<'f, 'p, C: ?Sized> {
    Call(&'f mut dyn Frame<'p, C>),
    Inject(Option<Injection<C>>),
}

#[derive(Debug)]
pub(crate) enum Fault {
    /// The field at this index had already been written.
    AlreadySet(usize),
    Invalid { at: usize, reason: String },
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::AlreadySet(index) => write!(f, "field #{} is already set", index),
            Fault::Invalid { at, reason } => write!(f, "instruction {}: {}", at, reason),
        }
    }
}

enum Slot<'p, C: ?Sized> {
    Target(&'p C),
    Observer(&'p SharedObserver),
    Injection(Injection<C>),
    Name,
    Array(Vec<Value>),
    Arg(u16),
    Boxed(Value),
    NoValue,
    Result,
}

fn frame<'a, 'f, 'p, C: ?Sized>(
    input: &'a mut Input<'f, 'p, C>,
) -> Option<&'a mut (dyn Frame<'p, C> + 'f)> {
    match input {
        Input::Call(frame) => Some(&mut **frame),
        Input::Inject(_) => None,
    }
}

/// Run `routine` against an instance's field cells.
pub(crate) fn execute<'p, C: ?Sized>(
    cells: &'p [FieldCell<C>],
    routine: &Routine,
    mut input: Input<'_, 'p, C>,
) -> Result<(), Fault> {
    let mut stack: Vec<Slot<'p, C>> = Vec::with_capacity(4);
    let mut local = false;

    for (at, &instr) in routine.body.iter().enumerate() {
        let invalid = move |reason: &str| Fault::Invalid {
            at,
            reason: reason.to_string(),
        };

        match instr {
            Instr::LoadArg(index) => {
                let slot = match &mut input {
                    Input::Call(_) => Slot::Arg(index),
                    Input::Inject(injection) => Slot::Injection(
                        injection
                            .take()
                            .ok_or_else(|| invalid("argument already consumed"))?,
                    ),
                };
                stack.push(slot);
            }
            Instr::LoadField(id) => {
                let slot = match cells.get(id.index()) {
                    Some(FieldCell::Target(cell)) => cell.get().map(|target| Slot::Target(&**target)),
                    Some(FieldCell::Observer(cell)) => cell.get().map(Slot::Observer),
                    None => return Err(invalid("unknown field")),
                };
                stack.push(slot.ok_or_else(|| invalid("field read before it was initialized"))?);
            }
            Instr::StoreField(id) => {
                let Some(Slot::Injection(value)) = stack.pop() else {
                    return Err(invalid("expected an injected value"));
                };
                let stored = match (cells.get(id.index()), value) {
                    (Some(FieldCell::Target(cell)), Injection::Target(target)) => cell.set(target).is_ok(),
                    (Some(FieldCell::Observer(cell)), Injection::Observer(observer)) => {
                        cell.set(observer).is_ok()
                    }
                    _ => return Err(invalid("injected value does not fit the field")),
                };
                if !stored {
                    return Err(Fault::AlreadySet(id.index()));
                }
            }
            Instr::LoadName => stack.push(Slot::Name),
            Instr::NewArray(len) => stack.push(Slot::Array(vec![Value::Null; len as usize])),
            Instr::Box => {
                let frame = frame(&mut input).ok_or_else(|| invalid("no call frame"))?;
                let boxed = match stack.pop() {
                    Some(Slot::Arg(index)) => frame.box_arg(index as usize),
                    Some(Slot::Result) => frame.box_result(),
                    _ => None,
                };
                stack.push(Slot::Boxed(boxed.ok_or_else(|| invalid("nothing to box"))?));
            }
            Instr::StoreElem(index) => {
                let Some(Slot::Boxed(value)) = stack.pop() else {
                    return Err(invalid("expected a boxed value"));
                };
                match stack.last_mut() {
                    Some(Slot::Array(items)) if (index as usize) < items.len() => {
                        items[index as usize] = value;
                    }
                    _ => return Err(invalid("no array slot")),
                }
            }
            Instr::StoreLocal => match stack.pop() {
                Some(Slot::Result) => local = true,
                _ => return Err(invalid("expected the delegated result")),
            },
            Instr::LoadLocal => {
                if !local {
                    return Err(invalid("local read before it was stored"));
                }
                stack.push(Slot::Result);
            }
            Instr::LoadNoValue => stack.push(Slot::NoValue),
            Instr::Pop => {
                stack.pop().ok_or_else(|| invalid("stack underflow"))?;
            }
            Instr::CallTarget => {
                let Some(Slot::Target(target)) = stack.pop() else {
                    return Err(invalid("expected the wrapped implementation"));
                };
                frame(&mut input)
                    .ok_or_else(|| invalid("no call frame"))?
                    .call_target(target);
                stack.push(Slot::Result);
            }
            Instr::CallBefore => {
                let (Some(Slot::Array(arguments)), Some(Slot::Name), Some(Slot::Observer(observer))) =
                    (stack.pop(), stack.pop(), stack.pop())
                else {
                    return Err(invalid("malformed before-hook payload"));
                };
                observer.before_execute(&routine.name, &arguments);
            }
            Instr::CallAfter => {
                let result = match stack.pop() {
                    Some(Slot::Boxed(value)) => Returned::Value(value),
                    Some(Slot::NoValue) => Returned::NoValue,
                    _ => return Err(invalid("malformed after-hook payload")),
                };
                let (Some(Slot::Name), Some(Slot::Observer(observer))) = (stack.pop(), stack.pop()) else {
                    return Err(invalid("malformed after-hook payload"));
                };
                observer.after_execute(&routine.name, &result);
            }
            Instr::ExitOnFailure => {
                let failed = frame(&mut input)
                    .ok_or_else(|| invalid("no call frame"))?
                    .is_failure();
                if failed {
                    return Ok(());
                }
            }
            Instr::Ret => return Ok(()),
        }
    }

    Err(Fault::Invalid {
        at: routine.body.len(),
        reason: "routine does not end with ret".to_string(),
    })
}
