//! Abstract stack simulation of routine bodies.
//!
//! A routine that passes verification cannot underflow the stack, read an
//! unknown field or argument, box something that is not an argument or a
//! result, or reach a hook with a payload of the wrong shape. The interpreter
//! still checks every step, but only verified routines reach it through
//! [`TypeBuilder::materialize`](super::TypeBuilder::materialize).

use super::instr::Instr;
use super::types::{FieldDef, FieldKind, Routine, RoutineRole};
use crate::error::SynthesisError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operand {
    Target,
    Observer,
    Injection(FieldKind),
    Name,
    Array { len: u16, filled: u64 },
    Arg,
    BoxedArg,
    BoxedResult,
    NoValue,
    Result,
}

struct Checker<'r> {
    routine: &'r Routine,
    fields: &'r [FieldDef],
    stack: Vec<Operand>,
    at: usize,
    arg_loaded: bool,
    stored: bool,
    called: bool,
    local: bool,
}

impl<'r> Checker<'r> {
    fn fail(&self, reason: impl Into<String>) -> SynthesisError {
        SynthesisError::InvalidRoutine {
            routine: self.routine.name.clone(),
            at: self.at,
            reason: reason.into(),
        }
    }

    fn pop(&mut self) -> Result<Operand, SynthesisError> {
        self.stack.pop().ok_or_else(|| self.fail("stack underflow"))
    }

    fn expect(&mut self, wanted: Operand) -> Result<(), SynthesisError> {
        let found = self.pop()?;
        if found == wanted {
            Ok(())
        } else {
            Err(self.fail(format!("expected {:?}, found {:?}", wanted, found)))
        }
    }

    fn field_kind(&self, index: usize) -> Result<FieldKind, SynthesisError> {
        self.fields
            .get(index)
            .map(|f| f.kind)
            .ok_or_else(|| self.fail(format!("unknown field #{}", index)))
    }

    fn forwarding(&self) -> Result<(), SynthesisError> {
        match self.routine.role {
            RoutineRole::Forwarder(_) => Ok(()),
            _ => Err(self.fail("instruction is only valid in a forwarding routine")),
        }
    }

    fn step(&mut self, instr: Instr) -> Result<(), SynthesisError> {
        let arity = self.routine.params.len();
        let produces_value = self.routine.returns.produces_value();

        match instr {
            Instr::LoadArg(index) => match self.routine.role {
                RoutineRole::Setter(kind) => {
                    if index != 0 || self.arg_loaded {
                        return Err(self.fail("a setter loads its single argument once"));
                    }
                    self.arg_loaded = true;
                    self.stack.push(Operand::Injection(kind));
                }
                _ => {
                    if index as usize >= arity {
                        return Err(self.fail(format!("argument {} out of range", index)));
                    }
                    self.stack.push(Operand::Arg);
                }
            },
            Instr::LoadField(id) => {
                let operand = match self.field_kind(id.index())? {
                    FieldKind::WrappedImpl => Operand::Target,
                    FieldKind::Observer => Operand::Observer,
                };
                self.stack.push(operand);
            }
            Instr::StoreField(id) => {
                let kind = self.field_kind(id.index())?;
                if !matches!(self.routine.role, RoutineRole::Setter(_)) {
                    return Err(self.fail("fields are only stored by setters"));
                }
                self.expect(Operand::Injection(kind))?;
                self.stored = true;
            }
            Instr::LoadName => {
                self.forwarding()?;
                self.stack.push(Operand::Name);
            }
            Instr::NewArray(len) => {
                self.forwarding()?;
                if len as usize != arity {
                    return Err(self.fail(format!("array of {} for {} arguments", len, arity)));
                }
                self.stack.push(Operand::Array { len, filled: 0 });
            }
            Instr::Box => {
                let boxed = match self.pop()? {
                    Operand::Arg => Operand::BoxedArg,
                    Operand::Result if produces_value => Operand::BoxedResult,
                    Operand::Result => return Err(self.fail("operation returns no value to box")),
                    other => return Err(self.fail(format!("cannot box {:?}", other))),
                };
                self.stack.push(boxed);
            }
            Instr::StoreElem(index) => {
                self.expect(Operand::BoxedArg)?;
                let free = matches!(
                    self.stack.last(),
                    Some(Operand::Array { len, filled })
                        if index < *len && *filled & (1u64 << index) == 0
                );
                if !free {
                    return Err(self.fail(format!("no free array slot {}", index)));
                }
                if let Some(Operand::Array { filled, .. }) = self.stack.last_mut() {
                    *filled |= 1u64 << index;
                }
            }
            Instr::StoreLocal => {
                self.expect(Operand::Result)?;
                self.local = true;
            }
            Instr::LoadLocal => {
                if !self.local {
                    return Err(self.fail("local read before it is stored"));
                }
                self.stack.push(Operand::Result);
            }
            Instr::LoadNoValue => {
                if produces_value {
                    return Err(self.fail("no-value marker for an operation that returns a value"));
                }
                self.stack.push(Operand::NoValue);
            }
            Instr::Pop => {
                self.pop()?;
            }
            Instr::CallTarget => {
                self.forwarding()?;
                if self.called {
                    return Err(self.fail("wrapped implementation called twice"));
                }
                self.expect(Operand::Target)?;
                self.called = true;
                self.stack.push(Operand::Result);
            }
            Instr::CallBefore => {
                if self.called {
                    return Err(self.fail("before-hook after the delegated call"));
                }
                match self.pop()? {
                    Operand::Array { len, filled } if filled.count_ones() == len as u32 => {}
                    other => return Err(self.fail(format!("incomplete arguments {:?}", other))),
                }
                self.expect(Operand::Name)?;
                self.expect(Operand::Observer)?;
            }
            Instr::CallAfter => {
                if !self.called {
                    return Err(self.fail("after-hook before the delegated call"));
                }
                match self.pop()? {
                    Operand::BoxedResult | Operand::NoValue => {}
                    other => return Err(self.fail(format!("cannot report {:?}", other))),
                }
                self.expect(Operand::Name)?;
                self.expect(Operand::Observer)?;
            }
            Instr::ExitOnFailure => {
                if !self.routine.returns.is_fallible() {
                    return Err(self.fail("operation cannot fail"));
                }
                if self.stack.last() != Some(&Operand::Result) {
                    return Err(self.fail("no delegated result to inspect"));
                }
            }
            Instr::Ret => unreachable!("ret is handled by verify_routine"),
        }
        Ok(())
    }

    fn finish(&self) -> Result<(), SynthesisError> {
        match self.routine.role {
            RoutineRole::Setter(_) if !self.stored => Err(self.fail("setter never stores")),
            RoutineRole::Forwarder(_) if !self.called => {
                Err(self.fail("wrapped implementation is never called"))
            }
            _ if self.stack.is_empty() || self.stack == [Operand::Result] => Ok(()),
            _ => Err(self.fail(format!("stack not empty at ret: {:?}", self.stack))),
        }
    }
}

/// Verify one routine against the fields of its type.
pub(crate) fn verify_routine(routine: &Routine, fields: &[FieldDef]) -> Result<(), SynthesisError> {
    let mut checker = Checker {
        routine,
        fields,
        stack: Vec::new(),
        at: 0,
        arg_loaded: false,
        stored: false,
        called: false,
        local: false,
    };

    for (at, &instr) in routine.body.iter().enumerate() {
        checker.at = at;
        if instr == Instr::Ret {
            if at + 1 != routine.body.len() {
                return Err(checker.fail("instructions after ret"));
            }
            return checker.finish();
        }
        checker.step(instr)?;
    }

    checker.at = routine.body.len();
    Err(checker.fail("routine does not end with ret"))
}
