//! The instruction set routines are written in.

use serde::Serialize;
use std::fmt;

/// Index of a field on a type under construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FieldId(pub(crate) u16);

impl FieldId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One step of a routine body.
///
/// Routines run on a small operand stack. Native arguments and the delegated
/// result never enter the stack themselves; the stack holds references to them
/// until `Box` turns one into a [`Value`](crate::Value).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Instr {
    /// Push a reference to argument `n`.
    LoadArg(u16),
    /// Push the contents of a field.
    LoadField(FieldId),
    /// Pop an injected value into a field.
    StoreField(FieldId),
    /// Push the name of the routine's operation.
    LoadName,
    /// Push a new arguments array of the given length.
    NewArray(u16),
    /// Pop an argument or result reference and push its boxed value.
    Box,
    /// Pop a boxed value into slot `n` of the array beneath it.
    StoreElem(u16),
    /// Pop the delegated result into the routine's single local.
    StoreLocal,
    /// Push the delegated result back from the local.
    LoadLocal,
    /// Push the no-value marker.
    LoadNoValue,
    /// Discard the top of the stack.
    Pop,
    /// Pop the wrapped implementation and invoke the routine's operation on it.
    CallTarget,
    /// Pop observer, name and arguments array; run the before-hook.
    CallBefore,
    /// Pop observer, name and boxed result or marker; run the after-hook.
    CallAfter,
    /// Return at once if the delegated call reported a failure.
    ExitOnFailure,
    /// Finish the routine.
    Ret,
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instr::LoadArg(n) => write!(f, "ldarg {}", n),
            Instr::LoadField(id) => write!(f, "ldfld #{}", id.0),
            Instr::StoreField(id) => write!(f, "stfld #{}", id.0),
            Instr::LoadName => f.write_str("ldname"),
            Instr::NewArray(n) => write!(f, "newarr {}", n),
            Instr::Box => f.write_str("box"),
            Instr::StoreElem(n) => write!(f, "stelem {}", n),
            Instr::StoreLocal => f.write_str("stloc"),
            Instr::LoadLocal => f.write_str("ldloc"),
            Instr::LoadNoValue => f.write_str("ldnovalue"),
            Instr::Pop => f.write_str("pop"),
            Instr::CallTarget => f.write_str("call target"),
            Instr::CallBefore => f.write_str("call before"),
            Instr::CallAfter => f.write_str("call after"),
            Instr::ExitOnFailure => f.write_str("exit.onfailure"),
            Instr::Ret => f.write_str("ret"),
        }
    }
}
