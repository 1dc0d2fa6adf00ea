//! Type synthesis: declare fields and routines, then materialize a verified,
//! instantiable proxy type.

mod builder;
mod instr;
mod types;
mod verify;

pub use builder::{RoutineBuilder, TypeBuilder};
pub use instr::{FieldId, Instr};
pub use types::{FieldDef, FieldKind, ProxyType, Routine, RoutineRole};
