//! Uniform values passed across the observer boundary.
//!
//! Arguments and results travel to the wrapped implementation in their native
//! types. They are only boxed into a [`Value`] when an observer is attached and
//! the forwarding routine asks for it.

use serde::Serialize;
use tracing::warn;

pub use serde_json::Value;

/// Largest operation arity [`Arguments`] is implemented for.
pub const MAX_ARITY: usize = 12;

/// Payload of the after-hook: the boxed result, or the explicit no-value marker
/// for operations that return nothing.
///
/// `NoValue` is distinct from `Value(Value::Null)`: an operation returning
/// `Option::None` reports the latter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Returned {
    /// The operation produced a value.
    Value(Value),
    /// The operation returns nothing.
    NoValue,
}

impl Returned {
    /// Whether this is the no-value marker.
    pub fn is_no_value(&self) -> bool {
        matches!(self, Returned::NoValue)
    }

    /// The boxed result, if the operation produced one.
    pub fn value(&self) -> Option<&Value> {
        match self {
            Returned::Value(value) => Some(value),
            Returned::NoValue => None,
        }
    }
}

impl From<Value> for Returned {
    fn from(value: Value) -> Self {
        Returned::Value(value)
    }
}

/// Box any serializable value.
///
/// A value serde refuses (a map with non-string keys, for instance) is boxed as
/// a string describing the failure rather than aborting the call.
pub fn box_value<T: Serialize + ?Sized>(value: &T) -> Value {
    match serde_json::to_value(value) {
        Ok(boxed) => boxed,
        Err(e) => {
            warn!(error = %e, "Value could not be boxed for the observer");
            Value::String(format!("<unboxable: {}>", e))
        }
    }
}

/// The native argument list of one call, as a tuple.
///
/// Implemented for `()` and for tuples of up to [`MAX_ARITY`] serializable
/// elements.
pub trait Arguments {
    /// Number of arguments.
    const LEN: usize;

    /// Box the argument at `index`, or `None` past the end.
    fn box_at(&self, index: usize) -> Option<Value>;

    /// Box every argument in order.
    fn box_all(&self) -> Vec<Value> {
        (0..Self::LEN).filter_map(|i| self.box_at(i)).collect()
    }
}

impl Arguments for () {
    const LEN: usize = 0;

    fn box_at(&self, _index: usize) -> Option<Value> {
        None
    }
}

macro_rules! impl_arguments {
    ($len:expr; $($idx:tt : $ty:ident),+) => {
        impl<$($ty: Serialize),+> Arguments for ($($ty,)+) {
            const LEN: usize = $len;

            fn box_at(&self, index: usize) -> Option<Value> {
                match index {
                    $($idx => Some(box_value(&self.$idx)),)+
                    _ => None,
                }
            }
        }
    };
}

impl_arguments!(1; 0: A);
impl_arguments!(2; 0: A, 1: B);
impl_arguments!(3; 0: A, 1: B, 2: C);
impl_arguments!(4; 0: A, 1: B, 2: C, 3: D);
impl_arguments!(5; 0: A, 1: B, 2: C, 3: D, 4: E);
impl_arguments!(6; 0: A, 1: B, 2: C, 3: D, 4: E, 5: F);
impl_arguments!(7; 0: A, 1: B, 2: C, 3: D, 4: E, 5: F, 6: G);
impl_arguments!(8; 0: A, 1: B, 2: C, 3: D, 4: E, 5: F, 6: G, 7: H);
impl_arguments!(9; 0: A, 1: B, 2: C, 3: D, 4: E, 5: F, 6: G, 7: H, 8: I);
impl_arguments!(10; 0: A, 1: B, 2: C, 3: D, 4: E, 5: F, 6: G, 7: H, 8: I, 9: J);
impl_arguments!(11; 0: A, 1: B, 2: C, 3: D, 4: E, 5: F, 6: G, 7: H, 8: I, 9: J, 10: K);
impl_arguments!(12; 0: A, 1: B, 2: C, 3: D, 4: E, 5: F, 6: G, 7: H, 8: I, 9: J, 10: K, 11: L);
