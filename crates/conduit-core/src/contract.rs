//! Contract descriptors and operation introspection.
//!
//! A contract is a trait. Its operation table is declared once, either by the
//! `#[contract]` attribute or by implementing [`Contract`] for the trait object
//! by hand, and is the only source the synthesizer reads.

use serde::Serialize;
use std::borrow::Cow;
use std::fmt;

/// A printable type name used in operation signatures.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TypeDesc(Cow<'static, str>);

impl TypeDesc {
    /// Describe `T` by its compiler-provided name.
    ///
    /// ```
    /// use conduit_core::TypeDesc;
    ///
    /// assert_eq!(TypeDesc::of::<i32>().name(), "i32");
    /// ```
    pub fn of<T: ?Sized>() -> Self {
        Self(Cow::Borrowed(std::any::type_name::<T>()))
    }

    /// Describe a type by an explicit name.
    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// The type name.
    pub fn name(&self) -> &str {
        &self.0
    }

    /// Whether this names the unit type.
    pub fn is_unit(&self) -> bool {
        self.0 == "()"
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One named parameter of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Param {
    pub name: String,
    pub ty: TypeDesc,
}

/// What an operation hands back to its caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnType {
    /// No value.
    Nothing,
    /// A plain value.
    Value(TypeDesc),
    /// A `Result`. The error is the wrapped implementation's own failure;
    /// `ok: None` means `Result<(), E>`.
    Fallible { ok: Option<TypeDesc>, err: TypeDesc },
}

impl ReturnType {
    /// A plain value of type `T`, or [`ReturnType::Nothing`] for `()`.
    pub fn of<T: ?Sized>() -> Self {
        let ty = TypeDesc::of::<T>();
        if ty.is_unit() {
            ReturnType::Nothing
        } else {
            ReturnType::Value(ty)
        }
    }

    /// The shape of an operation returning `R`, where `R` is a `Result`.
    pub fn fallible<R: FallibleOutput + ?Sized>() -> Self {
        let ok = TypeDesc::of::<R::Ok>();
        ReturnType::Fallible {
            ok: (!ok.is_unit()).then_some(ok),
            err: TypeDesc::of::<R::Err>(),
        }
    }

    /// Whether a successful call yields a value the after-hook can receive.
    pub fn produces_value(&self) -> bool {
        matches!(
            self,
            ReturnType::Value(_) | ReturnType::Fallible { ok: Some(_), .. }
        )
    }

    /// Whether the operation can report a failure through its return value.
    pub fn is_fallible(&self) -> bool {
        matches!(self, ReturnType::Fallible { .. })
    }
}

impl fmt::Display for ReturnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnType::Nothing => f.write_str("()"),
            ReturnType::Value(ty) => write!(f, "{}", ty),
            ReturnType::Fallible { ok: Some(ok), err } => write!(f, "Result<{}, {}>", ok, err),
            ReturnType::Fallible { ok: None, err } => write!(f, "Result<(), {}>", err),
        }
    }
}

/// Splits a `Result` return type into its success and failure types.
pub trait FallibleOutput {
    type Ok: ?Sized;
    type Err: ?Sized;
}

impl<T, E> FallibleOutput for std::result::Result<T, E> {
    type Ok = T;
    type Err = E;
}

/// Name, parameters and return type of one contract operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationSig {
    pub name: String,
    pub params: Vec<Param>,
    pub returns: ReturnType,
    /// Set for operations with type parameters, which cannot be forwarded.
    pub generic: bool,
}

impl OperationSig {
    /// Create an operation with no parameters that returns nothing.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            returns: ReturnType::Nothing,
            generic: false,
        }
    }

    /// Append a parameter.
    pub fn param(mut self, name: impl Into<String>, ty: TypeDesc) -> Self {
        self.params.push(Param {
            name: name.into(),
            ty,
        });
        self
    }

    /// Set the return type.
    pub fn returns(mut self, returns: ReturnType) -> Self {
        self.returns = returns;
        self
    }

    /// Mark the operation as generic.
    pub fn generic(mut self) -> Self {
        self.generic = true;
        self
    }

    /// Number of parameters.
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Two operations with the same shape cannot be told apart by a caller.
    pub fn same_shape(&self, other: &OperationSig) -> bool {
        self.name == other.name
            && self.params.len() == other.params.len()
            && self
                .params
                .iter()
                .zip(&other.params)
                .all(|(a, b)| a.ty == b.ty)
    }
}

impl fmt::Display for OperationSig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", param.name, param.ty)?;
        }
        write!(f, ") -> {}", self.returns)
    }
}

/// Position of an operation in its contract's declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct OperationId(usize);

impl OperationId {
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0
    }
}

/// The statically declared operation table of a contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractDescriptor {
    pub name: String,
    pub operations: Vec<OperationSig>,
}

impl ContractDescriptor {
    /// Create a contract with no operations.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            operations: Vec::new(),
        }
    }

    /// Append an operation.
    pub fn operation(mut self, operation: OperationSig) -> Self {
        self.operations.push(operation);
        self
    }
}

/// Implemented for the trait-object type of every proxiable contract.
///
/// # Example
///
/// ```rust,ignore
/// impl Contract for dyn Calculator {
///     fn descriptor() -> ContractDescriptor {
///         ContractDescriptor::new("Calculator").operation(
///             OperationSig::new("add")
///                 .param("a", TypeDesc::of::<i32>())
///                 .param("b", TypeDesc::of::<i32>())
///                 .returns(ReturnType::of::<i32>()),
///         )
///     }
/// }
/// ```
pub trait Contract: 'static {
    /// The contract's operation table, in declaration order.
    fn descriptor() -> ContractDescriptor;
}

/// Enumerate a contract's operations in declaration order.
pub fn enumerate_operations<C: Contract + ?Sized>() -> Vec<(OperationId, OperationSig)> {
    C::descriptor()
        .operations
        .into_iter()
        .enumerate()
        .map(|(index, sig)| (OperationId::new(index), sig))
        .collect()
}
