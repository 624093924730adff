//! Operators applied by the kernels and the selector
//!
//! Built-in operators are identified by an opcode and resolved per element
//! type through [`Element`](crate::Element). User-defined operators carry a
//! name, the C definition the kernel generator compiles, and a Rust closure
//! the generic kernels evaluate. The C definition of a unary op named `f`
//! must define `void f (T *z, const T *x)`, a binary op
//! `void f (T *z, const T *x, const T *y)` and a predicate
//! `void f (bool *z, const T *x, int64_t i, int64_t j, const T *y)`.

pub mod binary;
pub mod index_unary;
pub mod unary;

pub use binary::{BinaryOp, Monoid, UserBinaryOp};
pub use index_unary::{IndexUnaryOp, InnerRange, UserPredicate};
pub use unary::{UnaryOp, UserUnaryOp};

/// Opcode byte reserved for every user-defined operator
pub const USER_OPCODE: u8 = 0xFE;

/// Built-in unary operators
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOpcode {
    Identity = 1,
    Ainv = 2,
    Abs = 3,
    Minv = 4,
    One = 5,
}

impl UnaryOpcode {
    pub fn name(self) -> &'static str {
        match self {
            UnaryOpcode::Identity => "identity",
            UnaryOpcode::Ainv => "ainv",
            UnaryOpcode::Abs => "abs",
            UnaryOpcode::Minv => "minv",
            UnaryOpcode::One => "one",
        }
    }
}

/// Built-in binary operators
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOpcode {
    First = 16,
    Second = 17,
    Pair = 18,
    Plus = 19,
    Minus = 20,
    Times = 21,
    Div = 22,
    Min = 23,
    Max = 24,
}

impl BinaryOpcode {
    pub fn name(self) -> &'static str {
        match self {
            BinaryOpcode::First => "first",
            BinaryOpcode::Second => "second",
            BinaryOpcode::Pair => "pair",
            BinaryOpcode::Plus => "plus",
            BinaryOpcode::Minus => "minus",
            BinaryOpcode::Times => "times",
            BinaryOpcode::Div => "div",
            BinaryOpcode::Min => "min",
            BinaryOpcode::Max => "max",
        }
    }
}

/// Name, opcode byte and optional C definition of an operator, as seen by
/// the kernel encoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpSignature {
    pub opcode: u8,
    pub name: String,
    /// `None` for built-in operators
    pub defn: Option<String>,
}

impl OpSignature {
    pub fn builtin(opcode: u8, name: &str) -> Self {
        Self {
            opcode,
            name: name.to_string(),
            defn: None,
        }
    }

    pub fn user(name: &str, defn: &str) -> Self {
        Self {
            opcode: USER_OPCODE,
            name: name.to_string(),
            defn: Some(defn.to_string()),
        }
    }

    pub fn is_builtin(&self) -> bool {
        self.defn.is_none()
    }
}
