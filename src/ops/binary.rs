//! Binary operators `z = f(x, y)` and the monoids built on them

use std::fmt;
use std::sync::Arc;

use super::{BinaryOpcode, OpSignature};
use crate::error::{Error, Result};
use crate::matrix::Element;

pub type BinaryFn<T> = Arc<dyn Fn(T, T) -> T + Send + Sync>;

/// A binary operator defined outside the library
pub struct UserBinaryOp<T> {
    pub name: String,
    pub defn: String,
    pub func: BinaryFn<T>,
}

impl<T> fmt::Debug for UserBinaryOp<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserBinaryOp").field("name", &self.name).finish()
    }
}

/// Binary operator over one element type
#[derive(Debug, Clone)]
pub enum BinaryOp<T> {
    Builtin(BinaryOpcode),
    User(Arc<UserBinaryOp<T>>),
}

impl<T: Element> BinaryOp<T> {
    pub fn user(name: &str, defn: &str, func: impl Fn(T, T) -> T + Send + Sync + 'static) -> Self {
        BinaryOp::User(Arc::new(UserBinaryOp {
            name: name.to_string(),
            defn: defn.to_string(),
            func: Arc::new(func),
        }))
    }

    pub fn signature(&self) -> OpSignature {
        match self {
            BinaryOp::Builtin(code) => OpSignature::builtin(*code as u8, code.name()),
            BinaryOp::User(op) => OpSignature::user(&op.name, &op.defn),
        }
    }

    pub fn resolve(&self) -> Result<BinaryFn<T>> {
        match self {
            BinaryOp::Builtin(code) => T::binary_fn(*code)
                .map(|f| Arc::new(f) as BinaryFn<T>)
                .ok_or_else(|| {
                    Error::Unsupported(format!(
                        "binary op '{}' is not defined for type '{}'",
                        code.name(),
                        T::type_desc().name
                    ))
                }),
            BinaryOp::User(op) => Ok(Arc::clone(&op.func)),
        }
    }
}

/// An associative, commutative operator with an identity and an optional
/// terminal value
#[derive(Debug, Clone)]
pub struct Monoid<T> {
    pub op: BinaryOp<T>,
    pub identity: T,
    pub terminal: Option<T>,
    /// C text of the identity and terminal for user monoids. Built-in monoids
    /// over built-in types are written from the values themselves.
    pub identity_text: Option<String>,
    pub terminal_text: Option<String>,
}

impl<T: Element> Monoid<T> {
    /// The built-in monoid for `op` (plus, times, min or max)
    pub fn builtin(op: BinaryOpcode) -> Result<Self> {
        let identity = T::monoid_identity(op).ok_or_else(|| {
            Error::Unsupported(format!(
                "'{}' has no monoid over '{}'",
                op.name(),
                T::type_desc().name
            ))
        })?;
        Ok(Self {
            op: BinaryOp::Builtin(op),
            identity,
            terminal: T::monoid_terminal(op),
            identity_text: None,
            terminal_text: None,
        })
    }

    /// A monoid over a user operator. The texts are the C expressions of
    /// `identity` and `terminal`.
    pub fn user(
        op: BinaryOp<T>,
        identity: T,
        identity_text: &str,
        terminal: Option<(T, &str)>,
    ) -> Self {
        Self {
            op,
            identity,
            terminal: terminal.map(|(t, _)| t),
            identity_text: Some(identity_text.to_string()),
            terminal_text: terminal.map(|(_, s)| s.to_string()),
        }
    }

    /// C text of the identity, if the monoid can be written in C
    pub fn identity_c(&self) -> Option<String> {
        self.identity_text
            .clone()
            .or_else(|| self.identity.c_literal())
    }

    /// C text of the terminal value: `Some(None)` when the monoid has no
    /// terminal, `None` when the terminal cannot be written in C
    pub fn terminal_c(&self) -> Option<Option<String>> {
        match (&self.terminal, &self.terminal_text) {
            (None, _) => Some(None),
            (Some(_), Some(text)) => Some(Some(text.clone())),
            (Some(t), None) => t.c_literal().map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_monoids() {
        let m = Monoid::<i32>::builtin(BinaryOpcode::Max).unwrap();
        assert_eq!(m.identity, i32::MIN);
        assert_eq!(m.terminal, Some(i32::MAX));
        assert_eq!(m.identity_c().unwrap(), "INT32_MIN");
        assert_eq!(m.terminal_c().unwrap().unwrap(), "INT32_MAX");

        let plus = Monoid::<f64>::builtin(BinaryOpcode::Plus).unwrap();
        assert_eq!(plus.terminal_c(), Some(None));

        assert!(Monoid::<f64>::builtin(BinaryOpcode::Minus).is_err());
    }

    #[test]
    fn user_monoid_texts() {
        let op = BinaryOp::<i64>::user(
            "gcd",
            "void gcd (int64_t *z, const int64_t *x, const int64_t *y) { }",
            |a, b| if b == 0 { a } else { a % b },
        );
        let m = Monoid::user(op, 0, "0", Some((1, "1")));
        assert_eq!(m.identity_c().unwrap(), "0");
        assert_eq!(m.terminal_c(), Some(Some("1".to_string())));
    }
}
