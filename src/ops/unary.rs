//! Unary operators `z = f(x)`

use std::fmt;
use std::sync::Arc;

use super::{OpSignature, UnaryOpcode};
use crate::error::{Error, Result};
use crate::matrix::Element;

/// A unary operator defined outside the library
pub struct UserUnaryOp<T> {
    pub name: String,
    pub defn: String,
    pub func: Arc<dyn Fn(T) -> T + Send + Sync>,
}

impl<T> fmt::Debug for UserUnaryOp<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserUnaryOp").field("name", &self.name).finish()
    }
}

/// Unary operator over one element type
#[derive(Debug, Clone)]
pub enum UnaryOp<T> {
    Builtin(UnaryOpcode),
    User(Arc<UserUnaryOp<T>>),
}

impl<T: Element> UnaryOp<T> {
    /// Defines a user operator. `defn` is the C source of `name`.
    pub fn user(name: &str, defn: &str, func: impl Fn(T) -> T + Send + Sync + 'static) -> Self {
        UnaryOp::User(Arc::new(UserUnaryOp {
            name: name.to_string(),
            defn: defn.to_string(),
            func: Arc::new(func),
        }))
    }

    pub fn signature(&self) -> OpSignature {
        match self {
            UnaryOp::Builtin(code) => OpSignature::builtin(*code as u8, code.name()),
            UnaryOp::User(op) => OpSignature::user(&op.name, &op.defn),
        }
    }

    /// Resolves the operator to a callable for the generic kernels
    pub fn resolve(&self) -> Result<Arc<dyn Fn(T) -> T + Send + Sync>> {
        match self {
            UnaryOp::Builtin(code) => T::unary_fn(*code)
                .map(|f| Arc::new(f) as Arc<dyn Fn(T) -> T + Send + Sync>)
                .ok_or_else(|| {
                    Error::Unsupported(format!(
                        "unary op '{}' is not defined for type '{}'",
                        code.name(),
                        T::type_desc().name
                    ))
                }),
            UnaryOp::User(op) => Ok(Arc::clone(&op.func)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_resolves() {
        let f = UnaryOp::<f64>::Builtin(UnaryOpcode::Ainv).resolve().unwrap();
        assert_eq!(f(2.5), -2.5);
    }

    #[test]
    fn user_signature() {
        let op = UnaryOp::<f64>::user(
            "twice",
            "void twice (double *z, const double *x) { (*z) = 2 * (*x) ; }",
            |x| 2.0 * x,
        );
        let sig = op.signature();
        assert!(!sig.is_builtin());
        assert_eq!(sig.name, "twice");
        assert_eq!((op.resolve().unwrap())(4.0), 8.0);
    }
}
