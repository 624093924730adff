//! Element types stored in a sparse matrix
//!
//! Every matrix holds values of one Rust type implementing [`Element`]. The
//! trait carries the runtime type descriptor used by the JIT encoder, a
//! formatter for C literals, and the dispatch table that maps built-in
//! opcodes to concrete functions. The tables for the built-in types are
//! generated by `impl_int_element!` and `impl_float_element!`; user types implement the trait by
//! hand and normally only support user-defined operators.

use std::fmt;

use num_traits::{Bounded, One, WrappingNeg};

use crate::ops::{BinaryOpcode, UnaryOpcode};

/// Type codes, stable across releases since they are part of the kernel
/// encoding
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeCode {
    Bool = 1,
    Int8 = 2,
    UInt8 = 3,
    Int16 = 4,
    UInt16 = 5,
    Int32 = 6,
    UInt32 = 7,
    Int64 = 8,
    UInt64 = 9,
    Fp32 = 10,
    Fp64 = 11,
    UserDefined = 14,
}

impl TypeCode {
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            TypeCode::Int8
                | TypeCode::UInt8
                | TypeCode::Int16
                | TypeCode::UInt16
                | TypeCode::Int32
                | TypeCode::UInt32
                | TypeCode::Int64
                | TypeCode::UInt64
        )
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            TypeCode::Int8 | TypeCode::Int16 | TypeCode::Int32 | TypeCode::Int64
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, TypeCode::Fp32 | TypeCode::Fp64)
    }
}

/// Runtime description of an element type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeDesc {
    /// Type code
    pub code: TypeCode,
    /// Size in bytes
    pub size: usize,
    /// C type name (`double`, `int32_t`, or the user type's name)
    pub name: String,
    /// C definition of a user type (`typedef struct { ... } name ;`)
    pub defn: Option<String>,
}

impl TypeDesc {
    /// Descriptor of a built-in type
    pub fn builtin(code: TypeCode, size: usize, name: &str) -> Self {
        Self {
            code,
            size,
            name: name.to_string(),
            defn: None,
        }
    }

    /// Descriptor of a user-defined type. Without a C definition the type is
    /// opaque and cannot be specialized by the JIT.
    pub fn user(name: &str, size: usize, defn: Option<&str>) -> Self {
        Self {
            code: TypeCode::UserDefined,
            size,
            name: name.to_string(),
            defn: defn.map(str::to_string),
        }
    }

    pub fn is_builtin(&self) -> bool {
        self.code != TypeCode::UserDefined
    }

    /// A user type the kernel generator has no C definition for
    pub fn is_opaque(&self) -> bool {
        !self.is_builtin() && self.defn.as_deref().map_or(true, |d| d.trim().is_empty())
    }
}

/// A value that can be stored in a [`SparseMatrix`](crate::SparseMatrix)
pub trait Element:
    Copy + Default + PartialEq + PartialOrd + fmt::Debug + Send + Sync + 'static
{
    /// Runtime descriptor of this type
    fn type_desc() -> TypeDesc;

    /// The value as a C literal of this type, if it can be written as one
    fn c_literal(&self) -> Option<String> {
        None
    }

    /// Built-in unary operator implementation for this type
    fn unary_fn(_op: UnaryOpcode) -> Option<fn(Self) -> Self> {
        None
    }

    /// Built-in binary operator implementation for this type
    fn binary_fn(_op: BinaryOpcode) -> Option<fn(Self, Self) -> Self> {
        None
    }

    /// Identity of the built-in monoid based on `op`
    fn monoid_identity(_op: BinaryOpcode) -> Option<Self> {
        None
    }

    /// Terminal (annihilator) of the built-in monoid based on `op`
    fn monoid_terminal(_op: BinaryOpcode) -> Option<Self> {
        None
    }

    /// True unless the value is the type's zero
    fn is_nonzero(&self) -> bool {
        *self != Self::default()
    }
}

// ----------------------------------------------------------------------------
// integer semantics shared by the Rust dispatch table and the generated C
// ----------------------------------------------------------------------------

/// `x / y` with GraphBLAS integer rules: division by zero saturates to the
/// type's extreme in the sign of `x` (0 / 0 = 0), everything else wraps
fn int_div<T>(x: T, y: T) -> T
where
    T: Copy + PartialOrd + Default + Bounded + WrappingNeg + One + std::ops::Div<Output = T>,
{
    let zero = T::default();
    if y == zero {
        if x == zero {
            zero
        } else if x > zero {
            T::max_value()
        } else {
            T::min_value()
        }
    } else if y < zero && y == T::one().wrapping_neg() {
        // MIN / -1 overflows; the wrapping result is -x
        x.wrapping_neg()
    } else {
        x / y
    }
}

macro_rules! impl_int_element {
    ($t:ty, $code:ident, $cname:expr, $min:expr, $max:expr, $abs:expr) => {
        impl Element for $t {
            fn type_desc() -> TypeDesc {
                TypeDesc::builtin(TypeCode::$code, std::mem::size_of::<$t>(), $cname)
            }

            fn c_literal(&self) -> Option<String> {
                Some(if *self == <$t>::MIN && <$t>::MIN != 0 {
                    $min.to_string()
                } else if *self == <$t>::MAX {
                    $max.to_string()
                } else {
                    format!("(({}) {})", $cname, self)
                })
            }

            fn unary_fn(op: UnaryOpcode) -> Option<fn(Self) -> Self> {
                Some(match op {
                    UnaryOpcode::Identity => |x| x,
                    UnaryOpcode::Ainv => |x: $t| x.wrapping_neg(),
                    UnaryOpcode::Abs => $abs,
                    UnaryOpcode::Minv => |x: $t| int_div(1 as $t, x),
                    UnaryOpcode::One => |_| 1,
                })
            }

            fn binary_fn(op: BinaryOpcode) -> Option<fn(Self, Self) -> Self> {
                Some(match op {
                    BinaryOpcode::First => |x, _| x,
                    BinaryOpcode::Second => |_, y| y,
                    BinaryOpcode::Pair => |_, _| 1,
                    BinaryOpcode::Plus => |x: $t, y: $t| x.wrapping_add(y),
                    BinaryOpcode::Minus => |x: $t, y: $t| x.wrapping_sub(y),
                    BinaryOpcode::Times => |x: $t, y: $t| x.wrapping_mul(y),
                    BinaryOpcode::Div => |x: $t, y: $t| int_div(x, y),
                    BinaryOpcode::Min => |x: $t, y: $t| if y < x { y } else { x },
                    BinaryOpcode::Max => |x: $t, y: $t| if y > x { y } else { x },
                })
            }

            fn monoid_identity(op: BinaryOpcode) -> Option<Self> {
                match op {
                    BinaryOpcode::Plus => Some(0),
                    BinaryOpcode::Times => Some(1),
                    BinaryOpcode::Min => Some(<$t>::MAX),
                    BinaryOpcode::Max => Some(<$t>::MIN),
                    _ => None,
                }
            }

            fn monoid_terminal(op: BinaryOpcode) -> Option<Self> {
                match op {
                    BinaryOpcode::Times => Some(0),
                    BinaryOpcode::Min => Some(<$t>::MIN),
                    BinaryOpcode::Max => Some(<$t>::MAX),
                    _ => None,
                }
            }
        }
    };
}

macro_rules! impl_float_element {
    ($t:ty, $code:ident, $cname:expr, $suffix:expr) => {
        impl Element for $t {
            fn type_desc() -> TypeDesc {
                TypeDesc::builtin(TypeCode::$code, std::mem::size_of::<$t>(), $cname)
            }

            fn c_literal(&self) -> Option<String> {
                Some(if self.is_nan() {
                    format!("(({}) NAN)", $cname)
                } else if self.is_infinite() {
                    if *self > 0.0 {
                        format!("(({}) INFINITY)", $cname)
                    } else {
                        format!("(({}) -INFINITY)", $cname)
                    }
                } else {
                    // {:?} prints the shortest round-tripping decimal
                    format!("(({}) {:?}{})", $cname, self, $suffix)
                })
            }

            fn unary_fn(op: UnaryOpcode) -> Option<fn(Self) -> Self> {
                Some(match op {
                    UnaryOpcode::Identity => |x| x,
                    UnaryOpcode::Ainv => |x: $t| -x,
                    UnaryOpcode::Abs => |x: $t| x.abs(),
                    UnaryOpcode::Minv => |x: $t| 1.0 / x,
                    UnaryOpcode::One => |_| 1.0,
                })
            }

            fn binary_fn(op: BinaryOpcode) -> Option<fn(Self, Self) -> Self> {
                Some(match op {
                    BinaryOpcode::First => |x, _| x,
                    BinaryOpcode::Second => |_, y| y,
                    BinaryOpcode::Pair => |_, _| 1.0,
                    BinaryOpcode::Plus => |x, y| x + y,
                    BinaryOpcode::Minus => |x, y| x - y,
                    BinaryOpcode::Times => |x, y| x * y,
                    BinaryOpcode::Div => |x, y| x / y,
                    // same NaN handling as C's fmin/fmax
                    BinaryOpcode::Min => |x: $t, y: $t| x.min(y),
                    BinaryOpcode::Max => |x: $t, y: $t| x.max(y),
                })
            }

            fn monoid_identity(op: BinaryOpcode) -> Option<Self> {
                match op {
                    BinaryOpcode::Plus => Some(0.0),
                    BinaryOpcode::Times => Some(1.0),
                    BinaryOpcode::Min => Some(<$t>::INFINITY),
                    BinaryOpcode::Max => Some(<$t>::NEG_INFINITY),
                    _ => None,
                }
            }

            fn monoid_terminal(op: BinaryOpcode) -> Option<Self> {
                match op {
                    BinaryOpcode::Min => Some(<$t>::NEG_INFINITY),
                    BinaryOpcode::Max => Some(<$t>::INFINITY),
                    _ => None,
                }
            }
        }
    };
}

impl_int_element!(i8, Int8, "int8_t", "INT8_MIN", "INT8_MAX", |x: i8| x.wrapping_abs());
impl_int_element!(i16, Int16, "int16_t", "INT16_MIN", "INT16_MAX", |x: i16| x.wrapping_abs());
impl_int_element!(i32, Int32, "int32_t", "INT32_MIN", "INT32_MAX", |x: i32| x.wrapping_abs());
impl_int_element!(i64, Int64, "int64_t", "INT64_MIN", "INT64_MAX", |x: i64| x.wrapping_abs());
impl_int_element!(u8, UInt8, "uint8_t", "0", "UINT8_MAX", |x: u8| x);
impl_int_element!(u16, UInt16, "uint16_t", "0", "UINT16_MAX", |x: u16| x);
impl_int_element!(u32, UInt32, "uint32_t", "0", "UINT32_MAX", |x: u32| x);
impl_int_element!(u64, UInt64, "uint64_t", "0", "UINT64_MAX", |x: u64| x);
impl_float_element!(f32, Fp32, "float", "f");
impl_float_element!(f64, Fp64, "double", "");

// Boolean operators follow the logical renaming: PLUS is LOR, TIMES is LAND,
// MINUS is LXOR, MIN is LAND and MAX is LOR.
impl Element for bool {
    fn type_desc() -> TypeDesc {
        TypeDesc::builtin(TypeCode::Bool, std::mem::size_of::<bool>(), "bool")
    }

    fn c_literal(&self) -> Option<String> {
        Some(if *self { "true" } else { "false" }.to_string())
    }

    fn unary_fn(op: UnaryOpcode) -> Option<fn(Self) -> Self> {
        Some(match op {
            UnaryOpcode::Identity | UnaryOpcode::Ainv | UnaryOpcode::Abs | UnaryOpcode::Minv => {
                |x| x
            }
            UnaryOpcode::One => |_| true,
        })
    }

    fn binary_fn(op: BinaryOpcode) -> Option<fn(Self, Self) -> Self> {
        Some(match op {
            BinaryOpcode::First | BinaryOpcode::Div => |x, _| x,
            BinaryOpcode::Second => |_, y| y,
            BinaryOpcode::Pair => |_, _| true,
            BinaryOpcode::Plus | BinaryOpcode::Max => |x, y| x || y,
            BinaryOpcode::Times | BinaryOpcode::Min => |x, y| x && y,
            BinaryOpcode::Minus => |x, y| x != y,
        })
    }

    fn monoid_identity(op: BinaryOpcode) -> Option<Self> {
        match op {
            BinaryOpcode::Plus | BinaryOpcode::Max => Some(false),
            BinaryOpcode::Times | BinaryOpcode::Min => Some(true),
            _ => None,
        }
    }

    fn monoid_terminal(op: BinaryOpcode) -> Option<Self> {
        match op {
            BinaryOpcode::Plus | BinaryOpcode::Max => Some(true),
            BinaryOpcode::Times | BinaryOpcode::Min => Some(false),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_descriptors() {
        let d = f64::type_desc();
        assert_eq!(d.code, TypeCode::Fp64);
        assert_eq!(d.size, 8);
        assert_eq!(d.name, "double");
        assert!(d.is_builtin());
        assert!(!d.is_opaque());

        assert_eq!(u16::type_desc().code, TypeCode::UInt16);
        assert_eq!(bool::type_desc().size, 1);
    }

    #[test]
    fn user_descriptor_opacity() {
        assert!(TypeDesc::user("blob", 16, None).is_opaque());
        assert!(TypeDesc::user("blob", 16, Some("  ")).is_opaque());
        let t = TypeDesc::user("pt", 16, Some("typedef struct { double x, y ; } pt ;"));
        assert!(!t.is_opaque());
        assert!(!t.is_builtin());
    }

    #[test]
    fn integer_division_saturates() {
        let div = i32::binary_fn(BinaryOpcode::Div).unwrap();
        assert_eq!(div(7, 2), 3);
        assert_eq!(div(5, 0), i32::MAX);
        assert_eq!(div(-5, 0), i32::MIN);
        assert_eq!(div(0, 0), 0);
        assert_eq!(div(i32::MIN, -1), i32::MIN);

        let minv = u8::unary_fn(UnaryOpcode::Minv).unwrap();
        assert_eq!(minv(0), u8::MAX);
        assert_eq!(minv(1), 1);
        assert_eq!(minv(3), 0);
    }

    #[test]
    fn wrapping_arithmetic() {
        let plus = i8::binary_fn(BinaryOpcode::Plus).unwrap();
        assert_eq!(plus(127, 1), -128);
        let ainv = i8::unary_fn(UnaryOpcode::Ainv).unwrap();
        assert_eq!(ainv(i8::MIN), i8::MIN);
    }

    #[test]
    fn boolean_operators_are_logical() {
        let plus = bool::binary_fn(BinaryOpcode::Plus).unwrap();
        let times = bool::binary_fn(BinaryOpcode::Times).unwrap();
        let minus = bool::binary_fn(BinaryOpcode::Minus).unwrap();
        assert!(plus(true, false));
        assert!(!times(true, false));
        assert!(!minus(true, true));
        assert_eq!(bool::monoid_terminal(BinaryOpcode::Plus), Some(true));
    }

    #[test]
    fn c_literals() {
        assert_eq!(i32::MIN.c_literal().unwrap(), "INT32_MIN");
        assert_eq!(7i32.c_literal().unwrap(), "((int32_t) 7)");
        assert_eq!(u8::MAX.c_literal().unwrap(), "UINT8_MAX");
        assert_eq!(0u8.c_literal().unwrap(), "((uint8_t) 0)");
        assert_eq!(1.5f64.c_literal().unwrap(), "((double) 1.5)");
        assert_eq!(1.5f32.c_literal().unwrap(), "((float) 1.5f)");
        assert_eq!(f64::NEG_INFINITY.c_literal().unwrap(), "((double) -INFINITY)");
        assert_eq!(true.c_literal().unwrap(), "true");
    }

    #[test]
    fn float_monoids() {
        assert_eq!(f64::monoid_identity(BinaryOpcode::Min), Some(f64::INFINITY));
        assert_eq!(f32::monoid_terminal(BinaryOpcode::Max), Some(f32::INFINITY));
        assert_eq!(f64::monoid_terminal(BinaryOpcode::Plus), None);
    }
}
