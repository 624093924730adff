//! C source generation for a kernel
//!
//! A kernel source is a list of macros describing the problem followed by
//! an `#include` of the family template. Built-in operators become
//! expressions; user operators become calls to their C definitions, which are
//! pasted verbatim along with any user type definitions. Integer arithmetic
//! goes through `uint64_t` so that overflow wraps exactly as it does in the
//! generic kernels.

use super::encoding::{EncodedProblem, KernelFamily, Role};
use crate::constants::{DEFN_SLOTS, KERNEL_ABI_VERSION};
use crate::error::{Error, Result};
use crate::matrix::{TypeCode, TypeDesc};
use crate::ops::{BinaryOpcode, OpSignature, UnaryOpcode};

/// Template headers, written to the include folder of the kernel cache
pub const TEMPLATES: [(&str, &str); 5] = [
    ("sjit_kernel.h", include_str!("templates/sjit_kernel.h")),
    ("apply.h", include_str!("templates/apply.h")),
    ("ewise.h", include_str!("templates/ewise.h")),
    ("rowscale.h", include_str!("templates/rowscale.h")),
    ("reduce.h", include_str!("templates/reduce.h")),
];

/// Full C source of the kernel for `ep`
pub fn macrofy(ep: &EncodedProblem) -> Result<String> {
    let problem = &ep.problem;
    let mut src = String::new();
    line(&mut src, &format!("// {}", ep.kernel_name()));
    line(&mut src, "#include \"sjit_kernel.h\"\n");

    // user type and operator definitions, each once
    let mut pasted: Vec<&str> = Vec::new();
    let type_defns = problem.types.iter().flatten().filter_map(|t| t.defn.as_deref());
    let op_defns = problem.ops.iter().flatten().filter_map(|op| op.defn.as_deref());
    for defn in type_defns.chain(op_defns) {
        if !pasted.contains(&defn) {
            line(&mut src, &format!("{defn}\n"));
            pasted.push(defn);
        }
    }

    for (role, tag) in [(Role::C, "C"), (Role::A, "A"), (Role::B, "B"), (Role::Y, "Y")] {
        if let Some(ty) = &problem.types[role as usize] {
            line(&mut src, &format!("#define SJIT_{tag}_TYPE {}", ty.name));
        }
        if (role as usize) < 3 {
            let r = role as usize;
            line(&mut src, &format!("#define SJIT_{tag}_ISO {}", problem.iso[r] as i32));
            line(&mut src, &format!("#define SJIT_{tag}_FORMAT {}", problem.formats[r].map_or(0, |f| f as i32)));
        }
    }
    line(&mut src, &format!("#define SJIT_FLIPXY {}", problem.flipxy as i32));

    let op = problem.ops[0]
        .as_ref()
        .ok_or_else(|| Error::Unsupported(format!("{} kernel has no operator", problem.family.name())))?;
    let op_type = problem.types[Role::A as usize]
        .as_ref()
        .ok_or_else(|| Error::Unsupported("kernel has no A operand".into()))?;
    let op_macro = match problem.family {
        KernelFamily::Apply => format!("#define SJIT_UNOP(z,x) {}", unop_body(op, op_type)?),
        _ => format!("#define SJIT_BINOP(z,x,y) {}", binop_body(op, op_type)?),
    };
    line(&mut src, &op_macro);

    if problem.family == KernelFamily::Reduce {
        let monoid = problem
            .monoid
            .as_ref()
            .ok_or_else(|| Error::Unsupported("reduction without monoid text".into()))?;
        line(&mut src, &format!("#define SJIT_IDENTITY {}", monoid.identity));
        match &monoid.terminal {
            Some(terminal) => {
                line(&mut src, "#define SJIT_HAS_TERMINAL 1");
                line(&mut src, &format!("#define SJIT_TERMINAL {terminal}"));
                if op_type.is_builtin() {
                    line(&mut src, "#define SJIT_IS_TERMINAL(s) ((s) == SJIT_TERMINAL)");
                } else {
                    line(&mut src, "static const SJIT_Y_TYPE sjit_terminal = SJIT_TERMINAL ;");
                    line(
                        &mut src,
                        "#define SJIT_IS_TERMINAL(s) (memcmp (&(s), &sjit_terminal, sizeof (SJIT_Y_TYPE)) == 0)",
                    );
                }
            }
            None => line(&mut src, "#define SJIT_HAS_TERMINAL 0"),
        }
    }

    line(&mut src, &format!("\n#include \"{}\"\n", problem.family.template()));

    let [major, minor, patch] = KERNEL_ABI_VERSION;
    line(
        &mut src,
        &format!("void sjit_query_version (int *v)\n{{\n    v [0] = {major} ;\n    v [1] = {minor} ;\n    v [2] = {patch} ;\n}}"),
    );
    if !ep.is_builtin() {
        let defs = ep.definitions();
        let slots: Vec<String> = defs.iter().map(|d| c_string(d.as_deref())).collect();
        let query = format!(
            "\nconst char *sjit_query_defn (int k)\n{{\n    static const char *defn [{DEFN_SLOTS}] =\n    {{\n        {}\n    }} ;\n    return ((k >= 0 && k < {DEFN_SLOTS}) ? defn [k] : NULL) ;\n}}",
            slots.join(",\n        ")
        );
        line(&mut src, &query);
    }
    if let Some(monoid) = &problem.monoid {
        let query = format!(
            "\nconst char *sjit_query_monoid (int k)\n{{\n    static const char *text [2] = {{ {}, {} }} ;\n    return ((k >= 0 && k < 2) ? text [k] : NULL) ;\n}}",
            c_string(Some(&monoid.identity)),
            c_string(monoid.terminal.as_deref())
        );
        line(&mut src, &query);
    }
    Ok(src)
}

/// Appends `text` and a newline
fn line(src: &mut String, text: &str) {
    src.push_str(text);
    src.push('\n');
}

/// A C string literal, or `NULL`
fn c_string(s: Option<&str>) -> String {
    let Some(s) = s else {
        return "NULL".to_string();
    };
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn unsigned_of(code: TypeCode) -> &'static str {
    match code {
        TypeCode::Int8 | TypeCode::UInt8 => "uint8_t",
        TypeCode::Int16 | TypeCode::UInt16 => "uint16_t",
        TypeCode::Int32 | TypeCode::UInt32 => "uint32_t",
        _ => "uint64_t",
    }
}

fn not_defined(op: &OpSignature, ty: &TypeDesc) -> Error {
    Error::Unsupported(format!("'{}' has no C form for type '{}'", op.name, ty.name))
}

/// Body of `SJIT_UNOP(z,x)`
pub fn unop_body(op: &OpSignature, ty: &TypeDesc) -> Result<String> {
    if !op.is_builtin() {
        return Ok(format!("{} (&(z), &(x))", op.name));
    }
    let code = unary_code(op.opcode).ok_or_else(|| not_defined(op, ty))?;
    let t = ty.name.as_str();
    let body = match ty.code {
        TypeCode::Bool => match code {
            UnaryOpcode::One => "z = true".to_string(),
            _ => "z = (x)".to_string(),
        },
        c if c.is_integer() => {
            let u = unsigned_of(c);
            match code {
                UnaryOpcode::Identity => "z = (x)".to_string(),
                UnaryOpcode::Ainv => format!("z = ({t}) (0 - (uint64_t) ({u}) (x))"),
                UnaryOpcode::Abs if c.is_signed() => format!(
                    "z = ({t}) (((x) < 0) ? (0 - (uint64_t) ({u}) (x)) : (uint64_t) ({u}) (x))"
                ),
                UnaryOpcode::Abs => "z = (x)".to_string(),
                UnaryOpcode::Minv => format!("z = sjit_idiv_{t} (({t}) 1, (x))"),
                UnaryOpcode::One => format!("z = ({t}) 1"),
            }
        }
        c if c.is_float() => {
            let f = if c == TypeCode::Fp32 { "f" } else { "" };
            match code {
                UnaryOpcode::Identity => "z = (x)".to_string(),
                UnaryOpcode::Ainv => "z = -(x)".to_string(),
                UnaryOpcode::Abs => format!("z = fabs{f} (x)"),
                UnaryOpcode::Minv => format!("z = (({t}) 1) / (x)"),
                UnaryOpcode::One => format!("z = ({t}) 1"),
            }
        }
        _ => return Err(not_defined(op, ty)),
    };
    Ok(body)
}

/// Body of `SJIT_BINOP(z,x,y)`
pub fn binop_body(op: &OpSignature, ty: &TypeDesc) -> Result<String> {
    if !op.is_builtin() {
        return Ok(format!("{} (&(z), &(x), &(y))", op.name));
    }
    let code = binary_code(op.opcode).ok_or_else(|| not_defined(op, ty))?;
    let t = ty.name.as_str();
    let body = match ty.code {
        TypeCode::Bool => match code {
            BinaryOpcode::First | BinaryOpcode::Div => "z = (x)",
            BinaryOpcode::Second => "z = (y)",
            BinaryOpcode::Pair => "z = true",
            BinaryOpcode::Plus | BinaryOpcode::Max => "z = ((x) || (y))",
            BinaryOpcode::Times | BinaryOpcode::Min => "z = ((x) && (y))",
            BinaryOpcode::Minus => "z = ((x) != (y))",
        }
        .to_string(),
        c if c.is_integer() => {
            let u = unsigned_of(c);
            let wrap = |sym: &str| format!("z = ({t}) ((uint64_t) ({u}) (x) {sym} (uint64_t) ({u}) (y))");
            match code {
                BinaryOpcode::First => "z = (x)".to_string(),
                BinaryOpcode::Second => "z = (y)".to_string(),
                BinaryOpcode::Pair => format!("z = ({t}) 1"),
                BinaryOpcode::Plus => wrap("+"),
                BinaryOpcode::Minus => wrap("-"),
                BinaryOpcode::Times => wrap("*"),
                BinaryOpcode::Div => format!("z = sjit_idiv_{t} ((x), (y))"),
                BinaryOpcode::Min => "z = (((y) < (x)) ? (y) : (x))".to_string(),
                BinaryOpcode::Max => "z = (((y) > (x)) ? (y) : (x))".to_string(),
            }
        }
        c if c.is_float() => {
            let f = if c == TypeCode::Fp32 { "f" } else { "" };
            match code {
                BinaryOpcode::First => "z = (x)".to_string(),
                BinaryOpcode::Second => "z = (y)".to_string(),
                BinaryOpcode::Pair => format!("z = ({t}) 1"),
                BinaryOpcode::Plus => "z = (x) + (y)".to_string(),
                BinaryOpcode::Minus => "z = (x) - (y)".to_string(),
                BinaryOpcode::Times => "z = (x) * (y)".to_string(),
                BinaryOpcode::Div => "z = (x) / (y)".to_string(),
                BinaryOpcode::Min => format!("z = fmin{f} ((x), (y))"),
                BinaryOpcode::Max => format!("z = fmax{f} ((x), (y))"),
            }
        }
        _ => return Err(not_defined(op, ty)),
    };
    Ok(body)
}

fn unary_code(opcode: u8) -> Option<UnaryOpcode> {
    [
        UnaryOpcode::Identity,
        UnaryOpcode::Ainv,
        UnaryOpcode::Abs,
        UnaryOpcode::Minv,
        UnaryOpcode::One,
    ]
    .into_iter()
    .find(|c| *c as u8 == opcode)
}

fn binary_code(opcode: u8) -> Option<BinaryOpcode> {
    [
        BinaryOpcode::First,
        BinaryOpcode::Second,
        BinaryOpcode::Pair,
        BinaryOpcode::Plus,
        BinaryOpcode::Minus,
        BinaryOpcode::Times,
        BinaryOpcode::Div,
        BinaryOpcode::Min,
        BinaryOpcode::Max,
    ]
    .into_iter()
    .find(|c| *c as u8 == opcode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jit::encoding::{encode, MonoidText, Problem};
    use crate::matrix::{Element, Format};

    #[test]
    fn test_integer_ops_wrap_through_unsigned() {
        let plus = OpSignature::builtin(BinaryOpcode::Plus as u8, "plus");
        let body = binop_body(&plus, &i32::type_desc()).unwrap();
        assert_eq!(body, "z = (int32_t) ((uint64_t) (uint32_t) (x) + (uint64_t) (uint32_t) (y))");

        let min = OpSignature::builtin(BinaryOpcode::Min as u8, "min");
        assert_eq!(binop_body(&min, &f32::type_desc()).unwrap(), "z = fminf ((x), (y))");
        assert_eq!(binop_body(&min, &bool::type_desc()).unwrap(), "z = ((x) && (y))");

        let minv = OpSignature::builtin(UnaryOpcode::Minv as u8, "minv");
        assert_eq!(unop_body(&minv, &u8::type_desc()).unwrap(), "z = sjit_idiv_uint8_t ((uint8_t) 1, (x))");
    }

    #[test]
    fn test_user_ops_are_calls() {
        let op = OpSignature::user("mymax", "void mymax (double *z, const double *x, const double *y) { *z = *x > *y ? *x : *y ; }");
        assert_eq!(binop_body(&op, &f64::type_desc()).unwrap(), "mymax (&(z), &(x), &(y))");
    }

    #[test]
    fn test_reduce_source() {
        let p = Problem::new(KernelFamily::Reduce)
            .with_op(0, OpSignature::builtin(BinaryOpcode::Times as u8, "times"))
            .with_operand(Role::A, i64::type_desc(), Format::Sparse, false)
            .with_scalar(i64::type_desc())
            .with_monoid(MonoidText {
                identity: "((int64_t) 1)".into(),
                terminal: Some("((int64_t) 0)".into()),
            });
        let src = macrofy(&encode(&p).unwrap()).unwrap();
        assert!(src.contains("#define SJIT_IDENTITY ((int64_t) 1)"));
        assert!(src.contains("#define SJIT_HAS_TERMINAL 1"));
        assert!(src.contains("#define SJIT_Y_TYPE int64_t"));
        assert!(src.contains("#include \"reduce.h\""));
        assert!(src.contains("sjit_query_monoid"));
        // built-in problems carry no definitions
        assert!(!src.contains("sjit_query_defn"));
    }

    #[test]
    fn test_user_definitions_are_pasted_and_queryable() {
        let defn = "void twice (double *z, const double *x) { *z = 2 * (*x) ; }";
        let p = Problem::new(KernelFamily::Apply)
            .with_op(0, OpSignature::user("twice", defn))
            .with_operand(Role::C, f64::type_desc(), Format::Sparse, false)
            .with_operand(Role::A, f64::type_desc(), Format::Sparse, false);
        let src = macrofy(&encode(&p).unwrap()).unwrap();
        assert!(src.contains(defn));
        assert!(src.contains("#define SJIT_UNOP(z,x) twice (&(z), &(x))"));
        assert!(src.contains("sjit_query_defn"));
        assert!(src.contains("\"void twice (double *z, const double *x) { *z = 2 * (*x) ; }\""));
    }

    #[test]
    fn test_c_string_escapes() {
        assert_eq!(c_string(Some("a\"b\\c\nd")), "\"a\\\"b\\\\c\\nd\"");
        assert_eq!(c_string(None), "NULL");
    }
}
