//! Problem encoding and hashing
//!
//! A kernel request is reduced to a fixed-width record plus a suffix holding
//! the names of user-defined operators and types, a digest of each of their
//! definitions, and the C text of a user monoid. Two requests share a kernel
//! exactly when their records and suffixes are byte-identical. The record
//! layout, little-endian:
//!
//! | bytes | field                                   |
//! |-------|-----------------------------------------|
//! | 0     | kernel family                           |
//! | 1..4  | opcodes: primary, secondary, mask       |
//! | 4..8  | type codes of C, A, B and the scalar    |
//! | 8..24 | type sizes (u32 each), same order       |
//! | 24..28| formats of C, A, B and the mask         |
//! | 28..30| flags                                   |
//! | 30..34| suffix length (u32)                     |

use sha2::{Digest, Sha256};

use crate::constants::{DEFN_SLOTS, HASH_SENTINEL_REMAP, KERNEL_PREFIX, NOT_JITTABLE};
use crate::error::{Error, Result};
use crate::matrix::{Format, TypeDesc};
use crate::ops::OpSignature;

/// Size of the fixed part of an encoding
pub const ENCODING_BYTES: usize = 34;

/// Bytes of a definition's SHA-256 kept in the suffix
const DEFN_DIGEST_BYTES: usize = 8;

pub const FLAG_C_ISO: u16 = 1 << 0;
pub const FLAG_A_ISO: u16 = 1 << 1;
pub const FLAG_B_ISO: u16 = 1 << 2;
/// Reserved for masked families: the mask is structural
pub const FLAG_MASK_STRUCT: u16 = 1 << 3;
/// Reserved for masked families: the mask is complemented
pub const FLAG_MASK_COMP: u16 = 1 << 4;
pub const FLAG_FLIPXY: u16 = 1 << 5;
pub const FLAG_HAS_SUFFIX: u16 = 1 << 6;

/// Kernel families with a template and a generic fallback
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelFamily {
    Apply = 1,
    EwiseFull = 2,
    Rowscale = 3,
    Reduce = 4,
}

impl KernelFamily {
    pub fn name(self) -> &'static str {
        match self {
            KernelFamily::Apply => "apply",
            KernelFamily::EwiseFull => "ewise_full",
            KernelFamily::Rowscale => "rowscale",
            KernelFamily::Reduce => "reduce",
        }
    }

    /// Template header included by the generated source
    pub fn template(self) -> &'static str {
        match self {
            KernelFamily::Apply => "apply.h",
            KernelFamily::EwiseFull => "ewise.h",
            KernelFamily::Rowscale => "rowscale.h",
            KernelFamily::Reduce => "reduce.h",
        }
    }
}

/// Operand roles in a kernel call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    C = 0,
    A = 1,
    B = 2,
    /// A scalar input or output
    Y = 3,
}

/// C text of a monoid's identity and terminal value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonoidText {
    pub identity: String,
    pub terminal: Option<String>,
}

/// Everything about a kernel request that shapes the generated code
#[derive(Debug, Clone)]
pub struct Problem {
    pub family: KernelFamily,
    /// Primary and secondary operators; a reduction's primary operator is
    /// its monoid's
    pub ops: [Option<OpSignature>; 2],
    pub monoid: Option<MonoidText>,
    /// Element type per role
    pub types: [Option<TypeDesc>; 4],
    /// Storage format of C, A and B
    pub formats: [Option<Format>; 3],
    pub iso: [bool; 3],
    pub flipxy: bool,
    /// Skip the JIT for this request
    pub force_generic: bool,
}

impl Problem {
    pub fn new(family: KernelFamily) -> Self {
        Self {
            family,
            ops: [None, None],
            monoid: None,
            types: [None, None, None, None],
            formats: [None; 3],
            iso: [false; 3],
            flipxy: false,
            force_generic: false,
        }
    }

    pub fn with_op(mut self, slot: usize, op: OpSignature) -> Self {
        self.ops[slot] = Some(op);
        self
    }

    /// Records the type, format and iso-ness of a matrix operand
    pub fn with_operand(mut self, role: Role, ty: TypeDesc, format: Format, iso: bool) -> Self {
        let r = role as usize;
        self.types[r] = Some(ty);
        if r < 3 {
            self.formats[r] = Some(format);
            self.iso[r] = iso;
        }
        self
    }

    /// Records the type of a scalar operand
    pub fn with_scalar(mut self, ty: TypeDesc) -> Self {
        self.types[Role::Y as usize] = Some(ty);
        self
    }

    pub fn with_monoid(mut self, monoid: MonoidText) -> Self {
        self.monoid = Some(monoid);
        self
    }

    pub fn with_flipxy(mut self, flipxy: bool) -> Self {
        self.flipxy = flipxy;
        self
    }
}

/// Fixed-width part of an encoded problem
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Encoding {
    pub family: u8,
    pub opcodes: [u8; 3],
    pub type_codes: [u8; 4],
    pub type_sizes: [u32; 4],
    pub formats: [u8; 4],
    pub flags: u16,
    pub suffix_len: u32,
}

impl Encoding {
    pub fn to_bytes(&self) -> [u8; ENCODING_BYTES] {
        let mut out = [0u8; ENCODING_BYTES];
        out[0] = self.family;
        out[1..4].copy_from_slice(&self.opcodes);
        out[4..8].copy_from_slice(&self.type_codes);
        for (k, size) in self.type_sizes.iter().enumerate() {
            out[8 + 4 * k..12 + 4 * k].copy_from_slice(&size.to_le_bytes());
        }
        out[24..28].copy_from_slice(&self.formats);
        out[28..30].copy_from_slice(&self.flags.to_le_bytes());
        out[30..34].copy_from_slice(&self.suffix_len.to_le_bytes());
        out
    }
}

/// A problem with its encoding, suffix and hash
#[derive(Debug, Clone)]
pub struct EncodedProblem {
    pub encoding: Encoding,
    pub suffix: String,
    pub hash: u64,
    pub problem: Problem,
}

impl EncodedProblem {
    /// Only built-in operators and types are involved
    pub fn is_builtin(&self) -> bool {
        self.suffix.is_empty()
    }

    /// `sjit__<family>__<base>__<hash>`, where the base names the primary
    /// operator and the type of A
    pub fn kernel_name(&self) -> String {
        let op = self.problem.ops[0].as_ref().map_or("none", |op| op.name.as_str());
        let ty = self.problem.types[Role::A as usize]
            .as_ref()
            .map_or("none", |t| t.name.as_str());
        let base = sanitize(&format!("{op}_{ty}"));
        format!(
            "{KERNEL_PREFIX}__{}__{}__{:016x}",
            self.problem.family.name(),
            base,
            self.hash
        )
    }

    /// Definitions compiled into the kernel, in query slot order: primary
    /// op, secondary op, then the types of C, A and B. Built-in entries are
    /// `None`.
    pub fn definitions(&self) -> [Option<String>; DEFN_SLOTS] {
        let op_defn = |slot: usize| self.problem.ops[slot].as_ref().and_then(|op| op.defn.clone());
        let ty_defn = |role: Role| self.problem.types[role as usize].as_ref().and_then(|t| t.defn.clone());
        [
            op_defn(0),
            op_defn(1),
            ty_defn(Role::C),
            ty_defn(Role::A),
            ty_defn(Role::B),
        ]
    }
}

/// Encodes and hashes a kernel request. Fails with [`Error::Unsupported`]
/// when the request cannot be specialized: an opaque user type, a monoid
/// value with no C text, or the generic path forced.
pub fn encode(problem: &Problem) -> Result<EncodedProblem> {
    if problem.force_generic {
        return Err(Error::Unsupported("generic path forced".into()));
    }
    if let Some(ty) = problem.types.iter().flatten().find(|t| t.is_opaque()) {
        return Err(Error::Unsupported(format!("type '{}' has no C definition", ty.name)));
    }
    if problem.family == KernelFamily::Reduce && problem.monoid.is_none() {
        return Err(Error::Unsupported("monoid values have no C text".into()));
    }

    let mut suffix = String::new();
    for op in problem.ops.iter().flatten().filter(|op| !op.is_builtin()) {
        push_name(&mut suffix, &op.name);
        push_defn(&mut suffix, op.defn.as_deref());
    }
    for ty in problem.types.iter().flatten().filter(|t| !t.is_builtin()) {
        push_name(&mut suffix, &ty.name);
        push_defn(&mut suffix, ty.defn.as_deref());
    }
    // the C text of a built-in monoid follows from its opcode and type
    if let Some(monoid) = problem.monoid.as_ref().filter(|_| !suffix.is_empty()) {
        push_name(&mut suffix, &monoid.identity);
        match &monoid.terminal {
            Some(terminal) => push_name(&mut suffix, terminal),
            None => suffix.push('-'),
        }
    }

    let mut flags = 0u16;
    for (role, bit) in [FLAG_C_ISO, FLAG_A_ISO, FLAG_B_ISO].into_iter().enumerate() {
        if problem.iso[role] {
            flags |= bit;
        }
    }
    if problem.flipxy {
        flags |= FLAG_FLIPXY;
    }
    if !suffix.is_empty() {
        flags |= FLAG_HAS_SUFFIX;
    }

    let opcode = |slot: usize| problem.ops[slot].as_ref().map_or(0, |op| op.opcode);
    let mut type_codes = [0u8; 4];
    let mut type_sizes = [0u32; 4];
    for (r, ty) in problem.types.iter().enumerate() {
        if let Some(ty) = ty {
            type_codes[r] = ty.code as u8;
            type_sizes[r] = u32::try_from(ty.size)
                .map_err(|_| Error::Unsupported(format!("type '{}' is too large", ty.name)))?;
        }
    }
    let mut formats = [0u8; 4];
    for (r, f) in problem.formats.iter().enumerate() {
        formats[r] = f.map_or(0, |f| f as u8);
    }
    let suffix_len = u32::try_from(suffix.len())
        .map_err(|_| Error::Unsupported("operator names too long".into()))?;

    let encoding = Encoding {
        family: problem.family as u8,
        opcodes: [opcode(0), opcode(1), 0],
        type_codes,
        type_sizes,
        formats,
        flags,
        suffix_len,
    };
    let hash = hash_encoding(&encoding.to_bytes(), suffix.as_bytes());
    Ok(EncodedProblem {
        encoding,
        suffix,
        hash,
        problem: problem.clone(),
    })
}

/// Appends `len:name` so that names cannot run into each other
fn push_name(suffix: &mut String, name: &str) {
    suffix.push_str(&name.len().to_string());
    suffix.push(':');
    suffix.push_str(name);
}

/// Appends `#` and a digest of a user definition, or `#-` when there is none
fn push_defn(suffix: &mut String, defn: Option<&str>) {
    suffix.push('#');
    match defn {
        Some(defn) => {
            let digest = Sha256::digest(defn.as_bytes());
            for byte in &digest[..DEFN_DIGEST_BYTES] {
                suffix.push_str(&format!("{byte:02x}"));
            }
        }
        None => suffix.push('-'),
    }
}

/// First eight bytes of the SHA-256 of the record and suffix
pub fn hash_encoding(record: &[u8], suffix: &[u8]) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(record);
    hasher.update(suffix);
    let digest = hasher.finalize();
    let mut first = [0u8; 8];
    first.copy_from_slice(&digest[..8]);
    remap_sentinel(u64::from_le_bytes(first))
}

/// Keeps [`NOT_JITTABLE`] out of the range of real hashes
fn remap_sentinel(hash: u64) -> u64 {
    if hash == NOT_JITTABLE {
        HASH_SENTINEL_REMAP
    } else {
        hash
    }
}

fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}
