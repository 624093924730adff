//! Compiling and loading kernel libraries
//!
//! Sources and libraries live in the kernel cache folder under names derived
//! from the problem hash, so concurrent processes agree on every path. Files
//! are written to a temporary name in the destination folder and renamed into
//! place, so a reader never sees a partial file.

use std::ffi::CStr;
use std::fs;
use std::io::Write;
use std::os::raw::c_int;
use std::path::{Path, PathBuf};
use std::process::Command;

use libloading::{Library, Symbol};
use tempfile::NamedTempFile;

use super::encoding::EncodedProblem;
use super::macrofy::{macrofy, TEMPLATES};
use crate::config::JitConfig;
use crate::constants::*;
use crate::error::{Error, Result};
use crate::kernels::abi::{KernelFn, QueryTextFn, QueryVersionFn};

/// `<cache>/src/<name>.c`
pub fn source_path(config: &JitConfig, name: &str) -> PathBuf {
    config.source_dir().join(format!("{name}.c"))
}

/// `<cache>/lib/lib<name>.so` (with the platform's prefix and extension)
pub fn library_path(config: &JitConfig, name: &str) -> PathBuf {
    config.lib_dir().join(format!(
        "{}{name}{}",
        std::env::consts::DLL_PREFIX,
        std::env::consts::DLL_SUFFIX
    ))
}

fn compile_error(kernel: &str, reason: impl ToString) -> Error {
    Error::Compile {
        kernel: kernel.to_string(),
        reason: reason.to_string(),
    }
}

/// Writes `contents` to `path` through a temporary file in the same folder
fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Makes sure the include folder holds the current templates
pub fn install_templates(config: &JitConfig) -> std::io::Result<()> {
    let dir = config.include_dir();
    fs::create_dir_all(&dir)?;
    for (name, text) in TEMPLATES {
        let path = dir.join(name);
        let current = fs::read(&path).map_or(false, |old| old == text.as_bytes());
        if !current {
            write_atomic(&path, text.as_bytes())?;
        }
    }
    Ok(())
}

/// Generates the source of `ep` and compiles it into the cache. Returns the
/// path of the library.
pub fn compile(config: &JitConfig, ep: &EncodedProblem) -> Result<PathBuf> {
    let name = ep.kernel_name();
    let src = macrofy(ep)?;

    for dir in [config.source_dir(), config.lib_dir()] {
        fs::create_dir_all(&dir).map_err(|e| compile_error(&name, format!("cannot create {dir:?}: {e}")))?;
    }
    install_templates(config).map_err(|e| compile_error(&name, format!("cannot install templates: {e}")))?;

    let src_path = source_path(config, &name);
    write_atomic(&src_path, src.as_bytes())
        .map_err(|e| compile_error(&name, format!("cannot write {src_path:?}: {e}")))?;

    let lib_path = library_path(config, &name);
    let tmp = tempfile::Builder::new()
        .prefix(".tmp-")
        .suffix(std::env::consts::DLL_SUFFIX)
        .tempfile_in(config.lib_dir())
        .map_err(|e| compile_error(&name, e))?
        .into_temp_path();

    log::debug!("compiling {name} with {}", config.compiler);
    let output = Command::new(&config.compiler)
        .args(config.c_flags.split_whitespace())
        .arg("-I")
        .arg(config.include_dir())
        .arg("-o")
        .arg(&tmp)
        .arg(&src_path)
        .args(config.c_libs.split_whitespace())
        .output()
        .map_err(|e| compile_error(&name, format!("cannot run '{}': {e}", config.compiler)))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(compile_error(&name, stderr.trim()));
    }
    tmp.persist(&lib_path)
        .map_err(|e| compile_error(&name, format!("cannot move library into place: {}", e.error)))?;
    Ok(lib_path)
}

/// Opens a kernel library
pub fn load(path: &Path) -> Result<Library> {
    // SAFETY: kernel libraries are generated by `compile` and have no
    // initialization routines
    unsafe { Library::new(path) }.map_err(|e| Error::Load {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// The kernel entry point of an open library
pub fn entry_point(library: &Library, path: &Path) -> Result<KernelFn> {
    // SAFETY: the symbol has the signature declared in sjit_kernel.h
    let symbol: Symbol<KernelFn> = unsafe { library.get(KERNEL_SYMBOL) }.map_err(|_| Error::MalformedArtifact {
        path: path.to_path_buf(),
        symbol: symbol_name(KERNEL_SYMBOL),
    })?;
    Ok(*symbol)
}

fn symbol_name(symbol: &[u8]) -> String {
    String::from_utf8_lossy(symbol.strip_suffix(b"\0").unwrap_or(symbol)).into_owned()
}

fn query_text(library: &Library, symbol: &[u8], k: usize) -> Option<Option<String>> {
    // SAFETY: the query functions have the signature declared in
    // sjit_kernel.h and return static strings or NULL
    unsafe {
        let query: Symbol<QueryTextFn> = library.get(symbol).ok()?;
        let text = query(k as c_int);
        if text.is_null() {
            Some(None)
        } else {
            Some(Some(CStr::from_ptr(text).to_string_lossy().into_owned()))
        }
    }
}

/// True when an existing library was built for exactly `ep`: same kernel
/// version, and for user operators and types the same definitions and
/// monoid text. A missing query symbol makes the library stale.
pub fn is_current(library: &Library, ep: &EncodedProblem) -> bool {
    let mut version = [0 as c_int; 3];
    // SAFETY: sjit_query_version writes three ints
    let have_version = unsafe {
        match library.get::<QueryVersionFn>(QUERY_VERSION_SYMBOL) {
            Ok(query) => {
                query(version.as_mut_ptr());
                true
            }
            Err(_) => false,
        }
    };
    if !have_version || version != KERNEL_ABI_VERSION {
        log::debug!("{}: kernel version {version:?} is not current", ep.kernel_name());
        return false;
    }

    if !ep.is_builtin() {
        let expected = ep.definitions();
        for (k, want) in expected.iter().enumerate() {
            match query_text(library, QUERY_DEFN_SYMBOL, k) {
                Some(got) if got == *want => {}
                _ => {
                    log::debug!("{}: definition {k} changed", ep.kernel_name());
                    return false;
                }
            }
        }
    }

    if let Some(monoid) = &ep.problem.monoid {
        let identity = query_text(library, QUERY_MONOID_SYMBOL, 0);
        let terminal = query_text(library, QUERY_MONOID_SYMBOL, 1);
        if identity != Some(Some(monoid.identity.clone())) || terminal != Some(monoid.terminal.clone()) {
            log::debug!("{}: monoid changed", ep.kernel_name());
            return false;
        }
    }
    true
}
