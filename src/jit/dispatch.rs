//! Choosing between a JIT kernel and the generic path
//!
//! Every kernel family goes through [`Context::dispatch`]: the problem is
//! encoded, a kernel is requested from the runtime, and on any failure other
//! than running out of memory the generic Rust kernel runs instead.

use std::fmt;
use std::sync::Arc;

use super::encoding::{encode, Problem};
use super::{JitRuntime, KernelEntry};
use crate::config::{JitConfig, JitControl, SystemParameters};
use crate::error::Result;
use crate::matrix::{Element, SparseMatrix};
use crate::offload::{CostModelAdvisor, OffloadAdvisor, OperandSummary};
use crate::ops::IndexUnaryOp;
use crate::select;

/// Threading parameters, the JIT runtime and the offload advisor a call
/// runs with
#[derive(Clone)]
pub struct Context {
    pub params: SystemParameters,
    jit: Arc<JitRuntime>,
    advisor: Arc<dyn OffloadAdvisor>,
}

impl Default for Context {
    fn default() -> Self {
        Self::with_runtime(JitRuntime::global())
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("params", &self.params)
            .field("jit", &self.jit.control())
            .finish()
    }
}

impl Context {
    /// A context on its own runtime
    pub fn new(config: JitConfig) -> Self {
        Self::with_runtime(Arc::new(JitRuntime::new(config)))
    }

    pub fn with_runtime(jit: Arc<JitRuntime>) -> Self {
        Self {
            params: SystemParameters::from_env(),
            jit,
            advisor: Arc::new(CostModelAdvisor::default()),
        }
    }

    /// A context that always runs the generic kernels
    pub fn generic_only() -> Self {
        let mut config = JitConfig::default();
        config.control = JitControl::Off;
        Self::new(config)
    }

    pub fn with_params(mut self, params: SystemParameters) -> Self {
        self.params = params;
        self
    }

    pub fn with_advisor(mut self, advisor: Arc<dyn OffloadAdvisor>) -> Self {
        self.advisor = advisor;
        self
    }

    pub fn jit(&self) -> &Arc<JitRuntime> {
        &self.jit
    }

    /// `C = select(A)`; see [`select::select_with`]
    pub fn select<T: Element>(&self, a: &SparseMatrix<T>, op: &IndexUnaryOp<T>, flip: bool) -> Result<SparseMatrix<T>> {
        select::select_with(a, op, flip, &self.params)
    }

    /// Selection applied to `a` itself; see [`select::select_in_place_with`]
    pub fn select_in_place<T: Element>(&self, a: &mut SparseMatrix<T>, op: &IndexUnaryOp<T>, flip: bool) -> Result<()> {
        select::select_in_place_with(a, op, flip, &self.params)
    }

    /// Runs `jit` with the kernel for `problem`, or `generic` when no kernel
    /// can be had
    pub(crate) fn dispatch<R>(
        &self,
        problem: &Problem,
        a: &OperandSummary,
        b: Option<&OperandSummary>,
        jit: impl FnOnce(&KernelEntry) -> Result<R>,
        generic: impl FnOnce() -> Result<R>,
    ) -> Result<R> {
        let family = problem.family.name();
        let ops: Vec<_> = problem.ops.iter().flatten().cloned().collect();
        if self.advisor.should_use_accelerator(None, a, b, &ops, problem.flipxy) {
            log::info!("{family}: accelerator advised but none is available, running on the CPU");
        }

        let attempt = encode(problem).and_then(|ep| {
            let entry = self.jit.kernel(&ep)?;
            jit(&entry)
        });
        match attempt {
            Ok(out) => Ok(out),
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => {
                self.jit.note_fallback();
                log::debug!("{family}: generic ({err})");
                generic()
            }
        }
    }
}
