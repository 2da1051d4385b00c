//! The back-end extension hook.
//!
//! A code generator exposes three operations: lowering the top-level
//! statement sequence, lowering one function body, and any trailing custom
//! code. Modeled here as a `Backend` trait plus an `EmitCtx` passed to every
//! hook: the context bundles the four pieces of shared state the pipeline
//! accumulates (the descriptor graph, the label factory, the constant
//! pool, and the asm sink) without granting the back-end anything beyond
//! what those four expose.

use crate::asm::AsmEmitter;
use crate::constant_pool::ConstantPool;
use crate::descriptors::FuncId;
use crate::error::CoreResult;
use crate::graph::DescriptorGraph;
use crate::label::LabelFactory;

/// Shared state threaded through every `Backend` hook. `graph` is read-only
/// (analysis is already complete by the time code generation runs); the
/// other three fields still grow or accumulate output while a back-end
/// lowers a function body: fresh branch labels, literals interned from
/// expressions it encounters, and the instructions it writes.
pub struct EmitCtx<'a> {
    pub graph: &'a DescriptorGraph,
    pub labels: &'a mut LabelFactory,
    pub constants: &'a mut ConstantPool,
    pub asm: &'a mut AsmEmitter,
}

/// The strategy a concrete code generator supplies. Everything the core
/// itself needs to say about object layout, dispatch, and the runtime is
/// fixed (`layout`, `backend::runtime`); only the semantics of a user
/// function's statements and the program's top-level statements are left to
/// the back-end.
pub trait Backend {
    /// Emit the program's top-level statement sequence, called from inside
    /// `main` after the heap is initialized.
    fn emit_top_level(&self, stmts: &[crate::ast::Stmt], ctx: &mut EmitCtx) -> CoreResult<()>;

    /// Emit the body of one user-defined function or method. Prologue and
    /// epilogue are the back-end's responsibility but must honor the fixed
    /// calling convention: the `i`-th declared argument already sits at
    /// `[SP + (paramsSize-i)*wordSize]` on entry; the return value goes in
    /// `A0`.
    fn emit_function_body(&self, func: FuncId, ctx: &mut EmitCtx) -> CoreResult<()>;

    /// Emit any back-end-specific code that doesn't belong to a user
    /// function or the top-level sequence. Most back-ends emit nothing here.
    fn emit_custom_code(&self, ctx: &mut EmitCtx) -> CoreResult<()> {
        let _ = ctx;
        Ok(())
    }
}
