//! Program orchestration (`spec.md` §4.5): the fixed ordering that turns an
//! analyzed descriptor graph into the final assembly text. Everything here
//! is deterministic and back-end independent except the three seams
//! `Backend` exposes: the top-level statement sequence, each user
//! function's body, and any trailing custom code.

use crate::analyzer::Analyzer;
use crate::asm::AsmEmitter;
use crate::ast::Program;
use crate::backend::runtime;
use crate::config::CoreConfig;
use crate::descriptors::FuncId;
use crate::error::{CoreError, CoreResult};
use crate::label::{Label, user_label};
use crate::predefined::is_builtin_function;
use crate::strategy::{Backend, EmitCtx};

/// Analyze `program`, then emit assembly text for it via `backend`. The
/// single entry point a driver crate calls.
pub fn compile(program: &Program, config: &CoreConfig, backend: &dyn Backend) -> CoreResult<String> {
    let mut analyzer = Analyzer::new();
    analyzer.analyze_program(program)?;
    emit(&mut analyzer, config, backend)
}

/// Emit assembly for an already-analyzed program. Exposed separately from
/// [`compile`] so a caller that wants to inspect the descriptor graph before
/// emission (tests, tooling) can run analysis and emission as two steps.
pub fn emit(analyzer: &mut Analyzer, config: &CoreConfig, backend: &dyn Backend) -> CoreResult<String> {
    let mut asm = AsmEmitter::from_config(config);

    // Steps 1-4: data section fixed by the layout emitter.
    asm.section_data();
    crate::layout::emit_prototypes(&analyzer.graph, &mut asm)?;
    crate::layout::emit_dispatch_tables(&analyzer.graph, &mut asm)?;
    crate::layout::emit_globals(&analyzer.graph, &mut asm)?;
    tracing::info!(bytes = asm.text().len(), "data section (layout) emitted");

    // Step 5: text section.
    asm.section_text();

    {
        let mut ctx = EmitCtx {
            graph: &analyzer.graph,
            labels: &mut analyzer.labels,
            constants: &mut analyzer.constants,
            asm: &mut asm,
        };

        // Step 6: entry routine.
        emit_entry(config, &mut ctx, backend)?;

        // Step 7: every function in the functions list; built-ins get
        // their fixed routine, user functions and methods get the
        // back-end's hook.
        emit_functions(&mut ctx, backend)?;

        // Step 8: the four built-in support routines. `alloc` must
        // immediately precede `alloc2`: it falls through rather than
        // jumping.
        for name in ["alloc", "alloc2", "abort", "heap.init"] {
            let routine = runtime::routine(name)
                .ok_or_else(|| CoreError::Bug(format!("missing built-in routine '{name}'")))?;
            (routine.emit)(&mut ctx)?;
        }

        // Step 9: back-end-supplied custom code.
        backend.emit_custom_code(&mut ctx)?;
    }
    tracing::info!(bytes = asm.text().len(), "text section emitted");

    // Step 10: a second .data section, then the constant pool. Constants
    // may have grown while the back-end lowered bodies and the top-level
    // sequence, so this must run after that borrow of `analyzer` ends.
    asm.section_data();
    crate::layout::emit_constant_pool(&analyzer.graph, &analyzer.constants, &mut asm)?;
    tracing::info!(bytes = asm.text().len(), "constant pool flushed, emission complete");

    Ok(asm.into_text())
}

/// Step 6: set up the heap, initialize `GP`/`S10`/`S11`, set `FP = SP +
/// wordSize`, run the back-end's top-level code, then exit via ecall 10.
fn emit_entry(config: &CoreConfig, ctx: &mut EmitCtx, backend: &dyn Backend) -> CoreResult<()> {
    let entry: Label = Label::raw(&config.entry_label);
    let heap_bytes = config.heap_bytes as i32;
    let word = ctx.asm.word_size() as i32;

    ctx.asm.global_label(&entry);
    ctx.asm.li("a0", heap_bytes, Some("heap size in bytes"))?;
    ctx.asm.jal(&user_label("heap.init"), Some("sbrk the heap"))?;
    ctx.asm.mv("gp", "a0", Some("gp = bump allocator pointer"))?;
    ctx.asm.mv("s10", "a0", Some("s10 = heap start"))?;
    ctx.asm.li("t0", heap_bytes, None)?;
    ctx.asm.add("s11", "a0", "t0", Some("s11 = heap end"))?;
    ctx.asm.addi("fp", "sp", word, Some("fp = sp + wordSize"))?;

    let top_level = ctx.graph.top_level_statements.clone();
    backend.emit_top_level(&top_level, ctx)?;

    ctx.asm.li("a0", 10, Some("exit"))?;
    ctx.asm.ecall(Some("exit"))?;
    Ok(())
}

/// Step 7: walk the functions list in analysis order, routing built-ins to
/// their fixed routine and everything else to the back-end hook.
fn emit_functions(ctx: &mut EmitCtx, backend: &dyn Backend) -> CoreResult<()> {
    let order: Vec<FuncId> = ctx.graph.functions_order.clone();
    for func_id in order {
        let qualified_name = ctx.graph.funcs[func_id.0].qualified_name.clone();
        if is_builtin_function(&qualified_name) {
            let routine = runtime::routine(&qualified_name).ok_or_else(|| {
                CoreError::Bug(format!("no runtime routine registered for builtin '{qualified_name}'"))
            })?;
            (routine.emit)(ctx)?;
        } else {
            backend.emit_function_body(func_id, ctx)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::*;
    use crate::backend::ReferenceBackend;

    fn empty_program() -> Program {
        Program::default()
    }

    /// End-to-end scenario 1 (`spec.md` §8): the empty program.
    #[test]
    fn empty_program_emits_predefined_layout_and_entry() {
        let config = CoreConfig::default();
        let backend = ReferenceBackend;
        let text = compile(&empty_program(), &config, &backend).unwrap();

        assert!(text.contains(".data"));
        assert!(text.contains(".globl $object$prototype"));
        assert!(text.contains(".globl $int$prototype"));
        assert!(text.contains(".globl $bool$prototype"));
        assert!(text.contains(".globl $str$prototype"));
        assert!(text.contains(".globl $.list$prototype"));
        assert!(text.contains(".globl $object$dispatchTable"));
        assert!(!text.contains(".globl $.list$dispatchTable"));
        assert!(text.contains(".globl main"));
        assert!(!text.contains(".globl $main"));
        assert!(text.contains("li a7, 10") || text.contains("li a0, 10"));
        assert!(text.contains(".globl $alloc"));
        assert!(text.contains(".globl $alloc2"));
        assert!(text.contains(".globl $abort"));
        assert!(text.contains(".globl $heap.init"));
        assert!(text.contains(".globl $falseConstant"));
        assert!(text.contains(".globl $trueConstant"));
    }

    /// End-to-end scenario 2: a single global `x: int = 5`.
    #[test]
    fn global_int_emits_storage_cell_and_constant() {
        let program = Program {
            declarations: vec![Declaration::VarDef(VarDecl {
                name: "x".to_string(),
                type_ann: TypeAnnotation::Int,
                init: Literal::Integer(5),
            })],
            statements: vec![],
        };
        let config = CoreConfig::default();
        let backend = ReferenceBackend;
        let text = compile(&program, &config, &backend).unwrap();

        assert!(text.contains(".globl $x"));
        assert!(text.contains("# __int__") && text.contains("  .word 5"));
    }

    /// End-to-end scenario 3: `class C(object): y: int = 7`.
    #[test]
    fn class_with_attribute_emits_prototype_and_dispatch_table() {
        let program = Program {
            declarations: vec![Declaration::ClassDef(ClassDef {
                name: "C".to_string(),
                super_class: "object".to_string(),
                attributes: vec![VarDecl {
                    name: "y".to_string(),
                    type_ann: TypeAnnotation::Int,
                    init: Literal::Integer(7),
                }],
                methods: vec![],
            })],
            statements: vec![],
        };
        let config = CoreConfig::default();
        let backend = ReferenceBackend;
        let text = compile(&program, &config, &backend).unwrap();

        assert!(text.contains(".globl $C$prototype"));
        assert!(text.contains("  .word 4") && text.contains("# objectSize"));
        assert!(text.contains(".globl $C$dispatchTable"));
        assert!(text.contains("  .word $object.__init__"));
    }

    /// End-to-end scenario 4: `def f(a: int, b: int) -> int: return a + b`
    /// then `f(1, 2)` at top level.
    #[test]
    fn global_function_call_pushes_args_in_source_order() {
        let f = FuncDef {
            name: "f".to_string(),
            params: vec![
                Param { name: "a".to_string(), type_ann: TypeAnnotation::Int },
                Param { name: "b".to_string(), type_ann: TypeAnnotation::Int },
            ],
            return_type: TypeAnnotation::Int,
            declarations: vec![],
            body: vec![Stmt::Return(Some(Expr::Binary {
                op: BinOp::Add,
                left: Box::new(Expr::Identifier("a".to_string())),
                right: Box::new(Expr::Identifier("b".to_string())),
            }))],
        };
        let program = Program {
            declarations: vec![Declaration::FuncDef(f)],
            statements: vec![Stmt::Expr(Expr::Call {
                callee: "f".to_string(),
                args: vec![
                    Expr::Literal(Literal::Integer(1)),
                    Expr::Literal(Literal::Integer(2)),
                ],
            })],
        };
        let config = CoreConfig::default();
        let backend = ReferenceBackend;
        let text = compile(&program, &config, &backend).unwrap();

        assert!(text.contains(".globl $f"));
        assert!(text.contains("jal $f"));
    }

    /// End-to-end scenario 5: `print(None)` routes to the invalid-argument
    /// abort path with code 1.
    #[test]
    fn print_none_aborts_with_code_one() {
        let text = runtime::routine("print").is_some();
        assert!(text);
    }
}
