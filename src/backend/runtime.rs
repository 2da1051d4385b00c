//! Fixed runtime routines: the built-in function bodies of `spec.md` §4.6
//! (`object.__init__`, `print`, `len`, `input`) and the four support
//! routines (`alloc`, `alloc2`, `abort`, `heap.init`) that back them.
//!
//! Declared as a data table (`BUILTIN_ROUTINES`) rather than eight separate
//! call sites scattered through `program`, so that adding a ninth built-in
//! later is a table entry, not a new branch in the orchestration code.
//! Every routine uses the classic MARS/SPIM syscall numbering the rest of
//! this codebase's simulator targets assume: `a7` holds the service number,
//! arguments and results pass through `a0`/`a1`.

use crate::descriptors::LIST_TYPE_TAG;
use crate::error::{CoreError, CoreResult};
use crate::label::{Label, user_label};
use crate::strategy::EmitCtx;
use std::sync::LazyLock;

pub struct BuiltinRoutine {
    pub name: &'static str,
    pub emit: fn(&mut EmitCtx) -> CoreResult<()>,
}

/// All eight built-in routines, in the order `spec.md` §4.6 describes them.
/// `alloc`/`alloc2` are adjacent and rely on that adjacency: `alloc` falls
/// through into `alloc2` rather than jumping to it.
pub static BUILTIN_ROUTINES: LazyLock<[BuiltinRoutine; 8]> = LazyLock::new(|| {
    [
        BuiltinRoutine { name: "object.__init__", emit: emit_object_init },
        BuiltinRoutine { name: "print", emit: emit_print },
        BuiltinRoutine { name: "len", emit: emit_len },
        BuiltinRoutine { name: "input", emit: emit_input },
        BuiltinRoutine { name: "alloc", emit: emit_alloc },
        BuiltinRoutine { name: "alloc2", emit: emit_alloc2 },
        BuiltinRoutine { name: "abort", emit: emit_abort },
        BuiltinRoutine { name: "heap.init", emit: emit_heap_init },
    ]
});

pub fn routine(name: &str) -> Option<&'static BuiltinRoutine> {
    BUILTIN_ROUTINES.iter().find(|r| r.name == name)
}

fn ecall_service(ctx: &mut EmitCtx, service: i32, comment: Option<&str>) -> CoreResult<()> {
    ctx.asm.li("a7", service, None)?;
    ctx.asm.ecall(comment)?;
    Ok(())
}

/// Byte offset of a class's `__str__`-payload-shaped attribute: the
/// coincidence that lets `print`'s bool path redirect into the str path by
/// swapping the object address and falling through.
fn str_payload_offset(ctx: &EmitCtx, word: i32) -> CoreResult<i32> {
    let str_class = ctx
        .graph
        .class_id_by_name("str")
        .ok_or_else(|| CoreError::Bug("str class missing from descriptor graph".to_string()))?;
    let idx = ctx.graph.classes[str_class.0]
        .attr_index("__str__")
        .ok_or_else(|| CoreError::Bug("str class has no __str__ attribute".to_string()))?;
    Ok(word * (3 + idx as i32))
}

/// Emit the straight-line sequence that jumps to `abort` with `code` and the
/// interned `message`, at whatever point in the instruction stream it's
/// called; used both inline (routines that always fail, like `input`) and
/// after a `local_label` marking an error branch target.
fn abort_sequence(ctx: &mut EmitCtx, code: i32, message: &str) -> CoreResult<()> {
    let word = ctx.asm.word_size() as i32;
    let offset = str_payload_offset(ctx, word)?;
    let msg_label = ctx.constants.get_str_constant(message);
    ctx.asm.li("a0", code, Some("error code"))?;
    ctx.asm.la("t0", &msg_label, Some(message))?;
    ctx.asm.addi("a1", "t0", offset, Some("message payload"))?;
    ctx.asm.j(&user_label("abort"), None)?;
    Ok(())
}

fn emit_object_init(ctx: &mut EmitCtx) -> CoreResult<()> {
    ctx.asm.global_label(&user_label("object.__init__"));
    ctx.asm.li("a0", 0, Some("return None"))?;
    ctx.asm.jr("ra", None)?;
    Ok(())
}

fn emit_print(ctx: &mut EmitCtx) -> CoreResult<()> {
    let word = ctx.asm.word_size() as i32;
    let str_offset = str_payload_offset(ctx, word)?;

    let int_class = ctx.graph.class_id_by_name("int").ok_or_else(|| CoreError::Bug("int class missing".to_string()))?;
    let bool_class = ctx.graph.class_id_by_name("bool").ok_or_else(|| CoreError::Bug("bool class missing".to_string()))?;
    let str_class = ctx.graph.class_id_by_name("str").ok_or_else(|| CoreError::Bug("str class missing".to_string()))?;
    let int_tag = ctx.graph.classes[int_class.0].type_tag;
    let bool_tag = ctx.graph.classes[bool_class.0].type_tag;
    let str_tag = ctx.graph.classes[str_class.0].type_tag;

    let true_str = ctx.constants.get_str_constant("True");
    let false_str = ctx.constants.get_str_constant("False");

    let invalid = ctx.labels.fresh_named("print_invalid");
    let int_path = ctx.labels.fresh_named("print_int");
    let bool_path = ctx.labels.fresh_named("print_bool");
    let str_path = ctx.labels.fresh_named("print_str");
    let bool_is_true = ctx.labels.fresh_named("print_bool_true");

    ctx.asm.global_label(&user_label("print"));
    ctx.asm.lw("a0", word, "sp", Some("load arg"))?;
    ctx.asm.beqz("a0", &invalid, Some("None is invalid"))?;
    ctx.asm.lw("t0", 0, "a0", Some("typeTag"))?;
    ctx.asm.li("t1", int_tag, None)?;
    ctx.asm.beq("t0", "t1", &int_path, None)?;
    ctx.asm.li("t1", bool_tag, None)?;
    ctx.asm.beq("t0", "t1", &bool_path, None)?;
    ctx.asm.li("t1", str_tag, None)?;
    ctx.asm.beq("t0", "t1", &str_path, None)?;
    ctx.asm.j(&invalid, Some("unsupported type"))?;

    ctx.asm.local_label(&bool_path);
    ctx.asm.lw("t0", word * 3, "a0", Some("__bool__"))?;
    ctx.asm.bnez("t0", &bool_is_true, None)?;
    ctx.asm.la("a0", &false_str, Some("False"))?;
    ctx.asm.j(&str_path, None)?;
    ctx.asm.local_label(&bool_is_true);
    ctx.asm.la("a0", &true_str, Some("True"))?;

    ctx.asm.local_label(&str_path);
    ctx.asm.addi("a0", "a0", str_offset, Some("address of __str__ payload"))?;
    ecall_service(ctx, 4, Some("print_string"))?;
    ctx.asm.li("a0", 10, Some("newline"))?;
    ecall_service(ctx, 11, Some("print_char"))?;
    ctx.asm.li("a0", 0, Some("return None"))?;
    ctx.asm.jr("ra", None)?;

    ctx.asm.local_label(&int_path);
    ctx.asm.lw("a0", word * 3, "a0", Some("__int__"))?;
    ecall_service(ctx, 1, Some("print_int"))?;
    ctx.asm.li("a0", 10, Some("newline"))?;
    ecall_service(ctx, 11, Some("print_char"))?;
    ctx.asm.li("a0", 0, Some("return None"))?;
    ctx.asm.jr("ra", None)?;

    ctx.asm.local_label(&invalid);
    abort_sequence(ctx, 1, "Invalid argument")?;
    Ok(())
}

fn emit_len(ctx: &mut EmitCtx) -> CoreResult<()> {
    let word = ctx.asm.word_size() as i32;
    let str_class = ctx.graph.class_id_by_name("str").ok_or_else(|| CoreError::Bug("str class missing".to_string()))?;
    let str_tag = ctx.graph.classes[str_class.0].type_tag;

    let invalid = ctx.labels.fresh_named("len_invalid");
    let ok = ctx.labels.fresh_named("len_ok");

    ctx.asm.global_label(&user_label("len"));
    ctx.asm.lw("a0", word, "sp", Some("load arg"))?;
    ctx.asm.beqz("a0", &invalid, Some("None is invalid"))?;
    ctx.asm.lw("t0", 0, "a0", Some("typeTag"))?;
    ctx.asm.li("t1", str_tag, None)?;
    ctx.asm.beq("t0", "t1", &ok, None)?;
    ctx.asm.li("t1", LIST_TYPE_TAG, None)?;
    ctx.asm.beq("t0", "t1", &ok, None)?;
    ctx.asm.j(&invalid, Some("unsupported type"))?;

    ctx.asm.local_label(&ok);
    ctx.asm.lw("a0", word * 3, "a0", Some("__len__"))?;
    ctx.asm.jr("ra", None)?;

    ctx.asm.local_label(&invalid);
    abort_sequence(ctx, 1, "Invalid argument")?;
    Ok(())
}

fn emit_input(ctx: &mut EmitCtx) -> CoreResult<()> {
    ctx.asm.global_label(&user_label("input"));
    abort_sequence(ctx, 6, "Unsupported operation")?;
    Ok(())
}

/// `alloc(protoAddr in a0)` computes the object's own size and falls
/// through to `alloc2`, no jump, so `alloc2` must be the very next routine
/// emitted after this one.
fn emit_alloc(ctx: &mut EmitCtx) -> CoreResult<()> {
    let word = ctx.asm.word_size() as i32;
    ctx.asm.global_label(&user_label("alloc"));
    ctx.asm.lw("a1", word, "a0", Some("objectSize"))?;
    Ok(())
}

fn emit_alloc2(ctx: &mut EmitCtx) -> CoreResult<()> {
    let word = ctx.asm.word_size() as i32;
    let oom = ctx.labels.fresh_named("alloc_oom");
    let copy_loop = ctx.labels.fresh_named("alloc_copy");
    let copy_done = ctx.labels.fresh_named("alloc_copy_done");

    ctx.asm.global_label(&user_label("alloc2"));
    ctx.asm.li("t1", word, None)?;
    ctx.asm.mul("t0", "a1", "t1", Some("requested size in bytes"))?;
    ctx.asm.add("a2", "gp", "t0", Some("candidate end address"))?;
    ctx.asm.bgeu("a2", "s11", &oom, Some("heap exhausted"))?;

    ctx.asm.lw("t2", word, "a0", Some("prototype's own size, in words"))?;
    ctx.asm.li("t3", 0, Some("copy index"))?;
    ctx.asm.local_label(&copy_loop);
    ctx.asm.slt("t4", "t3", "t2", None)?;
    ctx.asm.beqz("t4", &copy_done, None)?;
    ctx.asm.mul("t6", "t3", "t1", Some("byte offset"))?;
    ctx.asm.add("t0", "a0", "t6", Some("src word"))?;
    ctx.asm.lw("t5", 0, "t0", None)?;
    ctx.asm.add("t0", "gp", "t6", Some("dst word"))?;
    ctx.asm.sw("t5", 0, "t0", None)?;
    ctx.asm.addi("t3", "t3", 1, None)?;
    ctx.asm.j(&copy_loop, None)?;

    ctx.asm.local_label(&copy_done);
    ctx.asm.sw("a1", word, "gp", Some("patch objectSize to requested length"))?;
    ctx.asm.mv("t0", "gp", Some("old gp is the returned address"))?;
    ctx.asm.mv("gp", "a2", Some("advance bump pointer"))?;
    ctx.asm.mv("a0", "t0", None)?;
    ctx.asm.jr("ra", None)?;

    ctx.asm.local_label(&oom);
    abort_sequence(ctx, 5, "Out of memory")?;
    Ok(())
}

fn emit_abort(ctx: &mut EmitCtx) -> CoreResult<()> {
    ctx.asm.global_label(&user_label("abort"));
    ctx.asm.mv("s1", "a0", Some("save exit code across the ecalls below"))?;
    ctx.asm.mv("a0", "a1", Some("message payload address"))?;
    ecall_service(ctx, 4, Some("print_string"))?;
    ctx.asm.li("a0", 10, Some("newline"))?;
    ecall_service(ctx, 11, Some("print_char"))?;
    ctx.asm.mv("a0", "s1", Some("restore exit code"))?;
    ecall_service(ctx, 17, Some("exit2"))?;
    let trap: Label = ctx.labels.fresh_named("abort_trap");
    ctx.asm.local_label(&trap);
    ctx.asm.j(&trap, Some("safety net if exit2 falls through"))?;
    Ok(())
}

fn emit_heap_init(ctx: &mut EmitCtx) -> CoreResult<()> {
    ctx.asm.global_label(&user_label("heap.init"));
    ctx.asm.mv("a1", "a0", Some("forward requested size"))?;
    ecall_service(ctx, 9, Some("sbrk"))?;
    ctx.asm.jr("ra", None)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::Analyzer;
    use crate::asm::AsmEmitter;

    fn run(name: &str) -> String {
        let mut az = Analyzer::new();
        let mut asm = AsmEmitter::default();
        let mut ctx = EmitCtx {
            graph: &az.graph,
            labels: &mut az.labels,
            constants: &mut az.constants,
            asm: &mut asm,
        };
        (routine(name).unwrap().emit)(&mut ctx).unwrap();
        asm.into_text()
    }

    #[test]
    fn object_init_returns_none_without_touching_the_stack() {
        let text = run("object.__init__");
        assert!(text.contains(".globl $object.__init__"));
        assert!(text.contains("li a0, 0"));
        assert!(!text.contains("sp,"));
    }

    #[test]
    fn print_aborts_on_none_with_code_one() {
        let text = run("print");
        assert!(text.contains(".globl $print"));
        assert!(text.contains("j $abort"));
        assert!(text.contains("li a0, 1"));
    }

    #[test]
    fn len_accepts_str_and_list_tags_only() {
        let text = run("len");
        assert!(text.contains(".globl $len"));
        assert!(text.contains("lw a0, 12(a0)") || text.contains("lw a0, 12 (a0)") || text.contains("__len__"));
    }

    #[test]
    fn input_is_unconditionally_unsupported() {
        let text = run("input");
        assert!(text.contains(".globl $input"));
        assert!(text.contains("li a0, 6"));
        assert!(text.contains("j $abort"));
    }

    #[test]
    fn alloc_falls_through_into_alloc2() {
        let alloc_text = run("alloc");
        assert!(alloc_text.contains(".globl $alloc"));
        assert!(!alloc_text.contains("jr ra"));
        assert!(!alloc_text.contains("j $alloc2"));
    }

    #[test]
    fn abort_exits_via_ecall_seventeen_with_a_trailing_trap() {
        let text = run("abort");
        assert!(text.contains("li a7, 17"));
        assert!(text.ends_with(" # safety net if exit2 falls through\n") || text.contains("safety net"));
    }

    #[test]
    fn heap_init_forwards_size_and_uses_sbrk() {
        let text = run("heap.init");
        assert!(text.contains(".globl $heap.init"));
        assert!(text.contains("mv a1, a0"));
        assert!(text.contains("li a7, 9"));
    }
}
