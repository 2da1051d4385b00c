//! `ReferenceBackend`: the one concrete `Backend` this crate ships.
//!
//! A conventional tree-walking compiler from typed statements/expressions to
//! RV32 instructions. Every intermediate value (int, bool, str, `None`, or a
//! user instance) is the address of a heap or constant-pool object; there
//! is no unboxed representation anywhere. Expressions always leave their
//! result in `a0`; sub-results that must survive a nested evaluation are
//! spilled to the real stack (`push_a0`/`pop_to`), never left in a
//! caller-saved temporary across a call.
//!
//! Activation records use a single offset formula for both parameters and
//! locals: slot `v` (0-indexed, parameters first) lives at
//! `fp + (N-1-v)*wordSize` where `N` is the parameter count; for `v >= N`
//! this falls below `fp` into local storage. `fp` itself is always
//! `sp + wordSize` on entry, matching the fixed program-entry convention, so
//! the one reserved word below every `fp` (`fp - wordSize`) is always
//! present: unused for depth-0 callees, the caller's frame pointer (the
//! static link) for nested ones. A dedicated slot at `fp - 2*wordSize` saves
//! the return address, since a non-leaf body's own calls clobber `ra`.
//!
//! Nested-function `nonlocal` access walks the static-link chain: from the
//! current frame, `hops = current.depth - owner.depth` indirections through
//! `fp - wordSize` reach the owning frame.

use crate::ast::{AssignTarget, BinOp, Expr, Stmt, UnaryOp};
use crate::descriptors::{ClassId, FuncId, FuncInfo, SymbolInfo};
use crate::error::{CoreError, CoreResult};
use crate::label::user_label;
use crate::strategy::{Backend, EmitCtx};

pub struct ReferenceBackend;

impl Backend for ReferenceBackend {
    fn emit_top_level(&self, stmts: &[Stmt], ctx: &mut EmitCtx) -> CoreResult<()> {
        let gen = Codegen { current: None };
        gen.stmts(stmts, ctx)
    }

    fn emit_function_body(&self, func: FuncId, ctx: &mut EmitCtx) -> CoreResult<()> {
        let gen = Codegen { current: Some(func) };
        gen.function(func, ctx)
    }
}

/// Where a parameter or local lives relative to the frame that owns it.
enum VarLoc {
    Global(crate::label::Label),
    Stack { hops: i32, offset: i32 },
}

/// A variable's offset from its owning frame's `fp`, given that frame's own
/// parameter count. The same formula covers parameters (`v < N`, offsets
/// counting down from the top of the caller-pushed area) and locals
/// (`v >= N`, offsets counting down from the saved-`ra` slot).
fn frame_offset(func: &FuncInfo, idx: usize, word: i32) -> i32 {
    let n = func.arity() as i32;
    if (idx as i32) < n {
        (n - 1 - idx as i32) * word
    } else {
        let j = idx as i32 - n;
        -(3 + j) * word
    }
}

fn class_tag(ctx: &EmitCtx, name: &str) -> CoreResult<i32> {
    let id = ctx
        .graph
        .class_id_by_name(name)
        .ok_or_else(|| CoreError::Bug(format!("'{name}' class missing from the descriptor graph")))?;
    Ok(ctx.graph.classes[id.0].type_tag)
}

fn push_a0(ctx: &mut EmitCtx) -> CoreResult<()> {
    let word = ctx.asm.word_size() as i32;
    ctx.asm.addi("sp", "sp", -word, None)?;
    ctx.asm.sw("a0", 0, "sp", None)?;
    Ok(())
}

fn pop_to(ctx: &mut EmitCtx, reg: &str) -> CoreResult<()> {
    let word = ctx.asm.word_size() as i32;
    ctx.asm.lw(reg, 0, "sp", None)?;
    ctx.asm.addi("sp", "sp", word, None)?;
    Ok(())
}

fn discard_word(ctx: &mut EmitCtx) -> CoreResult<()> {
    let word = ctx.asm.word_size() as i32;
    ctx.asm.addi("sp", "sp", word, None)?;
    Ok(())
}

struct Codegen {
    /// `None` while lowering the top-level statement sequence; `Some` while
    /// lowering a function or method body.
    current: Option<FuncId>,
}

impl Codegen {
    fn own_table(&self, ctx: &EmitCtx) -> crate::symbol_table::SymbolTableId {
        match self.current {
            Some(f) => ctx.graph.funcs[f.0].own_table,
            None => ctx.graph.global_table,
        }
    }

    // ---- Functions --------------------------------------------------------

    fn function(&self, func_id: FuncId, ctx: &mut EmitCtx) -> CoreResult<()> {
        let func = ctx.graph.funcs[func_id.0].clone();
        let word = ctx.asm.word_size() as i32;

        ctx.asm.global_label(&func.code_label);
        ctx.asm.addi("fp", "sp", word, Some("fp = sp + wordSize"))?;
        let k = func.locals.len() as i32;
        ctx.asm.addi("sp", "sp", -(k + 1) * word, Some("reserve ra + locals"))?;
        ctx.asm.sw("ra", -2 * word, "fp", Some("save return address"))?;

        for (j, local) in func.locals.iter().enumerate() {
            let off = -(3 + j as i32) * word;
            match &local.init_label {
                Some(label) => {
                    ctx.asm.la("t0", label, None)?;
                    ctx.asm.sw("t0", off, "fp", Some(&local.name))?;
                }
                None => {
                    ctx.asm.sw("zero", off, "fp", Some(&local.name))?;
                }
            }
        }

        let body = ctx.graph.body_of(func_id).to_vec();
        self.stmts(&body, ctx)?;

        // Every path through `body` may not return explicitly (e.g. a
        // procedure, or an `if` missing an `else`); fall through to an
        // implicit `return None`.
        ctx.asm.li("a0", 0, Some("implicit return None"))?;
        self.epilogue(ctx)
    }

    fn epilogue(&self, ctx: &mut EmitCtx) -> CoreResult<()> {
        let word = ctx.asm.word_size() as i32;
        ctx.asm.lw("ra", -2 * word, "fp", Some("restore return address"))?;
        ctx.asm.addi("sp", "fp", -word, Some("restore sp"))?;
        ctx.asm.jr("ra", None)?;
        Ok(())
    }

    // ---- Statements ---------------------------------------------------------

    fn stmts(&self, stmts: &[Stmt], ctx: &mut EmitCtx) -> CoreResult<()> {
        for s in stmts {
            self.stmt(s, ctx)?;
        }
        Ok(())
    }

    fn stmt(&self, s: &Stmt, ctx: &mut EmitCtx) -> CoreResult<()> {
        match s {
            Stmt::Expr(e) => self.expr(e, ctx),
            Stmt::Assign { target, value } => self.assign(target, value, ctx),
            Stmt::If { cond, then_body, else_body } => self.if_stmt(cond, then_body, else_body, ctx),
            Stmt::While { cond, body } => self.while_stmt(cond, body, ctx),
            Stmt::Return(value) => self.return_stmt(value.as_ref(), ctx),
            Stmt::Pass => Ok(()),
        }
    }

    fn if_stmt(&self, cond: &Expr, then_body: &[Stmt], else_body: &[Stmt], ctx: &mut EmitCtx) -> CoreResult<()> {
        let word = ctx.asm.word_size() as i32;
        self.expr(cond, ctx)?;
        ctx.asm.lw("t0", word * 3, "a0", Some("__bool__"))?;
        let else_label = ctx.labels.fresh_named("if_else");
        let end_label = ctx.labels.fresh_named("if_end");
        ctx.asm.beqz("t0", &else_label, None)?;
        self.stmts(then_body, ctx)?;
        ctx.asm.j(&end_label, None)?;
        ctx.asm.local_label(&else_label);
        self.stmts(else_body, ctx)?;
        ctx.asm.local_label(&end_label);
        Ok(())
    }

    fn while_stmt(&self, cond: &Expr, body: &[Stmt], ctx: &mut EmitCtx) -> CoreResult<()> {
        let word = ctx.asm.word_size() as i32;
        let top = ctx.labels.fresh_named("while_top");
        let end = ctx.labels.fresh_named("while_end");
        ctx.asm.local_label(&top);
        self.expr(cond, ctx)?;
        ctx.asm.lw("t0", word * 3, "a0", Some("__bool__"))?;
        ctx.asm.beqz("t0", &end, None)?;
        self.stmts(body, ctx)?;
        ctx.asm.j(&top, None)?;
        ctx.asm.local_label(&end);
        Ok(())
    }

    fn return_stmt(&self, value: Option<&Expr>, ctx: &mut EmitCtx) -> CoreResult<()> {
        match value {
            Some(e) => self.expr(e, ctx)?,
            None => ctx.asm.li("a0", 0, Some("return None"))?,
        }
        if self.current.is_some() {
            self.epilogue(ctx)?;
        }
        Ok(())
    }

    fn assign(&self, target: &AssignTarget, value: &Expr, ctx: &mut EmitCtx) -> CoreResult<()> {
        match target {
            AssignTarget::Identifier(name) => {
                self.expr(value, ctx)?;
                let loc = self.var_location(ctx, name)?;
                self.store_var(ctx, &loc)
            }
            AssignTarget::Attribute { receiver, receiver_type, name } => {
                self.expr(receiver, ctx)?;
                push_a0(ctx)?;
                self.expr(value, ctx)?;
                pop_to(ctx, "t0")?;
                let class_id = ctx
                    .graph
                    .class_id_by_name(receiver_type)
                    .ok_or_else(|| CoreError::Bug(format!("unknown class '{receiver_type}'")))?;
                let idx = ctx.graph.classes[class_id.0]
                    .attr_index(name)
                    .ok_or_else(|| CoreError::Bug(format!("class '{receiver_type}' has no attribute '{name}'")))?;
                let word = ctx.asm.word_size() as i32;
                ctx.asm.sw("a0", word * (3 + idx as i32), "t0", Some(name))?;
                Ok(())
            }
        }
    }

    // ---- Variable resolution ------------------------------------------------

    fn var_location(&self, ctx: &EmitCtx, name: &str) -> CoreResult<VarLoc> {
        let table = self.own_table(ctx);
        match ctx.graph.tables.lookup(table, name) {
            Some(SymbolInfo::GlobalVar(id)) => Ok(VarLoc::Global(ctx.graph.globals[id.0].storage_label.clone())),
            Some(SymbolInfo::StackVar(owner)) => {
                let owner_func = &ctx.graph.funcs[owner.0];
                let idx = owner_func.var_index(name).ok_or_else(|| {
                    CoreError::Bug(format!("'{name}' missing from its owning function's activation record"))
                })?;
                let word = ctx.asm.word_size() as i32;
                let offset = frame_offset(owner_func, idx, word);
                let cur_depth = match self.current {
                    Some(f) => ctx.graph.funcs[f.0].depth,
                    None => {
                        return Err(CoreError::Bug(format!(
                            "identifier '{name}' resolves to a stack variable outside any function"
                        )));
                    }
                };
                let hops = cur_depth as i32 - owner_func.depth as i32;
                Ok(VarLoc::Stack { hops, offset })
            }
            other => Err(CoreError::Bug(format!(
                "identifier '{name}' does not resolve to a variable (found {other:?})"
            ))),
        }
    }

    fn walk_static_link(&self, ctx: &mut EmitCtx, hops: i32, reg: &str) -> CoreResult<()> {
        let word = ctx.asm.word_size() as i32;
        ctx.asm.mv(reg, "fp", Some("static link walk"))?;
        for _ in 0..hops {
            ctx.asm.lw(reg, -word, reg, None)?;
        }
        Ok(())
    }

    fn load_var(&self, ctx: &mut EmitCtx, loc: &VarLoc) -> CoreResult<()> {
        match loc {
            VarLoc::Global(label) => {
                ctx.asm.la("a0", label, None)?;
                ctx.asm.lw("a0", 0, "a0", None)?;
            }
            VarLoc::Stack { hops: 0, offset } => ctx.asm.lw("a0", *offset, "fp", None)?,
            VarLoc::Stack { hops, offset } => {
                self.walk_static_link(ctx, *hops, "t0")?;
                ctx.asm.lw("a0", *offset, "t0", None)?;
            }
        }
        Ok(())
    }

    fn store_var(&self, ctx: &mut EmitCtx, loc: &VarLoc) -> CoreResult<()> {
        match loc {
            VarLoc::Global(label) => {
                ctx.asm.la("t0", label, None)?;
                ctx.asm.sw("a0", 0, "t0", None)?;
            }
            VarLoc::Stack { hops: 0, offset } => ctx.asm.sw("a0", *offset, "fp", None)?,
            VarLoc::Stack { hops, offset } => {
                self.walk_static_link(ctx, *hops, "t0")?;
                ctx.asm.sw("a0", *offset, "t0", None)?;
            }
        }
        Ok(())
    }

    fn load_identifier(&self, name: &str, ctx: &mut EmitCtx) -> CoreResult<()> {
        let loc = self.var_location(ctx, name)?;
        self.load_var(ctx, &loc)
    }

    // ---- Expressions --------------------------------------------------------

    fn expr(&self, e: &Expr, ctx: &mut EmitCtx) -> CoreResult<()> {
        match e {
            Expr::Literal(lit) => {
                match ctx.constants.from_literal(lit) {
                    Some(label) => ctx.asm.la("a0", &label, None)?,
                    None => ctx.asm.li("a0", 0, Some("None"))?,
                }
                Ok(())
            }
            Expr::SelfExpr => self.load_identifier("self", ctx),
            Expr::Identifier(name) => self.load_identifier(name, ctx),
            Expr::Unary { op, operand } => self.unary(*op, operand, ctx),
            Expr::Binary { op, left, right } => self.binary(*op, left, right, ctx),
            Expr::Call { callee, args } => self.call(callee, args, ctx),
            Expr::MethodCall { receiver, receiver_type, method, args } => {
                self.method_call(receiver, receiver_type, method, args, ctx)
            }
            Expr::Attribute { receiver, receiver_type, name } => self.attribute(receiver, receiver_type, name, ctx),
        }
    }

    fn attribute(&self, receiver: &Expr, receiver_type: &str, name: &str, ctx: &mut EmitCtx) -> CoreResult<()> {
        self.expr(receiver, ctx)?;
        let class_id = ctx
            .graph
            .class_id_by_name(receiver_type)
            .ok_or_else(|| CoreError::Bug(format!("unknown class '{receiver_type}'")))?;
        let idx = ctx.graph.classes[class_id.0]
            .attr_index(name)
            .ok_or_else(|| CoreError::Bug(format!("class '{receiver_type}' has no attribute '{name}'")))?;
        let word = ctx.asm.word_size() as i32;
        ctx.asm.lw("a0", word * (3 + idx as i32), "a0", Some(name))?;
        Ok(())
    }

    fn unary(&self, op: UnaryOp, operand: &Expr, ctx: &mut EmitCtx) -> CoreResult<()> {
        self.expr(operand, ctx)?;
        let word = ctx.asm.word_size() as i32;
        match op {
            UnaryOp::Neg => {
                ctx.asm.lw("t1", word * 3, "a0", Some("__int__"))?;
                ctx.asm.sub("t3", "zero", "t1", None)?;
                self.alloc_int(ctx, "t3")
            }
            UnaryOp::Not => {
                ctx.asm.lw("t0", word * 3, "a0", Some("__bool__"))?;
                let set_true = ctx.labels.fresh_named("not_true");
                let done = ctx.labels.fresh_named("not_done");
                ctx.asm.beqz("t0", &set_true, None)?;
                let false_const = ctx.constants.false_constant().clone();
                ctx.asm.la("a0", &false_const, None)?;
                ctx.asm.j(&done, None)?;
                ctx.asm.local_label(&set_true);
                let true_const = ctx.constants.true_constant().clone();
                ctx.asm.la("a0", &true_const, None)?;
                ctx.asm.local_label(&done);
                Ok(())
            }
        }
    }

    fn binary(&self, op: BinOp, left: &Expr, right: &Expr, ctx: &mut EmitCtx) -> CoreResult<()> {
        match op {
            BinOp::And => return self.short_circuit(true, left, right, ctx),
            BinOp::Or => return self.short_circuit(false, left, right, ctx),
            _ => {}
        }
        self.expr(left, ctx)?;
        push_a0(ctx)?;
        self.expr(right, ctx)?;
        pop_to(ctx, "t0")?; // t0 = left, a0 = right
        match op {
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::FloorDiv | BinOp::Mod => self.compile_arith(op, ctx),
            BinOp::Lt | BinOp::LtEq | BinOp::Gt | BinOp::GtEq => self.compile_cmp(op, ctx),
            BinOp::Eq => self.compile_eq(false, ctx),
            BinOp::NotEq => self.compile_eq(true, ctx),
            BinOp::Is => self.compile_is(ctx),
            BinOp::And | BinOp::Or => unreachable!("handled above"),
        }
    }

    fn short_circuit(&self, is_and: bool, left: &Expr, right: &Expr, ctx: &mut EmitCtx) -> CoreResult<()> {
        self.expr(left, ctx)?;
        let word = ctx.asm.word_size() as i32;
        let do_right = ctx.labels.fresh_named(if is_and { "and_rhs" } else { "or_rhs" });
        let end = ctx.labels.fresh_named(if is_and { "and_end" } else { "or_end" });
        ctx.asm.lw("t0", word * 3, "a0", Some("__bool__"))?;
        if is_and {
            ctx.asm.bnez("t0", &do_right, None)?;
        } else {
            ctx.asm.beqz("t0", &do_right, None)?;
        }
        ctx.asm.j(&end, Some("short-circuit"))?;
        ctx.asm.local_label(&do_right);
        self.expr(right, ctx)?;
        ctx.asm.local_label(&end);
        Ok(())
    }

    fn alloc_int(&self, ctx: &mut EmitCtx, value_reg: &str) -> CoreResult<()> {
        let word = ctx.asm.word_size() as i32;
        ctx.asm.addi("sp", "sp", -word, None)?;
        ctx.asm.sw(value_reg, 0, "sp", Some("save computed value"))?;
        let int_id = ctx
            .graph
            .class_id_by_name("int")
            .ok_or_else(|| CoreError::Bug("int class missing".to_string()))?;
        let proto = ctx.graph.classes[int_id.0].prototype_label.clone();
        ctx.asm.la("a0", &proto, Some("int prototype"))?;
        ctx.asm.jal(&user_label("alloc"), Some("box computed int"))?;
        ctx.asm.lw("t1", 0, "sp", Some("reload computed value"))?;
        ctx.asm.addi("sp", "sp", word, None)?;
        ctx.asm.sw("t1", word * 3, "a0", Some("__int__"))?;
        Ok(())
    }

    fn compile_arith(&self, op: BinOp, ctx: &mut EmitCtx) -> CoreResult<()> {
        let word = ctx.asm.word_size() as i32;
        ctx.asm.lw("t1", word * 3, "t0", Some("left value"))?;
        ctx.asm.lw("t2", word * 3, "a0", Some("right value"))?;
        match op {
            BinOp::Add => ctx.asm.add("t3", "t1", "t2", None)?,
            BinOp::Sub => ctx.asm.sub("t3", "t1", "t2", None)?,
            BinOp::Mul => ctx.asm.mul("t3", "t1", "t2", None)?,
            BinOp::FloorDiv => ctx.asm.div("t3", "t1", "t2", None)?,
            BinOp::Mod => ctx.asm.rem("t3", "t1", "t2", None)?,
            _ => unreachable!("not an arithmetic op"),
        }
        self.alloc_int(ctx, "t3")
    }

    fn compile_cmp(&self, op: BinOp, ctx: &mut EmitCtx) -> CoreResult<()> {
        let word = ctx.asm.word_size() as i32;
        ctx.asm.lw("t1", word * 3, "t0", Some("left value"))?;
        ctx.asm.lw("t2", word * 3, "a0", Some("right value"))?;
        let (lhs, rhs, invert) = match op {
            BinOp::Lt => ("t1", "t2", false),
            BinOp::Gt => ("t2", "t1", false),
            BinOp::GtEq => ("t1", "t2", true),
            BinOp::LtEq => ("t2", "t1", true),
            _ => unreachable!("not an ordering op"),
        };
        ctx.asm.slt("t3", lhs, rhs, None)?;
        let set_true = ctx.labels.fresh_named("cmp_true");
        let done = ctx.labels.fresh_named("cmp_done");
        if invert {
            ctx.asm.beqz("t3", &set_true, None)?;
        } else {
            ctx.asm.bnez("t3", &set_true, None)?;
        }
        let false_const = ctx.constants.false_constant().clone();
        ctx.asm.la("a0", &false_const, None)?;
        ctx.asm.j(&done, None)?;
        ctx.asm.local_label(&set_true);
        let true_const = ctx.constants.true_constant().clone();
        ctx.asm.la("a0", &true_const, None)?;
        ctx.asm.local_label(&done);
        Ok(())
    }

    fn compile_is(&self, ctx: &mut EmitCtx) -> CoreResult<()> {
        let set_true = ctx.labels.fresh_named("is_true");
        let done = ctx.labels.fresh_named("is_done");
        ctx.asm.beq("t0", "a0", &set_true, None)?;
        let false_const = ctx.constants.false_constant().clone();
        ctx.asm.la("a0", &false_const, None)?;
        ctx.asm.j(&done, None)?;
        ctx.asm.local_label(&set_true);
        let true_const = ctx.constants.true_constant().clone();
        ctx.asm.la("a0", &true_const, None)?;
        ctx.asm.local_label(&done);
        Ok(())
    }

    /// `==`/`!=`. Dispatches on the left operand's runtime type tag rather
    /// than a statically-known type (the AST carries static types only at
    /// method/attribute call sites, not on `Binary`): `int`/`bool` compare
    /// their single raw word, `str` compares length then bytes, anything
    /// else falls back to address identity.
    fn compile_eq(&self, negate: bool, ctx: &mut EmitCtx) -> CoreResult<()> {
        let word = ctx.asm.word_size() as i32;
        let int_tag = class_tag(ctx, "int")?;
        let bool_tag = class_tag(ctx, "bool")?;
        let str_tag = class_tag(ctx, "str")?;
        let str_id = ctx
            .graph
            .class_id_by_name("str")
            .ok_or_else(|| CoreError::Bug("str class missing".to_string()))?;
        let str_payload_off = word
            * (3 + ctx.graph.classes[str_id.0]
                .attr_index("__str__")
                .ok_or_else(|| CoreError::Bug("str has no __str__ attribute".to_string()))? as i32);

        ctx.asm.mv("t3", "t0", Some("left"))?;
        ctx.asm.mv("t4", "a0", Some("right"))?;

        let str_path = ctx.labels.fresh_named("eq_str");
        let num_path = ctx.labels.fresh_named("eq_num");
        let ptr_path = ctx.labels.fresh_named("eq_ptr");
        let set_true = ctx.labels.fresh_named("eq_true");
        let set_false = ctx.labels.fresh_named("eq_false");
        let done = ctx.labels.fresh_named("eq_done");
        let loop_lbl = ctx.labels.fresh_named("eq_str_loop");

        ctx.asm.lw("t5", 0, "t3", Some("typeTag"))?;
        ctx.asm.li("t6", str_tag, None)?;
        ctx.asm.beq("t5", "t6", &str_path, None)?;
        ctx.asm.li("t6", int_tag, None)?;
        ctx.asm.beq("t5", "t6", &num_path, None)?;
        ctx.asm.li("t6", bool_tag, None)?;
        ctx.asm.beq("t5", "t6", &num_path, None)?;
        ctx.asm.j(&ptr_path, None)?;

        ctx.asm.local_label(&num_path);
        ctx.asm.lw("t5", word * 3, "t3", None)?;
        ctx.asm.lw("t6", word * 3, "t4", None)?;
        ctx.asm.beq("t5", "t6", &set_true, None)?;
        ctx.asm.j(&set_false, None)?;

        ctx.asm.local_label(&ptr_path);
        ctx.asm.beq("t3", "t4", &set_true, None)?;
        ctx.asm.j(&set_false, None)?;

        ctx.asm.local_label(&str_path);
        ctx.asm.lw("t5", word * 3, "t3", Some("left __len__"))?;
        ctx.asm.lw("t6", word * 3, "t4", Some("right __len__"))?;
        ctx.asm.bne("t5", "t6", &set_false, None)?;
        ctx.asm.addi("t3", "t3", str_payload_off, Some("left payload"))?;
        ctx.asm.addi("t4", "t4", str_payload_off, Some("right payload"))?;
        ctx.asm.li("t1", 0, Some("index"))?;
        ctx.asm.local_label(&loop_lbl);
        ctx.asm.slt("t2", "t1", "t5", None)?;
        ctx.asm.beqz("t2", &set_true, Some("all bytes matched"))?;
        ctx.asm.add("t0", "t3", "t1", None)?;
        ctx.asm.lbu("t2", 0, "t0", None)?;
        ctx.asm.add("t0", "t4", "t1", None)?;
        ctx.asm.lbu("t6", 0, "t0", None)?;
        ctx.asm.bne("t2", "t6", &set_false, None)?;
        ctx.asm.addi("t1", "t1", 1, None)?;
        ctx.asm.j(&loop_lbl, None)?;

        let (true_const, false_const) = (ctx.constants.true_constant().clone(), ctx.constants.false_constant().clone());
        ctx.asm.local_label(&set_true);
        ctx.asm.la("a0", if negate { &false_const } else { &true_const }, None)?;
        ctx.asm.j(&done, None)?;
        ctx.asm.local_label(&set_false);
        ctx.asm.la("a0", if negate { &true_const } else { &false_const }, None)?;
        ctx.asm.local_label(&done);
        Ok(())
    }

    // ---- Calls ----------------------------------------------------------

    /// Every call (user function, method, or built-in) pushes its arguments
    /// in source order, then one more word: zero for a depth-0 callee,
    /// otherwise the static link: the enclosing frame's `fp`, reached by
    /// walking the current frame's own chain `hops` times.
    fn push_link(&self, ctx: &mut EmitCtx, target: &FuncInfo) -> CoreResult<()> {
        let word = ctx.asm.word_size() as i32;
        if target.depth == 0 {
            ctx.asm.addi("sp", "sp", -word, None)?;
            ctx.asm.sw("zero", 0, "sp", Some("static link (unused)"))?;
            return Ok(());
        }
        let parent_depth = target.depth - 1;
        let cur_depth = match self.current {
            Some(f) => ctx.graph.funcs[f.0].depth,
            None => {
                return Err(CoreError::Bug(format!(
                    "nested function '{}' called from outside any function",
                    target.qualified_name
                )));
            }
        };
        let hops = cur_depth as i32 - parent_depth as i32;
        self.walk_static_link(ctx, hops, "t0")?;
        ctx.asm.addi("sp", "sp", -word, None)?;
        ctx.asm.sw("t0", 0, "sp", Some("static link"))?;
        Ok(())
    }

    fn call_func(&self, fid: FuncId, self_expr: Option<&Expr>, args: &[Expr], ctx: &mut EmitCtx) -> CoreResult<()> {
        let target = ctx.graph.funcs[fid.0].clone();
        let word = ctx.asm.word_size() as i32;
        let mut n = 0i32;
        if let Some(se) = self_expr {
            self.expr(se, ctx)?;
            push_a0(ctx)?;
            n += 1;
        }
        for a in args {
            self.expr(a, ctx)?;
            push_a0(ctx)?;
            n += 1;
        }
        self.push_link(ctx, &target)?;
        ctx.asm.jal(&target.code_label, None)?;
        ctx.asm.addi("sp", "sp", (n + 1) * word, Some("pop args + link"))?;
        Ok(())
    }

    fn call(&self, callee: &str, args: &[Expr], ctx: &mut EmitCtx) -> CoreResult<()> {
        let table = self.own_table(ctx);
        match ctx.graph.tables.lookup(table, callee) {
            Some(SymbolInfo::Func(fid)) => self.call_func(fid, None, args, ctx),
            Some(SymbolInfo::Class(cid)) => self.construct(cid, args, ctx),
            other => Err(CoreError::Bug(format!(
                "'{callee}' does not resolve to a function or class (found {other:?})"
            ))),
        }
    }

    /// `C(args)`: allocate from `C`'s prototype, then call `__init__` with
    /// the new instance as `self`. The instance address is stashed on the
    /// real stack across the `__init__` call (which otherwise has nowhere
    /// safe to leave it: every caller-saved register is fair game to the
    /// constructor arguments' own sub-expressions).
    fn construct(&self, cid: ClassId, args: &[Expr], ctx: &mut EmitCtx) -> CoreResult<()> {
        let class = ctx.graph.classes[cid.0].clone();
        let word = ctx.asm.word_size() as i32;

        ctx.asm.la("a0", &class.prototype_label, Some("prototype"))?;
        ctx.asm.jal(&user_label("alloc"), Some("allocate instance"))?;
        push_a0(ctx)?; // saved instance

        let init_idx = class
            .method_index("__init__")
            .ok_or_else(|| CoreError::Bug(format!("class '{}' has no __init__", class.name)))?;
        let init_func = ctx.graph.funcs[class.methods[init_idx].func.0].clone();

        ctx.asm.lw("a0", 0, "sp", Some("reload instance for self"))?;
        push_a0(ctx)?;
        let mut n = 1i32;
        for a in args {
            self.expr(a, ctx)?;
            push_a0(ctx)?;
            n += 1;
        }
        self.push_link(ctx, &init_func)?;
        ctx.asm.jal(&init_func.code_label, Some("call __init__"))?;
        ctx.asm.addi("sp", "sp", (n + 1) * word, Some("pop init args + link"))?;

        pop_to(ctx, "a0") // result = constructed instance
    }

    /// `receiver.method(args)`: dispatches through `receiver`'s *runtime*
    /// dispatch table (loaded from its header, not assumed from
    /// `receiver_type`) so an override in a subclass is honored.
    fn method_call(
        &self,
        receiver: &Expr,
        receiver_type: &str,
        method: &str,
        args: &[Expr],
        ctx: &mut EmitCtx,
    ) -> CoreResult<()> {
        let class_id = ctx
            .graph
            .class_id_by_name(receiver_type)
            .ok_or_else(|| CoreError::Bug(format!("unknown class '{receiver_type}'")))?;
        let class = ctx.graph.classes[class_id.0].clone();
        let midx = class
            .method_index(method)
            .ok_or_else(|| CoreError::Bug(format!("class '{}' has no method '{method}'", class.name)))?;
        let word = ctx.asm.word_size() as i32;

        self.expr(receiver, ctx)?;
        push_a0(ctx)?; // slot R: kept for the dispatch lookup below
        ctx.asm.lw("a0", 0, "sp", Some("reload receiver as self"))?;
        push_a0(ctx)?;
        let mut n = 1i32;
        for a in args {
            self.expr(a, ctx)?;
            push_a0(ctx)?;
            n += 1;
        }
        let method_func = ctx.graph.funcs[class.methods[midx].func.0].clone();
        self.push_link(ctx, &method_func)?;

        ctx.asm.lw("t0", (n + 1) * word, "sp", Some("reload receiver for dispatch"))?;
        ctx.asm.lw("t1", 2 * word, "t0", Some("dispatchTable"))?;
        ctx.asm.lw("t2", (midx as i32) * word, "t1", Some(method))?;
        ctx.asm.jalr("ra", "t2", 0, None)?;
        ctx.asm.addi("sp", "sp", (n + 1) * word, Some("pop self + args + link"))?;
        discard_word(ctx) // drop slot R
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::Analyzer;
    use crate::ast::*;
    use crate::backend::program::emit;
    use crate::config::CoreConfig;

    fn compiled(program: &Program) -> String {
        let mut analyzer = Analyzer::new();
        analyzer.analyze_program(program).unwrap();
        let backend = ReferenceBackend;
        emit(&mut analyzer, &CoreConfig::default(), &backend).unwrap()
    }

    #[test]
    fn function_prologue_reserves_ra_and_locals() {
        let f = FuncDef {
            name: "f".to_string(),
            params: vec![],
            return_type: TypeAnnotation::None,
            declarations: vec![Declaration::VarDef(VarDecl {
                name: "x".to_string(),
                type_ann: TypeAnnotation::Int,
                init: Literal::Integer(0),
            })],
            body: vec![Stmt::Pass],
        };
        let program = Program {
            declarations: vec![Declaration::FuncDef(f)],
            statements: vec![],
        };
        let text = compiled(&program);
        assert!(text.contains("addi fp, sp, 4"));
        assert!(text.contains("addi sp, sp, -8")); // 1 local + ra slot
        assert!(text.contains("sw ra, -8(fp)"));
        assert!(text.contains("jr ra"));
    }

    #[test]
    fn if_else_emits_both_branches_and_a_join() {
        let f = FuncDef {
            name: "f".to_string(),
            params: vec![],
            return_type: TypeAnnotation::Int,
            declarations: vec![],
            body: vec![Stmt::If {
                cond: Expr::Literal(Literal::Boolean(true)),
                then_body: vec![Stmt::Return(Some(Expr::Literal(Literal::Integer(1))))],
                else_body: vec![Stmt::Return(Some(Expr::Literal(Literal::Integer(2))))],
            }],
        };
        let program = Program {
            declarations: vec![Declaration::FuncDef(f)],
            statements: vec![],
        };
        let text = compiled(&program);
        assert!(text.contains("beqz t0, label_"));
        assert!(text.matches("jr ra").count() >= 2);
    }

    #[test]
    fn binary_add_boxes_a_fresh_int() {
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
            statements: vec![],
        };
        let text = compiled(&program);
        assert!(text.contains("add t3, t1, t2"));
        assert!(text.contains("jal $alloc"));
    }

    #[test]
    fn constructor_call_allocates_then_calls_init() {
        let program = Program {
            declarations: vec![Declaration::ClassDef(ClassDef {
                name: "C".to_string(),
                super_class: "object".to_string(),
                attributes: vec![],
                methods: vec![],
            })],
            statements: vec![Stmt::Expr(Expr::Call {
                callee: "C".to_string(),
                args: vec![],
            })],
        };
        let text = compiled(&program);
        assert!(text.contains("jal $alloc"));
        assert!(text.contains("jal $object.__init__"));
    }

    #[test]
    fn nested_function_nonlocal_write_walks_one_static_link_hop() {
        let outer = FuncDef {
            name: "outer".to_string(),
            params: vec![],
            return_type: TypeAnnotation::None,
            declarations: vec![
                Declaration::VarDef(VarDecl {
                    name: "x".to_string(),
                    type_ann: TypeAnnotation::Int,
                    init: Literal::Integer(0),
                }),
                Declaration::FuncDef(FuncDef {
                    name: "inner".to_string(),
                    params: vec![],
                    return_type: TypeAnnotation::None,
                    declarations: vec![Declaration::NonLocalDecl("x".to_string())],
                    body: vec![
                        Stmt::Assign {
                            target: AssignTarget::Identifier("x".to_string()),
                            value: Expr::Literal(Literal::Integer(1)),
                        },
                        Stmt::Pass,
                    ],
                }),
            ],
            body: vec![Stmt::Pass],
        };
        let program = Program {
            declarations: vec![Declaration::FuncDef(outer)],
            statements: vec![],
        };
        let text = compiled(&program);
        assert!(text.contains("mv t0, fp"));
        assert!(text.contains("lw t0, -4(t0)"));
    }

    #[test]
    fn method_call_dispatches_through_receivers_table() {
        let program = Program {
            declarations: vec![Declaration::ClassDef(ClassDef {
                name: "C".to_string(),
                super_class: "object".to_string(),
                attributes: vec![],
                methods: vec![FuncDef {
                    name: "m".to_string(),
                    params: vec![Param { name: "self".to_string(), type_ann: TypeAnnotation::ClassName("C".to_string()) }],
                    return_type: TypeAnnotation::None,
                    declarations: vec![],
                    body: vec![Stmt::Pass],
                }],
            })],
            statements: vec![Stmt::Expr(Expr::MethodCall {
                receiver: Box::new(Expr::Call { callee: "C".to_string(), args: vec![] }),
                receiver_type: "C".to_string(),
                method: "m".to_string(),
                args: vec![],
            })],
        };
        let text = compiled(&program);
        assert!(text.contains("dispatchTable"));
        assert!(text.contains("jalr ra, 0(t2)"));
    }
}
