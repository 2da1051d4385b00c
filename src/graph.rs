//! The descriptor graph: the read-only product of analysis that every later
//! pass (layout emission, code generation) consumes without mutating.
//!
//! Split out from `Analyzer` so code generation can hold an immutable
//! borrow of the whole graph alongside *mutable* borrows of the label
//! factory and constant pool, both of which still grow during emission (fresh
//! branch labels, literals interned from statements the back-end is
//! lowering). Disjoint fields on `Analyzer`, not interior mutability.

use crate::ast::Stmt;
use crate::descriptors::{ClassId, ClassInfo, FuncId, FuncInfo, GlobalVarInfo};
use crate::symbol_table::{SymbolTableArena, SymbolTableId};
use std::collections::HashMap;

pub struct DescriptorGraph {
    pub classes: Vec<ClassInfo>,
    pub funcs: Vec<FuncInfo>,
    pub globals: Vec<GlobalVarInfo>,
    /// Emission order for `spec.md` §4.5 step 7: predefined builtins first
    /// (installed at construction), then every class method, global
    /// function, and nested function in the order analysis encounters it.
    pub functions_order: Vec<FuncId>,
    pub tables: SymbolTableArena,
    pub global_table: SymbolTableId,
    pub top_level_statements: Vec<Stmt>,
    /// A function's statement body, keyed by its `FuncId`. Builtins have no
    /// entry; their bodies are the fixed routines of `backend::runtime`.
    pub bodies: HashMap<FuncId, Vec<Stmt>>,
    pub(crate) class_by_name: HashMap<String, ClassId>,
}

impl DescriptorGraph {
    pub fn object_class_id(&self) -> ClassId {
        self.class_by_name["object"]
    }

    pub fn class_id_by_name(&self, name: &str) -> Option<ClassId> {
        self.class_by_name.get(name).copied()
    }

    /// `&[]` for a builtin or any other function with no recorded body.
    pub fn body_of(&self, func: FuncId) -> &[Stmt] {
        self.bodies.get(&func).map(Vec::as_slice).unwrap_or(&[])
    }
}
