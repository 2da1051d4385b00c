//! Scope-chained symbol tables.
//!
//! The global table is created before class/function analysis; every
//! function owns a table whose parent is its containing function's table
//! (or the global table). Lookups walk the parent chain. Parent links are
//! arena indices (`SymbolTableId`), not owning pointers, consistent with
//! the non-cyclic-by-construction scheme in `descriptors.rs`.

use crate::descriptors::SymbolInfo;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolTableId(pub usize);

#[derive(Debug, Default)]
pub struct SymbolTable {
    pub parent: Option<SymbolTableId>,
    bindings: HashMap<String, SymbolInfo>,
}

impl SymbolTable {
    pub fn new(parent: Option<SymbolTableId>) -> Self {
        SymbolTable {
            parent,
            bindings: HashMap::new(),
        }
    }

    /// Bind `name` in this scope, shadowing any outer binding. Used both
    /// for fresh declarations and for `global x` rebinding an existing
    /// `GlobalVarInfo` into a function's own table (§4.3 Phase B).
    pub fn bind(&mut self, name: impl Into<String>, info: SymbolInfo) {
        self.bindings.insert(name.into(), info);
    }

    pub fn local_lookup(&self, name: &str) -> Option<SymbolInfo> {
        self.bindings.get(name).copied()
    }
}

/// The arena of all symbol tables created during analysis, plus chain
/// lookup.
#[derive(Debug, Default)]
pub struct SymbolTableArena {
    tables: Vec<SymbolTable>,
}

impl SymbolTableArena {
    pub fn new() -> Self {
        SymbolTableArena { tables: Vec::new() }
    }

    pub fn create(&mut self, parent: Option<SymbolTableId>) -> SymbolTableId {
        let id = SymbolTableId(self.tables.len());
        self.tables.push(SymbolTable::new(parent));
        id
    }

    pub fn get(&self, id: SymbolTableId) -> &SymbolTable {
        &self.tables[id.0]
    }

    pub fn get_mut(&mut self, id: SymbolTableId) -> &mut SymbolTable {
        &mut self.tables[id.0]
    }

    pub fn bind(&mut self, id: SymbolTableId, name: impl Into<String>, info: SymbolInfo) {
        self.tables[id.0].bind(name, info);
    }

    /// Resolve `name` by walking `id`'s parent chain outward. This is the
    /// sole name-resolution mechanism in the crate: every reference in a
    /// function body must resolve through exactly one such walk.
    pub fn lookup(&self, id: SymbolTableId, name: &str) -> Option<SymbolInfo> {
        let mut cur = Some(id);
        while let Some(tid) = cur {
            let table = &self.tables[tid.0];
            if let Some(info) = table.local_lookup(name) {
                return Some(info);
            }
            cur = table.parent;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptors::{ClassId, FuncId};

    #[test]
    fn lookup_walks_parent_chain() {
        let mut arena = SymbolTableArena::new();
        let global = arena.create(None);
        arena.bind(global, "x", SymbolInfo::Func(FuncId(0)));

        let inner = arena.create(Some(global));
        assert_eq!(arena.lookup(inner, "x"), Some(SymbolInfo::Func(FuncId(0))));
    }

    #[test]
    fn inner_binding_shadows_outer() {
        let mut arena = SymbolTableArena::new();
        let global = arena.create(None);
        arena.bind(global, "x", SymbolInfo::Class(ClassId(1)));

        let inner = arena.create(Some(global));
        arena.bind(inner, "x", SymbolInfo::Func(FuncId(2)));

        assert_eq!(arena.lookup(inner, "x"), Some(SymbolInfo::Func(FuncId(2))));
        assert_eq!(arena.lookup(global, "x"), Some(SymbolInfo::Class(ClassId(1))));
    }

    #[test]
    fn unresolved_name_returns_none() {
        let mut arena = SymbolTableArena::new();
        let global = arena.create(None);
        assert_eq!(arena.lookup(global, "missing"), None);
    }
}
