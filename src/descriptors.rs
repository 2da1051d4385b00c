//! The descriptor model: `ClassInfo`, `FuncInfo`, `AttrInfo`,
//! `StackVarInfo`, `GlobalVarInfo`, and the `SymbolInfo` tagged sum that
//! unifies them for symbol-table lookups.
//!
//! A class hierarchy over these descriptor kinds would need `Rc`/`RefCell`
//! or similar to express the cross-references below; instead they are a
//! tagged sum over descriptors stored in flat arenas. Cross-references
//! (`FuncInfo.parent_func`, `StackVarInfo.owner`, `ClassInfo.super_class`)
//! are indices into those arenas, not owning pointers, so they cannot form
//! a reference cycle: nothing here owns anything by reference.

use crate::label::Label;
use crate::symbol_table::SymbolTableId;

/// Index into `Analyzer::classes`. `object`'s id is always `ClassId(0)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(pub usize);

/// Index into `Analyzer::funcs`. Global functions and methods share this
/// arena; only `FuncInfo.container`/`FuncInfo.parent_func` distinguish them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuncId(pub usize);

/// Index into `Analyzer::globals`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GlobalId(pub usize);

/// Type tag reserved for the internal `.list` pseudo-class.
pub const LIST_TYPE_TAG: i32 = -1;

/// One entry in a class's ordered attribute list.
#[derive(Debug, Clone, PartialEq)]
pub struct AttrInfo {
    pub name: String,
    pub init_label: Option<Label>,
}

/// One entry in a class's ordered method list: the method's name as looked
/// up (unqualified) paired with the `FuncInfo` implementing it.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodSlot {
    pub name: String,
    pub func: FuncId,
}

#[derive(Debug, Clone)]
pub struct ClassInfo {
    pub name: String,
    /// Non-negative and unique, except the internal `.list` pseudo-class
    /// whose tag is `LIST_TYPE_TAG` (-1).
    pub type_tag: i32,
    /// `None` only for `object`.
    pub super_class: Option<ClassId>,
    /// Begins with a copy of the superclass's attributes in the same
    /// order; appending a duplicate name overrides the inherited slot at
    /// the same index, so indices are stable across subclasses.
    pub attributes: Vec<AttrInfo>,
    /// Same stability guarantee as `attributes`, for methods.
    pub methods: Vec<MethodSlot>,
    pub prototype_label: Label,
    /// `None` suppresses dispatch-table emission (only `.list`).
    pub dispatch_table_label: Option<Label>,
}

impl ClassInfo {
    /// `objectSize` in words: header (3) plus one word per attribute.
    pub fn object_size_words(&self) -> u32 {
        3 + self.attributes.len() as u32
    }

    pub fn attr_index(&self, name: &str) -> Option<usize> {
        self.attributes.iter().position(|a| a.name == name)
    }

    pub fn method_index(&self, name: &str) -> Option<usize> {
        self.methods.iter().position(|m| m.name == name)
    }
}

/// A parameter or local variable's flat slot in a function's activation
/// record.
#[derive(Debug, Clone, PartialEq)]
pub struct StackVarInfo {
    pub name: String,
    pub init_label: Option<Label>,
    pub owner: FuncId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlobalVarInfo {
    pub name: String,
    pub init_label: Option<Label>,
    pub storage_label: Label,
}

#[derive(Debug, Clone)]
pub struct FuncInfo {
    /// Fully-qualified dotted name, e.g. `C.m`, `outer.inner`, or a bare
    /// global function name.
    pub qualified_name: String,
    /// 0 for globals and methods, `d+1` for a function nested in a
    /// function of depth `d`.
    pub depth: u32,
    /// Ordered parameter names, occupying indices `0..N-1` of the
    /// activation record.
    pub params: Vec<String>,
    /// Ordered local-variable descriptors, occupying indices `N..N+K-1`.
    pub locals: Vec<StackVarInfo>,
    pub code_label: Label,
    /// `Some` only for nested functions.
    pub parent_func: Option<FuncId>,
    /// `Some` only for methods (the class they belong to).
    pub container: Option<ClassId>,
    /// The symbol table this function's own parameters and locals are bound
    /// in, parented to its enclosing function's (or the global) table. The
    /// back-end resolves every `Identifier` it lowers by looking this table
    /// up through `SymbolTableArena::lookup`.
    pub own_table: SymbolTableId,
}

impl FuncInfo {
    /// Flat activation-record index of a parameter or local; `None` if
    /// `name` is neither (e.g. it resolves through an outer scope instead).
    pub fn var_index(&self, name: &str) -> Option<usize> {
        if let Some(i) = self.params.iter().position(|p| p == name) {
            return Some(i);
        }
        self.locals
            .iter()
            .position(|l| l.name == name)
            .map(|i| self.params.len() + i)
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn frame_size(&self) -> usize {
        self.params.len() + self.locals.len()
    }
}

/// The tagged sum a `SymbolTable` lookup returns. Consumers match on the
/// variant instead of relying on inheritance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolInfo {
    Class(ClassId),
    Func(FuncId),
    StackVar(FuncId),
    GlobalVar(GlobalId),
    Attr(ClassId, usize),
}
