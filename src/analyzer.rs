//! The analyzer: walks the AST once and populates the descriptor graph and
//! a chain of symbol tables.
//!
//! Precondition: the input AST has already passed semantic type-checking;
//! scoping, shadowing, return types and inheritance are assumed valid. The
//! analyzer asserts structural invariants it depends on (superclass exists,
//! `global`/`nonlocal` targets resolve, no duplicate qualified name) via
//! `CoreError::Bug` rather than re-validating the program; a failure here is
//! a compiler bug, never a user diagnostic.

use crate::ast::{ClassDef, Declaration, FuncDef, Program};
use crate::constant_pool::ConstantPool;
use crate::descriptors::{
    AttrInfo, ClassId, FuncId, FuncInfo, GlobalId, GlobalVarInfo, MethodSlot, StackVarInfo,
    SymbolInfo,
};
use crate::error::{CoreError, CoreResult};
use crate::graph::DescriptorGraph;
use crate::label::{LabelFactory, user_label};
use crate::symbol_table::{SymbolTableArena, SymbolTableId};
use std::collections::{HashMap, HashSet};

pub struct Analyzer {
    pub graph: DescriptorGraph,
    pub constants: ConstantPool,
    pub labels: LabelFactory,
    next_type_tag: i32,
    qualified_func_names: HashSet<String>,
}

impl Analyzer {
    pub fn new() -> Self {
        let mut tables = SymbolTableArena::new();
        let global_table = tables.create(None);
        let mut analyzer = Analyzer {
            graph: DescriptorGraph {
                classes: Vec::new(),
                funcs: Vec::new(),
                globals: Vec::new(),
                functions_order: Vec::new(),
                tables,
                global_table,
                top_level_statements: Vec::new(),
                bodies: HashMap::new(),
                class_by_name: HashMap::new(),
            },
            constants: ConstantPool::new(),
            labels: LabelFactory::new(),
            next_type_tag: 0,
            qualified_func_names: HashSet::new(),
        };
        crate::predefined::install(&mut analyzer);
        analyzer
    }

    pub fn object_class_id(&self) -> ClassId {
        self.graph.object_class_id()
    }

    pub fn class_id_by_name(&self, name: &str) -> Option<ClassId> {
        self.graph.class_id_by_name(name)
    }

    pub(crate) fn fresh_type_tag(&mut self) -> i32 {
        let t = self.next_type_tag;
        self.next_type_tag += 1;
        t
    }

    /// Run the full two-pass analysis over a program.
    pub fn analyze_program(&mut self, program: &Program) -> CoreResult<()> {
        self.pass1_globals(&program.declarations)?;
        self.pass2_classes_and_functions(&program.declarations)?;
        self.graph.top_level_statements = program.statements.clone();
        Ok(())
    }

    /// P1: globals are bound before any function body is analyzed, so
    /// nested `global x` declarations resolve.
    fn pass1_globals(&mut self, declarations: &[Declaration]) -> CoreResult<()> {
        for decl in declarations {
            if let Declaration::VarDef(v) = decl {
                let init_label = self.constants.from_literal(&v.init);
                let id = GlobalId(self.graph.globals.len());
                self.graph.globals.push(GlobalVarInfo {
                    name: v.name.clone(),
                    init_label,
                    storage_label: user_label(&v.name),
                });
                self.graph
                    .tables
                    .bind(self.graph.global_table, &v.name, SymbolInfo::GlobalVar(id));
            }
        }
        Ok(())
    }

    /// P2: classes and global functions.
    fn pass2_classes_and_functions(&mut self, declarations: &[Declaration]) -> CoreResult<()> {
        for decl in declarations {
            match decl {
                Declaration::ClassDef(cd) => {
                    self.analyze_class(cd)?;
                }
                Declaration::FuncDef(fd) => {
                    let global_table = self.graph.global_table;
                    self.analyze_function(fd, None, 0, global_table, None)?;
                }
                Declaration::VarDef(_) | Declaration::GlobalDecl(_) | Declaration::NonLocalDecl(_) => {
                    // Handled in pass 1, or meaningless at top level.
                }
            }
        }
        Ok(())
    }

    fn analyze_class(&mut self, cd: &ClassDef) -> CoreResult<ClassId> {
        let super_id = self.graph.class_by_name.get(&cd.super_class).copied().ok_or_else(|| {
            CoreError::Bug(format!(
                "class '{}' declares unknown superclass '{}'",
                cd.name, cd.super_class
            ))
        })?;
        let tag = self.fresh_type_tag();
        let (inherited_attrs, inherited_methods) = {
            let sup = &self.graph.classes[super_id.0];
            (sup.attributes.clone(), sup.methods.clone())
        };

        let class_id = ClassId(self.graph.classes.len());
        self.graph.classes.push(crate::descriptors::ClassInfo {
            name: cd.name.clone(),
            type_tag: tag,
            super_class: Some(super_id),
            attributes: inherited_attrs,
            methods: inherited_methods,
            prototype_label: user_label(&format!("{}$prototype", cd.name)),
            dispatch_table_label: Some(user_label(&format!("{}$dispatchTable", cd.name))),
        });
        self.graph.class_by_name.insert(cd.name.clone(), class_id);
        let global_table = self.graph.global_table;
        self.graph
            .tables
            .bind(global_table, &cd.name, SymbolInfo::Class(class_id));

        for attr in &cd.attributes {
            let init_label = self.constants.from_literal(&attr.init);
            self.append_or_override_attr(class_id, &attr.name, init_label);
        }

        for method in &cd.methods {
            let func_id = self.analyze_function(method, Some(class_id), 0, global_table, None)?;
            self.append_or_override_method(class_id, &method.name, func_id);
        }

        Ok(class_id)
    }

    /// Appending an attribute with a duplicate name overrides the inherited
    /// slot at the same index; this is what keeps attribute indexes stable
    /// across subclasses.
    fn append_or_override_attr(&mut self, class_id: ClassId, name: &str, init_label: Option<crate::label::Label>) {
        let class = &mut self.graph.classes[class_id.0];
        if let Some(existing) = class.attributes.iter_mut().find(|a| a.name == name) {
            existing.init_label = init_label;
        } else {
            class.attributes.push(AttrInfo {
                name: name.to_string(),
                init_label,
            });
        }
    }

    /// Same stability guarantee as `append_or_override_attr`, for methods.
    fn append_or_override_method(&mut self, class_id: ClassId, name: &str, func_id: FuncId) {
        let class = &mut self.graph.classes[class_id.0];
        if let Some(existing) = class.methods.iter_mut().find(|m| m.name == name) {
            existing.func = func_id;
        } else {
            class.methods.push(MethodSlot {
                name: name.to_string(),
                func: func_id,
            });
        }
    }

    /// Recursive function analysis (§4.3): computes the qualified name,
    /// creates the `FuncInfo` and its chained symbol table, then runs
    /// Phases A-D.
    fn analyze_function(
        &mut self,
        fd: &FuncDef,
        container: Option<ClassId>,
        depth: u32,
        parent_table: SymbolTableId,
        parent_func: Option<FuncId>,
    ) -> CoreResult<FuncId> {
        let qualified_name = match container {
            Some(cid) => format!("{}.{}", self.graph.classes[cid.0].name, fd.name),
            None => match parent_func {
                Some(pf) => format!("{}.{}", self.graph.funcs[pf.0].qualified_name, fd.name),
                None => fd.name.clone(),
            },
        };
        if !self.qualified_func_names.insert(qualified_name.clone()) {
            return Err(CoreError::Bug(format!(
                "duplicate fully-qualified function name '{qualified_name}'"
            )));
        }

        let own_table = self.graph.tables.create(Some(parent_table));
        let func_id = FuncId(self.graph.funcs.len());
        self.graph.funcs.push(FuncInfo {
            qualified_name: qualified_name.clone(),
            depth,
            params: Vec::new(),
            locals: Vec::new(),
            code_label: user_label(&qualified_name),
            parent_func,
            container,
            own_table,
        });

        // A global function or a nested (non-method) function is callable
        // by bare name through the scope chain; a method is dispatched
        // structurally through its class's method list instead.
        if container.is_none() {
            self.graph.tables.bind(parent_table, &fd.name, SymbolInfo::Func(func_id));
        }
        self.graph.functions_order.push(func_id);

        tracing::debug!(func = %qualified_name, depth, "analyzing function");

        // Phase A: parameters and local-variable declarations, in source order.
        for p in &fd.params {
            self.graph.funcs[func_id.0].params.push(p.name.clone());
            self.graph
                .tables
                .bind(own_table, &p.name, SymbolInfo::StackVar(func_id));
        }
        for decl in &fd.declarations {
            if let Declaration::VarDef(v) = decl {
                let init_label = self.constants.from_literal(&v.init);
                self.graph.funcs[func_id.0].locals.push(StackVarInfo {
                    name: v.name.clone(),
                    init_label,
                    owner: func_id,
                });
                self.graph
                    .tables
                    .bind(own_table, &v.name, SymbolInfo::StackVar(func_id));
            }
        }

        // Phase B: `global`/`nonlocal` declarations.
        for decl in &fd.declarations {
            match decl {
                Declaration::GlobalDecl(name) => {
                    let global_info = self.graph.tables.lookup(self.graph.global_table, name);
                    match global_info {
                        Some(info @ SymbolInfo::GlobalVar(_)) => {
                            self.graph.tables.bind(own_table, name, info);
                        }
                        _ => {
                            return Err(CoreError::Bug(format!(
                                "'global {name}' in '{qualified_name}' does not resolve to a global variable"
                            )));
                        }
                    }
                }
                Declaration::NonLocalDecl(name) => {
                    // No new binding: the name must already resolve through
                    // the parent chain to a StackVarInfo, and lookups
                    // naturally fall through to it.
                    match self.graph.tables.lookup(parent_table, name) {
                        Some(SymbolInfo::StackVar(_)) => {}
                        _ => {
                            return Err(CoreError::Bug(format!(
                                "'nonlocal {name}' in '{qualified_name}' does not resolve to an enclosing local"
                            )));
                        }
                    }
                }
                _ => {}
            }
        }

        // Phase C: nested function definitions.
        for decl in &fd.declarations {
            if let Declaration::FuncDef(nested) = decl {
                self.analyze_function(nested, None, depth + 1, own_table, Some(func_id))?;
            }
        }

        // Phase D: attach the statement body. The body stays addressable by
        // `FuncId` in the graph so the back-end hook can look it up without
        // the AST's own declaration tree.
        self.graph.bodies.insert(func_id, fd.body.clone());

        Ok(func_id)
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::*;

    fn int_var(name: &str, v: i64) -> VarDecl {
        VarDecl {
            name: name.to_string(),
            type_ann: TypeAnnotation::Int,
            init: Literal::Integer(v),
        }
    }

    #[test]
    fn object_tag_is_zero_and_predefined_classes_exist() {
        let az = Analyzer::new();
        assert_eq!(az.graph.classes[az.object_class_id().0].type_tag, 0);
        assert!(az.class_id_by_name("int").is_some());
        assert!(az.class_id_by_name("bool").is_some());
        assert!(az.class_id_by_name("str").is_some());
    }

    #[test]
    fn global_var_def_binds_into_global_table() {
        let mut az = Analyzer::new();
        let program = Program {
            declarations: vec![Declaration::VarDef(int_var("x", 5))],
            statements: vec![],
        };
        az.analyze_program(&program).unwrap();
        assert_eq!(az.graph.globals.len(), 1);
        assert_eq!(
            az.graph.tables.lookup(az.graph.global_table, "x"),
            Some(SymbolInfo::GlobalVar(GlobalId(0)))
        );
    }

    #[test]
    fn attribute_index_is_stable_across_subclasses() {
        let mut az = Analyzer::new();
        let base = ClassDef {
            name: "A".to_string(),
            super_class: "object".to_string(),
            attributes: vec![int_var("x", 1)],
            methods: vec![],
        };
        let derived = ClassDef {
            name: "B".to_string(),
            super_class: "A".to_string(),
            attributes: vec![int_var("y", 2)],
            methods: vec![],
        };
        let program = Program {
            declarations: vec![Declaration::ClassDef(base), Declaration::ClassDef(derived)],
            statements: vec![],
        };
        az.analyze_program(&program).unwrap();

        let a = az.class_id_by_name("A").unwrap();
        let b = az.class_id_by_name("B").unwrap();
        assert_eq!(az.graph.classes[a.0].attr_index("x"), Some(0));
        assert_eq!(az.graph.classes[b.0].attr_index("x"), Some(0));
        assert_eq!(az.graph.classes[b.0].attr_index("y"), Some(1));
    }

    #[test]
    fn overriding_attribute_keeps_the_same_index() {
        let mut az = Analyzer::new();
        let base = ClassDef {
            name: "A".to_string(),
            super_class: "object".to_string(),
            attributes: vec![int_var("x", 1)],
            methods: vec![],
        };
        let derived = ClassDef {
            name: "B".to_string(),
            super_class: "A".to_string(),
            attributes: vec![int_var("x", 99)],
            methods: vec![],
        };
        let program = Program {
            declarations: vec![Declaration::ClassDef(base), Declaration::ClassDef(derived)],
            statements: vec![],
        };
        az.analyze_program(&program).unwrap();
        let b = az.class_id_by_name("B").unwrap();
        assert_eq!(az.graph.classes[b.0].attributes.len(), 1);
        assert_eq!(az.graph.classes[b.0].attr_index("x"), Some(0));
    }

    #[test]
    fn activation_record_indexing_matches_params_then_locals() {
        let mut az = Analyzer::new();
        let f = FuncDef {
            name: "f".to_string(),
            params: vec![
                Param { name: "a".to_string(), type_ann: TypeAnnotation::Int },
                Param { name: "b".to_string(), type_ann: TypeAnnotation::Int },
            ],
            return_type: TypeAnnotation::Int,
            declarations: vec![Declaration::VarDef(int_var("c", 0))],
            body: vec![Stmt::Return(None)],
        };
        let program = Program {
            declarations: vec![Declaration::FuncDef(f)],
            statements: vec![],
        };
        az.analyze_program(&program).unwrap();
        let fid = match az.graph.tables.lookup(az.graph.global_table, "f") {
            Some(SymbolInfo::Func(id)) => id,
            other => panic!("expected Func, got {other:?}"),
        };
        let finfo = &az.graph.funcs[fid.0];
        assert_eq!(finfo.var_index("a"), Some(0));
        assert_eq!(finfo.var_index("b"), Some(1));
        assert_eq!(finfo.var_index("c"), Some(2));
    }

    #[test]
    fn nested_function_depth_and_parent_are_recorded() {
        let mut az = Analyzer::new();
        let inner = FuncDef {
            name: "inner".to_string(),
            params: vec![],
            return_type: TypeAnnotation::None,
            declarations: vec![Declaration::NonLocalDecl("x".to_string())],
            body: vec![Stmt::Assign {
                target: AssignTarget::Identifier("x".to_string()),
                value: Expr::Literal(Literal::Integer(1)),
            }],
        };
        let outer = FuncDef {
            name: "outer".to_string(),
            params: vec![],
            return_type: TypeAnnotation::None,
            declarations: vec![
                Declaration::VarDef(int_var("x", 0)),
                Declaration::FuncDef(inner),
            ],
            body: vec![Stmt::Pass],
        };
        let program = Program {
            declarations: vec![Declaration::FuncDef(outer)],
            statements: vec![],
        };
        az.analyze_program(&program).unwrap();

        let outer_id = match az.graph.tables.lookup(az.graph.global_table, "outer") {
            Some(SymbolInfo::Func(id)) => id,
            other => panic!("expected Func, got {other:?}"),
        };
        assert_eq!(az.graph.funcs[outer_id.0].depth, 0);

        let inner_info = az.graph.funcs.iter().find(|f| f.qualified_name == "outer.inner").unwrap();
        assert_eq!(inner_info.depth, 1);
        assert_eq!(inner_info.parent_func, Some(outer_id));
    }

    #[test]
    fn duplicate_qualified_function_name_is_a_bug() {
        let mut az = Analyzer::new();
        let f1 = FuncDef {
            name: "f".to_string(),
            params: vec![],
            return_type: TypeAnnotation::None,
            declarations: vec![],
            body: vec![Stmt::Pass],
        };
        let f2 = f1.clone();
        let program = Program {
            declarations: vec![Declaration::FuncDef(f1), Declaration::FuncDef(f2)],
            statements: vec![],
        };
        assert!(az.analyze_program(&program).is_err());
    }
}
