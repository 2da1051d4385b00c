//! Predefined classes and functions.
//!
//! Installed once, before any user declaration is analyzed, by
//! `Analyzer::new()`. Type tags are issued from the same counter used for
//! user classes, so `object` is always tag 0 and user classes continue
//! numbering from wherever the predefined set left off, except the
//! internal `.list` pseudo-class, whose tag is the fixed sentinel `-1` and
//! is never run through the counter.

use crate::descriptors::{AttrInfo, ClassId, ClassInfo, FuncId, FuncInfo, MethodSlot, LIST_TYPE_TAG};
use crate::label::user_label;

/// Names of the four functions whose bodies are fixed runtime routines
/// rather than user/AST-derived code. `object.__init__` is a method, not a
/// global function, but shares the same "analyzer seeds the emitter
/// directly" treatment.
pub const BUILTIN_FUNC_NAMES: &[&str] = &["object.__init__", "print", "len", "input"];

pub fn is_builtin_function(qualified_name: &str) -> bool {
    BUILTIN_FUNC_NAMES.contains(&qualified_name)
}

pub fn install(az: &mut crate::analyzer::Analyzer) {
    let object_id = install_object(az);
    install_int(az, object_id);
    install_bool(az, object_id);
    install_str(az, object_id);
    install_list(az, object_id);
    install_global_function(az, "print", &["arg"]);
    install_global_function(az, "len", &["arg"]);
    install_global_function(az, "input", &[]);
}

fn new_func(
    az: &mut crate::analyzer::Analyzer,
    qualified_name: &str,
    container: Option<ClassId>,
    extra_params: &[&str],
) -> FuncId {
    let own_table = az.graph.tables.create(Some(az.graph.global_table));
    let func_id = FuncId(az.graph.funcs.len());
    let mut params: Vec<String> = Vec::new();
    if container.is_some() {
        params.push("self".to_string());
    }
    params.extend(extra_params.iter().map(|s| s.to_string()));
    az.graph.funcs.push(FuncInfo {
        qualified_name: qualified_name.to_string(),
        depth: 0,
        params: params.clone(),
        locals: Vec::new(),
        code_label: user_label(qualified_name),
        parent_func: None,
        container,
        own_table,
    });
    // Every parameter (including `self`) resolves like any other through
    // the function's own table, even though the fixed built-in routines in
    // `backend::runtime` never look theirs up by name.
    for p in &params {
        az.graph.tables.bind(
            own_table,
            p,
            crate::descriptors::SymbolInfo::StackVar(func_id),
        );
    }
    az.graph.functions_order.push(func_id);
    func_id
}

fn install_object(az: &mut crate::analyzer::Analyzer) -> ClassId {
    let tag = az.fresh_type_tag();
    debug_assert_eq!(tag, 0, "object must be the first class, tag 0");
    let class_id = ClassId(az.graph.classes.len());
    az.graph.classes.push(ClassInfo {
        name: "object".to_string(),
        type_tag: tag,
        super_class: None,
        attributes: Vec::new(),
        methods: Vec::new(),
        prototype_label: user_label("object$prototype"),
        dispatch_table_label: Some(user_label("object$dispatchTable")),
    });
    az.graph
        .tables
        .bind(az.graph.global_table, "object", crate::descriptors::SymbolInfo::Class(class_id));
    az.graph.class_by_name.insert("object".to_string(), class_id);

    let init_func = new_func(az, "object.__init__", Some(class_id), &[]);
    az.graph.classes[class_id.0].methods.push(MethodSlot {
        name: "__init__".to_string(),
        func: init_func,
    });
    class_id
}

fn install_int(az: &mut crate::analyzer::Analyzer, object_id: ClassId) -> ClassId {
    simple_subclass(az, object_id, "int", &[("__int__", None)])
}

fn install_bool(az: &mut crate::analyzer::Analyzer, object_id: ClassId) -> ClassId {
    simple_subclass(az, object_id, "bool", &[("__bool__", None)])
}

fn install_str(az: &mut crate::analyzer::Analyzer, object_id: ClassId) -> ClassId {
    let zero = az.constants.get_int_constant(0);
    let class_id = ClassId(az.graph.classes.len());
    az.graph.classes.push(ClassInfo {
        name: "str".to_string(),
        type_tag: az.fresh_type_tag(),
        super_class: Some(object_id),
        attributes: vec![
            AttrInfo { name: "__len__".to_string(), init_label: Some(zero) },
            AttrInfo { name: "__str__".to_string(), init_label: None },
        ],
        methods: az.graph.classes[object_id.0].methods.clone(),
        prototype_label: user_label("str$prototype"),
        dispatch_table_label: Some(user_label("str$dispatchTable")),
    });
    az.graph
        .tables
        .bind(az.graph.global_table, "str", crate::descriptors::SymbolInfo::Class(class_id));
    az.graph.class_by_name.insert("str".to_string(), class_id);
    class_id
}

fn install_list(az: &mut crate::analyzer::Analyzer, object_id: ClassId) -> ClassId {
    let class_id = ClassId(az.graph.classes.len());
    az.graph.classes.push(ClassInfo {
        name: ".list".to_string(),
        type_tag: LIST_TYPE_TAG,
        super_class: Some(object_id),
        attributes: vec![AttrInfo {
            name: "__len__".to_string(),
            init_label: None,
        }],
        methods: az.graph.classes[object_id.0].methods.clone(),
        prototype_label: user_label(".list$prototype"),
        // No dispatch table is emitted for `.list` (§3, §9).
        dispatch_table_label: None,
    });
    az.graph
        .tables
        .bind(az.graph.global_table, ".list", crate::descriptors::SymbolInfo::Class(class_id));
    az.graph.class_by_name.insert(".list".to_string(), class_id);
    class_id
}

fn simple_subclass(
    az: &mut crate::analyzer::Analyzer,
    object_id: ClassId,
    name: &str,
    attrs: &[(&str, Option<i64>)],
) -> ClassId {
    let attributes = attrs
        .iter()
        .map(|(n, init)| AttrInfo {
            name: n.to_string(),
            init_label: init.map(|v| az.constants.get_int_constant(v)),
        })
        .collect();
    let class_id = ClassId(az.graph.classes.len());
    az.graph.classes.push(ClassInfo {
        name: name.to_string(),
        type_tag: az.fresh_type_tag(),
        super_class: Some(object_id),
        attributes,
        methods: az.graph.classes[object_id.0].methods.clone(),
        prototype_label: user_label(&format!("{name}$prototype")),
        dispatch_table_label: Some(user_label(&format!("{name}$dispatchTable"))),
    });
    az.graph
        .tables
        .bind(az.graph.global_table, name, crate::descriptors::SymbolInfo::Class(class_id));
    az.graph.class_by_name.insert(name.to_string(), class_id);
    class_id
}

fn install_global_function(az: &mut crate::analyzer::Analyzer, name: &str, params: &[&str]) {
    let func_id = new_func(az, name, None, params);
    az.graph
        .tables
        .bind(az.graph.global_table, name, crate::descriptors::SymbolInfo::Func(func_id));
}

#[cfg(test)]
mod tests {
    use crate::analyzer::Analyzer;
    use crate::descriptors::LIST_TYPE_TAG;

    #[test]
    fn list_has_no_dispatch_table_but_object_does() {
        let az = Analyzer::new();
        let list_id = az.class_id_by_name(".list").unwrap();
        let object_id = az.object_class_id();
        assert_eq!(az.graph.classes[list_id.0].type_tag, LIST_TYPE_TAG);
        assert!(az.graph.classes[list_id.0].dispatch_table_label.is_none());
        assert!(az.graph.classes[object_id.0].dispatch_table_label.is_some());
    }

    #[test]
    fn list_and_str_share_len_attribute_index() {
        let az = Analyzer::new();
        let list_id = az.class_id_by_name(".list").unwrap();
        let str_id = az.class_id_by_name("str").unwrap();
        assert_eq!(az.graph.classes[list_id.0].attr_index("__len__"), Some(0));
        assert_eq!(az.graph.classes[str_id.0].attr_index("__len__"), Some(0));
    }

    #[test]
    fn builtin_functions_are_bound_globally() {
        let az = Analyzer::new();
        for name in ["print", "len", "input"] {
            assert!(matches!(
                az.graph.tables.lookup(az.graph.global_table, name),
                Some(crate::descriptors::SymbolInfo::Func(_))
            ));
        }
    }
}
