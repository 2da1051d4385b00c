//! The layout emitter: prototype objects, dispatch tables, global-variable
//! cells, and the constant-pool flush, the fixed `.data` section steps of
//! the compilation pipeline.
//!
//! Every function here is a pure reader of the descriptor graph and constant
//! pool built by `Analyzer`; none of them mutate anything. They take the
//! graph and pool by separate reference (rather than the whole `Analyzer`)
//! because `backend::program` needs to hold a mutable borrow of the
//! constant pool alongside an immutable borrow of the graph while it drives
//! code generation; splitting the fields here is what keeps that legal.
//! Ordering is insertion order throughout (`graph.classes`, `graph.globals`,
//! and the pool's own insertion-ordered iterators), which is what makes two
//! runs over the same AST byte-identical.

use crate::asm::{AsmEmitter, Word};
use crate::constant_pool::ConstantPool;
use crate::graph::DescriptorGraph;
use std::fmt;

/// Step 2: one prototype object per class, in insertion order. Each is four
/// header-shaped fields (type tag, object size, dispatch-table pointer) plus
/// one word per attribute's initial value, null where there is none.
pub fn emit_prototypes(graph: &DescriptorGraph, asm: &mut AsmEmitter) -> fmt::Result {
    for class in &graph.classes {
        asm.global_label(&class.prototype_label);
        asm.word(Word::Int(class.type_tag), Some("typeTag"))?;
        asm.word(Word::Int(class.object_size_words() as i32), Some("objectSize"))?;
        asm.word(class.dispatch_table_label.clone().into(), Some("dispatchTable"))?;
        for attr in &class.attributes {
            asm.word(attr.init_label.clone().into(), Some(&attr.name))?;
        }
        asm.align(2)?;
    }
    Ok(())
}

/// Step 3: dispatch tables. A class whose `dispatch_table_label` is `None`
/// (only `.list`) emits nothing.
pub fn emit_dispatch_tables(graph: &DescriptorGraph, asm: &mut AsmEmitter) -> fmt::Result {
    for class in &graph.classes {
        let Some(label) = &class.dispatch_table_label else {
            continue;
        };
        asm.global_label(label);
        for slot in &class.methods {
            let target = &graph.funcs[slot.func.0].code_label;
            asm.word(Word::Address(target.clone()), Some(&slot.name))?;
        }
    }
    Ok(())
}

/// Step 4: one storage cell per global variable, in insertion order.
pub fn emit_globals(graph: &DescriptorGraph, asm: &mut AsmEmitter) -> fmt::Result {
    for g in &graph.globals {
        asm.global_label(&g.storage_label);
        asm.word(g.init_label.clone().into(), Some(&g.name))?;
    }
    Ok(())
}

/// Step 10: the constant pool, written after the back-end's custom code and
/// a second `.data` directive. `false`/`trueConstant` first (fixed, always
/// present), then every interned string, then every interned integer, both
/// in the order they were first requested.
///
/// String and integer constants are objects of their class in name only:
/// unlike a generically-constructed instance, their first attribute word
/// (`__len__` for strings, `__int__` for integers, the single `__bool__`
/// slot for booleans) holds the raw value directly rather than the address
/// of another boxed object. A string's `__str__` "attribute" is not a
/// pointer at all: the characters are packed inline starting at the same
/// offset `attrIndex("__str__")` would predict for a pointer, which is the
/// coincidence `print`'s string path relies on (§4.6).
pub fn emit_constant_pool(graph: &DescriptorGraph, constants: &ConstantPool, asm: &mut AsmEmitter) -> fmt::Result {
    let bool_id = graph.class_id_by_name("bool").expect("bool is predefined");
    let bool_class = &graph.classes[bool_id.0];
    let bool_tag = bool_class.type_tag;
    let bool_dispatch = bool_class.dispatch_table_label.clone();

    asm.global_label(constants.false_constant());
    asm.word(Word::Int(bool_tag), Some("typeTag"))?;
    asm.word(Word::Int(4), Some("objectSize"))?;
    asm.word(bool_dispatch.clone().into(), Some("dispatchTable"))?;
    asm.word(Word::Int(0), Some("__bool__"))?;
    asm.align(2)?;

    asm.global_label(constants.true_constant());
    asm.word(Word::Int(bool_tag), Some("typeTag"))?;
    asm.word(Word::Int(4), Some("objectSize"))?;
    asm.word(bool_dispatch.into(), Some("dispatchTable"))?;
    asm.word(Word::Int(1), Some("__bool__"))?;
    asm.align(2)?;

    let str_id = graph.class_id_by_name("str").expect("str is predefined");
    let str_class = &graph.classes[str_id.0];
    let str_tag = str_class.type_tag;
    let str_dispatch = str_class.dispatch_table_label.clone();
    let word_size = asm.word_size();

    for (value, label) in constants.strs_in_order() {
        let payload_words = (value.len() as u32 + 1).div_ceil(word_size);
        let object_size = 3 + 1 + payload_words;
        asm.global_label(label);
        asm.word(Word::Int(str_tag), Some("typeTag"))?;
        asm.word(Word::Int(object_size as i32), Some("objectSize"))?;
        asm.word(str_dispatch.clone().into(), Some("dispatchTable"))?;
        asm.word(Word::Int(value.len() as i32), Some("__len__"))?;
        asm.string(value, Some("__str__"))?;
        asm.align(2)?;
    }

    let int_id = graph.class_id_by_name("int").expect("int is predefined");
    let int_class = &graph.classes[int_id.0];
    let int_tag = int_class.type_tag;
    let int_dispatch = int_class.dispatch_table_label.clone();

    for (value, label) in constants.ints_in_order() {
        asm.global_label(label);
        asm.word(Word::Int(int_tag), Some("typeTag"))?;
        asm.word(Word::Int(4), Some("objectSize"))?;
        asm.word(int_dispatch.clone().into(), Some("dispatchTable"))?;
        asm.word(Word::Int(value as i32), Some("__int__"))?;
        asm.align(2)?;
    }

    Ok(())
}
