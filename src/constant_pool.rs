//! The constant pool: interns integer, string and boolean constants and
//! returns a label pointing to their prototype image.
//!
//! Two fixed labels, `falseConstant`/`trueConstant`, are created eagerly at
//! construction (there are only ever two boolean values, so there is
//! nothing to intern). Integers and strings grow the pool lazily as
//! `fromLiteral` or the direct `get_*_constant` accessors are called.
//! Iteration order is insertion order, which is required for byte-identical
//! output across runs of the same program.

use crate::ast::Literal;
use crate::label::{Label, user_label};
use std::collections::HashMap;

pub struct ConstantPool {
    ints: HashMap<i64, Label>,
    ints_order: Vec<i64>,
    strs: HashMap<String, Label>,
    strs_order: Vec<String>,
    false_constant: Label,
    true_constant: Label,
    next_int_id: u32,
    next_str_id: u32,
}

impl Default for ConstantPool {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstantPool {
    pub fn new() -> Self {
        ConstantPool {
            ints: HashMap::new(),
            ints_order: Vec::new(),
            strs: HashMap::new(),
            strs_order: Vec::new(),
            false_constant: user_label("falseConstant"),
            true_constant: user_label("trueConstant"),
            next_int_id: 0,
            next_str_id: 0,
        }
    }

    pub fn false_constant(&self) -> &Label {
        &self.false_constant
    }

    pub fn true_constant(&self) -> &Label {
        &self.true_constant
    }

    /// Intern law: the same `v` always returns the same label.
    pub fn get_int_constant(&mut self, v: i64) -> Label {
        if let Some(l) = self.ints.get(&v) {
            return l.clone();
        }
        let label = user_label(format!("int.{}", self.next_int_id));
        self.next_int_id += 1;
        self.ints.insert(v, label.clone());
        self.ints_order.push(v);
        label
    }

    /// Intern law: the same `s` always returns the same label.
    pub fn get_str_constant(&mut self, v: &str) -> Label {
        if let Some(l) = self.strs.get(v) {
            return l.clone();
        }
        let label = user_label(format!("str.{}", self.next_str_id));
        self.next_str_id += 1;
        self.strs.insert(v.to_string(), label.clone());
        self.strs_order.push(v.to_string());
        label
    }

    /// Lower a literal AST node to the label of its constant-pool image, or
    /// `None` for the `None` literal.
    pub fn from_literal(&mut self, lit: &Literal) -> Option<Label> {
        match lit {
            Literal::Integer(v) => Some(self.get_int_constant(*v)),
            Literal::Str(s) => Some(self.get_str_constant(s)),
            Literal::Boolean(true) => Some(self.true_constant.clone()),
            Literal::Boolean(false) => Some(self.false_constant.clone()),
            Literal::None => None,
        }
    }

    /// Interned integers in insertion order, paired with their label.
    pub fn ints_in_order(&self) -> impl Iterator<Item = (i64, &Label)> {
        self.ints_order.iter().map(move |v| (*v, &self.ints[v]))
    }

    /// Interned strings in insertion order, paired with their label.
    pub fn strs_in_order(&self) -> impl Iterator<Item = (&str, &Label)> {
        self.strs_order
            .iter()
            .map(move |s| (s.as_str(), &self.strs[s]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_intern_law() {
        let mut pool = ConstantPool::new();
        let a = pool.get_int_constant(5);
        let b = pool.get_int_constant(5);
        assert_eq!(a, b);
        let c = pool.get_int_constant(6);
        assert_ne!(a, c);
    }

    #[test]
    fn str_intern_law() {
        let mut pool = ConstantPool::new();
        let a = pool.get_str_constant("hi");
        let b = pool.get_str_constant("hi");
        assert_eq!(a, b);
    }

    #[test]
    fn from_literal_round_trips() {
        let mut pool = ConstantPool::new();
        assert_eq!(
            pool.from_literal(&Literal::Integer(7)),
            Some(pool.get_int_constant(7))
        );
        assert_eq!(
            pool.from_literal(&Literal::Boolean(true)),
            Some(pool.true_constant().clone())
        );
        assert_eq!(pool.from_literal(&Literal::None), None);
    }

    #[test]
    fn iteration_order_is_insertion_order() {
        let mut pool = ConstantPool::new();
        pool.get_int_constant(3);
        pool.get_int_constant(1);
        pool.get_int_constant(3);
        pool.get_int_constant(2);
        let order: Vec<i64> = pool.ints_in_order().map(|(v, _)| v).collect();
        assert_eq!(order, vec![3, 1, 2]);
    }
}
