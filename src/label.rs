//! Labels and the label factory.
//!
//! A [`Label`] is an opaque symbolic address; equality is by textual name.
//! User-facing labels begin with `$` (classes, functions, globals, anything
//! a human or another tool might want to find by name); compiler-local
//! labels begin with `label_` (branch targets, loop heads, one-off jump
//! targets inside generated bodies). No label is ever emitted twice; the
//! factory is the single source of fresh names.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(String);

impl Label {
    /// A user-visible label, e.g. `$C$prototype`, `$f`, `$x`.
    pub fn user(name: impl AsRef<str>) -> Self {
        let name = name.as_ref();
        debug_assert!(name.starts_with('$'), "user labels must start with '$': {name}");
        Label(name.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The program's fixed entry symbol ("main"), exempt from the `$`
    /// convention. Not minted through `user`/`user_label` since those
    /// always prepend `$`.
    pub fn raw(name: impl AsRef<str>) -> Self {
        Label(name.as_ref().to_string())
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Produces globally-unique compiler-local labels (`label_<n>`).
///
/// User-visible labels are not minted here; they are derived directly from
/// qualified names (`$<name>`) by whoever needs them, since those names are
/// already unique by construction (the analyzer rejects duplicate qualified
/// names). The factory only needs to guarantee freshness for the labels that
/// have no natural name: branch targets, loop heads, short-circuit joins.
#[derive(Debug, Default)]
pub struct LabelFactory {
    next: u32,
}

impl LabelFactory {
    pub fn new() -> Self {
        LabelFactory { next: 0 }
    }

    /// Mint a fresh compiler-local label, e.g. `label_0`, `label_1`, ...
    pub fn fresh(&mut self) -> Label {
        let n = self.next;
        self.next += 1;
        Label(format!("label_{n}"))
    }

    /// Mint a fresh compiler-local label with a descriptive suffix, e.g.
    /// `label_3_else`. Purely cosmetic; uniqueness still comes from the
    /// counter, so two calls with the same suffix never collide.
    pub fn fresh_named(&mut self, suffix: &str) -> Label {
        let n = self.next;
        self.next += 1;
        Label(format!("label_{n}_{suffix}"))
    }
}

/// Build the user-visible label for a named entity: `$<name>`.
pub fn user_label(name: &str) -> Label {
    Label::user(format!("${name}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_labels_are_never_repeated() {
        let mut f = LabelFactory::new();
        let a = f.fresh();
        let b = f.fresh();
        assert_ne!(a, b);
        assert_eq!(a.as_str(), "label_0");
        assert_eq!(b.as_str(), "label_1");
    }

    #[test]
    fn fresh_named_labels_carry_the_counter_not_just_the_suffix() {
        let mut f = LabelFactory::new();
        let a = f.fresh_named("else");
        let b = f.fresh_named("else");
        assert_ne!(a, b);
    }

    #[test]
    fn user_labels_are_dollar_prefixed() {
        let l = user_label("C.m");
        assert_eq!(l.as_str(), "$C.m");
    }

    #[test]
    fn raw_label_has_no_dollar_prefix() {
        let l = Label::raw("main");
        assert_eq!(l.as_str(), "main");
    }
}
