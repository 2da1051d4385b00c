//! Crate-wide error type.
//!
//! Two failure layers, matching §7 of the design: an analyzer bug (an
//! invariant the external type checker was supposed to guarantee turned out
//! false) and a formatting failure while writing to the asm sink. Neither is
//! a user-facing diagnostic; those are the parser/checker's job, collected
//! into the program's own errors list upstream of this crate.

use std::fmt;

#[derive(Debug)]
pub enum CoreError {
    /// A structural invariant the analyzer assumed (superclass exists,
    /// `global`/`nonlocal` target resolves, no duplicate qualified name)
    /// did not hold. This is a compiler bug, not a user diagnostic.
    Bug(String),
    /// A formatting failure while writing emitted assembly text.
    Emit(fmt::Error),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::Bug(s) => write!(f, "compiler bug: {s}"),
            CoreError::Emit(e) => write!(f, "assembly emission error: {e}"),
        }
    }
}

impl std::error::Error for CoreError {}

impl From<fmt::Error> for CoreError {
    fn from(e: fmt::Error) -> Self {
        CoreError::Emit(e)
    }
}

impl From<String> for CoreError {
    fn from(s: String) -> Self {
        CoreError::Bug(s)
    }
}

impl From<&str> for CoreError {
    fn from(s: &str) -> Self {
        CoreError::Bug(s.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
