//! Error type returned by the compiler.
//!
//! The compiler has exactly two fatal error kinds (§7 of the design):
//! [`ErrorKind::CyclicSchema`] when the input model is rejected outright, and
//! [`ErrorKind::TemplateError`] when emission itself fails. Everything else
//! (unknown references, depth exceeded) is either a diagnostic recorded on an
//! analysis or a runtime condition surfaced by the emitted SQL, never a
//! compiler error.

use std::fmt::{self, Display, Formatter};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A relation transitively implies itself, or a cross-type parent chain
    /// cycles through distinct relation names.
    CyclicSchema,
    /// A named template could not be found or failed to render.
    TemplateError,
}

#[derive(Debug, Clone)]
pub struct Error {
    pub kind: ErrorKind,
    pub reason: String,
}

impl Error {
    pub fn cyclic_schema<S: ToString>(reason: S) -> Self {
        Error {
            kind: ErrorKind::CyclicSchema,
            reason: reason.to_string(),
        }
    }

    pub fn template<S: ToString>(reason: S) -> Self {
        Error {
            kind: ErrorKind::TemplateError,
            reason: reason.to_string(),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let code = match self.kind {
            ErrorKind::CyclicSchema => "M1001",
            ErrorKind::TemplateError => "M1002",
        };
        write!(f, "[{code}] {}", self.reason)
    }
}

impl std::error::Error for Error {}
