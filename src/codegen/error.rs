use thiserror::Error;

use crate::codegen::scope::ScopeId;
use crate::ir::BuildError;

/// Broad class of a code generation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A name was referenced but is not bound anywhere visible.
    NameResolution,
    /// The program is well formed syntactically but cannot be lowered as written.
    Structural,
    /// The generator misused its own builder or scope table.
    Internal,
}

#[derive(Debug, Error, PartialEq, Clone)]
pub enum CodegenError {
    #[error("identifier not found: `{name}` in function `{function}`")]
    UnresolvedVariable { name: String, function: String },
    #[error("call to undeclared function `{callee}` in function `{function}`")]
    UnresolvedFunction { callee: String, function: String },
    #[error("parameter `{name}` is declared more than once in function `{function}`")]
    DuplicateParameter { name: String, function: String },
    #[error("function `{name}` is declared more than once")]
    DuplicateFunction { name: String },
    #[error("function `{function}` can reach the end of its body without returning")]
    MissingReturn { function: String },
    #[error("unreachable statement in function `{function}` after a return")]
    UnreachableStatement { function: String },
    #[error("`{callee}` takes {expected} arguments but {found} were given in function `{function}`")]
    ArityMismatch {
        callee: String,
        expected: usize,
        found: usize,
        function: String,
    },
    #[error("scope `{label}` exited out of order (expected {expected}, current {current:?})")]
    ScopeMismatch {
        label: String,
        expected: ScopeId,
        current: Option<ScopeId>,
    },
    #[error(transparent)]
    Builder(#[from] BuildError),
}

impl CodegenError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CodegenError::UnresolvedVariable { .. } | CodegenError::UnresolvedFunction { .. } => {
                ErrorKind::NameResolution
            }
            CodegenError::DuplicateParameter { .. }
            | CodegenError::DuplicateFunction { .. }
            | CodegenError::MissingReturn { .. }
            | CodegenError::UnreachableStatement { .. }
            | CodegenError::ArityMismatch { .. } => ErrorKind::Structural,
            CodegenError::ScopeMismatch { .. } | CodegenError::Builder(_) => ErrorKind::Internal,
        }
    }
}

pub type CodegenResult<T> = Result<T, CodegenError>;
