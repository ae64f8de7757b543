use thiserror::Error;

use crate::codegen::CodegenError;
use crate::ir::VerifierErrors;
use crate::lexer::LexError;
use crate::parser::ParseError;

/// The single diagnostic reported for a failed compilation.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("lex error: {0}")]
    Lex(#[from] LexError),
    #[error("syntax error: {0}")]
    Syntax(#[from] ParseError),
    #[error("codegen error: {0}")]
    Codegen(#[from] CodegenError),
    #[error("invalid IR: {0}")]
    Verify(#[from] VerifierErrors),
}
