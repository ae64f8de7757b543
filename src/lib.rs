pub mod ast;
pub mod codegen;
pub mod error;
pub mod ir;
pub mod jit;
pub mod lexer;
pub mod parser;
pub mod printer;
pub mod token;

pub use error::CompileError;
pub use parser::{ParseOptions, PrecedenceTable};

/// Parses `source` into a syntax tree.
pub fn parse(source: &str, options: &ParseOptions) -> Result<ast::Program, CompileError> {
    let tokens = lexer::tokenize(source)?;
    Ok(parser::parse_tokens_with(tokens, *options)?)
}

/// Runs the whole pipeline and returns a verified IR module.
pub fn compile(source: &str, options: &ParseOptions) -> Result<ir::Module, CompileError> {
    let program = parse(source, options)?;
    let module = codegen::generate(&program)?;
    ir::verify_module(&module)?;
    log::debug!(
        "compiled {} functions and {} externs",
        module.functions.len(),
        module.externs.len()
    );
    Ok(module)
}
