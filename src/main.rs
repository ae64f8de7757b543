use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};

use kalc::jit::Jit;
use kalc::parser::{ParseOptions, PrecedenceTable};
use kalc::{codegen, ir, lexer, printer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Emit {
    Tokens,
    Ast,
    Source,
    Ir,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Precedence {
    Legacy,
    Conventional,
}

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    /// Source file; reads stdin when omitted.
    input: Option<PathBuf>,
    #[arg(long, value_enum, default_value = "ir")]
    emit: Emit,
    #[arg(long, value_enum, default_value = "legacy")]
    precedence: Precedence,
    /// JIT-compile the module and call this function instead of printing.
    #[arg(long)]
    run: Option<String>,
    /// Argument passed to `--run`; repeat for each parameter.
    #[arg(long = "arg", requires = "run", allow_negative_numbers = true)]
    args: Vec<f64>,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let source = if let Some(path) = &cli.input {
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?
    } else {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Reading stdin")?;
        buffer
    };

    let options = ParseOptions {
        precedence: match cli.precedence {
            Precedence::Legacy => PrecedenceTable::legacy(),
            Precedence::Conventional => PrecedenceTable::conventional(),
        },
    };

    let tokens = lexer::tokenize(&source)?;
    if cli.emit == Emit::Tokens && cli.run.is_none() {
        for token in &tokens {
            let span = token.span();
            println!("{}:{}\t{}", span.line, span.column, token.kind());
        }
        return Ok(());
    }

    let program = kalc::parser::parse_tokens_with(tokens, options)?;
    if cli.run.is_none() {
        match cli.emit {
            Emit::Ast => {
                print!("{}", printer::dump_tree(&program));
                return Ok(());
            }
            Emit::Source => {
                print!("{}", printer::print_program(&program));
                return Ok(());
            }
            Emit::Tokens | Emit::Ir => {}
        }
    }

    let module = codegen::generate(&program)?;
    ir::verify_module(&module)?;

    let Some(name) = &cli.run else {
        print!("{module}");
        return Ok(());
    };
    if module.function(name).is_none() {
        bail!("Unknown function '{name}'");
    }
    let jit = Jit::new(&module)?;
    let result = jit.call(name, &cli.args)?;
    println!("{result}");
    Ok(())
}
