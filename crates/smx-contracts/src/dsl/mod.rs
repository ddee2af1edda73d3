//! Embedded contract DSL: a minimal statement/expression language
//! sufficient to express the spec's example contracts, evaluated by a
//! tree-walking interpreter rather than out-of-process compilation (spec
//! §9, SPEC_FULL §6).

pub mod ast;
pub mod gas;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod value;

pub use ast::Program;
pub use gas::{GasEstimator, NodeCountEstimator};
pub use interpreter::{Interpreter, RuntimeError};
pub use value::{ContractState, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    Lex(lexer::LexError),
    Parse(parser::ParseError),
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileError::Lex(e) => write!(f, "{e}"),
            CompileError::Parse(e) => write!(f, "{e}"),
        }
    }
}
impl std::error::Error for CompileError {}

/// Lexes and parses `source` into a [`Program`] (spec §4.5 `compile`'s
/// "compiles to an in-memory module" step, run only after the Safety
/// Analyzer accepts the source).
pub fn compile(source: &str) -> Result<Program, CompileError> {
    let tokens = lexer::lex(source).map_err(CompileError::Lex)?;
    parser::parse(tokens).map_err(CompileError::Parse)
}
