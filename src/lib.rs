//! Crate root: wires together the compilation pipeline.
//!
//! The stages run strictly one after another and each hands a finished value
//! to the next:
//! - `tokenizer` performs lexical analysis and produces a flat token stream.
//! - `parser` builds the `ast` with an expression arena owned by the program.
//! - `codegen` lowers the program into x86-64 NASM assembly.
//! - `error` holds the single error type every stage reports through.

pub mod ast;
pub mod codegen;
pub mod error;
pub mod parser;
pub mod tokenizer;

pub use error::{CompileError, CompileResult, ErrorKind};

/// Compile a source string into NASM assembly.
pub fn compile(source: &str) -> CompileResult<String> {
  let tokens = tokenizer::tokenize(source)?;
  let program = parser::parse(tokens)?;
  codegen::generate(&program)
}
