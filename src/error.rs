//! Shared error type for the compilation pipeline.
//!
//! Every stage is fail-fast: the first problem found becomes a `CompileError`
//! that carries the best-known source line and bubbles up to the caller. No
//! stage attempts to recover or to keep collecting diagnostics.

use snafu::Snafu;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
pub enum CompileError {
  #[snafu(display("[Lex Error] invalid character '{character}' on line {line}"))]
  Lex { line: usize, character: char },

  #[snafu(display("[Parse Error] expected {expected} on line {line}"))]
  Parse { expected: String, line: usize },

  #[snafu(display("[Generation Error] undeclared identifier `{name}` on line {line}"))]
  UndeclaredIdentifier { name: String, line: usize },

  #[snafu(display("[Generation Error] identifier `{name}` already declared in this scope (line {line})"))]
  DuplicateDeclaration { name: String, line: usize },
}

/// Coarse classification of a [`CompileError`], one per pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  Lex,
  Parse,
  Gen,
}

impl CompileError {
  /// Construct a parse error naming the construct that was expected.
  pub fn expected(expected: impl Into<String>, line: usize) -> Self {
    Self::Parse {
      expected: expected.into(),
      line,
    }
  }

  /// Source line the error is anchored at (1-based).
  pub fn line(&self) -> usize {
    match self {
      Self::Lex { line, .. }
      | Self::Parse { line, .. }
      | Self::UndeclaredIdentifier { line, .. }
      | Self::DuplicateDeclaration { line, .. } => *line,
    }
  }

  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::Lex { .. } => ErrorKind::Lex,
      Self::Parse { .. } => ErrorKind::Parse,
      Self::UndeclaredIdentifier { .. } | Self::DuplicateDeclaration { .. } => ErrorKind::Gen,
    }
  }
}
