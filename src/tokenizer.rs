//! Lexical analysis: turns the raw input string into a vector of tokens.
//!
//! The tokenizer is a single forward scan. Keywords are recognised by looking
//! up each identifier-shaped run, comments are dropped on the spot, and every
//! token remembers the 1-based line it started on so later stages can report
//! errors against the source.

use std::fmt;

use log::{debug, trace};

use crate::error::{CompileError, CompileResult};

/// Kinds of tokens recognised by the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
  Exit,
  IntLiteral,
  Semicolon,
  LParen,
  RParen,
  Identifier,
  Var,
  Equals,
  Star,
  Slash,
  Plus,
  Minus,
  LBrace,
  RBrace,
  If,
  Elif,
  Else,
}

impl TokenKind {
  /// Keyword lookup for an identifier-shaped run of characters.
  pub fn keyword(text: &str) -> Option<Self> {
    match text {
      "exit" => Some(Self::Exit),
      "var" => Some(Self::Var),
      "if" => Some(Self::If),
      "elif" => Some(Self::Elif),
      "else" => Some(Self::Else),
      _ => None,
    }
  }

  fn punctuator(c: u8) -> Option<Self> {
    match c {
      b'(' => Some(Self::LParen),
      b')' => Some(Self::RParen),
      b';' => Some(Self::Semicolon),
      b'=' => Some(Self::Equals),
      b'*' => Some(Self::Star),
      b'/' => Some(Self::Slash),
      b'+' => Some(Self::Plus),
      b'-' => Some(Self::Minus),
      b'{' => Some(Self::LBrace),
      b'}' => Some(Self::RBrace),
      _ => None,
    }
  }
}

impl fmt::Display for TokenKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let text = match self {
      Self::Exit => "'exit'",
      Self::IntLiteral => "int literal",
      Self::Semicolon => "';'",
      Self::LParen => "'('",
      Self::RParen => "')'",
      Self::Identifier => "identifier",
      Self::Var => "'var'",
      Self::Equals => "'='",
      Self::Star => "'*'",
      Self::Slash => "'/'",
      Self::Plus => "'+'",
      Self::Minus => "'-'",
      Self::LBrace => "'{'",
      Self::RBrace => "'}'",
      Self::If => "'if'",
      Self::Elif => "'elif'",
      Self::Else => "'else'",
    };
    f.write_str(text)
  }
}

/// Binding strength of a binary operator token, `None` for everything else.
pub fn binary_precedence(kind: TokenKind) -> Option<u8> {
  match kind {
    TokenKind::Plus | TokenKind::Minus => Some(0),
    TokenKind::Star | TokenKind::Slash => Some(1),
    _ => None,
  }
}

/// Thin wrapper for lexical information needed by later stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
  pub kind: TokenKind,
  pub line: usize,
  /// Literal text; only present for `IntLiteral` and `Identifier`.
  pub text: Option<String>,
}

impl Token {
  pub fn new(kind: TokenKind, line: usize) -> Self {
    Self {
      kind,
      line,
      text: None,
    }
  }

  pub fn with_text(kind: TokenKind, line: usize, text: impl Into<String>) -> Self {
    Self {
      kind,
      line,
      text: Some(text.into()),
    }
  }
}

/// Lex the input into a flat vector of tokens.
pub fn tokenize(input: &str) -> CompileResult<Vec<Token>> {
  let mut tokens = Vec::new();
  let bytes = input.as_bytes();
  let mut line = 1;
  let mut i = 0;

  while i < bytes.len() {
    let c = bytes[i];

    if c.is_ascii_alphabetic() {
      let start = i;
      i += 1;
      while i < bytes.len() && bytes[i].is_ascii_alphanumeric() {
        i += 1;
      }
      let text = &input[start..i];
      match TokenKind::keyword(text) {
        Some(kind) => tokens.push(Token::new(kind, line)),
        None => tokens.push(Token::with_text(TokenKind::Identifier, line, text)),
      }
      continue;
    }

    if c.is_ascii_digit() {
      let start = i;
      i += 1;
      while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
      }
      tokens.push(Token::with_text(TokenKind::IntLiteral, line, &input[start..i]));
      continue;
    }

    // `;;` runs to the end of the line; the newline itself is left for the
    // main loop so the line counter stays in one place.
    if bytes[i..].starts_with(b";;") {
      i += 2;
      while i < bytes.len() && bytes[i] != b'\n' {
        i += 1;
      }
      continue;
    }

    // `;* ... *;` does not nest. An unterminated comment eats the rest of
    // the input.
    if bytes[i..].starts_with(b";*") {
      let opened_at = line;
      i += 2;
      loop {
        if i >= bytes.len() {
          debug!("block comment opened on line {opened_at} is never closed");
          break;
        }
        if bytes[i..].starts_with(b"*;") {
          i += 2;
          break;
        }
        if bytes[i] == b'\n' {
          line += 1;
        }
        i += 1;
      }
      continue;
    }

    if let Some(kind) = TokenKind::punctuator(c) {
      tokens.push(Token::new(kind, line));
      i += 1;
      continue;
    }

    if c == b'\n' {
      line += 1;
      i += 1;
      continue;
    }

    if c.is_ascii_whitespace() {
      i += 1;
      continue;
    }

    let character = input[i..].chars().next().unwrap_or('\0');
    return Err(CompileError::Lex { line, character });
  }

  debug!("tokenized {} tokens over {} line(s)", tokens.len(), line);
  trace!("tokens: {tokens:?}");
  Ok(tokens)
}
