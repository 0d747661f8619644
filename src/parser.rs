//! Recursive-descent parser producing a [`Program`].
//!
//! Statements are chosen by peeking at up to three tokens before anything is
//! consumed, so the parser never backtracks. Expressions use precedence
//! climbing over the table in [`binary_precedence`]: a loop keeps folding
//! operators into the left-hand side while they bind at least as tightly as
//! the current minimum, and the right-hand side is parsed one level higher,
//! which makes equal-precedence operators associate to the left.

use log::{debug, trace};

use crate::ast::{BinaryOp, Expr, ExprArena, ExprId, IfPred, Program, Scope, Stmt};
use crate::error::{CompileError, CompileResult};
use crate::tokenizer::{binary_precedence, Token, TokenKind};

/// Deepest allowed nesting of braces and parentheses combined.
pub const MAX_NESTING_DEPTH: usize = 256;

/// Parse a whole token stream. The first structural mismatch aborts parsing.
pub fn parse(tokens: Vec<Token>) -> CompileResult<Program> {
  let mut parser = Parser::new(tokens);
  let mut stmts = Vec::new();

  while let Some(token) = parser.stream.peek(0) {
    let line = token.line;
    match parser.parse_stmt()? {
      Some(stmt) => stmts.push(stmt),
      None => return Err(CompileError::expected("statement", line)),
    }
  }

  debug!(
    "parsed {} top-level statement(s), {} expression node(s)",
    stmts.len(),
    parser.exprs.len()
  );
  Ok(Program {
    stmts,
    exprs: parser.exprs,
  })
}

struct Parser {
  stream: TokenStream,
  exprs: ExprArena,
  /// Currently open `{` and `(`.
  depth: usize,
}

impl Parser {
  fn new(tokens: Vec<Token>) -> Self {
    Self {
      stream: TokenStream::new(tokens),
      exprs: ExprArena::new(),
      depth: 0,
    }
  }

  fn enter_nested(&mut self) -> CompileResult<()> {
    if self.depth >= MAX_NESTING_DEPTH {
      return Err(CompileError::expected(
        format!("nesting depth of at most {MAX_NESTING_DEPTH}"),
        self.stream.error_line(),
      ));
    }
    self.depth += 1;
    Ok(())
  }

  fn leave_nested(&mut self) {
    self.depth -= 1;
  }

  /// Returns `Ok(None)` when the upcoming tokens do not start any statement;
  /// callers decide whether that ends a block or is an error.
  fn parse_stmt(&mut self) -> CompileResult<Option<Stmt>> {
    let first = self.stream.peek_kind(0);
    let second = self.stream.peek_kind(1);
    let third = self.stream.peek_kind(2);

    let stmt = match (first, second, third) {
      (Some(TokenKind::Exit), Some(TokenKind::LParen), _) => {
        self.stream.consume();
        self.stream.consume();
        let expr = self.expect_expr()?;
        self.stream.expect(TokenKind::RParen)?;
        self.stream.expect(TokenKind::Semicolon)?;
        trace!("exit statement");
        Stmt::Exit { expr }
      }
      (Some(TokenKind::Var), Some(TokenKind::Identifier), Some(TokenKind::Equals)) => {
        self.stream.consume();
        let (name, line) = self.stream.expect_ident()?;
        self.stream.consume();
        let expr = self.expect_expr()?;
        self.stream.expect(TokenKind::Semicolon)?;
        trace!("declaration of `{name}` on line {line}");
        Stmt::VarDecl { name, expr, line }
      }
      (Some(TokenKind::Identifier), Some(TokenKind::Equals), _) => {
        let (name, line) = self.stream.expect_ident()?;
        self.stream.consume();
        let expr = self.expect_expr()?;
        self.stream.expect(TokenKind::Semicolon)?;
        trace!("assignment to `{name}` on line {line}");
        Stmt::Assign { name, expr, line }
      }
      (Some(TokenKind::LBrace), _, _) => Stmt::Scope(self.parse_scope()?),
      (Some(TokenKind::If), Some(TokenKind::LParen), _) => {
        self.stream.consume();
        self.stream.consume();
        let cond = self.expect_expr()?;
        self.stream.expect(TokenKind::RParen)?;
        let body = self.parse_scope()?;
        let pred = self.parse_if_pred()?;
        Stmt::If { cond, body, pred }
      }
      _ => return Ok(None),
    };

    Ok(Some(stmt))
  }

  fn parse_scope(&mut self) -> CompileResult<Scope> {
    self.stream.expect(TokenKind::LBrace)?;
    self.enter_nested()?;
    let mut stmts = Vec::new();
    while let Some(stmt) = self.parse_stmt()? {
      stmts.push(stmt);
    }
    self.stream.expect(TokenKind::RBrace)?;
    self.leave_nested();
    Ok(Scope { stmts })
  }

  /// Collects every `elif` first and links the chain from its tail, so a
  /// long chain costs no extra recursion.
  fn parse_if_pred(&mut self) -> CompileResult<Option<Box<IfPred>>> {
    let mut elifs = Vec::new();
    while self.stream.peek_kind(0) == Some(TokenKind::Elif) {
      self.stream.consume();
      self.stream.expect(TokenKind::LParen)?;
      let cond = self.expect_expr()?;
      self.stream.expect(TokenKind::RParen)?;
      let body = self.parse_scope()?;
      elifs.push((cond, body));
    }

    let mut tail = if self.stream.peek_kind(0) == Some(TokenKind::Else) {
      self.stream.consume();
      let body = self.parse_scope()?;
      Some(Box::new(IfPred::Else { body }))
    } else {
      None
    };

    for (cond, body) in elifs.into_iter().rev() {
      tail = Some(Box::new(IfPred::Elif {
        cond,
        body,
        next: tail,
      }));
    }
    Ok(tail)
  }

  fn expect_expr(&mut self) -> CompileResult<ExprId> {
    self.parse_expr(0)
  }

  fn parse_expr(&mut self, min_prec: u8) -> CompileResult<ExprId> {
    let mut lhs = self.parse_term()?;

    loop {
      let Some(kind) = self.stream.peek_kind(0) else {
        break;
      };
      let Some((op, prec)) = binary_operator(kind) else {
        break;
      };
      if prec < min_prec {
        break;
      }
      self.stream.consume();
      let rhs = self.parse_expr(prec + 1)?;
      lhs = self.exprs.alloc(Expr::Binary { op, lhs, rhs });
    }

    Ok(lhs)
  }

  fn parse_term(&mut self) -> CompileResult<ExprId> {
    match self.stream.peek_kind(0) {
      Some(TokenKind::IntLiteral) => {
        let token = self.stream.consume();
        let text = token.text.unwrap_or_default();
        let value = text
          .parse::<i64>()
          .map_err(|_| CompileError::expected("integer literal in range", token.line))?;
        Ok(self.exprs.alloc(Expr::IntLiteral { value }))
      }
      Some(TokenKind::Identifier) => {
        let (name, line) = self.stream.expect_ident()?;
        Ok(self.exprs.alloc(Expr::Identifier { name, line }))
      }
      Some(TokenKind::LParen) => {
        self.stream.consume();
        self.enter_nested()?;
        let inner = self.expect_expr()?;
        self.stream.expect(TokenKind::RParen)?;
        self.leave_nested();
        Ok(self.exprs.alloc(Expr::Parenthesized { inner }))
      }
      _ => Err(CompileError::expected("expression", self.stream.error_line())),
    }
  }
}

fn binary_operator(kind: TokenKind) -> Option<(BinaryOp, u8)> {
  let op = match kind {
    TokenKind::Plus => BinaryOp::Add,
    TokenKind::Minus => BinaryOp::Sub,
    TokenKind::Star => BinaryOp::Mul,
    TokenKind::Slash => BinaryOp::Div,
    _ => return None,
  };
  binary_precedence(kind).map(|prec| (op, prec))
}

/// Lightweight cursor over the token vector.
struct TokenStream {
  tokens: Vec<Token>,
  pos: usize,
}

impl TokenStream {
  fn new(tokens: Vec<Token>) -> Self {
    Self { tokens, pos: 0 }
  }

  fn peek(&self, offset: usize) -> Option<&Token> {
    self.tokens.get(self.pos + offset)
  }

  fn peek_kind(&self, offset: usize) -> Option<TokenKind> {
    self.peek(offset).map(|token| token.kind)
  }

  /// Take the current token. Only called after a peek has confirmed one.
  fn consume(&mut self) -> Token {
    let token = self.tokens[self.pos].clone();
    self.pos += 1;
    token
  }

  fn expect(&mut self, kind: TokenKind) -> CompileResult<Token> {
    if self.peek_kind(0) == Some(kind) {
      Ok(self.consume())
    } else {
      Err(CompileError::expected(kind.to_string(), self.error_line()))
    }
  }

  fn expect_ident(&mut self) -> CompileResult<(String, usize)> {
    let token = self.expect(TokenKind::Identifier)?;
    let name = token.text.unwrap_or_default();
    Ok((name, token.line))
  }

  /// Line to blame when something is missing: the token just consumed if
  /// there is one, else the token that failed to match.
  fn error_line(&self) -> usize {
    self
      .pos
      .checked_sub(1)
      .and_then(|prev| self.tokens.get(prev))
      .or_else(|| self.peek(0))
      .map_or(1, |token| token.line)
  }
}
