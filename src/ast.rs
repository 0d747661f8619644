//! Syntax tree produced by the parser and consumed by code generation.
//!
//! Expressions live in a per-program arena and refer to their children by
//! [`ExprId`]; a node is only pushed once both of its children exist, so the
//! tree is built bottom-up and never patched afterwards. Statements own their
//! nested statements directly.

use std::ops::Index;

/// Binary operators recognised by the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
  Add,
  Sub,
  Mul,
  Div,
}

impl BinaryOp {
  pub fn symbol(self) -> char {
    match self {
      Self::Add => '+',
      Self::Sub => '-',
      Self::Mul => '*',
      Self::Div => '/',
    }
  }
}

/// Index of an expression node inside an [`ExprArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExprId(usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
  IntLiteral { value: i64 },
  Identifier { name: String, line: usize },
  Parenthesized { inner: ExprId },
  Binary { op: BinaryOp, lhs: ExprId, rhs: ExprId },
}

/// Backing storage for every expression of a program. Nodes are appended and
/// released together when the arena is dropped.
#[derive(Debug, Clone, Default)]
pub struct ExprArena {
  nodes: Vec<Expr>,
}

impl ExprArena {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn alloc(&mut self, expr: Expr) -> ExprId {
    let id = ExprId(self.nodes.len());
    self.nodes.push(expr);
    id
  }

  pub fn get(&self, id: ExprId) -> &Expr {
    &self.nodes[id.0]
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  /// Fully parenthesised rendering, mostly useful for checking how
  /// precedence was resolved.
  pub fn render(&self, id: ExprId) -> String {
    match self.get(id) {
      Expr::IntLiteral { value } => value.to_string(),
      Expr::Identifier { name, .. } => name.clone(),
      Expr::Parenthesized { inner } => self.render(*inner),
      Expr::Binary { op, lhs, rhs } => {
        format!("({} {} {})", self.render(*lhs), op.symbol(), self.render(*rhs))
      }
    }
  }
}

impl Index<ExprId> for ExprArena {
  type Output = Expr;

  fn index(&self, id: ExprId) -> &Expr {
    self.get(id)
  }
}

/// A braced block. Variables declared inside it die at the closing brace.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Scope {
  pub stmts: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
  Exit {
    expr: ExprId,
  },
  VarDecl {
    name: String,
    expr: ExprId,
    line: usize,
  },
  Assign {
    name: String,
    expr: ExprId,
    line: usize,
  },
  Scope(Scope),
  If {
    cond: ExprId,
    body: Scope,
    pred: Option<Box<IfPred>>,
  },
}

/// Tail of an `if` statement: a chain of `elif`s optionally ending in `else`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IfPred {
  Elif {
    cond: ExprId,
    body: Scope,
    next: Option<Box<IfPred>>,
  },
  Else {
    body: Scope,
  },
}

// Long `elif` chains would otherwise be dropped one recursive call per link.
impl Drop for IfPred {
  fn drop(&mut self) {
    let mut next = match self {
      Self::Elif { next, .. } => next.take(),
      Self::Else { .. } => None,
    };
    while let Some(mut pred) = next {
      next = match &mut *pred {
        Self::Elif { next, .. } => next.take(),
        Self::Else { .. } => None,
      };
    }
  }
}

#[derive(Debug, Clone, Default)]
pub struct Program {
  pub stmts: Vec<Stmt>,
  pub exprs: ExprArena,
}
