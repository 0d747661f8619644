//! Code generation: lower the parsed program into x86-64 NASM assembly.
//!
//! The emitter is a stack machine: every expression leaves exactly one value
//! on the stack, and statements pop what they consume. Variables are the
//! values left behind by their declarations, so a variable is addressed by
//! its distance from the current top of stack. The generator tracks that
//! height at compile time to turn a slot index into an `rsp` offset.

use log::{debug, trace};

use crate::ast::{BinaryOp, Expr, ExprArena, ExprId, IfPred, Program, Scope, Stmt};
use crate::error::{CompileError, CompileResult};

/// Size in bytes of one stack slot.
pub const WORD_SIZE: usize = 8;

const SYS_EXIT: u32 = 60;

/// Emit assembly for a whole program.
pub fn generate(program: &Program) -> CompileResult<String> {
  let mut gen = Generator::new(&program.exprs);

  gen.output.push_str("global _start\n");
  gen.output.push_str("_start:\n");

  for stmt in &program.stmts {
    gen.emit_stmt(stmt)?;
  }

  // Reached only when control falls off the end without an explicit exit.
  gen.output.push_str(&format!("    mov rax, {SYS_EXIT}\n"));
  gen.output.push_str("    mov rdi, 0\n");
  gen.output.push_str("    syscall\n");

  debug!(
    "generated {} line(s) of assembly using {} label(s)",
    gen.output.lines().count(),
    gen.label_count
  );
  Ok(gen.output)
}

/// Pending step of the expression walk in `emit_expr`.
enum Work {
  Eval(ExprId),
  Apply(BinaryOp),
}

#[derive(Debug)]
struct Var {
  name: String,
  /// Position counted from the bottom of the stack.
  slot: usize,
}

struct Generator<'a> {
  exprs: &'a ExprArena,
  output: String,
  /// Number of words currently pushed.
  stack_size: usize,
  vars: Vec<Var>,
  /// Length of `vars` at the start of each open scope.
  scopes: Vec<usize>,
  label_count: usize,
}

impl<'a> Generator<'a> {
  fn new(exprs: &'a ExprArena) -> Self {
    Self {
      exprs,
      output: String::new(),
      stack_size: 0,
      vars: Vec::new(),
      scopes: Vec::new(),
      label_count: 0,
    }
  }

  fn emit_stmt(&mut self, stmt: &Stmt) -> CompileResult<()> {
    match stmt {
      Stmt::Exit { expr } => {
        self.emit_expr(*expr)?;
        self.output.push_str(&format!("    mov rax, {SYS_EXIT}\n"));
        self.pop("rdi");
        self.output.push_str("    syscall\n");
      }
      Stmt::VarDecl { name, expr, line } => {
        let scope_start = self.scopes.last().copied().unwrap_or(0);
        if self.vars[scope_start..].iter().any(|var| var.name == *name) {
          return Err(CompileError::DuplicateDeclaration {
            name: name.clone(),
            line: *line,
          });
        }
        // The initializer's result becomes the variable itself. The name is
        // registered afterwards so it cannot refer to its own slot.
        let slot = self.stack_size;
        self.emit_expr(*expr)?;
        debug_assert_eq!(self.stack_size, slot + 1);
        trace!("`{name}` lives in slot {slot}");
        self.vars.push(Var {
          name: name.clone(),
          slot,
        });
      }
      Stmt::Assign { name, expr, line } => {
        let slot = self.lookup(name, *line)?;
        self.emit_expr(*expr)?;
        self.pop("rax");
        let offset = self.offset_of(slot);
        self.output.push_str(&format!("    mov QWORD [rsp + {offset}], rax\n"));
      }
      Stmt::Scope(scope) => self.emit_scope(scope)?,
      Stmt::If { cond, body, pred } => {
        let skip = self.emit_condition(*cond)?;
        self.emit_scope(body)?;
        match pred {
          Some(pred) => {
            let end = self.create_label();
            self.output.push_str(&format!("    jmp {end}\n"));
            self.output.push_str(&format!("{skip}:\n"));
            self.emit_if_pred(pred, &end)?;
            self.output.push_str(&format!("{end}:\n"));
          }
          None => {
            self.output.push_str(&format!("{skip}:\n"));
          }
        }
      }
    }
    Ok(())
  }

  /// Lower an `elif`/`else` chain. Every taken branch jumps to `end`, the
  /// label shared by the whole `if` statement.
  fn emit_if_pred(&mut self, pred: &IfPred, end: &str) -> CompileResult<()> {
    let mut current = Some(pred);
    while let Some(pred) = current {
      current = match pred {
        IfPred::Elif { cond, body, next } => {
          let skip = self.emit_condition(*cond)?;
          self.emit_scope(body)?;
          if next.is_some() {
            self.output.push_str(&format!("    jmp {end}\n"));
          }
          self.output.push_str(&format!("{skip}:\n"));
          next.as_deref()
        }
        IfPred::Else { body } => {
          self.emit_scope(body)?;
          None
        }
      };
    }
    Ok(())
  }

  /// Evaluate `cond` and branch to the returned label when it is zero.
  fn emit_condition(&mut self, cond: ExprId) -> CompileResult<String> {
    self.emit_expr(cond)?;
    self.pop("rax");
    let skip = self.create_label();
    self.output.push_str("    test rax, rax\n");
    self.output.push_str(&format!("    jz {skip}\n"));
    Ok(skip)
  }

  fn emit_scope(&mut self, scope: &Scope) -> CompileResult<()> {
    self.begin_scope();
    for stmt in &scope.stmts {
      self.emit_stmt(stmt)?;
    }
    self.end_scope();
    Ok(())
  }

  fn begin_scope(&mut self) {
    self.scopes.push(self.vars.len());
    trace!("enter scope at depth {}", self.scopes.len());
  }

  fn end_scope(&mut self) {
    let start = self.scopes.pop().unwrap_or(0);
    let count = self.vars.len() - start;
    if count > 0 {
      self.output.push_str(&format!("    add rsp, {}\n", count * WORD_SIZE));
      self.stack_size -= count;
    }
    self.vars.truncate(start);
    trace!("leave scope, released {count} variable(s)");
  }

  /// Emit stack-based code for an expression tree. The tree is walked with
  /// an explicit work list, so its depth is bounded only by memory.
  fn emit_expr(&mut self, id: ExprId) -> CompileResult<()> {
    let exprs = self.exprs;
    let mut work = vec![Work::Eval(id)];

    while let Some(item) = work.pop() {
      let id = match item {
        Work::Eval(id) => id,
        Work::Apply(op) => {
          self.emit_binary(op);
          continue;
        }
      };
      match &exprs[id] {
        Expr::IntLiteral { value } => {
          self.output.push_str(&format!("    mov rax, {value}\n"));
          self.push("rax");
        }
        Expr::Identifier { name, line } => {
          let slot = self.lookup(name, *line)?;
          let offset = self.offset_of(slot);
          self.push(&format!("QWORD [rsp + {offset}]"));
        }
        Expr::Parenthesized { inner } => work.push(Work::Eval(*inner)),
        Expr::Binary { op, lhs, rhs } => {
          // Right first, so the left operand ends up on top and is popped
          // into rax for the non-commutative operators.
          work.push(Work::Apply(*op));
          work.push(Work::Eval(*lhs));
          work.push(Work::Eval(*rhs));
        }
      }
    }
    Ok(())
  }

  /// Combine the two topmost values: left operand on top, right below it.
  fn emit_binary(&mut self, op: BinaryOp) {
    self.pop("rax");
    self.pop("rbx");
    match op {
      BinaryOp::Add => self.output.push_str("    add rax, rbx\n"),
      BinaryOp::Sub => self.output.push_str("    sub rax, rbx\n"),
      BinaryOp::Mul => self.output.push_str("    imul rax, rbx\n"),
      BinaryOp::Div => {
        self.output.push_str("    cqo\n");
        self.output.push_str("    idiv rbx\n");
      }
    }
    self.push("rax");
  }

  /// Innermost-to-outermost search over every open scope.
  fn lookup(&self, name: &str, line: usize) -> CompileResult<usize> {
    self
      .vars
      .iter()
      .rev()
      .find(|var| var.name == name)
      .map(|var| var.slot)
      .ok_or_else(|| CompileError::UndeclaredIdentifier {
        name: name.to_string(),
        line,
      })
  }

  /// Byte offset of `slot` from the current top of stack.
  fn offset_of(&self, slot: usize) -> usize {
    (self.stack_size - slot - 1) * WORD_SIZE
  }

  fn push(&mut self, operand: &str) {
    self.output.push_str(&format!("    push {operand}\n"));
    self.stack_size += 1;
  }

  fn pop(&mut self, reg: &str) {
    self.output.push_str(&format!("    pop {reg}\n"));
    self.stack_size -= 1;
  }

  fn create_label(&mut self) -> String {
    let label = format!("label{}", self.label_count);
    self.label_count += 1;
    label
  }
}
