//! Executes the subset of x86-64 NASM emitted by the code generator so tests
//! can check what a compiled program would exit with, without needing an
//! assembler or linker.

use std::collections::HashMap;

const STEP_LIMIT: usize = 100_000;

pub fn init_logging() {
  let _ = env_logger::builder().is_test(true).try_init();
}

/// Compile `source` and run it, returning the process exit status.
pub fn exit_status(source: &str) -> u8 {
  let asm = helium::compile(source).unwrap_or_else(|err| panic!("compile failed: {err}\n{source}"));
  run(&asm).unwrap_or_else(|err| panic!("execution failed: {err}\n{asm}"))
}

#[derive(Debug, Default)]
struct Machine {
  regs: HashMap<String, i64>,
  /// Top of stack is the last element; `[rsp + 8 * k]` is `k` from the end.
  stack: Vec<i64>,
  zero_flag: bool,
}

impl Machine {
  fn slot(&self, operand: &str) -> Result<Option<usize>, String> {
    let Some(inner) = operand
      .strip_prefix("QWORD [rsp + ")
      .and_then(|rest| rest.strip_suffix(']'))
    else {
      return Ok(None);
    };
    let offset: usize = inner.parse().map_err(|_| format!("bad offset in `{operand}`"))?;
    let depth = offset / 8;
    if offset % 8 != 0 || depth >= self.stack.len() {
      return Err(format!("`{operand}` is outside the stack ({} words)", self.stack.len()));
    }
    Ok(Some(self.stack.len() - 1 - depth))
  }

  fn read(&self, operand: &str) -> Result<i64, String> {
    if let Some(index) = self.slot(operand)? {
      return Ok(self.stack[index]);
    }
    if let Ok(value) = operand.parse::<i64>() {
      return Ok(value);
    }
    Ok(self.regs.get(operand).copied().unwrap_or(0))
  }

  fn write(&mut self, operand: &str, value: i64) -> Result<(), String> {
    if let Some(index) = self.slot(operand)? {
      self.stack[index] = value;
    } else {
      self.regs.insert(operand.to_string(), value);
    }
    Ok(())
  }

  fn reg(&self, name: &str) -> i64 {
    self.regs.get(name).copied().unwrap_or(0)
  }
}

/// Run assembly text until the exit syscall and return its status byte.
pub fn run(asm: &str) -> Result<u8, String> {
  let lines: Vec<&str> = asm.lines().map(str::trim).collect();
  let labels: HashMap<&str, usize> = lines
    .iter()
    .enumerate()
    .filter_map(|(index, line)| line.strip_suffix(':').map(|name| (name, index)))
    .collect();
  let jump = |label: &str| {
    labels
      .get(label)
      .copied()
      .ok_or_else(|| format!("unknown label `{label}`"))
  };

  let mut machine = Machine::default();
  let mut pc = 0;
  let mut steps = 0;

  while pc < lines.len() {
    steps += 1;
    if steps > STEP_LIMIT {
      return Err("step limit exceeded".to_string());
    }
    let line = lines[pc];
    pc += 1;
    if line.is_empty() || line.ends_with(':') || line.starts_with("global ") {
      continue;
    }

    let (mnemonic, rest) = line.split_once(' ').unwrap_or((line, ""));
    let ops: Vec<&str> = if rest.is_empty() {
      Vec::new()
    } else {
      rest.split(", ").collect()
    };

    match (mnemonic, ops.as_slice()) {
      ("mov", [dst, src]) => {
        let value = machine.read(src)?;
        machine.write(dst, value)?;
      }
      ("push", [src]) => {
        let value = machine.read(src)?;
        machine.stack.push(value);
      }
      ("pop", [dst]) => {
        let value = machine.stack.pop().ok_or("pop from an empty stack")?;
        machine.write(dst, value)?;
      }
      ("add", ["rsp", bytes]) => {
        let words = bytes.parse::<usize>().map_err(|e| e.to_string())? / 8;
        let len = machine
          .stack
          .len()
          .checked_sub(words)
          .ok_or("stack released below its base")?;
        machine.stack.truncate(len);
      }
      ("add", [dst, src]) => {
        let value = machine.read(dst)?.wrapping_add(machine.read(src)?);
        machine.write(dst, value)?;
      }
      ("sub", [dst, src]) => {
        let value = machine.read(dst)?.wrapping_sub(machine.read(src)?);
        machine.write(dst, value)?;
      }
      ("imul", [dst, src]) => {
        let value = machine.read(dst)?.wrapping_mul(machine.read(src)?);
        machine.write(dst, value)?;
      }
      ("cqo", []) => {
        let sign = if machine.reg("rax") < 0 { -1 } else { 0 };
        machine.write("rdx", sign)?;
      }
      ("idiv", [src]) => {
        let divisor = machine.read(src)?;
        if divisor == 0 {
          return Err("division by zero".to_string());
        }
        let dividend = machine.reg("rax");
        machine.write("rax", dividend.wrapping_div(divisor))?;
        machine.write("rdx", dividend.wrapping_rem(divisor))?;
      }
      ("test", [a, b]) => {
        machine.zero_flag = machine.read(a)? & machine.read(b)? == 0;
      }
      ("jz", [label]) => {
        if machine.zero_flag {
          pc = jump(*label)?;
        }
      }
      ("jmp", [label]) => pc = jump(*label)?,
      ("syscall", []) => {
        let number = machine.reg("rax");
        if number != 60 {
          return Err(format!("unsupported syscall {number}"));
        }
        return Ok(machine.reg("rdi") as u8);
      }
      _ => return Err(format!("unsupported instruction `{line}`")),
    }
  }

  Err("ran past the end of the program".to_string())
}
