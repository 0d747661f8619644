//! Command-line driver: reads a source file, compiles it, and writes the
//! assembly out. Optionally hands the result to `nasm` and `ld`.

use std::fs;
use std::path::PathBuf;
use std::process::{Command, ExitStatus};

use log::{debug, info};
use snafu::{ensure, ResultExt, Snafu};

#[derive(Debug, Snafu)]
pub enum DriverError {
  #[snafu(display("unable to read input file `{}`: {source}", path.display()))]
  Read { path: PathBuf, source: std::io::Error },

  #[snafu(display("unable to write output file `{}`: {source}", path.display()))]
  Write { path: PathBuf, source: std::io::Error },

  #[snafu(display("{source}"))]
  Compile { source: helium::CompileError },

  #[snafu(display("unable to run `{tool}`: {source}"))]
  Spawn { tool: String, source: std::io::Error },

  #[snafu(display("`{tool}` failed with {status}"))]
  Tool { tool: String, status: ExitStatus },
}

/// Settings gathered from the command line.
#[derive(Debug, Clone)]
pub struct Options {
  pub input: PathBuf,
  /// Assembly destination; defaults to the input with an `.asm` extension.
  pub output: Option<PathBuf>,
  /// Print the assembly instead of writing a file.
  pub to_stdout: bool,
  /// Assemble and link into an executable next to the input.
  pub link: bool,
}

impl Options {
  pub fn asm_path(&self) -> PathBuf {
    self
      .output
      .clone()
      .unwrap_or_else(|| self.input.with_extension("asm"))
  }

  pub fn object_path(&self) -> PathBuf {
    self.asm_path().with_extension("o")
  }

  pub fn executable_path(&self) -> PathBuf {
    let path = self.input.with_extension("");
    if path == self.input {
      // Extensionless input: don't clobber the source.
      self.input.with_extension("out")
    } else {
      path
    }
  }
}

pub fn run(options: &Options) -> Result<(), DriverError> {
  let source = fs::read_to_string(&options.input).context(ReadSnafu {
    path: &options.input,
  })?;
  debug!("read {} byte(s) from `{}`", source.len(), options.input.display());

  let asm = helium::compile(&source).context(CompileSnafu)?;

  if options.to_stdout {
    print!("{asm}");
    return Ok(());
  }

  let asm_path = options.asm_path();
  fs::write(&asm_path, &asm).context(WriteSnafu { path: &asm_path })?;
  info!("wrote assembly to `{}`", asm_path.display());

  if options.link {
    let object = options.object_path();
    let executable = options.executable_path();
    run_tool(
      Command::new("nasm")
        .arg("-felf64")
        .arg(&asm_path)
        .arg("-o")
        .arg(&object),
      "nasm",
    )?;
    run_tool(Command::new("ld").arg("-o").arg(&executable).arg(&object), "ld")?;
    info!("linked executable `{}`", executable.display());
  }

  Ok(())
}

fn run_tool(command: &mut Command, tool: &str) -> Result<(), DriverError> {
  debug!("running {command:?}");
  let status = command.status().context(SpawnSnafu { tool })?;
  ensure!(status.success(), ToolSnafu { tool, status });
  Ok(())
}
