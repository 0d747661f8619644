mod driver;

use std::path::PathBuf;
use std::process;

use clap::{command, value_parser, Arg, ArgAction, ArgMatches};
use log::{debug, error};

use driver::Options;

fn main() {
  let args = process_arguments();
  let verbosity = args.get_count("verbose");
  initialize_logging(verbosity);

  let options = Options {
    input: args
      .get_one::<PathBuf>("INPUT")
      .cloned()
      .unwrap_or_default(),
    output: args.get_one::<PathBuf>("output").cloned(),
    to_stdout: args.get_flag("stdout"),
    link: args.get_flag("link"),
  };
  debug!("options: {options:?} (verbosity {verbosity})");

  if let Err(err) = driver::run(&options) {
    error!("{err}");
    process::exit(1);
  }
}

fn process_arguments() -> ArgMatches {
  command!()
    .arg(
      Arg::new("INPUT")
        .help("Helium source file to compile")
        .required(true)
        .index(1)
        .value_parser(value_parser!(PathBuf)),
    )
    .arg(
      Arg::new("verbose")
        .short('v')
        .action(ArgAction::Count)
        .help("Sets the level of verbosity"),
    )
    .arg(
      Arg::new("output")
        .short('o')
        .long("output")
        .value_parser(value_parser!(PathBuf))
        .help("Write the assembly to this file"),
    )
    .arg(
      Arg::new("stdout")
        .long("stdout")
        .action(ArgAction::SetTrue)
        .conflicts_with("output")
        .help("Print the assembly to STDOUT instead of writing a file"),
    )
    .arg(
      Arg::new("link")
        .long("link")
        .action(ArgAction::SetTrue)
        .conflicts_with("stdout")
        .help("Assemble with nasm and link with ld into an executable"),
    )
    .get_matches()
}

fn initialize_logging(verbosity: u8) {
  fern::Dispatch::new()
    .format(|out, message, record| {
      out.finish(format_args!(
        "{}[{}][{}] {}",
        chrono::Local::now().format("[%Y-%m-%d][%H:%M:%S]"),
        record.target(),
        record.level(),
        message
      ))
    })
    .level(match verbosity {
      0 => log::LevelFilter::Error,
      1 => log::LevelFilter::Warn,
      2 => log::LevelFilter::Info,
      _ => log::LevelFilter::Debug,
    })
    .chain(std::io::stderr())
    .apply()
    .ok();
}
