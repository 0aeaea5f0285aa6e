use clap::{Arg, ArgAction, Command};
use sprig::runner::{self, RunOptions};
use std::fs;
use std::path::Path;
use std::process::ExitCode;

const DEFAULT_SCRIPT: &str = "expressions.txt";

fn main() -> ExitCode {
    let matches = Command::new("sprig")
        .version(env!("CARGO_PKG_VERSION"))
        .about("A small dynamically-typed scripting language")
        .arg(
            Arg::new("file")
                .help("The script file to execute")
                .value_name("FILE")
                .index(1),
        )
        .arg(
            Arg::new("interactive")
                .short('i')
                .long("interactive")
                .help("Start in interactive REPL mode")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("tokens")
                .long("tokens")
                .help("Print the token stream before evaluating")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("ast")
                .long("ast")
                .help("Print the parsed program before evaluating")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let file = matches.get_one::<String>("file");

    if matches.get_flag("interactive") && file.is_none() {
        sprig::repl::start();
        return ExitCode::SUCCESS;
    }

    let options = RunOptions {
        dump_tokens: matches.get_flag("tokens"),
        dump_ast: matches.get_flag("ast"),
    };

    let path = file.map(String::as_str).unwrap_or(DEFAULT_SCRIPT);
    run_file(path, options)
}

fn run_file(path: &str, options: RunOptions) -> ExitCode {
    let path = Path::new(path);

    if !path.exists() {
        eprintln!("Error: File '{}' not found", path.display());
        return ExitCode::FAILURE;
    }

    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error reading file '{}': {}", path.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let filename = path.display().to_string();
    match runner::run(&source, Some(&filename), options) {
        Ok(_) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}
