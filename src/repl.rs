use crate::ast::{Expr, Stmt};
use crate::error::SprigError;
use crate::evaluator::Evaluator;
use crate::lexer::tokenize;
use crate::parser::parse_program;
use std::io::{self, BufRead, Write};

const PROMPT: &str = "sprig> ";

/// Interactive loop over stdin. State persists between lines.
pub fn start() {
    println!("sprig interpreter v{}", env!("CARGO_PKG_VERSION"));
    println!("Type 'vars' to list variables, 'exit' or Ctrl+D to quit");
    println!();

    let stdin = io::stdin();
    let mut evaluator = Evaluator::new();
    let mut lines = stdin.lock().lines();

    loop {
        print!("{}", PROMPT);
        if io::stdout().flush().is_err() {
            break;
        }

        let line = match lines.next() {
            Some(Ok(line)) => line,
            Some(Err(error)) => {
                eprintln!("Error reading input: {}", error);
                break;
            }
            None => {
                // EOF reached (Ctrl+D or piped input ended)
                println!();
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            println!("Goodbye!");
            break;
        }
        if line.eq_ignore_ascii_case("vars") {
            for binding in list_globals(&evaluator) {
                println!("{}", binding);
            }
            continue;
        }

        if let Some(echo) = run_repl_command(line, &mut evaluator) {
            println!("{}", echo);
        }
    }
}

/// Evaluates one line; returns the text to echo, if any.
fn run_repl_command<W: Write>(source: &str, evaluator: &mut Evaluator<W>) -> Option<String> {
    let program = match tokenize(source).and_then(parse_program) {
        Ok(program) => program,
        Err(error) => {
            report_error(source, &error);
            return None;
        }
    };

    // Echo bare expressions, but not assignments.
    let echo = matches!(
        program.statements.as_slice(),
        [Stmt::Expression { expr, .. }] if !matches!(expr, Expr::Assign { .. })
    );

    match evaluator.evaluate_program(&program) {
        Ok(value) if echo => Some(value.to_string()),
        Ok(_) => None,
        Err(error) => {
            report_error(source, &error);
            None
        }
    }
}

/// `name = value` for every global, sorted by name.
fn list_globals<W: Write>(evaluator: &Evaluator<W>) -> Vec<String> {
    let globals = evaluator.globals();
    globals
        .names()
        .into_iter()
        .filter_map(|name| globals.get(name).map(|value| format!("{} = {}", name, value)))
        .collect()
}

fn report_error(source: &str, error: &SprigError) {
    println!("Error: {}", error);
    if let Err(io_error) = error.report(source, None) {
        eprintln!("Error writing diagnostic: {}", io_error);
    }
}
