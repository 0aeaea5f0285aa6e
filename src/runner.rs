use crate::error::SprigError;
use crate::evaluator::Evaluator;
use crate::lexer::tokenize;
use crate::parser::parse_program;
use crate::value::Value;
use std::io::Write;

/// Debug dumps emitted between pipeline stages.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub dump_tokens: bool,
    pub dump_ast: bool,
}

/// Lexes, parses and evaluates `source`, printing to stdout. On failure the
/// error is reported against `filename` and returned.
pub fn run(source: &str, filename: Option<&str>, options: RunOptions) -> Result<Value, SprigError> {
    let result = run_pipeline(source, &mut Evaluator::new(), options);

    if let Err(ref error) = result {
        println!("Error: {}", error);
        if let Err(io_error) = error.report(source, filename) {
            eprintln!("Error writing diagnostic: {}", io_error);
        }
    }

    result
}

/// Runs `source` with `print` output written to `out`. Nothing is reported.
pub fn run_with_output<W: Write>(source: &str, out: W) -> (Result<Value, SprigError>, W) {
    let mut evaluator = Evaluator::with_output(out);
    let result = run_pipeline(source, &mut evaluator, RunOptions::default());
    (result, evaluator.into_output())
}

/// Runs every stage against a caller-owned evaluator.
pub fn run_pipeline<W: Write>(
    source: &str,
    evaluator: &mut Evaluator<W>,
    options: RunOptions,
) -> Result<Value, SprigError> {
    // Lexical analysis
    let tokens = tokenize(source)?;
    if options.dump_tokens {
        let rendered: Vec<String> = tokens.iter().map(|t| t.to_string()).collect();
        println!("\nTokens: [{}]\n", rendered.join(", "));
    }

    // Parsing
    let program = parse_program(tokens)?;
    if options.dump_ast {
        println!("AST: {:#?}\n", program);
    }

    // Evaluation
    evaluator.evaluate_program(&program)
}
