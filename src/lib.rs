// sprig: lexer, recursive-descent parser and tree-walking evaluator for a
// small dynamically-typed scripting language.

// Public modules
pub mod ast;
pub mod error;
pub mod evaluator;
pub mod lexer;
pub mod parser;
pub mod repl;
pub mod runner;
pub mod scope;
pub mod value;

// Re-export commonly used items
pub use ast::{Block, Expr, Stmt};
pub use error::{ErrorKind, Span, SprigError};
pub use evaluator::{Evaluator, Flow};
pub use lexer::{tokenize, Lexer, Token, TokenType};
pub use parser::{parse_program, Parser};
pub use scope::Scope;
pub use value::Value;

// Re-export main functions
pub use repl::start as start_repl;
pub use runner::{run, run_with_output, RunOptions};
