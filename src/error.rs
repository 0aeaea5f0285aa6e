use ariadne::{Color, Fmt, Label, Report, ReportKind, Source};
use std::io;
use thiserror::Error;

/// Character offsets into the source text, half-open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn single(pos: usize) -> Self {
        Self {
            start: pos,
            end: pos + 1,
        }
    }

    /// Smallest span covering both `self` and `other`.
    pub fn to(&self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }
}

/// Pipeline stage an error was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Lex,
    Parse,
    Runtime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Lexical,
    Syntax,
    UndefinedVariable,
    InvalidAssignmentTarget,
    TypeMismatch,
    IndexError,
    ArityMismatch,
    NotCallable,
    UnknownMember,
    UnknownOperator,
    UnknownExpression,
    DivisionByZero,
    Output,
}

impl ErrorKind {
    pub fn stage(&self) -> Stage {
        match self {
            ErrorKind::Lexical => Stage::Lex,
            // Assignment targets are validated while parsing.
            ErrorKind::Syntax | ErrorKind::InvalidAssignmentTarget => Stage::Parse,
            _ => Stage::Runtime,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ErrorKind::Lexical => "Lexical Error",
            ErrorKind::Syntax => "Syntax Error",
            ErrorKind::UndefinedVariable => "Undefined Variable",
            ErrorKind::InvalidAssignmentTarget => "Invalid Assignment Target",
            ErrorKind::TypeMismatch => "Type Mismatch",
            ErrorKind::IndexError => "Index Error",
            ErrorKind::ArityMismatch => "Arity Mismatch",
            ErrorKind::NotCallable => "Not Callable",
            ErrorKind::UnknownMember => "Unknown Member",
            ErrorKind::UnknownOperator => "Unknown Operator",
            ErrorKind::UnknownExpression => "Unknown Expression",
            ErrorKind::DivisionByZero => "Division By Zero",
            ErrorKind::Output => "Output Error",
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct SprigError {
    pub kind: ErrorKind,
    pub span: Span,
    pub message: String,
    pub help: Option<String>,
}

impl SprigError {
    pub fn new(kind: ErrorKind, span: Span, message: impl Into<String>) -> Self {
        Self {
            kind,
            span,
            message: message.into(),
            help: None,
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn lex_error(span: Span, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Lexical, span, message)
    }

    pub fn parse_error(span: Span, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Syntax, span, message)
    }

    pub fn parse_error_with_help(
        span: Span,
        message: impl Into<String>,
        help: impl Into<String>,
    ) -> Self {
        Self::parse_error(span, message).with_help(help)
    }

    pub fn runtime_error(kind: ErrorKind, span: Span, message: impl Into<String>) -> Self {
        Self::new(kind, span, message)
    }

    pub fn stage(&self) -> Stage {
        self.kind.stage()
    }

    /// Writes a labelled diagnostic for this error to stderr.
    pub fn report(&self, source: &str, filename: Option<&str>) -> io::Result<()> {
        let filename = filename.unwrap_or("<repl>");

        let color = match self.stage() {
            Stage::Lex => Color::Red,
            Stage::Parse => Color::Yellow,
            Stage::Runtime => Color::Magenta,
        };

        // Errors at end of input point one past the last character.
        let len = source.chars().count();
        let start = self.span.start.min(len);
        let end = self.span.end.clamp(start, len.max(start));

        let mut report_builder = Report::build(ReportKind::Error, filename, start)
            .with_message(format!("{}: {}", self.kind.label().fg(color), self.message))
            .with_label(
                Label::new((filename, start..end))
                    .with_message(&self.message)
                    .with_color(color),
            );

        if let Some(ref help_text) = self.help {
            report_builder =
                report_builder.with_note(format!("{}: {}", "help".fg(Color::Cyan), help_text));
        }

        report_builder
            .finish()
            .eprint((filename, Source::from(source)))
    }
}
