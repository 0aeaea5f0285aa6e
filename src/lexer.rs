use crate::error::{Span, SprigError};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    // Single-character tokens
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Comma,
    Dot,
    Minus,
    Plus,
    Slash,
    Star,

    // One or two character tokens
    BangEqual,
    Equal,
    EqualEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,

    // Literals
    Identifier,
    String,
    Number,

    // Keywords
    And,
    Else,
    False,
    Fun,
    If,
    Not,
    Or,
    Print,
    Return,
    Then,
    True,
    While,

    // Special
    Eof,
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let text = match self {
            TokenType::LeftParen => "'('",
            TokenType::RightParen => "')'",
            TokenType::LeftBrace => "'{'",
            TokenType::RightBrace => "'}'",
            TokenType::LeftBracket => "'['",
            TokenType::RightBracket => "']'",
            TokenType::Comma => "','",
            TokenType::Dot => "'.'",
            TokenType::Minus => "'-'",
            TokenType::Plus => "'+'",
            TokenType::Slash => "'/'",
            TokenType::Star => "'*'",
            TokenType::BangEqual => "'!='",
            TokenType::Equal => "'='",
            TokenType::EqualEqual => "'=='",
            TokenType::Greater => "'>'",
            TokenType::GreaterEqual => "'>='",
            TokenType::Less => "'<'",
            TokenType::LessEqual => "'<='",
            TokenType::Identifier => "identifier",
            TokenType::String => "string",
            TokenType::Number => "number",
            TokenType::And => "'and'",
            TokenType::Else => "'else'",
            TokenType::False => "'false'",
            TokenType::Fun => "'fun'",
            TokenType::If => "'if'",
            TokenType::Not => "'not'",
            TokenType::Or => "'or'",
            TokenType::Print => "'print'",
            TokenType::Return => "'return'",
            TokenType::Then => "'then'",
            TokenType::True => "'true'",
            TokenType::While => "'while'",
            TokenType::Eof => "end of input",
        };
        write!(f, "{}", text)
    }
}

/// Literal payload carried by number and string tokens.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i64),
    Float(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub token_type: TokenType,
    pub lexeme: String,
    pub literal: Option<Literal>,
    pub span: Span,
}

impl Token {
    pub fn new(token_type: TokenType, lexeme: String, span: Span) -> Self {
        Self {
            token_type,
            lexeme,
            literal: None,
            span,
        }
    }

    pub fn with_literal(mut self, literal: Literal) -> Self {
        self.literal = Some(literal);
        self
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.literal {
            Some(Literal::Integer(n)) => write!(f, "{:?}({})", self.token_type, n),
            Some(Literal::Float(n)) => write!(f, "{:?}({:?})", self.token_type, n),
            Some(Literal::Text(s)) => write!(f, "{:?}({:?})", self.token_type, s),
            None if self.token_type == TokenType::Eof => write!(f, "Eof"),
            None => write!(f, "{:?}({:?})", self.token_type, self.lexeme),
        }
    }
}

/// Convenience wrapper around [`Lexer::scan_tokens`].
pub fn tokenize(source: &str) -> Result<Vec<Token>, SprigError> {
    Lexer::new(source).scan_tokens()
}

pub struct Lexer {
    source: Vec<char>,
    tokens: Vec<Token>,
    start: usize,
    current: usize,
    keywords: HashMap<&'static str, TokenType>,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        let mut keywords = HashMap::new();
        keywords.insert("and", TokenType::And);
        keywords.insert("else", TokenType::Else);
        keywords.insert("false", TokenType::False);
        keywords.insert("fun", TokenType::Fun);
        keywords.insert("if", TokenType::If);
        keywords.insert("not", TokenType::Not);
        keywords.insert("or", TokenType::Or);
        keywords.insert("print", TokenType::Print);
        keywords.insert("return", TokenType::Return);
        keywords.insert("then", TokenType::Then);
        keywords.insert("true", TokenType::True);
        keywords.insert("while", TokenType::While);

        Self {
            source: source.chars().collect(),
            tokens: Vec::new(),
            start: 0,
            current: 0,
            keywords,
        }
    }

    pub fn scan_tokens(mut self) -> Result<Vec<Token>, SprigError> {
        while !self.is_at_end() {
            self.start = self.current;
            self.scan_token()?;
        }

        self.tokens.push(Token::new(
            TokenType::Eof,
            String::new(),
            Span::new(self.current, self.current),
        ));

        Ok(self.tokens)
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn scan_token(&mut self) -> Result<(), SprigError> {
        let c = self.advance();

        match c {
            '(' => self.add_token(TokenType::LeftParen),
            ')' => self.add_token(TokenType::RightParen),
            '{' => self.add_token(TokenType::LeftBrace),
            '}' => self.add_token(TokenType::RightBrace),
            '[' => self.add_token(TokenType::LeftBracket),
            ']' => self.add_token(TokenType::RightBracket),
            ',' => self.add_token(TokenType::Comma),
            '-' => self.add_token(TokenType::Minus),
            '+' => self.add_token(TokenType::Plus),
            '*' => self.add_token(TokenType::Star),
            '/' => self.add_token(TokenType::Slash),
            '.' => {
                if self.peek().is_ascii_digit() {
                    self.number()?;
                } else {
                    self.add_token(TokenType::Dot);
                }
            }
            '!' => {
                // A lone '!' is the logical-not operator.
                let token_type = if self.match_char('=') {
                    TokenType::BangEqual
                } else {
                    TokenType::Not
                };
                self.add_token(token_type);
            }
            '=' => {
                let token_type = if self.match_char('=') {
                    TokenType::EqualEqual
                } else {
                    TokenType::Equal
                };
                self.add_token(token_type);
            }
            '<' => {
                let token_type = if self.match_char('=') {
                    TokenType::LessEqual
                } else {
                    TokenType::Less
                };
                self.add_token(token_type);
            }
            '>' => {
                let token_type = if self.match_char('=') {
                    TokenType::GreaterEqual
                } else {
                    TokenType::Greater
                };
                self.add_token(token_type);
            }
            '#' => {
                // Comment goes until end of line
                while self.peek() != '\n' && !self.is_at_end() {
                    self.advance();
                }
            }
            c if c.is_whitespace() => {}
            '"' => self.string()?,
            c if c.is_ascii_digit() => self.number()?,
            c if c.is_alphabetic() => self.identifier(),
            _ => {
                return Err(SprigError::lex_error(
                    Span::single(self.start),
                    format!("Unexpected character: '{}'", c),
                ));
            }
        }

        Ok(())
    }

    fn advance(&mut self) -> char {
        let c = self.peek();
        if !self.is_at_end() {
            self.current += 1;
        }
        c
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.is_at_end() || self.peek() != expected {
            false
        } else {
            self.current += 1;
            true
        }
    }

    fn peek(&self) -> char {
        self.source.get(self.current).copied().unwrap_or('\0')
    }

    fn peek_next(&self) -> char {
        self.source.get(self.current + 1).copied().unwrap_or('\0')
    }

    fn text(&self) -> String {
        self.source[self.start..self.current].iter().collect()
    }

    fn string(&mut self) -> Result<(), SprigError> {
        while self.peek() != '"' && !self.is_at_end() {
            self.advance();
        }

        if self.is_at_end() {
            return Err(SprigError::lex_error(
                Span::new(self.start, self.current),
                "Unterminated string literal",
            )
            .with_help("String literals must be closed with a matching '\"'."));
        }

        // Consume the closing "
        self.advance();

        // No escape processing: the content is the raw text between the quotes.
        let content: String = self.source[self.start + 1..self.current - 1]
            .iter()
            .collect();
        let lexeme = self.text();
        self.push(TokenType::String, lexeme, Some(Literal::Text(content)));
        Ok(())
    }

    fn number(&mut self) -> Result<(), SprigError> {
        // A leading '.' has already been consumed when the number starts with one.
        let mut is_float = self.source[self.start] == '.';

        while self.peek().is_ascii_digit() {
            self.advance();
        }

        // A trailing '.' belongs to the number: `5.` is the float 5.0.
        if !is_float && self.peek() == '.' {
            is_float = true;
            self.advance();

            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        let lexeme = self.text();

        let literal = if is_float {
            let value = lexeme.parse::<f64>().map_err(|_| {
                SprigError::lex_error(
                    Span::new(self.start, self.current),
                    format!("Invalid number: {}", lexeme),
                )
            })?;
            Literal::Float(value)
        } else {
            let value = lexeme.parse::<i64>().map_err(|_| {
                SprigError::lex_error(
                    Span::new(self.start, self.current),
                    format!("Integer literal out of range: {}", lexeme),
                )
            })?;
            Literal::Integer(value)
        };

        self.push(TokenType::Number, lexeme, Some(literal));
        Ok(())
    }

    fn identifier(&mut self) {
        while self.peek().is_alphanumeric() || self.peek() == '_' {
            self.advance();
        }

        let text = self.text();
        let token_type = self
            .keywords
            .get(text.to_lowercase().as_str())
            .copied()
            .unwrap_or(TokenType::Identifier);

        self.push(token_type, text, None);
    }

    fn add_token(&mut self, token_type: TokenType) {
        let text = self.text();
        self.push(token_type, text, None);
    }

    fn push(&mut self, token_type: TokenType, lexeme: String, literal: Option<Literal>) {
        let token = Token::new(token_type, lexeme, Span::new(self.start, self.current));
        self.tokens.push(match literal {
            Some(literal) => token.with_literal(literal),
            None => token,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn types(source: &str) -> Vec<TokenType> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.token_type)
            .collect()
    }

    #[test]
    fn two_character_operators_win_over_prefixes() {
        assert_eq!(
            types("== != <= >= = ! < >"),
            vec![
                TokenType::EqualEqual,
                TokenType::BangEqual,
                TokenType::LessEqual,
                TokenType::GreaterEqual,
                TokenType::Equal,
                TokenType::Not,
                TokenType::Less,
                TokenType::Greater,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn numbers_keep_integer_and_float_apart() {
        let tokens = tokenize("42 3.5 .25").unwrap();
        assert_eq!(tokens[0].literal, Some(Literal::Integer(42)));
        assert_eq!(tokens[1].literal, Some(Literal::Float(3.5)));
        assert_eq!(tokens[2].literal, Some(Literal::Float(0.25)));
    }

    #[test]
    fn trailing_dot_makes_a_float() {
        let tokens = tokenize("x = 5.").unwrap();
        assert_eq!(tokens[2].literal, Some(Literal::Float(5.0)));
        assert_eq!(tokens[2].lexeme, "5.");
        assert_eq!(tokens[3].token_type, TokenType::Eof);
    }

    #[test]
    fn dot_without_digit_is_member_access() {
        assert_eq!(
            types("xs.push_back(1)"),
            vec![
                TokenType::Identifier,
                TokenType::Dot,
                TokenType::Identifier,
                TokenType::LeftParen,
                TokenType::Number,
                TokenType::RightParen,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn keywords_match_case_insensitively() {
        assert_eq!(
            types("WHILE True fun Print"),
            vec![
                TokenType::While,
                TokenType::True,
                TokenType::Fun,
                TokenType::Print,
                TokenType::Eof,
            ]
        );
        let tokens = tokenize("Print").unwrap();
        assert_eq!(tokens[0].lexeme, "Print");
    }

    #[test]
    fn comments_and_whitespace_are_skipped() {
        assert_eq!(
            types("x # the rest is ignored = 1\n  y"),
            vec![TokenType::Identifier, TokenType::Identifier, TokenType::Eof]
        );
    }

    #[test]
    fn strings_are_raw() {
        let tokens = tokenize(r#""a\nb""#).unwrap();
        assert_eq!(tokens[0].literal, Some(Literal::Text("a\\nb".to_string())));
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let err = tokenize("\"abc").unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Lexical);
        assert!(err.message.contains("Unterminated"));
    }

    #[test]
    fn unexpected_character_names_it() {
        let err = tokenize("x = 1 @ 2").unwrap_err();
        assert_eq!(err.message, "Unexpected character: '@'");
        assert_eq!(err.span, Span::single(6));
    }

    #[test]
    fn underscore_cannot_start_an_identifier() {
        assert!(tokenize("_x").is_err());
        assert_eq!(tokenize("x_1").unwrap()[0].lexeme, "x_1");
    }
}
