use crate::ast::{AssignTarget, BinaryOp, Block, Expr, FunctionDecl, Stmt, UnaryOp};
use crate::error::{ErrorKind, Span, SprigError};
use crate::lexer::{Literal, Token, TokenType};
use crate::value::Value;
use std::rc::Rc;

/// Parses a whole token stream into the program's top-level block.
pub fn parse_program(tokens: Vec<Token>) -> Result<Block, SprigError> {
    Parser::new(tokens).parse_program()
}

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

type Rule = fn(&mut Parser) -> Result<Expr, SprigError>;

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        // Every stream must end in Eof, even one built by hand.
        if tokens.last().map(|t| t.token_type) != Some(TokenType::Eof) {
            let end = tokens.last().map(|t| t.span.end).unwrap_or(0);
            tokens.push(Token::new(TokenType::Eof, String::new(), Span::new(end, end)));
        }
        Self { tokens, current: 0 }
    }

    /// Consumes statements until end of input.
    pub fn parse_program(&mut self) -> Result<Block, SprigError> {
        let start = self.peek().span.start;
        let mut statements = Vec::new();

        while !self.is_at_end() {
            statements.push(self.statement()?);
        }

        Ok(Block {
            statements,
            span: Span::new(start, self.peek().span.end),
        })
    }

    /// Parses exactly one statement.
    pub fn parse(&mut self) -> Result<Stmt, SprigError> {
        self.statement()
    }

    fn statement(&mut self) -> Result<Stmt, SprigError> {
        match self.peek().token_type {
            TokenType::Return => self.return_statement(),
            TokenType::Fun => self.function_declaration(),
            TokenType::LeftBrace => Ok(Stmt::Block(self.block()?)),
            TokenType::Print => self.print_statement(),
            TokenType::While => self.while_statement(),
            TokenType::If => self.if_statement(),
            _ => self.expression_statement(),
        }
    }

    fn return_statement(&mut self) -> Result<Stmt, SprigError> {
        let keyword = self.advance().span;
        let value = self.operand_after("return", Self::expression)?;
        Ok(Stmt::Return {
            span: keyword.to(value.span()),
            value,
        })
    }

    fn print_statement(&mut self) -> Result<Stmt, SprigError> {
        let keyword = self.advance().span;
        let expr = self.operand_after("print", Self::expression)?;
        Ok(Stmt::Print {
            span: keyword.to(expr.span()),
            expr,
        })
    }

    fn function_declaration(&mut self) -> Result<Stmt, SprigError> {
        let keyword = self.advance().span;

        let name = self
            .consume_with_help(
                TokenType::Identifier,
                "after 'fun'",
                "Function declarations look like: fun name(a, b) { ... }",
            )?
            .lexeme
            .clone();

        self.consume_with_help(
            TokenType::LeftParen,
            "after function name",
            "Function declarations need a parameter list, even an empty one: fun name() { ... }",
        )?;

        let mut params = Vec::new();
        if !self.check(TokenType::RightParen) {
            loop {
                let param = self.consume_with_help(
                    TokenType::Identifier,
                    "in parameter list",
                    "Parameters must be bare names separated by commas.",
                )?;
                params.push(param.lexeme.clone());
                if !self.match_types(&[TokenType::Comma]) {
                    break;
                }
            }
        }

        self.consume(TokenType::RightParen, "after parameters")?;

        if !self.check(TokenType::LeftBrace) {
            return Err(self.expected(TokenType::LeftBrace, "before function body").with_help(
                "Function bodies must be enclosed in braces: fun name() { ... }",
            ));
        }
        let body = self.block()?;

        Ok(Stmt::Function(Rc::new(FunctionDecl {
            name,
            params,
            span: keyword.to(body.span),
            body,
        })))
    }

    fn block(&mut self) -> Result<Block, SprigError> {
        let open = self.consume(TokenType::LeftBrace, "to start block")?.span;
        let mut statements = Vec::new();

        while !self.check(TokenType::RightBrace) && !self.is_at_end() {
            statements.push(self.statement()?);
        }

        let close = self
            .consume_with_help(
                TokenType::RightBrace,
                "after block",
                "Block statements must be closed with '}' after the opening '{'.",
            )?
            .span;

        Ok(Block {
            statements,
            span: open.to(close),
        })
    }

    fn if_statement(&mut self) -> Result<Stmt, SprigError> {
        let keyword = self.advance().span;
        let condition = self.operand_after("if", Self::expression)?;

        self.consume_with_help(
            TokenType::Then,
            "after if condition",
            "If statements look like: if condition then statement else statement",
        )?;

        // Each branch is a single statement, so a trailing 'else' binds to the nearest 'then'.
        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.match_types(&[TokenType::Else]) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        let end = match &else_branch {
            Some(else_stmt) => else_stmt.span(),
            None => then_branch.span(),
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
            span: keyword.to(end),
        })
    }

    fn while_statement(&mut self) -> Result<Stmt, SprigError> {
        let keyword = self.advance().span;
        let condition = self.operand_after("while", Self::expression)?;
        let body = Box::new(self.statement()?);

        Ok(Stmt::While {
            span: keyword.to(body.span()),
            condition,
            body,
        })
    }

    fn expression_statement(&mut self) -> Result<Stmt, SprigError> {
        let expr = self.expression()?;
        Ok(Stmt::Expression {
            span: expr.span(),
            expr,
        })
    }

    fn expression(&mut self) -> Result<Expr, SprigError> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Expr, SprigError> {
        let expr = self.or()?;

        if self.match_types(&[TokenType::Equal]) {
            // Right-associative: a = b = c assigns c to b, then to a.
            let value = self.operand_after("=", Self::assignment)?;
            let span = expr.span().to(value.span());

            let target = match expr {
                Expr::Variable { name, span } => AssignTarget::Variable { name, span },
                Expr::Index { list, index, span } => AssignTarget::Index { list, index, span },
                other => {
                    return Err(SprigError::new(
                        ErrorKind::InvalidAssignmentTarget,
                        other.span(),
                        "Invalid assignment target",
                    )
                    .with_help(
                        "Only variables and list elements can be assigned to. Examples: 'x = 10' or 'xs[0] = 10'",
                    ));
                }
            };

            return Ok(Expr::Assign {
                target,
                value: Box::new(value),
                span,
            });
        }

        Ok(expr)
    }

    fn or(&mut self) -> Result<Expr, SprigError> {
        self.binary_chain(&[(TokenType::Or, BinaryOp::Or)], Self::and)
    }

    fn and(&mut self) -> Result<Expr, SprigError> {
        self.binary_chain(&[(TokenType::And, BinaryOp::And)], Self::equality)
    }

    fn equality(&mut self) -> Result<Expr, SprigError> {
        self.binary_chain(
            &[
                (TokenType::EqualEqual, BinaryOp::Equal),
                (TokenType::BangEqual, BinaryOp::NotEqual),
            ],
            Self::comparison,
        )
    }

    fn comparison(&mut self) -> Result<Expr, SprigError> {
        self.binary_chain(
            &[
                (TokenType::Less, BinaryOp::Less),
                (TokenType::Greater, BinaryOp::Greater),
                (TokenType::LessEqual, BinaryOp::LessEqual),
                (TokenType::GreaterEqual, BinaryOp::GreaterEqual),
            ],
            Self::term,
        )
    }

    fn term(&mut self) -> Result<Expr, SprigError> {
        self.binary_chain(
            &[
                (TokenType::Plus, BinaryOp::Add),
                (TokenType::Minus, BinaryOp::Subtract),
            ],
            Self::factor,
        )
    }

    fn factor(&mut self) -> Result<Expr, SprigError> {
        self.binary_chain(
            &[
                (TokenType::Star, BinaryOp::Multiply),
                (TokenType::Slash, BinaryOp::Divide),
            ],
            Self::unary,
        )
    }

    /// Left-associative loop shared by every binary precedence level.
    fn binary_chain(
        &mut self,
        operators: &[(TokenType, BinaryOp)],
        next: Rule,
    ) -> Result<Expr, SprigError> {
        let mut expr = next(self)?;

        while let Some(&(_, operator)) = operators
            .iter()
            .find(|(token_type, _)| self.check(*token_type))
        {
            let operator_token = self.advance().lexeme.clone();
            let right = self.operand_after(&operator_token, next)?;
            let span = expr.span().to(right.span());

            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
                span,
            };
        }

        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expr, SprigError> {
        if self.match_types(&[TokenType::Minus, TokenType::Not]) {
            let operator_token = self.previous().clone();
            let operator = UnaryOp::from_token(&operator_token)?;

            let operand = self.operand_after(&operator_token.lexeme, Self::unary)?;

            return Ok(Expr::Unary {
                span: operator_token.span.to(operand.span()),
                operator,
                operand: Box::new(operand),
            });
        }

        self.postfix()
    }

    /// Calls, member calls and indexing, composed left to right.
    fn postfix(&mut self) -> Result<Expr, SprigError> {
        let mut expr = self.primary()?;

        loop {
            if self.check(TokenType::LeftParen) {
                let (args, close) = self.arguments()?;
                expr = Expr::Call {
                    span: expr.span().to(close),
                    callee: Box::new(expr),
                    args,
                };
            } else if self.match_types(&[TokenType::Dot]) {
                let member = self
                    .consume(TokenType::Identifier, "after '.'")?
                    .lexeme
                    .clone();

                if !self.check(TokenType::LeftParen) {
                    return Err(self
                        .expected(TokenType::LeftParen, &format!("after member name '{}'", member))
                        .with_help("Members can only be called, e.g. xs.push_back(1)"));
                }

                let (args, close) = self.arguments()?;
                expr = Expr::MemberCall {
                    span: expr.span().to(close),
                    object: Box::new(expr),
                    member,
                    args,
                };
            } else if self.match_types(&[TokenType::LeftBracket]) {
                let index = self.operand_after("[", Self::expression)?;
                let close = self
                    .consume_with_help(
                        TokenType::RightBracket,
                        "after index",
                        "List indexing must be closed with ']'. Example: xs[0]",
                    )?
                    .span;

                expr = Expr::Index {
                    span: expr.span().to(close),
                    list: Box::new(expr),
                    index: Box::new(index),
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    /// Parenthesized, comma-separated argument list. Returns the span of ')'.
    fn arguments(&mut self) -> Result<(Vec<Expr>, Span), SprigError> {
        self.consume(TokenType::LeftParen, "before arguments")?;
        let mut args = Vec::new();

        if !self.check(TokenType::RightParen) {
            loop {
                args.push(self.operand_after("(", Self::expression)?);
                if !self.match_types(&[TokenType::Comma]) {
                    break;
                }
            }
        }

        let close = self
            .consume_with_help(
                TokenType::RightParen,
                "after arguments",
                "Calls must be closed with ')' after the arguments. Example: f(a, b)",
            )?
            .span;

        Ok((args, close))
    }

    fn primary(&mut self) -> Result<Expr, SprigError> {
        let token = self.peek().clone();

        let expr = match token.token_type {
            TokenType::Number => {
                self.advance();
                let value = match token.literal {
                    Some(Literal::Integer(n)) => Value::Int(n),
                    Some(Literal::Float(n)) => Value::Float(n),
                    _ => {
                        return Err(SprigError::parse_error(
                            token.span,
                            format!("Invalid number '{}'", token.lexeme),
                        ))
                    }
                };
                Expr::Literal {
                    value,
                    span: token.span,
                }
            }
            TokenType::String => {
                self.advance();
                let text = match token.literal {
                    Some(Literal::Text(text)) => text,
                    _ => token.lexeme.trim_matches('"').to_string(),
                };
                Expr::Literal {
                    value: Value::Str(text),
                    span: token.span,
                }
            }
            TokenType::True | TokenType::False => {
                self.advance();
                Expr::Literal {
                    value: Value::Bool(token.token_type == TokenType::True),
                    span: token.span,
                }
            }
            TokenType::Identifier => {
                self.advance();
                Expr::Variable {
                    name: token.lexeme,
                    span: token.span,
                }
            }
            TokenType::LeftParen => {
                self.advance();
                let expr = self.operand_after("(", Self::expression)?;
                self.consume_with_help(
                    TokenType::RightParen,
                    "after expression",
                    "Every opening parenthesis '(' must have a matching closing parenthesis ')'.",
                )?;
                expr
            }
            TokenType::LeftBracket => {
                self.advance();
                self.list_literal(token.span)?
            }
            _ => {
                let help_msg = match token.token_type {
                    TokenType::RightParen => "Found ')' without matching '('. Check for unbalanced parentheses.",
                    TokenType::RightBrace => "Found '}' without matching '{'. Check for unbalanced braces.",
                    TokenType::RightBracket => "Found ']' without matching '['. Check for unbalanced brackets.",
                    TokenType::Eof => "Reached end of input while expecting an expression.",
                    _ => "Expected a literal value, variable, list or parenthesized expression here.",
                };

                return Err(SprigError::parse_error_with_help(
                    token.span,
                    format!("Expected expression, found {}", describe(&token)),
                    help_msg,
                ));
            }
        };

        Ok(expr)
    }

    fn list_literal(&mut self, open: Span) -> Result<Expr, SprigError> {
        let mut elements = Vec::new();

        if !self.check(TokenType::RightBracket) {
            loop {
                elements.push(self.operand_after("[", Self::expression)?);
                if !self.match_types(&[TokenType::Comma]) {
                    break;
                }
            }
        }

        let close = self
            .consume_with_help(
                TokenType::RightBracket,
                "after list elements",
                "List literals must be closed with ']' after the opening '['. Example: [1, 2, 3]",
            )?
            .span;

        Ok(Expr::List {
            elements,
            span: open.to(close),
        })
    }

    /// Parses an operand with `rule`, reporting a missing one against `after`.
    fn operand_after(&mut self, after: &str, rule: Rule) -> Result<Expr, SprigError> {
        if !self.starts_expression() {
            let token = self.peek();
            return Err(SprigError::parse_error_with_help(
                token.span,
                format!("Expected expression after '{}', found {}", after, describe(token)),
                "Operators and keywords like 'print' and 'return' need an expression to work on.",
            ));
        }
        rule(self)
    }

    fn starts_expression(&self) -> bool {
        matches!(
            self.peek().token_type,
            TokenType::Number
                | TokenType::String
                | TokenType::True
                | TokenType::False
                | TokenType::Identifier
                | TokenType::LeftParen
                | TokenType::LeftBracket
                | TokenType::Minus
                | TokenType::Not
        )
    }

    fn match_types(&mut self, types: &[TokenType]) -> bool {
        for token_type in types {
            if self.check(*token_type) {
                self.advance();
                return true;
            }
        }
        false
    }

    fn check(&self, token_type: TokenType) -> bool {
        self.peek().token_type == token_type
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn is_at_end(&self) -> bool {
        self.peek().token_type == TokenType::Eof
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    fn consume(&mut self, token_type: TokenType, context: &str) -> Result<&Token, SprigError> {
        if self.check(token_type) {
            Ok(self.advance())
        } else {
            Err(self.expected(token_type, context))
        }
    }

    fn consume_with_help(
        &mut self,
        token_type: TokenType,
        context: &str,
        help: &str,
    ) -> Result<&Token, SprigError> {
        if self.check(token_type) {
            Ok(self.advance())
        } else {
            Err(self.expected(token_type, context).with_help(help))
        }
    }

    /// Mismatch error naming the expected and the actual token.
    fn expected(&self, token_type: TokenType, context: &str) -> SprigError {
        let found = self.peek();

        // At end of input, point just past the last real token.
        let error_span = if self.is_at_end() && self.current > 0 {
            Span::single(self.tokens[self.current - 1].span.end)
        } else {
            found.span
        };

        SprigError::parse_error(
            error_span,
            format!("Expected {} {}, found {}", token_type, context, describe(found)),
        )
    }
}

fn describe(token: &Token) -> String {
    match token.token_type {
        TokenType::Identifier => format!("identifier '{}'", token.lexeme),
        TokenType::Number => format!("number {}", token.lexeme),
        TokenType::String => format!("string {}", token.lexeme),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use pretty_assertions::assert_eq;

    fn parse_source(source: &str) -> Result<Block, SprigError> {
        parse_program(tokenize(source)?)
    }

    fn single_expr(source: &str) -> Expr {
        let mut block = parse_source(source).unwrap();
        assert_eq!(block.statements.len(), 1);
        match block.statements.remove(0) {
            Stmt::Expression { expr, .. } => expr,
            other => panic!("expected expression statement, got {:?}", other),
        }
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        match single_expr("1 + 2 * 3") {
            Expr::Binary {
                operator: BinaryOp::Add,
                right,
                ..
            } => assert!(matches!(
                *right,
                Expr::Binary {
                    operator: BinaryOp::Multiply,
                    ..
                }
            )),
            other => panic!("unexpected tree {:?}", other),
        }
    }

    #[test]
    fn or_binds_looser_than_and() {
        match single_expr("a or b and c") {
            Expr::Binary {
                operator: BinaryOp::Or,
                right,
                ..
            } => assert!(matches!(
                *right,
                Expr::Binary {
                    operator: BinaryOp::And,
                    ..
                }
            )),
            other => panic!("unexpected tree {:?}", other),
        }
    }

    #[test]
    fn assignment_is_right_associative() {
        match single_expr("a = b = 1") {
            Expr::Assign {
                target: AssignTarget::Variable { name, .. },
                value,
                ..
            } => {
                assert_eq!(name, "a");
                assert!(matches!(
                    *value,
                    Expr::Assign {
                        target: AssignTarget::Variable { .. },
                        ..
                    }
                ));
            }
            other => panic!("unexpected tree {:?}", other),
        }
    }

    #[test]
    fn index_assignment_target() {
        assert!(matches!(
            single_expr("xs[0] = 1"),
            Expr::Assign {
                target: AssignTarget::Index { .. },
                ..
            }
        ));
    }

    #[test]
    fn invalid_assignment_target_is_rejected() {
        let err = parse_source("1 + 2 = 3").unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidAssignmentTarget);
        let err = parse_source("f() = 3").unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidAssignmentTarget);
    }

    #[test]
    fn postfix_chain_nests_in_source_order() {
        // a.b(c)[0](d) => Call(Index(MemberCall(a, b, [c]), 0), [d])
        match single_expr("a.b(c)[0](d)") {
            Expr::Call { callee, args, .. } => {
                assert_eq!(args.len(), 1);
                match *callee {
                    Expr::Index { list, .. } => match *list {
                        Expr::MemberCall { object, member, .. } => {
                            assert_eq!(member, "b");
                            assert!(matches!(*object, Expr::Variable { .. }));
                        }
                        other => panic!("expected member call, got {:?}", other),
                    },
                    other => panic!("expected index, got {:?}", other),
                }
            }
            other => panic!("expected call, got {:?}", other),
        }
    }

    #[test]
    fn dangling_else_binds_to_nearest_then() {
        let block = parse_source("if a then if b then x = 1 else x = 2").unwrap();
        match &block.statements[0] {
            Stmt::If {
                then_branch,
                else_branch,
                ..
            } => {
                assert!(else_branch.is_none());
                assert!(matches!(
                    **then_branch,
                    Stmt::If {
                        else_branch: Some(_),
                        ..
                    }
                ));
            }
            other => panic!("expected if, got {:?}", other),
        }
    }

    #[test]
    fn function_declaration_with_params() {
        let block = parse_source("fun add(a, b) { return a + b }").unwrap();
        match &block.statements[0] {
            Stmt::Function(decl) => {
                assert_eq!(decl.name, "add");
                assert_eq!(decl.params, vec!["a".to_string(), "b".to_string()]);
                assert_eq!(decl.body.statements.len(), 1);
            }
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn while_accepts_single_statement_body() {
        let block = parse_source("while i < 3 i = i + 1").unwrap();
        assert!(matches!(block.statements[0], Stmt::While { .. }));
    }

    #[test]
    fn parse_reads_a_single_statement() {
        let mut parser = Parser::new(tokenize("print 1 print 2").unwrap());
        assert!(matches!(parser.parse().unwrap(), Stmt::Print { .. }));
        assert!(matches!(parser.parse().unwrap(), Stmt::Print { .. }));
    }

    #[test]
    fn mismatch_names_expected_and_actual() {
        let err = parse_source("if x print 1").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Syntax);
        assert_eq!(err.message, "Expected 'then' after if condition, found 'print'");
    }

    #[test]
    fn member_without_call_is_rejected() {
        let err = parse_source("xs.size").unwrap_err();
        assert!(err.message.starts_with("Expected '(' after member name 'size'"));
    }

    #[test]
    fn hand_built_stream_gets_an_eof() {
        let tokens = vec![Token::new(TokenType::Identifier, "x".to_string(), Span::new(0, 1))];
        let block = parse_program(tokens).unwrap();
        assert_eq!(block.statements.len(), 1);
    }
}
