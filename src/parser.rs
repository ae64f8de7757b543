//! Recursive-descent parser with precedence climbing for binary operators.
//!
//! The parser walks a fully materialised token vector with a single cursor
//! that only moves forward. One token of lookahead is enough everywhere: a
//! call is recognised by an identifier directly followed by `(`.

use crate::ast::{
    BinaryOperator, Body, Expression, Function, FunctionSignature, Program, Statement,
};
use crate::token::{Token, TokenKind};

mod error;
mod precedence;

pub use error::{ParseError, ParseResult};
pub use precedence::PrecedenceTable;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseOptions {
    pub precedence: PrecedenceTable,
}

pub struct Parser<'a> {
    tokens: Vec<Token<'a>>,
    index: usize,
    options: ParseOptions,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: Vec<Token<'a>>, options: ParseOptions) -> Self {
        Self {
            tokens,
            index: 0,
            options,
        }
    }

    pub fn parse_program(mut self) -> ParseResult<Program> {
        let mut program = Program::default();
        loop {
            match self.current()?.kind {
                TokenKind::EOF => return Ok(program),
                TokenKind::Def => program.functions.push(self.parse_function()?),
                TokenKind::Extern => program.externs.push(self.parse_extern()?),
                _ => return Err(self.unexpected("`def` or `extern`")),
            }
        }
    }

    fn parse_function(&mut self) -> ParseResult<Function> {
        self.expect(TokenKind::Def, "`def`")?;
        let signature = self.parse_signature()?;
        let body = self.parse_block()?;
        Ok(Function { signature, body })
    }

    fn parse_extern(&mut self) -> ParseResult<FunctionSignature> {
        self.expect(TokenKind::Extern, "`extern`")?;
        self.parse_signature()
    }

    fn parse_signature(&mut self) -> ParseResult<FunctionSignature> {
        let name = self.expect_identifier("function name")?;
        self.expect(TokenKind::LParen, "`(`")?;

        let mut params = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                params.push(self.expect_identifier("parameter name")?);
                if self.check(TokenKind::Comma) {
                    self.advance();
                    continue;
                }
                break;
            }
        }
        self.expect(TokenKind::RParen, "`,` or `)`")?;

        Ok(FunctionSignature { name, params })
    }

    /// Parses `{ statement* }`.
    fn parse_block(&mut self) -> ParseResult<Body> {
        self.expect(TokenKind::LBrace, "`{`")?;
        let mut statements = Vec::new();
        loop {
            let statement = match self.current()?.kind {
                TokenKind::RBrace => {
                    self.advance();
                    return Ok(Body::new(statements));
                }
                TokenKind::If => self.parse_conditional()?,
                TokenKind::Return => self.parse_return()?,
                TokenKind::Identifier(_) => self.parse_definition()?,
                _ => return Err(self.unexpected("`if`, `return`, identifier or `}`")),
            };
            statements.push(statement);
        }
    }

    fn parse_conditional(&mut self) -> ParseResult<Statement> {
        self.expect(TokenKind::If, "`if`")?;
        let condition = self.parse_expression()?;
        let then_body = self.parse_block()?;
        let else_body = if self.check(TokenKind::Else) {
            self.advance();
            Some(self.parse_block()?)
        } else {
            None
        };
        Ok(Statement::Conditional {
            condition,
            then_body,
            else_body,
        })
    }

    fn parse_return(&mut self) -> ParseResult<Statement> {
        self.expect(TokenKind::Return, "`return`")?;
        Ok(Statement::Return(self.parse_expression()?))
    }

    fn parse_definition(&mut self) -> ParseResult<Statement> {
        let name = self.expect_identifier("identifier")?;
        self.expect(TokenKind::Equal, "`=`")?;
        let initializer = self.parse_expression()?;
        Ok(Statement::VariableDefinition { name, initializer })
    }

    pub fn parse_expression(&mut self) -> ParseResult<Expression> {
        let left = self.parse_primary()?;
        self.parse_binary_rhs(0, left)
    }

    /// Folds binary operators binding at least as tightly as `min_precedence`
    /// onto `left`.
    fn parse_binary_rhs(
        &mut self,
        min_precedence: u32,
        mut left: Expression,
    ) -> ParseResult<Expression> {
        loop {
            let Some(op) = self.current_binary_operator() else {
                return Ok(left);
            };
            let precedence = self.precedence(op);
            if precedence < min_precedence {
                return Ok(left);
            }
            self.advance();

            let mut right = self.parse_primary()?;
            if let Some(next) = self.current_binary_operator()
                && self.precedence(next) > precedence
            {
                right = self.parse_binary_rhs(precedence + 1, right)?;
            }

            left = Expression::binary(op, left, right);
        }
    }

    fn parse_primary(&mut self) -> ParseResult<Expression> {
        match self.current()?.kind {
            TokenKind::Number(value) => {
                self.advance();
                Ok(Expression::NumberLiteral(value))
            }
            TokenKind::Identifier(name) => {
                let name = name.to_string();
                self.advance();
                if self.check(TokenKind::LParen) {
                    let args = self.parse_call_arguments()?;
                    Ok(Expression::Call { callee: name, args })
                } else {
                    Ok(Expression::Identifier(name))
                }
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(TokenKind::RParen, "`)`")?;
                Ok(expr)
            }
            _ => Err(ParseError::ExpectedExpression {
                found: self.describe_current(),
                index: self.index,
            }),
        }
    }

    fn parse_call_arguments(&mut self) -> ParseResult<Vec<Expression>> {
        self.expect(TokenKind::LParen, "`(`")?;
        let mut args = Vec::new();
        if self.check(TokenKind::RParen) {
            self.advance();
            return Ok(args);
        }
        loop {
            args.push(self.parse_expression()?);
            if self.check(TokenKind::Comma) {
                self.advance();
                continue;
            }
            self.expect(TokenKind::RParen, "`,` or `)`")?;
            return Ok(args);
        }
    }

    fn precedence(&self, op: BinaryOperator) -> u32 {
        self.options.precedence.precedence(op)
    }

    fn current_binary_operator(&self) -> Option<BinaryOperator> {
        let op = match self.tokens.get(self.index)?.kind {
            TokenKind::Plus => BinaryOperator::Add,
            TokenKind::Minus => BinaryOperator::Sub,
            TokenKind::Star => BinaryOperator::Mul,
            TokenKind::Slash => BinaryOperator::Div,
            TokenKind::Percent => BinaryOperator::Mod,
            TokenKind::Less => BinaryOperator::Lt,
            TokenKind::LessEqual => BinaryOperator::Lte,
            TokenKind::Greater => BinaryOperator::Gt,
            TokenKind::GreaterEqual => BinaryOperator::Gte,
            _ => return None,
        };
        Some(op)
    }

    fn current(&self) -> ParseResult<&Token<'a>> {
        self.tokens
            .get(self.index)
            .ok_or(ParseError::MissingEndOfInput { index: self.index })
    }

    fn check(&self, kind: TokenKind<'_>) -> bool {
        self.tokens
            .get(self.index)
            .is_some_and(|token| token.kind == kind)
    }

    fn expect(&mut self, kind: TokenKind<'_>, expected: &'static str) -> ParseResult<()> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn expect_identifier(&mut self, expected: &'static str) -> ParseResult<String> {
        if let TokenKind::Identifier(name) = self.current()?.kind {
            self.advance();
            Ok(name.to_string())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn advance(&mut self) {
        if self.index < self.tokens.len() {
            self.index += 1;
        }
    }

    fn describe_current(&self) -> String {
        match self.tokens.get(self.index) {
            Some(token) => token.kind.to_string(),
            None => "end of token stream".to_string(),
        }
    }

    fn unexpected(&self, expected: &'static str) -> ParseError {
        ParseError::UnexpectedToken {
            expected,
            found: self.describe_current(),
            index: self.index,
        }
    }
}

pub fn parse_tokens(tokens: Vec<Token<'_>>) -> ParseResult<Program> {
    Parser::new(tokens, ParseOptions::default()).parse_program()
}

pub fn parse_tokens_with(tokens: Vec<Token<'_>>, options: ParseOptions) -> ParseResult<Program> {
    Parser::new(tokens, options).parse_program()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use indoc::indoc;

    fn parse(input: &str) -> ParseResult<Program> {
        parse_tokens(tokenize(input).expect("tokenize failed"))
    }

    fn parse_expr(input: &str, options: ParseOptions) -> Expression {
        let tokens = tokenize(input).expect("tokenize failed");
        Parser::new(tokens, options)
            .parse_expression()
            .expect("parse failed")
    }

    fn num(value: f64) -> Expression {
        Expression::NumberLiteral(value)
    }

    #[test]
    fn parses_simple_program() {
        let input = indoc! {"
            def add(a, b) {
                total = a + b
                return total
            }
        "};
        let program = parse(input).expect("parse failed");

        let expected = Program {
            functions: vec![Function {
                signature: FunctionSignature {
                    name: "add".to_string(),
                    params: vec!["a".to_string(), "b".to_string()],
                },
                body: Body::new(vec![
                    Statement::VariableDefinition {
                        name: "total".to_string(),
                        initializer: Expression::binary(
                            BinaryOperator::Add,
                            Expression::identifier("a"),
                            Expression::identifier("b"),
                        ),
                    },
                    Statement::Return(Expression::identifier("total")),
                ]),
            }],
            externs: vec![],
        };

        assert_eq!(program, expected);
    }

    #[test]
    fn multiplication_nests_under_addition() {
        let expr = parse_expr("1 + 2 * 3", ParseOptions::default());
        assert_eq!(
            expr,
            Expression::binary(
                BinaryOperator::Add,
                num(1.0),
                Expression::binary(BinaryOperator::Mul, num(2.0), num(3.0)),
            )
        );
    }

    #[test]
    fn equal_precedence_associates_left() {
        let expr = parse_expr("1 - 2 - 3", ParseOptions::default());
        assert_eq!(
            expr,
            Expression::binary(
                BinaryOperator::Sub,
                Expression::binary(BinaryOperator::Sub, num(1.0), num(2.0)),
                num(3.0),
            )
        );
    }

    #[test]
    fn legacy_table_binds_comparison_tighter_than_subtraction() {
        let expr = parse_expr("x - 1 < 3", ParseOptions::default());
        assert_eq!(
            expr,
            Expression::binary(
                BinaryOperator::Sub,
                Expression::identifier("x"),
                Expression::binary(BinaryOperator::Lt, num(1.0), num(3.0)),
            )
        );
    }

    #[test]
    fn conventional_table_binds_subtraction_tighter_than_comparison() {
        let options = ParseOptions {
            precedence: PrecedenceTable::conventional(),
        };
        let expr = parse_expr("x - 1 < 3", options);
        assert_eq!(
            expr,
            Expression::binary(
                BinaryOperator::Lt,
                Expression::binary(BinaryOperator::Sub, Expression::identifier("x"), num(1.0)),
                num(3.0),
            )
        );
    }

    #[test]
    fn parses_call_with_expression_argument() {
        let expr = parse_expr("fib(x-1)", ParseOptions::default());
        assert_eq!(
            expr,
            Expression::call(
                "fib",
                vec![Expression::binary(
                    BinaryOperator::Sub,
                    Expression::identifier("x"),
                    num(1.0),
                )],
            )
        );
    }

    #[test]
    fn missing_definition_value_is_a_syntax_error() {
        let err = parse("def f(x) { x = }").expect_err("expected parse failure");
        assert_eq!(
            err,
            ParseError::ExpectedExpression {
                found: "`}`".to_string(),
                index: 8,
            }
        );
    }

    #[test]
    fn trailing_comma_in_call_is_rejected() {
        let err = parse("def f(x) { return g(x,) }").expect_err("expected parse failure");
        assert!(matches!(err, ParseError::ExpectedExpression { .. }));
    }

    #[test]
    fn stream_without_eof_reports_missing_marker() {
        let mut tokens = tokenize("def f() { return 1 }").expect("tokenize failed");
        tokens.pop();
        let err = parse_tokens(tokens).expect_err("expected parse failure");
        assert_eq!(err, ParseError::MissingEndOfInput { index: 8 });
    }
}
