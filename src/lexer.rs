//! Source text to token stream.
//!
//! The parser never sees characters; it receives the flat `Vec<Token>` built
//! here, always terminated by a single `EOF` token.

use std::{iter::Peekable, str::CharIndices};

use crate::token::{Span, Token, TokenKind};

mod error;

pub use error::{LexError, LexResult};

pub struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
            line: 1,
            column: 0,
        }
    }

    pub fn next_token(&mut self) -> LexResult<Token<'a>> {
        self.skip_trivia();

        let (start_idx, ch) = match self.chars.peek() {
            Some(&(idx, c)) => (idx, c),
            None => {
                let index = self.input.len();
                return Ok(Token::new(
                    TokenKind::EOF,
                    Span {
                        start: index,
                        end: index,
                        line: self.line,
                        column: self.column,
                    },
                ));
            }
        };

        let start_line = self.line;
        let start_column = self.column;
        let single = |lexer: &mut Self, kind: TokenKind<'a>| {
            lexer.advance_char();
            Token::new(
                kind,
                Span {
                    start: start_idx,
                    end: start_idx + 1,
                    line: start_line,
                    column: start_column,
                },
            )
        };

        match ch {
            '=' => Ok(single(self, TokenKind::Equal)),
            '+' => Ok(single(self, TokenKind::Plus)),
            '-' => Ok(single(self, TokenKind::Minus)),
            '*' => Ok(single(self, TokenKind::Star)),
            '/' => Ok(single(self, TokenKind::Slash)),
            '%' => Ok(single(self, TokenKind::Percent)),
            ',' => Ok(single(self, TokenKind::Comma)),
            '(' => Ok(single(self, TokenKind::LParen)),
            ')' => Ok(single(self, TokenKind::RParen)),
            '{' => Ok(single(self, TokenKind::LBrace)),
            '}' => Ok(single(self, TokenKind::RBrace)),
            '<' => Ok(self.read_comparison(
                TokenKind::Less,
                TokenKind::LessEqual,
                start_idx,
                start_line,
                start_column,
            )),
            '>' => Ok(self.read_comparison(
                TokenKind::Greater,
                TokenKind::GreaterEqual,
                start_idx,
                start_line,
                start_column,
            )),
            c if c.is_alphabetic() || c == '_' => {
                Ok(self.read_identifier(start_idx, start_line, start_column))
            }
            c if c.is_ascii_digit() => self.read_number(start_idx, start_line, start_column),
            _ => Err(LexError::UnexpectedCharacter {
                character: ch,
                line: start_line,
                column: start_column,
            }),
        }
    }

    /// Skips whitespace and `#` line comments.
    fn skip_trivia(&mut self) {
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_whitespace() {
                self.advance_char();
            } else if c == '#' {
                while let Some(&(_, c)) = self.chars.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.advance_char();
                }
            } else {
                break;
            }
        }
    }

    fn read_comparison(
        &mut self,
        strict: TokenKind<'a>,
        or_equal: TokenKind<'a>,
        start: usize,
        line: usize,
        column: usize,
    ) -> Token<'a> {
        self.advance_char();
        let (kind, end) = if matches!(self.chars.peek(), Some(&(_, '='))) {
            self.advance_char();
            (or_equal, start + 2)
        } else {
            (strict, start + 1)
        };
        Token::new(
            kind,
            Span {
                start,
                end,
                line,
                column,
            },
        )
    }

    fn read_identifier(&mut self, start: usize, line: usize, column: usize) -> Token<'a> {
        self.advance_char(); // Consume first char
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.advance_char();
            } else {
                break;
            }
        }

        let end_idx = self.current_index();
        let ident = &self.input[start..end_idx];
        let kind = TokenKind::keyword(ident).unwrap_or(TokenKind::Identifier(ident));
        Token::new(
            kind,
            Span {
                start,
                end: end_idx,
                line,
                column,
            },
        )
    }

    fn read_number(&mut self, start: usize, line: usize, column: usize) -> LexResult<Token<'a>> {
        self.consume_digits();

        // A fractional part needs at least one digit after the dot.
        if matches!(self.chars.peek(), Some(&(_, '.'))) {
            let mut lookahead = self.chars.clone();
            lookahead.next();
            if matches!(lookahead.peek(), Some(&(_, c)) if c.is_ascii_digit()) {
                self.advance_char();
                self.consume_digits();
            }
        }

        let end_idx = self.current_index();
        let literal = &self.input[start..end_idx];
        let value = literal
            .parse::<f64>()
            .map_err(|_| LexError::InvalidNumberLiteral {
                literal: literal.to_string(),
                line,
                column,
            })?;
        Ok(Token::new(
            TokenKind::Number(value),
            Span {
                start,
                end: end_idx,
                line,
                column,
            },
        ))
    }

    fn consume_digits(&mut self) {
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_ascii_digit() {
                self.advance_char();
            } else {
                break;
            }
        }
    }

    fn advance_char(&mut self) -> Option<(usize, char)> {
        let next = self.chars.next();
        if let Some((_, c)) = next {
            if c == '\n' {
                self.line += 1;
                self.column = 0;
            } else {
                self.column += 1;
            }
        }
        next
    }

    fn current_index(&mut self) -> usize {
        self.chars
            .peek()
            .map(|(idx, _)| *idx)
            .unwrap_or(self.input.len())
    }
}

pub fn tokenize(input: &str) -> LexResult<Vec<Token<'_>>> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let is_eof = matches!(token.kind, TokenKind::EOF);
        tokens.push(token);
        if is_eof {
            break;
        }
    }
    Ok(tokens)
}
