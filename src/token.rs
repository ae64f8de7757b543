use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TokenKind<'a> {
    Identifier(&'a str),
    Number(f64),

    // Keywords
    Def,
    Extern,
    If,
    Else,
    Return,

    // Operators
    Equal,        // =
    Plus,         // +
    Minus,        // -
    Star,         // *
    Slash,        // /
    Percent,      // %
    Less,         // <
    LessEqual,    // <=
    Greater,      // >
    GreaterEqual, // >=

    // Delimiters
    Comma,  // ,
    LParen, // (
    RParen, // )
    LBrace, // {
    RBrace, // }

    EOF,
}

impl TokenKind<'_> {
    /// Returns the keyword token for `word`, if it is reserved.
    pub fn keyword(word: &str) -> Option<Self> {
        match word {
            "def" => Some(TokenKind::Def),
            "extern" => Some(TokenKind::Extern),
            "if" => Some(TokenKind::If),
            "else" => Some(TokenKind::Else),
            "return" => Some(TokenKind::Return),
            _ => None,
        }
    }
}

impl fmt::Display for TokenKind<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Identifier(name) => write!(f, "identifier `{name}`"),
            TokenKind::Number(value) => write!(f, "number `{value}`"),
            TokenKind::Def => f.write_str("`def`"),
            TokenKind::Extern => f.write_str("`extern`"),
            TokenKind::If => f.write_str("`if`"),
            TokenKind::Else => f.write_str("`else`"),
            TokenKind::Return => f.write_str("`return`"),
            TokenKind::Equal => f.write_str("`=`"),
            TokenKind::Plus => f.write_str("`+`"),
            TokenKind::Minus => f.write_str("`-`"),
            TokenKind::Star => f.write_str("`*`"),
            TokenKind::Slash => f.write_str("`/`"),
            TokenKind::Percent => f.write_str("`%`"),
            TokenKind::Less => f.write_str("`<`"),
            TokenKind::LessEqual => f.write_str("`<=`"),
            TokenKind::Greater => f.write_str("`>`"),
            TokenKind::GreaterEqual => f.write_str("`>=`"),
            TokenKind::Comma => f.write_str("`,`"),
            TokenKind::LParen => f.write_str("`(`"),
            TokenKind::RParen => f.write_str("`)`"),
            TokenKind::LBrace => f.write_str("`{`"),
            TokenKind::RBrace => f.write_str("`}`"),
            TokenKind::EOF => f.write_str("end of input"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind<'a>,
    pub span: Span,
}

impl<'a> Token<'a> {
    pub fn new(kind: TokenKind<'a>, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn kind(&self) -> &TokenKind<'a> {
        &self.kind
    }

    pub fn span(&self) -> Span {
        self.span
    }
}
