//! Syntax tree shared by the parser, the printers and the code generator.
//!
//! Nodes own their children outright; the parser only attaches a subtree once
//! it is complete, so a `Program` is always fully formed.

#[derive(Debug, PartialEq, Clone)]
pub enum Expression {
    NumberLiteral(f64),
    Identifier(String),
    BinaryOp {
        op: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Call {
        callee: String,
        args: Vec<Expression>,
    },
}

impl Expression {
    pub fn binary(op: BinaryOperator, left: Expression, right: Expression) -> Self {
        Self::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn identifier(name: impl Into<String>) -> Self {
        Self::Identifier(name.into())
    }

    pub fn call(callee: impl Into<String>, args: Vec<Expression>) -> Self {
        Self::Call {
            callee: callee.into(),
            args,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl BinaryOperator {
    pub const ALL: [BinaryOperator; 9] = [
        BinaryOperator::Add,
        BinaryOperator::Sub,
        BinaryOperator::Mul,
        BinaryOperator::Div,
        BinaryOperator::Mod,
        BinaryOperator::Lt,
        BinaryOperator::Lte,
        BinaryOperator::Gt,
        BinaryOperator::Gte,
    ];

    /// Source spelling of the operator.
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Mod => "%",
            BinaryOperator::Lt => "<",
            BinaryOperator::Lte => "<=",
            BinaryOperator::Gt => ">",
            BinaryOperator::Gte => ">=",
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum Statement {
    Conditional {
        condition: Expression,
        then_body: Body,
        else_body: Option<Body>,
    },
    VariableDefinition {
        name: String,
        initializer: Expression,
    },
    Return(Expression),
}

#[derive(Debug, PartialEq, Clone, Default)]
pub struct Body {
    pub statements: Vec<Statement>,
}

impl Body {
    pub fn new(statements: Vec<Statement>) -> Self {
        Self { statements }
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct FunctionSignature {
    pub name: String,
    pub params: Vec<String>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Function {
    pub signature: FunctionSignature,
    pub body: Body,
}

impl Function {
    pub fn name(&self) -> &str {
        &self.signature.name
    }

    pub fn params(&self) -> &[String] {
        &self.signature.params
    }
}

#[derive(Debug, PartialEq, Clone, Default)]
pub struct Program {
    pub functions: Vec<Function>,
    /// Host functions declared with `extern`; they have no body.
    pub externs: Vec<FunctionSignature>,
}
