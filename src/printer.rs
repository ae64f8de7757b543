//! Text renderings of a syntax tree.
//!
//! `print_program` produces source that parses back to an equal tree: every
//! binary operand that is itself a binary operation is parenthesised, so the
//! output does not depend on the precedence table in use. `dump_tree` is a
//! debugging view with one node per line.

use std::fmt::Write;

use crate::ast::{Body, Expression, Function, FunctionSignature, Program, Statement};

const INDENT: &str = "    ";

pub fn print_program(program: &Program) -> String {
    let mut out = String::new();
    for signature in &program.externs {
        out.push_str("extern ");
        print_signature(&mut out, signature);
        out.push('\n');
    }
    for (index, function) in program.functions.iter().enumerate() {
        if index > 0 || !program.externs.is_empty() {
            out.push('\n');
        }
        print_function(&mut out, function);
    }
    out
}

pub fn print_expression(expression: &Expression) -> String {
    let mut out = String::new();
    write_expression(&mut out, expression);
    out
}

fn print_signature(out: &mut String, signature: &FunctionSignature) {
    let _ = write!(out, "{}({})", signature.name, signature.params.join(", "));
}

fn print_function(out: &mut String, function: &Function) {
    out.push_str("def ");
    print_signature(out, &function.signature);
    out.push(' ');
    print_body(out, &function.body, 0);
    out.push('\n');
}

fn print_body(out: &mut String, body: &Body, depth: usize) {
    out.push_str("{\n");
    for statement in &body.statements {
        print_statement(out, statement, depth + 1);
    }
    push_indent(out, depth);
    out.push('}');
}

fn print_statement(out: &mut String, statement: &Statement, depth: usize) {
    push_indent(out, depth);
    match statement {
        Statement::VariableDefinition { name, initializer } => {
            let _ = write!(out, "{name} = ");
            write_expression(out, initializer);
        }
        Statement::Return(expression) => {
            out.push_str("return ");
            write_expression(out, expression);
        }
        Statement::Conditional {
            condition,
            then_body,
            else_body,
        } => {
            out.push_str("if ");
            write_expression(out, condition);
            out.push(' ');
            print_body(out, then_body, depth);
            if let Some(else_body) = else_body {
                out.push_str(" else ");
                print_body(out, else_body, depth);
            }
        }
    }
    out.push('\n');
}

fn write_expression(out: &mut String, expression: &Expression) {
    match expression {
        Expression::NumberLiteral(value) => {
            let _ = write!(out, "{value}");
        }
        Expression::Identifier(name) => out.push_str(name),
        Expression::Call { callee, args } => {
            out.push_str(callee);
            out.push('(');
            for (index, arg) in args.iter().enumerate() {
                if index > 0 {
                    out.push_str(", ");
                }
                write_expression(out, arg);
            }
            out.push(')');
        }
        Expression::BinaryOp { op, left, right } => {
            write_operand(out, left);
            let _ = write!(out, " {} ", op.symbol());
            write_operand(out, right);
        }
    }
}

fn write_operand(out: &mut String, operand: &Expression) {
    if matches!(operand, Expression::BinaryOp { .. }) {
        out.push('(');
        write_expression(out, operand);
        out.push(')');
    } else {
        write_expression(out, operand);
    }
}

fn push_indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
}

/// One node per line, children indented one level below their parent.
pub fn dump_tree(program: &Program) -> String {
    let mut dump = TreeDump::default();
    dump.line("Program");
    dump.nested(|dump| {
        for signature in &program.externs {
            dump.line(&format!("Extern {}", signature.name));
            dump.nested(|dump| dump.line(&format!("Params: [{}]", signature.params.join(", "))));
        }
        for function in &program.functions {
            dump.function(function);
        }
    });
    dump.out
}

#[derive(Default)]
struct TreeDump {
    out: String,
    depth: usize,
}

impl TreeDump {
    fn line(&mut self, text: &str) {
        push_indent(&mut self.out, self.depth);
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn nested(&mut self, f: impl FnOnce(&mut Self)) {
        self.depth += 1;
        f(self);
        self.depth -= 1;
    }

    fn function(&mut self, function: &Function) {
        self.line(&format!("Function {}", function.name()));
        self.nested(|dump| {
            dump.line(&format!("Params: [{}]", function.params().join(", ")));
            dump.body("Body", &function.body);
        });
    }

    fn body(&mut self, label: &str, body: &Body) {
        self.line(label);
        self.nested(|dump| {
            for statement in &body.statements {
                dump.statement(statement);
            }
        });
    }

    fn statement(&mut self, statement: &Statement) {
        match statement {
            Statement::VariableDefinition { name, initializer } => {
                self.line(&format!("Definition {name}"));
                self.nested(|dump| dump.expression(initializer));
            }
            Statement::Return(expression) => {
                self.line("Return");
                self.nested(|dump| dump.expression(expression));
            }
            Statement::Conditional {
                condition,
                then_body,
                else_body,
            } => {
                self.line("Conditional");
                self.nested(|dump| {
                    dump.line("Condition");
                    dump.nested(|dump| dump.expression(condition));
                    dump.body("Then", then_body);
                    if let Some(else_body) = else_body {
                        dump.body("Else", else_body);
                    }
                });
            }
        }
    }

    fn expression(&mut self, expression: &Expression) {
        match expression {
            Expression::NumberLiteral(value) => self.line(&format!("Number {value}")),
            Expression::Identifier(name) => self.line(&format!("Identifier {name}")),
            Expression::BinaryOp { op, left, right } => {
                self.line(&format!("BinaryOp {}", op.symbol()));
                self.nested(|dump| {
                    dump.expression(left);
                    dump.expression(right);
                });
            }
            Expression::Call { callee, args } => {
                self.line(&format!("Call {callee}"));
                self.nested(|dump| {
                    for arg in args {
                        dump.expression(arg);
                    }
                });
            }
        }
    }
}
