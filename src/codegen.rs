//! Lowering from the syntax tree to SSA IR.
//!
//! Every binding, parameters included, lives in its own stack slot: reads are
//! `stack_load`, definitions are `stack_store` into a fresh slot. Values
//! therefore never need to flow across block edges, and the emitted blocks
//! carry no parameters.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::ast::{self, BinaryOperator, Body, Expression, Statement};
use crate::ir::{
    BinaryOpcode, Block, ExternFunction, FloatCondition, FunctionBuilder, Module, Value,
};

mod error;
pub mod scope;

pub use error::{CodegenError, CodegenResult, ErrorKind};
pub use scope::{ScopeId, ScopeTable};

/// Lowers every function of `program`, in declaration order.
///
/// All signatures are collected before any body is lowered, so a function
/// may call itself or one declared after it.
pub fn generate(program: &ast::Program) -> CodegenResult<Module> {
    let signatures = collect_signatures(program)?;

    let mut functions = Vec::with_capacity(program.functions.len());
    for function in &program.functions {
        functions.push(FunctionLowering::new(function, &signatures).lower()?);
    }

    let externs = program
        .externs
        .iter()
        .map(|signature| ExternFunction {
            name: signature.name.clone(),
            params: signature.params.clone(),
        })
        .collect();

    Ok(Module { externs, functions })
}

/// Arity of every callable name, externs included.
fn collect_signatures(program: &ast::Program) -> CodegenResult<FxHashMap<&str, usize>> {
    let declared = program
        .externs
        .iter()
        .chain(program.functions.iter().map(|function| &function.signature));

    let mut signatures = FxHashMap::default();
    for signature in declared {
        check_parameters(signature)?;
        if signatures
            .insert(signature.name.as_str(), signature.params.len())
            .is_some()
        {
            return Err(CodegenError::DuplicateFunction {
                name: signature.name.clone(),
            });
        }
    }
    Ok(signatures)
}

fn check_parameters(signature: &ast::FunctionSignature) -> CodegenResult<()> {
    let mut seen = FxHashSet::default();
    for name in &signature.params {
        if !seen.insert(name.as_str()) {
            return Err(CodegenError::DuplicateParameter {
                name: name.clone(),
                function: signature.name.clone(),
            });
        }
    }
    Ok(())
}

/// Lowers one function. Each function gets its own scope table, so frames
/// never outlive the function they belong to.
struct FunctionLowering<'a> {
    source: &'a ast::Function,
    signatures: &'a FxHashMap<&'a str, usize>,
    scopes: ScopeTable,
    builder: FunctionBuilder,
}

impl<'a> FunctionLowering<'a> {
    fn new(source: &'a ast::Function, signatures: &'a FxHashMap<&'a str, usize>) -> Self {
        Self {
            source,
            signatures,
            scopes: ScopeTable::new(),
            builder: FunctionBuilder::new(source.name(), source.params()),
        }
    }

    fn lower(mut self) -> CodegenResult<crate::ir::Function> {
        let source = self.source;
        log::debug!(
            "lowering function `{}` ({} parameters)",
            source.name(),
            source.params().len()
        );

        let scope = self.scopes.enter_scope(source.name());
        let entry = self.builder.create_block();
        self.builder.switch_to_block(entry)?;

        let values: Vec<Value> = (0..source.params().len())
            .filter_map(|index| self.builder.param_value(index))
            .collect();
        for (name, value) in source.params().iter().zip(values) {
            let slot = self.builder.create_stack_slot(name.as_str());
            self.builder.stack_store(slot, value)?;
            self.scopes.define(name.as_str(), slot);
        }

        self.lower_body(&source.body)?;
        if !self.builder.is_filled() {
            return Err(CodegenError::MissingReturn {
                function: self.function_name(),
            });
        }
        self.scopes.exit_scope(scope)?;

        let function = self.builder.finish();
        log::debug!(
            "lowered `{}`: {} blocks, {} instructions",
            function.name,
            function.blocks.len(),
            function.instruction_count()
        );
        Ok(function)
    }

    fn lower_body(&mut self, body: &Body) -> CodegenResult<()> {
        for statement in &body.statements {
            if self.builder.is_filled() {
                return Err(CodegenError::UnreachableStatement {
                    function: self.function_name(),
                });
            }
            self.lower_statement(statement)?;
        }
        Ok(())
    }

    /// Lowers `body` inside a fresh scope so its bindings end with it.
    fn lower_nested_body(&mut self, label: &str, body: &Body) -> CodegenResult<()> {
        let scope = self.scopes.enter_scope(label);
        log::trace!(
            "{}: lowering `{label}` at depth {}",
            self.source.name(),
            self.scopes.depth()
        );
        self.lower_body(body)?;
        self.scopes.exit_scope(scope)
    }

    fn lower_statement(&mut self, statement: &Statement) -> CodegenResult<()> {
        match statement {
            Statement::VariableDefinition { name, initializer } => {
                let value = self.lower_expression(initializer)?;
                let slot = self.builder.create_stack_slot(name.as_str());
                self.builder.stack_store(slot, value)?;
                self.scopes.define(name.as_str(), slot);
                Ok(())
            }
            Statement::Return(expression) => {
                let value = self.lower_expression(expression)?;
                self.builder.ret(value)?;
                Ok(())
            }
            Statement::Conditional {
                condition,
                then_body,
                else_body,
            } => self.lower_conditional(condition, then_body, else_body.as_ref()),
        }
    }

    fn lower_conditional(
        &mut self,
        condition: &Expression,
        then_body: &Body,
        else_body: Option<&Body>,
    ) -> CodegenResult<()> {
        let condition = self.lower_expression(condition)?;

        let then_block = self.builder.create_block();
        let mut merge = None;
        let else_block = match else_body {
            Some(_) => self.builder.create_block(),
            None => *merge.insert(self.builder.create_block()),
        };
        self.builder.brif(condition, then_block, else_block)?;

        self.builder.switch_to_block(then_block)?;
        self.lower_nested_body("then", then_body)?;
        self.jump_to_merge(&mut merge)?;

        if let Some(else_body) = else_body {
            self.builder.switch_to_block(else_block)?;
            self.lower_nested_body("else", else_body)?;
            self.jump_to_merge(&mut merge)?;
        }

        // With no merge block both branches returned; the builder is left on a
        // filled block so anything after the conditional is unreachable.
        if let Some(merge) = merge {
            self.builder.switch_to_block(merge)?;
        }
        Ok(())
    }

    /// Falls through to the merge block, creating it on first use.
    fn jump_to_merge(&mut self, merge: &mut Option<Block>) -> CodegenResult<()> {
        if self.builder.is_filled() {
            return Ok(());
        }
        let block = match *merge {
            Some(block) => block,
            None => *merge.insert(self.builder.create_block()),
        };
        self.builder.jump(block)?;
        Ok(())
    }

    fn lower_expression(&mut self, expression: &Expression) -> CodegenResult<Value> {
        match expression {
            Expression::NumberLiteral(value) => Ok(self.builder.f64const(*value)?),
            Expression::Identifier(name) => {
                let slot = self.scopes.resolve(name)?;
                Ok(self.builder.stack_load(slot)?)
            }
            Expression::BinaryOp { op, left, right } => {
                let lhs = self.lower_expression(left)?;
                let rhs = self.lower_expression(right)?;
                self.lower_binary(*op, lhs, rhs)
            }
            Expression::Call { callee, args } => self.lower_call(callee, args),
        }
    }

    fn lower_binary(&mut self, op: BinaryOperator, lhs: Value, rhs: Value) -> CodegenResult<Value> {
        let value = match op {
            BinaryOperator::Add => self.builder.binary(BinaryOpcode::Fadd, lhs, rhs)?,
            BinaryOperator::Sub => self.builder.binary(BinaryOpcode::Fsub, lhs, rhs)?,
            BinaryOperator::Mul => self.builder.binary(BinaryOpcode::Fmul, lhs, rhs)?,
            BinaryOperator::Div => self.builder.binary(BinaryOpcode::Fdiv, lhs, rhs)?,
            BinaryOperator::Mod => self.builder.binary(BinaryOpcode::Frem, lhs, rhs)?,
            BinaryOperator::Lt => self.builder.fcmp(FloatCondition::LessThan, lhs, rhs)?,
            BinaryOperator::Lte => self.builder.fcmp(FloatCondition::LessThanOrEqual, lhs, rhs)?,
            BinaryOperator::Gt => self.builder.fcmp(FloatCondition::GreaterThan, lhs, rhs)?,
            BinaryOperator::Gte => {
                self.builder.fcmp(FloatCondition::GreaterThanOrEqual, lhs, rhs)?
            }
        };
        Ok(value)
    }

    fn lower_call(&mut self, callee: &str, args: &[Expression]) -> CodegenResult<Value> {
        let Some(&expected) = self.signatures.get(callee) else {
            return Err(CodegenError::UnresolvedFunction {
                callee: callee.to_string(),
                function: self.function_name(),
            });
        };
        if expected != args.len() {
            return Err(CodegenError::ArityMismatch {
                callee: callee.to_string(),
                expected,
                found: args.len(),
                function: self.function_name(),
            });
        }

        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.lower_expression(arg)?);
        }
        Ok(self.builder.call(callee, values)?)
    }

    fn function_name(&self) -> String {
        self.source.name().to_string()
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;
    use crate::ir::{InstructionData, Terminator};
    use crate::{lexer, parser};

    fn lower(source: &str) -> CodegenResult<Module> {
        let tokens = lexer::tokenize(source).expect("lex");
        let program = parser::parse_tokens(tokens).expect("parse");
        generate(&program)
    }

    #[test]
    fn parameters_are_spilled_to_slots() {
        let module = lower("def id(a, b) { return b }").expect("lower");
        let function = module.function("id").expect("id");
        let entry = function.block(Block::new(0)).expect("entry");

        assert_eq!(function.stack_slots.len(), 2);
        assert!(matches!(
            entry.instructions[0].data,
            InstructionData::StackStore { arg, .. } if arg == Value::new(0)
        ));
        assert!(matches!(
            entry.instructions[2].data,
            InstructionData::StackLoad { slot } if slot.index() == 1
        ));
        assert_eq!(
            entry.terminator,
            Some(Terminator::Return {
                value: Value::new(2)
            })
        );
    }

    #[test]
    fn each_operator_emits_exactly_one_instruction() {
        for op in BinaryOperator::ALL {
            let source = format!("def f(a, b) {{ return a {} b }}", op.symbol());
            let module = lower(&source).expect("lower");
            let entry = &module.functions[0].blocks[0];
            // two spills, two loads, one operation
            assert_eq!(entry.instructions.len(), 5, "operator {}", op.symbol());
        }
    }

    #[test]
    fn conditional_without_else_branches_to_merge() {
        let module = lower(indoc! {"
            def clamp(x) {
                if x > 10 {
                    x = 10
                }
                return x
            }
        "})
        .expect("lower");
        let function = &module.functions[0];

        assert_eq!(function.blocks.len(), 3);
        assert!(matches!(
            function.blocks[0].terminator,
            Some(Terminator::Brif { then_destination, else_destination, .. })
                if then_destination == Block::new(1) && else_destination == Block::new(2)
        ));
        assert_eq!(
            function.blocks[1].terminator,
            Some(Terminator::Jump {
                destination: Block::new(2)
            })
        );
    }

    #[test]
    fn returning_branches_need_no_merge_block() {
        let module = lower(indoc! {"
            def sign(x) {
                if x < 0 {
                    return 0 - 1
                } else {
                    return 1
                }
            }
        "})
        .expect("lower");
        assert_eq!(module.functions[0].blocks.len(), 3);
    }

    #[test]
    fn branch_bindings_do_not_leak() {
        let err = lower(indoc! {"
            def f(x) {
                if x {
                    y = 1
                }
                return y
            }
        "})
        .expect_err("y is out of scope");
        assert_eq!(err.kind(), ErrorKind::NameResolution);
    }

    #[test]
    fn calls_check_arity_and_existence() {
        let err = lower("def f(x) { return g(x) }").expect_err("g is undeclared");
        assert!(matches!(err, CodegenError::UnresolvedFunction { ref callee, .. } if callee == "g"));

        let err = lower("def f(x) { return f(x, x) }").expect_err("wrong arity");
        assert_eq!(
            err,
            CodegenError::ArityMismatch {
                callee: "f".to_string(),
                expected: 1,
                found: 2,
                function: "f".to_string(),
            }
        );
    }

    #[test]
    fn structural_errors() {
        let missing = lower("def f(x) { y = x }").expect_err("no return");
        assert!(matches!(missing, CodegenError::MissingReturn { .. }));

        let unreachable = lower("def f(x) { return x y = 1 }").expect_err("dead code");
        assert!(matches!(unreachable, CodegenError::UnreachableStatement { .. }));

        let duplicate = lower("def f(x, x) { return x }").expect_err("duplicate param");
        assert_eq!(duplicate.kind(), ErrorKind::Structural);

        let twice = lower("extern f(x) def f(x) { return x }").expect_err("declared twice");
        assert_eq!(
            twice,
            CodegenError::DuplicateFunction {
                name: "f".to_string()
            }
        );
    }

    #[test]
    fn extern_parameters_must_be_distinct() {
        let err = lower("extern g(a, a) def f(x) { return g(x, x) }").expect_err("duplicate");
        assert_eq!(
            err,
            CodegenError::DuplicateParameter {
                name: "a".to_string(),
                function: "g".to_string(),
            }
        );
        assert_eq!(err.kind(), ErrorKind::Structural);
    }

    #[test]
    fn scopes_start_fresh_in_every_function() {
        let module = lower(indoc! {"
            def f(x) {
                y = x
                return y
            }
            def g(z) {
                return z
            }
        "})
        .expect("lower");
        let g = module.function("g").expect("g");
        assert_eq!(g.stack_slots.len(), 1);

        let err = lower(indoc! {"
            def f(x) {
                y = x
                return y
            }
            def g(z) {
                return y
            }
        "})
        .expect_err("y belongs to f");
        assert!(matches!(
            err,
            CodegenError::UnresolvedVariable { ref name, ref function }
                if name == "y" && function == "g"
        ));
    }
}
