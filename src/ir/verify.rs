//! Structural validation of an IR module.
//!
//! Catches lowering bugs early: unterminated blocks, dangling branch targets,
//! values used before (or without) a dominating definition, unknown stack
//! slots and calls that do not match a declared signature.

use std::fmt;

use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

use crate::ir::entities::{Block, StackSlot, Value};
use crate::ir::function::{Function, Module};
use crate::ir::instructions::InstructionData;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VerifierError {
    #[error("function `{function}` is defined more than once")]
    DuplicateFunction { function: String },
    #[error("function `{function}` has no blocks")]
    EmptyFunction { function: String },
    #[error("{block} in `{function}` has no terminator")]
    MissingTerminator { function: String, block: Block },
    #[error("{block} in `{function}` branches to missing {target}")]
    UnknownBlock {
        function: String,
        block: Block,
        target: Block,
    },
    #[error("{block} in `{function}` branches back to the entry block")]
    EntryHasPredecessor { function: String, block: Block },
    #[error("{value} in `{function}` is defined more than once")]
    Redefined { function: String, value: Value },
    #[error("instruction {position} of {block} in `{function}` has a malformed result")]
    ResultMismatch {
        function: String,
        block: Block,
        position: usize,
    },
    #[error("{value} used in {block} of `{function}` is never defined")]
    UndefinedValue {
        function: String,
        block: Block,
        value: Value,
    },
    #[error("{value} used in {block} of `{function}` is not dominated by its definition")]
    NotDominated {
        function: String,
        block: Block,
        value: Value,
    },
    #[error("{slot} used in `{function}` does not exist")]
    UnknownStackSlot { function: String, slot: StackSlot },
    #[error("call from `{function}` to unknown function `{callee}`")]
    UnknownCallee { function: String, callee: String },
    #[error("call from `{function}` to `{callee}` passes {found} arguments, expected {expected}")]
    ArityMismatch {
        function: String,
        callee: String,
        expected: usize,
        found: usize,
    },
}

/// Every violation found in a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifierErrors(pub Vec<VerifierError>);

impl fmt::Display for VerifierErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, error) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for VerifierErrors {}

pub fn verify_module(module: &Module) -> Result<(), VerifierErrors> {
    let mut errors = Vec::new();

    let mut seen = FxHashSet::default();
    let names = module
        .externs
        .iter()
        .map(|function| function.name.as_str())
        .chain(module.functions.iter().map(|function| function.name.as_str()));
    for name in names {
        if !seen.insert(name) {
            errors.push(VerifierError::DuplicateFunction {
                function: name.to_string(),
            });
        }
    }

    for function in &module.functions {
        FunctionVerifier::new(module, function).verify(&mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(VerifierErrors(errors))
    }
}

pub fn verify_function(module: &Module, function: &Function) -> Result<(), VerifierErrors> {
    let mut errors = Vec::new();
    FunctionVerifier::new(module, function).verify(&mut errors);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(VerifierErrors(errors))
    }
}

/// Where a value becomes available: parameters sit at position 0 of the entry
/// block, the result of instruction `i` at position `i + 1`.
#[derive(Debug, Clone, Copy)]
struct DefSite {
    block: Block,
    position: usize,
}

struct FunctionVerifier<'a> {
    module: &'a Module,
    function: &'a Function,
}

impl<'a> FunctionVerifier<'a> {
    fn new(module: &'a Module, function: &'a Function) -> Self {
        Self { module, function }
    }

    fn name(&self) -> String {
        self.function.name.clone()
    }

    fn verify(&self, errors: &mut Vec<VerifierError>) {
        let Some(entry) = self.function.entry_block() else {
            errors.push(VerifierError::EmptyFunction {
                function: self.name(),
            });
            return;
        };

        let cfg_ok = self.verify_control_flow(entry, errors);
        let defs = self.collect_definitions(entry, errors);
        // Dominance is only meaningful once every edge points at a real block.
        let dominators = cfg_ok.then(|| Dominators::compute(self.function, entry));
        self.verify_uses(&defs, dominators.as_ref(), errors);
    }

    fn verify_control_flow(&self, entry: Block, errors: &mut Vec<VerifierError>) -> bool {
        let mut ok = true;
        for (block, data) in self.function.blocks() {
            let Some(terminator) = &data.terminator else {
                errors.push(VerifierError::MissingTerminator {
                    function: self.name(),
                    block,
                });
                continue;
            };
            for target in terminator.successors() {
                if self.function.block(target).is_none() {
                    ok = false;
                    errors.push(VerifierError::UnknownBlock {
                        function: self.name(),
                        block,
                        target,
                    });
                } else if target == entry {
                    errors.push(VerifierError::EntryHasPredecessor {
                        function: self.name(),
                        block,
                    });
                }
            }
        }
        ok
    }

    fn collect_definitions(
        &self,
        entry: Block,
        errors: &mut Vec<VerifierError>,
    ) -> FxHashMap<Value, DefSite> {
        let mut defs = FxHashMap::default();
        let mut define = |value: Value, site: DefSite, errors: &mut Vec<VerifierError>| {
            if defs.insert(value, site).is_some() {
                errors.push(VerifierError::Redefined {
                    function: self.name(),
                    value,
                });
            }
        };

        for param in &self.function.params {
            define(
                param.value,
                DefSite {
                    block: entry,
                    position: 0,
                },
                errors,
            );
        }

        for (block, data) in self.function.blocks() {
            for (index, instruction) in data.instructions.iter().enumerate() {
                if instruction.data.has_result() != instruction.result.is_some() {
                    errors.push(VerifierError::ResultMismatch {
                        function: self.name(),
                        block,
                        position: index,
                    });
                }
                if let Some(result) = instruction.result {
                    define(
                        result,
                        DefSite {
                            block,
                            position: index + 1,
                        },
                        errors,
                    );
                }
            }
        }
        defs
    }

    fn verify_uses(
        &self,
        defs: &FxHashMap<Value, DefSite>,
        dominators: Option<&Dominators>,
        errors: &mut Vec<VerifierError>,
    ) {
        for (block, data) in self.function.blocks() {
            for (index, instruction) in data.instructions.iter().enumerate() {
                for &value in instruction.data.arguments() {
                    self.check_use(value, block, index + 1, defs, dominators, errors);
                }
                if let Some(slot) = instruction.data.stack_slot()
                    && self.function.stack_slot(slot).is_none()
                {
                    errors.push(VerifierError::UnknownStackSlot {
                        function: self.name(),
                        slot,
                    });
                }
                if let InstructionData::Call { callee, args } = &instruction.data {
                    self.check_call(callee, args.len(), errors);
                }
            }
            if let Some(terminator) = &data.terminator {
                let position = data.instructions.len() + 1;
                for &value in terminator.arguments() {
                    self.check_use(value, block, position, defs, dominators, errors);
                }
            }
        }
    }

    fn check_use(
        &self,
        value: Value,
        block: Block,
        position: usize,
        defs: &FxHashMap<Value, DefSite>,
        dominators: Option<&Dominators>,
        errors: &mut Vec<VerifierError>,
    ) {
        let Some(site) = defs.get(&value) else {
            errors.push(VerifierError::UndefinedValue {
                function: self.name(),
                block,
                value,
            });
            return;
        };

        let dominated = if site.block == block {
            site.position < position
        } else {
            dominators.is_none_or(|dominators| dominators.dominates(site.block, block))
        };
        if !dominated {
            errors.push(VerifierError::NotDominated {
                function: self.name(),
                block,
                value,
            });
        }
    }

    fn check_call(&self, callee: &str, found: usize, errors: &mut Vec<VerifierError>) {
        match self.module.arity(callee) {
            None => errors.push(VerifierError::UnknownCallee {
                function: self.name(),
                callee: callee.to_string(),
            }),
            Some(expected) if expected != found => errors.push(VerifierError::ArityMismatch {
                function: self.name(),
                callee: callee.to_string(),
                expected,
                found,
            }),
            Some(_) => {}
        }
    }
}

/// Immediate dominators of the reachable blocks, computed with the
/// Cooper-Harvey-Kennedy iteration over reverse postorder.
pub(crate) struct Dominators {
    idom: Vec<Option<Block>>,
}

impl Dominators {
    pub(crate) fn compute(function: &Function, entry: Block) -> Self {
        let block_count = function.blocks.len();
        let successors = |block: Block| -> Vec<Block> {
            function
                .block(block)
                .and_then(|data| data.terminator.as_ref())
                .map(|terminator| terminator.successors())
                .unwrap_or_default()
        };

        let order = reverse_postorder(block_count, entry, successors);
        let mut rpo_index = vec![usize::MAX; block_count];
        for (index, block) in order.iter().enumerate() {
            rpo_index[block.index()] = index;
        }

        let mut predecessors: Vec<Vec<Block>> = vec![Vec::new(); block_count];
        for &block in &order {
            for successor in successors(block) {
                predecessors[successor.index()].push(block);
            }
        }

        let mut idom: Vec<Option<Block>> = vec![None; block_count];
        idom[entry.index()] = Some(entry);
        let mut changed = true;
        while changed {
            changed = false;
            for &block in order.iter().skip(1) {
                let mut new_idom: Option<Block> = None;
                for &pred in &predecessors[block.index()] {
                    if idom[pred.index()].is_none() {
                        continue;
                    }
                    new_idom = Some(match new_idom {
                        None => pred,
                        Some(current) => intersect(&idom, &rpo_index, pred, current),
                    });
                }
                if new_idom.is_some() && idom[block.index()] != new_idom {
                    idom[block.index()] = new_idom;
                    changed = true;
                }
            }
        }

        Self { idom }
    }

    /// Whether `a` dominates `b`. Unreachable blocks are dominated by
    /// everything, so uses inside them are never reported.
    pub(crate) fn dominates(&self, a: Block, b: Block) -> bool {
        if self.idom.get(b.index()).copied().flatten().is_none() {
            return true;
        }
        let mut current = b;
        loop {
            if current == a {
                return true;
            }
            match self.idom[current.index()] {
                Some(parent) if parent != current => current = parent,
                _ => return false,
            }
        }
    }
}

fn intersect(idom: &[Option<Block>], rpo_index: &[usize], a: Block, b: Block) -> Block {
    let mut left = a;
    let mut right = b;
    while left != right {
        while rpo_index[left.index()] > rpo_index[right.index()] {
            match idom[left.index()] {
                Some(parent) => left = parent,
                None => return right,
            }
        }
        while rpo_index[right.index()] > rpo_index[left.index()] {
            match idom[right.index()] {
                Some(parent) => right = parent,
                None => return left,
            }
        }
    }
    left
}

pub(crate) fn reverse_postorder(
    block_count: usize,
    entry: Block,
    successors: impl Fn(Block) -> Vec<Block>,
) -> Vec<Block> {
    let mut visited = vec![false; block_count];
    let mut postorder = Vec::with_capacity(block_count);
    let mut stack = vec![(entry, successors(entry), 0usize)];
    visited[entry.index()] = true;

    while let Some((block, succs, next)) = stack.last_mut() {
        if let Some(&successor) = succs.get(*next) {
            *next += 1;
            if successor.index() < block_count && !visited[successor.index()] {
                visited[successor.index()] = true;
                let succs = successors(successor);
                stack.push((successor, succs, 0));
            }
        } else {
            postorder.push(*block);
            stack.pop();
        }
    }

    postorder.reverse();
    postorder
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::builder::FunctionBuilder;
    use crate::ir::function::Module;
    use crate::ir::instructions::{BinaryOpcode, Instruction, Terminator};

    fn module_with(function: Function) -> Module {
        Module {
            externs: Vec::new(),
            functions: vec![function],
        }
    }

    #[test]
    fn diamond_join_is_dominated_by_entry_only() {
        let mut builder = FunctionBuilder::new("f", &["x".to_string()]);
        let entry = builder.create_block();
        let then_block = builder.create_block();
        let else_block = builder.create_block();
        let join = builder.create_block();
        builder.switch_to_block(entry).expect("switch");
        let x = builder.param_value(0).expect("param");
        builder.brif(x, then_block, else_block).expect("brif");
        for block in [then_block, else_block] {
            builder.switch_to_block(block).expect("switch");
            builder.jump(join).expect("jump");
        }
        builder.switch_to_block(join).expect("switch");
        builder.ret(x).expect("ret");
        let function = builder.finish();

        let dominators = Dominators::compute(&function, entry);
        assert!(dominators.dominates(entry, join));
        assert!(!dominators.dominates(then_block, join));
        assert!(!dominators.dominates(else_block, join));
        assert!(verify_module(&module_with(function)).is_ok());
    }

    #[test]
    fn reports_value_defined_in_sibling_branch() {
        let mut builder = FunctionBuilder::new("f", &["x".to_string()]);
        let entry = builder.create_block();
        let then_block = builder.create_block();
        let else_block = builder.create_block();
        builder.switch_to_block(entry).expect("switch");
        let x = builder.param_value(0).expect("param");
        builder.brif(x, then_block, else_block).expect("brif");
        builder.switch_to_block(then_block).expect("switch");
        let one = builder.f64const(1.0).expect("const");
        builder.ret(one).expect("ret");
        builder.switch_to_block(else_block).expect("switch");
        builder.ret(one).expect("ret");
        let function = builder.finish();

        let errors = verify_module(&module_with(function)).expect_err("must fail");
        assert_eq!(
            errors.0,
            vec![VerifierError::NotDominated {
                function: "f".to_string(),
                block: else_block,
                value: one,
            }]
        );
    }

    #[test]
    fn reports_missing_terminator_and_unknown_callee() {
        let mut builder = FunctionBuilder::new("f", &[]);
        let entry = builder.create_block();
        builder.switch_to_block(entry).expect("switch");
        builder.call("nowhere", Vec::new()).expect("call");
        let function = builder.finish();

        let errors = verify_module(&module_with(function)).expect_err("must fail");
        assert!(errors.0.contains(&VerifierError::MissingTerminator {
            function: "f".to_string(),
            block: entry,
        }));
        assert!(errors.0.contains(&VerifierError::UnknownCallee {
            function: "f".to_string(),
            callee: "nowhere".to_string(),
        }));
    }

    #[test]
    fn reports_use_before_definition_in_same_block() {
        let mut function = FunctionBuilder::new("f", &[]).finish();
        function.blocks.push(crate::ir::function::BlockData {
            instructions: vec![Instruction {
                result: Some(Value::new(0)),
                data: InstructionData::Binary {
                    opcode: BinaryOpcode::Fadd,
                    args: [Value::new(0), Value::new(0)],
                },
            }],
            terminator: Some(Terminator::Return {
                value: Value::new(0),
            }),
        });
        function.value_count = 1;

        let errors = verify_module(&module_with(function)).expect_err("must fail");
        assert!(matches!(
            errors.0.as_slice(),
            [VerifierError::NotDominated { .. }, VerifierError::NotDominated { .. }]
        ));
    }
}
