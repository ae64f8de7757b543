//! Incremental construction of one IR function.
//!
//! Instructions are appended to the current block. A block stops accepting
//! instructions once it has a terminator; the caller must switch to another
//! block before emitting more.

use thiserror::Error;

use crate::ir::entities::{Block, StackSlot, Value};
use crate::ir::function::{BlockData, Function, Param, StackSlotData};
use crate::ir::instructions::{
    BinaryOpcode, FloatCondition, Instruction, InstructionData, Terminator,
};

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum BuildError {
    #[error("no block selected for insertion in function `{function}`")]
    NoCurrentBlock { function: String },
    #[error("{block} in function `{function}` is already terminated")]
    BlockFilled { function: String, block: Block },
    #[error("{block} does not exist in function `{function}`")]
    UnknownBlock { function: String, block: Block },
}

pub type BuildResult<T> = Result<T, BuildError>;

#[derive(Debug)]
pub struct FunctionBuilder {
    func: Function,
    current: Option<Block>,
}

impl FunctionBuilder {
    /// Starts a function whose parameters become values `v0..vN`.
    pub fn new(name: impl Into<String>, params: &[String]) -> Self {
        let params = params
            .iter()
            .enumerate()
            .map(|(index, name)| Param {
                name: name.clone(),
                value: Value::new(index as u32),
            })
            .collect::<Vec<_>>();
        let value_count = params.len() as u32;
        Self {
            func: Function {
                name: name.into(),
                params,
                stack_slots: Vec::new(),
                blocks: Vec::new(),
                value_count,
            },
            current: None,
        }
    }

    pub fn param_value(&self, index: usize) -> Option<Value> {
        self.func.params.get(index).map(|param| param.value)
    }

    pub fn create_block(&mut self) -> Block {
        let block = Block::new(self.func.blocks.len() as u32);
        self.func.blocks.push(BlockData::default());
        log::trace!("{}: created {block}", self.func.name);
        block
    }

    pub fn switch_to_block(&mut self, block: Block) -> BuildResult<()> {
        if self.func.block(block).is_none() {
            return Err(BuildError::UnknownBlock {
                function: self.func.name.clone(),
                block,
            });
        }
        self.current = Some(block);
        Ok(())
    }

    pub fn current_block(&self) -> Option<Block> {
        self.current
    }

    /// True when there is nowhere to append: no current block, or the current
    /// block already ends in a terminator.
    pub fn is_filled(&self) -> bool {
        self.open_block().is_none()
    }

    /// The current block if it can still take instructions.
    pub fn open_block(&self) -> Option<Block> {
        let block = self.current?;
        let data = self.func.block(block)?;
        data.terminator.is_none().then_some(block)
    }

    pub fn create_stack_slot(&mut self, name: impl Into<String>) -> StackSlot {
        let slot = StackSlot::new(self.func.stack_slots.len() as u32);
        self.func.stack_slots.push(StackSlotData { name: name.into() });
        slot
    }

    pub fn f64const(&mut self, value: f64) -> BuildResult<Value> {
        self.push_with_result(InstructionData::F64Const { value })
    }

    pub fn binary(&mut self, opcode: BinaryOpcode, lhs: Value, rhs: Value) -> BuildResult<Value> {
        self.push_with_result(InstructionData::Binary {
            opcode,
            args: [lhs, rhs],
        })
    }

    pub fn fcmp(&mut self, cond: FloatCondition, lhs: Value, rhs: Value) -> BuildResult<Value> {
        self.push_with_result(InstructionData::Fcmp {
            cond,
            args: [lhs, rhs],
        })
    }

    pub fn stack_load(&mut self, slot: StackSlot) -> BuildResult<Value> {
        self.push_with_result(InstructionData::StackLoad { slot })
    }

    pub fn stack_store(&mut self, slot: StackSlot, value: Value) -> BuildResult<()> {
        self.push(Instruction {
            result: None,
            data: InstructionData::StackStore { slot, arg: value },
        })
    }

    pub fn call(&mut self, callee: impl Into<String>, args: Vec<Value>) -> BuildResult<Value> {
        self.push_with_result(InstructionData::Call {
            callee: callee.into(),
            args,
        })
    }

    pub fn jump(&mut self, destination: Block) -> BuildResult<()> {
        self.terminate(Terminator::Jump { destination })
    }

    pub fn brif(
        &mut self,
        condition: Value,
        then_destination: Block,
        else_destination: Block,
    ) -> BuildResult<()> {
        self.terminate(Terminator::Brif {
            condition,
            then_destination,
            else_destination,
        })
    }

    pub fn ret(&mut self, value: Value) -> BuildResult<()> {
        self.terminate(Terminator::Return { value })
    }

    pub fn finish(self) -> Function {
        self.func
    }

    fn push_with_result(&mut self, data: InstructionData) -> BuildResult<Value> {
        let result = Value::new(self.func.value_count);
        self.push(Instruction {
            result: Some(result),
            data,
        })?;
        self.func.value_count += 1;
        Ok(result)
    }

    fn push(&mut self, instruction: Instruction) -> BuildResult<()> {
        let block = self.insertion_block()?;
        self.func.blocks[block.index()].instructions.push(instruction);
        Ok(())
    }

    fn terminate(&mut self, terminator: Terminator) -> BuildResult<()> {
        let block = self.insertion_block()?;
        self.func.blocks[block.index()].terminator = Some(terminator);
        Ok(())
    }

    fn insertion_block(&self) -> BuildResult<Block> {
        let Some(block) = self.current else {
            return Err(BuildError::NoCurrentBlock {
                function: self.func.name.clone(),
            });
        };
        match self.open_block() {
            Some(block) => Ok(block),
            None => Err(BuildError::BlockFilled {
                function: self.func.name.clone(),
                block,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameters_take_the_first_values() {
        let mut builder = FunctionBuilder::new("f", &["a".to_string(), "b".to_string()]);
        let entry = builder.create_block();
        builder.switch_to_block(entry).expect("switch");
        let constant = builder.f64const(2.0).expect("const");
        assert_eq!(builder.param_value(1), Some(Value::new(1)));
        assert_eq!(constant, Value::new(2));
    }

    #[test]
    fn terminated_block_rejects_instructions() {
        let mut builder = FunctionBuilder::new("f", &[]);
        let entry = builder.create_block();
        builder.switch_to_block(entry).expect("switch");
        let value = builder.f64const(1.0).expect("const");
        builder.ret(value).expect("ret");

        assert!(builder.is_filled());
        let err = builder.f64const(2.0).expect_err("block is terminated");
        assert_eq!(
            err,
            BuildError::BlockFilled {
                function: "f".to_string(),
                block: entry,
            }
        );
    }

    #[test]
    fn emitting_without_a_block_fails() {
        let mut builder = FunctionBuilder::new("f", &[]);
        assert!(matches!(
            builder.f64const(1.0),
            Err(BuildError::NoCurrentBlock { .. })
        ));
    }
}
