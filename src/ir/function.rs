use crate::ir::entities::{Block, StackSlot, Value};
use crate::ir::instructions::{Instruction, Terminator};

/// A function parameter: its source name and the SSA value holding it on entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub value: Value,
}

/// One 8-byte, `f64`-typed stack slot. The name is kept for the textual dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackSlotData {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BlockData {
    pub instructions: Vec<Instruction>,
    pub terminator: Option<Terminator>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub params: Vec<Param>,
    pub stack_slots: Vec<StackSlotData>,
    pub blocks: Vec<BlockData>,
    pub(crate) value_count: u32,
}

impl Function {
    /// The first block; execution starts here.
    pub fn entry_block(&self) -> Option<Block> {
        (!self.blocks.is_empty()).then_some(Block::new(0))
    }

    pub fn block(&self, block: Block) -> Option<&BlockData> {
        self.blocks.get(block.index())
    }

    pub fn stack_slot(&self, slot: StackSlot) -> Option<&StackSlotData> {
        self.stack_slots.get(slot.index())
    }

    /// Blocks in layout order together with their handles.
    pub fn blocks(&self) -> impl Iterator<Item = (Block, &BlockData)> {
        self.blocks
            .iter()
            .enumerate()
            .map(|(index, data)| (Block::new(index as u32), data))
    }

    /// Number of SSA values allocated, including parameters.
    pub fn value_count(&self) -> usize {
        self.value_count as usize
    }

    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(|param| param.name.as_str())
    }

    pub fn instruction_count(&self) -> usize {
        self.blocks.iter().map(|block| block.instructions.len()).sum()
    }
}

/// A host function that calls may target but which has no body here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternFunction {
    pub name: String,
    pub params: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Module {
    pub externs: Vec<ExternFunction>,
    pub functions: Vec<Function>,
}

impl Module {
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|function| function.name == name)
    }

    /// Parameter count of a defined or external function.
    pub fn arity(&self, name: &str) -> Option<usize> {
        self.function(name)
            .map(|function| function.params.len())
            .or_else(|| {
                self.externs
                    .iter()
                    .find(|function| function.name == name)
                    .map(|function| function.params.len())
            })
    }
}
