//! Human-readable IR dump, one instruction per line.

use std::fmt;

use crate::ir::function::{ExternFunction, Function, Module};
use crate::ir::instructions::{Instruction, InstructionData, Terminator};

impl fmt::Display for InstructionData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstructionData::F64Const { value } => write!(f, "f64const {value}"),
            InstructionData::Binary { opcode, args } => {
                write!(f, "{} {}, {}", opcode.mnemonic(), args[0], args[1])
            }
            InstructionData::Fcmp { cond, args } => {
                write!(f, "fcmp {} {}, {}", cond.mnemonic(), args[0], args[1])
            }
            InstructionData::StackLoad { slot } => write!(f, "stack_load {slot}"),
            InstructionData::StackStore { slot, arg } => write!(f, "stack_store {arg}, {slot}"),
            InstructionData::Call { callee, args } => {
                write!(f, "call {callee}(")?;
                write_list(f, args)?;
                f.write_str(")")
            }
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.result {
            Some(result) => write!(f, "{result} = {}", self.data),
            None => write!(f, "{}", self.data),
        }
    }
}

impl fmt::Display for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Terminator::Jump { destination } => write!(f, "jump {destination}"),
            Terminator::Brif {
                condition,
                then_destination,
                else_destination,
            } => write!(f, "brif {condition}, {then_destination}, {else_destination}"),
            Terminator::Return { value } => write!(f, "return {value}"),
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "function {}(", self.name)?;
        for (index, param) in self.params.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", param.value, param.name)?;
        }
        writeln!(f, ") {{")?;

        for (index, slot) in self.stack_slots.iter().enumerate() {
            writeln!(f, "    ss{index} = slot {}", slot.name)?;
        }

        for (block, data) in self.blocks() {
            writeln!(f, "{block}:")?;
            for instruction in &data.instructions {
                writeln!(f, "    {instruction}")?;
            }
            if let Some(terminator) = &data.terminator {
                writeln!(f, "    {terminator}")?;
            }
        }
        writeln!(f, "}}")
    }
}

impl fmt::Display for ExternFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "extern {}({})", self.name, self.params.join(", "))
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for declaration in &self.externs {
            writeln!(f, "{declaration}")?;
        }
        for (index, function) in self.functions.iter().enumerate() {
            if index > 0 || !self.externs.is_empty() {
                writeln!(f)?;
            }
            write!(f, "{function}")?;
        }
        Ok(())
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (index, item) in items.iter().enumerate() {
        if index > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}
