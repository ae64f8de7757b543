use crate::ir::entities::{Block, StackSlot, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOpcode {
    Fadd,
    Fsub,
    Fmul,
    Fdiv,
    Frem,
}

impl BinaryOpcode {
    pub fn mnemonic(self) -> &'static str {
        match self {
            BinaryOpcode::Fadd => "fadd",
            BinaryOpcode::Fsub => "fsub",
            BinaryOpcode::Fmul => "fmul",
            BinaryOpcode::Fdiv => "fdiv",
            BinaryOpcode::Frem => "frem",
        }
    }
}

/// Ordered comparison; the result is `1.0` when it holds and `0.0` otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatCondition {
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

impl FloatCondition {
    pub fn mnemonic(self) -> &'static str {
        match self {
            FloatCondition::LessThan => "lt",
            FloatCondition::LessThanOrEqual => "le",
            FloatCondition::GreaterThan => "gt",
            FloatCondition::GreaterThanOrEqual => "ge",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InstructionData {
    F64Const {
        value: f64,
    },
    Binary {
        opcode: BinaryOpcode,
        args: [Value; 2],
    },
    Fcmp {
        cond: FloatCondition,
        args: [Value; 2],
    },
    StackLoad {
        slot: StackSlot,
    },
    StackStore {
        slot: StackSlot,
        arg: Value,
    },
    Call {
        callee: String,
        args: Vec<Value>,
    },
}

impl InstructionData {
    /// Values read by this instruction, in operand order.
    pub fn arguments(&self) -> &[Value] {
        match self {
            InstructionData::F64Const { .. } | InstructionData::StackLoad { .. } => &[],
            InstructionData::Binary { args, .. } | InstructionData::Fcmp { args, .. } => &args[..],
            InstructionData::StackStore { arg, .. } => std::slice::from_ref(arg),
            InstructionData::Call { args, .. } => args.as_slice(),
        }
    }

    pub fn stack_slot(&self) -> Option<StackSlot> {
        match self {
            InstructionData::StackLoad { slot } | InstructionData::StackStore { slot, .. } => {
                Some(*slot)
            }
            _ => None,
        }
    }

    /// Whether the instruction defines a result value.
    pub fn has_result(&self) -> bool {
        !matches!(self, InstructionData::StackStore { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub result: Option<Value>,
    pub data: InstructionData,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminator {
    Jump {
        destination: Block,
    },
    /// Takes `then_destination` when `condition` is not `0.0`.
    Brif {
        condition: Value,
        then_destination: Block,
        else_destination: Block,
    },
    Return {
        value: Value,
    },
}

impl Terminator {
    pub fn arguments(&self) -> &[Value] {
        match self {
            Terminator::Jump { .. } => &[],
            Terminator::Brif { condition, .. } => std::slice::from_ref(condition),
            Terminator::Return { value } => std::slice::from_ref(value),
        }
    }

    pub fn successors(&self) -> Vec<Block> {
        match self {
            Terminator::Jump { destination } => vec![*destination],
            Terminator::Brif {
                then_destination,
                else_destination,
                ..
            } => vec![*then_destination, *else_destination],
            Terminator::Return { .. } => Vec::new(),
        }
    }
}
