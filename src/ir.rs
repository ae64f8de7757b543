//! SSA intermediate representation produced by code generation.
//!
//! Every value is an `f64`. Variables live in stack slots and are accessed
//! with explicit loads and stores, so no block parameters are needed.

pub mod builder;
mod display;
pub mod entities;
pub mod function;
pub mod instructions;
pub mod verify;

pub use builder::{BuildError, BuildResult, FunctionBuilder};
pub use entities::{Block, StackSlot, Value};
pub use function::{BlockData, ExternFunction, Function, Module, Param, StackSlotData};
pub use instructions::{BinaryOpcode, FloatCondition, Instruction, InstructionData, Terminator};
pub use verify::{VerifierError, VerifierErrors, verify_function, verify_module};
