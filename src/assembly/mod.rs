//! Instruction model for method bodies.
//!
//! # Key Types
//! - [`Instruction`] - a decoded instruction (opcode + operand)
//! - [`OpCode`] - the opcode set, at standard CIL encodings
//! - [`Operand`] / [`Immediate`] - typed operand representation
//!
//! The model is deliberately flat: the pattern matcher walks a plain
//! instruction index and the patcher swaps instructions in place, so no
//! block or offset bookkeeping is needed here.

mod instruction;
mod opcodes;

pub use instruction::{Immediate, Instruction, Operand};
pub use opcodes::{OpCode, OperandKind};
