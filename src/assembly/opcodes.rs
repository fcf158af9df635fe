//! The opcode set of the instruction model.

use strum::FromRepr;

/// Decoded instruction opcodes.
///
/// Discriminants are the standard CIL encodings (single-byte opcodes keep
/// their byte value, `0xFE`-prefixed opcodes use `0xFE00 | second byte`),
/// so an encoded body is byte-comparable with what the runtime's own
/// tooling would emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr)]
#[repr(u16)]
pub enum OpCode {
    /// No operation
    Nop = 0x00,
    /// Load argument 0
    Ldarg0 = 0x02,
    /// Load argument 1
    Ldarg1 = 0x03,
    /// Load constant int32 (short form, 1-byte operand)
    LdcI4S = 0x1F,
    /// Load constant int32
    LdcI4 = 0x20,
    /// Load constant int64
    LdcI8 = 0x21,
    /// Call a method
    Call = 0x28,
    /// Return from method
    Ret = 0x2A,
    /// Unconditional branch (short form)
    BrS = 0x2B,
    /// Branch if true (short form)
    BrtrueS = 0x2D,
    /// Pop the top of the stack
    Pop = 0x26,
    /// Call a virtual method
    Callvirt = 0x6F,
    /// Load a literal string
    Ldstr = 0x72,
    /// Allocate an object and call its constructor
    Newobj = 0x73,
    /// Load a static field value
    Ldsfld = 0x7E,
    /// Load the address of a static field
    Ldsflda = 0x7F,
    /// Load a metadata token
    Ldtoken = 0xD0,
}

/// Operand encodings an opcode expects in the instruction stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    /// No operand present
    None,
    /// Signed 8-bit immediate or short branch target
    Int8,
    /// Signed 32-bit immediate
    Int32,
    /// Signed 64-bit immediate
    Int64,
    /// Metadata token reference
    Token,
}

impl OpCode {
    /// The operand encoding for this opcode.
    #[must_use]
    pub fn operand_kind(self) -> OperandKind {
        match self {
            OpCode::Nop
            | OpCode::Ldarg0
            | OpCode::Ldarg1
            | OpCode::Pop
            | OpCode::Ret => OperandKind::None,
            OpCode::LdcI4S | OpCode::BrS | OpCode::BrtrueS => OperandKind::Int8,
            OpCode::LdcI4 => OperandKind::Int32,
            OpCode::LdcI8 => OperandKind::Int64,
            OpCode::Call
            | OpCode::Callvirt
            | OpCode::Ldstr
            | OpCode::Newobj
            | OpCode::Ldsfld
            | OpCode::Ldsflda
            | OpCode::Ldtoken => OperandKind::Token,
        }
    }

    /// The assembler mnemonic for this opcode.
    #[must_use]
    pub fn mnemonic(self) -> &'static str {
        match self {
            OpCode::Nop => "nop",
            OpCode::Ldarg0 => "ldarg.0",
            OpCode::Ldarg1 => "ldarg.1",
            OpCode::LdcI4S => "ldc.i4.s",
            OpCode::LdcI4 => "ldc.i4",
            OpCode::LdcI8 => "ldc.i8",
            OpCode::Call => "call",
            OpCode::Ret => "ret",
            OpCode::BrS => "br.s",
            OpCode::BrtrueS => "brtrue.s",
            OpCode::Pop => "pop",
            OpCode::Callvirt => "callvirt",
            OpCode::Ldstr => "ldstr",
            OpCode::Newobj => "newobj",
            OpCode::Ldsfld => "ldsfld",
            OpCode::Ldsflda => "ldsflda",
            OpCode::Ldtoken => "ldtoken",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_repr_roundtrip() {
        assert_eq!(OpCode::from_repr(0x28), Some(OpCode::Call));
        assert_eq!(OpCode::from_repr(0xD0), Some(OpCode::Ldtoken));
        assert_eq!(OpCode::from_repr(0x1234), None);
    }

    #[test]
    fn operand_kinds() {
        assert_eq!(OpCode::Nop.operand_kind(), OperandKind::None);
        assert_eq!(OpCode::LdcI4.operand_kind(), OperandKind::Int32);
        assert_eq!(OpCode::Call.operand_kind(), OperandKind::Token);
    }
}
