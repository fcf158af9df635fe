//! Type signatures - the shape of a type as referenced by metadata.

use crate::{
    file::{parser::Parser, writer::Writer},
    metadata::token::Token,
    Result,
};

/// Maximum nesting depth accepted when decoding a type signature.
///
/// Protects the recursive decoder against crafted containers; genuine
/// signatures stay far below this.
const MAX_SIG_DEPTH: usize = 64;

#[allow(non_snake_case, dead_code, missing_docs)]
/// Signature element tags - the subset of ECMA-335 `ELEMENT_TYPE` values the
/// container format uses, kept at their standard encodings.
pub mod ELEMENT_TYPE {
    pub const VOID: u8 = 0x01;
    pub const BOOLEAN: u8 = 0x02;
    pub const CHAR: u8 = 0x03;
    pub const I1: u8 = 0x04;
    pub const U1: u8 = 0x05;
    pub const I2: u8 = 0x06;
    pub const U2: u8 = 0x07;
    pub const I4: u8 = 0x08;
    pub const U4: u8 = 0x09;
    pub const I8: u8 = 0x0a;
    pub const U8: u8 = 0x0b;
    pub const R4: u8 = 0x0c;
    pub const R8: u8 = 0x0d;
    pub const STRING: u8 = 0x0e;
    // Followed by type
    pub const PTR: u8 = 0x0f;
    // Followed by a TypeDef or TypeRef token
    pub const CLASS: u8 = 0x12;
    // Generic parameter of a type, represented as number
    pub const VAR: u8 = 0x13;
    // Generic type instantiation. Followed by token, arg-count, args
    pub const GENERICINST: u8 = 0x15;
    // System.IntPtr
    pub const I: u8 = 0x18;
    // System.UIntPtr
    pub const U: u8 = 0x19;
    // System.Object
    pub const OBJECT: u8 = 0x1c;
    // Single-dim array with 0 lower bound
    pub const SZARRAY: u8 = 0x1d;
    // Generic parameter of a method, represented as number
    pub const MVAR: u8 = 0x1e;
}

/// The built-in primitive kinds a signature can name directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    /// System.Void - represents no value
    Void,
    /// System.Boolean - true/false value
    Boolean,
    /// System.Char - Unicode 16-bit character
    Char,
    /// System.SByte - signed 8-bit integer
    I1,
    /// System.Byte - unsigned 8-bit integer
    U1,
    /// System.Int16 - signed 16-bit integer
    I2,
    /// System.UInt16 - unsigned 16-bit integer
    U2,
    /// System.Int32 - signed 32-bit integer
    I4,
    /// System.UInt32 - unsigned 32-bit integer
    U4,
    /// System.Int64 - signed 64-bit integer
    I8,
    /// System.UInt64 - unsigned 64-bit integer
    U8,
    /// System.Single - 32-bit floating point
    R4,
    /// System.Double - 64-bit floating point
    R8,
    /// System.IntPtr - native sized signed integer
    I,
    /// System.UIntPtr - native sized unsigned integer
    U,
    /// System.Object - base class for all reference types
    Object,
    /// System.String - immutable string of Unicode characters
    String,
}

impl PrimitiveKind {
    /// The `ELEMENT_TYPE` tag for this kind.
    #[must_use]
    pub fn element_type(self) -> u8 {
        match self {
            PrimitiveKind::Void => ELEMENT_TYPE::VOID,
            PrimitiveKind::Boolean => ELEMENT_TYPE::BOOLEAN,
            PrimitiveKind::Char => ELEMENT_TYPE::CHAR,
            PrimitiveKind::I1 => ELEMENT_TYPE::I1,
            PrimitiveKind::U1 => ELEMENT_TYPE::U1,
            PrimitiveKind::I2 => ELEMENT_TYPE::I2,
            PrimitiveKind::U2 => ELEMENT_TYPE::U2,
            PrimitiveKind::I4 => ELEMENT_TYPE::I4,
            PrimitiveKind::U4 => ELEMENT_TYPE::U4,
            PrimitiveKind::I8 => ELEMENT_TYPE::I8,
            PrimitiveKind::U8 => ELEMENT_TYPE::U8,
            PrimitiveKind::R4 => ELEMENT_TYPE::R4,
            PrimitiveKind::R8 => ELEMENT_TYPE::R8,
            PrimitiveKind::I => ELEMENT_TYPE::I,
            PrimitiveKind::U => ELEMENT_TYPE::U,
            PrimitiveKind::Object => ELEMENT_TYPE::OBJECT,
            PrimitiveKind::String => ELEMENT_TYPE::STRING,
        }
    }

    /// Map an `ELEMENT_TYPE` tag back to a kind.
    #[must_use]
    pub fn from_element_type(value: u8) -> Option<PrimitiveKind> {
        Some(match value {
            ELEMENT_TYPE::VOID => PrimitiveKind::Void,
            ELEMENT_TYPE::BOOLEAN => PrimitiveKind::Boolean,
            ELEMENT_TYPE::CHAR => PrimitiveKind::Char,
            ELEMENT_TYPE::I1 => PrimitiveKind::I1,
            ELEMENT_TYPE::U1 => PrimitiveKind::U1,
            ELEMENT_TYPE::I2 => PrimitiveKind::I2,
            ELEMENT_TYPE::U2 => PrimitiveKind::U2,
            ELEMENT_TYPE::I4 => PrimitiveKind::I4,
            ELEMENT_TYPE::U4 => PrimitiveKind::U4,
            ELEMENT_TYPE::I8 => PrimitiveKind::I8,
            ELEMENT_TYPE::U8 => PrimitiveKind::U8,
            ELEMENT_TYPE::R4 => PrimitiveKind::R4,
            ELEMENT_TYPE::R8 => PrimitiveKind::R8,
            ELEMENT_TYPE::I => PrimitiveKind::I,
            ELEMENT_TYPE::U => PrimitiveKind::U,
            ELEMENT_TYPE::OBJECT => PrimitiveKind::Object,
            ELEMENT_TYPE::STRING => PrimitiveKind::String,
            _ => return None,
        })
    }

    /// The framework fullname of this kind, used for display purposes.
    #[must_use]
    pub fn fullname(self) -> &'static str {
        match self {
            PrimitiveKind::Void => "System.Void",
            PrimitiveKind::Boolean => "System.Boolean",
            PrimitiveKind::Char => "System.Char",
            PrimitiveKind::I1 => "System.SByte",
            PrimitiveKind::U1 => "System.Byte",
            PrimitiveKind::I2 => "System.Int16",
            PrimitiveKind::U2 => "System.UInt16",
            PrimitiveKind::I4 => "System.Int32",
            PrimitiveKind::U4 => "System.UInt32",
            PrimitiveKind::I8 => "System.Int64",
            PrimitiveKind::U8 => "System.UInt64",
            PrimitiveKind::R4 => "System.Single",
            PrimitiveKind::R8 => "System.Double",
            PrimitiveKind::I => "System.IntPtr",
            PrimitiveKind::U => "System.UIntPtr",
            PrimitiveKind::Object => "System.Object",
            PrimitiveKind::String => "System.String",
        }
    }
}

/// The shape of a type as referenced from signatures, instruction operands
/// and member references.
///
/// `TypeSig` is the structural identity the patcher caches on: two
/// references to the same constructed type compare equal regardless of how
/// they were spelled at their call sites.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeSig {
    /// A built-in primitive.
    Primitive(PrimitiveKind),
    /// A type definition or reference, by token.
    Named(Token),
    /// An instantiation of a generic type definition.
    GenericInst {
        /// TypeDef or TypeRef token of the open generic definition.
        definition: Token,
        /// Type arguments, in declaration order.
        args: Vec<TypeSig>,
    },
    /// A generic parameter, unresolved until instantiation.
    GenericParam {
        /// True for a method-owned parameter (`!!n`), false for a
        /// type-owned parameter (`!n`).
        method: bool,
        /// Zero-based parameter index.
        index: u32,
    },
    /// A single-dimensional, zero-based array.
    SzArray(Box<TypeSig>),
    /// An unmanaged pointer.
    Pointer(Box<TypeSig>),
}

impl TypeSig {
    /// Returns true if the signature mentions any generic parameter anywhere.
    #[must_use]
    pub fn contains_generic_params(&self) -> bool {
        match self {
            TypeSig::Primitive(_) | TypeSig::Named(_) => false,
            TypeSig::GenericParam { .. } => true,
            TypeSig::GenericInst { args, .. } => {
                args.iter().any(TypeSig::contains_generic_params)
            }
            TypeSig::SzArray(inner) | TypeSig::Pointer(inner) => inner.contains_generic_params(),
        }
    }

    /// Encode the signature into `writer` using `ELEMENT_TYPE` tags.
    pub fn write_to(&self, writer: &mut Writer) {
        match self {
            TypeSig::Primitive(kind) => writer.write_u8(kind.element_type()),
            TypeSig::Named(token) => {
                writer.write_u8(ELEMENT_TYPE::CLASS);
                writer.write_u32(token.value());
            }
            TypeSig::GenericInst { definition, args } => {
                writer.write_u8(ELEMENT_TYPE::GENERICINST);
                writer.write_u32(definition.value());
                writer.write_u8(args.len() as u8);
                for arg in args {
                    arg.write_to(writer);
                }
            }
            TypeSig::GenericParam { method, index } => {
                writer.write_u8(if *method {
                    ELEMENT_TYPE::MVAR
                } else {
                    ELEMENT_TYPE::VAR
                });
                writer.write_u32(*index);
            }
            TypeSig::SzArray(inner) => {
                writer.write_u8(ELEMENT_TYPE::SZARRAY);
                inner.write_to(writer);
            }
            TypeSig::Pointer(inner) => {
                writer.write_u8(ELEMENT_TYPE::PTR);
                inner.write_to(writer);
            }
        }
    }

    /// Decode a signature from `parser`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] on unknown tags and
    /// [`crate::Error::RecursionLimit`] if nesting exceeds the supported
    /// depth.
    pub fn read_from(parser: &mut Parser) -> Result<TypeSig> {
        Self::read_from_depth(parser, 0)
    }

    fn read_from_depth(parser: &mut Parser, depth: usize) -> Result<TypeSig> {
        if depth > MAX_SIG_DEPTH {
            return Err(crate::Error::RecursionLimit(MAX_SIG_DEPTH));
        }

        let tag = parser.read_le::<u8>()?;
        if let Some(kind) = PrimitiveKind::from_element_type(tag) {
            return Ok(TypeSig::Primitive(kind));
        }

        match tag {
            ELEMENT_TYPE::CLASS => Ok(TypeSig::Named(Token::new(parser.read_le::<u32>()?))),
            ELEMENT_TYPE::GENERICINST => {
                let definition = Token::new(parser.read_le::<u32>()?);
                let count = parser.read_le::<u8>()? as usize;
                let mut args = Vec::with_capacity(count);
                for _ in 0..count {
                    args.push(Self::read_from_depth(parser, depth + 1)?);
                }
                Ok(TypeSig::GenericInst { definition, args })
            }
            ELEMENT_TYPE::VAR => Ok(TypeSig::GenericParam {
                method: false,
                index: parser.read_le::<u32>()?,
            }),
            ELEMENT_TYPE::MVAR => Ok(TypeSig::GenericParam {
                method: true,
                index: parser.read_le::<u32>()?,
            }),
            ELEMENT_TYPE::SZARRAY => Ok(TypeSig::SzArray(Box::new(Self::read_from_depth(
                parser,
                depth + 1,
            )?))),
            ELEMENT_TYPE::PTR => Ok(TypeSig::Pointer(Box::new(Self::read_from_depth(
                parser,
                depth + 1,
            )?))),
            _ => Err(malformed_error!("Unknown type signature tag 0x{:02x}", tag)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::token::TableId;

    fn roundtrip(sig: &TypeSig) -> TypeSig {
        let mut writer = Writer::new();
        sig.write_to(&mut writer);
        let bytes = writer.into_bytes();
        let mut parser = Parser::new(&bytes);
        let decoded = TypeSig::read_from(&mut parser).unwrap();
        assert!(!parser.has_more_data());
        decoded
    }

    #[test]
    fn roundtrip_nested_generic() {
        let dict = Token::from_parts(TableId::TypeRef, 3);
        let list = Token::from_parts(TableId::TypeRef, 4);
        let sig = TypeSig::GenericInst {
            definition: dict,
            args: vec![
                TypeSig::Primitive(PrimitiveKind::String),
                TypeSig::GenericInst {
                    definition: list,
                    args: vec![TypeSig::Primitive(PrimitiveKind::I4)],
                },
            ],
        };
        assert_eq!(roundtrip(&sig), sig);
    }

    #[test]
    fn roundtrip_generic_param() {
        let sig = TypeSig::GenericParam {
            method: true,
            index: 1,
        };
        assert_eq!(roundtrip(&sig), sig);
        assert!(sig.contains_generic_params());
    }

    #[test]
    fn closed_instance_has_no_params() {
        let sig = TypeSig::GenericInst {
            definition: Token::from_parts(TableId::TypeRef, 1),
            args: vec![TypeSig::Primitive(PrimitiveKind::String)],
        };
        assert!(!sig.contains_generic_params());
    }

    #[test]
    fn unknown_tag_is_malformed() {
        let data = [0xEE];
        let mut parser = Parser::new(&data);
        assert!(TypeSig::read_from(&mut parser).is_err());
    }
}
