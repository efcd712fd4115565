//! Class-file reading for jar metadata generation.
//!
//! [`parse_class`] turns raw class bytes into a [`ParsedClass`]: hierarchy,
//! members, generic signatures, plus the results of the body-shape detectors
//! (bouncer targets, lambda implementation methods and trivial field getters).
//! [`ClassFileWriter`] emits the same subset of the format and is used to
//! synthesize bootstrap classes and test fixtures.

pub mod access;
pub mod accessor;
pub mod bouncer;
pub mod code;
pub mod descriptor;
mod member;
pub mod opcodes;
mod parser;
mod reader;
pub mod writer;

pub use access::AccessFlags;
pub use code::{Instruction, LoadKind};
pub use member::{method_key, MethodRef};
pub use parser::{parse_class, ParsedClass, ParsedField, ParsedMethod};
pub use reader::MemberRef;
pub use writer::{ClassFileWriter, CodeWriter, LambdaFactory, LambdaSite};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClassParseError {
    #[error("unexpected end of class data")]
    UnexpectedEof,
    #[error("invalid class magic header")]
    InvalidMagic,
    #[error("unsupported constant pool tag {tag}")]
    UnsupportedConstant { tag: u8 },
    #[error("invalid constant pool index {index}")]
    InvalidConstantIndex { index: u16 },
    #[error("invalid descriptor `{0}`")]
    InvalidDescriptor(String),
    #[error("invalid opcode 0x{opcode:02x}")]
    InvalidOpcode { opcode: u8 },
}
