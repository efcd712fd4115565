//! Linear decoding of a `Code` attribute into the handful of instruction
//! shapes the detectors care about. Everything else is kept as an opaque
//! opcode so instruction counts and ordering stay exact.

use crate::opcodes::*;
use crate::reader::{ClassReader, ConstantPool, MemberRef};
use crate::ClassParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadKind {
    Int,
    Long,
    Float,
    Double,
    Reference,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// `xload`, `xload_n` and their `wide` forms.
    Load { kind: LoadKind, index: u16 },
    /// `checkcast` / `instanceof`.
    TypeCheck { opcode: u8, class: String },
    GetField(MemberRef),
    Invoke { opcode: u8, method: MemberRef },
    InvokeDynamic {
        bootstrap_index: u16,
        name: String,
        descriptor: String,
    },
    /// `ireturn` through `return`.
    Return(u8),
    Other(u8),
}

impl Instruction {
    pub fn is_receiver_load(&self) -> bool {
        matches!(
            self,
            Instruction::Load {
                kind: LoadKind::Reference,
                index: 0
            }
        )
    }
}

pub(crate) fn decode(code: &[u8], pool: &ConstantPool) -> Result<Vec<Instruction>, ClassParseError> {
    let mut reader = ClassReader::new(code);
    let mut instructions = Vec::new();

    while !reader.is_empty() {
        let offset = reader.position();
        let opcode = reader.read_u1()?;
        let instruction = match opcode {
            ILOAD..=ALOAD => Instruction::Load {
                kind: load_kind(opcode - ILOAD),
                index: reader.read_u1()? as u16,
            },
            ILOAD_0..=ALOAD_3 => {
                let relative = opcode - ILOAD_0;
                Instruction::Load {
                    kind: load_kind(relative / 4),
                    index: (relative % 4) as u16,
                }
            }
            CHECKCAST | INSTANCEOF => {
                let index = reader.read_u2()?;
                Instruction::TypeCheck {
                    opcode,
                    class: pool.class_name(index)?.to_string(),
                }
            }
            GETFIELD => Instruction::GetField(pool.member_ref(reader.read_u2()?)?),
            INVOKEVIRTUAL | INVOKESPECIAL | INVOKESTATIC => Instruction::Invoke {
                opcode,
                method: pool.member_ref(reader.read_u2()?)?,
            },
            INVOKEINTERFACE => {
                let method = pool.member_ref(reader.read_u2()?)?;
                reader.skip(2)?; // count, 0
                Instruction::Invoke { opcode, method }
            }
            INVOKEDYNAMIC => {
                let (bootstrap_index, name, descriptor) = pool.invoke_dynamic(reader.read_u2()?)?;
                let (name, descriptor) = (name.to_string(), descriptor.to_string());
                reader.skip(2)?;
                Instruction::InvokeDynamic {
                    bootstrap_index,
                    name,
                    descriptor,
                }
            }
            IRETURN..=RETURN => Instruction::Return(opcode),
            WIDE => {
                let widened = reader.read_u1()?;
                let index = reader.read_u2()?;
                match widened {
                    ILOAD..=ALOAD => Instruction::Load {
                        kind: load_kind(widened - ILOAD),
                        index,
                    },
                    IINC => {
                        reader.skip(2)?;
                        Instruction::Other(IINC)
                    }
                    ISTORE..=ASTORE | RET => Instruction::Other(widened),
                    other => return Err(ClassParseError::InvalidOpcode { opcode: other }),
                }
            }
            TABLESWITCH => {
                skip_padding(&mut reader, offset)?;
                reader.skip(4)?; // default
                let low = reader.read_i4()?;
                let high = reader.read_i4()?;
                let entries = (i64::from(high) - i64::from(low) + 1).max(0) as usize;
                reader.skip(entries * 4)?;
                Instruction::Other(opcode)
            }
            LOOKUPSWITCH => {
                skip_padding(&mut reader, offset)?;
                reader.skip(4)?; // default
                let pairs = reader.read_i4()?.max(0) as usize;
                reader.skip(pairs * 8)?;
                Instruction::Other(opcode)
            }
            other => {
                let operands = operand_length(other)
                    .ok_or(ClassParseError::InvalidOpcode { opcode: other })?;
                reader.skip(operands)?;
                Instruction::Other(other)
            }
        };
        instructions.push(instruction);
    }

    Ok(instructions)
}

fn load_kind(relative: u8) -> LoadKind {
    match relative {
        0 => LoadKind::Int,
        1 => LoadKind::Long,
        2 => LoadKind::Float,
        3 => LoadKind::Double,
        _ => LoadKind::Reference,
    }
}

/// Switch operands start at the next offset that is a multiple of four,
/// counted from the start of the method's code.
fn skip_padding(reader: &mut ClassReader<'_>, opcode_offset: usize) -> Result<(), ClassParseError> {
    let padding = (4 - (opcode_offset + 1) % 4) % 4;
    reader.skip(padding)
}

/// Operand byte count for fixed-length opcodes not handled explicitly.
fn operand_length(opcode: u8) -> Option<usize> {
    let length = match opcode {
        NOP..=0x0f => 0,
        BIPUSH => 1,
        SIPUSH => 2,
        LDC => 1,
        LDC_W | LDC2_W => 2,
        0x2e..=0x35 => 0, // array loads
        ISTORE..=ASTORE => 1,
        ISTORE_0..=ASTORE_3 => 0,
        0x4f..=0x83 => 0, // array stores, stack ops, arithmetic
        IINC => 2,
        0x85..=0x98 => 0, // conversions, comparisons
        IFEQ..=JSR => 2,
        RET => 1,
        GETSTATIC..=PUTFIELD => 2,
        NEW => 2,
        NEWARRAY => 1,
        ANEWARRAY => 2,
        ARRAYLENGTH | ATHROW => 0,
        0xc2..=MONITOREXIT => 0,
        MULTIANEWARRAY => 3,
        IFNULL | IFNONNULL => 2,
        GOTO_W | JSR_W => 4,
        BREAKPOINT | IMPDEP1 | IMPDEP2 => 0,
        _ => return None,
    };
    Some(length)
}
