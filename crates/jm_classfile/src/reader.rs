//! Byte cursor and constant pool for class-file decoding.

use crate::{ClassParseError, MethodRef};

#[derive(Debug, Clone)]
pub(crate) enum Constant {
    Utf8(String),
    Class { name_index: u16 },
    NameAndType { name_index: u16, descriptor_index: u16 },
    FieldRef { class_index: u16, name_and_type_index: u16 },
    MethodRef { class_index: u16, name_and_type_index: u16 },
    InterfaceMethodRef { class_index: u16, name_and_type_index: u16 },
    MethodHandle { kind: u8, reference_index: u16 },
    InvokeDynamic { bootstrap_index: u16, name_and_type_index: u16 },
    Other,
    Unusable,
}

/// Member reference resolved out of a `Fieldref`/`Methodref` constant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRef {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
}

impl From<MemberRef> for MethodRef {
    fn from(value: MemberRef) -> Self {
        MethodRef::new(value.owner, value.name, value.descriptor)
    }
}

pub(crate) struct ConstantPool {
    entries: Vec<Constant>,
}

impl ConstantPool {
    pub(crate) fn parse(reader: &mut ClassReader<'_>) -> Result<Self, ClassParseError> {
        let count = reader.read_u2()? as usize;
        let mut entries = Vec::with_capacity(count);
        entries.push(Constant::Unusable); // index 0 unused

        let mut index = 1;
        while index < count {
            let tag = reader.read_u1()?;
            let entry = match tag {
                1 => {
                    let length = reader.read_u2()? as usize;
                    let bytes = reader.read_slice(length)?;
                    Constant::Utf8(decode_modified_utf8(bytes))
                }
                3 | 4 => {
                    reader.skip(4)?;
                    Constant::Other
                }
                5 | 6 => {
                    reader.skip(8)?;
                    entries.push(Constant::Other);
                    index += 1;
                    Constant::Unusable
                }
                7 => Constant::Class {
                    name_index: reader.read_u2()?,
                },
                8 => {
                    reader.read_u2()?; // string index
                    Constant::Other
                }
                9 => Constant::FieldRef {
                    class_index: reader.read_u2()?,
                    name_and_type_index: reader.read_u2()?,
                },
                10 => Constant::MethodRef {
                    class_index: reader.read_u2()?,
                    name_and_type_index: reader.read_u2()?,
                },
                11 => Constant::InterfaceMethodRef {
                    class_index: reader.read_u2()?,
                    name_and_type_index: reader.read_u2()?,
                },
                12 => Constant::NameAndType {
                    name_index: reader.read_u2()?,
                    descriptor_index: reader.read_u2()?,
                },
                15 => Constant::MethodHandle {
                    kind: reader.read_u1()?,
                    reference_index: reader.read_u2()?,
                },
                16 => {
                    reader.read_u2()?;
                    Constant::Other
                }
                17 => {
                    reader.skip(4)?;
                    Constant::Other
                }
                18 => Constant::InvokeDynamic {
                    bootstrap_index: reader.read_u2()?,
                    name_and_type_index: reader.read_u2()?,
                },
                19 | 20 => {
                    reader.read_u2()?; // module / package name
                    Constant::Other
                }
                other => return Err(ClassParseError::UnsupportedConstant { tag: other }),
            };

            entries.push(entry);
            index += 1;
        }

        Ok(Self { entries })
    }

    pub(crate) fn get(&self, index: u16) -> Result<&Constant, ClassParseError> {
        self.entries
            .get(index as usize)
            .ok_or(ClassParseError::InvalidConstantIndex { index })
    }

    pub(crate) fn utf8(&self, index: u16) -> Result<&str, ClassParseError> {
        match self.get(index)? {
            Constant::Utf8(value) => Ok(value.as_str()),
            _ => Err(ClassParseError::InvalidConstantIndex { index }),
        }
    }

    pub(crate) fn class_name(&self, index: u16) -> Result<&str, ClassParseError> {
        match self.get(index)? {
            Constant::Class { name_index } => self.utf8(*name_index),
            _ => Err(ClassParseError::InvalidConstantIndex { index }),
        }
    }

    /// `0` means "no class", as used by `super_class` on `java/lang/Object`.
    pub(crate) fn optional_class_name(&self, index: u16) -> Result<Option<&str>, ClassParseError> {
        if index == 0 {
            return Ok(None);
        }
        self.class_name(index).map(Some)
    }

    pub(crate) fn name_and_type(&self, index: u16) -> Result<(&str, &str), ClassParseError> {
        match self.get(index)? {
            Constant::NameAndType {
                name_index,
                descriptor_index,
            } => Ok((self.utf8(*name_index)?, self.utf8(*descriptor_index)?)),
            _ => Err(ClassParseError::InvalidConstantIndex { index }),
        }
    }

    /// Resolve any of the three member reference kinds.
    pub(crate) fn member_ref(&self, index: u16) -> Result<MemberRef, ClassParseError> {
        let (class_index, name_and_type_index) = match self.get(index)? {
            Constant::FieldRef {
                class_index,
                name_and_type_index,
            }
            | Constant::MethodRef {
                class_index,
                name_and_type_index,
            }
            | Constant::InterfaceMethodRef {
                class_index,
                name_and_type_index,
            } => (*class_index, *name_and_type_index),
            _ => return Err(ClassParseError::InvalidConstantIndex { index }),
        };
        let owner = self.class_name(class_index)?;
        let (name, descriptor) = self.name_and_type(name_and_type_index)?;
        Ok(MemberRef {
            owner: owner.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        })
    }

    /// Returns `(reference_kind, member)` for a `MethodHandle` constant.
    pub(crate) fn method_handle(&self, index: u16) -> Result<Option<(u8, MemberRef)>, ClassParseError> {
        match self.get(index)? {
            Constant::MethodHandle {
                kind,
                reference_index,
            } => Ok(Some((*kind, self.member_ref(*reference_index)?))),
            _ => Ok(None),
        }
    }

    pub(crate) fn invoke_dynamic(&self, index: u16) -> Result<(u16, &str, &str), ClassParseError> {
        match self.get(index)? {
            Constant::InvokeDynamic {
                bootstrap_index,
                name_and_type_index,
            } => {
                let (name, descriptor) = self.name_and_type(*name_and_type_index)?;
                Ok((*bootstrap_index, name, descriptor))
            }
            _ => Err(ClassParseError::InvalidConstantIndex { index }),
        }
    }
}

pub(crate) struct ClassReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ClassReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn expect_magic(&mut self) -> Result<(), ClassParseError> {
        const MAGIC: u32 = 0xCAFEBABE;
        let magic = self.read_u4()?;
        if magic != MAGIC {
            return Err(ClassParseError::InvalidMagic);
        }
        Ok(())
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub(crate) fn read_u1(&mut self) -> Result<u8, ClassParseError> {
        if self.pos >= self.data.len() {
            return Err(ClassParseError::UnexpectedEof);
        }
        let value = self.data[self.pos];
        self.pos += 1;
        Ok(value)
    }

    pub(crate) fn read_u2(&mut self) -> Result<u16, ClassParseError> {
        if self.pos + 2 > self.data.len() {
            return Err(ClassParseError::UnexpectedEof);
        }
        let value = u16::from_be_bytes([self.data[self.pos], self.data[self.pos + 1]]);
        self.pos += 2;
        Ok(value)
    }

    pub(crate) fn read_u4(&mut self) -> Result<u32, ClassParseError> {
        if self.pos + 4 > self.data.len() {
            return Err(ClassParseError::UnexpectedEof);
        }
        let value = u32::from_be_bytes([
            self.data[self.pos],
            self.data[self.pos + 1],
            self.data[self.pos + 2],
            self.data[self.pos + 3],
        ]);
        self.pos += 4;
        Ok(value)
    }

    pub(crate) fn read_i4(&mut self) -> Result<i32, ClassParseError> {
        self.read_u4().map(|value| value as i32)
    }

    pub(crate) fn read_slice(&mut self, len: usize) -> Result<&'a [u8], ClassParseError> {
        if self.pos + len > self.data.len() {
            return Err(ClassParseError::UnexpectedEof);
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub(crate) fn skip(&mut self, len: usize) -> Result<(), ClassParseError> {
        if self.pos + len > self.data.len() {
            return Err(ClassParseError::UnexpectedEof);
        }
        self.pos += len;
        Ok(())
    }
}

/// Decode the JVM's modified UTF-8 (`\0` as `C0 80`, supplementary
/// characters as surrogate pairs). Plain UTF-8 input takes the fast path.
///
/// String literals may hold lone surrogates or arbitrary bytes, so decoding
/// never fails: unpaired surrogates and truncated sequences become U+FFFD.
fn decode_modified_utf8(bytes: &[u8]) -> String {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return text.to_string();
    }

    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b0 = bytes[i] as u16;
        if b0 & 0x80 == 0 {
            units.push(b0);
            i += 1;
        } else if b0 & 0xE0 == 0xC0 && i + 1 < bytes.len() {
            let b1 = bytes[i + 1] as u16;
            units.push(((b0 & 0x1F) << 6) | (b1 & 0x3F));
            i += 2;
        } else if b0 & 0xF0 == 0xE0 && i + 2 < bytes.len() {
            let b1 = bytes[i + 1] as u16;
            let b2 = bytes[i + 2] as u16;
            units.push(((b0 & 0x0F) << 12) | ((b1 & 0x3F) << 6) | (b2 & 0x3F));
            i += 3;
        } else {
            units.push(0xFFFD);
            i += 1;
        }
    }
    String::from_utf16_lossy(&units)
}
