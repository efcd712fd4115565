use crate::ClassParseError;

/// One field type from a descriptor string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Short,
    Boolean,
    Object(String),
    Array {
        element: Box<FieldType>,
        dimensions: usize,
    },
}

impl FieldType {
    /// Number of local-variable / operand-stack slots a value of this type occupies.
    pub fn slot_size(&self) -> u16 {
        match self {
            FieldType::Long | FieldType::Double => 2,
            _ => 1,
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, FieldType::Object(_) | FieldType::Array { .. })
    }

    /// Re-encode this type, passing every class name through `rename`.
    pub fn write_descriptor(&self, out: &mut String, rename: &dyn Fn(&str) -> Option<String>) {
        match self {
            FieldType::Byte => out.push('B'),
            FieldType::Char => out.push('C'),
            FieldType::Double => out.push('D'),
            FieldType::Float => out.push('F'),
            FieldType::Int => out.push('I'),
            FieldType::Long => out.push('J'),
            FieldType::Short => out.push('S'),
            FieldType::Boolean => out.push('Z'),
            FieldType::Object(name) => {
                out.push('L');
                match rename(name) {
                    Some(renamed) => out.push_str(&renamed),
                    None => out.push_str(name),
                }
                out.push(';');
            }
            FieldType::Array {
                element,
                dimensions,
            } => {
                for _ in 0..*dimensions {
                    out.push('[');
                }
                element.write_descriptor(out, rename);
            }
        }
    }
}

/// Stack footprint of a call, counted the way the verifier counts slots.
///
/// `arguments` includes the implicit receiver slot so that two descriptors can
/// be compared directly regardless of which one is the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackShape {
    pub arguments: u16,
    pub returns: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub parameters: Vec<FieldType>,
    /// `None` for `V`.
    pub return_type: Option<FieldType>,
}

impl MethodDescriptor {
    pub fn parse(descriptor: &str) -> Result<Self, ClassParseError> {
        parse_method_descriptor(descriptor)
    }

    pub fn stack_shape(&self) -> StackShape {
        StackShape {
            arguments: 1 + self.parameters.iter().map(FieldType::slot_size).sum::<u16>(),
            returns: self.return_type.as_ref().map(FieldType::slot_size).unwrap_or(0),
        }
    }

    /// Local variable slots used by the parameters, receiver excluded.
    pub fn parameter_slots(&self) -> u16 {
        self.parameters.iter().map(FieldType::slot_size).sum()
    }

    pub fn to_descriptor(&self, rename: &dyn Fn(&str) -> Option<String>) -> String {
        let mut out = String::from("(");
        for parameter in &self.parameters {
            parameter.write_descriptor(&mut out, rename);
        }
        out.push(')');
        match &self.return_type {
            Some(ty) => ty.write_descriptor(&mut out, rename),
            None => out.push('V'),
        }
        out
    }
}

pub fn parse_field_descriptor(descriptor: &str) -> Result<FieldType, ClassParseError> {
    let mut parser = DescriptorParser::new(descriptor);
    let ty = parser.parse_type()?;
    if parser.remaining() != 0 {
        return Err(ClassParseError::InvalidDescriptor(descriptor.to_string()));
    }
    Ok(ty)
}

pub fn parse_method_descriptor(descriptor: &str) -> Result<MethodDescriptor, ClassParseError> {
    let mut parser = DescriptorParser::new(descriptor);
    parser.expect('(')?;
    let mut parameters = Vec::new();
    while !parser.peek_char(')')? {
        parameters.push(parser.parse_type()?);
    }
    parser.expect(')')?;
    let return_type = if parser.peek_char('V')? {
        parser.advance(1);
        None
    } else {
        Some(parser.parse_type()?)
    };

    if parser.remaining() != 0 {
        return Err(ClassParseError::InvalidDescriptor(descriptor.to_string()));
    }

    Ok(MethodDescriptor {
        parameters,
        return_type,
    })
}

/// Rewrite every class name inside a field or method descriptor.
///
/// Descriptors that fail to parse are returned unchanged.
pub fn remap_descriptor(descriptor: &str, rename: &dyn Fn(&str) -> Option<String>) -> String {
    if descriptor.starts_with('(') {
        match parse_method_descriptor(descriptor) {
            Ok(parsed) => parsed.to_descriptor(rename),
            Err(_) => descriptor.to_string(),
        }
    } else {
        match parse_field_descriptor(descriptor) {
            Ok(parsed) => {
                let mut out = String::new();
                parsed.write_descriptor(&mut out, rename);
                out
            }
            Err(_) => descriptor.to_string(),
        }
    }
}

struct DescriptorParser<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> DescriptorParser<'a> {
    fn new(descriptor: &'a str) -> Self {
        Self {
            text: descriptor,
            bytes: descriptor.as_bytes(),
            pos: 0,
        }
    }

    fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.pos)
    }

    fn expect(&mut self, ch: char) -> Result<(), ClassParseError> {
        if self.remaining() < 1 {
            return Err(ClassParseError::InvalidDescriptor(String::new()));
        }
        if self.bytes[self.pos] != ch as u8 {
            return Err(ClassParseError::InvalidDescriptor(format!(
                "expected '{}' in descriptor",
                ch
            )));
        }
        self.pos += 1;
        Ok(())
    }

    fn advance(&mut self, count: usize) {
        self.pos += count;
    }

    fn peek_char(&self, ch: char) -> Result<bool, ClassParseError> {
        if self.remaining() < 1 {
            return Err(ClassParseError::InvalidDescriptor(String::new()));
        }
        Ok(self.bytes[self.pos] == ch as u8)
    }

    fn parse_type(&mut self) -> Result<FieldType, ClassParseError> {
        if self.remaining() == 0 {
            return Err(ClassParseError::InvalidDescriptor(String::new()));
        }

        let start = self.bytes[self.pos];
        let primitive = match start {
            b'B' => Some(FieldType::Byte),
            b'C' => Some(FieldType::Char),
            b'D' => Some(FieldType::Double),
            b'F' => Some(FieldType::Float),
            b'I' => Some(FieldType::Int),
            b'J' => Some(FieldType::Long),
            b'S' => Some(FieldType::Short),
            b'Z' => Some(FieldType::Boolean),
            _ => None,
        };
        if let Some(ty) = primitive {
            self.pos += 1;
            return Ok(ty);
        }

        match start {
            b'L' => self.parse_reference_type(),
            b'[' => self.parse_array_type(),
            _ => Err(ClassParseError::InvalidDescriptor(format!(
                "unexpected descriptor tag '{}'",
                start as char
            ))),
        }
    }

    fn parse_reference_type(&mut self) -> Result<FieldType, ClassParseError> {
        self.expect('L')?;
        let start = self.pos;
        while self.pos < self.bytes.len() && self.bytes[self.pos] != b';' {
            self.pos += 1;
        }
        if self.pos >= self.bytes.len() {
            return Err(ClassParseError::InvalidDescriptor(
                "unterminated reference descriptor".into(),
            ));
        }
        // `L` and `;` are ASCII, so both ends sit on char boundaries.
        let name = &self.text[start..self.pos];
        self.pos += 1; // consume ';'
        Ok(FieldType::Object(name.to_string()))
    }

    fn parse_array_type(&mut self) -> Result<FieldType, ClassParseError> {
        let mut dimensions = 0;
        while self.remaining() > 0 && self.bytes[self.pos] == b'[' {
            dimensions += 1;
            self.pos += 1;
        }
        let element = self.parse_type()?;
        Ok(FieldType::Array {
            element: Box::new(element),
            dimensions,
        })
    }
}
