use crate::access::AccessFlags;
use crate::accessor::detect_field_accessor;
use crate::bouncer::{detect_bouncer, BouncerCandidate, BouncerContext};
use crate::code::{decode, Instruction};
use crate::reader::{ClassReader, ConstantPool};
use crate::{ClassParseError, MethodRef};
use std::collections::HashSet;

const LAMBDA_METAFACTORY: &str = "java/lang/invoke/LambdaMetafactory";

/// Structural snapshot of one class file. Method bodies are reduced to the
/// facts the shape detectors extract; the bytecode itself is not retained.
#[derive(Debug, Clone)]
pub struct ParsedClass {
    pub name: String,
    pub super_name: Option<String>,
    pub interfaces: Vec<String>,
    pub access: AccessFlags,
    pub signature: Option<String>,
    pub fields: Vec<ParsedField>,
    pub methods: Vec<ParsedMethod>,
}

#[derive(Debug, Clone)]
pub struct ParsedField {
    pub name: String,
    pub descriptor: String,
    pub access: AccessFlags,
    pub signature: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ParsedMethod {
    pub name: String,
    pub descriptor: String,
    pub access: AccessFlags,
    pub signature: Option<String>,
    /// Implementation method of a lambda call site in the same class.
    pub is_lambda_target: bool,
    /// Forwarding target when the body has bouncer shape.
    pub bouncer: Option<MethodRef>,
    /// Field returned when the body is a trivial getter on this class.
    pub accessor_of: Option<String>,
}

struct RawMethod<'a> {
    name: String,
    descriptor: String,
    access: AccessFlags,
    signature: Option<String>,
    code: Option<&'a [u8]>,
}

struct BootstrapMethod {
    method_ref: u16,
    arguments: Vec<u16>,
}

pub fn parse_class(bytes: &[u8]) -> Result<ParsedClass, ClassParseError> {
    let mut reader = ClassReader::new(bytes);
    reader.expect_magic()?;
    let _minor_version = reader.read_u2()?;
    let _major_version = reader.read_u2()?;
    let pool = ConstantPool::parse(&mut reader)?;

    let access = AccessFlags::new(reader.read_u2()?);
    let this_class = reader.read_u2()?;
    let super_class = reader.read_u2()?;
    let name = pool.class_name(this_class)?.to_string();
    let super_name = pool.optional_class_name(super_class)?.map(str::to_string);

    let interfaces_count = reader.read_u2()?;
    let mut interfaces = Vec::with_capacity(interfaces_count as usize);
    for _ in 0..interfaces_count {
        interfaces.push(pool.class_name(reader.read_u2()?)?.to_string());
    }

    let fields_count = reader.read_u2()?;
    let mut fields = Vec::with_capacity(fields_count as usize);
    for _ in 0..fields_count {
        let access = AccessFlags::new(reader.read_u2()?);
        let name = pool.utf8(reader.read_u2()?)?.to_string();
        let descriptor = pool.utf8(reader.read_u2()?)?.to_string();
        let mut signature = None;
        let attributes_count = reader.read_u2()?;
        for _ in 0..attributes_count {
            let attribute_name = pool.utf8(reader.read_u2()?)?;
            let length = reader.read_u4()? as usize;
            if attribute_name == "Signature" {
                signature = Some(pool.utf8(reader.read_u2()?)?.to_string());
                reader.skip(length.saturating_sub(2))?;
            } else {
                reader.skip(length)?;
            }
        }
        fields.push(ParsedField {
            name,
            descriptor,
            access,
            signature,
        });
    }

    let methods_count = reader.read_u2()?;
    let mut raw_methods = Vec::with_capacity(methods_count as usize);
    for _ in 0..methods_count {
        raw_methods.push(read_method(&mut reader, &pool)?);
    }

    // BootstrapMethods lives in the class attributes, after the methods, so
    // bodies are decoded only once it is known.
    let mut signature = None;
    let mut bootstrap_methods = Vec::new();
    let attributes_count = reader.read_u2()?;
    for _ in 0..attributes_count {
        let attribute_name = pool.utf8(reader.read_u2()?)?;
        let length = reader.read_u4()? as usize;
        match attribute_name {
            "Signature" => {
                signature = Some(pool.utf8(reader.read_u2()?)?.to_string());
                reader.skip(length.saturating_sub(2))?;
            }
            "BootstrapMethods" => {
                let mut sub_reader = ClassReader::new(reader.read_slice(length)?);
                bootstrap_methods = read_bootstrap_methods(&mut sub_reader)?;
            }
            _ => reader.skip(length)?,
        }
    }

    let mut bodies = Vec::with_capacity(raw_methods.len());
    for method in &raw_methods {
        let instructions = match method.code {
            Some(code) => decode(code, &pool)?,
            None => Vec::new(),
        };
        bodies.push(instructions);
    }

    let lambda_targets = collect_lambda_targets(&pool, &bootstrap_methods, &bodies)?;
    let context = BouncerContext {
        class_name: &name,
        super_name: super_name.as_deref(),
    };

    let methods = raw_methods
        .into_iter()
        .zip(bodies.iter())
        .map(|(method, code)| {
            let is_lambda_target = lambda_targets
                .contains(&MethodRef::new(name.as_str(), method.name.as_str(), method.descriptor.as_str()));
            let bouncer = detect_bouncer(
                context,
                BouncerCandidate {
                    access: method.access,
                    descriptor: &method.descriptor,
                    code,
                    is_lambda_target,
                },
            );
            let accessor_of = detect_field_accessor(&name, method.access, &method.descriptor, code);
            ParsedMethod {
                name: method.name,
                descriptor: method.descriptor,
                access: method.access,
                signature: method.signature,
                is_lambda_target,
                bouncer,
                accessor_of,
            }
        })
        .collect();

    Ok(ParsedClass {
        name,
        super_name,
        interfaces,
        access,
        signature,
        fields,
        methods,
    })
}

fn read_method<'a>(
    reader: &mut ClassReader<'a>,
    pool: &ConstantPool,
) -> Result<RawMethod<'a>, ClassParseError> {
    let access = AccessFlags::new(reader.read_u2()?);
    let name = pool.utf8(reader.read_u2()?)?.to_string();
    let descriptor = pool.utf8(reader.read_u2()?)?.to_string();
    let mut signature = None;
    let mut code = None;

    let attributes_count = reader.read_u2()?;
    for _ in 0..attributes_count {
        let attribute_name = pool.utf8(reader.read_u2()?)?;
        let length = reader.read_u4()? as usize;
        match attribute_name {
            "Code" => {
                let mut sub_reader = ClassReader::new(reader.read_slice(length)?);
                let _max_stack = sub_reader.read_u2()?;
                let _max_locals = sub_reader.read_u2()?;
                let code_length = sub_reader.read_u4()? as usize;
                code = Some(sub_reader.read_slice(code_length)?);
                // Exception table and nested attributes are irrelevant here.
            }
            "Signature" => {
                signature = Some(pool.utf8(reader.read_u2()?)?.to_string());
                reader.skip(length.saturating_sub(2))?;
            }
            _ => reader.skip(length)?,
        }
    }

    Ok(RawMethod {
        name,
        descriptor,
        access,
        signature,
        code,
    })
}

fn read_bootstrap_methods(reader: &mut ClassReader<'_>) -> Result<Vec<BootstrapMethod>, ClassParseError> {
    let count = reader.read_u2()?;
    let mut methods = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let method_ref = reader.read_u2()?;
        let argument_count = reader.read_u2()?;
        let mut arguments = Vec::with_capacity(argument_count as usize);
        for _ in 0..argument_count {
            arguments.push(reader.read_u2()?);
        }
        methods.push(BootstrapMethod {
            method_ref,
            arguments,
        });
    }
    Ok(methods)
}

/// Implementation methods of every `LambdaMetafactory` call site in the class.
fn collect_lambda_targets(
    pool: &ConstantPool,
    bootstrap_methods: &[BootstrapMethod],
    bodies: &[Vec<Instruction>],
) -> Result<HashSet<MethodRef>, ClassParseError> {
    let mut targets = HashSet::new();
    let mut seen_bootstraps = HashSet::new();

    for instruction in bodies.iter().flatten() {
        let Instruction::InvokeDynamic {
            bootstrap_index, ..
        } = instruction
        else {
            continue;
        };
        if !seen_bootstraps.insert(*bootstrap_index) {
            continue;
        }
        let Some(bootstrap) = bootstrap_methods.get(*bootstrap_index as usize) else {
            continue;
        };
        if let Some(target) = lambda_implementation(pool, bootstrap)? {
            targets.insert(target);
        }
    }

    Ok(targets)
}

fn lambda_implementation(
    pool: &ConstantPool,
    bootstrap: &BootstrapMethod,
) -> Result<Option<MethodRef>, ClassParseError> {
    let Some((_, factory)) = pool.method_handle(bootstrap.method_ref)? else {
        return Ok(None);
    };
    if factory.owner != LAMBDA_METAFACTORY {
        return Ok(None);
    }
    let shape_ok = match factory.name.as_str() {
        "metafactory" => bootstrap.arguments.len() == 3,
        "altMetafactory" => bootstrap.arguments.len() >= 3,
        _ => false,
    };
    if !shape_ok {
        return Ok(None);
    }

    let implementation = pool.method_handle(bootstrap.arguments[1])?;
    Ok(implementation.map(|(_, member)| member.into()))
}
