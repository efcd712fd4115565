//! Minimal class-file emitter.
//!
//! Produces structurally valid version 52 class files containing exactly the
//! constructs the parser inspects: hierarchy, members, signatures, method
//! bodies and lambda bootstrap tables. Stack maps are not emitted, so the
//! output is meant for analysis, not for loading into a VM.

use crate::access::{AccessFlags, ACC_ABSTRACT, ACC_NATIVE};
use crate::code::LoadKind;
use crate::descriptor::MethodDescriptor;
use crate::opcodes::*;
use crate::MethodRef;
use std::collections::HashMap;

const MAJOR_VERSION: u16 = 52;
const LAMBDA_METAFACTORY: &str = "java/lang/invoke/LambdaMetafactory";
const METAFACTORY_DESCRIPTOR: &str = "(Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;Ljava/lang/invoke/MethodType;Ljava/lang/invoke/MethodType;Ljava/lang/invoke/MethodHandle;Ljava/lang/invoke/MethodType;)Ljava/lang/invoke/CallSite;";
const ALT_METAFACTORY_DESCRIPTOR: &str = "(Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;Ljava/lang/invoke/MethodType;[Ljava/lang/Object;)Ljava/lang/invoke/CallSite;";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum PoolKey {
    Utf8(String),
    Integer(i32),
    Class(String),
    NameAndType(String, String),
    Member(u8, String, String, String),
    MethodHandle(u8, u8, String, String, String),
    MethodType(String),
    InvokeDynamic(u16, String, String),
}

#[derive(Default)]
struct PoolWriter {
    bytes: Vec<u8>,
    next_index: u16,
    interned: HashMap<PoolKey, u16>,
}

impl PoolWriter {
    fn new() -> Self {
        Self {
            next_index: 1,
            ..Self::default()
        }
    }

    fn intern(&mut self, key: PoolKey, body: impl FnOnce(&mut Self) -> Vec<u8>) -> u16 {
        if let Some(index) = self.interned.get(&key) {
            return *index;
        }
        let entry = body(self);
        let index = self.next_index;
        self.bytes.extend_from_slice(&entry);
        self.next_index += 1;
        self.interned.insert(key, index);
        index
    }

    fn utf8(&mut self, value: &str) -> u16 {
        self.intern(PoolKey::Utf8(value.to_string()), |_| {
            let encoded = encode_modified_utf8(value);
            let mut entry = vec![1];
            entry.extend_from_slice(&(encoded.len() as u16).to_be_bytes());
            entry.extend_from_slice(&encoded);
            entry
        })
    }

    fn integer(&mut self, value: i32) -> u16 {
        self.intern(PoolKey::Integer(value), |_| {
            let mut entry = vec![3];
            entry.extend_from_slice(&value.to_be_bytes());
            entry
        })
    }

    fn class(&mut self, name: &str) -> u16 {
        self.intern(PoolKey::Class(name.to_string()), |pool| {
            let name_index = pool.utf8(name);
            tagged(7, &[name_index])
        })
    }

    fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        self.intern(
            PoolKey::NameAndType(name.to_string(), descriptor.to_string()),
            |pool| {
                let name_index = pool.utf8(name);
                let descriptor_index = pool.utf8(descriptor);
                tagged(12, &[name_index, descriptor_index])
            },
        )
    }

    /// `tag` is 9 (field), 10 (method) or 11 (interface method).
    fn member(&mut self, tag: u8, owner: &str, name: &str, descriptor: &str) -> u16 {
        self.intern(
            PoolKey::Member(tag, owner.to_string(), name.to_string(), descriptor.to_string()),
            |pool| {
                let class_index = pool.class(owner);
                let name_and_type_index = pool.name_and_type(name, descriptor);
                tagged(tag, &[class_index, name_and_type_index])
            },
        )
    }

    fn method_handle(&mut self, kind: u8, method: &MethodRef, interface: bool) -> u16 {
        let tag = if interface { 11 } else { 10 };
        self.intern(
            PoolKey::MethodHandle(
                kind,
                tag,
                method.owner.clone(),
                method.name.clone(),
                method.descriptor.clone(),
            ),
            |pool| {
                let reference_index = pool.member(tag, &method.owner, &method.name, &method.descriptor);
                let mut entry = vec![15, kind];
                entry.extend_from_slice(&reference_index.to_be_bytes());
                entry
            },
        )
    }

    fn method_type(&mut self, descriptor: &str) -> u16 {
        self.intern(PoolKey::MethodType(descriptor.to_string()), |pool| {
            let descriptor_index = pool.utf8(descriptor);
            tagged(16, &[descriptor_index])
        })
    }

    fn invoke_dynamic(&mut self, bootstrap_index: u16, name: &str, descriptor: &str) -> u16 {
        self.intern(
            PoolKey::InvokeDynamic(bootstrap_index, name.to_string(), descriptor.to_string()),
            |pool| {
                let name_and_type_index = pool.name_and_type(name, descriptor);
                tagged(18, &[bootstrap_index, name_and_type_index])
            },
        )
    }
}

fn tagged(tag: u8, operands: &[u16]) -> Vec<u8> {
    let mut entry = vec![tag];
    for operand in operands {
        entry.extend_from_slice(&operand.to_be_bytes());
    }
    entry
}

fn encode_modified_utf8(value: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len());
    for unit in value.encode_utf16() {
        match unit {
            0x0001..=0x007F => out.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                out.push(0xC0 | ((unit >> 6) & 0x1F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                out.push(0xE0 | ((unit >> 12) & 0x0F) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    out
}

/// Which `LambdaMetafactory` bootstrap a lambda call site uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LambdaFactory {
    Metafactory,
    /// `altMetafactory` with a zero flags word.
    AltMetafactory,
}

/// Implementation side of a lambda call site.
#[derive(Debug, Clone)]
pub struct LambdaSite<'a> {
    pub factory: LambdaFactory,
    /// Functional interface method name, e.g. `apply`.
    pub name: &'a str,
    /// Call-site descriptor: captured values in, functional interface out.
    pub descriptor: &'a str,
    /// Erased functional method descriptor.
    pub erased: &'a str,
    pub implementation: &'a MethodRef,
    /// Method-handle kind of `implementation`, e.g. `REF_INVOKE_STATIC`.
    pub implementation_kind: u8,
    /// Instantiated functional method descriptor.
    pub instantiated: &'a str,
}

struct BootstrapEntry {
    method_ref: u16,
    arguments: Vec<u16>,
}

struct MemberEntry {
    access: u16,
    name: u16,
    descriptor: u16,
    signature: Option<u16>,
    code: Option<CodeEntry>,
}

struct CodeEntry {
    max_stack: u16,
    max_locals: u16,
    bytes: Vec<u8>,
}

/// Builds one class file.
pub struct ClassFileWriter {
    pool: PoolWriter,
    access: u16,
    this_class: u16,
    super_class: u16,
    interfaces: Vec<u16>,
    signature: Option<u16>,
    fields: Vec<MemberEntry>,
    methods: Vec<MemberEntry>,
    bootstrap_methods: Vec<BootstrapEntry>,
}

impl ClassFileWriter {
    pub fn new(name: &str, super_name: Option<&str>, access: u16) -> Self {
        let mut pool = PoolWriter::new();
        let this_class = pool.class(name);
        let super_class = super_name.map(|name| pool.class(name)).unwrap_or(0);
        Self {
            pool,
            access,
            this_class,
            super_class,
            interfaces: Vec::new(),
            signature: None,
            fields: Vec::new(),
            methods: Vec::new(),
            bootstrap_methods: Vec::new(),
        }
    }

    pub fn interface(mut self, name: &str) -> Self {
        let index = self.pool.class(name);
        self.interfaces.push(index);
        self
    }

    pub fn signature(mut self, signature: &str) -> Self {
        self.signature = Some(self.pool.utf8(signature));
        self
    }

    pub fn field(self, access: u16, name: &str, descriptor: &str) -> Self {
        self.push_field(access, name, descriptor, None)
    }

    pub fn generic_field(self, access: u16, name: &str, descriptor: &str, signature: &str) -> Self {
        self.push_field(access, name, descriptor, Some(signature))
    }

    pub fn abstract_method(self, access: u16, name: &str, descriptor: &str) -> Self {
        self.push_method(access | ACC_ABSTRACT, name, descriptor, None, None)
    }

    pub fn native_method(self, access: u16, name: &str, descriptor: &str) -> Self {
        self.push_method(access | ACC_NATIVE, name, descriptor, None, None)
    }

    /// Add a method whose body is written by `body`.
    pub fn method(
        self,
        access: u16,
        name: &str,
        descriptor: &str,
        body: impl FnOnce(&mut CodeWriter<'_>),
    ) -> Self {
        self.build_method(access, name, descriptor, None, body)
    }

    pub fn generic_method(
        self,
        access: u16,
        name: &str,
        descriptor: &str,
        signature: &str,
        body: impl FnOnce(&mut CodeWriter<'_>),
    ) -> Self {
        self.build_method(access, name, descriptor, Some(signature), body)
    }

    fn build_method(
        mut self,
        access: u16,
        name: &str,
        descriptor: &str,
        signature: Option<&str>,
        body: impl FnOnce(&mut CodeWriter<'_>),
    ) -> Self {
        let parameter_slots = MethodDescriptor::parse(descriptor)
            .map(|parsed| parsed.parameter_slots())
            .unwrap_or(0);
        let receiver = if AccessFlags::new(access).is_static() { 0 } else { 1 };

        let mut code = CodeWriter {
            pool: &mut self.pool,
            bootstrap_methods: &mut self.bootstrap_methods,
            bytes: Vec::new(),
            max_locals: parameter_slots + receiver,
        };
        body(&mut code);
        let entry = CodeEntry {
            // Bodies are short straight-line sequences; a fixed bound suffices.
            max_stack: parameter_slots + receiver + 4,
            max_locals: code.max_locals,
            bytes: code.bytes,
        };
        self.push_method(access, name, descriptor, signature, Some(entry))
    }

    fn push_field(mut self, access: u16, name: &str, descriptor: &str, signature: Option<&str>) -> Self {
        let entry = MemberEntry {
            access,
            name: self.pool.utf8(name),
            descriptor: self.pool.utf8(descriptor),
            signature: signature.map(|signature| self.pool.utf8(signature)),
            code: None,
        };
        self.fields.push(entry);
        self
    }

    fn push_method(
        mut self,
        access: u16,
        name: &str,
        descriptor: &str,
        signature: Option<&str>,
        code: Option<CodeEntry>,
    ) -> Self {
        let entry = MemberEntry {
            access,
            name: self.pool.utf8(name),
            descriptor: self.pool.utf8(descriptor),
            signature: signature.map(|signature| self.pool.utf8(signature)),
            code,
        };
        self.methods.push(entry);
        self
    }

    pub fn finish(mut self) -> Vec<u8> {
        let code_name = self.pool.utf8("Code");
        let signature_name = self.pool.utf8("Signature");
        let bootstrap_name = (!self.bootstrap_methods.is_empty()).then(|| self.pool.utf8("BootstrapMethods"));

        let mut out = Vec::new();
        out.extend_from_slice(&0xCAFE_BABEu32.to_be_bytes());
        put_u2(&mut out, 0);
        put_u2(&mut out, MAJOR_VERSION);
        put_u2(&mut out, self.pool.next_index);
        out.extend_from_slice(&self.pool.bytes);

        put_u2(&mut out, self.access);
        put_u2(&mut out, self.this_class);
        put_u2(&mut out, self.super_class);
        put_u2(&mut out, self.interfaces.len() as u16);
        for interface in &self.interfaces {
            put_u2(&mut out, *interface);
        }

        for members in [&self.fields, &self.methods] {
            put_u2(&mut out, members.len() as u16);
            for member in members {
                write_member(&mut out, member, code_name, signature_name);
            }
        }

        let mut attributes: Vec<(u16, Vec<u8>)> = Vec::new();
        if let Some(signature) = self.signature {
            attributes.push((signature_name, signature.to_be_bytes().to_vec()));
        }
        if let Some(bootstrap_name) = bootstrap_name {
            let mut table = Vec::new();
            put_u2(&mut table, self.bootstrap_methods.len() as u16);
            for bootstrap in &self.bootstrap_methods {
                put_u2(&mut table, bootstrap.method_ref);
                put_u2(&mut table, bootstrap.arguments.len() as u16);
                for argument in &bootstrap.arguments {
                    put_u2(&mut table, *argument);
                }
            }
            attributes.push((bootstrap_name, table));
        }
        write_attributes(&mut out, &attributes);

        out
    }
}

fn write_member(out: &mut Vec<u8>, member: &MemberEntry, code_name: u16, signature_name: u16) {
    put_u2(out, member.access);
    put_u2(out, member.name);
    put_u2(out, member.descriptor);

    let mut attributes: Vec<(u16, Vec<u8>)> = Vec::new();
    if let Some(code) = &member.code {
        let mut body = Vec::new();
        put_u2(&mut body, code.max_stack);
        put_u2(&mut body, code.max_locals);
        body.extend_from_slice(&(code.bytes.len() as u32).to_be_bytes());
        body.extend_from_slice(&code.bytes);
        put_u2(&mut body, 0); // exception table
        put_u2(&mut body, 0); // attributes
        attributes.push((code_name, body));
    }
    if let Some(signature) = member.signature {
        attributes.push((signature_name, signature.to_be_bytes().to_vec()));
    }
    write_attributes(out, &attributes);
}

fn write_attributes(out: &mut Vec<u8>, attributes: &[(u16, Vec<u8>)]) {
    put_u2(out, attributes.len() as u16);
    for (name, body) in attributes {
        put_u2(out, *name);
        out.extend_from_slice(&(body.len() as u32).to_be_bytes());
        out.extend_from_slice(body);
    }
}

fn put_u2(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

/// Appends instructions to one method body.
pub struct CodeWriter<'w> {
    pool: &'w mut PoolWriter,
    bootstrap_methods: &'w mut Vec<BootstrapEntry>,
    bytes: Vec<u8>,
    max_locals: u16,
}

impl CodeWriter<'_> {
    /// Raw single-byte instruction.
    pub fn op(&mut self, opcode: u8) -> &mut Self {
        self.bytes.push(opcode);
        self
    }

    /// Load a local using the shortest encoding.
    pub fn load(&mut self, kind: LoadKind, index: u16) -> &mut Self {
        let base = match kind {
            LoadKind::Int => 0,
            LoadKind::Long => 1,
            LoadKind::Float => 2,
            LoadKind::Double => 3,
            LoadKind::Reference => 4,
        };
        let width = if matches!(kind, LoadKind::Long | LoadKind::Double) { 2 } else { 1 };
        self.max_locals = self.max_locals.max(index + width);

        if index <= 3 {
            self.bytes.push(ILOAD_0 + base * 4 + index as u8);
        } else if let Ok(short) = u8::try_from(index) {
            self.bytes.push(ILOAD + base);
            self.bytes.push(short);
        } else {
            self.bytes.push(WIDE);
            self.bytes.push(ILOAD + base);
            self.bytes.extend_from_slice(&index.to_be_bytes());
        }
        self
    }

    pub fn checkcast(&mut self, class: &str) -> &mut Self {
        self.class_op(CHECKCAST, class)
    }

    pub fn instanceof(&mut self, class: &str) -> &mut Self {
        self.class_op(INSTANCEOF, class)
    }

    fn class_op(&mut self, opcode: u8, class: &str) -> &mut Self {
        let index = self.pool.class(class);
        self.bytes.push(opcode);
        self.bytes.extend_from_slice(&index.to_be_bytes());
        self
    }

    pub fn getfield(&mut self, owner: &str, name: &str, descriptor: &str) -> &mut Self {
        let index = self.pool.member(9, owner, name, descriptor);
        self.bytes.push(GETFIELD);
        self.bytes.extend_from_slice(&index.to_be_bytes());
        self
    }

    /// `invokevirtual`, `invokespecial`, `invokestatic` or `invokeinterface`.
    pub fn invoke(&mut self, opcode: u8, method: &MethodRef) -> &mut Self {
        let tag = if opcode == INVOKEINTERFACE { 11 } else { 10 };
        let index = self
            .pool
            .member(tag, &method.owner, &method.name, &method.descriptor);
        self.bytes.push(opcode);
        self.bytes.extend_from_slice(&index.to_be_bytes());
        if opcode == INVOKEINTERFACE {
            let count = MethodDescriptor::parse(&method.descriptor)
                .map(|parsed| parsed.parameter_slots() + 1)
                .unwrap_or(1);
            self.bytes.push(count as u8);
            self.bytes.push(0);
        }
        self
    }

    /// Emit an `invokedynamic` backed by `LambdaMetafactory`.
    pub fn lambda(&mut self, site: &LambdaSite<'_>) -> &mut Self {
        let (factory_name, factory_descriptor) = match site.factory {
            LambdaFactory::Metafactory => ("metafactory", METAFACTORY_DESCRIPTOR),
            LambdaFactory::AltMetafactory => ("altMetafactory", ALT_METAFACTORY_DESCRIPTOR),
        };
        let factory = MethodRef::new(LAMBDA_METAFACTORY, factory_name, factory_descriptor);
        let method_ref = self.pool.method_handle(REF_INVOKE_STATIC, &factory, false);

        let mut arguments = vec![
            self.pool.method_type(site.erased),
            self.pool.method_handle(
                site.implementation_kind,
                site.implementation,
                site.implementation_kind == REF_INVOKE_INTERFACE,
            ),
            self.pool.method_type(site.instantiated),
        ];
        if site.factory == LambdaFactory::AltMetafactory {
            arguments.push(self.pool.integer(0));
        }

        let bootstrap_index = self.bootstrap_methods.len() as u16;
        self.bootstrap_methods.push(BootstrapEntry {
            method_ref,
            arguments,
        });
        let index = self
            .pool
            .invoke_dynamic(bootstrap_index, site.name, site.descriptor);
        self.bytes.push(INVOKEDYNAMIC);
        self.bytes.extend_from_slice(&index.to_be_bytes());
        self.bytes.extend_from_slice(&[0, 0]);
        self
    }
}
