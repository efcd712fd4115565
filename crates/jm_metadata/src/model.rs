//! Structural snapshot of loaded classes, mutated in place by the resolver.

use jm_classfile::access::{ACC_FINAL, ACC_STATIC};
use jm_classfile::{method_key, AccessFlags, MethodRef, ParsedClass, ParsedMethod};
use std::collections::{BTreeMap, BTreeSet};

pub const RECORD_BASE: &str = "java/lang/Record";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResolutionState {
    #[default]
    Unvisited,
    Resolved,
}

/// Forwarding edge of a bouncer method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bounce {
    pub target: MethodRef,
    /// Override root the whole bounce chain ultimately lands on, when it lies
    /// outside the declaring class.
    pub resolved_owner: Option<MethodRef>,
}

impl Bounce {
    pub fn new(target: MethodRef) -> Self {
        Self {
            target,
            resolved_owner: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordComponent {
    pub field: String,
    pub descriptor: String,
    /// Trivial getter returning this component.
    pub accessor: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FieldRecord {
    pub name: String,
    pub descriptor: String,
    pub access: AccessFlags,
    pub signature: Option<String>,
    pub forced_name: Option<String>,
    pub accessors: Vec<MethodRef>,
}

#[derive(Debug, Clone)]
pub struct MethodRecord {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
    pub access: AccessFlags,
    pub signature: Option<String>,
    pub is_lambda_target: bool,
    pub bounce: Option<Bounce>,
    pub forced_name: Option<String>,
    name_pinned: bool,
    pub overrides: BTreeSet<MethodRef>,
    /// Bouncers elsewhere whose target is this method.
    pub targets_this: BTreeSet<MethodRef>,
    /// Nearest overridable declaration in the primary archive.
    pub parent: Option<MethodRef>,
}

impl MethodRecord {
    fn from_parsed(owner: &str, method: &ParsedMethod) -> Self {
        Self {
            owner: owner.to_string(),
            name: method.name.clone(),
            descriptor: method.descriptor.clone(),
            access: method.access,
            signature: method.signature.clone(),
            is_lambda_target: method.is_lambda_target,
            bounce: method.bouncer.clone().map(Bounce::new),
            forced_name: None,
            name_pinned: false,
            overrides: BTreeSet::new(),
            targets_this: BTreeSet::new(),
            parent: None,
        }
    }

    pub fn key(&self) -> String {
        method_key(&self.name, &self.descriptor)
    }

    pub fn method_ref(&self) -> MethodRef {
        MethodRef::new(self.owner.clone(), self.name.clone(), self.descriptor.clone())
    }

    /// Static, private and constructor/initializer methods never take part in
    /// overriding.
    pub fn is_overridable(&self) -> bool {
        !self.access.is_static() && !self.access.is_private() && !self.name.starts_with('<')
    }

    /// Visible to subclasses as an override target.
    pub fn is_inheritable(&self) -> bool {
        !self.access.is_final() && !self.access.is_private()
    }

    pub fn is_bouncer(&self) -> bool {
        self.bounce.is_some()
    }

    /// Force a name unless an earlier pass pinned one.
    pub fn force_name(&mut self, name: impl Into<String>) {
        if !self.name_pinned {
            self.forced_name = Some(name.into());
        }
    }

    /// Force a name that later passes may not replace.
    pub fn pin_name(&mut self, name: impl Into<String>) {
        self.forced_name = Some(name.into());
        self.name_pinned = true;
    }

    pub fn is_name_pinned(&self) -> bool {
        self.name_pinned
    }
}

#[derive(Debug, Clone)]
pub struct ClassRecord {
    pub name: String,
    pub super_name: Option<String>,
    pub interfaces: Vec<String>,
    pub access: AccessFlags,
    pub signature: Option<String>,
    pub is_record: bool,
    pub is_local: bool,
    pub fields: BTreeMap<String, FieldRecord>,
    pub methods: BTreeMap<String, MethodRecord>,
    pub state: ResolutionState,
    pub record_components: Option<Vec<RecordComponent>>,
}

impl ClassRecord {
    pub fn from_parsed(parsed: ParsedClass, is_local: bool) -> Self {
        let ParsedClass {
            name,
            super_name,
            interfaces: raw_interfaces,
            access,
            signature,
            fields: parsed_fields,
            methods: parsed_methods,
        } = parsed;

        let is_record = super_name.as_deref() == Some(RECORD_BASE);

        let mut interfaces = Vec::with_capacity(raw_interfaces.len());
        for interface in raw_interfaces {
            if !interfaces.contains(&interface) {
                interfaces.push(interface);
            }
        }

        let mut components = Vec::new();
        let mut fields = BTreeMap::new();
        for field in parsed_fields {
            if is_record && field.access.bits() & (ACC_STATIC | ACC_FINAL) == ACC_FINAL {
                components.push(RecordComponent {
                    field: field.name.clone(),
                    descriptor: field.descriptor.clone(),
                    accessor: None,
                });
            }
            fields.insert(
                field.name.clone(),
                FieldRecord {
                    name: field.name,
                    descriptor: field.descriptor,
                    access: field.access,
                    signature: field.signature,
                    forced_name: None,
                    accessors: Vec::new(),
                },
            );
        }

        let mut methods = BTreeMap::new();
        for method in &parsed_methods {
            let record = MethodRecord::from_parsed(&name, method);
            if is_record {
                if let Some(field) = method
                    .accessor_of
                    .as_ref()
                    .and_then(|field| fields.get_mut(field))
                {
                    field.accessors.push(record.method_ref());
                }
            }
            methods.insert(record.key(), record);
        }

        Self {
            name,
            super_name,
            interfaces,
            access,
            signature,
            is_record,
            is_local,
            fields,
            methods,
            state: ResolutionState::Unvisited,
            record_components: (is_record && !components.is_empty()).then_some(components),
        }
    }

    pub fn is_interface(&self) -> bool {
        self.access.is_interface()
    }

    pub fn is_abstract(&self) -> bool {
        self.access.is_abstract()
    }

    pub fn is_enum(&self) -> bool {
        self.access.is_enum()
    }

    pub fn is_resolved(&self) -> bool {
        self.state == ResolutionState::Resolved
    }

    pub fn method(&self, name: &str, descriptor: &str) -> Option<&MethodRecord> {
        self.methods.get(&method_key(name, descriptor))
    }

    /// Direct supertypes: superclass first, then interfaces in declaration order.
    pub fn supertypes(&self) -> Vec<String> {
        self.super_name
            .iter()
            .chain(self.interfaces.iter())
            .cloned()
            .collect()
    }
}
