//! Name translation used by the enum fix-up.

use jm_classfile::descriptor::remap_descriptor;
use std::collections::BTreeMap;

/// Per-class translation of member names into official names.
pub trait NameOracle {
    /// `None` when the oracle knows nothing about `class`.
    fn field_name(&self, class: &str, field: &str) -> Option<String>;

    fn method_name(&self, class: &str, name: &str, descriptor: &str) -> Option<String>;
}

/// Names in the bytecode are already the official ones.
#[derive(Debug, Default, Clone, Copy)]
pub struct BytecodeNames;

impl NameOracle for BytecodeNames {
    fn field_name(&self, _class: &str, field: &str) -> Option<String> {
        Some(field.to_string())
    }

    fn method_name(&self, _class: &str, name: &str, _descriptor: &str) -> Option<String> {
        Some(name.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassMapping {
    pub mapped: String,
    fields: BTreeMap<String, String>,
    /// `(name, descriptor)` → mapped name; descriptors use original class names.
    methods: BTreeMap<(String, String), String>,
}

impl ClassMapping {
    pub fn add_field(&mut self, original: impl Into<String>, mapped: impl Into<String>) -> &mut Self {
        self.fields.insert(original.into(), mapped.into());
        self
    }

    pub fn add_method(
        &mut self,
        original: impl Into<String>,
        descriptor: impl Into<String>,
        mapped: impl Into<String>,
    ) -> &mut Self {
        self.methods
            .insert((original.into(), descriptor.into()), mapped.into());
        self
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn method(&self, name: &str, descriptor: &str) -> Option<&str> {
        self.methods
            .get(&(name.to_string(), descriptor.to_string()))
            .map(String::as_str)
    }
}

/// In-memory class/field/method name table, filled by an external mapping
/// file parser.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingTable {
    classes: BTreeMap<String, ClassMapping>,
}

impl MappingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_class(&mut self, original: impl Into<String>, mapped: impl Into<String>) -> &mut ClassMapping {
        let entry = self.classes.entry(original.into()).or_default();
        entry.mapped = mapped.into();
        entry
    }

    pub fn class(&self, name: &str) -> Option<&ClassMapping> {
        self.classes.get(name)
    }

    pub fn map_class(&self, name: &str) -> Option<&str> {
        self.classes.get(name).map(|class| class.mapped.as_str())
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// The same table read in the opposite direction. Method descriptors are
    /// rewritten into mapped class names so lookups keep working.
    pub fn reversed(&self) -> MappingTable {
        let rename = |name: &str| self.map_class(name).map(str::to_string);
        let mut reversed = MappingTable::new();
        for (original, class) in &self.classes {
            let target = reversed.add_class(class.mapped.clone(), original.clone());
            for (from, to) in &class.fields {
                target.add_field(to.clone(), from.clone());
            }
            for ((from, descriptor), to) in &class.methods {
                target.add_method(to.clone(), remap_descriptor(descriptor, &rename), from.clone());
            }
        }
        reversed
    }
}

impl NameOracle for MappingTable {
    // A known class answers for every member: unmapped members keep their name.
    fn field_name(&self, class: &str, field: &str) -> Option<String> {
        let mapping = self.class(class)?;
        Some(mapping.field(field).unwrap_or(field).to_string())
    }

    fn method_name(&self, class: &str, name: &str, descriptor: &str) -> Option<String> {
        let mapping = self.class(class)?;
        Some(mapping.method(name, descriptor).unwrap_or(name).to_string())
    }
}
