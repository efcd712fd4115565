//! Serializable view of resolved classes.
//!
//! Key names and omission rules match the `<label>_meta.json` files consumed
//! by downstream mapping tools: empty collections, zero access words and
//! `java/lang/Object` as super class are left out.

use crate::error::MetadataError;
use crate::loader::ClassLoader;
use crate::model::{ClassRecord, FieldRecord, MethodRecord, RecordComponent};
use blake3::Hasher;
use jm_classfile::{AccessFlags, MethodRef};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

const OBJECT: &str = "java/lang/Object";

fn is_zero(flags: &AccessFlags) -> bool {
    flags.is_empty()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassMetadata {
    #[serde(rename = "superName", default, skip_serializing_if = "Option::is_none")]
    pub super_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<String>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub access: AccessFlags,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, FieldMetadata>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub methods: BTreeMap<String, MethodMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub records: Option<Vec<RecordMetadata>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMetadata {
    pub desc: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub access: AccessFlags,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BounceMetadata {
    pub target: MethodRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<MethodRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodMetadata {
    #[serde(default, skip_serializing_if = "is_zero")]
    pub access: AccessFlags,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bouncer: Option<BounceMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub overrides: BTreeSet<MethodRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<MethodRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub field: String,
    pub desc: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<String>,
}

impl From<&FieldRecord> for FieldMetadata {
    fn from(field: &FieldRecord) -> Self {
        Self {
            desc: field.descriptor.clone(),
            access: field.access,
            signature: field.signature.clone(),
            force: field.forced_name.clone(),
        }
    }
}

impl From<&MethodRecord> for MethodMetadata {
    fn from(method: &MethodRecord) -> Self {
        Self {
            access: method.access,
            signature: method.signature.clone(),
            bouncer: method.bounce.as_ref().map(|bounce| BounceMetadata {
                target: bounce.target.clone(),
                owner: bounce.resolved_owner.clone(),
            }),
            force: method.forced_name.clone(),
            overrides: method.overrides.clone(),
            parent: method.parent.clone(),
        }
    }
}

impl From<&RecordComponent> for RecordMetadata {
    fn from(component: &RecordComponent) -> Self {
        Self {
            field: component.field.clone(),
            desc: component.descriptor.clone(),
            methods: component.accessor.iter().cloned().collect(),
        }
    }
}

impl From<&ClassRecord> for ClassMetadata {
    fn from(class: &ClassRecord) -> Self {
        Self {
            super_name: class.super_name.clone().filter(|name| name != OBJECT),
            interfaces: class.interfaces.clone(),
            access: class.access,
            signature: class.signature.clone(),
            fields: class
                .fields
                .iter()
                .map(|(name, field)| (name.clone(), FieldMetadata::from(field)))
                .collect(),
            methods: class
                .methods
                .iter()
                .map(|(key, method)| (key.clone(), MethodMetadata::from(method)))
                .collect(),
            records: class
                .record_components
                .as_ref()
                .map(|components| components.iter().map(RecordMetadata::from).collect()),
        }
    }
}

/// Name-sorted metadata for every class of one primary archive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataMap {
    classes: BTreeMap<String, ClassMetadata>,
}

impl MetadataMap {
    /// Snapshot `classes` out of an already resolved loader. Names the loader
    /// never managed to parse are left out.
    pub fn collect(loader: &ClassLoader, classes: &BTreeSet<String>) -> Self {
        let classes = classes
            .iter()
            .filter_map(|name| {
                let record = loader.peek(name)?;
                Some((name.clone(), ClassMetadata::from(record)))
            })
            .collect();
        Self { classes }
    }

    pub fn get(&self, name: &str) -> Option<&ClassMetadata> {
        self.classes.get(name)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ClassMetadata)> {
        self.classes.iter()
    }

    pub fn to_json_pretty(&self) -> Result<String, MetadataError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, MetadataError> {
        Ok(serde_json::from_str(json)?)
    }

    /// BLAKE3 digest of the serialized form, hex encoded.
    pub fn fingerprint(&self) -> Result<String, MetadataError> {
        let encoded = self.to_json_pretty()?;
        let mut hasher = Hasher::new();
        hasher.update(encoded.as_bytes());
        Ok(hasher.finalize().to_hex().to_string())
    }

    pub fn write_json(&self, path: &Path) -> Result<(), MetadataError> {
        let encoded = self.to_json_pretty()?;
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| MetadataError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, encoded).map_err(|source| MetadataError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jm_classfile::access::{ACC_PUBLIC, ACC_SUPER, ACC_SYNTHETIC};

    fn bare_method(owner: &str) -> MethodMetadata {
        MethodMetadata {
            access: AccessFlags::new(ACC_PUBLIC | ACC_SYNTHETIC),
            signature: None,
            bouncer: Some(BounceMetadata {
                target: MethodRef::new(owner, "run", "(Ljava/lang/String;)V"),
                owner: None,
            }),
            force: None,
            overrides: BTreeSet::new(),
            parent: None,
        }
    }

    #[test]
    fn empty_parts_are_omitted() {
        let method = bare_method("a/B");
        let json = serde_json::to_value(&method).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "access": 4097,
                "bouncer": { "target": { "owner": "a/B", "name": "run", "desc": "(Ljava/lang/String;)V" } }
            })
        );

        let class = ClassMetadata {
            super_name: None,
            interfaces: Vec::new(),
            access: AccessFlags::new(ACC_PUBLIC | ACC_SUPER),
            signature: None,
            fields: BTreeMap::new(),
            methods: BTreeMap::from([("run(Ljava/lang/Object;)V".to_string(), method)]),
            records: None,
        };
        let json = serde_json::to_value(&class).unwrap();
        assert_eq!(json.as_object().map(|o| o.len()), Some(2));
        assert!(json.get("superName").is_none());
    }

    #[test]
    fn json_reads_back_into_the_same_map() {
        let mut classes = BTreeMap::new();
        classes.insert(
            "a/B".to_string(),
            ClassMetadata {
                super_name: Some("a/Base".to_string()),
                interfaces: vec!["a/I".to_string()],
                access: AccessFlags::new(ACC_PUBLIC),
                signature: None,
                fields: BTreeMap::new(),
                methods: BTreeMap::from([("run()V".to_string(), bare_method("a/B"))]),
                records: Some(vec![RecordMetadata {
                    field: "x".to_string(),
                    desc: "I".to_string(),
                    methods: vec!["x".to_string()],
                }]),
            },
        );
        let map = MetadataMap { classes };
        let json = map.to_json_pretty().unwrap();
        assert!(json.contains("\"superName\": \"a/Base\""));
        assert_eq!(MetadataMap::from_json(&json).unwrap(), map);
        assert_eq!(map.fingerprint().unwrap().len(), 64);
    }
}
