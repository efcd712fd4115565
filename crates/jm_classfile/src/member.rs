use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a method: `(owner, name, descriptor)`.
///
/// The derived ordering compares owner first, then name, then descriptor,
/// which is the order every deterministic tie-break relies on.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MethodRef {
    pub owner: String,
    pub name: String,
    #[serde(rename = "desc")]
    pub descriptor: String,
}

impl MethodRef {
    pub fn new(
        owner: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            descriptor: descriptor.into(),
        }
    }

    /// Key used by per-class method tables: `name + descriptor`.
    pub fn key(&self) -> String {
        method_key(&self.name, &self.descriptor)
    }

    /// Same name and descriptor, declared on `owner`.
    pub fn with_owner(&self, owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: self.name.clone(),
            descriptor: self.descriptor.clone(),
        }
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}{}", self.owner, self.name, self.descriptor)
    }
}

pub fn method_key(name: &str, descriptor: &str) -> String {
    let mut key = String::with_capacity(name.len() + descriptor.len());
    key.push_str(name);
    key.push_str(descriptor);
    key
}
