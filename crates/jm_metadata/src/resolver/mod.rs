//! Multi-pass hierarchy resolution.
//!
//! Classes are resolved parents first. Per class, in order: enum name
//! fix-up, bounce-chain resolution, override roots and nearest local parent,
//! abstract contracts (concrete classes), record components. Interface
//! default unification runs afterwards over the whole primary archive,
//! because it needs every implementor resolved.

mod abstracts;
mod bounce;
mod enums;
mod overrides;
mod records;
mod transitive;

use crate::diagnostics::Diagnostic;
use crate::loader::ClassLoader;
use crate::model::{MethodRecord, ResolutionState};
use crate::oracle::NameOracle;
use jm_classfile::{method_key, MethodRef};
use std::collections::{BTreeSet, HashSet, VecDeque};
use tracing::{debug, warn};

/// `(method being walked, class currently visited)` pairs already expanded
/// by one recursive walk.
pub(crate) type WalkSeen = HashSet<(MethodRef, String)>;

/// What a recursive walk needs from one visited class.
pub(crate) struct Visit {
    pub parents: Vec<String>,
    pub is_local: bool,
    /// The visited class's own declaration with the walked name+descriptor.
    pub declared: Option<MethodRecord>,
}

pub struct Resolver<'o> {
    loader: ClassLoader,
    oracle: &'o dyn NameOracle,
    obfuscated: bool,
    in_progress: HashSet<String>,
    diagnostics: Vec<Diagnostic>,
    reported: HashSet<Diagnostic>,
}

impl<'o> Resolver<'o> {
    /// `obfuscated` selects whether enum fix-up asks `oracle` for official
    /// names or trusts the names in the bytecode.
    pub fn new(loader: ClassLoader, oracle: &'o dyn NameOracle, obfuscated: bool) -> Self {
        Self {
            loader,
            oracle,
            obfuscated,
            in_progress: HashSet::new(),
            diagnostics: Vec::new(),
            reported: HashSet::new(),
        }
    }

    pub fn loader(&self) -> &ClassLoader {
        &self.loader
    }

    pub fn loader_mut(&mut self) -> &mut ClassLoader {
        &mut self.loader
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Run every pass over the primary-archive `classes`.
    pub fn resolve_archive(&mut self, classes: &BTreeSet<String>) {
        self.link_bouncers(classes);
        for name in classes {
            self.resolve(name);
        }
        for name in classes {
            self.resolve_transitive(name);
        }
        debug!(
            classes = classes.len(),
            diagnostics = self.diagnostics.len(),
            "resolved archive"
        );
    }

    /// Resolve one class and, first, all of its ancestors.
    pub fn resolve(&mut self, name: &str) {
        let Some(record) = self.loader.get(name) else {
            return;
        };
        if record.is_resolved() {
            return;
        }
        let supertypes = record.supertypes();
        let is_abstract = record.is_abstract();

        if !self.in_progress.insert(name.to_string()) {
            self.report(Diagnostic::CyclicHierarchy {
                class: name.to_string(),
            });
            return;
        }

        for parent in &supertypes {
            self.resolve(parent);
        }

        self.fix_enum_names(name);
        self.resolve_bounces(name);
        self.compute_overrides(name);
        if !is_abstract {
            self.resolve_abstract(name);
        }
        self.resolve_record(name);

        if let Some(record) = self.loader.record_mut(name) {
            record.state = ResolutionState::Resolved;
        }
        self.in_progress.remove(name);
    }

    /// Hand back the loader and every diagnostic, missing classes included.
    pub fn into_parts(mut self) -> (ClassLoader, Vec<Diagnostic>) {
        let missing: Vec<String> = self.loader.missing_classes().iter().cloned().collect();
        for class in missing {
            self.diagnostics.push(Diagnostic::MissingClass { class });
        }
        (self.loader, self.diagnostics)
    }

    fn compute_overrides(&mut self, name: &str) {
        let Some(record) = self.loader.get(name) else {
            return;
        };
        let methods: Vec<MethodRecord> = record.methods.values().cloned().collect();

        for method in methods {
            let mut overrides = BTreeSet::new();
            self.find_overrides(&method, name, &mut overrides, &mut WalkSeen::new());
            let parent = self.find_first_parent(&method, name, &mut WalkSeen::new());

            if let Some(target) = self.method_mut(name, &method.name, &method.descriptor) {
                target.overrides = overrides;
                target.parent = parent;
            }
        }
    }

    /// Snapshot of a method, loading its class if needed.
    pub(crate) fn lookup_method(&mut self, owner: &str, name: &str, descriptor: &str) -> Option<MethodRecord> {
        self.loader
            .get(owner)?
            .methods
            .get(&method_key(name, descriptor))
            .cloned()
    }

    pub(crate) fn lookup_ref(&mut self, method: &MethodRef) -> Option<MethodRecord> {
        self.lookup_method(&method.owner, &method.name, &method.descriptor)
    }

    pub(crate) fn method_mut(&mut self, owner: &str, name: &str, descriptor: &str) -> Option<&mut MethodRecord> {
        self.loader
            .record_mut(owner)?
            .methods
            .get_mut(&method_key(name, descriptor))
    }

    pub(crate) fn visit(&mut self, owner: &str, method: &MethodRecord) -> Option<Visit> {
        let record = self.loader.get(owner)?;
        Some(Visit {
            parents: record.supertypes(),
            is_local: record.is_local,
            declared: record.methods.get(&method.key()).cloned(),
        })
    }

    pub(crate) fn supertypes(&mut self, name: &str) -> Option<Vec<String>> {
        self.loader.get(name).map(|record| record.supertypes())
    }

    /// `name` and every loadable ancestor, breadth first.
    pub(crate) fn ancestor_closure(&mut self, name: &str) -> Vec<String> {
        let mut order = Vec::new();
        let mut known = HashSet::from([name.to_string()]);
        let mut queue = VecDeque::from([name.to_string()]);
        while let Some(current) = queue.pop_front() {
            let Some(parents) = self.supertypes(&current) else {
                continue;
            };
            order.push(current);
            for parent in parents {
                if known.insert(parent.clone()) {
                    queue.push_back(parent);
                }
            }
        }
        order
    }

    pub(crate) fn report(&mut self, diagnostic: Diagnostic) {
        if !self.reported.insert(diagnostic.clone()) {
            return;
        }
        warn!(class = %diagnostic.class(), "{}", diagnostic);
        self.diagnostics.push(diagnostic);
    }
}

#[cfg(test)]
mod tests;
