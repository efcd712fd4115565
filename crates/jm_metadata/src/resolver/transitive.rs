use super::Resolver;
use crate::model::MethodRecord;
use jm_classfile::MethodRef;
use std::collections::BTreeSet;

impl Resolver<'_> {
    /// Link interface methods of `name` to implementations that only meet
    /// the interface through a descendant, e.g. `class C extends B implements I`
    /// where `B` declares the method.
    pub(super) fn resolve_transitive(&mut self, name: &str) {
        let Some(record) = self.loader.get(name) else {
            return;
        };
        if !record.is_interface() {
            return;
        }
        let methods: Vec<MethodRecord> = record
            .methods
            .values()
            .filter(|method| !method.access.is_static() && !method.access.is_private())
            .cloned()
            .collect();
        if methods.is_empty() {
            return;
        }

        let mut children = self.loader.loaded_names();
        children.retain(|child| child != name && self.loader.is_instance(child, name));
        let mut scope = BTreeSet::new();
        for child in &children {
            scope.extend(self.ancestor_closure(child));
        }

        for method in methods {
            let mut implementations = BTreeSet::new();
            let mut renamed = BTreeSet::new();
            for class in &scope {
                let Some(record) = self.loader.get(class) else {
                    continue;
                };
                let is_interface = record.is_interface();
                let Some(found) = record
                    .method(&method.name, &method.descriptor)
                    .filter(|found| found.is_overridable())
                    .map(MethodRecord::method_ref)
                else {
                    continue;
                };
                if !is_interface || self.loader.is_instance(class, name) {
                    implementations.insert(found.clone());
                }
                renamed.insert(found);
            }
            if implementations.is_empty() {
                continue;
            }

            let root = method.method_ref();
            for implementation in implementations.iter().filter(|found| found.owner != name) {
                if let Some(target) = self.method_mut(&implementation.owner, &implementation.name, &implementation.descriptor) {
                    target.overrides.insert(root.clone());
                }
            }
            self.force_external_name(&renamed);
        }
    }

    /// When any of `siblings` lives outside the primary archive its name
    /// cannot change, so every sibling is forced to keep it.
    fn force_external_name(&mut self, siblings: &BTreeSet<MethodRef>) {
        let Some(external) = siblings
            .iter()
            .find(|sibling| !self.loader.is_local(&sibling.owner))
            .map(|sibling| sibling.name.clone())
        else {
            return;
        };
        for sibling in siblings {
            if let Some(target) = self.method_mut(&sibling.owner, &sibling.name, &sibling.descriptor) {
                target.force_name(external.clone());
            }
        }
    }
}
