use super::Resolver;
use crate::diagnostics::Diagnostic;
use jm_classfile::MethodRef;
use std::collections::{BTreeMap, BTreeSet};

impl Resolver<'_> {
    /// Bind every abstract root reachable from the concrete class `name` to
    /// the first concrete implementation in breadth-first ancestor order.
    pub(super) fn resolve_abstract(&mut self, name: &str) {
        let closure = self.ancestor_closure(name);

        // name+descriptor -> abstract roots declaring it
        let mut contracts: BTreeMap<String, BTreeSet<MethodRef>> = BTreeMap::new();
        for class in &closure {
            let Some(record) = self.loader.get(class) else {
                continue;
            };
            for method in record.methods.values() {
                if method.access.is_abstract() && method.overrides.is_empty() {
                    contracts
                        .entry(method.key())
                        .or_default()
                        .insert(method.method_ref());
                }
            }
        }

        for class in &closure {
            if contracts.is_empty() {
                break;
            }
            let Some(record) = self.loader.record_mut(class) else {
                continue;
            };
            for method in record.methods.values_mut() {
                if method.access.is_abstract() || !method.is_overridable() {
                    continue;
                }
                if let Some(roots) = contracts.remove(&method.key()) {
                    method.overrides.extend(roots);
                }
            }
        }

        for contract in contracts.into_values().flatten() {
            self.report(Diagnostic::UnresolvedAbstractContract {
                class: name.to_string(),
                contract,
            });
        }
    }
}
