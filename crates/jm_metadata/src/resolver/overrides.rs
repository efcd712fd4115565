use super::{Resolver, WalkSeen};
use crate::model::MethodRecord;
use jm_classfile::MethodRef;
use std::collections::BTreeSet;

impl Resolver<'_> {
    /// Collect the override roots of `method` visible from `owner` upwards,
    /// following bouncers that forward into it.
    pub(super) fn find_overrides(
        &mut self,
        method: &MethodRecord,
        owner: &str,
        roots: &mut BTreeSet<MethodRef>,
        seen: &mut WalkSeen,
    ) {
        if !method.is_overridable() || !seen.insert((method.method_ref(), owner.to_string())) {
            return;
        }
        let Some(visit) = self.visit(owner, method) else {
            return;
        };

        for via in &method.targets_this {
            if let Some(forwarder) = self.lookup_ref(via) {
                self.find_overrides(&forwarder, owner, roots, seen);
            }
        }

        if let Some(mine) = visit.declared {
            if mine.owner != method.owner && mine.is_inheritable() {
                if mine.overrides.is_empty() {
                    roots.insert(mine.method_ref());
                } else {
                    roots.extend(mine.overrides.iter().cloned());
                }
            }
        }

        for parent in &visit.parents {
            self.find_overrides(method, parent, roots, seen);
        }
    }

    /// Nearest inheritable declaration of `method` inside the primary archive.
    pub(super) fn find_first_parent(&mut self, method: &MethodRecord, owner: &str, seen: &mut WalkSeen) -> Option<MethodRef> {
        if !method.is_overridable() || !seen.insert((method.method_ref(), owner.to_string())) {
            return None;
        }
        let visit = self.visit(owner, method)?;

        if visit.is_local {
            if let Some(mine) = &visit.declared {
                if mine.owner != method.owner && mine.is_inheritable() {
                    return Some(mine.method_ref());
                }
            }
        }

        for via in &method.targets_this {
            let Some(forwarder) = self.lookup_ref(via) else {
                continue;
            };
            if let Some(found) = self.find_first_parent(&forwarder, owner, seen) {
                return Some(found);
            }
        }

        for parent in &visit.parents {
            if let Some(found) = self.find_first_parent(method, parent, seen) {
                return Some(found);
            }
        }
        None
    }
}
