use super::{Resolver, WalkSeen};
use crate::diagnostics::Diagnostic;
use crate::model::{Bounce, MethodRecord};
use jm_classfile::MethodRef;
use std::collections::{BTreeSet, HashSet};

impl Resolver<'_> {
    /// Record every bouncer of `classes` on the method it forwards to.
    pub(super) fn link_bouncers(&mut self, classes: &BTreeSet<String>) {
        for name in classes {
            let Some(record) = self.loader.get(name) else {
                continue;
            };
            let edges: Vec<(MethodRef, MethodRef)> = record
                .methods
                .values()
                .filter_map(|method| {
                    let bounce = method.bounce.as_ref()?;
                    Some((method.method_ref(), bounce.target.clone()))
                })
                .collect();

            for (bouncer, target) in edges {
                if let Some(method) = self.method_mut(&target.owner, &target.name, &target.descriptor) {
                    method.targets_this.insert(bouncer);
                }
            }
        }
    }

    /// Point each bouncer of `name` at the class that really declares its
    /// target, then record the override root the chain lands on.
    pub(super) fn resolve_bounces(&mut self, name: &str) {
        let Some(record) = self.loader.get(name) else {
            return;
        };
        let bouncers: Vec<MethodRecord> = record
            .methods
            .values()
            .filter(|method| method.is_bouncer())
            .cloned()
            .collect();

        for method in bouncers {
            let Some(bounce) = method.bounce.as_ref() else {
                continue;
            };

            if bounce.target.owner != name {
                if let Some(declared) = self.find_method_content(&bounce.target, &mut HashSet::new()) {
                    if let Some(slot) = self.bounce_slot(&method.method_ref()) {
                        slot.target = declared;
                    }
                }
            }

            let owner = self.walk_bouncers(&method, name, &mut WalkSeen::new());
            if let Some(owner) = owner.filter(|owner| owner.owner != name) {
                if let Some(slot) = self.bounce_slot(&method.method_ref()) {
                    slot.resolved_owner = Some(owner);
                }
            }
        }
    }

    /// Nearest class, starting at `method.owner`, that declares the method.
    pub(super) fn find_method_content(&mut self, method: &MethodRef, seen: &mut HashSet<String>) -> Option<MethodRef> {
        if !seen.insert(method.owner.clone()) {
            return None;
        }
        let record = self.loader.get(&method.owner)?;
        if record.methods.contains_key(&method.key()) {
            return Some(method.clone());
        }
        let parents = record.supertypes();

        parents
            .into_iter()
            .find_map(|parent| self.find_method_content(&method.with_owner(parent), seen))
    }

    /// Walk up from `owner` looking for the root that `method`'s bounce chain
    /// settles on.
    pub(super) fn walk_bouncers(&mut self, method: &MethodRecord, owner: &str, seen: &mut WalkSeen) -> Option<MethodRef> {
        if !seen.insert((method.method_ref(), owner.to_string())) {
            return None;
        }
        let visit = self.visit(owner, method)?;

        let declared = visit
            .declared
            .filter(|mine| mine.is_inheritable() || owner == method.owner);
        if let Some(mine) = declared {
            if !mine.is_bouncer() {
                let mut roots = BTreeSet::new();
                self.find_overrides(&mine, owner, &mut roots, &mut WalkSeen::new());
                return Some(self.pick_bounce_owner(method, &mine, roots));
            }

            for via in &mine.targets_this {
                let Some(forwarder) = self.lookup_ref(via) else {
                    continue;
                };
                let Some(bounce) = forwarder.bounce.as_ref() else {
                    continue;
                };
                if let Some(resolved) = &bounce.resolved_owner {
                    return Some(resolved.clone());
                }

                match self.walk_bouncers(&forwarder, owner, seen) {
                    Some(found) if found.owner != owner => {
                        if let Some(slot) = self.bounce_slot(via) {
                            slot.resolved_owner = Some(found.clone());
                        }
                        return Some(found);
                    }
                    _ => self.report(Diagnostic::UnwalkableBounce {
                        bouncer: mine.method_ref(),
                        via: via.clone(),
                    }),
                }
            }
        }

        for parent in visit.parents {
            if let Some(found) = self.walk_bouncers(method, &parent, seen) {
                return Some(found);
            }
        }
        None
    }

    fn pick_bounce_owner(&mut self, method: &MethodRecord, landing: &MethodRecord, roots: BTreeSet<MethodRef>) -> MethodRef {
        let mut candidates = roots.into_iter();
        let Some(chosen) = candidates.next() else {
            return landing.method_ref();
        };
        let rest: Vec<MethodRef> = candidates.collect();
        if !rest.is_empty() {
            let mut all = vec![chosen.clone()];
            all.extend(rest);
            self.report(Diagnostic::AmbiguousBounceOwner {
                bouncer: method.method_ref(),
                candidates: all,
                chosen: chosen.clone(),
            });
        }
        chosen
    }

    fn bounce_slot(&mut self, method: &MethodRef) -> Option<&mut Bounce> {
        self.method_mut(&method.owner, &method.name, &method.descriptor)?
            .bounce
            .as_mut()
    }
}
