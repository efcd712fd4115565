//! Shape matcher for compiler-synthesized forwarding ("bouncer") methods.
//!
//! A bouncer loads `this`, loads each argument in order (optionally running
//! `checkcast`/`instanceof` between loads), tail-calls a method with the same
//! erased stack layout on its own class or direct superclass, and returns the
//! result. Lambda bodies can have exactly the same shape, so methods that a
//! lambda call site in the same class targets are never treated as bouncers.

use crate::access::{AccessFlags, ACC_BRIDGE, ACC_SYNTHETIC};
use crate::code::Instruction;
use crate::descriptor::MethodDescriptor;
use crate::MethodRef;

/// Declaring-class facts the matcher needs.
#[derive(Debug, Clone, Copy)]
pub struct BouncerContext<'a> {
    pub class_name: &'a str,
    pub super_name: Option<&'a str>,
}

/// Method under inspection.
#[derive(Debug, Clone, Copy)]
pub struct BouncerCandidate<'a> {
    pub access: AccessFlags,
    pub descriptor: &'a str,
    pub code: &'a [Instruction],
    pub is_lambda_target: bool,
}

/// Returns the forwarding target when `candidate` is a bouncer.
pub fn detect_bouncer(context: BouncerContext<'_>, candidate: BouncerCandidate<'_>) -> Option<MethodRef> {
    if candidate.is_lambda_target
        || candidate.access.is_static()
        || !candidate.access.intersects(ACC_SYNTHETIC | ACC_BRIDGE)
    {
        return None;
    }

    let code = candidate.code;
    let (first, rest) = code.split_first()?;
    if !first.is_receiver_load() {
        return None;
    }

    let [body @ .., call, Instruction::Return(_)] = rest else {
        return None;
    };
    let Instruction::Invoke { method: target, .. } = call else {
        return None;
    };

    let own = MethodDescriptor::parse(candidate.descriptor).ok()?;
    let mut expected_slot: u16 = 1;
    let mut next_argument = 0usize;
    for instruction in body {
        match instruction {
            Instruction::Load { index, .. } => {
                let parameter = own.parameters.get(next_argument)?;
                if *index != expected_slot {
                    // Out-of-order argument use: a lambda body, not a bridge.
                    return None;
                }
                expected_slot += parameter.slot_size();
                next_argument += 1;
            }
            Instruction::TypeCheck { .. } => {}
            _ => return None,
        }
    }

    let owner_matches =
        target.owner == context.class_name || Some(target.owner.as_str()) == context.super_name;
    if !owner_matches {
        return None;
    }

    let callee = MethodDescriptor::parse(&target.descriptor).ok()?;
    if callee.stack_shape() != own.stack_shape() {
        return None;
    }

    Some(MethodRef::new(
        target.owner.clone(),
        target.name.clone(),
        target.descriptor.clone(),
    ))
}
