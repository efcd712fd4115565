use jm_classfile::MethodRef;
use std::fmt;

/// Non-fatal finding recorded while resolving a hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Diagnostic {
    MissingClass {
        class: String,
    },
    UnresolvedAbstractContract {
        class: String,
        contract: MethodRef,
    },
    AmbiguousBounceOwner {
        bouncer: MethodRef,
        candidates: Vec<MethodRef>,
        chosen: MethodRef,
    },
    UnexpectedRecordAccessorCount {
        class: String,
        field: String,
        accessors: Vec<String>,
    },
    CyclicHierarchy {
        class: String,
    },
    UnwalkableBounce {
        bouncer: MethodRef,
        via: MethodRef,
    },
}

impl Diagnostic {
    /// Class the finding is attributed to.
    pub fn class(&self) -> &str {
        match self {
            Diagnostic::MissingClass { class }
            | Diagnostic::UnresolvedAbstractContract { class, .. }
            | Diagnostic::UnexpectedRecordAccessorCount { class, .. }
            | Diagnostic::CyclicHierarchy { class } => class,
            Diagnostic::AmbiguousBounceOwner { bouncer, .. }
            | Diagnostic::UnwalkableBounce { bouncer, .. } => &bouncer.owner,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::MissingClass { class } => write!(f, "failed to find class {}", class),
            Diagnostic::UnresolvedAbstractContract { class, contract } => {
                write!(f, "unresolved abstract {} for {}", contract, class)
            }
            Diagnostic::AmbiguousBounceOwner {
                bouncer, chosen, candidates,
            } => write!(
                f,
                "bouncer {} has {} candidate owners, chose {}",
                bouncer,
                candidates.len(),
                chosen
            ),
            Diagnostic::UnexpectedRecordAccessorCount {
                class,
                field,
                accessors,
            } => write!(
                f,
                "record component {}.{} has {} accessors: {}",
                class,
                field,
                accessors.len(),
                accessors.join(", ")
            ),
            Diagnostic::CyclicHierarchy { class } => {
                write!(f, "class {} inherits from itself", class)
            }
            Diagnostic::UnwalkableBounce { bouncer, via } => {
                write!(f, "unable to walk {} for {}", via, bouncer)
            }
        }
    }
}
