use crate::access::AccessFlags;
use crate::code::Instruction;

/// Detect a trivial instance getter: `aload_0; getfield <own class>.f; xreturn`.
///
/// Returns the name of the field read. Only zero-argument instance methods
/// qualify; the caller decides whether the field is a record component.
pub fn detect_field_accessor(
    class_name: &str,
    access: AccessFlags,
    descriptor: &str,
    code: &[Instruction],
) -> Option<String> {
    if access.is_static() || !descriptor.starts_with("()") {
        return None;
    }

    match code {
        [receiver, Instruction::GetField(field), Instruction::Return(_), ..]
            if receiver.is_receiver_load() && field.owner == class_name =>
        {
            Some(field.name.clone())
        }
        _ => None,
    }
}
