use super::Resolver;
use jm_classfile::access::{ACC_ENUM, ACC_FINAL, ACC_PUBLIC, ACC_STATIC};

const CONSTANT_FLAGS: u16 = ACC_FINAL | ACC_ENUM | ACC_PUBLIC | ACC_STATIC;
const VALUES_FIELD: &str = "$VALUES";

impl Resolver<'_> {
    /// Enum constants, `$VALUES`, `values()` and `valueOf(String)` get their
    /// official names; the method names are pinned.
    pub(super) fn fix_enum_names(&mut self, name: &str) {
        let obfuscated = self.obfuscated;
        let oracle = self.oracle;
        let Some(record) = self.loader.record_mut(name) else {
            return;
        };
        if !record.is_enum() {
            return;
        }

        for field in record.fields.values_mut() {
            let official = if obfuscated {
                oracle.field_name(name, &field.name)
            } else {
                Some(field.name.clone())
            };
            let Some(official) = official else {
                continue;
            };
            if field.access.bits() & CONSTANT_FLAGS == CONSTANT_FLAGS || official == VALUES_FIELD {
                field.forced_name = Some(official);
            }
        }

        let values_desc = format!("()[L{};", name);
        let value_of_desc = format!("(Ljava/lang/String;)L{};", name);
        for method in record.methods.values_mut() {
            let official = if obfuscated {
                oracle.method_name(name, &method.name, &method.descriptor)
            } else {
                Some(method.name.clone())
            };
            match official.as_deref() {
                Some("values") if method.descriptor == values_desc => method.pin_name("values"),
                Some("valueOf") if method.descriptor == value_of_desc => method.pin_name("valueOf"),
                _ => {}
            }
        }
    }
}
