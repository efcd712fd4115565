use serde::{Deserialize, Serialize};
use std::fmt;

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_PRIVATE: u16 = 0x0002;
pub const ACC_PROTECTED: u16 = 0x0004;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_FINAL: u16 = 0x0010;
pub const ACC_SUPER: u16 = 0x0020;
pub const ACC_BRIDGE: u16 = 0x0040;
pub const ACC_VARARGS: u16 = 0x0080;
pub const ACC_NATIVE: u16 = 0x0100;
pub const ACC_INTERFACE: u16 = 0x0200;
pub const ACC_ABSTRACT: u16 = 0x0400;
pub const ACC_SYNTHETIC: u16 = 0x1000;
pub const ACC_ANNOTATION: u16 = 0x2000;
pub const ACC_ENUM: u16 = 0x4000;

/// Raw `access_flags` word shared by classes, fields and methods.
///
/// Serializes as the bare integer so emitted metadata stays compatible with
/// tools that read the flags directly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessFlags(pub u16);

impl AccessFlags {
    pub const fn new(bits: u16) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn contains(self, flags: u16) -> bool {
        self.0 & flags == flags
    }

    pub const fn intersects(self, flags: u16) -> bool {
        self.0 & flags != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn is_public(self) -> bool {
        self.intersects(ACC_PUBLIC)
    }

    pub const fn is_private(self) -> bool {
        self.intersects(ACC_PRIVATE)
    }

    pub const fn is_protected(self) -> bool {
        self.intersects(ACC_PROTECTED)
    }

    pub const fn is_static(self) -> bool {
        self.intersects(ACC_STATIC)
    }

    pub const fn is_final(self) -> bool {
        self.intersects(ACC_FINAL)
    }

    pub const fn is_interface(self) -> bool {
        self.intersects(ACC_INTERFACE)
    }

    pub const fn is_abstract(self) -> bool {
        self.intersects(ACC_ABSTRACT)
    }

    pub const fn is_synthetic(self) -> bool {
        self.intersects(ACC_SYNTHETIC)
    }

    pub const fn is_bridge(self) -> bool {
        self.intersects(ACC_BRIDGE)
    }

    pub const fn is_enum(self) -> bool {
        self.intersects(ACC_ENUM)
    }

    pub const fn is_annotation(self) -> bool {
        self.intersects(ACC_ANNOTATION)
    }

    pub const fn is_package_private(self) -> bool {
        !self.intersects(ACC_PUBLIC | ACC_PRIVATE | ACC_PROTECTED)
    }
}

impl From<u16> for AccessFlags {
    fn from(bits: u16) -> Self {
        Self(bits)
    }
}

impl fmt::Display for AccessFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(u16, &str); 9] = [
            (ACC_PUBLIC, "public"),
            (ACC_PRIVATE, "private"),
            (ACC_PROTECTED, "protected"),
            (ACC_STATIC, "static"),
            (ACC_FINAL, "final"),
            (ACC_ABSTRACT, "abstract"),
            (ACC_SYNTHETIC, "synthetic"),
            (ACC_INTERFACE, "interface"),
            (ACC_ENUM, "enum"),
        ];
        let mut first = true;
        for (flag, name) in NAMES {
            if self.intersects(flag) {
                if !first {
                    f.write_str(" ")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enum_constant_combination_requires_every_bit() {
        let constant = AccessFlags::new(ACC_PUBLIC | ACC_STATIC | ACC_FINAL | ACC_ENUM);
        let values = AccessFlags::new(ACC_PRIVATE | ACC_STATIC | ACC_FINAL | ACC_SYNTHETIC);
        let wanted = ACC_PUBLIC | ACC_STATIC | ACC_FINAL | ACC_ENUM;

        assert!(constant.contains(wanted));
        assert!(!values.contains(wanted));
    }

    #[test]
    fn display_lists_known_modifiers() {
        let flags = AccessFlags::new(ACC_PUBLIC | ACC_ABSTRACT | ACC_INTERFACE);
        assert_eq!(flags.to_string(), "public abstract interface");
        assert!(AccessFlags::default().is_package_private());
    }
}
