use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// JVM access flags shared by classes, fields, methods and inner-class entries
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct AccessFlags: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const SUPER = 0x0020;
        const SYNCHRONIZED = 0x0020;
        const VOLATILE = 0x0040;
        const BRIDGE = 0x0040;
        const TRANSIENT = 0x0080;
        const VARARGS = 0x0080;
        const NATIVE = 0x0100;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const STRICT = 0x0800;
        const SYNTHETIC = 0x1000;
        const ANNOTATION = 0x2000;
        const ENUM = 0x4000;
        const MODULE = 0x8000;
    }
}

impl AccessFlags {
    pub const VISIBILITY: AccessFlags = AccessFlags::PUBLIC
        .union(AccessFlags::PRIVATE)
        .union(AccessFlags::PROTECTED);

    pub fn is_public(&self) -> bool {
        self.contains(AccessFlags::PUBLIC)
    }

    pub fn is_private(&self) -> bool {
        self.contains(AccessFlags::PRIVATE)
    }

    pub fn is_static(&self) -> bool {
        self.contains(AccessFlags::STATIC)
    }

    pub fn is_abstract(&self) -> bool {
        self.contains(AccessFlags::ABSTRACT)
    }

    pub fn is_interface(&self) -> bool {
        self.contains(AccessFlags::INTERFACE)
    }

    /// Replace the visibility bits, keeping every other flag
    pub fn with_visibility(self, visibility: AccessFlags) -> AccessFlags {
        (self - AccessFlags::VISIBILITY) | (visibility & AccessFlags::VISIBILITY)
    }

    /// Java source modifiers, in declaration order, for the usage printer
    pub fn modifiers(&self, is_method: bool) -> Vec<&'static str> {
        let mut modifiers = Vec::new();
        if self.is_public() {
            modifiers.push("public");
        }
        if self.is_private() {
            modifiers.push("private");
        }
        if self.contains(AccessFlags::PROTECTED) {
            modifiers.push("protected");
        }
        if self.is_static() {
            modifiers.push("static");
        }
        if self.contains(AccessFlags::FINAL) {
            modifiers.push("final");
        }
        if is_method {
            if self.contains(AccessFlags::SYNCHRONIZED) {
                modifiers.push("synchronized");
            }
            if self.contains(AccessFlags::NATIVE) {
                modifiers.push("native");
            }
            if self.is_abstract() {
                modifiers.push("abstract");
            }
        } else {
            if self.contains(AccessFlags::VOLATILE) {
                modifiers.push("volatile");
            }
            if self.contains(AccessFlags::TRANSIENT) {
                modifiers.push("transient");
            }
        }
        modifiers
    }
}

bitflags! {
    /// Per-run processing state attached to classes and members.
    ///
    /// `DONT_SHRINK` is set by the keep matcher and seeds the usage marker.
    /// The `REMOVED_*` flags are set by the class shrinker for diagnostics.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct ProcessingFlags: u32 {
        const DONT_SHRINK = 0x0001;
        const REMOVED_FIELDS = 0x0010;
        const REMOVED_PUBLIC_FIELDS = 0x0020;
        const REMOVED_CONSTRUCTORS = 0x0040;
        const REMOVED_PUBLIC_CONSTRUCTORS = 0x0080;
        const REMOVED_METHODS = 0x0100;
        const REMOVED_PUBLIC_METHODS = 0x0200;
    }
}

impl ProcessingFlags {
    pub fn is_kept(&self) -> bool {
        self.contains(ProcessingFlags::DONT_SHRINK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_visibility_replaces_only_visibility() {
        let flags = AccessFlags::PRIVATE | AccessFlags::STATIC | AccessFlags::FINAL;
        let promoted = flags.with_visibility(AccessFlags::PUBLIC);

        assert!(promoted.is_public());
        assert!(!promoted.is_private());
        assert!(promoted.is_static());
        assert!(promoted.contains(AccessFlags::FINAL));
    }

    #[test]
    fn test_modifiers() {
        let flags = AccessFlags::PUBLIC | AccessFlags::STATIC;
        assert_eq!(flags.modifiers(true), vec!["public", "static"]);
    }
}
