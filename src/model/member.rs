use serde::{Deserialize, Serialize};

use super::{
    AccessFlags, Attribute, AttributeInfo, ClassId, CodeAttribute, ConstantPool, ProcessingFlags,
    UsageMark,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberKind {
    Field,
    Method,
}

/// Stable handle of a field or method: owning class plus position in the
/// class's field or method list. Positions are remapped after compaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberId {
    pub class: ClassId,
    pub kind: MemberKind,
    pub index: u32,
}

impl MemberId {
    pub fn field(class: ClassId, index: usize) -> Self {
        Self {
            class,
            kind: MemberKind::Field,
            index: index as u32,
        }
    }

    pub fn method(class: ClassId, index: usize) -> Self {
        Self {
            class,
            kind: MemberKind::Method,
            index: index as u32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub access_flags: AccessFlags,
    pub name_index: u16,
    pub descriptor_index: u16,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(default, skip_serializing_if = "ProcessingFlags::is_empty")]
    pub processing_flags: ProcessingFlags,
    /// Classes named in the descriptor
    #[serde(skip)]
    pub referenced_classes: Vec<ClassId>,
    #[serde(skip)]
    pub mark: UsageMark,
}

impl Member {
    pub fn new(access_flags: AccessFlags, name_index: u16, descriptor_index: u16) -> Self {
        Self {
            access_flags,
            name_index,
            descriptor_index,
            attributes: Vec::new(),
            processing_flags: ProcessingFlags::empty(),
            referenced_classes: Vec::new(),
            mark: UsageMark::Unused,
        }
    }

    pub fn name<'a>(&self, pool: &'a ConstantPool) -> &'a str {
        pool.utf8(self.name_index).unwrap_or("")
    }

    pub fn descriptor<'a>(&self, pool: &'a ConstantPool) -> &'a str {
        pool.utf8(self.descriptor_index).unwrap_or("")
    }

    pub fn code(&self) -> Option<&CodeAttribute> {
        self.attributes.iter().find_map(Attribute::code)
    }

    pub fn is_kept(&self) -> bool {
        self.processing_flags.is_kept()
    }

    pub fn for_each_constant_index_mut(&mut self, f: &mut dyn FnMut(&mut u16)) {
        f(&mut self.name_index);
        f(&mut self.descriptor_index);
        for attribute in &mut self.attributes {
            attribute.for_each_constant_index_mut(f);
        }
    }

    pub fn reset_marks(&mut self) {
        self.mark = UsageMark::Unused;
        self.attributes.iter_mut().for_each(Attribute::reset_marks);
    }

    pub fn has_attribute(&self, predicate: impl Fn(&AttributeInfo) -> bool) -> bool {
        self.attributes.iter().any(|a| predicate(&a.info))
    }
}
