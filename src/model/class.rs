use serde::{Deserialize, Serialize};

use super::descriptor::{CLASS_INITIALIZER, METHOD_TYPE_INITIALIZER};
use super::kotlin::KotlinMetadata;
use super::{
    AccessFlags, Attribute, AttributeInfo, ConstantPool, Member, MemberId, MemberKind,
    ProcessingFlags, UsageMark,
};

/// Stable arena index of a class inside a [`ClassPath`](super::ClassPath)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(pub u32);

impl ClassId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for ClassId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassOrigin {
    /// Input being shrunk
    #[default]
    Program,
    /// Dependency; always used, never modified
    Library,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Class {
    #[serde(default)]
    pub origin: ClassOrigin,
    #[serde(default = "default_major_version")]
    pub major_version: u16,
    pub access_flags: AccessFlags,
    pub constant_pool: ConstantPool,
    pub this_class: u16,
    #[serde(default)]
    pub super_class: u16,
    #[serde(default)]
    pub interfaces: Vec<u16>,
    #[serde(default)]
    pub fields: Vec<Member>,
    #[serde(default)]
    pub methods: Vec<Member>,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kotlin_metadata: Option<KotlinMetadata>,
    #[serde(default, skip_serializing_if = "ProcessingFlags::is_empty")]
    pub processing_flags: ProcessingFlags,
    #[serde(skip)]
    pub super_class_id: Option<super::ClassId>,
    #[serde(skip)]
    pub interface_ids: Vec<super::ClassId>,
    /// Direct subclasses and implementers
    #[serde(skip)]
    pub subclasses: Vec<super::ClassId>,
    #[serde(skip)]
    pub mark: UsageMark,
}

fn default_major_version() -> u16 {
    52
}

impl Class {
    /// Internal name, e.g. `com/example/Foo`
    pub fn name(&self) -> &str {
        self.constant_pool.class_name(self.this_class).unwrap_or("")
    }

    pub fn super_name(&self) -> Option<&str> {
        if self.super_class == 0 {
            None
        } else {
            self.constant_pool.class_name(self.super_class)
        }
    }

    pub fn interface_names(&self) -> Vec<&str> {
        self.interfaces
            .iter()
            .filter_map(|i| self.constant_pool.class_name(*i))
            .collect()
    }

    pub fn is_library(&self) -> bool {
        self.origin == ClassOrigin::Library
    }

    pub fn is_interface(&self) -> bool {
        self.access_flags.is_interface()
    }

    pub fn is_abstract(&self) -> bool {
        self.access_flags.is_abstract() || self.access_flags.is_interface()
    }

    pub fn is_kept(&self) -> bool {
        self.processing_flags.is_kept()
    }

    pub fn members(&self, kind: MemberKind) -> &[Member] {
        match kind {
            MemberKind::Field => &self.fields,
            MemberKind::Method => &self.methods,
        }
    }

    pub fn members_mut(&mut self, kind: MemberKind) -> &mut Vec<Member> {
        match kind {
            MemberKind::Field => &mut self.fields,
            MemberKind::Method => &mut self.methods,
        }
    }

    pub fn member(&self, kind: MemberKind, index: u32) -> Option<&Member> {
        self.members(kind).get(index as usize)
    }

    pub fn find_member(&self, kind: MemberKind, name: &str, descriptor: &str) -> Option<usize> {
        self.members(kind).iter().position(|m| {
            m.name(&self.constant_pool) == name && m.descriptor(&self.constant_pool) == descriptor
        })
    }

    pub fn find_method(&self, name: &str, descriptor: &str) -> Option<usize> {
        self.find_member(MemberKind::Method, name, descriptor)
    }

    pub fn find_field(&self, name: &str, descriptor: &str) -> Option<usize> {
        self.find_member(MemberKind::Field, name, descriptor)
    }

    /// Static initializer worth keeping: present and longer than a bare `return`
    pub fn static_initializer(&self) -> Option<usize> {
        let index = self.find_method(CLASS_INITIALIZER, METHOD_TYPE_INITIALIZER)?;
        let code = self.methods[index].code()?;
        (code.code_length > 1).then_some(index)
    }

    pub fn member_name(&self, id: MemberId) -> Option<(&str, &str)> {
        let member = self.member(id.kind, id.index)?;
        Some((
            member.name(&self.constant_pool),
            member.descriptor(&self.constant_pool),
        ))
    }

    pub fn bootstrap_methods_index(&self) -> Option<usize> {
        self.attributes
            .iter()
            .position(|a| matches!(a.info, AttributeInfo::BootstrapMethods { .. }))
    }

    /// Visit pool indices held by the class structure, excluding those held
    /// by constants inside the pool itself
    pub fn for_each_structure_index_mut(&mut self, f: &mut dyn FnMut(&mut u16)) {
        f(&mut self.this_class);
        if self.super_class != 0 {
            f(&mut self.super_class);
        }
        for interface in &mut self.interfaces {
            f(interface);
        }
        for member in self.fields.iter_mut().chain(self.methods.iter_mut()) {
            member.for_each_constant_index_mut(f);
        }
        for attribute in &mut self.attributes {
            attribute.for_each_constant_index_mut(f);
        }
    }

    pub fn for_each_member_ref_mut(&mut self, f: &mut dyn FnMut(&mut Option<MemberId>)) {
        for (_, constant) in self.constant_pool.iter_mut() {
            constant.for_each_member_ref_mut(f);
        }
        for member in self.fields.iter_mut().chain(self.methods.iter_mut()) {
            for attribute in &mut member.attributes {
                attribute.for_each_member_ref_mut(f);
            }
        }
        for attribute in &mut self.attributes {
            attribute.for_each_member_ref_mut(f);
        }
        if let Some(metadata) = &mut self.kotlin_metadata {
            metadata.for_each_member_ref_mut(f);
        }
    }

    pub fn reset_marks(&mut self) {
        self.mark = UsageMark::Unused;
        self.constant_pool.reset_marks();
        self.fields.iter_mut().for_each(Member::reset_marks);
        self.methods.iter_mut().for_each(Member::reset_marks);
        self.attributes.iter_mut().for_each(Attribute::reset_marks);
        if let Some(metadata) = &mut self.kotlin_metadata {
            metadata.reset_marks();
        }
    }
}
