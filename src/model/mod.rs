//! In-memory program model: classes, members, constant pools, attributes
//! and Kotlin metadata, stored in an arena addressed by [`ClassId`].

mod access;
pub mod annotation;
pub mod attribute;
mod builder;
mod class;
mod constant;
pub mod descriptor;
mod instruction;
pub mod kotlin;
mod linker;
mod mark;
mod member;
pub mod signature;
mod snapshot;

use std::collections::HashMap;

use tracing::warn;

pub use access::{AccessFlags, ProcessingFlags};
pub use annotation::{Annotation, ElementValue, ElementValueKind, TypeAnnotation};
pub use attribute::{Attribute, AttributeInfo, CodeAttribute};
pub use builder::ClassBuilder;
pub use class::{Class, ClassId, ClassOrigin};
pub use constant::{Constant, ConstantPool, DynamicConstant, IndexMap, RefConstant};
pub use instruction::{opcode, Instruction};
pub use kotlin::{KotlinMetadata, KotlinModule};
pub use linker::Linker;
pub use mark::UsageMark;
pub use member::{Member, MemberId, MemberKind};
pub use snapshot::Snapshot;

/// Arena of program and library classes.
///
/// Slots are never reused: removing a class leaves `None` behind so every
/// [`ClassId`] handed out stays valid (it just resolves to nothing).
#[derive(Debug, Clone, Default)]
pub struct ClassPath {
    slots: Vec<Option<Class>>,
    names: HashMap<String, ClassId>,
    pub kotlin_modules: Vec<KotlinModule>,
}

impl ClassPath {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a class. A second definition of an existing name is ignored and
    /// the id of the first definition is returned.
    pub fn add(&mut self, class: Class) -> ClassId {
        let name = class.name().to_string();
        if let Some(existing) = self.names.get(&name) {
            warn!(class = %name, "Duplicate class definition ignored");
            return *existing;
        }
        let id = ClassId(self.slots.len() as u32);
        self.slots.push(Some(class));
        self.names.insert(name, id);
        id
    }

    pub fn get(&self, id: ClassId) -> Option<&Class> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: ClassId) -> Option<&mut Class> {
        self.slots.get_mut(id.index()).and_then(Option::as_mut)
    }

    pub fn find(&self, name: &str) -> Option<ClassId> {
        self.names.get(name).copied()
    }

    pub fn by_name(&self, name: &str) -> Option<&Class> {
        self.find(name).and_then(|id| self.get(id))
    }

    pub fn remove(&mut self, id: ClassId) -> Option<Class> {
        let class = self.slots.get_mut(id.index())?.take()?;
        self.names.remove(class.name());
        Some(class)
    }

    /// Ids of all live classes in insertion order
    pub fn ids(&self) -> impl Iterator<Item = ClassId> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(i, _)| ClassId(i as u32))
    }

    pub fn classes(&self) -> impl Iterator<Item = (ClassId, &Class)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|c| (ClassId(i as u32), c)))
    }

    pub fn program_ids(&self) -> Vec<ClassId> {
        self.classes()
            .filter(|(_, c)| !c.is_library())
            .map(|(id, _)| id)
            .collect()
    }

    pub fn library_ids(&self) -> Vec<ClassId> {
        self.classes()
            .filter(|(_, c)| c.is_library())
            .map(|(id, _)| id)
            .collect()
    }

    pub fn program_class_count(&self) -> usize {
        self.classes().filter(|(_, c)| !c.is_library()).count()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Capacity of the arena, including removed slots
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn member(&self, id: MemberId) -> Option<&Member> {
        self.get(id.class)?.member(id.kind, id.index)
    }

    pub fn member_mut(&mut self, id: MemberId) -> Option<&mut Member> {
        self.get_mut(id.class)?
            .members_mut(id.kind)
            .get_mut(id.index as usize)
    }

    pub fn is_class_used(&self, id: ClassId) -> bool {
        self.get(id).is_some_and(|c| c.mark.is_used())
    }

    pub fn is_member_used(&self, id: MemberId) -> bool {
        self.member(id).is_some_and(|m| m.mark.is_used())
    }

    /// External name of a class, e.g. `com.example.Foo`
    pub fn class_display(&self, id: ClassId) -> String {
        self.get(id)
            .map(|c| descriptor::to_external(c.name()))
            .unwrap_or_else(|| id.to_string())
    }

    /// `com.example.Foo: void run(int)` style rendering of a member
    pub fn member_display(&self, id: MemberId) -> String {
        let Some(class) = self.get(id.class) else {
            return format!("{}:{:?}[{}]", id.class, id.kind, id.index);
        };
        let Some((name, descriptor)) = class.member_name(id) else {
            return format!("{}:{:?}[{}]", self.class_display(id.class), id.kind, id.index);
        };
        let member = match id.kind {
            MemberKind::Field => format!("{} {}", descriptor::external_type(descriptor), name),
            MemberKind::Method => descriptor::external_method(class.name(), name, descriptor),
        };
        format!("{}: {}", descriptor::to_external(class.name()), member)
    }

    /// Clear every usage mark so the graph can be marked again
    pub fn reset_marks(&mut self) {
        for class in self.slots.iter_mut().flatten() {
            class.reset_marks();
        }
        for module in &mut self.kotlin_modules {
            module.mark = UsageMark::Unused;
        }
    }
}
