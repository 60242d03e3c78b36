use std::collections::HashSet;

use crate::model::{ClassId, ClassPath, ConstantPool, MemberId};

/// Frozen view of class and member marks.
///
/// The relational refiners only ever read class and member marks, so they
/// capture them once and then mutate attributes freely.
pub(crate) struct Liveness {
    classes: Vec<bool>,
    members: HashSet<MemberId>,
    used_program_classes: Vec<ClassId>,
}

impl Liveness {
    pub(crate) fn capture(path: &ClassPath) -> Self {
        let mut classes = vec![false; path.slot_count()];
        let mut members = HashSet::new();
        let mut used_program_classes = Vec::new();
        for (id, class) in path.classes() {
            if !class.mark.is_used() {
                continue;
            }
            classes[id.index()] = true;
            if class.is_library() {
                continue;
            }
            used_program_classes.push(id);
            for (i, field) in class.fields.iter().enumerate() {
                if field.mark.is_used() {
                    members.insert(MemberId::field(id, i));
                }
            }
            for (i, method) in class.methods.iter().enumerate() {
                if method.mark.is_used() {
                    members.insert(MemberId::method(id, i));
                }
            }
        }
        Self {
            classes,
            members,
            used_program_classes,
        }
    }

    pub(crate) fn used_program_classes(&self) -> &[ClassId] {
        &self.used_program_classes
    }

    pub(crate) fn class(&self, id: ClassId) -> bool {
        self.classes.get(id.index()).copied().unwrap_or(false)
    }

    /// Unresolved references count as used: nothing can be said about them
    pub(crate) fn class_ref(&self, id: Option<ClassId>) -> bool {
        id.map_or(true, |id| self.class(id))
    }

    pub(crate) fn all_classes(&self, ids: &[ClassId]) -> bool {
        ids.iter().all(|id| self.class(*id))
    }

    pub(crate) fn member(&self, id: MemberId) -> bool {
        self.members.contains(&id)
    }

    pub(crate) fn member_ref(&self, id: Option<MemberId>) -> bool {
        id.map_or(true, |id| self.member(id))
    }

    /// Whether the class named by a Class constant survives; index 0 means
    /// "none" and counts as used
    pub(crate) fn class_constant(&self, pool: &ConstantPool, index: u16) -> bool {
        index == 0 || self.class_ref(pool.class_reference(index))
    }
}
