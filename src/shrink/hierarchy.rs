//! Method-hierarchy queries used when a method becomes reachable.

use std::collections::HashSet;

use crate::model::descriptor::is_initializer;
use crate::model::{AccessFlags, ClassId, ClassPath, MemberId, MemberKind};

/// Methods that may be dispatched to when `method` is invoked: overrides and
/// overridden methods across the hierarchy of every concrete class that can
/// stand in for the declaring class, plus interface default bodies.
///
/// Private, static and initializer methods never dispatch and yield nothing.
pub fn related_methods(path: &ClassPath, method: MemberId) -> Vec<MemberId> {
    let Some(class) = path.get(method.class) else {
        return Vec::new();
    };
    let Some(member) = class.member(MemberKind::Method, method.index) else {
        return Vec::new();
    };
    let access = member.access_flags;
    let name = member.name(&class.constant_pool);
    let descriptor = member.descriptor(&class.constant_pool);
    if access.intersects(AccessFlags::PRIVATE | AccessFlags::STATIC) || is_initializer(name) {
        return Vec::new();
    }

    let mut excluded = AccessFlags::PRIVATE | AccessFlags::STATIC;
    if access.is_public() {
        excluded |= AccessFlags::ABSTRACT;
    }

    let mut search = Search {
        path,
        name,
        descriptor,
        origin: method,
        excluded,
        visited: HashSet::new(),
        found: Vec::new(),
    };

    for concrete in concrete_classes_down(path, method.class) {
        search.visit(concrete, false);
        for ancestor in superclasses(path, concrete) {
            search.visit(ancestor, false);
        }
        for descendant in subclasses(path, concrete) {
            search.visit(descendant, false);
        }
        for interface in all_interfaces(path, concrete) {
            search.visit(interface, true);
        }
    }

    if class.is_interface() {
        for descendant in subclasses(path, method.class) {
            if path.get(descendant).is_some_and(|c| c.is_interface()) {
                search.visit(descendant, true);
            }
        }
    }

    search.found
}

struct Search<'a> {
    path: &'a ClassPath,
    name: &'a str,
    descriptor: &'a str,
    origin: MemberId,
    excluded: AccessFlags,
    visited: HashSet<(ClassId, bool)>,
    found: Vec<MemberId>,
}

impl Search<'_> {
    fn visit(&mut self, id: ClassId, defaults_only: bool) {
        if !self.visited.insert((id, defaults_only)) {
            return;
        }
        let Some(class) = self.path.get(id) else {
            return;
        };
        let Some(index) = class.find_method(self.name, self.descriptor) else {
            return;
        };
        let flags = class.methods[index].access_flags;
        if flags.intersects(self.excluded) || (defaults_only && flags.is_abstract()) {
            return;
        }
        let candidate = MemberId::method(id, index);
        if candidate != self.origin && !self.found.contains(&candidate) {
            self.found.push(candidate);
        }
    }
}

/// The class itself when it is concrete, otherwise the nearest concrete
/// classes below it
pub fn concrete_classes_down(path: &ClassPath, id: ClassId) -> Vec<ClassId> {
    let mut result = Vec::new();
    let mut seen = HashSet::new();
    let mut stack = vec![id];
    while let Some(current) = stack.pop() {
        if !seen.insert(current) {
            continue;
        }
        let Some(class) = path.get(current) else {
            continue;
        };
        if class.is_abstract() {
            stack.extend(class.subclasses.iter().copied());
        } else {
            result.push(current);
        }
    }
    result
}

/// All ancestors along the superclass chain, nearest first
pub fn superclasses(path: &ClassPath, id: ClassId) -> Vec<ClassId> {
    let mut result = Vec::new();
    let mut current = path.get(id).and_then(|c| c.super_class_id);
    while let Some(ancestor) = current {
        if result.contains(&ancestor) || ancestor == id {
            break;
        }
        result.push(ancestor);
        current = path.get(ancestor).and_then(|c| c.super_class_id);
    }
    result
}

/// Transitive subclasses and implementers
pub fn subclasses(path: &ClassPath, id: ClassId) -> Vec<ClassId> {
    let mut result = Vec::new();
    let mut seen = HashSet::from([id]);
    let mut stack: Vec<ClassId> = path.get(id).map(|c| c.subclasses.clone()).unwrap_or_default();
    while let Some(current) = stack.pop() {
        if !seen.insert(current) {
            continue;
        }
        result.push(current);
        if let Some(class) = path.get(current) {
            stack.extend(class.subclasses.iter().copied());
        }
    }
    result
}

/// Interfaces implemented by the class or any superclass, transitively
pub fn all_interfaces(path: &ClassPath, id: ClassId) -> Vec<ClassId> {
    let mut result = Vec::new();
    let mut seen = HashSet::new();
    let mut stack: Vec<ClassId> = std::iter::once(id)
        .chain(superclasses(path, id))
        .filter_map(|c| path.get(c))
        .flat_map(|c| c.interface_ids.iter().copied())
        .collect();
    while let Some(current) = stack.pop() {
        if !seen.insert(current) {
            continue;
        }
        result.push(current);
        if let Some(class) = path.get(current) {
            stack.extend(class.interface_ids.iter().copied());
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClassBuilder, Linker};

    fn build(classes: Vec<ClassBuilder>) -> ClassPath {
        let mut path = ClassPath::new();
        for class in classes {
            path.add(class.build());
        }
        Linker::default().link(&mut path);
        path
    }

    #[test]
    fn test_abstract_method_reaches_concrete_override() {
        let mut base = ClassBuilder::new("a/Base", AccessFlags::PUBLIC | AccessFlags::ABSTRACT);
        base.add_method(AccessFlags::PUBLIC | AccessFlags::ABSTRACT, "run", "()V", vec![]);
        let mut impl_class = ClassBuilder::new("a/Impl", AccessFlags::PUBLIC).super_class("a/Base");
        impl_class.add_method(AccessFlags::PUBLIC, "run", "()V", vec![]);
        let path = build(vec![base, impl_class]);

        let base_id = path.find("a/Base").unwrap();
        let impl_id = path.find("a/Impl").unwrap();
        let related = related_methods(&path, MemberId::method(base_id, 0));

        assert_eq!(related, vec![MemberId::method(impl_id, 0)]);
    }

    #[test]
    fn test_private_methods_have_no_hierarchy() {
        let mut base = ClassBuilder::new("a/Base", AccessFlags::PUBLIC);
        base.add_method(AccessFlags::PRIVATE, "run", "()V", vec![]);
        let mut sub = ClassBuilder::new("a/Sub", AccessFlags::PUBLIC).super_class("a/Base");
        sub.add_method(AccessFlags::PRIVATE, "run", "()V", vec![]);
        let path = build(vec![base, sub]);

        let base_id = path.find("a/Base").unwrap();
        assert!(related_methods(&path, MemberId::method(base_id, 0)).is_empty());
    }

    #[test]
    fn test_interface_method_reaches_implementations_and_defaults() {
        let mut iface = ClassBuilder::new(
            "a/Api",
            AccessFlags::PUBLIC | AccessFlags::INTERFACE | AccessFlags::ABSTRACT,
        );
        iface.add_method(AccessFlags::PUBLIC | AccessFlags::ABSTRACT, "call", "()V", vec![]);
        let mut sub_iface = ClassBuilder::new(
            "a/SubApi",
            AccessFlags::PUBLIC | AccessFlags::INTERFACE | AccessFlags::ABSTRACT,
        )
        .interface("a/Api");
        sub_iface.add_method(AccessFlags::PUBLIC, "call", "()V", vec![]);
        let mut impl_class = ClassBuilder::new("a/Impl", AccessFlags::PUBLIC).interface("a/SubApi");
        impl_class.add_method(AccessFlags::PUBLIC, "call", "()V", vec![]);
        let path = build(vec![iface, sub_iface, impl_class]);

        let api = path.find("a/Api").unwrap();
        let related = related_methods(&path, MemberId::method(api, 0));

        assert!(related.contains(&MemberId::method(path.find("a/Impl").unwrap(), 0)));
        assert!(related.contains(&MemberId::method(path.find("a/SubApi").unwrap(), 0)));
    }
}
