//! Physically removes unmarked entities from program classes and renumbers
//! every index that pointed into a compacted table.

use std::collections::{HashMap, HashSet};

use tracing::{debug, trace};

use super::hierarchy;
use super::{ShrinkError, ShrinkSummary};
use crate::model::descriptor::{self, INSTANCE_INITIALIZER};
use crate::model::{
    signature, Attribute, AttributeInfo, Class, ClassId, ClassPath, Constant,
    ConstantPool, IndexMap, Member, MemberId, MemberKind, ProcessingFlags, UsageMark,
};

/// Old-to-new positions of the fields and methods of one class
#[derive(Debug, Clone, Default)]
pub struct MemberMap {
    fields: Vec<Option<u32>>,
    methods: Vec<Option<u32>>,
}

impl MemberMap {
    pub fn get(&self, id: MemberId) -> Option<MemberId> {
        let slots = match id.kind {
            MemberKind::Field => &self.fields,
            MemberKind::Method => &self.methods,
        };
        let index = (*slots.get(id.index as usize)?)?;
        Some(MemberId { index, ..id })
    }

    fn is_identity(&self) -> bool {
        let unchanged = |slots: &[Option<u32>]| {
            slots
                .iter()
                .enumerate()
                .all(|(position, slot)| *slot == Some(position as u32))
        };
        unchanged(&self.fields) && unchanged(&self.methods)
    }
}

/// Read-only facts about the whole class path, computed before any class
/// is modified
pub(crate) struct ShrinkView {
    used: Vec<bool>,
    unused_names: HashSet<String>,
    interfaces: HashMap<ClassId, Vec<bool>>,
}

impl ShrinkView {
    pub(crate) fn capture(path: &ClassPath) -> Self {
        let mut used = vec![false; path.slot_count()];
        let mut unused_names = HashSet::new();
        for (id, class) in path.classes() {
            if class.mark.is_used() {
                used[id.index()] = true;
            } else {
                unused_names.insert(class.name().to_string());
            }
        }

        let interfaces = path
            .classes()
            .filter(|(_, c)| !c.is_library() && c.mark.is_used())
            .map(|(id, class)| (id, retained_interfaces(path, &used, class)))
            .collect();

        Self {
            used,
            unused_names,
            interfaces,
        }
    }

    fn is_used(&self, id: ClassId) -> bool {
        self.used.get(id.index()).copied().unwrap_or(false)
    }
}

/// Which entries of the implements list survive. Unused interfaces go;
/// so do interfaces already implemented through the superclass or another
/// surviving interface, unless the class is explicitly kept.
fn retained_interfaces(path: &ClassPath, used: &[bool], class: &Class) -> Vec<bool> {
    let is_used = |id: ClassId| used.get(id.index()).copied().unwrap_or(false);
    let references: Vec<Option<ClassId>> = class
        .interfaces
        .iter()
        .map(|index| class.constant_pool.class_reference(*index))
        .collect();

    let mut keep: Vec<bool> = references
        .iter()
        .map(|reference| reference.map_or(true, is_used))
        .collect();
    if class.processing_flags.contains(ProcessingFlags::DONT_SHRINK) {
        return keep;
    }

    let inherited: HashSet<ClassId> = class
        .super_class_id
        .map(|s| hierarchy::all_interfaces(path, s))
        .unwrap_or_default()
        .into_iter()
        .collect();
    let implied_by: Vec<HashSet<ClassId>> = references
        .iter()
        .map(|reference| {
            reference
                .map(|id| {
                    hierarchy::all_interfaces(path, id)
                        .into_iter()
                        .filter(|i| *i != id)
                        .collect()
                })
                .unwrap_or_default()
        })
        .collect();

    let mut seen = HashSet::new();
    for (position, reference) in references.iter().enumerate() {
        let Some(id) = *reference else {
            continue;
        };
        if !keep[position] {
            continue;
        }
        let redundant = !seen.insert(id)
            || inherited.contains(&id)
            || references.iter().enumerate().any(|(other, r)| {
                other != position && keep[other] && r.is_some() && implied_by[other].contains(&id)
            });
        if redundant {
            keep[position] = false;
        }
    }
    keep
}

/// Shrinks one program class in place
pub(crate) struct ClassShrinker<'v> {
    view: &'v ShrinkView,
}

impl<'v> ClassShrinker<'v> {
    pub(crate) fn new(view: &'v ShrinkView) -> Self {
        Self { view }
    }

    pub(crate) fn shrink(
        &self,
        id: ClassId,
        class: &mut Class,
        summary: &mut ShrinkSummary,
    ) -> Result<MemberMap, ShrinkError> {
        let members = compact_members(class, summary);
        summary.removed_attributes += shrink_attribute_list(&mut class.attributes);
        for member in class.fields.iter_mut().chain(class.methods.iter_mut()) {
            summary.removed_attributes += shrink_attribute_list(&mut member.attributes);
        }

        shrink_nest_lists(class);
        compact_bootstrap_methods(class)?;
        self.rewrite_signatures(class);
        self.prune_interfaces(id, class);
        unmark_orphan_constants(class);

        let map = class.constant_pool.retain_used();
        summary.removed_constants += map.removed_count();
        remap_constant_indices(class, &map)?;

        trace!(class = %class.name(), constants = class.constant_pool.len(), "Shrunk class");
        Ok(members)
    }

    fn rewrite_signatures(&self, class: &mut Class) {
        let Class {
            constant_pool,
            fields,
            methods,
            attributes,
            ..
        } = class;
        let unused = &self.view.unused_names;
        let mut rewrite = |attribute: &mut Attribute| {
            rewrite_signature(attribute, constant_pool, unused, &self.view.used)
        };

        for attribute in attributes.iter_mut() {
            rewrite(attribute);
            if let AttributeInfo::Record { components } = &mut attribute.info {
                for nested in components.iter_mut().flat_map(|c| c.attributes.iter_mut()) {
                    rewrite(nested);
                }
            }
        }
        for attribute in fields
            .iter_mut()
            .chain(methods.iter_mut())
            .flat_map(|m| m.attributes.iter_mut())
        {
            rewrite(attribute);
        }
    }

    fn prune_interfaces(&self, id: ClassId, class: &mut Class) {
        let Some(keep) = self.view.interfaces.get(&id) else {
            return;
        };
        if keep.iter().all(|k| *k) {
            return;
        }
        let before = class.interfaces.len();
        let mut flags = keep.iter();
        class
            .interfaces
            .retain(|_| flags.next().copied().unwrap_or(true));
        class.interface_ids = class
            .interfaces
            .iter()
            .filter_map(|index| class.constant_pool.class_reference(*index))
            .collect();
        debug!(
            class = %class.name(),
            removed = before - class.interfaces.len(),
            "Pruned interfaces"
        );
    }
}

/// Compacts fields and methods, recording what kind of members went
fn compact_members(class: &mut Class, summary: &mut ShrinkSummary) -> MemberMap {
    let mut flags = ProcessingFlags::empty();

    let (fields, removed) = compact(&mut class.fields);
    for member in &removed {
        flags |= ProcessingFlags::REMOVED_FIELDS;
        if member.access_flags.is_public() {
            flags |= ProcessingFlags::REMOVED_PUBLIC_FIELDS;
        }
    }
    summary.removed_fields += removed.len();

    let (methods, removed) = compact(&mut class.methods);
    for member in &removed {
        let constructor = member.name(&class.constant_pool) == INSTANCE_INITIALIZER;
        let public = member.access_flags.is_public();
        flags |= match (constructor, public) {
            (true, true) => {
                ProcessingFlags::REMOVED_CONSTRUCTORS | ProcessingFlags::REMOVED_PUBLIC_CONSTRUCTORS
            }
            (true, false) => ProcessingFlags::REMOVED_CONSTRUCTORS,
            (false, true) => {
                ProcessingFlags::REMOVED_METHODS | ProcessingFlags::REMOVED_PUBLIC_METHODS
            }
            (false, false) => ProcessingFlags::REMOVED_METHODS,
        };
        debug!(
            class = %class.name(),
            method = %member.name(&class.constant_pool),
            "Removed method"
        );
    }
    summary.removed_methods += removed.len();

    class.processing_flags |= flags;
    MemberMap { fields, methods }
}

/// Shift used members to the front, preserving order
fn compact(members: &mut Vec<Member>) -> (Vec<Option<u32>>, Vec<Member>) {
    let mut map = Vec::with_capacity(members.len());
    let mut kept = Vec::with_capacity(members.len());
    let mut removed = Vec::new();
    for member in members.drain(..) {
        if member.mark.is_used() {
            map.push(Some(kept.len() as u32));
            kept.push(member);
        } else {
            map.push(None);
            removed.push(member);
        }
    }
    *members = kept;
    (map, removed)
}

/// Drop unmarked attributes and unmarked entries inside the survivors.
/// Returns the number of attributes removed.
fn shrink_attribute_list(attributes: &mut Vec<Attribute>) -> usize {
    let before = attributes.len();
    attributes.retain(|a| a.mark.is_used());
    let mut removed = before - attributes.len();
    for attribute in attributes.iter_mut() {
        removed += shrink_attribute(attribute);
    }
    removed
}

fn shrink_attribute(attribute: &mut Attribute) -> usize {
    match &mut attribute.info {
        AttributeInfo::InnerClasses { classes } => {
            classes.retain(|entry| entry.mark.is_used());
            0
        }
        AttributeInfo::Record { components } => {
            components.retain(|component| component.mark.is_used());
            components
                .iter_mut()
                .map(|component| shrink_attribute_list(&mut component.attributes))
                .sum()
        }
        AttributeInfo::Code(code) => shrink_attribute_list(&mut code.attributes),
        AttributeInfo::LocalVariableTable { variables } => {
            variables.retain(|variable| variable.mark.is_used());
            0
        }
        AttributeInfo::LocalVariableTypeTable { variables } => {
            variables.retain(|variable| variable.mark.is_used());
            0
        }
        AttributeInfo::Annotations { annotations, .. } => {
            annotations.retain(|annotation| annotation.mark.is_used());
            annotations.iter_mut().for_each(|annotation| {
                annotation.retain_used();
            });
            0
        }
        AttributeInfo::ParameterAnnotations { parameters, .. } => {
            // Parameter positions are significant; only their contents shrink
            for annotations in parameters.iter_mut() {
                annotations.retain(|annotation| annotation.mark.is_used());
                annotations.iter_mut().for_each(|annotation| {
                    annotation.retain_used();
                });
            }
            0
        }
        AttributeInfo::TypeAnnotations { annotations, .. } => {
            annotations.retain(|annotation| annotation.mark.is_used());
            annotations.iter_mut().for_each(|annotation| {
                annotation.annotation.retain_used();
            });
            0
        }
        AttributeInfo::AnnotationDefault { default_value } => {
            default_value.retain_used();
            0
        }
        // NestMembers and PermittedSubclasses keep exactly the entries whose
        // class constants the nest refiner marked
        AttributeInfo::NestMembers { .. } | AttributeInfo::PermittedSubclasses { .. } => 0,
        AttributeInfo::Unknown { .. }
        | AttributeInfo::BootstrapMethods { .. }
        | AttributeInfo::SourceFile { .. }
        | AttributeInfo::SourceDir { .. }
        | AttributeInfo::SourceDebugExtension { .. }
        | AttributeInfo::EnclosingMethod { .. }
        | AttributeInfo::NestHost { .. }
        | AttributeInfo::Deprecated
        | AttributeInfo::Synthetic
        | AttributeInfo::Signature { .. }
        | AttributeInfo::ConstantValue { .. }
        | AttributeInfo::MethodParameters { .. }
        | AttributeInfo::Exceptions { .. }
        | AttributeInfo::StackMapTable { .. }
        | AttributeInfo::LineNumberTable { .. }
        | AttributeInfo::Module(_)
        | AttributeInfo::ModuleMainClass { .. }
        | AttributeInfo::ModulePackages { .. } => 0,
    }
}

/// Filter nest lists by their marked class constants. Runs before the pool
/// is compacted, while marks are still addressable by the old indices.
fn shrink_nest_lists(class: &mut Class) {
    let Class {
        constant_pool,
        attributes,
        ..
    } = class;
    for attribute in attributes.iter_mut() {
        if let AttributeInfo::NestMembers { classes } | AttributeInfo::PermittedSubclasses { classes } =
            &mut attribute.info
        {
            classes.retain(|index| constant_pool.is_used(*index));
        }
    }
}

fn compact_bootstrap_methods(class: &mut Class) -> Result<(), ShrinkError> {
    let Some(position) = class.bootstrap_methods_index() else {
        return Ok(());
    };
    let retained: Vec<bool> = match &class.attributes[position].info {
        AttributeInfo::BootstrapMethods { methods } => {
            methods.iter().map(|m| m.mark.is_used()).collect()
        }
        _ => return Ok(()),
    };
    if retained.iter().all(|r| *r) {
        return Ok(());
    }

    // Dense 0-based map: position in the retained prefix
    let mut next = 0u16;
    let map: Vec<Option<u16>> = retained
        .iter()
        .map(|keep| {
            keep.then(|| {
                next += 1;
                next - 1
            })
        })
        .collect();

    if let AttributeInfo::BootstrapMethods { methods } = &mut class.attributes[position].info {
        methods.retain(|m| m.mark.is_used());
    }

    let live: HashSet<u16> = class
        .constant_pool
        .iter()
        .filter(|(_, _, mark)| mark.is_used())
        .map(|(index, _, _)| index)
        .collect();
    let mut dangling = None;
    for (index, constant) in class.constant_pool.iter_mut() {
        let (Constant::Dynamic(dynamic) | Constant::InvokeDynamic(dynamic)) = constant else {
            continue;
        };
        match map.get(dynamic.bootstrap_method_index as usize).copied().flatten() {
            Some(new) => dynamic.bootstrap_method_index = new,
            // Unused call sites disappear with the pool compaction
            None if !live.contains(&index) => {}
            None => {
                dangling.get_or_insert(dynamic.bootstrap_method_index);
            }
        }
    }
    match dangling {
        Some(index) => Err(ShrinkError::DanglingIndex {
            class: descriptor::to_external(class.name()),
            table: "bootstrap method",
            index,
        }),
        None => Ok(()),
    }
}

/// Replace unused classes in generic signatures with `java/lang/Object`
fn rewrite_signature(
    attribute: &mut Attribute,
    pool: &mut ConstantPool,
    unused: &HashSet<String>,
    used: &[bool],
) {
    let AttributeInfo::Signature {
        signature_index,
        referenced_classes,
    } = &mut attribute.info
    else {
        return;
    };
    let Some(original) = pool.utf8(*signature_index) else {
        return;
    };
    let Some(rewritten) = signature::rewrite(original, &mut |name| unused.contains(name)) else {
        return;
    };

    trace!(from = %original, to = %rewritten, "Rewrote signature");
    let index = match pool.find_utf8(&rewritten) {
        Some(existing) => existing,
        None => pool.push(Constant::Utf8 { value: rewritten }),
    };
    pool.set_mark(index, UsageMark::Used);
    *signature_index = index;
    referenced_classes.retain(|id| used.get(id.index()).copied().unwrap_or(false));
}

/// Unmark used constants that nothing surviving refers to any more, such as
/// pruned interface entries and replaced signatures
fn unmark_orphan_constants(class: &mut Class) {
    let mut roots = Vec::new();
    class.for_each_structure_index_mut(&mut |index| roots.push(*index));

    let pool = &mut class.constant_pool;
    let mut reachable = vec![false; pool.len()];
    while let Some(index) = roots.pop() {
        let Some(slot) = reachable.get_mut(index as usize) else {
            continue;
        };
        if *slot {
            continue;
        }
        *slot = true;
        if let Some(constant) = pool.get_mut(index) {
            constant.for_each_index_mut(&mut |sub| roots.push(*sub));
        }
    }

    let orphans: Vec<u16> = pool
        .iter()
        .filter(|(index, _, mark)| mark.is_used() && !reachable[*index as usize])
        .map(|(index, _, _)| index)
        .collect();
    for index in orphans {
        pool.set_mark(index, UsageMark::Unused);
    }
}

/// Rewrite every surviving pool index through the compaction map
fn remap_constant_indices(class: &mut Class, map: &IndexMap) -> Result<(), ShrinkError> {
    let mut dangling = None;
    let mut remap = |index: &mut u16| {
        if *index == 0 {
            return;
        }
        match map.get(*index) {
            Some(new) => *index = new,
            None => {
                dangling.get_or_insert(*index);
            }
        }
    };

    for (_, constant) in class.constant_pool.iter_mut() {
        constant.for_each_index_mut(&mut remap);
    }
    class.for_each_structure_index_mut(&mut remap);

    match dangling {
        Some(index) => Err(ShrinkError::DanglingIndex {
            class: descriptor::to_external(class.name()),
            table: "constant pool",
            index,
        }),
        None => Ok(()),
    }
}

/// Rewrite stored member ids after members moved
pub(crate) fn remap_member_ids(path: &mut ClassPath, maps: &HashMap<ClassId, MemberMap>) {
    let maps: HashMap<ClassId, &MemberMap> = maps
        .iter()
        .filter(|(_, map)| !map.is_identity())
        .map(|(id, map)| (*id, map))
        .collect();
    if maps.is_empty() {
        return;
    }

    let mut remap = |reference: &mut Option<MemberId>| {
        if let Some(id) = *reference {
            if let Some(map) = maps.get(&id.class) {
                *reference = map.get(id);
            }
        }
    };
    for id in path.ids().collect::<Vec<_>>() {
        match path.get_mut(id) {
            Some(class) if !class.is_library() => class.for_each_member_ref_mut(&mut remap),
            _ => {}
        }
    }
}

/// Subclass caches only list classes that survive
pub(crate) fn compact_subclasses(path: &mut ClassPath, view: &ShrinkView) {
    for id in path.ids().collect::<Vec<_>>() {
        if let Some(class) = path.get_mut(id) {
            class.subclasses.retain(|sub| view.is_used(*sub));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{opcode, AccessFlags, ClassBuilder, Instruction, Linker};
    use crate::shrink::ShrinkPipeline;

    #[test]
    fn test_compact_preserves_order() {
        let mut members: Vec<Member> = (0..4)
            .map(|i| {
                let mut member = Member::new(AccessFlags::PUBLIC, i + 1, i + 1);
                if i % 2 == 1 {
                    member.mark = UsageMark::Used;
                }
                member
            })
            .collect();
        let (map, removed) = compact(&mut members);

        assert_eq!(map, vec![None, Some(0), None, Some(1)]);
        assert_eq!(removed.len(), 2);
        assert_eq!(members[0].name_index, 2);
        assert_eq!(members[1].name_index, 4);
    }

    #[test]
    fn test_member_map() {
        let class = ClassId(3);
        let map = MemberMap {
            fields: vec![Some(0)],
            methods: vec![None, Some(0)],
        };
        assert_eq!(
            map.get(MemberId::method(class, 1)),
            Some(MemberId::method(class, 0))
        );
        assert_eq!(map.get(MemberId::method(class, 0)), None);
        assert_eq!(
            map.get(MemberId::field(class, 0)),
            Some(MemberId::field(class, 0))
        );
        assert!(!map.is_identity());
    }

    /// `Impl implements Base, Sub` where `Sub extends Base`
    fn redundant_interfaces(keep_impl: bool) -> ClassPath {
        let mut path = ClassPath::new();
        path.add(ClassBuilder::new("com/example/Base", AccessFlags::INTERFACE | AccessFlags::ABSTRACT).build());
        path.add(
            ClassBuilder::new("com/example/Sub", AccessFlags::INTERFACE | AccessFlags::ABSTRACT)
                .interface("com/example/Base")
                .build(),
        );
        let mut impl_class = ClassBuilder::new("com/example/Impl", AccessFlags::PUBLIC)
            .interface("com/example/Base")
            .interface("com/example/Sub");
        if keep_impl {
            impl_class = impl_class.kept();
        }
        let init = impl_class.add_method(AccessFlags::PUBLIC, "<init>", "()V", vec![]);
        impl_class.keep_method(init);
        path.add(impl_class.build());

        let mut main = ClassBuilder::new("com/example/Main", AccessFlags::PUBLIC).kept();
        let impl_ref = main.class_constant("com/example/Impl");
        let run = main.add_method(
            AccessFlags::PUBLIC | AccessFlags::STATIC,
            "main",
            "()V",
            vec![
                Instruction::Constant {
                    opcode: opcode::NEW,
                    index: impl_ref,
                    constant: 0,
                },
                Instruction::Simple {
                    opcode: opcode::RETURN,
                },
            ],
        );
        main.keep_method(run);
        path.add(main.build());

        Linker::default().link(&mut path);
        ShrinkPipeline::default()
            .run_with_seeds(&mut path)
            .expect("shrink succeeds");
        path
    }

    #[test]
    fn test_redundant_interface_pruned() {
        let path = redundant_interfaces(false);

        let class = path.by_name("com/example/Impl").expect("used");
        assert_eq!(class.interface_names(), vec!["com/example/Sub"]);
        assert_eq!(class.interface_ids.len(), 1);
        assert!(path.find("com/example/Base").is_some());
    }

    #[test]
    fn test_kept_class_keeps_interface_list() {
        let path = redundant_interfaces(true);

        let class = path.by_name("com/example/Impl").expect("kept");
        assert_eq!(
            class.interface_names(),
            vec!["com/example/Base", "com/example/Sub"]
        );
        assert_eq!(class.interface_ids.len(), 2);
    }
}
