//! Reachability marking over the class path.
//!
//! Marking is worklist driven: marking an entity records its mark and
//! queues its body; bodies are processed in [`UsageMarker::drain`]. Deep
//! class hierarchies therefore never recurse on the call stack.

use std::collections::HashSet;

use tracing::{debug, trace};

use super::reasons::{UsageNode, UsageReasons};
use super::{
    annotation_marker, hierarchy, inner_marker, interface_marker, kotlin_marker,
    local_variable_marker, nest_marker, record_marker,
};
use crate::model::descriptor::{INSTANCE_INITIALIZER, METHOD_TYPE_INITIALIZER};
use crate::model::{
    opcode, Attribute, AttributeInfo, ClassId, ClassPath, Constant, Instruction, MemberId,
    MemberKind, UsageMark,
};

#[derive(Debug, Clone, Copy)]
enum Task {
    ClassBody(ClassId),
    MemberBody(MemberId),
    MethodHierarchy(MemberId),
}

impl Task {
    fn node(&self) -> UsageNode {
        match self {
            Task::ClassBody(id) => UsageNode::Class(*id),
            Task::MemberBody(id) | Task::MethodHierarchy(id) => UsageNode::Member(*id),
        }
    }
}

/// Where a list of attributes lives
#[derive(Debug, Clone, Copy)]
pub(crate) enum AttributeOwner {
    Class(ClassId),
    Member(MemberId),
}

impl AttributeOwner {
    pub(crate) fn class(&self) -> ClassId {
        match self {
            AttributeOwner::Class(id) => *id,
            AttributeOwner::Member(id) => id.class,
        }
    }

    pub(crate) fn attributes_mut<'p>(&self, path: &'p mut ClassPath) -> Option<&'p mut Vec<Attribute>> {
        match self {
            AttributeOwner::Class(id) => path.get_mut(*id).map(|c| &mut c.attributes),
            AttributeOwner::Member(id) => path.member_mut(*id).map(|m| &mut m.attributes),
        }
    }
}

/// Constant-pool indices collected from attributes before they are marked
#[derive(Debug, Default)]
pub(crate) struct Edges {
    pub constants: Vec<u16>,
    /// Operands of ldc instructions; class and string constants loaded this
    /// way tentatively keep the target's no-argument constructor
    pub loaded: Vec<u16>,
    /// Members an attribute entry needs, such as enum constants named by
    /// annotation elements
    pub members: Vec<MemberId>,
}

/// What marking a constant leads to
#[derive(Debug, Default)]
struct ConstantFollow {
    constants: Vec<u16>,
    classes: Vec<ClassId>,
    member: Option<MemberId>,
    bootstrap: Option<u16>,
}

impl ConstantFollow {
    fn of(constant: &Constant) -> Self {
        let mut follow = ConstantFollow::default();
        match constant {
            Constant::Class {
                name_index,
                referenced_class,
            } => {
                follow.constants.push(*name_index);
                follow.classes.extend(referenced_class);
            }
            Constant::String {
                string_index,
                referenced_class,
            } => {
                follow.constants.push(*string_index);
                follow.classes.extend(referenced_class);
            }
            Constant::FieldRef(r) | Constant::MethodRef(r) | Constant::InterfaceMethodRef(r) => {
                follow.constants.push(r.class_index);
                follow.constants.push(r.name_and_type_index);
                follow.classes.extend(r.referenced_class);
                follow.member = r.referenced_member;
            }
            Constant::NameAndType {
                name_index,
                descriptor_index,
            } => {
                follow.constants.push(*name_index);
                follow.constants.push(*descriptor_index);
            }
            Constant::MethodHandle {
                reference_index, ..
            } => follow.constants.push(*reference_index),
            Constant::MethodType {
                descriptor_index,
                referenced_classes,
            } => {
                follow.constants.push(*descriptor_index);
                follow.classes.extend(referenced_classes.iter().copied());
            }
            Constant::Dynamic(d) | Constant::InvokeDynamic(d) => {
                follow.constants.push(d.name_and_type_index);
                follow.classes.extend(d.referenced_classes.iter().copied());
                follow.bootstrap = Some(d.bootstrap_method_index);
            }
            Constant::Module { name_index } | Constant::Package { name_index } => {
                follow.constants.push(*name_index)
            }
            Constant::Invalid
            | Constant::Utf8 { .. }
            | Constant::Integer { .. }
            | Constant::Float { .. }
            | Constant::Long { .. }
            | Constant::Double { .. } => {}
        }
        follow
    }
}

/// Attributes whose contents are decided by a refiner once marking is stable
fn is_deferred(info: &AttributeInfo) -> bool {
    matches!(
        info,
        AttributeInfo::BootstrapMethods { .. }
            | AttributeInfo::InnerClasses { .. }
            | AttributeInfo::NestHost { .. }
            | AttributeInfo::NestMembers { .. }
            | AttributeInfo::PermittedSubclasses { .. }
            | AttributeInfo::Record { .. }
            | AttributeInfo::LocalVariableTable { .. }
            | AttributeInfo::LocalVariableTypeTable { .. }
            | AttributeInfo::Annotations { .. }
            | AttributeInfo::ParameterAnnotations { .. }
            | AttributeInfo::TypeAnnotations { .. }
            | AttributeInfo::AnnotationDefault { .. }
    )
}

/// Mark an attribute whose usage follows directly from its owner, collecting
/// the pool indices it references. Deferred attributes are left alone.
pub(crate) fn mark_primary(attribute: &mut Attribute, edges: &mut Edges) {
    if is_deferred(&attribute.info) {
        return;
    }
    attribute.mark = UsageMark::Used;
    if !matches!(attribute.info, AttributeInfo::Code(_)) {
        attribute.for_each_constant_index_mut(&mut |index| edges.constants.push(*index));
        return;
    }

    edges.constants.push(attribute.name_index);
    if let AttributeInfo::Code(code) = &mut attribute.info {
        for instruction in &code.instructions {
            if let Instruction::Constant { opcode, index, .. } = instruction {
                edges.constants.push(*index);
                if matches!(*opcode, opcode::LDC | opcode::LDC_W) {
                    edges.loaded.push(*index);
                }
            }
        }
        for handler in &code.exception_table {
            if handler.catch_type != 0 {
                edges.constants.push(handler.catch_type);
            }
        }
        for nested in &mut code.attributes {
            mark_primary(nested, edges);
        }
    }
}

/// Marks everything reachable from the keep seeds.
///
/// Marking runs in rounds: drain the worklist, then let the Kotlin metadata
/// and interface refiners promote entities; repeat until a round changes
/// nothing. The remaining refiners only read marks, so they run once at the
/// end.
pub struct UsageMarker<'a> {
    path: &'a mut ClassPath,
    queue: Vec<Task>,
    cause: Option<UsageNode>,
    reasons: Option<&'a mut UsageReasons>,
    keep_kotlin_metadata: bool,
    processed: usize,
    /// Type aliases referenced from used Kotlin types, by declaring class
    pub(crate) kotlin_alias_uses: HashSet<(ClassId, String)>,
}

impl<'a> UsageMarker<'a> {
    pub fn new(path: &'a mut ClassPath, keep_kotlin_metadata: bool) -> Self {
        Self {
            path,
            queue: Vec::new(),
            cause: None,
            reasons: None,
            keep_kotlin_metadata,
            processed: 0,
            kotlin_alias_uses: HashSet::new(),
        }
    }

    /// Record first causes while marking
    pub fn with_reasons(mut self, reasons: &'a mut UsageReasons) -> Self {
        self.reasons = Some(reasons);
        self
    }

    pub fn path(&self) -> &ClassPath {
        self.path
    }

    pub(crate) fn path_mut(&mut self) -> &mut ClassPath {
        self.path
    }

    pub fn mark(&mut self) {
        self.mark_seeds();

        let mut rounds = 0;
        loop {
            rounds += 1;
            self.drain();
            let mut changed = false;
            if self.keep_kotlin_metadata {
                changed |= kotlin_marker::mark_round(self);
            }
            changed |= interface_marker::mark_round(self);
            if !changed && self.queue.is_empty() {
                break;
            }
        }

        inner_marker::mark(self);
        nest_marker::mark(self);
        record_marker::mark(self);
        annotation_marker::mark(self);
        local_variable_marker::mark(self);
        if self.keep_kotlin_metadata {
            kotlin_marker::mark_modules(self);
        }
        self.drain();

        debug!(rounds, tasks = self.processed, "Marking complete");
    }

    fn mark_seeds(&mut self) {
        self.cause = None;
        for id in self.path.library_ids() {
            self.mark_class(id);
        }
        for id in self.path.program_ids() {
            let Some(class) = self.path.get(id) else {
                continue;
            };
            let kept_class = class.is_kept();
            let kept_members: Vec<MemberId> = class
                .fields
                .iter()
                .enumerate()
                .filter(|(_, m)| m.is_kept())
                .map(|(i, _)| MemberId::field(id, i))
                .chain(
                    class
                        .methods
                        .iter()
                        .enumerate()
                        .filter(|(_, m)| m.is_kept())
                        .map(|(i, _)| MemberId::method(id, i)),
                )
                .collect();

            if kept_class {
                self.mark_class(id);
            }
            for member in kept_members {
                self.mark_member(member);
            }
        }
    }

    /// Process queued bodies until the worklist is empty
    pub(crate) fn drain(&mut self) {
        while let Some(task) = self.queue.pop() {
            self.processed += 1;
            self.cause = Some(task.node());
            match task {
                Task::ClassBody(id) => self.process_class_body(id),
                Task::MemberBody(id) => self.process_member_body(id),
                Task::MethodHierarchy(id) => self.process_method_hierarchy(id),
            }
        }
        self.cause = None;
    }

    /// Attribute subsequent marks to `cause` in the reason graph
    pub(crate) fn set_cause(&mut self, cause: Option<UsageNode>) {
        self.cause = cause;
    }

    fn record(&mut self, target: UsageNode) {
        if let Some(reasons) = self.reasons.as_deref_mut() {
            reasons.record(self.cause, target);
        }
    }

    pub(crate) fn is_class_used(&self, id: ClassId) -> bool {
        self.path.is_class_used(id)
    }

    pub(crate) fn is_member_used(&self, id: MemberId) -> bool {
        self.path.is_member_used(id)
    }

    pub(crate) fn mark_class(&mut self, id: ClassId) {
        let Some(class) = self.path.get_mut(id) else {
            return;
        };
        if class.mark.is_used() {
            return;
        }
        class.mark = UsageMark::Used;
        trace!(class = %class.name(), "Marked class");
        self.record(UsageNode::Class(id));
        self.queue.push(Task::ClassBody(id));
    }

    /// An interface in an implements list is only possibly used until the
    /// implementing class is confirmed
    fn mark_interface_tentatively(&mut self, id: ClassId) {
        let Some(class) = self.path.get_mut(id) else {
            return;
        };
        if class.is_library() {
            self.mark_class(id);
        } else if class.mark == UsageMark::Unused {
            class.mark = UsageMark::PossiblyUsed;
        }
    }

    /// Mark a field or method. It becomes used when its class is used and
    /// possibly used otherwise; methods also pull in their hierarchy.
    pub(crate) fn mark_member(&mut self, id: MemberId) {
        let class_used = self.path.is_class_used(id.class);
        let Some(member) = self.path.member_mut(id) else {
            return;
        };
        let previous = member.mark;
        match (previous, class_used) {
            (UsageMark::Used, _) | (UsageMark::PossiblyUsed, false) => return,
            _ => {}
        }

        if class_used {
            member.mark = UsageMark::Used;
            self.record(UsageNode::Member(id));
            self.queue.push(Task::MemberBody(id));
        } else {
            member.mark = UsageMark::PossiblyUsed;
        }
        if id.kind == MemberKind::Method && previous == UsageMark::Unused {
            self.queue.push(Task::MethodHierarchy(id));
        }
    }

    /// Mark a constant and everything it references
    pub(crate) fn mark_constant(&mut self, class: ClassId, index: u16) {
        if index == 0 {
            return;
        }
        let follow = {
            let Some(owner) = self.path.get_mut(class) else {
                return;
            };
            if owner.is_library() {
                return;
            }
            let pool = &mut owner.constant_pool;
            match pool.mark(index) {
                None | Some(UsageMark::Used) => return,
                Some(_) => {}
            }
            pool.set_mark(index, UsageMark::Used);
            match pool.get(index) {
                Some(constant) => ConstantFollow::of(constant),
                None => return,
            }
        };

        for sub in follow.constants {
            self.mark_constant(class, sub);
        }
        for target in follow.classes {
            self.mark_class(target);
        }
        if let Some(member) = follow.member {
            self.mark_member(member);
        }
        if let Some(bootstrap) = follow.bootstrap {
            self.mark_bootstrap_method(class, bootstrap);
        }
    }

    fn mark_bootstrap_method(&mut self, class: ClassId, bootstrap: u16) {
        let constants = {
            let Some(owner) = self.path.get_mut(class) else {
                return;
            };
            let Some(position) = owner.bootstrap_methods_index() else {
                return;
            };
            let attribute = &mut owner.attributes[position];
            attribute.mark = UsageMark::Used;
            let mut constants = vec![attribute.name_index];
            let AttributeInfo::BootstrapMethods { methods } = &mut attribute.info else {
                return;
            };
            let Some(entry) = methods.get_mut(bootstrap as usize) else {
                return;
            };
            if !entry.mark.is_used() {
                entry.mark = UsageMark::Used;
                constants.push(entry.method_handle_index);
                constants.extend(entry.arguments.iter().copied());
            }
            constants
        };
        for index in constants {
            self.mark_constant(class, index);
        }
    }

    pub(crate) fn mark_attributes(&mut self, owner: AttributeOwner) {
        let mut edges = Edges::default();
        {
            let Some(attributes) = owner.attributes_mut(self.path) else {
                return;
            };
            for attribute in attributes.iter_mut() {
                mark_primary(attribute, &mut edges);
            }
        }
        self.apply_edges(owner.class(), edges);
    }

    pub(crate) fn apply_edges(&mut self, class: ClassId, edges: Edges) {
        for index in edges.constants {
            self.mark_constant(class, index);
        }
        for index in edges.loaded {
            if let Some(constructor) = self.parameterless_constructor(class, index) {
                self.mark_member(constructor);
            }
        }
        for member in edges.members {
            self.mark_member(member);
        }
    }

    /// `<init>()V` of the class named by a loaded class or string constant
    fn parameterless_constructor(&self, class: ClassId, index: u16) -> Option<MemberId> {
        let target = match self.path.get(class)?.constant_pool.get(index)? {
            Constant::Class {
                referenced_class, ..
            }
            | Constant::String {
                referenced_class, ..
            } => (*referenced_class)?,
            _ => return None,
        };
        let target_class = self.path.get(target)?;
        let method = target_class.find_method(INSTANCE_INITIALIZER, METHOD_TYPE_INITIALIZER)?;
        Some(MemberId::method(target, method))
    }

    fn process_class_body(&mut self, id: ClassId) {
        let Some(class) = self.path.get(id) else {
            return;
        };
        if class.is_library() {
            let methods = class.methods.len();
            for index in 0..methods {
                self.mark_member(MemberId::method(id, index));
            }
            return;
        }

        let this_class = class.this_class;
        let super_class = class.super_class;
        let interfaces = class.interface_ids.clone();
        let initializer = class.static_initializer();
        let pending: Vec<MemberId> = class
            .fields
            .iter()
            .enumerate()
            .filter(|(_, m)| m.mark.is_possibly_used())
            .map(|(i, _)| MemberId::field(id, i))
            .chain(
                class
                    .methods
                    .iter()
                    .enumerate()
                    .filter(|(_, m)| m.mark.is_possibly_used())
                    .map(|(i, _)| MemberId::method(id, i)),
            )
            .collect();

        self.mark_constant(id, this_class);
        self.mark_constant(id, super_class);
        for interface in interfaces {
            self.mark_interface_tentatively(interface);
        }
        if let Some(index) = initializer {
            self.mark_member(MemberId::method(id, index));
        }
        for member in pending {
            self.mark_member(member);
        }
        self.mark_attributes(AttributeOwner::Class(id));
    }

    fn process_member_body(&mut self, id: MemberId) {
        let Some(class) = self.path.get(id.class) else {
            return;
        };
        if class.is_library() {
            return;
        }
        let Some(member) = class.member(id.kind, id.index) else {
            return;
        };
        let name = member.name_index;
        let descriptor = member.descriptor_index;
        let classes = member.referenced_classes.clone();

        self.mark_constant(id.class, name);
        self.mark_constant(id.class, descriptor);
        for class in classes {
            self.mark_class(class);
        }
        self.mark_attributes(AttributeOwner::Member(id));
    }

    fn process_method_hierarchy(&mut self, id: MemberId) {
        for related in hierarchy::related_methods(self.path, id) {
            self.mark_member(related);
        }
    }
}
