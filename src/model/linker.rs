use std::collections::HashMap;

use rayon::prelude::*;
use tracing::debug;

use super::annotation::{Annotation, ElementValue, ElementValueKind};
use super::kotlin::{
    KotlinDeclarationContainer, KotlinFunction, KotlinMetadata, KotlinMetadataKind, KotlinType,
};
use super::{
    descriptor, signature, Attribute, AttributeInfo, Class, ClassId, ClassPath, Constant,
    ConstantPool, MemberId, MemberKind,
};

/// Resolves symbolic references (class names, member name/descriptor pairs,
/// Kotlin JVM signatures) into arena ids and fills in the class hierarchy.
///
/// Linking is idempotent and must run before marking.
#[derive(Debug, Clone, Default)]
pub struct Linker {
    /// Treat string constants that spell a class name as references to it
    pub link_class_strings: bool,
}

struct ClassInfo {
    super_id: Option<ClassId>,
    interface_ids: Vec<ClassId>,
    fields: HashMap<(String, String), usize>,
    methods: HashMap<(String, String), usize>,
    fields_by_name: HashMap<String, usize>,
    methods_by_name: HashMap<String, Vec<usize>>,
}

impl ClassInfo {
    fn of(class: &Class, path: &ClassPath) -> Self {
        let pool = &class.constant_pool;
        let mut info = ClassInfo {
            super_id: class.super_name().and_then(|n| path.find(n)),
            interface_ids: class
                .interface_names()
                .into_iter()
                .filter_map(|n| path.find(n))
                .collect(),
            fields: HashMap::new(),
            methods: HashMap::new(),
            fields_by_name: HashMap::new(),
            methods_by_name: HashMap::new(),
        };
        for (i, field) in class.fields.iter().enumerate() {
            let name = field.name(pool).to_string();
            info.fields_by_name.entry(name.clone()).or_insert(i);
            info.fields.insert((name, field.descriptor(pool).to_string()), i);
        }
        for (i, method) in class.methods.iter().enumerate() {
            let name = method.name(pool).to_string();
            info.methods_by_name.entry(name.clone()).or_default().push(i);
            info.methods.insert((name, method.descriptor(pool).to_string()), i);
        }
        info
    }
}

/// Immutable lookup tables built before any class is mutated
struct LinkIndex {
    names: HashMap<String, ClassId>,
    infos: HashMap<ClassId, ClassInfo>,
    aliases: HashMap<String, ClassId>,
}

impl LinkIndex {
    fn build(path: &ClassPath) -> Self {
        let classes: Vec<(ClassId, &Class)> = path.classes().collect();
        let infos = classes
            .par_iter()
            .map(|(id, class)| (*id, ClassInfo::of(class, path)))
            .collect();
        let names = classes
            .iter()
            .map(|(id, class)| (class.name().to_string(), *id))
            .collect();

        let mut aliases = HashMap::new();
        for (id, class) in &classes {
            let Some(container) = class.kotlin_metadata.as_ref().and_then(|m| m.container())
            else {
                continue;
            };
            let package = descriptor::package_name(class.name());
            for alias in &container.type_aliases {
                let name = if package.is_empty() {
                    alias.name.clone()
                } else {
                    format!("{}/{}", package, alias.name)
                };
                aliases.insert(name, *id);
            }
        }

        Self {
            names,
            infos,
            aliases,
        }
    }

    fn class(&self, name: &str) -> Option<ClassId> {
        self.names.get(name).copied()
    }

    fn classes_in(&self, names: Vec<&str>) -> Vec<ClassId> {
        names.into_iter().filter_map(|n| self.class(n)).collect()
    }

    fn own_member(
        &self,
        class: ClassId,
        kind: MemberKind,
        name: &str,
        descriptor: &str,
    ) -> Option<MemberId> {
        let info = self.infos.get(&class)?;
        let key = (name.to_string(), descriptor.to_string());
        let index = match kind {
            MemberKind::Field => info.fields.get(&key),
            MemberKind::Method => info.methods.get(&key),
        }?;
        Some(MemberId {
            class,
            kind,
            index: *index as u32,
        })
    }

    fn field_by_name(&self, class: ClassId, name: &str) -> Option<MemberId> {
        let index = self.infos.get(&class)?.fields_by_name.get(name)?;
        Some(MemberId::field(class, *index))
    }

    /// Annotation element methods take no arguments, so the name is enough
    fn element_method(&self, class: ClassId, name: &str) -> Option<MemberId> {
        let index = self.infos.get(&class)?.methods_by_name.get(name)?.first()?;
        Some(MemberId::method(class, *index))
    }

    /// Field resolution: the class, its superinterfaces, then its superclass
    fn resolve_field(&self, class: ClassId, name: &str, descriptor: &str, depth: usize) -> Option<MemberId> {
        if depth > 64 {
            return None;
        }
        if let Some(found) = self.own_member(class, MemberKind::Field, name, descriptor) {
            return Some(found);
        }
        let info = self.infos.get(&class)?;
        info.interface_ids
            .iter()
            .find_map(|i| self.resolve_field(*i, name, descriptor, depth + 1))
            .or_else(|| {
                info.super_id
                    .and_then(|s| self.resolve_field(s, name, descriptor, depth + 1))
            })
    }

    /// Method resolution: the superclass chain first, then all superinterfaces
    fn resolve_method(&self, class: ClassId, name: &str, descriptor: &str) -> Option<MemberId> {
        let mut current = Some(class);
        let mut chain = Vec::new();
        while let Some(id) = current {
            if chain.contains(&id) {
                break;
            }
            if let Some(found) = self.own_member(id, MemberKind::Method, name, descriptor) {
                return Some(found);
            }
            chain.push(id);
            current = self.infos.get(&id).and_then(|i| i.super_id);
        }

        let mut queue: Vec<ClassId> = chain
            .iter()
            .filter_map(|id| self.infos.get(id))
            .flat_map(|i| i.interface_ids.iter().copied())
            .collect();
        let mut seen = Vec::new();
        while let Some(id) = queue.pop() {
            if seen.contains(&id) {
                continue;
            }
            seen.push(id);
            if let Some(found) = self.own_member(id, MemberKind::Method, name, descriptor) {
                return Some(found);
            }
            if let Some(info) = self.infos.get(&id) {
                queue.extend(info.interface_ids.iter().copied());
            }
        }
        None
    }
}

enum ConstantLink {
    Class(Option<ClassId>),
    Ref(Option<ClassId>, Option<MemberId>),
    Classes(Vec<ClassId>),
}

impl Linker {
    pub fn new(link_class_strings: bool) -> Self {
        Self { link_class_strings }
    }

    pub fn link(&self, path: &mut ClassPath) {
        let index = LinkIndex::build(path);
        let ids: Vec<ClassId> = path.ids().collect();

        for id in &ids {
            let Some(info) = index.infos.get(id) else {
                continue;
            };
            if let Some(class) = path.get_mut(*id) {
                class.super_class_id = info.super_id;
                class.interface_ids = info.interface_ids.clone();
                class.subclasses.clear();
            }
        }
        for id in &ids {
            let Some(info) = index.infos.get(id) else {
                continue;
            };
            for parent in info.super_id.iter().chain(info.interface_ids.iter()) {
                if let Some(parent) = path.get_mut(*parent) {
                    parent.subclasses.push(*id);
                }
            }
        }

        for id in &ids {
            if let Some(class) = path.get_mut(*id) {
                self.link_class(*id, class, &index);
            }
        }

        for module in &mut path.kotlin_modules {
            for package in &mut module.packages {
                package.referenced_file_facades =
                    package.file_facades.iter().map(|f| index.class(f)).collect();
                package.referenced_multi_file_parts = package
                    .multi_file_parts
                    .iter()
                    .map(|(part, _)| index.class(part))
                    .collect();
            }
        }

        debug!(classes = ids.len(), "Linked class path");
    }

    fn link_class(&self, id: ClassId, class: &mut Class, index: &LinkIndex) {
        let owner_name = class.name().to_string();
        let Class {
            constant_pool,
            fields,
            methods,
            attributes,
            kotlin_metadata,
            ..
        } = class;

        let links: Vec<(u16, ConstantLink)> = constant_pool
            .iter()
            .filter_map(|(i, constant, _)| {
                self.constant_link(constant_pool, constant, index)
                    .map(|link| (i, link))
            })
            .collect();
        for (i, link) in links {
            let Some(constant) = constant_pool.get_mut(i) else {
                continue;
            };
            match (constant, link) {
                (
                    Constant::Class {
                        referenced_class, ..
                    }
                    | Constant::String {
                        referenced_class, ..
                    },
                    ConstantLink::Class(target),
                ) => *referenced_class = target,
                (
                    Constant::FieldRef(r) | Constant::MethodRef(r) | Constant::InterfaceMethodRef(r),
                    ConstantLink::Ref(class, member),
                ) => {
                    r.referenced_class = class;
                    r.referenced_member = member;
                }
                (
                    Constant::MethodType {
                        referenced_classes, ..
                    },
                    ConstantLink::Classes(classes),
                ) => *referenced_classes = classes,
                (
                    Constant::Dynamic(d) | Constant::InvokeDynamic(d),
                    ConstantLink::Classes(classes),
                ) => d.referenced_classes = classes,
                _ => {}
            }
        }

        let pool: &ConstantPool = constant_pool;
        for member in fields.iter_mut().chain(methods.iter_mut()) {
            member.referenced_classes =
                index.classes_in(descriptor::class_names(member.descriptor(pool)));
            link_attributes(&mut member.attributes, pool, id, index);
        }
        link_attributes(attributes, pool, id, index);

        if let Some(metadata) = kotlin_metadata {
            link_kotlin(metadata, id, &owner_name, index);
        }
    }

    fn constant_link(
        &self,
        pool: &ConstantPool,
        constant: &Constant,
        index: &LinkIndex,
    ) -> Option<ConstantLink> {
        match constant {
            Constant::Class { name_index, .. } => {
                Some(ConstantLink::Class(index.class(pool.utf8(*name_index)?)))
            }
            Constant::String { string_index, .. } if self.link_class_strings => {
                let text = pool.utf8(*string_index)?;
                Some(ConstantLink::Class(index.class(&descriptor::to_internal(text))))
            }
            Constant::FieldRef(r) | Constant::MethodRef(r) | Constant::InterfaceMethodRef(r) => {
                let owner = index.class(pool.class_name(r.class_index)?);
                let (name, desc) = pool.name_and_type(r.name_and_type_index)?;
                let member = owner.and_then(|o| match constant {
                    Constant::FieldRef(_) => index.resolve_field(o, name, desc, 0),
                    _ => index.resolve_method(o, name, desc),
                });
                Some(ConstantLink::Ref(member.map(|m| m.class).or(owner), member))
            }
            Constant::MethodType {
                descriptor_index, ..
            } => Some(ConstantLink::Classes(
                index.classes_in(descriptor::class_names(pool.utf8(*descriptor_index)?)),
            )),
            Constant::Dynamic(d) | Constant::InvokeDynamic(d) => {
                let (_, desc) = pool.name_and_type(d.name_and_type_index)?;
                Some(ConstantLink::Classes(
                    index.classes_in(descriptor::class_names(desc)),
                ))
            }
            _ => None,
        }
    }
}

fn link_attributes(attributes: &mut [Attribute], pool: &ConstantPool, owner: ClassId, index: &LinkIndex) {
    for attribute in attributes {
        match &mut attribute.info {
            AttributeInfo::EnclosingMethod {
                class_index,
                method_index,
                referenced_class,
                referenced_method,
            } => {
                *referenced_class = pool.class_name(*class_index).and_then(|n| index.class(n));
                *referenced_method = match (*referenced_class, pool.name_and_type(*method_index)) {
                    (Some(class), Some((name, desc))) => {
                        index.own_member(class, MemberKind::Method, name, desc)
                    }
                    _ => None,
                };
            }
            AttributeInfo::Signature {
                signature_index,
                referenced_classes,
            } => {
                *referenced_classes = pool
                    .utf8(*signature_index)
                    .map(signature::class_names)
                    .unwrap_or_default()
                    .iter()
                    .filter_map(|n| index.class(n))
                    .collect();
            }
            AttributeInfo::Record { components } => {
                for component in components {
                    component.referenced_field = match (
                        pool.utf8(component.name_index),
                        pool.utf8(component.descriptor_index),
                    ) {
                        (Some(name), Some(desc)) => {
                            index.own_member(owner, MemberKind::Field, name, desc)
                        }
                        _ => None,
                    };
                    link_attributes(&mut component.attributes, pool, owner, index);
                }
            }
            AttributeInfo::Code(code) => link_attributes(&mut code.attributes, pool, owner, index),
            AttributeInfo::LocalVariableTable { variables } => {
                for variable in variables {
                    variable.referenced_classes = pool
                        .utf8(variable.descriptor_index)
                        .map(|d| index.classes_in(descriptor::class_names(d)))
                        .unwrap_or_default();
                }
            }
            AttributeInfo::LocalVariableTypeTable { variables } => {
                for variable in variables {
                    variable.referenced_classes = pool
                        .utf8(variable.signature_index)
                        .map(signature::class_names)
                        .unwrap_or_default()
                        .iter()
                        .filter_map(|n| index.class(n))
                        .collect();
                }
            }
            AttributeInfo::Annotations { annotations, .. } => {
                for annotation in annotations {
                    link_annotation(annotation, pool, index);
                }
            }
            AttributeInfo::ParameterAnnotations { parameters, .. } => {
                for annotation in parameters.iter_mut().flatten() {
                    link_annotation(annotation, pool, index);
                }
            }
            AttributeInfo::TypeAnnotations { annotations, .. } => {
                for annotation in annotations {
                    link_annotation(&mut annotation.annotation, pool, index);
                }
            }
            AttributeInfo::AnnotationDefault { default_value } => {
                link_element_value(default_value, None, pool, index)
            }
            _ => {}
        }
    }
}

fn link_annotation(annotation: &mut Annotation, pool: &ConstantPool, index: &LinkIndex) {
    annotation.referenced_classes = pool
        .utf8(annotation.type_index)
        .map(|d| index.classes_in(descriptor::class_names(d)))
        .unwrap_or_default();
    let annotation_class = annotation.referenced_classes.first().copied();
    for element in &mut annotation.elements {
        link_element_value(element, annotation_class, pool, index);
    }
}

fn link_element_value(
    element: &mut ElementValue,
    annotation_class: Option<ClassId>,
    pool: &ConstantPool,
    index: &LinkIndex,
) {
    element.referenced_method = match (annotation_class, pool.utf8(element.element_name_index)) {
        (Some(class), Some(name)) if element.element_name_index != 0 => {
            index.element_method(class, name)
        }
        _ => None,
    };
    match &mut element.value {
        ElementValueKind::EnumConstant {
            type_name_index,
            const_name_index,
            referenced_classes,
            referenced_field,
        } => {
            let type_name = pool.utf8(*type_name_index).unwrap_or("");
            *referenced_classes = index.classes_in(descriptor::class_names(type_name));
            *referenced_field = match (referenced_classes.first(), pool.utf8(*const_name_index)) {
                (Some(class), Some(name)) => {
                    index.own_member(*class, MemberKind::Field, name, type_name)
                }
                _ => None,
            };
        }
        ElementValueKind::Class {
            class_info_index,
            referenced_classes,
        } => {
            *referenced_classes = pool
                .utf8(*class_info_index)
                .map(|d| index.classes_in(descriptor::class_names(d)))
                .unwrap_or_default();
        }
        ElementValueKind::Annotation { annotation } => link_annotation(annotation, pool, index),
        ElementValueKind::Array { values } => {
            for value in values {
                link_element_value(value, annotation_class, pool, index);
            }
        }
        ElementValueKind::Constant { .. } => {}
    }
}

fn link_kotlin(metadata: &mut KotlinMetadata, owner: ClassId, owner_name: &str, index: &LinkIndex) {
    let default_impls = index.class(&format!("{owner_name}$DefaultImpls"));
    if let Some(container) = metadata.container_mut() {
        link_container(container, owner, default_impls, index);
    }
    match &mut metadata.kind {
        KotlinMetadataKind::Class(class) => {
            class.referenced_default_impls_class = default_impls;
            for constructor in &mut class.constructors {
                constructor.referenced_method = constructor.signature.as_ref().and_then(|s| {
                    index.own_member(owner, MemberKind::Method, &s.name, &s.descriptor)
                });
                for parameter in &mut constructor.value_parameters {
                    link_type(&mut parameter.ty, index);
                    if let Some(vararg) = &mut parameter.vararg_element_type {
                        link_type(vararg, index);
                    }
                }
            }
            for parameter in &mut class.type_parameters {
                parameter.upper_bounds.iter_mut().for_each(|t| link_type(t, index));
            }
            class.super_types.iter_mut().for_each(|t| link_type(t, index));
            class.referenced_nested_classes = class
                .nested_class_names
                .iter()
                .map(|n| index.class(&format!("{owner_name}${n}")))
                .collect();
            class.referenced_sealed_subclasses = class
                .sealed_subclass_names
                .iter()
                .map(|n| index.class(n))
                .collect();
            class.referenced_enum_entries = class
                .enum_entry_names
                .iter()
                .map(|n| index.field_by_name(owner, n))
                .collect();
            class.referenced_companion_class = class
                .companion_object_name
                .as_ref()
                .and_then(|n| index.class(&format!("{owner_name}${n}")));
            class.referenced_companion_field = class
                .companion_object_name
                .as_ref()
                .and_then(|n| index.field_by_name(owner, n));
        }
        KotlinMetadataKind::SyntheticClass { functions, .. } => {
            for function in functions {
                link_function(function, owner, None, index);
            }
        }
        KotlinMetadataKind::MultiFileFacade {
            part_class_names,
            referenced_part_classes,
        } => {
            *referenced_part_classes = part_class_names.iter().map(|n| index.class(n)).collect();
        }
        KotlinMetadataKind::MultiFilePart {
            facade_class_name,
            referenced_facade_class,
            ..
        } => *referenced_facade_class = index.class(facade_class_name),
        KotlinMetadataKind::FileFacade { .. } => {}
    }
}

fn link_container(
    container: &mut KotlinDeclarationContainer,
    owner: ClassId,
    default_impls: Option<ClassId>,
    index: &LinkIndex,
) {
    let method = |signature: &Option<super::kotlin::JvmSignature>| {
        signature
            .as_ref()
            .and_then(|s| index.own_member(owner, MemberKind::Method, &s.name, &s.descriptor))
    };
    for property in container
        .properties
        .iter_mut()
        .chain(container.local_delegated_properties.iter_mut())
    {
        let field_owner = property
            .backing_field_owner
            .as_deref()
            .and_then(|n| index.class(n))
            .unwrap_or(owner);
        property.referenced_backing_field = property.backing_field.as_ref().and_then(|s| {
            index.own_member(field_owner, MemberKind::Field, &s.name, &s.descriptor)
        });
        property.referenced_getter = method(&property.getter);
        property.referenced_setter = method(&property.setter);
        property.referenced_annotations_method = method(&property.synthetic_method_for_annotations);
        property.referenced_delegate_method = method(&property.synthetic_method_for_delegate);

        link_type(&mut property.ty, index);
        if let Some(receiver) = &mut property.receiver_type {
            link_type(receiver, index);
        }
        for parameter in &mut property.type_parameters {
            parameter.upper_bounds.iter_mut().for_each(|t| link_type(t, index));
        }
        for parameter in &mut property.setter_parameters {
            link_type(&mut parameter.ty, index);
        }
    }
    for function in &mut container.functions {
        link_function(function, owner, default_impls, index);
    }
    for alias in &mut container.type_aliases {
        link_type(&mut alias.underlying_type, index);
        link_type(&mut alias.expanded_type, index);
        for annotation in &mut alias.annotations {
            annotation.referenced_class = index.class(&annotation.class_name);
        }
    }
}

fn link_function(
    function: &mut KotlinFunction,
    owner: ClassId,
    default_impls: Option<ClassId>,
    index: &LinkIndex,
) {
    function.referenced_method = function
        .signature
        .as_ref()
        .and_then(|s| index.own_member(owner, MemberKind::Method, &s.name, &s.descriptor));
    function.referenced_default_method = function
        .default_method
        .as_ref()
        .and_then(|s| index.own_member(owner, MemberKind::Method, &s.name, &s.descriptor));
    function.referenced_default_impls_method = match (default_impls, &function.default_impls_method)
    {
        (Some(class), Some(s)) => index.own_member(class, MemberKind::Method, &s.name, &s.descriptor),
        _ => None,
    };

    if let Some(receiver) = &mut function.receiver_type {
        link_type(receiver, index);
    }
    link_type(&mut function.return_type, index);
    for parameter in &mut function.type_parameters {
        parameter.upper_bounds.iter_mut().for_each(|t| link_type(t, index));
    }
    for parameter in &mut function.value_parameters {
        link_type(&mut parameter.ty, index);
        if let Some(vararg) = &mut parameter.vararg_element_type {
            link_type(vararg, index);
        }
    }
}

fn link_type(ty: &mut KotlinType, index: &LinkIndex) {
    ty.referenced_class = ty.class_name.as_deref().and_then(|n| index.class(n));
    ty.referenced_alias_container = ty
        .type_alias_name
        .as_deref()
        .and_then(|n| index.aliases.get(n).copied());
    for argument in &mut ty.arguments {
        if let Some(inner) = &mut argument.ty {
            link_type(inner, index);
        }
    }
    if let Some(outer) = &mut ty.outer_type {
        link_type(outer, index);
    }
    if let Some(upper) = &mut ty.flexible_upper_bound {
        link_type(upper, index);
    }
    for annotation in &mut ty.annotations {
        annotation.referenced_class = index.class(&annotation.class_name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AccessFlags, ClassBuilder};

    fn sample_path() -> (ClassPath, ClassId, ClassId) {
        let mut path = ClassPath::new();
        let mut base = ClassBuilder::new("a/Base", AccessFlags::PUBLIC);
        base.add_method(AccessFlags::PUBLIC, "run", "()V", vec![]);
        let base = path.add(base.super_class("java/lang/Object").build());

        let mut sub = ClassBuilder::new("a/Sub", AccessFlags::PUBLIC).super_class("a/Base");
        sub.method_ref("a/Sub", "run", "()V");
        let sub = path.add(sub.build());
        (path, base, sub)
    }

    #[test]
    fn test_hierarchy_and_subclasses() {
        let (mut path, base, sub) = sample_path();
        Linker::default().link(&mut path);

        assert_eq!(path.get(sub).unwrap().super_class_id, Some(base));
        assert_eq!(path.get(base).unwrap().subclasses, vec![sub]);
    }

    #[test]
    fn test_method_ref_resolves_to_declaring_class() {
        let (mut path, base, sub) = sample_path();
        Linker::default().link(&mut path);

        let class = path.get(sub).unwrap();
        let reference = class
            .constant_pool
            .iter()
            .find_map(|(_, c, _)| c.as_ref_constant().cloned())
            .unwrap();
        assert_eq!(reference.referenced_class, Some(base));
        assert_eq!(reference.referenced_member, Some(MemberId::method(base, 0)));
    }

    #[test]
    fn test_link_is_idempotent() {
        let (mut path, base, sub) = sample_path();
        let linker = Linker::default();
        linker.link(&mut path);
        linker.link(&mut path);

        assert_eq!(path.get(base).unwrap().subclasses, vec![sub]);
    }
}
