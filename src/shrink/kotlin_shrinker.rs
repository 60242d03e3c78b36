//! Shrinks Kotlin metadata in step with the class shrinker.
//!
//! Runs after marking and before classes are compacted, so member ids and
//! marks still refer to the original layout. Every declaration that was not
//! marked is dropped, references to members that will disappear are nulled,
//! and the two inconsistencies the removal can introduce are repaired:
//!
//! * a property left with only a private backing field gets a field whose
//!   visibility matches the property;
//! * an interface function whose `DefaultImpls` body disappeared becomes
//!   abstract.

use tracing::debug;

use super::ShrinkSummary;
use crate::model::kotlin::{
    KotlinAnnotation, KotlinClassMetadata, KotlinDeclarationContainer, KotlinFunction,
    KotlinMetadataKind, KotlinModality, KotlinProperty, KotlinType, KotlinVisibility,
};
use crate::model::{AccessFlags, ClassId, ClassPath, MemberId};

pub(crate) fn shrink(path: &mut ClassPath, summary: &mut ShrinkSummary) {
    for id in path.program_ids() {
        let Some(class) = path.get_mut(id) else {
            continue;
        };
        if !class.mark.is_used() {
            continue;
        }
        let is_interface = class.is_interface();
        let Some(mut metadata) = class.kotlin_metadata.take() else {
            continue;
        };
        if !metadata.mark.is_used() {
            debug!(class = %class.name(), kind = metadata.kind_name(), "Removed Kotlin metadata");
            summary.removed_metadata_nodes += 1;
            continue;
        }

        let mut shrinker = MetadataShrinker {
            path: &mut *path,
            is_interface,
            removed: 0,
        };
        match &mut metadata.kind {
            KotlinMetadataKind::Class(class) => shrinker.class(class),
            KotlinMetadataKind::FileFacade { container }
            | KotlinMetadataKind::MultiFilePart { container, .. } => shrinker.container(container),
            KotlinMetadataKind::SyntheticClass { functions, .. } => {
                shrinker.removed += retain(functions, |f| f.mark.is_used());
                for function in functions.iter_mut() {
                    shrinker.function(function);
                }
            }
            KotlinMetadataKind::MultiFileFacade {
                part_class_names,
                referenced_part_classes,
            } => {
                let path = &*shrinker.path;
                shrinker.removed += retain_paired(part_class_names, referenced_part_classes, |r| {
                    r.map_or(true, |id| path.is_class_used(id))
                });
            }
        }
        summary.removed_metadata_nodes += shrinker.removed;

        if let Some(class) = path.get_mut(id) {
            class.kotlin_metadata = Some(metadata);
        }
    }
}

/// Metadata is dropped wholesale when it is not being processed
pub(crate) fn strip(path: &mut ClassPath, summary: &mut ShrinkSummary) {
    for id in path.program_ids() {
        if let Some(class) = path.get_mut(id) {
            if class.kotlin_metadata.take().is_some() {
                summary.removed_metadata_nodes += 1;
            }
        }
    }
    summary.removed_modules += path.kotlin_modules.len();
    path.kotlin_modules.clear();
}

struct MetadataShrinker<'p> {
    path: &'p mut ClassPath,
    is_interface: bool,
    removed: usize,
}

impl MetadataShrinker<'_> {
    fn class_used(&self, id: Option<ClassId>) -> bool {
        id.map_or(true, |id| self.path.is_class_used(id))
    }

    /// Null a member reference whose member is about to be removed.
    /// Returns true when the reference was dropped.
    fn drop_unused(&self, reference: &mut Option<MemberId>) -> bool {
        match *reference {
            Some(id) if !self.path.is_member_used(id) => {
                *reference = None;
                true
            }
            _ => false,
        }
    }

    fn class(&mut self, class: &mut KotlinClassMetadata) {
        self.container(&mut class.container);

        self.removed += retain(&mut class.constructors, |c| c.mark.is_used());
        for constructor in class.constructors.iter_mut() {
            self.removed += retain(&mut constructor.value_parameters, |p| p.mark.is_used());
            for parameter in constructor.value_parameters.iter_mut() {
                self.ty(&mut parameter.ty);
            }
        }
        self.removed += retain(&mut class.type_parameters, |p| p.mark.is_used());

        let path = &*self.path;
        self.removed += retain(&mut class.super_types, |t| {
            t.referenced_class.map_or(true, |id| path.is_class_used(id))
        });
        self.removed += retain_paired(
            &mut class.nested_class_names,
            &mut class.referenced_nested_classes,
            |r| r.map_or(true, |id| path.is_class_used(id)),
        );
        self.removed += retain_paired(
            &mut class.sealed_subclass_names,
            &mut class.referenced_sealed_subclasses,
            |r| r.map_or(true, |id| path.is_class_used(id)),
        );
        self.removed += retain_paired(
            &mut class.enum_entry_names,
            &mut class.referenced_enum_entries,
            |r| r.map_or(true, |id| path.is_member_used(id)),
        );

        if !self.class_used(class.referenced_companion_class) {
            debug!(class = %class.class_name, "Removed companion object");
            class.companion_object_name = None;
            class.referenced_companion_class = None;
            class.referenced_companion_field = None;
            self.removed += 1;
        } else {
            let mut field = class.referenced_companion_field;
            self.drop_unused(&mut field);
            class.referenced_companion_field = field;
        }
        if !self.class_used(class.referenced_default_impls_class) {
            class.referenced_default_impls_class = None;
        }
        for ty in class.super_types.iter_mut() {
            self.ty(ty);
        }
    }

    fn container(&mut self, container: &mut KotlinDeclarationContainer) {
        self.removed += retain(&mut container.properties, |p| p.mark.is_used());
        self.removed += retain(&mut container.local_delegated_properties, |p| p.mark.is_used());
        self.removed += retain(&mut container.functions, |f| f.mark.is_used());
        self.removed += retain(&mut container.type_aliases, |a| a.mark.is_used());

        for property in container
            .properties
            .iter_mut()
            .chain(container.local_delegated_properties.iter_mut())
        {
            self.property(property);
        }
        for function in container.functions.iter_mut() {
            self.function(function);
        }
        for alias in container.type_aliases.iter_mut() {
            self.removed += retain(&mut alias.type_parameters, |p| p.mark.is_used());
            self.annotations(&mut alias.annotations);
            self.ty(&mut alias.underlying_type);
            self.ty(&mut alias.expanded_type);
        }
    }

    fn property(&mut self, property: &mut KotlinProperty) {
        let mut backing = property.referenced_backing_field;
        if self.drop_unused(&mut backing) {
            property.backing_field = None;
            property.backing_field_owner = None;
        }
        property.referenced_backing_field = backing;

        let mut getter = property.referenced_getter;
        if self.drop_unused(&mut getter) {
            property.getter = None;
            property.flags.has_getter = false;
        }
        property.referenced_getter = getter;

        let mut setter = property.referenced_setter;
        if self.drop_unused(&mut setter) {
            property.setter = None;
            property.flags.has_setter = false;
            property.setter_parameters.clear();
        }
        property.referenced_setter = setter;

        let mut annotations = property.referenced_annotations_method;
        if self.drop_unused(&mut annotations) {
            property.synthetic_method_for_annotations = None;
        }
        property.referenced_annotations_method = annotations;

        let mut delegate = property.referenced_delegate_method;
        if self.drop_unused(&mut delegate) {
            property.synthetic_method_for_delegate = None;
        }
        property.referenced_delegate_method = delegate;

        self.removed += retain(&mut property.type_parameters, |p| p.mark.is_used());
        self.ty(&mut property.ty);
        if let Some(receiver) = &mut property.receiver_type {
            self.ty(receiver);
        }

        if property.referenced_getter.is_none() && property.referenced_setter.is_none() {
            if let Some(field) = property.referenced_backing_field {
                self.expose_backing_field(property, field);
            }
        }
    }

    /// The field is the only thing left to observe the property through
    fn expose_backing_field(&mut self, property: &KotlinProperty, field: MemberId) {
        let visibility = match property.flags.visibility {
            KotlinVisibility::Public | KotlinVisibility::Internal => AccessFlags::PUBLIC,
            KotlinVisibility::Protected => AccessFlags::PROTECTED,
            KotlinVisibility::Private
            | KotlinVisibility::PrivateToThis
            | KotlinVisibility::Local => return,
        };
        let Some(member) = self.path.member_mut(field) else {
            return;
        };
        if member.access_flags.is_private() {
            member.access_flags = member.access_flags.with_visibility(visibility);
            debug!(property = %property.name, "Promoted backing field visibility");
        }
    }

    fn function(&mut self, function: &mut KotlinFunction) {
        let mut default_method = function.referenced_default_method;
        if self.drop_unused(&mut default_method) {
            function.default_method = None;
        }
        function.referenced_default_method = default_method;

        let had_default_impl = function.default_impls_method.is_some();
        let mut default_impl = function.referenced_default_impls_method;
        if self.drop_unused(&mut default_impl) {
            function.default_impls_method = None;
        }
        function.referenced_default_impls_method = default_impl;

        if self.is_interface
            && had_default_impl
            && function.default_impls_method.is_none()
            && function.flags.modality != KotlinModality::Abstract
        {
            debug!(function = %function.name, "Default implementation removed, now abstract");
            function.flags.modality = KotlinModality::Abstract;
        }

        self.removed += retain(&mut function.type_parameters, |p| p.mark.is_used());
        self.ty(&mut function.return_type);
        if let Some(receiver) = &mut function.receiver_type {
            self.ty(receiver);
        }
        for parameter in function.value_parameters.iter_mut() {
            self.ty(&mut parameter.ty);
        }
    }

    fn ty(&mut self, ty: &mut KotlinType) {
        self.annotations(&mut ty.annotations);
        for argument in ty.arguments.iter_mut() {
            if let Some(inner) = &mut argument.ty {
                self.ty(inner);
            }
        }
        if let Some(outer) = &mut ty.outer_type {
            self.ty(outer);
        }
        if let Some(upper) = &mut ty.flexible_upper_bound {
            self.ty(upper);
        }
    }

    fn annotations(&mut self, annotations: &mut Vec<KotlinAnnotation>) {
        self.removed += retain(annotations, |a| a.mark.is_used());
    }
}

fn retain<T>(items: &mut Vec<T>, keep: impl Fn(&T) -> bool) -> usize {
    let before = items.len();
    items.retain(|item| keep(item));
    before - items.len()
}

/// Shrink a name list and its parallel reference list together
fn retain_paired<N, R: Copy>(
    names: &mut Vec<N>,
    references: &mut Vec<R>,
    keep: impl Fn(R) -> bool,
) -> usize {
    if names.len() != references.len() {
        // Not linked; nothing to decide from
        return 0;
    }
    let flags: Vec<bool> = references.iter().map(|r| keep(*r)).collect();
    let mut name_flags = flags.iter();
    names.retain(|_| name_flags.next().copied().unwrap_or(true));
    let mut reference_flags = flags.iter();
    references.retain(|_| reference_flags.next().copied().unwrap_or(true));
    flags.iter().filter(|keep| !**keep).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retain_paired_keeps_lists_aligned() {
        let mut names = vec!["A", "B", "C"];
        let mut references = vec![Some(1), None, Some(3)];
        let removed = retain_paired(&mut names, &mut references, |r| r != Some(3));

        assert_eq!(removed, 1);
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(references, vec![Some(1), None]);
    }

    #[test]
    fn test_retain_paired_ignores_unlinked_lists() {
        let mut names = vec!["A"];
        let mut references: Vec<Option<u32>> = Vec::new();
        assert_eq!(retain_paired(&mut names, &mut references, |_| false), 0);
        assert_eq!(names.len(), 1);
    }
}
