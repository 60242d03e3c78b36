//! Marks Kotlin metadata declarations from the usage of the JVM members
//! that implement them.
//!
//! A declaration is used when its implementing member is used. Used
//! declarations in turn mark the classes their types mention, so metadata
//! marking can add structural work; it therefore runs inside the marker's
//! fixpoint loop.

use tracing::trace;

use super::reasons::UsageNode;
use super::usage_marker::UsageMarker;
use crate::model::kotlin::{
    KotlinAnnotation, KotlinDeclarationContainer, KotlinFunction, KotlinMetadata,
    KotlinMetadataKind, KotlinProperty, KotlinType, KotlinTypeAlias, KotlinTypeParameter,
    KotlinValueParameter,
};
use crate::model::{ClassId, MemberId, UsageMark};

/// One pass over all metadata. Returns true when anything new was marked.
pub(crate) fn mark_round(marker: &mut UsageMarker) -> bool {
    let owners: Vec<ClassId> = marker
        .path()
        .classes()
        .filter(|(_, c)| !c.is_library() && c.kotlin_metadata.is_some())
        .filter(|(_, c)| c.mark.is_used() || c.is_kept())
        .map(|(id, _)| id)
        .collect();

    let mut changed = false;
    for owner in owners {
        let Some(mut metadata) = marker
            .path_mut()
            .get_mut(owner)
            .and_then(|c| c.kotlin_metadata.take())
        else {
            continue;
        };
        marker.set_cause(Some(UsageNode::KotlinMetadata(owner)));
        let mut pass = MetadataMarker {
            marker: &mut *marker,
            owner,
            changed: false,
        };
        pass.mark(&mut metadata);
        changed |= pass.changed;
        marker.set_cause(None);

        if let Some(class) = marker.path_mut().get_mut(owner) {
            class.kotlin_metadata = Some(metadata);
        }
    }
    changed
}

/// Modules survive while any package still names a used facade or part
pub(crate) fn mark_modules(marker: &mut UsageMarker) {
    let decisions: Vec<bool> = marker
        .path()
        .kotlin_modules
        .iter()
        .map(|module| {
            module.packages.iter().any(|package| {
                package
                    .referenced_file_facades
                    .iter()
                    .chain(package.referenced_multi_file_parts.iter())
                    .flatten()
                    .any(|id| marker.is_class_used(*id))
            })
        })
        .collect();
    for (module, used) in marker
        .path_mut()
        .kotlin_modules
        .iter_mut()
        .zip(decisions)
    {
        if used {
            module.mark = UsageMark::Used;
        }
    }
}

struct MetadataMarker<'m, 'a> {
    marker: &'m mut UsageMarker<'a>,
    owner: ClassId,
    changed: bool,
}

impl MetadataMarker<'_, '_> {
    fn mark(&mut self, metadata: &mut KotlinMetadata) {
        self.set(&mut metadata.mark);
        match &mut metadata.kind {
            KotlinMetadataKind::Class(class) => {
                let default_impls = class.referenced_default_impls_class;
                self.container(&mut class.container, default_impls);
                for constructor in class.constructors.iter_mut() {
                    let used = match constructor.referenced_method {
                        Some(method) => self.marker.is_member_used(method),
                        // Annotation classes have constructors without JVM methods
                        None => true,
                    };
                    if used && self.set(&mut constructor.mark) {
                        for parameter in constructor.value_parameters.iter_mut() {
                            self.value_parameter(parameter);
                        }
                    }
                }
                for parameter in class.type_parameters.iter_mut() {
                    self.type_parameter(parameter);
                }
                for super_type in class.super_types.iter_mut() {
                    let survives = super_type
                        .referenced_class
                        .map_or(true, |id| self.marker.is_class_used(id));
                    if survives {
                        self.ty(super_type);
                    }
                }
            }
            KotlinMetadataKind::FileFacade { container }
            | KotlinMetadataKind::MultiFilePart { container, .. } => {
                self.container(container, None);
            }
            KotlinMetadataKind::SyntheticClass { functions, .. } => {
                for function in functions.iter_mut() {
                    self.function(function, None);
                }
            }
            KotlinMetadataKind::MultiFileFacade { .. } => {}
        }
    }

    /// Set a mark to used; true when it was not used before
    fn set(&mut self, mark: &mut UsageMark) -> bool {
        if mark.is_used() {
            return false;
        }
        *mark = UsageMark::Used;
        self.changed = true;
        true
    }

    fn member_used(&self, id: Option<MemberId>) -> bool {
        id.is_some_and(|id| self.marker.is_member_used(id))
    }

    fn container(&mut self, container: &mut KotlinDeclarationContainer, default_impls: Option<ClassId>) {
        for property in container.properties.iter_mut() {
            let used = self.member_used(property.referenced_backing_field)
                || self.member_used(property.referenced_getter)
                || self.member_used(property.referenced_setter);
            if used {
                self.property(property);
            }
        }
        for property in container.local_delegated_properties.iter_mut() {
            self.property(property);
        }
        for function in container.functions.iter_mut() {
            self.function(function, default_impls);
        }
        for alias in container.type_aliases.iter_mut() {
            let referenced = self
                .marker
                .kotlin_alias_uses
                .contains(&(self.owner, alias.name.clone()));
            let expands_to_used = alias
                .expanded_type
                .referenced_class
                .is_some_and(|id| self.marker.is_class_used(id));
            if referenced || expands_to_used {
                self.type_alias(alias);
            }
        }
    }

    fn property(&mut self, property: &mut KotlinProperty) {
        if !self.set(&mut property.mark) {
            return;
        }
        trace!(property = %property.name, "Marked Kotlin property");
        self.ty(&mut property.ty);
        if let Some(receiver) = &mut property.receiver_type {
            self.ty(receiver);
        }
        for parameter in property.type_parameters.iter_mut() {
            self.type_parameter(parameter);
        }
        for parameter in property.setter_parameters.iter_mut() {
            self.value_parameter(parameter);
        }
        if let Some(method) = property.referenced_annotations_method {
            self.marker.mark_member(method);
        }
    }

    fn function(&mut self, function: &mut KotlinFunction, default_impls: Option<ClassId>) {
        let method_used = self.member_used(function.referenced_method);
        let impl_used = self.member_used(function.referenced_default_impls_method);

        // The DefaultImpls body and the interface method stand or fall together
        if impl_used && !method_used {
            if let Some(method) = function.referenced_method {
                self.marker.mark_class(self.owner);
                self.marker.mark_member(method);
                self.changed |= self.marker.is_member_used(method);
            }
        }
        let method_kept = function
            .referenced_method
            .and_then(|id| self.marker.path().member(id))
            .is_some_and(|m| m.is_kept());
        if method_kept && !impl_used {
            if let (Some(class), Some(body)) = (default_impls, function.referenced_default_impls_method) {
                self.marker.mark_class(class);
                self.marker.mark_member(body);
                self.changed |= self.marker.is_member_used(body);
            }
        }

        let used = self.member_used(function.referenced_method)
            || self.member_used(function.referenced_default_impls_method)
            || self.member_used(function.referenced_default_method);
        if !used || !self.set(&mut function.mark) {
            return;
        }
        trace!(function = %function.name, "Marked Kotlin function");
        if let Some(receiver) = &mut function.receiver_type {
            self.ty(receiver);
        }
        self.ty(&mut function.return_type);
        for parameter in function.type_parameters.iter_mut() {
            self.type_parameter(parameter);
        }
        for parameter in function.value_parameters.iter_mut() {
            self.value_parameter(parameter);
        }
    }

    fn type_alias(&mut self, alias: &mut KotlinTypeAlias) {
        if !self.set(&mut alias.mark) {
            return;
        }
        self.ty(&mut alias.underlying_type);
        self.ty(&mut alias.expanded_type);
        for parameter in alias.type_parameters.iter_mut() {
            self.type_parameter(parameter);
        }
        self.annotations(&mut alias.annotations);
    }

    fn type_parameter(&mut self, parameter: &mut KotlinTypeParameter) {
        if !self.set(&mut parameter.mark) {
            return;
        }
        for bound in parameter.upper_bounds.iter_mut() {
            self.ty(bound);
        }
        self.annotations(&mut parameter.annotations);
    }

    fn value_parameter(&mut self, parameter: &mut KotlinValueParameter) {
        if !self.set(&mut parameter.mark) {
            return;
        }
        self.ty(&mut parameter.ty);
        if let Some(vararg) = &mut parameter.vararg_element_type {
            self.ty(vararg);
        }
    }

    /// Types keep the classes they mention
    fn ty(&mut self, ty: &mut KotlinType) {
        if !self.set(&mut ty.mark) {
            return;
        }
        if let Some(class) = ty.referenced_class {
            self.marker.mark_class(class);
        }
        if let (Some(container), Some(name)) = (ty.referenced_alias_container, &ty.type_alias_name) {
            let alias = crate::model::descriptor::simple_name(name).to_string();
            if self.marker.kotlin_alias_uses.insert((container, alias)) {
                self.changed = true;
            }
        }
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
        self.annotations(&mut ty.annotations);
    }

    fn annotations(&mut self, annotations: &mut [KotlinAnnotation]) {
        for annotation in annotations.iter_mut() {
            let survives = annotation
                .referenced_class
                .map_or(true, |id| self.marker.is_class_used(id));
            if survives {
                self.set(&mut annotation.mark);
            }
        }
    }
}
