//! Annotations survive when their type survives; element values survive
//! when the element method and every class they mention survive.

use super::liveness::Liveness;
use super::usage_marker::{Edges, UsageMarker};
use crate::model::{Annotation, Attribute, AttributeInfo, Class, ElementValue, ElementValueKind, UsageMark};

pub(crate) fn mark(marker: &mut UsageMarker) {
    let live = Liveness::capture(marker.path());
    for id in live.used_program_classes() {
        let edges = match marker.path_mut().get_mut(*id) {
            Some(class) => mark_class(class, &live),
            None => continue,
        };
        marker.apply_edges(*id, edges);
    }
}

fn mark_class(class: &mut Class, live: &Liveness) -> Edges {
    let mut edges = Edges::default();
    mark_attributes(&mut class.attributes, live, &mut edges);
    for member in class
        .fields
        .iter_mut()
        .chain(class.methods.iter_mut())
        .filter(|m| m.mark.is_used())
    {
        mark_attributes(&mut member.attributes, live, &mut edges);
    }
    edges
}

fn mark_attributes(attributes: &mut [Attribute], live: &Liveness, edges: &mut Edges) {
    for attribute in attributes {
        let used = match &mut attribute.info {
            AttributeInfo::Annotations { annotations, .. } => {
                let mut any = false;
                for annotation in annotations.iter_mut() {
                    any |= mark_annotation(annotation, live, edges);
                }
                any
            }
            AttributeInfo::ParameterAnnotations { parameters, .. } => {
                let mut any = false;
                for annotation in parameters.iter_mut().flatten() {
                    any |= mark_annotation(annotation, live, edges);
                }
                any
            }
            AttributeInfo::TypeAnnotations { annotations, .. } => {
                let mut any = false;
                for annotation in annotations.iter_mut() {
                    if mark_annotation(&mut annotation.annotation, live, edges) {
                        annotation.mark = UsageMark::Used;
                        any = true;
                    }
                }
                any
            }
            AttributeInfo::AnnotationDefault { default_value } => {
                mark_element_value(default_value, live, edges)
            }
            AttributeInfo::Code(code) if attribute.mark.is_used() => {
                mark_attributes(&mut code.attributes, live, edges);
                false
            }
            AttributeInfo::Record { components } if attribute.mark.is_used() => {
                for component in components.iter_mut().filter(|c| c.mark.is_used()) {
                    mark_attributes(&mut component.attributes, live, edges);
                }
                false
            }
            _ => false,
        };
        if used {
            attribute.mark = UsageMark::Used;
            edges.constants.push(attribute.name_index);
        }
    }
}

fn mark_annotation(annotation: &mut Annotation, live: &Liveness, edges: &mut Edges) -> bool {
    if !live.all_classes(&annotation.referenced_classes) {
        return false;
    }
    annotation.mark = UsageMark::Used;
    edges.constants.push(annotation.type_index);
    for element in annotation.elements.iter_mut() {
        mark_element_value(element, live, edges);
    }
    true
}

fn mark_element_value(element: &mut ElementValue, live: &Liveness, edges: &mut Edges) -> bool {
    if !live.member_ref(element.referenced_method) {
        return false;
    }
    let used = match &mut element.value {
        ElementValueKind::Constant {
            const_value_index, ..
        } => {
            edges.constants.push(*const_value_index);
            true
        }
        ElementValueKind::EnumConstant {
            type_name_index,
            const_name_index,
            referenced_classes,
            referenced_field,
        } => {
            let used = live.all_classes(referenced_classes);
            if used {
                edges.constants.push(*type_name_index);
                edges.constants.push(*const_name_index);
                edges.members.extend(*referenced_field);
            }
            used
        }
        ElementValueKind::Class {
            class_info_index,
            referenced_classes,
        } => {
            let used = live.all_classes(referenced_classes);
            if used {
                edges.constants.push(*class_info_index);
            }
            used
        }
        ElementValueKind::Annotation { annotation } => mark_annotation(annotation, live, edges),
        ElementValueKind::Array { values } => {
            for value in values.iter_mut() {
                mark_element_value(value, live, edges);
            }
            true
        }
    };
    if used {
        element.mark = UsageMark::Used;
        if element.element_name_index != 0 {
            edges.constants.push(element.element_name_index);
        }
    }
    used
}
