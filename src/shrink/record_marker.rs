//! Record components survive with their backing field.

use super::liveness::Liveness;
use super::usage_marker::{mark_primary, Edges, UsageMarker};
use crate::model::{AttributeInfo, Class, UsageMark};

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
    for attribute in class.attributes.iter_mut() {
        let AttributeInfo::Record { components } = &mut attribute.info else {
            continue;
        };
        // A record without components still needs its Record attribute
        let mut used = components.is_empty();
        for component in components.iter_mut() {
            if !live.member_ref(component.referenced_field) {
                continue;
            }
            component.mark = UsageMark::Used;
            used = true;
            edges.constants.push(component.name_index);
            edges.constants.push(component.descriptor_index);
            for nested in component.attributes.iter_mut() {
                mark_primary(nested, &mut edges);
            }
        }
        if used {
            attribute.mark = UsageMark::Used;
            edges.constants.push(attribute.name_index);
        }
    }
    edges
}
