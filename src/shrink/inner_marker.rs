//! Keeps InnerClasses entries whose inner and outer classes both survive.

use super::liveness::Liveness;
use super::usage_marker::{Edges, UsageMarker};
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
    let Class {
        constant_pool,
        attributes,
        ..
    } = class;

    for attribute in attributes.iter_mut() {
        let AttributeInfo::InnerClasses { classes } = &mut attribute.info else {
            continue;
        };
        let mut any = false;
        for entry in classes.iter_mut() {
            if !live.class_constant(constant_pool, entry.inner_class_index)
                || !live.class_constant(constant_pool, entry.outer_class_index)
            {
                continue;
            }
            entry.mark = UsageMark::Used;
            any = true;
            for index in [
                entry.inner_class_index,
                entry.outer_class_index,
                entry.inner_name_index,
            ] {
                if index != 0 {
                    edges.constants.push(index);
                }
            }
        }
        if any {
            attribute.mark = UsageMark::Used;
            edges.constants.push(attribute.name_index);
        }
    }
    edges
}
