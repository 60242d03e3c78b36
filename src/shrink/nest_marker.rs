//! Nest and sealed-hierarchy attributes: NestHost, NestMembers and
//! PermittedSubclasses keep only the classes that survive.

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
        let used = match &attribute.info {
            AttributeInfo::NestHost { host_class_index } => {
                let used = live.class_constant(constant_pool, *host_class_index);
                if used {
                    edges.constants.push(*host_class_index);
                }
                used
            }
            AttributeInfo::NestMembers { classes }
            | AttributeInfo::PermittedSubclasses { classes } => {
                let survivors: Vec<u16> = classes
                    .iter()
                    .copied()
                    .filter(|index| live.class_constant(constant_pool, *index))
                    .collect();
                let used = !survivors.is_empty();
                edges.constants.extend(survivors);
                used
            }
            _ => false,
        };
        if used {
            attribute.mark = UsageMark::Used;
            edges.constants.push(attribute.name_index);
        }
    }
    edges
}
