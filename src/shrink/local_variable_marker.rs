//! Local variable tables keep entries whose types all survive.

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
    for method in class.methods.iter_mut().filter(|m| m.mark.is_used()) {
        for code in method.attributes.iter_mut().filter_map(|a| a.code_mut()) {
            for attribute in code.attributes.iter_mut() {
                let used = match &mut attribute.info {
                    AttributeInfo::LocalVariableTable { variables } => {
                        let mut any = false;
                        for variable in variables.iter_mut() {
                            if live.all_classes(&variable.referenced_classes) {
                                variable.mark = UsageMark::Used;
                                edges.constants.push(variable.name_index);
                                edges.constants.push(variable.descriptor_index);
                                any = true;
                            }
                        }
                        any
                    }
                    AttributeInfo::LocalVariableTypeTable { variables } => {
                        let mut any = false;
                        for variable in variables.iter_mut() {
                            if live.all_classes(&variable.referenced_classes) {
                                variable.mark = UsageMark::Used;
                                edges.constants.push(variable.name_index);
                                edges.constants.push(variable.signature_index);
                                any = true;
                            }
                        }
                        any
                    }
                    _ => false,
                };
                if used {
                    attribute.mark = UsageMark::Used;
                    edges.constants.push(attribute.name_index);
                }
            }
        }
    }
    edges
}
