//! Second stage of the interface protocol.
//!
//! A class body only marks the interfaces it implements as possibly used.
//! Once the implementing class is confirmed used, the interface is promoted
//! to used and its possibly used members follow. Interfaces only ever
//! reached through classes that stay unused are never promoted.

use std::collections::HashSet;

use super::reasons::UsageNode;
use super::usage_marker::UsageMarker;
use crate::model::{ClassId, UsageMark};

/// Run one promotion round. Returns true when any interface was promoted.
pub(crate) fn mark_round(marker: &mut UsageMarker) -> bool {
    let promotions = {
        let path = marker.path();
        let mut seen = HashSet::new();
        let mut promotions = Vec::new();
        for (id, class) in path.classes() {
            if class.is_library() || !class.mark.is_used() {
                continue;
            }
            for interface in &class.interface_ids {
                let possibly_used = path
                    .get(*interface)
                    .is_some_and(|c| c.mark == UsageMark::PossiblyUsed);
                if possibly_used && seen.insert(*interface) {
                    promotions.push((*interface, id));
                }
            }
        }
        promotions
    };

    let promoted = !promotions.is_empty();
    for (interface, implementor) in promotions {
        marker.set_cause(Some(UsageNode::Class(implementor)));
        marker.mark_class(interface);
    }
    marker.set_cause(None);

    mark_implements_entries(marker);
    promoted
}

/// Mark the implements entries of used classes whose interface is used
fn mark_implements_entries(marker: &mut UsageMarker) {
    let mut entries: Vec<(ClassId, u16)> = Vec::new();
    let path = marker.path();
    for (id, class) in path.classes() {
        if class.is_library() || !class.mark.is_used() {
            continue;
        }
        for index in &class.interfaces {
            let target = class.constant_pool.class_reference(*index);
            if target.map_or(true, |target| path.is_class_used(target)) {
                entries.push((id, *index));
            }
        }
    }
    for (class, index) in entries {
        marker.mark_constant(class, index);
    }
}
