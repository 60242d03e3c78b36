//! `.kotlin_module` tables keep only the facades and parts that survive.

use tracing::debug;

use super::ShrinkSummary;
use crate::model::{ClassId, ClassPath, KotlinModule};

pub(crate) fn shrink(path: &mut ClassPath, summary: &mut ShrinkSummary) {
    let mut modules = std::mem::take(&mut path.kotlin_modules);
    let before = modules.len();
    modules.retain(|module| module.mark.is_used());

    for module in modules.iter_mut() {
        shrink_module(path, module);
    }
    // A package that lost every entry says nothing any more
    for module in modules.iter_mut() {
        module
            .packages
            .retain(|p| !p.file_facades.is_empty() || !p.multi_file_parts.is_empty());
    }

    summary.removed_modules += before - modules.len();
    if before != modules.len() {
        debug!(removed = before - modules.len(), "Removed Kotlin modules");
    }
    path.kotlin_modules = modules;
}

fn shrink_module(path: &ClassPath, module: &mut KotlinModule) {
    let used = |reference: &Option<ClassId>| reference.map_or(true, |id| path.is_class_used(id));

    for package in module.packages.iter_mut() {
        if package.referenced_file_facades.len() == package.file_facades.len() {
            let keep: Vec<bool> = package.referenced_file_facades.iter().map(used).collect();
            let mut flags = keep.iter();
            package
                .file_facades
                .retain(|_| flags.next().copied().unwrap_or(true));
            package.referenced_file_facades.retain(|r| used(r));
        }
        if package.referenced_multi_file_parts.len() == package.multi_file_parts.len() {
            let keep: Vec<bool> = package
                .referenced_multi_file_parts
                .iter()
                .map(used)
                .collect();
            let mut flags = keep.iter();
            package
                .multi_file_parts
                .retain(|_| flags.next().copied().unwrap_or(true));
            package.referenced_multi_file_parts.retain(|r| used(r));
        }
    }
}
