//! Usage marking and shrinking.
//!
//! [`ShrinkPipeline`] runs the two phases strictly in sequence: the
//! [`UsageMarker`] marks everything reachable from the keep seeds and only
//! once every mark is stable do the shrinkers remove the rest.

mod annotation_marker;
mod class_shrinker;
pub(crate) mod hierarchy;
mod inner_marker;
mod interface_marker;
mod kotlin_marker;
mod kotlin_shrinker;
mod liveness;
mod local_variable_marker;
mod module_shrinker;
mod nest_marker;
pub mod reasons;
mod record_marker;
mod usage_marker;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

pub use class_shrinker::MemberMap;
pub use reasons::{UsageNode, UsageReasons};
pub use usage_marker::UsageMarker;

use crate::keep::KeepMatcher;
use crate::model::{ClassId, ClassPath, MemberId, MemberKind};
use class_shrinker::{ClassShrinker, ShrinkView};

#[derive(Error, Debug)]
pub enum ShrinkError {
    #[error("You have to specify keep rules for the shrinking step")]
    NoKeepRules,
    #[error("The output is empty: no program classes are used")]
    EmptyOutput,
    #[error("{class} refers to removed {table} entry #{index}")]
    DanglingIndex {
        class: String,
        table: &'static str,
        index: u16,
    },
}

impl ShrinkError {
    /// Short advice shown under the error
    pub fn help(&self) -> &'static str {
        match self {
            ShrinkError::NoKeepRules => "specify --keep options or a `keep` section in the config",
            ShrinkError::EmptyOutput => {
                "check the keep rules, or pass --ignore-warnings to write an empty output"
            }
            ShrinkError::DanglingIndex { .. } => "the input snapshot is internally inconsistent",
        }
    }
}

/// Shrinking options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShrinkConfig {
    /// Mark and shrink Kotlin metadata instead of stripping it
    pub keep_kotlin_metadata: bool,

    /// Record why each entity was kept
    pub explain: bool,

    /// Resolve string constants that name classes
    pub link_class_strings: bool,

    /// Continue with a warning when nothing would be kept
    pub ignore_warnings: bool,
}

impl Default for ShrinkConfig {
    fn default() -> Self {
        Self {
            keep_kotlin_metadata: true,
            explain: false,
            link_class_strings: true,
            ignore_warnings: false,
        }
    }
}

/// Receives everything the shrinker is about to remove
pub trait UsageSink {
    /// A program class that is removed entirely
    fn unused_class(&mut self, path: &ClassPath, id: ClassId);

    /// A member removed from a class that survives
    fn unused_member(&mut self, path: &ClassPath, id: MemberId);
}

/// Why a queried class or member was kept
#[derive(Debug, Clone, Serialize)]
pub struct Explanation {
    pub target: String,
    pub kept: bool,
    /// From the keep rules down to the target
    pub chain: Vec<String>,
}

/// What the pipeline did
#[derive(Debug, Clone, Default, Serialize)]
pub struct ShrinkSummary {
    pub original_classes: usize,
    pub final_classes: usize,
    pub removed_classes: usize,
    pub removed_fields: usize,
    pub removed_methods: usize,
    pub removed_constants: usize,
    pub removed_attributes: usize,
    pub removed_metadata_nodes: usize,
    pub removed_modules: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub explanations: Vec<Explanation>,
}

/// Runs marking and shrinking over one class path
#[derive(Default)]
pub struct ShrinkPipeline<'s> {
    config: ShrinkConfig,
    sink: Option<&'s mut dyn UsageSink>,
    queries: Option<KeepMatcher>,
}

impl<'s> ShrinkPipeline<'s> {
    pub fn new(config: ShrinkConfig) -> Self {
        Self {
            config,
            sink: None,
            queries: None,
        }
    }

    pub fn with_usage_sink(mut self, sink: &'s mut dyn UsageSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Explain why the classes and members matched by `queries` are kept
    pub fn why_are_you_keeping(mut self, queries: KeepMatcher) -> Self {
        if !queries.is_empty() {
            self.queries = Some(queries);
        }
        self
    }

    /// Apply the keep rules and shrink
    pub fn run(
        &mut self,
        path: &mut ClassPath,
        keep: &KeepMatcher,
    ) -> Result<ShrinkSummary, ShrinkError> {
        if keep.is_empty() {
            return Err(ShrinkError::NoKeepRules);
        }
        let matches = keep.apply(path);
        info!(
            rules = keep.len(),
            classes = matches.classes.len(),
            members = matches.members.len(),
            "Keep rules applied"
        );
        self.run_with_seeds(path)
    }

    /// Shrink using the `DONT_SHRINK` flags already present on the model
    pub fn run_with_seeds(&mut self, path: &mut ClassPath) -> Result<ShrinkSummary, ShrinkError> {
        let mut summary = ShrinkSummary {
            original_classes: path.program_class_count(),
            ..ShrinkSummary::default()
        };

        path.reset_marks();
        let mut reasons = (self.config.explain || self.queries.is_some()).then(UsageReasons::new);
        {
            let mut marker = UsageMarker::new(path, self.config.keep_kotlin_metadata);
            if let Some(reasons) = reasons.as_mut() {
                marker = marker.with_reasons(reasons);
            }
            marker.mark();
        }

        let used = path
            .classes()
            .filter(|(_, c)| !c.is_library() && c.mark.is_used())
            .count();
        info!(
            program = summary.original_classes,
            used, "Marked used classes"
        );
        if used == 0 {
            if !self.config.ignore_warnings {
                return Err(ShrinkError::EmptyOutput);
            }
            warn!("No program classes are used; the output will be empty");
        }

        if let Some(sink) = self.sink.as_deref_mut() {
            report_unused(path, sink);
        }
        if let (Some(reasons), Some(queries)) = (&reasons, &self.queries) {
            summary.explanations = explain(path, reasons, queries);
        }

        if self.config.keep_kotlin_metadata {
            kotlin_shrinker::shrink(path, &mut summary);
            module_shrinker::shrink(path, &mut summary);
        } else {
            kotlin_shrinker::strip(path, &mut summary);
        }

        let view = ShrinkView::capture(path);
        let shrinker = ClassShrinker::new(&view);
        let mut member_maps = HashMap::new();
        let mut unused = Vec::new();
        for id in path.program_ids() {
            let Some(class) = path.get_mut(id) else {
                continue;
            };
            if !class.mark.is_used() {
                unused.push(id);
                continue;
            }
            member_maps.insert(id, shrinker.shrink(id, class, &mut summary)?);
        }
        class_shrinker::remap_member_ids(path, &member_maps);
        class_shrinker::compact_subclasses(path, &view);

        for id in unused {
            if path.remove(id).is_some() {
                summary.removed_classes += 1;
            }
        }
        summary.final_classes = path.program_class_count();

        info!(
            original = summary.original_classes,
            remaining = summary.final_classes,
            fields = summary.removed_fields,
            methods = summary.removed_methods,
            constants = summary.removed_constants,
            "Shrinking complete"
        );
        Ok(summary)
    }
}

fn report_unused(path: &ClassPath, sink: &mut dyn UsageSink) {
    for id in path.program_ids() {
        let Some(class) = path.get(id) else {
            continue;
        };
        if !class.mark.is_used() {
            sink.unused_class(path, id);
            continue;
        }
        for kind in [MemberKind::Field, MemberKind::Method] {
            for (index, member) in class.members(kind).iter().enumerate() {
                if member.mark.is_used() {
                    continue;
                }
                let member = match kind {
                    MemberKind::Field => MemberId::field(id, index),
                    MemberKind::Method => MemberId::method(id, index),
                };
                sink.unused_member(path, member);
            }
        }
    }
}

fn explain(path: &ClassPath, reasons: &UsageReasons, queries: &KeepMatcher) -> Vec<Explanation> {
    let matches = queries.matches(path);
    let targets = matches
        .classes
        .iter()
        .map(|id| UsageNode::Class(*id))
        .chain(matches.members.iter().map(|id| UsageNode::Member(*id)));

    targets
        .map(|target| {
            let chain = reasons.explain(target).unwrap_or_default();
            Explanation {
                target: target.describe(path),
                kept: !chain.is_empty(),
                chain: chain.iter().map(|node| node.describe(path)).collect(),
            }
        })
        .collect()
}
