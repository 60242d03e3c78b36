//! Keep rules: the entry points shrinking starts from.
//!
//! Rules use ProGuard-style wildcards over class and member names:
//!
//! - `?` matches one character other than a package separator
//! - `*` matches any part of a name, not crossing package separators
//! - `**` matches anything, including separators
//!
//! Class patterns may be written with dots or slashes. On the command line
//! a rule is `class[#member]`, where the member is a name optionally
//! followed by a descriptor: `com.example.Main#main([Ljava/lang/String;)V`.

use std::str::FromStr;

use rayon::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::model::descriptor;
use crate::model::{Class, ClassId, ClassPath, MemberId, MemberKind, ProcessingFlags};
use crate::shrink::hierarchy;

#[derive(Error, Debug)]
pub enum KeepError {
    #[error("Invalid keep pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("Empty keep rule")]
    Empty,
}

fn default_true() -> bool {
    true
}

/// One keep rule as written in configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeepRule {
    /// Class name pattern
    pub class: String,
    /// Only classes extending or implementing a class matching this pattern
    #[serde(default)]
    pub extends: Option<String>,
    #[serde(default)]
    pub members: Vec<MemberPattern>,
    /// Keep the class itself, not just the matching members of used classes
    #[serde(default = "default_true")]
    pub keep_class: bool,
    /// The rule only names entry points; it does not prevent shrinking
    #[serde(default)]
    pub allow_shrinking: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberPattern {
    #[serde(default)]
    pub kind: Option<MemberKind>,
    pub name: String,
    #[serde(default)]
    pub descriptor: Option<String>,
}

impl KeepRule {
    pub fn class(pattern: impl Into<String>) -> Self {
        Self {
            class: pattern.into(),
            extends: None,
            members: Vec::new(),
            keep_class: true,
            allow_shrinking: false,
        }
    }

    pub fn with_member(mut self, member: MemberPattern) -> Self {
        self.members.push(member);
        self
    }
}

impl FromStr for KeepRule {
    type Err = KeepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(KeepError::Empty);
        }
        let (class, member) = match s.split_once('#') {
            Some((class, member)) => (class, Some(member)),
            None => (s, None),
        };
        let mut rule = KeepRule::class(class);
        if let Some(member) = member {
            rule.members.push(member.parse()?);
        }
        Ok(rule)
    }
}

impl FromStr for MemberPattern {
    type Err = KeepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(KeepError::Empty);
        }
        let pattern = match s.find(['(', ':']) {
            Some(split) if s[split..].starts_with('(') => MemberPattern {
                kind: Some(MemberKind::Method),
                name: s[..split].to_string(),
                descriptor: Some(s[split..].to_string()),
            },
            Some(split) => MemberPattern {
                kind: Some(MemberKind::Field),
                name: s[..split].to_string(),
                descriptor: Some(s[split + 1..].to_string()),
            },
            None => MemberPattern {
                kind: None,
                name: s.to_string(),
                descriptor: None,
            },
        };
        Ok(pattern)
    }
}

/// Convert a wildcard pattern to an anchored regex
fn wildcard_regex(pattern: &str) -> Result<Regex, KeepError> {
    let mut regex = String::from("^");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                regex.push_str(".*");
            }
            '*' => regex.push_str("[^/]*"),
            '?' => regex.push_str("[^/]"),
            c => regex.push_str(&regex::escape(&c.to_string())),
        }
    }
    regex.push('$');
    Regex::new(&regex).map_err(|source| KeepError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

#[derive(Debug)]
struct CompiledMember {
    kind: Option<MemberKind>,
    name: Regex,
    descriptor: Option<Regex>,
}

#[derive(Debug)]
struct CompiledRule {
    class: Regex,
    extends: Option<Regex>,
    members: Vec<CompiledMember>,
    keep_class: bool,
}

/// Classes and members matched by a set of rules
#[derive(Debug, Default)]
pub struct KeepMatches {
    pub classes: Vec<ClassId>,
    pub members: Vec<MemberId>,
}

/// Compiled keep rules
#[derive(Debug, Default)]
pub struct KeepMatcher {
    rules: Vec<CompiledRule>,
}

impl KeepMatcher {
    pub fn new(rules: &[KeepRule]) -> Result<Self, KeepError> {
        let rules = rules
            .iter()
            .filter(|rule| !rule.allow_shrinking)
            .map(|rule| {
                Ok(CompiledRule {
                    class: wildcard_regex(&descriptor::to_internal(&rule.class))?,
                    extends: rule
                        .extends
                        .as_deref()
                        .map(|e| wildcard_regex(&descriptor::to_internal(e)))
                        .transpose()?,
                    members: rule
                        .members
                        .iter()
                        .map(|member| {
                            Ok(CompiledMember {
                                kind: member.kind,
                                name: wildcard_regex(&member.name)?,
                                descriptor: member
                                    .descriptor
                                    .as_deref()
                                    .map(|d| wildcard_regex(&descriptor::to_internal(d)))
                                    .transpose()?,
                            })
                        })
                        .collect::<Result<Vec<_>, KeepError>>()?,
                    keep_class: rule.keep_class,
                })
            })
            .collect::<Result<Vec<_>, KeepError>>()?;
        Ok(Self { rules })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Find every program class and member the rules select
    pub fn matches(&self, path: &ClassPath) -> KeepMatches {
        let ids = path.program_ids();
        let per_class: Vec<(Option<ClassId>, Vec<MemberId>)> = ids
            .par_iter()
            .filter_map(|id| {
                let class = path.get(*id)?;
                let mut keep_class = false;
                let mut members = Vec::new();
                for rule in &self.rules {
                    if !rule.matches_class(path, class) {
                        continue;
                    }
                    keep_class |= rule.keep_class;
                    members.extend(rule.matching_members(*id, class));
                }
                (keep_class || !members.is_empty()).then(|| (keep_class.then_some(*id), members))
            })
            .collect();

        let mut matches = KeepMatches::default();
        for (class, mut members) in per_class {
            matches.classes.extend(class);
            members.sort_by_key(|m| (m.kind == MemberKind::Method, m.index));
            members.dedup();
            matches.members.extend(members);
        }
        matches
    }

    /// Flag the matched entities so the marker treats them as seeds
    pub fn apply(&self, path: &mut ClassPath) -> KeepMatches {
        let matches = self.matches(path);
        for id in &matches.classes {
            if let Some(class) = path.get_mut(*id) {
                class.processing_flags |= ProcessingFlags::DONT_SHRINK;
            }
        }
        for id in &matches.members {
            if let Some(member) = path.member_mut(*id) {
                member.processing_flags |= ProcessingFlags::DONT_SHRINK;
            }
        }
        debug!(
            classes = matches.classes.len(),
            members = matches.members.len(),
            "Applied keep rules"
        );
        matches
    }
}

impl CompiledRule {
    fn matches_class(&self, path: &ClassPath, class: &Class) -> bool {
        if !self.class.is_match(class.name()) {
            return false;
        }
        let Some(extends) = &self.extends else {
            return true;
        };
        let Some(id) = path.find(class.name()) else {
            return false;
        };
        hierarchy::superclasses(path, id)
            .into_iter()
            .chain(hierarchy::all_interfaces(path, id))
            .filter_map(|ancestor| path.get(ancestor))
            .any(|ancestor| extends.is_match(ancestor.name()))
            // Unresolved supertypes are still matched by name
            || class
                .super_name()
                .into_iter()
                .chain(class.interface_names())
                .any(|name| extends.is_match(name))
    }

    fn matching_members(&self, id: ClassId, class: &Class) -> Vec<MemberId> {
        let mut result = Vec::new();
        for kind in [MemberKind::Field, MemberKind::Method] {
            for (index, member) in class.members(kind).iter().enumerate() {
                let name = member.name(&class.constant_pool);
                let descriptor = member.descriptor(&class.constant_pool);
                let selected = self.members.iter().any(|pattern| {
                    pattern.kind.map_or(true, |k| k == kind)
                        && pattern.name.is_match(name)
                        && pattern
                            .descriptor
                            .as_ref()
                            .map_or(true, |d| d.is_match(descriptor))
                });
                if selected {
                    result.push(match kind {
                        MemberKind::Field => MemberId::field(id, index),
                        MemberKind::Method => MemberId::method(id, index),
                    });
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AccessFlags, ClassBuilder, Linker};

    fn sample_path() -> ClassPath {
        let mut path = ClassPath::new();
        let mut main = ClassBuilder::new("com/example/Main", AccessFlags::PUBLIC);
        main.add_method(
            AccessFlags::PUBLIC | AccessFlags::STATIC,
            "main",
            "([Ljava/lang/String;)V",
            Vec::new(),
        );
        main.add_method(AccessFlags::PRIVATE, "helper", "()V", Vec::new());
        path.add(main.build());
        path.add(
            ClassBuilder::new("com/example/ui/Screen", AccessFlags::PUBLIC)
                .super_class("com/example/Base")
                .build(),
        );
        path.add(ClassBuilder::new("com/example/Base", AccessFlags::PUBLIC).build());
        Linker::default().link(&mut path);
        path
    }

    #[test]
    fn test_wildcards() {
        let single = wildcard_regex("com/example/*").expect("valid");
        assert!(single.is_match("com/example/Main"));
        assert!(!single.is_match("com/example/ui/Screen"));

        let deep = wildcard_regex("com/example/**").expect("valid");
        assert!(deep.is_match("com/example/ui/Screen"));

        let one = wildcard_regex("com/example/Mai?").expect("valid");
        assert!(one.is_match("com/example/Main"));
    }

    #[test]
    fn test_parse_rule() {
        let rule: KeepRule = "com.example.Main#main([Ljava/lang/String;)V"
            .parse()
            .expect("valid rule");
        assert_eq!(rule.class, "com.example.Main");
        assert_eq!(rule.members[0].kind, Some(MemberKind::Method));
        assert_eq!(rule.members[0].name, "main");

        let field: MemberPattern = "count:I".parse().expect("valid member");
        assert_eq!(field.kind, Some(MemberKind::Field));
        assert_eq!(field.descriptor.as_deref(), Some("I"));

        assert!("".parse::<KeepRule>().is_err());
    }

    #[test]
    fn test_apply_sets_flags() {
        let mut path = sample_path();
        let rules = vec!["com.example.Main#main".parse().expect("valid rule")];
        let matcher = KeepMatcher::new(&rules).expect("compiles");
        let matches = matcher.apply(&mut path);

        assert_eq!(matches.classes.len(), 1);
        assert_eq!(matches.members.len(), 1);
        let main = path.by_name("com/example/Main").expect("present");
        assert!(main.is_kept());
        assert!(main.methods[0].is_kept());
        assert!(!main.methods[1].is_kept());
    }

    #[test]
    fn test_extends_filter() {
        let path = sample_path();
        let mut rule = KeepRule::class("com.example.**");
        rule.extends = Some("com.example.Base".to_string());
        let matcher = KeepMatcher::new(&[rule]).expect("compiles");
        let matches = matcher.matches(&path);

        assert_eq!(matches.classes.len(), 1);
        let id = matches.classes[0];
        assert_eq!(path.class_display(id), "com.example.ui.Screen");
    }

    #[test]
    fn test_allow_shrinking_rules_select_nothing() {
        let mut rule = KeepRule::class("**");
        rule.allow_shrinking = true;
        let matcher = KeepMatcher::new(&[rule]).expect("compiles");
        assert!(matcher.is_empty());
    }
}
