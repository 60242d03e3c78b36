// usage.txt writer and parser
//
// The file lists everything the shrinker removed:
// ```
// com.example.UnusedClass
// com.example.PartiallyUsedClass
//     private int unusedField
//     public void unusedMethod(java.lang.String)
//     PartiallyUsedClass(int)
// ```
// A class line without member lines means the whole class was removed.

use miette::{IntoDiagnostic, Result, WrapErr};
use std::collections::HashSet;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::model::descriptor;
use crate::model::{ClassId, ClassPath, MemberId, MemberKind};
use crate::shrink::UsageSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageEntryKind {
    Class,
    Field,
    Method,
    Constructor,
}

/// One removed class or member
#[derive(Debug, Clone, PartialEq)]
pub struct UsageEntry {
    /// External class name, e.g. `com.example.Foo`
    pub class_name: String,
    /// None when the entire class was removed
    pub member_name: Option<String>,
    pub kind: UsageEntryKind,
    /// The member line as printed, modifiers included
    pub signature: Option<String>,
}

/// Removed classes and members, in the order they were reported
#[derive(Debug, Clone, Default)]
pub struct UsageReport {
    entries: Vec<UsageEntry>,
    dead_classes: HashSet<String>,
}

impl UsageReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("Failed to read usage file: {}", path.display()))?;
        Ok(Self::parse_content(&content))
    }

    pub fn parse_content(content: &str) -> Self {
        let mut report = UsageReport::default();
        let mut current: Option<String> = None;
        let mut has_members = false;

        for line in content.lines() {
            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }
            if line.starts_with(' ') || line.starts_with('\t') {
                if let Some(class_name) = &current {
                    report.push(parse_member_line(class_name, line.trim()));
                    has_members = true;
                }
                continue;
            }
            if let Some(class_name) = current.take() {
                if !has_members {
                    report.push(UsageEntry::class(class_name));
                }
            }
            current = Some(line.to_string());
            has_members = false;
        }
        if let Some(class_name) = current {
            if !has_members {
                report.push(UsageEntry::class(class_name));
            }
        }
        report
    }

    fn push(&mut self, entry: UsageEntry) {
        if entry.kind == UsageEntryKind::Class {
            self.dead_classes.insert(entry.class_name.clone());
        }
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[UsageEntry] {
        &self.entries
    }

    pub fn is_class_removed(&self, class_name: &str) -> bool {
        self.dead_classes.contains(class_name)
    }

    pub fn is_member_removed(&self, class_name: &str, member_name: &str) -> bool {
        self.entries.iter().any(|e| {
            e.class_name == class_name && e.member_name.as_deref() == Some(member_name)
        })
    }

    /// Render in usage.txt format
    pub fn render(&self) -> String {
        let mut out = String::new();
        let mut current: Option<&str> = None;
        for entry in &self.entries {
            if current != Some(entry.class_name.as_str()) {
                let _ = writeln!(out, "{}", entry.class_name);
                current = Some(&entry.class_name);
            }
            if let Some(signature) = &entry.signature {
                let _ = writeln!(out, "    {}", signature);
            }
        }
        out
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        fs::write(path, self.render())
            .into_diagnostic()
            .wrap_err_with(|| format!("Failed to write usage file: {}", path.display()))
    }
}

impl UsageEntry {
    fn class(class_name: String) -> Self {
        Self {
            class_name,
            member_name: None,
            kind: UsageEntryKind::Class,
            signature: None,
        }
    }
}

/// `type name` for fields, `returnType name(params)` for methods and
/// `SimpleName(params)` for constructors, each after optional modifiers
fn parse_member_line(class_name: &str, line: &str) -> UsageEntry {
    let simple = class_name.rsplit('.').next().unwrap_or(class_name);
    let (kind, name) = match line.split_once('(') {
        Some((head, _)) => {
            let name = head.split_whitespace().last().unwrap_or(head).to_string();
            if name == simple || name == descriptor::INSTANCE_INITIALIZER {
                (UsageEntryKind::Constructor, name)
            } else {
                (UsageEntryKind::Method, name)
            }
        }
        None => {
            let name = line.split_whitespace().last().unwrap_or(line).to_string();
            (UsageEntryKind::Field, name)
        }
    };
    UsageEntry {
        class_name: class_name.to_string(),
        member_name: Some(name),
        kind,
        signature: Some(line.to_string()),
    }
}

impl UsageSink for UsageReport {
    fn unused_class(&mut self, path: &ClassPath, id: ClassId) {
        self.push(UsageEntry::class(path.class_display(id)));
    }

    fn unused_member(&mut self, path: &ClassPath, id: MemberId) {
        let Some(class) = path.get(id.class) else {
            return;
        };
        let Some(member) = class.member(id.kind, id.index) else {
            return;
        };
        let name = member.name(&class.constant_pool);
        let member_descriptor = member.descriptor(&class.constant_pool);
        let is_method = id.kind == MemberKind::Method;

        let declaration = if is_method {
            descriptor::external_method(class.name(), name, member_descriptor)
        } else {
            format!("{} {}", descriptor::external_type(member_descriptor), name)
        };
        let mut parts: Vec<&str> = member.access_flags.modifiers(is_method);
        parts.push(&declaration);

        let kind = match (is_method, descriptor::is_initializer(name)) {
            (false, _) => UsageEntryKind::Field,
            (true, true) => UsageEntryKind::Constructor,
            (true, false) => UsageEntryKind::Method,
        };
        self.push(UsageEntry {
            class_name: descriptor::to_external(class.name()),
            member_name: Some(name.to_string()),
            kind,
            signature: Some(parts.join(" ")),
        });
    }
}
