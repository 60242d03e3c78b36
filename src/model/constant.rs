use serde::{Deserialize, Serialize};

use super::{ClassId, MemberId, UsageMark};

/// Field, method and interface-method reference constant.
///
/// After linking, `referenced_class` is the class that actually declares the
/// member (which may be a superclass of the class named by `class_index`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefConstant {
    pub class_index: u16,
    pub name_and_type_index: u16,
    #[serde(skip)]
    pub referenced_class: Option<ClassId>,
    #[serde(skip)]
    pub referenced_member: Option<MemberId>,
}

/// Dynamic or invokedynamic call-site constant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicConstant {
    pub bootstrap_method_index: u16,
    pub name_and_type_index: u16,
    #[serde(skip)]
    pub referenced_classes: Vec<ClassId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tag", rename_all = "snake_case")]
pub enum Constant {
    /// Slot 0 and the second half of long/double entries
    Invalid,
    Utf8 {
        value: String,
    },
    Integer {
        value: i32,
    },
    Float {
        value: f32,
    },
    Long {
        value: i64,
    },
    Double {
        value: f64,
    },
    Class {
        name_index: u16,
        #[serde(skip)]
        referenced_class: Option<ClassId>,
    },
    String {
        string_index: u16,
        #[serde(skip)]
        referenced_class: Option<ClassId>,
    },
    FieldRef(RefConstant),
    MethodRef(RefConstant),
    InterfaceMethodRef(RefConstant),
    NameAndType {
        name_index: u16,
        descriptor_index: u16,
    },
    MethodHandle {
        reference_kind: u8,
        reference_index: u16,
    },
    MethodType {
        descriptor_index: u16,
        #[serde(skip)]
        referenced_classes: Vec<ClassId>,
    },
    Dynamic(DynamicConstant),
    InvokeDynamic(DynamicConstant),
    Module {
        name_index: u16,
    },
    Package {
        name_index: u16,
    },
}

impl Constant {
    /// Long and double constants occupy two pool slots
    pub fn is_wide(&self) -> bool {
        matches!(self, Constant::Long { .. } | Constant::Double { .. })
    }

    pub fn tag_name(&self) -> &'static str {
        match self {
            Constant::Invalid => "Invalid",
            Constant::Utf8 { .. } => "Utf8",
            Constant::Integer { .. } => "Integer",
            Constant::Float { .. } => "Float",
            Constant::Long { .. } => "Long",
            Constant::Double { .. } => "Double",
            Constant::Class { .. } => "Class",
            Constant::String { .. } => "String",
            Constant::FieldRef(_) => "Fieldref",
            Constant::MethodRef(_) => "Methodref",
            Constant::InterfaceMethodRef(_) => "InterfaceMethodref",
            Constant::NameAndType { .. } => "NameAndType",
            Constant::MethodHandle { .. } => "MethodHandle",
            Constant::MethodType { .. } => "MethodType",
            Constant::Dynamic(_) => "Dynamic",
            Constant::InvokeDynamic(_) => "InvokeDynamic",
            Constant::Module { .. } => "Module",
            Constant::Package { .. } => "Package",
        }
    }

    pub fn as_ref_constant(&self) -> Option<&RefConstant> {
        match self {
            Constant::FieldRef(r) | Constant::MethodRef(r) | Constant::InterfaceMethodRef(r) => {
                Some(r)
            }
            _ => None,
        }
    }

    /// Visit every pool index stored inside this constant.
    ///
    /// Bootstrap-method indices point into the BootstrapMethods attribute,
    /// not the pool, and are not visited.
    pub fn for_each_index_mut(&mut self, f: &mut dyn FnMut(&mut u16)) {
        match self {
            Constant::Class { name_index, .. } => f(name_index),
            Constant::String { string_index, .. } => f(string_index),
            Constant::FieldRef(r) | Constant::MethodRef(r) | Constant::InterfaceMethodRef(r) => {
                f(&mut r.class_index);
                f(&mut r.name_and_type_index);
            }
            Constant::NameAndType {
                name_index,
                descriptor_index,
            } => {
                f(name_index);
                f(descriptor_index);
            }
            Constant::MethodHandle {
                reference_index, ..
            } => f(reference_index),
            Constant::MethodType {
                descriptor_index, ..
            } => f(descriptor_index),
            Constant::Dynamic(d) | Constant::InvokeDynamic(d) => f(&mut d.name_and_type_index),
            Constant::Module { name_index } | Constant::Package { name_index } => f(name_index),
            Constant::Invalid
            | Constant::Utf8 { .. }
            | Constant::Integer { .. }
            | Constant::Float { .. }
            | Constant::Long { .. }
            | Constant::Double { .. } => {}
        }
    }

    pub fn for_each_member_ref_mut(&mut self, f: &mut dyn FnMut(&mut Option<MemberId>)) {
        if let Constant::FieldRef(r) | Constant::MethodRef(r) | Constant::InterfaceMethodRef(r) =
            self
        {
            f(&mut r.referenced_member);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct PoolEntry {
    constant: Constant,
    mark: UsageMark,
}

/// A class's constant pool.
///
/// Index 0 is always [`Constant::Invalid`]; wide entries are followed by an
/// `Invalid` placeholder so indices match the class-file numbering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Constant>", into = "Vec<Constant>")]
pub struct ConstantPool {
    entries: Vec<PoolEntry>,
}

impl Default for ConstantPool {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Vec<Constant>> for ConstantPool {
    fn from(constants: Vec<Constant>) -> Self {
        let mut entries: Vec<PoolEntry> = constants
            .into_iter()
            .map(|constant| PoolEntry {
                constant,
                mark: UsageMark::Unused,
            })
            .collect();
        if !matches!(entries.first(), Some(e) if e.constant == Constant::Invalid) {
            entries.insert(
                0,
                PoolEntry {
                    constant: Constant::Invalid,
                    mark: UsageMark::Unused,
                },
            );
        }
        Self { entries }
    }
}

impl From<ConstantPool> for Vec<Constant> {
    fn from(pool: ConstantPool) -> Self {
        pool.entries.into_iter().map(|e| e.constant).collect()
    }
}

impl ConstantPool {
    pub fn new() -> Self {
        Self {
            entries: vec![PoolEntry {
                constant: Constant::Invalid,
                mark: UsageMark::Unused,
            }],
        }
    }

    /// Number of slots including slot 0
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1
    }

    /// Append a constant, adding the placeholder slot for wide constants
    pub fn push(&mut self, constant: Constant) -> u16 {
        let index = self.entries.len() as u16;
        let wide = constant.is_wide();
        self.entries.push(PoolEntry {
            constant,
            mark: UsageMark::Unused,
        });
        if wide {
            self.entries.push(PoolEntry {
                constant: Constant::Invalid,
                mark: UsageMark::Unused,
            });
        }
        index
    }

    pub fn get(&self, index: u16) -> Option<&Constant> {
        match self.entries.get(index as usize) {
            Some(entry) if entry.constant != Constant::Invalid => Some(&entry.constant),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, index: u16) -> Option<&mut Constant> {
        match self.entries.get_mut(index as usize) {
            Some(entry) if entry.constant != Constant::Invalid => Some(&mut entry.constant),
            _ => None,
        }
    }

    pub fn mark(&self, index: u16) -> Option<UsageMark> {
        self.entries.get(index as usize).map(|e| e.mark)
    }

    pub fn is_used(&self, index: u16) -> bool {
        self.mark(index).is_some_and(|m| m.is_used())
    }

    pub fn set_mark(&mut self, index: u16, mark: UsageMark) {
        if let Some(entry) = self.entries.get_mut(index as usize) {
            entry.mark = mark;
        }
    }

    pub fn reset_marks(&mut self) {
        for entry in &mut self.entries {
            entry.mark = UsageMark::Unused;
        }
    }

    pub fn utf8(&self, index: u16) -> Option<&str> {
        match self.get(index) {
            Some(Constant::Utf8 { value }) => Some(value),
            _ => None,
        }
    }

    /// Internal name of the class named by a Class constant
    pub fn class_name(&self, index: u16) -> Option<&str> {
        match self.get(index) {
            Some(Constant::Class { name_index, .. }) => self.utf8(*name_index),
            _ => None,
        }
    }

    pub fn class_reference(&self, index: u16) -> Option<super::ClassId> {
        match self.get(index) {
            Some(Constant::Class {
                referenced_class, ..
            }) => *referenced_class,
            _ => None,
        }
    }

    pub fn name_and_type(&self, index: u16) -> Option<(&str, &str)> {
        match self.get(index) {
            Some(Constant::NameAndType {
                name_index,
                descriptor_index,
            }) => Some((self.utf8(*name_index)?, self.utf8(*descriptor_index)?)),
            _ => None,
        }
    }

    /// Owner, name and descriptor of a field or method reference
    pub fn ref_target(&self, index: u16) -> Option<(&str, &str, &str)> {
        let r = self.get(index)?.as_ref_constant()?;
        let owner = self.class_name(r.class_index)?;
        let (name, descriptor) = self.name_and_type(r.name_and_type_index)?;
        Some((owner, name, descriptor))
    }

    pub fn find_utf8(&self, value: &str) -> Option<u16> {
        self.entries.iter().position(|e| {
            matches!(&e.constant, Constant::Utf8 { value: v } if v == value)
        })
        .map(|i| i as u16)
    }

    /// Iterate `(index, constant, mark)` over real entries
    pub fn iter(&self) -> impl Iterator<Item = (u16, &Constant, UsageMark)> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.constant != Constant::Invalid)
            .map(|(i, e)| (i as u16, &e.constant, e.mark))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (u16, &mut Constant)> {
        self.entries
            .iter_mut()
            .enumerate()
            .filter(|(_, e)| e.constant != Constant::Invalid)
            .map(|(i, e)| (i as u16, &mut e.constant))
    }

    /// Keep the entries marked used, renumbering them densely.
    ///
    /// Returns the old-to-new index map. Wide entries keep their placeholder
    /// slot without it being tested separately.
    pub fn retain_used(&mut self) -> IndexMap {
        let old = std::mem::take(&mut self.entries);
        let mut map = vec![0u16; old.len()];
        let mut entries = Vec::with_capacity(old.len());
        let mut iter = old.into_iter().enumerate();

        while let Some((index, entry)) = iter.next() {
            if index == 0 {
                entries.push(entry);
                continue;
            }
            let wide = entry.constant.is_wide();
            if entry.mark.is_used() && entry.constant != Constant::Invalid {
                map[index] = entries.len() as u16;
                entries.push(entry);
                if wide {
                    if let Some((_, placeholder)) = iter.next() {
                        entries.push(placeholder);
                    }
                }
            } else if wide {
                iter.next();
            }
        }

        self.entries = entries;
        IndexMap { map }
    }
}

/// Old-to-new mapping of dense indices; 0 marks a removed slot
#[derive(Debug, Clone, Default)]
pub struct IndexMap {
    map: Vec<u16>,
}

impl IndexMap {
    /// New index of `old`, or `None` when it was removed
    pub fn get(&self, old: u16) -> Option<u16> {
        match self.map.get(old as usize) {
            Some(0) | None => None,
            Some(new) => Some(*new),
        }
    }

    pub fn removed_count(&self) -> usize {
        self.map.iter().skip(1).filter(|i| **i == 0).count()
    }
}
