use serde::{Deserialize, Serialize};

use super::{ClassId, MemberId, UsageMark};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// Utf8 field descriptor of the annotation type
    pub type_index: u16,
    #[serde(default)]
    pub elements: Vec<ElementValue>,
    #[serde(skip)]
    pub referenced_classes: Vec<ClassId>,
    #[serde(skip)]
    pub mark: UsageMark,
}

/// An annotation element value.
///
/// Top-level values carry the name of the annotation method they bind to;
/// values nested in arrays have `element_name_index == 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementValue {
    #[serde(default)]
    pub element_name_index: u16,
    pub value: ElementValueKind,
    #[serde(skip)]
    pub referenced_method: Option<MemberId>,
    #[serde(skip)]
    pub mark: UsageMark,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ElementValueKind {
    Constant {
        tag: char,
        const_value_index: u16,
    },
    EnumConstant {
        type_name_index: u16,
        const_name_index: u16,
        #[serde(skip)]
        referenced_classes: Vec<ClassId>,
        #[serde(skip)]
        referenced_field: Option<MemberId>,
    },
    Class {
        class_info_index: u16,
        #[serde(skip)]
        referenced_classes: Vec<ClassId>,
    },
    Annotation {
        annotation: Box<Annotation>,
    },
    Array {
        values: Vec<ElementValue>,
    },
}

/// Type annotation; the target info is kept as raw bytes since it holds no
/// pool references
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeAnnotation {
    pub target_type: u8,
    #[serde(default)]
    pub target_info: Vec<u8>,
    #[serde(default)]
    pub type_path: Vec<(u8, u8)>,
    pub annotation: Annotation,
    #[serde(skip)]
    pub mark: UsageMark,
}

impl Annotation {
    pub fn new(type_index: u16, elements: Vec<ElementValue>) -> Self {
        Self {
            type_index,
            elements,
            referenced_classes: Vec::new(),
            mark: UsageMark::Unused,
        }
    }

    pub fn for_each_constant_index_mut(&mut self, f: &mut dyn FnMut(&mut u16)) {
        f(&mut self.type_index);
        for element in &mut self.elements {
            element.for_each_constant_index_mut(f);
        }
    }

    pub fn for_each_member_ref_mut(&mut self, f: &mut dyn FnMut(&mut Option<MemberId>)) {
        for element in &mut self.elements {
            element.for_each_member_ref_mut(f);
        }
    }

    pub fn reset_marks(&mut self) {
        self.mark = UsageMark::Unused;
        for element in &mut self.elements {
            element.reset_marks();
        }
    }

    /// Drop element values that were not marked, recursively
    pub fn retain_used(&mut self) -> usize {
        let before = self.elements.len();
        self.elements.retain(|e| e.mark.is_used());
        let mut removed = before - self.elements.len();
        for element in &mut self.elements {
            removed += element.retain_used();
        }
        removed
    }
}

impl ElementValue {
    pub fn new(element_name_index: u16, value: ElementValueKind) -> Self {
        Self {
            element_name_index,
            value,
            referenced_method: None,
            mark: UsageMark::Unused,
        }
    }

    pub fn for_each_constant_index_mut(&mut self, f: &mut dyn FnMut(&mut u16)) {
        if self.element_name_index != 0 {
            f(&mut self.element_name_index);
        }
        match &mut self.value {
            ElementValueKind::Constant {
                const_value_index, ..
            } => f(const_value_index),
            ElementValueKind::EnumConstant {
                type_name_index,
                const_name_index,
                ..
            } => {
                f(type_name_index);
                f(const_name_index);
            }
            ElementValueKind::Class {
                class_info_index, ..
            } => f(class_info_index),
            ElementValueKind::Annotation { annotation } => {
                annotation.for_each_constant_index_mut(f)
            }
            ElementValueKind::Array { values } => {
                for value in values {
                    value.for_each_constant_index_mut(f);
                }
            }
        }
    }

    pub fn for_each_member_ref_mut(&mut self, f: &mut dyn FnMut(&mut Option<MemberId>)) {
        f(&mut self.referenced_method);
        match &mut self.value {
            ElementValueKind::EnumConstant {
                referenced_field, ..
            } => f(referenced_field),
            ElementValueKind::Annotation { annotation } => annotation.for_each_member_ref_mut(f),
            ElementValueKind::Array { values } => {
                for value in values {
                    value.for_each_member_ref_mut(f);
                }
            }
            ElementValueKind::Constant { .. } | ElementValueKind::Class { .. } => {}
        }
    }

    pub fn reset_marks(&mut self) {
        self.mark = UsageMark::Unused;
        match &mut self.value {
            ElementValueKind::Annotation { annotation } => annotation.reset_marks(),
            ElementValueKind::Array { values } => {
                for value in values {
                    value.reset_marks();
                }
            }
            _ => {}
        }
    }

    pub fn retain_used(&mut self) -> usize {
        match &mut self.value {
            ElementValueKind::Annotation { annotation } => annotation.retain_used(),
            ElementValueKind::Array { values } => {
                let before = values.len();
                values.retain(|v| v.mark.is_used());
                let mut removed = before - values.len();
                for value in values {
                    removed += value.retain_used();
                }
                removed
            }
            _ => 0,
        }
    }
}

impl TypeAnnotation {
    pub fn reset_marks(&mut self) {
        self.mark = UsageMark::Unused;
        self.annotation.reset_marks();
    }
}
