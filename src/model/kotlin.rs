//! Kotlin metadata model.
//!
//! Class names are JVM internal names (`com/example/Foo$Bar`). JVM member
//! signatures point at the fields and methods that implement each
//! declaration; the linker resolves them into [`MemberId`]s.

use serde::{Deserialize, Serialize};

use super::{ClassId, MemberId, UsageMark};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KotlinVisibility {
    #[default]
    Public,
    Protected,
    Internal,
    Private,
    PrivateToThis,
    Local,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KotlinModality {
    #[default]
    Final,
    Open,
    Abstract,
    Sealed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KotlinVariance {
    #[default]
    Invariant,
    In,
    Out,
}

/// Declaration flags; fields that do not apply to a node stay false
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KotlinFlags {
    pub visibility: KotlinVisibility,
    pub modality: KotlinModality,
    pub has_annotations: bool,
    pub is_var: bool,
    pub has_getter: bool,
    pub has_setter: bool,
    pub is_const: bool,
    pub is_delegated: bool,
    pub is_suspend: bool,
    pub is_inline: bool,
    pub is_nullable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JvmSignature {
    pub name: String,
    pub descriptor: String,
}

impl JvmSignature {
    pub fn new(name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            descriptor: descriptor.into(),
        }
    }
}

impl std::fmt::Display for JvmSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.name, self.descriptor)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KotlinAnnotation {
    pub class_name: String,
    #[serde(default)]
    pub arguments: Vec<(String, String)>,
    #[serde(skip)]
    pub referenced_class: Option<ClassId>,
    #[serde(skip)]
    pub mark: UsageMark,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KotlinType {
    pub class_name: Option<String>,
    pub type_alias_name: Option<String>,
    pub type_parameter_id: Option<u32>,
    pub arguments: Vec<KotlinTypeProjection>,
    pub outer_type: Option<Box<KotlinType>>,
    pub flexible_upper_bound: Option<Box<KotlinType>>,
    pub annotations: Vec<KotlinAnnotation>,
    pub is_nullable: bool,
    #[serde(skip)]
    pub referenced_class: Option<ClassId>,
    /// Class holding the metadata that declares the referenced alias
    #[serde(skip)]
    pub referenced_alias_container: Option<ClassId>,
    #[serde(skip)]
    pub mark: UsageMark,
}

/// Type argument; `ty == None` is the star projection
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct KotlinTypeProjection {
    #[serde(default)]
    pub variance: KotlinVariance,
    #[serde(default, rename = "type")]
    pub ty: Option<KotlinType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KotlinTypeParameter {
    pub name: String,
    pub id: u32,
    #[serde(default)]
    pub variance: KotlinVariance,
    #[serde(default)]
    pub upper_bounds: Vec<KotlinType>,
    #[serde(default)]
    pub annotations: Vec<KotlinAnnotation>,
    #[serde(skip)]
    pub mark: UsageMark,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KotlinValueParameter {
    pub name: String,
    #[serde(default)]
    pub flags: KotlinFlags,
    #[serde(rename = "type")]
    pub ty: KotlinType,
    #[serde(default)]
    pub vararg_element_type: Option<KotlinType>,
    #[serde(skip)]
    pub mark: UsageMark,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KotlinProperty {
    pub name: String,
    #[serde(default)]
    pub flags: KotlinFlags,
    #[serde(rename = "type")]
    pub ty: KotlinType,
    #[serde(default)]
    pub receiver_type: Option<KotlinType>,
    #[serde(default)]
    pub type_parameters: Vec<KotlinTypeParameter>,
    #[serde(default)]
    pub setter_parameters: Vec<KotlinValueParameter>,
    #[serde(default)]
    pub backing_field: Option<JvmSignature>,
    /// Class declaring the backing field when it is not the metadata owner
    /// (companion-object properties live in the outer class)
    #[serde(default)]
    pub backing_field_owner: Option<String>,
    #[serde(default)]
    pub getter: Option<JvmSignature>,
    #[serde(default)]
    pub setter: Option<JvmSignature>,
    #[serde(default)]
    pub synthetic_method_for_annotations: Option<JvmSignature>,
    #[serde(default)]
    pub synthetic_method_for_delegate: Option<JvmSignature>,
    #[serde(skip)]
    pub referenced_backing_field: Option<MemberId>,
    #[serde(skip)]
    pub referenced_getter: Option<MemberId>,
    #[serde(skip)]
    pub referenced_setter: Option<MemberId>,
    #[serde(skip)]
    pub referenced_annotations_method: Option<MemberId>,
    #[serde(skip)]
    pub referenced_delegate_method: Option<MemberId>,
    #[serde(skip)]
    pub mark: UsageMark,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KotlinFunction {
    pub name: String,
    #[serde(default)]
    pub flags: KotlinFlags,
    #[serde(default)]
    pub signature: Option<JvmSignature>,
    #[serde(default)]
    pub receiver_type: Option<KotlinType>,
    pub return_type: KotlinType,
    #[serde(default)]
    pub type_parameters: Vec<KotlinTypeParameter>,
    #[serde(default)]
    pub value_parameters: Vec<KotlinValueParameter>,
    /// `name$default` bridge for calls that omit default arguments
    #[serde(default)]
    pub default_method: Option<JvmSignature>,
    /// Static body in the interface's `DefaultImpls` class
    #[serde(default)]
    pub default_impls_method: Option<JvmSignature>,
    #[serde(skip)]
    pub referenced_method: Option<MemberId>,
    #[serde(skip)]
    pub referenced_default_method: Option<MemberId>,
    #[serde(skip)]
    pub referenced_default_impls_method: Option<MemberId>,
    #[serde(skip)]
    pub mark: UsageMark,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KotlinConstructor {
    #[serde(default)]
    pub flags: KotlinFlags,
    #[serde(default)]
    pub signature: Option<JvmSignature>,
    #[serde(default)]
    pub value_parameters: Vec<KotlinValueParameter>,
    #[serde(skip)]
    pub referenced_method: Option<MemberId>,
    #[serde(skip)]
    pub mark: UsageMark,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KotlinTypeAlias {
    pub name: String,
    #[serde(default)]
    pub flags: KotlinFlags,
    pub underlying_type: KotlinType,
    pub expanded_type: KotlinType,
    #[serde(default)]
    pub type_parameters: Vec<KotlinTypeParameter>,
    #[serde(default)]
    pub annotations: Vec<KotlinAnnotation>,
    #[serde(skip)]
    pub mark: UsageMark,
}

/// Declarations shared by classes, file facades and multi-file parts
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KotlinDeclarationContainer {
    pub properties: Vec<KotlinProperty>,
    pub functions: Vec<KotlinFunction>,
    pub type_aliases: Vec<KotlinTypeAlias>,
    pub local_delegated_properties: Vec<KotlinProperty>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KotlinClassMetadata {
    pub class_name: String,
    #[serde(default)]
    pub flags: KotlinFlags,
    #[serde(default, flatten)]
    pub container: KotlinDeclarationContainer,
    #[serde(default)]
    pub constructors: Vec<KotlinConstructor>,
    #[serde(default)]
    pub type_parameters: Vec<KotlinTypeParameter>,
    #[serde(default)]
    pub super_types: Vec<KotlinType>,
    /// Simple names of nested classes, resolved against `class_name$name`
    #[serde(default)]
    pub nested_class_names: Vec<String>,
    #[serde(default)]
    pub sealed_subclass_names: Vec<String>,
    #[serde(default)]
    pub enum_entry_names: Vec<String>,
    #[serde(default)]
    pub companion_object_name: Option<String>,
    #[serde(skip)]
    pub referenced_nested_classes: Vec<Option<ClassId>>,
    #[serde(skip)]
    pub referenced_sealed_subclasses: Vec<Option<ClassId>>,
    #[serde(skip)]
    pub referenced_enum_entries: Vec<Option<MemberId>>,
    #[serde(skip)]
    pub referenced_companion_class: Option<ClassId>,
    #[serde(skip)]
    pub referenced_companion_field: Option<MemberId>,
    #[serde(skip)]
    pub referenced_default_impls_class: Option<ClassId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyntheticKind {
    Lambda,
    WhenMappings,
    #[default]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum KotlinMetadataKind {
    Class(Box<KotlinClassMetadata>),
    FileFacade {
        #[serde(default)]
        container: KotlinDeclarationContainer,
    },
    SyntheticClass {
        #[serde(default)]
        synthetic_kind: SyntheticKind,
        #[serde(default)]
        functions: Vec<KotlinFunction>,
    },
    MultiFileFacade {
        part_class_names: Vec<String>,
        #[serde(skip)]
        referenced_part_classes: Vec<Option<ClassId>>,
    },
    MultiFilePart {
        facade_class_name: String,
        #[serde(default)]
        container: KotlinDeclarationContainer,
        #[serde(skip)]
        referenced_facade_class: Option<ClassId>,
    },
}

/// Kotlin metadata attached to a class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KotlinMetadata {
    pub kind: KotlinMetadataKind,
    #[serde(skip)]
    pub mark: UsageMark,
}

impl KotlinMetadata {
    pub fn new(kind: KotlinMetadataKind) -> Self {
        Self {
            kind,
            mark: UsageMark::Unused,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            KotlinMetadataKind::Class(_) => "class",
            KotlinMetadataKind::FileFacade { .. } => "file facade",
            KotlinMetadataKind::SyntheticClass { .. } => "synthetic class",
            KotlinMetadataKind::MultiFileFacade { .. } => "multi-file facade",
            KotlinMetadataKind::MultiFilePart { .. } => "multi-file part",
        }
    }

    pub fn container(&self) -> Option<&KotlinDeclarationContainer> {
        match &self.kind {
            KotlinMetadataKind::Class(class) => Some(&class.container),
            KotlinMetadataKind::FileFacade { container }
            | KotlinMetadataKind::MultiFilePart { container, .. } => Some(container),
            _ => None,
        }
    }

    pub fn container_mut(&mut self) -> Option<&mut KotlinDeclarationContainer> {
        match &mut self.kind {
            KotlinMetadataKind::Class(class) => Some(&mut class.container),
            KotlinMetadataKind::FileFacade { container }
            | KotlinMetadataKind::MultiFilePart { container, .. } => Some(container),
            _ => None,
        }
    }

    pub fn for_each_member_ref_mut(&mut self, f: &mut dyn FnMut(&mut Option<MemberId>)) {
        if let Some(container) = self.container_mut() {
            container.for_each_member_ref_mut(f);
        }
        match &mut self.kind {
            KotlinMetadataKind::Class(class) => {
                for constructor in &mut class.constructors {
                    f(&mut constructor.referenced_method);
                }
                for entry in &mut class.referenced_enum_entries {
                    f(entry);
                }
                f(&mut class.referenced_companion_field);
            }
            KotlinMetadataKind::SyntheticClass { functions, .. } => {
                for function in functions {
                    function.for_each_member_ref_mut(f);
                }
            }
            _ => {}
        }
    }

    pub fn reset_marks(&mut self) {
        self.mark = UsageMark::Unused;
        if let Some(container) = self.container_mut() {
            container.reset_marks();
        }
        match &mut self.kind {
            KotlinMetadataKind::Class(class) => {
                for constructor in &mut class.constructors {
                    constructor.mark = UsageMark::Unused;
                    constructor
                        .value_parameters
                        .iter_mut()
                        .for_each(KotlinValueParameter::reset_marks);
                }
                class
                    .type_parameters
                    .iter_mut()
                    .for_each(KotlinTypeParameter::reset_marks);
                class.super_types.iter_mut().for_each(KotlinType::reset_marks);
            }
            KotlinMetadataKind::SyntheticClass { functions, .. } => {
                functions.iter_mut().for_each(KotlinFunction::reset_marks)
            }
            _ => {}
        }
    }
}

impl KotlinDeclarationContainer {
    pub fn for_each_member_ref_mut(&mut self, f: &mut dyn FnMut(&mut Option<MemberId>)) {
        for property in self
            .properties
            .iter_mut()
            .chain(self.local_delegated_properties.iter_mut())
        {
            f(&mut property.referenced_backing_field);
            f(&mut property.referenced_getter);
            f(&mut property.referenced_setter);
            f(&mut property.referenced_annotations_method);
            f(&mut property.referenced_delegate_method);
        }
        for function in &mut self.functions {
            function.for_each_member_ref_mut(f);
        }
    }

    pub fn reset_marks(&mut self) {
        self.properties
            .iter_mut()
            .chain(self.local_delegated_properties.iter_mut())
            .for_each(KotlinProperty::reset_marks);
        self.functions.iter_mut().for_each(KotlinFunction::reset_marks);
        for alias in &mut self.type_aliases {
            alias.mark = UsageMark::Unused;
            alias.underlying_type.reset_marks();
            alias.expanded_type.reset_marks();
            alias
                .type_parameters
                .iter_mut()
                .for_each(KotlinTypeParameter::reset_marks);
            alias.annotations.iter_mut().for_each(|a| a.mark = UsageMark::Unused);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
            && self.functions.is_empty()
            && self.type_aliases.is_empty()
            && self.local_delegated_properties.is_empty()
    }
}

impl KotlinFunction {
    pub fn for_each_member_ref_mut(&mut self, f: &mut dyn FnMut(&mut Option<MemberId>)) {
        f(&mut self.referenced_method);
        f(&mut self.referenced_default_method);
        f(&mut self.referenced_default_impls_method);
    }

    pub fn reset_marks(&mut self) {
        self.mark = UsageMark::Unused;
        if let Some(receiver) = &mut self.receiver_type {
            receiver.reset_marks();
        }
        self.return_type.reset_marks();
        self.type_parameters
            .iter_mut()
            .for_each(KotlinTypeParameter::reset_marks);
        self.value_parameters
            .iter_mut()
            .for_each(KotlinValueParameter::reset_marks);
    }
}

impl KotlinProperty {
    pub fn reset_marks(&mut self) {
        self.mark = UsageMark::Unused;
        self.ty.reset_marks();
        if let Some(receiver) = &mut self.receiver_type {
            receiver.reset_marks();
        }
        self.type_parameters
            .iter_mut()
            .for_each(KotlinTypeParameter::reset_marks);
        self.setter_parameters
            .iter_mut()
            .for_each(KotlinValueParameter::reset_marks);
    }
}

impl KotlinType {
    pub fn class(name: impl Into<String>) -> Self {
        Self {
            class_name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn alias(name: impl Into<String>) -> Self {
        Self {
            type_alias_name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn reset_marks(&mut self) {
        self.mark = UsageMark::Unused;
        for argument in &mut self.arguments {
            if let Some(ty) = &mut argument.ty {
                ty.reset_marks();
            }
        }
        if let Some(outer) = &mut self.outer_type {
            outer.reset_marks();
        }
        if let Some(upper) = &mut self.flexible_upper_bound {
            upper.reset_marks();
        }
        self.annotations.iter_mut().for_each(|a| a.mark = UsageMark::Unused);
    }
}

impl KotlinTypeParameter {
    pub fn reset_marks(&mut self) {
        self.mark = UsageMark::Unused;
        self.upper_bounds.iter_mut().for_each(KotlinType::reset_marks);
        self.annotations.iter_mut().for_each(|a| a.mark = UsageMark::Unused);
    }
}

impl KotlinValueParameter {
    pub fn reset_marks(&mut self) {
        self.mark = UsageMark::Unused;
        self.ty.reset_marks();
        if let Some(vararg) = &mut self.vararg_element_type {
            vararg.reset_marks();
        }
    }
}

/// A `.kotlin_module` resource: the package-to-facade table of one module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KotlinModule {
    pub name: String,
    #[serde(default)]
    pub packages: Vec<KotlinModulePackage>,
    #[serde(skip)]
    pub mark: UsageMark,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KotlinModulePackage {
    pub fq_name: String,
    #[serde(default)]
    pub file_facades: Vec<String>,
    /// Pairs of part class and facade class
    #[serde(default)]
    pub multi_file_parts: Vec<(String, String)>,
    #[serde(skip)]
    pub referenced_file_facades: Vec<Option<ClassId>>,
    #[serde(skip)]
    pub referenced_multi_file_parts: Vec<Option<ClassId>>,
}
