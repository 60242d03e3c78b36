use serde::{Deserialize, Serialize};

use super::annotation::{Annotation, ElementValue, TypeAnnotation};
use super::{ClassId, Instruction, MemberId, UsageMark};

/// An attribute of a class, member, code block or record component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// Utf8 constant holding the attribute name
    pub name_index: u16,
    pub info: AttributeInfo,
    #[serde(skip)]
    pub mark: UsageMark,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootstrapMethod {
    pub method_handle_index: u16,
    #[serde(default)]
    pub arguments: Vec<u16>,
    #[serde(skip)]
    pub mark: UsageMark,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InnerClass {
    pub inner_class_index: u16,
    #[serde(default)]
    pub outer_class_index: u16,
    #[serde(default)]
    pub inner_name_index: u16,
    #[serde(default)]
    pub access_flags: super::AccessFlags,
    #[serde(skip)]
    pub mark: UsageMark,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordComponent {
    pub name_index: u16,
    pub descriptor_index: u16,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(skip)]
    pub referenced_field: Option<MemberId>,
    #[serde(skip)]
    pub mark: UsageMark,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodParameter {
    #[serde(default)]
    pub name_index: u16,
    #[serde(default)]
    pub access_flags: super::AccessFlags,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptionHandler {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    /// Class constant of the caught type; 0 catches everything
    #[serde(default)]
    pub catch_type: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeAttribute {
    #[serde(default)]
    pub max_stack: u16,
    #[serde(default)]
    pub max_locals: u16,
    pub code_length: u32,
    #[serde(default)]
    pub instructions: Vec<Instruction>,
    #[serde(default)]
    pub exception_table: Vec<ExceptionHandler>,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VerificationType {
    Top,
    Integer,
    Float,
    Long,
    Double,
    Null,
    UninitializedThis,
    Object { class_index: u16 },
    Uninitialized { offset: u16 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackMapFrame {
    pub offset: u16,
    #[serde(default)]
    pub locals: Vec<VerificationType>,
    #[serde(default)]
    pub stack: Vec<VerificationType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineNumber {
    pub start_pc: u16,
    pub line_number: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalVariable {
    pub start_pc: u16,
    pub length: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub index: u16,
    #[serde(skip)]
    pub referenced_classes: Vec<ClassId>,
    #[serde(skip)]
    pub mark: UsageMark,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalVariableType {
    pub start_pc: u16,
    pub length: u16,
    pub name_index: u16,
    pub signature_index: u16,
    pub index: u16,
    #[serde(skip)]
    pub referenced_classes: Vec<ClassId>,
    #[serde(skip)]
    pub mark: UsageMark,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleRequires {
    pub requires_index: u16,
    #[serde(default)]
    pub flags: u16,
    #[serde(default)]
    pub version_index: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleExports {
    pub package_index: u16,
    #[serde(default)]
    pub flags: u16,
    #[serde(default)]
    pub to_indices: Vec<u16>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleProvides {
    pub provides_index: u16,
    #[serde(default)]
    pub with_indices: Vec<u16>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleInfo {
    pub module_name_index: u16,
    #[serde(default)]
    pub module_flags: u16,
    #[serde(default)]
    pub module_version_index: u16,
    #[serde(default)]
    pub requires: Vec<ModuleRequires>,
    #[serde(default)]
    pub exports: Vec<ModuleExports>,
    #[serde(default)]
    pub opens: Vec<ModuleExports>,
    #[serde(default)]
    pub uses: Vec<u16>,
    #[serde(default)]
    pub provides: Vec<ModuleProvides>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttributeInfo {
    Unknown {
        #[serde(default)]
        bytes: Vec<u8>,
    },
    BootstrapMethods {
        methods: Vec<BootstrapMethod>,
    },
    SourceFile {
        source_file_index: u16,
    },
    SourceDir {
        source_dir_index: u16,
    },
    SourceDebugExtension {
        debug: String,
    },
    InnerClasses {
        classes: Vec<InnerClass>,
    },
    EnclosingMethod {
        class_index: u16,
        #[serde(default)]
        method_index: u16,
        #[serde(skip)]
        referenced_class: Option<ClassId>,
        #[serde(skip)]
        referenced_method: Option<MemberId>,
    },
    NestHost {
        host_class_index: u16,
    },
    NestMembers {
        classes: Vec<u16>,
    },
    PermittedSubclasses {
        classes: Vec<u16>,
    },
    Record {
        components: Vec<RecordComponent>,
    },
    Deprecated,
    Synthetic,
    Signature {
        signature_index: u16,
        #[serde(skip)]
        referenced_classes: Vec<ClassId>,
    },
    ConstantValue {
        value_index: u16,
    },
    MethodParameters {
        parameters: Vec<MethodParameter>,
    },
    Exceptions {
        exception_indices: Vec<u16>,
    },
    Code(CodeAttribute),
    StackMapTable {
        frames: Vec<StackMapFrame>,
    },
    LineNumberTable {
        lines: Vec<LineNumber>,
    },
    LocalVariableTable {
        variables: Vec<LocalVariable>,
    },
    LocalVariableTypeTable {
        variables: Vec<LocalVariableType>,
    },
    Annotations {
        visible: bool,
        annotations: Vec<Annotation>,
    },
    ParameterAnnotations {
        visible: bool,
        parameters: Vec<Vec<Annotation>>,
    },
    TypeAnnotations {
        visible: bool,
        annotations: Vec<TypeAnnotation>,
    },
    AnnotationDefault {
        default_value: ElementValue,
    },
    Module(ModuleInfo),
    ModuleMainClass {
        main_class_index: u16,
    },
    ModulePackages {
        package_indices: Vec<u16>,
    },
}

impl AttributeInfo {
    /// Class-file name of the attribute
    pub fn name(&self) -> &'static str {
        match self {
            AttributeInfo::Unknown { .. } => "Unknown",
            AttributeInfo::BootstrapMethods { .. } => "BootstrapMethods",
            AttributeInfo::SourceFile { .. } => "SourceFile",
            AttributeInfo::SourceDir { .. } => "SourceDir",
            AttributeInfo::SourceDebugExtension { .. } => "SourceDebugExtension",
            AttributeInfo::InnerClasses { .. } => "InnerClasses",
            AttributeInfo::EnclosingMethod { .. } => "EnclosingMethod",
            AttributeInfo::NestHost { .. } => "NestHost",
            AttributeInfo::NestMembers { .. } => "NestMembers",
            AttributeInfo::PermittedSubclasses { .. } => "PermittedSubclasses",
            AttributeInfo::Record { .. } => "Record",
            AttributeInfo::Deprecated => "Deprecated",
            AttributeInfo::Synthetic => "Synthetic",
            AttributeInfo::Signature { .. } => "Signature",
            AttributeInfo::ConstantValue { .. } => "ConstantValue",
            AttributeInfo::MethodParameters { .. } => "MethodParameters",
            AttributeInfo::Exceptions { .. } => "Exceptions",
            AttributeInfo::Code(_) => "Code",
            AttributeInfo::StackMapTable { .. } => "StackMapTable",
            AttributeInfo::LineNumberTable { .. } => "LineNumberTable",
            AttributeInfo::LocalVariableTable { .. } => "LocalVariableTable",
            AttributeInfo::LocalVariableTypeTable { .. } => "LocalVariableTypeTable",
            AttributeInfo::Annotations { visible: true, .. } => "RuntimeVisibleAnnotations",
            AttributeInfo::Annotations { visible: false, .. } => "RuntimeInvisibleAnnotations",
            AttributeInfo::ParameterAnnotations { visible: true, .. } => {
                "RuntimeVisibleParameterAnnotations"
            }
            AttributeInfo::ParameterAnnotations { visible: false, .. } => {
                "RuntimeInvisibleParameterAnnotations"
            }
            AttributeInfo::TypeAnnotations { visible: true, .. } => "RuntimeVisibleTypeAnnotations",
            AttributeInfo::TypeAnnotations { visible: false, .. } => {
                "RuntimeInvisibleTypeAnnotations"
            }
            AttributeInfo::AnnotationDefault { .. } => "AnnotationDefault",
            AttributeInfo::Module(_) => "Module",
            AttributeInfo::ModuleMainClass { .. } => "ModuleMainClass",
            AttributeInfo::ModulePackages { .. } => "ModulePackages",
        }
    }
}

impl Attribute {
    pub fn new(name_index: u16, info: AttributeInfo) -> Self {
        Self {
            name_index,
            info,
            mark: UsageMark::Unused,
        }
    }

    pub fn code(&self) -> Option<&CodeAttribute> {
        match &self.info {
            AttributeInfo::Code(code) => Some(code),
            _ => None,
        }
    }

    pub fn code_mut(&mut self) -> Option<&mut CodeAttribute> {
        match &mut self.info {
            AttributeInfo::Code(code) => Some(code),
            _ => None,
        }
    }

    /// Visit every constant-pool index held by this attribute, including
    /// its name and the contents of nested attributes.
    ///
    /// This is the single place that knows where pool indices live inside
    /// attributes; remapping and reference scanning both go through it.
    pub fn for_each_constant_index_mut(&mut self, f: &mut dyn FnMut(&mut u16)) {
        f(&mut self.name_index);
        match &mut self.info {
            AttributeInfo::Unknown { .. }
            | AttributeInfo::SourceDebugExtension { .. }
            | AttributeInfo::Deprecated
            | AttributeInfo::Synthetic
            | AttributeInfo::LineNumberTable { .. } => {}
            AttributeInfo::BootstrapMethods { methods } => {
                for method in methods {
                    f(&mut method.method_handle_index);
                    for argument in &mut method.arguments {
                        f(argument);
                    }
                }
            }
            AttributeInfo::SourceFile { source_file_index } => f(source_file_index),
            AttributeInfo::SourceDir { source_dir_index } => f(source_dir_index),
            AttributeInfo::InnerClasses { classes } => {
                for entry in classes {
                    visit_nonzero(&mut entry.inner_class_index, f);
                    visit_nonzero(&mut entry.outer_class_index, f);
                    visit_nonzero(&mut entry.inner_name_index, f);
                }
            }
            AttributeInfo::EnclosingMethod {
                class_index,
                method_index,
                ..
            } => {
                f(class_index);
                visit_nonzero(method_index, f);
            }
            AttributeInfo::NestHost { host_class_index } => f(host_class_index),
            AttributeInfo::NestMembers { classes }
            | AttributeInfo::PermittedSubclasses { classes } => {
                for class in classes {
                    f(class);
                }
            }
            AttributeInfo::Record { components } => {
                for component in components {
                    f(&mut component.name_index);
                    f(&mut component.descriptor_index);
                    for attribute in &mut component.attributes {
                        attribute.for_each_constant_index_mut(f);
                    }
                }
            }
            AttributeInfo::Signature {
                signature_index, ..
            } => f(signature_index),
            AttributeInfo::ConstantValue { value_index } => f(value_index),
            AttributeInfo::MethodParameters { parameters } => {
                for parameter in parameters {
                    visit_nonzero(&mut parameter.name_index, f);
                }
            }
            AttributeInfo::Exceptions { exception_indices } => {
                for index in exception_indices {
                    f(index);
                }
            }
            AttributeInfo::Code(code) => {
                for instruction in &mut code.instructions {
                    if let Instruction::Constant { index, .. } = instruction {
                        f(index);
                    }
                }
                for handler in &mut code.exception_table {
                    visit_nonzero(&mut handler.catch_type, f);
                }
                for attribute in &mut code.attributes {
                    attribute.for_each_constant_index_mut(f);
                }
            }
            AttributeInfo::StackMapTable { frames } => {
                for frame in frames {
                    for ty in frame.locals.iter_mut().chain(frame.stack.iter_mut()) {
                        if let VerificationType::Object { class_index } = ty {
                            f(class_index);
                        }
                    }
                }
            }
            AttributeInfo::LocalVariableTable { variables } => {
                for variable in variables {
                    f(&mut variable.name_index);
                    f(&mut variable.descriptor_index);
                }
            }
            AttributeInfo::LocalVariableTypeTable { variables } => {
                for variable in variables {
                    f(&mut variable.name_index);
                    f(&mut variable.signature_index);
                }
            }
            AttributeInfo::Annotations { annotations, .. } => {
                for annotation in annotations {
                    annotation.for_each_constant_index_mut(f);
                }
            }
            AttributeInfo::ParameterAnnotations { parameters, .. } => {
                for annotation in parameters.iter_mut().flatten() {
                    annotation.for_each_constant_index_mut(f);
                }
            }
            AttributeInfo::TypeAnnotations { annotations, .. } => {
                for annotation in annotations {
                    annotation.annotation.for_each_constant_index_mut(f);
                }
            }
            AttributeInfo::AnnotationDefault { default_value } => {
                default_value.for_each_constant_index_mut(f)
            }
            AttributeInfo::Module(module) => {
                f(&mut module.module_name_index);
                visit_nonzero(&mut module.module_version_index, f);
                for requires in &mut module.requires {
                    f(&mut requires.requires_index);
                    visit_nonzero(&mut requires.version_index, f);
                }
                for exports in module.exports.iter_mut().chain(module.opens.iter_mut()) {
                    f(&mut exports.package_index);
                    for to in &mut exports.to_indices {
                        f(to);
                    }
                }
                for uses in &mut module.uses {
                    f(uses);
                }
                for provides in &mut module.provides {
                    f(&mut provides.provides_index);
                    for with in &mut provides.with_indices {
                        f(with);
                    }
                }
            }
            AttributeInfo::ModuleMainClass { main_class_index } => f(main_class_index),
            AttributeInfo::ModulePackages { package_indices } => {
                for index in package_indices {
                    f(index);
                }
            }
        }
    }

    pub fn for_each_member_ref_mut(&mut self, f: &mut dyn FnMut(&mut Option<MemberId>)) {
        match &mut self.info {
            AttributeInfo::EnclosingMethod {
                referenced_method, ..
            } => f(referenced_method),
            AttributeInfo::Record { components } => {
                for component in components {
                    f(&mut component.referenced_field);
                    for attribute in &mut component.attributes {
                        attribute.for_each_member_ref_mut(f);
                    }
                }
            }
            AttributeInfo::Code(code) => {
                for attribute in &mut code.attributes {
                    attribute.for_each_member_ref_mut(f);
                }
            }
            AttributeInfo::Annotations { annotations, .. } => {
                for annotation in annotations {
                    annotation.for_each_member_ref_mut(f);
                }
            }
            AttributeInfo::ParameterAnnotations { parameters, .. } => {
                for annotation in parameters.iter_mut().flatten() {
                    annotation.for_each_member_ref_mut(f);
                }
            }
            AttributeInfo::TypeAnnotations { annotations, .. } => {
                for annotation in annotations {
                    annotation.annotation.for_each_member_ref_mut(f);
                }
            }
            AttributeInfo::AnnotationDefault { default_value } => {
                default_value.for_each_member_ref_mut(f)
            }
            _ => {}
        }
    }

    pub fn reset_marks(&mut self) {
        self.mark = UsageMark::Unused;
        match &mut self.info {
            AttributeInfo::BootstrapMethods { methods } => {
                methods.iter_mut().for_each(|m| m.mark = UsageMark::Unused)
            }
            AttributeInfo::InnerClasses { classes } => {
                classes.iter_mut().for_each(|c| c.mark = UsageMark::Unused)
            }
            AttributeInfo::Record { components } => {
                for component in components {
                    component.mark = UsageMark::Unused;
                    component.attributes.iter_mut().for_each(Attribute::reset_marks);
                }
            }
            AttributeInfo::Code(code) => code.attributes.iter_mut().for_each(Attribute::reset_marks),
            AttributeInfo::LocalVariableTable { variables } => {
                variables.iter_mut().for_each(|v| v.mark = UsageMark::Unused)
            }
            AttributeInfo::LocalVariableTypeTable { variables } => {
                variables.iter_mut().for_each(|v| v.mark = UsageMark::Unused)
            }
            AttributeInfo::Annotations { annotations, .. } => {
                annotations.iter_mut().for_each(Annotation::reset_marks)
            }
            AttributeInfo::ParameterAnnotations { parameters, .. } => parameters
                .iter_mut()
                .flatten()
                .for_each(Annotation::reset_marks),
            AttributeInfo::TypeAnnotations { annotations, .. } => {
                annotations.iter_mut().for_each(TypeAnnotation::reset_marks)
            }
            AttributeInfo::AnnotationDefault { default_value } => default_value.reset_marks(),
            _ => {}
        }
    }
}

fn visit_nonzero(index: &mut u16, f: &mut dyn FnMut(&mut u16)) {
    if *index != 0 {
        f(index);
    }
}
