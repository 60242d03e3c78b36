use std::collections::HashMap;

use super::attribute::BootstrapMethod;
use super::kotlin::KotlinMetadataKind;
use super::{
    AccessFlags, Attribute, AttributeInfo, Class, ClassOrigin, CodeAttribute, Constant,
    ConstantPool, DynamicConstant, Instruction, KotlinMetadata, Member, ProcessingFlags,
    RefConstant, UsageMark,
};

/// Assembles a [`Class`], interning constants as they are requested.
///
/// ```
/// use classshrink::model::{AccessFlags, ClassBuilder};
///
/// let mut builder = ClassBuilder::new("com/example/Main", AccessFlags::PUBLIC)
///     .super_class("java/lang/Object");
/// builder.add_method(AccessFlags::PUBLIC | AccessFlags::STATIC, "main", "([Ljava/lang/String;)V", vec![]);
/// let class = builder.build();
/// assert_eq!(class.name(), "com/example/Main");
/// ```
pub struct ClassBuilder {
    class: Class,
    /// Constants keyed by their debug rendering, which covers float bits too
    interned: HashMap<String, u16>,
}

impl ClassBuilder {
    pub fn new(name: &str, access_flags: AccessFlags) -> Self {
        let mut builder = Self {
            class: Class {
                origin: ClassOrigin::Program,
                major_version: 52,
                access_flags,
                constant_pool: ConstantPool::new(),
                this_class: 0,
                super_class: 0,
                interfaces: Vec::new(),
                fields: Vec::new(),
                methods: Vec::new(),
                attributes: Vec::new(),
                kotlin_metadata: None,
                processing_flags: ProcessingFlags::empty(),
                super_class_id: None,
                interface_ids: Vec::new(),
                subclasses: Vec::new(),
                mark: UsageMark::Unused,
            },
            interned: HashMap::new(),
        };
        builder.class.this_class = builder.class_constant(name);
        builder
    }

    /// Builder for a library class
    pub fn library(name: &str, access_flags: AccessFlags) -> Self {
        let mut builder = Self::new(name, access_flags);
        builder.class.origin = ClassOrigin::Library;
        builder
    }

    pub fn super_class(mut self, name: &str) -> Self {
        self.class.super_class = self.class_constant(name);
        self
    }

    pub fn interface(mut self, name: &str) -> Self {
        let index = self.class_constant(name);
        self.class.interfaces.push(index);
        self
    }

    pub fn kept(mut self) -> Self {
        self.class.processing_flags |= ProcessingFlags::DONT_SHRINK;
        self
    }

    /// Add a constant, reusing an identical existing entry
    pub fn constant(&mut self, constant: Constant) -> u16 {
        let key = format!("{constant:?}");
        if let Some(index) = self.interned.get(&key) {
            return *index;
        }
        let index = self.class.constant_pool.push(constant);
        self.interned.insert(key, index);
        index
    }

    pub fn utf8(&mut self, value: &str) -> u16 {
        self.constant(Constant::Utf8 {
            value: value.to_string(),
        })
    }

    pub fn class_constant(&mut self, name: &str) -> u16 {
        let name_index = self.utf8(name);
        self.constant(Constant::Class {
            name_index,
            referenced_class: None,
        })
    }

    pub fn string_constant(&mut self, value: &str) -> u16 {
        let string_index = self.utf8(value);
        self.constant(Constant::String {
            string_index,
            referenced_class: None,
        })
    }

    pub fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        self.constant(Constant::NameAndType {
            name_index,
            descriptor_index,
        })
    }

    fn ref_constant(&mut self, owner: &str, name: &str, descriptor: &str) -> RefConstant {
        RefConstant {
            class_index: self.class_constant(owner),
            name_and_type_index: self.name_and_type(name, descriptor),
            referenced_class: None,
            referenced_member: None,
        }
    }

    pub fn field_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        let r = self.ref_constant(owner, name, descriptor);
        self.constant(Constant::FieldRef(r))
    }

    pub fn method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        let r = self.ref_constant(owner, name, descriptor);
        self.constant(Constant::MethodRef(r))
    }

    pub fn interface_method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        let r = self.ref_constant(owner, name, descriptor);
        self.constant(Constant::InterfaceMethodRef(r))
    }

    pub fn method_handle(&mut self, reference_kind: u8, reference_index: u16) -> u16 {
        self.constant(Constant::MethodHandle {
            reference_kind,
            reference_index,
        })
    }

    pub fn method_type(&mut self, descriptor: &str) -> u16 {
        let descriptor_index = self.utf8(descriptor);
        self.constant(Constant::MethodType {
            descriptor_index,
            referenced_classes: Vec::new(),
        })
    }

    /// Append an entry to the BootstrapMethods attribute, creating it on demand
    pub fn bootstrap_method(&mut self, method_handle_index: u16, arguments: Vec<u16>) -> u16 {
        let entry = BootstrapMethod {
            method_handle_index,
            arguments,
            mark: UsageMark::Unused,
        };
        if let Some(position) = self.class.bootstrap_methods_index() {
            if let AttributeInfo::BootstrapMethods { methods } =
                &mut self.class.attributes[position].info
            {
                methods.push(entry);
                return (methods.len() - 1) as u16;
            }
        }
        let attribute = self.attribute(AttributeInfo::BootstrapMethods {
            methods: vec![entry],
        });
        self.class.attributes.push(attribute);
        0
    }

    pub fn invoke_dynamic(&mut self, bootstrap_method_index: u16, name: &str, descriptor: &str) -> u16 {
        let name_and_type_index = self.name_and_type(name, descriptor);
        self.constant(Constant::InvokeDynamic(DynamicConstant {
            bootstrap_method_index,
            name_and_type_index,
            referenced_classes: Vec::new(),
        }))
    }

    pub fn attribute(&mut self, info: AttributeInfo) -> Attribute {
        let name_index = self.utf8(info.name());
        Attribute::new(name_index, info)
    }

    /// Code attribute with the length derived from the instructions
    pub fn code(&mut self, instructions: Vec<Instruction>, attributes: Vec<Attribute>) -> Attribute {
        let code_length = instructions.iter().map(Instruction::length).sum();
        self.attribute(AttributeInfo::Code(CodeAttribute {
            max_stack: 2,
            max_locals: 1,
            code_length,
            instructions,
            exception_table: Vec::new(),
            attributes,
        }))
    }

    pub fn add_class_attribute(&mut self, info: AttributeInfo) {
        let attribute = self.attribute(info);
        self.class.attributes.push(attribute);
    }

    pub fn add_field(&mut self, access_flags: AccessFlags, name: &str, descriptor: &str) -> usize {
        self.add_field_with(access_flags, name, descriptor, Vec::new())
    }

    pub fn add_field_with(
        &mut self,
        access_flags: AccessFlags,
        name: &str,
        descriptor: &str,
        attributes: Vec<Attribute>,
    ) -> usize {
        let mut field = Member::new(access_flags, self.utf8(name), self.utf8(descriptor));
        field.attributes = attributes;
        self.class.fields.push(field);
        self.class.fields.len() - 1
    }

    /// Add a method; abstract and native methods get no Code attribute
    pub fn add_method(
        &mut self,
        access_flags: AccessFlags,
        name: &str,
        descriptor: &str,
        instructions: Vec<Instruction>,
    ) -> usize {
        let attributes = if access_flags.intersects(AccessFlags::ABSTRACT | AccessFlags::NATIVE) {
            Vec::new()
        } else {
            let mut body = instructions;
            if body.is_empty() {
                body.push(Instruction::Simple {
                    opcode: super::opcode::RETURN,
                });
            }
            vec![self.code(body, Vec::new())]
        };
        self.add_method_with(access_flags, name, descriptor, attributes)
    }

    pub fn add_method_with(
        &mut self,
        access_flags: AccessFlags,
        name: &str,
        descriptor: &str,
        attributes: Vec<Attribute>,
    ) -> usize {
        let mut method = Member::new(access_flags, self.utf8(name), self.utf8(descriptor));
        method.attributes = attributes;
        self.class.methods.push(method);
        self.class.methods.len() - 1
    }

    pub fn keep_field(&mut self, index: usize) {
        if let Some(field) = self.class.fields.get_mut(index) {
            field.processing_flags |= ProcessingFlags::DONT_SHRINK;
        }
    }

    pub fn keep_method(&mut self, index: usize) {
        if let Some(method) = self.class.methods.get_mut(index) {
            method.processing_flags |= ProcessingFlags::DONT_SHRINK;
        }
    }

    pub fn kotlin_metadata(&mut self, kind: KotlinMetadataKind) {
        self.class.kotlin_metadata = Some(KotlinMetadata::new(kind));
    }

    pub fn build(self) -> Class {
        self.class
    }
}
