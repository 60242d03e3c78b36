//! Kotlin metadata marking and shrinking

use classshrink::model::kotlin::{
    KotlinClassMetadata, KotlinMetadataKind, KotlinModality, KotlinProperty,
};
use classshrink::model::{opcode, AccessFlags, ClassBuilder, ClassPath, Instruction, Linker};
use classshrink::shrink::{ShrinkConfig, ShrinkPipeline, ShrinkSummary};
use serde_json::json;

fn metadata(value: serde_json::Value) -> KotlinMetadataKind {
    serde_json::from_value(value).expect("valid metadata")
}

fn shrink_with(path: &mut ClassPath, config: ShrinkConfig) -> ShrinkSummary {
    Linker::default().link(path);
    ShrinkPipeline::new(config)
        .run_with_seeds(path)
        .expect("shrinking should succeed")
}

fn shrink(path: &mut ClassPath) -> ShrinkSummary {
    shrink_with(path, ShrinkConfig::default())
}

fn class_metadata<'p>(path: &'p ClassPath, name: &str) -> &'p KotlinClassMetadata {
    let class = path.by_name(name).expect("class should survive");
    match class.kotlin_metadata.as_ref().map(|m| &m.kind) {
        Some(KotlinMetadataKind::Class(metadata)) => metadata,
        other => panic!("expected class metadata, got {other:?}"),
    }
}

fn property<'m>(metadata: &'m KotlinClassMetadata, name: &str) -> &'m KotlinProperty {
    metadata
        .container
        .properties
        .iter()
        .find(|p| p.name == name)
        .expect("property should survive")
}

/// `app/User` with a `var name: String` read through a kept getter and a
/// `var id: Int` whose accessors are unused
fn user_class() -> ClassPath {
    let mut path = ClassPath::new();
    let mut user = ClassBuilder::new("app/User", AccessFlags::PUBLIC | AccessFlags::FINAL)
        .super_class("java/lang/Object")
        .kept();
    user.add_field(AccessFlags::PRIVATE, "name", "Ljava/lang/String;");
    let id_field = user.add_field(AccessFlags::PRIVATE, "id", "I");
    user.keep_field(id_field);

    let name_ref = user.field_ref("app/User", "name", "Ljava/lang/String;");
    let getter = user.add_method(
        AccessFlags::PUBLIC | AccessFlags::FINAL,
        "getName",
        "()Ljava/lang/String;",
        vec![
            Instruction::Variable {
                opcode: opcode::ALOAD,
                slot: 0,
                constant: 0,
            },
            Instruction::Constant {
                opcode: opcode::GETFIELD,
                index: name_ref,
                constant: 0,
            },
            Instruction::Simple {
                opcode: opcode::ARETURN,
            },
        ],
    );
    user.keep_method(getter);
    user.add_method(AccessFlags::PUBLIC | AccessFlags::FINAL, "setName", "(Ljava/lang/String;)V", vec![]);
    user.add_method(AccessFlags::PUBLIC | AccessFlags::FINAL, "getId", "()I", vec![]);
    user.add_method(AccessFlags::PUBLIC | AccessFlags::FINAL, "setId", "(I)V", vec![]);

    user.kotlin_metadata(metadata(json!({
        "kind": "class",
        "class_name": "app/User",
        "properties": [
            {
                "name": "name",
                "flags": { "visibility": "public", "is_var": true, "has_getter": true, "has_setter": true },
                "type": { "class_name": "kotlin/String" },
                "backing_field": { "name": "name", "descriptor": "Ljava/lang/String;" },
                "getter": { "name": "getName", "descriptor": "()Ljava/lang/String;" },
                "setter": { "name": "setName", "descriptor": "(Ljava/lang/String;)V" }
            },
            {
                "name": "id",
                "flags": { "visibility": "public", "is_var": true, "has_getter": true, "has_setter": true },
                "type": { "class_name": "kotlin/Int" },
                "backing_field": { "name": "id", "descriptor": "I" },
                "getter": { "name": "getId", "descriptor": "()I" },
                "setter": { "name": "setId", "descriptor": "(I)V" }
            }
        ]
    })));
    path.add(user.build());
    path
}

#[test]
fn test_property_keeps_only_surviving_accessor() {
    let mut path = user_class();
    shrink(&mut path);

    let metadata = class_metadata(&path, "app/User");
    let name = property(metadata, "name");
    assert!(name.referenced_getter.is_some());
    assert!(name.getter.is_some());
    assert!(name.referenced_setter.is_none());
    assert!(name.setter.is_none());
    assert!(!name.flags.has_setter);
    assert!(name.referenced_backing_field.is_some());

    let user = path.by_name("app/User").unwrap();
    let field = user
        .fields
        .iter()
        .find(|f| f.name(&user.constant_pool) == "name")
        .expect("backing field survives");
    assert!(field.access_flags.is_private());
}

#[test]
fn test_backing_field_promoted_when_accessors_removed() {
    let mut path = user_class();
    shrink(&mut path);

    let metadata = class_metadata(&path, "app/User");
    let id = property(metadata, "id");
    assert!(id.getter.is_none());
    assert!(id.setter.is_none());
    assert!(!id.flags.has_getter);

    let user = path.by_name("app/User").unwrap();
    let field = user
        .fields
        .iter()
        .find(|f| f.name(&user.constant_pool) == "id")
        .expect("kept field survives");
    assert!(field.access_flags.is_public());
    assert!(!field.access_flags.is_private());

    // Member references were remapped to the compacted method list
    let getter = metadata.container.properties[0].referenced_getter.unwrap();
    assert_eq!(user.member_name(getter), Some(("getName", "()Ljava/lang/String;")));
}

#[test]
fn test_interface_function_without_default_impl_becomes_abstract() {
    let mut path = ClassPath::new();
    let mut greeter = ClassBuilder::new(
        "app/Greeter",
        AccessFlags::PUBLIC | AccessFlags::INTERFACE | AccessFlags::ABSTRACT,
    );
    greeter.add_method(AccessFlags::PUBLIC | AccessFlags::ABSTRACT, "greet", "()V", vec![]);
    greeter.kotlin_metadata(metadata(json!({
        "kind": "class",
        "class_name": "app/Greeter",
        "functions": [
            {
                "name": "greet",
                "flags": { "modality": "open" },
                "signature": { "name": "greet", "descriptor": "()V" },
                "return_type": { "class_name": "kotlin/Unit" },
                "default_impls_method": { "name": "greet", "descriptor": "(Lapp/Greeter;)V" }
            }
        ]
    })));
    path.add(greeter.build());

    let mut default_impls = ClassBuilder::new("app/Greeter$DefaultImpls", AccessFlags::PUBLIC | AccessFlags::FINAL)
        .super_class("java/lang/Object");
    default_impls.add_method(
        AccessFlags::PUBLIC | AccessFlags::STATIC,
        "greet",
        "(Lapp/Greeter;)V",
        vec![],
    );
    path.add(default_impls.build());

    let mut caller = ClassBuilder::new("app/Caller", AccessFlags::PUBLIC)
        .super_class("java/lang/Object")
        .kept();
    let greet = caller.interface_method_ref("app/Greeter", "greet", "()V");
    let call = caller.add_method(
        AccessFlags::PUBLIC,
        "call",
        "()V",
        vec![
            Instruction::Constant {
                opcode: opcode::INVOKEINTERFACE,
                index: greet,
                constant: 1,
            },
            Instruction::Simple {
                opcode: opcode::RETURN,
            },
        ],
    );
    caller.keep_method(call);
    path.add(caller.build());

    shrink(&mut path);

    assert!(path.find("app/Greeter$DefaultImpls").is_none());
    let metadata = class_metadata(&path, "app/Greeter");
    assert_eq!(metadata.container.functions.len(), 1);
    let function = &metadata.container.functions[0];
    assert!(function.default_impls_method.is_none());
    assert_eq!(function.flags.modality, KotlinModality::Abstract);
    assert!(metadata.referenced_default_impls_class.is_none());
}

#[test]
fn test_referenced_type_alias_survives() {
    let mut path = ClassPath::new();
    let mut aliases = ClassBuilder::new("app/AliasesKt", AccessFlags::PUBLIC | AccessFlags::FINAL)
        .super_class("java/lang/Object")
        .kept();
    aliases.kotlin_metadata(metadata(json!({
        "kind": "file_facade",
        "container": {
            "type_aliases": [
                {
                    "name": "Name",
                    "underlying_type": { "class_name": "app/Named" },
                    "expanded_type": { "class_name": "app/Named" }
                },
                {
                    "name": "Unused",
                    "underlying_type": { "class_name": "app/Other" },
                    "expanded_type": { "class_name": "app/Other" }
                }
            ]
        }
    })));
    path.add(aliases.build());
    path.add(ClassBuilder::new("app/Named", AccessFlags::PUBLIC).super_class("java/lang/Object").build());
    path.add(ClassBuilder::new("app/Other", AccessFlags::PUBLIC).super_class("java/lang/Object").build());

    let mut holder = ClassBuilder::new("app/Holder", AccessFlags::PUBLIC)
        .super_class("java/lang/Object")
        .kept();
    let field = holder.add_field(AccessFlags::PRIVATE, "label", "Ljava/lang/Object;");
    holder.keep_field(field);
    holder.kotlin_metadata(metadata(json!({
        "kind": "class",
        "class_name": "app/Holder",
        "properties": [
            {
                "name": "label",
                "flags": { "visibility": "private" },
                "type": { "type_alias_name": "app/Name" },
                "backing_field": { "name": "label", "descriptor": "Ljava/lang/Object;" }
            }
        ]
    })));
    path.add(holder.build());

    let summary = shrink(&mut path);

    let facade = path.by_name("app/AliasesKt").unwrap();
    let container = facade
        .kotlin_metadata
        .as_ref()
        .and_then(|m| m.container())
        .expect("facade metadata survives");
    let names: Vec<&str> = container.type_aliases.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["Name"]);
    assert!(path.find("app/Named").is_some());
    assert!(path.find("app/Other").is_none());
    assert!(summary.removed_metadata_nodes >= 1);
}

#[test]
fn test_metadata_stripped_when_not_processed() {
    let mut path = user_class();
    let config = ShrinkConfig {
        keep_kotlin_metadata: false,
        ..ShrinkConfig::default()
    };
    let summary = shrink_with(&mut path, config);

    assert!(path.by_name("app/User").unwrap().kotlin_metadata.is_none());
    assert_eq!(summary.removed_metadata_nodes, 1);
}
