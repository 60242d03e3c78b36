//! End-to-end marking and shrinking over class paths built in memory

use classshrink::keep::{KeepMatcher, KeepRule};
use classshrink::model::attribute::{InnerClass, LocalVariable, RecordComponent};
use classshrink::model::{
    opcode, AccessFlags, Annotation, AttributeInfo, Class, ClassBuilder, ClassPath, Constant,
    ElementValue, ElementValueKind, Instruction, Linker, UsageMark,
};
use classshrink::report::UsageReport;
use classshrink::shrink::{ShrinkConfig, ShrinkError, ShrinkPipeline, ShrinkSummary};

fn invoke(op: u8, index: u16) -> Instruction {
    Instruction::Constant {
        opcode: op,
        index,
        constant: 0,
    }
}

fn shrink(path: &mut ClassPath) -> ShrinkSummary {
    Linker::default().link(path);
    ShrinkPipeline::default()
        .run_with_seeds(path)
        .expect("shrinking should succeed")
}

fn method_names(path: &ClassPath, class: &str) -> Vec<String> {
    let class = path.by_name(class).expect("class should survive");
    class
        .methods
        .iter()
        .map(|m| m.name(&class.constant_pool).to_string())
        .collect()
}

fn field_names(path: &ClassPath, class: &str) -> Vec<String> {
    let class = path.by_name(class).expect("class should survive");
    class
        .fields
        .iter()
        .map(|m| m.name(&class.constant_pool).to_string())
        .collect()
}

fn class_attribute<'c>(class: &'c Class, name: &str) -> Option<&'c AttributeInfo> {
    class
        .attributes
        .iter()
        .map(|a| &a.info)
        .find(|info| info.name() == name)
}

fn interface(name: &str) -> ClassBuilder {
    let mut builder = ClassBuilder::new(
        name,
        AccessFlags::PUBLIC | AccessFlags::INTERFACE | AccessFlags::ABSTRACT,
    );
    builder.add_method(
        AccessFlags::PUBLIC | AccessFlags::ABSTRACT,
        "run",
        "()V",
        vec![],
    );
    builder
}

fn class_with_unused_private_method() -> ClassPath {
    let mut path = ClassPath::new();
    let mut a = ClassBuilder::new("com/example/A", AccessFlags::PUBLIC)
        .super_class("java/lang/Object")
        .kept();
    a.add_method(AccessFlags::PRIVATE, "foo", "()V", vec![]);
    let bar = a.add_method(AccessFlags::PUBLIC, "bar", "()V", vec![]);
    a.keep_method(bar);
    path.add(a.build());
    path
}

#[test]
fn test_unused_private_method_removed() {
    let mut path = class_with_unused_private_method();
    let summary = shrink(&mut path);

    assert_eq!(method_names(&path, "com/example/A"), vec!["bar"]);
    assert_eq!(summary.removed_methods, 1);

    let pool = &path.by_name("com/example/A").unwrap().constant_pool;
    assert!(pool.find_utf8("foo").is_none());
    // Shared with bar
    assert!(pool.find_utf8("()V").is_some());
}

#[test]
fn test_default_method_survives_through_used_implementation() {
    let mut path = ClassPath::new();
    let mut interface = ClassBuilder::new(
        "com/example/I",
        AccessFlags::PUBLIC | AccessFlags::INTERFACE | AccessFlags::ABSTRACT,
    );
    interface.add_method(AccessFlags::PUBLIC, "d", "()V", vec![]);
    path.add(interface.build());

    let mut x = ClassBuilder::new("com/example/X", AccessFlags::PUBLIC)
        .super_class("java/lang/Object")
        .interface("com/example/I")
        .kept();
    let d = x.interface_method_ref("com/example/I", "d", "()V");
    let run = x.add_method(
        AccessFlags::PUBLIC,
        "run",
        "()V",
        vec![
            Instruction::Constant {
                opcode: opcode::INVOKEINTERFACE,
                index: d,
                constant: 1,
            },
            Instruction::Simple {
                opcode: opcode::RETURN,
            },
        ],
    );
    x.keep_method(run);
    path.add(x.build());

    let mut y = ClassBuilder::new("com/example/Y", AccessFlags::PUBLIC)
        .super_class("java/lang/Object")
        .interface("com/example/I");
    y.add_method(AccessFlags::PUBLIC, "d", "()V", vec![]);
    path.add(y.build());

    let summary = shrink(&mut path);

    assert_eq!(method_names(&path, "com/example/I"), vec!["d"]);
    assert!(path.find("com/example/Y").is_none());
    assert_eq!(summary.removed_classes, 1);
    assert_eq!(
        path.by_name("com/example/X").unwrap().interface_names(),
        vec!["com/example/I"]
    );
}

fn field_typed_by_unreferenced_class() -> ClassPath {
    let mut path = ClassPath::new();
    let mut b = ClassBuilder::new("com/example/B", AccessFlags::PUBLIC)
        .super_class("java/lang/Object")
        .kept();
    let x = b.add_field(AccessFlags::PRIVATE, "x", "Lcom/example/C;");
    b.keep_field(x);
    path.add(b.build());

    let mut c = ClassBuilder::new("com/example/C", AccessFlags::PUBLIC).super_class("java/lang/Object");
    c.add_method(AccessFlags::PUBLIC, "unused", "()V", vec![]);
    path.add(c.build());
    path
}

#[test]
fn test_descriptor_class_is_retained() {
    let mut path = field_typed_by_unreferenced_class();
    let summary = shrink(&mut path);

    assert!(path.find("com/example/C").is_some());
    assert!(method_names(&path, "com/example/C").is_empty());
    assert_eq!(summary.removed_classes, 0);
    assert_eq!(summary.final_classes, 2);
}

#[test]
fn test_instruction_operands_follow_compacted_pool() {
    let mut path = ClassPath::new();
    let mut main = ClassBuilder::new("com/example/Main", AccessFlags::PUBLIC)
        .super_class("java/lang/Object")
        .kept();
    // Dead entries ahead of the live ones force every index to move
    main.utf8("junk1");
    main.string_constant("junk2");
    let helper = main.method_ref("com/example/Util", "helper", "()V");
    let count = main.field_ref("com/example/Util", "COUNT", "I");
    let hello = main.string_constant("hello");
    let method = main.add_method(
        AccessFlags::PUBLIC | AccessFlags::STATIC,
        "main",
        "([Ljava/lang/String;)V",
        vec![
            invoke(opcode::INVOKESTATIC, helper),
            invoke(opcode::GETSTATIC, count),
            invoke(opcode::LDC, hello),
            Instruction::Simple {
                opcode: opcode::RETURN,
            },
        ],
    );
    main.keep_method(method);
    path.add(main.build());

    let mut util = ClassBuilder::new("com/example/Util", AccessFlags::PUBLIC).super_class("java/lang/Object");
    util.add_method(AccessFlags::PUBLIC | AccessFlags::STATIC, "helper", "()V", vec![]);
    util.add_field(AccessFlags::PUBLIC | AccessFlags::STATIC, "COUNT", "I");
    path.add(util.build());

    let summary = shrink(&mut path);
    assert!(summary.removed_constants >= 2);

    let class = path.by_name("com/example/Main").unwrap();
    let pool = &class.constant_pool;
    assert!(pool.find_utf8("junk1").is_none());
    assert!(pool.find_utf8("junk2").is_none());

    let code = class.methods[0].code().expect("main has code");
    let operands: Vec<u16> = code
        .instructions
        .iter()
        .filter_map(|i| match i {
            Instruction::Constant { index, .. } => Some(*index),
            _ => None,
        })
        .collect();
    assert_eq!(operands.len(), 3);
    assert_eq!(
        pool.ref_target(operands[0]),
        Some(("com/example/Util", "helper", "()V"))
    );
    assert_eq!(
        pool.ref_target(operands[1]),
        Some(("com/example/Util", "COUNT", "I"))
    );
    match pool.get(operands[2]) {
        Some(Constant::String { string_index, .. }) => {
            assert_eq!(pool.utf8(*string_index), Some("hello"))
        }
        other => panic!("expected a string constant, got {other:?}"),
    }
    assert!(operands.iter().all(|i| (*i as usize) < pool.len()));
}

#[test]
fn test_nothing_used_is_fatal() {
    let mut path = ClassPath::new();
    path.add(ClassBuilder::new("com/example/Lonely", AccessFlags::PUBLIC).build());
    Linker::default().link(&mut path);

    let result = ShrinkPipeline::default().run_with_seeds(&mut path);
    assert!(matches!(result, Err(ShrinkError::EmptyOutput)));
    assert!(path.find("com/example/Lonely").is_some());
}

#[test]
fn test_nothing_used_with_ignore_warnings() {
    let mut path = ClassPath::new();
    path.add(ClassBuilder::new("com/example/Lonely", AccessFlags::PUBLIC).build());
    Linker::default().link(&mut path);

    let config = ShrinkConfig {
        ignore_warnings: true,
        ..ShrinkConfig::default()
    };
    let summary = ShrinkPipeline::new(config)
        .run_with_seeds(&mut path)
        .expect("warnings are ignored");
    assert_eq!(summary.final_classes, 0);
    assert_eq!(path.program_class_count(), 0);
}

#[test]
fn test_run_without_keep_rules_fails() {
    let mut path = class_with_unused_private_method();
    Linker::default().link(&mut path);
    let keep = KeepMatcher::new(&[]).unwrap();

    let result = ShrinkPipeline::default().run(&mut path, &keep);
    assert!(matches!(result, Err(ShrinkError::NoKeepRules)));
}

#[test]
fn test_keep_rules_select_entry_points() {
    let mut path = ClassPath::new();
    let mut main = ClassBuilder::new("com/example/Main", AccessFlags::PUBLIC).super_class("java/lang/Object");
    main.add_method(
        AccessFlags::PUBLIC | AccessFlags::STATIC,
        "main",
        "([Ljava/lang/String;)V",
        vec![],
    );
    main.add_method(AccessFlags::PUBLIC, "other", "()V", vec![]);
    path.add(main.build());
    path.add(ClassBuilder::new("com/example/Dead", AccessFlags::PUBLIC).build());
    Linker::default().link(&mut path);

    let rule: KeepRule = "com.example.Main#main([Ljava/lang/String;)V".parse().unwrap();
    let keep = KeepMatcher::new(&[rule]).unwrap();
    let summary = ShrinkPipeline::default().run(&mut path, &keep).unwrap();

    assert_eq!(method_names(&path, "com/example/Main"), vec!["main"]);
    assert!(path.find("com/example/Dead").is_none());
    assert_eq!(summary.original_classes, 2);
    assert_eq!(summary.final_classes, 1);
}

#[test]
fn test_second_run_removes_nothing() {
    let mut path = field_typed_by_unreferenced_class();
    shrink(&mut path);

    let again = ShrinkPipeline::default()
        .run_with_seeds(&mut path)
        .expect("second run succeeds");
    assert_eq!(again.removed_classes, 0);
    assert_eq!(again.removed_fields, 0);
    assert_eq!(again.removed_methods, 0);
    assert_eq!(again.removed_constants, 0);
    assert_eq!(again.final_classes, again.original_classes);
}

#[test]
fn test_unused_bootstrap_method_is_dropped() {
    let mut path = ClassPath::new();
    let mut lambda = ClassBuilder::new("com/example/Lambdas", AccessFlags::PUBLIC)
        .super_class("java/lang/Object")
        .kept();
    let unused = lambda.method_ref("com/example/Factory", "unused", "()V");
    let unused = lambda.method_handle(6, unused);
    lambda.bootstrap_method(unused, vec![]);
    let factory = lambda.method_ref(
        "java/lang/invoke/LambdaMetafactory",
        "metafactory",
        "()Ljava/lang/invoke/CallSite;",
    );
    let factory = lambda.method_handle(6, factory);
    let bootstrap = lambda.bootstrap_method(factory, vec![]);
    assert_eq!(bootstrap, 1);
    let indy = lambda.invoke_dynamic(bootstrap, "run", "()Ljava/lang/Runnable;");
    let method = lambda.add_method(
        AccessFlags::PUBLIC,
        "make",
        "()Ljava/lang/Runnable;",
        vec![
            invoke(opcode::INVOKEDYNAMIC, indy),
            Instruction::Simple {
                opcode: opcode::ARETURN,
            },
        ],
    );
    lambda.keep_method(method);
    path.add(lambda.build());

    shrink(&mut path);

    let class = path.by_name("com/example/Lambdas").unwrap();
    let position = class.bootstrap_methods_index().expect("attribute kept");
    let AttributeInfo::BootstrapMethods { methods } = &class.attributes[position].info else {
        panic!("expected BootstrapMethods");
    };
    assert_eq!(methods.len(), 1);
    assert_eq!(
        class.constant_pool.ref_target(
            match class.constant_pool.get(methods[0].method_handle_index) {
                Some(Constant::MethodHandle {
                    reference_index, ..
                }) => *reference_index,
                other => panic!("expected a method handle, got {other:?}"),
            }
        ),
        Some((
            "java/lang/invoke/LambdaMetafactory",
            "metafactory",
            "()Ljava/lang/invoke/CallSite;"
        ))
    );
    let indices: Vec<u16> = class
        .constant_pool
        .iter()
        .filter_map(|(_, c, _)| match c {
            Constant::InvokeDynamic(d) => Some(d.bootstrap_method_index),
            _ => None,
        })
        .collect();
    assert_eq!(indices, vec![0]);
    assert!(class.constant_pool.find_utf8("unused").is_none());
}

#[test]
fn test_signature_of_removed_class_becomes_object() {
    let mut path = ClassPath::new();
    let mut holder = ClassBuilder::new("com/example/Holder", AccessFlags::PUBLIC)
        .super_class("java/lang/Object")
        .kept();
    let signature_index = holder.utf8("Ljava/util/List<Lcom/example/Gone;>;");
    let signature = holder.attribute(AttributeInfo::Signature {
        signature_index,
        referenced_classes: Vec::new(),
    });
    let field = holder.add_field_with(
        AccessFlags::PRIVATE,
        "items",
        "Ljava/util/List;",
        vec![signature],
    );
    holder.keep_field(field);
    path.add(holder.build());
    path.add(ClassBuilder::new("com/example/Gone", AccessFlags::PUBLIC).build());

    shrink(&mut path);

    assert!(path.find("com/example/Gone").is_none());
    let class = path.by_name("com/example/Holder").unwrap();
    let AttributeInfo::Signature {
        signature_index, ..
    } = &class.fields[0].attributes[0].info
    else {
        panic!("expected the Signature attribute");
    };
    assert_eq!(
        class.constant_pool.utf8(*signature_index),
        Some("Ljava/util/List<Ljava/lang/Object;>;")
    );
    assert!(class
        .constant_pool
        .find_utf8("Ljava/util/List<Lcom/example/Gone;>;")
        .is_none());
}

#[test]
fn test_usage_report_lists_removals() {
    let mut path = class_with_unused_private_method();
    path.add(ClassBuilder::new("com/example/Dead", AccessFlags::PUBLIC).build());
    Linker::default().link(&mut path);

    let mut usage = UsageReport::new();
    ShrinkPipeline::default()
        .with_usage_sink(&mut usage)
        .run_with_seeds(&mut path)
        .unwrap();

    assert!(usage.is_member_removed("com.example.A", "foo"));
    assert!(!usage.is_member_removed("com.example.A", "bar"));
    assert!(usage.is_class_removed("com.example.Dead"));

    let reparsed = UsageReport::parse_content(&usage.render());
    assert_eq!(reparsed.len(), usage.len());
}

#[test]
fn test_explains_why_class_is_kept() {
    let mut path = field_typed_by_unreferenced_class();
    Linker::default().link(&mut path);

    let query = KeepMatcher::new(&["com.example.C".parse().unwrap()]).unwrap();
    let summary = ShrinkPipeline::default()
        .why_are_you_keeping(query)
        .run_with_seeds(&mut path)
        .unwrap();

    assert_eq!(summary.explanations.len(), 1);
    let explanation = &summary.explanations[0];
    assert!(explanation.kept);
    assert_eq!(explanation.target, "com.example.C");
    assert_eq!(explanation.chain.first().map(String::as_str), Some("keep rules"));
    assert_eq!(explanation.chain.last().map(String::as_str), Some("com.example.C"));
}

#[test]
fn test_interface_follows_its_implementations() {
    let mut path = ClassPath::new();
    path.add(interface("p/I").build());
    let mut x = ClassBuilder::new("p/X", AccessFlags::PUBLIC)
        .super_class("java/lang/Object")
        .interface("p/I")
        .kept();
    let run = x.add_method(AccessFlags::PUBLIC, "run", "()V", vec![]);
    x.keep_method(run);
    path.add(x.build());

    path.add(interface("p/J").build());
    path.add(
        ClassBuilder::new("p/Y", AccessFlags::PUBLIC)
            .super_class("java/lang/Object")
            .interface("p/J")
            .build(),
    );

    shrink(&mut path);

    assert!(path.find("p/I").is_some());
    assert_eq!(path.by_name("p/X").unwrap().interface_names(), vec!["p/I"]);
    assert!(path.find("p/J").is_none());
    assert!(path.find("p/Y").is_none());
}

#[test]
fn test_enum_constant_in_annotation_keeps_its_field() {
    let mut path = ClassPath::new();
    let mut e = ClassBuilder::new(
        "p/E",
        AccessFlags::PUBLIC | AccessFlags::FINAL | AccessFlags::ENUM,
    )
    .super_class("java/lang/Enum")
    .kept();
    let flags = AccessFlags::PUBLIC | AccessFlags::STATIC | AccessFlags::FINAL | AccessFlags::ENUM;
    e.add_field(flags, "A", "Lp/E;");
    e.add_field(flags, "B", "Lp/E;");
    path.add(e.build());

    let mut ann = ClassBuilder::new(
        "p/Ann",
        AccessFlags::PUBLIC | AccessFlags::INTERFACE | AccessFlags::ABSTRACT | AccessFlags::ANNOTATION,
    )
    .kept();
    let value = ann.add_method(
        AccessFlags::PUBLIC | AccessFlags::ABSTRACT,
        "value",
        "()Lp/E;",
        vec![],
    );
    ann.keep_method(value);
    path.add(ann.build());

    let mut k = ClassBuilder::new("p/K", AccessFlags::PUBLIC)
        .super_class("java/lang/Object")
        .kept();
    let element = ElementValue::new(
        k.utf8("value"),
        ElementValueKind::EnumConstant {
            type_name_index: k.utf8("Lp/E;"),
            const_name_index: k.utf8("A"),
            referenced_classes: Vec::new(),
            referenced_field: None,
        },
    );
    let annotation = Annotation::new(k.utf8("Lp/Ann;"), vec![element]);
    k.add_class_attribute(AttributeInfo::Annotations {
        visible: true,
        annotations: vec![annotation],
    });
    path.add(k.build());

    shrink(&mut path);

    let k = path.by_name("p/K").unwrap();
    let Some(AttributeInfo::Annotations { annotations, .. }) =
        class_attribute(k, "RuntimeVisibleAnnotations")
    else {
        panic!("annotation should survive");
    };
    assert_eq!(annotations[0].elements.len(), 1);
    assert_eq!(field_names(&path, "p/E"), vec!["A"]);
}

#[test]
fn test_annotation_of_removed_type_drops_attribute() {
    let mut path = ClassPath::new();
    let mut tagged = ClassBuilder::new("p/Tagged", AccessFlags::PUBLIC)
        .super_class("java/lang/Object")
        .kept();
    let annotation = Annotation::new(tagged.utf8("Lp/Gone;"), Vec::new());
    tagged.add_class_attribute(AttributeInfo::Annotations {
        visible: true,
        annotations: vec![annotation],
    });
    path.add(tagged.build());
    path.add(
        ClassBuilder::new(
            "p/Gone",
            AccessFlags::PUBLIC | AccessFlags::INTERFACE | AccessFlags::ABSTRACT | AccessFlags::ANNOTATION,
        )
        .build(),
    );

    let summary = shrink(&mut path);

    assert!(path.find("p/Gone").is_none());
    let tagged = path.by_name("p/Tagged").unwrap();
    assert!(class_attribute(tagged, "RuntimeVisibleAnnotations").is_none());
    assert!(tagged.constant_pool.find_utf8("Lp/Gone;").is_none());
    assert!(tagged.constant_pool.find_utf8("RuntimeVisibleAnnotations").is_none());
    assert!(summary.removed_attributes >= 1);
}

#[test]
fn test_inner_class_entry_of_removed_outer_is_dropped() {
    let mut path = ClassPath::new();
    let mut host = ClassBuilder::new("p/Host", AccessFlags::PUBLIC)
        .super_class("java/lang/Object")
        .kept();
    let entries = vec![
        InnerClass {
            inner_class_index: host.class_constant("p/Host$Kept"),
            outer_class_index: host.class_constant("p/Host"),
            inner_name_index: host.utf8("Kept"),
            access_flags: AccessFlags::PUBLIC | AccessFlags::STATIC,
            mark: UsageMark::Unused,
        },
        InnerClass {
            inner_class_index: host.class_constant("p/Host"),
            outer_class_index: host.class_constant("p/Gone"),
            inner_name_index: host.utf8("Host"),
            access_flags: AccessFlags::PUBLIC | AccessFlags::STATIC,
            mark: UsageMark::Unused,
        },
    ];
    host.add_class_attribute(AttributeInfo::InnerClasses { classes: entries });
    path.add(host.build());
    path.add(
        ClassBuilder::new("p/Host$Kept", AccessFlags::PUBLIC)
            .super_class("java/lang/Object")
            .kept()
            .build(),
    );
    path.add(ClassBuilder::new("p/Gone", AccessFlags::PUBLIC).build());

    shrink(&mut path);

    assert!(path.find("p/Gone").is_none());
    let host = path.by_name("p/Host").unwrap();
    let Some(AttributeInfo::InnerClasses { classes }) = class_attribute(host, "InnerClasses") else {
        panic!("InnerClasses should survive with one entry");
    };
    assert_eq!(classes.len(), 1);
    assert_eq!(
        host.constant_pool.class_name(classes[0].inner_class_index),
        Some("p/Host$Kept")
    );
    assert!(host.constant_pool.find_utf8("p/Gone").is_none());
}

#[test]
fn test_nest_members_keep_only_surviving_classes() {
    let mut path = ClassPath::new();
    let mut host = ClassBuilder::new("p/Host", AccessFlags::PUBLIC)
        .super_class("java/lang/Object")
        .kept();
    let members = vec![
        host.class_constant("p/Host$A"),
        host.class_constant("p/Host$B"),
    ];
    host.add_class_attribute(AttributeInfo::NestMembers { classes: members });
    path.add(host.build());
    path.add(
        ClassBuilder::new("p/Host$A", AccessFlags::PUBLIC)
            .super_class("java/lang/Object")
            .kept()
            .build(),
    );
    path.add(ClassBuilder::new("p/Host$B", AccessFlags::PUBLIC).build());

    shrink(&mut path);

    assert!(path.find("p/Host$B").is_none());
    let host = path.by_name("p/Host").unwrap();
    let Some(AttributeInfo::NestMembers { classes }) = class_attribute(host, "NestMembers") else {
        panic!("NestMembers should survive");
    };
    let names: Vec<&str> = classes
        .iter()
        .filter_map(|index| host.constant_pool.class_name(*index))
        .collect();
    assert_eq!(names, vec!["p/Host$A"]);
}

#[test]
fn test_record_component_follows_its_field() {
    let mut path = ClassPath::new();
    let mut point = ClassBuilder::new("p/Point", AccessFlags::PUBLIC | AccessFlags::FINAL)
        .super_class("java/lang/Record")
        .kept();
    let x = point.add_field(AccessFlags::PRIVATE | AccessFlags::FINAL, "x", "I");
    point.add_field(AccessFlags::PRIVATE | AccessFlags::FINAL, "y", "I");
    point.keep_field(x);
    let components = ["x", "y"]
        .into_iter()
        .map(|name| RecordComponent {
            name_index: point.utf8(name),
            descriptor_index: point.utf8("I"),
            attributes: Vec::new(),
            referenced_field: None,
            mark: UsageMark::Unused,
        })
        .collect();
    point.add_class_attribute(AttributeInfo::Record { components });
    path.add(point.build());

    shrink(&mut path);

    assert_eq!(field_names(&path, "p/Point"), vec!["x"]);
    let point = path.by_name("p/Point").unwrap();
    let Some(AttributeInfo::Record { components }) = class_attribute(point, "Record") else {
        panic!("Record should survive");
    };
    assert_eq!(components.len(), 1);
    assert_eq!(point.constant_pool.utf8(components[0].name_index), Some("x"));
    assert!(point.constant_pool.find_utf8("y").is_none());
}

#[test]
fn test_local_variable_of_removed_type_is_dropped() {
    let mut path = ClassPath::new();
    let mut worker = ClassBuilder::new("p/Worker", AccessFlags::PUBLIC)
        .super_class("java/lang/Object")
        .kept();
    let variables = [("this", "Lp/Worker;"), ("ghost", "Lp/Ghost;")]
        .into_iter()
        .enumerate()
        .map(|(slot, (name, descriptor))| LocalVariable {
            start_pc: 0,
            length: 1,
            name_index: worker.utf8(name),
            descriptor_index: worker.utf8(descriptor),
            index: slot as u16,
            referenced_classes: Vec::new(),
            mark: UsageMark::Unused,
        })
        .collect();
    let table = worker.attribute(AttributeInfo::LocalVariableTable { variables });
    let code = worker.code(
        vec![Instruction::Simple {
            opcode: opcode::RETURN,
        }],
        vec![table],
    );
    let run = worker.add_method_with(AccessFlags::PUBLIC, "run", "()V", vec![code]);
    worker.keep_method(run);
    path.add(worker.build());
    path.add(ClassBuilder::new("p/Ghost", AccessFlags::PUBLIC).build());

    shrink(&mut path);

    assert!(path.find("p/Ghost").is_none());
    let worker = path.by_name("p/Worker").unwrap();
    let code = worker.methods[0].code().expect("run has code");
    let Some(AttributeInfo::LocalVariableTable { variables }) =
        code.attributes.first().map(|a| &a.info)
    else {
        panic!("LocalVariableTable should survive");
    };
    assert_eq!(variables.len(), 1);
    assert_eq!(worker.constant_pool.utf8(variables[0].name_index), Some("this"));
    assert!(worker.constant_pool.find_utf8("Lp/Ghost;").is_none());
}
