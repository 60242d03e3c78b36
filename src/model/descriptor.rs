//! Helpers for JVM field and method descriptors

pub const INSTANCE_INITIALIZER: &str = "<init>";
pub const CLASS_INITIALIZER: &str = "<clinit>";
pub const METHOD_TYPE_INITIALIZER: &str = "()V";
pub const JAVA_LANG_OBJECT: &str = "java/lang/Object";

pub fn is_initializer(name: &str) -> bool {
    name == INSTANCE_INITIALIZER || name == CLASS_INITIALIZER
}

/// Internal names of all classes mentioned in a descriptor, in order
pub fn class_names(descriptor: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut rest = descriptor;
    while let Some(start) = rest.find('L') {
        let after = &rest[start + 1..];
        match after.find(';') {
            Some(end) => {
                names.push(&after[..end]);
                rest = &after[end + 1..];
            }
            None => break,
        }
    }
    names
}

pub fn to_external(internal: &str) -> String {
    internal.replace('/', ".")
}

pub fn to_internal(external: &str) -> String {
    external.replace('.', "/")
}

/// Simple name of a class, after the last package separator
pub fn simple_name(internal: &str) -> &str {
    internal.rsplit('/').next().unwrap_or(internal)
}

/// Package of an internal class name, empty for the default package
pub fn package_name(internal: &str) -> &str {
    internal.rfind('/').map(|i| &internal[..i]).unwrap_or("")
}

/// Java source spelling of a field type descriptor, e.g. `[Ljava/lang/String;`
/// becomes `java.lang.String[]`
pub fn external_type(descriptor: &str) -> String {
    let dims = descriptor.chars().take_while(|c| *c == '[').count();
    let element = &descriptor[dims..];
    let base = match element {
        "B" => "byte".to_string(),
        "C" => "char".to_string(),
        "D" => "double".to_string(),
        "F" => "float".to_string(),
        "I" => "int".to_string(),
        "J" => "long".to_string(),
        "S" => "short".to_string(),
        "Z" => "boolean".to_string(),
        "V" => "void".to_string(),
        _ if element.starts_with('L') && element.ends_with(';') => {
            to_external(&element[1..element.len() - 1])
        }
        other => other.to_string(),
    };
    format!("{}{}", base, "[]".repeat(dims))
}

/// Split a method descriptor into parameter descriptors and return descriptor
pub fn method_parts(descriptor: &str) -> Option<(Vec<&str>, &str)> {
    let inner = descriptor.strip_prefix('(')?;
    let close = inner.find(')')?;
    let (params, ret) = (&inner[..close], &inner[close + 1..]);

    let mut parameters = Vec::new();
    let bytes = params.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let start = i;
        while bytes[i] == b'[' {
            i += 1;
            if i >= bytes.len() {
                return None;
            }
        }
        if bytes[i] == b'L' {
            i += params[i..].find(';')? + 1;
        } else {
            i += 1;
        }
        parameters.push(&params[start..i]);
    }
    Some((parameters, ret))
}

/// Java-like rendering of a method, e.g. `void run(int,java.lang.String)`
pub fn external_method(class_name: &str, name: &str, descriptor: &str) -> String {
    let Some((parameters, ret)) = method_parts(descriptor) else {
        return format!("{name}{descriptor}");
    };
    let parameters: Vec<String> = parameters.iter().map(|p| external_type(p)).collect();
    if name == INSTANCE_INITIALIZER {
        format!("{}({})", simple_name(class_name), parameters.join(","))
    } else {
        format!("{} {}({})", external_type(ret), name, parameters.join(","))
    }
}
