use serde::{Deserialize, Serialize};

use super::{Class, ClassOrigin, ClassPath, KotlinModule};

/// Serialized form of a class path: the input and output of the shrinker
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub program: Vec<Class>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub library: Vec<Class>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kotlin_modules: Vec<KotlinModule>,
}

impl Snapshot {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn merge(&mut self, other: Snapshot) {
        self.program.extend(other.program);
        self.library.extend(other.library);
        self.kotlin_modules.extend(other.kotlin_modules);
    }

    /// Build the arena. Program classes are added first so they win over
    /// library classes with the same name.
    pub fn into_class_path(self) -> ClassPath {
        let mut path = ClassPath::new();
        for mut class in self.program {
            class.origin = ClassOrigin::Program;
            path.add(class);
        }
        for mut class in self.library {
            class.origin = ClassOrigin::Library;
            path.add(class);
        }
        path.kotlin_modules = self.kotlin_modules;
        path
    }

    pub fn from_class_path(path: &ClassPath) -> Self {
        let mut snapshot = Snapshot {
            kotlin_modules: path.kotlin_modules.clone(),
            ..Snapshot::default()
        };
        for (_, class) in path.classes() {
            if class.is_library() {
                snapshot.library.push(class.clone());
            } else {
                snapshot.program.push(class.clone());
            }
        }
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AccessFlags, ClassBuilder};

    #[test]
    fn test_snapshot_round_trip_preserves_origin() {
        let mut snapshot = Snapshot::default();
        snapshot
            .program
            .push(ClassBuilder::new("a/Main", AccessFlags::PUBLIC).build());
        snapshot
            .library
            .push(ClassBuilder::library("java/lang/Object", AccessFlags::PUBLIC).build());

        let json = snapshot.to_json().unwrap();
        let path = Snapshot::from_json(&json).unwrap().into_class_path();

        assert_eq!(path.len(), 2);
        assert!(path.by_name("java/lang/Object").unwrap().is_library());
        assert!(!path.by_name("a/Main").unwrap().is_library());
    }

    #[test]
    fn test_program_class_wins_over_library_duplicate() {
        let mut snapshot = Snapshot::default();
        snapshot
            .program
            .push(ClassBuilder::new("a/Dup", AccessFlags::PUBLIC).build());
        snapshot
            .library
            .push(ClassBuilder::library("a/Dup", AccessFlags::PUBLIC).build());

        let path = snapshot.into_class_path();
        assert_eq!(path.len(), 1);
        assert!(!path.by_name("a/Dup").unwrap().is_library());
    }
}
