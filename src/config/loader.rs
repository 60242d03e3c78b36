use miette::{IntoDiagnostic, Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::keep::{KeepError, KeepMatcher, KeepRule};
use crate::report::ReportFormat;
use crate::shrink::ShrinkConfig;

/// Configuration for a shrinking run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Entry points; everything not reachable from them is removed
    pub keep: Vec<KeepRule>,

    /// Shrinking configuration
    pub shrink: ShrinkConfig,

    /// Report configuration
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Output format: terminal or json
    pub format: ReportFormat,

    /// Write the removed classes and members to this file
    pub print_usage: Option<PathBuf>,

    /// Keep-rule patterns whose reasons for being kept are printed
    pub why_are_you_keeping: Vec<String>,
}

impl Config {
    /// Load configuration from a file (YAML or TOML)
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        match extension {
            "yml" | "yaml" => serde_yaml::from_str(&contents)
                .into_diagnostic()
                .wrap_err("Failed to parse YAML config"),
            "toml" => toml::from_str(&contents)
                .into_diagnostic()
                .wrap_err("Failed to parse TOML config"),
            _ => {
                // Try YAML first, then TOML
                if let Ok(config) = serde_yaml::from_str(&contents) {
                    Ok(config)
                } else {
                    toml::from_str(&contents)
                        .into_diagnostic()
                        .wrap_err("Failed to parse config file")
                }
            }
        }
    }

    /// Try to load configuration from default locations
    pub fn from_default_locations(project_root: &Path) -> Result<Self> {
        let default_names = [
            ".classshrink.yml",
            ".classshrink.yaml",
            ".classshrink.toml",
            "classshrink.yml",
            "classshrink.yaml",
            "classshrink.toml",
        ];

        for name in &default_names {
            let path = project_root.join(name);
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Compile the keep section
    pub fn keep_matcher(&self) -> Result<KeepMatcher, KeepError> {
        KeepMatcher::new(&self.keep)
    }

    /// Compile the `why_are_you_keeping` queries
    pub fn explanation_queries(&self) -> Result<KeepMatcher, KeepError> {
        let rules = self
            .report
            .why_are_you_keeping
            .iter()
            .map(|pattern| pattern.parse::<KeepRule>())
            .collect::<Result<Vec<_>, _>>()?;
        KeepMatcher::new(&rules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.keep.is_empty());
        assert!(config.shrink.keep_kotlin_metadata);
        assert!(config.shrink.link_class_strings);
        assert_eq!(config.report.format, ReportFormat::Terminal);
    }

    #[test]
    fn test_yaml_config() {
        let yaml = r#"
keep:
  - class: "com.example.Main"
    members:
      - name: "main"
  - class: "com.example.api.**"
shrink:
  keep_kotlin_metadata: false
report:
  format: json
  why_are_you_keeping: ["com.example.Util"]
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.keep.len(), 2);
        assert_eq!(config.keep[0].members[0].name, "main");
        assert!(config.keep[1].keep_class);
        assert!(!config.shrink.keep_kotlin_metadata);
        assert!(config.shrink.link_class_strings);
        assert_eq!(config.report.format, ReportFormat::Json);
        assert_eq!(config.explanation_queries().unwrap().len(), 1);
    }

    #[test]
    fn test_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("classshrink.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[[keep]]
class = "com.example.Main"

[shrink]
ignore_warnings = true
"#
        )
        .unwrap();

        let config = Config::from_default_locations(dir.path()).unwrap();
        assert_eq!(config.keep[0].class, "com.example.Main");
        assert!(config.shrink.ignore_warnings);
        assert!(!config.keep_matcher().unwrap().is_empty());
    }
}
