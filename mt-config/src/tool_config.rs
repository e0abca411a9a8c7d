use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::ConfigError;

/// Overrides `build.cache_dir`.
pub const ENV_CACHE_DIR: &str = "MULTITOOL_CACHE_DIR";
/// Overrides `build.jobs`.
pub const ENV_JOBS: &str = "MULTITOOL_JOBS";

/// Root structure for the multitool configuration file
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ToolConfig {
    /// Resource build settings
    #[serde(default, skip_serializing_if = "BuildSettings::is_default")]
    pub build: BuildSettings,

    /// Extra or overriding compilers, keyed by file extension (without the dot)
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub compilers: IndexMap<String, CompilerEntry>,
}

/// Settings for the resource build pipeline
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BuildSettings {
    /// Shared compiled-resource cache; defaults to the user cache dir
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,

    /// Maximum number of compilers running at once; defaults to the CPU count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jobs: Option<usize>,

    /// Seconds a single compiler may run before it counts as failed
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Octal permission bits applied to written bundles (unix only)
    #[serde(default = "default_output_mode")]
    pub output_mode: String,

    /// Path segments that mark third-party assets
    #[serde(default = "default_vendor_dirs")]
    pub vendor_dirs: Vec<String>,
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_output_mode() -> String {
    "666".to_string()
}

fn default_vendor_dirs() -> Vec<String> {
    vec![
        "vendor".to_string(),
        "node_modules".to_string(),
        "bower_components".to_string(),
    ]
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            cache_dir: None,
            jobs: None,
            timeout_secs: default_timeout_secs(),
            output_mode: default_output_mode(),
            vendor_dirs: default_vendor_dirs(),
        }
    }
}

impl BuildSettings {
    /// Check if settings are at defaults
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    /// Effective worker count, never zero.
    pub fn effective_jobs(&self) -> usize {
        self.jobs.unwrap_or_else(num_cpus::get).max(1)
    }

    /// Per-compiler timeout; `0` disables it.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    /// Parses `output_mode` as octal permission bits.
    pub fn output_mode_bits(&self) -> Result<u32, ConfigError> {
        let trimmed = self.output_mode.trim().trim_start_matches("0o");
        let bits = u32::from_str_radix(trimmed, 8).map_err(|e| ConfigError::Invalid {
            field: "build.output_mode".into(),
            reason: format!("'{}' is not an octal mode: {}", self.output_mode, e),
        })?;
        if bits > 0o7777 {
            return Err(ConfigError::Invalid {
                field: "build.output_mode".into(),
                reason: format!("'{}' is out of range", self.output_mode),
            });
        }
        Ok(bits)
    }

    /// Cache directory, falling back to the per-user default location.
    pub fn resolved_cache_dir(&self) -> mt_core::error::Result<PathBuf> {
        match &self.cache_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(mt_core::user_paths::resource_cache_dir()?),
        }
    }
}

/// A compiler declared in configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompilerEntry {
    /// `script` or `style`
    pub category: String,
    /// Argument vector; `{path}` is replaced with the source file
    pub command: Vec<String>,
}

impl ToolConfig {
    /// Loads the configuration.
    ///
    /// An explicit path must exist. Without one, the global config file is
    /// used when present and defaults otherwise. Environment overrides are
    /// applied last.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound {
                        path: path.to_path_buf(),
                    });
                }
                Self::from_file(path)?
            }
            None => match mt_core::user_paths::global_config_path() {
                Ok(path) if path.exists() => Self::from_file(&path)?,
                _ => {
                    debug!("No global config file, using defaults");
                    Self::default()
                }
            },
        };

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parses a config file without applying overrides.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml_ng::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Applies `MULTITOOL_*` overrides read through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_CACHE_DIR).filter(|v| !v.is_empty()) {
            self.build.cache_dir = Some(PathBuf::from(dir));
        }
        if let Some(jobs) = lookup(ENV_JOBS).filter(|v| !v.is_empty()) {
            let parsed = jobs.parse::<usize>().map_err(|e| ConfigError::Invalid {
                field: ENV_JOBS.into(),
                reason: format!("'{}': {}", jobs, e),
            })?;
            self.build.jobs = Some(parsed);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.build.output_mode_bits()?;
        if self.build.jobs == Some(0) {
            return Err(ConfigError::Invalid {
                field: "build.jobs".into(),
                reason: "must be at least 1".into(),
            });
        }
        for (ext, entry) in &self.compilers {
            if entry.command.is_empty() {
                return Err(ConfigError::Invalid {
                    field: format!("compilers.{ext}.command"),
                    reason: "command cannot be empty".into(),
                });
            }
            if !matches!(entry.category.as_str(), "script" | "style") {
                return Err(ConfigError::Invalid {
                    field: format!("compilers.{ext}.category"),
                    reason: format!("expected 'script' or 'style', got '{}'", entry.category),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = ToolConfig::default();
        assert_eq!(config.build.timeout_secs, 300);
        assert_eq!(config.build.output_mode_bits().unwrap(), 0o666);
        assert_eq!(
            config.build.vendor_dirs,
            vec!["vendor", "node_modules", "bower_components"]
        );
        assert!(config.build.effective_jobs() >= 1);
        assert!(config.compilers.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
build:
  cache_dir: /var/cache/mt
  jobs: 3
  timeout_secs: 30
  output_mode: "644"
compilers:
  ts:
    category: script
    command: ["tsc", "--outFile", "/dev/stdout", "{path}"]
  styl:
    category: style
    command: ["stylus", "-p", "{path}"]
"#;
        let config: ToolConfig = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(config.build.cache_dir, Some(PathBuf::from("/var/cache/mt")));
        assert_eq!(config.build.effective_jobs(), 3);
        assert_eq!(config.build.timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.build.output_mode_bits().unwrap(), 0o644);
        // Declaration order is preserved
        let keys: Vec<_> = config.compilers.keys().cloned().collect();
        assert_eq!(keys, vec!["ts", "styl"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_timeout_disables_deadline() {
        let settings = BuildSettings {
            timeout_secs: 0,
            ..BuildSettings::default()
        };
        assert_eq!(settings.timeout(), None);
    }

    #[test]
    fn test_invalid_output_mode() {
        let settings = BuildSettings {
            output_mode: "rw-rw-rw-".into(),
            ..BuildSettings::default()
        };
        assert!(settings.output_mode_bits().is_err());

        let settings = BuildSettings {
            output_mode: "0o755".into(),
            ..BuildSettings::default()
        };
        assert_eq!(settings.output_mode_bits().unwrap(), 0o755);
    }

    #[test]
    fn test_validate_rejects_bad_compiler() {
        let mut config = ToolConfig::default();
        config.compilers.insert(
            "ts".into(),
            CompilerEntry {
                category: "markup".into(),
                command: vec!["tsc".into()],
            },
        );
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("compilers.ts.category"));

        config.compilers.insert(
            "ts".into(),
            CompilerEntry {
                category: "script".into(),
                command: vec![],
            },
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> =
            HashMap::from([(ENV_CACHE_DIR, "/tmp/mt-cache"), (ENV_JOBS, "7")]);
        let mut config = ToolConfig::default();
        config
            .apply_env_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.build.cache_dir, Some(PathBuf::from("/tmp/mt-cache")));
        assert_eq!(config.build.jobs, Some(7));
    }

    #[test]
    fn test_env_override_rejects_garbage_jobs() {
        let mut config = ToolConfig::default();
        let result = config.apply_env_overrides(|k| (k == ENV_JOBS).then(|| "many".to_string()));
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_load_explicit_missing_file() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope.yaml");
        assert!(matches!(
            ToolConfig::load(Some(missing.as_path())),
            Err(ConfigError::NotFound { .. })
        ));
    }

    #[test]
    fn test_load_explicit_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        fs::write(&path, "build:\n  timeout_secs: 12\n").unwrap();
        let config = ToolConfig::load(Some(path.as_path())).unwrap();
        assert_eq!(config.build.timeout_secs, 12);
        assert_eq!(config.build.output_mode, "666");
    }

    #[test]
    fn test_empty_file_is_default() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        fs::write(&path, "\n").unwrap();
        assert_eq!(ToolConfig::from_file(&path).unwrap(), ToolConfig::default());
    }

    #[test]
    fn test_parse_error_names_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        fs::write(&path, "build: [unclosed").unwrap();
        let err = ToolConfig::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("config.yaml"));
    }

    #[test]
    fn test_default_build_settings_not_serialized() {
        let yaml = serde_yaml_ng::to_string(&ToolConfig::default()).unwrap();
        assert!(!yaml.contains("build"));
    }
}
