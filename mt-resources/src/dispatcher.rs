//! Extension → external compiler registry.
//!
//! The registry performs no I/O. Each compilable extension maps to exactly
//! one argv template; `{path}` in the template is replaced with the source
//! path, or the path is appended when no argument mentions it.

use indexmap::IndexMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use mt_config::ToolConfig;

use crate::error::PipelineError;

/// Placeholder replaced with the source path in compiler templates.
pub const PATH_TOKEN: &str = "{path}";

/// Which pair of bundles an asset belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetCategory {
    Script,
    Style,
}

impl FromStr for AssetCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "script" => Ok(Self::Script),
            "style" => Ok(Self::Style),
            other => Err(format!("unknown category '{other}' (expected script or style)")),
        }
    }
}

impl fmt::Display for AssetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Script => f.write_str("script"),
            Self::Style => f.write_str("style"),
        }
    }
}

/// How to compile one extension
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerSpec {
    pub category: AssetCategory,
    /// argv template, program first
    pub command: Vec<String>,
}

impl CompilerSpec {
    pub fn new<S: Into<String>>(
        category: AssetCategory,
        command: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            category,
            command: command.into_iter().map(Into::into).collect(),
        }
    }
}

/// A concrete command line for one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerInvocation {
    pub program: String,
    pub args: Vec<String>,
}

impl fmt::Display for CompilerInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Open-ended mapping from file extension to compiler.
#[derive(Debug, Clone)]
pub struct CompilerRegistry {
    compilers: IndexMap<String, CompilerSpec>,
    /// Extensions already in final form, bundled as-is
    raw: IndexMap<String, AssetCategory>,
}

impl Default for CompilerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl CompilerRegistry {
    /// Registry with no compilers and no raw extensions.
    pub fn empty() -> Self {
        Self {
            compilers: IndexMap::new(),
            raw: IndexMap::new(),
        }
    }

    /// CoffeeScript, ES2015, Less and Sass compilers plus raw `.js`/`.css`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(
            "coffee",
            CompilerSpec::new(AssetCategory::Script, ["coffee", "-p", "-c", PATH_TOKEN]),
        );
        registry.register(
            "es",
            CompilerSpec::new(
                AssetCategory::Script,
                ["babel", "--presets", "es2015", PATH_TOKEN],
            ),
        );
        registry.register(
            "less",
            CompilerSpec::new(AssetCategory::Style, ["lessc", PATH_TOKEN]),
        );
        registry.register(
            "scss",
            CompilerSpec::new(AssetCategory::Style, ["sass", PATH_TOKEN]),
        );
        registry.register_raw("js", AssetCategory::Script);
        registry.register_raw("css", AssetCategory::Style);
        registry
    }

    /// Defaults overlaid with the `compilers` table from configuration.
    pub fn from_config(config: &ToolConfig) -> Result<Self, PipelineError> {
        let mut registry = Self::with_defaults();
        for (extension, entry) in &config.compilers {
            let category = entry.category.parse::<AssetCategory>().map_err(|reason| {
                PipelineError::InvalidCompiler {
                    extension: extension.clone(),
                    reason,
                }
            })?;
            if entry.command.is_empty() {
                return Err(PipelineError::InvalidCompiler {
                    extension: extension.clone(),
                    reason: "command is empty".to_string(),
                });
            }
            registry.register(extension, CompilerSpec::new(category, entry.command.clone()));
        }
        Ok(registry)
    }

    /// Adds or replaces the compiler for `extension` (without the dot).
    ///
    /// A compiled extension stops being raw.
    pub fn register(&mut self, extension: &str, spec: CompilerSpec) {
        let extension = normalize(extension);
        self.raw.shift_remove(&extension);
        self.compilers.insert(extension, spec);
    }

    /// Marks `extension` as already in final form.
    pub fn register_raw(&mut self, extension: &str, category: AssetCategory) {
        let extension = normalize(extension);
        self.compilers.shift_remove(&extension);
        self.raw.insert(extension, category);
    }

    /// Command line compiling `path`, or `None` if its extension has no compiler.
    pub fn dispatch(&self, path: &Path) -> Option<CompilerInvocation> {
        let spec = self.compilers.get(&extension_of(path)?)?;
        if spec.command.is_empty() {
            return None;
        }
        let path_arg = path.to_string_lossy();

        let mut substituted = false;
        let mut argv: Vec<String> = spec
            .command
            .iter()
            .map(|part| {
                if part.contains(PATH_TOKEN) {
                    substituted = true;
                    part.replace(PATH_TOKEN, &path_arg)
                } else {
                    part.clone()
                }
            })
            .collect();
        if !substituted {
            argv.push(path_arg.into_owned());
        }
        let program = argv.remove(0);
        Some(CompilerInvocation {
            program,
            args: argv,
        })
    }

    pub fn is_compilable(&self, path: &Path) -> bool {
        extension_of(path).is_some_and(|ext| self.compilers.contains_key(&ext))
    }

    /// Category of a compiled or raw extension.
    pub fn category_of(&self, path: &Path) -> Option<AssetCategory> {
        let extension = extension_of(path)?;
        self.compilers
            .get(&extension)
            .map(|spec| spec.category)
            .or_else(|| self.raw.get(&extension).copied())
    }

    /// Registered compiled extensions, in registration order.
    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.compilers.keys().map(String::as_str)
    }
}

fn normalize(extension: &str) -> String {
    extension.trim_start_matches('.').to_ascii_lowercase()
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mt_config::CompilerEntry;

    #[test]
    fn test_default_dispatch() {
        let registry = CompilerRegistry::with_defaults();

        let invocation = registry.dispatch(Path::new("/p/app.es")).unwrap();
        assert_eq!(invocation.program, "babel");
        assert_eq!(invocation.args, vec!["--presets", "es2015", "/p/app.es"]);
        assert_eq!(invocation.to_string(), "babel --presets es2015 /p/app.es");

        let invocation = registry.dispatch(Path::new("/p/app.coffee")).unwrap();
        assert_eq!(invocation.args, vec!["-p", "-c", "/p/app.coffee"]);

        assert_eq!(
            registry.dispatch(Path::new("/p/theme.less")).unwrap().program,
            "lessc"
        );
        assert_eq!(
            registry.dispatch(Path::new("/p/theme.scss")).unwrap().program,
            "sass"
        );
    }

    #[test]
    fn test_raw_and_unknown_extensions_do_not_dispatch() {
        let registry = CompilerRegistry::with_defaults();
        assert!(registry.dispatch(Path::new("/p/a.js")).is_none());
        assert!(registry.dispatch(Path::new("/p/a.css")).is_none());
        assert!(registry.dispatch(Path::new("/p/x.unknownext")).is_none());
        assert!(registry.dispatch(Path::new("/p/Makefile")).is_none());

        assert_eq!(
            registry.category_of(Path::new("a.js")),
            Some(AssetCategory::Script)
        );
        assert_eq!(
            registry.category_of(Path::new("a.css")),
            Some(AssetCategory::Style)
        );
        assert_eq!(registry.category_of(Path::new("x.unknownext")), None);
    }

    #[test]
    fn test_extension_match_is_case_insensitive() {
        let registry = CompilerRegistry::with_defaults();
        assert!(registry.is_compilable(Path::new("/p/App.ES")));
        assert!(!registry.is_compilable(Path::new("/p/App.JS")));
    }

    #[test]
    fn test_template_without_token_appends_path() {
        let mut registry = CompilerRegistry::empty();
        registry.register(
            ".ts",
            CompilerSpec::new(AssetCategory::Script, ["tsc-stdout", "--strict"]),
        );
        let invocation = registry.dispatch(Path::new("/p/a.ts")).unwrap();
        assert_eq!(invocation.args, vec!["--strict", "/p/a.ts"]);
    }

    #[test]
    fn test_token_inside_argument() {
        let mut registry = CompilerRegistry::empty();
        registry.register(
            "styl",
            CompilerSpec::new(AssetCategory::Style, ["stylus", "--print", "--in={path}"]),
        );
        let invocation = registry.dispatch(Path::new("/p/a.styl")).unwrap();
        assert_eq!(invocation.args, vec!["--print", "--in=/p/a.styl"]);
    }

    #[test]
    fn test_register_overrides_and_raw_switch() {
        let mut registry = CompilerRegistry::with_defaults();
        registry.register(
            "js",
            CompilerSpec::new(AssetCategory::Script, ["uglifyjs", PATH_TOKEN]),
        );
        assert!(registry.is_compilable(Path::new("a.js")));

        registry.register_raw("less", AssetCategory::Style);
        assert!(!registry.is_compilable(Path::new("a.less")));
        assert_eq!(
            registry.category_of(Path::new("a.less")),
            Some(AssetCategory::Style)
        );
    }

    #[test]
    fn test_from_config() {
        let mut config = ToolConfig::default();
        config.compilers.insert(
            "es".into(),
            CompilerEntry {
                category: "script".into(),
                command: vec!["npx".into(), "babel".into(), "{path}".into()],
            },
        );
        config.compilers.insert(
            "sass".into(),
            CompilerEntry {
                category: "style".into(),
                command: vec!["sass".into(), "--indented".into()],
            },
        );
        let registry = CompilerRegistry::from_config(&config).unwrap();

        assert_eq!(
            registry.dispatch(Path::new("/p/a.es")).unwrap().to_string(),
            "npx babel /p/a.es"
        );
        assert_eq!(
            registry.category_of(Path::new("a.sass")),
            Some(AssetCategory::Style)
        );
        assert_eq!(
            registry.extensions().collect::<Vec<_>>(),
            vec!["coffee", "es", "less", "scss", "sass"]
        );
    }

    #[test]
    fn test_from_config_rejects_bad_category() {
        let mut config = ToolConfig::default();
        config.compilers.insert(
            "ts".into(),
            CompilerEntry {
                category: "markup".into(),
                command: vec!["tsc".into()],
            },
        );
        let err = CompilerRegistry::from_config(&config).unwrap_err();
        assert!(err.to_string().contains("'.ts'"));
        assert!(err.to_string().contains("markup"));
    }
}
