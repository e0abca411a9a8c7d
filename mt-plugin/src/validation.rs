use std::collections::HashSet;
use std::path::{Component, Path};

use crate::types::Plugin;

/// Validation error with actionable fix suggestion
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    pub fix_suggestion: Option<String>,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            fix_suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.fix_suggestion = Some(suggestion.into());
        self
    }
}

/// Result of plugin validation
#[derive(Debug)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.is_valid = false;
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

fn escapes_root(path: &Path) -> bool {
    path.components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)))
}

/// Checks a plugin's declared resources against its directory.
///
/// Paths leaving the plugin root are errors. Duplicates and missing files
/// are warnings; the build reports missing compiled sources on its own.
pub fn validate_plugin(plugin: &Plugin) -> ValidationResult {
    let mut result = ValidationResult::new();
    let mut seen = HashSet::new();

    for (index, decl) in plugin.info.resources.iter().enumerate() {
        if decl.is_module_declaration() {
            continue;
        }
        let rel = decl.path();
        let field = format!("resources[{index}]");

        if rel.trim().is_empty() {
            result.add_error(
                ValidationError::new(field, "Resource path is empty")
                    .with_suggestion("Remove the entry or give it a path"),
            );
            continue;
        }

        if escapes_root(Path::new(rel)) {
            result.add_error(
                ValidationError::new(field, format!("'{rel}' points outside the plugin"))
                    .with_suggestion("Use a path relative to the plugin directory"),
            );
            continue;
        }

        if !seen.insert(rel) {
            result.add_warning(format!("'{rel}' is declared more than once"));
        }

        if !plugin.root.join(rel).is_file() {
            result.add_warning(format!("'{rel}' does not exist"));
        }
    }

    result
}
