pub mod discovery;
pub mod types;
pub mod validation;
pub mod version;

pub use discovery::{discover_plugins, find_metadata_file, load_plugin, METADATA_FILES};
pub use types::{Plugin, PluginInfo, ResourceDecl, ResourceRecord, MODULE_PREFIX};
pub use validation::{validate_plugin, ValidationError, ValidationResult};
pub use version::{bump_version, bump_version_string};
