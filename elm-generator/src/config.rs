use crate::casing::{is_valid_module_name, is_valid_partial_id};
use crate::error::ConfigError;

/// Switches controlling how schema names become Elm identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Config {
    /// Name nested types after their full path (`Outer_Inner`) instead of their local name.
    pub qualify_nested: bool,
    /// Joins the segments of a qualified name, e.g. `_` for `Outer_Inner`. May be empty.
    pub qualified_separator: String,
    /// Suffix enum and oneof variants with their parent's name (`Unknown_Status`).
    pub variant_suffixes: bool,
    /// Appended to a colliding identifier until it is free. Empty makes collisions an error.
    pub collision_suffix: String,
    /// Replaces the module name derived from the package.
    pub module_name: Option<String>,
    /// Module path prepended to derived module names, e.g. `Proto`.
    pub module_prefix: String,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_valid_partial_id(&self.qualified_separator) {
            return Err(ConfigError::InvalidSeparator(
                self.qualified_separator.clone(),
            ));
        }
        if !is_valid_partial_id(&self.collision_suffix) {
            return Err(ConfigError::InvalidCollisionSuffix(
                self.collision_suffix.clone(),
            ));
        }
        if let Some(name) = &self.module_name {
            if !is_valid_module_name(name) {
                return Err(ConfigError::InvalidModuleName(name.clone()));
            }
        }
        if !self.module_prefix.is_empty() && !is_valid_module_name(&self.module_prefix) {
            return Err(ConfigError::InvalidModulePrefix(self.module_prefix.clone()));
        }
        Ok(())
    }
}
