use parser::ParseError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("qualified separator must be a valid Elm identifier fragment, got `{0}`")]
    InvalidSeparator(String),
    #[error("collision suffix must be a valid Elm identifier fragment, got `{0}`")]
    InvalidCollisionSuffix(String),
    #[error("module name must be a dotted list of Elm type names, got `{0}`")]
    InvalidModuleName(String),
    #[error("module prefix must be a dotted list of Elm type names, got `{0}`")]
    InvalidModulePrefix(String),
}

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(
        "`{entity}` generates the Elm identifier `{candidate}` which is already taken; \
         rename it or configure a collision suffix"
    )]
    Collision { entity: String, candidate: String },
    #[error("field `{field}` has type `{kind}` which has no Elm representation")]
    UnsupportedKind { field: String, kind: String },
    #[error("enum `{0}` has no values")]
    EmptyEnum(String),
}
