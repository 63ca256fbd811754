//! Maps protobuf schemas onto Elm: legal, collision-free identifiers for every
//! schema element and a typed description of the module to print.

pub mod builder;
pub mod casing;
pub mod config;
pub mod error;
pub mod ir;
pub mod namespace;
pub mod registrar;
pub mod resolver;

use std::path::Path;

use parser::{ProtoModel, parse_proto_file, parse_proto_files};

pub use builder::{build_module, merge_packages, module_name};
pub use config::Config;
pub use error::{ConfigError, GenerateError};
pub use ir::Module;
pub use namespace::{NameCollision, Namespace};

/// Parse a .proto file and build its Elm module.
/// Type references must resolve within the file; see [`build_modules_from_protos`] for imports.
pub fn build_module_from_proto<P: AsRef<Path>>(
    proto_path: P,
    config: &Config,
) -> Result<Module, GenerateError> {
    config.validate()?;
    let model = parse_proto_file(proto_path)?;
    build_module(&model, config)
}

/// Parse several .proto files together and build one module per package.
pub fn build_modules_from_protos<P: AsRef<Path>>(
    proto_paths: &[P],
    config: &Config,
) -> Result<Vec<Result<Module, GenerateError>>, GenerateError> {
    config.validate()?;
    let models = parse_proto_files(proto_paths)?;
    Ok(build_modules(&models, config))
}

/// One module per package, each built in isolation so a failure stays with its package.
pub fn build_modules(models: &[ProtoModel], config: &Config) -> Vec<Result<Module, GenerateError>> {
    merge_packages(models)
        .iter()
        .map(|model| build_module(model, config))
        .collect()
}
