//! Second pass: turns naming keys into claimed Elm identifiers on first use.
//!
//! Every lookup is memoized, so an element resolves to the same identifier no
//! matter how many fields point at it. A type also claims its derived
//! functions (`emptyFoo`, `fooDecoder`, `fooEncoder`, `fooFuzzer`) in the same
//! namespace, which means a type can collide with another type's decoder.

use std::collections::HashMap;

use parser::TypeRef;

use crate::casing::{casing, is_reserved, package_module_name};
use crate::config::Config;
use crate::error::GenerateError;
use crate::ir::{DerivedType, ElmRef};
use crate::namespace::Namespace;
use crate::registrar::Registrar;

pub struct Resolver<'r, 'a> {
    registrar: &'r Registrar<'a>,
    config: &'r Config,
    /// Name of the module being generated. Used to spot references to it from outside.
    module: String,
    namespace: Namespace,
    types: HashMap<String, String>,
    values: HashMap<String, String>,
    derived: HashMap<String, DerivedType>,
}

impl<'r, 'a> Resolver<'r, 'a> {
    pub fn new(registrar: &'r Registrar<'a>, config: &'r Config, module: &str) -> Self {
        Self {
            registrar,
            config,
            module: module.to_string(),
            namespace: Namespace::new(&config.collision_suffix),
            types: HashMap::new(),
            values: HashMap::new(),
            derived: HashMap::new(),
        }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// # Panics
    /// If `full_name` was never registered.
    fn key(&self, full_name: &str) -> &'r str {
        let registrar: &'r Registrar<'a> = self.registrar;
        registrar
            .key(full_name)
            .unwrap_or_else(|| panic!("unregistered schema name `{full_name}`"))
    }

    fn claim(&mut self, entity: &str, candidate: &str) -> Result<String, GenerateError> {
        self.namespace
            .register(candidate)
            .map_err(|collision| GenerateError::Collision {
                entity: entity.to_string(),
                candidate: collision.candidate,
            })
    }

    /// Type identifier for a registered element.
    pub fn resolve_type_id(&mut self, full_name: &str) -> Result<String, GenerateError> {
        if let Some(id) = self.types.get(full_name) {
            return Ok(id.clone());
        }
        let candidate = casing(
            self.key(full_name),
            &self.config.qualified_separator,
            true,
        );
        let id = self.claim(full_name, &candidate)?;
        self.types.insert(full_name.to_string(), id.clone());
        Ok(id)
    }

    /// Value identifier for a registered element.
    pub fn resolve_value(&mut self, full_name: &str) -> Result<String, GenerateError> {
        if let Some(id) = self.values.get(full_name) {
            return Ok(id.clone());
        }
        let candidate = casing(
            self.key(full_name),
            &self.config.qualified_separator,
            false,
        );
        let id = self.claim(full_name, &candidate)?;
        self.values.insert(full_name.to_string(), id.clone());
        Ok(id)
    }

    /// Type identifier plus its derived functions, claimed in that order.
    pub fn resolve_type(&mut self, full_name: &str) -> Result<DerivedType, GenerateError> {
        if let Some(derived) = self.derived.get(full_name) {
            return Ok(derived.clone());
        }
        let id = self.resolve_type_id(full_name)?;
        let zero = self.claim(full_name, &format!("empty{id}"))?;
        // The stem is never claimed itself, only the names built on it.
        let stem = casing(
            self.key(full_name),
            &self.config.qualified_separator,
            false,
        );
        let decoder = self.claim(full_name, &format!("{stem}Decoder"))?;
        let encoder = self.claim(full_name, &format!("{stem}Encoder"))?;
        let fuzzer = self.claim(full_name, &format!("{stem}Fuzzer"))?;

        let derived = DerivedType {
            id: ElmRef::local(id),
            zero: ElmRef::local(zero),
            decoder: ElmRef::local(decoder),
            encoder: ElmRef::local(encoder),
            fuzzer: ElmRef::local(fuzzer),
        };
        self.derived.insert(full_name.to_string(), derived.clone());
        Ok(derived)
    }

    /// Resolves a reference from a field or method, locally if the type was
    /// registered here and by name alone otherwise.
    pub fn resolve_ref(&mut self, type_ref: &TypeRef) -> Result<DerivedType, GenerateError> {
        if self.registrar.is_registered(&type_ref.full_name) {
            self.resolve_type(&type_ref.full_name)
        } else {
            Ok(self.resolve_external(type_ref))
        }
    }

    /// Names a type defined in another module the way that module's own run
    /// would, assuming it hit no collisions. Claims nothing here.
    pub fn resolve_external(&self, type_ref: &TypeRef) -> DerivedType {
        let module = package_module_name(&type_ref.package, &self.config.module_prefix);
        let local = type_ref
            .full_name
            .strip_prefix(type_ref.package.as_str())
            .and_then(|rest| rest.strip_prefix('.'))
            .unwrap_or(&type_ref.full_name);
        let key = if self.config.qualify_nested {
            local
        } else {
            local.rsplit('.').next().unwrap_or(local)
        };

        let separator = &self.config.qualified_separator;
        let mut id = casing(key, separator, true);
        if is_reserved(&id) {
            id.push_str(&self.config.collision_suffix);
        }
        let stem = casing(key, separator, false);

        let module = (module != self.module).then_some(module);
        let reference = |id: String| match &module {
            Some(module) => ElmRef::external(module.as_str(), id),
            None => ElmRef::local(id),
        };
        DerivedType {
            zero: reference(format!("empty{id}")),
            decoder: reference(format!("{stem}Decoder")),
            encoder: reference(format!("{stem}Encoder")),
            fuzzer: reference(format!("{stem}Fuzzer")),
            id: reference(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parser::{ProtoModel, parse_proto_str};
    use pretty_assertions::assert_eq;

    fn model(src: &str) -> ProtoModel {
        parse_proto_str(src).expect("parse failed")
    }

    const SIMPLE: &str = r#"
        syntax = "proto3";
        package pkg;
        message Dupe {}
        message Outer { message Inner {} }
    "#;

    #[test]
    fn derived_names() {
        let model = model(SIMPLE);
        let config = Config::default();
        let mut registrar = Registrar::new(&config, "pkg");
        registrar.register_all(&model);
        let mut resolver = Resolver::new(&registrar, &config, "Pkg");

        let derived = resolver.resolve_type("pkg.Dupe").unwrap();
        assert_eq!(derived.id, ElmRef::local("Dupe"));
        assert_eq!(derived.zero, ElmRef::local("emptyDupe"));
        assert_eq!(derived.decoder, ElmRef::local("dupeDecoder"));
        assert_eq!(derived.encoder, ElmRef::local("dupeEncoder"));
        assert_eq!(derived.fuzzer, ElmRef::local("dupeFuzzer"));
        // The stem is free.
        assert!(!resolver.namespace().is_claimed("dupe"));
    }

    #[test]
    fn resolution_is_memoized() {
        let model = model(SIMPLE);
        let config = Config {
            collision_suffix: "_".into(),
            ..Config::default()
        };
        let mut registrar = Registrar::new(&config, "pkg");
        registrar.register_all(&model);
        let mut resolver = Resolver::new(&registrar, &config, "Pkg");

        let first = resolver.resolve_type("pkg.Dupe").unwrap();
        let second = resolver.resolve_type("pkg.Dupe").unwrap();
        assert_eq!(first, second);
        assert_eq!(resolver.resolve_type_id("pkg.Dupe").unwrap(), "Dupe");
        assert_eq!(resolver.resolve_value("pkg.Dupe").unwrap(), "dupe");
        assert_eq!(resolver.resolve_value("pkg.Dupe").unwrap(), "dupe");
    }

    #[test]
    fn qualified_names_use_separator() {
        let model = model(SIMPLE);
        let config = Config {
            qualify_nested: true,
            qualified_separator: "_".into(),
            ..Config::default()
        };
        let mut registrar = Registrar::new(&config, "pkg");
        registrar.register_all(&model);
        let mut resolver = Resolver::new(&registrar, &config, "Pkg");

        let inner = resolver.resolve_type("pkg.Outer.Inner").unwrap();
        assert_eq!(inner.id.id, "Outer_Inner");
        assert_eq!(inner.zero.id, "emptyOuter_Inner");
        assert_eq!(inner.decoder.id, "outer_InnerDecoder");
    }

    #[test]
    fn any_derived_name_can_collide() {
        for taken in ["Dupe", "emptyDupe", "dupeDecoder", "dupeEncoder", "dupeFuzzer"] {
            let model = model(SIMPLE);
            let config = Config::default();
            let mut registrar = Registrar::new(&config, "pkg");
            registrar.register_all(&model);
            let mut resolver = Resolver::new(&registrar, &config, "Pkg");
            resolver.namespace.register(taken).unwrap();

            match resolver.resolve_type("pkg.Dupe") {
                Err(GenerateError::Collision { entity, candidate }) => {
                    assert_eq!(entity, "pkg.Dupe");
                    assert_eq!(candidate, taken);
                }
                other => panic!("expected collision on {taken}, got {other:?}"),
            }
        }
    }

    #[test]
    fn collisions_are_suffixed() {
        let model = model(
            r#"
            syntax = "proto3";
            message A { message B {} }
            message B {}
        "#,
        );
        let config = Config {
            collision_suffix: "_".into(),
            ..Config::default()
        };
        let mut registrar = Registrar::new(&config, "");
        registrar.register_all(&model);
        let mut resolver = Resolver::new(&registrar, &config, "X");

        let top = resolver.resolve_type("B").unwrap();
        let nested = resolver.resolve_type("A.B").unwrap();
        assert_eq!(top.id.id, "B");
        assert_eq!(nested.id.id, "B_");
        assert_eq!(nested.zero.id, "emptyB_");
        assert_eq!(nested.decoder.id, "bDecoder_");
    }

    #[test]
    fn external_references_are_not_claimed() {
        let model = model(SIMPLE);
        let config = Config {
            module_prefix: "Proto".into(),
            ..Config::default()
        };
        let mut registrar = Registrar::new(&config, "pkg");
        registrar.register_all(&model);
        let mut resolver = Resolver::new(&registrar, &config, "Proto.Pkg");

        let stamp = TypeRef {
            full_name: "google.protobuf.Timestamp".into(),
            package: "google.protobuf".into(),
        };
        let derived = resolver.resolve_ref(&stamp).unwrap();
        assert_eq!(derived.id, ElmRef::external("Proto.Google.Protobuf", "Timestamp"));
        assert_eq!(derived.decoder.to_string(), "Proto.Google.Protobuf.timestampDecoder");
        assert!(!resolver.namespace().is_claimed("Timestamp"));

        // A reserved name is suffixed like the other module would have done.
        let config = Config {
            collision_suffix: "_".into(),
            ..Config::default()
        };
        let resolver = Resolver::new(&registrar, &config, "Pkg");
        let list = TypeRef {
            full_name: "other.List".into(),
            package: "other".into(),
        };
        assert_eq!(resolver.resolve_external(&list).id.to_string(), "Other.List_");
    }

    #[test]
    fn own_module_is_not_qualified() {
        let config = Config::default();
        let registrar = Registrar::new(&config, "pkg");
        let resolver = Resolver::new(&registrar, &config, "Pkg");
        let sibling = TypeRef {
            full_name: "pkg.Elsewhere".into(),
            package: "pkg".into(),
        };
        let derived = resolver.resolve_external(&sibling);
        assert!(derived.id.is_local());
        assert_eq!(derived.id.id, "Elsewhere");
    }

    #[test]
    #[should_panic(expected = "unregistered schema name `pkg.Missing`")]
    fn unregistered_name_panics() {
        let config = Config::default();
        let registrar = Registrar::new(&config, "pkg");
        let mut resolver = Resolver::new(&registrar, &config, "Pkg");
        let _ = resolver.resolve_type("pkg.Missing");
    }
}
