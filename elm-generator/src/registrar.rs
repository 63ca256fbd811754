//! First pass over a schema file: gives every nameable element its naming
//! key without claiming any identifier. Identifiers are only produced later,
//! on demand, by the resolver, so the traversal order here never decides which
//! of two clashing names gets suffixed.

use std::collections::{BTreeMap, HashMap};

use parser::{Enum, Message, ProtoModel, Service};

use crate::config::Config;

#[derive(Debug)]
pub struct Registrar<'a> {
    config: &'a Config,
    package: String,
    /// Fully-qualified schema name -> naming key.
    keys: BTreeMap<String, String>,
    enums: Vec<&'a Enum>,
    messages: Vec<&'a Message>,
    services: Vec<&'a Service>,
    by_name: HashMap<&'a str, &'a Message>,
}

impl<'a> Registrar<'a> {
    pub fn new(config: &'a Config, package: &str) -> Self {
        Self {
            config,
            package: package.to_string(),
            keys: BTreeMap::new(),
            enums: Vec::new(),
            messages: Vec::new(),
            services: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Registers every enum, message and service of `model`.
    pub fn register_all(&mut self, model: &'a ProtoModel) {
        for en in &model.enums {
            self.register_enum(en);
        }
        for message in &model.messages {
            self.register_message(message);
        }
        for service in &model.services {
            self.register_service(service);
        }
    }

    pub fn register_enum(&mut self, en: &'a Enum) {
        let alias = self.alias(&en.name, &en.full_name);
        self.register_name(&en.full_name, alias.clone());
        self.enums.push(en);
        for value in &en.values {
            let key = self.variant_key(&value.name, &alias);
            self.register_name(&value.full_name, key);
        }
    }

    /// Registers `message`, nested definitions first, then its oneofs and their fields.
    pub fn register_message(&mut self, message: &'a Message) {
        for en in &message.enums {
            self.register_enum(en);
        }
        for nested in &message.messages {
            self.register_message(nested);
        }

        let alias = self.alias(&message.name, &message.full_name);
        self.register_name(&message.full_name, alias.clone());
        self.messages.push(message);
        self.by_name.insert(&message.full_name, message);

        for (index, oneof) in message.oneofs.iter().enumerate() {
            let mut members = message.oneof_fields(index).peekable();
            let oneof_alias = match (oneof.synthetic, members.peek()) {
                // Stands in for its only field, so it takes that field's name.
                (true, Some(field)) => self.strip_package(&field.full_name).to_string(),
                _ => format!("{alias}.{}", oneof.name),
            };
            self.register_name(&oneof.full_name, oneof_alias.clone());
            for field in members {
                let key = self.variant_key(&field.name, &oneof_alias);
                self.register_name(&field.full_name, key);
            }
        }
    }

    pub fn register_service(&mut self, service: &'a Service) {
        let alias = self.alias(&service.name, &service.full_name);
        self.register_name(&service.full_name, alias.clone());
        self.services.push(service);
        for method in &service.methods {
            self.register_name(&method.full_name, format!("{alias}.{}", method.name));
        }
    }

    /// # Panics
    /// If `full_name` was already registered. Each element must be visited once.
    fn register_name(&mut self, full_name: &str, key: String) {
        if self.keys.insert(full_name.to_string(), key).is_some() {
            panic!("duplicate schema name `{full_name}`");
        }
    }

    fn alias(&self, name: &str, full_name: &str) -> String {
        if self.config.qualify_nested {
            self.strip_package(full_name).to_string()
        } else {
            name.to_string()
        }
    }

    fn variant_key(&self, name: &str, parent_alias: &str) -> String {
        if self.config.variant_suffixes {
            format!("{name}.{parent_alias}")
        } else {
            name.to_string()
        }
    }

    fn strip_package<'n>(&self, full_name: &'n str) -> &'n str {
        if self.package.is_empty() {
            return full_name;
        }
        full_name
            .strip_prefix(self.package.as_str())
            .and_then(|rest| rest.strip_prefix('.'))
            .unwrap_or(full_name)
    }

    pub fn key(&self, full_name: &str) -> Option<&str> {
        self.keys.get(full_name).map(String::as_str)
    }

    pub fn is_registered(&self, full_name: &str) -> bool {
        self.keys.contains_key(full_name)
    }

    pub fn keys(&self) -> &BTreeMap<String, String> {
        &self.keys
    }

    /// Enums in registration order, nested ones included.
    pub fn enums(&self) -> &[&'a Enum] {
        &self.enums
    }

    /// Messages in registration order, nested ones before their parent.
    pub fn messages(&self) -> &[&'a Message] {
        &self.messages
    }

    pub fn services(&self) -> &[&'a Service] {
        &self.services
    }

    pub fn message(&self, full_name: &str) -> Option<&'a Message> {
        self.by_name.get(full_name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parser::parse_proto_str;
    use pretty_assertions::assert_eq;

    const NESTED: &str = r#"
        syntax = "proto3";
        package pkg;
        enum Top { TOP_UNKNOWN = 0; }
        message Outer {
            enum Option { A = 0; B = 1; }
            message Inner { Option o = 1; }
            Inner inner = 1;
            oneof choice {
                string text = 2;
                int32 count = 3;
            }
            optional bool flag = 4;
        }
        service Api {
            rpc Get(Outer) returns (Outer.Inner);
        }
    "#;

    fn keys_for(config: &Config) -> BTreeMap<String, String> {
        let model = parse_proto_str(NESTED).unwrap();
        let mut registrar = Registrar::new(config, model.package_name());
        registrar.register_all(&model);
        registrar.keys().clone()
    }

    #[test]
    fn minimal_keys() {
        let keys = keys_for(&Config::default());
        let expected: BTreeMap<String, String> = [
            ("pkg.Top", "Top"),
            ("pkg.TOP_UNKNOWN", "TOP_UNKNOWN"),
            ("pkg.Outer", "Outer"),
            ("pkg.Outer.Option", "Option"),
            ("pkg.Outer.A", "A"),
            ("pkg.Outer.B", "B"),
            ("pkg.Outer.Inner", "Inner"),
            ("pkg.Outer.choice", "Outer.choice"),
            ("pkg.Outer.text", "text"),
            ("pkg.Outer.count", "count"),
            ("pkg.Outer._flag", "Outer.flag"),
            ("pkg.Outer.flag", "flag"),
            ("pkg.Api", "Api"),
            ("pkg.Api.Get", "Api.Get"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        assert_eq!(keys, expected);
    }

    #[test]
    fn qualified_and_suffixed_keys() {
        let keys = keys_for(&Config {
            qualify_nested: true,
            variant_suffixes: true,
            ..Config::default()
        });
        assert_eq!(keys["pkg.Outer.Option"], "Outer.Option");
        assert_eq!(keys["pkg.Outer.A"], "A.Outer.Option");
        assert_eq!(keys["pkg.Outer.Inner"], "Outer.Inner");
        assert_eq!(keys["pkg.Outer.choice"], "Outer.choice");
        assert_eq!(keys["pkg.Outer.text"], "text.Outer.choice");
        assert_eq!(keys["pkg.Outer._flag"], "Outer.flag");
        assert_eq!(keys["pkg.Outer.flag"], "flag.Outer.flag");
        assert_eq!(keys["pkg.TOP_UNKNOWN"], "TOP_UNKNOWN.Top");
        assert_eq!(keys["pkg.Api.Get"], "Api.Get");
    }

    #[test]
    fn nested_first_order() {
        let model = parse_proto_str(NESTED).unwrap();
        let config = Config::default();
        let mut registrar = Registrar::new(&config, "pkg");
        registrar.register_all(&model);

        let enums: Vec<&str> = registrar.enums().iter().map(|e| e.full_name.as_str()).collect();
        assert_eq!(enums, vec!["pkg.Top", "pkg.Outer.Option"]);
        let messages: Vec<&str> = registrar
            .messages()
            .iter()
            .map(|m| m.full_name.as_str())
            .collect();
        assert_eq!(messages, vec!["pkg.Outer.Inner", "pkg.Outer"]);
        assert_eq!(registrar.services().len(), 1);
        assert!(registrar.message("pkg.Outer.Inner").is_some());
        assert!(registrar.message("pkg.Top").is_none());
    }

    #[test]
    fn keys_ignore_registration_order() {
        let model = parse_proto_str(NESTED).unwrap();
        let config = Config {
            qualify_nested: true,
            ..Config::default()
        };
        let mut forward = Registrar::new(&config, "pkg");
        forward.register_all(&model);

        let mut backward = Registrar::new(&config, "pkg");
        for service in model.services.iter().rev() {
            backward.register_service(service);
        }
        for message in model.messages.iter().rev() {
            backward.register_message(message);
        }
        for en in model.enums.iter().rev() {
            backward.register_enum(en);
        }
        assert_eq!(forward.keys(), backward.keys());
    }

    #[test]
    fn empty_package_keeps_full_names() {
        let model = parse_proto_str("syntax = \"proto3\"; message A { message B {} }").unwrap();
        let config = Config {
            qualify_nested: true,
            ..Config::default()
        };
        let mut registrar = Registrar::new(&config, "");
        registrar.register_all(&model);
        assert_eq!(registrar.key("A.B"), Some("A.B"));
    }

    #[test]
    #[should_panic(expected = "duplicate schema name `pkg.Top`")]
    fn double_registration_panics() {
        let model = parse_proto_str(NESTED).unwrap();
        let config = Config::default();
        let mut registrar = Registrar::new(&config, "pkg");
        registrar.register_enum(&model.enums[0]);
        registrar.register_enum(&model.enums[0]);
    }
}
