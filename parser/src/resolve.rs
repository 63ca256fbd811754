use std::collections::HashMap;

use crate::model::{Enum, FieldKind, Message, ProtoModel, Service, TypeRef};
use crate::{ParseError, qualify};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SymbolKind {
    Message,
    Enum,
    /// Values share their enum's scope, so they clash with its siblings.
    EnumValue,
    Service,
}

impl SymbolKind {
    fn is_type(self) -> bool {
        matches!(self, SymbolKind::Message | SymbolKind::Enum)
    }
}

#[derive(Debug)]
struct Symbol {
    kind: SymbolKind,
    package: String,
}

/// Every named element declared across the files of one parse call.
#[derive(Debug, Default)]
struct SymbolTable {
    symbols: HashMap<String, Symbol>,
}

impl SymbolTable {
    fn build(models: &[ProtoModel]) -> Result<Self, ParseError> {
        let mut table = Self::default();
        for model in models {
            let package = model.package_name();
            table.add_enums(&model.enums, package)?;
            table.add_messages(&model.messages, package)?;
            table.add_services(&model.services, package)?;
        }
        Ok(table)
    }

    fn insert(&mut self, full_name: &str, kind: SymbolKind, package: &str) -> Result<(), ParseError> {
        let symbol = Symbol {
            kind,
            package: package.to_string(),
        };
        if self.symbols.insert(full_name.to_string(), symbol).is_some() {
            return Err(ParseError::DuplicateSymbol(full_name.to_string()));
        }
        Ok(())
    }

    fn add_enums(&mut self, enums: &[Enum], package: &str) -> Result<(), ParseError> {
        for en in enums {
            self.insert(&en.full_name, SymbolKind::Enum, package)?;
            for value in &en.values {
                self.insert(&value.full_name, SymbolKind::EnumValue, package)?;
            }
        }
        Ok(())
    }

    fn add_messages(&mut self, messages: &[Message], package: &str) -> Result<(), ParseError> {
        for message in messages {
            self.insert(&message.full_name, SymbolKind::Message, package)?;
            self.add_enums(&message.enums, package)?;
            self.add_messages(&message.messages, package)?;
        }
        Ok(())
    }

    fn add_services(&mut self, services: &[Service], package: &str) -> Result<(), ParseError> {
        for service in services {
            self.insert(&service.full_name, SymbolKind::Service, package)?;
        }
        Ok(())
    }

    /// Looks `name` up from `scope` outwards: `a.b.C` then `a.C` then `C`.
    /// A leading dot makes the name absolute.
    fn lookup(&self, name: &str, scope: &str) -> Option<(String, &Symbol)> {
        if let Some(absolute) = name.strip_prefix('.') {
            return self
                .symbols
                .get(absolute)
                .map(|symbol| (absolute.to_string(), symbol));
        }
        let mut scope = scope;
        loop {
            let candidate = qualify(scope, name);
            if let Some(symbol) = self.symbols.get(&candidate) {
                return Some((candidate, symbol));
            }
            if scope.is_empty() {
                return None;
            }
            scope = scope.rsplit_once('.').map_or("", |(parent, _)| parent);
        }
    }

    fn resolve(&self, type_ref: &TypeRef, scope: &str) -> Result<(TypeRef, SymbolKind), ParseError> {
        let (full_name, symbol) = self
            .lookup(&type_ref.full_name, scope)
            .filter(|(_, symbol)| symbol.kind.is_type())
            .ok_or_else(|| ParseError::UnresolvedType {
                name: type_ref.full_name.clone(),
                scope: scope.to_string(),
            })?;
        let resolved = TypeRef {
            full_name,
            package: symbol.package.clone(),
        };
        Ok((resolved, symbol.kind))
    }
}

/// Rewrites every named type reference to its fully-qualified form and
/// fixes up whether it points at a message or an enum.
pub(crate) fn resolve_references(models: &mut [ProtoModel]) -> Result<(), ParseError> {
    let table = SymbolTable::build(models)?;
    for model in models.iter_mut() {
        for message in &mut model.messages {
            resolve_message(&table, message)?;
        }
        let package = model.package_name().to_string();
        for service in &mut model.services {
            for method in &mut service.methods {
                // Method types are looked up from the package scope.
                method.input = table.resolve(&method.input, &package)?.0;
                method.output = table.resolve(&method.output, &package)?.0;
            }
        }
    }
    Ok(())
}

fn resolve_message(table: &SymbolTable, message: &mut Message) -> Result<(), ParseError> {
    for field in &mut message.fields {
        let (type_ref, group) = match &field.kind {
            FieldKind::Scalar(_) => continue,
            FieldKind::Group(r) => (r, true),
            FieldKind::Enum(r) | FieldKind::Message(r) => (r, false),
        };
        let (resolved, kind) = table.resolve(type_ref, &message.full_name)?;
        field.kind = match kind {
            _ if group => FieldKind::Group(resolved),
            SymbolKind::Enum => FieldKind::Enum(resolved),
            _ => FieldKind::Message(resolved),
        };
    }
    for nested in &mut message.messages {
        resolve_message(table, nested)?;
    }
    Ok(())
}
