// Typed description of one Elm module, ready to be printed.
// - Every identifier is final: legal, unique within the module, and suffixed if it had to be.
// - Lists are in output order; record fields keep schema declaration order.
// - Comments are carried through from the schema untouched.

use std::fmt;

use parser::{Cardinality, Comments, ScalarType};

/// Identifier, qualified with its module when it lives elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ElmRef {
    pub module: Option<String>,
    pub id: String,
}

impl ElmRef {
    pub fn local(id: impl Into<String>) -> Self {
        Self {
            module: None,
            id: id.into(),
        }
    }

    pub fn external(module: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            module: Some(module.into()),
            id: id.into(),
        }
    }

    pub fn is_local(&self) -> bool {
        self.module.is_none()
    }
}

impl fmt::Display for ElmRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.module {
            Some(module) => write!(f, "{module}.{}", self.id),
            None => f.write_str(&self.id),
        }
    }
}

/// A generated type and the functions derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedType {
    pub id: ElmRef,
    pub zero: ElmRef,
    pub decoder: ElmRef,
    pub encoder: ElmRef,
    pub fuzzer: ElmRef,
}

impl DerivedType {
    pub fn refs(&self) -> [&ElmRef; 5] {
        [
            &self.id,
            &self.zero,
            &self.decoder,
            &self.encoder,
            &self.fuzzer,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElmScalar {
    Bool,
    Int,
    Float,
    String,
    Bytes,
}

impl fmt::Display for ElmScalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ElmScalar::Bool => "Bool",
            ElmScalar::Int => "Int",
            ElmScalar::Float => "Float",
            ElmScalar::String => "String",
            ElmScalar::Bytes => "Bytes",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementType {
    Scalar { wire: ScalarType, elm: ElmScalar },
    Named(DerivedType),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Single(ElementType),
    List(ElementType),
    Map { key: ElementType, value: ElementType },
    /// Present or absent. What a proto3 `optional` field collapses to.
    Maybe(ElementType),
    Oneof(DerivedType),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub label: String,
    /// Wire number. None for a oneof, whose members carry their own.
    pub number: Option<u32>,
    pub cardinality: Cardinality,
    pub field_type: FieldType,
    pub comments: Comments,
}

/// Sum type with payload-free tags, from an enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Union {
    pub ty: DerivedType,
    pub variants: Vec<Variant>,
    /// Index of the default variant in `variants`.
    pub default: usize,
    pub aliases: Vec<VariantAlias>,
    pub comments: Comments,
}

impl Union {
    pub fn default_variant(&self) -> &Variant {
        &self.variants[self.default]
    }

    pub fn aliased(&self, alias: &VariantAlias) -> &Variant {
        &self.variants[alias.variant]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    pub id: ElmRef,
    /// Enum value name as written in the schema.
    pub label: String,
    pub number: i32,
    pub comments: Comments,
}

/// A later enum value sharing its number with an earlier variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantAlias {
    /// Value identifier the alias is exposed under.
    pub id: ElmRef,
    pub label: String,
    pub number: i32,
    /// Index of the aliased variant in the union's `variants`.
    pub variant: usize,
    pub comments: Comments,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Oneof {
    pub ty: DerivedType,
    pub variants: Vec<OneofVariant>,
    pub comments: Comments,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneofVariant {
    pub id: ElmRef,
    pub field: Field,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub ty: DerivedType,
    pub fields: Vec<Field>,
    pub comments: Comments,
}

impl Record {
    pub fn field(&self, label: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.label == label)
    }
}

/// Services get no Elm identifier of their own; they are listed by schema name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    pub label: String,
    pub full_name: String,
    pub methods: Vec<Rpc>,
    pub comments: Comments,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rpc {
    pub id: ElmRef,
    /// Method name as written in the schema.
    pub method: String,
    /// Fully-qualified name of the owning service.
    pub service: String,
    pub input: DerivedType,
    pub output: DerivedType,
    pub client_streaming: bool,
    pub server_streaming: bool,
    pub comments: Comments,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    /// Dotted Elm module name, e.g. `Proto.My.Pkg`.
    pub name: String,
    /// Relative file path, e.g. `Proto/My/Pkg.elm`.
    pub path: String,
    pub package: String,
    pub imports: Vec<String>,
    pub unions: Vec<Union>,
    pub oneofs: Vec<Oneof>,
    pub records: Vec<Record>,
    pub services: Vec<Service>,
}

impl Module {
    pub fn union(&self, id: &str) -> Option<&Union> {
        self.unions.iter().find(|u| u.ty.id.id == id)
    }

    pub fn record(&self, id: &str) -> Option<&Record> {
        self.records.iter().find(|r| r.ty.id.id == id)
    }

    pub fn oneof(&self, id: &str) -> Option<&Oneof> {
        self.oneofs.iter().find(|o| o.ty.id.id == id)
    }

    /// Every identifier this module defines, in no particular order.
    pub fn local_ids(&self) -> Vec<&str> {
        let mut ids = Vec::new();
        for union in &self.unions {
            ids.extend(union.ty.refs().map(|r| r.id.as_str()));
            ids.extend(union.variants.iter().map(|v| v.id.id.as_str()));
            ids.extend(union.aliases.iter().map(|a| a.id.id.as_str()));
        }
        for oneof in &self.oneofs {
            ids.extend(oneof.ty.refs().map(|r| r.id.as_str()));
            ids.extend(oneof.variants.iter().map(|v| v.id.id.as_str()));
        }
        for record in &self.records {
            ids.extend(record.ty.refs().map(|r| r.id.as_str()));
        }
        for service in &self.services {
            ids.extend(service.methods.iter().map(|m| m.id.id.as_str()));
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refs_print_qualified_when_external() {
        assert_eq!(ElmRef::local("Order").to_string(), "Order");
        assert_eq!(
            ElmRef::external("Common", "Timestamp").to_string(),
            "Common.Timestamp"
        );
        assert!(ElmRef::local("x").is_local());
    }
}
