// Descriptor tree for .proto files, shaped after what protoc hands to plugins.
// - Every named node carries its local name and its fully-qualified name.
// - Enum values are scoped as siblings of their enum (protobuf scoping rules).
// - Map fields are repeated references to a synthesized `<Name>Entry` message.
// - Proto3 `optional` fields sit in a synthetic single-member oneof.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Syntax {
    #[default]
    Proto2,
    Proto3,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProtoModel {
    /// Path the model was read from, if it came from a file.
    pub file_name: Option<String>,
    pub syntax: Syntax,
    pub package: Option<String>,
    pub messages: Vec<Message>,
    pub enums: Vec<Enum>,
    pub services: Vec<Service>,
}

impl ProtoModel {
    /// Package name, empty when the file declares none.
    pub fn package_name(&self) -> &str {
        self.package.as_deref().unwrap_or_default()
    }

    /// Finds a message anywhere in the tree by its fully-qualified name.
    pub fn find_message(&self, full_name: &str) -> Option<&Message> {
        fn walk<'a>(messages: &'a [Message], full_name: &str) -> Option<&'a Message> {
            messages.iter().find_map(|m| {
                if m.full_name == full_name {
                    Some(m)
                } else {
                    walk(&m.messages, full_name)
                }
            })
        }
        walk(&self.messages, full_name)
    }

    /// Finds an enum anywhere in the tree by its fully-qualified name.
    pub fn find_enum(&self, full_name: &str) -> Option<&Enum> {
        fn walk<'a>(messages: &'a [Message], full_name: &str) -> Option<&'a Enum> {
            messages.iter().find_map(|m| {
                m.enums
                    .iter()
                    .find(|e| e.full_name == full_name)
                    .or_else(|| walk(&m.messages, full_name))
            })
        }
        self.enums
            .iter()
            .find(|e| e.full_name == full_name)
            .or_else(|| walk(&self.messages, full_name))
    }
}

/// Source comments attached to one element. Passed through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Comments {
    pub leading_detached: Vec<String>,
    pub leading: String,
    pub trailing: String,
}

impl Comments {
    pub fn is_empty(&self) -> bool {
        self.leading_detached.is_empty() && self.leading.is_empty() && self.trailing.is_empty()
    }
}

// ---------------- Message & Fields ----------------

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Message {
    pub name: String,
    pub full_name: String,
    pub fields: Vec<Field>,
    pub oneofs: Vec<Oneof>,
    pub messages: Vec<Message>,
    pub enums: Vec<Enum>,
    /// Synthesized for a `map<K, V>` field; holds `key = 1` and `value = 2`.
    pub map_entry: bool,
    pub comments: Comments,
}

impl Message {
    /// Fields that belong to the oneof at `index`, in declaration order.
    pub fn oneof_fields(&self, index: usize) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(move |f| f.oneof == Some(index))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub full_name: String,
    pub number: u32, // tag number
    pub cardinality: Cardinality,
    pub kind: FieldKind,
    /// Index into the owning message's `oneofs`.
    pub oneof: Option<usize>,
    pub proto3_optional: bool,
    pub comments: Comments,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    Optional,
    Required,
    Repeated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Scalar(ScalarType),
    Enum(TypeRef),
    Message(TypeRef),
    /// proto2 group: a field whose nested message is declared inline.
    Group(TypeRef),
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Scalar(s) => write!(f, "{s}"),
            FieldKind::Enum(r) => write!(f, "enum {}", r.full_name),
            FieldKind::Message(r) => write!(f, "message {}", r.full_name),
            FieldKind::Group(r) => write!(f, "group {}", r.full_name),
        }
    }
}

/// Reference to a named type, resolved to its fully-qualified name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TypeRef {
    pub full_name: String,
    /// Package the referenced type was declared in.
    pub package: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    Double,
    Float,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Bool,
    String,
    Bytes,
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScalarType::Double => "double",
            ScalarType::Float => "float",
            ScalarType::Int32 => "int32",
            ScalarType::Int64 => "int64",
            ScalarType::Uint32 => "uint32",
            ScalarType::Uint64 => "uint64",
            ScalarType::Sint32 => "sint32",
            ScalarType::Sint64 => "sint64",
            ScalarType::Fixed32 => "fixed32",
            ScalarType::Fixed64 => "fixed64",
            ScalarType::Sfixed32 => "sfixed32",
            ScalarType::Sfixed64 => "sfixed64",
            ScalarType::Bool => "bool",
            ScalarType::String => "string",
            ScalarType::Bytes => "bytes",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Oneof {
    pub name: String,
    pub full_name: String,
    /// Single-member group standing in for a proto3 `optional` field.
    pub synthetic: bool,
    pub comments: Comments,
}

// ---------------- Enum ----------------

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Enum {
    pub name: String,
    pub full_name: String,
    pub values: Vec<EnumValue>,
    pub comments: Comments,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumValue {
    pub name: String,
    pub full_name: String,
    pub number: i32,
    pub comments: Comments,
}

// ---------------- Service ----------------

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Service {
    pub name: String,
    pub full_name: String,
    pub methods: Vec<Method>,
    pub comments: Comments,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Method {
    pub name: String,
    pub full_name: String,
    pub input: TypeRef,
    pub output: TypeRef,
    pub client_streaming: bool,
    pub server_streaming: bool,
    pub comments: Comments,
}
