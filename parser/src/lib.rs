mod comments;
mod model;
mod resolve;

use pest::Parser as _;
use pest::iterators::Pair;
use pest_derive::Parser;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

use crate::comments::CommentIndex;
pub use model::*;

#[derive(Parser)]
#[grammar = "resources/proto.pest"] // Path relative to src/
pub struct ProtoParser;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Pest(Box<pest::error::Error<Rule>>),
    #[error("unresolved type `{name}` referenced from `{scope}`")]
    UnresolvedType { name: String, scope: String },
    #[error("`{name}` has out-of-range number {value}")]
    NumberOutOfRange { name: String, value: i64 },
    #[error("`{0}` is declared more than once")]
    DuplicateSymbol(String),
    #[error("{0}")]
    Message(&'static str),
}

impl From<pest::error::Error<Rule>> for ParseError {
    fn from(e: pest::error::Error<Rule>) -> Self {
        Self::Pest(Box::new(e))
    }
}

// Public API: parse a .proto file into the descriptor tree.
// Type references must resolve within the file itself; use `parse_proto_files` for imports.
pub fn parse_proto_file<P: AsRef<Path>>(path: P) -> Result<ProtoModel, ParseError> {
    let mut models = parse_proto_files(&[path])?;
    models.pop().ok_or(ParseError::Message("expected proto root"))
}

/// Parses several files together so references may cross file (and package) boundaries.
/// Models are returned in the order the paths were given.
pub fn parse_proto_files<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<ProtoModel>, ParseError> {
    let mut models = Vec::with_capacity(paths.len());
    for path in paths {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let name = path.to_string_lossy().replace('\\', "/");
        models.push(parse_unresolved(&content, Some(name))?);
    }
    resolve::resolve_references(&mut models)?;
    Ok(models)
}

/// Parses schema text that has no file of its own.
pub fn parse_proto_str(content: &str) -> Result<ProtoModel, ParseError> {
    let mut models = vec![parse_unresolved(content, None)?];
    resolve::resolve_references(&mut models)?;
    models.pop().ok_or(ParseError::Message("expected proto root"))
}

fn parse_unresolved(content: &str, file_name: Option<String>) -> Result<ProtoModel, ParseError> {
    let mut pairs = ProtoParser::parse(Rule::proto, content)?;
    let proto_pair = pairs
        .next()
        .ok_or(ParseError::Message("expected proto root"))?;
    let model = parse_proto(proto_pair, content, file_name)?;
    debug!(
        file = model.file_name.as_deref().unwrap_or("<inline>"),
        package = model.package_name(),
        messages = model.messages.len(),
        enums = model.enums.len(),
        services = model.services.len(),
        "parsed proto file"
    );
    Ok(model)
}

fn parse_proto(
    pair: Pair<Rule>,
    src: &str,
    file_name: Option<String>,
) -> Result<ProtoModel, ParseError> {
    let mut model = ProtoModel {
        file_name,
        ..ProtoModel::default()
    };
    let mut body: Option<Pair<Rule>> = None;

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::syntax_statement => {
                if inner.as_str().contains("proto3") {
                    model.syntax = Syntax::Proto3;
                }
            }
            Rule::proto_body => body = Some(inner),
            _ => {}
        }
    }

    let Some(body) = body else {
        return Ok(model);
    };

    // Package first: every definition is qualified by it, wherever it appears in the file.
    model.package = body
        .clone()
        .into_inner()
        .find(|p| p.as_rule() == Rule::package_statement)
        .and_then(|p| p.into_inner().find(|p| p.as_rule() == Rule::package_name))
        .and_then(|p| p.into_inner().find(|x| x.as_rule() == Rule::full_ident))
        .map(|p| p.as_str().to_string());

    let file = FileContext {
        comments: CommentIndex::new(src),
        syntax: model.syntax,
        package: model.package.clone().unwrap_or_default(),
    };

    for b in body.into_inner() {
        if b.as_rule() != Rule::top_level_definition {
            continue;
        }
        for def in b.into_inner() {
            match def.as_rule() {
                Rule::message_block => {
                    let message = file.parse_message_block(def, &file.package)?;
                    model.messages.push(message);
                }
                Rule::enum_block => {
                    let en = file.parse_enum_block(def, &file.package)?;
                    model.enums.push(en);
                }
                Rule::service_block => {
                    let service = file.parse_service_block(def)?;
                    model.services.push(service);
                }
                _ => {}
            }
        }
    }

    Ok(model)
}

pub(crate) fn qualify(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{scope}.{name}")
    }
}

/// Per-file state shared by the block parsers.
struct FileContext<'a> {
    comments: CommentIndex<'a>,
    syntax: Syntax,
    package: String,
}

impl FileContext<'_> {
    fn parse_message_block(&self, block: Pair<Rule>, scope: &str) -> Result<Message, ParseError> {
        // message_block = { "message" ~ message_name ~ message_body }
        let comments = self.comments.comments_for(block.as_span());
        let mut name: Option<String> = None;
        let mut body_opt: Option<Pair<Rule>> = None;

        for p in block.into_inner() {
            match p.as_rule() {
                Rule::message_name => name = Some(p.as_str().to_string()),
                Rule::message_body => body_opt = Some(p),
                _ => {}
            }
        }
        let name = name.ok_or(ParseError::Message("message without a name"))?;
        let full_name = qualify(scope, &name);
        let mut message = Message {
            name,
            full_name,
            comments,
            ..Message::default()
        };
        if let Some(body) = body_opt {
            self.parse_message_body(body, &mut message)?;
        }
        Ok(message)
    }

    fn parse_message_body(&self, body: Pair<Rule>, message: &mut Message) -> Result<(), ParseError> {
        // message_body = { "{" ~ message_element* ~ "}" }
        let mut optionals: Vec<usize> = Vec::new();
        for elem in body.into_inner() {
            if elem.as_rule() != Rule::message_element {
                continue;
            }
            for inner in elem.into_inner() {
                match inner.as_rule() {
                    Rule::field => {
                        let field = self.parse_field(inner, &message.full_name)?;
                        if field.proto3_optional {
                            optionals.push(message.fields.len());
                        }
                        message.fields.push(field);
                    }
                    Rule::group_field => {
                        let (field, group) = self.parse_group_field(inner, &message.full_name)?;
                        message.messages.push(group);
                        message.fields.push(field);
                    }
                    Rule::map_field => {
                        let (field, entry) = self.parse_map_field(inner, &message.full_name)?;
                        message.messages.push(entry);
                        message.fields.push(field);
                    }
                    Rule::oneof => self.parse_oneof(inner, message)?,
                    Rule::enum_block => {
                        let en = self.parse_enum_block(inner, &message.full_name)?;
                        message.enums.push(en);
                    }
                    Rule::message_block => {
                        let nested = self.parse_message_block(inner, &message.full_name)?;
                        message.messages.push(nested);
                    }
                    _ => {}
                }
            }
        }

        // Synthetic oneofs follow every declared oneof, as protoc orders them.
        for idx in optionals {
            let oneof_index = message.oneofs.len();
            let name = format!("_{}", message.fields[idx].name);
            message.fields[idx].oneof = Some(oneof_index);
            message.oneofs.push(Oneof {
                full_name: qualify(&message.full_name, &name),
                name,
                synthetic: true,
                comments: Comments::default(),
            });
        }
        Ok(())
    }

    fn parse_oneof(&self, pair: Pair<Rule>, message: &mut Message) -> Result<(), ParseError> {
        // oneof = { "oneof" ~ oneof_name ~ "{" ~ oneof_field* ~ "}" }
        let index = message.oneofs.len();
        let mut oneof = Oneof {
            comments: self.comments.comments_for(pair.as_span()),
            ..Oneof::default()
        };
        for p in pair.into_inner() {
            match p.as_rule() {
                Rule::oneof_name => {
                    oneof.name = p.as_str().to_string();
                    oneof.full_name = qualify(&message.full_name, &oneof.name);
                }
                Rule::oneof_field => {
                    for f in p.into_inner() {
                        if f.as_rule() != Rule::field {
                            continue;
                        }
                        let mut field = self.parse_field(f, &message.full_name)?;
                        field.oneof = Some(index);
                        field.cardinality = Cardinality::Optional;
                        field.proto3_optional = false;
                        message.fields.push(field);
                    }
                }
                _ => {}
            }
        }
        message.oneofs.push(oneof);
        Ok(())
    }

    fn parse_field(&self, pair: Pair<Rule>, scope: &str) -> Result<Field, ParseError> {
        // field = { field_modifier? ~ type_reference ~ field_name ~ "=" ~ tag ~ field_options? ~ ";" }
        let comments = self.comments.comments_for(pair.as_span());
        let mut modifier: Option<&str> = None;
        let mut ty_opt: Option<FieldKind> = None;
        let mut name_opt: Option<String> = None;
        let mut tag_opt: Option<i64> = None;

        for p in pair.into_inner() {
            match p.as_rule() {
                Rule::field_modifier => modifier = Some(p.as_str()),
                Rule::type_reference => ty_opt = parse_type_reference(p),
                Rule::field_name => name_opt = Some(p.as_str().to_string()),
                Rule::tag => tag_opt = Some(parse_integer_value(p)),
                _ => {}
            }
        }

        let name = name_opt.ok_or(ParseError::Message("field without a name"))?;
        let full_name = qualify(scope, &name);
        let kind = ty_opt.ok_or(ParseError::Message("field without a type"))?;
        let number = field_number(tag_opt, &full_name)?;
        let (cardinality, proto3_optional) = self.cardinality(modifier);
        Ok(Field {
            full_name,
            name,
            number,
            cardinality,
            kind,
            oneof: None,
            proto3_optional,
            comments,
        })
    }

    fn cardinality(&self, modifier: Option<&str>) -> (Cardinality, bool) {
        match (modifier, self.syntax) {
            (Some("repeated"), _) => (Cardinality::Repeated, false),
            (Some("required"), _) => (Cardinality::Required, false),
            (Some("optional"), Syntax::Proto3) => (Cardinality::Optional, true),
            _ => (Cardinality::Optional, false),
        }
    }

    fn parse_group_field(&self, pair: Pair<Rule>, scope: &str) -> Result<(Field, Message), ParseError> {
        // group_field = { field_modifier ~ "group" ~ group_name ~ "=" ~ tag ~ field_options? ~ message_body }
        let comments = self.comments.comments_for(pair.as_span());
        let mut modifier: Option<&str> = None;
        let mut name_opt: Option<String> = None;
        let mut tag_opt: Option<i64> = None;
        let mut body_opt: Option<Pair<Rule>> = None;

        for p in pair.into_inner() {
            match p.as_rule() {
                Rule::field_modifier => modifier = Some(p.as_str()),
                Rule::group_name => name_opt = Some(p.as_str().to_string()),
                Rule::tag => tag_opt = Some(parse_integer_value(p)),
                Rule::message_body => body_opt = Some(p),
                _ => {}
            }
        }

        let group_name = name_opt.ok_or(ParseError::Message("group without a name"))?;
        // protoc names the field after the group, lowercased.
        let name = group_name.to_ascii_lowercase();
        let full_name = qualify(scope, &name);
        let number = field_number(tag_opt, &full_name)?;

        let mut group = Message {
            full_name: qualify(scope, &group_name),
            name: group_name,
            ..Message::default()
        };
        if let Some(body) = body_opt {
            self.parse_message_body(body, &mut group)?;
        }

        let (cardinality, _) = self.cardinality(modifier);
        let field = Field {
            full_name,
            name,
            number,
            cardinality,
            // Absolute reference: the group message is declared right here.
            kind: FieldKind::Group(TypeRef {
                full_name: format!(".{}", group.full_name),
                package: self.package.clone(),
            }),
            oneof: None,
            proto3_optional: false,
            comments,
        };
        Ok((field, group))
    }

    fn parse_map_field(&self, pair: Pair<Rule>, scope: &str) -> Result<(Field, Message), ParseError> {
        // map_field = { "map" ~ "<" ~ key_type ~ "," ~ type_reference ~ ">" ~ field_name ~ "=" ~ tag ~ ... }
        let comments = self.comments.comments_for(pair.as_span());
        let mut key: Option<ScalarType> = None;
        let mut value: Option<FieldKind> = None;
        let mut name_opt: Option<String> = None;
        let mut tag_opt: Option<i64> = None;

        for p in pair.into_inner() {
            match p.as_rule() {
                Rule::key_type => {
                    key = p
                        .into_inner()
                        .next()
                        .and_then(|s| parse_scalar_type(s.as_str()))
                }
                Rule::type_reference => value = parse_type_reference(p),
                Rule::field_name => name_opt = Some(p.as_str().to_string()),
                Rule::tag => tag_opt = Some(parse_integer_value(p)),
                _ => {}
            }
        }

        let name = name_opt.ok_or(ParseError::Message("map field without a name"))?;
        let key = key.ok_or(ParseError::Message("map field without a key type"))?;
        let value = value.ok_or(ParseError::Message("map field without a value type"))?;
        let number = field_number(tag_opt, &qualify(scope, &name))?;
        let entry_name = map_entry_name(&name);
        let entry_full_name = qualify(scope, &entry_name);
        let entry_field = |name: &str, number: u32, kind: FieldKind| Field {
            name: name.to_string(),
            full_name: qualify(&entry_full_name, name),
            number,
            cardinality: Cardinality::Optional,
            kind,
            oneof: None,
            proto3_optional: false,
            comments: Comments::default(),
        };
        let entry = Message {
            name: entry_name.clone(),
            full_name: entry_full_name.clone(),
            fields: vec![
                entry_field("key", 1, FieldKind::Scalar(key)),
                entry_field("value", 2, value),
            ],
            map_entry: true,
            ..Message::default()
        };
        let field = Field {
            full_name: qualify(scope, &name),
            name,
            number,
            cardinality: Cardinality::Repeated,
            // Absolute reference: the entry is known to live right here.
            kind: FieldKind::Message(TypeRef {
                full_name: format!(".{entry_full_name}"),
                package: self.package.clone(),
            }),
            oneof: None,
            proto3_optional: false,
            comments,
        };
        Ok((field, entry))
    }

    fn parse_enum_block(&self, block: Pair<Rule>, scope: &str) -> Result<Enum, ParseError> {
        // enum_block = { "enum" ~ enum_name ~ "{" ~ enum_body* ~ "}" }
        let mut en = Enum {
            comments: self.comments.comments_for(block.as_span()),
            ..Enum::default()
        };

        for p in block.into_inner() {
            match p.as_rule() {
                Rule::enum_name => {
                    en.name = p.as_str().to_string();
                    en.full_name = qualify(scope, &en.name);
                }
                Rule::enum_body => {
                    for eb in p.into_inner() {
                        if eb.as_rule() != Rule::enum_field {
                            continue;
                        }
                        let comments = self.comments.comments_for(eb.as_span());
                        let mut val_name: Option<String> = None;
                        let mut value: Option<i64> = None;
                        for ef in eb.into_inner() {
                            match ef.as_rule() {
                                Rule::enum_field_name => val_name = Some(ef.as_str().to_string()),
                                Rule::enum_field_value => value = Some(parse_integer_value(ef)),
                                _ => {}
                            }
                        }
                        let vn = val_name.ok_or(ParseError::Message("enum value without a name"))?;
                        // Values are scoped as siblings of the enum itself.
                        let full_name = qualify(scope, &vn);
                        let value = value.ok_or(ParseError::Message("enum value without a number"))?;
                        let number = i32::try_from(value).map_err(|_| ParseError::NumberOutOfRange {
                            name: full_name.clone(),
                            value,
                        })?;
                        en.values.push(EnumValue {
                            full_name,
                            name: vn,
                            number,
                            comments,
                        });
                    }
                }
                _ => {}
            }
        }

        Ok(en)
    }

    fn parse_service_block(&self, block: Pair<Rule>) -> Result<Service, ParseError> {
        // service_block = { "service" ~ service_name ~ "{" ~ rpc* ~ "}" }
        let mut service = Service {
            comments: self.comments.comments_for(block.as_span()),
            ..Service::default()
        };
        for p in block.into_inner() {
            match p.as_rule() {
                Rule::service_name => {
                    service.name = p.as_str().to_string();
                    service.full_name = qualify(&self.package, &service.name);
                }
                Rule::rpc => {
                    let method = self.parse_rpc(p, &service.full_name)?;
                    service.methods.push(method);
                }
                _ => {}
            }
        }
        Ok(service)
    }

    fn parse_rpc(&self, pair: Pair<Rule>, service: &str) -> Result<Method, ParseError> {
        let comments = self.comments.comments_for(pair.as_span());
        let mut name_opt: Option<String> = None;
        let mut client_streaming = false;
        let mut server_streaming = false;
        let mut types: Vec<TypeRef> = Vec::with_capacity(2);

        for p in pair.into_inner() {
            match p.as_rule() {
                Rule::rpc_name => name_opt = Some(p.as_str().to_string()),
                Rule::client_stream => client_streaming = true,
                Rule::server_stream => server_streaming = true,
                Rule::message_type => types.push(TypeRef {
                    full_name: p.as_str().to_string(),
                    package: String::new(),
                }),
                _ => {}
            }
        }

        let name = name_opt.ok_or(ParseError::Message("rpc without a name"))?;
        let [input, output]: [TypeRef; 2] = types
            .try_into()
            .map_err(|_| ParseError::Message("rpc needs one input and one output type"))?;
        Ok(Method {
            full_name: qualify(service, &name),
            name,
            input,
            output,
            client_streaming,
            server_streaming,
            comments,
        })
    }
}

/// Tag of a field; must fit the wire format's unsigned 32 bits.
fn field_number(tag: Option<i64>, full_name: &str) -> Result<u32, ParseError> {
    let value = tag.ok_or(ParseError::Message("field without a number"))?;
    u32::try_from(value).map_err(|_| ParseError::NumberOutOfRange {
        name: full_name.to_string(),
        value,
    })
}

/// Named types come back with the name as written; `resolve` rewrites them.
fn parse_type_reference(pair: Pair<Rule>) -> Option<FieldKind> {
    // type_reference = { scalar_type | message_type }
    let inner = pair.into_inner().next()?;
    match inner.as_rule() {
        Rule::scalar_type => parse_scalar_type(inner.as_str()).map(FieldKind::Scalar),
        _ => Some(FieldKind::Message(TypeRef {
            full_name: inner.as_str().to_string(),
            package: String::new(),
        })),
    }
}

fn parse_scalar_type(s: &str) -> Option<ScalarType> {
    let scalar = match s {
        "double" => ScalarType::Double,
        "float" => ScalarType::Float,
        "int32" => ScalarType::Int32,
        "int64" => ScalarType::Int64,
        "uint32" => ScalarType::Uint32,
        "uint64" => ScalarType::Uint64,
        "sint32" => ScalarType::Sint32,
        "sint64" => ScalarType::Sint64,
        "fixed32" => ScalarType::Fixed32,
        "fixed64" => ScalarType::Fixed64,
        "sfixed32" => ScalarType::Sfixed32,
        "sfixed64" => ScalarType::Sfixed64,
        "bool" => ScalarType::Bool,
        "string" => ScalarType::String,
        "bytes" => ScalarType::Bytes,
        _ => return None,
    };
    Some(scalar)
}

fn parse_integer_value(pair: Pair<Rule>) -> i64 {
    // integer_value = dec|hex|oct with optional minus; out-of-range values saturate
    let s = pair.as_str().trim();
    let (neg, rest) = match s.strip_prefix('-') {
        Some(stripped) => (true, stripped),
        None => (false, s),
    };
    let val: i128 = if let Some(hex) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
        i128::from_str_radix(hex, 16).unwrap_or(0)
    } else if rest.starts_with('0') && rest.len() > 1 {
        // Octal per grammar
        i128::from_str_radix(&rest[1..], 8).unwrap_or(0)
    } else {
        rest.parse::<i128>().unwrap_or(0)
    };
    let signed = if neg { -val } else { val };
    signed.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// protoc's name for the entry message of a map field: `my_map` -> `MyMapEntry`.
fn map_entry_name(field: &str) -> String {
    let mut out = String::with_capacity(field.len() + 5);
    let mut upper = true;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out.push_str("Entry");
    out
}
