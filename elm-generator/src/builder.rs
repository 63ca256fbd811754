use std::collections::{BTreeSet, HashMap};

use parser::{
    Cardinality, Enum, Field as ProtoField, FieldKind, Message, ProtoModel, ScalarType,
    Service as ProtoService,
};
use tracing::debug;

use crate::casing::{KEYWORDS, casing, file_module_source, package_module_name};
use crate::config::Config;
use crate::error::GenerateError;
use crate::ir::{
    ElementType, ElmRef, ElmScalar, Field, FieldType, Module, Oneof, OneofVariant, Record, Rpc,
    Service, Union, Variant, VariantAlias,
};
use crate::namespace::Namespace;
use crate::registrar::Registrar;
use crate::resolver::Resolver;

const IMPORT_BYTES: &str = "Bytes";
const IMPORT_DICT: &str = "Dict";

/// Builds the module for one file, or for several files of one package merged
/// with [`merge_packages`].
#[tracing::instrument(level = "debug", skip_all, fields(package = model.package_name()))]
pub fn build_module(model: &ProtoModel, config: &Config) -> Result<Module, GenerateError> {
    config.validate()?;
    let name = module_name(model, config);
    let path = format!("{}.elm", name.replace('.', "/"));

    let mut registrar = Registrar::new(config, model.package_name());
    registrar.register_all(model);
    debug!(names = registrar.keys().len(), "registered schema names");

    let mut builder = ModuleBuilder {
        registrar: &registrar,
        config,
        resolver: Resolver::new(&registrar, config, &name),
        imports: BTreeSet::new(),
        oneofs: Vec::new(),
    };
    let mut unions = builder.unions()?;
    let mut records = builder.records()?;
    let mut services = builder.services()?;
    let ModuleBuilder {
        imports,
        mut oneofs,
        ..
    } = builder;

    unions.sort_by(|a, b| a.ty.id.cmp(&b.ty.id));
    records.sort_by(|a, b| a.ty.id.cmp(&b.ty.id));
    oneofs.sort_by(|a, b| a.ty.id.cmp(&b.ty.id));
    services.sort_by(|a, b| a.label.cmp(&b.label));

    debug!(
        module = %name,
        unions = unions.len(),
        oneofs = oneofs.len(),
        records = records.len(),
        services = services.len(),
        "built module"
    );
    Ok(Module {
        name,
        path,
        package: model.package_name().to_string(),
        imports: imports.into_iter().collect(),
        unions,
        oneofs,
        records,
        services,
    })
}

/// Elm module name for a model: the override, else its package or file name.
pub fn module_name(model: &ProtoModel, config: &Config) -> String {
    if let Some(name) = &config.module_name {
        return name.clone();
    }
    let source = match model.package.as_deref() {
        Some(package) if !package.is_empty() => package.to_string(),
        _ => model
            .file_name
            .as_deref()
            .and_then(file_module_source)
            .unwrap_or_else(|| "X".to_string()),
    };
    package_module_name(&source, &config.module_prefix)
}

/// Folds files sharing a package into one model, in first-seen order.
/// Files without a package stay on their own.
pub fn merge_packages(models: &[ProtoModel]) -> Vec<ProtoModel> {
    let mut merged: Vec<ProtoModel> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for model in models {
        let package = model.package_name();
        if package.is_empty() {
            merged.push(model.clone());
            continue;
        }
        match index.get(package) {
            Some(&i) => {
                let target = &mut merged[i];
                target.enums.extend(model.enums.iter().cloned());
                target.messages.extend(model.messages.iter().cloned());
                target.services.extend(model.services.iter().cloned());
            }
            None => {
                index.insert(package, merged.len());
                merged.push(model.clone());
            }
        }
    }
    merged
}

/// Walks the registered elements and resolves them into IR.
///
/// Identifiers are claimed the first time they are resolved, so elements are
/// visited by fully-qualified name rather than in declaration order. Which of
/// two clashing names gets suffixed then depends on the schema alone.
struct ModuleBuilder<'r, 'a> {
    registrar: &'r Registrar<'a>,
    config: &'r Config,
    resolver: Resolver<'r, 'a>,
    imports: BTreeSet<String>,
    oneofs: Vec<Oneof>,
}

impl<'r, 'a> ModuleBuilder<'r, 'a> {
    fn unions(&mut self) -> Result<Vec<Union>, GenerateError> {
        let mut enums = self.registrar.enums().to_vec();
        enums.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        enums.into_iter().map(|en| self.union(en)).collect()
    }

    fn union(&mut self, en: &Enum) -> Result<Union, GenerateError> {
        if en.values.is_empty() {
            return Err(GenerateError::EmptyEnum(en.full_name.clone()));
        }
        let ty = self.resolver.resolve_type(&en.full_name)?;
        let mut variants: Vec<Variant> = Vec::new();
        let mut aliases = Vec::new();
        let mut seen: HashMap<i32, usize> = HashMap::new();

        for value in &en.values {
            if let Some(&variant) = seen.get(&value.number) {
                aliases.push(VariantAlias {
                    id: ElmRef::local(self.resolver.resolve_value(&value.full_name)?),
                    label: value.name.clone(),
                    number: value.number,
                    variant,
                    comments: value.comments.clone(),
                });
            } else {
                seen.insert(value.number, variants.len());
                variants.push(Variant {
                    id: ElmRef::local(self.resolver.resolve_type_id(&value.full_name)?),
                    label: value.name.clone(),
                    number: value.number,
                    comments: value.comments.clone(),
                });
            }
        }

        let default = variants.iter().position(|v| v.number == 0).unwrap_or(0);
        Ok(Union {
            ty,
            variants,
            default,
            aliases,
            comments: en.comments.clone(),
        })
    }

    fn records(&mut self) -> Result<Vec<Record>, GenerateError> {
        let mut messages: Vec<&'a Message> = self
            .registrar
            .messages()
            .iter()
            .copied()
            .filter(|m| !m.map_entry)
            .collect();
        messages.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        messages.into_iter().map(|m| self.record(m)).collect()
    }

    fn record(&mut self, message: &Message) -> Result<Record, GenerateError> {
        let ty = self.resolver.resolve_type(&message.full_name)?;
        let mut labels = Namespace::with_reserved(&self.config.collision_suffix, &[]);
        let mut fields = Vec::with_capacity(message.fields.len());
        let mut oneofs_seen = BTreeSet::new();

        for field in &message.fields {
            let Some(index) = field.oneof else {
                let label = field_label(&mut labels, &field.name, &field.full_name)?;
                fields.push(self.field(field, label)?);
                continue;
            };
            // The whole group lands where its first member was declared.
            if !oneofs_seen.insert(index) {
                continue;
            }
            let oneof = &message.oneofs[index];
            if oneof.synthetic {
                let label = field_label(&mut labels, &field.name, &field.full_name)?;
                fields.push(Field {
                    label,
                    number: Some(field.number),
                    cardinality: Cardinality::Optional,
                    field_type: FieldType::Maybe(self.element_type(field)?),
                    comments: field.comments.clone(),
                });
                continue;
            }

            let oneof_ty = self.resolver.resolve_type(&oneof.full_name)?;
            let mut member_labels = Namespace::with_reserved(&self.config.collision_suffix, &[]);
            let mut variants = Vec::new();
            for member in message.oneof_fields(index) {
                let id = ElmRef::local(self.resolver.resolve_type_id(&member.full_name)?);
                let label = field_label(&mut member_labels, &member.name, &member.full_name)?;
                variants.push(OneofVariant {
                    id,
                    field: self.field(member, label)?,
                });
            }
            self.oneofs.push(Oneof {
                ty: oneof_ty.clone(),
                variants,
                comments: oneof.comments.clone(),
            });
            fields.push(Field {
                label: field_label(&mut labels, &oneof.name, &oneof.full_name)?,
                number: None,
                cardinality: Cardinality::Optional,
                field_type: FieldType::Oneof(oneof_ty),
                comments: oneof.comments.clone(),
            });
        }

        Ok(Record {
            ty,
            fields,
            comments: message.comments.clone(),
        })
    }

    fn field(&mut self, field: &ProtoField, label: String) -> Result<Field, GenerateError> {
        let field_type = match field.cardinality {
            Cardinality::Repeated => match self.map_entry(field) {
                Some(entry) => self.map_type(field, entry)?,
                None => FieldType::List(self.element_type(field)?),
            },
            Cardinality::Optional | Cardinality::Required => {
                FieldType::Single(self.element_type(field)?)
            }
        };
        Ok(Field {
            label,
            number: Some(field.number),
            cardinality: field.cardinality,
            field_type,
            comments: field.comments.clone(),
        })
    }

    fn map_entry(&self, field: &ProtoField) -> Option<&'a Message> {
        match &field.kind {
            FieldKind::Message(target) => self
                .registrar
                .message(&target.full_name)
                .filter(|m| m.map_entry),
            _ => None,
        }
    }

    fn map_type(&mut self, field: &ProtoField, entry: &Message) -> Result<FieldType, GenerateError> {
        let (Some(key_field), Some(value_field)) = (entry.fields.first(), entry.fields.get(1)) else {
            return Err(unsupported(field));
        };
        let key = self.element_type(key_field)?;
        if !matches!(
            key,
            ElementType::Scalar {
                elm: ElmScalar::Int | ElmScalar::String,
                ..
            }
        ) {
            return Err(GenerateError::UnsupportedKind {
                field: field.full_name.clone(),
                kind: format!("map<{}, {}>", key_field.kind, value_field.kind),
            });
        }
        let value = self.element_type(value_field)?;
        self.imports.insert(IMPORT_DICT.to_string());
        Ok(FieldType::Map { key, value })
    }

    fn element_type(&mut self, field: &ProtoField) -> Result<ElementType, GenerateError> {
        match &field.kind {
            FieldKind::Scalar(wire) => {
                let elm = elm_scalar(*wire).ok_or_else(|| unsupported(field))?;
                if elm == ElmScalar::Bytes {
                    self.imports.insert(IMPORT_BYTES.to_string());
                }
                Ok(ElementType::Scalar { wire: *wire, elm })
            }
            FieldKind::Enum(target) | FieldKind::Message(target) => {
                let derived = self.resolver.resolve_ref(target)?;
                if let Some(module) = &derived.id.module {
                    self.imports.insert(module.clone());
                }
                Ok(ElementType::Named(derived))
            }
            FieldKind::Group(_) => Err(unsupported(field)),
        }
    }

    fn services(&mut self) -> Result<Vec<Service>, GenerateError> {
        let mut services = self.registrar.services().to_vec();
        services.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        services.into_iter().map(|s| self.service(s)).collect()
    }

    fn service(&mut self, service: &ProtoService) -> Result<Service, GenerateError> {
        let mut methods = Vec::with_capacity(service.methods.len());
        for method in &service.methods {
            let id = ElmRef::local(self.resolver.resolve_value(&method.full_name)?);
            let input = self.resolver.resolve_ref(&method.input)?;
            let output = self.resolver.resolve_ref(&method.output)?;
            for module in [&input.id.module, &output.id.module].into_iter().flatten() {
                self.imports.insert(module.clone());
            }
            methods.push(Rpc {
                id,
                method: method.name.clone(),
                service: service.full_name.clone(),
                input,
                output,
                client_streaming: method.client_streaming,
                server_streaming: method.server_streaming,
                comments: method.comments.clone(),
            });
        }
        methods.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(Service {
            label: service.name.clone(),
            full_name: service.full_name.clone(),
            methods,
            comments: service.comments.clone(),
        })
    }
}

/// Value-cased field name, claimed among its siblings. Keywords get an `x` prefix.
fn field_label(labels: &mut Namespace, name: &str, entity: &str) -> Result<String, GenerateError> {
    let mut candidate = casing(name, "", false);
    if KEYWORDS.contains(&candidate.as_str()) {
        candidate = format!("x{}", casing(name, "", true));
    }
    labels
        .register(&candidate)
        .map_err(|collision| GenerateError::Collision {
            entity: entity.to_string(),
            candidate: collision.candidate,
        })
}

fn elm_scalar(wire: ScalarType) -> Option<ElmScalar> {
    match wire {
        ScalarType::Bool => Some(ElmScalar::Bool),
        ScalarType::Int32
        | ScalarType::Uint32
        | ScalarType::Sint32
        | ScalarType::Fixed32
        | ScalarType::Sfixed32 => Some(ElmScalar::Int),
        ScalarType::Float | ScalarType::Double => Some(ElmScalar::Float),
        ScalarType::String => Some(ElmScalar::String),
        ScalarType::Bytes => Some(ElmScalar::Bytes),
        // Elm has no 64-bit integers.
        ScalarType::Int64
        | ScalarType::Uint64
        | ScalarType::Sint64
        | ScalarType::Fixed64
        | ScalarType::Sfixed64 => None,
    }
}

fn unsupported(field: &ProtoField) -> GenerateError {
    GenerateError::UnsupportedKind {
        field: field.full_name.clone(),
        kind: field.kind.to_string(),
    }
}
