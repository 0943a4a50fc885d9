//! JSON-deserializable schema description.
//!
//! These types describe a schema as data, for example a schema file shipped
//! with your application. Host capabilities (position functions, size
//! functions, composites and enums) are referred to by name and looked up in a
//! [Registry] when the description is turned into a [Schema].

use std::collections::HashMap;

use ::serde::{Deserialize, Serialize};

use crate::{
    capability::{CompositeRef, PositionFn, SizeFn},
    config::{MismatchPolicy, ResolveConfig},
    errors::{Diagnostic, ResolveError, SchemaError},
    field::{Accessibility, Alternate, FieldDescriptor},
    plan::LayoutPlan,
    schema::Schema,
    types::{DeclaredType, EnumType, Primitive},
};

/// Top-level schema definition.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SchemaDef {
    pub name: String,
    #[serde(default)]
    pub read_only: bool,
    /// Enumerations declared inline; these shadow registry entries of the same name.
    #[serde(default)]
    pub enums: Vec<EnumType>,
    pub fields: Vec<FieldDef>,
    #[serde(default)]
    pub config: Option<ConfigDef>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ConfigDef {
    #[serde(default)]
    pub position_mismatch: MismatchPolicy,
}

/// Description of a single field.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeDef,
    #[serde(default)]
    pub doc: Vec<String>,
    #[serde(default)]
    pub accessibility: Option<Accessibility>,
    #[serde(default)]
    pub read_only: bool,
    /// Explicit byte offset.
    #[serde(default)]
    pub position: Option<usize>,
    /// Registered position function; takes precedence over `position`.
    #[serde(default)]
    pub position_function: Option<String>,
    #[serde(default)]
    pub size: Option<usize>,
    /// Registered size function.
    #[serde(default)]
    pub size_function: Option<String>,
    #[serde(default)]
    pub bits: Option<u8>,
    #[serde(default)]
    pub remainder: bool,
    #[serde(default)]
    pub enum_backing: Option<Primitive>,
}

/// Declared type of a field, e.g. `{"primitive": "u16"}` or `"bytes"`.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "snake_case")]
pub enum TypeDef {
    Primitive(Primitive),
    /// Name of an inline or registered enumeration.
    Enum(String),
    /// Name of a registered composite.
    Composite(String),
    Bytes,
    ByteArray(usize),
    /// Union anchor with its alternates.
    Union(Vec<AlternateDef>),
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AlternateDef {
    pub name: String,
    pub fields: Vec<FieldDef>,
}

/// Named host capabilities available to JSON schemas.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    positions: HashMap<String, PositionFn>,
    sizes: HashMap<String, SizeFn>,
    composites: HashMap<String, CompositeRef>,
    enums: HashMap<String, EnumType>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position_fn(&mut self, function: PositionFn) -> &mut Self {
        self.positions.insert(function.name().to_string(), function);
        self
    }

    pub fn size_fn(&mut self, function: SizeFn) -> &mut Self {
        self.sizes.insert(function.name().to_string(), function);
        self
    }

    pub fn composite(&mut self, composite: CompositeRef) -> &mut Self {
        self.composites.insert(composite.name().to_string(), composite);
        self
    }

    pub fn enumeration(&mut self, enumeration: EnumType) -> &mut Self {
        self.enums.insert(enumeration.name.clone(), enumeration);
        self
    }
}

struct Scope<'a> {
    registry: &'a Registry,
    enums: &'a [EnumType],
    diagnostics: Vec<Diagnostic>,
}

impl Scope<'_> {
    fn unknown(&mut self, path: &str, kind: &'static str, name: &str) {
        self.diagnostics.push(Diagnostic::new(
            path,
            SchemaError::UnknownCapability {
                kind,
                name: name.to_string(),
            },
        ));
    }

    fn fields(&mut self, defs: &[FieldDef], prefix: Option<&str>) -> Vec<FieldDescriptor> {
        defs.iter()
            .map(|def| {
                let path = match prefix {
                    Some(prefix) => format!("{prefix}.{}", def.name),
                    None => def.name.clone(),
                };
                self.field(def, &path)
            })
            .collect()
    }

    fn field(&mut self, def: &FieldDef, path: &str) -> FieldDescriptor {
        let mut field = match &def.ty {
            TypeDef::Primitive(primitive) => FieldDescriptor::new(&def.name, *primitive),
            TypeDef::Enum(name) => {
                let found = self
                    .enums
                    .iter()
                    .find(|enumeration| &enumeration.name == name)
                    .or_else(|| self.registry.enums.get(name))
                    .cloned();
                match found {
                    Some(enumeration) => FieldDescriptor::new(&def.name, enumeration),
                    None => {
                        self.unknown(path, "enum", name);
                        FieldDescriptor::new(&def.name, DeclaredType::Bytes)
                    }
                }
            }
            TypeDef::Composite(name) => match self.registry.composites.get(name) {
                Some(composite) => FieldDescriptor::new(&def.name, composite.clone()),
                None => {
                    self.unknown(path, "composite", name);
                    FieldDescriptor::new(&def.name, DeclaredType::Bytes)
                }
            },
            TypeDef::Bytes => FieldDescriptor::new(&def.name, DeclaredType::Bytes),
            TypeDef::ByteArray(len) => {
                FieldDescriptor::new(&def.name, DeclaredType::ByteArray(*len))
            }
            TypeDef::Union(alternates) => {
                let alternates = alternates
                    .iter()
                    .map(|alternate| {
                        let prefix = format!("{path}.{}", alternate.name);
                        let fields = self.fields(&alternate.fields, Some(&prefix));
                        Alternate::new(&alternate.name, fields)
                    })
                    .collect();
                FieldDescriptor::union(&def.name, alternates)
            }
        };

        field.doc_lines = def.doc.clone();
        field.accessibility = def.accessibility;
        field.read_only = def.read_only;
        field.size = def.size;
        field.bits = def.bits;
        field.remainder = def.remainder;
        field.enum_backing = def.enum_backing;

        if let Some(offset) = def.position {
            field = field.at(offset);
        }
        if let Some(name) = &def.position_function {
            match self.registry.positions.get(name) {
                Some(function) => field = field.position_fn(function.clone()),
                None => self.unknown(path, "position function", name),
            }
        }
        if let Some(name) = &def.size_function {
            match self.registry.sizes.get(name) {
                Some(function) => field = field.size_fn(function.clone()),
                None => self.unknown(path, "size function", name),
            }
        }

        field
    }
}

impl SchemaDef {
    /// Builds the [Schema], reporting every unknown capability name at once.
    pub fn into_schema(&self, registry: &Registry) -> Result<Schema, ResolveError> {
        let mut scope = Scope {
            registry,
            enums: &self.enums,
            diagnostics: Vec::new(),
        };
        let fields = scope.fields(&self.fields, None);

        if !scope.diagnostics.is_empty() {
            return Err(ResolveError {
                schema: self.name.clone(),
                diagnostics: scope.diagnostics,
            });
        }

        Ok(Schema {
            name: self.name.clone(),
            read_only: self.read_only,
            fields,
        })
    }

    pub fn resolve_config(&self) -> ResolveConfig {
        let mut config = ResolveConfig::new();
        if let Some(def) = &self.config {
            config.set_position_mismatch(def.position_mismatch);
        }
        config
    }

    /// Builds and resolves the schema with its own config.
    pub fn resolve(&self, registry: &Registry) -> Result<LayoutPlan, ResolveError> {
        self.into_schema(registry)?.resolve_with(&self.resolve_config())
    }
}
