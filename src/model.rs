//! Type model handed to the schema engine. Already extracted from source text;
//! nothing here knows about files or manifests.
use std::collections::BTreeMap;
use indexmap::IndexMap;

/// Annotation key carrying the validation rule string.
pub const VALIDATE_KEY: &str = "validate";
/// Annotation key carrying the explicit schema-type override (`type=...`).
pub const SCHEMA_KEY: &str = "schema";

/// Resolved record set, keyed by record name, in resolution order.
pub type RecordMap = IndexMap<String, RecordDescriptor>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveKind {
    String,
    Integer,
    Number,
    Boolean,
}

impl PrimitiveKind {
    /// Normalized name-to-kind map over Go's predeclared names plus the four
    /// JSON type names. Every signed/unsigned width, `byte` and `rune`
    /// collapse to `Integer`.
    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name {
            "string" => Self::String,
            "int" | "int8" | "int16" | "int32" | "int64"
            | "uint" | "uint8" | "uint16" | "uint32" | "uint64"
            | "uintptr" | "byte" | "rune"
            | "integer" => Self::Integer,
            "float32" | "float64" | "number" => Self::Number,
            "bool" | "boolean" => Self::Boolean,
            _ => return None,
        };
        Some(kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Primitive {
    /// Declared name, e.g. `uint16`.
    pub name: String,
    pub kind: PrimitiveKind,
}

impl Primitive {
    pub fn parse(name: &str) -> Option<Self> {
        PrimitiveKind::from_name(name).map(|kind| Self { name: name.to_string(), kind })
    }
}

/// Reference to a named composite type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructRef {
    pub name: String,
    /// `Some` for a foreign (other package/module) type.
    pub package: Option<String>,
    pub exported: bool,
}

impl StructRef {
    pub fn local(name: impl Into<String>) -> Self {
        Self { name: name.into(), package: None, exported: true }
    }

    /// A local, exported record: the only kind that is ever linked or inlined.
    pub fn is_local(&self) -> bool {
        self.package.is_none() && self.exported
    }
}

/// A named type declared over a primitive, e.g. a `Status` string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alias {
    pub name: String,
    pub underlying: Primitive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDescriptor {
    Primitive(Primitive),
    Struct(StructRef),
    Slice(Box<TypeDescriptor>),
    Array(Box<TypeDescriptor>),
    Map { key: Box<TypeDescriptor>, value: Box<TypeDescriptor> },
    Pointer(Box<TypeDescriptor>),
    Interface,
    Time,
    Duration,
    Alias(Alias),
}

impl TypeDescriptor {
    pub fn primitive(name: &str) -> Option<Self> {
        Primitive::parse(name).map(Self::Primitive)
    }

    pub fn record(name: impl Into<String>) -> Self {
        Self::Struct(StructRef::local(name))
    }

    pub fn slice_of(elem: Self) -> Self {
        Self::Slice(Box::new(elem))
    }

    pub fn pointer_to(elem: Self) -> Self {
        Self::Pointer(Box::new(elem))
    }

    pub fn map_of(key: Self, value: Self) -> Self {
        Self::Map { key: Box::new(key), value: Box::new(value) }
    }

    /// Strips every pointer layer.
    pub fn underlying(&self) -> &TypeDescriptor {
        let mut ty = self;
        while let TypeDescriptor::Pointer(elem) = ty {
            ty = elem;
        }
        ty
    }

    /// Name used for an embedded field that carries no explicit property name.
    pub fn display_name(&self) -> String {
        match self.underlying() {
            TypeDescriptor::Primitive(p) => p.name.clone(),
            TypeDescriptor::Struct(s) => s.name.clone(),
            TypeDescriptor::Alias(a) => a.name.clone(),
            TypeDescriptor::Time => "Time".into(),
            TypeDescriptor::Duration => "Duration".into(),
            TypeDescriptor::Interface => "any".into(),
            TypeDescriptor::Slice(_) | TypeDescriptor::Array(_) => "items".into(),
            TypeDescriptor::Map { .. } => "entries".into(),
            TypeDescriptor::Pointer(_) => unreachable!("underlying() strips pointers"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    /// Declaration identifier.
    pub name: String,
    /// Serialized name.
    pub property: String,
    pub ty: TypeDescriptor,
    pub annotations: BTreeMap<String, String>,
    pub doc: String,
    /// Contributes its record's properties to the enclosing object.
    pub embedded: bool,
    pub omit_empty: bool,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, ty: TypeDescriptor) -> Self {
        let name = name.into();
        Self {
            property: name.clone(),
            name,
            ty,
            annotations: BTreeMap::new(),
            doc: String::new(),
            embedded: false,
            omit_empty: false,
        }
    }

    pub fn property(mut self, property: impl Into<String>) -> Self {
        self.property = property.into();
        self
    }

    pub fn annotate(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    #[cfg(test)]
    pub fn validate(self, rules: &str) -> Self {
        self.annotate(VALIDATE_KEY, rules)
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = doc.into();
        self
    }

    pub fn omit_empty(mut self) -> Self {
        self.omit_empty = true;
        self
    }

    pub fn embedded(mut self) -> Self {
        self.embedded = true;
        self
    }

    pub fn validation(&self) -> Option<&str> {
        self.annotations.get(VALIDATE_KEY).map(String::as_str)
    }

    /// The `type=` entry of the schema annotation, if any.
    pub fn type_override(&self) -> Option<&str> {
        let raw = self.annotations.get(SCHEMA_KEY)?;
        raw.split(',')
            .map(str::trim)
            .find_map(|part| part.strip_prefix("type="))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordDescriptor {
    pub name: String,
    /// Declaration order; preserved through to output.
    pub fields: Vec<FieldDescriptor>,
    pub doc: String,
    /// Expand references to other records in place instead of linking.
    pub inline: bool,
}

impl RecordDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), fields: Vec::new(), doc: String::new(), inline: false }
    }

    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = doc.into();
        self
    }

    pub fn inline(mut self, inline: bool) -> Self {
        self.inline = inline;
        self
    }
}

/// Alias declarations of one compilation unit. Built completely before any
/// field type is resolved against it.
#[derive(Debug, Clone, Default)]
pub struct AliasRegistry {
    aliases: IndexMap<String, Alias>,
}

impl AliasRegistry {
    pub fn insert(&mut self, alias: Alias) {
        self.aliases.insert(alias.name.clone(), alias);
    }

    pub fn get(&self, name: &str) -> Option<&Alias> {
        self.aliases.get(name)
    }
}
