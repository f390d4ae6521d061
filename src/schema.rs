//! JSON Schema document shapes emitted by the derivation engine.
//!
//! Field order of the structs below is the key order of the serialized
//! output; `properties` keeps field declaration order through `IndexMap`.
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Number, Value};

/// Draft identifier carried by every top-level document.
pub const JSON_SCHEMA_DRAFT: &str = "https://json-schema.org/draft/2020-12/schema";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
    Null,
}

impl JsonType {
    pub fn from_name(name: &str) -> Option<Self> {
        let ty = match name.trim() {
            "string" => Self::String,
            "integer" => Self::Integer,
            "number" => Self::Number,
            "boolean" => Self::Boolean,
            "array" => Self::Array,
            "object" => Self::Object,
            "null" => Self::Null,
            _ => return None,
        };
        Some(ty)
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Number)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertySchema {
    #[serde(rename = "$ref", skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub ty: Option<JsonType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enumeration: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclusive_minimum: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclusive_maximum: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_items: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_encoding: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<PropertySchema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<IndexMap<String, PropertySchema>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<Box<PropertySchema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PropertySchema {
    pub fn typed(ty: JsonType) -> Self {
        Self { ty: Some(ty), ..Self::default() }
    }

    pub fn formatted(ty: JsonType, format: &str) -> Self {
        Self { ty: Some(ty), format: Some(format.to_string()), ..Self::default() }
    }

    pub fn linked(path: String) -> Self {
        Self { link: Some(path), ..Self::default() }
    }

    /// Opaque object: no properties, no link.
    pub fn object() -> Self {
        Self::typed(JsonType::Object)
    }

    pub fn is_link(&self) -> bool {
        self.link.is_some()
    }
}

/// Properties and required names of one object, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectBody {
    pub properties: IndexMap<String, PropertySchema>,
    pub required: Vec<String>,
}

impl ObjectBody {
    pub fn require(&mut self, name: &str) {
        if !self.required.iter().any(|r| r == name) {
            self.required.push(name.to_string());
        }
    }

    pub fn into_schema(self, description: Option<String>) -> PropertySchema {
        PropertySchema {
            ty: Some(JsonType::Object),
            properties: Some(self.properties),
            required: self.required,
            description,
            ..PropertySchema::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaDocument {
    #[serde(rename = "$schema")]
    pub version: &'static str,
    #[serde(rename = "$id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub ty: JsonType,
    pub properties: IndexMap<String, PropertySchema>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

impl SchemaDocument {
    pub fn new(title: &str, body: ObjectBody) -> Self {
        Self {
            version: JSON_SCHEMA_DRAFT,
            id: None,
            title: title.to_string(),
            description: None,
            ty: JsonType::Object,
            properties: body.properties,
            required: body.required,
        }
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
