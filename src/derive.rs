//! Schema derivation engine.
//!
//! Turns one [`RecordDescriptor`] into a [`SchemaDocument`]. Every field is
//! classified by its type descriptor, constrained by its validation rules,
//! and documented; references to other local records become either `$ref`
//! links (registered with the [`RefTracker`]) or inline object schemas.
//!
//! Three modes:
//! - `Inline`: references are expanded in place. Fixed for the whole tree
//!   below one top-level record.
//! - `Reference`: references to resolved records are links; names missing
//!   from the resolved set degrade to opaque objects.
//! - `Discover`: forced reference mode used to enumerate a record's outgoing
//!   references. Every local name is linked and registered, resolved or not.
use crate::error::{Error, Result};
use crate::model::{FieldDescriptor, PrimitiveKind, RecordDescriptor, RecordMap, StructRef, TypeDescriptor};
use crate::refs::{schema_file_name, RefTracker};
use crate::rules;
use crate::schema::{JsonType, ObjectBody, PropertySchema, SchemaDocument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Inline,
    Reference,
    Discover,
}

impl Mode {
    fn of(record: &RecordDescriptor) -> Self {
        if record.inline { Mode::Inline } else { Mode::Reference }
    }
}

/// State threaded through one top-level derivation.
struct Scope<'s> {
    mode: Mode,
    tracker: &'s mut RefTracker,
    /// Records whose expansion is in progress on the current branch.
    visiting: &'s mut Vec<String>,
}

impl Scope<'_> {
    /// Run `f` with `name` marked in progress. Re-entering a name that is
    /// still in progress is a self-reference.
    fn enter<T>(&mut self, name: &str, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.visiting.iter().any(|v| v == name) {
            return Err(Error::SelfReference(name.to_string()));
        }
        self.visiting.push(name.to_string());
        let out = f(self)?;
        self.visiting.pop();
        Ok(out)
    }
}

pub struct Engine<'r> {
    records: &'r RecordMap,
    schema_id: Option<&'r str>,
}

impl<'r> Engine<'r> {
    pub fn new(records: &'r RecordMap, schema_id: Option<&'r str>) -> Self {
        let schema_id = schema_id.map(|id| id.trim_end_matches('/')).filter(|id| !id.is_empty());
        Self { records, schema_id }
    }

    /// Derive the document for `record` in the mode its own inline
    /// preference selects.
    pub fn derive(&self, record: &RecordDescriptor) -> Result<SchemaDocument> {
        let mut tracker = RefTracker::new();
        self.derive_in(record, Mode::of(record), &mut tracker)
    }

    /// Outgoing references of `record`, collected in forced reference mode
    /// whatever its inline preference.
    pub fn references(&self, record: &RecordDescriptor) -> Result<Vec<String>> {
        let mut tracker = RefTracker::new();
        self.derive_in(record, Mode::Discover, &mut tracker)?;
        Ok(tracker.into_refs())
    }

    fn derive_in(&self, record: &RecordDescriptor, mode: Mode, tracker: &mut RefTracker) -> Result<SchemaDocument> {
        let mut visiting = vec![record.name.clone()];
        let mut scope = Scope { mode, tracker, visiting: &mut visiting };
        let body = self.build_body(record, &mut scope)?;

        let mut doc = SchemaDocument::new(&record.name, body);
        doc.id = self.schema_id.map(|base| format!("{base}/{}", schema_file_name(&record.name)));
        doc.description = non_empty(&record.doc);
        Ok(doc)
    }

    // ------------------------------- Objects ------------------------------ //

    fn build_body(&self, record: &RecordDescriptor, scope: &mut Scope<'_>) -> Result<ObjectBody> {
        let mut body = ObjectBody::default();
        for field in &record.fields {
            if field.embedded {
                if let Some(embedded) = self.embedded_record(field, scope) {
                    let inner = scope.enter(&embedded.name, |scope| self.build_body(embedded, scope))?;
                    merge_embedded(&mut body, inner);
                    continue;
                }
                if scope.mode == Mode::Discover && is_local_struct(&field.ty) {
                    // Unresolved for now; the flattened properties show up once it is.
                    continue;
                }
            }

            let (schema, required) = self.field_schema(field, scope)?;
            // A direct field shadows a flattened one, requiredness included.
            if body.properties.insert(field.property.clone(), schema).is_some() {
                body.required.retain(|r| *r != field.property);
            }
            if required && !field.omit_empty {
                body.require(&field.property);
            }
        }
        Ok(body)
    }

    /// The resolved record an embedded field flattens, registering the
    /// dependency on the way. `None` when the field cannot be flattened.
    fn embedded_record(&self, field: &FieldDescriptor, scope: &mut Scope<'_>) -> Option<&'r RecordDescriptor> {
        let TypeDescriptor::Struct(target) = field.ty.underlying() else {
            return None;
        };
        if !target.is_local() {
            return None;
        }
        if scope.mode != Mode::Inline {
            scope.tracker.add_ref(&target.name);
        }
        self.records.get(&target.name)
    }

    fn field_schema(&self, field: &FieldDescriptor, scope: &mut Scope<'_>) -> Result<(PropertySchema, bool)> {
        let mut schema = match field.type_override().and_then(JsonType::from_name) {
            Some(ty) => PropertySchema::typed(ty),
            None => {
                if let Some(raw) = field.type_override() {
                    tracing::debug!(field = %field.name, value = raw, "ignoring unknown schema type override");
                }
                self.type_schema(&field.ty, scope)?
            }
        };

        let required = field.validation().is_some_and(|raw| rules::apply(&mut schema, raw));

        if let Some(doc) = non_empty(&field.doc) {
            schema.description = Some(doc);
        }
        Ok((schema, required))
    }

    // -------------------------------- Types ------------------------------- //

    fn type_schema(&self, ty: &TypeDescriptor, scope: &mut Scope<'_>) -> Result<PropertySchema> {
        let schema = match ty.underlying() {
            TypeDescriptor::Primitive(p) => PropertySchema::typed(json_type(p.kind)),
            TypeDescriptor::Alias(a) => PropertySchema::typed(json_type(a.underlying.kind)),
            TypeDescriptor::Time => PropertySchema::formatted(JsonType::String, "date-time"),
            TypeDescriptor::Duration => PropertySchema::formatted(JsonType::String, "duration"),
            TypeDescriptor::Slice(elem) | TypeDescriptor::Array(elem) => PropertySchema {
                items: Some(Box::new(self.type_schema(elem, scope)?)),
                ..PropertySchema::typed(JsonType::Array)
            },
            TypeDescriptor::Map { value, .. } => PropertySchema {
                additional_properties: Some(Box::new(self.type_schema(value, scope)?)),
                ..PropertySchema::typed(JsonType::Object)
            },
            TypeDescriptor::Struct(target) => self.struct_schema(target, scope)?,
            TypeDescriptor::Interface => PropertySchema::default(),
            TypeDescriptor::Pointer(elem) => self.type_schema(elem, scope)?,
        };
        Ok(schema)
    }

    fn struct_schema(&self, target: &StructRef, scope: &mut Scope<'_>) -> Result<PropertySchema> {
        if !target.is_local() {
            return Ok(PropertySchema::object());
        }
        match scope.mode {
            Mode::Inline => match self.records.get(&target.name) {
                Some(child) => self.inline_record(child, scope),
                None => Ok(PropertySchema::object()),
            },
            Mode::Reference if !self.records.contains_key(&target.name) => Ok(PropertySchema::object()),
            Mode::Reference | Mode::Discover => {
                scope.tracker.add_ref(&target.name);
                Ok(PropertySchema::linked(scope.tracker.ref_path(&target.name)))
            }
        }
    }

    /// Bare object schema for `child`, expanded in place.
    fn inline_record(&self, child: &RecordDescriptor, scope: &mut Scope<'_>) -> Result<PropertySchema> {
        let body = scope.enter(&child.name, |scope| self.build_body(child, scope))?;
        Ok(body.into_schema(non_empty(&child.doc)))
    }
}

fn json_type(kind: PrimitiveKind) -> JsonType {
    match kind {
        PrimitiveKind::String => JsonType::String,
        PrimitiveKind::Integer => JsonType::Integer,
        PrimitiveKind::Number => JsonType::Number,
        PrimitiveKind::Boolean => JsonType::Boolean,
    }
}

fn is_local_struct(ty: &TypeDescriptor) -> bool {
    matches!(ty.underlying(), TypeDescriptor::Struct(s) if s.is_local())
}

/// Flattened properties never displace keys the embedding object already has.
fn merge_embedded(body: &mut ObjectBody, inner: ObjectBody) {
    for (name, schema) in inner.properties {
        if body.properties.contains_key(&name) {
            continue;
        }
        body.properties.insert(name.clone(), schema);
        if inner.required.contains(&name) {
            body.require(&name);
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

// ------------------------------- Tests ------------------------------------ //
