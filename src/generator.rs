//! Orchestration: discover, resolve, check, order, derive, write.
//!
//! Every document is derived before the first one is written, so a failing
//! record leaves the output directory untouched.
use std::path::PathBuf;

use crate::config::GeneratorConfig;
use crate::derive::Engine;
use crate::error::{Error, Result};
use crate::resolve::{resolve, Resolution};
use crate::schema::SchemaDocument;
use crate::source::RecordSource;
use crate::writer::Writer;

pub struct Generator<'s> {
    source: &'s dyn RecordSource,
    config: GeneratorConfig,
    /// Human description of the inputs, for the "nothing found" error.
    origin: String,
}

impl<'s> Generator<'s> {
    pub fn new(source: &'s dyn RecordSource, config: GeneratorConfig) -> Self {
        Self { source, config, origin: String::from("<source>") }
    }

    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    /// Resolve the record set and check it for cycles.
    pub fn resolve(&self) -> Result<Resolution> {
        let marked = self.source.discover()?;
        if marked.is_empty() {
            return Err(Error::NoRecords(self.origin.clone()));
        }
        let resolution = resolve(self.source, marked)?;
        if let Some(cycle) = resolution.graph.detect_cycle() {
            return Err(Error::CircularDependency(cycle));
        }
        tracing::debug!(
            marked = resolution.marked.len(),
            resolved = resolution.records.len(),
            unresolved = resolution.unresolved.len(),
            "record set resolved"
        );
        Ok(resolution)
    }

    /// Every emitted document, dependencies first.
    pub fn build(&self) -> Result<Vec<(String, SchemaDocument)>> {
        let resolution = self.resolve()?;
        let names: Vec<&str> = resolution.records.keys().map(String::as_str).collect();
        let order = resolution.graph.topo_sort(&names)?;
        let emit = resolution.emittable();
        tracing::debug!(order = ?order, emitted = emit.len(), "dependency order");

        let engine = Engine::new(&resolution.records, self.config.schema_id.as_deref());
        let mut out = Vec::new();
        for name in order.into_iter().filter(|n| emit.contains(n)) {
            let record = &resolution.records[&name];
            let doc = engine.derive(record).map_err(|e| Error::build(&name, e))?;
            out.push((name, doc));
        }
        Ok(out)
    }

    /// Build everything, then write it. Returns the written paths in order.
    pub fn run(&self, writer: &Writer) -> Result<Vec<PathBuf>> {
        let docs = self.build()?;
        let mut written = Vec::with_capacity(docs.len());
        for (name, doc) in &docs {
            let path = writer.write(name, doc)?;
            tracing::info!(record = %name, path = %path.display(), "schema written");
            written.push(path);
        }
        tracing::debug!(count = written.len(), dir = %writer.output_dir().display(), "generation finished");
        Ok(written)
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NameTag;
    use crate::model::{FieldDescriptor as F, RecordDescriptor, TypeDescriptor as T};
    use crate::source::{ManifestSource, MemorySource};
    use serde_json::{json, Value};

    const MODELS: &str = include_str!("../testdata/models.model.json");

    fn models() -> ManifestSource {
        ManifestSource::from_json(MODELS, NameTag::Json).unwrap()
    }

    fn build(source: &dyn RecordSource) -> Vec<(String, Value)> {
        Generator::new(source, GeneratorConfig::default())
            .build()
            .unwrap()
            .into_iter()
            .map(|(name, doc)| (name, serde_json::to_value(&doc).unwrap()))
            .collect()
    }

    fn names(docs: &[(String, Value)]) -> Vec<&str> {
        docs.iter().map(|(n, _)| n.as_str()).collect()
    }

    #[test]
    fn emits_marked_records_dependencies_first() {
        let docs = build(&models());
        assert_eq!(names(&docs), ["Address", "User", "Order"]);
    }

    #[test]
    fn user_document_matches_rules() {
        let docs = build(&models());
        let user = &docs[1].1;

        assert_eq!(user["description"], "User represents a system user");
        assert_eq!(user["properties"]["id"], json!({ "type": "string", "format": "uuid", "description": "Unique identifier" }));
        assert_eq!(user["properties"]["age"], json!({ "type": "integer", "minimum": 0, "maximum": 150, "description": "Age in years" }));
        assert_eq!(user["properties"]["name"]["minLength"], 1);
        assert_eq!(user["properties"]["name"]["maxLength"], 100);
        assert_eq!(user.pointer("/properties/address/$ref"), Some(&json!("address.schema.json")));
        assert_eq!(user["properties"]["roles"]["items"], json!({ "type": "string", "enum": ["admin", "user", "guest"] }));
        assert_eq!(user["properties"]["created_at"]["format"], "date-time");
        assert_eq!(user["properties"]["metadata"]["additionalProperties"], json!({ "type": "string" }));
        assert_eq!(user["properties"]["status"]["enum"], json!(["active", "inactive"]));
        // status is omitempty; metadata and created_at carry no `required`
        assert_eq!(user["required"], json!(["id", "email", "name"]));
    }

    #[test]
    fn inline_record_expands_transitively() {
        let docs = build(&models());
        let order = &docs[2].1;

        let buyer = &order["properties"]["buyer"];
        assert_eq!(buyer["type"], "object");
        assert_eq!(buyer.pointer("/properties/address/properties/zip_code/pattern"), Some(&json!("^[0-9]+$")));
        assert!(buyer.pointer("/properties/address/$ref").is_none());

        let items = &order["properties"]["items"];
        assert_eq!(items["minItems"], 1);
        assert_eq!(items.pointer("/items/properties/price/exclusiveMinimum"), Some(&json!(0)));
        assert_eq!(order["required"], json!(["buyer", "items"]));
    }

    #[test]
    fn records_only_inlined_get_no_document() {
        let docs = build(&models());
        assert!(!names(&docs).contains(&"Product"));
    }

    #[test]
    fn unmarked_linked_record_is_emitted() {
        let source = MemorySource::new()
            .marked(RecordDescriptor::new("User").field(F::new("Home", T::record("Address"))))
            .unmarked(RecordDescriptor::new("Address").field(F::new("Street", T::primitive("string").unwrap())));
        assert_eq!(names(&build(&source)), ["Address", "User"]);
    }

    #[test]
    fn cycle_hidden_by_inlining_still_fails() {
        let a = RecordDescriptor::new("A").inline(true).field(F::new("B", T::record("B")));
        let b = RecordDescriptor::new("B").field(F::new("A", T::pointer_to(T::record("A"))));
        let source = MemorySource::new().marked(a).marked(b);

        let dir = tempfile::tempdir().unwrap();
        let writer = Writer::new(dir.path().join("out"));
        let err = Generator::new(&source, GeneratorConfig::default()).run(&writer).unwrap_err();

        assert_eq!(err.to_string(), "circular dependency detected: A -> B -> A");
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn nothing_marked_is_an_error() {
        let source = MemorySource::new().unmarked(RecordDescriptor::new("Lonely"));
        let err = Generator::new(&source, GeneratorConfig::default()).origin("./models").build().unwrap_err();
        assert!(matches!(err, Error::NoRecords(ref o) if o == "./models"));
    }

    #[test]
    fn schema_id_lands_in_every_document() {
        let config = GeneratorConfig { schema_id: Some("https://example.com/schemas/".into()), ..Default::default() };
        let source = models();
        let docs = Generator::new(&source, config).build().unwrap();
        let ids: Vec<_> = docs.iter().map(|(_, d)| d.id.clone().unwrap()).collect();
        assert_eq!(ids, [
            "https://example.com/schemas/address.schema.json",
            "https://example.com/schemas/user.schema.json",
            "https://example.com/schemas/order.schema.json",
        ]);
    }

    #[test]
    fn run_writes_files_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let writer = Writer::new(dir.path());
        let source = models();
        let written = Generator::new(&source, GeneratorConfig::default()).run(&writer).unwrap();

        let files: Vec<_> = written.iter().map(|p| p.file_name().unwrap().to_string_lossy().into_owned()).collect();
        assert_eq!(files, ["address.schema.json", "user.schema.json", "order.schema.json"]);
        let text = std::fs::read_to_string(dir.path().join("user.schema.json")).unwrap();
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn output_is_byte_identical_across_runs() {
        let source = models();
        let render = || {
            Generator::new(&source, GeneratorConfig::default())
                .build()
                .unwrap()
                .iter()
                .map(|(_, d)| d.to_json_pretty().unwrap())
                .collect::<Vec<_>>()
        };
        assert_eq!(render(), render());
    }
}
