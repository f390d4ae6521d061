//! Type-model manifests: JSON files describing already-extracted records.
//!
//! ```json
//! { "package": "models",
//!   "aliases": [ { "name": "Status", "underlying": "string" } ],
//!   "records": [ { "name": "User", "emit": true, "inline": false, "doc": "...",
//!                  "fields": [ { "name": "Home", "type": { "kind": "pointer", "elem": "Address" },
//!                                "tags": { "json": "home,omitempty", "validate": "required" } } ] } ] }
//! ```
//!
//! Loading happens in two passes: every alias of every manifest is
//! registered first (one registry per package), then field types are
//! resolved against the finished registries.
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use indexmap::{IndexMap, IndexSet};
use serde::Deserialize;

use crate::config::{GeneratorConfig, NameTag};
use crate::error::{Error, Result};
use crate::model::{
    Alias, AliasRegistry, FieldDescriptor, Primitive, RecordDescriptor, StructRef, TypeDescriptor,
};
use super::RecordSource;

/// Suffix picked up when scanning directories.
pub const MANIFEST_SUFFIX: &str = ".model.json";

/// Directories never descended into below a scan root.
const SKIP_DIRS: &[&str] = &["vendor", "node_modules", "testdata", ".git", ".svn", ".hg"];

// ————————————————————————————————————————————————————————————————————————————
// WIRE FORMAT
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default)]
    package: String,
    #[serde(default)]
    aliases: Vec<AliasDecl>,
    #[serde(default)]
    records: Vec<RecordDecl>,
}

#[derive(Debug, Deserialize)]
struct AliasDecl {
    name: String,
    underlying: String,
}

#[derive(Debug, Deserialize)]
struct RecordDecl {
    name: String,
    #[serde(default)]
    doc: String,
    /// Explicitly marked for emission.
    #[serde(default)]
    emit: bool,
    #[serde(default)]
    inline: bool,
    #[serde(default)]
    fields: Vec<FieldDecl>,
}

#[derive(Debug, Deserialize)]
struct FieldDecl {
    /// Absent for embedded fields; they take the type's name.
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "type")]
    ty: TypeExpr,
    #[serde(default)]
    tags: BTreeMap<String, String>,
    #[serde(default)]
    doc: String,
    #[serde(default)]
    embedded: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TypeExpr {
    /// Primitive, `any`, alias, local record, or `pkg.Name`.
    Named(String),
    Composite(Composite),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Composite {
    Slice { elem: Box<TypeExpr> },
    Array { elem: Box<TypeExpr> },
    Map { key: Box<TypeExpr>, value: Box<TypeExpr> },
    Pointer { elem: Box<TypeExpr> },
    Interface,
    Time,
    Duration,
    Struct {
        name: String,
        #[serde(default)]
        package: Option<String>,
        #[serde(default = "exported_by_default")]
        exported: bool,
    },
}

fn exported_by_default() -> bool { true }

fn parse_manifest(path: &Path, src: &str) -> Result<Manifest> {
    let de = &mut serde_json::Deserializer::from_str(src);
    serde_path_to_error::deserialize(de).map_err(|err| {
        let at = err.path().to_string();
        Error::Manifest { path: path.to_path_buf(), message: format!("at JSON path {at}: {}", err.into_inner()) }
    })
}

// ————————————————————————————————————————————————————————————————————————————
// SOURCE
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Default)]
pub struct ManifestSource {
    marked: Vec<RecordDescriptor>,
    /// Every record of every manifest; the first declaration of a name wins.
    all: IndexMap<String, RecordDescriptor>,
}

impl ManifestSource {
    /// Load every manifest reachable from `inputs` (files, directories or
    /// quoted glob patterns).
    pub fn open<S: AsRef<str>>(inputs: &[S], config: &GeneratorConfig) -> Result<Self> {
        let mut manifests = Vec::new();
        for path in collect_manifest_paths(inputs, config.recursive)? {
            let src = std::fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
            let manifest = parse_manifest(&path, &src)?;
            tracing::debug!(path = %path.display(), records = manifest.records.len(), "loaded manifest");
            manifests.push(manifest);
        }
        Self::from_manifests(manifests, config.name_tag)
    }

    #[cfg(test)]
    pub fn from_json(src: &str, name_tag: NameTag) -> Result<Self> {
        let manifest = parse_manifest(Path::new("<inline>"), src)?;
        Self::from_manifests(vec![manifest], name_tag)
    }

    fn from_manifests(manifests: Vec<Manifest>, name_tag: NameTag) -> Result<Self> {
        let registries = build_alias_registries(&manifests)?;
        let empty = AliasRegistry::default();

        let mut source = ManifestSource::default();
        for manifest in &manifests {
            let aliases = registries.get(&manifest.package).unwrap_or(&empty);
            for decl in &manifest.records {
                let record = resolve_record(decl, aliases, name_tag);
                if decl.emit {
                    source.marked.push(record.clone());
                }
                source.all.entry(record.name.clone()).or_insert(record);
            }
        }
        Ok(source)
    }
}

impl RecordSource for ManifestSource {
    fn discover(&self) -> Result<Vec<RecordDescriptor>> {
        Ok(self.marked.clone())
    }

    fn find_record(&self, name: &str) -> Option<RecordDescriptor> {
        self.all.get(name).cloned()
    }
}

// ————————————————————————————————————————————————————————————————————————————
// RESOLUTION
// ————————————————————————————————————————————————————————————————————————————

/// Pass 1: one alias registry per package, complete before any field is
/// resolved. An alias over another alias is rejected; an alias over a
/// non-primitive is left out so its name resolves as a record.
fn build_alias_registries(manifests: &[Manifest]) -> Result<HashMap<String, AliasRegistry>> {
    let mut declared: HashMap<&str, HashSet<&str>> = HashMap::new();
    for m in manifests {
        declared.entry(m.package.as_str()).or_default().extend(m.aliases.iter().map(|a| a.name.as_str()));
    }

    let mut registries: HashMap<String, AliasRegistry> = HashMap::new();
    for m in manifests {
        for decl in &m.aliases {
            let target = decl.underlying.trim();
            if declared[m.package.as_str()].contains(target) {
                return Err(Error::AliasChain { alias: decl.name.clone(), target: target.to_string() });
            }
            let Some(underlying) = Primitive::parse(target) else {
                tracing::warn!(alias = %decl.name, underlying = target, "alias over a non-primitive type; treating it as a record");
                continue;
            };
            registries
                .entry(m.package.clone())
                .or_default()
                .insert(Alias { name: decl.name.clone(), underlying });
        }
    }
    Ok(registries)
}

fn resolve_record(decl: &RecordDecl, aliases: &AliasRegistry, name_tag: NameTag) -> RecordDescriptor {
    let mut record = RecordDescriptor::new(decl.name.clone()).doc(decl.doc.trim()).inline(decl.inline);
    for field in &decl.fields {
        if let Some(field) = resolve_field(field, aliases, name_tag) {
            record = record.field(field);
        }
    }
    record
}

/// `None` when the name tag suppresses the field with `-`.
fn resolve_field(decl: &FieldDecl, aliases: &AliasRegistry, name_tag: NameTag) -> Option<FieldDescriptor> {
    let ty = resolve_type(&decl.ty, aliases);
    let name = decl.name.clone().unwrap_or_else(|| ty.display_name());
    let naming = PropertyName::parse(decl.tags.get(name_tag.key()).map(String::as_str));
    if naming.skip {
        return None;
    }

    let mut field = decl
        .tags
        .iter()
        .fold(FieldDescriptor::new(name, ty).doc(decl.doc.trim()), |f, (k, v)| f.annotate(k.as_str(), v.as_str()));
    if let Some(explicit) = naming.name {
        field = field.property(explicit);
    }
    if naming.omit_empty {
        field = field.omit_empty();
    }
    // An explicit name turns an embedded field back into a nested property.
    if decl.embedded && naming.name.is_none() {
        field = field.embedded();
    }
    Some(field)
}

/// Name-tag value split into its parts: `name[,opt...]`.
#[derive(Debug, Default, PartialEq, Eq)]
struct PropertyName<'a> {
    name: Option<&'a str>,
    omit_empty: bool,
    skip: bool,
}

impl<'a> PropertyName<'a> {
    fn parse(tag: Option<&'a str>) -> Self {
        let Some(tag) = tag else { return Self::default() };
        let mut parts = tag.split(',');
        let name = parts.next().unwrap_or("").trim();
        if name == "-" {
            return Self { skip: true, ..Self::default() };
        }
        Self {
            name: (!name.is_empty()).then_some(name),
            omit_empty: parts.any(|p| p.trim() == "omitempty"),
            skip: false,
        }
    }
}

fn resolve_type(expr: &TypeExpr, aliases: &AliasRegistry) -> TypeDescriptor {
    match expr {
        TypeExpr::Named(name) => resolve_name(name.trim(), aliases),
        TypeExpr::Composite(c) => match c {
            Composite::Slice { elem } => TypeDescriptor::slice_of(resolve_type(elem, aliases)),
            Composite::Array { elem } => TypeDescriptor::Array(Box::new(resolve_type(elem, aliases))),
            Composite::Map { key, value } => {
                TypeDescriptor::map_of(resolve_type(key, aliases), resolve_type(value, aliases))
            }
            Composite::Pointer { elem } => TypeDescriptor::pointer_to(resolve_type(elem, aliases)),
            Composite::Interface => TypeDescriptor::Interface,
            Composite::Time => TypeDescriptor::Time,
            Composite::Duration => TypeDescriptor::Duration,
            Composite::Struct { name, package, exported } => TypeDescriptor::Struct(StructRef {
                name: match package {
                    Some(pkg) if !name.contains('.') => format!("{pkg}.{name}"),
                    _ => name.clone(),
                },
                package: package.clone(),
                exported: *exported,
            }),
        },
    }
}

fn resolve_name(name: &str, aliases: &AliasRegistry) -> TypeDescriptor {
    match name {
        "any" | "interface{}" => return TypeDescriptor::Interface,
        "time.Time" => return TypeDescriptor::Time,
        "time.Duration" => return TypeDescriptor::Duration,
        _ => {}
    }
    if let Some(prim) = TypeDescriptor::primitive(name) {
        return prim;
    }
    if let Some(alias) = aliases.get(name) {
        return TypeDescriptor::Alias(alias.clone());
    }
    match name.split_once('.') {
        Some((pkg, _)) => TypeDescriptor::Struct(StructRef {
            name: name.to_string(),
            package: Some(pkg.to_string()),
            exported: true,
        }),
        None => TypeDescriptor::record(name),
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INPUT DISCOVERY
// ————————————————————————————————————————————————————————————————————————————

fn has_glob_chars(s: &str) -> bool {
    s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
}

/// Expand inputs into manifest paths, de-duplicated, in input order.
pub fn collect_manifest_paths<S: AsRef<str>>(inputs: &[S], recursive: bool) -> Result<Vec<PathBuf>> {
    let mut out = IndexSet::<PathBuf>::new();
    for raw in inputs {
        let input = raw.as_ref();
        let path = Path::new(input);
        if has_glob_chars(input) {
            let before = out.len();
            for entry in glob::glob(input)? {
                let entry = entry.map_err(|e| {
                    let path = e.path().to_path_buf();
                    Error::io(path, e.into_error())
                })?;
                if entry.is_file() {
                    out.insert(entry);
                }
            }
            if out.len() == before {
                return Err(Error::NoMatch(input.to_string()));
            }
        } else if path.is_dir() {
            out.extend(scan_dir(path, recursive)?);
        } else {
            out.insert(path.to_path_buf());
        }
    }
    Ok(out.into_iter().collect())
}

fn scan_dir(root: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    let escaped = glob::Pattern::escape(&root.to_string_lossy());
    let pattern = if recursive {
        format!("{escaped}/**/*{MANIFEST_SUFFIX}")
    } else {
        format!("{escaped}/*{MANIFEST_SUFFIX}")
    };

    let mut out = Vec::new();
    for entry in glob::glob(&pattern)? {
        let path = match entry {
            Ok(path) => path,
            Err(error) => {
                tracing::warn!(path = %error.path().display(), %error, "skipping unreadable path during manifest scan");
                continue;
            }
        };
        let skipped = path
            .strip_prefix(root)
            .ok()
            .and_then(Path::parent)
            .is_some_and(|rel| rel.components().any(|c| SKIP_DIRS.iter().any(|s| c.as_os_str() == *s)));
        if skipped {
            tracing::debug!(path = %path.display(), "skipping manifest in excluded directory");
            continue;
        }
        out.push(path);
    }
    Ok(out)
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PrimitiveKind;

    const MODELS: &str = r#"{
        "package": "models",
        "aliases": [
            { "name": "Status", "underlying": "string" },
            { "name": "Money", "underlying": "Decimal" }
        ],
        "records": [
            {
                "name": "User", "emit": true, "doc": " User represents a system user ",
                "fields": [
                    { "name": "ID", "type": "string", "tags": { "json": "id", "validate": "required,uuid" } },
                    { "name": "Status", "type": "Status", "tags": { "json": "status,omitempty", "yaml": "state" } },
                    { "name": "Home", "type": { "kind": "pointer", "elem": "Address" }, "tags": { "json": ",omitempty" } },
                    { "name": "Secret", "type": "string", "tags": { "json": "-" } },
                    { "name": "Seen", "type": "time.Time" },
                    { "name": "Ext", "type": "uuid.UUID" },
                    { "name": "Tags", "type": { "kind": "map", "key": "string", "value": { "kind": "slice", "elem": "any" } } },
                    { "name": "Price", "type": "Money" }
                ]
            },
            {
                "name": "Address", "inline": true,
                "fields": [ { "name": "Street", "type": "string" } ]
            },
            {
                "name": "Audit", "emit": true,
                "fields": [
                    { "type": "Base", "embedded": true },
                    { "type": "Address", "embedded": true, "tags": { "json": "address" } }
                ]
            }
        ]
    }"#;

    fn source() -> ManifestSource {
        ManifestSource::from_json(MODELS, NameTag::Json).unwrap()
    }

    #[test]
    fn discover_returns_only_marked_records() {
        let names: Vec<String> = source().discover().unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, ["User", "Audit"]);
    }

    #[test]
    fn find_record_ignores_marking() {
        let src = source();
        let addr = src.find_record("Address").unwrap();
        assert!(addr.inline);
        assert!(src.find_record("Nope").is_none());
    }

    #[test]
    fn property_names_follow_the_name_tag() {
        let user = source().find_record("User").unwrap();
        let props: Vec<(&str, bool)> = user.fields.iter().map(|f| (f.property.as_str(), f.omit_empty)).collect();
        assert_eq!(props, [
            ("id", false), ("status", true), ("Home", true),
            ("Seen", false), ("Ext", false), ("Tags", false), ("Price", false),
        ]);
        assert_eq!(user.doc, "User represents a system user");
        assert_eq!(user.fields[0].validation(), Some("required,uuid"));

        let yaml = ManifestSource::from_json(MODELS, NameTag::Yaml).unwrap().find_record("User").unwrap();
        assert_eq!(yaml.fields[1].property, "state");
        assert_eq!(yaml.fields[0].property, "ID");
        assert!(yaml.fields.iter().any(|f| f.name == "Secret"));
    }

    #[test]
    fn types_resolve_against_registry() {
        let user = source().find_record("User").unwrap();
        let ty = |name: &str| user.fields.iter().find(|f| f.name == name).unwrap().ty.clone();

        match ty("Status") {
            TypeDescriptor::Alias(a) => assert_eq!(a.underlying.kind, PrimitiveKind::String),
            other => panic!("expected alias, got {other:?}"),
        }
        assert_eq!(ty("Home"), TypeDescriptor::pointer_to(TypeDescriptor::record("Address")));
        assert_eq!(ty("Seen"), TypeDescriptor::Time);
        assert!(matches!(ty("Ext"), TypeDescriptor::Struct(ref s) if s.package.as_deref() == Some("uuid")));
        assert_eq!(
            ty("Tags"),
            TypeDescriptor::map_of(TypeDescriptor::primitive("string").unwrap(), TypeDescriptor::slice_of(TypeDescriptor::Interface))
        );
        // alias over a non-primitive is not registered
        assert_eq!(ty("Price"), TypeDescriptor::record("Money"));
    }

    #[test]
    fn primitive_names_are_go_or_json_type_names() {
        let src = r#"{ "records": [ { "name": "Row", "emit": true, "fields": [
            { "name": "A", "type": "uint16" },
            { "name": "B", "type": "number" },
            { "name": "C", "type": "u16" }
        ] } ] }"#;
        let row = ManifestSource::from_json(src, NameTag::Json).unwrap().find_record("Row").unwrap();
        assert_eq!(row.fields[0].ty, TypeDescriptor::primitive("uint16").unwrap());
        assert!(matches!(row.fields[1].ty, TypeDescriptor::Primitive(ref p) if p.kind == PrimitiveKind::Number));
        assert_eq!(row.fields[2].ty, TypeDescriptor::record("u16"));
    }

    #[test]
    fn embedded_fields_flatten_only_without_explicit_name() {
        let audit = source().find_record("Audit").unwrap();
        assert_eq!(audit.fields[0].name, "Base");
        assert!(audit.fields[0].embedded);
        assert_eq!(audit.fields[1].property, "address");
        assert!(!audit.fields[1].embedded);
    }

    #[test]
    fn alias_chains_are_rejected() {
        let src = r#"{ "aliases": [
            { "name": "Code", "underlying": "string" },
            { "name": "Country", "underlying": "Code" }
        ] }"#;
        let err = ManifestSource::from_json(src, NameTag::Json).unwrap_err();
        assert!(matches!(err, Error::AliasChain { ref alias, ref target } if alias == "Country" && target == "Code"));
    }

    #[test]
    fn aliases_are_scoped_to_their_package() {
        let a = r#"{ "package": "a", "aliases": [ { "name": "Status", "underlying": "int" } ] }"#;
        let b = r#"{ "package": "b", "records": [ { "name": "Job", "emit": true,
                     "fields": [ { "name": "Status", "type": "Status" } ] } ] }"#;
        let manifests = vec![
            parse_manifest(Path::new("a"), a).unwrap(),
            parse_manifest(Path::new("b"), b).unwrap(),
        ];
        let job = ManifestSource::from_manifests(manifests, NameTag::Json).unwrap().find_record("Job").unwrap();
        assert_eq!(job.fields[0].ty, TypeDescriptor::record("Status"));
    }

    #[test]
    fn malformed_manifest_reports_json_path() {
        let src = r#"{ "records": [ { "name": "X", "fields": [ { "name": "A" } ] } ] }"#;
        let err = ManifestSource::from_json(src, NameTag::Json).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("records[0].fields[0]"), "{msg}");
    }

    #[test]
    fn property_name_parsing() {
        assert_eq!(PropertyName::parse(None), PropertyName::default());
        assert_eq!(PropertyName::parse(Some("-")), PropertyName { skip: true, ..Default::default() });
        assert_eq!(PropertyName::parse(Some("-,")), PropertyName { skip: true, ..Default::default() });
        assert_eq!(
            PropertyName::parse(Some("zip_code,omitempty")),
            PropertyName { name: Some("zip_code"), omit_empty: true, skip: false }
        );
        assert_eq!(PropertyName::parse(Some(",omitempty")), PropertyName { name: None, omit_empty: true, skip: false });
    }

    #[test]
    fn directory_scan_honors_suffix_and_skip_list() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("nested")).unwrap();
        std::fs::create_dir_all(root.join("vendor")).unwrap();
        std::fs::write(root.join("a.model.json"), "{}").unwrap();
        std::fs::write(root.join("notes.json"), "{}").unwrap();
        std::fs::write(root.join("nested/b.model.json"), "{}").unwrap();
        std::fs::write(root.join("vendor/c.model.json"), "{}").unwrap();

        let input = [root.to_string_lossy().to_string()];
        let flat = collect_manifest_paths(&input, false).unwrap();
        assert_eq!(flat, [root.join("a.model.json")]);

        let mut deep = collect_manifest_paths(&input, true).unwrap();
        deep.sort();
        assert_eq!(deep, [root.join("a.model.json"), root.join("nested/b.model.json")]);
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_directory_does_not_abort_scan() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let locked = root.join("locked");
        std::fs::create_dir_all(&locked).unwrap();
        std::fs::write(root.join("a.model.json"), "{}").unwrap();
        std::fs::write(locked.join("b.model.json"), "{}").unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();

        let found = collect_manifest_paths(&[root.to_string_lossy().to_string()], true);
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();

        // Readable manifests survive; the locked one is only visible with elevated rights.
        let found = found.unwrap();
        assert!(found.contains(&root.join("a.model.json")), "{found:?}");
        assert!(found.len() <= 2);
    }

    #[test]
    fn glob_matching_nothing_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let pattern = format!("{}/*.model.json", dir.path().display());
        let err = collect_manifest_paths(&[pattern], false).unwrap_err();
        assert!(matches!(err, Error::NoMatch(_)));
    }
}
