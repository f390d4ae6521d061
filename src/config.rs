//! Generator settings shared by the record source, engine and writer.

/// Annotation key that supplies serialized property names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum NameTag {
    #[default]
    Json,
    Yaml,
    Mapstructure,
    Xml,
}

impl NameTag {
    pub fn key(self) -> &'static str {
        match self {
            NameTag::Json => "json",
            NameTag::Yaml => "yaml",
            NameTag::Mapstructure => "mapstructure",
            NameTag::Xml => "xml",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GeneratorConfig {
    pub name_tag: NameTag,
    /// Base URL for `$id`; documents carry no `$id` without it.
    pub schema_id: Option<String>,
    /// Scan input directories recursively.
    pub recursive: bool,
}
