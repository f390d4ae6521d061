//! Writes derived documents into the output directory.
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::refs::schema_file_name;
use crate::schema::SchemaDocument;

#[derive(Debug, Clone)]
pub struct Writer {
    output_dir: PathBuf,
}

impl Writer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self { output_dir: output_dir.into() }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Two-space indented JSON plus a trailing newline, at
    /// `<output_dir>/<lowercase name>.schema.json`. Overwrites.
    pub fn write(&self, name: &str, doc: &SchemaDocument) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.output_dir).map_err(|e| Error::io(&self.output_dir, e))?;

        let mut text = doc
            .to_json_pretty()
            .map_err(|source| Error::Serialize { name: name.to_string(), source })?;
        text.push('\n');

        let path = self.output_dir.join(schema_file_name(name));
        std::fs::write(&path, text).map_err(|e| Error::io(&path, e))?;
        Ok(path)
    }
}
