//! Crate-wide error type.
use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A cycle anywhere in the global dependency graph. The path lists each
    /// record on the cycle once, starting at the record the walk re-entered.
    #[error("circular dependency detected: {}", render_cycle(.0))]
    CircularDependency(Vec<String>),

    /// A record reached again while its own inline expansion was in progress.
    #[error("circular reference detected: {0}")]
    SelfReference(String),

    #[error("dependency sort: circular dependency detected involving type: {0}")]
    SortCycle(String),

    #[error("no records marked for schema generation found in: {0}")]
    NoRecords(String),

    #[error("record `{0}` is declared more than once")]
    DuplicateRecord(String),

    #[error("alias `{alias}` is declared over another alias `{target}`; alias chains are not supported")]
    AliasChain { alias: String, target: String },

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid type-model manifest {}: {message}", .path.display())]
    Manifest { path: PathBuf, message: String },

    #[error(transparent)]
    Pattern(#[from] glob::PatternError),

    #[error("glob pattern matched no files: {0}")]
    NoMatch(String),

    #[error("serialize schema for {name}: {source}")]
    Serialize {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("build schema for {name}: {source}")]
    Build {
        name: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io { path: path.into(), source }
    }

    pub(crate) fn build(name: &str, source: Error) -> Self {
        Error::Build { name: name.to_string(), source: Box::new(source) }
    }
}

fn render_cycle(path: &[String]) -> String {
    let mut out = path.join(" -> ");
    if let Some(first) = path.first() {
        out.push_str(" -> ");
        out.push_str(first);
    }
    out
}
