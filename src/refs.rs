use indexmap::IndexSet;

/// File name of a record's schema document, and the link path pointing at it.
pub fn schema_file_name(type_name: &str) -> String {
    format!("{}.schema.json", type_name.to_lowercase())
}

/// Records the records one top-level derivation referenced. One tracker per
/// `derive` call; never shared across records.
#[derive(Debug, Default)]
pub struct RefTracker {
    refs: IndexSet<String>, // first-reference order
}

impl RefTracker {
    pub fn new() -> Self { Self::default() }

    pub fn add_ref(&mut self, type_name: &str) {
        if !self.refs.contains(type_name) {
            self.refs.insert(type_name.to_string());
        }
    }

    #[cfg(test)]
    pub fn all_refs(&self) -> impl Iterator<Item = &str> + '_ {
        self.refs.iter().map(String::as_str)
    }

    pub fn into_refs(self) -> Vec<String> {
        self.refs.into_iter().collect()
    }

    /// `$ref` target for a record name.
    pub fn ref_path(&self, type_name: &str) -> String {
        schema_file_name(type_name)
    }
}
