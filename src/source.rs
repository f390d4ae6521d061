//! Where record descriptors come from.
//!
//! The engine never reads files itself: a [`RecordSource`] hands it the
//! records marked for emission and answers on-demand lookups for records that
//! were referenced without being marked.
pub mod manifest;

use crate::error::Result;
use crate::model::RecordDescriptor;

pub use manifest::ManifestSource;

pub trait RecordSource {
    /// Every record explicitly marked for schema emission, each carrying its
    /// inline preference.
    fn discover(&self) -> Result<Vec<RecordDescriptor>>;

    /// Look a record up by name, marked or not.
    fn find_record(&self, name: &str) -> Option<RecordDescriptor>;
}

/// In-memory source for tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemorySource {
    marked: Vec<RecordDescriptor>,
    unmarked: Vec<RecordDescriptor>,
}

#[cfg(test)]
impl MemorySource {
    pub fn new() -> Self { Self::default() }

    pub fn marked(mut self, record: RecordDescriptor) -> Self {
        self.marked.push(record);
        self
    }

    pub fn unmarked(mut self, record: RecordDescriptor) -> Self {
        self.unmarked.push(record);
        self
    }
}

#[cfg(test)]
impl RecordSource for MemorySource {
    fn discover(&self) -> Result<Vec<RecordDescriptor>> {
        Ok(self.marked.clone())
    }

    fn find_record(&self, name: &str) -> Option<RecordDescriptor> {
        self.marked.iter().chain(&self.unmarked).find(|r| r.name == name).cloned()
    }
}
