//! Auto-resolution: pull in records that marked records reference but that
//! were never marked themselves, until a pass discovers nothing new.
use indexmap::IndexSet;

use crate::derive::Engine;
use crate::error::{Error, Result};
use crate::graph::DependencyGraph;
use crate::model::{RecordDescriptor, RecordMap};
use crate::source::RecordSource;

#[derive(Debug)]
pub struct Resolution {
    /// Marked records first, then auto-resolved ones in discovery order.
    pub records: RecordMap,
    /// Records explicitly marked for emission.
    pub marked: IndexSet<String>,
    /// Local names that could not be found; they stay opaque objects.
    pub unresolved: IndexSet<String>,
    pub graph: DependencyGraph,
}

impl Resolution {
    /// Marked records plus every resolved record some non-inlining record
    /// links to. Records that are only ever inlined get no document.
    pub fn emittable(&self) -> IndexSet<String> {
        let mut out = self.marked.clone();
        for record in self.records.values().filter(|r| !r.inline) {
            for dep in self.graph.dependencies_of(&record.name) {
                if self.records.contains_key(dep) {
                    out.insert(dep.to_string());
                }
            }
        }
        out
    }
}

/// Foreign-package names carry a package qualifier.
fn is_foreign(name: &str) -> bool {
    name.contains('.')
}

pub fn resolve(source: &dyn RecordSource, marked: Vec<RecordDescriptor>) -> Result<Resolution> {
    let mut records = RecordMap::new();
    for record in marked {
        if records.contains_key(&record.name) {
            return Err(Error::DuplicateRecord(record.name));
        }
        records.insert(record.name.clone(), record);
    }
    let marked: IndexSet<String> = records.keys().cloned().collect();

    let mut frontier: IndexSet<String> = IndexSet::new();
    for record in records.values() {
        let refs = Engine::new(&records, None)
            .references(record)
            .map_err(|e| Error::build(&record.name, e))?;
        frontier.extend(refs);
    }

    let mut attempted: IndexSet<String> = IndexSet::new();
    let mut unresolved: IndexSet<String> = IndexSet::new();
    loop {
        let pending: Vec<String> = frontier
            .iter()
            .filter(|name| !records.contains_key(*name) && !attempted.contains(*name))
            .cloned()
            .collect();
        if pending.is_empty() {
            break;
        }

        for name in pending {
            attempted.insert(name.clone());
            if is_foreign(&name) {
                continue;
            }
            let Some(found) = source.find_record(&name) else {
                tracing::warn!(record = %name, "referenced type not found; treating it as an opaque object");
                unresolved.insert(name);
                continue;
            };
            tracing::debug!(record = %name, "auto-resolved referenced record");
            records.insert(name.clone(), found);

            match Engine::new(&records, None).references(&records[&name]) {
                Ok(refs) => frontier.extend(refs),
                Err(error) => {
                    tracing::warn!(record = %name, %error, "could not analyze references");
                }
            }
        }
    }

    let graph = build_graph(&records)?;
    Ok(Resolution { records, marked, unresolved, graph })
}

/// Edges of every resolved record, discovered in forced reference mode so
/// the graph is complete even where output will inline references away.
pub fn build_graph(records: &RecordMap) -> Result<DependencyGraph> {
    let engine = Engine::new(records, None);
    let mut graph = DependencyGraph::new();
    for record in records.values() {
        graph.add_node(&record.name);
        let refs = engine.references(record).map_err(|e| Error::build(&record.name, e))?;
        for dep in refs {
            graph.add_edge(&record.name, &dep);
        }
    }
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldDescriptor as F, TypeDescriptor as T};
    use crate::source::MemorySource;
    use std::cell::RefCell;

    fn rec(name: &str, refs: &[&str]) -> RecordDescriptor {
        refs.iter().fold(RecordDescriptor::new(name), |r, dep| r.field(F::new(*dep, T::record(*dep))))
    }

    /// Counts lookups so the test can prove each name is tried once.
    struct Counting {
        inner: MemorySource,
        lookups: RefCell<Vec<String>>,
    }

    impl RecordSource for Counting {
        fn discover(&self) -> Result<Vec<RecordDescriptor>> { self.inner.discover() }
        fn find_record(&self, name: &str) -> Option<RecordDescriptor> {
            self.lookups.borrow_mut().push(name.to_string());
            self.inner.find_record(name)
        }
    }

    #[test]
    fn resolves_transitively_to_fixpoint() {
        let source = MemorySource::new()
            .unmarked(rec("B", &["C"]))
            .unmarked(rec("C", &[]))
            .unmarked(rec("Unused", &[]));
        let res = resolve(&source, vec![rec("A", &["B"])]).unwrap();

        assert_eq!(res.records.keys().collect::<Vec<_>>(), ["A", "B", "C"]);
        assert_eq!(res.marked.iter().collect::<Vec<_>>(), ["A"]);
        assert!(res.unresolved.is_empty());
        assert_eq!(res.graph.dependencies_of("B").collect::<Vec<_>>(), ["C"]);
    }

    #[test]
    fn missing_names_are_tried_once_and_recorded() {
        let source = Counting {
            inner: MemorySource::new().unmarked(rec("B", &["Ghost"])),
            lookups: RefCell::new(Vec::new()),
        };
        let res = resolve(&source, vec![rec("A", &["B", "Ghost"])]).unwrap();
        assert_eq!(res.unresolved.iter().collect::<Vec<_>>(), ["Ghost"]);
        assert_eq!(*source.lookups.borrow(), ["B", "Ghost"]);
    }

    #[test]
    fn foreign_names_are_never_looked_up() {
        let source = Counting { inner: MemorySource::new(), lookups: RefCell::new(Vec::new()) };
        let mut frontier_rec = rec("A", &[]);
        frontier_rec.fields.push(F::new("Ext", T::record("pkg.Thing")));
        let res = resolve(&source, vec![frontier_rec]).unwrap();
        assert!(source.lookups.borrow().is_empty());
        assert!(res.unresolved.is_empty());
    }

    #[test]
    fn inline_only_records_are_not_emitted() {
        let source = MemorySource::new()
            .unmarked(rec("Inner", &[]))
            .unmarked(rec("Shared", &[]));
        let outer = rec("Outer", &["Inner", "Shared"]).inline(true);
        let plain = rec("Plain", &["Shared"]);
        let res = resolve(&source, vec![outer, plain]).unwrap();

        let emit = res.emittable();
        assert!(emit.contains("Outer") && emit.contains("Plain") && emit.contains("Shared"));
        assert!(!emit.contains("Inner"));
    }

    #[test]
    fn duplicate_marked_records_fail() {
        let err = resolve(&MemorySource::new(), vec![rec("A", &[]), rec("A", &[])]).unwrap_err();
        assert!(matches!(err, Error::DuplicateRecord(ref n) if n == "A"));
    }

    #[test]
    fn graph_sees_cycles_hidden_by_inlining() {
        let a = rec("A", &["B"]).inline(true);
        let b = rec("B", &["A"]);
        let res = resolve(&MemorySource::new(), vec![a, b]).unwrap();
        assert_eq!(res.graph.detect_cycle().unwrap(), ["A", "B"]);
    }
}
