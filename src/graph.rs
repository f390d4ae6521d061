//! Record-to-record dependency graph: cycle detection and dependency-first
//! ordering. Node and edge order is insertion order, so every walk is
//! deterministic.
use std::collections::HashSet;
use indexmap::{IndexMap, IndexSet};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    edges: IndexMap<String, IndexSet<String>>, // record -> records it depends on
}

impl DependencyGraph {
    pub fn new() -> Self { Self::default() }

    /// Record that `from` depends on `to`.
    pub fn add_edge(&mut self, from: &str, to: &str) {
        self.edges.entry(from.to_string()).or_default().insert(to.to_string());
    }

    /// Register a node even when it has no outgoing edges.
    pub fn add_node(&mut self, name: &str) {
        self.edges.entry(name.to_string()).or_default();
    }

    pub fn dependencies_of(&self, name: &str) -> impl Iterator<Item = &str> + '_ {
        self.edges.get(name).into_iter().flatten().map(String::as_str)
    }

    /// Depth-first search for a back edge. Returns the path from the re-entered
    /// node to the node that closed the cycle, inclusive.
    pub fn detect_cycle(&self) -> Option<Vec<String>> {
        let mut done: HashSet<&str> = HashSet::new();
        let mut path: Vec<&str> = Vec::new();
        for name in self.edges.keys() {
            if let Some(cycle) = self.find_cycle(name, &mut path, &mut done) {
                return Some(cycle);
            }
        }
        None
    }

    fn find_cycle<'g>(
        &'g self,
        name: &'g str,
        path: &mut Vec<&'g str>,
        done: &mut HashSet<&'g str>,
    ) -> Option<Vec<String>> {
        if let Some(start) = path.iter().position(|p| *p == name) {
            return Some(path[start..].iter().map(|p| p.to_string()).collect());
        }
        if done.contains(name) {
            return None;
        }
        path.push(name);
        for dep in self.dependencies_of(name) {
            if let Some(cycle) = self.find_cycle(dep, path, done) {
                return Some(cycle);
            }
        }
        path.pop();
        done.insert(name);
        None
    }

    /// Depth-first postorder over `names`, dependencies first. Edges leaving
    /// the set are ignored; the caller's order breaks every tie.
    pub fn topo_sort<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<String>> {
        let set: HashSet<&str> = names.iter().map(AsRef::as_ref).collect();
        let mut state = SortState { set, visited: HashSet::new(), in_progress: HashSet::new(), out: Vec::new() };
        for name in names {
            self.visit(name.as_ref(), &mut state)?;
        }
        Ok(state.out)
    }

    fn visit<'a>(&'a self, name: &'a str, st: &mut SortState<'a>) -> Result<()> {
        if st.visited.contains(name) {
            return Ok(());
        }
        if !st.in_progress.insert(name) {
            return Err(Error::SortCycle(name.to_string()));
        }
        for dep in self.dependencies_of(name) {
            if st.set.contains(dep) {
                self.visit(dep, st)?;
            }
        }
        st.in_progress.remove(name);
        st.visited.insert(name);
        st.out.push(name.to_string());
        Ok(())
    }
}

struct SortState<'a> {
    set: HashSet<&'a str>,
    visited: HashSet<&'a str>,
    in_progress: HashSet<&'a str>,
    out: Vec<String>,
}
