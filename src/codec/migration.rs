//! Migrations: pure transforms between adjacent framed-file versions,
//! chained by BFS over the directed graph the registered edges describe.

use crate::errors::{Result, StoreError};
use bson::Document as BsonDocument;
use std::collections::{HashMap, VecDeque};

pub type MigrationFn = Box<dyn Fn(BsonDocument) -> BsonDocument + Send + Sync>;

#[derive(Default)]
pub struct MigrationTable {
    edges: HashMap<(u32, u32), MigrationFn>,
}

impl MigrationTable {
    #[must_use]
    pub fn new() -> Self {
        Self { edges: HashMap::new() }
    }

    /// Register the edge `from -> to`.
    pub fn register(
        &mut self,
        from: u32,
        to: u32,
        f: impl Fn(BsonDocument) -> BsonDocument + Send + Sync + 'static,
    ) {
        self.edges.insert((from, to), Box::new(f));
    }

    /// Apply the shortest chain of migrations taking `doc` from `from` to
    /// `to`. `from == to` is a no-op. Absence of a path, or a missing edge
    /// along a path BFS reports, fails `Migration`.
    pub fn migrate(&self, mut doc: BsonDocument, from: u32, to: u32) -> Result<BsonDocument> {
        if from == to {
            return Ok(doc);
        }
        let path = self
            .shortest_path(from, to)
            .ok_or(StoreError::Migration { from, to })?;
        for window in path.windows(2) {
            let (a, b) = (window[0], window[1]);
            let edge = self.edges.get(&(a, b)).ok_or(StoreError::Migration { from, to })?;
            doc = edge(doc);
        }
        Ok(doc)
    }

    /// BFS shortest path over the directed graph whose edges are this
    /// table's registered `(from, to)` keys.
    fn shortest_path(&self, from: u32, to: u32) -> Option<Vec<u32>> {
        let mut adjacency: HashMap<u32, Vec<u32>> = HashMap::new();
        for &(a, b) in self.edges.keys() {
            adjacency.entry(a).or_default().push(b);
        }
        for neighbors in adjacency.values_mut() {
            neighbors.sort_unstable();
        }

        let mut visited = HashMap::new();
        visited.insert(from, from);
        let mut queue = VecDeque::new();
        queue.push_back(from);

        while let Some(node) = queue.pop_front() {
            if node == to {
                let mut path = vec![to];
                let mut cur = to;
                while cur != from {
                    cur = visited[&cur];
                    path.push(cur);
                }
                path.reverse();
                return Some(path);
            }
            if let Some(neighbors) = adjacency.get(&node) {
                for &next in neighbors {
                    visited.entry(next).or_insert_with(|| {
                        queue.push_back(next);
                        node
                    });
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn chains_migrations_along_shortest_path() {
        let mut table = MigrationTable::new();
        table.register(1, 2, |mut d| {
            let name = d.get_str("name").unwrap_or("").to_string();
            d.insert("description", format!("v2:{name}"));
            d
        });
        table.register(2, 3, |mut d| {
            d.insert("tags", vec!["m"]);
            d
        });

        let doc = doc! { "name": "t", "value": 42 };
        let migrated = table.migrate(doc, 1, 3).unwrap();
        assert_eq!(migrated.get_str("description").unwrap(), "v2:t");
        assert_eq!(migrated.get_array("tags").unwrap().len(), 1);
    }

    #[test]
    fn no_path_fails() {
        let table = MigrationTable::new();
        let err = table.migrate(bson::Document::new(), 1, 5).unwrap_err();
        assert!(matches!(err, StoreError::Migration { from: 1, to: 5 }));
    }

    #[test]
    fn same_version_is_noop() {
        let table = MigrationTable::new();
        let doc = doc! { "a": 1 };
        assert_eq!(table.migrate(doc.clone(), 2, 2).unwrap(), doc);
    }
}
