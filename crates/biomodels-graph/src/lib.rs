//! Property-graph layer for the BioModels cross-reference import.
//!
//! - `schema`: closed label / relationship-type vocabularies and property keys
//! - `value`: property values
//! - `statement`: the statement IR and its Cypher rendering
//! - `store`: the `GraphStore` / `GraphTransaction` seam
//! - `memory`: an in-memory transactional store with JSON snapshots
//! - `neo4j`: the same seam over a Bolt connection
//!
//! Nodes are addressed two ways: by the store-internal element id (`NodeRef::id`,
//! only meaningful inside one store) and by the release-wide numeric `dbId`
//! property, which is what relationships are matched on.

pub mod memory;
pub mod neo4j;
pub mod schema;
pub mod statement;
pub mod store;
pub mod value;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub use memory::{GraphData, MemoryGraph, MemoryTransaction, Snapshot};
pub use neo4j::{Neo4jConfig, Neo4jGraph, Neo4jTransaction};
pub use schema::{keys, Label, RelationshipType, SchemaError};
pub use statement::{CypherQuery, QueryResult, Record, ResultColumn, Statement};
pub use store::{GraphStore, GraphTransaction, StoreError};
pub use value::{Properties, Value};

/// A node as read back from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRef {
    /// Store-internal element id.
    pub id: u32,
    pub labels: BTreeSet<Label>,
    pub properties: Properties,
}

impl NodeRef {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn db_id(&self) -> Option<i64> {
        self.get(keys::DB_ID).and_then(Value::as_int)
    }

    pub fn stable_id(&self) -> Option<&str> {
        self.get_str(keys::STABLE_ID)
    }

    pub fn display_name(&self) -> Option<&str> {
        self.get_str(keys::DISPLAY_NAME)
    }

    pub fn has_label(&self, label: Label) -> bool {
        self.labels.contains(&label)
    }
}

/// A relationship as read back from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipRef {
    pub id: u32,
    pub rel_type: RelationshipType,
    pub source: u32,
    pub target: u32,
    pub properties: Properties,
}

impl RelationshipRef {
    pub fn order(&self) -> Option<i64> {
        self.properties.get(keys::ORDER).and_then(Value::as_int)
    }

    pub fn stoichiometry(&self) -> Option<i64> {
        self.properties.get(keys::STOICHIOMETRY).and_then(Value::as_int)
    }
}
