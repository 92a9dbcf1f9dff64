//! Store seam: a graph store hands out one write transaction at a time.
//!
//! The importer is written against these traits only. `MemoryGraph`
//! interprets statements directly; `Neo4jGraph` executes `Statement::cypher()`
//! inside a Bolt transaction.

use crate::schema::SchemaError;
use crate::statement::{QueryResult, Statement};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store refused a write (constraint violation, injected fault, ...).
    #[error("store rejected write: {0}")]
    Rejected(String),

    /// A second writer tried to begin while a transaction is open.
    #[error("a write transaction is already active on this store")]
    WriterBusy,

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("cannot connect to {uri}: {reason}")]
    Connection { uri: String, reason: String },

    #[error("neo4j error: {0}")]
    Neo4j(#[from] neo4rs::Error),

    /// A row came back without the expected column or with an unusable value.
    #[error("cannot decode result row: {0}")]
    Decode(String),
}

/// A graph database that can open write transactions.
pub trait GraphStore {
    type Transaction: GraphTransaction;

    fn begin(&self) -> Result<Self::Transaction, StoreError>;
}

/// An all-or-nothing unit of work.
///
/// Writes are visible to later statements of the same transaction and to
/// nobody else until `commit`. Dropping a transaction without committing
/// discards it.
pub trait GraphTransaction {
    fn run(&mut self, statement: &Statement) -> Result<QueryResult, StoreError>;

    fn commit(self) -> Result<(), StoreError>;

    fn rollback(self) -> Result<(), StoreError>;
}
