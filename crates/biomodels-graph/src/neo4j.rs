//! Neo4j-backed store.
//!
//! Each statement is rendered with `Statement::cypher()` and executed inside
//! an explicit Bolt transaction. The driver is async; the store owns a tokio
//! runtime and blocks on it so the importer stays synchronous.
//!
//! Labels outside the closed vocabulary are dropped when a node is read back,
//! as are properties whose Bolt type has no `Value` counterpart (temporal and
//! spatial types).

use crate::schema::Label;
use crate::statement::{QueryResult, Record, ResultColumn, Statement};
use crate::store::{GraphStore, GraphTransaction, StoreError};
use crate::value::{Properties, Value};
use crate::NodeRef;

use neo4rs::{query, BoltList, BoltNull, BoltType, Graph, Query, Row, Txn};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Runtime;

pub const DEFAULT_URI: &str = "bolt://localhost:7687";
pub const DEFAULT_USER: &str = "neo4j";
pub const DEFAULT_PASSWORD: &str = "neo4j";

/// Connection coordinates for one Neo4j instance.
#[derive(Clone, PartialEq, Eq)]
pub struct Neo4jConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
}

impl Neo4jConfig {
    pub fn new(uri: impl Into<String>, user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            user: user.into(),
            password: password.into(),
        }
    }
}

impl Default for Neo4jConfig {
    fn default() -> Self {
        Self::new(DEFAULT_URI, DEFAULT_USER, DEFAULT_PASSWORD)
    }
}

impl fmt::Debug for Neo4jConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Neo4jConfig")
            .field("uri", &self.uri)
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

// ============================================================================
// Neo4jGraph: the store handle
// ============================================================================

/// A connection pool to one Neo4j instance. Clones share the pool and the
/// single-writer guard.
#[derive(Clone)]
pub struct Neo4jGraph {
    uri: String,
    graph: Graph,
    writer_active: Arc<AtomicBool>,
    /// Declared last: the pool must drop while the runtime is still alive.
    runtime: Arc<Runtime>,
}

impl Neo4jGraph {
    pub fn connect(config: &Neo4jConfig) -> Result<Self, StoreError> {
        let connection_error = |reason: String| StoreError::Connection {
            uri: config.uri.clone(),
            reason,
        };
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| connection_error(format!("failed to initialize tokio runtime: {e}")))?;
        let graph = runtime
            .block_on(Graph::new(
                config.uri.as_str(),
                config.user.as_str(),
                config.password.as_str(),
            ))
            .map_err(|e| connection_error(e.to_string()))?;
        tracing::info!(uri = %config.uri, user = %config.user, "connected to neo4j");

        Ok(Self {
            uri: config.uri.clone(),
            graph,
            writer_active: Arc::new(AtomicBool::new(false)),
            runtime: Arc::new(runtime),
        })
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn is_writer_active(&self) -> bool {
        self.writer_active.load(Ordering::SeqCst)
    }
}

impl GraphStore for Neo4jGraph {
    type Transaction = Neo4jTransaction;

    fn begin(&self) -> Result<Neo4jTransaction, StoreError> {
        let guard = WriterGuard::acquire(&self.writer_active)?;
        let txn = self.runtime.block_on(self.graph.start_txn())?;
        Ok(Neo4jTransaction {
            txn,
            _guard: guard,
            runtime: Arc::clone(&self.runtime),
        })
    }
}

/// Holds the store's writer flag for the lifetime of a transaction.
struct WriterGuard(Arc<AtomicBool>);

impl WriterGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Result<Self, StoreError> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| StoreError::WriterBusy)?;
        Ok(Self(Arc::clone(flag)))
    }
}

impl Drop for WriterGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

// ============================================================================
// Neo4jTransaction
// ============================================================================

/// Dropping without `commit` leaves the server to discard the transaction.
pub struct Neo4jTransaction {
    txn: Txn,
    _guard: WriterGuard,
    runtime: Arc<Runtime>,
}

impl GraphTransaction for Neo4jTransaction {
    fn run(&mut self, statement: &Statement) -> Result<QueryResult, StoreError> {
        let cypher = statement.cypher()?;
        tracing::trace!(text = %cypher.text, "executing cypher");
        let bolt_query = to_query(&cypher.text, &cypher.params);

        let txn = &mut self.txn;
        let rows = self.runtime.block_on(async {
            let mut stream = txn.execute(bolt_query).await?;
            let mut rows = Vec::new();
            while let Some(row) = stream.next(txn.handle()).await? {
                rows.push(row);
            }
            Ok::<_, neo4rs::Error>(rows)
        })?;

        let mut result = QueryResult::default();
        for row in &rows {
            result.records.push(decode_row(row, cypher.returns)?);
        }
        match statement {
            Statement::CreateNode { .. } => result.nodes_created = result.nodes().count(),
            Statement::CreateRelationship { .. } => {
                result.relationships_created = result
                    .scalars()
                    .filter_map(Value::as_int)
                    .map(|n| n.max(0) as usize)
                    .sum();
            }
            _ => {}
        }
        Ok(result)
    }

    fn commit(self) -> Result<(), StoreError> {
        self.runtime.block_on(self.txn.commit())?;
        tracing::debug!("neo4j transaction committed");
        Ok(())
    }

    fn rollback(self) -> Result<(), StoreError> {
        self.runtime.block_on(self.txn.rollback())?;
        tracing::debug!("neo4j transaction rolled back");
        Ok(())
    }
}

// ============================================================================
// Conversions
// ============================================================================

fn to_query(text: &str, params: &Properties) -> Query {
    params
        .iter()
        .fold(query(text), |q, (key, value)| q.param(key, to_bolt(value)))
}

fn to_bolt(value: &Value) -> BoltType {
    match value {
        Value::Null => BoltType::Null(BoltNull),
        Value::Bool(b) => BoltType::from(*b),
        Value::Int(i) => BoltType::from(*i),
        Value::Float(x) => BoltType::from(*x),
        Value::String(s) => BoltType::from(s.as_str()),
        Value::List(items) => {
            let mut list = BoltList::with_capacity(items.len());
            for item in items {
                list.push(to_bolt(item));
            }
            BoltType::List(list)
        }
    }
}

fn decode_row(row: &Row, column: ResultColumn) -> Result<Record, StoreError> {
    match column {
        ResultColumn::Node(name) => {
            let node: neo4rs::Node = row
                .get(name)
                .map_err(|e| StoreError::Decode(format!("column {name}: {e}")))?;
            node_ref(&node).map(Record::Node)
        }
        ResultColumn::Scalar(name) => row
            .get::<Value>(name)
            .map(Record::Scalar)
            .map_err(|e| StoreError::Decode(format!("column {name}: {e}"))),
    }
}

fn node_ref(node: &neo4rs::Node) -> Result<NodeRef, StoreError> {
    let id = u32::try_from(node.id())
        .map_err(|_| StoreError::Decode(format!("node id {} exceeds u32", node.id())))?;

    let mut properties = Properties::new();
    for key in node.keys() {
        match node.get::<Value>(key) {
            Ok(value) => {
                properties.insert(key.to_string(), value);
            }
            Err(e) => tracing::debug!(node = id, key, error = %e, "skipping property"),
        }
    }

    Ok(NodeRef {
        id,
        labels: known_labels(node.labels()),
        properties,
    })
}

fn known_labels<'a>(names: impl IntoIterator<Item = &'a str>) -> BTreeSet<Label> {
    names
        .into_iter()
        .filter_map(|name| name.parse::<Label>().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalars_to_bolt() {
        assert!(matches!(to_bolt(&Value::Null), BoltType::Null(_)));
        assert!(matches!(to_bolt(&Value::Bool(true)), BoltType::Boolean(b) if b.value));
        assert!(matches!(to_bolt(&Value::Int(69620)), BoltType::Integer(i) if i.value == 69620));
        assert!(matches!(to_bolt(&Value::Float(0.5)), BoltType::Float(x) if x.value == 0.5));
        assert!(matches!(
            to_bolt(&Value::from("R-HSA-100")),
            BoltType::String(s) if s.value == "R-HSA-100"
        ));
    }

    #[test]
    fn test_list_to_bolt() {
        let names = Value::from(vec!["BioModels Database", "BioModels"]);
        let BoltType::List(list) = to_bolt(&names) else {
            panic!("expected a list");
        };
        assert_eq!(list.len(), 2);
        assert!(matches!(&list.value[1], BoltType::String(s) if s.value == "BioModels"));
    }

    #[test]
    fn test_unknown_labels_are_dropped() {
        let labels = known_labels(["DatabaseObject", "Event", "Pathway", "TopLevelPathway"]);
        let expected: BTreeSet<Label> =
            [Label::DatabaseObject, Label::Pathway].into_iter().collect();
        assert_eq!(labels, expected);
    }

    #[test]
    fn test_default_coordinates() {
        let config = Neo4jConfig::default();
        assert_eq!(config.uri, "bolt://localhost:7687");
        assert_eq!(config.user, "neo4j");
        let debug = format!("{config:?}");
        assert!(!debug.contains("password: \"neo4j\""), "{debug}");
        assert!(debug.contains("***"));
    }
}
