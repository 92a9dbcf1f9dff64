//! In-memory transactional graph store.
//!
//! Layout follows the usual columnar split:
//! - `NodeStore`: labels + properties per node id, a roaring-bitmap label
//!   index and a `dbId` index,
//! - `RelationshipStore`: edge list with forward/backward `(node, type)`
//!   indexes.
//!
//! A transaction works on a private copy of `GraphData`; `commit` persists
//! the copy (when a backing file is configured) and then swaps it in. Only
//! one transaction may be open at a time.

use crate::schema::{keys, Label, RelationshipType};
use crate::statement::{QueryResult, Record, Statement};
use crate::store::{GraphStore, GraphTransaction, StoreError};
use crate::value::{Properties, Value};
use crate::{NodeRef, RelationshipRef};

use parking_lot::{Mutex, RwLock};
use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

// ============================================================================
// Node Storage
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct NodeStore {
    labels: Vec<BTreeSet<Label>>,
    properties: Vec<Properties>,
    /// label -> node ids
    label_index: HashMap<Label, RoaringBitmap>,
    /// dbId -> node ids (more than one entry means a corrupted store)
    db_id_index: HashMap<i64, Vec<u32>>,
}

impl NodeStore {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn add(&mut self, labels: BTreeSet<Label>, properties: Properties) -> u32 {
        let id = self.labels.len() as u32;

        for label in &labels {
            self.label_index
                .entry(*label)
                .or_insert_with(RoaringBitmap::new)
                .insert(id);
        }
        if let Some(db_id) = properties.get(keys::DB_ID).and_then(Value::as_int) {
            self.db_id_index.entry(db_id).or_default().push(id);
        }

        self.labels.push(labels);
        self.properties.push(properties);
        id
    }

    pub fn get(&self, id: u32) -> Option<NodeRef> {
        let labels = self.labels.get(id as usize)?;
        let properties = self.properties.get(id as usize)?;
        Some(NodeRef {
            id,
            labels: labels.clone(),
            properties: properties.clone(),
        })
    }

    pub fn property(&self, id: u32, key: &str) -> Option<&Value> {
        self.properties.get(id as usize)?.get(key)
    }

    pub fn by_label(&self, label: Label) -> Option<&RoaringBitmap> {
        self.label_index.get(&label)
    }

    /// Nodes carrying every label in `labels`.
    pub fn with_labels(&self, labels: &[Label]) -> RoaringBitmap {
        let mut iter = labels.iter();
        let Some(first) = iter.next() else {
            return (0..self.len() as u32).collect();
        };
        let mut out = self.by_label(*first).cloned().unwrap_or_default();
        for label in iter {
            match self.by_label(*label) {
                Some(ids) => out &= ids,
                None => return RoaringBitmap::new(),
            }
        }
        out
    }

    /// `DatabaseObject` nodes whose dbId equals `db_id`.
    pub fn by_db_id(&self, db_id: i64) -> Vec<u32> {
        let Some(objects) = self.by_label(Label::DatabaseObject) else {
            return Vec::new();
        };
        self.db_id_index
            .get(&db_id)
            .map(|ids| ids.iter().copied().filter(|id| objects.contains(*id)).collect())
            .unwrap_or_default()
    }

    pub fn max_db_id(&self) -> Option<i64> {
        self.by_label(Label::DatabaseObject)?
            .iter()
            .filter_map(|id| self.property(id, keys::DB_ID).and_then(Value::as_int))
            .max()
    }
}

// ============================================================================
// Relationship Storage
// ============================================================================

#[derive(Debug, Clone)]
struct StoredRelationship {
    rel_type: RelationshipType,
    source: u32,
    target: u32,
    properties: Properties,
}

#[derive(Debug, Clone, Default)]
pub struct RelationshipStore {
    relationships: Vec<StoredRelationship>,
    /// (source, type) -> relationship ids
    forward_index: HashMap<(u32, RelationshipType), Vec<u32>>,
    /// (target, type) -> relationship ids
    backward_index: HashMap<(u32, RelationshipType), Vec<u32>>,
    type_index: HashMap<RelationshipType, RoaringBitmap>,
}

impl RelationshipStore {
    pub fn len(&self) -> usize {
        self.relationships.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relationships.is_empty()
    }

    pub fn add(
        &mut self,
        rel_type: RelationshipType,
        source: u32,
        target: u32,
        properties: Properties,
    ) -> u32 {
        let id = self.relationships.len() as u32;

        self.forward_index
            .entry((source, rel_type))
            .or_default()
            .push(id);
        self.backward_index
            .entry((target, rel_type))
            .or_default()
            .push(id);
        self.type_index
            .entry(rel_type)
            .or_insert_with(RoaringBitmap::new)
            .insert(id);

        self.relationships.push(StoredRelationship {
            rel_type,
            source,
            target,
            properties,
        });
        id
    }

    pub fn get(&self, id: u32) -> Option<RelationshipRef> {
        let rel = self.relationships.get(id as usize)?;
        Some(RelationshipRef {
            id,
            rel_type: rel.rel_type,
            source: rel.source,
            target: rel.target,
            properties: rel.properties.clone(),
        })
    }

    pub fn of_type(&self, rel_type: RelationshipType) -> Vec<RelationshipRef> {
        self.type_index
            .get(&rel_type)
            .map(|ids| ids.iter().filter_map(|id| self.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn outgoing(&self, source: u32, rel_type: RelationshipType) -> Vec<RelationshipRef> {
        self.forward_index
            .get(&(source, rel_type))
            .map(|ids| ids.iter().filter_map(|&id| self.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn incoming_count(&self, target: u32, rel_type: RelationshipType) -> usize {
        self.backward_index
            .get(&(target, rel_type))
            .map(Vec::len)
            .unwrap_or(0)
    }
}

// ============================================================================
// GraphData: nodes + relationships + statement interpreter
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct GraphData {
    pub nodes: NodeStore,
    pub relationships: RelationshipStore,
}

impl GraphData {
    /// Interpret one statement against this data.
    pub fn execute(&mut self, statement: &Statement) -> Result<QueryResult, StoreError> {
        statement.validate()?;
        let mut result = QueryResult::default();

        match statement {
            Statement::MaxDbId => {
                let max = self.nodes.max_db_id().map(Value::Int).unwrap_or(Value::Null);
                result.records.push(Record::Scalar(max));
            }
            Statement::MatchByDbId { db_id } => {
                result.records = self
                    .nodes
                    .by_db_id(*db_id)
                    .into_iter()
                    .filter_map(|id| self.nodes.get(id))
                    .map(Record::Node)
                    .collect();
            }
            Statement::MatchByStableIds { label, stable_ids } => {
                let wanted: HashSet<&str> = stable_ids.iter().map(String::as_str).collect();
                result.records = self
                    .nodes
                    .with_labels(&[Label::DatabaseObject, *label])
                    .iter()
                    .filter(|id| {
                        self.nodes
                            .property(*id, keys::STABLE_ID)
                            .and_then(Value::as_str)
                            .is_some_and(|st_id| wanted.contains(st_id))
                    })
                    .filter_map(|id| self.nodes.get(id))
                    .map(Record::Node)
                    .collect();
            }
            Statement::MatchByNameMember { label, name } => {
                result.records = self
                    .nodes
                    .with_labels(&[Label::DatabaseObject, *label])
                    .iter()
                    .filter(|id| {
                        self.nodes
                            .property(*id, keys::NAME)
                            .is_some_and(|names| names.list_contains_str(name))
                    })
                    .filter_map(|id| self.nodes.get(id))
                    .map(Record::Node)
                    .collect();
            }
            Statement::CreateNode { labels, properties } => {
                let id = self
                    .nodes
                    .add(labels.iter().copied().collect(), properties.clone());
                result.nodes_created = 1;
                if let Some(node) = self.nodes.get(id) {
                    result.records.push(Record::Node(node));
                }
            }
            Statement::CreateRelationship {
                from_db_id,
                to_db_id,
                rel_type,
                order,
                stoichiometry,
            } => {
                // MATCH ... MATCH ... CREATE: one edge per matched pair, none
                // when either side is missing.
                let sources = self.nodes.by_db_id(*from_db_id);
                let targets = self.nodes.by_db_id(*to_db_id);
                let mut properties = Properties::new();
                properties.insert(keys::ORDER.to_string(), Value::Int(*order));
                properties.insert(keys::STOICHIOMETRY.to_string(), Value::Int(*stoichiometry));
                for &source in &sources {
                    for &target in &targets {
                        self.relationships
                            .add(*rel_type, source, target, properties.clone());
                        result.relationships_created += 1;
                    }
                }
                result
                    .records
                    .push(Record::Scalar(Value::Int(result.relationships_created as i64)));
            }
            Statement::CountReferrers {
                label,
                display_name,
                rel_type,
            } => {
                for id in self.nodes.with_labels(&[Label::DatabaseObject, *label]).iter() {
                    let matches = self
                        .nodes
                        .property(id, keys::DISPLAY_NAME)
                        .and_then(Value::as_str)
                        == Some(display_name.as_str());
                    if matches {
                        let count = self.relationships.incoming_count(id, *rel_type);
                        result.records.push(Record::Scalar(Value::Int(count as i64)));
                    }
                }
            }
        }

        Ok(result)
    }

    pub fn to_snapshot(&self) -> Snapshot {
        let nodes = (0..self.nodes.len() as u32)
            .filter_map(|id| self.nodes.get(id))
            .map(|node| SnapshotNode {
                id: node.id,
                labels: node.labels,
                properties: node.properties,
            })
            .collect();
        let relationships = self
            .relationships
            .relationships
            .iter()
            .map(|rel| SnapshotRelationship {
                rel_type: rel.rel_type,
                source: rel.source,
                target: rel.target,
                properties: rel.properties.clone(),
            })
            .collect();
        Snapshot {
            nodes,
            relationships,
        }
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Result<Self, StoreError> {
        let mut data = GraphData::default();
        for (expected, node) in snapshot.nodes.into_iter().enumerate() {
            if node.id as usize != expected {
                return Err(StoreError::InvalidSnapshot(format!(
                    "node ids must be dense and ordered: expected {expected}, found {}",
                    node.id
                )));
            }
            data.nodes.add(node.labels, node.properties);
        }
        let node_count = data.nodes.len() as u32;
        for rel in snapshot.relationships {
            if rel.source >= node_count || rel.target >= node_count {
                return Err(StoreError::InvalidSnapshot(format!(
                    "{} relationship {} -> {} references a missing node",
                    rel.rel_type, rel.source, rel.target
                )));
            }
            data.relationships
                .add(rel.rel_type, rel.source, rel.target, rel.properties);
        }
        Ok(data)
    }
}

// ============================================================================
// Snapshot format
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub nodes: Vec<SnapshotNode>,
    #[serde(default)]
    pub relationships: Vec<SnapshotRelationship>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotNode {
    pub id: u32,
    pub labels: BTreeSet<Label>,
    #[serde(default)]
    pub properties: Properties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRelationship {
    #[serde(rename = "type")]
    pub rel_type: RelationshipType,
    pub source: u32,
    pub target: u32,
    #[serde(default)]
    pub properties: Properties,
}

impl Snapshot {
    pub fn read(path: &Path) -> Result<Self, StoreError> {
        let reader = BufReader::new(fs::File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Write via a sibling temp file + rename, so a crash never leaves a
    /// half-written snapshot behind.
    pub fn write(&self, path: &Path) -> Result<(), StoreError> {
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        {
            let mut writer = BufWriter::new(fs::File::create(&tmp)?);
            serde_json::to_writer_pretty(&mut writer, self)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

// ============================================================================
// MemoryGraph: the store handle
// ============================================================================

struct Shared {
    data: RwLock<GraphData>,
    writer_active: AtomicBool,
    commits: AtomicUsize,
    /// Remaining write statements before the store starts rejecting writes.
    write_budget: Mutex<Option<usize>>,
    backing_file: Option<PathBuf>,
}

/// Shared handle to an in-memory graph. Clones refer to the same graph.
#[derive(Clone)]
pub struct MemoryGraph {
    shared: Arc<Shared>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::with_data(GraphData::default(), None)
    }

    fn with_data(data: GraphData, backing_file: Option<PathBuf>) -> Self {
        Self {
            shared: Arc::new(Shared {
                data: RwLock::new(data),
                writer_active: AtomicBool::new(false),
                commits: AtomicUsize::new(0),
                write_budget: Mutex::new(None),
                backing_file,
            }),
        }
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Result<Self, StoreError> {
        Ok(Self::with_data(GraphData::from_snapshot(snapshot)?, None))
    }

    /// Load a snapshot file (an absent file is an empty graph); every commit
    /// is written back to the same path.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let data = if path.exists() {
            GraphData::from_snapshot(Snapshot::read(path)?)?
        } else {
            GraphData::default()
        };
        tracing::debug!(
            path = %path.display(),
            nodes = data.nodes.len(),
            relationships = data.relationships.len(),
            "opened graph snapshot"
        );
        Ok(Self::with_data(data, Some(path.to_path_buf())))
    }

    /// Load a snapshot file read-only: commits are not persisted.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        Self::from_snapshot(Snapshot::read(path)?)
    }

    pub fn snapshot(&self) -> Snapshot {
        self.shared.data.read().to_snapshot()
    }

    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        self.snapshot().write(path)
    }

    /// Seed a node directly (outside any transaction). The generic
    /// `DatabaseObject` label is always added.
    pub fn add_node(&self, labels: &[Label], properties: Properties) -> u32 {
        let mut label_set: BTreeSet<Label> = labels.iter().copied().collect();
        label_set.insert(Label::DatabaseObject);
        self.shared.data.write().nodes.add(label_set, properties)
    }

    /// Seed a relationship directly (outside any transaction).
    pub fn add_relationship(
        &self,
        rel_type: RelationshipType,
        source: u32,
        target: u32,
        properties: Properties,
    ) -> Result<u32, StoreError> {
        let mut data = self.shared.data.write();
        let node_count = data.nodes.len() as u32;
        if source >= node_count || target >= node_count {
            return Err(StoreError::Rejected(format!(
                "{rel_type} relationship {source} -> {target} references a missing node"
            )));
        }
        Ok(data.relationships.add(rel_type, source, target, properties))
    }

    pub fn node(&self, id: u32) -> Option<NodeRef> {
        self.shared.data.read().nodes.get(id)
    }

    pub fn node_by_db_id(&self, db_id: i64) -> Option<NodeRef> {
        let data = self.shared.data.read();
        let ids = data.nodes.by_db_id(db_id);
        match ids.as_slice() {
            [id] => data.nodes.get(*id),
            _ => None,
        }
    }

    pub fn nodes_with_label(&self, label: Label) -> Vec<NodeRef> {
        let data = self.shared.data.read();
        data.nodes
            .by_label(label)
            .map(|ids| ids.iter().filter_map(|id| data.nodes.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn relationships(&self, rel_type: RelationshipType) -> Vec<RelationshipRef> {
        self.shared.data.read().relationships.of_type(rel_type)
    }

    pub fn outgoing(&self, source: u32, rel_type: RelationshipType) -> Vec<RelationshipRef> {
        self.shared.data.read().relationships.outgoing(source, rel_type)
    }

    pub fn node_count(&self) -> usize {
        self.shared.data.read().nodes.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.shared.data.read().relationships.len()
    }

    /// Number of transactions committed through this handle.
    pub fn commit_count(&self) -> usize {
        self.shared.commits.load(Ordering::SeqCst)
    }

    pub fn is_writer_active(&self) -> bool {
        self.shared.writer_active.load(Ordering::SeqCst)
    }

    /// Accept `n` more write statements, then reject every further write.
    pub fn reject_writes_after(&self, n: usize) {
        *self.shared.write_budget.lock() = Some(n);
    }
}

impl Default for MemoryGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphStore for MemoryGraph {
    type Transaction = MemoryTransaction;

    fn begin(&self) -> Result<MemoryTransaction, StoreError> {
        if self
            .shared
            .writer_active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(StoreError::WriterBusy);
        }
        let working = self.shared.data.read().clone();
        Ok(MemoryTransaction {
            shared: Arc::clone(&self.shared),
            working,
        })
    }
}

// ============================================================================
// MemoryTransaction
// ============================================================================

pub struct MemoryTransaction {
    shared: Arc<Shared>,
    working: GraphData,
}

impl MemoryTransaction {
    fn consume_write_budget(&self) -> Result<(), StoreError> {
        let mut budget = self.shared.write_budget.lock();
        match budget.as_mut() {
            Some(0) => Err(StoreError::Rejected("write budget exhausted".to_string())),
            Some(remaining) => {
                *remaining -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl GraphTransaction for MemoryTransaction {
    fn run(&mut self, statement: &Statement) -> Result<QueryResult, StoreError> {
        if statement.is_write() {
            self.consume_write_budget()?;
        }
        tracing::trace!(?statement, "executing statement");
        self.working.execute(statement)
    }

    fn commit(mut self) -> Result<(), StoreError> {
        let working = std::mem::take(&mut self.working);
        if let Some(path) = &self.shared.backing_file {
            working.to_snapshot().write(path)?;
        }
        *self.shared.data.write() = working;
        self.shared.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn rollback(self) -> Result<(), StoreError> {
        Ok(())
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        self.shared.writer_active.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person() -> Properties {
        let mut props = Properties::new();
        props.insert(keys::DB_ID.to_string(), Value::Int(9606));
        props.insert(keys::SURNAME.to_string(), Value::from("Doe"));
        props
    }

    #[test]
    fn test_label_intersection() {
        let mut nodes = NodeStore::default();
        let a = nodes.add([Label::DatabaseObject, Label::Pathway].into(), Properties::new());
        let _b = nodes.add([Label::DatabaseObject, Label::Person].into(), Properties::new());
        let _c = nodes.add([Label::Pathway].into(), Properties::new());

        let both = nodes.with_labels(&[Label::DatabaseObject, Label::Pathway]);
        assert_eq!(both.iter().collect::<Vec<_>>(), vec![a]);
        assert!(nodes.with_labels(&[Label::InstanceEdit]).is_empty());
    }

    #[test]
    fn test_db_id_lookup_ignores_non_objects() {
        let mut nodes = NodeStore::default();
        nodes.add([Label::Pathway].into(), person());
        assert!(nodes.by_db_id(9606).is_empty());
        assert_eq!(nodes.max_db_id(), None);

        let id = nodes.add([Label::DatabaseObject, Label::Person].into(), person());
        assert_eq!(nodes.by_db_id(9606), vec![id]);
        assert_eq!(nodes.max_db_id(), Some(9606));
    }

    #[test]
    fn test_relationship_to_missing_node_creates_nothing() {
        let mut data = GraphData::default();
        data.nodes
            .add([Label::DatabaseObject, Label::Person].into(), person());

        let result = data
            .execute(&Statement::CreateRelationship {
                from_db_id: 9606,
                to_db_id: 1,
                rel_type: RelationshipType::Author,
                order: 0,
                stoichiometry: 1,
            })
            .unwrap();
        assert_eq!(result.relationships_created, 0);
        assert!(data.relationships.is_empty());
    }

    #[test]
    fn test_second_writer_is_refused() {
        let graph = MemoryGraph::new();
        let tx = graph.begin().unwrap();
        assert!(matches!(graph.begin(), Err(StoreError::WriterBusy)));
        drop(tx);
        assert!(graph.begin().is_ok());
    }

    #[test]
    fn test_write_budget() {
        let graph = MemoryGraph::new();
        graph.reject_writes_after(1);
        let mut tx = graph.begin().unwrap();
        let create = Statement::create_node(&[Label::Person], person()).unwrap();
        assert!(tx.run(&create).is_ok());
        assert!(tx.run(&Statement::MaxDbId).is_ok());
        assert!(matches!(tx.run(&create), Err(StoreError::Rejected(_))));
    }
}
