//! Graph mutation primitives used by every import step.
//!
//! All writes go through `GraphMutator`, which owns the run's dbId allocator:
//! a node cannot be created without drawing an id, and an id is never drawn
//! for anything but a node creation.

use crate::allocator::DbIdAllocator;
use crate::error::{ImportError, Result};
use biomodels_graph::schema::validate_property_key;
use biomodels_graph::{
    keys, GraphTransaction, Label, NodeRef, Properties, RelationshipType, SchemaError, Statement,
    Value,
};
use serde::Serialize;
use std::collections::BTreeMap;

/// What the run has written so far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MutationLog {
    /// dbIds of created nodes, in creation order.
    pub created_db_ids: Vec<i64>,
    pub relationships: BTreeMap<RelationshipType, usize>,
}

impl MutationLog {
    pub fn relationship_count(&self, rel_type: RelationshipType) -> usize {
        self.relationships.get(&rel_type).copied().unwrap_or(0)
    }
}

pub struct GraphMutator<'t, T: GraphTransaction> {
    tx: &'t mut T,
    ids: DbIdAllocator,
    log: MutationLog,
}

impl<'t, T: GraphTransaction> GraphMutator<'t, T> {
    pub fn new(tx: &'t mut T, ids: DbIdAllocator) -> Self {
        Self {
            tx,
            ids,
            log: MutationLog::default(),
        }
    }

    /// Query the store's maximum dbId and wrap the transaction.
    pub fn open(tx: &'t mut T) -> Result<Self> {
        let ids = DbIdAllocator::from_transaction(tx)?;
        Ok(Self::new(tx, ids))
    }

    pub fn allocator(&self) -> &DbIdAllocator {
        &self.ids
    }

    pub fn log(&self) -> &MutationLog {
        &self.log
    }

    pub fn into_log(self) -> MutationLog {
        self.log
    }

    /// Create a `DatabaseObject:<labels>` node with `properties` plus a
    /// freshly allocated `dbId`, and return it as stored.
    ///
    /// The id is drawn only once the properties have passed validation.
    pub fn create_node(&mut self, labels: &[Label], mut properties: Properties) -> Result<NodeRef> {
        let what = labels
            .iter()
            .map(|l| l.as_str())
            .collect::<Vec<_>>()
            .join(":");
        let invalid = |e: SchemaError| ImportError::write(format!("create {what} node"))(e.into());
        for key in properties.keys() {
            validate_property_key(key).map_err(invalid)?;
        }

        let db_id = self.ids.next();
        properties.insert(keys::DB_ID.to_string(), Value::Int(db_id));
        let statement = Statement::create_node(labels, properties).map_err(invalid)?;
        let result = self
            .tx
            .run(&statement)
            .map_err(ImportError::write(format!("create {what} node with dbId {db_id}")))?;

        let node = result
            .into_nodes()
            .into_iter()
            .next()
            .ok_or_else(|| ImportError::NotFound {
                what: format!("created {what} node with dbId {db_id}"),
                matches: 0,
            })?;
        tracing::debug!(db_id, labels = %what, "created node");
        self.log.created_db_ids.push(db_id);
        Ok(node)
    }

    /// Create `from -[rel_type {order, stoichiometry}]-> to`, matching both
    /// endpoints by dbId.
    pub fn create_relationship(
        &mut self,
        from: &NodeRef,
        to: &NodeRef,
        rel_type: RelationshipType,
        order: i64,
        stoichiometry: i64,
    ) -> Result<()> {
        let from_db_id = require_db_id(from)?;
        let to_db_id = require_db_id(to)?;

        let result = self
            .tx
            .run(&Statement::CreateRelationship {
                from_db_id,
                to_db_id,
                rel_type,
                order,
                stoichiometry,
            })
            .map_err(ImportError::write(format!(
                "create {rel_type} relationship from dbId {from_db_id} to dbId {to_db_id}"
            )))?;

        if result.relationships_created == 0 {
            return Err(ImportError::EndpointNotFound {
                rel_type,
                from_db_id,
                to_db_id,
            });
        }
        tracing::debug!(%rel_type, from_db_id, to_db_id, order, "created relationship");
        *self.log.relationships.entry(rel_type).or_default() += result.relationships_created;
        Ok(())
    }

    /// Exactly one node with this dbId, or `NotFound`.
    pub fn get_node_by_db_id(&mut self, db_id: i64) -> Result<NodeRef> {
        let nodes = self
            .tx
            .run(&Statement::MatchByDbId { db_id })
            .map_err(ImportError::read(format!("fetch node with dbId {db_id}")))?
            .into_nodes();
        single(nodes, || format!("node with dbId {db_id}"))
    }

    /// Nodes of `label` whose stable id is in `stable_ids`, in no particular order.
    pub fn get_nodes_by_stable_ids<'a>(
        &mut self,
        label: Label,
        stable_ids: impl IntoIterator<Item = &'a str>,
    ) -> Result<Vec<NodeRef>> {
        let stable_ids: Vec<String> = stable_ids.into_iter().map(str::to_string).collect();
        let count = stable_ids.len();
        let nodes = self
            .tx
            .run(&Statement::MatchByStableIds { label, stable_ids })
            .map_err(ImportError::read(format!("fetch {count} {label} nodes by stable id")))?
            .into_nodes();
        Ok(nodes)
    }

    /// Nodes of `label` whose multi-valued `name` contains `name`.
    pub fn find_by_name(&mut self, label: Label, name: &str) -> Result<Vec<NodeRef>> {
        let nodes = self
            .tx
            .run(&Statement::MatchByNameMember {
                label,
                name: name.to_string(),
            })
            .map_err(ImportError::read(format!("look up {label} named {name:?}")))?
            .into_nodes();
        Ok(nodes)
    }
}

pub(crate) fn describe(node: &NodeRef) -> String {
    match (node.db_id(), node.display_name()) {
        (Some(db_id), Some(name)) => format!("[dbId:{db_id}] {name}"),
        (Some(db_id), None) => format!("[dbId:{db_id}]"),
        (None, _) => format!("node #{}", node.id),
    }
}

pub(crate) fn require_db_id(node: &NodeRef) -> Result<i64> {
    node.db_id().ok_or_else(|| ImportError::MissingProperty {
        node: describe(node),
        property: keys::DB_ID,
    })
}

pub(crate) fn require_str<'n>(node: &'n NodeRef, property: &'static str) -> Result<&'n str> {
    node.get_str(property)
        .ok_or_else(|| ImportError::MissingProperty {
            node: describe(node),
            property,
        })
}

pub(crate) fn single(nodes: Vec<NodeRef>, what: impl FnOnce() -> String) -> Result<NodeRef> {
    let matches = nodes.len();
    let mut iter = nodes.into_iter();
    match (iter.next(), matches) {
        (Some(node), 1) => Ok(node),
        _ => Err(ImportError::NotFound {
            what: what(),
            matches,
        }),
    }
}
