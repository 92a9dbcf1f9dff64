//! Run-scoped cache of database identifier nodes, keyed by model id.

use crate::error::{ImportError, Result};
use crate::mutator::{require_str, GraphMutator};
use biomodels_graph::{keys, GraphTransaction, Label, NodeRef, Properties, RelationshipType, Value};
use std::collections::HashMap;

/// One `DatabaseIdentifier` per distinct model id per run.
///
/// Lookups are exact and case-sensitive. The registry lives as long as one
/// import run and is never persisted.
#[derive(Debug, Default)]
pub struct IdentifierRegistry {
    identifiers: HashMap<String, NodeRef>,
}

impl IdentifierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }

    pub fn get(&self, model_id: &str) -> Option<&NodeRef> {
        self.identifiers.get(model_id)
    }

    /// Return the identifier node already created this run for `model_id`, or
    /// create it, linked from `instance_edit` (`created`) and to
    /// `reference_database` (`referenceDatabase`).
    pub fn get_or_create<T: GraphTransaction>(
        &mut self,
        mutator: &mut GraphMutator<'_, T>,
        model_id: &str,
        reference_database: &NodeRef,
        instance_edit: &NodeRef,
    ) -> Result<NodeRef> {
        if let Some(node) = self.identifiers.get(model_id) {
            tracing::debug!(model_id, db_id = ?node.db_id(), "reusing database identifier");
            return Ok(node.clone());
        }

        tracing::info!(model_id, "creating database identifier");
        let node = create_identifier(mutator, model_id, reference_database, instance_edit)
            .map_err(|source| ImportError::Identifier {
                identifier: model_id.to_string(),
                source: Box::new(source),
            })?;
        self.identifiers.insert(model_id.to_string(), node.clone());
        Ok(node)
    }
}

fn create_identifier<T: GraphTransaction>(
    mutator: &mut GraphMutator<'_, T>,
    model_id: &str,
    reference_database: &NodeRef,
    instance_edit: &NodeRef,
) -> Result<NodeRef> {
    let database_name = require_str(reference_database, keys::DISPLAY_NAME)?;
    let base_url = require_str(reference_database, keys::URL)?;

    let mut props = Properties::new();
    props.insert(keys::DATABASE_NAME.to_string(), Value::from(database_name));
    props.insert(
        keys::DISPLAY_NAME.to_string(),
        Value::from(format!("{database_name}:{model_id}")),
    );
    props.insert(keys::IDENTIFIER.to_string(), Value::from(model_id));
    props.insert(
        keys::SCHEMA_CLASS.to_string(),
        Value::from(Label::DatabaseIdentifier.as_str()),
    );
    props.insert(keys::URL.to_string(), Value::from(format!("{base_url}{model_id}")));

    let node = mutator.create_node(&[Label::DatabaseIdentifier], props)?;
    mutator.create_relationship(instance_edit, &node, RelationshipType::Created, 0, 1)?;
    mutator.create_relationship(
        &node,
        reference_database,
        RelationshipType::ReferenceDatabase,
        0,
        1,
    )?;
    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use biomodels_graph::{GraphStore, MemoryGraph};

    fn fixture() -> MemoryGraph {
        let graph = MemoryGraph::new();
        let mut ie = Properties::new();
        ie.insert(keys::DB_ID.to_string(), Value::Int(1));
        graph.add_node(&[Label::InstanceEdit], ie);

        let mut refdb = Properties::new();
        refdb.insert(keys::DB_ID.to_string(), Value::Int(2));
        refdb.insert(keys::DISPLAY_NAME.to_string(), Value::from("BioModels Database"));
        refdb.insert(keys::URL.to_string(), Value::from("https://www.ebi.ac.uk/biomodels/"));
        graph.add_node(&[Label::ReferenceDatabase], refdb);
        graph
    }

    #[test]
    fn test_identifier_properties() {
        let graph = fixture();
        let mut tx = graph.begin().unwrap();
        let mut mutator = GraphMutator::open(&mut tx).unwrap();
        let ie = mutator.get_node_by_db_id(1).unwrap();
        let refdb = mutator.get_node_by_db_id(2).unwrap();
        let mut registry = IdentifierRegistry::new();

        let node = registry
            .get_or_create(&mut mutator, "BIOMD0000000001", &refdb, &ie)
            .unwrap();
        assert_eq!(node.db_id(), Some(3));
        assert_eq!(node.display_name(), Some("BioModels Database:BIOMD0000000001"));
        assert_eq!(node.get_str(keys::DATABASE_NAME), Some("BioModels Database"));
        assert_eq!(node.get_str(keys::IDENTIFIER), Some("BIOMD0000000001"));
        assert_eq!(
            node.get_str(keys::URL),
            Some("https://www.ebi.ac.uk/biomodels/BIOMD0000000001")
        );
        assert!(node.has_label(Label::DatabaseIdentifier));
        assert_eq!(mutator.log().relationship_count(RelationshipType::Created), 1);
        assert_eq!(
            mutator.log().relationship_count(RelationshipType::ReferenceDatabase),
            1
        );
    }

    #[test]
    fn test_repeated_model_id_is_created_once() {
        let graph = fixture();
        let mut tx = graph.begin().unwrap();
        let mut mutator = GraphMutator::open(&mut tx).unwrap();
        let ie = mutator.get_node_by_db_id(1).unwrap();
        let refdb = mutator.get_node_by_db_id(2).unwrap();
        let mut registry = IdentifierRegistry::new();

        let first = registry
            .get_or_create(&mut mutator, "BIOMD0000000001", &refdb, &ie)
            .unwrap();
        let again = registry
            .get_or_create(&mut mutator, "BIOMD0000000001", &refdb, &ie)
            .unwrap();
        let other = registry
            .get_or_create(&mut mutator, "biomd0000000001", &refdb, &ie)
            .unwrap();

        assert_eq!(first, again);
        assert_ne!(first.db_id(), other.db_id());
        assert_eq!(registry.len(), 2);
        assert_eq!(mutator.log().created_db_ids, vec![3, 4]);
    }

    #[test]
    fn test_failure_names_the_model_id() {
        let graph = fixture();
        let mut tx = graph.begin().unwrap();
        let mut mutator = GraphMutator::open(&mut tx).unwrap();
        let ie = mutator.get_node_by_db_id(1).unwrap();
        let refdb = mutator.get_node_by_db_id(2).unwrap();
        let mut ghost = refdb.clone();
        ghost.properties.insert(keys::DB_ID.to_string(), Value::Int(999));
        let mut registry = IdentifierRegistry::new();

        let err = registry
            .get_or_create(&mut mutator, "BIOMD0000000009", &ghost, &ie)
            .unwrap_err();
        match err {
            ImportError::Identifier { identifier, source } => {
                assert_eq!(identifier, "BIOMD0000000009");
                assert!(matches!(*source, ImportError::EndpointNotFound { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(registry.is_empty());
    }
}
