//! The import run: one transaction, one instance edit, one commit.
//!
//! ```text
//! Init -> ResolveReferenceDatabase -> ResolvePathways -> LinkPathways -> Commit
//! ```
//!
//! Any error in any phase rolls the transaction back and is returned as
//! `ImportError::Aborted` naming the phase. There is no partial success.

use crate::audit::{create_instance_edit, InstanceEditRequest};
use crate::error::{ImportError, ImportPhase, Result};
use crate::mutator::GraphMutator;
use crate::reference_db::{resolve_reference_database, ReferenceDatabaseDefinition};
use crate::registry::IdentifierRegistry;
use crate::PathwayModels;
use biomodels_graph::{
    GraphStore, GraphTransaction, Label, NodeRef, RelationshipType,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Everything one run needs.
#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub instance_edit: InstanceEditRequest,
    pub pathway_models: PathwayModels,
    pub reference_database: ReferenceDatabaseDefinition,
}

impl ImportRequest {
    pub fn new(instance_edit: InstanceEditRequest, pathway_models: PathwayModels) -> Self {
        Self {
            instance_edit,
            pathway_models,
            reference_database: ReferenceDatabaseDefinition::biomodels(),
        }
    }
}

/// Outcome of a committed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub instance_edit_db_id: i64,
    pub reference_database_db_id: i64,
    pub reference_database_created: bool,
    /// Stable ids of linked pathways, in processing order.
    pub linked_pathways: Vec<String>,
    /// Mapping keys with no pathway in the store.
    pub missing_pathways: Vec<String>,
    pub identifiers_created: usize,
    /// dbIds allocated by the run, in creation order.
    pub created_db_ids: Vec<i64>,
    pub relationships: BTreeMap<RelationshipType, usize>,
}

impl ImportReport {
    pub fn relationship_count(&self, rel_type: RelationshipType) -> usize {
        self.relationships.get(&rel_type).copied().unwrap_or(0)
    }
}

/// Run the import against `store` and commit it, or roll back on any error.
pub fn run_import<S: GraphStore>(store: &S, request: &ImportRequest) -> Result<ImportReport> {
    let mut tx = store
        .begin()
        .map_err(|e| ImportError::Transaction(e).in_phase(ImportPhase::Init))?;

    match import_in_transaction(&mut tx, request) {
        Ok(report) => {
            tx.commit()
                .map_err(|e| ImportError::Transaction(e).in_phase(ImportPhase::Commit))?;
            tracing::info!(
                pathways = report.linked_pathways.len(),
                identifiers = report.identifiers_created,
                nodes = report.created_db_ids.len(),
                "committed BioModels insertion"
            );
            Ok(report)
        }
        Err(err) => {
            tracing::error!(error = %err.chain(), "BioModels insertion failed, rolling back");
            if let Err(rollback) = tx.rollback() {
                tracing::warn!(error = %rollback, "rollback failed");
            }
            Err(err)
        }
    }
}

fn import_in_transaction<T: GraphTransaction>(
    tx: &mut T,
    request: &ImportRequest,
) -> Result<ImportReport> {
    let in_phase = |phase| move |err: ImportError| err.in_phase(phase);

    // Init
    let mut mutator = GraphMutator::open(tx).map_err(in_phase(ImportPhase::Init))?;
    let instance_edit = create_instance_edit(&mut mutator, &request.instance_edit)
        .map_err(in_phase(ImportPhase::Init))?;

    let reference_database =
        resolve_reference_database(&mut mutator, &request.reference_database, &instance_edit)
            .map_err(in_phase(ImportPhase::ResolveReferenceDatabase))?;

    let (pathways, missing_pathways) =
        resolve_pathways(&mut mutator, &request.pathway_models)
            .map_err(in_phase(ImportPhase::ResolvePathways))?;

    let mut registry = IdentifierRegistry::new();
    let mut linked_pathways = Vec::with_capacity(pathways.len());
    for pathway in &pathways {
        let Some(stable_id) = pathway.stable_id() else {
            continue;
        };
        let Some(model_ids) = request.pathway_models.get(stable_id) else {
            continue;
        };
        link_pathway(
            &mut mutator,
            &mut registry,
            pathway,
            model_ids,
            &reference_database.node,
            &instance_edit,
        )
        .map_err(in_phase(ImportPhase::LinkPathways))?;
        linked_pathways.push(stable_id.to_string());
    }

    let log = mutator.into_log();
    Ok(ImportReport {
        instance_edit_db_id: instance_edit.db_id().unwrap_or_default(),
        reference_database_db_id: reference_database.node.db_id().unwrap_or_default(),
        reference_database_created: reference_database.created,
        linked_pathways,
        missing_pathways,
        identifiers_created: registry.len(),
        created_db_ids: log.created_db_ids,
        relationships: log.relationships,
    })
}

/// Pathways present in the store, ordered by (stable id, dbId), plus the
/// mapping keys that matched nothing.
///
/// Every matching node is returned. Two pathways sharing a stable id are both
/// linked to that id's models.
fn resolve_pathways<T: GraphTransaction>(
    mutator: &mut GraphMutator<'_, T>,
    pathway_models: &PathwayModels,
) -> Result<(Vec<NodeRef>, Vec<String>)> {
    let mut pathways: Vec<NodeRef> = mutator
        .get_nodes_by_stable_ids(Label::Pathway, pathway_models.keys().map(String::as_str))?
        .into_iter()
        .filter(|node| node.stable_id().is_some())
        .collect();
    pathways.sort_by(|a, b| (a.stable_id(), a.db_id()).cmp(&(b.stable_id(), b.db_id())));

    let mut found: HashMap<String, usize> = HashMap::new();
    for stable_id in pathways.iter().filter_map(NodeRef::stable_id) {
        *found.entry(stable_id.to_string()).or_default() += 1;
    }
    for (stable_id, count) in found.iter().filter(|(_, count)| **count > 1) {
        tracing::warn!(stable_id = %stable_id, count, "stable id shared by several pathways");
    }

    let missing: Vec<String> = pathway_models
        .keys()
        .filter(|stable_id| !found.contains_key(*stable_id))
        .cloned()
        .collect();
    for stable_id in &missing {
        tracing::debug!(stable_id = %stable_id, "pathway not in graph, skipping");
    }
    tracing::info!(
        requested = pathway_models.len(),
        found = pathways.len(),
        "resolved pathways with BioModels ids"
    );
    Ok((pathways, missing))
}

/// `[Pathway:<dbId>] <displayName>`
fn pathway_context(pathway: &NodeRef) -> String {
    let db_id = pathway
        .db_id()
        .map(|id| id.to_string())
        .unwrap_or_else(|| "?".to_string());
    format!("[Pathway:{db_id}] {}", pathway.display_name().unwrap_or_default())
}

fn link_pathway<T: GraphTransaction>(
    mutator: &mut GraphMutator<'_, T>,
    registry: &mut IdentifierRegistry,
    pathway: &NodeRef,
    model_ids: &[String],
    reference_database: &NodeRef,
    instance_edit: &NodeRef,
) -> Result<()> {
    let context = pathway_context(pathway);
    tracing::info!(pathway = %context, models = model_ids.len(), "adding BioModels ids to pathway");

    let result = (|| {
        let mut seen = HashSet::new();
        let distinct = model_ids.iter().filter(|id| seen.insert(id.as_str()));
        for (order, model_id) in distinct.enumerate() {
            let identifier =
                registry.get_or_create(mutator, model_id, reference_database, instance_edit)?;
            mutator.create_relationship(
                pathway,
                &identifier,
                RelationshipType::CrossReference,
                order as i64,
                1,
            )?;
        }
        mutator.create_relationship(instance_edit, pathway, RelationshipType::Modified, 0, 1)
    })();

    result.map_err(|source| ImportError::Pathway {
        pathway: context.clone(),
        identifiers: model_ids.to_vec(),
        source: Box::new(source),
    })?;
    tracing::info!(pathway = %context, "BioModels ids added to pathway");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use biomodels_graph::{keys, MemoryGraph, Properties, Value};
    use chrono::NaiveDate;

    fn request(models: &[(&str, &str)]) -> ImportRequest {
        let mut pathway_models = PathwayModels::new();
        for (model, pathway) in models {
            pathway_models
                .entry(pathway.to_string())
                .or_default()
                .push(model.to_string());
        }
        let timestamp = NaiveDate::from_ymd_opt(2024, 1, 31)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        ImportRequest::new(InstanceEditRequest::new(9606, timestamp), pathway_models)
    }

    fn graph(pathways: &[(&str, i64)]) -> MemoryGraph {
        let graph = MemoryGraph::new();
        let mut person = Properties::new();
        person.insert(keys::DB_ID.to_string(), Value::Int(9606));
        person.insert(keys::SURNAME.to_string(), Value::from("Stein"));
        person.insert(keys::FIRSTNAME.to_string(), Value::from("Ada"));
        graph.add_node(&[Label::Person], person);
        for (stable_id, db_id) in pathways {
            let mut props = Properties::new();
            props.insert(keys::DB_ID.to_string(), Value::Int(*db_id));
            props.insert(keys::STABLE_ID.to_string(), Value::from(*stable_id));
            props.insert(keys::DISPLAY_NAME.to_string(), Value::from(format!("Pathway {stable_id}")));
            graph.add_node(&[Label::Pathway], props);
        }
        graph
    }

    #[test]
    fn test_pathway_context_format() {
        let mut props = Properties::new();
        props.insert(keys::DB_ID.to_string(), Value::Int(69620));
        props.insert(keys::DISPLAY_NAME.to_string(), Value::from("Cell Cycle Checkpoints"));
        let node = NodeRef {
            id: 0,
            labels: [Label::DatabaseObject, Label::Pathway].into_iter().collect(),
            properties: props,
        };
        assert_eq!(pathway_context(&node), "[Pathway:69620] Cell Cycle Checkpoints");
    }

    #[test]
    fn test_missing_pathways_are_reported_not_fatal() {
        let graph = graph(&[("R-HSA-100", 100)]);
        let report = run_import(
            &graph,
            &request(&[
                ("BIOMD0000000001", "R-HSA-100"),
                ("BIOMD0000000002", "R-HSA-999"),
            ]),
        )
        .unwrap();

        assert_eq!(report.linked_pathways, vec!["R-HSA-100"]);
        assert_eq!(report.missing_pathways, vec!["R-HSA-999"]);
        assert_eq!(report.identifiers_created, 1);
        assert_eq!(graph.commit_count(), 1);
    }

    #[test]
    fn test_abort_names_the_phase() {
        let graph = graph(&[("R-HSA-100", 100)]);
        // instance edit, author edge, reference database, its created edge
        graph.reject_writes_after(4);

        let err = run_import(&graph, &request(&[("BIOMD0000000001", "R-HSA-100")])).unwrap_err();
        assert_eq!(err.phase(), Some(ImportPhase::LinkPathways));
        let chain = err.chain();
        assert!(chain.contains("[Pathway:100] Pathway R-HSA-100"), "{chain}");
        assert!(chain.contains("BIOMD0000000001"), "{chain}");
        assert_eq!(graph.commit_count(), 0);
        assert!(!graph.is_writer_active());
    }

    #[test]
    fn test_second_writer_is_refused() {
        let graph = graph(&[]);
        let _held = graph.begin().unwrap();
        let err = run_import(&graph, &request(&[])).unwrap_err();
        assert_eq!(err.phase(), Some(ImportPhase::Init));
        assert!(matches!(
            err,
            ImportError::Aborted { ref source, .. }
                if matches!(**source, ImportError::Transaction(biomodels_graph::StoreError::WriterBusy))
        ));
    }
}
