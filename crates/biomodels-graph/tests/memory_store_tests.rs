//! MemoryGraph E2E Tests

use biomodels_graph::*;
use tempfile::tempdir;

fn props(pairs: &[(&str, Value)]) -> Properties {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn seeded() -> MemoryGraph {
    let graph = MemoryGraph::new();
    graph.add_node(
        &[Label::Person],
        props(&[
            (keys::DB_ID, Value::Int(9606)),
            (keys::SURNAME, "Doe".into()),
            (keys::FIRSTNAME, "Jane".into()),
        ]),
    );
    graph.add_node(
        &[Label::Pathway],
        props(&[
            (keys::DB_ID, Value::Int(100)),
            (keys::STABLE_ID, "R-HSA-100".into()),
            (keys::DISPLAY_NAME, "Glycolysis".into()),
        ]),
    );
    graph.add_node(
        &[Label::Pathway],
        props(&[
            (keys::DB_ID, Value::Int(200)),
            (keys::STABLE_ID, "R-HSA-200".into()),
        ]),
    );
    graph
}

// ============================================================================
// Reads
// ============================================================================

#[test]
fn test_max_db_id() {
    let graph = seeded();
    let mut tx = graph.begin().unwrap();
    let result = tx.run(&Statement::MaxDbId).unwrap();
    assert_eq!(result.scalars().collect::<Vec<_>>(), vec![&Value::Int(9606)]);
}

#[test]
fn test_max_db_id_on_empty_store_is_null() {
    let graph = MemoryGraph::new();
    let mut tx = graph.begin().unwrap();
    let result = tx.run(&Statement::MaxDbId).unwrap();
    assert_eq!(result.scalars().collect::<Vec<_>>(), vec![&Value::Null]);
}

#[test]
fn test_match_by_stable_ids_skips_unknown() {
    let graph = seeded();
    let mut tx = graph.begin().unwrap();
    let result = tx
        .run(&Statement::MatchByStableIds {
            label: Label::Pathway,
            stable_ids: vec!["R-HSA-200".to_string(), "R-HSA-999".to_string()],
        })
        .unwrap();
    let nodes = result.into_nodes();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].stable_id(), Some("R-HSA-200"));
}

#[test]
fn test_match_by_name_member() {
    let graph = seeded();
    graph.add_node(
        &[Label::ReferenceDatabase],
        props(&[
            (keys::DB_ID, Value::Int(7)),
            (keys::NAME, vec!["BioModels Database", "BioModels"].into()),
        ]),
    );
    let mut tx = graph.begin().unwrap();
    let hits = tx
        .run(&Statement::MatchByNameMember {
            label: Label::ReferenceDatabase,
            name: "BioModels".to_string(),
        })
        .unwrap()
        .into_nodes();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].db_id(), Some(7));

    let misses = tx
        .run(&Statement::MatchByNameMember {
            label: Label::ReferenceDatabase,
            name: "Bio".to_string(),
        })
        .unwrap();
    assert!(misses.records.is_empty());
}

// ============================================================================
// Transactions
// ============================================================================

#[test]
fn test_uncommitted_writes_are_invisible() {
    let graph = seeded();
    {
        let mut tx = graph.begin().unwrap();
        let stmt = Statement::create_node(
            &[Label::InstanceEdit],
            props(&[(keys::DB_ID, Value::Int(9607))]),
        )
        .unwrap();
        let result = tx.run(&stmt).unwrap();
        assert_eq!(result.nodes_created, 1);

        // Visible to the transaction itself.
        let max = tx.run(&Statement::MaxDbId).unwrap();
        assert_eq!(max.scalars().next(), Some(&Value::Int(9607)));
        tx.rollback().unwrap();
    }
    assert_eq!(graph.node_count(), 3);
    assert_eq!(graph.commit_count(), 0);
    assert!(!graph.is_writer_active());
}

#[test]
fn test_commit_applies_nodes_and_relationships() {
    let graph = seeded();
    let mut tx = graph.begin().unwrap();
    tx.run(
        &Statement::create_node(
            &[Label::InstanceEdit],
            props(&[(keys::DB_ID, Value::Int(9607))]),
        )
        .unwrap(),
    )
    .unwrap();
    let result = tx
        .run(&Statement::CreateRelationship {
            from_db_id: 9606,
            to_db_id: 9607,
            rel_type: RelationshipType::Author,
            order: 0,
            stoichiometry: 1,
        })
        .unwrap();
    assert_eq!(result.relationships_created, 1);
    tx.commit().unwrap();

    assert_eq!(graph.commit_count(), 1);
    let authors = graph.relationships(RelationshipType::Author);
    assert_eq!(authors.len(), 1);
    assert_eq!(authors[0].order(), Some(0));
    assert_eq!(authors[0].stoichiometry(), Some(1));
    let edit = graph.node_by_db_id(9607).unwrap();
    assert!(edit.has_label(Label::DatabaseObject));
    assert!(edit.has_label(Label::InstanceEdit));
}

#[test]
fn test_count_referrers() {
    let graph = seeded();
    let rd = graph.add_node(
        &[Label::ReferenceDatabase],
        props(&[
            (keys::DB_ID, Value::Int(1)),
            (keys::DISPLAY_NAME, "BioModels Database".into()),
        ]),
    );
    let ident = graph.add_node(
        &[Label::DatabaseIdentifier],
        props(&[(keys::DB_ID, Value::Int(2))]),
    );
    graph
        .add_relationship(RelationshipType::ReferenceDatabase, ident, rd, Properties::new())
        .unwrap();

    let count = |name: &str| {
        let mut tx = graph.begin().unwrap();
        tx.run(&Statement::CountReferrers {
            label: Label::ReferenceDatabase,
            display_name: name.to_string(),
            rel_type: RelationshipType::ReferenceDatabase,
        })
        .unwrap()
        .scalars()
        .cloned()
        .collect::<Vec<_>>()
    };
    assert_eq!(count("BioModels Database"), vec![Value::Int(1)]);
    assert!(count("Ensembl").is_empty());
}

// ============================================================================
// Snapshots
// ============================================================================

#[test]
fn test_open_persists_on_commit() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("graph.json");
    seeded().save(&path).unwrap();

    let graph = MemoryGraph::open(&path).unwrap();
    let mut tx = graph.begin().unwrap();
    tx.run(
        &Statement::create_node(
            &[Label::InstanceEdit],
            props(&[(keys::DB_ID, Value::Int(9607))]),
        )
        .unwrap(),
    )
    .unwrap();
    tx.commit().unwrap();

    let reloaded = MemoryGraph::load(&path).unwrap();
    assert_eq!(reloaded.node_count(), 4);
    assert!(reloaded.node_by_db_id(9607).is_some());
}

#[test]
fn test_rollback_leaves_file_untouched() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("graph.json");
    seeded().save(&path).unwrap();
    let before = std::fs::read_to_string(&path).unwrap();

    let graph = MemoryGraph::open(&path).unwrap();
    let mut tx = graph.begin().unwrap();
    tx.run(
        &Statement::create_node(&[Label::InstanceEdit], Properties::new()).unwrap(),
    )
    .unwrap();
    drop(tx);

    assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
}

#[test]
fn test_snapshot_rejects_dangling_relationship() {
    let json = r#"{
        "nodes": [{"id": 0, "labels": ["DatabaseObject", "Person"], "properties": {"dbId": 1}}],
        "relationships": [{"type": "author", "source": 0, "target": 5}]
    }"#;
    let snapshot: Snapshot = serde_json::from_str(json).unwrap();
    assert!(matches!(
        MemoryGraph::from_snapshot(snapshot),
        Err(StoreError::InvalidSnapshot(_))
    ));
}

#[test]
fn test_snapshot_rejects_unknown_label() {
    let json = r#"{"nodes": [{"id": 0, "labels": ["Reaction"]}]}"#;
    assert!(serde_json::from_str::<Snapshot>(json).is_err());
}
