//! Statement IR.
//!
//! A `Statement` is the unit of work sent to a `GraphTransaction`. It keeps
//! structure (labels, relationship types, property keys) apart from data
//! (property values, ids): `cypher()` renders the structure into query text
//! and moves every value into the parameter map, so a Bolt-speaking backend
//! can execute it verbatim and the in-memory store can interpret it directly.

use crate::schema::{keys, validate_property_key, Label, RelationshipType, SchemaError};
use crate::value::{Properties, Value};
use crate::NodeRef;

/// A write or read request against the graph.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Highest `dbId` among all `DatabaseObject` nodes (`Null` on an empty store).
    MaxDbId,
    /// Every `DatabaseObject` whose `dbId` equals `db_id`.
    MatchByDbId { db_id: i64 },
    /// Every `DatabaseObject:<label>` whose `stId` is in `stable_ids`.
    MatchByStableIds {
        label: Label,
        stable_ids: Vec<String>,
    },
    /// Every `DatabaseObject:<label>` whose list-valued `name` contains `name`.
    MatchByNameMember { label: Label, name: String },
    /// Create one node carrying `labels` and `properties`; returns the node.
    CreateNode {
        labels: Vec<Label>,
        properties: Properties,
    },
    /// Create a typed edge between the nodes matched by dbId.
    CreateRelationship {
        from_db_id: i64,
        to_db_id: i64,
        rel_type: RelationshipType,
        order: i64,
        stoichiometry: i64,
    },
    /// For each `DatabaseObject:<label>` with the given display name, the
    /// number of nodes pointing at it via `rel_type`.
    CountReferrers {
        label: Label,
        display_name: String,
        rel_type: RelationshipType,
    },
}

/// Where a row's payload lives in a rendered query's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultColumn {
    Node(&'static str),
    Scalar(&'static str),
}

/// Rendered query text plus bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct CypherQuery {
    pub text: String,
    pub params: Properties,
    pub returns: ResultColumn,
}

impl Statement {
    /// Build a node-creation statement: the generic `DatabaseObject` label
    /// first, then each specific label once.
    pub fn create_node(specific: &[Label], properties: Properties) -> Result<Self, SchemaError> {
        let mut labels = vec![Label::DatabaseObject];
        for label in specific {
            if !labels.contains(label) {
                labels.push(*label);
            }
        }
        let statement = Statement::CreateNode { labels, properties };
        statement.validate()?;
        Ok(statement)
    }

    /// True for statements that mutate the store.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Statement::CreateNode { .. } | Statement::CreateRelationship { .. }
        )
    }

    /// Check every property key that would be spliced into query text.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if let Statement::CreateNode { properties, .. } = self {
            for key in properties.keys() {
                validate_property_key(key)?;
            }
        }
        Ok(())
    }

    pub fn cypher(&self) -> Result<CypherQuery, SchemaError> {
        self.validate()?;
        let mut params = Properties::new();
        let returns = self.result_column();
        let text = match self {
            Statement::MaxDbId => {
                "MATCH (n:DatabaseObject) RETURN max(n.dbId) AS maxDbId".to_string()
            }
            Statement::MatchByDbId { db_id } => {
                params.insert("dbId".to_string(), Value::Int(*db_id));
                "MATCH (n:DatabaseObject {dbId: $dbId}) RETURN n".to_string()
            }
            Statement::MatchByStableIds { label, stable_ids } => {
                params.insert("stableIds".to_string(), Value::from(stable_ids.clone()));
                format!(
                    "MATCH (n:DatabaseObject:{label}) WHERE n.{} IN $stableIds RETURN n",
                    keys::STABLE_ID
                )
            }
            Statement::MatchByNameMember { label, name } => {
                params.insert("name".to_string(), Value::from(name.as_str()));
                format!(
                    "MATCH (n:DatabaseObject:{label}) WHERE $name IN n.{} RETURN n",
                    keys::NAME
                )
            }
            Statement::CreateNode { labels, properties } => {
                let label_text = labels
                    .iter()
                    .map(|l| l.as_str())
                    .collect::<Vec<_>>()
                    .join(":");
                let assignments = properties
                    .keys()
                    .map(|k| format!("{k}: ${k}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                params.extend(properties.clone());
                format!("CREATE (n:{label_text} {{{assignments}}}) RETURN n")
            }
            Statement::CreateRelationship {
                from_db_id,
                to_db_id,
                rel_type,
                order,
                stoichiometry,
            } => {
                params.insert("fromDbId".to_string(), Value::Int(*from_db_id));
                params.insert("toDbId".to_string(), Value::Int(*to_db_id));
                params.insert(keys::ORDER.to_string(), Value::Int(*order));
                params.insert(keys::STOICHIOMETRY.to_string(), Value::Int(*stoichiometry));
                format!(
                    "MATCH (n1:DatabaseObject {{dbId: $fromDbId}}) \
                     MATCH (n2:DatabaseObject {{dbId: $toDbId}}) \
                     CREATE (n1)-[r:{rel_type} {{order: $order, stoichiometry: $stoichiometry}}]->(n2) \
                     RETURN count(r) AS created"
                )
            }
            Statement::CountReferrers {
                label,
                display_name,
                rel_type,
            } => {
                params.insert("displayName".to_string(), Value::from(display_name.as_str()));
                format!(
                    "MATCH (t:DatabaseObject:{label} {{displayName: $displayName}}) \
                     OPTIONAL MATCH (t)<-[:{rel_type}]-(s) \
                     RETURN t.dbId AS dbId, count(s) AS count"
                )
            }
        };
        Ok(CypherQuery {
            text,
            params,
            returns,
        })
    }

    pub fn result_column(&self) -> ResultColumn {
        match self {
            Statement::MaxDbId => ResultColumn::Scalar("maxDbId"),
            Statement::MatchByDbId { .. }
            | Statement::MatchByStableIds { .. }
            | Statement::MatchByNameMember { .. }
            | Statement::CreateNode { .. } => ResultColumn::Node("n"),
            Statement::CreateRelationship { .. } => ResultColumn::Scalar("created"),
            Statement::CountReferrers { .. } => ResultColumn::Scalar("count"),
        }
    }
}

/// One result row.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Node(NodeRef),
    Scalar(Value),
}

/// Rows plus write counters, as reported by the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub records: Vec<Record>,
    pub nodes_created: usize,
    pub relationships_created: usize,
}

impl QueryResult {
    pub fn nodes(&self) -> impl Iterator<Item = &NodeRef> {
        self.records.iter().filter_map(|r| match r {
            Record::Node(node) => Some(node),
            Record::Scalar(_) => None,
        })
    }

    pub fn into_nodes(self) -> Vec<NodeRef> {
        self.records
            .into_iter()
            .filter_map(|r| match r {
                Record::Node(node) => Some(node),
                Record::Scalar(_) => None,
            })
            .collect()
    }

    pub fn scalars(&self) -> impl Iterator<Item = &Value> {
        self.records.iter().filter_map(|r| match r {
            Record::Scalar(value) => Some(value),
            Record::Node(_) => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_node_text_has_no_values() {
        let mut props = Properties::new();
        props.insert("displayName".to_string(), Value::from("x'}) DETACH DELETE (m"));
        props.insert("dbId".to_string(), Value::Int(7));

        let stmt = Statement::create_node(&[Label::DatabaseIdentifier], props).unwrap();
        let query = stmt.cypher().unwrap();

        assert_eq!(
            query.text,
            "CREATE (n:DatabaseObject:DatabaseIdentifier {dbId: $dbId, displayName: $displayName}) RETURN n"
        );
        assert!(!query.text.contains("DETACH"));
        assert_eq!(query.params.get("dbId"), Some(&Value::Int(7)));
        assert_eq!(query.returns, ResultColumn::Node("n"));
    }

    #[test]
    fn test_create_node_dedups_generic_label() {
        let stmt = Statement::create_node(
            &[Label::DatabaseObject, Label::Pathway, Label::Pathway],
            Properties::new(),
        )
        .unwrap();
        let Statement::CreateNode { labels, .. } = stmt else {
            panic!("expected CreateNode");
        };
        assert_eq!(labels, vec![Label::DatabaseObject, Label::Pathway]);
    }

    #[test]
    fn test_create_node_rejects_bad_key() {
        let mut props = Properties::new();
        props.insert("bad key".to_string(), Value::Int(1));
        assert_eq!(
            Statement::create_node(&[Label::Pathway], props),
            Err(SchemaError::InvalidPropertyKey("bad key".to_string()))
        );
    }

    #[test]
    fn test_relationship_text() {
        let stmt = Statement::CreateRelationship {
            from_db_id: 1,
            to_db_id: 2,
            rel_type: RelationshipType::CrossReference,
            order: 3,
            stoichiometry: 1,
        };
        let query = stmt.cypher().unwrap();
        assert!(query
            .text
            .contains("CREATE (n1)-[r:crossReference {order: $order, stoichiometry: $stoichiometry}]->(n2)"));
        assert_eq!(query.params.get("order"), Some(&Value::Int(3)));
        assert_eq!(query.params.get("fromDbId"), Some(&Value::Int(1)));
        assert_eq!(query.returns, ResultColumn::Scalar("created"));
    }

    #[test]
    fn test_scalar_columns_are_named_in_text() {
        let statements = [
            Statement::MaxDbId,
            Statement::CountReferrers {
                label: Label::ReferenceDatabase,
                display_name: "BioModels Database".to_string(),
                rel_type: RelationshipType::ReferenceDatabase,
            },
        ];
        for statement in statements {
            let query = statement.cypher().unwrap();
            let ResultColumn::Scalar(column) = query.returns else {
                panic!("expected a scalar column for {statement:?}");
            };
            assert!(query.text.ends_with(&format!("AS {column}")), "{}", query.text);
        }
    }
}
