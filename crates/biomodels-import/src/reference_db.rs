//! Find-or-create for the BioModels reference database node.

use crate::error::{ImportError, Result};
use crate::mutator::GraphMutator;
use biomodels_graph::{keys, GraphTransaction, Label, NodeRef, Properties, RelationshipType, Value};

/// Placeholder substituted with a model id by downstream tooling.
pub const ACCESS_URL_PLACEHOLDER: &str = "###ID###";

/// Fixed attributes of the reference database this importer links to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceDatabaseDefinition {
    pub display_name: String,
    pub names: Vec<String>,
    /// Member of `names` an existing node is looked up by.
    pub lookup_name: String,
    pub access_url: String,
    pub url: String,
}

impl ReferenceDatabaseDefinition {
    pub fn biomodels() -> Self {
        Self {
            display_name: "BioModels Database".to_string(),
            names: vec!["BioModels Database".to_string(), "BioModels".to_string()],
            lookup_name: "BioModels".to_string(),
            access_url: format!("https://www.ebi.ac.uk/biomodels/{ACCESS_URL_PLACEHOLDER}"),
            url: "https://www.ebi.ac.uk/biomodels/".to_string(),
        }
    }

    fn properties(&self) -> Properties {
        let mut props = Properties::new();
        props.insert(keys::ACCESS_URL.to_string(), Value::from(self.access_url.as_str()));
        props.insert(keys::DISPLAY_NAME.to_string(), Value::from(self.display_name.as_str()));
        props.insert(keys::NAME.to_string(), Value::from(self.names.clone()));
        props.insert(
            keys::SCHEMA_CLASS.to_string(),
            Value::from(Label::ReferenceDatabase.as_str()),
        );
        props.insert(keys::URL.to_string(), Value::from(self.url.as_str()));
        props
    }
}

impl Default for ReferenceDatabaseDefinition {
    fn default() -> Self {
        Self::biomodels()
    }
}

/// The node the run links identifiers to.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedReferenceDatabase {
    pub node: NodeRef,
    /// False when an existing node was reused.
    pub created: bool,
}

/// Reuse the existing reference database if there is one, otherwise create it
/// and record `instance_edit` as its creator.
///
/// An existing node is returned untouched even if its attributes differ from
/// `definition`.
pub fn resolve_reference_database<T: GraphTransaction>(
    mutator: &mut GraphMutator<'_, T>,
    definition: &ReferenceDatabaseDefinition,
    instance_edit: &NodeRef,
) -> Result<ResolvedReferenceDatabase> {
    tracing::info!(name = %definition.lookup_name, "looking up existing reference database");
    let mut existing = mutator.find_by_name(Label::ReferenceDatabase, &definition.lookup_name)?;
    match existing.len() {
        0 => {}
        1 => {
            let node = existing.remove(0);
            tracing::info!(db_id = ?node.db_id(), "reusing existing reference database");
            return Ok(ResolvedReferenceDatabase {
                node,
                created: false,
            });
        }
        matches => {
            return Err(ImportError::NotFound {
                what: format!("reference database named {:?}", definition.lookup_name),
                matches,
            })
        }
    }

    tracing::info!("no existing reference database found, creating one");
    let node = mutator.create_node(&[Label::ReferenceDatabase], definition.properties())?;
    mutator.create_relationship(instance_edit, &node, RelationshipType::Created, 0, 1)?;
    tracing::info!(db_id = ?node.db_id(), "created reference database");
    Ok(ResolvedReferenceDatabase {
        node,
        created: true,
    })
}
