//! Instance edit (audit node) creation.

use crate::error::Result;
use crate::mutator::{require_str, GraphMutator};
use biomodels_graph::{keys, GraphTransaction, Label, NodeRef, Properties, RelationshipType, Value};
use chrono::NaiveDateTime;

pub const DEFAULT_NOTE: &str = "BioModels reference database creation";

const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Who is making this run's edits, and when.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceEditRequest {
    pub person_db_id: i64,
    pub note: String,
    pub timestamp: NaiveDateTime,
}

impl InstanceEditRequest {
    pub fn new(person_db_id: i64, timestamp: NaiveDateTime) -> Self {
        Self {
            person_db_id,
            note: DEFAULT_NOTE.to_string(),
            timestamp,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    /// `"<surname>, <firstname>, <date>"`
    pub fn display_name(&self, surname: &str, firstname: &str) -> String {
        format!(
            "{surname}, {firstname}, {}",
            self.timestamp.format(DATE_FORMAT)
        )
    }
}

/// Create the run's instance edit and link the acting person to it as author.
pub fn create_instance_edit<T: GraphTransaction>(
    mutator: &mut GraphMutator<'_, T>,
    edit: &InstanceEditRequest,
) -> Result<NodeRef> {
    tracing::info!(person_db_id = edit.person_db_id, "creating new instance edit");
    let person = mutator.get_node_by_db_id(edit.person_db_id)?;
    let display_name = edit.display_name(
        require_str(&person, keys::SURNAME)?,
        require_str(&person, keys::FIRSTNAME)?,
    );

    let mut props = Properties::new();
    props.insert(
        keys::DATE_TIME.to_string(),
        Value::from(edit.timestamp.format(DATE_TIME_FORMAT).to_string()),
    );
    props.insert(keys::DISPLAY_NAME.to_string(), Value::from(display_name));
    props.insert(keys::NOTE.to_string(), Value::from(edit.note.as_str()));
    props.insert(
        keys::SCHEMA_CLASS.to_string(),
        Value::from(Label::InstanceEdit.as_str()),
    );

    let instance_edit = mutator.create_node(&[Label::InstanceEdit], props)?;
    mutator.create_relationship(&person, &instance_edit, RelationshipType::Author, 0, 1)?;
    tracing::info!(
        db_id = ?instance_edit.db_id(),
        person_db_id = edit.person_db_id,
        "created instance edit"
    );
    Ok(instance_edit)
}
