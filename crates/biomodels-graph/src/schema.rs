//! Structural vocabulary of the knowledge graph.
//!
//! Labels and relationship types are the only parts of a statement that end
//! up in query *text*; everything else is a bound parameter. Both are closed
//! enums, so an unknown label can never reach a statement. Strings coming
//! from snapshots or callers are parsed through `FromStr`, which is the
//! allow-list check.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Property keys used by the release tooling.
pub mod keys {
    pub const DB_ID: &str = "dbId";
    pub const STABLE_ID: &str = "stId";
    pub const DISPLAY_NAME: &str = "displayName";
    pub const SCHEMA_CLASS: &str = "schemaClass";
    pub const DATABASE_NAME: &str = "databaseName";
    pub const NAME: &str = "name";
    pub const URL: &str = "url";
    pub const ACCESS_URL: &str = "accessUrl";
    pub const IDENTIFIER: &str = "identifier";
    pub const DATE_TIME: &str = "dateTime";
    pub const NOTE: &str = "note";
    pub const SURNAME: &str = "surname";
    pub const FIRSTNAME: &str = "firstname";
    pub const ORDER: &str = "order";
    pub const STOICHIOMETRY: &str = "stoichiometry";
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("unknown node label `{0}`")]
    UnknownLabel(String),
    #[error("unknown relationship type `{0}`")]
    UnknownRelationshipType(String),
    #[error("invalid property key `{0}`")]
    InvalidPropertyKey(String),
}

/// Node labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Label {
    /// Generic label carried by every persisted object.
    DatabaseObject,
    ReferenceDatabase,
    DatabaseIdentifier,
    InstanceEdit,
    Pathway,
    Person,
}

impl Label {
    pub const ALL: [Label; 6] = [
        Label::DatabaseObject,
        Label::ReferenceDatabase,
        Label::DatabaseIdentifier,
        Label::InstanceEdit,
        Label::Pathway,
        Label::Person,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Label::DatabaseObject => "DatabaseObject",
            Label::ReferenceDatabase => "ReferenceDatabase",
            Label::DatabaseIdentifier => "DatabaseIdentifier",
            Label::InstanceEdit => "InstanceEdit",
            Label::Pathway => "Pathway",
            Label::Person => "Person",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Label {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Label::ALL
            .into_iter()
            .find(|label| label.as_str() == s)
            .ok_or_else(|| SchemaError::UnknownLabel(s.to_string()))
    }
}

impl TryFrom<String> for Label {
    type Error = SchemaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Label> for String {
    fn from(value: Label) -> Self {
        value.as_str().to_string()
    }
}

/// Relationship (edge) types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RelationshipType {
    /// instance edit -> node it created
    Created,
    /// instance edit -> node it modified
    Modified,
    /// person -> instance edit
    Author,
    /// database identifier -> reference database
    ReferenceDatabase,
    /// pathway -> database identifier
    CrossReference,
}

impl RelationshipType {
    pub const ALL: [RelationshipType; 5] = [
        RelationshipType::Created,
        RelationshipType::Modified,
        RelationshipType::Author,
        RelationshipType::ReferenceDatabase,
        RelationshipType::CrossReference,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RelationshipType::Created => "created",
            RelationshipType::Modified => "modified",
            RelationshipType::Author => "author",
            RelationshipType::ReferenceDatabase => "referenceDatabase",
            RelationshipType::CrossReference => "crossReference",
        }
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationshipType {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RelationshipType::ALL
            .into_iter()
            .find(|rel_type| rel_type.as_str() == s)
            .ok_or_else(|| SchemaError::UnknownRelationshipType(s.to_string()))
    }
}

impl TryFrom<String> for RelationshipType {
    type Error = SchemaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RelationshipType> for String {
    fn from(value: RelationshipType) -> Self {
        value.as_str().to_string()
    }
}

/// Check that a property key is safe to splice into statement text
/// (`{key: $key}`): an ASCII identifier.
pub fn validate_property_key(key: &str) -> Result<(), SchemaError> {
    let mut chars = key.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(SchemaError::InvalidPropertyKey(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_allow_list() {
        for label in Label::ALL {
            assert_eq!(label.as_str().parse::<Label>(), Ok(label));
        }
        assert_eq!(
            "Pathway) DETACH DELETE (n".parse::<Label>(),
            Err(SchemaError::UnknownLabel("Pathway) DETACH DELETE (n".to_string()))
        );
    }

    #[test]
    fn test_relationship_type_allow_list() {
        assert_eq!(
            "crossReference".parse::<RelationshipType>(),
            Ok(RelationshipType::CrossReference)
        );
        assert!("CrossReference".parse::<RelationshipType>().is_err());
    }

    #[test]
    fn test_property_keys() {
        assert!(validate_property_key("dbId").is_ok());
        assert!(validate_property_key("_private1").is_ok());
        assert!(validate_property_key("").is_err());
        assert!(validate_property_key("1st").is_err());
        assert!(validate_property_key("a: 1}) MATCH (m").is_err());
    }

    #[test]
    fn test_label_serde_goes_through_allow_list() {
        let json = serde_json::to_string(&vec![Label::DatabaseObject, Label::Pathway]).unwrap();
        assert_eq!(json, r#"["DatabaseObject","Pathway"]"#);
        assert!(serde_json::from_str::<Vec<Label>>(r#"["Reaction"]"#).is_err());
    }
}
