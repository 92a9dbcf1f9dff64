//! Post-release sanity check: the number of identifiers linked to the
//! BioModels reference database must not shrink between releases.

use crate::error::{ImportError, Result};
use biomodels_graph::{GraphStore, GraphTransaction, Label, RelationshipType, Statement, Value};
use serde::Serialize;

/// Number of nodes pointing at the reference database named `display_name`
/// through `referenceDatabase`, or `None` if there is no such database.
pub fn cross_reference_count<S: GraphStore>(store: &S, display_name: &str) -> Result<Option<i64>> {
    let mut tx = store.begin().map_err(ImportError::Transaction)?;
    let result = tx.run(&Statement::CountReferrers {
        label: Label::ReferenceDatabase,
        display_name: display_name.to_string(),
        rel_type: RelationshipType::ReferenceDatabase,
    });
    tx.rollback().map_err(ImportError::Transaction)?;

    let result = result.map_err(ImportError::read(format!(
        "count cross references of {display_name:?}"
    )))?;
    let mut counts = result.scalars().filter_map(Value::as_int).peekable();
    if counts.peek().is_none() {
        return Ok(None);
    }
    Ok(Some(counts.sum()))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Verification {
    Passed { current: i64, previous: i64 },
    MissingReferenceDatabase,
    CountDecreased { current: i64, previous: i64 },
}

impl Verification {
    pub fn is_ok(&self) -> bool {
        matches!(self, Verification::Passed { .. })
    }
}

impl std::fmt::Display for Verification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verification::Passed { current, previous } => write!(
                f,
                "proper count for BioModels: current ({current}); previous ({previous})"
            ),
            Verification::MissingReferenceDatabase => write!(
                f,
                "unable to find BioModels Database reference database for current release"
            ),
            Verification::CountDecreased { current, previous } => write!(
                f,
                "current BioModels cross reference count ({current}) is lower than the previous release's count ({previous})"
            ),
        }
    }
}

/// Compare the cross-reference counts of two releases. A previous release
/// without the reference database counts as zero.
pub fn verify_release<C: GraphStore, P: GraphStore>(
    current: &C,
    previous: &P,
    display_name: &str,
) -> Result<Verification> {
    let Some(current) = cross_reference_count(current, display_name)? else {
        return Ok(Verification::MissingReferenceDatabase);
    };
    let previous = cross_reference_count(previous, display_name)?.unwrap_or(0);
    tracing::info!(current, previous, "BioModels cross reference counts");

    if current < previous {
        Ok(Verification::CountDecreased { current, previous })
    } else {
        Ok(Verification::Passed { current, previous })
    }
}
