use biomodels_graph::{RelationshipType, StoreError};
use serde::Serialize;
use std::fmt;

/// Where in the run a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportPhase {
    Init,
    ResolveReferenceDatabase,
    ResolvePathways,
    LinkPathways,
    Commit,
}

impl fmt::Display for ImportPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImportPhase::Init => "initialisation",
            ImportPhase::ResolveReferenceDatabase => "reference database resolution",
            ImportPhase::ResolvePathways => "pathway resolution",
            ImportPhase::LinkPathways => "pathway linking",
            ImportPhase::Commit => "commit",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Zero or several nodes where exactly one was expected.
    #[error("expected exactly one {what}, found {matches}")]
    NotFound { what: String, matches: usize },

    #[error("failed to {action}")]
    GraphWrite {
        action: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to {action}")]
    GraphRead {
        action: String,
        #[source]
        source: StoreError,
    },

    /// A relationship statement matched no endpoint pair.
    #[error("no {rel_type} relationship created: dbId {from_db_id} or dbId {to_db_id} not found")]
    EndpointNotFound {
        rel_type: RelationshipType,
        from_db_id: i64,
        to_db_id: i64,
    },

    #[error("{node} has no `{property}` property")]
    MissingProperty {
        node: String,
        property: &'static str,
    },

    #[error("unable to create BioModels database identifier for {identifier}")]
    Identifier {
        identifier: String,
        #[source]
        source: Box<ImportError>,
    },

    #[error("unable to update pathway {pathway} with BioModels ids {identifiers:?}")]
    Pathway {
        pathway: String,
        identifiers: Vec<String>,
        #[source]
        source: Box<ImportError>,
    },

    /// Terminal state: nothing was committed.
    #[error("BioModels insertion aborted during {phase}")]
    Aborted {
        phase: ImportPhase,
        #[source]
        source: Box<ImportError>,
    },

    #[error("transaction error")]
    Transaction(#[source] StoreError),
}

impl ImportError {
    pub(crate) fn write(action: impl Into<String>) -> impl FnOnce(StoreError) -> ImportError {
        let action = action.into();
        move |source| ImportError::GraphWrite { action, source }
    }

    pub(crate) fn read(action: impl Into<String>) -> impl FnOnce(StoreError) -> ImportError {
        let action = action.into();
        move |source| ImportError::GraphRead { action, source }
    }

    pub(crate) fn in_phase(self, phase: ImportPhase) -> ImportError {
        ImportError::Aborted {
            phase,
            source: Box::new(self),
        }
    }

    /// Phase the run was aborted in, if this is a terminal error.
    pub fn phase(&self) -> Option<ImportPhase> {
        match self {
            ImportError::Aborted { phase, .. } => Some(*phase),
            _ => None,
        }
    }

    /// Render the full `source()` chain on one line for operators.
    pub fn chain(&self) -> String {
        let mut out = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(err) = source {
            out.push_str(": ");
            out.push_str(&err.to_string());
            source = err.source();
        }
        out
    }
}

pub type Result<T, E = ImportError> = std::result::Result<T, E>;
