//! BioModels cross-reference import.
//!
//! Links pathway nodes in the release graph to `DatabaseIdentifier` nodes for
//! the BioModels models that describe them, inside a single write transaction:
//!
//! - `allocator`: dbId allocation (`max(dbId) + 1`)
//! - `mutator`: node / relationship creation and lookups
//! - `audit`: the run's instance edit
//! - `reference_db`: find-or-create for the BioModels reference database
//! - `registry`: one identifier node per model id per run
//! - `orchestrator`: the run itself
//! - `verifier`: release-over-release count check

pub mod allocator;
pub mod audit;
pub mod error;
pub mod mutator;
pub mod orchestrator;
pub mod reference_db;
pub mod registry;
pub mod verifier;

use std::collections::BTreeMap;

pub use allocator::DbIdAllocator;
pub use audit::{create_instance_edit, InstanceEditRequest, DEFAULT_NOTE};
pub use error::{ImportError, ImportPhase, Result};
pub use mutator::{GraphMutator, MutationLog};
pub use orchestrator::{run_import, ImportReport, ImportRequest};
pub use reference_db::{
    resolve_reference_database, ReferenceDatabaseDefinition, ResolvedReferenceDatabase,
    ACCESS_URL_PLACEHOLDER,
};
pub use registry::IdentifierRegistry;
pub use verifier::{cross_reference_count, verify_release, Verification};

/// Pathway stable id -> model ids.
///
/// Pathways are processed in stable id order. A pathway's model ids are linked
/// in list order, which becomes the `crossReference` order; a repeated id is
/// linked once, at its first position.
pub type PathwayModels = BTreeMap<String, Vec<String>>;
