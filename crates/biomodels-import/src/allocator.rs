//! dbId allocation.
//!
//! The release graph has no server-side sequence, so new nodes take
//! `max(dbId) + 1`. The maximum is read once per run; every node the run
//! creates goes through `next()` exactly once. This is only sound with a
//! single writer, which the store enforces by refusing a second transaction.

use crate::error::{ImportError, Result};
use biomodels_graph::{GraphTransaction, Statement, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbIdAllocator {
    current_max: i64,
}

impl DbIdAllocator {
    pub fn starting_after(current_max: i64) -> Self {
        Self { current_max }
    }

    /// Read the store's current maximum dbId. An empty store starts at 0.
    pub fn from_transaction<T: GraphTransaction>(tx: &mut T) -> Result<Self> {
        let result = tx
            .run(&Statement::MaxDbId)
            .map_err(ImportError::read("query the maximum dbId"))?;
        let current_max = match result.scalars().next() {
            Some(Value::Int(max)) => *max,
            Some(Value::Null) | None => 0,
            Some(other) => {
                return Err(ImportError::Configuration(format!(
                    "maximum dbId is not an integer: {other}"
                )))
            }
        };
        tracing::info!(max_db_id = current_max, "fetched maximum dbId");
        Ok(Self::starting_after(current_max))
    }

    pub fn current_max(&self) -> i64 {
        self.current_max
    }

    /// Hand out the next free dbId.
    pub fn next(&mut self) -> i64 {
        self.current_max += 1;
        self.current_max
    }
}
