//! Applying operations.

use std::future::Future;
use std::sync::Mutex;

use crate::error::{Result, SchemaError};
use crate::operations::Operation;
use crate::schema::State;

/// Applies operations to a target, in the order given.
pub trait Migrator {
    /// Error raised by the target.
    type Error: std::error::Error;

    /// Applies `operations` in order, stopping at the first failure.
    fn apply(
        &self,
        operations: &[Operation],
    ) -> impl Future<Output = std::result::Result<(), Self::Error>> + Send;
}

/// Applies operations to an in-memory [`State`].
///
/// Used for dry runs: the resulting state is what the database will look
/// like once the same operations have been executed.
#[derive(Debug, Default)]
pub struct StateMigrator {
    state: Mutex<State>,
}

impl StateMigrator {
    /// Starts from `state`.
    #[must_use]
    pub const fn new(state: State) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    /// Returns the resulting state.
    ///
    /// # Errors
    ///
    /// Fails if a previous `apply` panicked while holding the state.
    pub fn into_state(self) -> Result<State> {
        self.state
            .into_inner()
            .map_err(|_| SchemaError::InvalidState("state lock poisoned".to_string()))
    }
}

impl Migrator for StateMigrator {
    type Error = SchemaError;

    async fn apply(&self, operations: &[Operation]) -> Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| SchemaError::InvalidState("state lock poisoned".to_string()))?;
        for op in operations {
            state.apply(op)?;
        }
        Ok(())
    }
}
