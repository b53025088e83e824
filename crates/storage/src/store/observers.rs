#![forbid(unsafe_code)]

use super::{EndpointEvent, RowEvent};

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct ObserverError(pub String);

/// Receives mutation events after their transaction has committed.
///
/// Failures are logged by the store and never roll anything back.
pub trait MutationObserver: Send {
    fn name(&self) -> &str {
        "observer"
    }

    fn on_row(&self, event: &RowEvent) -> Result<(), ObserverError>;

    fn on_endpoint(&self, _event: &EndpointEvent) -> Result<(), ObserverError> {
        Ok(())
    }
}
