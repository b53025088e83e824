#![forbid(unsafe_code)]

use serde::Serialize;

/// Why a row was written. Restores replay published data and must not
/// trigger derived-artifact recomputation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteOrigin {
    #[default]
    User,
    Restore,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RowEventKind {
    Created,
    Updated,
    Renamed,
    Deleted,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RowEvent {
    pub kind: RowEventKind,
    pub revision_id: String,
    pub table_id: String,
    pub row_id: String,
    /// Old row id for renames.
    pub previous_row_id: Option<String>,
    pub origin: WriteOrigin,
}

/// Asks observers to recompute derived artifacts of a revision.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EndpointEvent {
    pub revision_id: String,
    pub origin: WriteOrigin,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MutationEvent {
    Row(RowEvent),
    Endpoint(EndpointEvent),
}
