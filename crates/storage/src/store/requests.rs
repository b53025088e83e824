#![forbid(unsafe_code)]

use super::WriteOrigin;
use serde_json::Value;
use tg_core::{JsonPatch, Migration, RowPatch};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateProjectRequest {
    pub organization_id: String,
    pub project_name: String,
    /// Root branch name; `master` when absent.
    pub branch_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateBranchRequest {
    /// A sealed (non-draft) revision to fork from.
    pub revision_id: String,
    pub branch_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeleteBranchRequest {
    pub branch_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateRevisionRequest {
    /// The draft revision to commit.
    pub revision_id: String,
    pub comment: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RevertChangesRequest {
    pub revision_id: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CreateTableRequest {
    pub revision_id: String,
    pub table_id: String,
    pub schema: Value,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UpdateTableRequest {
    pub revision_id: String,
    pub table_id: String,
    pub patches: Vec<JsonPatch>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenameTableRequest {
    pub revision_id: String,
    pub table_id: String,
    pub next_table_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoveTableRequest {
    pub revision_id: String,
    pub table_id: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewRow {
    pub row_id: String,
    pub data: Value,
    pub meta: Option<Value>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CreateRowRequest {
    pub revision_id: String,
    pub table_id: String,
    pub row_id: String,
    pub data: Value,
    pub meta: Option<Value>,
    pub origin: WriteOrigin,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CreateRowsRequest {
    pub revision_id: String,
    pub table_id: String,
    pub rows: Vec<NewRow>,
    pub origin: WriteOrigin,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RowData {
    pub row_id: String,
    pub data: Value,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UpdateRowRequest {
    pub revision_id: String,
    pub table_id: String,
    pub row_id: String,
    pub data: Value,
    pub origin: WriteOrigin,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UpdateRowsRequest {
    pub revision_id: String,
    pub table_id: String,
    pub rows: Vec<RowData>,
    pub origin: WriteOrigin,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RowPatches {
    pub row_id: String,
    pub patches: Vec<RowPatch>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PatchRowsRequest {
    pub revision_id: String,
    pub table_id: String,
    pub rows: Vec<RowPatches>,
    pub origin: WriteOrigin,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenameRowRequest {
    pub revision_id: String,
    pub table_id: String,
    pub row_id: String,
    pub next_row_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoveRowRequest {
    pub revision_id: String,
    pub table_id: String,
    pub row_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoveRowsRequest {
    pub revision_id: String,
    pub table_id: String,
    pub row_ids: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SetViewsRequest {
    pub revision_id: String,
    pub table_id: String,
    pub views: Value,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SetSharedSchemaRequest {
    pub revision_id: String,
    pub name: String,
    pub schema: Value,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateInitMigrationRequest {
    pub revision_id: String,
    pub table_id: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CreateUpdateMigrationRequest {
    pub revision_id: String,
    pub table_id: String,
    pub patches: Vec<JsonPatch>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateRenameMigrationRequest {
    pub revision_id: String,
    pub table_id: String,
    pub next_table_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateRemoveMigrationRequest {
    pub revision_id: String,
    pub table_id: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ApplyMigrationsRequest {
    pub revision_id: String,
    pub migrations: Vec<Migration>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    /// Substring match on string values.
    Contains,
}

/// Compares the value at a data path (`a.b[0]`) of every row.
#[derive(Clone, Debug, PartialEq)]
pub struct RowFilter {
    pub path: String,
    pub op: FilterOp,
    pub value: Value,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OrderField {
    Id,
    CreatedAt,
    UpdatedAt,
    /// A data path inside the row document.
    Data(String),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RowOrder {
    pub field: OrderField,
    pub direction: SortDirection,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct GetRowsRequest {
    pub revision_id: String,
    pub table_id: String,
    pub first: Option<usize>,
    pub after: Option<String>,
    pub filters: Vec<RowFilter>,
    /// Defaults to creation order.
    pub order_by: Vec<RowOrder>,
}
