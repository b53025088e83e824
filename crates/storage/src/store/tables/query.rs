#![forbid(unsafe_code)]

use super::super::*;

impl SqliteStore {
    pub fn find_table(
        &self,
        revision_id: &str,
        table_id: &str,
    ) -> Result<Option<TableInfo>, StoreError> {
        require_revision_tx(&self.conn, revision_id)?;
        find_table_tx(&self.conn, revision_id, table_id)
    }

    pub fn get_table(&self, revision_id: &str, table_id: &str) -> Result<TableInfo, StoreError> {
        require_revision_tx(&self.conn, revision_id)?;
        require_table_tx(&self.conn, revision_id, table_id)
    }

    /// Tables of a revision in creation order; system tables only on request.
    pub fn get_tables(
        &self,
        revision_id: &str,
        include_system: bool,
    ) -> Result<Vec<TableInfo>, StoreError> {
        require_revision_tx(&self.conn, revision_id)?;
        list_tables_tx(&self.conn, revision_id, include_system)
    }

    pub fn get_table_schema(
        &self,
        revision_id: &str,
        table_id: &str,
    ) -> Result<TableSchema, StoreError> {
        require_revision_tx(&self.conn, revision_id)?;
        let table = require_table_tx(&self.conn, revision_id, table_id)?;
        if table.system {
            return Ok(TableSchema {
                schema: serde_json::json!({ "systemTable": table.id }),
                hash: system_schema_hash(&table.id),
                table_id: table.id,
            });
        }
        require_table_schema_tx(&self.conn, revision_id, &table.id)
    }
}
