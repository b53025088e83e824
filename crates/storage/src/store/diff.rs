#![forbid(unsafe_code)]

use super::*;
use std::collections::BTreeMap;

impl SqliteStore {
    /// Whether the two revisions attach different table versions.
    pub fn has_table_diffs(
        &self,
        from_revision_id: &str,
        to_revision_id: &str,
    ) -> Result<bool, StoreError> {
        require_revision_tx(&self.conn, from_revision_id)?;
        require_revision_tx(&self.conn, to_revision_id)?;
        has_table_diffs_tx(&self.conn, from_revision_id, to_revision_id)
    }

    /// Whether one logical table holds different row versions in the two
    /// revisions.
    pub fn has_row_diffs(
        &self,
        table_created_id: &str,
        from_revision_id: &str,
        to_revision_id: &str,
    ) -> Result<bool, StoreError> {
        require_revision_tx(&self.conn, from_revision_id)?;
        require_revision_tx(&self.conn, to_revision_id)?;
        has_row_diffs_tx(&self.conn, table_created_id, from_revision_id, to_revision_id)
    }

    /// Per-table summary of what changed from one revision to another,
    /// system tables included.
    pub fn get_revision_changes(
        &self,
        from_revision_id: &str,
        to_revision_id: &str,
    ) -> Result<RevisionChanges, StoreError> {
        require_revision_tx(&self.conn, from_revision_id)?;
        require_revision_tx(&self.conn, to_revision_id)?;

        let mut from = list_tables_tx(&self.conn, from_revision_id, true)?
            .into_iter()
            .map(|table| (table.created_id.clone(), table))
            .collect::<BTreeMap<_, _>>();
        let mut tables = Vec::new();

        for to in list_tables_tx(&self.conn, to_revision_id, true)? {
            let previous = from.remove(&to.created_id);
            let rows_changed = count_row_diffs_tx(
                &self.conn,
                previous.as_ref().map(|table| table.version_id.as_str()),
                Some(to.version_id.as_str()),
            )?;
            let (kind, previous_table_id) = match previous {
                None => (TableChangeKind::Added, None),
                Some(previous) if previous.id != to.id => {
                    (TableChangeKind::Renamed, Some(previous.id))
                }
                Some(previous) if previous.version_id != to.version_id && rows_changed > 0 => {
                    (TableChangeKind::Modified, None)
                }
                Some(_) => continue,
            };
            tables.push(TableChange {
                created_id: to.created_id,
                table_id: to.id,
                previous_table_id,
                kind,
                rows_changed,
            });
        }

        for (created_id, removed) in from {
            let rows_changed = count_row_diffs_tx(&self.conn, Some(removed.version_id.as_str()), None)?;
            tables.push(TableChange {
                created_id,
                table_id: removed.id,
                previous_table_id: None,
                kind: TableChangeKind::Removed,
                rows_changed,
            });
        }

        Ok(RevisionChanges {
            from_revision_id: from_revision_id.to_string(),
            to_revision_id: to_revision_id.to_string(),
            tables,
        })
    }
}
