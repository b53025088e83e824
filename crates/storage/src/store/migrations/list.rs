#![forbid(unsafe_code)]

use super::super::*;
use tg_core::Migration;
use tg_core::migration::flatten_histories;

impl SqliteStore {
    /// Every migration recorded in a revision as one date-sorted sequence.
    ///
    /// Migrations are grouped per table in order of first appearance and
    /// merged with a stable sort, so equal timestamps keep that order.
    pub fn get_migrations(&self, revision_id: &str) -> Result<Vec<Migration>, StoreError> {
        require_revision_tx(&self.conn, revision_id)?;
        let mut histories: Vec<(String, Vec<Migration>)> = Vec::new();
        for migration in recorded_migrations_tx(&self.conn, revision_id)? {
            match histories
                .iter_mut()
                .find(|(table_id, _)| table_id == migration.table_id())
            {
                Some((_, history)) => history.push(migration),
                None => histories.push((migration.table_id().to_string(), vec![migration])),
            }
        }
        Ok(flatten_histories(
            histories.into_iter().map(|(_, history)| history).collect(),
        ))
    }

    /// History of one table id, renames into and out of it included.
    pub fn get_table_migrations(
        &self,
        revision_id: &str,
        table_id: &str,
    ) -> Result<Vec<Migration>, StoreError> {
        require_revision_tx(&self.conn, revision_id)?;
        let mut migrations = recorded_migrations_tx(&self.conn, revision_id)?;
        migrations.retain(|migration| migration.touches(table_id));
        Ok(migrations)
    }
}
