#![forbid(unsafe_code)]

use super::super::*;
use rusqlite::{OptionalExtension, params};

impl SqliteStore {
    /// Forks a new branch from a sealed revision. The start revision shares
    /// the base revision's table versions and points at it through
    /// `parent_id`.
    pub fn create_branch(
        &mut self,
        request: CreateBranchRequest,
    ) -> Result<BranchCreated, StoreError> {
        let branch_name = require_non_empty(&request.branch_name, "branch_name must not be empty")?;

        let created = self.transact("create_branch", |tx| {
            let base = require_revision_tx(tx, &request.revision_id)?;
            if base.is_draft {
                return Err(StoreError::InvalidInput(
                    "branches can only be created from a committed revision",
                ));
            }
            let base_branch = require_branch_tx(tx, &base.branch_id)?;

            let now_ms = now_ms();
            let branch = insert_branch_tx(tx, &base_branch.project_id, &branch_name, false, now_ms)?;
            let start_revision = insert_revision_tx(
                tx,
                NewRevision {
                    branch_id: &branch.id,
                    parent_id: Some(&base.id),
                    slot: RevisionSlot::Start,
                    comment: None,
                    created_at_ms: now_ms,
                },
            )?;
            copy_revision_tables_tx(tx, &base.id, &start_revision.id)?;
            let draft_revision = insert_revision_tx(
                tx,
                NewRevision {
                    branch_id: &branch.id,
                    parent_id: Some(&start_revision.id),
                    slot: RevisionSlot::Draft,
                    comment: None,
                    created_at_ms: now_ms,
                },
            )?;
            copy_revision_tables_tx(tx, &start_revision.id, &draft_revision.id)?;

            Ok(BranchCreated {
                branch,
                start_revision,
                draft_revision,
            })
        })?;

        tracing::info!(
            branch_id = %created.branch.id,
            name = %created.branch.name,
            from_revision = %request.revision_id,
            "branch created"
        );
        Ok(created)
    }

    /// Deletes a non-root branch nobody has forked from. Versions shared with
    /// other branches stay; versions only its revisions reached are deleted.
    pub fn delete_branch(&mut self, request: DeleteBranchRequest) -> Result<(), StoreError> {
        self.transact("delete_branch", |tx| {
            let branch = require_branch_tx(tx, &request.branch_id)?;
            if branch.is_root {
                return Err(StoreError::CannotDeleteRootBranch);
            }

            let has_dependents = tx
                .query_row(
                    "SELECT 1 FROM revisions r \
                     WHERE r.branch_id <> ?1 \
                       AND r.parent_id IN (SELECT id FROM revisions WHERE branch_id=?1) \
                     LIMIT 1",
                    params![branch.id],
                    |_row| Ok(true),
                )
                .optional()?
                .unwrap_or(false);
            if has_dependents {
                return Err(StoreError::BranchHasDependents(branch.name));
            }

            if let Some(draft) = branch_revision_tx(tx, &branch.id, RevisionSlot::Draft)? {
                discard_draft_versions_tx(tx, &draft.id)?;
            }
            tx.execute("DELETE FROM branches WHERE id=?1", params![branch.id])?;
            let (tables, rows) = sweep_unattached_versions_tx(tx)?;
            tracing::debug!(
                branch_id = %branch.id,
                table_versions = tables,
                row_versions = rows,
                "unreachable versions swept"
            );
            Ok(())
        })?;

        tracing::info!(branch_id = %request.branch_id, "branch deleted");
        Ok(())
    }

    pub fn get_branch(&self, branch_id: &str) -> Result<BranchInfo, StoreError> {
        require_branch_tx(&self.conn, branch_id)
    }

    pub fn get_touched(&self, branch_id: &str) -> Result<bool, StoreError> {
        Ok(require_branch_tx(&self.conn, branch_id)?.touched)
    }

    /// The branch and revision `branch_id` was forked from; `None` for a
    /// root branch.
    pub fn resolve_parent_branch(
        &self,
        branch_id: &str,
    ) -> Result<Option<ParentBranch>, StoreError> {
        require_branch_tx(&self.conn, branch_id)?;
        let start = require_branch_revision_tx(&self.conn, branch_id, RevisionSlot::Start)?;
        let Some(parent_id) = start.parent_id else {
            return Ok(None);
        };
        let revision = require_revision_tx(&self.conn, &parent_id)?;
        let branch = require_branch_tx(&self.conn, &revision.branch_id)?;
        Ok(Some(ParentBranch { branch, revision }))
    }
}
