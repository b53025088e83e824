#![forbid(unsafe_code)]

use super::super::*;
use rusqlite::params;

impl SqliteStore {
    /// Commits a draft: its versions are sealed readonly, it becomes the new
    /// head, and a fresh draft sharing its table versions takes its place.
    pub fn create_revision(
        &mut self,
        request: CreateRevisionRequest,
    ) -> Result<CommitResult, StoreError> {
        let comment = request
            .comment
            .as_deref()
            .map(str::trim)
            .filter(|comment| !comment.is_empty());

        let result = self.transact("create_revision", |tx| {
            let draft = resolve_draft_revision_tx(tx, &request.revision_id)?;
            if !refresh_draft_state_tx(tx, &draft)? {
                return Err(StoreError::NoChanges);
            }

            tx.execute(
                "UPDATE tables SET readonly=1 \
                 WHERE readonly=0 AND version_id IN \
                   (SELECT table_version_id FROM revision_tables WHERE revision_id=?1)",
                params![draft.revision_id],
            )?;
            tx.execute(
                "UPDATE rows SET readonly=1 \
                 WHERE readonly=0 AND version_id IN ( \
                   SELECT tr.row_version_id FROM table_rows tr \
                   JOIN revision_tables rt ON rt.table_version_id = tr.table_version_id \
                   WHERE rt.revision_id=?1)",
                params![draft.revision_id],
            )?;

            tx.execute(
                "UPDATE revisions SET is_head=0 WHERE id=?1",
                params![draft.head_revision_id],
            )?;
            tx.execute(
                "UPDATE revisions SET is_draft=0, is_head=1, comment=?2 WHERE id=?1",
                params![draft.revision_id, comment],
            )?;

            let next_draft = insert_revision_tx(
                tx,
                NewRevision {
                    branch_id: &draft.branch_id,
                    parent_id: Some(&draft.revision_id),
                    slot: RevisionSlot::Draft,
                    comment: None,
                    created_at_ms: now_ms(),
                },
            )?;
            copy_revision_tables_tx(tx, &draft.revision_id, &next_draft.id)?;
            tx.execute(
                "UPDATE branches SET touched=0 WHERE id=?1",
                params![draft.branch_id],
            )?;

            Ok(CommitResult {
                head: require_revision_tx(tx, &draft.revision_id)?,
                draft: next_draft,
            })
        })?;

        tracing::info!(
            branch_id = %result.head.branch_id,
            head = %result.head.id,
            draft = %result.draft.id,
            "revision committed"
        );
        self.dispatch(&[MutationEvent::Endpoint(EndpointEvent {
            revision_id: result.head.id.clone(),
            origin: WriteOrigin::User,
        })]);
        Ok(result)
    }

    /// Throws away every change of a draft: writable versions are deleted and
    /// head's table versions are attached again.
    pub fn revert_changes(
        &mut self,
        request: RevertChangesRequest,
    ) -> Result<RevisionInfo, StoreError> {
        let reverted = self.transact("revert_changes", |tx| {
            let draft = resolve_draft_revision_tx(tx, &request.revision_id)?;
            discard_draft_versions_tx(tx, &draft.revision_id)?;
            copy_revision_tables_tx(tx, &draft.head_revision_id, &draft.revision_id)?;
            set_draft_state_tx(tx, &draft, false)?;
            require_revision_tx(tx, &draft.revision_id)
        })?;

        tracing::info!(revision_id = %reverted.id, "draft reverted");
        self.dispatch(&[MutationEvent::Endpoint(EndpointEvent {
            revision_id: reverted.id.clone(),
            origin: WriteOrigin::User,
        })]);
        Ok(reverted)
    }
}
