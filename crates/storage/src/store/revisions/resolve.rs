#![forbid(unsafe_code)]

use super::super::*;

impl SqliteStore {
    pub fn get_revision(&self, revision_id: &str) -> Result<RevisionInfo, StoreError> {
        require_revision_tx(&self.conn, revision_id)
    }

    /// Fails with `NotDraftRevision` unless `revision_id` is its branch's
    /// current draft.
    pub fn resolve_draft_revision(&self, revision_id: &str) -> Result<RevisionInfo, StoreError> {
        let draft = resolve_draft_revision_tx(&self.conn, revision_id)?;
        require_revision_tx(&self.conn, &draft.revision_id)
    }

    pub fn find_head_revision(&self, branch_id: &str) -> Result<RevisionInfo, StoreError> {
        self.find_branch_revision(branch_id, RevisionSlot::Head)
    }

    pub fn find_draft_revision(&self, branch_id: &str) -> Result<RevisionInfo, StoreError> {
        self.find_branch_revision(branch_id, RevisionSlot::Draft)
    }

    pub fn find_start_revision(&self, branch_id: &str) -> Result<RevisionInfo, StoreError> {
        self.find_branch_revision(branch_id, RevisionSlot::Start)
    }

    fn find_branch_revision(
        &self,
        branch_id: &str,
        slot: RevisionSlot,
    ) -> Result<RevisionInfo, StoreError> {
        require_branch_tx(&self.conn, branch_id)?;
        require_branch_revision_tx(&self.conn, branch_id, slot)
    }

    /// Revisions of a branch in creation order.
    pub fn list_revisions(&self, branch_id: &str) -> Result<Vec<RevisionInfo>, StoreError> {
        require_branch_tx(&self.conn, branch_id)?;
        list_revisions_tx(&self.conn, branch_id)
    }
}
