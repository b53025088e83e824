#![forbid(unsafe_code)]

use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RevisionInfo {
    pub id: String,
    pub branch_id: String,
    /// `None` only for the very first revision of a project.
    pub parent_id: Option<String>,
    pub is_head: bool,
    pub is_draft: bool,
    pub is_start: bool,
    pub has_changes: bool,
    pub comment: Option<String>,
    pub created_at_ms: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BranchInfo {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub is_root: bool,
    pub touched: bool,
    pub created_at_ms: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProjectInfo {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub created_at_ms: i64,
    pub root_branch: BranchInfo,
    pub head_revision_id: String,
    pub draft_revision_id: String,
}

/// A freshly created branch together with its start and draft revisions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BranchCreated {
    pub branch: BranchInfo,
    pub start_revision: RevisionInfo,
    pub draft_revision: RevisionInfo,
}

/// The branch and revision a branch was forked from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ParentBranch {
    pub branch: BranchInfo,
    pub revision: RevisionInfo,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CommitResult {
    pub head: RevisionInfo,
    pub draft: RevisionInfo,
}
