#![forbid(unsafe_code)]

use super::super::*;
use rusqlite::{OptionalExtension, params};
use tg_core::generate_id;

impl SqliteStore {
    /// Creates the organization if missing, the project, its root branch, a
    /// start revision (also head) and an empty draft on top of it.
    pub fn create_project(
        &mut self,
        request: CreateProjectRequest,
    ) -> Result<ProjectInfo, StoreError> {
        let organization_id = require_non_empty(
            &request.organization_id,
            "organization_id must not be empty",
        )?;
        let project_name =
            require_non_empty(&request.project_name, "project_name must not be empty")?;
        let branch_name = match request.branch_name.as_deref() {
            Some(name) => require_non_empty(name, "branch_name must not be empty")?,
            None => DEFAULT_BRANCH.to_string(),
        };

        let project = self.transact("create_project", |tx| {
            let now_ms = now_ms();
            tx.execute(
                "INSERT OR IGNORE INTO organizations(id, created_at_ms) VALUES (?1, ?2)",
                params![organization_id, now_ms],
            )?;

            let project_id = generate_id();
            tx.execute(
                "INSERT INTO projects(id, organization_id, name, created_at_ms) VALUES (?1, ?2, ?3, ?4)",
                params![project_id, organization_id, project_name, now_ms],
            )
            .map_err(|err| {
                map_insert_conflict(err, || StoreError::ProjectAlreadyExists(project_name.clone()))
            })?;

            let root_branch = insert_branch_tx(tx, &project_id, &branch_name, true, now_ms)?;
            let start = insert_revision_tx(
                tx,
                NewRevision {
                    branch_id: &root_branch.id,
                    parent_id: None,
                    slot: RevisionSlot::Start,
                    comment: None,
                    created_at_ms: now_ms,
                },
            )?;
            let draft = insert_revision_tx(
                tx,
                NewRevision {
                    branch_id: &root_branch.id,
                    parent_id: Some(&start.id),
                    slot: RevisionSlot::Draft,
                    comment: None,
                    created_at_ms: now_ms,
                },
            )?;

            Ok(ProjectInfo {
                id: project_id,
                organization_id: organization_id.clone(),
                name: project_name.clone(),
                created_at_ms: now_ms,
                root_branch,
                head_revision_id: start.id,
                draft_revision_id: draft.id,
            })
        })?;

        tracing::info!(
            project_id = %project.id,
            organization_id = %project.organization_id,
            branch = %project.root_branch.name,
            "project created"
        );
        Ok(project)
    }

    pub fn get_project(&self, project_id: &str) -> Result<ProjectInfo, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, organization_id, name, created_at_ms FROM projects WHERE id=?1",
                params![project_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                },
            )
            .optional()?;
        let Some((id, organization_id, name, created_at_ms)) = row else {
            return Err(StoreError::not_found("project", project_id));
        };

        let root_branch = root_branch_tx(&self.conn, &id)?
            .ok_or_else(|| StoreError::Corrupt(format!("project '{id}' has no root branch")))?;
        let head = require_branch_revision_tx(&self.conn, &root_branch.id, RevisionSlot::Head)?;
        let draft = require_branch_revision_tx(&self.conn, &root_branch.id, RevisionSlot::Draft)?;

        Ok(ProjectInfo {
            id,
            organization_id,
            name,
            created_at_ms,
            root_branch,
            head_revision_id: head.id,
            draft_revision_id: draft.id,
        })
    }

    pub fn list_branches(&self, project_id: &str) -> Result<Vec<BranchInfo>, StoreError> {
        let exists = self
            .conn
            .query_row(
                "SELECT 1 FROM projects WHERE id=?1",
                params![project_id],
                |_row| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        if !exists {
            return Err(StoreError::not_found("project", project_id));
        }
        list_branches_tx(&self.conn, project_id)
    }
}
