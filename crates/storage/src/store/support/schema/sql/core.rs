#![forbid(unsafe_code)]

pub(super) const SQL: &str = r#"

        CREATE TABLE IF NOT EXISTS store_state (
          singleton INTEGER PRIMARY KEY CHECK(singleton = 1),
          schema_version INTEGER NOT NULL,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS organizations (
          id TEXT PRIMARY KEY,
          created_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS projects (
          id TEXT PRIMARY KEY,
          organization_id TEXT NOT NULL,
          name TEXT NOT NULL,
          created_at_ms INTEGER NOT NULL,
          UNIQUE(organization_id, name),
          FOREIGN KEY(organization_id) REFERENCES organizations(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS branches (
          id TEXT PRIMARY KEY,
          project_id TEXT NOT NULL,
          name TEXT NOT NULL,
          is_root INTEGER NOT NULL DEFAULT 0,
          touched INTEGER NOT NULL DEFAULT 0,
          created_at_ms INTEGER NOT NULL,
          UNIQUE(project_id, name),
          FOREIGN KEY(project_id) REFERENCES projects(id) ON DELETE CASCADE
        );

        -- parent_id crosses branches (a start revision points into its source
        -- branch), so it is a plain column.
        CREATE TABLE IF NOT EXISTS revisions (
          id TEXT PRIMARY KEY,
          seq INTEGER NOT NULL,
          branch_id TEXT NOT NULL,
          parent_id TEXT,
          is_head INTEGER NOT NULL DEFAULT 0,
          is_draft INTEGER NOT NULL DEFAULT 0,
          is_start INTEGER NOT NULL DEFAULT 0,
          has_changes INTEGER NOT NULL DEFAULT 0,
          comment TEXT,
          created_at_ms INTEGER NOT NULL,
          FOREIGN KEY(branch_id) REFERENCES branches(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS changelog (
          revision_id TEXT NOT NULL,
          table_created_id TEXT NOT NULL,
          inserts INTEGER NOT NULL DEFAULT 0,
          updates INTEGER NOT NULL DEFAULT 0,
          deletes INTEGER NOT NULL DEFAULT 0,
          PRIMARY KEY(revision_id, table_created_id),
          FOREIGN KEY(revision_id) REFERENCES revisions(id) ON DELETE CASCADE
        );
"#;
