#![forbid(unsafe_code)]

pub(super) const SQL: &str = r#"

        CREATE UNIQUE INDEX IF NOT EXISTS idx_branches_root ON branches(project_id) WHERE is_root = 1;
        CREATE UNIQUE INDEX IF NOT EXISTS idx_revisions_draft ON revisions(branch_id) WHERE is_draft = 1;
        CREATE UNIQUE INDEX IF NOT EXISTS idx_revisions_head ON revisions(branch_id) WHERE is_head = 1;
        CREATE UNIQUE INDEX IF NOT EXISTS idx_revisions_start ON revisions(branch_id) WHERE is_start = 1;
        CREATE INDEX IF NOT EXISTS idx_revisions_branch_seq ON revisions(branch_id, seq);
        CREATE INDEX IF NOT EXISTS idx_revisions_parent ON revisions(parent_id);
        CREATE INDEX IF NOT EXISTS idx_revision_tables_version ON revision_tables(table_version_id);
        CREATE INDEX IF NOT EXISTS idx_table_rows_row ON table_rows(row_version_id);
        CREATE INDEX IF NOT EXISTS idx_tables_created ON tables(created_id);
"#;
