#![forbid(unsafe_code)]

pub(super) const SQL: &str = r#"

        CREATE TABLE IF NOT EXISTS tables (
          version_id TEXT PRIMARY KEY,
          id TEXT NOT NULL,
          created_id TEXT NOT NULL,
          readonly INTEGER NOT NULL DEFAULT 0,
          system INTEGER NOT NULL DEFAULT 0,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL
        );

        -- table_id / table_created_id mirror the attached version so the
        -- per-revision uniqueness can be enforced by the store itself.
        CREATE TABLE IF NOT EXISTS revision_tables (
          revision_id TEXT NOT NULL,
          table_version_id TEXT NOT NULL,
          table_id TEXT NOT NULL,
          table_created_id TEXT NOT NULL,
          PRIMARY KEY(revision_id, table_version_id),
          UNIQUE(revision_id, table_id),
          UNIQUE(revision_id, table_created_id),
          FOREIGN KEY(revision_id) REFERENCES revisions(id) ON DELETE CASCADE,
          FOREIGN KEY(table_version_id) REFERENCES tables(version_id)
        );

        CREATE TABLE IF NOT EXISTS rows (
          version_id TEXT PRIMARY KEY,
          id TEXT NOT NULL,
          created_id TEXT NOT NULL,
          readonly INTEGER NOT NULL DEFAULT 0,
          data TEXT NOT NULL,
          hash TEXT NOT NULL,
          schema_hash TEXT NOT NULL,
          meta TEXT,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL,
          published_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS table_rows (
          table_version_id TEXT NOT NULL,
          row_version_id TEXT NOT NULL,
          row_id TEXT NOT NULL,
          PRIMARY KEY(table_version_id, row_version_id),
          UNIQUE(table_version_id, row_id),
          FOREIGN KEY(table_version_id) REFERENCES tables(version_id) ON DELETE CASCADE,
          FOREIGN KEY(row_version_id) REFERENCES rows(version_id)
        );
"#;
