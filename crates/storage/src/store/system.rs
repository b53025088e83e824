#![forbid(unsafe_code)]

use super::*;
use serde_json::Value;
use std::collections::BTreeMap;
use tg_core::SchemaError;
use tg_core::ids::{SHARED_SCHEMAS_TABLE_ID, VIEWS_TABLE_ID};

impl SqliteStore {
    /// Stores the view configuration of a user table. The document is
    /// opaque to the engine; it follows the table through renames and is
    /// dropped with it.
    pub fn set_table_views(&mut self, request: SetViewsRequest) -> Result<(), StoreError> {
        if !request.views.is_object() {
            return Err(StoreError::InvalidInput("views must be a JSON object"));
        }
        self.write("set_table_views", &request.revision_id, WriteOrigin::User, |ctx| {
            let table = require_table_tx(ctx.conn, ctx.revision_id(), &request.table_id)?;
            if table.system {
                return Err(StoreError::SystemTableWrite(table.id));
            }
            put_system_entry_tx(ctx, VIEWS_TABLE_ID, &table.id, &request.views)?;
            ctx.mark_structural();
            Ok(())
        })
    }

    pub fn get_table_views(
        &self,
        revision_id: &str,
        table_id: &str,
    ) -> Result<Option<Value>, StoreError> {
        require_revision_tx(&self.conn, revision_id)?;
        require_table_tx(&self.conn, revision_id, table_id)?;
        Ok(read_system_entry_tx(&self.conn, revision_id, VIEWS_TABLE_ID, table_id)?
            .map(|row| row.data))
    }

    /// Adds or replaces a named schema that table schemas can `$ref`.
    /// A shared schema already referenced by a table cannot be changed.
    pub fn set_shared_schema(&mut self, request: SetSharedSchemaRequest) -> Result<(), StoreError> {
        let name = canonicalize_table_id(&request.name)?;
        self.write("set_shared_schema", &request.revision_id, WriteOrigin::User, |ctx| {
            let node = compile_schema_tx(ctx.conn, ctx.revision_id(), &request.schema)?;
            if let Some(field) = node.foreign_keys().into_iter().next() {
                return Err(SchemaError::ForeignKeyInSharedSchema {
                    pointer: field.pointer,
                }
                .into());
            }

            let existing = read_system_entry_tx(
                ctx.conn,
                ctx.revision_id(),
                SHARED_SCHEMAS_TABLE_ID,
                &name,
            )?;
            if let Some(existing) = existing
                && existing.data != request.schema
                && all_table_schemas_tx(ctx.conn, ctx.revision_id())?
                    .iter()
                    .any(|entry| refers_to(&entry.schema, &name))
            {
                return Err(StoreError::InvalidInput(
                    "shared schema is referenced by a table schema",
                ));
            }

            put_system_entry_tx(ctx, SHARED_SCHEMAS_TABLE_ID, &name, &request.schema)?;
            tracing::debug!(name = %name, "shared schema stored");
            Ok(())
        })
    }

    pub fn get_shared_schemas(&self, revision_id: &str) -> Result<BTreeMap<String, Value>, StoreError> {
        require_revision_tx(&self.conn, revision_id)?;
        shared_schemas_tx(&self.conn, revision_id)
    }
}

fn refers_to(schema: &Value, name: &str) -> bool {
    match schema {
        Value::Object(map) => {
            map.get("$ref").and_then(Value::as_str) == Some(name)
                || map.values().any(|value| refers_to(value, name))
        }
        Value::Array(items) => items.iter().any(|value| refers_to(value, name)),
        _ => false,
    }
}
