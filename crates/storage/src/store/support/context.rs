#![forbid(unsafe_code)]

use super::super::{
    EndpointEvent, MutationEvent, RowEvent, RowEventKind, StoreError, WriteOrigin,
};
use super::{DraftRevision, now_ms, refresh_draft_state_tx, resolve_draft_revision_tx};
use rusqlite::Connection;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(in crate::store) enum WriteAccess {
    User,
    /// Internal writes into system tables.
    System,
}

/// Per-command write state threaded through every mutation helper.
pub(in crate::store) struct WriteCtx<'c> {
    pub(in crate::store) conn: &'c Connection,
    pub(in crate::store) draft: DraftRevision,
    pub(in crate::store) now_ms: i64,
    pub(in crate::store) origin: WriteOrigin,
    access: WriteAccess,
    events: Vec<MutationEvent>,
    structural: bool,
}

impl<'c> WriteCtx<'c> {
    pub(in crate::store) fn open(
        conn: &'c Connection,
        revision_id: &str,
        origin: WriteOrigin,
    ) -> Result<Self, StoreError> {
        let draft = resolve_draft_revision_tx(conn, revision_id)?;
        Ok(Self {
            conn,
            draft,
            now_ms: now_ms(),
            origin,
            access: WriteAccess::User,
            events: Vec::new(),
            structural: false,
        })
    }

    pub(in crate::store) fn revision_id(&self) -> &str {
        &self.draft.revision_id
    }

    pub(in crate::store) fn can_write_system(&self) -> bool {
        self.access == WriteAccess::System
    }

    pub(in crate::store) fn as_system<T>(
        &mut self,
        body: impl FnOnce(&mut Self) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let previous = self.access;
        self.access = WriteAccess::System;
        let result = body(self);
        self.access = previous;
        result
    }

    /// Runs `body` inside a SQL savepoint; on error its writes and events are
    /// discarded while the surrounding transaction stays usable.
    pub(in crate::store) fn savepoint<T>(
        &mut self,
        body: impl FnOnce(&mut Self) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        self.conn.execute_batch("SAVEPOINT tg_item")?;
        let events_len = self.events.len();
        let structural = self.structural;
        match body(self) {
            Ok(value) => {
                self.conn.execute_batch("RELEASE tg_item")?;
                Ok(value)
            }
            Err(err) => {
                self.conn
                    .execute_batch("ROLLBACK TO tg_item; RELEASE tg_item")?;
                self.events.truncate(events_len);
                self.structural = structural;
                Err(err)
            }
        }
    }

    pub(in crate::store) fn emit_row(
        &mut self,
        kind: RowEventKind,
        table_id: &str,
        row_id: &str,
        previous_row_id: Option<&str>,
    ) {
        self.events.push(MutationEvent::Row(RowEvent {
            kind,
            revision_id: self.draft.revision_id.clone(),
            table_id: table_id.to_string(),
            row_id: row_id.to_string(),
            previous_row_id: previous_row_id.map(str::to_string),
            origin: self.origin,
        }));
    }

    /// Marks a schema-level change; derived artifacts must be recomputed.
    pub(in crate::store) fn mark_structural(&mut self) {
        self.structural = true;
    }

    /// Refreshes `has_changes`/`touched` and returns the events to publish
    /// once the transaction commits.
    pub(in crate::store) fn finish(mut self) -> Result<Vec<MutationEvent>, StoreError> {
        refresh_draft_state_tx(self.conn, &self.draft)?;
        if self.structural || !self.events.is_empty() {
            self.events.push(MutationEvent::Endpoint(EndpointEvent {
                revision_id: self.draft.revision_id.clone(),
                origin: self.origin,
            }));
        }
        Ok(self.events)
    }
}
