#![forbid(unsafe_code)]

use serde_json::json;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tg_storage::{
    CreateProjectRequest, CreateRevisionRequest, CreateRowRequest, CreateTableRequest,
    EndpointEvent, MutationEvent, MutationObserver, ObserverError, RenameRowRequest, RowEvent,
    RowEventKind, SqliteStore, WriteOrigin,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn temp_dir(test_name: &str) -> PathBuf {
    let base = std::env::temp_dir();
    let pid = std::process::id();
    let nonce = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let dir = base.join(format!("tg_storage_{test_name}_{pid}_{nonce}"));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

#[derive(Clone, Default)]
struct Recorder {
    events: Arc<Mutex<Vec<MutationEvent>>>,
}

impl Recorder {
    fn take(&self) -> Vec<MutationEvent> {
        std::mem::take(&mut *self.events.lock().expect("recorder lock"))
    }
}

impl MutationObserver for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    fn on_row(&self, event: &RowEvent) -> Result<(), ObserverError> {
        self.events
            .lock()
            .expect("recorder lock")
            .push(MutationEvent::Row(event.clone()));
        Ok(())
    }

    fn on_endpoint(&self, event: &EndpointEvent) -> Result<(), ObserverError> {
        self.events
            .lock()
            .expect("recorder lock")
            .push(MutationEvent::Endpoint(event.clone()));
        Ok(())
    }
}

struct Broken;

impl MutationObserver for Broken {
    fn on_row(&self, _event: &RowEvent) -> Result<(), ObserverError> {
        Err(ObserverError("search index is offline".to_string()))
    }
}

fn store_with_table(label: &str, recorder: &Recorder) -> (SqliteStore, String) {
    init_tracing();
    let storage_dir = temp_dir(label);
    let mut store = SqliteStore::open(&storage_dir).expect("open store");
    store.add_observer(Box::new(Broken));
    store.add_observer(Box::new(recorder.clone()));

    let draft = store
        .create_project(CreateProjectRequest {
            organization_id: "org".to_string(),
            project_name: "observed".to_string(),
            branch_name: None,
        })
        .expect("create project")
        .draft_revision_id;
    store
        .create_table(CreateTableRequest {
            revision_id: draft.clone(),
            table_id: "notes".to_string(),
            schema: json!({ "type": "object", "properties": { "text": { "type": "string" } } }),
        })
        .expect("create table");
    (store, draft)
}

fn note(draft: &str, row_id: &str, origin: WriteOrigin) -> CreateRowRequest {
    CreateRowRequest {
        revision_id: draft.to_string(),
        table_id: "notes".to_string(),
        row_id: row_id.to_string(),
        data: json!({ "text": row_id }),
        meta: None,
        origin,
    }
}

#[test]
fn row_writes_publish_row_then_endpoint_events() {
    let recorder = Recorder::default();
    let (mut store, draft) = store_with_table("observer_row_events", &recorder);

    let table_events = recorder.take();
    assert_eq!(
        table_events,
        vec![MutationEvent::Endpoint(EndpointEvent {
            revision_id: draft.clone(),
            origin: WriteOrigin::User,
        })]
    );

    store
        .create_row(note(&draft, "n1", WriteOrigin::User))
        .expect("create row despite a failing observer");
    assert_eq!(
        recorder.take(),
        vec![
            MutationEvent::Row(RowEvent {
                kind: RowEventKind::Created,
                revision_id: draft.clone(),
                table_id: "notes".to_string(),
                row_id: "n1".to_string(),
                previous_row_id: None,
                origin: WriteOrigin::User,
            }),
            MutationEvent::Endpoint(EndpointEvent {
                revision_id: draft.clone(),
                origin: WriteOrigin::User,
            }),
        ]
    );

    store
        .rename_row(RenameRowRequest {
            revision_id: draft.clone(),
            table_id: "notes".to_string(),
            row_id: "n1".to_string(),
            next_row_id: "n2".to_string(),
        })
        .expect("rename row");
    let events = recorder.take();
    assert!(matches!(
        events.first(),
        Some(MutationEvent::Row(RowEvent { kind: RowEventKind::Renamed, row_id, previous_row_id: Some(previous), .. }))
            if row_id == "n2" && previous == "n1"
    ));
}

#[test]
fn restore_origin_reaches_observers() {
    let recorder = Recorder::default();
    let (mut store, draft) = store_with_table("observer_restore", &recorder);
    recorder.take();

    store
        .create_row(note(&draft, "restored", WriteOrigin::Restore))
        .expect("restore row");
    let events = recorder.take();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|event| match event {
        MutationEvent::Row(row) => row.origin == WriteOrigin::Restore,
        MutationEvent::Endpoint(endpoint) => endpoint.origin == WriteOrigin::Restore,
    }));
}

#[test]
fn rejected_commands_publish_nothing() {
    let recorder = Recorder::default();
    let (mut store, draft) = store_with_table("observer_rejected", &recorder);
    store
        .create_row(note(&draft, "n1", WriteOrigin::User))
        .expect("create row");
    recorder.take();

    store
        .create_row(note(&draft, "n1", WriteOrigin::User))
        .expect_err("duplicate row");
    assert!(recorder.take().is_empty());

    let commit = store
        .create_revision(CreateRevisionRequest {
            revision_id: draft,
            comment: None,
        })
        .expect("commit");
    assert_eq!(
        recorder.take(),
        vec![MutationEvent::Endpoint(EndpointEvent {
            revision_id: commit.head.id,
            origin: WriteOrigin::User,
        })]
    );
}

#[test]
fn events_serialize_with_a_type_tag() {
    let event = MutationEvent::Row(RowEvent {
        kind: RowEventKind::Updated,
        revision_id: "rev".to_string(),
        table_id: "notes".to_string(),
        row_id: "n1".to_string(),
        previous_row_id: None,
        origin: WriteOrigin::Restore,
    });
    let value = serde_json::to_value(&event).expect("serialize event");
    assert_eq!(value["type"], json!("row"));
    assert_eq!(value["kind"], json!("updated"));
    assert_eq!(value["origin"], json!("restore"));
}
