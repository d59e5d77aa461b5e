use std::time::{Duration, Instant};

use flowboard::editor::{EditorSession, UNTITLED_NAME};
use flowboard::history::{DEBOUNCE, HISTORY_LIMIT};
use flowboard::{
    export, FlowchartStore, NodeKind, Position, SizePreset, StorageBackend, StoreError, Viewport,
};

fn settle(session: &mut EditorSession, now: Instant) -> Instant {
    let later = now + DEBOUNCE + Duration::from_millis(10);
    session.tick(later);
    later
}

#[test]
fn build_save_and_reload_order_flow() {
    let mut store = FlowchartStore::memory();
    let mut session = EditorSession::new("feat-checkout");
    let now = Instant::now();

    let start = session.drop_node(NodeKind::Start, Position::new(100.0, 100.0), now);
    let process = session.drop_node(NodeKind::Process, Position::new(300.0, 100.0), now);
    session
        .connect(&start, None, &process, None, now)
        .expect("both endpoints exist");
    assert_eq!(session.chart().unwrap().name, UNTITLED_NAME);

    session.rename("Order Flow").unwrap();
    assert!(session.is_dirty());
    session.save(&mut store).unwrap();
    assert!(!session.is_dirty());

    let id = session.chart().unwrap().id.clone();
    let loaded = store.load("feat-checkout", &id).unwrap();
    assert_eq!(loaded.name, "Order Flow");
    assert_eq!(loaded.nodes.len(), 2);
    assert_eq!(loaded.edges.len(), 1);
    assert_eq!(loaded.nodes[0].position, Position::new(100.0, 100.0));
}

#[test]
fn undo_empties_canvas_and_redo_restores_node() {
    let mut session = EditorSession::new("feat");
    let mut now = Instant::now();
    let id = session.drop_node(NodeKind::Start, Position::new(50.0, 60.0), now);
    let label = session
        .chart()
        .unwrap()
        .node(&id)
        .unwrap()
        .data
        .label
        .clone();
    now = settle(&mut session, now);

    assert!(session.undo(now));
    now = settle(&mut session, now);
    assert!(session.chart().unwrap().nodes.is_empty());

    assert!(session.redo(now));
    settle(&mut session, now);
    let node = session.chart().unwrap().node(&id).expect("node restored");
    assert_eq!(node.position, Position::new(50.0, 60.0));
    assert_eq!(node.data.label, label);
}

#[test]
fn undo_inside_the_debounce_window_keeps_the_prior_step() {
    let mut session = EditorSession::new("feat");
    let mut now = Instant::now();
    session.drop_node(NodeKind::Start, Position::new(0.0, 0.0), now);
    now = settle(&mut session, now);
    session.drop_node(NodeKind::End, Position::new(200.0, 0.0), now);

    // Undo fires 100 ms into the second node's debounce window. The in-flight
    // step is committed, so only the second node is removed.
    assert!(session.undo(now + Duration::from_millis(100)));
    now = settle(&mut session, now);
    assert_eq!(session.chart().unwrap().nodes.len(), 1);

    assert!(session.redo(now));
    now = settle(&mut session, now);
    assert_eq!(session.chart().unwrap().nodes.len(), 2);

    assert!(session.undo(now));
    now = settle(&mut session, now);
    assert!(session.undo(now));
    settle(&mut session, now);
    assert!(session.chart().unwrap().nodes.is_empty());
}

/// Backend whose writes always fail, standing in for a full disk.
#[derive(Debug)]
struct ReadOnlyBackend;

impl StorageBackend for ReadOnlyBackend {
    fn get(&self, _feature: &str) -> anyhow::Result<Option<String>> {
        Ok(None)
    }

    fn set(&mut self, _feature: &str, _blob: &str) -> anyhow::Result<()> {
        anyhow::bail!("no space left on device")
    }

    fn remove(&mut self, _feature: &str) -> anyhow::Result<()> {
        anyhow::bail!("no space left on device")
    }
}

#[test]
fn failed_save_keeps_the_session_dirty() {
    let mut store = FlowchartStore::new(Box::new(ReadOnlyBackend));
    let mut session = EditorSession::new("feat");
    let now = Instant::now();
    session.drop_node(NodeKind::Start, Position::new(0.0, 0.0), now);
    session.rename("Unsaved").unwrap();

    let err = session.save(&mut store).unwrap_err();
    assert!(matches!(err, StoreError::Backend(_)));
    assert!(session.is_dirty());
    let chart = session.chart().unwrap();
    assert_eq!(chart.name, "Unsaved");
    assert_eq!(chart.nodes.len(), 1);
}

#[test]
fn empty_name_save_is_rejected_before_the_store() {
    let mut store = FlowchartStore::memory();
    let mut session = EditorSession::new("feat");
    let now = Instant::now();
    session.drop_node(NodeKind::Start, Position::new(0.0, 0.0), now);
    let feature = session.feature_id().to_string();

    assert!(matches!(session.rename(""), Err(StoreError::EmptyName)));
    assert!(matches!(session.rename("   "), Err(StoreError::EmptyName)));
    assert!(store.list(&feature).unwrap().is_empty());
    assert_eq!(session.chart().unwrap().name, UNTITLED_NAME);

    session.rename("Named").unwrap();
    session.save(&mut store).unwrap();
    assert_eq!(store.list(&feature).unwrap().len(), 1);
}

#[test]
fn resize_presets_final_scale_wins() {
    let mut session = EditorSession::new("feat");
    let now = Instant::now();
    let id = session.drop_node(NodeKind::Decision, Position::new(0.0, 0.0), now);

    for preset in [SizePreset::Xs, SizePreset::M, SizePreset::Xl] {
        session.resize_node(&id, preset, now);
    }
    let size = session
        .chart()
        .unwrap()
        .node(&id)
        .unwrap()
        .data
        .size
        .unwrap();
    assert_eq!(size.scale, 1.6);
}

#[test]
fn fifty_one_edits_cap_history_and_drop_the_oldest() {
    let mut session = EditorSession::new("feat");
    let mut now = Instant::now();
    session.new_document("Cap").unwrap();

    for i in 0..(HISTORY_LIMIT + 1) {
        session.drop_node(NodeKind::Process, Position::new(i as f32 * 10.0, 0.0), now);
        now = settle(&mut session, now);
    }

    let mut undos = 0;
    while session.undo(now) {
        now = settle(&mut session, now);
        undos += 1;
    }
    assert_eq!(undos, HISTORY_LIMIT);
    // The pre-first-edit state was evicted: one node remains unreachable.
    assert_eq!(session.chart().unwrap().nodes.len(), 1);
}

#[test]
fn viewport_is_saved_and_restored() {
    let mut store = FlowchartStore::memory();
    let mut session = EditorSession::new("feat");
    let now = Instant::now();
    session.drop_node(NodeKind::Start, Position::new(0.0, 0.0), now);
    session.set_viewport(Viewport {
        x: -120.0,
        y: 40.0,
        zoom: 1.5,
    });
    session.rename("Viewed").unwrap();
    session.save(&mut store).unwrap();
    let id = session.chart().unwrap().id.clone();

    let mut other = EditorSession::new("feat");
    other.open(&store, &id).unwrap();
    let viewport = other.viewport();
    assert_eq!(viewport.zoom, 1.5);
    assert_eq!(viewport.x, -120.0);
}

#[test]
fn opening_another_flowchart_discards_history() {
    let mut store = FlowchartStore::memory();
    let mut session = EditorSession::new("feat");
    let mut now = Instant::now();

    session.new_document("First").unwrap();
    session.drop_node(NodeKind::Start, Position::new(0.0, 0.0), now);
    now = settle(&mut session, now);
    session.save(&mut store).unwrap();
    let first_id = session.chart().unwrap().id.clone();
    assert!(session.can_undo());

    session.new_document("Second").unwrap();
    session.drop_node(NodeKind::End, Position::new(0.0, 0.0), now);
    now = settle(&mut session, now);
    session.save(&mut store).unwrap();

    session.open(&store, &first_id).unwrap();
    assert!(!session.can_undo());
    assert!(!session.is_dirty());
    assert_eq!(session.chart().unwrap().name, "First");
    let _ = now;
}

#[test]
fn deleting_the_open_flowchart_empties_the_session() {
    let mut store = FlowchartStore::memory();
    let mut session = EditorSession::new("feat");
    let now = Instant::now();
    session.drop_node(NodeKind::Start, Position::new(0.0, 0.0), now);
    session.rename("Doomed").unwrap();
    session.save(&mut store).unwrap();
    let id = session.chart().unwrap().id.clone();

    session.delete(&mut store, &id).unwrap();
    assert!(session.chart().is_none());
    assert!(store.list("feat").unwrap().is_empty());
}

#[test]
fn exported_json_reimports_into_another_feature() {
    let mut session = EditorSession::new("feat-a");
    let now = Instant::now();
    let a = session.drop_node(NodeKind::Start, Position::new(0.0, 0.0), now);
    let b = session.drop_node(NodeKind::End, Position::new(200.0, 0.0), now);
    session.connect(&a, None, &b, None, now).unwrap();
    session.rename("Portable").unwrap();

    let json = export::export_json(session.chart().unwrap()).unwrap();
    let chart = export::import_json(&json).unwrap();
    assert_eq!(chart.name, "Portable");
    assert_eq!(chart.nodes.len(), 2);
    assert_eq!(chart.edges.len(), 1);
}

#[test]
fn svg_export_reflects_the_live_graph() {
    let mut session = EditorSession::new("feat");
    let now = Instant::now();
    let id = session.drop_node(NodeKind::Process, Position::new(0.0, 0.0), now);
    session.begin_label_edit(&id);
    session.set_label_draft("Charge card");
    session.commit_label_edit(flowboard::CommitTrigger::Blur, now);

    let svg = export::export_svg(session.chart().unwrap()).unwrap();
    assert!(svg.contains("Charge card"));
}
