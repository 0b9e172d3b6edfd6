mod common;

use chrono::Utc;
use common::{quick_settings, MemoryComments, Notices, RefreshCounter};
use review_notes_lib::models::Note;
use review_notes_lib::sidecar::TokioFs;
use review_notes_lib::terminal::{ConsoleNavigator, OutputPathDialog};
use review_notes_lib::workspace::{event_channel, HostEvent, HostServices, Orchestrator};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const WATCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Writes the sidecar the way another process would, in one rename.
fn replace_sidecar(root: &Path, contents: &str) {
    let staging = root.join(".notes.json.incoming");
    std::fs::write(&staging, contents).expect("staging write");
    std::fs::rename(&staging, root.join(".notes.json")).expect("rename into place");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn external_overwrite_replaces_index() {
    let root = tempfile::tempdir().expect("temp root");
    let (store, _, _) = common::open_store(root.path(), &quick_settings());
    store.load().await;
    store.add_note(&root.path().join("a.ts"), Note::with_defaults(1, "local", "me", Utc::now()));
    assert!(store.flush().await);

    let (changed_tx, mut changed_rx) = mpsc::unbounded_channel();
    let _watch = store
        .watch(move || {
            let _ = changed_tx.send(());
        })
        .expect("watch sidecar");

    replace_sidecar(
        root.path(),
        r#"{"./c.ts": [{"id": "1700000000000-remote", "line": 2, "text": "remote"}]}"#,
    );

    let reloaded = tokio::time::timeout(WATCH_TIMEOUT, async {
        while changed_rx.recv().await.is_some() {
            if store.get_all_notes().contains_key("./c.ts") {
                return true;
            }
        }
        false
    })
    .await
    .unwrap_or(false);

    assert!(reloaded, "external change was not picked up");
    let keys = store.get_all_notes().into_keys().collect::<Vec<_>>();
    assert_eq!(keys, vec!["./c.ts".to_string()]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn own_saves_keep_a_large_index_while_watching() {
    let root = tempfile::tempdir().expect("temp root");
    let (store, _, _) = common::open_store(root.path(), &quick_settings());
    let now = Utc::now();
    for line in 0..20_000 {
        let file = root.path().join(format!("src/file_{}.ts", line % 200));
        store.add_note(&file, Note::with_defaults(line, &format!("note {}", line), "me", now));
    }
    assert!(store.flush().await);

    let _watch = store.watch(|| {}).expect("watch sidecar");
    for round in 1..=5 {
        store.add_note(&root.path().join("extra.ts"), Note::with_defaults(round, "extra", "me", Utc::now()));
        assert!(store.save_now().await);
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(store.note_count(), 20_000 + round as usize, "round {}", round);
    }

    let (reloaded, _, _) = common::open_store(root.path(), &quick_settings());
    assert_eq!(reloaded.load().await, 20_005);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn orchestrator_rerenders_active_file_after_external_change() {
    let root = tempfile::tempdir().expect("temp root");
    let comments = MemoryComments::default();
    let tree = Arc::new(RefreshCounter::default());
    let services = HostServices {
        settings: quick_settings(),
        fs: Arc::new(TokioFs),
        notifier: Arc::new(Notices::default()),
        tree: tree.clone(),
        navigator: Box::new(ConsoleNavigator),
        save_dialog: Box::new(OutputPathDialog::default()),
    };
    let (events, mut receiver) = event_channel();
    let mut orchestrator = Orchestrator::new(services, Box::new(comments.clone()), &events);

    orchestrator
        .handle_event(HostEvent::RootChanged(Some(root.path().to_path_buf())))
        .await;
    orchestrator
        .handle_event(HostEvent::ActiveFileChanged(Some(root.path().join("c.ts"))))
        .await;
    assert!(orchestrator.context().expect("context").is_watching());
    assert!(comments.views().is_empty());

    replace_sidecar(
        root.path(),
        r#"{"./c.ts": [{"id": "1700000000000-remote", "line": 2, "text": "from elsewhere"}]}"#,
    );

    let shown = tokio::time::timeout(WATCH_TIMEOUT, async {
        while let Some(event) = receiver.recv().await {
            orchestrator.handle_event(event).await;
            if !comments.views().is_empty() {
                return true;
            }
        }
        false
    })
    .await
    .unwrap_or(false);

    assert!(shown, "reload did not re-render the active file");
    let views = comments.views();
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].body, "from elsewhere");
    assert!(tree.refreshes.load(std::sync::atomic::Ordering::SeqCst) >= 1);

    orchestrator.handle_event(HostEvent::Shutdown).await;
    assert!(comments.views().is_empty());
}
