#![allow(dead_code)]

use async_trait::async_trait;
use review_notes_lib::errors::NotesResult;
use review_notes_lib::host::{CommentSurface, Notifier, ThreadHandle, ThreadState, ThreadView, TreeSurface};
use review_notes_lib::settings::Settings;
use review_notes_lib::sidecar::{SidecarFs, TokioFs};
use review_notes_lib::store::NoteStore;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct Notices {
    pub warnings: Mutex<Vec<String>>,
    pub errors: Mutex<Vec<String>>,
}

impl Notifier for Notices {
    fn info(&self, _message: &str) {}

    fn warn(&self, message: &str) {
        self.warnings.lock().expect("warnings lock").push(message.to_string());
    }

    fn error(&self, message: &str) {
        self.errors.lock().expect("errors lock").push(message.to_string());
    }
}

#[derive(Default)]
pub struct WriteCounter {
    pub writes: AtomicUsize,
}

#[async_trait]
impl SidecarFs for WriteCounter {
    async fn read_to_string(&self, path: &Path) -> NotesResult<Option<String>> {
        TokioFs.read_to_string(path).await
    }

    async fn write(&self, path: &Path, contents: &str) -> NotesResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        TokioFs.write(path, contents).await
    }

    async fn exists(&self, path: &Path) -> bool {
        TokioFs.exists(path).await
    }
}

/// Comment surface keeping the views it was given; clones share state.
#[derive(Clone, Default)]
pub struct MemoryComments {
    pub threads: Arc<Mutex<BTreeMap<u64, (ThreadView, ThreadState)>>>,
    next: Arc<AtomicU64>,
}

impl MemoryComments {
    pub fn views(&self) -> Vec<ThreadView> {
        self.threads
            .lock()
            .expect("threads lock")
            .values()
            .map(|(view, _)| view.clone())
            .collect()
    }
}

impl CommentSurface for MemoryComments {
    fn create_thread(&mut self, view: &ThreadView, state: ThreadState) -> ThreadHandle {
        let id = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        self.threads.lock().expect("threads lock").insert(id, (view.clone(), state));
        ThreadHandle(id)
    }

    fn update_thread(&mut self, handle: ThreadHandle, view: &ThreadView) {
        if let Some(entry) = self.threads.lock().expect("threads lock").get_mut(&handle.0) {
            entry.0 = view.clone();
        }
    }

    fn set_thread_state(&mut self, handle: ThreadHandle, state: ThreadState) {
        if let Some(entry) = self.threads.lock().expect("threads lock").get_mut(&handle.0) {
            entry.1 = state;
        }
    }

    fn dispose_thread(&mut self, handle: ThreadHandle) {
        self.threads.lock().expect("threads lock").remove(&handle.0);
    }
}

#[derive(Default)]
pub struct RefreshCounter {
    pub refreshes: AtomicUsize,
}

impl TreeSurface for RefreshCounter {
    fn refresh(&self) {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn quick_settings() -> Settings {
    Settings {
        save_debounce_ms: 30,
        author: Some("reviewer".to_string()),
        ..Settings::default()
    }
}

pub fn open_store(root: &Path, settings: &Settings) -> (NoteStore, Arc<WriteCounter>, Arc<Notices>) {
    let fs = Arc::new(WriteCounter::default());
    let notices = Arc::new(Notices::default());
    let store = NoteStore::new(root, settings, fs.clone(), notices.clone());
    (store, fs, notices)
}
