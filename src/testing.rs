use crate::errors::{NotesError, NotesResult};
use crate::host::{CommentSurface, Navigator, Notifier, SaveDialog, ThreadHandle, ThreadState, ThreadView, TreeSurface};
use crate::sidecar::{SidecarFs, TokioFs};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Info(String),
    Warn(String),
    Error(String),
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn warnings(&self) -> Vec<String> {
        self.notices
            .lock()
            .expect("notices lock")
            .iter()
            .filter_map(|notice| match notice {
                Notice::Warn(message) => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.notices
            .lock()
            .expect("notices lock")
            .iter()
            .filter_map(|notice| match notice {
                Notice::Error(message) => Some(message.clone()),
                _ => None,
            })
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn info(&self, message: &str) {
        self.notices.lock().expect("notices lock").push(Notice::Info(message.to_string()));
    }

    fn warn(&self, message: &str) {
        self.notices.lock().expect("notices lock").push(Notice::Warn(message.to_string()));
    }

    fn error(&self, message: &str) {
        self.notices.lock().expect("notices lock").push(Notice::Error(message.to_string()));
    }
}

#[derive(Default)]
pub struct CountingFs {
    pub writes: AtomicUsize,
    pub fail_writes: AtomicBool,
}

#[async_trait]
impl SidecarFs for CountingFs {
    async fn read_to_string(&self, path: &Path) -> NotesResult<Option<String>> {
        TokioFs.read_to_string(path).await
    }

    async fn write(&self, path: &Path, contents: &str) -> NotesResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(NotesError::Io("disk full".to_string()));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        TokioFs.write(path, contents).await
    }

    async fn exists(&self, path: &Path) -> bool {
        TokioFs.exists(path).await
    }
}

#[derive(Debug, Clone)]
pub struct ShownThread {
    pub view: ThreadView,
    pub state: ThreadState,
}

/// Comment surface that records live threads; clones share state.
#[derive(Clone, Default)]
pub struct FakeComments {
    pub threads: Arc<Mutex<BTreeMap<ThreadHandle, ShownThread>>>,
    pub disposed: Arc<Mutex<Vec<ThreadHandle>>>,
    next: Arc<AtomicUsize>,
}

impl FakeComments {
    pub fn live(&self) -> Vec<(ThreadHandle, ShownThread)> {
        self.threads
            .lock()
            .expect("threads lock")
            .iter()
            .map(|(handle, shown)| (*handle, shown.clone()))
            .collect()
    }

    pub fn get(&self, handle: ThreadHandle) -> Option<ShownThread> {
        self.threads.lock().expect("threads lock").get(&handle).cloned()
    }
}

impl CommentSurface for FakeComments {
    fn create_thread(&mut self, view: &ThreadView, state: ThreadState) -> ThreadHandle {
        let handle = ThreadHandle(self.next.fetch_add(1, Ordering::SeqCst) as u64 + 1);
        self.threads.lock().expect("threads lock").insert(
            handle,
            ShownThread {
                view: view.clone(),
                state,
            },
        );
        handle
    }

    fn update_thread(&mut self, handle: ThreadHandle, view: &ThreadView) {
        if let Some(shown) = self.threads.lock().expect("threads lock").get_mut(&handle) {
            shown.view = view.clone();
        }
    }

    fn set_thread_state(&mut self, handle: ThreadHandle, state: ThreadState) {
        if let Some(shown) = self.threads.lock().expect("threads lock").get_mut(&handle) {
            shown.state = state;
        }
    }

    fn dispose_thread(&mut self, handle: ThreadHandle) {
        self.threads.lock().expect("threads lock").remove(&handle);
        self.disposed.lock().expect("disposed lock").push(handle);
    }
}

#[derive(Default)]
pub struct CountingTree {
    pub refreshes: AtomicUsize,
}

impl TreeSurface for CountingTree {
    fn refresh(&self) {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Records every location it was asked to open; clones share the record.
#[derive(Clone, Default)]
pub struct RecordingNavigator {
    opened: Arc<Mutex<Vec<(PathBuf, u32)>>>,
}

impl RecordingNavigator {
    pub fn opened(&self) -> Vec<(PathBuf, u32)> {
        self.opened.lock().expect("opened lock").clone()
    }
}

impl Navigator for RecordingNavigator {
    fn open_at(&mut self, file: &Path, line: u32) -> NotesResult<()> {
        self.opened.lock().expect("opened lock").push((file.to_path_buf(), line));
        Ok(())
    }
}

/// Accepts the offered default path unless told otherwise.
#[derive(Default)]
pub struct FixedSaveDialog {
    pub chosen: Option<PathBuf>,
    pub cancel: bool,
    pub offered: Option<PathBuf>,
}

impl SaveDialog for FixedSaveDialog {
    fn choose_save_path(&mut self, default_path: &Path) -> Option<PathBuf> {
        self.offered = Some(default_path.to_path_buf());
        if self.cancel {
            return None;
        }
        Some(self.chosen.clone().unwrap_or_else(|| default_path.to_path_buf()))
    }
}
