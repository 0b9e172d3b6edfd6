use crate::debounce::{Debouncer, Executor, ExecutorFuture};
use crate::errors::NotesResult;
use crate::host::Notifier;
use crate::models::{Category, Note, NoteId, NoteIndex, NoteRecord, Priority};
use crate::paths;
use crate::settings::Settings;
use crate::sidecar::{create_sidecar_watcher, SidecarFs};
use chrono::{DateTime, Utc};
use notify::RecommendedWatcher;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError, Weak};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

type Listener = Arc<dyn Fn() + Send + Sync>;

/// Single owner of the note index for one project root and of its sidecar file.
///
/// Clones share the same index. Mutations schedule a debounced save and must
/// run inside a Tokio runtime. I/O failures never escape: they are logged and
/// reported through the [`Notifier`].
#[derive(Clone)]
pub struct NoteStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    root: PathBuf,
    sidecar_path: PathBuf,
    fs: Arc<dyn SidecarFs>,
    notifier: Arc<dyn Notifier>,
    index: StdMutex<NoteIndex>,
    listeners: StdMutex<Vec<(u64, Listener)>>,
    next_listener_id: AtomicU64,
    // Sidecar content as of our last load or save; lets the watcher skip our own writes.
    last_synced: StdMutex<Option<String>>,
    write_lock: Mutex<()>,
    saver: Debouncer,
}

impl NoteStore {
    pub fn new(
        root: impl Into<PathBuf>,
        settings: &Settings,
        fs: Arc<dyn SidecarFs>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let root = paths::normalize_lexically(&root.into());
        let sidecar_path = root.join(&settings.sidecar_file);
        let delay = settings.save_debounce();

        let inner = Arc::new_cyclic(|weak: &Weak<StoreInner>| {
            let weak = weak.clone();
            let executor: Executor = Arc::new(move || {
                let weak = weak.clone();
                let future: ExecutorFuture = Box::pin(async move {
                    if let Some(inner) = weak.upgrade() {
                        NoteStore { inner }.save_now().await;
                    }
                });
                future
            });

            StoreInner {
                root,
                sidecar_path,
                fs,
                notifier,
                index: StdMutex::new(NoteIndex::new()),
                listeners: StdMutex::new(Vec::new()),
                next_listener_id: AtomicU64::new(1),
                last_synced: StdMutex::new(None),
                write_lock: Mutex::new(()),
                saver: Debouncer::new(delay, executor),
            }
        });

        Self { inner }
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    pub fn sidecar_path(&self) -> &Path {
        &self.inner.sidecar_path
    }

    pub fn key_for(&self, file: &Path) -> String {
        paths::relative_key(&self.inner.root, file)
    }

    pub fn absolute_path(&self, key: &str) -> PathBuf {
        paths::absolute_path(&self.inner.root, key)
    }

    /// Replaces the index with the sidecar contents. A missing file yields an
    /// empty index; an unreadable or unparsable one yields an empty index and a
    /// warning. Returns the number of notes loaded.
    pub async fn load(&self) -> usize {
        let path = self.inner.sidecar_path.display().to_string();
        let (index, raw) = match self.inner.fs.read_to_string(&self.inner.sidecar_path).await {
            Ok(None) => (NoteIndex::new(), None),
            Ok(Some(raw)) => match parse_index(&raw, Utc::now()) {
                Ok(index) => (index, Some(raw)),
                Err(error) => {
                    self.report_load_failure(&path, &error.to_string());
                    (NoteIndex::new(), Some(raw))
                }
            },
            Err(error) => {
                self.report_load_failure(&path, &error.to_string());
                (NoteIndex::new(), None)
            }
        };

        let count = count_notes(&index);
        tracing::info!(path = %path, files = index.len(), notes = count, "loaded review notes");
        *lock(&self.inner.index) = index;
        *lock(&self.inner.last_synced) = raw;
        count
    }

    pub fn get_notes_for_file(&self, file: &Path) -> Vec<Note> {
        let key = self.key_for(file);
        self.get_notes_for_key(&key)
    }

    pub fn get_notes_for_key(&self, key: &str) -> Vec<Note> {
        lock(&self.inner.index).get(key).cloned().unwrap_or_default()
    }

    pub fn get_all_notes(&self) -> NoteIndex {
        lock(&self.inner.index).clone()
    }

    pub fn get_note_by_id(&self, id: &NoteId) -> Option<(String, Note)> {
        lock(&self.inner.index).iter().find_map(|(key, notes)| {
            notes
                .iter()
                .find(|note| &note.id == id)
                .map(|note| (key.clone(), note.clone()))
        })
    }

    pub fn note_count(&self) -> usize {
        count_notes(&lock(&self.inner.index))
    }

    pub fn add_note(&self, file: &Path, note: Note) {
        let key = self.key_for(file);
        tracing::debug!(file = %key, note_id = %note.id, line = note.line, "adding note");
        lock(&self.inner.index).entry(key).or_default().push(note);
        self.save();
    }

    pub fn update_note(&self, file: &Path, id: &NoteId, text: &str) -> Option<Note> {
        let key = self.key_for(file);
        let updated = {
            let mut index = lock(&self.inner.index);
            let note = index.get_mut(&key)?.iter_mut().find(|note| &note.id == id)?;
            note.text = text.to_string();
            note.touch(Utc::now());
            note.clone()
        };
        self.save();
        Some(updated)
    }

    pub fn update_note_priority(&self, id: &NoteId, priority: Priority) -> Option<Note> {
        self.modify_by_id(id, |note| note.priority = priority)
    }

    pub fn update_note_category(&self, id: &NoteId, category: Category) -> Option<Note> {
        self.modify_by_id(id, |note| note.category = category)
    }

    /// Removes the note and drops the file key once it has no notes left.
    /// Unknown ids are ignored.
    pub fn delete_note(&self, file: &Path, id: &NoteId) -> bool {
        let key = self.key_for(file);
        let removed = {
            let mut index = lock(&self.inner.index);
            let Some(notes) = index.get_mut(&key) else {
                return false;
            };
            let before = notes.len();
            notes.retain(|note| &note.id != id);
            let removed = notes.len() != before;
            if notes.is_empty() {
                index.remove(&key);
            }
            removed
        };
        if removed {
            tracing::debug!(file = %key, note_id = %id, "deleted note");
            self.save();
        }
        removed
    }

    /// Schedules a save once edits have been quiet for the debounce delay.
    pub fn save(&self) {
        self.inner.saver.trigger();
    }

    pub fn has_pending_save(&self) -> bool {
        self.inner.saver.is_pending()
    }

    /// Writes a pending debounced save right away.
    pub async fn flush(&self) -> bool {
        self.inner.saver.flush().await
    }

    /// Serialises the index and overwrites the sidecar file. On failure the
    /// in-memory index is kept; the next successful save carries everything.
    pub async fn save_now(&self) -> bool {
        let _guard = self.inner.write_lock.lock().await;
        let path = self.inner.sidecar_path.display().to_string();
        let snapshot = self.get_all_notes();
        let contents = match render_index(&snapshot) {
            Ok(contents) => contents,
            Err(error) => {
                tracing::error!(path = %path, error = %error, "failed to serialise review notes");
                self.inner.notifier.warn(&format!("Failed to save review notes: {}", error));
                return false;
            }
        };

        let previous = lock(&self.inner.last_synced).replace(contents.clone());
        match self.inner.fs.write(&self.inner.sidecar_path, &contents).await {
            Ok(()) => {
                tracing::debug!(path = %path, notes = count_notes(&snapshot), "saved review notes");
                true
            }
            Err(error) => {
                *lock(&self.inner.last_synced) = previous;
                tracing::error!(path = %path, error = %error, "failed to save review notes");
                self.inner.notifier.warn(&format!("Failed to save review notes to {}: {}", path, error));
                false
            }
        }
    }

    /// Registers a listener fired after every external reload. The listener
    /// stays registered until the returned [`Subscription`] is dropped.
    pub fn subscribe(&self, listener: impl Fn() + Send + Sync + 'static) -> Subscription {
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::SeqCst);
        lock(&self.inner.listeners).push((id, Arc::new(listener)));
        Subscription {
            store: Arc::downgrade(&self.inner),
            id,
        }
    }

    /// Re-reads the sidecar after it changed on disk and replaces the index
    /// wholesale; unsaved in-memory edits are discarded. Content identical to
    /// what this store last loaded or wrote is ignored. Returns whether a reload
    /// happened.
    pub async fn reload_external(&self) -> bool {
        // Held through the swap so a save in flight is never read half-written
        // and never lands after the reload with a stale snapshot.
        let _guard = self.inner.write_lock.lock().await;
        let path = self.inner.sidecar_path.display().to_string();
        let raw = match self.inner.fs.read_to_string(&self.inner.sidecar_path).await {
            Ok(raw) => raw,
            Err(error) => {
                self.report_load_failure(&path, &error.to_string());
                return false;
            }
        };

        if raw == *lock(&self.inner.last_synced) {
            tracing::trace!(path = %path, "sidecar unchanged, skipping reload");
            return false;
        }

        let index = match raw.as_deref().map(|raw| parse_index(raw, Utc::now())) {
            None => NoteIndex::new(),
            Some(Ok(index)) => index,
            Some(Err(error)) => {
                self.report_load_failure(&path, &error.to_string());
                NoteIndex::new()
            }
        };

        self.inner.saver.cancel();
        tracing::info!(path = %path, files = index.len(), notes = count_notes(&index), "reloaded review notes after external change");
        *lock(&self.inner.index) = index;
        *lock(&self.inner.last_synced) = raw;
        self.notify_listeners();
        true
    }

    /// Watches the sidecar file. Every detected external change reloads the
    /// index, notifies listeners, then calls `on_change`.
    pub fn watch(&self, on_change: impl Fn() + Send + Sync + 'static) -> NotesResult<SidecarWatch> {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<()>();
        let watcher = create_sidecar_watcher(&self.inner.sidecar_path, event_tx)?;

        let store = self.clone();
        let task = tokio::spawn(async move {
            while event_rx.recv().await.is_some() {
                if store.reload_external().await {
                    on_change();
                }
            }
        });

        tracing::info!(path = %self.inner.sidecar_path.display(), "watching sidecar file");
        Ok(SidecarWatch {
            watcher: Some(watcher),
            task,
        })
    }

    fn modify_by_id(&self, id: &NoteId, apply: impl FnOnce(&mut Note)) -> Option<Note> {
        let updated = {
            let mut index = lock(&self.inner.index);
            let note = index
                .values_mut()
                .flat_map(|notes| notes.iter_mut())
                .find(|note| &note.id == id)?;
            apply(note);
            note.touch(Utc::now());
            note.clone()
        };
        self.save();
        Some(updated)
    }

    fn notify_listeners(&self) {
        let listeners = lock(&self.inner.listeners)
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect::<Vec<_>>();
        for listener in listeners {
            listener();
        }
    }

    fn report_load_failure(&self, path: &str, error: &str) {
        tracing::error!(path = %path, error = %error, "failed to load review notes");
        self.inner
            .notifier
            .warn(&format!("Could not load review notes from {}: {}", path, error));
    }
}

pub struct Subscription {
    store: Weak<StoreInner>,
    id: u64,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.store.upgrade() {
            lock(&inner.listeners).retain(|(id, _)| *id != self.id);
        }
    }
}

/// Live watch on the sidecar file; dropping it stops watching.
pub struct SidecarWatch {
    watcher: Option<RecommendedWatcher>,
    task: JoinHandle<()>,
}

impl Drop for SidecarWatch {
    fn drop(&mut self) {
        self.watcher.take();
        self.task.abort();
    }
}

/// Decodes a sidecar document. Records that cannot be decoded are skipped;
/// missing optional fields are backfilled by [`NoteRecord::migrate`].
pub fn parse_index(raw: &str, now: DateTime<Utc>) -> NotesResult<NoteIndex> {
    if raw.trim().is_empty() {
        return Ok(NoteIndex::new());
    }

    let document: BTreeMap<String, Vec<Value>> = serde_json::from_str(raw)?;
    let mut index = NoteIndex::new();
    for (key, records) in document {
        let key = paths::normalize_key(&key);
        for record in records {
            match serde_json::from_value::<NoteRecord>(record) {
                Ok(record) => index.entry(key.clone()).or_default().push(record.migrate(now)),
                Err(error) => {
                    tracing::warn!(file = %key, error = %error, "skipping malformed note record");
                }
            }
        }
    }
    Ok(index)
}

pub fn render_index(index: &NoteIndex) -> NotesResult<String> {
    let non_empty = index
        .iter()
        .filter(|(_, notes)| !notes.is_empty())
        .collect::<BTreeMap<_, _>>();
    Ok(serde_json::to_string_pretty(&non_empty)?)
}

fn count_notes(index: &NoteIndex) -> usize {
    index.values().map(Vec::len).sum()
}

fn lock<T>(mutex: &StdMutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
