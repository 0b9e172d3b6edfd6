use super::note_label;
use crate::errors::{NotesError, NotesResult};
use crate::host::{CommentSurface, PickOption, Picker, ThreadContext, ThreadHandle, ThreadState, ThreadView};
use crate::models::{Category, Note, NoteId, Priority};
use crate::store::NoteStore;
use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
enum ThreadBinding {
    Draft { file: PathBuf, key: String, line: u32 },
    Note { file: PathBuf, key: String, note_id: NoteId },
}

impl ThreadBinding {
    fn key(&self) -> &str {
        match self {
            Self::Draft { key, .. } | Self::Note { key, .. } => key,
        }
    }
}

/// Shows the notes of open files as comment threads and turns thread actions
/// into store calls. Which note a thread shows is tracked here, keyed by the
/// handle the surface issued.
pub struct CommentAdapter {
    store: NoteStore,
    surface: Box<dyn CommentSurface>,
    author: String,
    new_note_priority: Priority,
    threads: HashMap<ThreadHandle, ThreadBinding>,
}

impl CommentAdapter {
    pub fn new(
        store: NoteStore,
        surface: Box<dyn CommentSurface>,
        author: impl Into<String>,
        new_note_priority: Priority,
    ) -> Self {
        Self {
            store,
            surface,
            author: author.into(),
            new_note_priority,
            threads: HashMap::new(),
        }
    }

    /// Replaces every thread shown for `file` with one collapsed thread per
    /// stored note. Returns the number of notes shown.
    pub fn render_notes_for_file(&mut self, file: &Path) -> usize {
        self.clear_threads_for_file(file);

        let key = self.store.key_for(file);
        let notes = self.store.get_notes_for_file(file);
        for note in &notes {
            let handle = self
                .surface
                .create_thread(&note_view(file, note), ThreadState::Collapsed);
            self.threads.insert(
                handle,
                ThreadBinding::Note {
                    file: file.to_path_buf(),
                    key: key.clone(),
                    note_id: note.id.clone(),
                },
            );
        }
        tracing::debug!(file = %key, threads = notes.len(), "rendered note threads");
        notes.len()
    }

    pub fn begin_note(&mut self, file: &Path, line: u32) -> ThreadHandle {
        let view = ThreadView {
            file: file.to_path_buf(),
            line,
            label: "New review note".to_string(),
            body: String::new(),
            author: self.author.clone(),
            timestamp: None,
            context: ThreadContext::Draft,
        };
        let handle = self.surface.create_thread(&view, ThreadState::Expanded);
        self.threads.insert(
            handle,
            ThreadBinding::Draft {
                file: file.to_path_buf(),
                key: self.store.key_for(file),
                line,
            },
        );
        handle
    }

    pub fn submit_draft(&mut self, handle: ThreadHandle, text: &str) -> NotesResult<Note> {
        let Some(ThreadBinding::Draft { file, key, line }) = self.threads.get(&handle).cloned() else {
            return Err(NotesError::NotFound(format!("No draft thread {}", handle.0)));
        };
        if text.trim().is_empty() {
            return Err(NotesError::InvalidInput("Note text cannot be empty".to_string()));
        }

        let note = Note::new(
            line,
            text,
            self.author.clone(),
            Category::default(),
            self.new_note_priority,
            Utc::now(),
        );
        self.store.add_note(&file, note.clone());
        self.surface.update_thread(handle, &note_view(&file, &note));
        self.surface.set_thread_state(handle, ThreadState::Expanded);
        tracing::info!(file = %key, line, note_id = %note.id, "created review note");
        self.threads.insert(
            handle,
            ThreadBinding::Note {
                file,
                key,
                note_id: note.id.clone(),
            },
        );
        Ok(note)
    }

    pub fn create_note(&mut self, file: &Path, line: u32, text: &str) -> NotesResult<(ThreadHandle, Note)> {
        let handle = self.begin_note(file, line);
        match self.submit_draft(handle, text) {
            Ok(note) => Ok((handle, note)),
            Err(error) => {
                self.discard_draft(handle);
                Err(error)
            }
        }
    }

    /// Drops an unsubmitted draft. Threads showing stored notes are left alone.
    pub fn discard_draft(&mut self, handle: ThreadHandle) -> bool {
        if !matches!(self.threads.get(&handle), Some(ThreadBinding::Draft { .. })) {
            return false;
        }
        self.threads.remove(&handle);
        self.surface.dispose_thread(handle);
        true
    }

    pub fn edit_note(&mut self, handle: ThreadHandle, text: &str) -> Option<Note> {
        let (file, note_id) = self.bound_note_id(handle)?;
        let updated = self.store.update_note(&file, &note_id, text)?;
        self.refresh_thread(handle, &file, &updated);
        Some(updated)
    }

    pub fn set_category(&mut self, handle: ThreadHandle, category: Category) -> Option<Note> {
        let (file, note_id) = self.bound_note_id(handle)?;
        let updated = self.store.update_note_category(&note_id, category)?;
        self.refresh_thread(handle, &file, &updated);
        Some(updated)
    }

    pub fn set_priority(&mut self, handle: ThreadHandle, priority: Priority) -> Option<Note> {
        let (file, note_id) = self.bound_note_id(handle)?;
        let updated = self.store.update_note_priority(&note_id, priority)?;
        self.refresh_thread(handle, &file, &updated);
        Some(updated)
    }

    /// Asks for a category, then a priority. Dismissing the category prompt
    /// aborts; dismissing the priority prompt keeps the current priority. Only
    /// fields that actually changed are written. Returns the updated note when
    /// something changed.
    pub fn change_category_and_priority(&mut self, handle: ThreadHandle, picker: &mut dyn Picker) -> Option<Note> {
        let (file, note_id) = self.bound_note_id(handle)?;
        let (_, current) = self.store.get_note_by_id(&note_id)?;

        let category_options = Category::ALL
            .iter()
            .map(|category| PickOption {
                label: format!("{} {}", category.icon(), category.label()),
                description: None,
                current: *category == current.category,
            })
            .collect::<Vec<_>>();
        let category = picker
            .pick("Select category", &category_options)
            .and_then(|index| Category::ALL.get(index).copied())?;

        let priority_options = Priority::ALL
            .iter()
            .map(|priority| PickOption {
                label: format!("{} {}", priority.icon(), priority.label()),
                description: None,
                current: *priority == current.priority,
            })
            .collect::<Vec<_>>();
        let priority = picker
            .pick("Select priority", &priority_options)
            .and_then(|index| Priority::ALL.get(index).copied())
            .unwrap_or(current.priority);

        let mut updated = None;
        if category != current.category {
            updated = self.store.update_note_category(&note_id, category);
        }
        if priority != current.priority {
            updated = self.store.update_note_priority(&note_id, priority).or(updated);
        }

        let updated = updated?;
        self.refresh_thread(handle, &file, &updated);
        Some(updated)
    }

    /// Deletes the note behind the thread and disposes the thread. The thread
    /// is untracked even if the store no longer knew the note.
    pub fn delete_note(&mut self, handle: ThreadHandle) -> bool {
        let Some(binding) = self.threads.remove(&handle) else {
            return false;
        };
        self.surface.dispose_thread(handle);
        match binding {
            ThreadBinding::Note { file, note_id, .. } => self.store.delete_note(&file, &note_id),
            ThreadBinding::Draft { .. } => false,
        }
    }

    pub fn expand_thread_for_note(&mut self, file: &Path, note_id: &NoteId) -> Option<ThreadHandle> {
        if self.thread_for_note(file, note_id).is_none() {
            self.render_notes_for_file(file);
        }
        let handle = self.thread_for_note(file, note_id)?;
        self.surface.set_thread_state(handle, ThreadState::Expanded);
        Some(handle)
    }

    pub fn thread_for_note(&self, file: &Path, note_id: &NoteId) -> Option<ThreadHandle> {
        let wanted = self.store.key_for(file);
        self.threads.iter().find_map(|(handle, binding)| match binding {
            ThreadBinding::Note { key, note_id: id, .. } if *key == wanted && id == note_id => Some(*handle),
            _ => None,
        })
    }

    pub fn note_for_thread(&self, handle: ThreadHandle) -> Option<Note> {
        match self.threads.get(&handle)? {
            ThreadBinding::Note { note_id, .. } => self.store.get_note_by_id(note_id).map(|(_, note)| note),
            ThreadBinding::Draft { .. } => None,
        }
    }

    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }

    pub fn clear_threads_for_file(&mut self, file: &Path) -> usize {
        let key = self.store.key_for(file);
        let handles = self
            .threads
            .iter()
            .filter(|(_, binding)| binding.key() == key)
            .map(|(handle, _)| *handle)
            .collect::<Vec<_>>();
        for handle in &handles {
            self.threads.remove(handle);
            self.surface.dispose_thread(*handle);
        }
        handles.len()
    }

    pub fn clear_all_threads(&mut self) {
        for (handle, _) in self.threads.drain() {
            self.surface.dispose_thread(handle);
        }
    }

    /// Disposes every thread and hands the surface back to the host.
    pub fn dispose(mut self) -> Box<dyn CommentSurface> {
        self.clear_all_threads();
        std::mem::replace(&mut self.surface, Box::new(DetachedSurface))
    }

    fn bound_note_id(&self, handle: ThreadHandle) -> Option<(PathBuf, NoteId)> {
        match self.threads.get(&handle)? {
            ThreadBinding::Note { file, note_id, .. } => Some((file.clone(), note_id.clone())),
            ThreadBinding::Draft { .. } => None,
        }
    }

    fn refresh_thread(&mut self, handle: ThreadHandle, file: &Path, note: &Note) {
        self.surface.update_thread(handle, &note_view(file, note));
        self.surface.set_thread_state(handle, ThreadState::Expanded);
    }
}

impl Drop for CommentAdapter {
    fn drop(&mut self) {
        self.clear_all_threads();
    }
}

struct DetachedSurface;

impl CommentSurface for DetachedSurface {
    fn create_thread(&mut self, _view: &ThreadView, _state: ThreadState) -> ThreadHandle {
        ThreadHandle(0)
    }

    fn update_thread(&mut self, _handle: ThreadHandle, _view: &ThreadView) {}

    fn set_thread_state(&mut self, _handle: ThreadHandle, _state: ThreadState) {}

    fn dispose_thread(&mut self, _handle: ThreadHandle) {}
}

fn note_view(file: &Path, note: &Note) -> ThreadView {
    ThreadView {
        file: file.to_path_buf(),
        line: note.line,
        label: note_label(note),
        body: note.text.clone(),
        author: note.author.clone(),
        timestamp: Some(note.timestamp),
        context: ThreadContext::Note,
    }
}
