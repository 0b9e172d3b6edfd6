//! Primitives the host environment provides. The note logic drives these but
//! never implements them; the terminal host and the tests supply their own.

use crate::errors::NotesResult;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

pub trait Notifier: Send + Sync {
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    Collapsed,
    Expanded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadContext {
    Draft,
    Note,
}

impl ThreadContext {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Note => "note",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadView {
    pub file: PathBuf,
    pub line: u32,
    pub label: String,
    pub body: String,
    pub author: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub context: ThreadContext,
}

/// Line-anchored comment threads shown next to a file.
pub trait CommentSurface: Send {
    fn create_thread(&mut self, view: &ThreadView, state: ThreadState) -> ThreadHandle;
    fn update_thread(&mut self, handle: ThreadHandle, view: &ThreadView);
    fn set_thread_state(&mut self, handle: ThreadHandle, state: ThreadState);
    fn dispose_thread(&mut self, handle: ThreadHandle);
}

/// Hierarchical listing; the host pulls nodes from the tree adapter after `refresh`.
pub trait TreeSurface: Send + Sync {
    fn refresh(&self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickOption {
    pub label: String,
    pub description: Option<String>,
    pub current: bool,
}

pub trait Picker: Send {
    /// Index of the chosen option, `None` when the user dismissed the prompt.
    fn pick(&mut self, title: &str, options: &[PickOption]) -> Option<usize>;
}

pub trait SaveDialog: Send {
    fn choose_save_path(&mut self, default_path: &Path) -> Option<PathBuf>;
}

pub trait Navigator: Send {
    fn open_at(&mut self, file: &Path, line: u32) -> NotesResult<()>;
}
