use super::{format_timestamp, note_label, summary};
use crate::host::TreeSurface;
use crate::models::{Note, NoteId};
use crate::store::{NoteStore, Subscription};
use std::path::PathBuf;
use std::sync::Arc;

const LABEL_SUMMARY_CHARS: usize = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeNode {
    File {
        key: String,
        path: PathBuf,
        note_count: usize,
    },
    Note {
        key: String,
        path: PathBuf,
        note: Note,
    },
}

impl TreeNode {
    pub fn label(&self) -> String {
        match self {
            Self::File { key, .. } => key.trim_start_matches("./").to_string(),
            Self::Note { note, .. } => format!("Line {}: {}", note.line + 1, summary(&note.text, LABEL_SUMMARY_CHARS)),
        }
    }

    pub fn description(&self) -> String {
        match self {
            Self::File { note_count: 1, .. } => "1 note".to_string(),
            Self::File { note_count, .. } => format!("{} notes", note_count),
            Self::Note { note, .. } => format!("{} · {}", note_label(note), note.author),
        }
    }

    pub fn tooltip(&self) -> String {
        match self {
            Self::File { path, .. } => path.display().to_string(),
            Self::Note { note, .. } => format!("{}\n\n{}, {}", note.text, note.author, format_timestamp(note.timestamp)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigateTarget {
    pub file: PathBuf,
    pub line: u32,
    pub note_id: NoteId,
}

/// Lists every note of the project as file → notes, independent of which
/// file is open. The host is asked to refresh whenever the store reloads.
pub struct TreeAdapter {
    store: NoteStore,
    surface: Arc<dyn TreeSurface>,
    _subscription: Subscription,
}

impl TreeAdapter {
    pub fn new(store: NoteStore, surface: Arc<dyn TreeSurface>) -> Self {
        let listener_surface = surface.clone();
        let subscription = store.subscribe(move || listener_surface.refresh());
        Self {
            store,
            surface,
            _subscription: subscription,
        }
    }

    pub fn refresh(&self) {
        self.surface.refresh();
    }

    /// Files with at least one note, sorted by path.
    pub fn roots(&self) -> Vec<TreeNode> {
        self.store
            .get_all_notes()
            .into_iter()
            .filter(|(_, notes)| !notes.is_empty())
            .map(|(key, notes)| TreeNode::File {
                path: self.store.absolute_path(&key),
                key,
                note_count: notes.len(),
            })
            .collect()
    }

    /// Notes of a file node sorted by line; notes on the same line keep
    /// insertion order.
    pub fn children(&self, node: &TreeNode) -> Vec<TreeNode> {
        let TreeNode::File { key, path, .. } = node else {
            return Vec::new();
        };
        let mut notes = self.store.get_notes_for_key(key);
        notes.sort_by_key(|note| note.line);
        notes
            .into_iter()
            .map(|note| TreeNode::Note {
                key: key.clone(),
                path: path.clone(),
                note,
            })
            .collect()
    }

    pub fn navigate_target(&self, node: &TreeNode) -> Option<NavigateTarget> {
        match node {
            TreeNode::Note { path, note, .. } => Some(NavigateTarget {
                file: path.clone(),
                line: note.line,
                note_id: note.id.clone(),
            }),
            TreeNode::File { .. } => None,
        }
    }
}
