pub mod comments;
pub mod export;
pub mod tree;

use crate::models::Note;
use chrono::{DateTime, Utc};

pub(crate) fn note_label(note: &Note) -> String {
    format!(
        "{} {} · {} {}",
        note.category.icon(),
        note.category.label(),
        note.priority.icon(),
        note.priority.label()
    )
}

pub(crate) fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M UTC").to_string()
}

/// First line of the note text, shortened to `max_chars`.
pub(crate) fn summary(text: &str, max_chars: usize) -> String {
    let first_line = text.lines().map(str::trim).find(|line| !line.is_empty()).unwrap_or("");
    if first_line.chars().count() <= max_chars {
        return first_line.to_string();
    }
    let mut shortened = first_line.chars().take(max_chars.saturating_sub(1)).collect::<String>();
    shortened.push('…');
    shortened
}
