use crate::errors::NotesError;
use chrono::{DateTime, Duration, SubsecRound, Utc};
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const UNKNOWN_AUTHOR: &str = "Unknown";

const ID_SUFFIX_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_SUFFIX_LEN: usize = 9;

/// Notes per workspace-relative file key (`./src/main.rs`).
///
/// A key is only present while its sequence is non-empty. Notes keep insertion
/// order; callers that want line order sort on read.
pub type NoteIndex = BTreeMap<String, Vec<Note>>;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(String);

impl NoteId {
    pub fn generate(now: DateTime<Utc>) -> Self {
        let mut rng = rand::rng();
        let suffix = (0..ID_SUFFIX_LEN)
            .map(|_| ID_SUFFIX_ALPHABET[rng.random_range(0..ID_SUFFIX_ALPHABET.len())] as char)
            .collect::<String>();
        Self(format!("{}-{}", now.timestamp_millis(), suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NoteId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for NoteId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Todo,
    Bug,
    Question,
    Idea,
    #[default]
    Note,
}

impl Category {
    pub const ALL: [Category; 5] = [Self::Todo, Self::Bug, Self::Question, Self::Idea, Self::Note];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::Bug => "bug",
            Self::Question => "question",
            Self::Idea => "idea",
            Self::Note => "note",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Todo => "TODO",
            Self::Bug => "Bug",
            Self::Question => "Question",
            Self::Idea => "Idea",
            Self::Note => "Note",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            Self::Todo => "📋",
            Self::Bug => "🐛",
            Self::Question => "❓",
            Self::Idea => "💡",
            Self::Note => "📝",
        }
    }
}

impl FromStr for Category {
    type Err = NotesError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == normalized)
            .ok_or_else(|| NotesError::InvalidInput(format!("Unknown category '{}'", value)))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `Default` is `Medium`: the value backfilled for records that predate the
/// field and used by [`Note::with_defaults`]. Interactive creation takes its
/// priority from `Settings::new_note_priority` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Self::High, Self::Medium, Self::Low];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            Self::High => "🔴",
            Self::Medium => "🟡",
            Self::Low => "🟢",
        }
    }
}

impl FromStr for Priority {
    type Err = NotesError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|priority| priority.as_str() == normalized)
            .ok_or_else(|| NotesError::InvalidInput(format!("Unknown priority '{}'", value)))
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub line: u32,
    pub text: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub author: String,
    pub priority: Priority,
    pub category: Category,
}

impl Note {
    pub fn new(
        line: u32,
        text: impl Into<String>,
        author: impl Into<String>,
        category: Category,
        priority: Priority,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: NoteId::generate(now),
            line,
            text: text.into(),
            timestamp: now.trunc_subsecs(3),
            author: author.into(),
            priority,
            category,
        }
    }

    pub fn with_defaults(line: u32, text: impl Into<String>, author: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self::new(line, text, author, Category::default(), Priority::default(), now)
    }

    /// Moves `timestamp` forward to `now`, or one millisecond past the
    /// previous value when the clock has not advanced. Timestamps are kept at
    /// millisecond precision, as stored on disk.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        let floor = self.timestamp + Duration::milliseconds(1);
        self.timestamp = now.trunc_subsecs(3).max(floor);
    }
}

/// A note as found on disk. Files written before priorities, categories and
/// authors existed omit those fields.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NoteRecord {
    pub id: NoteId,
    pub line: u32,
    pub text: String,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default, deserialize_with = "lenient_enum")]
    pub priority: Option<Priority>,
    #[serde(default, deserialize_with = "lenient_enum")]
    pub category: Option<Category>,
}

impl NoteRecord {
    pub fn migrate(self, now: DateTime<Utc>) -> Note {
        Note {
            id: self.id,
            line: self.line,
            text: self.text,
            timestamp: self.timestamp.unwrap_or_else(|| now.trunc_subsecs(3)),
            author: self.author.unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()),
            priority: self.priority.unwrap_or_default(),
            category: self.category.unwrap_or_default(),
        }
    }
}

fn lenient_enum<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| value.parse().ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000).single().expect("valid timestamp")
    }

    #[test]
    fn generated_ids_carry_timestamp_and_suffix() {
        let id = NoteId::generate(fixed_now());
        let (millis, suffix) = id.as_str().split_once('-').expect("id separator");
        assert_eq!(millis, "1700000000000");
        assert_eq!(suffix.len(), 9);
        assert!(suffix.bytes().all(|byte| ID_SUFFIX_ALPHABET.contains(&byte)));
        assert_ne!(NoteId::generate(fixed_now()), id);
    }

    #[test]
    fn migration_backfills_missing_fields() {
        let record: NoteRecord =
            serde_json::from_str(r#"{"id":"1-abc","line":4,"text":"old note"}"#).expect("legacy record");
        let note = record.migrate(fixed_now());
        assert_eq!(note.priority, Priority::Medium);
        assert_eq!(note.category, Category::Note);
        assert_eq!(note.author, UNKNOWN_AUTHOR);
        assert_eq!(note.timestamp, fixed_now());
        assert_eq!(note.line, 4);
        assert_eq!(note.text, "old note");
    }

    #[test]
    fn backfilled_timestamp_drops_sub_millisecond_precision() {
        let record: NoteRecord =
            serde_json::from_str(r#"{"id":"1-abc","line":4,"text":"old note"}"#).expect("legacy record");
        let now = fixed_now() + Duration::nanoseconds(380_247_920);
        let note = record.migrate(now);
        assert_eq!(note.timestamp, fixed_now() + Duration::milliseconds(380));
    }

    #[test]
    fn migration_keeps_present_fields() {
        let record: NoteRecord = serde_json::from_str(
            r#"{"id":"1-abc","line":0,"text":"t","timestamp":1600000000000,"author":"ana","priority":"high","category":"bug"}"#,
        )
        .expect("full record");
        let note = record.migrate(fixed_now());
        assert_eq!(note.priority, Priority::High);
        assert_eq!(note.category, Category::Bug);
        assert_eq!(note.author, "ana");
        assert_eq!(note.timestamp.timestamp_millis(), 1_600_000_000_000);
    }

    #[test]
    fn unknown_enum_values_fall_back_to_defaults() {
        let record: NoteRecord = serde_json::from_str(
            r#"{"id":"1-abc","line":0,"text":"t","priority":"urgent","category":"chore"}"#,
        )
        .expect("record with unknown enums");
        let note = record.migrate(fixed_now());
        assert_eq!(note.priority, Priority::Medium);
        assert_eq!(note.category, Category::Note);
    }

    #[test]
    fn touch_is_strictly_increasing() {
        let mut note = Note::with_defaults(1, "x", "me", fixed_now());
        let before = note.timestamp;
        note.touch(fixed_now());
        assert!(note.timestamp > before);
        let later = fixed_now() + Duration::seconds(5);
        note.touch(later);
        assert_eq!(note.timestamp, later);
    }

    #[test]
    fn note_serializes_with_sidecar_field_names() {
        let note = Note::new(10, "fix this", "me", Category::Note, Priority::Low, fixed_now());
        let value = serde_json::to_value(&note).expect("serialize note");
        assert_eq!(value["line"], 10);
        assert_eq!(value["timestamp"], 1_700_000_000_000_i64);
        assert_eq!(value["priority"], "low");
        assert_eq!(value["category"], "note");
    }

    #[test]
    fn parses_enum_names_case_insensitively() {
        assert_eq!("TODO".parse::<Category>().expect("category"), Category::Todo);
        assert_eq!(" high ".parse::<Priority>().expect("priority"), Priority::High);
        assert!("blocker".parse::<Priority>().is_err());
    }
}
