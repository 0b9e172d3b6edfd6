use super::format_timestamp;
use crate::errors::NotesError;
use crate::host::{Notifier, SaveDialog};
use crate::models::{Category, Note, NoteIndex, Priority};
use crate::sidecar::SidecarFs;
use crate::store::NoteStore;
use chrono::{DateTime, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

static FILE_NAME_UNSAFE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[:.]").expect("valid file name pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Markdown,
    Html,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Markdown => "md",
            Self::Html => "html",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = NotesError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "markdown" | "md" => Ok(Self::Markdown),
            "html" => Ok(Self::Html),
            other => Err(NotesError::InvalidInput(format!("unknown export format '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    pub key: String,
    pub notes: Vec<Note>,
}

/// Aggregated view of the whole index shared by both report formats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub total: usize,
    pub by_priority: Vec<(Priority, usize)>,
    pub by_category: Vec<(Category, usize)>,
    pub files: Vec<ExportFile>,
}

impl ExportReport {
    pub fn collect(index: &NoteIndex) -> Self {
        let files = index
            .iter()
            .filter(|(_, notes)| !notes.is_empty())
            .map(|(key, notes)| {
                let mut notes = notes.clone();
                notes.sort_by_key(|note| note.line);
                ExportFile {
                    key: key.clone(),
                    notes,
                }
            })
            .collect::<Vec<_>>();

        let all_notes = || files.iter().flat_map(|file| file.notes.iter());
        let by_priority = Priority::ALL
            .iter()
            .map(|priority| (*priority, all_notes().filter(|note| note.priority == *priority).count()))
            .collect();
        let by_category = Category::ALL
            .iter()
            .map(|category| (*category, all_notes().filter(|note| note.category == *category).count()))
            .collect();

        Self {
            total: all_notes().count(),
            by_priority,
            by_category,
            files,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

pub fn render(format: ExportFormat, report: &ExportReport, generated_at: DateTime<Utc>) -> String {
    match format {
        ExportFormat::Markdown => render_markdown(report, generated_at),
        ExportFormat::Html => render_html(report, generated_at),
    }
}

pub fn render_markdown(report: &ExportReport, generated_at: DateTime<Utc>) -> String {
    let mut out = String::new();
    out.push_str("# Review Notes\n\n");
    out.push_str(&format!("Generated {}\n\n", format_timestamp(generated_at)));
    out.push_str("## Summary\n\n");
    out.push_str(&format!("- Total notes: {}\n", report.total));
    for (priority, count) in &report.by_priority {
        out.push_str(&format!("- {} {}: {}\n", priority.icon(), priority.label(), count));
    }
    for (category, count) in &report.by_category {
        out.push_str(&format!("- {} {}: {}\n", category.icon(), category.label(), count));
    }

    for file in &report.files {
        out.push_str(&format!("\n## {}\n", file.key.trim_start_matches("./")));
        for note in &file.notes {
            out.push_str(&format!(
                "\n### Line {} · {} {} · {} {}\n\n",
                note.line + 1,
                note.category.icon(),
                note.category.label(),
                note.priority.icon(),
                note.priority.label()
            ));
            out.push_str(note.text.trim_end());
            out.push_str(&format!(
                "\n\n_{} · {}_\n",
                note.author,
                format_timestamp(note.timestamp)
            ));
        }
    }
    out
}

const HTML_STYLE: &str = "body{font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',sans-serif;max-width:960px;margin:2rem auto;padding:0 1rem;color:#1f2328}\
h1{border-bottom:1px solid #d0d7de;padding-bottom:.5rem}\
.summary{display:flex;flex-wrap:wrap;gap:.5rem;margin-bottom:2rem}\
.stat{background:#f6f8fa;border:1px solid #d0d7de;border-radius:6px;padding:.4rem .8rem}\
.file{margin-top:2rem}\
.note{border-left:4px solid #d0d7de;margin:1rem 0;padding:.5rem 1rem}\
.note.high{border-color:#cf222e}.note.medium{border-color:#bf8700}.note.low{border-color:#1a7f37}\
.meta{color:#656d76;font-size:.85rem}\
pre{white-space:pre-wrap;font-family:inherit;margin:.5rem 0}";

pub fn render_html(report: &ExportReport, generated_at: DateTime<Utc>) -> String {
    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    out.push_str("<title>Review Notes</title>\n");
    out.push_str(&format!("<style>{}</style>\n", HTML_STYLE));
    out.push_str("</head>\n<body>\n<h1>Review Notes</h1>\n");
    out.push_str(&format!(
        "<p class=\"meta\">Generated {}</p>\n",
        escape_html(&format_timestamp(generated_at))
    ));

    out.push_str("<div class=\"summary\">\n");
    out.push_str(&format!("<span class=\"stat\">Total notes: {}</span>\n", report.total));
    for (priority, count) in &report.by_priority {
        out.push_str(&format!(
            "<span class=\"stat\">{} {}: {}</span>\n",
            priority.icon(),
            priority.label(),
            count
        ));
    }
    for (category, count) in &report.by_category {
        out.push_str(&format!(
            "<span class=\"stat\">{} {}: {}</span>\n",
            category.icon(),
            category.label(),
            count
        ));
    }
    out.push_str("</div>\n");

    for file in &report.files {
        out.push_str(&format!(
            "<section class=\"file\">\n<h2>{}</h2>\n",
            escape_html(file.key.trim_start_matches("./"))
        ));
        for note in &file.notes {
            out.push_str(&format!("<div class=\"note {}\">\n", note.priority.as_str()));
            out.push_str(&format!(
                "<div><strong>Line {}</strong> · {} {} · {} {}</div>\n",
                note.line + 1,
                note.category.icon(),
                note.category.label(),
                note.priority.icon(),
                note.priority.label()
            ));
            out.push_str(&format!("<pre>{}</pre>\n", escape_html(note.text.trim_end())));
            out.push_str(&format!(
                "<div class=\"meta\">{} · {}</div>\n",
                escape_html(&note.author),
                escape_html(&format_timestamp(note.timestamp))
            ));
            out.push_str("</div>\n");
        }
        out.push_str("</section>\n");
    }
    out.push_str("</body>\n</html>\n");
    out
}

pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// `review-notes-2026-10-16T09-30-00-000Z.md`
pub fn default_file_name(format: ExportFormat, now: DateTime<Utc>) -> String {
    let stamp = now.to_rfc3339_opts(SecondsFormat::Millis, true);
    format!(
        "review-notes-{}.{}",
        FILE_NAME_UNSAFE.replace_all(&stamp, "-"),
        format.extension()
    )
}

pub struct ExportAdapter {
    store: NoteStore,
    fs: Arc<dyn SidecarFs>,
    notifier: Arc<dyn Notifier>,
}

impl ExportAdapter {
    pub fn new(store: NoteStore, fs: Arc<dyn SidecarFs>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, fs, notifier }
    }

    /// Writes a report of every note to a path chosen through `dialog`.
    /// Returns the written path, or `None` when there was nothing to export,
    /// the dialog was cancelled, or the write failed.
    pub async fn export(&self, format: ExportFormat, dialog: &mut dyn SaveDialog) -> Option<PathBuf> {
        let now = Utc::now();
        let report = ExportReport::collect(&self.store.get_all_notes());
        if report.is_empty() {
            self.notifier.warn("No review notes to export.");
            return None;
        }

        let default_path = self.store.root().join(default_file_name(format, now));
        let Some(path) = dialog.choose_save_path(&default_path) else {
            tracing::debug!("export cancelled");
            return None;
        };

        let contents = render(format, &report, now);
        match self.fs.write(&path, &contents).await {
            Ok(()) => {
                tracing::info!(path = %path.display(), notes = report.total, format = format.extension(), "exported review notes");
                self.notifier
                    .info(&format!("Exported {} review notes to {}", report.total, path.display()));
                Some(path)
            }
            Err(error) => {
                tracing::error!(path = %path.display(), error = %error, "failed to export review notes");
                self.notifier
                    .error(&format!("Failed to export review notes to {}: {}", path.display(), error));
                None
            }
        }
    }
}
