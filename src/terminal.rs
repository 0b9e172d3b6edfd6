//! Host primitives for running in a plain terminal.

use crate::errors::NotesResult;
use crate::host::{
    CommentSurface, Navigator, Notifier, PickOption, Picker, SaveDialog, ThreadHandle, ThreadState, ThreadView,
    TreeSurface,
};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn info(&self, message: &str) {
        eprintln!("{}", message);
    }

    fn warn(&self, message: &str) {
        eprintln!("warning: {}", message);
    }

    fn error(&self, message: &str) {
        eprintln!("error: {}", message);
    }
}

/// Prints threads as they are created or changed. Collapsed threads show a
/// single line; expanded ones include the note body.
#[derive(Debug, Default)]
pub struct ConsoleComments {
    next_handle: u64,
}

impl ConsoleComments {
    fn print(&self, handle: ThreadHandle, view: &ThreadView, state: ThreadState) {
        let mut out = std::io::stdout().lock();
        let _ = writeln!(
            out,
            "[{}] {}:{} {} ({})",
            handle.0,
            view.file.display(),
            view.line + 1,
            view.label,
            view.author
        );
        if state == ThreadState::Expanded && !view.body.is_empty() {
            for line in view.body.lines() {
                let _ = writeln!(out, "    {}", line);
            }
        }
    }
}

impl CommentSurface for ConsoleComments {
    fn create_thread(&mut self, view: &ThreadView, state: ThreadState) -> ThreadHandle {
        self.next_handle += 1;
        let handle = ThreadHandle(self.next_handle);
        self.print(handle, view, state);
        handle
    }

    fn update_thread(&mut self, handle: ThreadHandle, view: &ThreadView) {
        self.print(handle, view, ThreadState::Expanded);
    }

    fn set_thread_state(&mut self, handle: ThreadHandle, state: ThreadState) {
        tracing::trace!(thread = handle.0, state = ?state, "thread state changed");
    }

    fn dispose_thread(&mut self, handle: ThreadHandle) {
        tracing::trace!(thread = handle.0, "thread disposed");
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleTree;

impl TreeSurface for ConsoleTree {
    fn refresh(&self) {
        eprintln!("review notes changed on disk");
    }
}

/// Numbered menu on stdout answered through stdin. An empty answer dismisses it.
#[derive(Debug, Default)]
pub struct StdinPicker;

impl Picker for StdinPicker {
    fn pick(&mut self, title: &str, options: &[PickOption]) -> Option<usize> {
        {
            let mut out = std::io::stdout().lock();
            let _ = writeln!(out, "{}", title);
            for (index, option) in options.iter().enumerate() {
                let marker = if option.current { "*" } else { " " };
                match &option.description {
                    Some(description) => {
                        let _ = writeln!(out, " {}{}) {}  {}", marker, index + 1, option.label, description);
                    }
                    None => {
                        let _ = writeln!(out, " {}{}) {}", marker, index + 1, option.label);
                    }
                }
            }
            let _ = write!(out, "> ");
            let _ = out.flush();
        }

        let mut answer = String::new();
        std::io::stdin().lock().read_line(&mut answer).ok()?;
        let choice = answer.trim().parse::<usize>().ok()?;
        (1..=options.len()).contains(&choice).then(|| choice - 1)
    }
}

/// Uses the given output path, or the offered default when none was given.
#[derive(Debug, Default, Clone)]
pub struct OutputPathDialog {
    pub output: Option<PathBuf>,
}

impl SaveDialog for OutputPathDialog {
    fn choose_save_path(&mut self, default_path: &Path) -> Option<PathBuf> {
        Some(self.output.clone().unwrap_or_else(|| default_path.to_path_buf()))
    }
}

/// Prints `file:line` so terminals and editors can jump to it.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleNavigator;

impl Navigator for ConsoleNavigator {
    fn open_at(&mut self, file: &Path, line: u32) -> NotesResult<()> {
        println!("{}:{}", file.display(), line + 1);
        Ok(())
    }
}
