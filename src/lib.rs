pub mod adapters;
pub mod debounce;
pub mod errors;
pub mod host;
pub mod models;
pub mod paths;
pub mod settings;
pub mod sidecar;
pub mod store;
pub mod terminal;
pub mod workspace;

#[cfg(test)]
mod testing;

use crate::adapters::export::ExportFormat;
use crate::adapters::tree::{NavigateTarget, TreeAdapter, TreeNode};
use crate::errors::NotesError;
use crate::host::ThreadHandle;
use crate::models::{Category, NoteId, Priority};
use crate::settings::Settings;
use crate::sidecar::TokioFs;
use crate::terminal::{ConsoleComments, ConsoleNavigator, ConsoleNotifier, ConsoleTree, OutputPathDialog, StdinPicker};
use crate::workspace::{event_channel, HostEvent, HostServices, NotesContext, Orchestrator};
use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

#[derive(Debug, Parser)]
#[command(name = "review-notes", version, about = "Line-anchored review notes stored next to your code", rename_all = "kebab")]
pub struct Cli {
    /// Project root holding the sidecar file. Defaults to the current directory.
    #[arg(long, value_name = "DIR", global = true)]
    pub root: Option<PathBuf>,
    /// JSON settings file.
    #[arg(long, short = 'c', value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Add a note to a line (1-based) of a file.
    Add {
        file: PathBuf,
        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        line: u32,
        text: String,
        #[arg(long)]
        category: Option<Category>,
        #[arg(long)]
        priority: Option<Priority>,
    },
    /// List every note grouped by file.
    List,
    /// Show the note threads of one file.
    Show { file: PathBuf },
    Edit { id: String, text: String },
    Delete { id: String },
    Priority { id: String, priority: Priority },
    Category { id: String, category: Category },
    /// Pick a new category and priority interactively.
    Retag { id: String },
    /// Print the location of a note and expand it.
    Open { id: String },
    Export {
        format: ExportFormat,
        #[arg(long, short = 'o', value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Follow external changes to the sidecar until interrupted.
    Watch {
        #[arg(long, value_name = "FILE")]
        file: Option<PathBuf>,
    },
}

pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_deref())?;
    init_tracing(&settings)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(execute(cli, settings))
}

fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    match path {
        Some(path) => Settings::load(path).with_context(|| format!("failed to load settings from {}", path.display())),
        None => Ok(Settings::default()),
    }
}

fn init_tracing(settings: &Settings) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let result = match &settings.log_dir {
        Some(log_dir) => {
            std::fs::create_dir_all(log_dir)
                .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;
            let file_appender = tracing_appender::rolling::daily(log_dir, "review-notes.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let _ = LOG_GUARD.set(guard);

            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .with_writer(non_blocking)
                .try_init()
        }
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .with_writer(std::io::stderr)
            .try_init(),
    };
    result.map_err(|error| anyhow!(error.to_string()))
}

async fn execute(cli: Cli, mut settings: Settings) -> anyhow::Result<()> {
    let root = match cli.root {
        Some(root) => root,
        None => std::env::current_dir().context("failed to read current directory")?,
    };
    let root = std::path::absolute(&root).with_context(|| format!("invalid root {}", root.display()))?;

    let watching = matches!(cli.command, Command::Watch { .. });
    settings.watch_sidecar = settings.watch_sidecar && watching;
    let output = match &cli.command {
        Command::Export { output, .. } => output.clone(),
        _ => None,
    };

    let services = HostServices {
        settings,
        fs: Arc::new(TokioFs),
        notifier: Arc::new(ConsoleNotifier),
        tree: Arc::new(ConsoleTree),
        navigator: Box::new(ConsoleNavigator),
        save_dialog: Box::new(OutputPathDialog { output }),
    };
    let (events, receiver) = event_channel();
    let mut orchestrator = Orchestrator::new(services, Box::new(ConsoleComments::default()), &events);
    orchestrator.handle_event(HostEvent::RootChanged(Some(root.clone()))).await;

    if let Command::Watch { file } = cli.command {
        if let Some(file) = file {
            let _ = events.send(HostEvent::ActiveFileChanged(Some(resolve_file(&root, &file))));
        }
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = events.send(HostEvent::Shutdown);
            }
        });
        orchestrator.run(receiver).await;
        return Ok(());
    }

    let result = run_command(&mut orchestrator, cli.command).await;
    orchestrator.handle_event(HostEvent::Shutdown).await;
    result
}

async fn run_command(orchestrator: &mut Orchestrator, command: Command) -> anyhow::Result<()> {
    let context = orchestrator
        .context_mut()
        .ok_or_else(|| NotesError::NoRoot("no project root open".to_string()))?;

    match command {
        Command::Add {
            file,
            line,
            text,
            category,
            priority,
        } => {
            let file = resolve_file(context.root(), &file);
            let (handle, mut note) = context.comments_mut().create_note(&file, line - 1, &text)?;
            if let Some(category) = category.filter(|category| *category != note.category) {
                note = context.comments_mut().set_category(handle, category).unwrap_or(note);
            }
            if let Some(priority) = priority.filter(|priority| *priority != note.priority) {
                note = context.comments_mut().set_priority(handle, priority).unwrap_or(note);
            }
            println!("{}", note.id);
        }
        Command::List => print_tree(context.tree()),
        Command::Show { file } => {
            let file = resolve_file(context.root(), &file);
            if context.comments_mut().render_notes_for_file(&file) == 0 {
                println!("No review notes for {}", file.display());
            }
        }
        Command::Edit { id, text } => {
            let handle = thread_for_id(context, &id)?;
            context
                .comments_mut()
                .edit_note(handle, &text)
                .ok_or_else(|| not_found(&id))?;
        }
        Command::Delete { id } => {
            let handle = thread_for_id(context, &id)?;
            if !context.comments_mut().delete_note(handle) {
                return Err(not_found(&id).into());
            }
            println!("Deleted {}", id);
        }
        Command::Priority { id, priority } => {
            let handle = thread_for_id(context, &id)?;
            context
                .comments_mut()
                .set_priority(handle, priority)
                .ok_or_else(|| not_found(&id))?;
        }
        Command::Category { id, category } => {
            let handle = thread_for_id(context, &id)?;
            context
                .comments_mut()
                .set_category(handle, category)
                .ok_or_else(|| not_found(&id))?;
        }
        Command::Retag { id } => {
            let handle = thread_for_id(context, &id)?;
            if context
                .comments_mut()
                .change_category_and_priority(handle, &mut StdinPicker)
                .is_none()
            {
                println!("Nothing changed");
            }
        }
        Command::Open { id } => {
            let note_id = NoteId::from(id.as_str());
            let (key, note) = context.store().get_note_by_id(&note_id).ok_or_else(|| not_found(&id))?;
            let target = NavigateTarget {
                file: context.store().absolute_path(&key),
                line: note.line,
                note_id,
            };
            if !orchestrator.navigate(&target).await {
                return Err(anyhow!("could not open note {}", id));
            }
        }
        Command::Export { format, .. } => {
            orchestrator.export(format).await;
        }
        // Runs on the event loop in `execute`.
        Command::Watch { .. } => {}
    }
    Ok(())
}

fn thread_for_id(context: &mut NotesContext, id: &str) -> Result<ThreadHandle, NotesError> {
    let note_id = NoteId::from(id);
    let (key, _) = context.store().get_note_by_id(&note_id).ok_or_else(|| not_found(id))?;
    let file = context.store().absolute_path(&key);
    context
        .comments_mut()
        .expand_thread_for_note(&file, &note_id)
        .ok_or_else(|| not_found(id))
}

fn not_found(id: &str) -> NotesError {
    NotesError::NotFound(format!("no review note with id {}", id))
}

fn resolve_file(root: &Path, file: &Path) -> PathBuf {
    if file.is_absolute() {
        file.to_path_buf()
    } else {
        root.join(file)
    }
}

fn print_tree(tree: &TreeAdapter) {
    let roots = tree.roots();
    if roots.is_empty() {
        println!("No review notes");
        return;
    }
    for file in roots {
        println!("{}  ({})", file.label(), file.description());
        for child in tree.children(&file) {
            if let TreeNode::Note { note, .. } = &child {
                println!("  {}  [{}]", child.label(), note.id);
                println!("      {}", child.description());
            }
        }
    }
}
