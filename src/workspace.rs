use crate::adapters::comments::CommentAdapter;
use crate::adapters::export::{ExportAdapter, ExportFormat};
use crate::adapters::tree::{NavigateTarget, TreeAdapter};
use crate::host::{CommentSurface, Navigator, Notifier, SaveDialog, TreeSurface};
use crate::settings::Settings;
use crate::sidecar::SidecarFs;
use crate::store::{NoteStore, SidecarWatch};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, WeakUnboundedSender};

pub const NO_ROOT_WARNING: &str = "Review notes need an open project folder.";

/// Something the host environment reports to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    RootChanged(Option<PathBuf>),
    ActiveFileChanged(Option<PathBuf>),
    /// The sidecar of `root` was reloaded after an external change.
    NotesReloaded { root: PathBuf },
    Shutdown,
}

pub fn event_channel() -> (UnboundedSender<HostEvent>, UnboundedReceiver<HostEvent>) {
    mpsc::unbounded_channel()
}

/// Host primitives shared by every context the orchestrator builds.
pub struct HostServices {
    pub settings: Settings,
    pub fs: Arc<dyn SidecarFs>,
    pub notifier: Arc<dyn Notifier>,
    pub tree: Arc<dyn TreeSurface>,
    pub navigator: Box<dyn Navigator>,
    pub save_dialog: Box<dyn SaveDialog>,
}

/// Everything that lives for one open project root.
pub struct NotesContext {
    root: PathBuf,
    store: NoteStore,
    comments: CommentAdapter,
    tree: TreeAdapter,
    export: ExportAdapter,
    watch: Option<SidecarWatch>,
    active_file: Option<PathBuf>,
}

impl NotesContext {
    /// Loads the sidecar of `root` and wires the adapters to it. When
    /// `reload_events` is given, the sidecar is watched and every external
    /// reload is reported as [`HostEvent::NotesReloaded`].
    pub async fn open(
        root: &Path,
        services: &HostServices,
        comments: Box<dyn CommentSurface>,
        reload_events: Option<WeakUnboundedSender<HostEvent>>,
    ) -> Self {
        let settings = &services.settings;
        let store = NoteStore::new(root, settings, services.fs.clone(), services.notifier.clone());
        store.load().await;

        let comments = CommentAdapter::new(
            store.clone(),
            comments,
            settings.resolve_author(),
            settings.new_note_priority,
        );
        let tree = TreeAdapter::new(store.clone(), services.tree.clone());
        let export = ExportAdapter::new(store.clone(), services.fs.clone(), services.notifier.clone());

        let root = store.root().to_path_buf();
        let watch = match reload_events {
            Some(events) if settings.watch_sidecar => {
                let watched_root = root.clone();
                let result = store.watch(move || {
                    if let Some(events) = events.upgrade() {
                        let _ = events.send(HostEvent::NotesReloaded {
                            root: watched_root.clone(),
                        });
                    }
                });
                match result {
                    Ok(watch) => Some(watch),
                    Err(error) => {
                        tracing::warn!(root = %root.display(), error = %error, "sidecar watch unavailable");
                        services
                            .notifier
                            .warn(&format!("Review notes will not follow external changes: {}", error));
                        None
                    }
                }
            }
            _ => None,
        };

        tracing::info!(root = %root.display(), notes = store.note_count(), watching = watch.is_some(), "opened review notes");
        Self {
            root,
            store,
            comments,
            tree,
            export,
            watch,
            active_file: None,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store(&self) -> &NoteStore {
        &self.store
    }

    pub fn comments(&self) -> &CommentAdapter {
        &self.comments
    }

    pub fn comments_mut(&mut self) -> &mut CommentAdapter {
        &mut self.comments
    }

    pub fn tree(&self) -> &TreeAdapter {
        &self.tree
    }

    pub fn export(&self) -> &ExportAdapter {
        &self.export
    }

    pub fn is_watching(&self) -> bool {
        self.watch.is_some()
    }

    pub fn active_file(&self) -> Option<&Path> {
        self.active_file.as_deref()
    }

    /// Records the focused file and shows its notes.
    pub fn set_active_file(&mut self, file: Option<PathBuf>) {
        if let Some(file) = &file {
            self.comments.render_notes_for_file(file);
        }
        self.active_file = file;
    }

    /// Drops threads that may point at notes the reload removed and shows the
    /// active file again. The tree refreshes itself from the store.
    pub fn rerender(&mut self) {
        self.comments.clear_all_threads();
        if let Some(file) = self.active_file.clone() {
            self.comments.render_notes_for_file(&file);
        }
    }

    /// Persists pending edits, stops watching and hands the comment surface back.
    pub async fn shutdown(self) -> Box<dyn CommentSurface> {
        let Self {
            root,
            store,
            comments,
            tree,
            export,
            watch,
            ..
        } = self;

        store.flush().await;
        drop(watch);
        drop(tree);
        drop(export);
        let surface = comments.dispose();
        tracing::info!(root = %root.display(), "closed review notes");
        surface
    }
}

/// Reacts to host events one at a time and owns the context of the current root.
pub struct Orchestrator {
    services: HostServices,
    context: Option<NotesContext>,
    // Held while no context is open.
    idle_surface: Option<Box<dyn CommentSurface>>,
    events: WeakUnboundedSender<HostEvent>,
}

impl Orchestrator {
    pub fn new(services: HostServices, comments: Box<dyn CommentSurface>, events: &UnboundedSender<HostEvent>) -> Self {
        Self {
            services,
            context: None,
            idle_surface: Some(comments),
            events: events.downgrade(),
        }
    }

    pub fn context(&self) -> Option<&NotesContext> {
        self.context.as_ref()
    }

    pub fn context_mut(&mut self) -> Option<&mut NotesContext> {
        self.context.as_mut()
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.services.notifier
    }

    /// Processes one event. Returns `false` once the host asked to shut down.
    pub async fn handle_event(&mut self, event: HostEvent) -> bool {
        tracing::debug!(event = ?event, "host event");
        match event {
            HostEvent::RootChanged(root) => {
                self.open_root(root).await;
            }
            HostEvent::ActiveFileChanged(file) => {
                if let Some(context) = self.context.as_mut() {
                    context.set_active_file(file);
                }
            }
            HostEvent::NotesReloaded { root } => match self.context.as_mut() {
                Some(context) if context.root() == root.as_path() => context.rerender(),
                _ => {
                    tracing::debug!(root = %root.display(), "ignoring reload for a root that is no longer open");
                }
            },
            HostEvent::Shutdown => {
                self.close_root().await;
                return false;
            }
        }
        true
    }

    /// Handles events until [`HostEvent::Shutdown`] arrives or every sender is gone.
    pub async fn run(&mut self, mut events: UnboundedReceiver<HostEvent>) {
        while let Some(event) = events.recv().await {
            if !self.handle_event(event).await {
                return;
            }
        }
        self.close_root().await;
    }

    /// Tears down the current context, then opens `root`. Without a root the
    /// user is warned once and nothing is built.
    pub async fn open_root(&mut self, root: Option<PathBuf>) {
        self.close_root().await;

        let Some(root) = root else {
            tracing::warn!("no project root open");
            self.services.notifier.warn(NO_ROOT_WARNING);
            return;
        };

        let Some(surface) = self.idle_surface.take() else {
            tracing::error!(root = %root.display(), "comment surface missing, cannot open review notes");
            return;
        };
        let events = Some(self.events.clone());
        self.context = Some(NotesContext::open(&root, &self.services, surface, events).await);
    }

    pub async fn close_root(&mut self) {
        if let Some(context) = self.context.take() {
            self.idle_surface = Some(context.shutdown().await);
        }
    }

    /// Opens the note's file at its line and expands its thread.
    pub async fn navigate(&mut self, target: &NavigateTarget) -> bool {
        let Some(context) = self.context.as_mut() else {
            self.services.notifier.warn(NO_ROOT_WARNING);
            return false;
        };
        if !self.services.fs.exists(&target.file).await {
            tracing::warn!(file = %target.file.display(), "navigation target missing");
            self.services
                .notifier
                .error(&format!("File not found: {}", target.file.display()));
            return false;
        }
        if let Err(error) = self.services.navigator.open_at(&target.file, target.line) {
            tracing::error!(file = %target.file.display(), error = %error, "failed to open note location");
            self.services
                .notifier
                .error(&format!("Could not open {}: {}", target.file.display(), error));
            return false;
        }

        context.active_file = Some(target.file.clone());
        context
            .comments
            .expand_thread_for_note(&target.file, &target.note_id)
            .is_some()
    }

    pub async fn export(&mut self, format: ExportFormat) -> Option<PathBuf> {
        let Some(context) = self.context.as_ref() else {
            self.services.notifier.warn(NO_ROOT_WARNING);
            return None;
        };
        context.export.export(format, &mut *self.services.save_dialog).await
    }
}
