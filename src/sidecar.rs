use crate::errors::{NotesError, NotesResult};
use async_trait::async_trait;
use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::UnboundedSender;

/// File primitives the store persists through.
#[async_trait]
pub trait SidecarFs: Send + Sync {
    /// `Ok(None)` when the file does not exist.
    async fn read_to_string(&self, path: &Path) -> NotesResult<Option<String>>;
    async fn write(&self, path: &Path, contents: &str) -> NotesResult<()>;
    async fn exists(&self, path: &Path) -> bool;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioFs;

#[async_trait]
impl SidecarFs for TokioFs {
    async fn read_to_string(&self, path: &Path) -> NotesResult<Option<String>> {
        match tokio::fs::read_to_string(path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(NotesError::Io(format!("{}: {}", path.display(), error))),
        }
    }

    async fn write(&self, path: &Path, contents: &str) -> NotesResult<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|error| NotesError::Io(format!("{}: {}", parent.display(), error)))?;
        }
        // Readers only ever see the old or the new contents.
        let staging = staging_path(path);
        tokio::fs::write(&staging, contents)
            .await
            .map_err(|error| NotesError::Io(format!("{}: {}", staging.display(), error)))?;
        if let Err(error) = tokio::fs::rename(&staging, path).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(NotesError::Io(format!("{}: {}", path.display(), error)));
        }
        Ok(())
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|name| name.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Watches the directory holding `file` and sends a tick for every event that
/// touches it. The file does not need to exist yet.
pub fn create_sidecar_watcher(file: &Path, event_tx: UnboundedSender<()>) -> NotesResult<RecommendedWatcher> {
    let Some(file_name) = file.file_name().map(|name| name.to_os_string()) else {
        return Err(NotesError::Watch(format!("{} has no file name", file.display())));
    };
    let directory = file
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();

    let watched_path = file.to_path_buf();
    let mut watcher = recommended_watcher(move |event_result: notify::Result<Event>| match event_result {
        Ok(event) => {
            if matches!(event.kind, EventKind::Access(_)) {
                return;
            }
            let touches_sidecar = event
                .paths
                .iter()
                .any(|path| path.file_name() == Some(file_name.as_os_str()));
            if touches_sidecar {
                let _ = event_tx.send(());
            }
        }
        Err(error) => {
            tracing::warn!(path = %watched_path.display(), error = %error, "sidecar watcher error");
        }
    })?;

    watcher
        .watch(&directory, RecursiveMode::NonRecursive)
        .map_err(|error| NotesError::Watch(format!("failed to watch {}: {}", directory.display(), error)))?;

    Ok(watcher)
}
