use anyhow::{Context, Result};
use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use std::time::Duration;
use tracing::{error, info};

/// Calls back whenever the schema file changes.
///
/// Watches the file's parent directory so editors that replace the file on
/// save are still seen. Dropping the watcher stops it.
pub struct SchemaWatcher {
    _watcher: RecommendedWatcher,
    path: PathBuf,
}

impl SchemaWatcher {
    pub fn new<F>(path: &Path, on_change: F) -> Result<Self>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let (tx, rx) = channel();

        let mut watcher = RecommendedWatcher::new(tx, Config::default())?;

        let file_name = path
            .file_name()
            .map(|n| n.to_os_string())
            .with_context(|| format!("{} is not a file path", path.display()))?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        info!("Watching schema file: {}", path.display());

        std::thread::spawn(move || loop {
            match rx.recv() {
                Ok(Ok(event)) => {
                    let event: notify::Event = event;
                    let touches_schema = event
                        .paths
                        .iter()
                        .any(|p| p.file_name() == Some(file_name.as_os_str()));
                    if !touches_schema || event.kind.is_access() {
                        continue;
                    }
                    // Debounce slightly by waiting, then drop the burst
                    std::thread::sleep(Duration::from_millis(100));
                    while rx.try_recv().is_ok() {}
                    info!("Schema change detected, reloading...");
                    on_change();
                }
                Ok(Err(e)) => error!("Watch error: {:?}", e),
                Err(e) => {
                    error!("Watch channel error: {:?}", e);
                    break;
                }
            }
        });

        Ok(Self {
            _watcher: watcher,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
