//! File system watcher for automatic rebuilds.
//!
//! Watches the whole project root and rebuilds the bundle whenever a file
//! that could end up in it changes.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                      Event Loop                            │
//! │                                                            │
//! │  ┌──────────┐    ┌───────────┐    ┌──────────────────────┐ │
//! │  │ notify   │───▶│ Debouncer │───▶│   rebuild()          │ │
//! │  │ events   │    │ (300ms)   │    │   reload config      │ │
//! │  └──────────┘    └───────────┘    │   build + write      │ │
//! │  ┌──────────┐          │          │   compare blake3     │ │
//! │  │ Ctrl-C   │──────────┴─ stop    └──────────────────────┘ │
//! │  └──────────┘                                              │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! The loop is single threaded, so builds never overlap.

use crate::{
    build::build_project,
    bundler::{discover::normalize_relative, exclude::RESERVED_NAMES},
    config::ProjectConfig,
    log,
};
use anyhow::{Context, Result};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use rustc_hash::FxHashSet;
use std::{
    path::{Path, PathBuf},
    sync::mpsc::{self, RecvTimeoutError},
    time::{Duration, Instant},
};

// =============================================================================
// Constants
// =============================================================================

const DEBOUNCE_MS: u64 = 300;
const REBUILD_COOLDOWN_MS: u64 = 800;

// =============================================================================
// Path Utilities
// =============================================================================

/// Check if path is a temp/backup file (editor artifacts).
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with(".#")
}

/// Paths that must not trigger a rebuild.
///
/// The output directory is skipped, otherwise writing the bundle would
/// schedule the next build. Housekeeping directories never reach a bundle.
fn is_ignored(path: &Path, root: &Path, config: &ProjectConfig) -> bool {
    if is_temp_file(path) {
        return true;
    }

    let rel = path.strip_prefix(root).unwrap_or(path);
    let output = normalize_relative(&config.export_directory.to_string_lossy());
    rel.starts_with(output)
        || rel
            .components()
            .filter_map(|c| c.as_os_str().to_str())
            .any(|c| RESERVED_NAMES.contains(&c))
}

/// `/proj/src/util.lua` → `src/util.lua`
fn rel_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root).unwrap_or(path).display().to_string()
}

// =============================================================================
// Debounce State
// =============================================================================

/// Batches rapid file events with debouncing and rebuild cooldown.
///
/// Events during the cooldown are kept and flushed once it ends.
struct Debouncer {
    pending: FxHashSet<PathBuf>,
    last_event: Option<Instant>,
    last_rebuild: Option<Instant>,
}

impl Debouncer {
    fn new() -> Self {
        Self {
            pending: FxHashSet::default(),
            last_event: None,
            last_rebuild: None,
        }
    }

    fn in_cooldown(&self) -> bool {
        self.last_rebuild
            .is_some_and(|t| t.elapsed() < Duration::from_millis(REBUILD_COOLDOWN_MS))
    }

    fn add(&mut self, paths: impl IntoIterator<Item = PathBuf>) {
        let mut any = false;
        for path in paths {
            self.pending.insert(path);
            any = true;
        }
        if any {
            self.last_event = Some(Instant::now());
        }
    }

    fn ready(&self) -> bool {
        !self.pending.is_empty()
            && !self.in_cooldown()
            && self
                .last_event
                .is_some_and(|t| t.elapsed() >= Duration::from_millis(DEBOUNCE_MS))
    }

    fn take(&mut self) -> Vec<PathBuf> {
        self.last_event = None;
        let mut paths: Vec<_> = self.pending.drain().collect();
        paths.sort();
        paths
    }

    fn mark_rebuild(&mut self) {
        self.last_rebuild = Some(Instant::now());
    }

    fn timeout(&self) -> Duration {
        if self.pending.is_empty() {
            Duration::from_secs(60)
        } else {
            Duration::from_millis(DEBOUNCE_MS)
        }
    }
}

// =============================================================================
// Rebuild
// =============================================================================

/// Rebuilds the bundle and remembers its fingerprint.
struct Rebuilder<F> {
    root: PathBuf,
    load_config: F,
    config: ProjectConfig,
    last_hash: Option<blake3::Hash>,
}

impl<F> Rebuilder<F>
where
    F: Fn() -> Result<ProjectConfig>,
{
    fn new(root: &Path, load_config: F) -> Result<Self> {
        let config = load_config()?;
        Ok(Self {
            root: root.to_path_buf(),
            load_config,
            config,
            last_hash: None,
        })
    }

    /// Reload the config and run one full build. Errors are logged, not returned.
    fn rebuild(&mut self) {
        match (self.load_config)() {
            Ok(config) => self.config = config,
            Err(e) => {
                log!("watch"; "config error, keeping previous bundle");
                log!("error"; "{e:#}");
                return;
            }
        }

        match build_project(&self.root, &self.config) {
            Ok(report) => {
                let hash = blake3::hash(report.result.output_text.as_bytes());
                if self.last_hash == Some(hash) {
                    log!("watch"; "output unchanged");
                }
                self.last_hash = Some(hash);
            }
            Err(e) => {
                log!("watch"; "build failed");
                log!("error"; "{e:#}");
            }
        }
    }
}

// =============================================================================
// Event Loop
// =============================================================================

enum Message {
    Fs(notify::Result<Event>),
    Stop,
}

const fn is_relevant(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
    )
}

/// Build once, then rebuild on every batch of changes until Ctrl-C.
///
/// `load_config` is called before every build so edits to the project file
/// take effect without restarting.
pub fn watch_project<F>(root: &Path, load_config: F) -> Result<()>
where
    F: Fn() -> Result<ProjectConfig>,
{
    // notify reports absolute paths
    let root = root
        .canonicalize()
        .with_context(|| format!("Failed to resolve {}", root.display()))?;
    let root = root.as_path();

    let mut rebuilder = Rebuilder::new(root, load_config)?;
    rebuilder.rebuild();

    let (tx, rx) = mpsc::channel();

    let stop_tx = tx.clone();
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(Message::Stop);
    })
    .context("Failed to set Ctrl+C handler")?;

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        let _ = tx.send(Message::Fs(res));
    })
    .context("Failed to create file watcher")?;
    watcher
        .watch(root, RecursiveMode::Recursive)
        .with_context(|| format!("Failed to watch {}", root.display()))?;

    log!("watch"; "watching {} (ctrl-c to stop)", root.display());

    let mut debouncer = Debouncer::new();

    loop {
        match rx.recv_timeout(debouncer.timeout()) {
            Ok(Message::Stop) => {
                log!("watch"; "stopping");
                break;
            }
            Ok(Message::Fs(Ok(event))) if is_relevant(&event) => {
                let config = &rebuilder.config;
                debouncer.add(
                    event
                        .paths
                        .into_iter()
                        .filter(|p| !is_ignored(p, root, config)),
                );
            }
            Ok(Message::Fs(Err(e))) => log!("watch"; "error: {e}"),
            Err(RecvTimeoutError::Timeout) if debouncer.ready() => {
                let changed = debouncer.take();
                let names: Vec<_> = changed.iter().map(|p| rel_path(p, root)).collect();
                log!("watch"; "{} changed, rebuilding...", names.join(", "));
                rebuilder.rebuild();
                debouncer.mark_rebuild();
            }
            Err(RecvTimeoutError::Disconnected) => break,
            _ => {}
        }
    }

    Ok(())
}
