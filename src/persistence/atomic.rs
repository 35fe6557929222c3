//! Coalescing atomic file writer.
//!
//! # Responsibilities
//! - Serialize values to JSON at submission time
//! - Write through a sibling temp file and rename it over the destination
//! - Run at most one write cycle per path; park the newest submission
//!   behind it and write that one next
//!
//! # Design Decisions
//! - `write` is fire-and-forget; failures are logged, never returned
//! - `write_durable` and `flush` let callers wait for settlement
//! - Each path gets its own flusher task, spawned on demand and exiting when
//!   nothing is pending
//! - Paths are keyed as given; two spellings of one file are two targets

use std::path::{Path, PathBuf};
use std::sync::Arc;
use dashmap::DashMap;
use serde::Serialize;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::runtime::Handle;
use uuid::Uuid;

use crate::error::{PersistenceError, PersistenceResult};
use crate::observability::metrics;
use crate::persistence::target::{Payload, PersistenceTarget, Settlement};
use crate::persistence::PersistenceOptions;

/// Handle to the per-path write machinery. Cheap to clone.
///
/// Cycles run as tasks on the runtime current at submission.
#[derive(Debug, Clone, Default)]
pub struct AtomicWriter {
    inner: Arc<WriterInner>,
}

#[derive(Debug, Default)]
struct WriterInner {
    targets: DashMap<PathBuf, Arc<PersistenceTarget>>,
    options: PersistenceOptions,
}

impl AtomicWriter {
    pub fn new(options: PersistenceOptions) -> Self {
        Self {
            inner: Arc::new(WriterInner {
                targets: DashMap::new(),
                options,
            }),
        }
    }

    pub fn options(&self) -> PersistenceOptions {
        self.inner.options
    }

    /// Persist `value` to `path` without waiting.
    ///
    /// Outside a Tokio runtime the write is logged and dropped.
    pub fn write<T: Serialize + ?Sized>(&self, path: impl AsRef<Path>, value: &T) {
        if let Err(e) = self.submit(path.as_ref(), value, false) {
            tracing::error!(error = %e, "Dropping write");
        }
    }

    /// Persist `value` to `path` and wait until the cycle carrying it, or a
    /// newer value that superseded it, has settled.
    pub async fn write_durable<T: Serialize + ?Sized>(
        &self,
        path: impl AsRef<Path>,
        value: &T,
    ) -> PersistenceResult<()> {
        let path = path.as_ref();
        match self.submit(path, value, true)? {
            Some(settlement) => settle(path, settlement).await,
            None => Ok(()),
        }
    }

    /// Wait until everything submitted to `path` so far has settled.
    pub async fn flush(&self, path: impl AsRef<Path>) -> PersistenceResult<()> {
        let path = path.as_ref();
        let settlement = match self.inner.targets.get(path) {
            Some(t) => t.value().settlement_for_latest(),
            None => None,
        };
        match settlement {
            Some(settlement) => settle(path, settlement).await,
            None => Ok(()),
        }
    }

    /// True when no write cycle is running for `path`.
    pub fn is_idle(&self, path: impl AsRef<Path>) -> bool {
        self.inner
            .targets
            .get(path.as_ref())
            .map(|t| t.is_idle())
            .unwrap_or(true)
    }

    fn submit<T: Serialize + ?Sized>(
        &self,
        path: &Path,
        value: &T,
        wait: bool,
    ) -> PersistenceResult<Option<Settlement>> {
        let bytes = serde_json::to_vec_pretty(value).map_err(|source| PersistenceError::Serialize {
            path: path.to_path_buf(),
            source,
        })?;
        let runtime = Handle::try_current().map_err(|e| PersistenceError::Write {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let target = self.target(path);
        let submission = target.submit(bytes, wait);
        if let Some(payload) = submission.start {
            runtime.spawn(run_cycles(target, self.inner.options, payload));
        }
        Ok(submission.settlement)
    }

    fn target(&self, path: &Path) -> Arc<PersistenceTarget> {
        if let Some(existing) = self.inner.targets.get(path) {
            return existing.value().clone();
        }
        self.inner
            .targets
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(PersistenceTarget::new(path.to_path_buf())))
            .value()
            .clone()
    }
}

async fn settle(path: &Path, settlement: Settlement) -> PersistenceResult<()> {
    let outcome = match settlement {
        Settlement::Done(outcome) => outcome,
        Settlement::Pending(rx) => rx.await.map_err(|_| PersistenceError::Write {
            path: path.to_path_buf(),
            message: "writer dropped before settling".into(),
        })?,
    };

    match outcome {
        None => Ok(()),
        Some(message) => Err(PersistenceError::Write {
            path: path.to_path_buf(),
            message,
        }),
    }
}

/// Flusher loop for one path: write, then keep going while payloads are pending.
async fn run_cycles(target: Arc<PersistenceTarget>, options: PersistenceOptions, mut payload: Payload) {
    loop {
        if !options.debounce.is_zero() {
            tokio::time::sleep(options.debounce).await;
            payload = target.supersede(payload);
        }

        let outcome = write_atomically(target.path(), &payload.bytes, &options).await;
        let error = match outcome {
            Ok(()) => {
                tracing::debug!(
                    path = %target.path().display(),
                    generation = payload.generation,
                    bytes = payload.bytes.len(),
                    "Persisted"
                );
                metrics::record_persist_write("ok");
                None
            }
            Err(e) => {
                tracing::error!(
                    path = %target.path().display(),
                    generation = payload.generation,
                    error = %e,
                    "Atomic write failed"
                );
                metrics::record_persist_write("error");
                Some(e.to_string())
            }
        };

        match target.complete(payload.generation, error) {
            Some(next) => payload = next,
            None => break,
        }
    }
}

/// Write `bytes` to a sibling temp file, then rename it over `path`.
///
/// Readers of `path` see either the old or the new content. The temp file
/// is removed if any step fails.
pub async fn write_atomically(path: &Path, bytes: &[u8], options: &PersistenceOptions) -> PersistenceResult<()> {
    if options.create_parent_dirs {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|source| PersistenceError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }

    let tmp = temp_path(path);
    if let Err(e) = write_temp(&tmp, bytes, options.sync_data).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e);
    }

    if let Err(source) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(PersistenceError::Rename {
            from: tmp,
            to: path.to_path_buf(),
            source,
        });
    }
    Ok(())
}

async fn write_temp(tmp: &Path, bytes: &[u8], sync_data: bool) -> PersistenceResult<()> {
    let io_err = |source| PersistenceError::Io {
        path: tmp.to_path_buf(),
        source,
    };

    let mut file = fs::File::create(tmp).await.map_err(io_err)?;
    file.write_all(bytes).await.map_err(io_err)?;
    file.flush().await.map_err(io_err)?;
    if sync_data {
        file.sync_all().await.map_err(io_err)?;
    }
    Ok(())
}

/// Hidden sibling of `path` with a unique suffix, e.g. `.leads.json.<uuid>.tmp`.
fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "state".to_string());
    path.with_file_name(format!(".{}.{}.tmp", name, Uuid::new_v4().simple()))
}
