//! Actor-facing copy/paste/undo service.
//!
//! Every entry point takes the actor's [`TaskGuard`] slot for the whole
//! operation. Copies run on the caller's thread; paste, undo and redo run on a
//! worker thread and hand back a [`PendingOperation`].

use crate::clips::ClipStore;
use crate::config::ClipConfig;
use crate::engine::{apply_snapshot_cancellable, ApplyReport};
use crate::error::ClipError;
use crate::geometry::{Point, Rect};
use crate::guard::{ActorId, CancellationHandle, TaskGuard, TaskToken};
use crate::snapshot::{capture, Snapshot};
use crate::store::{Host, SharedHost};
use crate::undo::UndoLog;
use log::{debug, info, warn};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

#[cfg(test)]
mod tests;

/// Releases the guard slot when the operation ends, however it ends.
struct TaskScope {
    guard: Arc<TaskGuard>,
    token: TaskToken,
}

impl TaskScope {
    fn cancellation(&self) -> &CancellationHandle {
        self.token.cancellation()
    }

    fn check_cancelled(&self) -> Result<(), ClipError> {
        if self.cancellation().is_cancelled() {
            debug!("operation of actor {} cancelled", self.token.actor());
            Err(ClipError::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl Drop for TaskScope {
    fn drop(&mut self) {
        self.guard.finish(&self.token);
    }
}

/// Which stack a worker-run apply feeds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ApplyMode {
    Paste,
    Undo,
    Redo,
}

/// An apply running on a worker thread.
pub struct PendingOperation {
    actor: ActorId,
    cancel: CancellationHandle,
    handle: JoinHandle<Result<ApplyReport, ClipError>>,
}

impl PendingOperation {
    pub fn actor(&self) -> ActorId {
        self.actor
    }

    /// Requests cancellation; honored only before cell writing starts.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn wait(self) -> Result<ApplyReport, ClipError> {
        self.handle.join().map_err(|_| ClipError::WorkerPanicked)?
    }
}

pub struct Clipboard<H> {
    host: SharedHost<H>,
    guard: Arc<TaskGuard>,
    undo: Arc<Mutex<UndoLog>>,
    clips: ClipStore,
    config: ClipConfig,
}

impl<H: Host + Send + 'static> Clipboard<H> {
    /// Service with undo stacks persisted under the config's data directory.
    pub fn new(host: SharedHost<H>, config: ClipConfig) -> Self {
        let undo = UndoLog::open(config.undo_dir(), config.undo_depth);
        Self::with_undo_log(host, config, undo)
    }

    pub fn with_undo_log(host: SharedHost<H>, config: ClipConfig, undo: UndoLog) -> Self {
        Self {
            host,
            guard: Arc::new(TaskGuard::new(config.task_ttl())),
            undo: Arc::new(Mutex::new(undo)),
            clips: ClipStore::new(config.clips_dir(), config.clip_name_max_len),
            config,
        }
    }

    pub fn host(&self) -> &SharedHost<H> {
        &self.host
    }

    pub fn config(&self) -> &ClipConfig {
        &self.config
    }

    pub fn clips(&self) -> &ClipStore {
        &self.clips
    }

    pub fn undo_log(&self) -> &Arc<Mutex<UndoLog>> {
        &self.undo
    }

    pub fn is_running(&self, actor: ActorId) -> bool {
        self.guard.is_running(actor)
    }

    /// Signals the actor's running operation, if any.
    pub fn cancel(&self, actor: ActorId) -> bool {
        self.guard.cancel(actor)
    }

    /// Captures `rect` on the caller's thread. The size limit applies to the
    /// part of `rect` inside the world.
    pub fn copy(&self, actor: ActorId, rect: Rect) -> Result<Snapshot, ClipError> {
        let scope = self.begin(actor)?;
        scope.check_cancelled()?;
        let host = self.host.lock().expect("host lock poisoned");
        let in_world = rect
            .intersect(&host.world_bounds())
            .map_or(0, |clipped| clipped.cell_count());
        self.check_size(in_world)?;
        let snapshot = capture(&*host, rect);
        info!(
            "actor {actor} copied {rect}: {}x{} with {} attachments",
            snapshot.width(),
            snapshot.height(),
            snapshot.attachments().len()
        );
        Ok(snapshot)
    }

    /// Captures `rect` and stores it as a named clip.
    pub fn copy_to_clip(
        &self,
        actor: ActorId,
        rect: Rect,
        name: &str,
    ) -> Result<Snapshot, ClipError> {
        self.clips.validate_name(name)?;
        let snapshot = self.copy(actor, rect)?;
        self.clips.save(name, &snapshot)?;
        Ok(snapshot)
    }

    /// Applies `snapshot` with its origin at `target_origin`. The region it
    /// overwrites is pushed onto the actor's undo stack first, and the redo
    /// stack is cleared once the paste lands.
    pub fn paste(
        &self,
        actor: ActorId,
        snapshot: Snapshot,
        target_origin: Point,
    ) -> Result<PendingOperation, ClipError> {
        let scope = self.begin(actor)?;
        self.check_size(snapshot.cells().len() as u64)?;
        Ok(self.spawn(scope, snapshot, target_origin, ApplyMode::Paste))
    }

    pub fn paste_clip(
        &self,
        actor: ActorId,
        name: &str,
        target_origin: Point,
    ) -> Result<PendingOperation, ClipError> {
        let snapshot = self.clips.load(name)?;
        self.paste(actor, snapshot, target_origin)
    }

    /// Restores the actor's most recent undo entry at its own origin.
    ///
    /// The popped entry is persisted as gone before the worker starts; the
    /// state it replaces goes onto the redo stack.
    pub fn undo(&self, actor: ActorId) -> Result<PendingOperation, ClipError> {
        let scope = self.begin(actor)?;
        let snapshot = self.undo.lock().expect("undo log lock poisoned").pop(actor)?;
        let origin = snapshot.origin();
        Ok(self.spawn(scope, snapshot, origin, ApplyMode::Undo))
    }

    /// Re-applies the most recently undone change.
    pub fn redo(&self, actor: ActorId) -> Result<PendingOperation, ClipError> {
        let scope = self.begin(actor)?;
        let snapshot = self
            .undo
            .lock()
            .expect("undo log lock poisoned")
            .pop_redo(actor)?;
        let origin = snapshot.origin();
        Ok(self.spawn(scope, snapshot, origin, ApplyMode::Redo))
    }

    fn begin(&self, actor: ActorId) -> Result<TaskScope, ClipError> {
        let token = self.guard.try_start(actor)?;
        Ok(TaskScope {
            guard: Arc::clone(&self.guard),
            token,
        })
    }

    fn check_size(&self, cells: u64) -> Result<(), ClipError> {
        let limit = self.config.max_clip_cells;
        if cells > limit {
            return Err(ClipError::TooLarge { cells, limit });
        }
        Ok(())
    }

    fn spawn(
        &self,
        scope: TaskScope,
        snapshot: Snapshot,
        target_origin: Point,
        mode: ApplyMode,
    ) -> PendingOperation {
        let actor = scope.token.actor();
        let cancel = scope.cancellation().clone();
        let host = Arc::clone(&self.host);
        let undo = Arc::clone(&self.undo);
        let handle = thread::spawn(move || {
            let result = run_apply(&scope, &host, &undo, &snapshot, target_origin, mode);
            if matches!(result, Err(ClipError::Cancelled)) {
                requeue_cancelled(&undo, actor, snapshot, mode);
            }
            drop(scope);
            result
        });
        PendingOperation {
            actor,
            cancel,
            handle,
        }
    }
}

fn run_apply<H: Host>(
    scope: &TaskScope,
    host: &SharedHost<H>,
    undo: &Mutex<UndoLog>,
    snapshot: &Snapshot,
    target_origin: Point,
    mode: ApplyMode,
) -> Result<ApplyReport, ClipError> {
    let actor = scope.token.actor();
    scope.check_cancelled()?;

    let mut host = host.lock().expect("host lock poisoned");
    let Some(footprint) = snapshot.footprint_at(target_origin) else {
        debug!("actor {actor}: empty snapshot, nothing to apply");
        return Ok(ApplyReport::default());
    };
    let prior = capture(&*host, footprint);
    // Nothing of the footprint is inside the world, so there is nothing to restore.
    let keep_prior = !prior.is_empty();

    // Paste and redo keep the overwritten region for undo; undo keeps it for redo.
    match mode {
        ApplyMode::Paste | ApplyMode::Redo if keep_prior => {
            undo.lock()
                .expect("undo log lock poisoned")
                .push(actor, prior.clone())?;
        }
        _ => {}
    }

    let applied = scope.check_cancelled().and_then(|()| {
        apply_snapshot_cancellable(
            &mut *host,
            snapshot,
            target_origin,
            Some(scope.cancellation()),
        )
    });
    let report = match applied {
        Ok(report) => report,
        Err(error) => {
            if mode != ApplyMode::Undo && keep_prior {
                let removed = undo
                    .lock()
                    .expect("undo log lock poisoned")
                    .remove_latest_matching(actor, |entry| entry == &prior)?;
                debug!(
                    "actor {actor}: dropped backup after {error}: {}",
                    removed.is_some()
                );
            }
            return Err(error);
        }
    };
    drop(host);

    let mut log = undo.lock().expect("undo log lock poisoned");
    match mode {
        ApplyMode::Paste => log.clear_redo(actor)?,
        ApplyMode::Undo if keep_prior => log.push_redo(actor, prior)?,
        ApplyMode::Undo | ApplyMode::Redo => {}
    }
    info!(
        "actor {actor} {mode:?} at {target_origin}: {} cells written, {} fixtures placed, {} attachments applied",
        report.cells_written, report.fixtures_placed, report.attachments_applied
    );
    Ok(report)
}

/// Puts a popped undo/redo entry back when its apply was cancelled.
fn requeue_cancelled(undo: &Mutex<UndoLog>, actor: ActorId, snapshot: Snapshot, mode: ApplyMode) {
    let mut log = undo.lock().expect("undo log lock poisoned");
    let restored = match mode {
        ApplyMode::Paste => return,
        ApplyMode::Undo => log.push(actor, snapshot),
        ApplyMode::Redo => log.push_redo(actor, snapshot),
    };
    if let Err(error) = restored {
        warn!("actor {actor}: could not requeue cancelled {mode:?} entry: {error}");
    }
}
