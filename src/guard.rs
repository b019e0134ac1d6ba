use crate::error::ClipError;
use log::{info, warn};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use web_time::Instant;

pub const DEFAULT_TASK_TTL: Duration = Duration::from_secs(600);

/// Stable identity of whoever issues clipboard operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ActorId(pub u64);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Shared flag a worker polls at its cancellation checkpoints.
#[derive(Clone, Debug, Default)]
pub struct CancellationHandle(Arc<AtomicBool>);

impl CancellationHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Proof that an actor holds the guard. Hand it back with [`TaskGuard::finish`].
#[derive(Debug)]
pub struct TaskToken {
    actor: ActorId,
    serial: u64,
    started_at: Instant,
    cancel: CancellationHandle,
}

impl TaskToken {
    pub fn actor(&self) -> ActorId {
        self.actor
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn cancellation(&self) -> &CancellationHandle {
        &self.cancel
    }
}

#[derive(Debug)]
struct RunningTask {
    serial: u64,
    started_at: Instant,
    cancel: CancellationHandle,
}

/// Allows at most one running operation per actor.
///
/// An entry older than the TTL is treated as abandoned and reclaimed by the
/// next `try_start`.
#[derive(Debug)]
pub struct TaskGuard {
    ttl: Duration,
    running: Mutex<HashMap<ActorId, RunningTask>>,
    next_serial: AtomicU64,
}

impl Default for TaskGuard {
    fn default() -> Self {
        Self::new(DEFAULT_TASK_TTL)
    }
}

impl TaskGuard {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            running: Mutex::new(HashMap::new()),
            next_serial: AtomicU64::new(1),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn try_start(&self, actor: ActorId) -> Result<TaskToken, ClipError> {
        self.try_start_at(actor, Instant::now())
    }

    pub fn try_start_at(&self, actor: ActorId, now: Instant) -> Result<TaskToken, ClipError> {
        let mut running = self.running.lock().expect("task guard lock poisoned");
        if let Some(task) = running.get(&actor) {
            let age = now.saturating_duration_since(task.started_at);
            if age < self.ttl {
                return Err(ClipError::Busy { actor });
            }
            warn!(
                "reclaiming task {} of actor {actor} after {:.1}s",
                task.serial,
                age.as_secs_f64()
            );
            task.cancel.cancel();
        }

        let serial = self.next_serial.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationHandle::new();
        running.insert(
            actor,
            RunningTask {
                serial,
                started_at: now,
                cancel: cancel.clone(),
            },
        );
        Ok(TaskToken {
            actor,
            serial,
            started_at: now,
            cancel,
        })
    }

    /// Releases `token`. A token whose slot was already reclaimed and
    /// reissued leaves the newer entry alone.
    pub fn finish(&self, token: &TaskToken) {
        let mut running = self.running.lock().expect("task guard lock poisoned");
        if running
            .get(&token.actor)
            .is_some_and(|task| task.serial == token.serial)
        {
            running.remove(&token.actor);
        }
    }

    pub fn is_running(&self, actor: ActorId) -> bool {
        self.is_running_at(actor, Instant::now())
    }

    pub fn is_running_at(&self, actor: ActorId, now: Instant) -> bool {
        let running = self.running.lock().expect("task guard lock poisoned");
        running
            .get(&actor)
            .is_some_and(|task| now.saturating_duration_since(task.started_at) < self.ttl)
    }

    /// Signals the actor's running operation to stop at its next checkpoint.
    pub fn cancel(&self, actor: ActorId) -> bool {
        let running = self.running.lock().expect("task guard lock poisoned");
        match running.get(&actor) {
            Some(task) => {
                info!("cancelling task {} of actor {actor}", task.serial);
                task.cancel.cancel();
                true
            }
            None => false,
        }
    }
}
