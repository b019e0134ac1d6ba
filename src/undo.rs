//! Per-actor LIFO stacks of pre-change snapshots.
//!
//! Each actor owns an undo stack and a redo stack. Persisted stacks live at
//! `<root>/<actor>.undo` and `<root>/<actor>.redo`; a file holds a `u32`
//! entry count followed by raw snapshot streams, all inside one gzip wrapper.
//! Stacks load lazily on first touch and are rewritten after every change.

use crate::codec::{self, ByteReader, CodecError};
use crate::error::ClipError;
use crate::guard::ActorId;
use crate::snapshot::Snapshot;
use crate::storage;
use log::{debug, info};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_UNDO_DEPTH: usize = 10;

// Header plus eight empty attachment counts.
const MIN_ENTRY_LEN: usize = 16 + 8 * 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stack {
    Undo,
    Redo,
}

impl Stack {
    fn extension(self) -> &'static str {
        match self {
            Stack::Undo => "undo",
            Stack::Redo => "redo",
        }
    }
}

#[derive(Debug, Default)]
struct ActorStacks {
    undo: Vec<Snapshot>,
    redo: Vec<Snapshot>,
}

impl ActorStacks {
    fn get(&self, stack: Stack) -> &Vec<Snapshot> {
        match stack {
            Stack::Undo => &self.undo,
            Stack::Redo => &self.redo,
        }
    }

    fn get_mut(&mut self, stack: Stack) -> &mut Vec<Snapshot> {
        match stack {
            Stack::Undo => &mut self.undo,
            Stack::Redo => &mut self.redo,
        }
    }
}

#[derive(Debug)]
pub struct UndoLog {
    root: Option<PathBuf>,
    depth: usize,
    actors: HashMap<ActorId, ActorStacks>,
}

impl UndoLog {
    /// A log that never touches disk.
    pub fn in_memory(depth: usize) -> Self {
        Self {
            root: None,
            depth: depth.max(1),
            actors: HashMap::new(),
        }
    }

    /// A log persisted under `root`. Nothing is read until an actor is used.
    pub fn open(root: impl Into<PathBuf>, depth: usize) -> Self {
        Self {
            root: Some(root.into()),
            depth: depth.max(1),
            actors: HashMap::new(),
        }
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Pushes onto the undo stack, dropping the oldest entries past the depth.
    pub fn push(&mut self, actor: ActorId, snapshot: Snapshot) -> Result<(), ClipError> {
        self.push_onto(actor, Stack::Undo, snapshot)
    }

    pub fn pop(&mut self, actor: ActorId) -> Result<Snapshot, ClipError> {
        self.pop_from(actor, Stack::Undo)
    }

    pub fn len(&mut self, actor: ActorId) -> Result<usize, ClipError> {
        Ok(self.stacks(actor)?.undo.len())
    }

    /// Undo entries, oldest first.
    pub fn entries(&mut self, actor: ActorId) -> Result<&[Snapshot], ClipError> {
        Ok(self.stacks(actor)?.undo.as_slice())
    }

    /// Removes the newest undo entry matching `predicate`.
    pub fn remove_latest_matching<F>(
        &mut self,
        actor: ActorId,
        predicate: F,
    ) -> Result<Option<Snapshot>, ClipError>
    where
        F: Fn(&Snapshot) -> bool,
    {
        let stack = &mut self.stacks(actor)?.undo;
        let Some(index) = stack.iter().rposition(|entry| predicate(entry)) else {
            return Ok(None);
        };
        let removed = stack.remove(index);
        self.persist(actor, Stack::Undo)?;
        Ok(Some(removed))
    }

    /// Empties both stacks of `actor`.
    pub fn clear(&mut self, actor: ActorId) -> Result<(), ClipError> {
        let stacks = self.stacks(actor)?;
        stacks.undo.clear();
        stacks.redo.clear();
        self.persist(actor, Stack::Undo)?;
        self.persist(actor, Stack::Redo)
    }

    pub fn push_redo(&mut self, actor: ActorId, snapshot: Snapshot) -> Result<(), ClipError> {
        self.push_onto(actor, Stack::Redo, snapshot)
    }

    pub fn pop_redo(&mut self, actor: ActorId) -> Result<Snapshot, ClipError> {
        self.pop_from(actor, Stack::Redo)
    }

    pub fn redo_len(&mut self, actor: ActorId) -> Result<usize, ClipError> {
        Ok(self.stacks(actor)?.redo.len())
    }

    pub fn clear_redo(&mut self, actor: ActorId) -> Result<(), ClipError> {
        let stacks = self.stacks(actor)?;
        if stacks.redo.is_empty() {
            return Ok(());
        }
        stacks.redo.clear();
        self.persist(actor, Stack::Redo)
    }

    fn push_onto(
        &mut self,
        actor: ActorId,
        stack: Stack,
        snapshot: Snapshot,
    ) -> Result<(), ClipError> {
        let depth = self.depth;
        let entries = self.stacks(actor)?.get_mut(stack);
        entries.push(snapshot);
        if entries.len() > depth {
            let dropped = entries.len() - depth;
            entries.drain(..dropped);
            debug!(
                "dropped {dropped} oldest {} entries of actor {actor}",
                stack.extension()
            );
        }
        self.persist(actor, stack)
    }

    fn pop_from(&mut self, actor: ActorId, stack: Stack) -> Result<Snapshot, ClipError> {
        let snapshot = self
            .stacks(actor)?
            .get_mut(stack)
            .pop()
            .ok_or(ClipError::NoSnapshot { actor })?;
        self.persist(actor, stack)?;
        Ok(snapshot)
    }

    fn path_for(&self, actor: ActorId, stack: Stack) -> Option<PathBuf> {
        self.root
            .as_ref()
            .map(|root| root.join(format!("{actor}.{}", stack.extension())))
    }

    fn stacks(&mut self, actor: ActorId) -> Result<&mut ActorStacks, ClipError> {
        if !self.actors.contains_key(&actor) {
            let stacks = ActorStacks {
                undo: self.load(actor, Stack::Undo)?,
                redo: self.load(actor, Stack::Redo)?,
            };
            self.actors.insert(actor, stacks);
        }
        Ok(self.actors.entry(actor).or_default())
    }

    fn load(&self, actor: ActorId, stack: Stack) -> Result<Vec<Snapshot>, ClipError> {
        let Some(path) = self.path_for(actor, stack) else {
            return Ok(Vec::new());
        };
        let Some(bytes) = storage::read_optional(&path)? else {
            return Ok(Vec::new());
        };
        let entries = decode_entries(&bytes)?;
        info!(
            "loaded {} {} entries for actor {actor} from {}",
            entries.len(),
            stack.extension(),
            path.display()
        );
        Ok(entries)
    }

    fn persist(&self, actor: ActorId, stack: Stack) -> Result<(), ClipError> {
        let Some(path) = self.path_for(actor, stack) else {
            return Ok(());
        };
        let entries = self
            .actors
            .get(&actor)
            .map(|stacks| stacks.get(stack).as_slice())
            .unwrap_or_default();
        if entries.is_empty() {
            storage::remove_if_exists(&path)?;
        } else {
            storage::write_atomic(&path, &encode_entries(entries)?)?;
        }
        Ok(())
    }
}

pub fn encode_entries(entries: &[Snapshot]) -> std::io::Result<Vec<u8>> {
    let mut raw = Vec::new();
    raw.extend_from_slice(&(entries.len() as u32).to_le_bytes());
    for entry in entries {
        codec::encode_raw(entry, &mut raw);
    }
    codec::compress(&raw)
}

pub fn decode_entries(bytes: &[u8]) -> Result<Vec<Snapshot>, CodecError> {
    let raw = codec::decompress(bytes)?;
    let mut reader = ByteReader::new(&raw);
    let count = reader.u32()? as usize;
    if count.saturating_mul(MIN_ENTRY_LEN) > reader.remaining() {
        return Err(CodecError::Truncated);
    }
    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        entries.push(codec::decode_raw(&mut reader)?);
    }
    reader.finish()?;
    Ok(entries)
}
