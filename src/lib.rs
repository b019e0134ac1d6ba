//! Capture, paste and undo for rectangular regions of a tile world.
//!
//! A [`Snapshot`] holds a region's cells plus the contents of the fixtures
//! anchored inside it. [`Clipboard`] runs copies, pastes and undos against a
//! shared host implementing [`CellStore`] and [`FixtureRegistry`].

pub mod attachment;
pub mod cell;
pub mod clipboard;
pub mod clips;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod fixtures;
pub mod geometry;
pub mod guard;
pub mod snapshot;
pub mod storage;
pub mod store;
pub mod undo;
pub mod world;

pub use attachment::{Attachment, AttachmentKind, Attachments, ItemStack, SensorMode};
pub use cell::{Cell, Grid};
pub use clipboard::{Clipboard, PendingOperation};
pub use clips::ClipStore;
pub use codec::{decode, encode, CodecError};
pub use config::ClipConfig;
pub use engine::{apply_snapshot, ApplyReport};
pub use error::ClipError;
pub use geometry::{Offset, Point, Rect};
pub use guard::{ActorId, CancellationHandle, TaskGuard, TaskToken};
pub use snapshot::{capture, Snapshot};
pub use store::{CellStore, FixtureId, FixtureRegistry, FixtureState, Host, SharedHost};
pub use undo::UndoLog;
pub use world::MemoryWorld;
