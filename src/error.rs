use crate::attachment::AttachmentKind;
use crate::codec::CodecError;
use crate::geometry::Point;
use crate::guard::ActorId;
use std::fmt;
use std::io;

#[derive(Debug)]
pub enum ClipError {
    /// A position fell outside world bounds and was clipped.
    OutOfBounds { position: Point },
    Codec(CodecError),
    /// Undo or redo on an empty stack.
    NoSnapshot { actor: ActorId },
    /// The actor already has a running operation.
    Busy { actor: ActorId },
    /// A fixture could not be found or placed at a position.
    FixtureUnavailable {
        kind: AttachmentKind,
        position: Point,
    },
    Cancelled,
    TooLarge { cells: u64, limit: u64 },
    InvalidClipName(String),
    ClipNotFound(String),
    WorkerPanicked,
    Io(io::Error),
}

impl fmt::Display for ClipError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfBounds { position } => write!(f, "position {position} is outside the world"),
            Self::Codec(error) => write!(f, "snapshot codec error: {error}"),
            Self::NoSnapshot { actor } => write!(f, "no snapshot available for actor {actor}"),
            Self::Busy { actor } => write!(f, "actor {actor} already has an operation running"),
            Self::FixtureUnavailable { kind, position } => {
                write!(f, "no {kind} fixture available at {position}")
            }
            Self::Cancelled => write!(f, "operation cancelled before any change was made"),
            Self::TooLarge { cells, limit } => {
                write!(f, "region of {cells} cells exceeds the limit of {limit}")
            }
            Self::InvalidClipName(name) => write!(f, "invalid clip name {name:?}"),
            Self::ClipNotFound(name) => write!(f, "clip {name:?} does not exist"),
            Self::WorkerPanicked => write!(f, "operation worker panicked"),
            Self::Io(error) => write!(f, "storage error: {error}"),
        }
    }
}

impl std::error::Error for ClipError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Codec(error) => Some(error),
            Self::Io(error) => Some(error),
            _ => None,
        }
    }
}

impl From<CodecError> for ClipError {
    fn from(error: CodecError) -> Self {
        Self::Codec(error)
    }
}

impl From<io::Error> for ClipError {
    fn from(error: io::Error) -> Self {
        Self::Io(error)
    }
}
