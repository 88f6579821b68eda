use std::{
    collections::TryReserveError,
    error::Error,
    fmt::{self, Display},
    io,
};

use crate::{
    graph::SkipKind,
    layers::{LayerId, Shape},
};

/// The result type used in the entire morphism crate.
pub type Result<T> = std::result::Result<T, MorphErr>;

/// The morphism crate's error type.
#[derive(Debug)]
pub enum MorphErr {
    /// An operator was invoked on a layer that is not eligible for it.
    InvalidOperation {
        op: &'static str,
        layer_id: LayerId,
        reason: String,
    },
    /// A skip connection violates the ordering or shape preconditions.
    IncompatibleSkip {
        source: LayerId,
        sink: LayerId,
        kind: SkipKind,
        reason: &'static str,
    },
    UnknownLayer(LayerId),
    ShapeMismatch {
        layer_id: LayerId,
        expected: Shape,
        got: Shape,
    },
    InvalidShape {
        what: &'static str,
        shape: Shape,
    },
    InvalidConfig(String),
    /// A graph's structure breaks one of its invariants.
    InvalidGraph(String),
    /// Cloning a graph failed to allocate.
    Allocation(TryReserveError),
    Io(io::Error),
    Json(serde_json::Error),
}

impl MorphErr {
    /// Whether an operator may swallow this error and simply yield no candidate.
    ///
    /// # Returns
    /// `true` for structural errors local to one mutation attempt, `false` for resource or I/O
    /// failures that must reach the caller.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            MorphErr::InvalidOperation { .. }
                | MorphErr::IncompatibleSkip { .. }
                | MorphErr::UnknownLayer(_)
                | MorphErr::ShapeMismatch { .. }
                | MorphErr::InvalidShape { .. }
        )
    }
}

impl Display for MorphErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MorphErr::InvalidOperation {
                op,
                layer_id,
                reason,
            } => write!(f, "cannot {op} layer {layer_id}: {reason}"),
            MorphErr::IncompatibleSkip {
                source,
                sink,
                kind,
                reason,
            } => write!(
                f,
                "incompatible {kind} skip connection from layer {source} to layer {sink}: {reason}"
            ),
            MorphErr::UnknownLayer(id) => write!(f, "there's no layer with id {id}"),
            MorphErr::ShapeMismatch {
                layer_id,
                expected,
                got,
            } => write!(
                f,
                "layer {layer_id} expects an input shaped {expected} but would receive {got}"
            ),
            MorphErr::InvalidShape { what, shape } => write!(f, "invalid {what} shape {shape}"),
            MorphErr::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            MorphErr::InvalidGraph(msg) => write!(f, "invalid graph: {msg}"),
            MorphErr::Allocation(e) => write!(f, "failed to allocate graph: {e}"),
            MorphErr::Io(e) => write!(f, "io error: {e}"),
            MorphErr::Json(e) => write!(f, "json error: {e}"),
        }
    }
}

impl Error for MorphErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MorphErr::Allocation(e) => Some(e),
            MorphErr::Io(e) => Some(e),
            MorphErr::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TryReserveError> for MorphErr {
    fn from(value: TryReserveError) -> Self {
        Self::Allocation(value)
    }
}

impl From<io::Error> for MorphErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for MorphErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}
