use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::layers::LayerId;

/// How a skip connection merges into its sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipKind {
    /// Elementwise addition.
    Add,
    /// Concatenation along the feature dimension.
    Concat,
}

impl SkipKind {
    pub const ALL: [SkipKind; 2] = [SkipKind::Add, SkipKind::Concat];
}

impl Display for SkipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipKind::Add => write!(f, "add"),
            SkipKind::Concat => write!(f, "concat"),
        }
    }
}

/// An edge bypassing the main chain: the merged output of `source` is combined with the output of
/// `sink` before flowing into `sink`'s successor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SkipConnection {
    pub source: LayerId,
    pub sink: LayerId,
    pub kind: SkipKind,
}

impl SkipConnection {
    pub fn new(source: LayerId, sink: LayerId, kind: SkipKind) -> Self {
        Self { source, sink, kind }
    }
}

impl Display for SkipConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -{}-> {}", self.source, self.kind, self.sink)
    }
}
