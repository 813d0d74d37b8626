use thiserror::Error;

use crate::sequence::Symbol;
use crate::NodeId;

/// Construction failures. All of these are invariant violations, never
/// bad input, and none are recoverable. The query side never fails.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// `put_edge` was asked to overwrite an existing `(node, first symbol)` key.
    #[error("edge key (node {node}, {symbol:?}) is already present")]
    DuplicateEdgeKey { node: NodeId, symbol: Symbol },

    /// An edge the active-point invariant guarantees was not found.
    #[error("no edge (node {node}, {symbol:?}) where one must exist")]
    MissingEdge { node: NodeId, symbol: Symbol },

    /// A position derived from the active point fell outside the stream.
    #[error("position {position} is outside the symbol stream of length {len}")]
    OutOfRange { position: usize, len: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
