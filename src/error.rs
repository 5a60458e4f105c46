//! Contract-violation and retrieval errors.

use thiserror::Error;

/// Contract violations raised while wiring a graph, plus retrieval failures.
///
/// Construction-time errors leave the graph exactly as it was before the
/// offending call; it remains valid and usable.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum GraphError {
    /// A typed edge is already bound to this argument position of the child.
    #[error("argument position {position} is already bound to a parent")]
    PositionAlreadyBound {
        /// Zero-based argument position of the rejected edge.
        position: usize,
    },
    /// A moved result has exactly one consumer; a second value edge on the
    /// same producer is rejected, as is a move claim on a producer that
    /// already fans out.
    #[error("result is already claimed and cannot fan out to another child")]
    MoveFanOut,
    /// A result cannot both be retained for the caller and moved into a
    /// child, whichever of the two is requested second.
    #[error("a moved result cannot also be retained as graph output")]
    OutputMoveConflict,
    /// The node holds no result: it has not run yet, its result was moved
    /// into a child, or the graph was reset.
    #[error("no result stored in node")]
    NoResult,
}
