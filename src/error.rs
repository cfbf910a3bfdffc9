// SPDX-License-Identifier: AGPL-3.0-or-later

//! The crate's single error type.
//!
//! Every fallible public function in `concord_ot` returns `Result<_, OtError>`. The core does
//! not retry and does not decide on the caller's behalf whether an error is recoverable -- see
//! the doc comment on each variant for what the caller is expected to do.

use thiserror::Error;

/// Errors produced by the operation algebra, the server, the client state machine, and the
/// undo manager.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OtError {
    /// `apply`, `compose`, or `transform` was called with operations whose lengths don't line
    /// up (e.g. `apply(op, doc)` where `doc.chars().count() != op.base_len()`). Fatal for the
    /// call; not recovered internally.
    #[error("length mismatch: {0}")]
    LengthMismatch(String),

    /// A `TextOperation` violated a structural invariant at construction or deserialization
    /// (a non-positive retain/delete count, or an empty insert).
    #[error("malformed operation: {0}")]
    MalformedOperation(String),

    /// The server received a frame citing a revision outside `0..=operations.len()`. The
    /// session should be terminated.
    #[error("revision {revision} is out of range (history has {history_len} operations)")]
    RevisionOutOfRange { revision: u64, history_len: u64 },

    /// `server_ack` arrived while the client was `Synchronized`, i.e. there was nothing
    /// outstanding to acknowledge. Fatal protocol error for the session.
    #[error("received a server ack with no pending operation")]
    NoPendingOperation,

    /// `perform_undo` was called with an empty undo stack. Non-fatal; the UI should disable
    /// the undo action instead of calling this in the first place.
    #[error("undo stack is empty")]
    UndoEmpty,

    /// `perform_redo` was called with an empty redo stack. Non-fatal; the UI should disable
    /// the redo action instead of calling this in the first place.
    #[error("redo stack is empty")]
    RedoEmpty,
}
