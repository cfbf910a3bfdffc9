// SPDX-License-Identifier: AGPL-3.0-or-later

//! Operational transformation core for real-time collaborative text editing.
//!
//! This crate is the synchronization engine, not an editor: it has no transport, no file I/O,
//! and no persistence. A [`Server`] linearizes operations submitted against a shared document;
//! a [`Client`] tracks the state of one connection to it, buffering local edits while one is
//! outstanding; [`TextOperation`] is the algebra both are built on; [`UndoManager`] and
//! [`Selection`]/[`Range`] ride along with it. Wiring a `Client`/`Server` pair to a real
//! network and a real text buffer is the embedder's job, through the [`ClientCallbacks`] trait.

pub mod client;
pub mod error;
pub mod operation;
pub mod selection;
pub mod server;
pub mod undo;

pub use client::{Client, ClientCallbacks, ClientState};
pub use error::OtError;
pub use operation::{Component, TextOperation};
pub use selection::{Range, Selection};
pub use server::Server;
pub use undo::UndoManager;
