// SPDX-License-Identifier: AGPL-3.0-or-later

//! The client-side protocol state machine: tracks exactly one outstanding operation in flight
//! to the server, buffers local edits made while it's outstanding, and keeps a local
//! [`Selection`] and [`UndoManager`] in lockstep with the document.

use tracing::debug;

use crate::error::OtError;
use crate::operation::TextOperation;
use crate::selection::Selection;
use crate::undo::UndoManager;

/// The three states a client's connection to the server can be in. Transitions are driven by
/// [`Client::apply_client`], [`Client::apply_server`], [`Client::server_ack`], and
/// [`Client::server_reconnect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientState {
    /// No operation in flight; the client's document matches the server's as of `revision`.
    Synchronized,
    /// `outstanding` was sent to the server and not yet acknowledged.
    AwaitingConfirm { outstanding: TextOperation },
    /// `outstanding` is in flight; `buffer` holds local edits made since, composed together.
    AwaitingWithBuffer {
        outstanding: TextOperation,
        buffer: TextOperation,
    },
}

/// Embedder-provided I/O boundary for a [`Client`].
///
/// Neither method may re-enter the owning `Client`'s state-transition methods; if the embedder
/// needs to react by mutating the client, it must queue the reaction and run it after the
/// current transition returns.
pub trait ClientCallbacks {
    /// Transmit `op`, sent against `revision`, to the server. Fire-and-forget: this must not
    /// call back synchronously into the `Client`.
    fn send_operation(&mut self, revision: u64, op: &TextOperation);

    /// Apply `op` to the locally rendered document.
    fn apply_operation(&mut self, op: &TextOperation);
}

/// One client's view of the protocol: its state, its revision, and the local selection/undo
/// state that ride along with every operation.
#[derive(Debug, Clone)]
pub struct Client {
    state: ClientState,
    revision: u64,
    selection: Option<Selection>,
    undo: UndoManager,
}

impl Client {
    #[must_use]
    pub fn new(revision: u64, undo_max_items: usize) -> Self {
        Self {
            state: ClientState::Synchronized,
            revision,
            selection: None,
            undo: UndoManager::new(undo_max_items),
        }
    }

    #[must_use]
    pub fn state(&self) -> &ClientState {
        &self.state
    }

    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    #[must_use]
    pub const fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    #[must_use]
    pub fn undo_manager(&self) -> &UndoManager {
        &self.undo
    }

    #[must_use]
    pub fn undo_manager_mut(&mut self) -> &mut UndoManager {
        &mut self.undo
    }

    pub fn set_selection(&mut self, selection: Option<Selection>) {
        self.selection = selection;
    }

    /// Record a local edit: `op` is the forward operation the embedder already applied to its
    /// own document, and `inverse` is `op`'s inverse computed against the pre-edit document
    /// (for the undo manager). `compose_undo` is the `compose` flag passed through to
    /// [`UndoManager::add`].
    pub fn apply_client<C: ClientCallbacks>(
        &mut self,
        op: TextOperation,
        inverse: TextOperation,
        compose_undo: bool,
        callbacks: &mut C,
    ) {
        self.undo.add(inverse, compose_undo);
        if let Some(selection) = &self.selection {
            self.selection = Some(selection.transform(&op));
        }
        match std::mem::replace(&mut self.state, ClientState::Synchronized) {
            ClientState::Synchronized => {
                callbacks.send_operation(self.revision, &op);
                self.state = ClientState::AwaitingConfirm { outstanding: op };
            }
            ClientState::AwaitingConfirm { outstanding } => {
                self.state = ClientState::AwaitingWithBuffer {
                    outstanding,
                    buffer: op,
                };
            }
            ClientState::AwaitingWithBuffer { outstanding, buffer } => {
                let composed = buffer.compose(&op).expect("local buffer composes with local edit");
                self.state = ClientState::AwaitingWithBuffer {
                    outstanding,
                    buffer: composed,
                };
            }
        }
    }

    /// Apply an operation broadcast by the server (authored by another client).
    pub fn apply_server<C: ClientCallbacks>(
        &mut self,
        op: TextOperation,
        callbacks: &mut C,
    ) -> Result<(), OtError> {
        self.revision += 1;
        match std::mem::replace(&mut self.state, ClientState::Synchronized) {
            ClientState::Synchronized => {
                callbacks.apply_operation(&op);
                self.transform_local_state(&op);
                self.state = ClientState::Synchronized;
            }
            ClientState::AwaitingConfirm { outstanding } => {
                let (outstanding_prime, server_prime) = outstanding.transform(&op)?;
                callbacks.apply_operation(&server_prime);
                self.transform_local_state(&server_prime);
                self.state = ClientState::AwaitingConfirm {
                    outstanding: outstanding_prime,
                };
            }
            ClientState::AwaitingWithBuffer { outstanding, buffer } => {
                let (outstanding_prime, server_prime) = outstanding.transform(&op)?;
                let (buffer_prime, server_double_prime) = buffer.transform(&server_prime)?;
                callbacks.apply_operation(&server_double_prime);
                self.transform_local_state(&server_double_prime);
                self.state = ClientState::AwaitingWithBuffer {
                    outstanding: outstanding_prime,
                    buffer: buffer_prime,
                };
            }
        }
        Ok(())
    }

    fn transform_local_state(&mut self, op: &TextOperation) {
        if let Some(selection) = &self.selection {
            self.selection = Some(selection.transform(op));
        }
        self.undo.transform(op);
    }

    /// The server has acknowledged the outstanding operation.
    pub fn server_ack<C: ClientCallbacks>(&mut self, callbacks: &mut C) -> Result<(), OtError> {
        self.revision += 1;
        match std::mem::replace(&mut self.state, ClientState::Synchronized) {
            ClientState::Synchronized => {
                self.state = ClientState::Synchronized;
                Err(OtError::NoPendingOperation)
            }
            ClientState::AwaitingConfirm { .. } => {
                self.state = ClientState::Synchronized;
                Ok(())
            }
            ClientState::AwaitingWithBuffer { buffer, .. } => {
                callbacks.send_operation(self.revision, &buffer);
                self.state = ClientState::AwaitingConfirm { outstanding: buffer };
                Ok(())
            }
        }
    }

    /// The connection dropped and came back; resend whatever was outstanding, if anything.
    pub fn server_reconnect<C: ClientCallbacks>(&mut self, callbacks: &mut C) {
        match &self.state {
            ClientState::Synchronized => {
                debug!("reconnect with nothing outstanding, nothing to resend");
            }
            ClientState::AwaitingConfirm { outstanding } | ClientState::AwaitingWithBuffer { outstanding, .. } => {
                callbacks.send_operation(self.revision, outstanding);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::factories::insert_at;
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    #[derive(Default)]
    struct Recorder {
        sent: Vec<(u64, TextOperation)>,
        applied: Vec<TextOperation>,
    }

    impl ClientCallbacks for Recorder {
        fn send_operation(&mut self, revision: u64, op: &TextOperation) {
            self.sent.push((revision, op.clone()));
        }

        fn apply_operation(&mut self, op: &TextOperation) {
            self.applied.push(op.clone());
        }
    }

    // S4: local edit while synchronized sends immediately and moves to AwaitingConfirm; a
    // second local edit while awaiting confirm buffers instead of sending.
    #[test]
    fn local_edits_send_then_buffer() {
        let mut client = Client::new(0, 100);
        let mut io = Recorder::default();

        let op1 = insert_at(0, 0, "a");
        client.apply_client(op1.clone(), op1.invert("").unwrap(), false, &mut io);
        assert_eq!(
            client.state(),
            &ClientState::AwaitingConfirm {
                outstanding: op1.clone()
            }
        );
        assert_eq!(io.sent, vec![(0, op1.clone())]);

        let op2 = insert_at(1, 1, "b");
        client.apply_client(op2.clone(), op2.invert("a").unwrap(), false, &mut io);
        assert_eq!(
            client.state(),
            &ClientState::AwaitingWithBuffer {
                outstanding: op1,
                buffer: op2
            }
        );
        // Still only one send: the buffered edit was not transmitted.
        assert_eq!(io.sent.len(), 1);
    }

    #[test]
    fn server_ack_with_buffer_sends_it_next() {
        let mut client = Client::new(0, 100);
        let mut io = Recorder::default();
        let op1 = insert_at(0, 0, "a");
        let op2 = insert_at(1, 1, "b");
        client.apply_client(op1.clone(), op1.invert("").unwrap(), false, &mut io);
        client.apply_client(op2.clone(), op2.invert("a").unwrap(), false, &mut io);

        client.server_ack(&mut io).unwrap();
        assert_eq!(client.revision(), 1);
        assert_eq!(
            client.state(),
            &ClientState::AwaitingConfirm { outstanding: op2.clone() }
        );
        assert_eq!(io.sent, vec![(0, op1), (1, op2)]);
    }

    #[test]
    fn server_ack_with_nothing_outstanding_is_an_error() {
        let mut client = Client::new(0, 100);
        let mut io = Recorder::default();
        assert_eq!(client.server_ack(&mut io), Err(OtError::NoPendingOperation));
    }

    #[test]
    fn apply_server_while_synchronized_just_applies() {
        let mut client = Client::new(0, 100);
        let mut io = Recorder::default();
        let remote = insert_at(0, 0, "x");
        client.apply_server(remote.clone(), &mut io).unwrap();
        assert_eq!(client.revision(), 1);
        assert_eq!(io.applied, vec![remote]);
        assert_eq!(client.state(), &ClientState::Synchronized);
    }

    #[test]
    fn apply_server_while_awaiting_confirm_transforms_outstanding() {
        let mut client = Client::new(0, 100);
        let mut io = Recorder::default();
        let local = insert_at(0, 0, "L");
        client.apply_client(local.clone(), local.invert("").unwrap(), false, &mut io);

        let remote = insert_at(0, 0, "R");
        client.apply_server(remote, &mut io).unwrap();
        match client.state() {
            ClientState::AwaitingConfirm { outstanding } => {
                // The local op, transformed against the remote insert at the same position,
                // keeps inserting "L" but now after "R" has been retained.
                assert_eq!(outstanding.base_len(), 1);
            }
            other => panic!("expected AwaitingConfirm, got {other:?}"),
        }
    }

    #[test]
    fn reconnect_resends_outstanding() {
        let mut client = Client::new(3, 100);
        let mut io = Recorder::default();
        let op = insert_at(0, 0, "a");
        client.apply_client(op.clone(), op.invert("").unwrap(), false, &mut io);
        io.sent.clear();
        client.server_reconnect(&mut io);
        assert_eq!(io.sent, vec![(3, op)]);
    }

    #[traced_test]
    #[test]
    fn reconnect_with_nothing_outstanding_sends_nothing() {
        let mut client = Client::new(0, 100);
        let mut io = Recorder::default();
        client.server_reconnect(&mut io);
        assert!(io.sent.is_empty());
    }
}
