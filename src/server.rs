// SPDX-License-Identifier: AGPL-3.0-or-later

//! The server-side coordinator: linearizes concurrent operations against an append-only
//! history, the way `OTServer` linearizes editor/CRDT changes in the teacher codebase, but
//! synchronously and against a single in-memory document.

use tracing::debug;

use crate::error::OtError;
use crate::operation::TextOperation;

/// Owns the canonical document and its append-only operation history.
#[derive(Debug, Clone)]
pub struct Server {
    document: String,
    operations: Vec<TextOperation>,
}

impl Server {
    #[must_use]
    pub fn new(document: impl Into<String>) -> Self {
        Self {
            document: document.into(),
            operations: Vec::new(),
        }
    }

    #[must_use]
    pub fn document(&self) -> &str {
        &self.document
    }

    #[must_use]
    pub fn revision(&self) -> u64 {
        self.operations.len() as u64
    }

    /// Operations appended since `from`. Used by a reconnecting client to catch up.
    pub fn history(&self, from: u64) -> Result<&[TextOperation], OtError> {
        let len = self.operations.len() as u64;
        if from > len {
            return Err(OtError::RevisionOutOfRange {
                revision: from,
                history_len: len,
            });
        }
        Ok(&self.operations[from as usize..])
    }

    /// Accept `op`, sent against `revision`, and linearize it into the history.
    ///
    /// Transforms `op` against every operation appended since `revision`, applies the result
    /// to the document, appends it to the history, and returns it for the caller to
    /// broadcast.
    pub fn receive_operation(&mut self, revision: u64, op: TextOperation) -> Result<TextOperation, OtError> {
        let len = self.operations.len() as u64;
        if revision > len {
            return Err(OtError::RevisionOutOfRange {
                revision,
                history_len: len,
            });
        }
        let mut op = op;
        for historical in &self.operations[revision as usize..] {
            op = op.transform(historical)?.0;
        }
        self.document = op.apply(&self.document)?;
        debug!(revision = self.operations.len() as u64 + 1, "applied operation");
        self.operations.push(op.clone());
        Ok(op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::factories::insert_at;
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    // S5: two clients, starting from the same revision, both submit against the server; the
    // second submission must be transformed against the first before applying.
    #[traced_test]
    #[test]
    fn concurrent_submissions_are_linearized() {
        let mut server = Server::new("ab");
        let client_a = insert_at(2, 0, "X");
        let client_b = insert_at(2, 2, "Y");

        let applied_a = server.receive_operation(0, client_a).unwrap();
        assert_eq!(applied_a.apply("ab").unwrap(), "Xab");
        assert_eq!(server.document(), "Xab");

        // client_b was composed against the pre-A document, so the server transforms it.
        let applied_b = server.receive_operation(0, client_b).unwrap();
        assert_eq!(server.document(), applied_b.apply("Xab").unwrap());
        assert_eq!(server.document(), "XabY");
        assert_eq!(server.revision(), 2);
    }

    #[test]
    fn out_of_range_revision_is_rejected() {
        let mut server = Server::new("ab");
        let err = server.receive_operation(5, insert_at(2, 0, "x")).unwrap_err();
        assert_eq!(
            err,
            OtError::RevisionOutOfRange {
                revision: 5,
                history_len: 0
            }
        );
    }

    #[test]
    fn history_since_a_revision() {
        let mut server = Server::new("");
        server.receive_operation(0, insert_at(0, 0, "a")).unwrap();
        server.receive_operation(1, insert_at(1, 1, "b")).unwrap();
        assert_eq!(server.history(1).unwrap().len(), 1);
        assert!(server.history(5).is_err());
    }

    // Property 10: replaying the whole history against the empty string reproduces the
    // document.
    #[test]
    fn replaying_history_reproduces_document() {
        let mut server = Server::new("");
        server.receive_operation(0, insert_at(0, 0, "hello")).unwrap();
        server.receive_operation(1, insert_at(5, 5, " world")).unwrap();

        let mut replayed = String::new();
        for op in server.history(0).unwrap() {
            replayed = op.apply(&replayed).unwrap();
        }
        assert_eq!(replayed, server.document());
    }
}
