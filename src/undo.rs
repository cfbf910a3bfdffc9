// SPDX-License-Identifier: AGPL-3.0-or-later

//! Undo/redo as stacks of inverse operations, transformed along with the document so that
//! popping the top of the undo stack always undoes the most recent edit *in the current
//! document*, even after remote edits have landed in between.

use tracing::debug;

use crate::error::OtError;
use crate::operation::TextOperation;

/// Which direction, if any, `add` is currently being called from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Mode {
    #[default]
    Normal,
    Undoing,
    Redoing,
}

/// Maintains inverse-operation stacks for undo/redo, consistent with concurrent edits
/// transformed in via [`UndoManager::transform`].
#[derive(Debug, Clone)]
pub struct UndoManager {
    undo_stack: Vec<TextOperation>,
    redo_stack: Vec<TextOperation>,
    mode: Mode,
    dont_compose: bool,
    max_items: usize,
}

impl UndoManager {
    #[must_use]
    pub fn new(max_items: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            mode: Mode::Normal,
            dont_compose: false,
            max_items,
        }
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    #[must_use]
    pub const fn is_undoing(&self) -> bool {
        matches!(self.mode, Mode::Undoing)
    }

    #[must_use]
    pub const fn is_redoing(&self) -> bool {
        matches!(self.mode, Mode::Redoing)
    }

    /// Record `op` (the inverse of a just-applied edit). `compose` requests merging with the
    /// stack top when possible; it is ignored while undoing/redoing.
    pub fn add(&mut self, op: TextOperation, compose: bool) {
        match self.mode {
            Mode::Undoing => {
                self.redo_stack.push(op);
                self.dont_compose = true;
            }
            Mode::Redoing => {
                self.undo_stack.push(op);
                self.dont_compose = true;
            }
            Mode::Normal => {
                if !self.dont_compose && compose {
                    if let Some(top) = self.undo_stack.pop() {
                        match op.compose(&top) {
                            Ok(composed) => self.undo_stack.push(composed),
                            Err(_) => {
                                self.undo_stack.push(top);
                                self.push_bounded(op);
                            }
                        }
                    } else {
                        self.push_bounded(op);
                    }
                } else {
                    self.push_bounded(op);
                }
                self.redo_stack.clear();
                self.dont_compose = false;
            }
        }
    }

    fn push_bounded(&mut self, op: TextOperation) {
        self.undo_stack.push(op);
        if self.undo_stack.len() > self.max_items {
            self.undo_stack.remove(0);
        }
    }

    /// Transform every stacked inverse through a concurrently-applied `op`, so that later
    /// undo/redo still apply cleanly to the post-`op` document.
    ///
    /// Walks each stack from the top down, pairwise-transforming each entry against the
    /// running `op` (which becomes the transformed-against operand for the next entry down),
    /// and drops any entry whose transformed form is a noop.
    pub fn transform(&mut self, op: &TextOperation) {
        self.undo_stack = Self::transform_stack(&self.undo_stack, op);
        self.redo_stack = Self::transform_stack(&self.redo_stack, op);
    }

    fn transform_stack(stack: &[TextOperation], op: &TextOperation) -> Vec<TextOperation> {
        let mut running = op.clone();
        let mut transformed = Vec::with_capacity(stack.len());
        for entry in stack.iter().rev() {
            let Ok((entry_prime, running_prime)) = entry.transform(&running) else {
                debug!("dropping undo stack entry that no longer transforms against op");
                continue;
            };
            running = running_prime;
            if !entry_prime.is_noop() {
                transformed.push(entry_prime);
            }
        }
        transformed.reverse();
        transformed
    }

    /// Pop the most recent inverse and hand it to `f`, which is expected to apply it to the
    /// document and then call [`UndoManager::add`] with *its* inverse (recorded onto the redo
    /// stack, since mode is `Undoing`).
    pub fn perform_undo<F: FnOnce(&TextOperation, &mut Self)>(&mut self, f: F) -> Result<(), OtError> {
        let op = self.undo_stack.pop().ok_or(OtError::UndoEmpty)?;
        self.mode = Mode::Undoing;
        f(&op, self);
        self.mode = Mode::Normal;
        Ok(())
    }

    /// Symmetric to [`UndoManager::perform_undo`], popping from the redo stack.
    pub fn perform_redo<F: FnOnce(&TextOperation, &mut Self)>(&mut self, f: F) -> Result<(), OtError> {
        let op = self.redo_stack.pop().ok_or(OtError::RedoEmpty)?;
        self.mode = Mode::Redoing;
        f(&op, self);
        self.mode = Mode::Normal;
        Ok(())
    }
}
