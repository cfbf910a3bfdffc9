// SPDX-License-Identifier: AGPL-3.0-or-later

//! The operation algebra at the heart of the synchronization core: [`TextOperation`] is an
//! ordered sequence of [`Component`]s (retain/insert/delete) together with `apply`, `invert`,
//! `compose`, and `transform`.
//!
//! Lengths throughout this module are counted in `char`s, not bytes, since operations need to
//! address positions that editors expose as character offsets.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::OtError;

/// One atomic step of a [`TextOperation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Component {
    /// Skip `n` characters of the input. `n` is always > 0.
    Retain(u32),
    /// Insert the literal string. Always non-empty.
    Insert(String),
    /// Remove the next `n` characters of the input. `n` is always > 0.
    Delete(u32),
}

/// An ordered sequence of [`Component`]s transforming a document of `base_len` characters into
/// one of `target_len` characters.
///
/// Adjacent components of the same kind are always coalesced by the builder methods, so a
/// `TextOperation` is always in canonical form: no two consecutive retains, inserts, or
/// deletes. At a position where an insert and a delete coincide, the canonical order is
/// delete-before-insert.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TextOperation {
    components: Vec<Component>,
    base_len: u32,
    target_len: u32,
}

impl fmt::Display for TextOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, component) in self.components.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            match component {
                Component::Retain(n) => write!(f, "retain({n})")?,
                Component::Insert(s) => write!(f, "insert({s:?})")?,
                Component::Delete(n) => write!(f, "delete({n})")?,
            }
        }
        write!(f, ")")
    }
}

impl TextOperation {
    /// The empty operation: `base_len == target_len == 0`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    #[must_use]
    pub const fn base_len(&self) -> u32 {
        self.base_len
    }

    #[must_use]
    pub const fn target_len(&self) -> u32 {
        self.target_len
    }

    /// True iff applying this operation to any document of the right length returns that
    /// document unchanged: either it has no components, or it's a single retain spanning the
    /// whole document.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        matches!(self.components.as_slice(), [] | [Component::Retain(_)])
    }

    /// Skip `n` characters. A no-op when `n == 0`.
    pub fn retain(&mut self, n: u32) -> &mut Self {
        if n == 0 {
            return self;
        }
        self.base_len += n;
        self.target_len += n;
        if let Some(Component::Retain(last)) = self.components.last_mut() {
            *last += n;
        } else {
            self.components.push(Component::Retain(n));
        }
        self
    }

    /// Insert `s` at the current position. A no-op when `s` is empty.
    pub fn insert(&mut self, s: &str) -> &mut Self {
        if s.is_empty() {
            return self;
        }
        self.target_len += s.chars().count() as u32;
        match self.components.last_mut() {
            Some(Component::Insert(last)) => {
                last.push_str(s);
            }
            _ => {
                // If the last component is a Delete, this naturally keeps the canonical
                // delete-before-insert order: the new Insert is simply appended after it.
                self.components.push(Component::Insert(s.to_string()));
            }
        }
        self
    }

    /// Delete the next `n` characters. A no-op when `n == 0`.
    pub fn delete(&mut self, n: u32) -> &mut Self {
        if n == 0 {
            return self;
        }
        self.base_len += n;
        match self.components.as_mut_slice() {
            [.., Component::Delete(last)] => {
                *last += n;
            }
            [.., Component::Insert(_)] => {
                // Keep the canonical delete-before-insert order: place the new Delete just
                // before the trailing Insert instead of after it, merging into a Delete that
                // already precedes that Insert if there is one.
                let len = self.components.len();
                if len >= 2 {
                    if let Component::Delete(prev) = &mut self.components[len - 2] {
                        *prev += n;
                        return self;
                    }
                }
                self.components.insert(len - 1, Component::Delete(n));
            }
            _ => {
                self.components.push(Component::Delete(n));
            }
        }
        self
    }

    /// Apply this operation to `doc`, which must have exactly `base_len()` characters.
    pub fn apply(&self, doc: &str) -> Result<String, OtError> {
        let doc_len = doc.chars().count() as u32;
        if doc_len != self.base_len {
            return Err(OtError::LengthMismatch(format!(
                "operation has base_len {}, but document has {} characters",
                self.base_len, doc_len
            )));
        }
        let mut result = String::with_capacity(self.target_len as usize);
        let mut chars = doc.chars();
        for component in &self.components {
            match component {
                Component::Retain(n) => {
                    for _ in 0..*n {
                        result.push(chars.next().expect("retain within base_len"));
                    }
                }
                Component::Insert(s) => result.push_str(s),
                Component::Delete(n) => {
                    for _ in 0..*n {
                        chars.next();
                    }
                }
            }
        }
        Ok(result)
    }

    /// Produce the operation that undoes `self`, given the document it was applied to (i.e.
    /// the *pre*-edit document, of `base_len()` characters).
    pub fn invert(&self, doc: &str) -> Result<Self, OtError> {
        let doc_len = doc.chars().count() as u32;
        if doc_len != self.base_len {
            return Err(OtError::LengthMismatch(format!(
                "invert: operation has base_len {}, but document has {} characters",
                self.base_len, doc_len
            )));
        }
        let mut inverse = Self::new();
        let mut chars = doc.chars();
        for component in &self.components {
            match component {
                Component::Retain(n) => {
                    inverse.retain(*n);
                    for _ in 0..*n {
                        chars.next();
                    }
                }
                Component::Insert(s) => {
                    inverse.delete(s.chars().count() as u32);
                }
                Component::Delete(n) => {
                    let deleted: String = (0..*n)
                        .map(|_| chars.next().expect("delete within base_len"))
                        .collect();
                    inverse.insert(&deleted);
                }
            }
        }
        Ok(inverse)
    }

    /// Compose `self` followed by `other` into a single operation equivalent to applying
    /// `self` and then `other`. Requires `self.target_len() == other.base_len()`.
    pub fn compose(&self, other: &Self) -> Result<Self, OtError> {
        if self.target_len != other.base_len {
            return Err(OtError::LengthMismatch(format!(
                "compose: left target_len {} != right base_len {}",
                self.target_len, other.base_len
            )));
        }
        let mut result = Self::new();
        let mut a = ComponentCursor::new(&self.components);
        let mut b = ComponentCursor::new(&other.components);

        loop {
            match (a.peek(), b.peek()) {
                (None, None) => break,
                (Some(Component::Delete(n)), _) => {
                    result.delete(*n);
                    a.advance_whole();
                }
                (_, Some(Component::Insert(s))) => {
                    let s = s.clone();
                    result.insert(&s);
                    b.advance_whole();
                }
                (None, _) | (_, None) => unreachable!(
                    "compose: ran out of one side while the other still had retains/deletes"
                ),
                (Some(Component::Retain(_)), Some(Component::Retain(_))) => {
                    let n = a.remaining_retain().min(b.remaining_retain());
                    result.retain(n);
                    a.consume_retain(n);
                    b.consume_retain(n);
                }
                (Some(Component::Retain(_)), Some(Component::Delete(_))) => {
                    let n = a.remaining_retain().min(b.remaining_delete());
                    result.delete(n);
                    a.consume_retain(n);
                    b.consume_delete(n);
                }
                (Some(Component::Insert(s)), Some(Component::Retain(_))) => {
                    let take = a.remaining_insert_chars(s).min(b.remaining_retain());
                    let piece = a.take_insert_chars(take);
                    result.insert(&piece);
                    b.consume_retain(take);
                }
                (Some(Component::Insert(s)), Some(Component::Delete(_))) => {
                    let take = a.remaining_insert_chars(s).min(b.remaining_delete());
                    a.take_insert_chars(take);
                    b.consume_delete(take);
                }
            }
        }
        Ok(result)
    }

    /// Transform a pair of concurrent operations `(self, other)`, both based on a document of
    /// `self.base_len() == other.base_len()` characters, into `(self', other')` such that
    /// `self.compose(other')` and `other.compose(self')` produce the same document. This is
    /// the TP1 convergence property.
    ///
    /// Tie-break: at coincident insert positions, `self`'s insert is ordered before `other`'s --
    /// i.e. `other'` retains `self`'s insert before `self'` retains `other`'s. Callers that want
    /// the opposite order should swap their arguments.
    pub fn transform(&self, other: &Self) -> Result<(Self, Self), OtError> {
        if self.base_len != other.base_len {
            return Err(OtError::LengthMismatch(format!(
                "transform: left base_len {} != right base_len {}",
                self.base_len, other.base_len
            )));
        }
        let mut a_prime = Self::new();
        let mut b_prime = Self::new();
        let mut a = ComponentCursor::new(&self.components);
        let mut b = ComponentCursor::new(&other.components);

        loop {
            match (a.peek(), b.peek()) {
                (None, None) => break,
                (Some(Component::Insert(s)), _) => {
                    let s = s.clone();
                    let n = s.chars().count() as u32;
                    a_prime.insert(&s);
                    b_prime.retain(n);
                    a.advance_whole();
                }
                (_, Some(Component::Insert(s))) => {
                    let s = s.clone();
                    let n = s.chars().count() as u32;
                    a_prime.retain(n);
                    b_prime.insert(&s);
                    b.advance_whole();
                }
                (None, _) | (_, None) => {
                    unreachable!("transform: base_len mismatch slipped through the precondition")
                }
                (Some(Component::Retain(_)), Some(Component::Retain(_))) => {
                    let n = a.remaining_retain().min(b.remaining_retain());
                    a_prime.retain(n);
                    b_prime.retain(n);
                    a.consume_retain(n);
                    b.consume_retain(n);
                }
                (Some(Component::Delete(_)), Some(Component::Delete(_))) => {
                    let n = a.remaining_delete().min(b.remaining_delete());
                    a.consume_delete(n);
                    b.consume_delete(n);
                }
                (Some(Component::Retain(_)), Some(Component::Delete(_))) => {
                    let n = a.remaining_retain().min(b.remaining_delete());
                    b_prime.delete(n);
                    a.consume_retain(n);
                    b.consume_delete(n);
                }
                (Some(Component::Delete(_)), Some(Component::Retain(_))) => {
                    let n = a.remaining_delete().min(b.remaining_retain());
                    a_prime.delete(n);
                    a.consume_delete(n);
                    b.consume_retain(n);
                }
            }
        }
        Ok((a_prime, b_prime))
    }
}

/// Walks a component slice one logical unit (char of insert, or one "unit" of retain/delete) at
/// a time, splitting components as needed. Shared by `compose` and `transform`.
struct ComponentCursor<'a> {
    components: &'a [Component],
    index: usize,
    /// Characters of the current insert already consumed, or units of the current
    /// retain/delete already consumed.
    offset: u32,
}

impl<'a> ComponentCursor<'a> {
    fn new(components: &'a [Component]) -> Self {
        Self {
            components,
            index: 0,
            offset: 0,
        }
    }

    fn peek(&self) -> Option<&Component> {
        self.components.get(self.index)
    }

    fn advance_whole(&mut self) {
        self.index += 1;
        self.offset = 0;
    }

    fn remaining_retain(&self) -> u32 {
        match self.peek() {
            Some(Component::Retain(n)) => n - self.offset,
            _ => 0,
        }
    }

    fn remaining_delete(&self) -> u32 {
        match self.peek() {
            Some(Component::Delete(n)) => n - self.offset,
            _ => 0,
        }
    }

    fn remaining_insert_chars(&self, s: &str) -> u32 {
        s.chars().count() as u32 - self.offset
    }

    fn consume_retain(&mut self, n: u32) {
        let remaining = self.remaining_retain();
        if n == remaining {
            self.advance_whole();
        } else {
            self.offset += n;
        }
    }

    fn consume_delete(&mut self, n: u32) {
        let remaining = self.remaining_delete();
        if n == remaining {
            self.advance_whole();
        } else {
            self.offset += n;
        }
    }

    /// Take (and consume) the next `n` characters of the current insert component.
    fn take_insert_chars(&mut self, n: u32) -> String {
        let Some(Component::Insert(s)) = self.peek() else {
            unreachable!("take_insert_chars called without an insert component");
        };
        let piece: String = s.chars().skip(self.offset as usize).take(n as usize).collect();
        let total = s.chars().count() as u32;
        if self.offset + n == total {
            self.advance_whole();
        } else {
            self.offset += n;
        }
        piece
    }
}

/// Wire representation of a single [`Component`], matching §6 of the design: a positive
/// integer is a retain, a negative integer is a delete, and a string is an insert.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum WireComponent {
    Count(i64),
    Insert(String),
}

impl Serialize for TextOperation {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let ops: Vec<WireComponent> = self
            .components
            .iter()
            .map(|c| match c {
                Component::Retain(n) => WireComponent::Count(i64::from(*n)),
                Component::Delete(n) => WireComponent::Count(-i64::from(*n)),
                Component::Insert(s) => WireComponent::Insert(s.clone()),
            })
            .collect();
        let mut state = serializer.serialize_struct("TextOperation", 1)?;
        state.serialize_field("ops", &ops)?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for TextOperation {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Wire {
            ops: Vec<WireComponent>,
        }
        let wire = Wire::deserialize(deserializer)?;
        Self::from_wire_components(wire.ops).map_err(serde::de::Error::custom)
    }
}

impl TextOperation {
    fn from_wire_components(components: Vec<WireComponent>) -> Result<Self, OtError> {
        let mut op = TextOperation::new();
        for component in components {
            match component {
                WireComponent::Count(n) if n > 0 => {
                    op.retain(n as u32);
                }
                WireComponent::Count(n) if n < 0 => {
                    op.delete((-n) as u32);
                }
                WireComponent::Count(_) => {
                    return Err(OtError::MalformedOperation(
                        "a retain/delete component must be non-zero".to_string(),
                    ));
                }
                WireComponent::Insert(s) => {
                    if s.is_empty() {
                        return Err(OtError::MalformedOperation(
                            "an insert component must be non-empty".to_string(),
                        ));
                    }
                    op.insert(&s);
                }
            }
        }
        Ok(op)
    }
}
