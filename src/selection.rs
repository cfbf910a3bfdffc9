// SPDX-License-Identifier: AGPL-3.0-or-later

//! Cursor and selection tracking: [`Range`] and [`Selection`] carry a user's cursor/selection
//! state through a [`TextOperation`], the way the document itself is carried through `apply`.

use serde::{Deserialize, Serialize};

use crate::operation::{Component, TextOperation};

/// A single contiguous selection, or a cursor when `anchor == head`.
///
/// `anchor` is where the selection started (drag origin); `head` is where it currently ends.
/// Neither is required to be the smaller of the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub anchor: u32,
    pub head: u32,
}

impl Range {
    #[must_use]
    pub const fn new(anchor: u32, head: u32) -> Self {
        Self { anchor, head }
    }

    #[must_use]
    pub const fn cursor(at: u32) -> Self {
        Self {
            anchor: at,
            head: at,
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.anchor == self.head
    }

    /// Transform this range through `op`, the way its document moved.
    #[must_use]
    pub fn transform(&self, op: &TextOperation) -> Self {
        if self.anchor == self.head {
            let pos = transform_index(op, self.anchor);
            return Self::cursor(pos);
        }
        Self {
            anchor: transform_index(op, self.anchor),
            head: transform_index(op, self.head),
        }
    }
}

/// Move a single index through `op`, per the retain/insert/delete position rule: inserts at
/// the index push it right, deletes spanning the index clamp it to the deletion's start.
fn transform_index(op: &TextOperation, index: u32) -> u32 {
    let mut old_index = index as i64;
    let mut new_index = index as i64;
    for component in op.components() {
        match component {
            Component::Retain(n) => {
                old_index -= i64::from(*n);
            }
            Component::Insert(s) => {
                new_index += s.chars().count() as i64;
            }
            Component::Delete(n) => {
                let n = i64::from(*n);
                new_index -= old_index.clamp(0, n);
                old_index -= n;
            }
        }
        if old_index < 0 {
            break;
        }
    }
    new_index.max(0) as u32
}

/// A non-empty ordered collection of [`Range`]s: one per cursor/selection an editor shows for a
/// single user (most editors show exactly one, but multi-cursor editing needs more).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    ranges: Vec<Range>,
}

#[derive(Serialize)]
struct WireSelectionOut<'a> {
    ranges: &'a [Range],
}

/// Accepts both the canonical `{"ranges": [...]}` form and a bare array, for backward
/// compatibility with older clients.
#[derive(Deserialize)]
#[serde(untagged)]
enum WireSelectionIn {
    Tagged { ranges: Vec<Range> },
    Bare(Vec<Range>),
}

impl Serialize for Selection {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        WireSelectionOut {
            ranges: &self.ranges,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Selection {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let wire = WireSelectionIn::deserialize(deserializer)?;
        let ranges = match wire {
            WireSelectionIn::Tagged { ranges } | WireSelectionIn::Bare(ranges) => ranges,
        };
        if ranges.is_empty() {
            return Err(serde::de::Error::custom("a Selection must have at least one Range"));
        }
        Ok(Self { ranges })
    }
}

impl Selection {
    /// # Panics
    /// Panics if `ranges` is empty; a `Selection` always has at least one `Range`.
    #[must_use]
    pub fn new(ranges: Vec<Range>) -> Self {
        assert!(!ranges.is_empty(), "a Selection must have at least one Range");
        Self { ranges }
    }

    #[must_use]
    pub fn single(range: Range) -> Self {
        Self {
            ranges: vec![range],
        }
    }

    #[must_use]
    pub fn cursor(at: u32) -> Self {
        Self::single(Range::cursor(at))
    }

    #[must_use]
    pub fn ranges(&self) -> &[Range] {
        &self.ranges
    }

    #[must_use]
    pub fn something_selected(&self) -> bool {
        self.ranges.iter().any(|r| !r.is_empty())
    }

    #[must_use]
    pub fn transform(&self, op: &TextOperation) -> Self {
        Self {
            ranges: self.ranges.iter().map(|r| r.transform(op)).collect(),
        }
    }

    /// Composing two selections: the later one wins outright. A remote selection update
    /// replaces the local one rather than merging with it.
    #[must_use]
    pub fn compose(&self, other: &Self) -> Self {
        other.clone()
    }

    /// Compare two selections ignoring range order (editors don't guarantee a canonical
    /// order for multi-cursor selections).
    #[must_use]
    pub fn eq_unordered(&self, other: &Self) -> bool {
        if self.ranges.len() != other.ranges.len() {
            return false;
        }
        let mut a: Vec<(u32, u32)> = self.ranges.iter().map(|r| (r.anchor, r.head)).collect();
        let mut b: Vec<(u32, u32)> = other.ranges.iter().map(|r| (r.anchor, r.head)).collect();
        a.sort_unstable();
        b.sort_unstable();
        a == b
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::arbitrary::{arbitrary_ops, build_op};
    use crate::operation::factories::{delete_at, insert_at};
    use pretty_assertions::assert_eq;

    #[test]
    fn cursor_pushed_right_by_insert_before_it() {
        let op = insert_at(0, 0, "xyz");
        let cursor = Range::cursor(2);
        assert_eq!(cursor.transform(&op), Range::cursor(5));
    }

    #[test]
    fn cursor_unaffected_by_insert_after_it() {
        let op = insert_at(5, 5, "xyz");
        let cursor = Range::cursor(2);
        assert_eq!(cursor.transform(&op), Range::cursor(2));
    }

    #[test]
    fn insert_exactly_at_cursor_pushes_it_right() {
        // Tie-break consistent with TextOperation::transform: an insert at the cursor's
        // position is treated as happening before the cursor.
        let op = insert_at(3, 3, "x");
        let cursor = Range::cursor(3);
        assert_eq!(cursor.transform(&op), Range::cursor(4));
    }

    // Open Question: cursor inside a deleted range clamps to the range's start.
    #[test]
    fn cursor_inside_deleted_range_clamps_to_start() {
        let op = delete_at(7, 2, 5); // deletes [2, 7)
        let cursor = Range::cursor(4);
        assert_eq!(cursor.transform(&op), Range::cursor(2));
    }

    #[test]
    fn cursor_before_deleted_range_is_untouched() {
        let op = delete_at(7, 5, 2);
        let cursor = Range::cursor(3);
        assert_eq!(cursor.transform(&op), Range::cursor(3));
    }

    #[test]
    fn selection_range_survives_partial_overlap_with_delete() {
        let op = delete_at(5, 2, 3); // deletes [2, 5)
        let range = Range::new(0, 4);
        assert_eq!(range.transform(&op), Range::new(0, 2));
    }

    #[test]
    fn compose_keeps_the_later_selection() {
        let a = Selection::cursor(1);
        let b = Selection::cursor(9);
        assert_eq!(a.compose(&b), b);
    }

    #[test]
    fn eq_unordered_ignores_range_order() {
        let a = Selection::new(vec![Range::cursor(1), Range::cursor(2)]);
        let b = Selection::new(vec![Range::cursor(2), Range::cursor(1)]);
        assert!(a.eq_unordered(&b));
    }

    #[test]
    fn something_selected_detects_non_empty_range() {
        assert!(!Selection::cursor(3).something_selected());
        assert!(Selection::single(Range::new(1, 4)).something_selected());
    }

    // Property 7: transform is a homomorphism over compose, for arbitrary composable operations
    // and a selection with a real (possibly non-empty) extent.
    proptest::proptest! {
        #[test]
        fn transform_is_homomorphism_over_compose(
            doc in "[a-z]{0,10}",
            ops_a in arbitrary_ops(),
            ops_b in arbitrary_ops(),
            anchor in 0u32..12,
            head in 0u32..12,
        ) {
            let len = doc.chars().count() as u32;
            if let Ok(a) = build_op(&ops_a, len) {
                if let Ok(b) = build_op(&ops_b, a.target_len()) {
                    let composed = a.compose(&b).unwrap();
                    let sel = Selection::single(Range::new(anchor.min(len), head.min(len)));
                    let direct = sel.transform(&composed);
                    let stepwise = sel.transform(&a).transform(&b);
                    proptest::prop_assert_eq!(direct, stepwise);
                }
            }
        }
    }

    #[test]
    fn wire_accepts_bare_array() {
        let json = r#"[{"anchor":1,"head":1}]"#;
        let selection: Selection = serde_json::from_str(json).unwrap();
        assert_eq!(selection, Selection::cursor(1));
    }
}
