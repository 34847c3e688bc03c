//! Position adjustment of cached annotations across edits.
//!
//! Pure, stateless transformations: given cached semantic tokens or diagnostics and one
//! [`Edit`], drop what the edit invalidated and shift what survives. Callers replay the
//! edit chain between two snapshots through these functions **edit by edit, in snapshot
//! order** - never as one aggregate delta - because an earlier removal/insertion pair can
//! change whether a later edit's span intersects a cached item.
//!
//! The rules:
//! - an item whose primary offset falls strictly inside the removed span is dropped;
//! - an item at or after the end of the removed span shifts by `delta`;
//! - a diagnostic is additionally dropped when any of its ranges or fixit ranges touches
//!   the removed span (partial invalidation of sub-ranges is not attempted), and a
//!   dropped note drops its parent diagnostic;
//! - a pure insertion (nothing removed) invalidates no tokens: items at or after the
//!   insertion point shift, an item spanning it stays in place. A diagnostic whose range
//!   or fixit the insertion splits is still dropped, since the stale range cannot be
//!   stretched over the new text.
//!
//! A no-op edit (nothing removed, nothing inserted) leaves every item byte-identical.

use std::sync::Arc;

use edit_state_lang::ByteRange;

use crate::diagnostics::Diagnostic;
use crate::history::Edit;
use crate::semantic::SemanticToken;

fn shifted(offset: usize, delta: isize) -> usize {
    offset.saturating_add_signed(delta)
}

/// Adjust semantic tokens (sorted by offset) across one edit.
///
/// Any token touching the replaced span is dropped (a token is a classification of the
/// exact bytes it covers, so a replacement reaching it invalidates it); tokens strictly
/// after the span shift by the edit's delta. A pure insertion drops nothing: the removed
/// span is empty, so only tokens at or after the insertion point shift. The sort order
/// is preserved.
pub fn adjust_token_positions(tokens: &mut Vec<SemanticToken>, edit: &Edit) {
    if edit.removed_len == 0 && edit.inserted_len() == 0 {
        return;
    }
    let start = edit.offset;
    let delta = edit.delta();

    if edit.removed_len == 0 {
        let first_after = tokens.partition_point(|t| t.offset < start);
        for token in &mut tokens[first_after..] {
            token.offset = shifted(token.offset, delta);
        }
        return;
    }

    let end = edit.removed_end();
    // Tokens are sorted, so the invalidated window and the shifted tail are both found by
    // binary search.
    let first_touched = tokens.partition_point(|t| t.offset + t.length < start);
    let first_after = tokens.partition_point(|t| t.offset <= end);
    tokens.drain(first_touched..first_after.max(first_touched));
    for token in &mut tokens[first_touched..] {
        token.offset = shifted(token.offset, delta);
    }
}

fn adjust_range(range: &mut ByteRange, delta: isize, removed_end: usize) {
    if range.start >= removed_end {
        range.start = shifted(range.start, delta);
        range.end = shifted(range.end, delta);
    }
}

/// Adjust one diagnostic in place. Returns `false` when the edit invalidates it.
fn adjust_diagnostic(diag: &mut Diagnostic, edit: &Edit) -> bool {
    let start = edit.offset;
    let end = edit.removed_end();
    let delta = edit.delta();

    if edit.removed_len > 0 {
        if diag.offset > start && diag.offset < end {
            return false;
        }
        let removed = ByteRange::new(start, end);
        if diag.ranges.iter().any(|r| r.touches(removed)) {
            return false;
        }
        if diag.fixits.iter().any(|f| f.range.touches(removed)) {
            return false;
        }
    } else {
        // An insertion strictly inside a highlighted range splits it.
        let splits = |r: &ByteRange| start > r.start && start < r.end;
        if diag.ranges.iter().any(|r| splits(r)) || diag.fixits.iter().any(|f| splits(&f.range)) {
            return false;
        }
    }
    if diag.offset >= end {
        diag.offset = shifted(diag.offset, delta);
    }
    for range in &mut diag.ranges {
        adjust_range(range, delta, end);
    }
    for fixit in &mut diag.fixits {
        adjust_range(&mut fixit.range, delta, end);
    }
    for note in &mut diag.notes {
        // An invalidated note takes the whole diagnostic with it.
        if !adjust_diagnostic(note, edit) {
            return false;
        }
    }
    true
}

/// Adjust diagnostics across one edit, dropping the invalidated ones.
pub fn adjust_diagnostic_positions(diags: &mut Vec<Diagnostic>, edit: &Edit) {
    if edit.removed_len == 0 && edit.inserted_len() == 0 {
        return;
    }
    diags.retain_mut(|diag| adjust_diagnostic(diag, edit));
}

/// Replay a whole edit chain over tokens and diagnostics, one edit at a time.
pub fn replay_edits(
    tokens: &mut Vec<SemanticToken>,
    diags: &mut Vec<Diagnostic>,
    edits: impl Iterator<Item = Arc<Edit>>,
) {
    for edit in edits {
        adjust_token_positions(tokens, &edit);
        adjust_diagnostic_positions(diags, &edit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{DiagnosticStage, Severity};
    use edit_state_lang::DeclKind;

    fn token(offset: usize, length: usize) -> SemanticToken {
        SemanticToken {
            offset,
            length,
            decl_kind: DeclKind::Variable,
            is_reference: true,
            is_system: false,
        }
    }

    fn edit(offset: usize, removed_len: usize, text: &str) -> Edit {
        Edit {
            offset,
            removed_len,
            text: text.to_string(),
        }
    }

    fn diag(offset: usize) -> Diagnostic {
        Diagnostic::new(
            Severity::Error,
            DiagnosticStage::Semantic,
            offset,
            "main.src",
            "m",
        )
    }

    #[test]
    fn test_noop_edit_changes_nothing() {
        let mut tokens = vec![token(4, 2), token(9, 1)];
        let mut diags = vec![diag(4).with_range(ByteRange::new(4, 6))];
        let original_tokens = tokens.clone();
        let original_diags = diags.clone();

        let e = edit(5, 0, "");
        adjust_token_positions(&mut tokens, &e);
        adjust_diagnostic_positions(&mut diags, &e);
        assert_eq!(tokens, original_tokens);
        assert_eq!(diags, original_diags);
    }

    #[test]
    fn test_tokens_after_edit_shift_by_delta() {
        let mut tokens = vec![token(2, 2), token(10, 1), token(14, 3)];
        // Replace byte 8 with two bytes: delta +1.
        adjust_token_positions(&mut tokens, &edit(8, 1, "42"));
        let offsets: Vec<_> = tokens.iter().map(|t| t.offset).collect();
        assert_eq!(offsets, [2, 11, 15]);
    }

    #[test]
    fn test_token_touching_replaced_span_is_dropped() {
        // The token covers bytes 7..10; replacing byte 8 invalidates it.
        let mut tokens = vec![token(2, 2), token(7, 3), token(14, 3)];
        adjust_token_positions(&mut tokens, &edit(8, 1, "42"));
        let offsets: Vec<_> = tokens.iter().map(|t| t.offset).collect();
        assert_eq!(offsets, [2, 15]);

        // So does a token ending exactly where the replacement starts.
        let mut tokens = vec![token(5, 3), token(14, 3)];
        adjust_token_positions(&mut tokens, &edit(8, 1, "42"));
        let offsets: Vec<_> = tokens.iter().map(|t| t.offset).collect();
        assert_eq!(offsets, [15]);
    }

    #[test]
    fn test_insertion_only_edit_keeps_spanning_token() {
        // Inserting one byte inside the token covering bytes 4..7 splits nothing away;
        // the token stays, and only tokens at or after the insertion point shift.
        let mut tokens = vec![token(4, 3), token(9, 2)];
        adjust_token_positions(&mut tokens, &edit(5, 0, "y"));
        assert_eq!(tokens.len(), 2);
        assert_eq!((tokens[0].offset, tokens[0].length), (4, 3));
        assert_eq!(tokens[1].offset, 10);
    }

    #[test]
    fn test_insertion_at_token_start_shifts_it() {
        let mut tokens = vec![token(5, 1)];
        adjust_token_positions(&mut tokens, &edit(5, 0, "ab"));
        assert_eq!(tokens[0].offset, 7);
    }

    #[test]
    fn test_token_inside_removed_span_is_dropped() {
        let mut tokens = vec![token(2, 2), token(6, 1), token(12, 1)];
        // Remove bytes 5..10.
        adjust_token_positions(&mut tokens, &edit(5, 5, ""));
        let offsets: Vec<_> = tokens.iter().map(|t| t.offset).collect();
        assert_eq!(offsets, [2, 7]);
    }

    #[test]
    fn test_diagnostic_with_touched_range_is_dropped() {
        let mut diags = vec![
            diag(3).with_range(ByteRange::new(8, 9)),
            diag(20).with_range(ByteRange::new(20, 22)),
        ];
        adjust_diagnostic_positions(&mut diags, &edit(8, 1, "42"));
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].offset, 21);
        assert_eq!(diags[0].ranges[0], ByteRange::new(21, 23));
    }

    #[test]
    fn test_insertion_splitting_range_drops_diagnostic() {
        let mut diags = vec![
            diag(3).with_range(ByteRange::new(8, 12)),
            diag(20).with_range(ByteRange::new(20, 22)),
        ];
        adjust_diagnostic_positions(&mut diags, &edit(10, 0, "x"));
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].offset, 21);
        assert_eq!(diags[0].ranges[0], ByteRange::new(21, 23));
    }

    #[test]
    fn test_insertion_at_range_boundary_keeps_diagnostic() {
        // At the exclusive end nothing splits and nothing shifts.
        let mut diags = vec![diag(3).with_range(ByteRange::new(8, 12))];
        adjust_diagnostic_positions(&mut diags, &edit(12, 0, "x"));
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].ranges[0], ByteRange::new(8, 12));

        // At the start the whole range shifts right instead.
        let mut diags = vec![diag(3).with_range(ByteRange::new(8, 12))];
        adjust_diagnostic_positions(&mut diags, &edit(8, 0, "x"));
        assert_eq!(diags[0].ranges[0], ByteRange::new(9, 13));
    }

    #[test]
    fn test_touched_fixit_drops_diagnostic() {
        let mut diags = vec![diag(1).with_fixit(ByteRange::new(10, 12), "fix")];
        adjust_diagnostic_positions(&mut diags, &edit(11, 1, "x"));
        assert!(diags.is_empty());
    }

    #[test]
    fn test_touched_note_drops_parent() {
        let mut diags = vec![diag(1).with_note(diag(7))];
        // Remove bytes 6..9: the note offset 7 is strictly inside.
        adjust_diagnostic_positions(&mut diags, &edit(6, 3, ""));
        assert!(diags.is_empty());
    }

    #[test]
    fn test_note_shifts_with_parent() {
        let mut diags = vec![diag(1).with_note(diag(20))];
        adjust_diagnostic_positions(&mut diags, &edit(10, 1, "abc"));
        assert_eq!(diags[0].notes[0].offset, 22);
    }

    #[test]
    fn test_edits_apply_in_order_not_aggregated() {
        // Edit 1 shifts the diagnostic range into the path of edit 2; aggregating the two
        // deltas would miss the intersection.
        let mut diags = vec![diag(10).with_range(ByteRange::new(10, 12))];
        let mut tokens = Vec::new();
        let chain = [edit(0, 0, "xxxx"), edit(13, 2, "")];
        replay_edits(
            &mut tokens,
            &mut diags,
            chain.iter().cloned().map(Arc::new),
        );
        assert!(diags.is_empty());
    }

    #[test]
    fn test_diagnostic_at_removed_end_shifts() {
        let mut diags = vec![diag(9)];
        adjust_diagnostic_positions(&mut diags, &edit(8, 1, "42"));
        assert_eq!(diags[0].offset, 10);
    }
}
