//! Per-line cache of lexical classification spans.
//!
//! The map stores, for each 1-based line, the ordered classification spans the parser
//! produced for that line. It is patched incrementally: edits remove and insert whole line
//! ranges to keep line indices valid, and a rescan after an edit only has to walk the
//! edited window plus whatever spans the window grew to include.
//!
//! None of the operations fail. Addressing a line past the end silently extends the
//! backing storage, which keeps the patching code free of bounds bookkeeping.

use edit_state_lang::SyntaxKind;

/// Classification of a contiguous run within one line.
///
/// Columns are 1-based byte columns and a span never crosses a line boundary; multi-line
/// classifications are recorded as one span per covered line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineTokenSpan {
    /// 1-based byte column of the span start.
    pub column: usize,
    /// Byte length of the span on this line.
    pub length: usize,
    /// Lexical kind.
    pub kind: SyntaxKind,
}

impl LineTokenSpan {
    /// Create a span.
    pub fn new(column: usize, length: usize, kind: SyntaxKind) -> Self {
        Self {
            column,
            length,
            kind,
        }
    }

    /// Exclusive end column.
    pub fn end_column(&self) -> usize {
        self.column + self.length
    }

    /// Returns `true` if this span overlaps `other` on the same line.
    pub fn overlaps(&self, other: &LineTokenSpan) -> bool {
        self.column < other.end_column() && other.column < self.end_column()
    }
}

/// Split `existing` around `incoming`, returning the remainders that survive the merge.
///
/// The first element is the sub-span of `existing` strictly before `incoming`, the second
/// the sub-span strictly after it, both keeping the existing kind. Either may be `None`
/// when `incoming` reaches the corresponding edge of `existing`.
pub fn merge_split_ranges(
    existing: &LineTokenSpan,
    incoming: &LineTokenSpan,
) -> (Option<LineTokenSpan>, Option<LineTokenSpan>) {
    let before = if existing.column < incoming.column {
        Some(LineTokenSpan::new(
            existing.column,
            incoming.column - existing.column,
            existing.kind,
        ))
    } else {
        None
    };
    let after = if incoming.end_column() < existing.end_column() {
        Some(LineTokenSpan::new(
            incoming.end_column(),
            existing.end_column() - incoming.end_column(),
            existing.kind,
        ))
    } else {
        None
    };
    (before, after)
}

/// The per-line classification cache. Lines are 1-based.
#[derive(Debug, Default, Clone)]
pub struct SyntaxMap {
    lines: Vec<Vec<LineTokenSpan>>,
}

impl SyntaxMap {
    /// Create an empty map with room for `line_count` lines.
    pub fn with_capacity(line_count: usize) -> Self {
        Self {
            lines: Vec::with_capacity(line_count),
        }
    }

    /// Number of lines currently tracked.
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Spans cached for the 1-based `line`, in column order. Lines past the end are empty.
    pub fn spans_on_line(&self, line: usize) -> &[LineTokenSpan] {
        self.lines
            .get(line.saturating_sub(1))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn line_mut(&mut self, line: usize) -> &mut Vec<LineTokenSpan> {
        let idx = line.saturating_sub(1);
        if idx >= self.lines.len() {
            self.lines.resize_with(idx + 1, Vec::new);
        }
        &mut self.lines[idx]
    }

    /// Append `span` to `line`. The caller guarantees column order; spans produced by a
    /// left-to-right parse arrive in order already.
    pub fn add_token_for_line(&mut self, line: usize, span: LineTokenSpan) {
        self.line_mut(line).push(span);
    }

    /// Merge `span` into `line` against the last cached span.
    ///
    /// Nested classifications (an interpolation anchor inside a string, a field inside a
    /// doc comment) arrive after their enclosing span; when the last span on the line
    /// overlaps the incoming one it is split into its before/after remainders around it.
    /// Non-overlapping spans are appended.
    pub fn merge_token_for_line(&mut self, line: usize, span: LineTokenSpan) {
        let spans = self.line_mut(line);
        match spans.last().copied() {
            Some(last) if last.overlaps(&span) => {
                let (before, after) = merge_split_ranges(&last, &span);
                spans.pop();
                if let Some(before) = before {
                    spans.push(before);
                }
                spans.push(span);
                if let Some(after) = after {
                    spans.push(after);
                }
            }
            _ => spans.push(span),
        }
    }

    /// Drop the cached spans of `count` lines starting at the 1-based `start`, keeping the
    /// lines themselves in place.
    pub fn clear_line_range(&mut self, start: usize, count: usize) {
        for line in start..start + count {
            let idx = line.saturating_sub(1);
            if let Some(spans) = self.lines.get_mut(idx) {
                spans.clear();
            }
        }
    }

    /// Remove `count` lines starting at the 1-based `start`, shifting later lines up.
    pub fn remove_line_range(&mut self, start: usize, count: usize) {
        if count == 0 {
            return;
        }
        let idx = start.saturating_sub(1);
        if idx >= self.lines.len() {
            return;
        }
        let end = (idx + count).min(self.lines.len());
        self.lines.drain(idx..end);
    }

    /// Insert `count` empty lines at the 1-based `start`, shifting later lines down.
    pub fn insert_line_range(&mut self, start: usize, count: usize) {
        if count == 0 {
            return;
        }
        let idx = start.saturating_sub(1);
        if idx > self.lines.len() {
            self.lines.resize_with(idx, Vec::new);
        }
        for _ in 0..count {
            self.lines.insert(idx, Vec::new());
        }
    }

    /// Returns `true` if `span` is exactly the first cached span on `line`.
    ///
    /// A rescan that reaches a line whose first token matches the cache has caught up with
    /// unedited data and can stop early.
    pub fn matches_first_token_on_line(&self, line: usize, span: &LineTokenSpan) -> bool {
        self.spans_on_line(line).first() == Some(span)
    }

    /// Drop everything.
    pub fn reset(&mut self) {
        self.lines.clear();
    }
}

/// The half-open window of lines invalidated by the most recent edit.
///
/// `line_count == 0` means no edit is pending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EditedLineRange {
    /// 1-based first edited line.
    pub start_line: usize,
    /// Number of edited lines; 0 when nothing is pending.
    pub line_count: usize,
}

impl EditedLineRange {
    /// An empty (no edit pending) range.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns `true` when no edit is pending.
    pub fn is_empty(&self) -> bool {
        self.line_count == 0
    }

    /// One past the last edited line.
    pub fn end_line(&self) -> usize {
        self.start_line + self.line_count
    }

    /// Replace the window.
    pub fn set(&mut self, start_line: usize, line_count: usize) {
        self.start_line = start_line;
        self.line_count = line_count;
    }

    /// Forget the pending edit.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Returns `true` if the 1-based `line` falls inside the window.
    pub fn contains_line(&self, line: usize) -> bool {
        !self.is_empty() && line >= self.start_line && line < self.end_line()
    }

    /// Grow the window to include `line`, starting a fresh single-line window when empty.
    pub fn extend_to_include_line(&mut self, line: usize) {
        if self.is_empty() {
            self.set(line, 1);
        } else if line < self.start_line {
            self.line_count += self.start_line - line;
            self.start_line = line;
        } else if line >= self.end_line() {
            self.line_count = line - self.start_line + 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(column: usize, length: usize, kind: SyntaxKind) -> LineTokenSpan {
        LineTokenSpan::new(column, length, kind)
    }

    #[test]
    fn test_merge_splits_overlapping_span() {
        let mut map = SyntaxMap::default();
        map.add_token_for_line(1, span(1, 20, SyntaxKind::String));
        map.merge_token_for_line(1, span(6, 10, SyntaxKind::StringInterpolationAnchor));

        assert_eq!(
            map.spans_on_line(1),
            &[
                span(1, 5, SyntaxKind::String),
                span(6, 10, SyntaxKind::StringInterpolationAnchor),
                span(16, 5, SyntaxKind::String),
            ]
        );
    }

    #[test]
    fn test_merge_at_span_edges_drops_empty_remainders() {
        let mut map = SyntaxMap::default();
        map.add_token_for_line(1, span(1, 10, SyntaxKind::DocComment));
        map.merge_token_for_line(1, span(1, 4, SyntaxKind::DocCommentField));
        assert_eq!(
            map.spans_on_line(1),
            &[
                span(1, 4, SyntaxKind::DocCommentField),
                span(5, 6, SyntaxKind::DocComment),
            ]
        );

        let mut map = SyntaxMap::default();
        map.add_token_for_line(1, span(1, 10, SyntaxKind::DocComment));
        map.merge_token_for_line(1, span(7, 4, SyntaxKind::DocCommentField));
        assert_eq!(
            map.spans_on_line(1),
            &[
                span(1, 6, SyntaxKind::DocComment),
                span(7, 4, SyntaxKind::DocCommentField),
            ]
        );
    }

    #[test]
    fn test_merge_appends_when_disjoint() {
        let mut map = SyntaxMap::default();
        map.merge_token_for_line(2, span(1, 3, SyntaxKind::Keyword));
        map.merge_token_for_line(2, span(5, 1, SyntaxKind::Identifier));
        assert_eq!(map.spans_on_line(2).len(), 2);
    }

    #[test]
    fn test_out_of_range_line_extends_storage() {
        let mut map = SyntaxMap::default();
        assert_eq!(map.line_count(), 0);
        map.add_token_for_line(5, span(1, 2, SyntaxKind::Number));
        assert_eq!(map.line_count(), 5);
        assert!(map.spans_on_line(3).is_empty());
        assert!(map.spans_on_line(9).is_empty());
    }

    #[test]
    fn test_remove_then_insert_restores_line_count() {
        let mut map = SyntaxMap::default();
        for line in 1..=6 {
            map.add_token_for_line(line, span(1, 1, SyntaxKind::Identifier));
        }
        map.remove_line_range(3, 2);
        assert_eq!(map.line_count(), 4);
        map.insert_line_range(3, 2);
        assert_eq!(map.line_count(), 6);
        assert!(map.spans_on_line(3).is_empty());
        assert!(map.spans_on_line(4).is_empty());
        // Lines after the window keep their spans.
        assert_eq!(map.spans_on_line(5).len(), 1);
    }

    #[test]
    fn test_matches_first_token_on_line() {
        let mut map = SyntaxMap::default();
        map.add_token_for_line(2, span(3, 4, SyntaxKind::Keyword));
        map.add_token_for_line(2, span(8, 1, SyntaxKind::Identifier));

        assert!(map.matches_first_token_on_line(2, &span(3, 4, SyntaxKind::Keyword)));
        assert!(!map.matches_first_token_on_line(2, &span(3, 4, SyntaxKind::Identifier)));
        assert!(!map.matches_first_token_on_line(2, &span(8, 1, SyntaxKind::Identifier)));
        assert!(!map.matches_first_token_on_line(7, &span(1, 1, SyntaxKind::Keyword)));
    }

    #[test]
    fn test_clear_line_range_keeps_lines() {
        let mut map = SyntaxMap::default();
        for line in 1..=4 {
            map.add_token_for_line(line, span(1, 1, SyntaxKind::Comment));
        }
        map.clear_line_range(2, 2);
        assert_eq!(map.line_count(), 4);
        assert!(map.spans_on_line(2).is_empty());
        assert!(map.spans_on_line(3).is_empty());
        assert_eq!(map.spans_on_line(4).len(), 1);
    }

    #[test]
    fn test_edited_line_range_extension() {
        let mut range = EditedLineRange::empty();
        assert!(range.is_empty());
        range.extend_to_include_line(4);
        assert_eq!((range.start_line, range.line_count), (4, 1));
        range.extend_to_include_line(7);
        assert_eq!((range.start_line, range.line_count), (4, 4));
        range.extend_to_include_line(2);
        assert_eq!((range.start_line, range.line_count), (2, 6));
        assert!(range.contains_line(2));
        assert!(range.contains_line(7));
        assert!(!range.contains_line(8));
    }
}
