//! Incremental patching of the syntax map after an edit.
//!
//! The parser re-emits the classification stream for the whole document, but most of it
//! matches what the map already holds. [`patch_syntax_map`] replays the stream against
//! the cache honoring the pending [`EditedLineRange`]:
//!
//! - spans that end before the edited window are skipped, their cached lines are intact;
//! - a span that starts before the window but reaches into it re-opens earlier lines
//!   (an edit inside a block comment changes the classification of the lines above it);
//! - past the window, a span that exactly matches the first cached token on its line
//!   proves the rescan has caught up with unedited data, and the replay stops early;
//! - a span that does not match extends the window, as does any multi-line span.
//!
//! The returned byte range is the region whose classification may have changed; it
//! starts at the beginning of the first edited line.

use edit_state_lang::{ByteRange, ClassifiedSpan};

use crate::history::Snapshot;
use crate::syntax_map::{EditedLineRange, LineTokenSpan, SyntaxMap};

/// The portion of `span` that falls on the 1-based `line`, as a line-local span.
fn line_portion(snapshot: &Snapshot, span: &ClassifiedSpan, line: usize) -> LineTokenSpan {
    let line_start = snapshot.byte_of_line(line);
    let content_end = line_start + snapshot.line_text(line).len();
    let start = span.offset.max(line_start);
    let end = (span.offset + span.length).min(content_end);
    LineTokenSpan::new(start - line_start + 1, end.saturating_sub(start), span.kind)
}

fn write_span(map: &mut SyntaxMap, snapshot: &Snapshot, span: &ClassifiedSpan) {
    let start_line = snapshot.line_of_byte(span.offset);
    let end_line = snapshot.line_of_byte(span.offset + span.length - 1);
    for line in start_line..=end_line {
        let portion = line_portion(snapshot, span, line);
        if portion.length == 0 {
            continue;
        }
        if span.nesting > 1 {
            map.merge_token_for_line(line, portion);
        } else {
            map.add_token_for_line(line, portion);
        }
    }
}

/// Clear `line` once before rewriting it, when the window grows to cover a line that
/// still holds stale spans. The lines of the original window were already emptied by the
/// edit's line bookkeeping.
fn ensure_clear(map: &mut SyntaxMap, cleared: &mut EditedLineRange, line: usize) {
    if !cleared.contains_line(line) {
        map.clear_line_range(line, 1);
        cleared.extend_to_include_line(line);
    }
}

/// Replay a freshly parsed classification stream against the cached map.
///
/// `edited` is consumed (cleared) by the call. Returns the affected byte range. With no
/// pending edit the map is rebuilt from scratch and the whole buffer is affected.
pub fn patch_syntax_map(
    map: &mut SyntaxMap,
    edited: &mut EditedLineRange,
    snapshot: &Snapshot,
    spans: &[ClassifiedSpan],
) -> ByteRange {
    if edited.is_empty() {
        map.reset();
        for span in spans {
            if span.length > 0 {
                write_span(map, snapshot, span);
            }
        }
        return ByteRange::new(0, snapshot.len_bytes());
    }

    let mut window = *edited;
    let mut cleared = window;
    let mut affected_start = snapshot.byte_of_line(window.start_line);
    let mut affected_end = None;

    for span in spans {
        if span.length == 0 {
            continue;
        }
        let start_line = snapshot.line_of_byte(span.offset);
        let end_line = snapshot.line_of_byte(span.offset + span.length - 1);
        if end_line < window.start_line {
            continue;
        }

        if start_line < window.start_line {
            for line in start_line..window.start_line {
                ensure_clear(map, &mut cleared, line);
            }
            window.extend_to_include_line(start_line);
            affected_start = affected_start.min(snapshot.byte_of_line(start_line));
        } else if start_line >= window.end_line() {
            let first = line_portion(snapshot, span, start_line);
            if map.matches_first_token_on_line(start_line, &first) {
                // Caught up with unedited data.
                affected_end = Some(snapshot.byte_of_line(start_line));
                break;
            }
            for line in window.end_line()..=start_line {
                ensure_clear(map, &mut cleared, line);
            }
            window.extend_to_include_line(start_line);
        }
        if end_line >= window.end_line() {
            for line in window.end_line()..=end_line {
                ensure_clear(map, &mut cleared, line);
            }
            window.extend_to_include_line(end_line);
        }
        write_span(map, snapshot, span);
    }

    edited.clear();
    let end = affected_end.unwrap_or_else(|| snapshot.len_bytes());
    ByteRange::new(affected_start, end.max(affected_start))
}
