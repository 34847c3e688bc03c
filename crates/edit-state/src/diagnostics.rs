//! Diagnostic data model and collection.
//!
//! Diagnostics arrive from two stages: the synchronous parse of every edit, and the
//! asynchronous semantic analysis. Both produce the same record shape; a note is itself a
//! diagnostic-shaped record attached to a parent. Per document the set is kept sorted by
//! primary byte offset.
//!
//! A [`DiagnosticCollector`] filters what the front end reports down to one tracked
//! buffer. Diagnostics located in other files are discarded, with one exception: an
//! out-of-buffer note is folded into the most recent in-buffer diagnostic as contextual
//! text (tagged with the foreign buffer name) rather than dropped silently.

use smallvec::SmallVec;
use tracing::debug;

use edit_state_lang::ByteRange;

use crate::history::Snapshot;

/// Severity of a diagnostic record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// A note attached to a parent diagnostic.
    Note,
    /// A warning.
    Warning,
    /// An error.
    Error,
}

/// Which stage produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticStage {
    /// Produced by the synchronous parse.
    Parse,
    /// Produced by full semantic analysis.
    Semantic,
}

/// A textual replacement suggested by a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixIt {
    /// The byte range to replace.
    pub range: ByteRange,
    /// Replacement text.
    pub text: String,
}

/// One diagnostic record.
///
/// `line` and `column` are 1-based and derived from `offset`; they are recomputed against
/// the snapshot a consumer reads the diagnostic at, since position adjustment only moves
/// byte offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Severity.
    pub severity: Severity,
    /// Which stage produced it.
    pub stage: DiagnosticStage,
    /// Primary byte offset.
    pub offset: usize,
    /// 1-based line of `offset`.
    pub line: usize,
    /// 1-based byte column of `offset`.
    pub column: usize,
    /// Name of the buffer the diagnostic was reported against.
    pub buffer_name: String,
    /// Human-readable message.
    pub message: String,
    /// Highlighted sub-ranges.
    pub ranges: SmallVec<[ByteRange; 2]>,
    /// Suggested replacements.
    pub fixits: SmallVec<[FixIt; 1]>,
    /// Attached notes.
    pub notes: Vec<Diagnostic>,
}

impl Diagnostic {
    /// Create a diagnostic with no ranges, fixits or notes. Line and column start at 0
    /// and are filled in by [`Diagnostic::recompute_positions`].
    pub fn new(
        severity: Severity,
        stage: DiagnosticStage,
        offset: usize,
        buffer_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            stage,
            offset,
            line: 0,
            column: 0,
            buffer_name: buffer_name.into(),
            message: message.into(),
            ranges: SmallVec::new(),
            fixits: SmallVec::new(),
            notes: Vec::new(),
        }
    }

    /// Attach a highlighted range (builder style).
    pub fn with_range(mut self, range: ByteRange) -> Self {
        self.ranges.push(range);
        self
    }

    /// Attach a fixit (builder style).
    pub fn with_fixit(mut self, range: ByteRange, text: impl Into<String>) -> Self {
        self.fixits.push(FixIt {
            range,
            text: text.into(),
        });
        self
    }

    /// Attach a note (builder style).
    pub fn with_note(mut self, note: Diagnostic) -> Self {
        self.notes.push(note);
        self
    }

    /// Fill in 1-based line/column for this diagnostic and its notes from `snapshot`.
    pub fn recompute_positions(&mut self, snapshot: &Snapshot) {
        let (line, column) = snapshot.line_and_column(self.offset);
        self.line = line;
        self.column = column;
        for note in &mut self.notes {
            note.recompute_positions(snapshot);
        }
    }
}

/// Insert `diag` into `diags` keeping the sort by primary offset. Equal offsets preserve
/// arrival order.
pub fn insert_sorted(diags: &mut Vec<Diagnostic>, diag: Diagnostic) {
    let at = diags.partition_point(|d| d.offset <= diag.offset);
    diags.insert(at, diag);
}

/// 1-based lines that carry at least one diagnostic from `stage`, in ascending order.
pub fn lines_with_stage(diags: &[Diagnostic], stage: DiagnosticStage) -> Vec<usize> {
    let mut lines: Vec<usize> = diags
        .iter()
        .filter(|d| d.stage == stage)
        .map(|d| d.line)
        .collect();
    lines.sort_unstable();
    lines.dedup();
    lines
}

/// Collects the diagnostics of one analysis pass, filtered to one tracked buffer.
#[derive(Debug)]
pub struct DiagnosticCollector {
    buffer_name: String,
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticCollector {
    /// Start collecting for the buffer named `buffer_name`.
    pub fn new(buffer_name: impl Into<String>) -> Self {
        Self {
            buffer_name: buffer_name.into(),
            diagnostics: Vec::new(),
        }
    }

    /// Report one diagnostic.
    ///
    /// In-buffer diagnostics are inserted in offset order. An out-of-buffer note is
    /// reattached to the most recent in-buffer diagnostic with its source buffer named in
    /// the text; other out-of-buffer diagnostics are dropped.
    pub fn report(&mut self, diag: Diagnostic) {
        if diag.buffer_name == self.buffer_name {
            insert_sorted(&mut self.diagnostics, diag);
            return;
        }
        if diag.severity == Severity::Note {
            if let Some(parent) = self.diagnostics.last_mut() {
                let mut note = diag;
                note.message = format!("{} ({})", note.message, note.buffer_name);
                parent.notes.push(note);
                return;
            }
        }
        debug!(
            buffer = %diag.buffer_name,
            offset = diag.offset,
            "dropping diagnostic outside tracked buffer"
        );
    }

    /// Finish the pass, yielding the sorted in-buffer diagnostics.
    pub fn finish(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::EditableBuffer;

    fn diag(offset: usize, message: &str) -> Diagnostic {
        Diagnostic::new(
            Severity::Error,
            DiagnosticStage::Semantic,
            offset,
            "main.src",
            message,
        )
    }

    #[test]
    fn test_insert_sorted_keeps_offset_order() {
        let mut diags = Vec::new();
        insert_sorted(&mut diags, diag(10, "b"));
        insert_sorted(&mut diags, diag(2, "a"));
        insert_sorted(&mut diags, diag(10, "c"));
        insert_sorted(&mut diags, diag(30, "d"));
        let messages: Vec<_> = diags.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(messages, ["a", "b", "c", "d"]);
    }

    #[test]
    fn test_collector_drops_foreign_diagnostics() {
        let mut collector = DiagnosticCollector::new("main.src");
        collector.report(diag(4, "kept"));
        let mut foreign = diag(0, "elsewhere");
        foreign.buffer_name = "other.src".into();
        collector.report(foreign);

        let diags = collector.finish();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].message, "kept");
    }

    #[test]
    fn test_collector_reattaches_foreign_note() {
        let mut collector = DiagnosticCollector::new("main.src");
        collector.report(diag(4, "parent"));
        let mut note = Diagnostic::new(
            Severity::Note,
            DiagnosticStage::Semantic,
            0,
            "lib.src",
            "declared here",
        );
        note.buffer_name = "lib.src".into();
        collector.report(note);

        let diags = collector.finish();
        assert_eq!(diags[0].notes.len(), 1);
        assert_eq!(diags[0].notes[0].message, "declared here (lib.src)");
    }

    #[test]
    fn test_recompute_positions() {
        let buffer = EditableBuffer::open("ab\ncdef\n");
        let snap = buffer.snapshot();
        let mut d = diag(5, "m").with_note(diag(0, "n"));
        d.recompute_positions(&snap);
        assert_eq!((d.line, d.column), (2, 3));
        assert_eq!((d.notes[0].line, d.notes[0].column), (1, 1));
    }

    #[test]
    fn test_lines_with_stage() {
        let mut a = diag(0, "a");
        a.stage = DiagnosticStage::Parse;
        a.line = 3;
        let mut b = diag(5, "b");
        b.line = 3;
        let mut c = diag(9, "c");
        c.stage = DiagnosticStage::Parse;
        c.line = 7;
        let diags = vec![a, b, c];
        assert_eq!(lines_with_stage(&diags, DiagnosticStage::Parse), [3, 7]);
    }
}
