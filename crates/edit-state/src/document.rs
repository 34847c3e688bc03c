//! One open document.
//!
//! # Overview
//!
//! A [`Document`] owns the snapshot history, the per-line syntax map with its pending
//! edited-line window, the latest parse, and a shared [`SemanticInfoCache`]. Synchronous
//! operations (`replace_text`, syntax patching) run under the document lock and never
//! block on the analysis pipeline; the semantic cache has its own lock because analysis
//! completions arrive from the scheduler's worker thread.

use std::sync::Arc;

use parking_lot::Mutex;

use edit_state_lang::{ByteRange, ClassifiedSpan};

use crate::diagnostics::{insert_sorted, lines_with_stage, Diagnostic, DiagnosticStage};
use crate::error::{Error, Result};
use crate::format::{CodeFormatter, FormatOptions, FormattedLine};
use crate::frontend::{AnalysisScheduler, ParsedSyntax, SemanticAnalysis, SyntaxParser};
use crate::history::{EditableBuffer, Snapshot};
use crate::semantic::{SemanticInfo, SemanticInfoCache};
use crate::syntax_map::{EditedLineRange, SyntaxMap};
use crate::syntax_patch::patch_syntax_map;

/// Result of reading the syntactic classification after an edit.
#[derive(Debug, Clone)]
pub struct SyntaxInfo {
    /// Classification spans covering the affected range, in source order.
    pub spans: Vec<ClassifiedSpan>,
    /// Byte range whose classification may have changed. Starts at the beginning of the
    /// first edited line.
    pub affected: ByteRange,
}

/// Result of expanding an editor placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderExpansion {
    /// Replacement text for the placeholder token.
    pub text: String,
    /// The byte range of the placeholder token that the text replaces.
    pub range: ByteRange,
}

struct DocumentState {
    map: SyntaxMap,
    edited: EditedLineRange,
    parsed: Option<ParsedSyntax>,
    parsed_stamp: u64,
    parser_diag_lines: Vec<usize>,
}

/// One open document: buffer, syntax cache and semantic cache.
pub struct Document {
    name: String,
    buffer: Arc<EditableBuffer>,
    parser: Arc<dyn SyntaxParser>,
    semantic: Arc<SemanticInfoCache>,
    state: Mutex<DocumentState>,
    formatter: Mutex<CodeFormatter>,
}

impl Document {
    /// Open a document with initial content.
    pub fn open(
        name: impl Into<String>,
        text: &str,
        parser: Arc<dyn SyntaxParser>,
        analysis: Arc<dyn SemanticAnalysis>,
        scheduler: Arc<AnalysisScheduler>,
    ) -> Self {
        Self {
            name: name.into(),
            buffer: Arc::new(EditableBuffer::open(text)),
            parser,
            semantic: Arc::new(SemanticInfoCache::new(analysis, scheduler)),
            state: Mutex::new(DocumentState {
                map: SyntaxMap::default(),
                edited: EditedLineRange::empty(),
                parsed: None,
                parsed_stamp: 0,
                parser_diag_lines: Vec::new(),
            }),
            formatter: Mutex::new(CodeFormatter::new(FormatOptions::default())),
        }
    }

    /// The name this document was opened under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The latest snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.buffer.snapshot()
    }

    /// The underlying buffer, for consumers that replay edit chains themselves.
    pub fn buffer(&self) -> &Arc<EditableBuffer> {
        &self.buffer
    }

    /// The semantic cache, for observer registration.
    pub fn semantic_cache(&self) -> &Arc<SemanticInfoCache> {
        &self.semantic
    }

    /// Replace `removed_len` bytes at `offset` with `text`.
    ///
    /// Produces the next snapshot, keeps the syntax map's line bookkeeping valid, and
    /// widens the pending edited-line window. With `needs_semantic_info` an asynchronous
    /// re-analysis of the new snapshot is scheduled (coalescing with earlier requests).
    pub fn replace_text(
        &self,
        offset: usize,
        removed_len: usize,
        text: &str,
        needs_semantic_info: bool,
    ) -> Result<Arc<Snapshot>> {
        {
            let mut state = self.state.lock();
            let old = self.buffer.snapshot();
            let snapshot = self.buffer.replace(offset, removed_len, text)?;

            let start_line = old.line_of_byte(offset);
            let end_line = old.line_of_byte(offset + removed_len);
            let new_count = text.matches('\n').count() + 1;
            state.map.remove_line_range(start_line, end_line - start_line + 1);
            state.map.insert_line_range(start_line, new_count);
            state.edited.extend_to_include_line(start_line);
            state.edited.extend_to_include_line(start_line + new_count - 1);
            drop(state);

            if needs_semantic_info {
                self.semantic.process_latest_snapshot_async(&self.buffer);
            }
            Ok(snapshot)
        }
    }

    /// Parse the latest snapshot and patch the syntax map incrementally.
    ///
    /// Returns the spans covering the affected range. On the first call (and after a
    /// close/reopen) the whole buffer is affected.
    pub fn read_syntax_info(&self) -> SyntaxInfo {
        let snapshot = self.buffer.snapshot();
        let mut parsed = self.parser.parse_syntax(&snapshot);
        for diag in &mut parsed.diagnostics {
            diag.recompute_positions(&snapshot);
        }

        let mut state = self.state.lock();
        let state = &mut *state;
        let affected = patch_syntax_map(&mut state.map, &mut state.edited, &snapshot, &parsed.spans);
        state.parser_diag_lines = lines_with_stage(&parsed.diagnostics, DiagnosticStage::Parse);
        let spans = spans_in_range(&state.map, &snapshot, affected);
        state.parsed = Some(parsed);
        state.parsed_stamp = snapshot.stamp();

        SyntaxInfo { spans, affected }
    }

    /// Read the cached semantic annotations positioned for `requested`, merged with the
    /// parse diagnostics of the latest parse.
    ///
    /// Semantic tokens are consumed from the cache; semantic diagnostics on a line that
    /// already carries a parse diagnostic are suppressed.
    pub fn read_semantic_info(&self, requested: &Arc<Snapshot>) -> SemanticInfo {
        let (parser_diag_lines, parse_diags) = {
            let state = self.state.lock();
            let diags: Vec<Diagnostic> = state
                .parsed
                .as_ref()
                .map(|p| p.diagnostics.clone())
                .unwrap_or_default();
            (state.parser_diag_lines.clone(), diags)
        };
        let mut info = self.semantic.read(&self.buffer, requested, &parser_diag_lines);
        for diag in parse_diags {
            insert_sorted(&mut info.diagnostics, diag);
        }
        info
    }

    /// Re-indent one 1-based line against the current structural tree.
    pub fn format_line(&self, line: usize) -> FormattedLine {
        let snapshot = self.buffer.snapshot();
        let formatter = *self.formatter.lock();
        let mut state = self.state.lock();
        if state.parsed.is_none() || state.parsed_stamp != snapshot.stamp() {
            state.parsed = Some(self.parser.parse_syntax(&snapshot));
            state.parsed_stamp = snapshot.stamp();
        }
        let parsed = state
            .parsed
            .as_ref()
            .map(|p| (p.tree.clone(), p.tokens.clone()))
            .unwrap_or_default();
        drop(state);
        formatter.indent(line, &snapshot, parsed.0.as_ref(), &parsed.1)
    }

    /// Change the whitespace style used by [`Document::format_line`].
    pub fn set_format_options(&self, options: FormatOptions) {
        *self.formatter.lock() = CodeFormatter::new(options);
    }

    /// Expand the placeholder token covering `offset..offset + length`.
    pub fn expand_placeholder(&self, offset: usize, length: usize) -> Result<PlaceholderExpansion> {
        let snapshot = self.buffer.snapshot();
        let end = offset
            .checked_add(length)
            .filter(|&end| end <= snapshot.len_bytes());
        let Some(end) = end else {
            return Err(Error::InvalidPlaceholder(length));
        };
        if length < 4 {
            return Err(Error::InvalidPlaceholder(length));
        }
        let token = snapshot.text_slice(offset, end);
        if !token.starts_with("<#") || !token.ends_with("#>") {
            return Err(Error::InvalidPlaceholder(length));
        }
        let text = expand_placeholder_text(&token[2..token.len() - 2]);
        Ok(PlaceholderExpansion {
            text,
            range: ByteRange::new(offset, end),
        })
    }

    /// Tear down the document. Pending analyses for it are skipped.
    pub fn close(&self) {
        self.semantic.close();
    }
}

/// Reconstitute classification spans for the lines intersecting `range`.
fn spans_in_range(map: &SyntaxMap, snapshot: &Snapshot, range: ByteRange) -> Vec<ClassifiedSpan> {
    let mut spans = Vec::new();
    if range.is_empty() {
        return spans;
    }
    let first_line = snapshot.line_of_byte(range.start);
    let last_line = snapshot.line_of_byte(range.end.saturating_sub(1));
    for line in first_line..=last_line {
        let line_start = snapshot.byte_of_line(line);
        for span in map.spans_on_line(line) {
            spans.push(ClassifiedSpan::new(
                line_start + span.column - 1,
                span.length,
                span.kind,
            ));
        }
    }
    spans
}

/// Expand the inner text of a placeholder token (`T##display##type`, or a bare display
/// string). A closure-typed placeholder becomes a closure skeleton with one placeholder
/// per parameter and a placeholder body; anything else expands to its display text.
fn expand_placeholder_text(inner: &str) -> String {
    let parts: Vec<&str> = inner.split("##").collect();
    let display = if parts.len() >= 2 { parts[1] } else { parts[0] };
    let type_text = parts.last().copied().unwrap_or(display);

    if let Some(params) = closure_params(type_text) {
        if params.is_empty() {
            return "{\n<#code#>\n}".to_string();
        }
        let list: Vec<String> = params.iter().map(|p| format!("<#{p}#>")).collect();
        return format!("{{ {} in\n<#code#>\n}}", list.join(", "));
    }
    display.to_string()
}

/// Parameter type list of a closure type like `(A, B) -> R`, split on top-level commas.
/// Returns `None` for non-closure types.
fn closure_params(type_text: &str) -> Option<Vec<String>> {
    let trimmed = type_text.trim();
    let rest = trimmed.strip_prefix('(')?;
    let close = matching_paren(rest)?;
    let after = rest[close + 1..].trim_start();
    if !after.starts_with("->") {
        return None;
    }
    let inside = &rest[..close];
    if inside.trim().is_empty() {
        return Some(Vec::new());
    }
    let mut params = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, ch) in inside.char_indices() {
        match ch {
            '(' | '[' | '<' => depth += 1,
            ')' | ']' | '>' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                params.push(inside[start..i].trim().to_string());
                start = i + 1;
            }
            _ => {}
        }
    }
    params.push(inside[start..].trim().to_string());
    Some(params)
}

/// Index of the parenthesis closing the one already consumed before `rest`.
fn matching_paren(rest: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, ch) in rest.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                if depth == 0 {
                    return Some(i);
                }
                depth -= 1;
            }
            _ => {}
        }
    }
    None
}
