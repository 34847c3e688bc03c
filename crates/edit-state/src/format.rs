//! Structural indentation.
//!
//! # Overview
//!
//! Formatting a line is a two-phase computation over the structural tree the parser
//! produced for the latest snapshot:
//!
//! 1. **Locate** - walk the tree once, pruning into whichever child contains the target
//!    location (the first content byte of the line), and record the ancestor chain. A few
//!    "part of but not lexically inside" relationships are excluded from the chain even
//!    though their textual range contains the target: the clause keywords of a
//!    conditional-compilation statement belong to the surrounding context, and the braces
//!    of a directly-called closure belong to the call. A side scan over the raw token
//!    stream classifies comment placement, since comments are not tree nodes.
//! 2. **Resolve** - starting from the innermost ancestor, compute its anchor position
//!    (skipping leading attributes), merge outward while ancestors start on the same
//!    source line (with a fixed set of cross-line re-attachments such as `else` aligning
//!    with its `if`), then decide via [`FormatContext::should_add_indent`] whether the
//!    line gets one extra indent level. A detected sibling alignment overrides the
//!    indent-level computation entirely: the line is padded to the exact column of the
//!    aligned sibling.
//!
//! [`CodeFormatter`] turns the resolved context into replacement text for one line,
//! honoring [`FormatOptions`].

use std::sync::Arc;

use edit_state_lang::{ByteRange, Node, NodeKind, Token, TokenKind};

use crate::history::Snapshot;

/// Whitespace style for rendered indentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatOptions {
    /// Render indentation with tabs instead of spaces.
    pub use_tabs: bool,
    /// Width of one indent level, in columns.
    pub indent_width: usize,
    /// Display width of a tab character.
    pub tab_width: usize,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            use_tabs: false,
            indent_width: 4,
            tab_width: 4,
        }
    }
}

/// Sibling-alignment decision: pad the target line to the column of `offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiblingAlignment {
    /// Byte offset of the sibling start the line aligns with.
    pub offset: usize,
    /// Add one extra indent level on top of the aligned column (used when aligning
    /// against an opening bracket rather than a first element).
    pub extra_indent: bool,
}

/// Comment placement of the target line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommentContext {
    /// Inside a documentation block comment; continuation lines get one extra space to
    /// line the `*` up under the opening `/**`.
    DocBlock { anchor: usize },
    /// Inside a plain block comment, or directly after a line comment.
    Plain { anchor: usize },
}

/// Resolved ancestor-stack view of one target location.
///
/// The stack is shared and read-only; [`FormatContext::parent`] returns a new context
/// with the cursor advanced one ancestor outward.
#[derive(Clone)]
pub struct FormatContext<'a> {
    stack: Arc<Vec<&'a Node>>,
    /// Number of innermost stack entries the cursor has advanced past.
    skipped: usize,
    comment: Option<CommentContext>,
    sibling: Option<SiblingAlignment>,
    target: usize,
}

impl<'a> FormatContext<'a> {
    /// Locate `target` in the tree and token stream.
    pub fn resolve(
        root: Option<&'a Node>,
        tokens: &[Token],
        snapshot: &Snapshot,
        target: usize,
    ) -> Self {
        let mut stack = Vec::new();
        if let Some(root) = root {
            collect_stack(root, target, &mut stack);
        }
        let sibling = collect_sibling(&stack, tokens, snapshot, target);
        let comment = scan_for_comments(tokens, snapshot, target);
        Self {
            stack: Arc::new(stack),
            skipped: 0,
            comment,
            sibling,
            target,
        }
    }

    fn active(&self) -> &[&'a Node] {
        &self.stack[..self.stack.len() - self.skipped]
    }

    /// The innermost ancestor at the cursor, if any.
    pub fn innermost(&self) -> Option<&'a Node> {
        self.active().last().copied()
    }

    /// A new context with the cursor advanced one ancestor outward. The stack itself is
    /// shared, not copied.
    pub fn parent(&self) -> Self {
        let mut ctx = self.clone();
        if ctx.skipped < ctx.stack.len() {
            ctx.skipped += 1;
        }
        ctx
    }

    /// The byte offset the context was resolved for.
    pub fn target(&self) -> usize {
        self.target
    }

    /// The sibling alignment override, when the target line starts right after a
    /// recognized separator.
    pub fn sibling_alignment(&self) -> Option<SiblingAlignment> {
        self.sibling
    }

    /// Returns `true` when the target lies inside a documentation block comment.
    pub fn in_doc_comment_block(&self) -> bool {
        matches!(self.comment, Some(CommentContext::DocBlock { .. }))
    }

    /// Returns `true` when the target lies inside a plain block comment or continues a
    /// line comment.
    pub fn in_comment_line(&self) -> bool {
        matches!(self.comment, Some(CommentContext::Plain { .. }))
    }

    /// Anchor position the target line indents relative to: the innermost ancestor's
    /// start, merged outward while ancestors start on the same source line, with the
    /// documented cross-line re-attachments (`else`/`catch` clauses, if-conditions,
    /// keywordless getters, parameters inside a signature).
    pub fn indent_anchor(&self, snapshot: &Snapshot) -> Option<(usize, usize)> {
        let active = self.active();
        let inner_idx = active.len().checked_sub(1)?;
        let mut inner = active[inner_idx];
        let (mut line, mut col) = snapshot.line_and_column(inner.anchor_offset());
        for outer in active[..inner_idx].iter().rev() {
            let (oline, ocol) = snapshot.line_and_column(outer.anchor_offset());
            if oline == line || reattaches_across_lines(outer, inner, self.target) {
                line = oline;
                col = ocol;
                inner = outer;
            } else {
                break;
            }
        }
        Some((line, col))
    }

    /// Decide whether the target line gets one indent level beyond the anchor.
    ///
    /// `positioned` is the node whose first byte the target sits on, when the cursor was
    /// advanced past it: the line positions that node, so its own kind participates in
    /// the suppression rules (a trailing-closure brace, a keywordless getter brace).
    pub fn should_add_indent(&self, positioned: Option<&Node>) -> bool {
        let Some(inner) = self.innermost() else {
            return false;
        };
        let target = self.target;

        if let Some(node) = positioned {
            match (&node.kind, &inner.kind) {
                // A trailing-closure or directly-called closure brace starting the line.
                (NodeKind::Closure { .. }, NodeKind::Tuple { trailing_closure: true }) => {
                    return false;
                }
                (NodeKind::Closure { .. }, NodeKind::Call { .. }) => return false,
                // A keywordless getter brace aligns with its property.
                (NodeKind::Brace { .. } | NodeKind::Func { .. }, NodeKind::Var { accessor, .. }) => {
                    if accessor.is_some_and(|a| !a.getter_has_keyword) {
                        return false;
                    }
                }
                _ => {}
            }
        }

        match &inner.kind {
            NodeKind::Brace { implicit: true } => false,
            NodeKind::Brace { implicit: false } => {
                target != inner.range.start && !is_at_end(inner, target)
            }
            NodeKind::Case { label_items } => {
                // Case bodies indent only past the last label item.
                label_items.last().is_some_and(|last| target > last.end)
            }
            NodeKind::Switch { lbrace, case_starts } => {
                target != *lbrace && !case_starts.contains(&target) && !is_at_end(inner, target)
            }
            NodeKind::If { else_offset, .. } => *else_offset != Some(target),
            NodeKind::DoCatch { catch_offsets } => !catch_offsets.contains(&target),
            NodeKind::NominalType { lbrace } => target != *lbrace && !is_at_end(inner, target),
            NodeKind::Func { body_lbrace, .. } => *body_lbrace != Some(target),
            NodeKind::Closure { lbrace, rbrace } => target != *lbrace && target != *rbrace,
            NodeKind::Paren | NodeKind::Tuple { .. } | NodeKind::Collection { .. } => {
                !is_at_end(inner, target)
            }
            NodeKind::Call { .. } => !is_at_end(inner, target),
            // Conditional-compilation bodies stay at clause level.
            NodeKind::ConfigClause { .. } => false,
            _ => true,
        }
    }
}

fn is_at_end(node: &Node, target: usize) -> bool {
    target + 1 == node.range.end
}

fn encloses(node: &Node, target: usize) -> bool {
    target >= node.anchor_offset() && target <= node.range.end
}

fn collect_stack<'a>(node: &'a Node, target: usize, stack: &mut Vec<&'a Node>) {
    if !encloses(node, target) {
        return;
    }
    // A clause keyword is part of the statement but positioned by the outer context.
    if let NodeKind::ConfigClause { clause_offsets } = &node.kind {
        if clause_offsets.contains(&target) {
            return;
        }
    }
    stack.push(node);
    let excluded_closure_brace = match &node.kind {
        NodeKind::Call {
            direct_closure_braces: Some((l, r)),
        } if target == *l || target == *r => Some(*l),
        _ => None,
    };
    for child in &node.children {
        if let Some(l) = excluded_closure_brace {
            if matches!(&child.kind, NodeKind::Closure { lbrace, .. } if *lbrace == l) {
                continue;
            }
        }
        collect_stack(child, target, stack);
    }
}

fn reattaches_across_lines(outer: &Node, inner: &Node, target: usize) -> bool {
    match &outer.kind {
        NodeKind::If { else_offset, cond_ends } => {
            else_offset.is_some_and(|e| target >= e)
                || cond_ends.last().is_some_and(|&end| inner.range.end <= end)
        }
        NodeKind::DoCatch { catch_offsets } => {
            matches!(inner.kind, NodeKind::Catch)
                || catch_offsets.iter().any(|&c| inner.range.start == c)
        }
        NodeKind::Var { accessor: Some(acc), .. } if !acc.getter_has_keyword => matches!(
            inner.kind,
            NodeKind::Func {
                getter_without_keyword: true,
                ..
            } | NodeKind::Brace { .. }
        ),
        NodeKind::Func {
            signature_end,
            params,
            generic_params,
            ..
        } => {
            inner.range.end <= *signature_end
                && params
                    .iter()
                    .chain(generic_params)
                    .any(|p| p.start <= inner.range.start && inner.range.end <= p.end)
        }
        _ => false,
    }
}

/// Element ranges a target can sibling-align against inside `node`, picked by the
/// separator's position for nodes with more than one list.
fn sibling_ranges(node: &Node, separator: usize) -> Option<Vec<ByteRange>> {
    match &node.kind {
        NodeKind::Paren
        | NodeKind::Tuple { .. }
        | NodeKind::Call { .. }
        | NodeKind::Collection { .. } => Some(node.children.iter().map(|c| c.range).collect()),
        NodeKind::Func {
            params,
            generic_params,
            ..
        } => {
            let in_generics = generic_params
                .first()
                .zip(generic_params.last())
                .is_some_and(|(first, last)| separator >= first.start && separator <= last.end);
            if in_generics {
                Some(generic_params.clone())
            } else {
                Some(params.clone())
            }
        }
        NodeKind::Case { label_items } => Some(label_items.clone()),
        _ => None,
    }
}

/// Fold an alignment target back to the first sibling on its line, so a wrapped list
/// aligns every continuation line with one column.
fn fold_align_offset(siblings: &[ByteRange], prev_idx: usize, snapshot: &Snapshot) -> usize {
    let line = snapshot.line_and_column(siblings[prev_idx].start).0;
    let mut align = siblings[prev_idx].start;
    for sibling in siblings[..prev_idx].iter().rev() {
        if snapshot.line_and_column(sibling.start).0 != line {
            break;
        }
        align = sibling.start;
    }
    align
}

fn collect_sibling(
    stack: &[&Node],
    tokens: &[Token],
    snapshot: &Snapshot,
    target: usize,
) -> Option<SiblingAlignment> {
    // The token immediately before the target must be the separator, on an earlier line
    // (the target is the first token on its own line).
    let prev = tokens.iter().rev().find(|t| t.range.end <= target)?;
    if snapshot.line_and_column(prev.range.start).0 >= snapshot.line_and_column(target).0 {
        return None;
    }
    match prev.kind {
        TokenKind::Comma => {
            for node in stack.iter().rev() {
                let Some(siblings) = sibling_ranges(node, prev.range.start) else {
                    continue;
                };
                let prev_idx = siblings
                    .iter()
                    .rposition(|s| s.start < target && s.end <= prev.range.start + 1)?;
                return Some(SiblingAlignment {
                    offset: fold_align_offset(&siblings, prev_idx, snapshot),
                    extra_indent: false,
                });
            }
            None
        }
        TokenKind::LBracket => {
            let lbracket = prev.range.start;
            stack.iter().rev().find_map(|node| match &node.kind {
                NodeKind::Collection { lbracket: l } if *l == lbracket => Some(SiblingAlignment {
                    offset: lbracket,
                    extra_indent: true,
                }),
                _ => None,
            })
        }
        _ => None,
    }
}

fn scan_for_comments(
    tokens: &[Token],
    snapshot: &Snapshot,
    target: usize,
) -> Option<CommentContext> {
    for token in tokens {
        if token.range.start >= target {
            break;
        }
        match token.kind {
            TokenKind::BlockComment if token.range.contains(target) => {
                let opener =
                    snapshot.text_slice(token.range.start, token.range.end.min(token.range.start + 3));
                return if opener.starts_with("/**") {
                    Some(CommentContext::DocBlock {
                        anchor: token.range.start,
                    })
                } else {
                    Some(CommentContext::Plain {
                        anchor: token.range.start,
                    })
                };
            }
            TokenKind::LineComment => {
                // A line comment ending on the line directly above makes the target a
                // comment continuation.
                let comment_line = snapshot.line_and_column(token.range.start).0;
                if comment_line + 1 == snapshot.line_and_column(target).0
                    && last_token_on_line(tokens, token)
                {
                    return Some(CommentContext::Plain {
                        anchor: token.range.start,
                    });
                }
            }
            _ => {}
        }
    }
    None
}

fn last_token_on_line(tokens: &[Token], token: &Token) -> bool {
    !tokens
        .iter()
        .any(|t| t.range.start > token.range.start && t.range.start < token.range.end + 1)
}

/// One reformatted line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedLine {
    /// 1-based line the text replaces.
    pub line: usize,
    /// Replacement text for the whole line, without a trailing newline.
    pub text: String,
}

/// Computes replacement indentation for single lines.
#[derive(Debug, Clone, Copy)]
pub struct CodeFormatter {
    options: FormatOptions,
}

impl CodeFormatter {
    /// Create a formatter with the given whitespace style. Widths of zero are clamped to
    /// one column; the indent math divides by both.
    pub fn new(options: FormatOptions) -> Self {
        Self {
            options: FormatOptions {
                indent_width: options.indent_width.max(1),
                tab_width: options.tab_width.max(1),
                ..options
            },
        }
    }

    /// The active whitespace style.
    pub fn options(&self) -> FormatOptions {
        self.options
    }

    /// Re-indent the 1-based `line` of `snapshot` against the structural tree and raw
    /// token stream of its latest parse.
    pub fn indent(
        &self,
        line: usize,
        snapshot: &Snapshot,
        tree: Option<&Node>,
        tokens: &[Token],
    ) -> FormattedLine {
        let line_start = snapshot.byte_of_line(line);
        let text = snapshot.line_text(line);
        let content_offset = text.len() - text.trim_start().len();
        let target = line_start + content_offset;
        let content = text[content_offset..].to_string();

        let context = FormatContext::resolve(tree, tokens, snapshot, target);

        if let Some(sibling) = context.sibling_alignment() {
            let mut prefix = self.sibling_prefix(snapshot, sibling.offset);
            if sibling.extra_indent {
                prefix.push_str(&self.render_indent(self.options.indent_width));
            }
            return FormattedLine {
                line,
                text: format!("{prefix}{content}"),
            };
        }

        if let Some(comment) = context.comment {
            let (anchor, extra_space) = match comment {
                CommentContext::DocBlock { anchor } => (anchor, true),
                CommentContext::Plain { anchor } => (anchor, false),
            };
            let anchor_line = snapshot.line_and_column(anchor).0;
            let width = self.expanded_indent_of_line(snapshot, anchor_line);
            let mut prefix = self.render_indent(width);
            if extra_space {
                prefix.push(' ');
            }
            return FormattedLine {
                line,
                text: format!("{prefix}{content}"),
            };
        }

        // When the line positions a node (its first byte is the node start), indentation
        // is decided by that node's enclosing context.
        let mut ctx = context;
        let mut positioned = None;
        if let Some(inner) = ctx.innermost() {
            if inner.anchor_offset() == target {
                positioned = Some(inner);
                ctx = ctx.parent();
            }
        }

        let mut width = match ctx.indent_anchor(snapshot) {
            Some((anchor_line, _)) => self.expanded_indent_of_line(snapshot, anchor_line),
            None => 0,
        };
        if ctx.should_add_indent(positioned) {
            width -= width % self.options.indent_width;
            width += self.options.indent_width;
        }
        FormattedLine {
            line,
            text: format!("{}{content}", self.render_indent(width)),
        }
    }

    /// Display width of a line's leading whitespace.
    fn expanded_indent_of_line(&self, snapshot: &Snapshot, line: usize) -> usize {
        let mut width = 0;
        for ch in snapshot.line_text(line).chars() {
            match ch {
                ' ' => width += 1,
                '\t' => width += self.options.tab_width - width % self.options.tab_width,
                _ => break,
            }
        }
        width
    }

    fn render_indent(&self, width: usize) -> String {
        if self.options.use_tabs {
            let tabs = width / self.options.tab_width;
            let spaces = width % self.options.tab_width;
            format!("{}{}", "\t".repeat(tabs), " ".repeat(spaces))
        } else {
            " ".repeat(width)
        }
    }

    /// Pad to the exact column of `offset` by mirroring the sibling line's prefix, so
    /// tabs in the original stay tabs in the padding.
    fn sibling_prefix(&self, snapshot: &Snapshot, offset: usize) -> String {
        let (line, column) = snapshot.line_and_column(offset);
        snapshot
            .line_text(line)
            .bytes()
            .take(column - 1)
            .map(|b| if b == b'\t' { '\t' } else { ' ' })
            .collect()
    }
}
