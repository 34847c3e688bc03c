//! Structural tree for the format context resolver.
//!
//! The tree is a closed tagged union over node kinds: an explicit [`NodeKind`] enum plus
//! plain recursion through [`Node::children`]. Consumers traverse it with ordinary `match`
//! expressions; there is no visitor hierarchy. Each variant carries exactly the extra
//! source locations the indent rules need (an `else` keyword offset, an opening brace
//! offset, parameter ranges, ...), all expressed as byte offsets into the snapshot the
//! tree was parsed from.
//!
//! Comments deliberately do not appear here; they live in the raw token stream.

/// A half-open byte range `start..end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ByteRange {
    /// Start byte offset (inclusive).
    pub start: usize,
    /// End byte offset (exclusive).
    pub end: usize,
}

impl ByteRange {
    /// Create a new byte range. `start` must not exceed `end`.
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Returns `true` if the range is empty.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Returns `true` if `offset` lies within `start..end`.
    pub fn contains(&self, offset: usize) -> bool {
        offset >= self.start && offset < self.end
    }

    /// Returns `true` if this range intersects `other` (shared byte, or touching when one
    /// of the two is empty - matching the conservative diagnostic-invalidated rule).
    pub fn touches(&self, other: ByteRange) -> bool {
        !(self.end < other.start || self.start > other.end)
    }
}

/// Accessor shape attached to a property declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarAccessor {
    /// Whether the getter is spelled with an explicit accessor keyword
    /// (`get { ... }`) rather than a bare brace body.
    pub getter_has_keyword: bool,
}

/// The closed set of structural node kinds the engine understands.
///
/// Variants carry the auxiliary byte offsets used by the indent rules; a front end that
/// cannot provide one of them leaves the `Option` empty and the corresponding rule simply
/// does not fire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// A brace-delimited statement block. `implicit` marks blocks with no written braces
    /// (top-level code, case bodies).
    Brace {
        /// True when the block has no source-level braces.
        implicit: bool,
    },
    /// An `if` statement. `else_offset` is the byte offset of the `else` keyword, if any;
    /// `cond_ends` are the end offsets of each condition in the condition clause.
    If {
        /// Byte offset of the `else` keyword.
        else_offset: Option<usize>,
        /// End offsets of the parsed conditions.
        cond_ends: Vec<usize>,
    },
    /// A `switch` statement.
    Switch {
        /// Byte offset of the opening brace.
        lbrace: usize,
        /// Start offsets of each `case` clause.
        case_starts: Vec<usize>,
    },
    /// One `case` clause. `label_items` are the ranges of the label patterns; the last
    /// one gates "past the label" indentation.
    Case {
        /// Ranges of the case label items.
        label_items: Vec<ByteRange>,
    },
    /// A `do`/`catch` statement.
    DoCatch {
        /// Byte offsets of each `catch` keyword.
        catch_offsets: Vec<usize>,
    },
    /// One `catch` clause body owner.
    Catch,
    /// A function call. `direct_closure_braces` is set when the callee itself is a closure
    /// literal; its brace offsets are "part of" the call rather than inside it.
    Call {
        /// `(lbrace, rbrace)` of a directly-called closure literal.
        direct_closure_braces: Option<(usize, usize)>,
    },
    /// A parenthesized expression (single argument).
    Paren,
    /// A tuple / argument list with more than one element.
    Tuple {
        /// True when the final element is a trailing closure.
        trailing_closure: bool,
    },
    /// An array or dictionary literal.
    Collection {
        /// Byte offset of the opening bracket.
        lbracket: usize,
    },
    /// A closure literal.
    Closure {
        /// Byte offset of the opening brace.
        lbrace: usize,
        /// Byte offset of the closing brace.
        rbrace: usize,
    },
    /// A function declaration, including accessors.
    Func {
        /// End offset of the signature (used to align parameters with the function).
        signature_end: usize,
        /// True for a getter spelled without an accessor keyword.
        getter_without_keyword: bool,
        /// Ranges of the declared parameters.
        params: Vec<ByteRange>,
        /// Ranges of the generic parameters.
        generic_params: Vec<ByteRange>,
        /// Byte offset of the body's opening brace.
        body_lbrace: Option<usize>,
    },
    /// A property declaration.
    Var {
        /// Accessor info when the property has an accessor block.
        accessor: Option<VarAccessor>,
        /// End offset of the initializer or accessor braces.
        init_end: Option<usize>,
    },
    /// A nominal type (or extension) declaration.
    NominalType {
        /// Byte offset of the opening brace.
        lbrace: usize,
    },
    /// A conditional-compilation statement; `clause_offsets` are the offsets of the
    /// `#if` / `#else` / `#endif` clause keywords, which are *part of* the statement but
    /// not lexically inside it.
    ConfigClause {
        /// Byte offsets of the clause keywords.
        clause_offsets: Vec<usize>,
    },
    /// Any other expression the front end reports only for its range.
    Expr,
    /// Any other statement the front end reports only for its range.
    Stmt,
}

/// One node of the structural tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Node kind plus kind-specific source locations.
    pub kind: NodeKind,
    /// Full source range of the node.
    pub range: ByteRange,
    /// Earliest start of an attribute attached to this declaration, if any. Anchoring a
    /// declaration's indent position takes the earliest of this and `range.start`.
    pub attr_start: Option<usize>,
    /// Child nodes in source order.
    pub children: Vec<Node>,
}

impl Node {
    /// Create a leaf node.
    pub fn new(kind: NodeKind, start: usize, end: usize) -> Self {
        Self {
            kind,
            range: ByteRange::new(start, end),
            attr_start: None,
            children: Vec::new(),
        }
    }

    /// Attach children, consuming and returning the node (builder style).
    pub fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children = children;
        self
    }

    /// Attach an attribute start offset, consuming and returning the node.
    pub fn with_attr_start(mut self, offset: usize) -> Self {
        self.attr_start = Some(offset);
        self
    }

    /// The byte offset a formatter should anchor on: the earliest of the node start and
    /// any attached attribute start.
    pub fn anchor_offset(&self) -> usize {
        match self.attr_start {
            Some(attr) if attr < self.range.start => attr,
            _ => self.range.start,
        }
    }

    /// Returns `true` if this node is a declaration-like kind.
    pub fn is_decl(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Func { .. } | NodeKind::Var { .. } | NodeKind::NominalType { .. }
        )
    }
}
