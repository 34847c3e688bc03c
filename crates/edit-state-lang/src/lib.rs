#![warn(missing_docs)]
//! `edit-state-lang` - language data model shared between the `edit-state` engine and
//! compiler front ends.
//!
//! This crate intentionally stays lightweight and does **not** depend on any parsing or
//! analysis machinery. It defines the value types a front end produces for one parse of a
//! document:
//!
//! - [`Node`] / [`NodeKind`] - the structural tree, as a closed tagged union over node kinds
//! - [`Token`] / [`TokenKind`] - the raw token stream (including comments, which are not
//!   tree nodes)
//! - [`SyntaxKind`] - lexical classification kinds for per-line highlighting
//! - [`DeclKind`] - declaration kinds attached to semantic (type-checked) tokens
//!
//! The engine never interprets source text itself; everything it knows about structure comes
//! through these types.

pub mod tree;

pub use tree::{ByteRange, Node, NodeKind, VarAccessor};

/// Lexical classification of a contiguous source range.
///
/// These kinds are produced by the front end's parser on every edit and cached per line by
/// the engine's syntax map. They carry no semantic information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyntaxKind {
    /// Language keyword.
    Keyword,
    /// Plain identifier.
    Identifier,
    /// Type identifier.
    TypeIdentifier,
    /// Numeric literal.
    Number,
    /// String literal.
    String,
    /// String interpolation anchor inside a string literal.
    StringInterpolationAnchor,
    /// Line or block comment.
    Comment,
    /// Documentation comment.
    DocComment,
    /// Markup element inside a documentation comment.
    DocCommentField,
    /// Compiler directive (`#if`, `#else`, ...).
    BuildConfig,
    /// Attribute attached to a declaration.
    Attribute,
    /// Editor placeholder token (`<#...#>`).
    Placeholder,
    /// Operator or punctuation the front end chose to classify.
    Operator,
}

/// Declaration kind attached to a semantic token.
///
/// Produced only by full semantic analysis, unlike [`SyntaxKind`] which is purely lexical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclKind {
    /// Module reference.
    Module,
    /// Nominal type (struct/class/enum) declaration or reference.
    Type,
    /// Protocol/trait declaration or reference.
    Protocol,
    /// Free or member function.
    Function,
    /// Constructor.
    Constructor,
    /// Global or local variable.
    Variable,
    /// Type parameter.
    TypeParameter,
    /// Enum case.
    EnumElement,
    /// Property accessor.
    Accessor,
}

/// Kind of a raw token in the side token stream.
///
/// The format resolver consumes this stream for the facts the structural tree cannot
/// express: comment placement and "is the target immediately after this separator".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// `,`
    Comma,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `{`
    LBrace,
    /// `}`
    RBrace,
    /// A `//` line comment.
    LineComment,
    /// A `/* */` block comment (doc or not).
    BlockComment,
    /// Anything else. The format resolver only needs the position.
    Other,
}

/// One raw token: kind plus the byte range it covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    /// Token kind.
    pub kind: TokenKind,
    /// Covered byte range in the snapshot this token was lexed from.
    pub range: ByteRange,
}

impl Token {
    /// Create a token from a kind and byte bounds.
    pub fn new(kind: TokenKind, start: usize, end: usize) -> Self {
        Self {
            kind,
            range: ByteRange::new(start, end),
        }
    }
}

/// A lexical classification span as produced by the parser, before it is folded into the
/// per-line syntax map.
///
/// `nesting` is the structural nesting depth at which the front end emitted the span;
/// spans emitted at depth > 1 overlap their parent span and are merged into the line map
/// with the overlap-split rule instead of appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifiedSpan {
    /// Byte offset of the span start.
    pub offset: usize,
    /// Byte length. May span multiple lines.
    pub length: usize,
    /// Lexical kind.
    pub kind: SyntaxKind,
    /// Structural nesting depth (1 = top level).
    pub nesting: u32,
}

impl ClassifiedSpan {
    /// Create a top-level classified span.
    pub fn new(offset: usize, length: usize, kind: SyntaxKind) -> Self {
        Self {
            offset,
            length,
            kind,
            nesting: 1,
        }
    }

    /// Create a classified span at an explicit nesting depth.
    pub fn nested(offset: usize, length: usize, kind: SyntaxKind, nesting: u32) -> Self {
        Self {
            offset,
            length,
            kind,
            nesting,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_range() {
        let tok = Token::new(TokenKind::Comma, 4, 5);
        assert_eq!(tok.range.start, 4);
        assert_eq!(tok.range.end, 5);
        assert_eq!(tok.range.len(), 1);
    }

    #[test]
    fn test_classified_span_defaults_to_top_level() {
        let span = ClassifiedSpan::new(0, 3, SyntaxKind::Keyword);
        assert_eq!(span.nesting, 1);
        let nested = ClassifiedSpan::nested(1, 1, SyntaxKind::Identifier, 2);
        assert_eq!(nested.nesting, 2);
    }
}
