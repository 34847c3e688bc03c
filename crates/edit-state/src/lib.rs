#![warn(missing_docs)]
//! Edit State - Incremental Document State Engine
//!
//! # Overview
//!
//! `edit-state` keeps the derived state of an open source file continuously correct as
//! small, frequent edits arrive faster than a compiler front end can re-analyze it. The
//! engine owns the text history and every cache layered on it; the front end (parser and
//! type checker) is an external collaborator behind the [`frontend`] traits.
//!
//! # Core Features
//!
//! - **Snapshot History**: immutable, versioned buffer views with a lazy replayable edit
//!   chain between any two versions
//! - **Syntax Map**: per-line lexical classification cache, patched incrementally with
//!   early termination once a rescan catches up with unedited data
//! - **Position Adjustment**: cached semantic tokens and diagnostics are re-mapped across
//!   edits, not discarded
//! - **Semantic Info Cache**: generation-guarded cache fed by coalesced single-flight
//!   asynchronous analysis, converging with the live buffer
//! - **Structural Indentation**: ancestor-stack format context with sibling alignment
//!
//! # Control Flow
//!
//! ```text
//! edit ──► Snapshot History ──► Syntax Map patch (synchronous)
//!   │                              │
//!   └──► Semantic Info Cache ──────┼──► adjusted view of previous results (immediate)
//!            │                     │
//!            └─ async analysis ────┴──► generation-guarded update ──► observers
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use edit_state::{EditorService, ParsedSyntax, SyntaxParser, SemanticAnalysis};
//! use edit_state::{AnalysisOutcome, CancelFlag, Result, Snapshot};
//!
//! struct Parser;
//! impl SyntaxParser for Parser {
//!     fn parse_syntax(&self, _snapshot: &Snapshot) -> ParsedSyntax {
//!         ParsedSyntax::default()
//!     }
//! }
//!
//! struct Analysis;
//! impl SemanticAnalysis for Analysis {
//!     fn analyze(&self, _snapshot: &Snapshot, _cancel: &CancelFlag) -> Result<AnalysisOutcome> {
//!         Ok(AnalysisOutcome::default())
//!     }
//! }
//!
//! let service = EditorService::new(Arc::new(Parser), Arc::new(Analysis));
//! service.open("/mem/main.src", "let x = 1\n");
//! let snapshot = service.replace("/mem/main.src", 8, 1, "42", true).unwrap();
//! assert_eq!(snapshot.text(), "let x = 42\n");
//! let info = service.read_syntax_info("/mem/main.src").unwrap();
//! assert_eq!(info.affected.start, 0);
//! ```
//!
//! # Module Description
//!
//! - [`history`] - snapshot history and lazy edit replay
//! - [`syntax_map`] - per-line classification cache and the edited-line window
//! - [`syntax_patch`] - incremental rescan of the classification stream
//! - [`adjust`] - position adjustment of cached annotations across edits
//! - [`diagnostics`] - diagnostic data model and per-buffer collection
//! - [`semantic`] - generation-guarded semantic info cache
//! - [`frontend`] - front end contract and the coalescing analysis scheduler
//! - [`format`] - structural indentation (format context resolver + formatter)
//! - [`document`] - one open document tying the caches together
//! - [`registry`] - path → document map with symlink-resolved identity
//! - [`service`] - document-facing API surface

pub mod adjust;
pub mod diagnostics;
pub mod document;
pub mod error;
pub mod format;
pub mod frontend;
pub mod history;
pub mod registry;
pub mod semantic;
pub mod service;
pub mod syntax_map;
pub mod syntax_patch;

pub use adjust::{adjust_diagnostic_positions, adjust_token_positions, replay_edits};
pub use diagnostics::{
    Diagnostic, DiagnosticCollector, DiagnosticStage, FixIt, Severity, insert_sorted,
};
pub use document::{Document, PlaceholderExpansion, SyntaxInfo};
pub use error::{Error, Result};
pub use format::{
    CodeFormatter, FormatContext, FormatOptions, FormattedLine, SiblingAlignment,
};
pub use frontend::{
    AnalysisOutcome, AnalysisScheduler, CancelFlag, CoalescingToken, ParsedSyntax,
    SemanticAnalysis, SyntaxParser,
};
pub use history::{Edit, EditReplay, EditableBuffer, Snapshot};
pub use registry::DocumentMap;
pub use semantic::{SemanticInfo, SemanticInfoCache, SemanticToken, SemanticUpdate};
pub use service::EditorService;
pub use syntax_map::{EditedLineRange, LineTokenSpan, SyntaxMap, merge_split_ranges};
pub use syntax_patch::patch_syntax_map;
