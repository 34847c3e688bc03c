//! Document-facing API surface.
//!
//! [`EditorService`] is what a presentation or transport layer talks to: every operation
//! is keyed by a path string, resolved through the [`DocumentMap`]. The service owns the
//! front end halves and one [`AnalysisScheduler`] shared by all documents.

use std::sync::Arc;

use tracing::debug;

use crate::document::{Document, PlaceholderExpansion, SyntaxInfo};
use crate::error::{Error, Result};
use crate::format::{FormatOptions, FormattedLine};
use crate::frontend::{AnalysisScheduler, SemanticAnalysis, SyntaxParser};
use crate::history::Snapshot;
use crate::registry::DocumentMap;
use crate::semantic::SemanticInfo;

/// The engine's front door: open/edit/close documents and read derived state.
pub struct EditorService {
    parser: Arc<dyn SyntaxParser>,
    analysis: Arc<dyn SemanticAnalysis>,
    scheduler: Arc<AnalysisScheduler>,
    documents: DocumentMap,
}

impl EditorService {
    /// Create a service around the two front end halves.
    pub fn new(parser: Arc<dyn SyntaxParser>, analysis: Arc<dyn SemanticAnalysis>) -> Self {
        Self {
            parser,
            analysis,
            scheduler: Arc::new(AnalysisScheduler::new()),
            documents: DocumentMap::new(),
        }
    }

    fn document(&self, path: &str) -> Result<Arc<Document>> {
        self.documents
            .get(path)
            .ok_or_else(|| Error::MissingDocument(path.to_string()))
    }

    /// Open (or re-open) a document with initial content and schedule its first
    /// analysis. Returns the initial snapshot.
    ///
    /// A document still registered under `path` (open, or closed without eviction) is
    /// reused: its content is replaced in place, so the snapshot history and every cache
    /// layered on it stay warm.
    pub fn open(&self, path: &str, text: &str) -> Arc<Snapshot> {
        if let Some(document) = self.documents.get(path) {
            let len = document.snapshot().len_bytes();
            if let Ok(snapshot) = document.replace_text(0, len, text, true) {
                debug!(path, "re-opening reuses the registered document");
                return snapshot;
            }
        }
        let document = Arc::new(Document::open(
            path,
            text,
            self.parser.clone(),
            self.analysis.clone(),
            self.scheduler.clone(),
        ));
        let snapshot = document.snapshot();
        if let Some(previous) = self.documents.insert(path, document.clone()) {
            debug!(path, "re-opening replaces an open document");
            previous.close();
        }
        document
            .semantic_cache()
            .process_latest_snapshot_async(document.buffer());
        snapshot
    }

    /// Apply one text replacement to the document at `path`.
    pub fn replace(
        &self,
        path: &str,
        offset: usize,
        removed_len: usize,
        text: &str,
        needs_semantic_info: bool,
    ) -> Result<Arc<Snapshot>> {
        self.document(path)?
            .replace_text(offset, removed_len, text, needs_semantic_info)
    }

    /// Close the document at `path`.
    ///
    /// With `evict` the document is removed from the registry and its caches are torn
    /// down. Without it the document stays registered with its caches intact, so a later
    /// [`EditorService::open`] of the same path resumes from the warm state.
    pub fn close(&self, path: &str, evict: bool) -> Result<()> {
        if !evict {
            self.document(path)?;
            return Ok(());
        }
        let document = self
            .documents
            .remove(path)
            .ok_or_else(|| Error::MissingDocument(path.to_string()))?;
        document.close();
        Ok(())
    }

    /// The latest snapshot of the document at `path`.
    pub fn snapshot(&self, path: &str) -> Result<Arc<Snapshot>> {
        Ok(self.document(path)?.snapshot())
    }

    /// Parse the latest snapshot and return the incrementally patched classification.
    pub fn read_syntax_info(&self, path: &str) -> Result<SyntaxInfo> {
        Ok(self.document(path)?.read_syntax_info())
    }

    /// Read semantic annotations positioned for `requested`, merged with parse
    /// diagnostics.
    pub fn read_semantic_info(
        &self,
        path: &str,
        requested: &Arc<Snapshot>,
    ) -> Result<SemanticInfo> {
        Ok(self.document(path)?.read_semantic_info(requested))
    }

    /// Re-indent one 1-based line.
    pub fn format_line(&self, path: &str, line: usize) -> Result<FormattedLine> {
        Ok(self.document(path)?.format_line(line))
    }

    /// Change the whitespace style of the document at `path`.
    pub fn set_format_options(&self, path: &str, options: FormatOptions) -> Result<()> {
        self.document(path)?.set_format_options(options);
        Ok(())
    }

    /// Expand the placeholder token at `offset..offset + length`.
    pub fn expand_placeholder(
        &self,
        path: &str,
        offset: usize,
        length: usize,
    ) -> Result<PlaceholderExpansion> {
        self.document(path)?.expand_placeholder(offset, length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result as EngineResult;
    use crate::frontend::{AnalysisOutcome, CancelFlag, ParsedSyntax};

    struct NullParser;

    impl SyntaxParser for NullParser {
        fn parse_syntax(&self, _snapshot: &Snapshot) -> ParsedSyntax {
            ParsedSyntax::default()
        }
    }

    struct NoAnalysis;

    impl SemanticAnalysis for NoAnalysis {
        fn analyze(
            &self,
            _snapshot: &Snapshot,
            _cancel: &CancelFlag,
        ) -> EngineResult<AnalysisOutcome> {
            Ok(AnalysisOutcome::default())
        }
    }

    fn service() -> EditorService {
        EditorService::new(Arc::new(NullParser), Arc::new(NoAnalysis))
    }

    #[test]
    fn test_unknown_path_is_reported() {
        let service = service();
        assert!(matches!(
            service.replace("/no/such.src", 0, 0, "x", false),
            Err(Error::MissingDocument(_))
        ));
        assert!(matches!(
            service.close("/no/such.src", true),
            Err(Error::MissingDocument(_))
        ));
        assert!(matches!(
            service.close("/no/such.src", false),
            Err(Error::MissingDocument(_))
        ));
    }

    #[test]
    fn test_open_edit_close_roundtrip() {
        let service = service();
        let initial = service.open("/mem/a.src", "let x = 1\n");
        assert_eq!(initial.stamp(), 0);

        let edited = service.replace("/mem/a.src", 8, 1, "42", false).unwrap();
        assert_eq!(edited.text(), "let x = 42\n");
        assert_eq!(service.snapshot("/mem/a.src").unwrap().stamp(), 1);

        service.close("/mem/a.src", true).unwrap();
        assert!(service.snapshot("/mem/a.src").is_err());
    }

    #[test]
    fn test_reopen_replaces_content() {
        let service = service();
        service.open("/mem/a.src", "old");
        let snapshot = service.open("/mem/a.src", "new");
        assert_eq!(snapshot.text(), "new");
        assert_eq!(service.snapshot("/mem/a.src").unwrap().text(), "new");
    }

    #[test]
    fn test_close_without_evict_keeps_caches_for_reopen() {
        let service = service();
        service.open("/mem/a.src", "let x = 1\n");
        service.replace("/mem/a.src", 8, 1, "2", false).unwrap();
        service.close("/mem/a.src", false).unwrap();

        // Reopening resumes the retained document: the snapshot history continues
        // instead of restarting at stamp 0.
        let reopened = service.open("/mem/a.src", "let y = 3\n");
        assert_eq!(reopened.text(), "let y = 3\n");
        assert_eq!(reopened.stamp(), 2);

        // Evicting really tears the document down; the next open starts fresh.
        service.close("/mem/a.src", true).unwrap();
        let fresh = service.open("/mem/a.src", "new");
        assert_eq!(fresh.stamp(), 0);
    }
}
