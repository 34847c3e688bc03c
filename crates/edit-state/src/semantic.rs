//! Semantic annotation cache with generation tracking.
//!
//! One [`SemanticInfoCache`] per document owns the type-checked tokens and diagnostics of
//! the last applied analysis, together with the snapshot they were computed against. The
//! cache is the meeting point of two execution contexts: edits (which read and adjust)
//! and analysis completions (which write), so it carries its own lock independent of the
//! document lock.
//!
//! Writes are guarded by a monotonic generation counter: a completed analysis is applied
//! only when its generation exceeds the stored one, which makes out-of-order completions
//! harmless without ever blocking on the analysis pipeline. Generations are minted when
//! work is scheduled, so the schedule order decides which result wins.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::{debug, warn};

use edit_state_lang::DeclKind;

use crate::adjust::replay_edits;
use crate::diagnostics::Diagnostic;
use crate::frontend::{AnalysisScheduler, CoalescingToken, SemanticAnalysis};
use crate::history::{EditableBuffer, Snapshot};

/// A classification of one identifier occurrence, produced by full semantic analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SemanticToken {
    /// Byte offset in the analyzed snapshot.
    pub offset: usize,
    /// Byte length.
    pub length: usize,
    /// Kind of the referenced declaration.
    pub decl_kind: DeclKind,
    /// `true` for a reference, `false` for the declaring occurrence.
    pub is_reference: bool,
    /// `true` when the declaration comes from a system module.
    pub is_system: bool,
}

/// What a consumer gets back from [`SemanticInfoCache::read`]: tokens and diagnostics
/// positioned for the requested snapshot.
#[derive(Debug, Default, Clone)]
pub struct SemanticInfo {
    /// Semantic tokens, adjusted and sorted by offset. Consumed from the cache: a second
    /// read before the next analysis completes yields no tokens.
    pub tokens: Vec<SemanticToken>,
    /// Semantic diagnostics, adjusted, with line/column recomputed.
    pub diagnostics: Vec<Diagnostic>,
}

/// Notification payload sent to observers after every completed analysis.
#[derive(Debug, Clone, Copy)]
pub struct SemanticUpdate {
    /// Generation of the completed analysis.
    pub generation: u64,
    /// `false` when the result was superseded and discarded. Even a discarded result is
    /// announced, since it signals that analysis activity occurred.
    pub applied: bool,
}

type Observer = Box<dyn FnMut(&SemanticUpdate) + Send>;

#[derive(Default)]
struct CacheState {
    tokens: Vec<SemanticToken>,
    diagnostics: Vec<Diagnostic>,
    snapshot: Option<Arc<Snapshot>>,
    generation: u64,
}

/// The per-document semantic annotation cache.
pub struct SemanticInfoCache {
    analysis: Arc<dyn SemanticAnalysis>,
    scheduler: Arc<AnalysisScheduler>,
    token: CoalescingToken,
    next_generation: AtomicU64,
    state: Mutex<CacheState>,
    observers: Mutex<Vec<Observer>>,
}

impl SemanticInfoCache {
    /// Create an empty cache bound to one document's coalescing stream.
    pub fn new(analysis: Arc<dyn SemanticAnalysis>, scheduler: Arc<AnalysisScheduler>) -> Self {
        let token = scheduler.token();
        Self {
            analysis,
            scheduler,
            token,
            next_generation: AtomicU64::new(0),
            state: Mutex::new(CacheState::default()),
            observers: Mutex::new(Vec::new()),
        }
    }

    /// Generation of the last applied analysis.
    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    /// Register an observer notified after every completed analysis.
    pub fn add_observer(&self, observer: Observer) {
        self.observers.lock().push(observer);
    }

    fn notify(&self, update: &SemanticUpdate) {
        for observer in self.observers.lock().iter_mut() {
            observer(update);
        }
    }

    /// Read the cached annotations positioned for `requested`.
    ///
    /// Tokens are consumed; diagnostics stay cached, with the cache's snapshot advanced
    /// to `requested`. Semantic diagnostics on a line listed in `parser_diag_lines`
    /// (sorted, 1-based) are suppressed in the returned set, deduplicating against parse
    /// errors on the same line. When the cached snapshot is not an ancestor of
    /// `requested` (two analyses completed out of order) the result is empty; adjustment
    /// is one-directional and never unwound.
    pub fn read(
        &self,
        buffer: &EditableBuffer,
        requested: &Arc<Snapshot>,
        parser_diag_lines: &[usize],
    ) -> SemanticInfo {
        let mut state = self.state.lock();
        let Some(cached_snapshot) = state.snapshot.clone() else {
            return SemanticInfo::default();
        };
        let Some(edits) = buffer.edits_between(&cached_snapshot, requested) else {
            warn!(
                cached = cached_snapshot.stamp(),
                requested = requested.stamp(),
                "cached semantic info is not an ancestor of the requested snapshot"
            );
            return SemanticInfo::default();
        };

        let mut tokens = std::mem::take(&mut state.tokens);
        let mut diagnostics = std::mem::take(&mut state.diagnostics);
        replay_edits(&mut tokens, &mut diagnostics, edits);
        state.diagnostics = diagnostics.clone();
        state.snapshot = Some(requested.clone());
        drop(state);

        for diag in &mut diagnostics {
            diag.recompute_positions(requested);
        }
        diagnostics.retain(|diag| parser_diag_lines.binary_search(&diag.line).is_err());
        SemanticInfo {
            tokens,
            diagnostics,
        }
    }

    /// Apply one completed analysis.
    ///
    /// The state is replaced only when `generation` exceeds the stored generation;
    /// observers are notified either way.
    pub fn update(
        &self,
        tokens: Vec<SemanticToken>,
        diagnostics: Vec<Diagnostic>,
        snapshot: Arc<Snapshot>,
        generation: u64,
    ) {
        let applied = {
            let mut state = self.state.lock();
            if generation > state.generation {
                state.tokens = tokens;
                state.diagnostics = diagnostics;
                state.snapshot = Some(snapshot);
                state.generation = generation;
                true
            } else {
                debug!(
                    generation,
                    current = state.generation,
                    "discarding superseded analysis result"
                );
                false
            }
        };
        self.notify(&SemanticUpdate {
            generation,
            applied,
        });
    }

    /// Schedule an asynchronous analysis of the buffer's latest snapshot.
    ///
    /// Scheduling supersedes any not-yet-started analysis of this document, so bursts of
    /// edits collapse into one pending run. When the run completes and the buffer has
    /// moved on meanwhile, a follow-up is scheduled automatically; this chains until the
    /// cache converges with the live buffer.
    pub fn process_latest_snapshot_async(self: &Arc<Self>, buffer: &Arc<EditableBuffer>) {
        let snapshot = buffer.snapshot();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
        let cache = self.clone();
        let buffer = buffer.clone();
        self.scheduler.schedule(&self.token, move |cancel| {
            match cache.analysis.analyze(&snapshot, &cancel) {
                Ok(outcome) => {
                    cache.update(outcome.tokens, outcome.diagnostics, snapshot.clone(), generation);
                    let head = buffer.snapshot();
                    if head.stamp() != snapshot.stamp() {
                        debug!(
                            analyzed = snapshot.stamp(),
                            head = head.stamp(),
                            "buffer moved during analysis, rescheduling"
                        );
                        cache.process_latest_snapshot_async(&buffer);
                    }
                }
                Err(err) => {
                    // Stale-but-valid data beats no data; cached state stays untouched.
                    warn!(%err, stamp = snapshot.stamp(), "semantic analysis failed");
                }
            }
        });
    }

    /// Detach from the scheduler. Queued analyses for this document are skipped.
    pub fn close(&self) {
        self.scheduler.retire(&self.token);
    }
}

impl Drop for SemanticInfoCache {
    fn drop(&mut self) {
        self.close();
    }
}
