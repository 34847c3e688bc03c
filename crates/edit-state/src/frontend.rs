//! Contract with the compiler front end, and the analysis scheduler.
//!
//! The engine never interprets source text itself. A [`SyntaxParser`] is invoked
//! synchronously on every edit and produces the lexical classification stream, the
//! structural tree, the raw token stream and parse diagnostics. A [`SemanticAnalysis`] is
//! invoked asynchronously through the [`AnalysisScheduler`] and produces type-checked
//! tokens and diagnostics.
//!
//! Scheduling is single-flight per document: each document holds one
//! [`CoalescingToken`], and scheduling new work under a token supersedes any queued work
//! under the same token (the superseded job is skipped when dequeued, and its
//! [`CancelFlag`] is raised for a run that already started). Bursts of edits therefore
//! collapse into one pending analysis of the latest state; nothing is ever queued up per
//! edit.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;

use crossbeam_channel::{Sender, unbounded};
use parking_lot::Mutex;
use tracing::debug;

use edit_state_lang::{ClassifiedSpan, Node, Token};

use crate::diagnostics::Diagnostic;
use crate::error::Result;
use crate::history::Snapshot;
use crate::semantic::SemanticToken;

/// Everything one synchronous parse produces for a snapshot.
#[derive(Debug, Default)]
pub struct ParsedSyntax {
    /// Lexical classification spans in source order.
    pub spans: Vec<ClassifiedSpan>,
    /// Structural tree, when the front end builds one.
    pub tree: Option<Node>,
    /// Raw token stream, including comments.
    pub tokens: Vec<Token>,
    /// Parse-stage diagnostics, sorted by offset.
    pub diagnostics: Vec<Diagnostic>,
}

/// The synchronous parsing half of the front end.
pub trait SyntaxParser: Send + Sync {
    /// Parse one snapshot. Invoked on open and on every edit.
    fn parse_syntax(&self, snapshot: &Snapshot) -> ParsedSyntax;
}

/// Result of one semantic analysis pass.
#[derive(Debug, Default)]
pub struct AnalysisOutcome {
    /// Semantic tokens, sorted by offset.
    pub tokens: Vec<SemanticToken>,
    /// Semantic-stage diagnostics, sorted by offset.
    pub diagnostics: Vec<Diagnostic>,
}

/// Advisory cancellation signal handed to a running analysis.
///
/// Raising the flag does not stop anything by itself; a well-behaved analysis polls it at
/// convenient points and bails out early. Correctness under late completion is guaranteed
/// by the generation guard in the semantic cache, not by this flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Create an unraised flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Returns `true` once cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// The asynchronous type-checking half of the front end.
pub trait SemanticAnalysis: Send + Sync {
    /// Analyze one snapshot. Runs on the scheduler's worker thread; `cancel` is raised
    /// when newer work superseded this run.
    fn analyze(&self, snapshot: &Snapshot, cancel: &CancelFlag) -> Result<AnalysisOutcome>;
}

/// Identifies one stream of coalescable work, normally one per document.
#[derive(Debug)]
pub struct CoalescingToken {
    id: u64,
    next_seq: AtomicU64,
}

impl CoalescingToken {
    fn next_seq(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::Relaxed) + 1
    }
}

struct Job {
    token_id: u64,
    seq: u64,
    cancel: CancelFlag,
    work: Box<dyn FnOnce(CancelFlag) + Send>,
}

#[derive(Default)]
struct TokenState {
    latest_seq: u64,
    live_cancel: Option<CancelFlag>,
}

/// Runs analysis jobs on one dedicated worker thread with per-token coalescing.
pub struct AnalysisScheduler {
    tx: Option<Sender<Job>>,
    tokens: Arc<Mutex<HashMap<u64, TokenState>>>,
    next_token_id: AtomicU64,
    worker: Option<JoinHandle<()>>,
}

impl AnalysisScheduler {
    /// Spawn the worker thread.
    pub fn new() -> Self {
        let (tx, rx) = unbounded::<Job>();
        let tokens: Arc<Mutex<HashMap<u64, TokenState>>> = Arc::new(Mutex::new(HashMap::new()));
        let worker_tokens = tokens.clone();
        let worker = std::thread::Builder::new()
            .name("semantic-analysis".into())
            .spawn(move || {
                while let Ok(job) = rx.recv() {
                    let superseded = worker_tokens
                        .lock()
                        .get(&job.token_id)
                        .is_some_and(|state| state.latest_seq != job.seq);
                    if superseded {
                        debug!(token = job.token_id, seq = job.seq, "skipping superseded job");
                        continue;
                    }
                    (job.work)(job.cancel);
                }
            })
            .ok();
        Self {
            tx: Some(tx),
            tokens,
            next_token_id: AtomicU64::new(1),
            worker,
        }
    }

    /// Mint a fresh coalescing token.
    pub fn token(&self) -> CoalescingToken {
        CoalescingToken {
            id: self.next_token_id.fetch_add(1, Ordering::Relaxed),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Schedule `work` under `token`, superseding any queued work under the same token
    /// and raising the cancel flag of the job currently associated with it.
    pub fn schedule(
        &self,
        token: &CoalescingToken,
        work: impl FnOnce(CancelFlag) + Send + 'static,
    ) {
        let seq = token.next_seq();
        let cancel = CancelFlag::new();
        {
            let mut tokens = self.tokens.lock();
            let state = tokens.entry(token.id).or_default();
            if let Some(previous) = state.live_cancel.take() {
                previous.cancel();
            }
            state.latest_seq = seq;
            state.live_cancel = Some(cancel.clone());
        }
        if let Some(tx) = &self.tx {
            let _ = tx.send(Job {
                token_id: token.id,
                seq,
                cancel,
                work: Box::new(work),
            });
        }
    }

    /// Forget all scheduler state for `token`. Queued work under it is skipped.
    pub fn retire(&self, token: &CoalescingToken) {
        let mut tokens = self.tokens.lock();
        if let Some(state) = tokens.remove(&token.id) {
            if let Some(cancel) = state.live_cancel {
                cancel.cancel();
            }
        }
    }
}

impl Default for AnalysisScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for AnalysisScheduler {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain and exit.
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_scheduler_runs_jobs_in_order() {
        let scheduler = AnalysisScheduler::new();
        let token = scheduler.token();
        let (tx, rx) = mpsc::channel();
        for i in 0..3 {
            let tx = tx.clone();
            scheduler.schedule(&token, move |_| {
                tx.send(i).ok();
                // Let the next schedule land before this job finishes so nothing is
                // coalesced away in this test.
                std::thread::sleep(std::time::Duration::from_millis(1));
            });
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        drop(tx);
        let ran: Vec<i32> = rx.iter().collect();
        assert_eq!(ran, [0, 1, 2]);
    }

    #[test]
    fn test_queued_jobs_coalesce_to_latest() {
        let scheduler = AnalysisScheduler::new();
        let token = scheduler.token();
        let (gate_tx, gate_rx) = mpsc::channel::<()>();
        let (done_tx, done_rx) = mpsc::channel();

        // Block the worker so the following schedules pile up in the queue.
        scheduler.schedule(&token, move |_| {
            gate_rx.recv().ok();
        });
        std::thread::sleep(std::time::Duration::from_millis(20));
        for i in 0..5 {
            let done_tx = done_tx.clone();
            scheduler.schedule(&token, move |_| {
                done_tx.send(i).ok();
            });
        }
        drop(done_tx);
        gate_tx.send(()).ok();

        // Only the last queued job survives coalescing.
        let ran: Vec<i32> = done_rx.iter().collect();
        assert_eq!(ran, [4]);
    }

    #[test]
    fn test_superseded_job_sees_cancel_flag() {
        let scheduler = AnalysisScheduler::new();
        let token = scheduler.token();
        let (flag_tx, flag_rx) = mpsc::channel();
        let (gate_tx, gate_rx) = mpsc::channel::<()>();

        scheduler.schedule(&token, move |cancel| {
            gate_rx.recv().ok();
            flag_tx.send(cancel.is_cancelled()).ok();
        });
        std::thread::sleep(std::time::Duration::from_millis(20));
        // Superseding the running job raises its flag.
        scheduler.schedule(&token, |_| {});
        gate_tx.send(()).ok();
        assert_eq!(flag_rx.recv().ok(), Some(true));
    }

    #[test]
    fn test_independent_tokens_do_not_coalesce() {
        let scheduler = AnalysisScheduler::new();
        let a = scheduler.token();
        let b = scheduler.token();
        let (tx, rx) = mpsc::channel();
        let tx2 = tx.clone();
        scheduler.schedule(&a, move |_| {
            tx.send("a").ok();
        });
        scheduler.schedule(&b, move |_| {
            tx2.send("b").ok();
        });
        let mut ran: Vec<_> = rx.iter().take(2).collect();
        ran.sort();
        assert_eq!(ran, ["a", "b"]);
    }
}
