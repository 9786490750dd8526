use crate::sink::QuadSink;
use crate::stream::reader::StreamReader;
use facadex_common::error::{CorruptionError, StorageError};
use facadex_common::QuadPattern;
use facadex_model::{NamedNode, Quad, Subject, Term};
use parking_lot::{Condvar, Mutex};
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// The append-only quad log shared between one producer worker and any
/// number of concurrent readers.
///
/// Every append inserts the quad into the log and into all seven secondary
/// indexes under one lock acquisition, so a reader either sees a quad in
/// every index it belongs to or in none. Entries are never mutated or
/// removed; completion is a one-way latch.
#[derive(Clone)]
pub struct StreamLog {
    inner: Arc<LogInner>,
}

pub(super) struct LogInner {
    pub(super) state: Mutex<LogState>,
    pub(super) grown: Condvar,
    pub(super) cancelled: AtomicBool,
    pub(super) readers: AtomicUsize,
}

pub(super) struct LogState {
    pub(super) quads: Vec<Quad>,
    pub(super) indexes: IndexSet,
    seen: FxHashSet<Quad>,
    pub(super) complete: bool,
    pub(super) failure: Option<String>,
}

/// Posting lists of the seven secondary indexes. Values are offsets into the
/// log, in append order.
#[derive(Default)]
pub(super) struct IndexSet {
    pub(super) s: FxHashMap<Subject, Vec<usize>>,
    pub(super) p: FxHashMap<NamedNode, Vec<usize>>,
    pub(super) o: FxHashMap<Term, Vec<usize>>,
    pub(super) sp: FxHashMap<(Subject, NamedNode), Vec<usize>>,
    pub(super) po: FxHashMap<(NamedNode, Term), Vec<usize>>,
    pub(super) so: FxHashMap<(Subject, Term), Vec<usize>>,
    pub(super) spo: FxHashMap<(Subject, NamedNode, Term), Vec<usize>>,
}

impl IndexSet {
    fn insert(&mut self, quad: &Quad, offset: usize) {
        let s = quad.subject.clone();
        let p = quad.predicate.clone();
        let o = quad.object.clone();
        self.s.entry(s.clone()).or_default().push(offset);
        self.p.entry(p.clone()).or_default().push(offset);
        self.o.entry(o.clone()).or_default().push(offset);
        self.sp
            .entry((s.clone(), p.clone()))
            .or_default()
            .push(offset);
        self.po
            .entry((p.clone(), o.clone()))
            .or_default()
            .push(offset);
        self.so
            .entry((s.clone(), o.clone()))
            .or_default()
            .push(offset);
        self.spo.entry((s, p, o)).or_default().push(offset);
    }
}

impl StreamLog {
    /// Creates an empty, incomplete log.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(LogInner {
                state: Mutex::new(LogState {
                    quads: Vec::new(),
                    indexes: IndexSet::default(),
                    seen: FxHashSet::default(),
                    complete: false,
                    failure: None,
                }),
                grown: Condvar::new(),
                cancelled: AtomicBool::new(false),
                readers: AtomicUsize::new(0),
            }),
        }
    }

    /// Appends `quad` to the log and all secondary indexes.
    ///
    /// Returns `true` if the quad was new. Fails with
    /// [StorageError::Cancelled] once the consumer has cancelled the build.
    pub fn append(&self, quad: Quad) -> Result<bool, StorageError> {
        if self.is_cancelled() {
            return Err(StorageError::Cancelled);
        }
        let mut state = self.inner.state.lock();
        if state.complete {
            return Err(CorruptionError::msg("append to a completed stream log").into());
        }
        if state.seen.contains(&quad) {
            return Ok(false);
        }
        state.seen.insert(quad.clone());
        let offset = state.quads.len();
        let LogState { quads, indexes, .. } = &mut *state;
        indexes.insert(&quad, offset);
        quads.push(quad);
        drop(state);
        self.inner.grown.notify_all();
        Ok(true)
    }

    /// Marks the log complete. Idempotent; completion is permanent.
    pub fn complete(&self) {
        let mut state = self.inner.state.lock();
        state.complete = true;
        drop(state);
        self.inner.grown.notify_all();
    }

    /// Marks the log complete with a producer failure.
    ///
    /// Readers observe the failure once, after draining the quads appended
    /// before it.
    pub fn fail(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("stream producer failed: {message}");
        let mut state = self.inner.state.lock();
        state.failure = Some(message);
        state.complete = true;
        drop(state);
        self.inner.grown.notify_all();
    }

    /// Asks the producer to stop. One-way; polled by the producer between
    /// appends.
    pub fn cancel(&self) {
        tracing::debug!("stream build cancelled by the consumer");
        self.inner.cancelled.store(true, Ordering::Release);
        self.inner.grown.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    pub fn is_complete(&self) -> bool {
        self.inner.state.lock().complete
    }

    /// Number of quads appended so far.
    pub fn len(&self) -> usize {
        self.inner.state.lock().quads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Opens a reader that yields the quads matching `pattern`, blocking for
    /// more while the producer is still running.
    pub fn reader(&self, pattern: QuadPattern) -> StreamReader {
        self.inner.readers.fetch_add(1, Ordering::AcqRel);
        StreamReader::new(Arc::clone(&self.inner), pattern)
    }

    /// Returns the quads currently in the log that match `pattern`, without
    /// blocking.
    pub fn find(&self, pattern: &QuadPattern) -> Vec<Quad> {
        let state = self.inner.state.lock();
        state
            .quads
            .iter()
            .filter(|quad| pattern.matches(quad.as_ref()))
            .cloned()
            .collect()
    }
}

impl Default for StreamLog {
    fn default() -> Self {
        Self::new()
    }
}

impl QuadSink for StreamLog {
    fn put(&mut self, quad: Quad) -> Result<bool, StorageError> {
        self.append(quad)
    }

    fn finish(&mut self) -> Result<(), StorageError> {
        self.complete();
        Ok(())
    }

    fn is_cancelled(&self) -> bool {
        StreamLog::is_cancelled(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facadex_model::NamedNode;

    fn quad(s: &str) -> Quad {
        Quad::new(
            NamedNode::new_unchecked(format!("http://example.com/{s}")),
            NamedNode::new_unchecked("http://example.com/p"),
            NamedNode::new_unchecked("http://example.com/o"),
            NamedNode::new_unchecked("http://example.com/g"),
        )
    }

    #[test]
    fn append_deduplicates() {
        let log = StreamLog::new();
        assert!(log.append(quad("a")).unwrap());
        assert!(!log.append(quad("a")).unwrap());
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn append_after_completion_is_an_error() {
        let log = StreamLog::new();
        log.complete();
        assert!(log.append(quad("a")).is_err());
    }

    #[test]
    fn append_after_cancellation_is_cancelled() {
        let log = StreamLog::new();
        log.cancel();
        assert!(matches!(
            log.append(quad("a")),
            Err(StorageError::Cancelled)
        ));
    }

    #[test]
    fn completion_is_permanent() {
        let log = StreamLog::new();
        log.complete();
        log.complete();
        assert!(log.is_complete());
    }

    #[test]
    fn all_indexes_receive_an_appended_quad() {
        let log = StreamLog::new();
        log.append(quad("a")).unwrap();
        let state = log.inner.state.lock();
        assert_eq!(state.indexes.s.len(), 1);
        assert_eq!(state.indexes.p.len(), 1);
        assert_eq!(state.indexes.o.len(), 1);
        assert_eq!(state.indexes.sp.len(), 1);
        assert_eq!(state.indexes.po.len(), 1);
        assert_eq!(state.indexes.so.len(), 1);
        assert_eq!(state.indexes.spo.len(), 1);
    }
}
