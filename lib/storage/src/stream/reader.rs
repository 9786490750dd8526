use crate::stream::log::{LogInner, LogState};
use facadex_common::QuadPattern;
use facadex_model::Quad;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

/// An error observed by a stream consumer.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The producer failed before completing the stream.
    #[error("stream producer failed: {0}")]
    Producer(String),
    /// No new quad arrived within the configured wait budget.
    #[error("timed out waiting for the stream producer")]
    Timeout,
}

/// Which secondary index a reader scans, chosen from the bound components of
/// its pattern, narrowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Selection {
    Spo,
    Sp,
    Po,
    So,
    S,
    P,
    O,
    Full,
}

fn select(pattern: &QuadPattern) -> Selection {
    match (
        pattern.subject.is_some(),
        pattern.predicate.is_some(),
        pattern.object.is_some(),
    ) {
        (true, true, true) => Selection::Spo,
        (true, true, false) => Selection::Sp,
        (false, true, true) => Selection::Po,
        (true, false, true) => Selection::So,
        (true, false, false) => Selection::S,
        (false, true, false) => Selection::P,
        (false, false, true) => Selection::O,
        (false, false, false) => Selection::Full,
    }
}

/// A blocking iterator over the quads of a [StreamLog](super::StreamLog)
/// matching one target pattern.
///
/// The reader scans the narrowest index its pattern allows, from the last
/// read offset forward. When the index has no new entries and the producer
/// has not completed, the reader parks on the log's condition variable until
/// an append or the completion signal. After completion and exhaustion it
/// yields nothing, permanently.
pub struct StreamReader {
    inner: Arc<LogInner>,
    pattern: QuadPattern,
    selection: Selection,
    /// Position in the selected posting list (or in the log for full scans).
    pos: usize,
    timeout: Option<Duration>,
    failure_reported: bool,
    done: bool,
}

impl StreamReader {
    pub(super) fn new(inner: Arc<LogInner>, pattern: QuadPattern) -> Self {
        let selection = select(&pattern);
        Self {
            inner,
            pattern,
            selection,
            pos: 0,
            timeout: None,
            failure_reported: false,
            done: false,
        }
    }

    /// Limits every suspension to `timeout`. Without a limit the reader
    /// blocks until the producer makes progress.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Returns the next matching quad, blocking while the producer is still
    /// running, or `None` once the stream is complete and drained.
    pub fn try_next(&mut self) -> Result<Option<Quad>, StreamError> {
        if self.done {
            return Ok(None);
        }
        let inner = Arc::clone(&self.inner);
        let mut state = inner.state.lock();
        let mut timed_out = false;
        loop {
            if let Some(quad) = self.scan(&state) {
                return Ok(Some(quad));
            }
            if state.complete || self.inner.cancelled.load(Ordering::Acquire) {
                if let Some(message) = state.failure.clone() {
                    if !self.failure_reported {
                        self.failure_reported = true;
                        self.done = true;
                        return Err(StreamError::Producer(message));
                    }
                }
                self.done = true;
                return Ok(None);
            }
            if timed_out {
                return Err(StreamError::Timeout);
            }
            match self.timeout {
                Some(timeout) => {
                    timed_out = self.inner.grown.wait_for(&mut state, timeout).timed_out();
                }
                None => self.inner.grown.wait(&mut state),
            }
        }
    }

    /// Scans forward from the last read offset, advancing `pos` past every
    /// visited entry.
    fn scan(&mut self, state: &LogState) -> Option<Quad> {
        let posting;
        let offsets: &[usize] = match self.selection {
            Selection::Full => {
                while self.pos < state.quads.len() {
                    let quad = &state.quads[self.pos];
                    self.pos += 1;
                    if self.pattern.matches(quad.as_ref()) {
                        return Some(quad.clone());
                    }
                }
                return None;
            }
            Selection::Spo => {
                posting = state.indexes.spo.get(&(
                    self.pattern.subject.clone()?,
                    self.pattern.predicate.clone()?,
                    self.pattern.object.clone()?,
                ));
                posting.map_or(&[], Vec::as_slice)
            }
            Selection::Sp => {
                posting = state.indexes.sp.get(&(
                    self.pattern.subject.clone()?,
                    self.pattern.predicate.clone()?,
                ));
                posting.map_or(&[], Vec::as_slice)
            }
            Selection::Po => {
                posting = state.indexes.po.get(&(
                    self.pattern.predicate.clone()?,
                    self.pattern.object.clone()?,
                ));
                posting.map_or(&[], Vec::as_slice)
            }
            Selection::So => {
                posting = state.indexes.so.get(&(
                    self.pattern.subject.clone()?,
                    self.pattern.object.clone()?,
                ));
                posting.map_or(&[], Vec::as_slice)
            }
            Selection::S => {
                posting = state.indexes.s.get(&self.pattern.subject.clone()?);
                posting.map_or(&[], Vec::as_slice)
            }
            Selection::P => {
                posting = state.indexes.p.get(&self.pattern.predicate.clone()?);
                posting.map_or(&[], Vec::as_slice)
            }
            Selection::O => {
                posting = state.indexes.o.get(&self.pattern.object.clone()?);
                posting.map_or(&[], Vec::as_slice)
            }
        };
        while self.pos < offsets.len() {
            let quad = &state.quads[offsets[self.pos]];
            self.pos += 1;
            // The index guarantees the bound term components; the graph
            // still has to be checked here.
            if self.pattern.matches(quad.as_ref()) {
                return Some(quad.clone());
            }
        }
        None
    }
}

impl Iterator for StreamReader {
    type Item = Result<Quad, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.try_next() {
            Ok(Some(quad)) => Some(Ok(quad)),
            Ok(None) => None,
            Err(error) => Some(Err(error)),
        }
    }
}

impl Drop for StreamReader {
    fn drop(&mut self) {
        // The last reader walking away cancels a still-running producer so
        // abandoned builds do not leak a busy worker.
        if self.inner.readers.fetch_sub(1, Ordering::AcqRel) == 1
            && !self.inner.state.lock().complete
        {
            self.inner.cancelled.store(true, Ordering::Release);
            self.inner.grown.notify_all();
        }
    }
}
