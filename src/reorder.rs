//! Re-serialization of out-of-order batch completions
//!
//! Workers finish batches in arbitrary order. The [`ReorderingWriter`] emits each
//! batch to its sink only once every lower ordinal has been emitted, holding early
//! arrivals in a bounded area until their predecessors show up.

use std::collections::BTreeMap;

use parking_lot::{Condvar, Mutex};

use crate::{
    Batch, Result,
    error::{ConfigError, PipelineError},
    sink::BatchSink,
};

struct State<K> {
    sink: K,
    /// Ordinal the sink expects next
    next: u64,
    /// Completed batches waiting for a predecessor
    held: BTreeMap<u64, Batch>,
    emitted_batches: u64,
    emitted_pairs: u64,
    aborted: bool,
}
impl<K: BatchSink> State<K> {
    fn emit(&mut self, batch: Batch) -> Result<()> {
        let (ordinal, num_pairs) = (batch.ordinal(), batch.len());
        self.sink.write_batch(batch)?;
        log::debug!("emitted batch {ordinal} ({num_pairs} pairs)");
        self.next += 1;
        self.emitted_batches += 1;
        self.emitted_pairs += num_pairs as u64;
        Ok(())
    }

    /// Emits `batch` followed by every held batch that now continues the sequence
    fn flush(&mut self, batch: Batch) -> Result<()> {
        let mut batch = batch;
        loop {
            self.emit(batch)?;
            let next = self.next;
            match self.held.remove(&next) {
                Some(successor) => batch = successor,
                None => return Ok(()),
            }
        }
    }
}

/// Accepts batches from any thread and writes them to the sink in ordinal order.
///
/// The holding area is bounded by `capacity`. A submitter whose batch would overflow
/// it blocks until a flush frees room; the batch the sink expects next is always
/// admitted, so a full holding area can never stall the pipeline.
pub struct ReorderingWriter<K> {
    state: Mutex<State<K>>,
    /// Signalled whenever the holding area shrinks or the writer aborts
    space: Condvar,
    capacity: usize,
}

impl<K: BatchSink> ReorderingWriter<K> {
    pub fn new(sink: K, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(ConfigError::ZeroHoldingCapacity.into());
        }
        Ok(Self {
            state: Mutex::new(State {
                sink,
                next: 0,
                held: BTreeMap::new(),
                emitted_batches: 0,
                emitted_pairs: 0,
                aborted: false,
            }),
            space: Condvar::new(),
            capacity,
        })
    }

    /// Hands a completed batch to the writer.
    ///
    /// Returns once the batch has either been emitted or placed in the holding area.
    /// Fails with [`PipelineError::DuplicateOrdinal`] if the ordinal was already
    /// emitted or is already held, and with [`PipelineError::Cancelled`] if the writer
    /// was aborted (including while waiting for room). A sink error aborts the writer
    /// and is returned unchanged.
    pub fn submit(&self, batch: Batch) -> Result<()> {
        let ordinal = batch.ordinal();
        let mut state = self.state.lock();
        loop {
            if state.aborted {
                return Err(PipelineError::Cancelled.into());
            }
            if ordinal < state.next || state.held.contains_key(&ordinal) {
                return Err(PipelineError::DuplicateOrdinal {
                    ordinal,
                    next: state.next,
                }
                .into());
            }
            if ordinal == state.next || state.held.len() < self.capacity {
                break;
            }
            log::debug!(
                "holding area full ({} batches), batch {ordinal} waits for {}",
                state.held.len(),
                state.next
            );
            self.space.wait(&mut state);
        }

        if ordinal > state.next {
            log::debug!("holding batch {ordinal} until {} is emitted", state.next);
            state.held.insert(ordinal, batch);
            return Ok(());
        }

        let result = state.flush(batch);
        if result.is_err() {
            state.aborted = true;
        }
        drop(state);
        self.space.notify_all();
        result
    }

    /// Stops all further emission and wakes every blocked submitter
    pub fn abort(&self) {
        let mut state = self.state.lock();
        if !state.aborted {
            log::debug!(
                "aborting writer at ordinal {} with {} held batches",
                state.next,
                state.held.len()
            );
            state.aborted = true;
        }
        drop(state);
        self.space.notify_all();
    }

    /// Finishes the sink and returns it.
    ///
    /// Fails if batches are still waiting for a predecessor or if the writer was aborted.
    pub fn finish(self) -> Result<K> {
        let mut state = self.state.into_inner();
        if !state.held.is_empty() {
            return Err(PipelineError::IncompleteOutput {
                next: state.next,
                held: state.held.len(),
            }
            .into());
        }
        if state.aborted {
            return Err(PipelineError::Cancelled.into());
        }
        state.sink.finish()?;
        Ok(state.sink)
    }

    /// The ordinal the sink expects next
    pub fn next_ordinal(&self) -> u64 {
        self.state.lock().next
    }

    /// Number of batches currently in the holding area
    pub fn held(&self) -> usize {
        self.state.lock().held.len()
    }

    pub fn emitted_batches(&self) -> u64 {
        self.state.lock().emitted_batches
    }

    pub fn emitted_pairs(&self) -> u64 {
        self.state.lock().emitted_pairs
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_aborted(&self) -> bool {
        self.state.lock().aborted
    }
}
