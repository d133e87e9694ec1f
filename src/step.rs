//! Chunk-oriented step execution.
//!
//! A step reads items until the reader is exhausted, groups them into
//! chunks of a fixed size, runs every item of a chunk through the
//! processor, and hands the surviving items to the writer as one unit:
//!
//! ```text
//! Idle -> Reading -> Transforming -> Writing -> (committed chunk | skipped item)*
//!      ... until the reader is exhausted -> Done
//!      ... on a non-skippable failure      -> FatalAborted
//! ```
//!
//! Per-item failures go through the [`SkipPolicy`]. A skipped item is
//! handed to the [`SkipListener`] and left out of its chunk. When a chunk
//! write fails, the chunk is rolled back and re-written one item at a time
//! so that only the offending items are skipped. Chunks committed earlier
//! are never rolled back.

use crate::error::{BatchError, Result};
use crate::item::{ItemProcessor, ItemReader, ItemWriter};
use crate::skip::{SkipDecision, SkipListener, SkipPolicy};
use std::slice;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Commit interval of both payment steps.
pub const DEFAULT_CHUNK_SIZE: usize = 10;

/// Terminal state of a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    Done,
    FatalAborted { reason: String },
    Cancelled,
}

/// Counters of one step execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepResult {
    pub name: String,
    pub status: StepStatus,
    pub read_count: usize,
    pub write_count: usize,
    pub read_skip_count: usize,
    pub process_skip_count: usize,
    pub write_skip_count: usize,
    pub commit_count: usize,
    pub rollback_count: usize,
}

impl StepResult {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: StepStatus::Done,
            read_count: 0,
            write_count: 0,
            read_skip_count: 0,
            process_skip_count: 0,
            write_skip_count: 0,
            commit_count: 0,
            rollback_count: 0,
        }
    }

    /// Items dropped by the skip policy, in any phase.
    pub fn skip_count(&self) -> usize {
        self.read_skip_count + self.process_skip_count + self.write_skip_count
    }

    pub fn is_done(&self) -> bool {
        self.status == StepStatus::Done
    }
}

/// Shared flag checked at every chunk boundary.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Runs read/process/write steps in chunks of `chunk_size` items.
pub struct ChunkProcessor<'p> {
    chunk_size: usize,
    skip_policy: &'p dyn SkipPolicy,
    cancel: CancellationFlag,
}

impl<'p> ChunkProcessor<'p> {
    pub fn new(chunk_size: usize, skip_policy: &'p dyn SkipPolicy) -> Result<Self> {
        if chunk_size == 0 {
            return Err(BatchError::Config("chunk size must be at least 1".to_string()));
        }
        Ok(Self {
            chunk_size,
            skip_policy,
            cancel: CancellationFlag::new(),
        })
    }

    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Run one step to completion.
    ///
    /// Never returns an error: fatal failures end the step in
    /// [`StepStatus::FatalAborted`]. The reader and the writer are closed
    /// on every exit path.
    pub fn run<I, O>(
        &self,
        name: &str,
        reader: &mut dyn ItemReader<I>,
        processor: &dyn ItemProcessor<I, O>,
        writer: &mut dyn ItemWriter<O>,
        listener: &mut dyn SkipListener<I, O>,
    ) -> StepResult {
        let started = Instant::now();
        let mut result = StepResult::new(name);
        info!(step = name, chunk_size = self.chunk_size, "step started");

        result.status = match self.run_chunks(&mut result, reader, processor, writer, listener) {
            Ok(status) => status,
            Err(e) => aborted(name, e),
        };

        if let Err(e) = writer.close()
            && result.is_done()
        {
            result.status = aborted(name, e);
        }
        if let Err(e) = reader.close()
            && result.is_done()
        {
            result.status = aborted(name, e);
        }

        info!(
            step = name,
            status = ?result.status,
            read = result.read_count,
            written = result.write_count,
            skipped = result.skip_count(),
            commits = result.commit_count,
            rollbacks = result.rollback_count,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "step finished"
        );
        result
    }

    fn run_chunks<I, O>(
        &self,
        result: &mut StepResult,
        reader: &mut dyn ItemReader<I>,
        processor: &dyn ItemProcessor<I, O>,
        writer: &mut dyn ItemWriter<O>,
        listener: &mut dyn SkipListener<I, O>,
    ) -> Result<StepStatus> {
        reader.open()?;
        writer.open()?;

        loop {
            if self.cancel.is_cancelled() {
                warn!(step = %result.name, "step cancelled");
                return Ok(StepStatus::Cancelled);
            }

            let (items, exhausted) = self.read_chunk(result, reader, listener)?;
            if !items.is_empty() {
                let outputs = self.process_chunk(result, &items, processor, listener)?;
                if !outputs.is_empty() {
                    self.write_chunk(result, &outputs, writer, listener)?;
                }
            }

            if exhausted {
                return Ok(StepStatus::Done);
            }
        }
    }

    fn skippable(&self, result: &StepResult, error: &BatchError) -> bool {
        self.skip_policy.classify(error, result.skip_count()) == SkipDecision::Skip
    }

    fn read_chunk<I, O>(
        &self,
        result: &mut StepResult,
        reader: &mut dyn ItemReader<I>,
        listener: &mut dyn SkipListener<I, O>,
    ) -> Result<(Vec<I>, bool)> {
        let mut items = Vec::with_capacity(self.chunk_size);
        while items.len() < self.chunk_size {
            match reader.read() {
                Ok(Some(item)) => {
                    result.read_count += 1;
                    items.push(item);
                }
                Ok(None) => return Ok((items, true)),
                Err(e) => {
                    if !self.skippable(result, &e) {
                        return Err(e);
                    }
                    warn!(
                        step = %result.name,
                        kind = ?e.kind(),
                        error = %e,
                        "skipped item in read"
                    );
                    listener.on_skip_in_read(&e);
                    result.read_skip_count += 1;
                }
            }
        }
        Ok((items, false))
    }

    fn process_chunk<I, O>(
        &self,
        result: &mut StepResult,
        items: &[I],
        processor: &dyn ItemProcessor<I, O>,
        listener: &mut dyn SkipListener<I, O>,
    ) -> Result<Vec<O>> {
        let mut outputs = Vec::with_capacity(items.len());
        for item in items {
            match processor.process(item) {
                Ok(output) => outputs.push(output),
                Err(e) => {
                    if !self.skippable(result, &e) {
                        return Err(e);
                    }
                    warn!(
                        step = %result.name,
                        kind = ?e.kind(),
                        error = %e,
                        "skipped item in process"
                    );
                    listener.on_skip_in_process(item, &e);
                    result.process_skip_count += 1;
                }
            }
        }
        Ok(outputs)
    }

    fn write_chunk<I, O>(
        &self,
        result: &mut StepResult,
        outputs: &[O],
        writer: &mut dyn ItemWriter<O>,
        listener: &mut dyn SkipListener<I, O>,
    ) -> Result<()> {
        let e = match writer.write(outputs) {
            Ok(()) => {
                result.write_count += outputs.len();
                result.commit_count += 1;
                debug!(step = %result.name, items = outputs.len(), "chunk committed");
                return Ok(());
            }
            Err(e) => e,
        };

        if !self.skippable(result, &e) {
            return Err(e);
        }
        result.rollback_count += 1;
        debug!(step = %result.name, error = %e, "chunk rolled back, writing items one by one");

        for item in outputs {
            match writer.write(slice::from_ref(item)) {
                Ok(()) => {
                    result.write_count += 1;
                    result.commit_count += 1;
                }
                Err(e) => {
                    if !self.skippable(result, &e) {
                        return Err(e);
                    }
                    warn!(
                        step = %result.name,
                        kind = ?e.kind(),
                        error = %e,
                        "skipped item in write"
                    );
                    listener.on_skip_in_write(item, &e);
                    result.write_skip_count += 1;
                }
            }
        }
        Ok(())
    }
}

fn aborted(step: &str, e: BatchError) -> StepStatus {
    error!(step, error = %e, "step aborted");
    StepStatus::FatalAborted {
        reason: e.to_string(),
    }
}
