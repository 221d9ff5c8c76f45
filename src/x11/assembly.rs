//! Incoming chunked (`INCR`) transfer assembly.
//!
//! State machine: `Idle → AwaitingChunk → Complete | Failed`. The buffer
//! is bounded by a configured limit; going over it, or failing to grow
//! the buffer, fails the whole transfer. A failed transfer never yields
//! its partial bytes.

use crate::error::{SelectionFault, SharedError, X11GetError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyState {
    Idle,
    AwaitingChunk,
    Complete,
    Failed,
}

/// Result of feeding one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Chunk appended; more expected.
    More,
    /// Zero-length terminator received.
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssemblyError {
    #[error("transfer exceeds the {limit}-byte limit")]
    LimitExceeded { limit: usize },

    #[error("could not grow the transfer buffer")]
    Alloc,

    #[error(transparent)]
    Fault(#[from] SelectionFault),
}

impl From<AssemblyError> for X11GetError {
    fn from(e: AssemblyError) -> Self {
        match e {
            AssemblyError::LimitExceeded { .. } | AssemblyError::Alloc => {
                SharedError::OutOfMemory.into()
            }
            AssemblyError::Fault(fault) => fault.into(),
        }
    }
}

/// Accumulator for one chunked transfer.
#[derive(Debug)]
pub struct ChunkAssembly {
    state: AssemblyState,
    buffer: Vec<u8>,
    limit: usize,
    /// Lower bound advertised by the owner in the `INCR` property.
    size_hint: Option<usize>,
    chunks: usize,
}

impl ChunkAssembly {
    pub fn new(limit: usize) -> Self {
        Self {
            state: AssemblyState::Idle,
            buffer: Vec::new(),
            limit,
            size_hint: None,
            chunks: 0,
        }
    }

    pub fn state(&self) -> AssemblyState {
        self.state
    }

    /// Bytes received so far.
    pub fn received(&self) -> usize {
        self.buffer.len()
    }

    pub fn chunks(&self) -> usize {
        self.chunks
    }

    pub fn size_hint(&self) -> Option<usize> {
        self.size_hint
    }

    /// Start a transfer.
    ///
    /// Rejected with `TransferInProgress` while a transfer is awaiting
    /// chunks; that transfer is left untouched.
    pub fn begin(&mut self, size_hint: Option<usize>) -> Result<(), AssemblyError> {
        if self.state == AssemblyState::AwaitingChunk {
            return Err(SelectionFault::TransferInProgress.into());
        }

        self.buffer = Vec::new();
        self.chunks = 0;
        self.size_hint = size_hint;

        if let Some(hint) = size_hint {
            // The hint is a lower bound, so a hint over the limit can only
            // end over the limit.
            if hint > self.limit {
                return Err(self.fail(AssemblyError::LimitExceeded { limit: self.limit }));
            }
            if self.buffer.try_reserve(hint).is_err() {
                return Err(self.fail(AssemblyError::Alloc));
            }
        }

        self.state = AssemblyState::AwaitingChunk;
        Ok(())
    }

    /// Feed one chunk. An empty chunk completes the transfer.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Progress, AssemblyError> {
        if self.state != AssemblyState::AwaitingChunk {
            return Err(SelectionFault::UnexpectedChunk.into());
        }

        if chunk.is_empty() {
            self.state = AssemblyState::Complete;
            tracing::debug!(
                bytes = self.buffer.len(),
                chunks = self.chunks,
                "chunked transfer complete"
            );
            return Ok(Progress::Done);
        }

        let total = self.buffer.len().saturating_add(chunk.len());
        if total > self.limit {
            return Err(self.fail(AssemblyError::LimitExceeded { limit: self.limit }));
        }
        if self.buffer.try_reserve(chunk.len()).is_err() {
            return Err(self.fail(AssemblyError::Alloc));
        }

        self.buffer.extend_from_slice(chunk);
        self.chunks += 1;
        Ok(Progress::More)
    }

    /// Abandon the transfer, discarding everything received.
    pub fn abort(&mut self, fault: SelectionFault) -> AssemblyError {
        self.fail(fault.into())
    }

    /// Take the assembled bytes. `None` unless the transfer completed.
    pub fn finish(&mut self) -> Option<Vec<u8>> {
        if self.state != AssemblyState::Complete {
            return None;
        }
        self.state = AssemblyState::Idle;
        Some(std::mem::take(&mut self.buffer))
    }

    fn fail(&mut self, err: AssemblyError) -> AssemblyError {
        tracing::debug!(
            received = self.buffer.len(),
            error = %err,
            "chunked transfer failed, discarding partial buffer"
        );
        self.buffer = Vec::new();
        self.state = AssemblyState::Failed;
        err
    }
}
