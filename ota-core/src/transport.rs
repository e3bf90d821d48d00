/// HTTP collaborator used for the version check and the image download
use std::time::{Duration, Instant};

use crate::error::TransportError;

/// Push-style consumer of a streamed response body.
///
/// Called once per received chunk, in arrival order, on the thread that
/// drives the transport's read loop. Chunk boundaries are chosen by the
/// transport. A sink cannot stop the stream: the body is always drained.
pub trait ChunkSink {
    fn write_chunk(&mut self, chunk: &[u8]);
}

impl<F: FnMut(&[u8])> ChunkSink for F {
    fn write_chunk(&mut self, chunk: &[u8]) {
        self(chunk)
    }
}

/// Result of a buffered GET.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fetched {
    pub status: u16,
    /// Bytes copied into the caller's buffer. Anything past the buffer is
    /// read and dropped.
    pub len: usize,
}

impl Fetched {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Time budget for a whole request, from submit to the last byte.
///
/// Per-read socket timeouts restart with every chunk, so a server that keeps
/// trickling bytes never trips them. Transports check this between reads.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn start(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn is_expired(&self) -> bool {
        self.elapsed() > self.budget
    }

    pub fn check(&self) -> Result<(), TransportError> {
        if self.is_expired() {
            return Err(TransportError::Timeout);
        }
        Ok(())
    }
}

/// `timeout` bounds the whole request, not each read. Implementations
/// enforce it with a [`Deadline`].
pub trait HttpTransport {
    /// GET `url`, copying at most `body.len()` bytes of the response body.
    fn fetch(&self, url: &str, timeout: Duration, body: &mut [u8]) -> Result<Fetched, TransportError>;

    /// GET `url`, pushing the whole body into `sink`. Returns the response
    /// status once the body has been fully read, or `Timeout` once the body
    /// takes longer than `timeout`.
    fn stream(&self, url: &str, timeout: Duration, sink: &mut dyn ChunkSink) -> Result<u16, TransportError>;
}
