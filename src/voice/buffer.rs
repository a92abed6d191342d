//! Per-connection accumulator for recorded audio chunks.
//!
//! The buffer is a two-state machine, `Idle -> Recording -> Idle`. While
//! recording, chunks are appended until `flush_threshold` is reached; the
//! concatenated bytes are then handed back and the buffer is emptied.
//! The buffer has no byte cap.

/// Recording state of one WebSocket connection.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RecordingState {
    Idle,
    Recording,
}

#[derive(Debug)]
pub struct ChunkBuffer {
    state: RecordingState,
    chunks: Vec<Vec<u8>>,
    flush_threshold: usize,
}

impl ChunkBuffer {
    /// `flush_threshold` is clamped to at least one chunk.
    pub fn new(flush_threshold: usize) -> Self {
        Self {
            state: RecordingState::Idle,
            chunks: Vec::new(),
            flush_threshold: flush_threshold.max(1),
        }
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Enters `Recording` and discards anything left from a previous take.
    pub fn start(&mut self) {
        self.state = RecordingState::Recording;
        self.chunks.clear();
    }

    /// Appends a chunk while recording. Returns the concatenated audio when
    /// the threshold is reached. Chunks arriving while idle are dropped.
    pub fn push(&mut self, chunk: Vec<u8>) -> Option<Vec<u8>> {
        if self.state != RecordingState::Recording {
            return None;
        }
        self.chunks.push(chunk);
        if self.chunks.len() >= self.flush_threshold {
            Some(self.take())
        } else {
            None
        }
    }

    /// Returns to `Idle`, handing back any remaining audio.
    pub fn stop(&mut self) -> Option<Vec<u8>> {
        self.state = RecordingState::Idle;
        if self.is_empty() {
            None
        } else {
            Some(self.take())
        }
    }

    fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.chunks).concat()
    }
}
