//! Progress reporting and per-transfer accounting.

/// Receives the percentage complete after every transfer iteration.
///
/// Called synchronously between chunks on the transfer's thread, exactly
/// once per completed iteration. Slow sinks delay the next chunk.
pub trait ProgressSink {
    fn on_progress(&mut self, percent: u8);
}

impl<F: FnMut(u8)> ProgressSink for F {
    fn on_progress(&mut self, percent: u8) {
        self(percent)
    }
}

/// Sink that ignores progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&mut self, _percent: u8) {}
}

/// Sink that records every report.
#[derive(Debug, Default, Clone)]
pub struct ProgressLog {
    reports: Vec<u8>,
}

impl ProgressLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> &[u8] {
        &self.reports
    }

    pub fn last(&self) -> Option<u8> {
        self.reports.last().copied()
    }
}

impl ProgressSink for ProgressLog {
    fn on_progress(&mut self, percent: u8) {
        self.reports.push(percent);
    }
}

/// Percentage reported after iteration `iteration` (zero-based) of `iterations`.
pub fn iteration_percent(iteration: u64, iterations: u64) -> u8 {
    if iterations == 0 {
        return 100;
    }
    ((iteration.min(iterations) * 100) / iterations) as u8
}

/// Outcome of a single chunk operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkResult {
    /// Bytes the device reported as moved.
    pub bytes_moved: u64,
    /// File offset after this chunk.
    pub offset_after: u64,
    pub ok: bool,
}

/// Running totals for one transfer call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    pub total_moved: u64,
    pub total_expected: u64,
}

impl TransferProgress {
    pub fn new(total_expected: u64) -> Self {
        Self {
            total_moved: 0,
            total_expected,
        }
    }

    /// Account for a completed chunk and return its result.
    pub fn record(&mut self, bytes_moved: u64) -> ChunkResult {
        self.total_moved += bytes_moved;
        ChunkResult {
            bytes_moved,
            offset_after: self.total_moved,
            ok: true,
        }
    }

    /// Bytes still expected.
    pub fn remaining(&self) -> u64 {
        self.total_expected.saturating_sub(self.total_moved)
    }

    pub fn is_done(&self) -> bool {
        self.total_moved >= self.total_expected
    }
}
