//! Transfer planning.
//!
//! Splits a transfer of `total_bytes` into window-sized iterations with a
//! trailing partial chunk. Buffer register writes must be 4-byte aligned, so
//! the final partial chunk of an upload is padded with [`PAD_BYTE`]; the
//! padding never becomes part of the stored file because the access length
//! is trimmed to the real chunk length before the write executes.

use crate::error::TransferError;

/// Alignment required for buffer register writes.
pub const WRITE_ALIGNMENT: u64 = 4;

/// Sentinel value for padding bytes.
pub const PAD_BYTE: u8 = 0xFF;

/// Padding needed to bring `len` up to the write alignment.
pub fn padding_for(len: u64) -> u32 {
    ((WRITE_ALIGNMENT - len % WRITE_ALIGNMENT) % WRITE_ALIGNMENT) as u32
}

/// Plan for one transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferPlan {
    pub total_bytes: u64,
    pub window_size: u64,
    pub iterations: u64,
    pub final_chunk_size: u64,
    /// Padding for the final chunk; only applied on upload.
    pub padding_bytes: u32,
}

/// One planned chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedChunk {
    pub iteration: u64,
    pub offset: u64,
    pub len: u64,
    pub padding: u32,
}

impl PlannedChunk {
    pub fn is_partial(&self, window_size: u64) -> bool {
        self.len < window_size
    }

    /// The same iteration moved to where the device actually is.
    ///
    /// A device may accept fewer bytes than requested, so later chunks start
    /// at the reported offset and carry whatever remains. The planned padding
    /// is kept when the length is unchanged.
    pub fn at(&self, offset: u64, len: u64) -> PlannedChunk {
        let padding = if len == self.len {
            self.padding
        } else {
            padding_for(len)
        };
        PlannedChunk {
            iteration: self.iteration,
            offset,
            len,
            padding,
        }
    }

    /// Length written to the buffer register, padding included.
    pub fn padded_len(&self) -> u64 {
        self.len + self.padding as u64
    }
}

/// Computes transfer plans.
pub struct ChunkPlanner;

impl ChunkPlanner {
    /// Plan a transfer of `total_bytes` through a window of `window_size`.
    ///
    /// A zero-byte transfer yields a zero-iteration plan.
    pub fn plan(total_bytes: u64, window_size: u64) -> Result<TransferPlan, TransferError> {
        if window_size == 0 {
            return Err(TransferError::WindowUnavailable {
                size: 0,
                alignment: 1,
            });
        }

        let iterations = total_bytes.div_ceil(window_size);
        let final_chunk_size = if iterations == 0 {
            0
        } else {
            total_bytes - window_size * (iterations - 1)
        };

        Ok(TransferPlan {
            total_bytes,
            window_size,
            iterations,
            final_chunk_size,
            padding_bytes: padding_for(final_chunk_size),
        })
    }
}

impl TransferPlan {
    /// Planned length of iteration `iteration`, excluding padding.
    pub fn chunk_len(&self, iteration: u64) -> u64 {
        if iteration + 1 < self.iterations {
            self.window_size
        } else if iteration + 1 == self.iterations {
            self.final_chunk_size
        } else {
            0
        }
    }

    pub fn is_last(&self, iteration: u64) -> bool {
        iteration + 1 == self.iterations
    }

    /// Iterate over the planned chunks.
    pub fn chunks(&self) -> PlannedChunks {
        PlannedChunks {
            plan: *self,
            current: 0,
            offset: 0,
        }
    }
}

/// Iterator over the chunks of a [`TransferPlan`].
#[derive(Debug)]
pub struct PlannedChunks {
    plan: TransferPlan,
    current: u64,
    offset: u64,
}

impl Iterator for PlannedChunks {
    type Item = PlannedChunk;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current >= self.plan.iterations {
            return None;
        }

        let len = self.plan.chunk_len(self.current);
        let padding = if self.plan.is_last(self.current) {
            self.plan.padding_bytes
        } else {
            0
        };
        let chunk = PlannedChunk {
            iteration: self.current,
            offset: self.offset,
            len,
            padding,
        };

        self.offset += len;
        self.current += 1;
        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.plan.iterations - self.current) as usize;
        (left, Some(left))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_covers_total() {
        for window in [1u64, 3, 4, 7, 64, 1024] {
            for total in 1u64..300 {
                let plan = ChunkPlanner::plan(total, window).unwrap();
                assert_eq!(plan.iterations, total.div_ceil(window));

                let chunks: Vec<_> = plan.chunks().collect();
                assert_eq!(chunks.len() as u64, plan.iterations);
                assert_eq!(chunks.iter().map(|c| c.len).sum::<u64>(), total);
                assert!(chunks.iter().all(|c| c.len > 0 && c.len <= window));

                assert!(plan.padding_bytes < 4);
                assert_eq!((plan.final_chunk_size + plan.padding_bytes as u64) % 4, 0);
            }
        }
    }

    #[test]
    fn test_exact_window() {
        let plan = ChunkPlanner::plan(1024, 1024).unwrap();
        assert_eq!(plan.iterations, 1);
        assert_eq!(plan.final_chunk_size, 1024);
        assert_eq!(plan.padding_bytes, 0);
    }

    #[test]
    fn test_one_past_window() {
        let plan = ChunkPlanner::plan(1025, 1024).unwrap();
        assert_eq!(plan.iterations, 2);
        assert_eq!(plan.final_chunk_size, 1);
        assert_eq!(plan.padding_bytes, 3);

        let chunks: Vec<_> = plan.chunks().collect();
        assert_eq!(chunks[0].len, 1024);
        assert_eq!(chunks[0].padding, 0);
        assert_eq!(chunks[1].offset, 1024);
        assert_eq!(chunks[1].len, 1);
        assert_eq!(chunks[1].padding, 3);
        assert!(chunks[1].is_partial(plan.window_size));
    }

    #[test]
    fn test_empty_plan() {
        let plan = ChunkPlanner::plan(0, 1024).unwrap();
        assert_eq!(plan.iterations, 0);
        assert_eq!(plan.final_chunk_size, 0);
        assert_eq!(plan.padding_bytes, 0);
        assert_eq!(plan.chunks().count(), 0);
    }

    #[test]
    fn test_zero_window_rejected() {
        assert!(matches!(
            ChunkPlanner::plan(10, 0),
            Err(TransferError::WindowUnavailable { size: 0, .. })
        ));
    }

    #[test]
    fn test_chunk_moved_after_short_write() {
        let plan = ChunkPlanner::plan(64, 32).unwrap();
        let chunks: Vec<_> = plan.chunks().collect();

        // Unchanged length keeps the planned padding
        let same = chunks[1].at(32, 32);
        assert_eq!(same, chunks[1]);

        // Device took 24 of the first 32 bytes: 40 remain, capped by the window
        let moved = chunks[1].at(24, 32);
        assert_eq!(moved.iteration, 1);
        assert_eq!(moved.offset, 24);
        assert_eq!(moved.padding, 0);

        let tail = ChunkPlanner::plan(65, 64).unwrap().chunks().last().unwrap();
        assert_eq!(tail.padded_len(), 4);
        let shorter = tail.at(64, 2);
        assert_eq!(shorter.padding, 2);
        assert_eq!(shorter.padded_len(), 4);
    }

    #[test]
    fn test_padding_for() {
        assert_eq!(padding_for(0), 0);
        assert_eq!(padding_for(1), 3);
        assert_eq!(padding_for(2), 2);
        assert_eq!(padding_for(3), 1);
        assert_eq!(padding_for(4), 0);
        assert_eq!(padding_for(13), 3);
    }
}
