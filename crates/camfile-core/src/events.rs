//! Event system for UI decoupling.
//!
//! Lets a CLI or GUI follow a transfer (phases, chunks, register traffic,
//! non-fatal warnings) without coupling to the engine.

use std::fmt;
use std::sync::Mutex;

use crate::device::{FileOperation, OperationStatus};
use crate::progress::ChunkResult;

/// Log level for events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// Direction of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    /// Host to device.
    Upload,
    /// Device to host.
    Download,
}

impl fmt::Display for TransferDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferDirection::Upload => write!(f, "Upload"),
            TransferDirection::Download => write!(f, "Download"),
        }
    }
}

/// Transfer phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferPhase {
    Idle,
    /// Selecting the file slot and checking its size.
    Selecting,
    /// Opening the file, including stale-handle recovery.
    Opening,
    /// Negotiating the access window and resetting the offset.
    Negotiating,
    /// Moving chunks.
    Transferring,
    Closing,
    Complete,
    Failed,
}

impl fmt::Display for TransferPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferPhase::Idle => write!(f, "Idle"),
            TransferPhase::Selecting => write!(f, "Selecting"),
            TransferPhase::Opening => write!(f, "Opening"),
            TransferPhase::Negotiating => write!(f, "Negotiating"),
            TransferPhase::Transferring => write!(f, "Transferring"),
            TransferPhase::Closing => write!(f, "Closing"),
            TransferPhase::Complete => write!(f, "Complete"),
            TransferPhase::Failed => write!(f, "Failed"),
        }
    }
}

/// Conditions that are reported but do not fail a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferWarning {
    /// The access length could not be raised to the buffer capacity.
    WindowNotWidened {
        current: u64,
        capacity: u64,
        reason: String,
    },
    /// The first open failed and a close was issued to release a stale handle.
    StaleHandleRecovery { status: String },
    /// Closing after a transfer failed; the transferred data is still valid.
    CloseFailed { status: String },
    /// The device moved fewer bytes than requested for a chunk.
    ShortChunk {
        iteration: u64,
        requested: u64,
        moved: u64,
    },
}

impl fmt::Display for TransferWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferWarning::WindowNotWidened {
                current,
                capacity,
                reason,
            } => write!(
                f,
                "Unable to widen access length from {} to {}: {}",
                current, capacity, reason
            ),
            TransferWarning::StaleHandleRecovery { status } => {
                write!(f, "Open failed ({}), closed stale handle and retried", status)
            }
            TransferWarning::CloseFailed { status } => {
                write!(f, "Failed to close file: {}", status)
            }
            TransferWarning::ShortChunk {
                iteration,
                requested,
                moved,
            } => write!(
                f,
                "Chunk {} moved {} of {} bytes",
                iteration, moved, requested
            ),
        }
    }
}

/// Events emitted during a transfer.
#[derive(Debug, Clone, PartialEq)]
pub enum TransferEvent {
    /// Phase changed.
    PhaseChanged {
        from: TransferPhase,
        to: TransferPhase,
    },
    /// A chunk operation completed.
    Chunk {
        direction: TransferDirection,
        iteration: u64,
        result: ChunkResult,
    },
    /// Progress after a completed iteration.
    Progress {
        direction: TransferDirection,
        iteration: u64,
        iterations: u64,
        percent: u8,
    },
    /// A file operation was executed on the device.
    Operation {
        operation: FileOperation,
        status: OperationStatus,
    },
    /// A register was written.
    Register { name: &'static str, value: u64 },
    /// The buffer register was read or written.
    Buffer {
        direction: TransferDirection,
        length: usize,
    },
    /// Non-fatal condition.
    Warning(TransferWarning),
    /// Log message.
    Log { level: LogLevel, message: String },
    /// Transfer finished.
    Complete {
        direction: TransferDirection,
        bytes: u64,
    },
}

/// Observer trait for receiving transfer events.
///
/// Implement this trait in your UI layer to receive updates.
pub trait TransferObserver: Send + Sync {
    /// Called when an event occurs.
    fn on_event(&self, event: &TransferEvent);
}

/// No-op observer that discards all events.
pub struct NullObserver;

impl TransferObserver for NullObserver {
    fn on_event(&self, _event: &TransferEvent) {}
}

/// Observer that logs events using tracing.
pub struct TracingObserver;

impl TransferObserver for TracingObserver {
    fn on_event(&self, event: &TransferEvent) {
        match event {
            TransferEvent::PhaseChanged { from, to } => {
                tracing::debug!(from = %from, to = %to, "Phase changed");
            }
            TransferEvent::Chunk {
                direction,
                iteration,
                result,
            } => {
                tracing::debug!(
                    dir = %direction,
                    iteration,
                    moved = result.bytes_moved,
                    offset = result.offset_after,
                    ok = result.ok,
                    "Chunk"
                );
            }
            TransferEvent::Progress {
                direction,
                percent,
                ..
            } => {
                tracing::debug!(dir = %direction, progress = %format!("{}%", percent), "Progress");
            }
            TransferEvent::Operation { operation, status } => {
                tracing::trace!(op = %operation, status = %status, "File operation");
            }
            TransferEvent::Register { name, value } => {
                tracing::trace!(register = name, value, "Register write");
            }
            TransferEvent::Buffer { direction, length } => {
                tracing::trace!(dir = %direction, len = length, "Buffer access");
            }
            TransferEvent::Warning(warning) => {
                tracing::warn!("{}", warning);
            }
            TransferEvent::Log { level, message } => match level {
                LogLevel::Trace => tracing::trace!("{}", message),
                LogLevel::Debug => tracing::debug!("{}", message),
                LogLevel::Info => tracing::info!("{}", message),
                LogLevel::Warn => tracing::warn!("{}", message),
                LogLevel::Error => tracing::error!("{}", message),
            },
            TransferEvent::Complete { direction, bytes } => {
                tracing::info!(dir = %direction, bytes, "Transfer complete");
            }
        }
    }
}

/// Observer that keeps every event, for inspection after a transfer.
#[derive(Default)]
pub struct EventLog {
    events: Mutex<Vec<TransferEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded events.
    pub fn events(&self) -> Vec<TransferEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Recorded warnings, in order.
    pub fn warnings(&self) -> Vec<TransferWarning> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                TransferEvent::Warning(w) => Some(w),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl TransferObserver for EventLog {
    fn on_event(&self, event: &TransferEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
