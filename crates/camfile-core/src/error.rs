//! Transfer error taxonomy.

use thiserror::Error;

use crate::device::{DeviceError, OpenMode};
use crate::handle::FileHandleState;

/// Errors that abort (or, for `SizeMismatch`, qualify) a transfer.
///
/// Chunk failures carry the zero-based iteration and the device's status
/// string so they can be matched against device-side logs.
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("File selector entry {name} not supported by device")]
    SelectorUnsupported { name: String },

    #[error("File selector entry {name} is not readable")]
    SelectorNotReadable { name: String },

    #[error("Failed to open file for {mode}: {status}")]
    OpenFailed { mode: OpenMode, status: String },

    #[error("Failed to close file: {status}")]
    CloseFailed { status: String },

    #[error("Failed to delete file: {status}")]
    DeleteFailed { status: String },

    #[error("Write failed on iteration {iteration}: {status}")]
    ChunkWriteFailed { iteration: u64, status: String },

    #[error("Read failed on iteration {iteration}: {status}")]
    ChunkReadFailed { iteration: u64, status: String },

    #[error("Empty payload, nothing to write")]
    EmptyPayload,

    #[error("No data available to read from {name}")]
    NoDataAvailable { name: String },

    /// The transfer completed but moved a different number of bytes than
    /// expected. `data` holds what was received (empty for uploads).
    #[error("Size mismatch: expected {expected} bytes, transferred {actual}")]
    SizeMismatch {
        expected: u64,
        actual: u64,
        data: Vec<u8>,
    },

    #[error("File handle busy ({state})")]
    HandleBusy { state: FileHandleState },

    #[error("File handle not open for {mode} ({state})")]
    HandleNotOpen {
        mode: OpenMode,
        state: FileHandleState,
    },

    #[error("No file selected")]
    NoFileSelected,

    #[error("Access window of {size} bytes is unusable: needs a non-zero multiple of {alignment} bytes")]
    WindowUnavailable { size: u64, alignment: u64 },

    #[error("Access offset is {offset} and cannot be reset")]
    StaleOffset { offset: u64 },

    #[error("Device error: {0}")]
    Device(#[from] DeviceError),
}

impl TransferError {
    /// Device status string carried by this error, if any.
    pub fn device_status(&self) -> Option<&str> {
        match self {
            TransferError::OpenFailed { status, .. }
            | TransferError::CloseFailed { status }
            | TransferError::DeleteFailed { status }
            | TransferError::ChunkWriteFailed { status, .. }
            | TransferError::ChunkReadFailed { status, .. } => Some(status),
            _ => None,
        }
    }

    /// Iteration a chunk failure happened on.
    pub fn iteration(&self) -> Option<u64> {
        match self {
            TransferError::ChunkWriteFailed { iteration, .. }
            | TransferError::ChunkReadFailed { iteration, .. } => Some(*iteration),
            _ => None,
        }
    }
}
