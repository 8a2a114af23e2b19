//! Device-control abstraction for camera file access.
//!
//! Defines the `FileAccessDevice` trait wrapping the register-level file
//! access nodes exposed by camera firmware, allowing different
//! implementations (simulated, vendor SDK bindings, etc.).

use std::fmt;

use thiserror::Error;

/// Register-level failures reported by the device-control layer.
///
/// These are transport/node failures. A file operation that executes but
/// reports a non-success status is *not* a `DeviceError`; it surfaces as an
/// [`OperationStatus::Failure`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("Node not available: {0}")]
    NodeUnavailable(String),

    #[error("Node not writable: {0}")]
    NotWritable(String),

    #[error("Invalid value {value} for node {node}")]
    InvalidValue { node: String, value: u64 },

    #[error("Buffer write of {len} bytes is not {alignment}-byte aligned")]
    Misaligned { len: usize, alignment: usize },

    #[error("Buffer write of {len} bytes exceeds register capacity {capacity}")]
    BufferOverflow { len: usize, capacity: usize },

    #[error("Communication failure: {0}")]
    Communication(String),
}

/// Mode a device file is opened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpenMode::Read => write!(f, "Read"),
            OpenMode::Write => write!(f, "Write"),
        }
    }
}

/// File operations accepted by the operation-execute register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOperation {
    Open,
    Close,
    Delete,
    Read,
    Write,
}

impl fmt::Display for FileOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileOperation::Open => write!(f, "Open"),
            FileOperation::Close => write!(f, "Close"),
            FileOperation::Delete => write!(f, "Delete"),
            FileOperation::Read => write!(f, "Read"),
            FileOperation::Write => write!(f, "Write"),
        }
    }
}

/// Outcome of the last executed file operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    Success,
    /// Failure carrying the device's symbolic status (e.g. `"Failure"`, `"Overflow"`).
    Failure(String),
}

impl OperationStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, OperationStatus::Success)
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationStatus::Success => write!(f, "Success"),
            OperationStatus::Failure(code) => write!(f, "{}", code),
        }
    }
}

/// One entry of the device's file selector enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorEntry {
    /// Symbolic name, e.g. `UserSet0`.
    pub name: String,
    /// Numeric value written to the selector register.
    pub id: i64,
    /// Whether the entry can currently be queried.
    pub readable: bool,
}

/// Abstract file access interface of a camera.
///
/// Every call is a blocking round trip. Implementations must not assume
/// overlapping calls; the engine issues them strictly one at a time.
pub trait FileAccessDevice {
    /// Enumerate the file selector entries.
    fn file_selector_entries(&self) -> Result<Vec<SelectorEntry>, DeviceError>;

    /// Point the file selector at the entry with the given numeric id.
    fn select_file(&mut self, id: i64) -> Result<(), DeviceError>;

    /// Set the mode used by the next `Open` operation.
    fn set_open_mode(&mut self, mode: OpenMode) -> Result<(), DeviceError>;

    /// Select and execute a file operation.
    fn execute(&mut self, operation: FileOperation) -> Result<(), DeviceError>;

    /// Status of the last executed operation.
    fn operation_status(&self) -> Result<OperationStatus, DeviceError>;

    /// Bytes actually moved by the last `Read`/`Write`.
    fn operation_result(&self) -> Result<u64, DeviceError>;

    /// Size of the selected file as stored on the device.
    fn file_size(&self) -> Result<u64, DeviceError>;

    fn access_offset(&self) -> Result<u64, DeviceError>;

    fn set_access_offset(&mut self, offset: u64) -> Result<(), DeviceError>;

    fn is_access_offset_writable(&self) -> bool;

    fn access_length(&self) -> Result<u64, DeviceError>;

    fn set_access_length(&mut self, length: u64) -> Result<(), DeviceError>;

    fn is_access_length_writable(&self) -> bool;

    /// Native capacity of the windowed buffer register.
    fn buffer_capacity(&self) -> Result<u64, DeviceError>;

    /// Read up to `max_len` bytes from the buffer register.
    ///
    /// May return the whole register even if the last operation produced
    /// fewer bytes; callers truncate to [`operation_result`](Self::operation_result).
    fn read_buffer(&mut self, max_len: usize) -> Result<Vec<u8>, DeviceError>;

    /// Write bytes into the buffer register.
    fn write_buffer(&mut self, data: &[u8]) -> Result<(), DeviceError>;
}

/// User set persistence commands that wrap a settings file transfer.
pub trait UserSetControl {
    /// Store the camera's active settings into the named user set.
    fn save_user_set(&mut self, slot: &str) -> Result<(), DeviceError>;

    /// Apply the named user set to the camera.
    fn load_user_set(&mut self, slot: &str) -> Result<(), DeviceError>;
}

impl<D: FileAccessDevice + ?Sized> FileAccessDevice for &mut D {
    fn file_selector_entries(&self) -> Result<Vec<SelectorEntry>, DeviceError> {
        (**self).file_selector_entries()
    }

    fn select_file(&mut self, id: i64) -> Result<(), DeviceError> {
        (**self).select_file(id)
    }

    fn set_open_mode(&mut self, mode: OpenMode) -> Result<(), DeviceError> {
        (**self).set_open_mode(mode)
    }

    fn execute(&mut self, operation: FileOperation) -> Result<(), DeviceError> {
        (**self).execute(operation)
    }

    fn operation_status(&self) -> Result<OperationStatus, DeviceError> {
        (**self).operation_status()
    }

    fn operation_result(&self) -> Result<u64, DeviceError> {
        (**self).operation_result()
    }

    fn file_size(&self) -> Result<u64, DeviceError> {
        (**self).file_size()
    }

    fn access_offset(&self) -> Result<u64, DeviceError> {
        (**self).access_offset()
    }

    fn set_access_offset(&mut self, offset: u64) -> Result<(), DeviceError> {
        (**self).set_access_offset(offset)
    }

    fn is_access_offset_writable(&self) -> bool {
        (**self).is_access_offset_writable()
    }

    fn access_length(&self) -> Result<u64, DeviceError> {
        (**self).access_length()
    }

    fn set_access_length(&mut self, length: u64) -> Result<(), DeviceError> {
        (**self).set_access_length(length)
    }

    fn is_access_length_writable(&self) -> bool {
        (**self).is_access_length_writable()
    }

    fn buffer_capacity(&self) -> Result<u64, DeviceError> {
        (**self).buffer_capacity()
    }

    fn read_buffer(&mut self, max_len: usize) -> Result<Vec<u8>, DeviceError> {
        (**self).read_buffer(max_len)
    }

    fn write_buffer(&mut self, data: &[u8]) -> Result<(), DeviceError> {
        (**self).write_buffer(data)
    }
}
