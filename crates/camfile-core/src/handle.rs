//! Open/close state of one device file slot.
//!
//! The device allows a single open handle at a time. `RemoteFileHandle`
//! borrows the device exclusively for its lifetime, so a second handle on the
//! same device cannot exist, and tracks the handle state so that nested opens
//! are rejected before they reach the device.

use std::fmt;

use tracing::{debug, instrument};

use crate::device::{FileAccessDevice, FileOperation, OpenMode, OperationStatus};
use crate::error::TransferError;
use crate::selector::FileSelector;

/// Handle state as tracked on the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileHandleState {
    #[default]
    Closed,
    OpenForRead,
    OpenForWrite,
}

impl FileHandleState {
    fn for_mode(mode: OpenMode) -> Self {
        match mode {
            OpenMode::Read => FileHandleState::OpenForRead,
            OpenMode::Write => FileHandleState::OpenForWrite,
        }
    }

    pub fn is_open(&self) -> bool {
        !matches!(self, FileHandleState::Closed)
    }
}

impl fmt::Display for FileHandleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileHandleState::Closed => write!(f, "Closed"),
            FileHandleState::OpenForRead => write!(f, "OpenForRead"),
            FileHandleState::OpenForWrite => write!(f, "OpenForWrite"),
        }
    }
}

/// A file slot on a device, selected and possibly open.
pub struct RemoteFileHandle<'a, D: FileAccessDevice> {
    device: &'a mut D,
    selector: Option<FileSelector>,
    state: FileHandleState,
}

impl<'a, D: FileAccessDevice> RemoteFileHandle<'a, D> {
    pub fn new(device: &'a mut D) -> Self {
        Self {
            device,
            selector: None,
            state: FileHandleState::Closed,
        }
    }

    pub fn state(&self) -> FileHandleState {
        self.state
    }

    /// Direct register access for the chunk loop.
    pub fn device_mut(&mut self) -> &mut D {
        &mut *self.device
    }

    /// Point the device's file selector at `selector`.
    #[instrument(level = "debug", skip(self, selector), fields(selector = %selector))]
    pub fn select(&mut self, selector: &FileSelector) -> Result<(), TransferError> {
        if self.state.is_open() {
            return Err(TransferError::HandleBusy { state: self.state });
        }
        let entries = self.device.file_selector_entries()?;
        FileSelector::lookup(&entries, selector.name(), Some(selector.id()))?;
        self.device.select_file(selector.id())?;
        self.selector = Some(selector.clone());
        Ok(())
    }

    /// Size of the selected file on the device.
    pub fn file_size(&self) -> Result<u64, TransferError> {
        self.require_selected()?;
        Ok(self.device.file_size()?)
    }

    /// Issue a single open. Does not retry.
    #[instrument(level = "debug", skip(self))]
    pub fn open(&mut self, mode: OpenMode) -> Result<(), TransferError> {
        self.require_selected()?;
        if self.state.is_open() {
            return Err(TransferError::HandleBusy { state: self.state });
        }
        self.device.set_open_mode(mode)?;
        match self.run(FileOperation::Open)? {
            OperationStatus::Success => {
                self.state = FileHandleState::for_mode(mode);
                debug!(mode = %mode, "File opened");
                Ok(())
            }
            OperationStatus::Failure(status) => Err(TransferError::OpenFailed { mode, status }),
        }
    }

    /// Close the file.
    ///
    /// A no-op when already closed. Otherwise the device close is always
    /// issued and the host-side state returns to `Closed` whatever the
    /// device reports.
    #[instrument(level = "debug", skip(self))]
    pub fn close(&mut self) -> Result<(), TransferError> {
        if !self.state.is_open() {
            return Ok(());
        }
        self.force_close()
    }

    /// Issue a device close regardless of the host-side state.
    ///
    /// Releases a handle left open on the device by an earlier session.
    pub fn force_close(&mut self) -> Result<(), TransferError> {
        self.state = FileHandleState::Closed;
        match self.run(FileOperation::Close)? {
            OperationStatus::Success => {
                debug!("File closed");
                Ok(())
            }
            OperationStatus::Failure(status) => Err(TransferError::CloseFailed { status }),
        }
    }

    /// Delete the selected file's contents. The handle must be closed.
    #[instrument(level = "debug", skip(self))]
    pub fn delete(&mut self) -> Result<(), TransferError> {
        self.require_selected()?;
        if self.state.is_open() {
            return Err(TransferError::HandleBusy { state: self.state });
        }
        match self.run(FileOperation::Delete)? {
            OperationStatus::Success => {
                debug!("Deleted existing file");
                Ok(())
            }
            OperationStatus::Failure(status) => Err(TransferError::DeleteFailed { status }),
        }
    }

    /// Execute a chunk `Read` or `Write` and return the device status.
    ///
    /// The handle must be open in the matching mode.
    pub fn execute(&mut self, mode: OpenMode) -> Result<OperationStatus, TransferError> {
        if self.state != FileHandleState::for_mode(mode) {
            return Err(TransferError::HandleNotOpen {
                mode,
                state: self.state,
            });
        }
        let operation = match mode {
            OpenMode::Read => FileOperation::Read,
            OpenMode::Write => FileOperation::Write,
        };
        self.run(operation)
    }

    /// Bytes moved by the last executed chunk operation.
    pub fn operation_result(&self) -> Result<u64, TransferError> {
        Ok(self.device.operation_result()?)
    }

    fn run(&mut self, operation: FileOperation) -> Result<OperationStatus, TransferError> {
        self.device.execute(operation)?;
        Ok(self.device.operation_status()?)
    }

    fn require_selected(&self) -> Result<(), TransferError> {
        if self.selector.is_none() {
            return Err(TransferError::NoFileSelected);
        }
        Ok(())
    }
}
