//! Access window negotiation.
//!
//! The device moves at most `FileAccessLength` bytes per operation through a
//! buffer register of fixed capacity. Widening the access length to the full
//! capacity cuts the number of round trips; it is optional and a refusal is
//! not an error.

use tracing::debug;

use crate::device::{DeviceError, FileAccessDevice};
use crate::error::TransferError;

/// Window size agreed with the device for one transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferWindow {
    size: u64,
    capacity: u64,
}

/// Result of a widening attempt that did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidenRefused {
    pub current: u64,
    pub capacity: u64,
    pub reason: String,
}

impl TransferWindow {
    /// Query the access length and, if allowed, widen it to the buffer capacity.
    ///
    /// The window must be a non-zero multiple of `alignment`; uploads pass the
    /// register write alignment so that every full chunk is written unpadded.
    /// Widening stops at the largest aligned length within the capacity.
    ///
    /// Returns the window to use plus the reason widening was refused, if it was.
    pub fn negotiate<D: FileAccessDevice + ?Sized>(
        device: &mut D,
        widen: bool,
        alignment: u64,
    ) -> Result<(Self, Option<WidenRefused>), TransferError> {
        let alignment = alignment.max(1);
        let current = device.access_length()?;
        let capacity = device.buffer_capacity()?;
        let target = capacity - capacity % alignment;
        let mut refused = None;

        let size = if widen && current < target {
            match Self::widen(device, target) {
                Ok(size) => {
                    debug!(from = current, to = size, "Widened access length");
                    size
                }
                Err(reason) => {
                    debug!(current, capacity, %reason, "Access length not widened");
                    refused = Some(WidenRefused {
                        current,
                        capacity,
                        reason,
                    });
                    current
                }
            }
        } else {
            current
        };

        if size == 0 || size % alignment != 0 {
            return Err(TransferError::WindowUnavailable { size, alignment });
        }

        Ok((Self { size, capacity }, refused))
    }

    fn widen<D: FileAccessDevice + ?Sized>(device: &mut D, target: u64) -> Result<u64, String> {
        if !device.is_access_length_writable() {
            return Err(DeviceError::NotWritable("FileAccessLength".into()).to_string());
        }
        device
            .set_access_length(target)
            .and_then(|_| device.access_length())
            .map_err(|e| e.to_string())
    }

    /// Zero the access offset so a stale offset from an aborted run cannot
    /// shift the new transfer.
    pub fn reset_offset<D: FileAccessDevice + ?Sized>(device: &mut D) -> Result<(), TransferError> {
        let offset = device.access_offset()?;
        if offset == 0 {
            return Ok(());
        }
        if !device.is_access_offset_writable() {
            return Err(TransferError::StaleOffset { offset });
        }
        debug!(offset, "Resetting access offset");
        device.set_access_offset(0)?;
        Ok(())
    }

    /// Bytes moved per operation.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Native buffer register capacity.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn is_widened(&self) -> bool {
        self.size == self.capacity
    }
}
