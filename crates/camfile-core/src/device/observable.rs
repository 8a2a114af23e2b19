//! Device wrapper that reports register traffic to an observer.

use super::traits::{
    DeviceError, FileAccessDevice, FileOperation, OpenMode, OperationStatus, SelectorEntry,
};
use crate::events::{TransferDirection, TransferEvent, TransferObserver};

/// Forwards every call to `inner` and emits operation, register and buffer
/// events for successful calls.
pub struct ObservableDevice<'a, D: FileAccessDevice + ?Sized, O: TransferObserver + ?Sized> {
    inner: &'a mut D,
    observer: &'a O,
}

impl<'a, D: FileAccessDevice + ?Sized, O: TransferObserver + ?Sized> ObservableDevice<'a, D, O> {
    pub fn new(inner: &'a mut D, observer: &'a O) -> Self {
        Self { inner, observer }
    }
}

impl<D: FileAccessDevice + ?Sized, O: TransferObserver + ?Sized> FileAccessDevice
    for ObservableDevice<'_, D, O>
{
    fn file_selector_entries(&self) -> Result<Vec<SelectorEntry>, DeviceError> {
        self.inner.file_selector_entries()
    }

    fn select_file(&mut self, id: i64) -> Result<(), DeviceError> {
        self.inner.select_file(id)?;
        self.observer.on_event(&TransferEvent::Register {
            name: "FileSelector",
            value: id as u64,
        });
        Ok(())
    }

    fn set_open_mode(&mut self, mode: OpenMode) -> Result<(), DeviceError> {
        self.inner.set_open_mode(mode)
    }

    fn execute(&mut self, operation: FileOperation) -> Result<(), DeviceError> {
        self.inner.execute(operation)?;
        if let Ok(status) = self.inner.operation_status() {
            self.observer
                .on_event(&TransferEvent::Operation { operation, status });
        }
        Ok(())
    }

    fn operation_status(&self) -> Result<OperationStatus, DeviceError> {
        self.inner.operation_status()
    }

    fn operation_result(&self) -> Result<u64, DeviceError> {
        self.inner.operation_result()
    }

    fn file_size(&self) -> Result<u64, DeviceError> {
        self.inner.file_size()
    }

    fn access_offset(&self) -> Result<u64, DeviceError> {
        self.inner.access_offset()
    }

    fn set_access_offset(&mut self, offset: u64) -> Result<(), DeviceError> {
        self.inner.set_access_offset(offset)?;
        self.observer.on_event(&TransferEvent::Register {
            name: "FileAccessOffset",
            value: offset,
        });
        Ok(())
    }

    fn is_access_offset_writable(&self) -> bool {
        self.inner.is_access_offset_writable()
    }

    fn access_length(&self) -> Result<u64, DeviceError> {
        self.inner.access_length()
    }

    fn set_access_length(&mut self, length: u64) -> Result<(), DeviceError> {
        self.inner.set_access_length(length)?;
        self.observer.on_event(&TransferEvent::Register {
            name: "FileAccessLength",
            value: length,
        });
        Ok(())
    }

    fn is_access_length_writable(&self) -> bool {
        self.inner.is_access_length_writable()
    }

    fn buffer_capacity(&self) -> Result<u64, DeviceError> {
        self.inner.buffer_capacity()
    }

    fn read_buffer(&mut self, max_len: usize) -> Result<Vec<u8>, DeviceError> {
        let data = self.inner.read_buffer(max_len)?;
        self.observer.on_event(&TransferEvent::Buffer {
            direction: TransferDirection::Download,
            length: data.len(),
        });
        Ok(data)
    }

    fn write_buffer(&mut self, data: &[u8]) -> Result<(), DeviceError> {
        self.inner.write_buffer(data)?;
        self.observer.on_event(&TransferEvent::Buffer {
            direction: TransferDirection::Upload,
            length: data.len(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::SimulatedDevice;
    use crate::events::EventLog;

    #[test]
    fn test_emits_register_and_buffer_events() {
        let mut device = SimulatedDevice::new(16);
        let log = EventLog::new();
        {
            let mut observed = ObservableDevice::new(&mut device, &log);
            observed.set_access_length(8).unwrap();
            observed.write_buffer(&[0u8; 8]).unwrap();
            // Failed calls emit nothing
            assert!(observed.write_buffer(&[0u8; 3]).is_err());
        }

        assert_eq!(
            log.events(),
            vec![
                TransferEvent::Register {
                    name: "FileAccessLength",
                    value: 8
                },
                TransferEvent::Buffer {
                    direction: TransferDirection::Upload,
                    length: 8
                },
            ]
        );
    }

    #[test]
    fn test_emits_operation_status() {
        let mut device = SimulatedDevice::default();
        let log = EventLog::new();
        {
            let mut observed = ObservableDevice::new(&mut device, &log);
            observed.execute(FileOperation::Close).unwrap();
        }
        assert_eq!(
            log.events(),
            vec![TransferEvent::Operation {
                operation: FileOperation::Close,
                status: OperationStatus::Failure("Failure".into()),
            }]
        );
    }
}
