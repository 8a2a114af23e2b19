//! In-memory camera for testing and offline use.

use super::traits::{
    DeviceError, FileAccessDevice, FileOperation, OpenMode, OperationStatus, SelectorEntry,
    UserSetControl,
};

/// Alignment the buffer register enforces on writes.
pub const REGISTER_ALIGNMENT: usize = 4;

/// Buffer register capacity used by [`SimulatedDevice::default`].
pub const DEFAULT_BUFFER_CAPACITY: usize = 1024;

/// Filler left in the buffer register past the bytes a read produced.
const STALE_REGISTER_BYTE: u8 = 0xCD;

const STATUS_FAILURE: &str = "Failure";

/// A register-level call recorded by the simulated device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCall {
    SelectFile(i64),
    SetOpenMode(OpenMode),
    Execute(FileOperation),
    SetAccessOffset(u64),
    SetAccessLength(u64),
    ReadBuffer(usize),
    WriteBuffer(usize),
}

#[derive(Debug, Clone)]
struct Slot {
    entry: SelectorEntry,
    data: Vec<u8>,
}

/// Injected failures.
#[derive(Debug, Default, Clone)]
struct Faults {
    failing_opens: u32,
    failing_closes: u32,
    fail_read_at: Option<u64>,
    fail_write_at: Option<u64>,
    max_write_per_op: Option<u64>,
    refuse_widening: bool,
}

/// Simulated camera exposing a file access register window.
///
/// Behaves like firmware that allows one open file handle at a time, keeps
/// a fixed-capacity buffer register and rejects unaligned buffer writes.
#[derive(Debug, Clone)]
pub struct SimulatedDevice {
    slots: Vec<Slot>,
    selected: Option<usize>,
    open_mode: OpenMode,
    /// Slot index and mode of the device-side open handle.
    open_handle: Option<(usize, OpenMode)>,
    status: OperationStatus,
    result: u64,
    access_offset: u64,
    access_length: u64,
    access_offset_writable: bool,
    access_length_writable: bool,
    buffer: Vec<u8>,
    staged_len: usize,
    settings: Vec<u8>,
    faults: Faults,
    read_ops: u64,
    write_ops: u64,
    calls: Vec<DeviceCall>,
}

impl SimulatedDevice {
    /// Create a device with the given buffer register capacity.
    ///
    /// The access length starts at a quarter of the capacity, as firmware
    /// commonly reports a conservative default.
    pub fn new(buffer_capacity: usize) -> Self {
        let slots = ["UserSet0", "UserSet1", "UserSet2"]
            .iter()
            .enumerate()
            .map(|(id, name)| Slot {
                entry: SelectorEntry {
                    name: name.to_string(),
                    id: id as i64,
                    readable: true,
                },
                data: Vec::new(),
            })
            .collect();

        Self {
            slots,
            selected: None,
            open_mode: OpenMode::Read,
            open_handle: None,
            status: OperationStatus::Success,
            result: 0,
            access_offset: 0,
            access_length: (buffer_capacity / 4).max(REGISTER_ALIGNMENT) as u64,
            access_offset_writable: true,
            access_length_writable: true,
            buffer: vec![0u8; buffer_capacity],
            staged_len: 0,
            settings: Vec::new(),
            faults: Faults::default(),
            read_ops: 0,
            write_ops: 0,
            calls: Vec::new(),
        }
    }

    /// Add a selector entry.
    pub fn with_slot(mut self, name: &str, id: i64, readable: bool) -> Self {
        self.slots.push(Slot {
            entry: SelectorEntry {
                name: name.to_string(),
                id,
                readable,
            },
            data: Vec::new(),
        });
        self
    }

    /// Preload a file into an existing slot, or create a readable one.
    pub fn with_file(mut self, name: &str, data: impl Into<Vec<u8>>) -> Self {
        self.store_file(name, data.into());
        self
    }

    pub fn with_access_length(mut self, length: u64) -> Self {
        self.access_length = length;
        self
    }

    /// Leave the access offset where an aborted run would have left it.
    pub fn with_access_offset(mut self, offset: u64) -> Self {
        self.access_offset = offset;
        self
    }

    pub fn with_read_only_access_length(mut self) -> Self {
        self.access_length_writable = false;
        self
    }

    pub fn with_read_only_access_offset(mut self) -> Self {
        self.access_offset_writable = false;
        self
    }

    /// Reject any attempt to grow the access length.
    pub fn with_widening_refused(mut self) -> Self {
        self.faults.refuse_widening = true;
        self
    }

    /// Simulate a handle left open on `name` by a crashed run.
    pub fn with_stale_handle(mut self, name: &str, mode: OpenMode) -> Self {
        if let Some(index) = self.slot_index(name) {
            self.open_handle = Some((index, mode));
        }
        self
    }

    /// Make the next `count` Open operations report failure.
    pub fn with_failing_opens(mut self, count: u32) -> Self {
        self.faults.failing_opens = count;
        self
    }

    /// Make the next Close report failure and leave the handle open.
    pub fn with_failing_close(mut self) -> Self {
        self.faults.failing_closes += 1;
        self
    }

    /// Fail the read operation with the given zero-based index.
    pub fn with_read_failure_at(mut self, iteration: u64) -> Self {
        self.faults.fail_read_at = Some(iteration);
        self
    }

    /// Fail the write operation with the given zero-based index.
    pub fn with_write_failure_at(mut self, iteration: u64) -> Self {
        self.faults.fail_write_at = Some(iteration);
        self
    }

    /// Cap the bytes stored per write operation.
    pub fn with_write_limit(mut self, max_bytes: u64) -> Self {
        self.faults.max_write_per_op = Some(max_bytes);
        self
    }

    /// Set the camera's active settings (what `save_user_set` stores).
    pub fn with_settings(mut self, settings: impl Into<Vec<u8>>) -> Self {
        self.settings = settings.into();
        self
    }

    /// Contents of a slot.
    pub fn file(&self, name: &str) -> Option<&[u8]> {
        self.slot_index(name).map(|i| self.slots[i].data.as_slice())
    }

    /// Replace the contents of a slot, creating it if needed.
    pub fn store_file(&mut self, name: &str, data: Vec<u8>) {
        match self.slot_index(name) {
            Some(index) => self.slots[index].data = data,
            None => {
                let id = self.slots.iter().map(|s| s.entry.id).max().map_or(0, |m| m + 1);
                self.slots.push(Slot {
                    entry: SelectorEntry {
                        name: name.to_string(),
                        id,
                        readable: true,
                    },
                    data,
                });
            }
        }
    }

    /// All slots with their contents.
    pub fn files(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.slots
            .iter()
            .map(|s| (s.entry.name.as_str(), s.data.as_slice()))
    }

    /// Settings the camera currently applies.
    pub fn settings(&self) -> &[u8] {
        &self.settings
    }

    /// Recorded register calls.
    pub fn calls(&self) -> &[DeviceCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Number of times `operation` was executed.
    pub fn executed(&self, operation: FileOperation) -> usize {
        self.calls
            .iter()
            .filter(|c| **c == DeviceCall::Execute(operation))
            .count()
    }

    /// Whether the device currently holds an open handle.
    pub fn has_open_handle(&self) -> bool {
        self.open_handle.is_some()
    }

    pub fn current_access_offset(&self) -> u64 {
        self.access_offset
    }

    pub fn current_access_length(&self) -> u64 {
        self.access_length
    }

    fn slot_index(&self, name: &str) -> Option<usize> {
        self.slots.iter().position(|s| s.entry.name == name)
    }

    fn fail(&mut self) {
        self.status = OperationStatus::Failure(STATUS_FAILURE.to_string());
        self.result = 0;
    }

    fn succeed(&mut self, result: u64) {
        self.status = OperationStatus::Success;
        self.result = result;
    }

    fn open(&mut self) {
        let Some(selected) = self.selected else {
            return self.fail();
        };
        if self.open_handle.is_some() {
            return self.fail();
        }
        if self.faults.failing_opens > 0 {
            self.faults.failing_opens -= 1;
            return self.fail();
        }
        self.open_handle = Some((selected, self.open_mode));
        self.succeed(0);
    }

    fn close(&mut self) {
        if self.faults.failing_closes > 0 {
            self.faults.failing_closes -= 1;
            return self.fail();
        }
        if self.open_handle.take().is_some() {
            self.succeed(0);
        } else {
            self.fail();
        }
    }

    fn delete(&mut self) {
        match self.selected {
            Some(index) if self.open_handle.is_none() => {
                self.slots[index].data.clear();
                self.succeed(0);
            }
            _ => self.fail(),
        }
    }

    fn read(&mut self) {
        let iteration = self.read_ops;
        self.read_ops += 1;

        let index = match (self.selected, self.open_handle) {
            (Some(selected), Some((open, OpenMode::Read))) if selected == open => open,
            _ => return self.fail(),
        };
        if self.faults.fail_read_at == Some(iteration) {
            return self.fail();
        }

        let data = &self.slots[index].data;
        let offset = (self.access_offset as usize).min(data.len());
        let n = (self.access_length as usize)
            .min(data.len() - offset)
            .min(self.buffer.len());

        self.buffer[..n].copy_from_slice(&data[offset..offset + n]);
        self.buffer[n..].fill(STALE_REGISTER_BYTE);
        self.access_offset += n as u64;
        self.succeed(n as u64);
    }

    fn write(&mut self) {
        let iteration = self.write_ops;
        self.write_ops += 1;

        let index = match (self.selected, self.open_handle) {
            (Some(selected), Some((open, OpenMode::Write))) if selected == open => open,
            _ => return self.fail(),
        };
        if self.faults.fail_write_at == Some(iteration) {
            return self.fail();
        }

        let mut n = (self.access_length as usize).min(self.staged_len);
        if let Some(limit) = self.faults.max_write_per_op {
            n = n.min(limit as usize);
        }

        let offset = self.access_offset as usize;
        let data = &mut self.slots[index].data;
        if data.len() < offset + n {
            data.resize(offset + n, 0);
        }
        data[offset..offset + n].copy_from_slice(&self.buffer[..n]);
        self.access_offset += n as u64;
        self.succeed(n as u64);
    }
}

impl Default for SimulatedDevice {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY)
    }
}

impl FileAccessDevice for SimulatedDevice {
    fn file_selector_entries(&self) -> Result<Vec<SelectorEntry>, DeviceError> {
        Ok(self.slots.iter().map(|s| s.entry.clone()).collect())
    }

    fn select_file(&mut self, id: i64) -> Result<(), DeviceError> {
        self.calls.push(DeviceCall::SelectFile(id));
        let index = self
            .slots
            .iter()
            .position(|s| s.entry.id == id)
            .ok_or_else(|| DeviceError::InvalidValue {
                node: "FileSelector".into(),
                value: id as u64,
            })?;
        self.selected = Some(index);
        Ok(())
    }

    fn set_open_mode(&mut self, mode: OpenMode) -> Result<(), DeviceError> {
        self.calls.push(DeviceCall::SetOpenMode(mode));
        self.open_mode = mode;
        Ok(())
    }

    fn execute(&mut self, operation: FileOperation) -> Result<(), DeviceError> {
        self.calls.push(DeviceCall::Execute(operation));
        match operation {
            FileOperation::Open => self.open(),
            FileOperation::Close => self.close(),
            FileOperation::Delete => self.delete(),
            FileOperation::Read => self.read(),
            FileOperation::Write => self.write(),
        }
        Ok(())
    }

    fn operation_status(&self) -> Result<OperationStatus, DeviceError> {
        Ok(self.status.clone())
    }

    fn operation_result(&self) -> Result<u64, DeviceError> {
        Ok(self.result)
    }

    fn file_size(&self) -> Result<u64, DeviceError> {
        self.selected
            .map(|i| self.slots[i].data.len() as u64)
            .ok_or_else(|| DeviceError::NodeUnavailable("FileSize".into()))
    }

    fn access_offset(&self) -> Result<u64, DeviceError> {
        Ok(self.access_offset)
    }

    fn set_access_offset(&mut self, offset: u64) -> Result<(), DeviceError> {
        self.calls.push(DeviceCall::SetAccessOffset(offset));
        if !self.access_offset_writable {
            return Err(DeviceError::NotWritable("FileAccessOffset".into()));
        }
        self.access_offset = offset;
        Ok(())
    }

    fn is_access_offset_writable(&self) -> bool {
        self.access_offset_writable
    }

    fn access_length(&self) -> Result<u64, DeviceError> {
        Ok(self.access_length)
    }

    fn set_access_length(&mut self, length: u64) -> Result<(), DeviceError> {
        self.calls.push(DeviceCall::SetAccessLength(length));
        if !self.access_length_writable {
            return Err(DeviceError::NotWritable("FileAccessLength".into()));
        }
        if length == 0
            || length > self.buffer.len() as u64
            || (self.faults.refuse_widening && length > self.access_length)
        {
            return Err(DeviceError::InvalidValue {
                node: "FileAccessLength".into(),
                value: length,
            });
        }
        self.access_length = length;
        Ok(())
    }

    fn is_access_length_writable(&self) -> bool {
        self.access_length_writable
    }

    fn buffer_capacity(&self) -> Result<u64, DeviceError> {
        Ok(self.buffer.len() as u64)
    }

    fn read_buffer(&mut self, max_len: usize) -> Result<Vec<u8>, DeviceError> {
        self.calls.push(DeviceCall::ReadBuffer(max_len));
        let n = max_len.min(self.buffer.len());
        Ok(self.buffer[..n].to_vec())
    }

    fn write_buffer(&mut self, data: &[u8]) -> Result<(), DeviceError> {
        self.calls.push(DeviceCall::WriteBuffer(data.len()));
        if data.len() > self.buffer.len() {
            return Err(DeviceError::BufferOverflow {
                len: data.len(),
                capacity: self.buffer.len(),
            });
        }
        if data.len() % REGISTER_ALIGNMENT != 0 {
            return Err(DeviceError::Misaligned {
                len: data.len(),
                alignment: REGISTER_ALIGNMENT,
            });
        }
        self.buffer[..data.len()].copy_from_slice(data);
        self.staged_len = data.len();
        Ok(())
    }
}

impl UserSetControl for SimulatedDevice {
    fn save_user_set(&mut self, slot: &str) -> Result<(), DeviceError> {
        let index = self
            .slot_index(slot)
            .ok_or_else(|| DeviceError::NodeUnavailable(format!("UserSetSelector/{}", slot)))?;
        self.slots[index].data = self.settings.clone();
        Ok(())
    }

    fn load_user_set(&mut self, slot: &str) -> Result<(), DeviceError> {
        let index = self
            .slot_index(slot)
            .ok_or_else(|| DeviceError::NodeUnavailable(format!("UserSetSelector/{}", slot)))?;
        self.settings = self.slots[index].data.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn select(device: &mut SimulatedDevice, name: &str) {
        let id = device
            .file_selector_entries()
            .unwrap()
            .into_iter()
            .find(|e| e.name == name)
            .unwrap()
            .id;
        device.select_file(id).unwrap();
    }

    #[test]
    fn test_single_open_handle() {
        let mut device = SimulatedDevice::default();
        select(&mut device, "UserSet0");

        device.set_open_mode(OpenMode::Write).unwrap();
        device.execute(FileOperation::Open).unwrap();
        assert!(device.operation_status().unwrap().is_success());

        // Second open while the first handle is held
        device.execute(FileOperation::Open).unwrap();
        assert!(!device.operation_status().unwrap().is_success());

        device.execute(FileOperation::Close).unwrap();
        assert!(device.operation_status().unwrap().is_success());
        assert!(!device.has_open_handle());
    }

    #[test]
    fn test_failing_close_keeps_handle() {
        let mut device = SimulatedDevice::default().with_failing_close();
        select(&mut device, "UserSet0");
        device.set_open_mode(OpenMode::Read).unwrap();
        device.execute(FileOperation::Open).unwrap();

        device.execute(FileOperation::Close).unwrap();
        assert!(!device.operation_status().unwrap().is_success());
        assert!(device.has_open_handle());

        // Only the next close fails
        device.execute(FileOperation::Close).unwrap();
        assert!(device.operation_status().unwrap().is_success());
        assert!(!device.has_open_handle());
    }

    #[test]
    fn test_unaligned_buffer_write_rejected() {
        let mut device = SimulatedDevice::new(16);
        assert_eq!(
            device.write_buffer(&[1, 2, 3]),
            Err(DeviceError::Misaligned {
                len: 3,
                alignment: 4
            })
        );
        assert!(device.write_buffer(&[0u8; 20]).is_err());
        assert!(device.write_buffer(&[1, 2, 3, 4]).is_ok());
    }

    #[test]
    fn test_write_honours_access_length() {
        let mut device = SimulatedDevice::new(16).with_access_length(16);
        select(&mut device, "UserSet1");
        device.set_open_mode(OpenMode::Write).unwrap();
        device.execute(FileOperation::Open).unwrap();

        device.write_buffer(&[7, 7, 7, 0xFF]).unwrap();
        device.set_access_length(3).unwrap();
        device.execute(FileOperation::Write).unwrap();

        assert_eq!(device.operation_result().unwrap(), 3);
        assert_eq!(device.file("UserSet1").unwrap(), &[7, 7, 7]);
        assert_eq!(device.current_access_offset(), 3);
    }

    #[test]
    fn test_read_leaves_stale_register_tail() {
        let mut device = SimulatedDevice::new(8)
            .with_access_length(8)
            .with_file("UserSet0", vec![1, 2, 3]);
        select(&mut device, "UserSet0");
        device.set_open_mode(OpenMode::Read).unwrap();
        device.execute(FileOperation::Open).unwrap();
        device.execute(FileOperation::Read).unwrap();

        assert_eq!(device.operation_result().unwrap(), 3);
        let register = device.read_buffer(8).unwrap();
        assert_eq!(register.len(), 8);
        assert_eq!(&register[..3], &[1, 2, 3]);
        assert!(register[3..].iter().all(|&b| b == STALE_REGISTER_BYTE));
    }

    #[test]
    fn test_user_set_save_and_load() {
        let mut device = SimulatedDevice::default().with_settings(b"exposure=2000".to_vec());
        device.save_user_set("UserSet0").unwrap();
        assert_eq!(device.file("UserSet0").unwrap(), b"exposure=2000");

        device.store_file("UserSet0", b"exposure=100".to_vec());
        device.load_user_set("UserSet0").unwrap();
        assert_eq!(device.settings(), b"exposure=100");

        assert!(device.load_user_set("UserSet9").is_err());
    }

    #[test]
    fn test_access_length_bounds() {
        let mut device = SimulatedDevice::new(64);
        assert!(device.set_access_length(0).is_err());
        assert!(device.set_access_length(65).is_err());
        assert!(device.set_access_length(64).is_ok());

        let mut refusing = SimulatedDevice::new(64).with_widening_refused();
        assert!(refusing.set_access_length(64).is_err());
        assert!(refusing.set_access_length(8).is_ok());
    }
}
