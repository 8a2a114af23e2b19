//! Chunked transfer engine.
//!
//! Drives uploads and downloads through the device's file access window:
//! select the slot, open it (retrying once after closing a stale handle),
//! negotiate the window, move the data chunk by chunk and close. Any chunk
//! failure aborts the transfer; there is no per-chunk retry because a failed
//! chunk leaves the device offset ambiguous.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::config::TransferConfig;
use crate::device::{FileAccessDevice, ObservableDevice, OpenMode, OperationStatus};
use crate::error::TransferError;
use crate::events::{
    LogLevel, TracingObserver, TransferDirection, TransferEvent, TransferObserver, TransferPhase,
    TransferWarning,
};
use crate::handle::RemoteFileHandle;
use crate::plan::{ChunkPlanner, PAD_BYTE, WRITE_ALIGNMENT};
use crate::progress::{ChunkResult, ProgressSink, TransferProgress, iteration_percent};
use crate::selector::FileSelector;
use crate::window::TransferWindow;

/// Moves whole files to and from one device, one transfer at a time.
pub struct ChunkedTransferEngine<D: FileAccessDevice, O: TransferObserver = TracingObserver> {
    device: D,
    observer: Arc<O>,
    config: TransferConfig,
}

impl<D: FileAccessDevice> ChunkedTransferEngine<D, TracingObserver> {
    /// Create an engine with the default tracing observer.
    pub fn new(device: D) -> Self {
        Self::with_observer(device, Arc::new(TracingObserver))
    }
}

impl<D: FileAccessDevice, O: TransferObserver> ChunkedTransferEngine<D, O> {
    /// Create an engine with a custom observer.
    pub fn with_observer(device: D, observer: Arc<O>) -> Self {
        Self {
            device,
            observer,
            config: TransferConfig::default(),
        }
    }

    pub fn with_config(mut self, config: TransferConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    pub fn observer(&self) -> &Arc<O> {
        &self.observer
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Resolve a slot name on this engine's device.
    pub fn resolve(&self, name: &str) -> Result<FileSelector, TransferError> {
        FileSelector::resolve(&self.device, name)
    }

    /// Write `data` into the file slot, replacing its contents.
    ///
    /// Returns the number of bytes the device reported as written.
    #[instrument(skip(self, selector, data, progress), fields(selector = %selector, len = data.len()))]
    pub fn upload<P: ProgressSink + ?Sized>(
        &mut self,
        selector: &FileSelector,
        data: &[u8],
        progress: &mut P,
    ) -> Result<u64, TransferError> {
        if data.is_empty() {
            return Err(TransferError::EmptyPayload);
        }

        let widen = self.config.widen_window;
        let observer = &*self.observer;
        let mut device = ObservableDevice::new(&mut self.device, observer);
        let mut transfer = Transfer::new(&mut device, observer, TransferDirection::Upload);

        let result = transfer.upload(selector, data, widen, progress);
        let written = transfer.finish(result)?;

        info!(bytes = written, "Upload complete");
        Ok(written)
    }

    /// Read the whole file slot.
    ///
    /// When `expected_size` is given and differs from what was read, the
    /// data is returned inside [`TransferError::SizeMismatch`].
    #[instrument(skip(self, selector, progress), fields(selector = %selector))]
    pub fn download<P: ProgressSink + ?Sized>(
        &mut self,
        selector: &FileSelector,
        expected_size: Option<u64>,
        progress: &mut P,
    ) -> Result<Vec<u8>, TransferError> {
        let widen = self.config.widen_window;
        let observer = &*self.observer;
        let mut device = ObservableDevice::new(&mut self.device, observer);
        let mut transfer = Transfer::new(&mut device, observer, TransferDirection::Download);

        let file_size = match transfer.select_for_download(selector) {
            Ok(size) => size,
            Err(err) => return transfer.finish(Err(err)),
        };
        let result = transfer.download(file_size, widen, progress);
        let data = transfer.finish(result)?;

        info!(bytes = data.len(), "Download complete");
        match expected_size {
            Some(expected) if expected != data.len() as u64 => Err(TransferError::SizeMismatch {
                expected,
                actual: data.len() as u64,
                data,
            }),
            _ => Ok(data),
        }
    }
}

/// State for a single upload or download call.
struct Transfer<'a, T: FileAccessDevice, O: TransferObserver + ?Sized> {
    handle: RemoteFileHandle<'a, T>,
    observer: &'a O,
    direction: TransferDirection,
    phase: TransferPhase,
}

impl<'a, T: FileAccessDevice, O: TransferObserver + ?Sized> Transfer<'a, T, O> {
    fn new(device: &'a mut T, observer: &'a O, direction: TransferDirection) -> Self {
        Self {
            handle: RemoteFileHandle::new(device),
            observer,
            direction,
            phase: TransferPhase::Idle,
        }
    }

    fn emit(&self, event: TransferEvent) {
        self.observer.on_event(&event);
    }

    fn warn(&self, warning: TransferWarning) {
        self.emit(TransferEvent::Warning(warning));
    }

    fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.emit(TransferEvent::Log {
            level,
            message: message.into(),
        });
    }

    fn enter(&mut self, phase: TransferPhase) {
        self.emit(TransferEvent::PhaseChanged {
            from: self.phase,
            to: phase,
        });
        self.phase = phase;
    }

    fn upload<P: ProgressSink + ?Sized>(
        &mut self,
        selector: &FileSelector,
        data: &[u8],
        widen: bool,
        progress: &mut P,
    ) -> Result<u64, TransferError> {
        self.enter(TransferPhase::Selecting);
        self.handle.select(selector)?;

        // Writes overlay the stored file, so old contents must go first
        let existing = self.handle.file_size()?;
        if existing > 0 {
            debug!(existing, "Deleting existing file");
            self.handle.delete()?;
            self.log(LogLevel::Info, "Deleted existing camera file");
        }

        self.open(OpenMode::Write)?;
        let window = self.negotiate(widen, WRITE_ALIGNMENT)?;
        self.write_chunks(data, window, progress)
    }

    fn select_for_download(&mut self, selector: &FileSelector) -> Result<u64, TransferError> {
        self.enter(TransferPhase::Selecting);
        self.handle.select(selector)?;

        let file_size = self.handle.file_size()?;
        if file_size == 0 {
            return Err(TransferError::NoDataAvailable {
                name: selector.name().to_string(),
            });
        }
        debug!(file_size, "Total data to download");
        Ok(file_size)
    }

    fn download<P: ProgressSink + ?Sized>(
        &mut self,
        file_size: u64,
        widen: bool,
        progress: &mut P,
    ) -> Result<Vec<u8>, TransferError> {
        self.open(OpenMode::Read)?;
        let window = self.negotiate(widen, 1)?;
        self.read_chunks(file_size, window, progress)
    }

    /// Open, closing and retrying once if the first attempt fails.
    ///
    /// A run that crashed mid-transfer leaves the device-side handle open,
    /// which makes the next open fail until it is closed.
    fn open(&mut self, mode: OpenMode) -> Result<(), TransferError> {
        self.enter(TransferPhase::Opening);
        match self.handle.open(mode) {
            Err(TransferError::OpenFailed { status, .. }) => {
                self.warn(TransferWarning::StaleHandleRecovery { status });
                if let Err(err) = self.handle.force_close() {
                    self.log(
                        LogLevel::Warn,
                        format!("Close before reopen failed, reopening anyway: {}", err),
                    );
                }
                self.handle.open(mode)
            }
            other => other,
        }
    }

    fn negotiate(&mut self, widen: bool, alignment: u64) -> Result<TransferWindow, TransferError> {
        self.enter(TransferPhase::Negotiating);
        let (window, refused) =
            TransferWindow::negotiate(self.handle.device_mut(), widen, alignment)?;
        debug!(
            size = window.size(),
            capacity = window.capacity(),
            widened = window.is_widened(),
            "Access window"
        );
        if let Some(refused) = refused {
            self.warn(TransferWarning::WindowNotWidened {
                current: refused.current,
                capacity: refused.capacity,
                reason: refused.reason,
            });
        }
        TransferWindow::reset_offset(self.handle.device_mut())?;
        Ok(window)
    }

    fn write_chunks<P: ProgressSink + ?Sized>(
        &mut self,
        data: &[u8],
        window: TransferWindow,
        progress: &mut P,
    ) -> Result<u64, TransferError> {
        let plan = ChunkPlanner::plan(data.len() as u64, window.size())?;
        debug!(
            total = plan.total_bytes,
            window = plan.window_size,
            iterations = plan.iterations,
            padding = plan.padding_bytes,
            "Write plan"
        );
        self.log(
            LogLevel::Info,
            format!(
                "Writing {} bytes to device in {} iterations",
                plan.total_bytes, plan.iterations
            ),
        );

        self.enter(TransferPhase::Transferring);
        let mut totals = TransferProgress::new(plan.total_bytes);

        for planned in plan.chunks() {
            // Sized from what the device actually accepted so far
            let chunk = planned.at(
                totals.total_moved,
                totals.remaining().min(plan.window_size),
            );
            let iteration = chunk.iteration;
            let chunk_len = chunk.len;
            let start = chunk.offset as usize;

            let mut buffer = data[start..start + chunk_len as usize].to_vec();
            buffer.resize(chunk.padded_len() as usize, PAD_BYTE);

            let device = self.handle.device_mut();
            device.write_buffer(&buffer)?;
            if chunk.is_partial(plan.window_size) {
                // Keep the padding out of the stored file
                device.set_access_length(chunk_len)?;
            }

            if let OperationStatus::Failure(status) = self.handle.execute(OpenMode::Write)? {
                return Err(TransferError::ChunkWriteFailed { iteration, status });
            }

            let moved = self.handle.operation_result()?.min(chunk_len);
            if chunk.is_partial(plan.window_size)
                && let Err(err) = self.handle.device_mut().set_access_length(plan.window_size)
            {
                debug!(error = %err, "Access length not restored");
            }
            if moved < chunk_len {
                self.warn(TransferWarning::ShortChunk {
                    iteration,
                    requested: chunk_len,
                    moved,
                });
            }

            let result = totals.record(moved);
            debug!(
                written = totals.total_moved,
                total = plan.total_bytes,
                left = totals.remaining(),
                "Bytes written"
            );
            self.chunk_done(iteration, plan.iterations, result, progress);
        }

        if !totals.is_done() {
            return Err(TransferError::SizeMismatch {
                expected: plan.total_bytes,
                actual: totals.total_moved,
                data: Vec::new(),
            });
        }
        Ok(totals.total_moved)
    }

    fn read_chunks<P: ProgressSink + ?Sized>(
        &mut self,
        file_size: u64,
        window: TransferWindow,
        progress: &mut P,
    ) -> Result<Vec<u8>, TransferError> {
        let plan = ChunkPlanner::plan(file_size, window.size())?;
        debug!(
            total = plan.total_bytes,
            window = plan.window_size,
            iterations = plan.iterations,
            "Read plan"
        );
        self.log(
            LogLevel::Info,
            format!(
                "Reading {} bytes from device in {} iterations",
                plan.total_bytes, plan.iterations
            ),
        );

        self.enter(TransferPhase::Transferring);
        let mut totals = TransferProgress::new(plan.total_bytes);
        let mut output = Vec::with_capacity(file_size as usize);

        for planned in plan.chunks() {
            let iteration = planned.iteration;
            if let OperationStatus::Failure(status) = self.handle.execute(OpenMode::Read)? {
                return Err(TransferError::ChunkReadFailed { iteration, status });
            }

            let size_read = self.handle.operation_result()?;
            let register = self.handle.device_mut().read_buffer(size_read as usize)?;
            let Some(chunk) = register.get(..size_read as usize) else {
                return Err(TransferError::ChunkReadFailed {
                    iteration,
                    status: format!(
                        "buffer returned {} of {} bytes",
                        register.len(),
                        size_read
                    ),
                });
            };
            output.extend_from_slice(chunk);

            let requested = planned.len;
            if size_read < requested {
                self.warn(TransferWarning::ShortChunk {
                    iteration,
                    requested,
                    moved: size_read,
                });
            }

            let result = totals.record(size_read);
            debug!(read = totals.total_moved, total = plan.total_bytes, "Bytes read");
            self.chunk_done(iteration, plan.iterations, result, progress);
        }

        Ok(output)
    }

    fn chunk_done<P: ProgressSink + ?Sized>(
        &self,
        iteration: u64,
        iterations: u64,
        result: ChunkResult,
        progress: &mut P,
    ) {
        self.emit(TransferEvent::Chunk {
            direction: self.direction,
            iteration,
            result,
        });

        let percent = iteration_percent(iteration, iterations);
        progress.on_progress(percent);
        self.emit(TransferEvent::Progress {
            direction: self.direction,
            iteration,
            iterations,
            percent,
        });
    }

    /// Close the file and settle the outcome.
    ///
    /// The close is attempted on every path. Its failure never replaces the
    /// transfer's own error and only downgrades a success to a warning.
    fn finish<V: TransferredLen>(
        mut self,
        result: Result<V, TransferError>,
    ) -> Result<V, TransferError> {
        self.enter(TransferPhase::Closing);
        let closed = self.handle.close();

        match result {
            Ok(value) => {
                if let Err(err) = closed {
                    let status = err
                        .device_status()
                        .map(str::to_string)
                        .unwrap_or_else(|| err.to_string());
                    self.warn(TransferWarning::CloseFailed { status });
                }
                self.enter(TransferPhase::Complete);
                self.emit(TransferEvent::Complete {
                    direction: self.direction,
                    bytes: value.transferred_len(),
                });
                Ok(value)
            }
            Err(err) => {
                if let Err(close_err) = closed {
                    debug!(error = %close_err, "Close after failed transfer also failed");
                }
                self.enter(TransferPhase::Failed);
                Err(err)
            }
        }
    }
}

/// Byte count reported in the completion event.
trait TransferredLen {
    fn transferred_len(&self) -> u64;
}

impl TransferredLen for u64 {
    fn transferred_len(&self) -> u64 {
        *self
    }
}

impl TransferredLen for Vec<u8> {
    fn transferred_len(&self) -> u64 {
        self.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceCall, FileOperation, SimulatedDevice};
    use crate::events::EventLog;
    use crate::progress::{NoProgress, ProgressLog};

    fn engine(device: SimulatedDevice) -> ChunkedTransferEngine<SimulatedDevice, EventLog> {
        ChunkedTransferEngine::with_observer(device, Arc::new(EventLog::new()))
    }

    fn user_set_0() -> FileSelector {
        FileSelector::new("UserSet0", 0)
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 + 3) as u8).collect()
    }

    fn executed_ops(device: &SimulatedDevice) -> Vec<FileOperation> {
        device
            .calls()
            .iter()
            .filter_map(|c| match c {
                DeviceCall::Execute(op) => Some(*op),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_round_trip_smaller_window() {
        for len in [1usize, 3, 4, 63, 64, 65, 130, 255, 1000] {
            let data = pattern(len);
            let mut engine = engine(SimulatedDevice::new(64));

            let written = engine.upload(&user_set_0(), &data, &mut NoProgress).unwrap();
            assert_eq!(written, len as u64);
            assert_eq!(engine.device().file("UserSet0").unwrap(), data.as_slice());

            let read = engine.download(&user_set_0(), Some(len as u64), &mut NoProgress).unwrap();
            assert_eq!(read, data);
            assert!(!engine.device().has_open_handle());
        }
    }

    #[test]
    fn test_padding_not_stored() {
        let data = pattern(65);
        let mut engine = engine(SimulatedDevice::new(64).with_access_length(64));
        engine.upload(&user_set_0(), &data, &mut NoProgress).unwrap();

        let device = engine.device();
        assert_eq!(device.file("UserSet0").unwrap().len(), 65);
        // Final chunk: 1 byte padded to 4, access length trimmed to 1
        let calls = device.calls();
        assert!(calls.contains(&DeviceCall::WriteBuffer(4)));
        assert!(calls.contains(&DeviceCall::SetAccessLength(1)));
        assert_eq!(device.file("UserSet0").unwrap(), data.as_slice());
    }

    #[test]
    fn test_widens_window_before_transfer() {
        let data = pattern(1024);
        let mut engine = engine(SimulatedDevice::new(256).with_access_length(64));
        engine.upload(&user_set_0(), &data, &mut NoProgress).unwrap();
        assert_eq!(engine.device().executed(FileOperation::Write), 4);
    }

    #[test]
    fn test_window_not_widened_is_warning() {
        let data = pattern(256);
        let mut engine = engine(
            SimulatedDevice::new(256)
                .with_access_length(64)
                .with_widening_refused(),
        );
        engine.upload(&user_set_0(), &data, &mut NoProgress).unwrap();

        assert_eq!(engine.device().executed(FileOperation::Write), 4);
        assert_eq!(engine.device().file("UserSet0").unwrap(), data.as_slice());
        assert!(matches!(
            engine.observer().warnings().as_slice(),
            [TransferWarning::WindowNotWidened {
                current: 64,
                capacity: 256,
                ..
            }]
        ));
    }

    #[test]
    fn test_stale_handle_recovered() {
        let data = pattern(100);
        let mut engine =
            engine(SimulatedDevice::new(64).with_stale_handle("UserSet0", OpenMode::Write));

        let written = engine.upload(&user_set_0(), &data, &mut NoProgress).unwrap();
        assert_eq!(written, 100);

        let ops = executed_ops(engine.device());
        assert_eq!(
            &ops[..3],
            &[FileOperation::Open, FileOperation::Close, FileOperation::Open]
        );
        // One close to release the stale handle, one to finish
        assert_eq!(engine.device().executed(FileOperation::Close), 2);
        assert!(!engine.device().has_open_handle());
        assert!(matches!(
            engine.observer().warnings().as_slice(),
            [TransferWarning::StaleHandleRecovery { .. }]
        ));
    }

    #[test]
    fn test_open_fails_twice() {
        let mut engine = engine(SimulatedDevice::new(64).with_failing_opens(2));
        let err = engine
            .upload(&user_set_0(), &pattern(10), &mut NoProgress)
            .unwrap_err();
        assert!(matches!(
            err,
            TransferError::OpenFailed {
                mode: OpenMode::Write,
                ..
            }
        ));
        assert_eq!(err.device_status(), Some("Failure"));
        assert_eq!(engine.device().executed(FileOperation::Open), 2);
        assert_eq!(engine.device().executed(FileOperation::Write), 0);
    }

    #[test]
    fn test_read_failure_aborts() {
        let data = pattern(80);
        let device = SimulatedDevice::new(16)
            .with_access_length(16)
            .with_file("UserSet0", data)
            .with_read_failure_at(3);
        let mut engine = engine(device);
        let mut progress = ProgressLog::new();

        let err = engine
            .download(&user_set_0(), None, &mut progress)
            .unwrap_err();
        assert!(matches!(
            err,
            TransferError::ChunkReadFailed { iteration: 3, ref status } if status == "Failure"
        ));
        // Iterations 0..=3 attempted, none after
        assert_eq!(engine.device().executed(FileOperation::Read), 4);
        assert_eq!(progress.reports(), &[0, 20, 40]);
        // Best-effort close still issued
        assert!(!engine.device().has_open_handle());
    }

    #[test]
    fn test_write_failure_aborts() {
        let mut engine = engine(
            SimulatedDevice::new(16)
                .with_access_length(16)
                .with_write_failure_at(1),
        );
        let err = engine
            .upload(&user_set_0(), &pattern(64), &mut NoProgress)
            .unwrap_err();
        assert_eq!(err.iteration(), Some(1));
        assert!(matches!(err, TransferError::ChunkWriteFailed { .. }));
        assert_eq!(engine.device().executed(FileOperation::Write), 2);
        assert!(!engine.device().has_open_handle());
    }

    #[test]
    fn test_empty_file_skips_open() {
        let mut engine = engine(SimulatedDevice::new(64));
        let err = engine
            .download(&user_set_0(), None, &mut NoProgress)
            .unwrap_err();
        assert!(matches!(err, TransferError::NoDataAvailable { .. }));
        assert_eq!(engine.device().executed(FileOperation::Open), 0);
    }

    #[test]
    fn test_empty_payload_rejected() {
        let mut engine = engine(SimulatedDevice::new(64).with_file("UserSet0", vec![1, 2, 3]));
        let err = engine
            .upload(&user_set_0(), &[], &mut NoProgress)
            .unwrap_err();
        assert!(matches!(err, TransferError::EmptyPayload));
        // Existing file untouched
        assert_eq!(engine.device().file("UserSet0").unwrap(), &[1, 2, 3]);
        assert!(engine.device().calls().is_empty());
    }

    #[test]
    fn test_existing_file_deleted_first() {
        let mut engine = engine(SimulatedDevice::new(64).with_file("UserSet0", pattern(500)));
        engine
            .upload(&user_set_0(), &pattern(10), &mut NoProgress)
            .unwrap();

        let ops = executed_ops(engine.device());
        assert_eq!(ops[0], FileOperation::Delete);
        assert_eq!(engine.device().file("UserSet0").unwrap(), pattern(10).as_slice());
    }

    #[test]
    fn test_shorter_upload_replaces_longer_file() {
        let mut engine = engine(SimulatedDevice::new(64).with_file("UserSet0", vec![0xAA; 500]));
        let data = pattern(100);

        let written = engine.upload(&user_set_0(), &data, &mut NoProgress).unwrap();
        assert_eq!(written, 100);

        let read = engine.download(&user_set_0(), None, &mut NoProgress).unwrap();
        assert_eq!(read, data);
        assert_eq!(engine.device().executed(FileOperation::Delete), 1);
    }

    #[test]
    fn test_close_failure_after_upload_is_warning() {
        let data = pattern(90);
        let mut engine = engine(SimulatedDevice::new(64).with_failing_close());

        let written = engine.upload(&user_set_0(), &data, &mut NoProgress).unwrap();
        assert_eq!(written, 90);
        assert_eq!(engine.device().file("UserSet0").unwrap(), data.as_slice());
        assert!(matches!(
            engine.observer().warnings().as_slice(),
            [TransferWarning::CloseFailed { status }] if status == "Failure"
        ));
        assert!(engine.observer().events().contains(&TransferEvent::PhaseChanged {
            from: TransferPhase::Closing,
            to: TransferPhase::Complete,
        }));
    }

    #[test]
    fn test_close_failure_after_download_keeps_data() {
        let data = pattern(130);
        let mut engine = engine(
            SimulatedDevice::new(64)
                .with_file("UserSet0", data.clone())
                .with_failing_close(),
        );

        let read = engine.download(&user_set_0(), None, &mut NoProgress).unwrap();
        assert_eq!(read, data);
        let close_warnings = engine
            .observer()
            .warnings()
            .iter()
            .filter(|w| matches!(w, TransferWarning::CloseFailed { .. }))
            .count();
        assert_eq!(close_warnings, 1);
    }

    #[test]
    fn test_failed_recovery_close_is_logged() {
        // No handle is actually held, so the recovery close fails
        let data = pattern(20);
        let mut engine = engine(SimulatedDevice::new(64).with_failing_opens(1));

        engine.upload(&user_set_0(), &data, &mut NoProgress).unwrap();
        assert_eq!(engine.device().file("UserSet0").unwrap(), data.as_slice());
        assert!(engine.observer().events().iter().any(|e| matches!(
            e,
            TransferEvent::Log { level: LogLevel::Warn, message }
                if message.starts_with("Close before reopen failed")
        )));
    }

    #[test]
    fn test_unaligned_capacity_uses_aligned_window() {
        let data = pattern(25);
        let mut engine = engine(SimulatedDevice::new(10));

        engine.upload(&user_set_0(), &data, &mut NoProgress).unwrap();
        assert_eq!(engine.device().file("UserSet0").unwrap(), data.as_slice());
        // 8 + 8 + 8 + 1 padded to 4
        assert_eq!(engine.device().executed(FileOperation::Write), 4);
        assert!(engine.device().calls().contains(&DeviceCall::SetAccessLength(8)));

        let read = engine.download(&user_set_0(), None, &mut NoProgress).unwrap();
        assert_eq!(read, data);
    }

    #[test]
    fn test_unaligned_fixed_window_rejected() {
        let mut engine = engine(
            SimulatedDevice::new(64)
                .with_access_length(10)
                .with_read_only_access_length(),
        );
        let err = engine
            .upload(&user_set_0(), &pattern(25), &mut NoProgress)
            .unwrap_err();
        assert!(matches!(
            err,
            TransferError::WindowUnavailable {
                size: 10,
                alignment: 4
            }
        ));
        assert_eq!(engine.device().executed(FileOperation::Write), 0);
        assert!(!engine.device().has_open_handle());
    }

    #[test]
    fn test_progress_once_per_iteration() {
        let data = pattern(320);
        let mut engine = engine(SimulatedDevice::new(64).with_access_length(64));
        let mut progress = ProgressLog::new();
        engine.upload(&user_set_0(), &data, &mut progress).unwrap();
        assert_eq!(progress.reports(), &[0, 20, 40, 60, 80]);

        let mut progress = ProgressLog::new();
        engine
            .download(&user_set_0(), None, &mut progress)
            .unwrap();
        assert_eq!(progress.reports(), &[0, 20, 40, 60, 80]);
    }

    #[test]
    fn test_short_writes_trust_reported_count() {
        let data = pattern(64);
        let mut engine = engine(
            SimulatedDevice::new(32)
                .with_access_length(32)
                .with_write_limit(24),
        );
        let err = engine
            .upload(&user_set_0(), &data, &mut NoProgress)
            .unwrap_err();

        // Two iterations of 24 bytes: the second resumes at byte 24, not 32
        assert!(matches!(
            err,
            TransferError::SizeMismatch {
                expected: 64,
                actual: 48,
                ..
            }
        ));
        assert_eq!(engine.device().file("UserSet0").unwrap(), &data[..48]);
        assert_eq!(engine.observer().warnings().len(), 2);
    }

    #[test]
    fn test_expected_size_mismatch_keeps_data() {
        let data = pattern(40);
        let mut engine = engine(SimulatedDevice::new(64).with_file("UserSet0", data.clone()));
        let err = engine
            .download(&user_set_0(), Some(41), &mut NoProgress)
            .unwrap_err();
        match err {
            TransferError::SizeMismatch {
                expected,
                actual,
                data: received,
            } => {
                assert_eq!(expected, 41);
                assert_eq!(actual, 40);
                assert_eq!(received, data);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!engine.device().has_open_handle());
    }

    #[test]
    fn test_stale_offset_reset() {
        let data = pattern(50);
        let mut engine = engine(SimulatedDevice::new(64).with_access_offset(17));
        engine.upload(&user_set_0(), &data, &mut NoProgress).unwrap();
        assert_eq!(engine.device().file("UserSet0").unwrap(), data.as_slice());
    }

    #[test]
    fn test_unsupported_selector() {
        let mut engine = engine(SimulatedDevice::new(64));
        let err = engine
            .upload(&FileSelector::new("UserFile9", 9), &pattern(8), &mut NoProgress)
            .unwrap_err();
        assert!(matches!(err, TransferError::SelectorUnsupported { .. }));
        assert_eq!(engine.device().executed(FileOperation::Open), 0);
    }

    #[test]
    fn test_phases_and_completion_events() {
        let mut engine = engine(SimulatedDevice::new(64));
        engine
            .upload(&user_set_0(), &pattern(8), &mut NoProgress)
            .unwrap();

        let events = engine.observer().events();
        let phases: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                TransferEvent::PhaseChanged { to, .. } => Some(*to),
                _ => None,
            })
            .collect();
        assert_eq!(
            phases,
            vec![
                TransferPhase::Selecting,
                TransferPhase::Opening,
                TransferPhase::Negotiating,
                TransferPhase::Transferring,
                TransferPhase::Closing,
                TransferPhase::Complete,
            ]
        );
        assert!(events.contains(&TransferEvent::Complete {
            direction: TransferDirection::Upload,
            bytes: 8
        }));
    }
}
