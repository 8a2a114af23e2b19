//! camfile-core: chunked file access transfers for camera settings files.
//!
//! Cameras expose stored files (such as saved user sets) through a small
//! register window: a buffer register of fixed capacity, an access offset and
//! length, and an operation register that opens, reads, writes, deletes and
//! closes the selected file. This crate moves whole files through that window.
//!
//! # Architecture
//!
//! - **Device**: the register-level contract (`FileAccessDevice`), a simulated
//!   camera and an event-emitting wrapper
//! - **Selector / Handle**: slot resolution and single-handle open/close state
//! - **Window / Plan**: access window negotiation and chunk planning
//! - **Engine**: the upload/download loop with stale-handle recovery
//! - **Events / Progress**: observer pattern and per-iteration progress
//! - **Session**: the user set save/download and upload/load workflow
//!
//! # Example
//!
//! ```no_run
//! use camfile_core::{ChunkedTransferEngine, NoProgress, SimulatedDevice};
//!
//! let mut engine = ChunkedTransferEngine::new(SimulatedDevice::default());
//! let selector = engine.resolve("UserSet0").expect("slot");
//! engine
//!     .upload(&selector, b"ExposureTime=2000", &mut NoProgress)
//!     .expect("upload failed");
//! let data = engine
//!     .download(&selector, None, &mut NoProgress)
//!     .expect("download failed");
//! assert_eq!(data, b"ExposureTime=2000");
//! ```

pub mod config;
pub mod device;
pub mod engine;
pub mod error;
pub mod events;
pub mod handle;
pub mod plan;
pub mod progress;
pub mod selector;
pub mod session;
pub mod window;

// Re-exports for convenience
pub use config::TransferConfig;
pub use device::{
    DeviceError, FileAccessDevice, FileOperation, ObservableDevice, OpenMode, OperationStatus,
    SimulatedDevice, UserSetControl,
};
pub use engine::ChunkedTransferEngine;
pub use error::TransferError;
pub use events::{
    EventLog, LogLevel, NullObserver, TracingObserver, TransferDirection, TransferEvent,
    TransferObserver, TransferPhase, TransferWarning,
};
pub use handle::{FileHandleState, RemoteFileHandle};
pub use plan::{ChunkPlanner, TransferPlan};
pub use progress::{ChunkResult, NoProgress, ProgressLog, ProgressSink, TransferProgress};
pub use selector::FileSelector;
pub use session::UserSetSession;
pub use window::TransferWindow;
