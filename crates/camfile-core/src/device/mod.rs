//! Device-control layer.

pub mod observable;
pub mod simulated;
pub mod traits;

pub use observable::ObservableDevice;
pub use simulated::{DeviceCall, SimulatedDevice};
pub use traits::{
    DeviceError, FileAccessDevice, FileOperation, OpenMode, OperationStatus, SelectorEntry,
    UserSetControl,
};
