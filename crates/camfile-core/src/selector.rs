//! File slot selection.

use std::fmt;

use crate::device::{FileAccessDevice, SelectorEntry};
use crate::error::TransferError;

/// Default slot holding the first saved user set.
pub const USER_SET_0: &str = "UserSet0";

/// A resolved file slot on the device.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileSelector {
    name: String,
    id: i64,
}

impl FileSelector {
    pub fn new(name: impl Into<String>, id: i64) -> Self {
        Self {
            name: name.into(),
            id,
        }
    }

    /// Resolve a symbolic slot name against the device's selector entries.
    pub fn resolve<D: FileAccessDevice + ?Sized>(
        device: &D,
        name: &str,
    ) -> Result<Self, TransferError> {
        let entries = device.file_selector_entries()?;
        let entry = Self::lookup(&entries, name, None)?;
        Ok(Self::new(entry.name.clone(), entry.id))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    /// Find the entry for `name` (and `id`, when given) and check it is readable.
    pub(crate) fn lookup<'a>(
        entries: &'a [SelectorEntry],
        name: &str,
        id: Option<i64>,
    ) -> Result<&'a SelectorEntry, TransferError> {
        let entry = entries
            .iter()
            .find(|e| e.name == name && id.is_none_or(|id| e.id == id))
            .ok_or_else(|| TransferError::SelectorUnsupported {
                name: name.to_string(),
            })?;

        if !entry.readable {
            return Err(TransferError::SelectorNotReadable {
                name: name.to_string(),
            });
        }
        Ok(entry)
    }
}

impl fmt::Display for FileSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::SimulatedDevice;

    #[test]
    fn test_resolve_known_slot() {
        let device = SimulatedDevice::default();
        let selector = FileSelector::resolve(&device, USER_SET_0).unwrap();
        assert_eq!(selector.name(), "UserSet0");
        assert_eq!(selector.id(), 0);
    }

    #[test]
    fn test_resolve_unknown_slot() {
        let device = SimulatedDevice::default();
        let err = FileSelector::resolve(&device, "UserFile9").unwrap_err();
        assert!(matches!(err, TransferError::SelectorUnsupported { name } if name == "UserFile9"));
    }

    #[test]
    fn test_resolve_unreadable_slot() {
        let device = SimulatedDevice::default().with_slot("UserFile1", 7, false);
        let err = FileSelector::resolve(&device, "UserFile1").unwrap_err();
        assert!(matches!(err, TransferError::SelectorNotReadable { .. }));
    }
}
