//! Every graphics device the host created, in creation order.
//!
//! Device creation usually happens on a loader thread long before the host
//! window is ready for binding, so the records are kept until the bind phase
//! looks them up.

use parking_lot::Mutex;
use tracing::info;

use crate::util::RawHandle;

/// One `(window, device, context, swap chain)` tuple produced by a single
/// successful device creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceRecord {
    /// `OutputWindow` of the swap chain descriptor.
    pub window: RawHandle,
    /// `ID3D11Device`.
    pub device: RawHandle,
    /// Immediate `ID3D11DeviceContext`.
    pub context: RawHandle,
    /// `IDXGISwapChain`.
    pub chain: RawHandle,
}

impl DeviceRecord {
    /// Build a record, or `None` if any of the four pointers is null.
    pub fn new(
        window: Option<RawHandle>,
        device: Option<RawHandle>,
        context: Option<RawHandle>,
        chain: Option<RawHandle>,
    ) -> Option<Self> {
        Some(Self { window: window?, device: device?, context: context?, chain: chain? })
    }
}

/// Append-only list of [`DeviceRecord`]s.
///
/// Appends and lookups both take the lock, since creation and binding run on
/// different host threads.
#[derive(Default)]
pub struct DeviceHistory(Mutex<Vec<DeviceRecord>>);

impl DeviceHistory {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Log a device creation and append it if the tuple is complete.
    ///
    /// Returns whether a record was appended.
    pub fn record(
        &self,
        window: Option<RawHandle>,
        device: Option<RawHandle>,
        context: Option<RawHandle>,
        chain: Option<RawHandle>,
    ) -> bool {
        info!(
            "New device (window {window:?}, device {device:?}, context {context:?}, chain \
             {chain:?})"
        );

        match DeviceRecord::new(window, device, context, chain) {
            Some(record) => {
                self.0.lock().push(record);
                true
            },
            None => false,
        }
    }

    /// First record created for `window`.
    pub fn find(&self, window: RawHandle) -> Option<DeviceRecord> {
        self.0.lock().iter().find(|r| r.window == window).copied()
    }

    /// Number of recorded devices.
    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    /// Whether nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }

    /// Copy of all the records, oldest first.
    pub fn records(&self) -> Vec<DeviceRecord> {
        self.0.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(addr: usize) -> Option<RawHandle> {
        RawHandle::from_addr(addr)
    }

    #[test]
    fn incomplete_tuples_are_not_recorded() {
        let history = DeviceHistory::new();
        assert!(!history.record(None, h(2), h(3), h(4)));
        assert!(!history.record(h(1), None, h(3), h(4)));
        assert!(!history.record(h(1), h(2), None, h(4)));
        assert!(!history.record(h(1), h(2), h(3), None));
        assert!(history.is_empty());

        assert!(history.record(h(1), h(2), h(3), h(4)));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn find_returns_the_first_match() {
        let history = DeviceHistory::new();
        history.record(h(0x10), h(0x20), h(0x30), h(0x40));
        history.record(h(0x11), h(0x21), h(0x31), h(0x41));
        history.record(h(0x10), h(0x22), h(0x32), h(0x42));

        let record = history.find(RawHandle::from_addr(0x10).unwrap()).unwrap();
        assert_eq!(record.device.addr(), 0x20);
        assert!(history.find(RawHandle::from_addr(0x99).unwrap()).is_none());
        assert_eq!(history.records().len(), 3);
    }
}
