//! DirectInput interception logic.
//!
//! The COM proxies in [`crate::hooks::dinput8`] forward every call to the
//! real device and report the interesting ones here: cooperative level and
//! data format bookkeeping, state filtering, and the exclusive mode switch
//! that follows every capture change.
//!
//! Devices are reached through the [`CooperativeDevice`] trait so that the
//! switch sequence can run against test doubles.

use std::ffi::c_void;
use std::fmt;
use std::mem;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

pub use self::capture::{CaptureCallback, CaptureState, DEFAULT_TOGGLE_KEY};
use crate::listeners::Listeners;
use crate::util::RawHandle;

pub mod capture;

/// `DISCL_EXCLUSIVE`.
pub const DISCL_EXCLUSIVE: u32 = 0x01;
/// `DISCL_NONEXCLUSIVE`.
pub const DISCL_NONEXCLUSIVE: u32 = 0x02;
/// `DISCL_FOREGROUND`.
pub const DISCL_FOREGROUND: u32 = 0x04;
/// `DISCL_BACKGROUND`.
pub const DISCL_BACKGROUND: u32 = 0x08;
/// `DISCL_NOWINKEY`.
pub const DISCL_NOWINKEY: u32 = 0x10;

/// `GUID_SysKeyboard`.
pub const GUID_SYS_KEYBOARD: u128 = 0x6f1d2b61_d5a0_11cf_bfc7_444553540000;
/// `GUID_SysMouse`.
pub const GUID_SYS_MOUSE: u128 = 0x6f1d2b60_d5a0_11cf_bfc7_444553540000;

/// Size of a keyboard state buffer.
pub const KEYBOARD_STATE_LEN: usize = 256;

/// Size of `DIMOUSESTATE2`.
pub const MOUSE_STATE_LEN: usize = mem::size_of::<MouseState>();

/// Receives the raw keyboard state of every poll, before suppression.
pub type KeyboardCallback = extern "C" fn(keys: *const u8, len: usize);

/// Receives the raw mouse state of every poll, before suppression.
pub type MouseCallback = extern "C" fn(state: *const MouseState);

/// Result code of a native DirectInput call.
pub type NativeResult = std::result::Result<(), i32>;

/// The two intercepted device classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    /// `GUID_SysKeyboard`.
    Keyboard,
    /// `GUID_SysMouse`.
    Mouse,
}

impl DeviceKind {
    /// Match a device class identifier.
    pub fn from_class(guid: u128) -> Option<Self> {
        match guid {
            GUID_SYS_KEYBOARD => Some(DeviceKind::Keyboard),
            GUID_SYS_MOUSE => Some(DeviceKind::Mouse),
            _ => None,
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DeviceKind::Keyboard => "keyboard",
            DeviceKind::Mouse => "mouse",
        })
    }
}

/// The subset of `IDirectInputDevice8` used by the exclusive mode switch.
pub trait CooperativeDevice: Send + Sync {
    /// `Unacquire`.
    fn unacquire(&self) -> NativeResult;
    /// `SetCooperativeLevel`.
    fn set_cooperative_level(&self, window: Option<RawHandle>, flags: u32) -> NativeResult;
    /// `SetDataFormat`.
    fn set_data_format(&self, format: Option<RawHandle>) -> NativeResult;
    /// `Acquire`.
    fn acquire(&self) -> NativeResult;
}

/// Mouse state handed to [`MouseCallback`]s.
///
/// Layout compatible with `DIMOUSESTATE2`. A `DIMOUSESTATE` poll fills the
/// first four buttons.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MouseState {
    /// Horizontal axis.
    pub x: i32,
    /// Vertical axis.
    pub y: i32,
    /// Wheel.
    pub z: i32,
    /// Button states, pressed when the high bit is set.
    pub buttons: [u8; 8],
}

impl MouseState {
    /// Decode a `DIMOUSESTATE` or `DIMOUSESTATE2` buffer.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let axis = |i: usize| -> Option<i32> {
            let raw = bytes.get(i * 4..i * 4 + 4)?;
            Some(i32::from_ne_bytes(raw.try_into().ok()?))
        };

        let buttons = bytes.get(12..)?;
        if buttons.len() < 4 {
            return None;
        }

        let mut state = MouseState { x: axis(0)?, y: axis(1)?, z: axis(2)?, buttons: [0; 8] };
        let n = buttons.len().min(state.buttons.len());
        state.buttons[..n].copy_from_slice(&buttons[..n]);
        Some(state)
    }
}

/// Rewrite the exclusivity bits of a cooperative level, keeping the others.
pub fn exclusive_flags(flags: u32, exclusive: bool) -> u32 {
    let flags = flags & !(DISCL_EXCLUSIVE | DISCL_NONEXCLUSIVE);
    flags | if exclusive { DISCL_EXCLUSIVE } else { DISCL_NONEXCLUSIVE }
}

#[derive(Default)]
struct DeviceSlot {
    device: Option<Arc<dyn CooperativeDevice>>,
    flags: u32,
    format: Option<RawHandle>,
}

/// Input side of the interception layer.
///
/// Every slot has its own lock. Locks are never held across a call into a
/// device or a listener, since both may re-enter the proxies.
pub struct Input {
    capture: CaptureState,
    window: Mutex<Option<RawHandle>>,
    keyboard: Mutex<DeviceSlot>,
    mouse: Mutex<DeviceSlot>,
    keyboard_listeners: Listeners<KeyboardCallback>,
    mouse_listeners: Listeners<MouseCallback>,
}

impl Default for Input {
    fn default() -> Self {
        Self::new()
    }
}

impl Input {
    /// No devices, both channels enabled.
    pub fn new() -> Self {
        Self {
            capture: CaptureState::new(),
            window: Mutex::new(None),
            keyboard: Mutex::new(DeviceSlot::default()),
            mouse: Mutex::new(DeviceSlot::default()),
            keyboard_listeners: Listeners::new("keyboard"),
            mouse_listeners: Listeners::new("mouse"),
        }
    }

    /// Capture flags, toggle key and capture listeners.
    pub fn capture(&self) -> &CaptureState {
        &self.capture
    }

    /// Raw keyboard state listeners.
    pub fn keyboard_listeners(&self) -> &Listeners<KeyboardCallback> {
        &self.keyboard_listeners
    }

    /// Raw mouse state listeners.
    pub fn mouse_listeners(&self) -> &Listeners<MouseCallback> {
        &self.mouse_listeners
    }

    /// Window of the last successful `SetCooperativeLevel`.
    pub fn window(&self) -> Option<RawHandle> {
        *self.window.lock()
    }

    fn slot(&self, kind: DeviceKind) -> &Mutex<DeviceSlot> {
        match kind {
            DeviceKind::Keyboard => &self.keyboard,
            DeviceKind::Mouse => &self.mouse,
        }
    }

    /// Whether the host currently receives input from `kind`.
    pub fn enabled(&self, kind: DeviceKind) -> bool {
        match kind {
            DeviceKind::Keyboard => self.capture.keyboard_enabled(None),
            DeviceKind::Mouse => self.capture.mouse_enabled(None),
        }
    }

    /// Track a freshly created device. A later device of the same kind
    /// replaces the earlier one.
    pub fn attach(&self, kind: DeviceKind, device: Arc<dyn CooperativeDevice>) {
        let mut slot = self.slot(kind).lock();
        if slot.device.replace(device).is_some() {
            info!("Replaced {kind} device");
        } else {
            info!("Created {kind} device");
        }
    }

    /// Stop tracking `device`, if it is still the current one of its kind.
    pub fn detach(&self, kind: DeviceKind, device: &Arc<dyn CooperativeDevice>) -> bool {
        let mut slot = self.slot(kind).lock();
        let same = slot
            .device
            .as_ref()
            .is_some_and(|d| Arc::as_ptr(d) as *const () == Arc::as_ptr(device) as *const ());
        if same {
            slot.device = None;
            info!("Released {kind} device");
        }
        same
    }

    /// Whether a device of `kind` is tracked.
    pub fn is_attached(&self, kind: DeviceKind) -> bool {
        self.slot(kind).lock().device.is_some()
    }

    /// Last recorded cooperative level of `kind`.
    pub fn cooperative_flags(&self, kind: DeviceKind) -> u32 {
        self.slot(kind).lock().flags
    }

    /// Last recorded data format of `kind`.
    pub fn data_format(&self, kind: DeviceKind) -> Option<RawHandle> {
        self.slot(kind).lock().format
    }

    /// Record a successful `SetCooperativeLevel`.
    pub fn on_set_cooperative_level(
        &self,
        kind: DeviceKind,
        window: Option<RawHandle>,
        flags: u32,
    ) {
        debug!("{kind}: cooperative level {flags:#x} on {window:?}");
        *self.window.lock() = window;
        self.slot(kind).lock().flags = flags;
    }

    /// Record the data format passed to `SetDataFormat`.
    pub fn on_set_data_format(&self, kind: DeviceKind, format: Option<RawHandle>) {
        self.slot(kind).lock().format = format;
    }

    /// Handle a successful keyboard `GetDeviceState`.
    ///
    /// Listeners see the untouched state, the toggle key is sampled, and the
    /// buffer is zeroed if the keyboard is captured. Returns whether the
    /// toggle key changed the capture state.
    pub fn filter_keyboard_state(&self, keys: &mut [u8]) -> bool {
        for listener in self.keyboard_listeners.snapshot() {
            listener(keys.as_ptr(), keys.len());
        }

        let toggled = self.capture.observe_keys(keys);
        if toggled {
            self.capture_changed();
        }

        if !self.enabled(DeviceKind::Keyboard) {
            keys.fill(0);
        }
        toggled
    }

    /// Handle a successful mouse `GetDeviceState`.
    pub fn filter_mouse_state(&self, state: &mut [u8]) {
        if let Some(decoded) = MouseState::from_bytes(state) {
            for listener in self.mouse_listeners.snapshot() {
                listener(&decoded);
            }
        }

        if !self.enabled(DeviceKind::Mouse) {
            state.fill(0);
        }
    }

    /// Whether buffered reads of `kind` must report no data.
    pub fn suppress_buffered(&self, kind: DeviceKind) -> bool {
        !self.enabled(kind)
    }

    /// Put each device in exclusive or non-exclusive mode.
    ///
    /// DirectInput only accepts a new cooperative level on an unacquired
    /// device, so every device goes through unacquire, cooperative level,
    /// data format and acquire. Devices not created yet are skipped.
    pub fn set_exclusive(&self, keyboard: bool, mouse: bool) {
        let window = self.window();
        self.switch(DeviceKind::Keyboard, keyboard, window);
        self.switch(DeviceKind::Mouse, mouse, window);
    }

    fn switch(&self, kind: DeviceKind, exclusive: bool, window: Option<RawHandle>) {
        let (device, flags, format) = {
            let slot = self.slot(kind).lock();
            let Some(device) = slot.device.clone() else {
                warn!("No {kind} device to switch");
                return;
            };
            (device, exclusive_flags(slot.flags, exclusive), slot.format)
        };

        let report = |step: &str, result: NativeResult| {
            if let Err(code) = result {
                warn!("{kind}: {step} failed ({code:#010x})");
            }
        };

        report("Unacquire", device.unacquire());
        let level = device.set_cooperative_level(window, flags);
        if level.is_ok() {
            self.slot(kind).lock().flags = flags;
        }
        report("SetCooperativeLevel", level);
        report("SetDataFormat", device.set_data_format(format));
        report("Acquire", device.acquire());

        debug!(
            "{kind} is now {} (flags {flags:#x})",
            if exclusive { "exclusive" } else { "non-exclusive" }
        );
    }

    /// Apply the capture flags to the devices and notify capture listeners.
    pub fn capture_changed(&self) {
        let keyboard = self.capture.keyboard_enabled(None);
        let mouse = self.capture.mouse_enabled(None);
        self.set_exclusive(keyboard, mouse);
        self.capture.notify();
    }
}

/// Reinterpret a native state buffer.
///
/// # Safety
///
/// `data` must be valid for writes of `len` bytes for the lifetime of the
/// returned slice.
pub unsafe fn state_buffer<'a>(data: *mut c_void, len: usize) -> Option<&'a mut [u8]> {
    if data.is_null() || len == 0 {
        return None;
    }
    Some(std::slice::from_raw_parts_mut(data as *mut u8, len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclusivity_bits_are_rewritten() {
        let flags = DISCL_FOREGROUND | DISCL_NOWINKEY | DISCL_NONEXCLUSIVE;
        assert_eq!(
            exclusive_flags(flags, true),
            DISCL_FOREGROUND | DISCL_NOWINKEY | DISCL_EXCLUSIVE
        );
        assert_eq!(exclusive_flags(flags, false), flags);
        assert_eq!(exclusive_flags(DISCL_EXCLUSIVE | DISCL_NONEXCLUSIVE, false), DISCL_NONEXCLUSIVE);
        assert_eq!(exclusive_flags(DISCL_BACKGROUND, true), DISCL_BACKGROUND | DISCL_EXCLUSIVE);
    }

    #[test]
    fn device_classes() {
        assert_eq!(DeviceKind::from_class(GUID_SYS_KEYBOARD), Some(DeviceKind::Keyboard));
        assert_eq!(DeviceKind::from_class(GUID_SYS_MOUSE), Some(DeviceKind::Mouse));
        assert_eq!(DeviceKind::from_class(0), None);
    }

    #[test]
    fn decodes_both_mouse_layouts() {
        let mut raw = Vec::new();
        for axis in [5i32, -3, 120] {
            raw.extend_from_slice(&axis.to_ne_bytes());
        }
        raw.extend_from_slice(&[0x80, 0, 0, 0x80]);

        let state = MouseState::from_bytes(&raw).unwrap();
        assert_eq!((state.x, state.y, state.z), (5, -3, 120));
        assert_eq!(state.buttons, [0x80, 0, 0, 0x80, 0, 0, 0, 0]);

        raw.extend_from_slice(&[0, 0x80, 0, 0]);
        assert_eq!(raw.len(), MOUSE_STATE_LEN);
        let state = MouseState::from_bytes(&raw).unwrap();
        assert_eq!(state.buttons[5], 0x80);

        assert!(MouseState::from_bytes(&raw[..12]).is_none());
    }

    #[test]
    fn mouse_state_is_zeroed_while_captured() {
        let input = Input::new();
        let mut raw = [1u8; MOUSE_STATE_LEN];

        input.filter_mouse_state(&mut raw);
        assert_eq!(raw, [1u8; MOUSE_STATE_LEN]);

        input.capture().mouse_enabled(Some(false));
        input.filter_mouse_state(&mut raw);
        assert_eq!(raw, [0u8; MOUSE_STATE_LEN]);
        assert!(input.suppress_buffered(DeviceKind::Mouse));
        assert!(!input.suppress_buffered(DeviceKind::Keyboard));
    }
}
