//! Keyboard and mouse capture flags and the toggle hot-key.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use tracing::info;

use crate::listeners::Listeners;
use crate::util;

/// `DIK_INSERT`.
pub const DEFAULT_TOGGLE_KEY: u8 = 210;

/// Notified with `(keyboard_enabled, mouse_enabled)` after capture changed.
pub type CaptureCallback = extern "C" fn(keyboard_enabled: i32, mouse_enabled: i32);

/// Whether the host receives keyboard and mouse input.
///
/// Both channels start enabled. The flags are atomics because the public
/// setters may be called from any thread while the host polls input on its
/// own.
pub struct CaptureState {
    keyboard_disabled: AtomicBool,
    mouse_disabled: AtomicBool,
    key_was_down: AtomicBool,
    toggle_key: AtomicU8,
    listeners: Listeners<CaptureCallback>,
}

impl Default for CaptureState {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureState {
    /// Both channels enabled, toggle key [`DEFAULT_TOGGLE_KEY`].
    pub fn new() -> Self {
        Self {
            keyboard_disabled: AtomicBool::new(false),
            mouse_disabled: AtomicBool::new(false),
            key_was_down: AtomicBool::new(false),
            toggle_key: AtomicU8::new(DEFAULT_TOGGLE_KEY),
            listeners: Listeners::new("capture"),
        }
    }

    /// Get or set whether the host receives keyboard input. Returns the
    /// previous value.
    pub fn keyboard_enabled(&self, enable: Option<bool>) -> bool {
        !util::exchange(&self.keyboard_disabled, enable.map(|e| !e))
    }

    /// Get or set whether the host receives mouse input. Returns the previous
    /// value.
    pub fn mouse_enabled(&self, enable: Option<bool>) -> bool {
        !util::exchange(&self.mouse_disabled, enable.map(|e| !e))
    }

    /// Get or set the DirectInput scan code that toggles capture.
    ///
    /// Values outside `0..=255` leave the key untouched. The previous key is
    /// returned, which is the current one when nothing was stored.
    pub fn toggle_key(&self, key: Option<i32>) -> u8 {
        match key.and_then(|k| u8::try_from(k).ok()) {
            Some(key) => {
                let previous = self.toggle_key.swap(key, Ordering::SeqCst);
                if previous != key {
                    self.key_was_down.store(false, Ordering::SeqCst);
                    info!("Toggle key set to {key}");
                }
                previous
            },
            None => self.toggle_key.load(Ordering::SeqCst),
        }
    }

    /// Capture changed listeners.
    pub fn listeners(&self) -> &Listeners<CaptureCallback> {
        &self.listeners
    }

    /// Feed one keyboard poll, in the 256 byte `DIK_*` layout.
    ///
    /// A release following a press of the toggle key flips both channels and
    /// returns `true`. Holding the key does not retrigger.
    pub fn observe_keys(&self, keys: &[u8]) -> bool {
        let key = self.toggle_key.load(Ordering::SeqCst) as usize;
        let Some(state) = keys.get(key) else {
            return false;
        };

        let down = state & 0x80 != 0;
        if !self.key_was_down.swap(down, Ordering::SeqCst) || down {
            return false;
        }

        // The old disabled flag is the new enabled flag.
        let keyboard = self.keyboard_disabled.fetch_xor(true, Ordering::SeqCst);
        let mouse = self.mouse_disabled.fetch_xor(true, Ordering::SeqCst);
        info!("Toggle key released (keyboard enabled: {keyboard}, mouse enabled: {mouse})");
        true
    }

    /// Notify every capture listener with the current flags.
    pub fn notify(&self) {
        let keyboard = self.keyboard_enabled(None) as i32;
        let mouse = self.mouse_enabled(None) as i32;
        for listener in self.listeners.snapshot() {
            listener(keyboard, mouse);
        }
    }
}
