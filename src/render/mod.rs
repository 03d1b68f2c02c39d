//! Swap chain and window procedure coordination.
//!
//! The native hooks in [`crate::hooks::dx11`] stay thin: they decode their
//! arguments into [`RawHandle`]s and call into [`Render`], which owns the
//! device history, the bound target and the listener registries.

use std::ffi::c_void;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::{info, trace};

pub use self::history::{DeviceHistory, DeviceRecord};
pub use self::msg_filter::MessageFilter;
use crate::error::{Error, Result};
use crate::listeners::Listeners;
use crate::util::{self, RawHandle};

pub mod history;
pub mod msg_filter;

/// Invoked before every frame is presented, with the swap chain, the sync
/// interval and the present flags.
pub type RenderCallback = extern "C" fn(chain: *mut c_void, sync_interval: u32, flags: u32);

/// Invoked for every message the host window receives, before filtering.
/// The return value is ignored.
pub type MessageCallback =
    extern "C" fn(hwnd: *mut c_void, msg: u32, wparam: usize, lparam: isize) -> isize;

/// Title of the host's top level window.
pub const HOST_WINDOW_TITLE: &str = "Skyrim Special Edition";

/// Name of the `ID3D11Device` parameter.
pub const PARAM_DEVICE: &str = "ID3D11Device";
/// Name of the immediate `ID3D11DeviceContext` parameter.
pub const PARAM_CONTEXT: &str = "ID3D11DeviceContext";
/// Name of the `IDXGISwapChain` parameter.
pub const PARAM_CHAIN: &str = "IDXGISwapChain";
/// Name of the `HWND` parameter.
pub const PARAM_WINDOW: &str = "window";

/// Rendering side of the interception layer.
pub struct Render {
    history: DeviceHistory,
    target: Mutex<Option<DeviceRecord>>,
    render_listeners: Listeners<RenderCallback>,
    message_listeners: Listeners<MessageCallback>,
    rendering: AtomicBool,
    messaging: AtomicBool,
}

impl Default for Render {
    fn default() -> Self {
        Self::new()
    }
}

impl Render {
    /// Empty state: no devices, nothing bound, dispatch disabled.
    pub fn new() -> Self {
        Self {
            history: DeviceHistory::new(),
            target: Mutex::new(None),
            render_listeners: Listeners::new("render"),
            message_listeners: Listeners::new("message"),
            rendering: AtomicBool::new(false),
            messaging: AtomicBool::new(false),
        }
    }

    /// Every device the host created so far.
    pub fn history(&self) -> &DeviceHistory {
        &self.history
    }

    /// The record adopted by the last successful [`Render::bind`].
    pub fn target(&self) -> Option<DeviceRecord> {
        *self.target.lock()
    }

    /// Render frame listeners.
    pub fn render_listeners(&self) -> &Listeners<RenderCallback> {
        &self.render_listeners
    }

    /// Window message listeners.
    pub fn message_listeners(&self) -> &Listeners<MessageCallback> {
        &self.message_listeners
    }

    /// Get or set whether render listeners are dispatched. Returns the
    /// previous value.
    pub fn enable_rendering(&self, enable: Option<bool>) -> bool {
        util::exchange(&self.rendering, enable)
    }

    /// Get or set whether message listeners are dispatched. Returns the
    /// previous value.
    pub fn enable_messaging(&self, enable: Option<bool>) -> bool {
        util::exchange(&self.messaging, enable)
    }

    /// Called after the host successfully created a device and swap chain.
    pub fn on_device_created(
        &self,
        window: Option<RawHandle>,
        device: Option<RawHandle>,
        context: Option<RawHandle>,
        chain: Option<RawHandle>,
    ) -> bool {
        self.history.record(window, device, context, chain)
    }

    /// Adopt the device created for the host window.
    ///
    /// `top_window` is the visible, unowned top level window of the process
    /// and `named_window` the one carrying [`HOST_WINDOW_TITLE`]. Both must
    /// resolve to the same window, and that window must have a complete
    /// record in the history.
    pub fn bind(
        &self,
        top_window: Option<RawHandle>,
        named_window: Option<RawHandle>,
    ) -> Result<DeviceRecord> {
        info!("Top window: {top_window:?} Named window: {named_window:?}");

        let record = match (top_window, named_window) {
            (Some(top), Some(named)) if top == named => self.history.find(top),
            _ => None,
        }
        .ok_or(Error::HostNotFound)?;

        *self.target.lock() = Some(record);
        info!("Bound to {record:?}");
        Ok(record)
    }

    /// Forget the bound target and stop dispatching.
    pub fn unbind(&self) -> Option<DeviceRecord> {
        self.rendering.store(false, Ordering::SeqCst);
        self.messaging.store(false, Ordering::SeqCst);
        self.target.lock().take()
    }

    /// Dispatch a frame to the render listeners, if rendering is enabled.
    pub fn on_present(&self, chain: *mut c_void, sync_interval: u32, flags: u32) {
        if !self.enable_rendering(None) {
            return;
        }
        for listener in self.render_listeners.snapshot() {
            listener(chain, sync_interval, flags);
        }
    }

    /// Dispatch a window message to the message listeners, if messaging is
    /// enabled, and tell whether the host must not see it.
    pub fn on_message(
        &self,
        hwnd: *mut c_void,
        msg: u32,
        wparam: usize,
        lparam: isize,
        filter: MessageFilter,
    ) -> bool {
        if self.enable_messaging(None) {
            for listener in self.message_listeners.snapshot() {
                listener(hwnd, msg, wparam, lparam);
            }
        }

        let blocked = filter.is_blocking(msg);
        if blocked {
            trace!("Blocked message {msg:#06x}");
        }
        blocked
    }

    /// Look up one of the bound objects by name.
    pub fn parameter(&self, name: &str) -> Option<RawHandle> {
        let target = self.target()?;
        match name {
            PARAM_DEVICE => Some(target.device),
            PARAM_CONTEXT => Some(target.context),
            PARAM_CHAIN => Some(target.chain),
            PARAM_WINDOW => Some(target.window),
            _ => None,
        }
    }
}
