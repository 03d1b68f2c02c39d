//! # ssegui
//!
//! This library intercepts the DirectX 11 and DirectInput 8 pipeline of
//! Skyrim Special Edition so that a GUI overlay can draw on top of the game
//! and take keyboard and mouse input away from it.
//!
//! It does not draw anything itself. It hands out the game's device, context,
//! swap chain and window, calls render listeners right before every frame is
//! presented, forwards window messages, and decides which input reaches the
//! game.
//!
//! ## How it works
//!
//! - `D3D11CreateDeviceAndSwapChain` is detoured and every device the game
//!   creates is recorded.
//! - Once the game is up, the device belonging to the game window is bound,
//!   `IDXGISwapChain::Present` is detoured and the window is subclassed.
//! - `DirectInput8Create` is detoured and the factory, keyboard and mouse are
//!   wrapped in COM proxies. The proxies zero out polled state while input is
//!   captured, and the window procedure drops the matching window messages.
//! - A toggle key (`DIK_INSERT` by default) flips capture, switching the
//!   devices between exclusive and non-exclusive mode.
//!
//! The native glue lives in [`hooks`] and only builds on Windows. Everything
//! it coordinates with is plain Rust and can be exercised anywhere.
//!
//! ## Example
//!
//! A GUI plugin registers its listeners on the process wide instance:
//!
//! ```no_run
//! use std::ffi::c_void;
//!
//! use ssegui::Ssegui;
//!
//! extern "C" fn draw(chain: *mut c_void, _sync_interval: u32, _flags: u32) {
//!     // Render the overlay into `chain`.
//! }
//!
//! extern "C" fn captured(keyboard: i32, mouse: i32) {
//!     // Show the cursor while the game does not see the mouse.
//! }
//!
//! let ssegui = Ssegui::global();
//! ssegui.render_listener(draw, false);
//! ssegui.control_listener(captured, false);
//!
//! let device = ssegui.parameter("ID3D11Device");
//! ```
//!
//! The plugin that the game loads drives the lifecycle:
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use ssegui::detour::RetourDetours;
//! use ssegui::hooks::{self, LifecycleEvent};
//!
//! ssegui::init(&ssegui::logging::default_path(), &ssegui::config::default_path())?;
//!
//! // Early, before the game creates its device.
//! hooks::handle(LifecycleEvent::DetoursReady(Arc::new(RetourDetours::new())));
//!
//! // Once the game window and input are up.
//! hooks::handle(LifecycleEvent::InputLoaded);
//! ```
#![deny(missing_docs)]

use std::ffi::c_void;
use std::fmt;
use std::path::Path;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::info;
pub use tracing;
#[cfg(windows)]
pub use windows;

pub use crate::config::Settings;
pub use crate::error::{Error, Result};
pub use crate::input::{
    CaptureCallback, CooperativeDevice, DeviceKind, Input, KeyboardCallback, MouseCallback,
    MouseState,
};
pub use crate::render::{MessageCallback, MessageFilter, Render, RenderCallback};
pub use crate::util::RawHandle;

pub mod config;
pub mod detour;
mod error;
#[cfg(windows)]
pub mod hooks;
pub mod input;
pub mod listeners;
pub mod logging;
pub mod render;
pub mod util;

/// Version of the public interface. Callers must match it exactly.
pub const API_VERSION: i32 = 1;

static SSEGUI: OnceCell<Ssegui> = OnceCell::new();

/// Version of this build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    /// Interface version, see [`API_VERSION`].
    pub api: i32,
    /// Bumped for backward compatible additions.
    pub major: i32,
    /// Informational build number.
    pub patch: i32,
    /// Informational build time, in seconds since the Unix epoch.
    pub timestamp: &'static str,
}

impl Version {
    /// The version of this build.
    pub fn current() -> Self {
        Version {
            api: API_VERSION,
            major: env!("CARGO_PKG_VERSION_MINOR").parse().unwrap_or(0),
            patch: env!("CARGO_PKG_VERSION_PATCH").parse().unwrap_or(0),
            timestamp: env!("SSEGUI_BUILD_TIMESTAMP"),
        }
    }

    /// Whether a caller built against interface `api` can use this build.
    /// Only the interface version takes part.
    pub fn is_compatible(&self, api: i32) -> bool {
        self.api == api
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{} ({})", self.api, self.major, self.patch, self.timestamp)
    }
}

/// All the state of the interception layer.
///
/// The hooks reach the process wide instance through [`Ssegui::global`].
/// Tests build their own with [`Ssegui::new`].
pub struct Ssegui {
    render: Render,
    input: Input,
    last_error: Mutex<String>,
}

impl Default for Ssegui {
    fn default() -> Self {
        Self::new()
    }
}

impl Ssegui {
    /// Fresh state: nothing recorded, nothing bound, input enabled.
    pub fn new() -> Self {
        Self { render: Render::new(), input: Input::new(), last_error: Mutex::new(String::new()) }
    }

    /// The process wide instance.
    pub fn global() -> &'static Ssegui {
        SSEGUI.get_or_init(Ssegui::new)
    }

    /// Rendering side: device history, bound target, render and message
    /// listeners.
    pub fn render(&self) -> &Render {
        &self.render
    }

    /// Input side: capture state and DirectInput devices.
    pub fn input(&self) -> &Input {
        &self.input
    }

    /// Version of this build.
    pub fn version(&self) -> Version {
        Version::current()
    }

    /// Description of the last failed install or bind, or the calling
    /// thread's OS error when there is none.
    pub fn last_error(&self) -> String {
        let last_error = self.last_error.lock().clone();

        #[cfg(windows)]
        if last_error.is_empty() {
            let os_error = windows::core::Error::from_win32();
            if os_error.code().is_err() {
                return os_error.message().to_string();
            }
        }

        last_error
    }

    #[cfg_attr(not(windows), allow(dead_code))]
    pub(crate) fn set_error(&self, error: &Error) {
        *self.last_error.lock() = error.to_string();
    }

    #[cfg_attr(not(windows), allow(dead_code))]
    pub(crate) fn clear_error(&self) {
        self.last_error.lock().clear();
    }

    /// Get or set whether the game receives keyboard and mouse input.
    ///
    /// `None` leaves a channel as it is. Returns the previous values. When a
    /// channel actually changes, the devices are switched to the matching
    /// cooperative level and capture listeners are notified.
    pub fn enable_input(&self, keyboard: Option<bool>, mouse: Option<bool>) -> (bool, bool) {
        let capture = self.input.capture();
        let old_keyboard = capture.keyboard_enabled(keyboard);
        let old_mouse = capture.mouse_enabled(mouse);

        if keyboard.is_some_and(|k| k != old_keyboard) || mouse.is_some_and(|m| m != old_mouse) {
            self.input.capture_changed();
        }

        (old_keyboard, old_mouse)
    }

    /// Get or set the capture toggle key. Values outside `0..=255` only read.
    pub fn control_key(&self, key: Option<i32>) -> u8 {
        self.input.capture().toggle_key(key)
    }

    /// Register or remove a capture changed listener.
    pub fn control_listener(&self, callback: CaptureCallback, remove: bool) -> bool {
        self.input.capture().listeners().update(callback, remove)
    }

    /// Register or remove a render frame listener.
    pub fn render_listener(&self, callback: RenderCallback, remove: bool) -> bool {
        self.render.render_listeners().update(callback, remove)
    }

    /// Register or remove a window message listener.
    pub fn message_listener(&self, callback: MessageCallback, remove: bool) -> bool {
        self.render.message_listeners().update(callback, remove)
    }

    /// Register or remove a raw keyboard state listener.
    pub fn keyboard_listener(&self, callback: KeyboardCallback, remove: bool) -> bool {
        self.input.keyboard_listeners().update(callback, remove)
    }

    /// Register or remove a raw mouse state listener.
    pub fn mouse_listener(&self, callback: MouseCallback, remove: bool) -> bool {
        self.input.mouse_listeners().update(callback, remove)
    }

    /// Look up a bound object by name: `"ID3D11Device"`,
    /// `"ID3D11DeviceContext"`, `"IDXGISwapChain"` or `"window"`.
    pub fn parameter(&self, name: &str) -> Option<RawHandle> {
        self.render.parameter(name)
    }

    /// The window messages the game must not see right now.
    pub fn message_filter(&self) -> MessageFilter {
        let capture = self.input.capture();
        MessageFilter::from_capture(capture.keyboard_enabled(None), capture.mouse_enabled(None))
    }

    /// Dispatch a message of the bound window. Returns `true` when the game
    /// must not see it.
    pub fn on_message(&self, hwnd: *mut c_void, msg: u32, wparam: usize, lparam: isize) -> bool {
        self.render.on_message(hwnd, msg, wparam, lparam, self.message_filter())
    }

    /// Apply loaded settings.
    pub fn apply_settings(&self, settings: &Settings) {
        let key = settings.toggle_key();
        let previous = self.control_key(Some(key));
        if self.control_key(None) as i32 != key {
            info!("Ignoring toggle key {key}, keeping {previous}");
        }
    }
}

/// Plugin load: open the log, report the version and apply the settings to
/// the process wide instance.
pub fn init(log_path: &Path, settings_path: &Path) -> Result<&'static Ssegui> {
    logging::setup(log_path)?;

    let ssegui = Ssegui::global();
    info!("SSEGUI {}", ssegui.version());
    ssegui.apply_settings(&Settings::load_or_default(settings_path));
    Ok(ssegui)
}
