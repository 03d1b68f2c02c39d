//! Native hooks and their lifecycle.
//!
//! Installation happens in two phases, driven by the plugin that the game
//! loads:
//!
//! 1. [`LifecycleEvent::DetoursReady`]: the device creation and DirectInput
//!    factory functions are detoured. This must happen before the game
//!    creates its device.
//! 2. [`LifecycleEvent::InputLoaded`]: the game window is up. Its device is
//!    bound, `Present` is detoured, the window is subclassed, and dispatch to
//!    listeners starts.
//!
//! Failures are logged and stored as the last error. A failing subsystem
//! stays inert without taking the other one down.

use std::ffi::c_void;
use std::mem;
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{error, info};

use crate::detour::Detours;
use crate::error::{Error, Result};
use crate::Ssegui;

pub mod dinput8;
pub mod dx11;

static DETOURS: Mutex<Option<Arc<dyn Detours>>> = parking_lot::const_mutex(None);

/// Lifecycle notifications forwarded by the plugin.
pub enum LifecycleEvent {
    /// The detouring service is available.
    DetoursReady(Arc<dyn Detours>),
    /// The game created its window and input devices.
    InputLoaded,
}

/// Run the lifecycle phase matching `event`. Returns whether it succeeded;
/// [`Ssegui::last_error`] tells why it did not.
pub fn handle(event: LifecycleEvent) -> bool {
    match event {
        LifecycleEvent::DetoursReady(detours) => {
            info!("Detours ready, installing hooks...");
            install(detours).is_ok()
        },
        LifecycleEvent::InputLoaded => {
            info!("Input loaded, setting up window...");
            bind().is_ok()
        },
    }
}

fn report(ssegui: &Ssegui, context: &str, result: Result<()>) -> Result<()> {
    if let Err(e) = &result {
        error!("{context}: {e}");
        ssegui.set_error(e);
    }
    result
}

/// Install phase: detour device creation and the DirectInput factory.
///
/// Both are attempted even if the first one fails.
pub fn install(detours: Arc<dyn Detours>) -> Result<()> {
    let ssegui = Ssegui::global();
    ssegui.clear_error();
    *DETOURS.lock() = Some(Arc::clone(&detours));

    let dx11 = report(ssegui, "Unable to detour DirectX", unsafe { dx11::install(&*detours) });
    let dinput8 =
        report(ssegui, "Unable to detour DirectInput", unsafe { dinput8::install(&*detours) });

    dx11.and(dinput8)
}

/// Bind phase: adopt the game's device, hook `Present`, subclass the window
/// and enable dispatch.
///
/// Binding can be retried if the game was not ready yet.
pub fn bind() -> Result<()> {
    let ssegui = Ssegui::global();
    ssegui.clear_error();

    let detours = DETOURS.lock().clone();
    let result = match detours {
        Some(detours) => unsafe { dx11::bind(ssegui, &*detours) },
        None => Err(Error::NotInstalled),
    };
    report(ssegui, "Unable to setup window", result)?;

    ssegui.render().enable_rendering(Some(true));
    ssegui.render().enable_messaging(Some(true));
    info!("SSEGUI enabled.");
    Ok(())
}

/// Undo everything: restore the window procedure, then every detour.
pub fn uninstall() -> Result<()> {
    let ssegui = Ssegui::global();
    ssegui.clear_error();

    let Some(detours) = DETOURS.lock().take() else {
        return Ok(());
    };

    let dx11 = report(ssegui, "Unable to unhook DirectX", unsafe { dx11::unbind(ssegui, &*detours) });
    let dinput8 =
        report(ssegui, "Unable to unhook DirectInput", unsafe { dinput8::uninstall(&*detours) });

    info!("SSEGUI disabled.");
    dx11.and(dinput8)
}

/// Undo the detour registered under `name` if `slot` says it is installed.
pub(crate) fn restore(detours: &dyn Detours, name: &str, slot: &AtomicPtr<c_void>) -> Result<()> {
    if slot.load(Ordering::SeqCst).is_null() {
        return Ok(());
    }
    let result = detours.restore(name);
    slot.store(std::ptr::null_mut(), Ordering::SeqCst);
    result
}

/// Load the trampoline published by a detour into a typed function pointer.
///
/// # Safety
///
/// `F` must be a function pointer type matching the detoured function.
pub(crate) unsafe fn original<F: Copy>(slot: &AtomicPtr<c_void>) -> Option<F> {
    debug_assert_eq!(mem::size_of::<F>(), mem::size_of::<*mut c_void>());
    let ptr = slot.load(Ordering::SeqCst);
    if ptr.is_null() {
        None
    } else {
        Some(mem::transmute_copy(&ptr))
    }
}
