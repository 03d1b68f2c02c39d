//! Installation of function detours.
//!
//! The hooks only need three things from a detour provider: redirect an
//! exported symbol, redirect a raw address, and undo either. [`Detours`] is
//! that seam. [`RetourDetours`] implements it in-process with
//! [`retour`](https://docs.rs/retour); a host that ships its own detouring
//! service can implement the trait on top of it instead.

use std::ffi::c_void;
use std::sync::atomic::AtomicPtr;

use crate::error::{Error, Result};

/// A detouring service.
pub trait Detours: Send + Sync {
    /// Redirect the export named by `target`, in `Symbol@module.dll` form, to
    /// `replacement`.
    ///
    /// The entry point that reaches the original code is stored into
    /// `original` before the detour becomes active, so the replacement can
    /// always forward.
    fn detour(
        &self,
        target: &str,
        replacement: *const c_void,
        original: &AtomicPtr<c_void>,
    ) -> Result<()>;

    /// Redirect the function at `address`, registering it under `name`.
    fn detour_address(
        &self,
        name: &str,
        address: *const c_void,
        replacement: *const c_void,
        original: &AtomicPtr<c_void>,
    ) -> Result<()>;

    /// Undo the detour registered under `name` (a `Symbol@module.dll` target
    /// or a name given to [`Detours::detour_address`]).
    fn restore(&self, name: &str) -> Result<()>;
}

/// Split `Symbol@module.dll` into its symbol and module.
pub fn split_target(target: &str) -> Result<(&str, &str)> {
    match target.split_once('@') {
        Some((symbol, module)) if !symbol.is_empty() && !module.is_empty() => {
            Ok((symbol, module))
        },
        _ => Err(Error::detour(target, "expected Symbol@module.dll")),
    }
}

#[cfg(windows)]
pub use self::retour_impl::RetourDetours;

#[cfg(windows)]
mod retour_impl {
    use std::collections::HashMap;
    use std::ffi::{c_void, CString};
    use std::sync::atomic::{AtomicPtr, Ordering};

    use parking_lot::Mutex;
    use retour::RawDetour;
    use tracing::{debug, info};
    use windows::core::{HSTRING, PCSTR};
    use windows::Win32::System::LibraryLoader::{GetModuleHandleW, GetProcAddress, LoadLibraryW};

    use super::{split_target, Detours};
    use crate::error::{Error, Result};

    struct Installed(RawDetour);

    // Detours are only touched under the map lock.
    unsafe impl Send for Installed {}
    unsafe impl Sync for Installed {}

    /// [`Detours`] backed by [`retour::RawDetour`].
    #[derive(Default)]
    pub struct RetourDetours {
        installed: Mutex<HashMap<String, Installed>>,
    }

    impl RetourDetours {
        /// Create a provider with no detours installed.
        pub fn new() -> Self {
            Self::default()
        }

        fn resolve(target: &str) -> Result<*const c_void> {
            let (symbol, module) = split_target(target)?;

            let module_name = HSTRING::from(module);
            let hmodule = unsafe { GetModuleHandleW(&module_name) }
                .or_else(|_| unsafe { LoadLibraryW(&module_name) })
                .map_err(|e| Error::detour(target, e))?;

            let symbol = CString::new(symbol).map_err(|e| Error::detour(target, e))?;
            let address = unsafe { GetProcAddress(hmodule, PCSTR(symbol.as_ptr().cast())) }
                .ok_or_else(|| Error::detour(target, "symbol not found"))?;

            Ok(address as *const c_void)
        }

        fn install(
            &self,
            name: &str,
            address: *const c_void,
            replacement: *const c_void,
            original: &AtomicPtr<c_void>,
        ) -> Result<()> {
            let mut installed = self.installed.lock();
            if installed.contains_key(name) {
                return Err(Error::detour(name, "already detoured"));
            }

            let detour = unsafe { RawDetour::new(address as *const (), replacement as *const ()) }
                .map_err(|e| Error::detour(name, e))?;

            original.store(detour.trampoline() as *const () as *mut c_void, Ordering::SeqCst);

            if let Err(e) = unsafe { detour.enable() } {
                original.store(std::ptr::null_mut(), Ordering::SeqCst);
                return Err(Error::detour(name, e));
            }

            info!("Detoured {name} at {address:p}");
            installed.insert(name.to_string(), Installed(detour));
            Ok(())
        }
    }

    impl Detours for RetourDetours {
        fn detour(
            &self,
            target: &str,
            replacement: *const c_void,
            original: &AtomicPtr<c_void>,
        ) -> Result<()> {
            let address = Self::resolve(target)?;
            debug!("{target} = {address:p}");
            self.install(target, address, replacement, original)
        }

        fn detour_address(
            &self,
            name: &str,
            address: *const c_void,
            replacement: *const c_void,
            original: &AtomicPtr<c_void>,
        ) -> Result<()> {
            self.install(name, address, replacement, original)
        }

        fn restore(&self, name: &str) -> Result<()> {
            let Some(Installed(detour)) = self.installed.lock().remove(name) else {
                return Err(Error::detour(name, "not detoured"));
            };

            unsafe { detour.disable() }.map_err(|e| Error::detour(name, e))?;
            info!("Restored {name}");
            Ok(())
        }
    }
}
