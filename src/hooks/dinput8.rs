//! Hooks for DirectInput 8.
//!
//! `DirectInput8Create` is detoured so that the factory it returns can be
//! replaced by a proxy. The proxy in turn wraps the system keyboard and mouse
//! it creates. Every other device, and every method not listed below, is
//! forwarded untouched.
//!
//! | Method                | Proxy behavior                                     |
//! |-----------------------|----------------------------------------------------|
//! | `SetCooperativeLevel` | forwarded, then the window and flags are recorded  |
//! | `SetDataFormat`       | recorded, then forwarded                           |
//! | `GetDeviceState`      | forwarded, then filtered                           |
//! | `GetDeviceData`       | keyboard sampled; emptied while captured           |
//!
//! Forwarded calls go straight through the wrapped virtual table and hand the
//! native result code back as is, success codes such as `DI_BUFFEROVERFLOW`
//! included.

use std::ffi::c_void;
use std::mem;
use std::ptr::null_mut;
use std::sync::atomic::AtomicPtr;
use std::sync::Arc;

use tracing::{debug, error, info};
use windows::core::{implement, ComInterface, IUnknown, Interface, Result, GUID, HRESULT, PCSTR};
use windows::Win32::Devices::HumanInterfaceDevice::*;
use windows::Win32::Foundation::{E_FAIL, E_POINTER, HANDLE, HINSTANCE, HWND, S_OK};

use super::original;
use crate::detour::Detours;
use crate::input::{state_buffer, CooperativeDevice, DeviceKind, NativeResult, KEYBOARD_STATE_LEN};
use crate::util::RawHandle;
use crate::Ssegui;

/// Detour target of the DirectInput factory function.
pub const CREATE_TARGET: &str = "DirectInput8Create@dinput8.dll";

type DirectInput8CreateType = unsafe extern "system" fn(
    hinst: HINSTANCE,
    version: u32,
    riid: *const GUID,
    out: *mut *mut c_void,
    outer: *mut c_void,
) -> HRESULT;

static DIRECT_INPUT8_CREATE: AtomicPtr<c_void> = AtomicPtr::new(null_mut());

unsafe extern "system" fn direct_input8_create_impl(
    hinst: HINSTANCE,
    version: u32,
    riid: *const GUID,
    out: *mut *mut c_void,
    outer: *mut c_void,
) -> HRESULT {
    let Some(create) = original::<DirectInput8CreateType>(&DIRECT_INPUT8_CREATE) else {
        error!("DirectInput8Create trampoline uninitialized");
        return E_FAIL;
    };

    let hr = create(hinst, version, riid, out, outer);
    if hr.is_err() || riid.is_null() || *riid != IDirectInput8A::IID {
        return hr;
    }

    if out.is_null() || (*out).is_null() {
        debug_assert!(false, "DirectInput8Create succeeded without an interface");
        return E_POINTER;
    }

    let inner = IDirectInput8A::from_raw(*out);
    let proxy: IDirectInput8A = DirectInput { inner, ssegui: Ssegui::global() }.into();
    *out = proxy.into_raw();

    info!("IDirectInput8A wrapped");
    hr
}

/// Detour `DirectInput8Create`.
///
/// # Safety
///
/// Patches code in `dinput8.dll`.
pub unsafe fn install(detours: &dyn Detours) -> crate::Result<()> {
    detours.detour(CREATE_TARGET, direct_input8_create_impl as *const c_void, &DIRECT_INPUT8_CREATE)
}

/// Remove the `DirectInput8Create` detour. Proxies already handed out keep
/// working.
///
/// # Safety
///
/// Patches code in `dinput8.dll`.
pub unsafe fn uninstall(detours: &dyn Detours) -> crate::Result<()> {
    super::restore(detours, CREATE_TARGET, &DIRECT_INPUT8_CREATE)
}

/// The real device, as driven by the exclusive mode switch.
struct NativeDevice(IDirectInputDevice8A);

// DirectInput devices are free threaded.
unsafe impl Send for NativeDevice {}
unsafe impl Sync for NativeDevice {}

fn code(e: windows::core::Error) -> i32 {
    e.code().0
}

impl CooperativeDevice for NativeDevice {
    fn unacquire(&self) -> NativeResult {
        unsafe { self.0.Unacquire() }.map_err(code)
    }

    fn set_cooperative_level(&self, window: Option<RawHandle>, flags: u32) -> NativeResult {
        let hwnd = HWND(window.map_or(0, |w| w.addr() as isize));
        unsafe { self.0.SetCooperativeLevel(hwnd, flags) }.map_err(code)
    }

    fn set_data_format(&self, format: Option<RawHandle>) -> NativeResult {
        match format {
            Some(format) => unsafe { self.0.SetDataFormat(format.as_ptr().cast()) }.map_err(code),
            None => Ok(()),
        }
    }

    fn acquire(&self) -> NativeResult {
        unsafe { self.0.Acquire() }.map_err(code)
    }
}

/// Hand a forwarded result code back through `#[implement]`.
///
/// The upcall turns `Ok` into `S_OK` and `Err` into the error's code, so any
/// other success code travels as an `Err` to reach the host unchanged.
fn forwarded(hr: HRESULT) -> Result<()> {
    if hr == S_OK {
        Ok(())
    } else {
        Err(hr.into())
    }
}

/// Forward methods one-to-one through the wrapped interface's virtual table,
/// keeping the native result code. Arguments are passed in their ABI form, as
/// the `windows` upcalls do.
macro_rules! forward {
    ($(fn $name:ident(&self $(, $arg:ident: $ty:ty)*);)*) => {
        $(
            fn $name(&self $(, $arg: $ty)*) -> Result<()> {
                let native = self.native();
                forwarded(unsafe {
                    (native.vtable().$name)(native.as_raw() $(, mem::transmute_copy(&$arg))*)
                })
            }
        )*
    };
}

#[implement(IDirectInput8A)]
struct DirectInput {
    inner: IDirectInput8A,
    ssegui: &'static Ssegui,
}

impl DirectInput {
    fn native(&self) -> &IDirectInput8A {
        &self.inner
    }
}

impl IDirectInput8A_Impl for DirectInput {
    fn CreateDevice(
        &self,
        guid: *const GUID,
        device: *mut Option<IDirectInputDevice8A>,
        outer: Option<&IUnknown>,
    ) -> Result<()> {
        let native = self.native();
        let hr = unsafe {
            (native.vtable().CreateDevice)(
                native.as_raw(),
                guid,
                device.cast(),
                mem::transmute_copy(&outer),
            )
        };
        if hr.is_err() {
            return forwarded(hr);
        }

        let kind = unsafe { guid.as_ref() }.and_then(|guid| DeviceKind::from_class(guid.to_u128()));
        let Some(kind) = kind else {
            return forwarded(hr);
        };
        let Some(created) = unsafe { device.as_mut() }.and_then(Option::take) else {
            debug_assert!(false, "CreateDevice succeeded without a {kind} device");
            return Err(E_POINTER.into());
        };

        let native = Arc::new(NativeDevice(created));
        self.ssegui.input().attach(kind, native.clone());
        unsafe { *device = Some(InputDevice { kind, device: native, ssegui: self.ssegui }.into()) };

        info!("IDirectInputDevice8A wrapped ({kind})");
        forwarded(hr)
    }

    forward! {
        fn EnumDevices(&self, dev_type: u32, callback: LPDIENUMDEVICESCALLBACKA, context: *mut c_void, flags: u32);
        fn GetDeviceStatus(&self, guid: *const GUID);
        fn RunControlPanel(&self, owner: HWND, flags: u32);
        fn Initialize(&self, hinst: HINSTANCE, version: u32);
        fn ConfigureDevices(&self, callback: LPDICONFIGUREDEVICESCALLBACK, params: *mut DICONFIGUREDEVICESPARAMSA, flags: u32, data: *mut c_void);
    }

    fn FindDevice(&self, class: *const GUID, name: &PCSTR, instance: *mut GUID) -> Result<()> {
        let native = self.native();
        forwarded(unsafe { (native.vtable().FindDevice)(native.as_raw(), class, *name, instance) })
    }

    fn EnumDevicesBySemantics(
        &self,
        user: &PCSTR,
        action_format: *mut DIACTIONFORMATA,
        callback: LPDIENUMDEVICESBYSEMANTICSCBA,
        context: *mut c_void,
        flags: u32,
    ) -> Result<()> {
        let native = self.native();
        forwarded(unsafe {
            (native.vtable().EnumDevicesBySemantics)(
                native.as_raw(),
                *user,
                action_format,
                callback,
                context,
                flags,
            )
        })
    }
}

#[implement(IDirectInputDevice8A)]
struct InputDevice {
    kind: DeviceKind,
    device: Arc<NativeDevice>,
    ssegui: &'static Ssegui,
}

impl InputDevice {
    fn native(&self) -> &IDirectInputDevice8A {
        &self.device.0
    }
}

impl Drop for InputDevice {
    fn drop(&mut self) {
        let device: Arc<dyn CooperativeDevice> = self.device.clone();
        if self.ssegui.input().detach(self.kind, &device) {
            debug!("{} device released", self.kind);
        }
    }
}

impl IDirectInputDevice8A_Impl for InputDevice {
    forward! {
        fn GetCapabilities(&self, caps: *mut DIDEVCAPS);
        fn EnumObjects(&self, callback: LPDIENUMDEVICEOBJECTSCALLBACKA, context: *mut c_void, flags: u32);
        fn GetProperty(&self, property: *const GUID, header: *mut DIPROPHEADER);
        fn SetProperty(&self, property: *const GUID, header: *mut DIPROPHEADER);
        fn Acquire(&self);
        fn Unacquire(&self);
        fn SetEventNotification(&self, event: HANDLE);
        fn GetObjectInfo(&self, info: *mut DIDEVICEOBJECTINSTANCEA, object: u32, how: u32);
        fn GetDeviceInfo(&self, info: *mut DIDEVICEINSTANCEA);
        fn RunControlPanel(&self, owner: HWND, flags: u32);
        fn Initialize(&self, hinst: HINSTANCE, version: u32, guid: *const GUID);
        fn CreateEffect(&self, guid: *const GUID, effect: *mut DIEFFECT, out: *mut Option<IDirectInputEffect>, outer: Option<&IUnknown>);
        fn EnumEffects(&self, callback: LPDIENUMEFFECTSCALLBACKA, context: *mut c_void, kind: u32);
        fn GetEffectInfo(&self, info: *mut DIEFFECTINFOA, guid: *const GUID);
        fn GetForceFeedbackState(&self, state: *mut u32);
        fn SendForceFeedbackCommand(&self, command: u32);
        fn EnumCreatedEffectObjects(&self, callback: LPDIENUMCREATEDEFFECTOBJECTSCALLBACK, context: *mut c_void, flags: u32);
        fn Escape(&self, escape: *mut DIEFFESCAPE);
        fn Poll(&self);
        fn SendDeviceData(&self, size: u32, data: *mut DIDEVICEOBJECTDATA, count: *mut u32, flags: u32);
        fn GetImageInfo(&self, header: *mut DIDEVICEIMAGEINFOHEADERA);
    }

    fn GetDeviceState(&self, size: u32, data: *mut c_void) -> Result<()> {
        let native = self.native();
        let hr = unsafe { (native.vtable().GetDeviceState)(native.as_raw(), size, data) };

        if hr.is_ok() {
            let input = self.ssegui.input();
            if let Some(state) = unsafe { state_buffer(data, size as usize) } {
                match self.kind {
                    DeviceKind::Keyboard => {
                        input.filter_keyboard_state(state);
                    },
                    DeviceKind::Mouse => input.filter_mouse_state(state),
                }
            }
        }
        forwarded(hr)
    }

    fn GetDeviceData(
        &self,
        size: u32,
        data: *mut DIDEVICEOBJECTDATA,
        count: *mut u32,
        flags: u32,
    ) -> Result<()> {
        let native = self.native();
        let input = self.ssegui.input();

        // Buffered keyboard readers never poll, so sample the toggle key here.
        if self.kind == DeviceKind::Keyboard {
            let mut keys = [0u8; KEYBOARD_STATE_LEN];
            if unsafe { native.GetDeviceState(keys.len() as u32, keys.as_mut_ptr().cast()) }.is_ok() {
                input.filter_keyboard_state(&mut keys);
            }
        }

        if input.suppress_buffered(self.kind) && !count.is_null() {
            let mut pending = u32::MAX;
            let hr = unsafe {
                (native.vtable().GetDeviceData)(native.as_raw(), size, null_mut(), &mut pending, 0)
            };
            unsafe { *count = 0 };
            return forwarded(hr);
        }

        forwarded(unsafe {
            (native.vtable().GetDeviceData)(native.as_raw(), size, data, count, flags)
        })
    }

    fn SetDataFormat(&self, format: *mut DIDATAFORMAT) -> Result<()> {
        self.ssegui.input().on_set_data_format(self.kind, RawHandle::new(format.cast()));
        let native = self.native();
        forwarded(unsafe { (native.vtable().SetDataFormat)(native.as_raw(), format) })
    }

    fn SetCooperativeLevel(&self, window: HWND, flags: u32) -> Result<()> {
        let native = self.native();
        let hr = unsafe { (native.vtable().SetCooperativeLevel)(native.as_raw(), window, flags) };
        if hr.is_ok() {
            self.ssegui.input().on_set_cooperative_level(
                self.kind,
                RawHandle::from_addr(window.0 as usize),
                flags,
            );
        }
        forwarded(hr)
    }

    fn EnumEffectsInFile(
        &self,
        file: &PCSTR,
        callback: LPDIENUMEFFECTSINFILECALLBACK,
        context: *mut c_void,
        flags: u32,
    ) -> Result<()> {
        let native = self.native();
        forwarded(unsafe {
            (native.vtable().EnumEffectsInFile)(native.as_raw(), *file, callback, context, flags)
        })
    }

    fn WriteEffectToFile(
        &self,
        file: &PCSTR,
        count: u32,
        effects: *mut DIFILEEFFECT,
        flags: u32,
    ) -> Result<()> {
        let native = self.native();
        forwarded(unsafe {
            (native.vtable().WriteEffectToFile)(native.as_raw(), *file, count, effects, flags)
        })
    }

    fn BuildActionMap(&self, format: *mut DIACTIONFORMATA, user: &PCSTR, flags: u32) -> Result<()> {
        let native = self.native();
        forwarded(unsafe { (native.vtable().BuildActionMap)(native.as_raw(), format, *user, flags) })
    }

    fn SetActionMap(&self, format: *mut DIACTIONFORMATA, user: &PCSTR, flags: u32) -> Result<()> {
        let native = self.native();
        forwarded(unsafe { (native.vtable().SetActionMap)(native.as_raw(), format, *user, flags) })
    }
}
